use clap::Args;

use super::{cancel_on_interrupt, summarize};

#[derive(Args, Debug)]
pub struct StopArgs {
    /// Name of the container(s) to stop
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: StopArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let (runtime, _) = global.create_runtime()?;

    let mut errors = Vec::new();
    let mut success_count = 0;

    for target in args.targets {
        if runtime.get(&target)?.is_none() {
            eprintln!("Error: No such container: {}", target);
            errors.push(format!("{}: not found", target));
            continue;
        }

        let container = runtime.container(&target);
        let interrupt = cancel_on_interrupt(&container);
        let result = container.stop().await;
        interrupt.abort();

        if let Err(e) = result {
            eprintln!("Error stopping container '{}': {}", target, e);
            errors.push(format!("{}: {}", target, e));
        } else {
            println!("{}", target);
            success_count += 1;
        }
    }

    summarize("stop", errors, success_count)
}
