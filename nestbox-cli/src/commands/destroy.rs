use std::io::{self, BufRead, Write};

use clap::Args;
use nestbox::DestroyOutcome;

use super::summarize;

#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Name of the container(s) to destroy
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: DestroyArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let (runtime, _) = global.create_runtime()?;

    let mut errors = Vec::new();
    let mut success_count = 0;

    for target in args.targets {
        if runtime.get(&target)?.is_none() {
            eprintln!("Error: No such container: {}", target);
            errors.push(format!("{}: not found", target));
            continue;
        }

        let confirmed = args.yes || confirm(&target)?;
        match runtime.container(&target).destroy(confirmed).await {
            Ok(DestroyOutcome::Destroyed) => {
                println!("{}", target);
                success_count += 1;
            }
            Ok(DestroyOutcome::Aborted) => {
                eprintln!("Not destroying container '{}'", target);
            }
            Err(e) => {
                eprintln!("Error destroying container '{}': {}", target, e);
                errors.push(format!("{}: {}", target, e));
            }
        }
    }

    summarize("destroy", errors, success_count)
}

fn confirm(target: &str) -> anyhow::Result<bool> {
    print!(
        "Are you sure you want to destroy container '{}'? [y/N] ",
        target
    );
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
