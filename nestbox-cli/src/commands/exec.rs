use clap::Args;

use super::cancel_on_interrupt;

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Name of the container
    pub target: String,

    /// Command to run in a root login shell
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

pub async fn execute(args: ExecArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let (runtime, _) = global.create_runtime()?;

    if runtime.get(&args.target)?.is_none() {
        anyhow::bail!("No such container: {}", args.target);
    }

    let container = runtime.container(&args.target);
    let interrupt = cancel_on_interrupt(&container);
    let result = container.run_command(&args.command.join(" ")).await;
    interrupt.abort();

    let output = result?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
