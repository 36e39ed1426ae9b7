use anyhow::Context;
use clap::Args;
use nestbox::CreateOptions;

use super::cancel_on_interrupt;
use crate::deployment::creation_order;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Re-run start and re-query the address of containers that already exist
    #[arg(long)]
    pub check: bool,

    /// Allow restarting running containers whose configuration changed
    #[arg(long)]
    pub allow_reboot: bool,

    /// Replace containers that check found missing from the runtime
    #[arg(long)]
    pub allow_recreate: bool,

    /// Containers to create (default: every declared container)
    pub targets: Vec<String>,
}

pub async fn execute(args: CreateArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let (runtime, deployment) = global.create_runtime()?;

    if deployment.containers.is_empty() {
        anyhow::bail!("no containers declared, pass a deployment file with --deployment");
    }

    let selected = if args.targets.is_empty() {
        deployment.containers.iter().collect::<Vec<_>>()
    } else {
        args.targets
            .iter()
            .map(|name| {
                deployment.container(name).with_context(|| {
                    format!("container '{}' is not declared in the deployment", name)
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let ordered = creation_order(&selected, |decl| {
        runtime.container(&decl.name).create_after(Some(decl))
    })?;

    let options = CreateOptions {
        check: args.check,
        allow_reboot: args.allow_reboot,
        allow_recreate: args.allow_recreate,
    };

    // Later containers may be hosted on earlier ones; stop at the first failure.
    for declaration in ordered {
        let container = runtime.container(&declaration.name);
        let interrupt = cancel_on_interrupt(&container);
        let result = container.create(declaration, options).await;
        interrupt.abort();

        result.with_context(|| format!("failed to create container '{}'", declaration.name))?;
        println!("{}", declaration.name);
    }
    Ok(())
}
