use clap::Args;
use comfy_table::{Table, presets};

use super::summarize;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Containers to check (default: every known container)
    pub targets: Vec<String>,
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub async fn execute(args: CheckArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let (runtime, _) = global.create_runtime()?;

    let targets = if args.targets.is_empty() {
        runtime.list()?.into_iter().map(|info| info.name).collect()
    } else {
        args.targets
    };

    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(vec!["NAME", "EXISTS", "UP", "REACHABLE", "STATUS"]);

    let mut errors = Vec::new();
    let mut success_count = 0;

    for target in targets {
        if runtime.get(&target)?.is_none() {
            eprintln!("Error: No such container: {}", target);
            errors.push(format!("{}: not found", target));
            continue;
        }

        let container = runtime.container(&target);
        match container.check().await {
            Ok(result) => {
                let status = container.info()?.status;
                table.add_row(vec![
                    target.clone(),
                    yes_no(result.exists).to_string(),
                    yes_no(result.is_up).to_string(),
                    yes_no(result.is_reachable).to_string(),
                    status.to_string(),
                ]);
                success_count += 1;
            }
            Err(e) => {
                eprintln!("Error checking container '{}': {}", target, e);
                errors.push(format!("{}: {}", target, e));
            }
        }
    }

    println!("{}", table);
    summarize("check", errors, success_count)
}
