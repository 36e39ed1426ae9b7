use clap::Args;
use comfy_table::{Table, presets};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ListArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let (runtime, _) = global.create_runtime()?;
    let containers = runtime.list()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&containers)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(vec!["NAME", "STATUS", "HOST", "RUNTIME ID", "ADDRESS"]);

    for info in containers {
        table.add_row(vec![
            info.name,
            info.status.to_string(),
            info.host.unwrap_or_default(),
            info.runtime_id.unwrap_or_else(|| "-".to_string()),
            info.private_address.unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{}", table);
    Ok(())
}
