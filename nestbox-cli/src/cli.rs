//! CLI definition and argument parsing for nestbox-cli.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use nestbox::NestboxRuntime;

use crate::deployment::Deployment;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "nestbox", author, version, about = "Nestbox CLI")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
#[non_exhaustive]
pub enum Commands {
    /// Create declared containers and bring them up
    Create(crate::commands::create::CreateArgs),

    /// Start one or more containers
    Start(crate::commands::start::StartArgs),

    /// Stop one or more running containers
    Stop(crate::commands::stop::StopArgs),

    /// Destroy one or more containers
    Destroy(crate::commands::destroy::DestroyArgs),

    /// Compare recorded state with what the runtime reports
    Check(crate::commands::check::CheckArgs),

    /// Run a command inside a container
    Exec(crate::commands::exec::ExecArgs),

    /// List containers
    #[command(visible_alias = "ls")]
    List(crate::commands::list::ListArgs),
}

// ============================================================================
// GLOBAL FLAGS
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Nestbox home directory
    #[arg(long, global = true, env = "NESTBOX_HOME")]
    pub home: Option<PathBuf>,

    /// Deployment file declaring options, machines and containers
    #[arg(short = 'f', long, global = true, env = "NESTBOX_DEPLOYMENT")]
    pub deployment: Option<PathBuf>,
}

impl GlobalFlags {
    pub fn load_deployment(&self) -> anyhow::Result<Deployment> {
        match &self.deployment {
            Some(path) => Deployment::load(path),
            None => Ok(Deployment::default()),
        }
    }

    /// Open the runtime with the deployment's options and machines.
    pub fn create_runtime(&self) -> anyhow::Result<(NestboxRuntime, Deployment)> {
        let deployment = self.load_deployment()?;

        let mut options = deployment.options.clone();
        if let Some(home) = &self.home {
            options.home_dir = home.clone();
        }

        let runtime = NestboxRuntime::new(options)?;
        for machine in &deployment.machines {
            runtime.register_machine(machine.clone())?;
        }
        Ok((runtime, deployment))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_anywhere() {
        let cli = Cli::try_parse_from([
            "nestbox",
            "list",
            "--home",
            "/tmp/nb",
            "-f",
            "deploy.yaml",
        ])
        .unwrap();
        assert_eq!(cli.global.home, Some(PathBuf::from("/tmp/nb")));
        assert_eq!(cli.global.deployment, Some(PathBuf::from("deploy.yaml")));
        assert!(matches!(cli.command, Commands::List(_)));
    }

    #[test]
    fn test_exec_keeps_trailing_words() {
        let cli =
            Cli::try_parse_from(["nestbox", "exec", "web", "--", "ls", "-la", "/root"]).unwrap();
        match cli.command {
            Commands::Exec(args) => {
                assert_eq!(args.target, "web");
                assert_eq!(args.command, vec!["ls", "-la", "/root"]);
            }
            other => panic!("expected exec, got {:?}", other),
        }
    }

    #[test]
    fn test_destroy_requires_target() {
        assert!(Cli::try_parse_from(["nestbox", "destroy"]).is_err());
    }
}
