use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use nestbox_shared::errors::{NestboxError, NestboxResult};
use tokio::process::Command;

use super::{BuildRequest, ImageBuilder};
use crate::runtime::constants::programs;
use crate::runtime::options::ContainerDeclaration;

/// [`ImageBuilder`] driving `nix-build`.
#[derive(Debug, Clone)]
pub struct NixBuilder {
    /// Where generated expressions are written.
    temp_dir: PathBuf,
}

impl NixBuilder {
    pub fn new(temp_dir: PathBuf) -> Self {
        Self { temp_dir }
    }

    /// Expression of the initial container system.
    pub fn initial_expression(name: &str, public_key: &str) -> String {
        format!(
            concat!(
                "{{ imports = [ <nixpkgs/nixos/modules/virtualisation/container-config.nix> ];\n",
                "  boot.isContainer = true;\n",
                "  networking.hostName = \"{name}\";\n",
                "  services.openssh.enable = true;\n",
                "  users.users.root.openssh.authorizedKeys.keys = [ \"{key}\" ];\n",
                "}}\n"
            ),
            name = nix_escape(name),
            key = nix_escape(public_key.trim())
        )
    }

    async fn initial_system(&self, name: &str, public_key: &str) -> NestboxResult<PathBuf> {
        std::fs::create_dir_all(&self.temp_dir).map_err(|e| {
            NestboxError::Storage(format!(
                "failed to create {}: {}",
                self.temp_dir.display(),
                e
            ))
        })?;
        let expr_file = self.temp_dir.join(format!("{}-initial.nix", name));
        std::fs::write(&expr_file, Self::initial_expression(name, public_key)).map_err(|e| {
            NestboxError::Storage(format!("failed to write {}: {}", expr_file.display(), e))
        })?;

        let mut cmd = Command::new(programs::NIX_BUILD);
        cmd.arg("<nixpkgs/nixos>")
            .args(["-A", "system", "-I"])
            .arg(format!("nixos-config={}", expr_file.display()));
        nix_build(cmd).await
    }

    async fn container_config(
        &self,
        declaration: &ContainerDeclaration,
        name: &str,
    ) -> NestboxResult<PathBuf> {
        if declaration.nix_exprs.is_empty() {
            return Err(NestboxError::Config(format!(
                "container '{}' writes its container config but declares no nix_exprs",
                name
            )));
        }
        let mut cmd = Command::new(programs::NIX_BUILD);
        cmd.args(&declaration.nix_exprs)
            .arg("-A")
            .arg(format!("nodes.\"{}\".config.system.build.containerConf", name));
        nix_build(cmd).await
    }
}

#[async_trait]
impl ImageBuilder for NixBuilder {
    async fn build(
        &self,
        declaration: &ContainerDeclaration,
        request: BuildRequest,
    ) -> NestboxResult<PathBuf> {
        tracing::info!(container = %declaration.name, request = ?request, "Building");
        match request {
            BuildRequest::InitialSystem { name, public_key } => {
                self.initial_system(&name, &public_key).await
            }
            BuildRequest::ContainerConfig { name } => {
                self.container_config(declaration, &name).await
            }
        }
    }
}

/// Run nix-build and return the out path it prints last.
async fn nix_build(mut cmd: Command) -> NestboxResult<PathBuf> {
    let output = cmd
        .arg("--no-out-link")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| NestboxError::BuildFailed(format!("failed to run nix-build: {}", e)))?;

    if !output.status.success() {
        return Err(NestboxError::BuildFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    out_path(&stdout)
}

fn out_path(stdout: &str) -> NestboxResult<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .map(|l| Path::new(l).to_path_buf())
        .ok_or_else(|| NestboxError::BuildFailed("nix-build printed no out path".into()))
}

fn nix_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "\\${")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_expression() {
        let expr = NixBuilder::initial_expression("web", "ssh-ed25519 AAAA web\n");
        assert!(expr.contains("networking.hostName = \"web\";"));
        assert!(expr.contains("authorizedKeys.keys = [ \"ssh-ed25519 AAAA web\" ];"));
        assert!(expr.starts_with("{ imports"));
        assert!(expr.trim_end().ends_with('}'));
    }

    #[test]
    fn test_nix_escape() {
        assert_eq!(nix_escape(r#"a"b${c}"#), r#"a\"b\${c}"#);
    }

    #[test]
    fn test_out_path_takes_last_line() {
        let path = out_path("warning: dirty\n/nix/store/abc-system\n\n").unwrap();
        assert_eq!(path, PathBuf::from("/nix/store/abc-system"));
        assert!(out_path("").is_err());
    }

    #[tokio::test]
    async fn test_container_config_requires_exprs() {
        let builder = NixBuilder::new(std::env::temp_dir());
        let decl = ContainerDeclaration::new("web", "localhost");
        let err = builder
            .build(&decl, BuildRequest::ContainerConfig { name: "web".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, NestboxError::Config(_)));
    }
}
