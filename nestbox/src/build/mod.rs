//! Build collaborator: turns a declaration into a store path.

mod nix;

pub use nix::NixBuilder;

use std::path::PathBuf;

use async_trait::async_trait;
use nestbox_shared::errors::NestboxResult;

use crate::runtime::options::ContainerDeclaration;

/// What to build for a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildRequest {
    /// Minimal system the container is created from. It only needs to
    /// accept the client key so the first deployment can log in.
    InitialSystem { name: String, public_key: String },
    /// Per-container runtime configuration file (`/etc/containers/<id>.conf`).
    ContainerConfig { name: String },
}

#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Fails with `BuildFailed` when the build tool exits non-zero.
    async fn build(
        &self,
        declaration: &ContainerDeclaration,
        request: BuildRequest,
    ) -> NestboxResult<PathBuf>;
}
