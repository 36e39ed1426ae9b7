use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use nestbox::ContainerDeclaration;
use nestbox::build::{BuildRequest, ImageBuilder};
use nestbox_shared::errors::{NestboxError, NestboxResult};
use parking_lot::Mutex;

#[derive(Default)]
struct BuilderState {
    requests: Vec<BuildRequest>,
    config_paths: HashMap<String, PathBuf>,
    fail: Option<String>,
}

/// Returns made-up store paths and records what was asked for.
#[derive(Default)]
pub struct FakeBuilder {
    state: Mutex<BuilderState>,
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path returned for the container config of `name`.
    pub fn set_config_path(&self, name: &str, path: impl Into<PathBuf>) {
        self.state
            .lock()
            .config_paths
            .insert(name.to_string(), path.into());
    }

    /// Make every build fail with `message`.
    pub fn fail_with(&self, message: &str) {
        self.state.lock().fail = Some(message.to_string());
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        self.state.lock().requests.clone()
    }
}

#[async_trait]
impl ImageBuilder for FakeBuilder {
    async fn build(
        &self,
        _declaration: &ContainerDeclaration,
        request: BuildRequest,
    ) -> NestboxResult<PathBuf> {
        let mut state = self.state.lock();
        state.requests.push(request.clone());
        if let Some(message) = &state.fail {
            return Err(NestboxError::BuildFailed(message.clone()));
        }
        Ok(match request {
            BuildRequest::InitialSystem { name, .. } => {
                PathBuf::from(format!("/nix/store/00000000-nixos-system-{}", name))
            }
            BuildRequest::ContainerConfig { name } => state
                .config_paths
                .get(&name)
                .cloned()
                .unwrap_or_else(|| PathBuf::from(format!("/nix/store/11111111-{}.conf", name))),
        })
    }
}
