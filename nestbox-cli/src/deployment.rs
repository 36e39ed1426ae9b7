//! Deployment file: runtime options plus the declared machines and containers.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, bail};
use nestbox::errors::NestboxResult;
use nestbox::{ContainerDeclaration, MachineDeclaration, NestboxOptions};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub options: NestboxOptions,

    #[serde(default)]
    pub machines: Vec<MachineDeclaration>,

    #[serde(default)]
    pub containers: Vec<ContainerDeclaration>,
}

impl Deployment {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read deployment {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid deployment {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let deployment: Self = serde_yaml::from_str(raw)?;

        let mut seen = BTreeSet::new();
        for container in &deployment.containers {
            container.sanitize()?;
            if !seen.insert(container.name.as_str()) {
                bail!("container '{}' is declared twice", container.name);
            }
        }
        Ok(deployment)
    }

    pub fn container(&self, name: &str) -> Option<&ContainerDeclaration> {
        self.containers.iter().find(|c| c.name == name)
    }
}

/// Order declarations so each comes after the selected containers it is
/// hosted on. Dependencies outside the selection are assumed to exist.
pub fn creation_order<'a, F>(
    selected: &[&'a ContainerDeclaration],
    dependencies: F,
) -> anyhow::Result<Vec<&'a ContainerDeclaration>>
where
    F: Fn(&ContainerDeclaration) -> NestboxResult<BTreeSet<String>>,
{
    let names: BTreeSet<&str> = selected.iter().map(|d| d.name.as_str()).collect();

    let mut pending = Vec::with_capacity(selected.len());
    for decl in selected {
        let deps: BTreeSet<String> = dependencies(decl)?
            .into_iter()
            .filter(|dep| names.contains(dep.as_str()))
            .collect();
        pending.push((*decl, deps));
    }

    let mut placed: BTreeSet<String> = BTreeSet::new();
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|(_, deps)| deps.iter().all(|d| placed.contains(d)));
        if ready.is_empty() {
            let stuck: Vec<_> = blocked.iter().map(|(d, _)| d.name.as_str()).collect();
            bail!("containers host each other: {}", stuck.join(", "));
        }
        for (decl, _) in ready {
            placed.insert(decl.name.clone());
            ordered.push(decl);
        }
        pending = blocked;
    }
    Ok(ordered)
}
