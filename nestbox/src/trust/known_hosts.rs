use std::io::Write;
use std::path::{Path, PathBuf};

use nestbox_shared::errors::{NestboxError, NestboxResult};
use parking_lot::Mutex;
use tempfile::NamedTempFile;

use super::TrustRegistry;

/// OpenSSH `known_hosts` file owned by nestbox.
///
/// Every update rewrites the whole file through a temporary sibling and a
/// rename, so readers (ssh) never observe a half-written file.
#[derive(Debug)]
pub struct KnownHostsFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl KnownHostsFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> NestboxResult<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(NestboxError::Storage(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write_lines(&self, lines: &[String]) -> NestboxResult<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .map_err(|e| NestboxError::Storage(format!("failed to create {}: {}", dir.display(), e)))?;

        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| NestboxError::Storage(format!("failed to create temp file: {}", e)))?;
        for line in lines {
            writeln!(tmp, "{}", line)
                .map_err(|e| NestboxError::Storage(format!("failed to write known_hosts: {}", e)))?;
        }
        tmp.persist(&self.path).map_err(|e| {
            NestboxError::Storage(format!("failed to replace {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }
}

fn entry(name: &str, public_host_key: &str) -> String {
    format!("{} {}", name, public_host_key.trim())
}

impl TrustRegistry for KnownHostsFile {
    fn add(&self, name: &str, public_host_key: &str) -> NestboxResult<()> {
        let _guard = self.write_lock.lock();
        let line = entry(name, public_host_key);
        let mut lines = self.read_lines()?;
        if lines.iter().any(|l| l.trim() == line) {
            return Ok(());
        }
        lines.push(line);
        self.write_lines(&lines)?;
        tracing::debug!(name, path = %self.path.display(), "Registered host key");
        Ok(())
    }

    fn remove(&self, name: &str, public_host_key: &str) -> NestboxResult<()> {
        let _guard = self.write_lock.lock();
        let line = entry(name, public_host_key);
        let lines = self.read_lines()?;
        let kept: Vec<String> = lines.iter().filter(|l| l.trim() != line).cloned().collect();
        if kept.len() == lines.len() {
            return Ok(());
        }
        self.write_lines(&kept)?;
        tracing::debug!(name, path = %self.path.display(), "Removed host key");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIGhvc3Q=";

    #[test]
    fn test_add_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let registry = KnownHostsFile::new(temp.path().join("known_hosts"));

        registry.add("10.233.1.2", KEY).unwrap();
        registry.add("10.233.1.2", &format!("{}\n", KEY)).unwrap();

        let content = std::fs::read_to_string(registry.path()).unwrap();
        assert_eq!(content, format!("10.233.1.2 {}\n", KEY));
    }

    #[test]
    fn test_remove_keeps_other_entries() {
        let temp = TempDir::new().unwrap();
        let registry = KnownHostsFile::new(temp.path().join("known_hosts"));

        registry.add("10.233.1.2", KEY).unwrap();
        registry.add("hv~10.233.1.3", KEY).unwrap();
        registry.remove("10.233.1.2", KEY).unwrap();

        let content = std::fs::read_to_string(registry.path()).unwrap();
        assert_eq!(content, format!("hv~10.233.1.3 {}\n", KEY));
    }

    #[test]
    fn test_remove_absent_is_ok() {
        let temp = TempDir::new().unwrap();
        let registry = KnownHostsFile::new(temp.path().join("known_hosts"));

        registry.remove("10.233.1.2", KEY).unwrap();
        assert!(!registry.path().exists());
    }
}
