use nestbox_shared::errors::{NestboxError, NestboxResult};
use std::path::{Path, PathBuf};

use crate::runtime::constants::filenames;

/// Directory structure constants
pub mod dirs {
    /// Base directory name for nestbox data
    pub const NESTBOX_DIR: &str = ".nestbox";

    /// Attribute store
    pub const DB_DIR: &str = "db";

    /// Subdirectory for log files
    pub const LOGS_DIR: &str = "logs";

    /// Materialised client private keys (one file per container)
    pub const KEYS_DIR: &str = "keys";

    /// Build expressions and other transient files
    pub const TMP_DIR: &str = "tmp";
}

// ============================================================================
// FILESYSTEM LAYOUT (home directory)
// ============================================================================

#[derive(Clone, Debug)]
pub struct FilesystemLayout {
    home_dir: PathBuf,
}

impl FilesystemLayout {
    pub fn new(home_dir: PathBuf) -> Self {
        Self { home_dir }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn db_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::DB_DIR)
    }

    /// SQLite attribute store: ~/.nestbox/db/nestbox.db
    pub fn db_path(&self) -> PathBuf {
        self.db_dir().join(filenames::DB_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::LOGS_DIR)
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::KEYS_DIR)
    }

    /// Private key file handed to `ssh -i` for one container.
    pub fn key_file(&self, container: &str) -> PathBuf {
        self.keys_dir().join(format!("id-{}", container))
    }

    /// Temporary directory for transient files: ~/.nestbox/tmp
    pub fn temp_dir(&self) -> PathBuf {
        self.home_dir.join(dirs::TMP_DIR)
    }

    /// known_hosts file shared by the trust registry and the container channel.
    pub fn known_hosts(&self) -> PathBuf {
        self.home_dir.join(filenames::KNOWN_HOSTS)
    }

    /// Initialize the filesystem structure.
    pub fn prepare(&self) -> NestboxResult<()> {
        for dir in [
            self.home_dir.clone(),
            self.db_dir(),
            self.logs_dir(),
            self.keys_dir(),
            self.temp_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                NestboxError::Storage(format!("failed to create {}: {e}", dir.display()))
            })?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(self.keys_dir(), std::fs::Permissions::from_mode(0o700))
                .map_err(|e| NestboxError::Storage(format!("failed to restrict keys dir: {e}")))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_creates_directories() {
        let temp = TempDir::new().unwrap();
        let layout = FilesystemLayout::new(temp.path().join("home"));
        layout.prepare().unwrap();

        assert!(layout.db_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
        assert!(layout.keys_dir().is_dir());
        assert!(layout.temp_dir().is_dir());
    }

    #[test]
    fn test_paths_are_under_home() {
        let layout = FilesystemLayout::new(PathBuf::from("/srv/nb"));
        assert_eq!(layout.db_path(), PathBuf::from("/srv/nb/db/nestbox.db"));
        assert_eq!(layout.key_file("web"), PathBuf::from("/srv/nb/keys/id-web"));
        assert_eq!(layout.known_hosts(), PathBuf::from("/srv/nb/known_hosts"));
    }
}
