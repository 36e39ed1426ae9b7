//! Home directory lock.
//!
//! Two processes driving the same attribute store would interleave state
//! writes for the same container, so a runtime takes an exclusive `flock`
//! on `<home>/.lock` for its whole lifetime.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use nestbox_shared::errors::{NestboxError, NestboxResult};

use crate::runtime::constants::filenames;

/// Exclusive lock on a nestbox home directory, released on drop.
#[derive(Debug)]
pub struct RuntimeLock {
    file: File,
    path: PathBuf,
}

impl RuntimeLock {
    /// Take the lock without blocking.
    ///
    /// Fails with [`NestboxError::InvalidState`] when another runtime holds it.
    pub fn acquire(home_dir: &Path) -> NestboxResult<Self> {
        std::fs::create_dir_all(home_dir)
            .map_err(|e| NestboxError::Storage(format!("failed to create home dir: {}", e)))?;

        let path = home_dir.join(filenames::LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| NestboxError::Storage(format!("failed to open lock file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if rc != 0 {
                let err = std::io::Error::last_os_error();
                return Err(if err.kind() == std::io::ErrorKind::WouldBlock {
                    NestboxError::InvalidState(format!(
                        "another nestbox process is using {}",
                        home_dir.display()
                    ))
                } else {
                    NestboxError::Storage(format!("failed to acquire lock: {}", err))
                });
            }
        }

        tracing::debug!(lock_path = %path.display(), "Acquired home lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RuntimeLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        tracing::debug!(lock_path = %self.path.display(), "Released home lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let temp_dir = TempDir::new().unwrap();
        let _held = RuntimeLock::acquire(temp_dir.path()).unwrap();

        let err = RuntimeLock::acquire(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("another nestbox process"));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        drop(RuntimeLock::acquire(temp_dir.path()).unwrap());

        let lock = RuntimeLock::acquire(temp_dir.path()).unwrap();
        assert_eq!(lock.path(), temp_dir.path().join(".lock"));
    }
}
