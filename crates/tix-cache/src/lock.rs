//! The pid file guarding a repository's cache against a second process.
//!
//! The file is created with `O_EXCL` and holds an advisory exclusive lock
//! for as long as the cache is open. A lock left behind by a process that is
//! gone is reclaimed; one whose owner still runs, or whose advisory lock is
//! still held, is not.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{CacheError, CacheResult};

pub const LOCK_FILE: &str = "lock";

/// Longest pid text accepted in a lock file.
const MAX_LOCK_LEN: usize = 10;

/// Holds the cache lock until dropped.
#[derive(Debug)]
pub struct LockFile {
    file: File,
    path: PathBuf,
}

impl LockFile {
    /// Take the lock at `path`, reclaiming it from a process that is gone.
    pub fn acquire(path: &Path) -> CacheResult<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                if let Err(e) = file.try_lock_exclusive() {
                    let _ = fs::remove_file(path);
                    return Err(e.into());
                }
                file.write_all(std::process::id().to_string().as_bytes())?;
                file.sync_all()?;
                debug!(path = %path.display(), "cache lock acquired");
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                reclaim(path)?;
                Self::acquire(path)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove cache lock");
        }
    }
}

/// Delete the lock at `path` if its owner is gone. Returns `Ok` as well when
/// the file changed or vanished meanwhile, so the caller tries again.
fn reclaim(path: &Path) -> CacheResult<()> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let pid = parse_pid(path, &content)?;
    if process_alive(pid) {
        return Err(CacheError::AlreadyLocked { pid });
    }

    let stale = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if stale.try_lock_exclusive().is_err() {
        return Err(CacheError::AlreadyLocked { pid });
    }
    match fs::read_to_string(path) {
        Ok(now) if now == content => {}
        Ok(_) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    warn!(pid, path = %path.display(), "reclaiming stale cache lock");
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn parse_pid(path: &Path, content: &str) -> CacheResult<u32> {
    if content.len() > MAX_LOCK_LEN {
        return Err(CacheError::LockFile(format!(
            "{} should be at most {MAX_LOCK_LEN} bytes",
            path.display()
        )));
    }
    content
        .trim()
        .parse()
        .map_err(|_| CacheError::LockFile(format!("{} does not hold a pid", path.display())))
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs the permission and existence checks only.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Elsewhere the advisory lock taken in `reclaim` is the liveness check.
#[cfg(not(unix))]
fn process_alive(pid: u32) -> bool {
    pid == std::process::id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    #[test]
    fn second_acquire_fails_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);

        let lock = LockFile::acquire(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            std::process::id().to_string()
        );
        match LockFile::acquire(&path) {
            Err(CacheError::AlreadyLocked { pid }) => assert_eq!(pid, std::process::id()),
            other => panic!("expected AlreadyLocked, got {other:?}"),
        }

        drop(lock);
        assert!(!path.exists());
        LockFile::acquire(&path).unwrap();
    }

    #[test]
    fn concurrent_acquire_has_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        let start = Arc::new(Barrier::new(8));

        let results: Vec<_> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    let start = Arc::clone(&start);
                    let path = &path;
                    s.spawn(move || {
                        start.wait();
                        LockFile::acquire(path)
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        // beyond any pid_max
        fs::write(&path, "999999999").unwrap();
        let lock = LockFile::acquire(&path).unwrap();
        assert_eq!(lock.path(), path);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn held_lock_is_kept_whatever_its_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        fs::write(&path, "999999999").unwrap();
        let holder = File::open(&path).unwrap();
        holder.try_lock_exclusive().unwrap();

        assert!(matches!(
            LockFile::acquire(&path),
            Err(CacheError::AlreadyLocked { pid: 999999999 })
        ));
        FileExt::unlock(&holder).unwrap();
        drop(holder);
        LockFile::acquire(&path).unwrap();
    }

    #[test]
    fn malformed_lock_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE);
        fs::write(&path, "12345678901").unwrap();
        assert!(matches!(LockFile::acquire(&path), Err(CacheError::LockFile(_))));
        fs::write(&path, "").unwrap();
        assert!(matches!(LockFile::acquire(&path), Err(CacheError::LockFile(_))));
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn liveness_follows_the_process_table() {
        assert!(process_alive(std::process::id()));
        assert!(!process_alive(999_999_999));
        assert!(!process_alive(0));
        assert!(!process_alive(u32::MAX));
    }
}
