//! File locking and atomic writes for the local fallback store.
//!
//! The per-identity task file may be read and rewritten by several tz
//! processes at once (a command in one terminal, a live viewer in another),
//! so every rewrite happens under an exclusive flock on a sibling `.lock`
//! file and lands via temp-file + rename.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Retry interval while waiting for a contended lock
const LOCK_RETRY_INTERVAL_MS: u64 = 50;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // Windows surfaces sharing violations as "Other"; treat as contention.
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// A file lock guard that releases the lock when dropped
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire an exclusive lock with a timeout, creating the lock file
    /// if needed.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock { file });
                }
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => {
                    return Err(Error::Io(e));
                }
            }
        }
    }

    /// Try to acquire a lock without waiting.
    ///
    /// Returns `Ok(None)` if another process holds it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FileLock { file })),
            Err(e) if is_lock_contended(&e) => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Atomically replace a file's contents.
///
/// Writes to a temp file in the same directory and renames it over the
/// target, so readers see either the old or the new contents, never a
/// partial write. Does NOT lock; wrap in [`LockedFile`] for cross-process
/// coordination.
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|err| Error::Io(err.error))?;

    Ok(())
}

/// A read-modify-write session on a file, held under its sibling lock.
///
/// 1. Acquire lock on `<path>.lock`
/// 2. `read` the current contents
/// 3. `write` the replacement atomically
/// 4. Lock released on drop
pub struct LockedFile {
    path: PathBuf,
    _lock: FileLock,
}

impl LockedFile {
    pub fn open(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let lock_path = PathBuf::from(format!("{}.lock", path.display()));
        let lock = FileLock::acquire(&lock_path, timeout_ms)?;
        Ok(LockedFile { path, _lock: lock })
    }

    /// Current contents, or `None` if the file does not exist yet.
    pub fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::Io(err)),
        }
    }

    /// Atomically replace the contents while the lock is held.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        write_atomic(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn lock_excludes_second_holder_until_dropped() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("tasks.json.lock");

        let lock = FileLock::acquire(&lock_path, 1000).unwrap();
        assert!(FileLock::try_acquire(&lock_path).unwrap().is_none());

        drop(lock);
        assert!(FileLock::try_acquire(&lock_path).unwrap().is_some());
    }

    #[test]
    fn lock_timeout_reports_lock_failed() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("tasks.json.lock");

        let _held = FileLock::acquire(&lock_path, 1000).unwrap();
        match FileLock::acquire(&lock_path, 50) {
            Err(Error::LockFailed(reported)) => assert_eq!(reported, lock_path),
            Err(other) => panic!("expected LockFailed, got {other}"),
            Ok(_) => panic!("expected LockFailed, got a lock"),
        }
    }

    #[test]
    fn atomic_write_replaces_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");

        write_atomic(&path, b"{\"tasks\":[]}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"tasks\":[]}");

        write_atomic(&path, b"{\"tasks\":[1]}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"tasks\":[1]}");
    }

    #[test]
    fn locked_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");

        let session = LockedFile::open(&path, 1000).unwrap();
        assert!(session.read().unwrap().is_none());
        session.write(b"first").unwrap();
        assert_eq!(session.read().unwrap().unwrap(), b"first");
    }

    #[test]
    fn concurrent_writers_serialize() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.json");

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(threads);
        for idx in 0..threads {
            let barrier = Arc::clone(&barrier);
            let in_section = Arc::clone(&in_section);
            let max_concurrent = Arc::clone(&max_concurrent);
            let path = path.clone();

            handles.push(thread::spawn(move || {
                barrier.wait();
                let session = LockedFile::open(&path, 2000).unwrap();

                let current = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                let _ = max_concurrent.fetch_max(current, Ordering::SeqCst);

                session.write(format!("writer-{idx}").as_bytes()).unwrap();
                thread::sleep(Duration::from_millis(5));

                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("writer-"));
    }
}
