//! Small filesystem helpers shared by the stores.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use speedsign_core::error::{Result, SignError};
use tempfile::NamedTempFile;

/// Atomically replace `path` with `contents`, creating parent directories if
/// needed.
///
/// Writes to a uniquely named sibling temp file and renames it over the
/// target, so a reader sees either the old or the new document, never a
/// partial one, and concurrent writers never share a temp file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let wrap = |source: std::io::Error| SignError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    let parent = parent_dir(path);
    std::fs::create_dir_all(parent).map_err(wrap)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(wrap)?;
    tmp.write_all(contents).map_err(wrap)?;
    tmp.as_file().sync_all().map_err(wrap)?;
    tmp.persist(path).map_err(|e| wrap(e.error))?;
    Ok(())
}

/// Sibling lock file guarding `path`.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Run `f` while holding an exclusive advisory lock on [`lock_path`].
///
/// The lock is taken on the OS level, so it serialises separate processes
/// (the sign loop and a `--clear` run) as well as separate handles in one
/// process. It is released when `f` returns.
pub fn with_file_lock<T>(path: &Path, f: impl FnOnce() -> T) -> Result<T> {
    let lock_file = lock_path(path);
    let wrap = |source: std::io::Error| SignError::FileWrite {
        path: lock_file.clone(),
        source,
    };

    std::fs::create_dir_all(parent_dir(path)).map_err(wrap)?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_file)
        .map_err(wrap)?;

    let mut lock = fd_lock::RwLock::new(file);
    let _guard = lock.write().map_err(wrap)?;
    Ok(f())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Read `path` to a string, mapping "not found" to `Ok(None)`.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SignError::FileRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_parents() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("nested").join("dir").join("file.json");

        write_atomic(&path, b"[]").expect("write");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("file.json");

        write_atomic(&path, b"old").expect("first write");
        write_atomic(&path, b"new").expect("second write");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        let names: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("file.json")]);
    }

    #[test]
    fn test_concurrent_writers_never_share_a_temp_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("file.json");

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let path = path.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        write_atomic(&path, format!("[{t}]").as_bytes()).expect("write");
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(["[0]", "[1]", "[2]", "[3]"].contains(&content.as_str()));
    }

    #[test]
    fn test_file_lock_serialises_sections() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("file.json");
        let counter = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        with_file_lock(&path, || {
                            let inside = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                            assert_eq!(inside, 0, "two holders inside the lock");
                            std::thread::sleep(std::time::Duration::from_micros(200));
                            counter.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                        })
                        .expect("lock");
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert!(lock_path(&path).exists());
    }

    #[test]
    fn test_read_optional_missing_is_none() {
        let tmp = TempDir::new().expect("tempdir");
        let read = read_optional(&tmp.path().join("absent.json")).expect("read");
        assert!(read.is_none());
    }

    #[test]
    fn test_read_optional_directory_is_error() {
        let tmp = TempDir::new().expect("tempdir");
        assert!(read_optional(tmp.path()).is_err());
    }
}
