use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Readers never observe a half-written rule or skill file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// True when `path` exists with exactly `data` as its content.
pub fn content_matches(path: &Path, data: &[u8]) -> Result<bool> {
    match std::fs::read(path) {
        Ok(existing) => Ok(existing == data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Remove a file if present. Returns true if something was deleted.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Remove `dir` and its empty ancestors up to (not including) `stop`.
pub fn prune_empty_dirs(dir: &Path, stop: &Path) -> Result<()> {
    let mut current = dir.to_path_buf();
    while current != stop && current.starts_with(stop) {
        let empty = std::fs::read_dir(&current)
            .map(|mut it| it.next().is_none())
            .unwrap_or(false);
        if !empty {
            break;
        }
        std::fs::remove_dir(&current)?;
        if !current.pop() {
            break;
        }
    }
    Ok(())
}
