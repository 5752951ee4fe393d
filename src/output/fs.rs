//! File plumbing shared by the report and SVG writers.
//!
//! Outputs are written next to their destination and renamed into place,
//! so an interrupted run never leaves a truncated report behind.

use crate::utils::error::OutputError;
use log::debug;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Check `path` and create its parent directories
pub(crate) fn prepare_path(path: &Path, extension: &str) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }
    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }
    if path.extension().map_or(true, |ext| ext != extension) {
        debug!("{} does not end in .{}", path.display(), extension);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}

/// Sibling path the content is staged in before the rename
fn staging_path(path: &Path) -> Result<PathBuf, OutputError> {
    let mut name: OsString = path
        .file_name()
        .ok_or_else(|| OutputError::InvalidPath(format!("No file name: {}", path.display())))?
        .to_os_string();
    name.push(".partial");
    Ok(path.with_file_name(name))
}

/// Write through `fill` into a staging file, then move it over `path`
///
/// Returns the size of the written file in bytes.
pub(crate) fn write_replacing<F>(path: &Path, fill: F) -> Result<u64, OutputError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), OutputError>,
{
    let staging = staging_path(path)?;
    if let Err(e) = fill_staging(&staging, fill) {
        let _ = std::fs::remove_file(&staging);
        return Err(e);
    }

    std::fs::rename(&staging, path)?;
    Ok(std::fs::metadata(path).map(|m| m.len()).unwrap_or(0))
}

fn fill_staging<F>(staging: &Path, fill: F) -> Result<(), OutputError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), OutputError>,
{
    let mut writer = BufWriter::new(File::create(staging)?);
    fill(&mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_path_rejects_empty_and_directories() {
        assert!(prepare_path(Path::new(""), "json").is_err());

        let temp_dir = tempfile::tempdir().unwrap();
        assert!(prepare_path(temp_dir.path(), "json").is_err());
    }

    #[test]
    fn test_prepare_path_creates_parents() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("a/b/report.json");

        prepare_path(&nested, "json").unwrap();

        assert!(nested.parent().unwrap().is_dir());
        assert!(!nested.exists());
    }

    #[test]
    fn test_write_replacing_leaves_no_staging_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out.txt");
        std::fs::write(&path, "old contents").unwrap();

        let size = write_replacing(&path, |w| Ok(w.write_all(b"new")?)).unwrap();

        assert_eq!(size, 3);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert!(!temp_dir.path().join("out.txt.partial").exists());
    }

    #[test]
    fn test_failed_fill_keeps_previous_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out.txt");
        std::fs::write(&path, "old contents").unwrap();

        let result = write_replacing(&path, |w| {
            w.write_all(b"half")?;
            Err(OutputError::InvalidContent("stop".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old contents");
        assert!(!temp_dir.path().join("out.txt.partial").exists());
    }
}
