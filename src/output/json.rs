//! Heap report reader and writer.
//!
//! Reports are checked for internal consistency before they reach disk:
//! no retainer may hold more than the reachable total, and a node never
//! retains less than it owns.

use crate::flamegraph::format_bytes;
use crate::output::fs::{prepare_path, write_replacing};
use crate::output::schema::{HeapReport, Retainer};
use crate::utils::config::REPORT_SCHEMA_VERSION;
use crate::utils::error::OutputError;
use log::{debug, info, warn};
use std::fs::File;
use std::path::Path;

/// Write a heap report as pretty JSON
///
/// # Errors
/// * `OutputError::InvalidContent` - the report contradicts itself
/// * `OutputError::InvalidPath` - path is empty, a directory, or its parent cannot be created
/// * `OutputError::WriteFailed` / `SerializationFailed` - I/O or serde errors
///
/// A failed write leaves any existing file at `output_path` untouched.
pub fn write_report(report: &HeapReport, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    check_report(report)?;
    prepare_path(output_path, "json")?;

    info!("Writing report to: {}", output_path.display());
    let size = write_replacing(output_path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, report)?;
        Ok(())
    })?;

    info!(
        "Report written ({}, {} retainers, {} reachable)",
        format_bytes(size),
        report.top_retainers.len(),
        format_bytes(report.total_bytes)
    );
    Ok(())
}

/// Serialize a report for stdout
pub fn report_to_string(report: &HeapReport) -> Result<String, OutputError> {
    check_report(report)?;
    Ok(serde_json::to_string_pretty(report)?)
}

/// Read a report back from disk
///
/// Reports from another schema version still load; a warning is logged.
pub fn read_report(input_path: impl AsRef<Path>) -> Result<HeapReport, OutputError> {
    let input_path = input_path.as_ref();
    debug!("Reading report from: {}", input_path.display());

    let report: HeapReport = serde_json::from_reader(File::open(input_path)?)?;
    if report.version != REPORT_SCHEMA_VERSION {
        warn!(
            "{} has schema version {}, expected {}",
            input_path.display(),
            report.version,
            REPORT_SCHEMA_VERSION
        );
    }

    debug!(
        "Report loaded: snapshot {}, {} objects, {}",
        report.snapshot,
        report.object_count,
        format_bytes(report.total_bytes)
    );
    Ok(report)
}

fn check_report(report: &HeapReport) -> Result<(), OutputError> {
    if report.version.is_empty() {
        return Err(OutputError::InvalidContent("missing schema version".to_string()));
    }

    let sections = [("top_retainers", &report.top_retainers), ("groups", &report.groups)];
    for (section, retainers) in sections {
        for retainer in retainers.iter() {
            check_retainer(section, retainer, report.total_bytes)?;
        }
    }
    if let Some(backtrace) = &report.backtrace {
        for retainer in &backtrace.path {
            check_retainer("backtrace", retainer, report.total_bytes)?;
        }
    }

    if let Some(filter) = &report.type_filter {
        if filter.retained_bytes > report.total_bytes {
            return Err(OutputError::InvalidContent(format!(
                "type filter '{}' retains {} of {} reachable bytes",
                filter.type_name, filter.retained_bytes, report.total_bytes
            )));
        }
    }
    Ok(())
}

fn check_retainer(section: &str, retainer: &Retainer, total_bytes: u64) -> Result<(), OutputError> {
    if retainer.exclusive_bytes > retainer.inclusive_bytes {
        return Err(OutputError::InvalidContent(format!(
            "{} entry for node {} owns {} bytes but retains only {}",
            section, retainer.node, retainer.exclusive_bytes, retainer.inclusive_bytes
        )));
    }
    if retainer.inclusive_bytes > total_bytes {
        return Err(OutputError::InvalidContent(format!(
            "{} entry for node {} retains {} of {} reachable bytes",
            section, retainer.node, retainer.inclusive_bytes, total_bytes
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::schema::{Diagnostics, TypeFilterSummary};
    use tempfile::NamedTempFile;

    fn create_test_report() -> HeapReport {
        HeapReport {
            version: REPORT_SCHEMA_VERSION.to_string(),
            snapshot: "heap.json".to_string(),
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            object_count: 3,
            root_count: 1,
            total_bytes: 72,
            grouped: false,
            weak_gc_handles: false,
            diagnostics: Diagnostics::default(),
            top_retainers: vec![Retainer {
                node: 2,
                kind: "object".to_string(),
                description: "Map @ 0x64".to_string(),
                exclusive_bytes: 40,
                inclusive_bytes: 72,
                percentage: 100.0,
            }],
            retained_by_type: vec![],
            groups: vec![],
            type_filter: None,
            backtrace: None,
        }
    }

    #[test]
    fn test_write_and_read_report() {
        let report = create_test_report();
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        write_report(&report, path).unwrap();
        let loaded = read_report(path).unwrap();

        assert_eq!(loaded.version, report.version);
        assert_eq!(loaded.total_bytes, 72);
        assert_eq!(loaded.top_retainers, report.top_retainers);
        assert!(loaded.type_filter.is_none());
    }

    #[test]
    fn test_optional_sections_are_omitted() {
        let text = report_to_string(&create_test_report()).unwrap();
        assert!(!text.contains("type_filter"));
        assert!(!text.contains("backtrace"));
        assert!(!text.contains("samples"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/report.json");

        write_report(&create_test_report(), &nested_path).unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_retainer_larger_than_heap_is_rejected() {
        let mut report = create_test_report();
        report.top_retainers[0].inclusive_bytes = 73;

        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.json");

        assert!(matches!(
            write_report(&report, &path),
            Err(OutputError::InvalidContent(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_exclusive_above_inclusive_is_rejected() {
        let mut report = create_test_report();
        report.top_retainers[0].exclusive_bytes = 80;
        assert!(matches!(
            report_to_string(&report),
            Err(OutputError::InvalidContent(_))
        ));
    }

    #[test]
    fn test_type_filter_larger_than_heap_is_rejected() {
        let mut report = create_test_report();
        report.type_filter = Some(TypeFilterSummary {
            type_name: "Map".to_string(),
            matched_nodes: 1,
            retained_bytes: 100,
            percentage: 138.9,
        });
        assert!(matches!(
            report_to_string(&report),
            Err(OutputError::InvalidContent(_))
        ));
    }

    #[test]
    fn test_rejected_report_keeps_previous_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("report.json");
        write_report(&create_test_report(), &path).unwrap();

        let mut broken = create_test_report();
        broken.version.clear();
        assert!(write_report(&broken, &path).is_err());

        assert_eq!(read_report(&path).unwrap().version, REPORT_SCHEMA_VERSION);
    }

    #[test]
    fn test_read_report_from_older_schema() {
        let mut report = create_test_report();
        report.version = "0.9.0".to_string();
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), serde_json::to_string(&report).unwrap()).unwrap();

        assert_eq!(read_report(temp_file.path()).unwrap().version, "0.9.0");
    }

    #[test]
    fn test_read_report_rejects_garbage() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "{ not json").unwrap();
        assert!(matches!(
            read_report(temp_file.path()),
            Err(OutputError::SerializationFailed(_))
        ));
    }
}
