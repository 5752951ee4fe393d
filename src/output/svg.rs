//! Flamegraph SVG writer.

use crate::flamegraph::format_bytes;
use crate::output::fs::{prepare_path, write_replacing};
use crate::utils::error::OutputError;
use log::info;
use std::io::Write;
use std::path::Path;

/// Write a rendered flamegraph to `output_path`
///
/// The content must be a single `<svg>` document; anything else is refused
/// so a failed render never replaces a good file.
///
/// # Errors
/// * `OutputError::InvalidContent` - content is not an SVG document
/// * `OutputError::InvalidPath` - path is empty or a directory
/// * `OutputError::WriteFailed` - I/O error during write
pub fn write_svg(svg_content: &str, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    let document = svg_content.trim();
    if !document.starts_with("<svg") || !document.ends_with("</svg>") {
        return Err(OutputError::InvalidContent("flamegraph is not an <svg> document".to_string()));
    }
    prepare_path(output_path, "svg")?;

    info!("Writing flamegraph to: {}", output_path.display());
    let size = write_replacing(output_path, |writer| {
        writer.write_all(svg_content.as_bytes())?;
        Ok(())
    })?;

    info!(
        "Flamegraph written ({}, {} frames)",
        format_bytes(size),
        document.matches("class=\"frame\"").count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const VALID_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
  <rect x="0" y="0" width="100" height="100" fill="red"/>
</svg>"#;

    #[test]
    fn test_write_svg() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        write_svg(VALID_SVG, path).unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), VALID_SVG);
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested_path = temp_dir.path().join("nested/dirs/retention.svg");

        write_svg(VALID_SVG, &nested_path).unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_rejects_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            write_svg(VALID_SVG, temp_dir.path()),
            Err(OutputError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_non_svg_content_keeps_previous_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("retention.svg");
        write_svg(VALID_SVG, &path).unwrap();

        let result = write_svg("<html><body>oops</body></html>", &path);

        assert!(matches!(result, Err(OutputError::InvalidContent(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), VALID_SVG);
    }

    #[test]
    fn test_truncated_svg_is_rejected() {
        let truncated = &VALID_SVG[..VALID_SVG.len() - 6];
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("retention.svg");

        assert!(write_svg(truncated, &path).is_err());
        assert!(!path.exists());
    }
}
