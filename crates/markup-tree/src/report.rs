//! File-backed conversion of analysis reports keyed by repository identifier.
//!
//! Layout inside a report directory:
//! - `<id>.xml`  markup report written by the analysis tool
//! - `<id>.json` normalized tree written by [`convert_report`]

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::convert::normalize_str;
use crate::error::{ConvertError, Result};
use crate::tree::NormalizedDocument;

/// Paths of the raw and normalized payloads for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub markup: PathBuf,
    pub normalized: PathBuf,
}

impl ReportPaths {
    pub fn new(dir: &Path, id: &str) -> Self {
        Self {
            markup: dir.join(format!("{id}.xml")),
            normalized: dir.join(format!("{id}.json")),
        }
    }
}

/// Convert a markup file and write the normalized JSON to `output`.
pub fn convert_file(input: &Path, output: &Path) -> Result<NormalizedDocument> {
    let markup = read_payload(input)?;
    let document = normalize_str(&markup)?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|source| ConvertError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(output, document.to_json_pretty()?).map_err(|source| ConvertError::Io {
        path: output.to_path_buf(),
        source,
    })?;

    debug!(input = %input.display(), output = %output.display(), "Converted markup report");
    Ok(document)
}

/// Convert `<dir>/<id>.xml` into `<dir>/<id>.json`.
pub fn convert_report(dir: &Path, id: &str) -> Result<NormalizedDocument> {
    let paths = ReportPaths::new(dir, id);
    convert_file(&paths.markup, &paths.normalized)
}

/// Load a previously written normalized tree.
pub fn load_normalized(path: &Path) -> Result<NormalizedDocument> {
    let text = read_payload(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    NormalizedDocument::from_value(&value)
}

fn read_payload(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConvertError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConvertError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_convert_report_writes_json_next_to_markup() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("demo.xml"),
            r#"<checkstyle version="10"><file name="A.java"/></checkstyle>"#,
        )
        .unwrap();

        let document = convert_report(dir.path(), "demo").unwrap();
        assert_eq!(document.root_tag, "checkstyle");

        let reloaded = load_normalized(&dir.path().join("demo.json")).unwrap();
        assert_eq!(reloaded, document);
    }

    #[test]
    fn test_missing_report_is_not_found() {
        let dir = tempdir().unwrap();
        let err = convert_report(dir.path(), "absent").unwrap_err();
        assert!(err.is_not_found());
        assert!(!dir.path().join("absent.json").exists());
    }

    #[test]
    fn test_malformed_report_does_not_write_output() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.xml"), "<checkstyle><file></checkstyle>").unwrap();

        let err = convert_report(dir.path(), "bad").unwrap_err();
        assert!(matches!(err, ConvertError::Parse { .. }));
        assert!(!dir.path().join("bad.json").exists());
    }
}
