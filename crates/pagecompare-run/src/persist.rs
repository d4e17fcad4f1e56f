//! Loading and saving the registry and manifest files.
//!
//! Writes go to a sibling temporary file that is renamed over the
//! target, so a failed write never leaves a truncated file behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pagecompare_core::{ResultManifest, VariantRegistry};

use crate::error::RunError;

/// Merge the registry persisted at `path` into `registry`.
///
/// A missing file, or one holding only whitespace, is an empty
/// registry. Returns the number of new entries.
///
/// # Errors
///
/// Returns [`RunError::Io`] if the file exists but cannot be read and
/// [`RunError::Registry`] if it is malformed.
pub fn load_registry(path: &Path, registry: &VariantRegistry) -> Result<usize, RunError> {
    let Some(json) = read_optional(path)? else {
        return Ok(0);
    };
    if json.trim().is_empty() {
        return Ok(0);
    }
    registry
        .merge_json(&json)
        .map_err(|source| RunError::Registry {
            path: path.to_path_buf(),
            source,
        })
}

/// Write the full registry to `path`, replacing any previous file.
///
/// # Errors
///
/// Returns [`RunError::Registry`] if serialization fails and
/// [`RunError::Persist`] if the file cannot be written.
pub fn save_registry(path: &Path, registry: &VariantRegistry) -> Result<(), RunError> {
    let json = registry.to_json().map_err(|source| RunError::Registry {
        path: path.to_path_buf(),
        source,
    })?;
    write_replacing(path, &json)
}

/// Load the manifest at `path`, or `None` if no compare run has
/// persisted one yet.
///
/// # Errors
///
/// Returns [`RunError::Io`] if the file exists but cannot be read and
/// [`RunError::Manifest`] if it is malformed.
pub fn load_manifest(path: &Path) -> Result<Option<ResultManifest>, RunError> {
    let Some(json) = read_optional(path)? else {
        return Ok(None);
    };
    ResultManifest::from_json(&json)
        .map(Some)
        .map_err(|source| RunError::Manifest {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `manifest` to `path`, replacing any previous file.
///
/// # Errors
///
/// Returns [`RunError::Manifest`] if serialization fails and
/// [`RunError::Persist`] if the file cannot be written.
pub fn save_manifest(path: &Path, manifest: &ResultManifest) -> Result<(), RunError> {
    let json = manifest.to_json().map_err(|source| RunError::Manifest {
        path: path.to_path_buf(),
        source,
    })?;
    write_replacing(path, &json)
}

fn read_optional(path: &Path) -> Result<Option<String>, RunError> {
    match fs::read_to_string(path) {
        Ok(json) => Ok(Some(json)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RunError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_replacing(path: &Path, contents: &str) -> Result<(), RunError> {
    let persist_err = |source| RunError::Persist {
        path: path.to_path_buf(),
        source,
    };
    let tmp = temp_sibling(path);
    fs::write(&tmp, contents).map_err(persist_err)?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        persist_err(e)
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use pagecompare_core::{DiffRecord, OutputType, PageCountMismatch, VariantDescriptor};

    use super::*;

    #[test]
    fn missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = VariantRegistry::new();
        assert_eq!(load_registry(&dir.path().join("hash.json"), &registry).unwrap(), 0);
        assert!(registry.is_empty());
        assert!(load_manifest(&dir.path().join("diff.json")).unwrap().is_none());
    }

    #[test]
    fn blank_registry_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hash.json");
        for contents in ["", "  \n"] {
            fs::write(&path, contents).unwrap();
            let registry = VariantRegistry::new();
            assert_eq!(load_registry(&path, &registry).unwrap(), 0);
            assert!(registry.is_empty());
        }

        fs::write(&path, "{").unwrap();
        assert!(matches!(
            load_registry(&path, &VariantRegistry::new()),
            Err(RunError::Registry { .. })
        ));
    }

    #[test]
    fn registry_survives_a_save_load_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hash.json");
        let registry = VariantRegistry::new();
        registry.register(&VariantDescriptor::new(OutputType::Pdf, None));
        registry.register(&VariantDescriptor::new(OutputType::Html, Some(1024)));
        save_registry(&path, &registry).unwrap();

        let loaded = VariantRegistry::new();
        assert_eq!(load_registry(&path, &loaded).unwrap(), 2);
        assert_eq!(loaded.snapshot(), registry.snapshot());
    }

    #[test]
    fn save_replaces_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diff.json");
        let first = ResultManifest {
            diffs: vec![DiffRecord {
                reference: PathBuf::from("r"),
                comparison: PathBuf::from("c"),
                diff: PathBuf::from("d"),
            }],
            mismatches: vec![],
        };
        let second = ResultManifest {
            diffs: vec![],
            mismatches: vec![PageCountMismatch {
                reference: PathBuf::from("r/"),
                reference_count: 2,
                comparison_count: 1,
            }],
        };
        save_manifest(&path, &first).unwrap();
        save_manifest(&path, &second).unwrap();
        assert_eq!(load_manifest(&path).unwrap(), Some(second));
        assert!(!dir.path().join("diff.json.tmp").exists());
    }

    #[test]
    fn malformed_files_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{").unwrap();
        assert!(matches!(
            load_registry(&path, &VariantRegistry::new()),
            Err(RunError::Registry { .. })
        ));
        assert!(matches!(load_manifest(&path), Err(RunError::Manifest { .. })));
    }

    #[test]
    fn unwritable_destination_is_a_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("hash.json");
        assert!(matches!(
            save_registry(&path, &VariantRegistry::new()),
            Err(RunError::Persist { .. })
        ));
    }
}
