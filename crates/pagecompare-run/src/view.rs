//! Review helpers for a loaded manifest.
//!
//! The interactive viewer is external; this writes the same
//! information to disk: each changed comparison page with its regions
//! of change outlined.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use pagecompare_core::{ClusterConfig, DiffRecord, ResultManifest, annotate_changes};

use crate::error::RunError;

/// Write an annotated copy of every changed page in `manifest` to
/// `out_dir`, returning the files written.
///
/// Output files are named `<index>-<page file name>` in manifest order.
/// A record whose images cannot be read is skipped with a warning.
///
/// # Errors
///
/// Returns [`RunError::Io`] if `out_dir` cannot be created.
pub fn write_annotated(
    manifest: &ResultManifest,
    out_dir: &Path,
    config: &ClusterConfig,
) -> Result<Vec<PathBuf>, RunError> {
    fs::create_dir_all(out_dir).map_err(|source| RunError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for (index, record) in manifest.diffs.iter().enumerate() {
        let file_name = record
            .comparison
            .file_name()
            .map_or_else(|| "page.png".into(), |n| n.to_string_lossy().into_owned());
        let target = out_dir.join(format!("{index:04}-{file_name}"));
        match annotate_record(record, &target, config) {
            Ok(()) => {
                info!("annotated {}", target.display());
                written.push(target);
            }
            Err(e) => warn!("cannot annotate {}: {e}", record.comparison.display()),
        }
    }
    Ok(written)
}

fn annotate_record(record: &DiffRecord, target: &Path, config: &ClusterConfig) -> image::ImageResult<()> {
    let comparison = image::open(&record.comparison)?.to_rgba8();
    let diff = image::open(&record.diff)?.to_rgb8();
    annotate_changes(&comparison, &diff, config).save(target)
}

/// Human-readable listing of a manifest: changed images, then folders
/// whose page counts differ.
#[must_use]
pub fn report(manifest: &ResultManifest) -> String {
    let mut out = String::from("=== Changed Images ===\n\n");
    for record in &manifest.diffs {
        out.push_str(&record.reference.display().to_string());
        out.push('\n');
    }
    out.push_str("\n=== Differing Page Numbers ===\n\n");
    for mismatch in &manifest.mismatches {
        out.push_str(&format!(
            "{} ({} reference, {} comparison)\n",
            mismatch.reference.display(),
            mismatch.reference_count,
            mismatch.comparison_count
        ));
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use pagecompare_core::PageCountMismatch;
    use pagecompare_core::annotate::BOX_COLOR;

    use super::*;

    #[test]
    fn report_lists_both_sections() {
        let manifest = ResultManifest {
            diffs: vec![DiffRecord {
                reference: PathBuf::from("a/ref/p1.png"),
                comparison: PathBuf::from("a/cmp/p1.png"),
                diff: PathBuf::from("a/res/p1.png"),
            }],
            mismatches: vec![PageCountMismatch {
                reference: PathBuf::from("b/ref/h"),
                reference_count: 5,
                comparison_count: 3,
            }],
        };
        let text = report(&manifest);
        assert!(text.contains("a/ref/p1.png\n"));
        assert!(text.contains("b/ref/h (5 reference, 3 comparison)"));
        assert!(text.find("Changed").unwrap() < text.find("Differing").unwrap());
    }

    #[test]
    fn annotated_pages_are_written_and_unreadable_ones_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let comparison = dir.path().join("cmp.png");
        let diff = dir.path().join("diff.png");
        RgbaImage::from_pixel(80, 80, Rgba([255, 255, 255, 255]))
            .save(&comparison)
            .unwrap();
        let mut raster = RgbImage::new(80, 80);
        raster.put_pixel(40, 40, Rgb([255, 255, 255]));
        raster.save(&diff).unwrap();

        let manifest = ResultManifest {
            diffs: vec![
                DiffRecord {
                    reference: dir.path().join("ref.png"),
                    comparison: comparison.clone(),
                    diff,
                },
                DiffRecord {
                    reference: dir.path().join("gone.png"),
                    comparison: dir.path().join("gone.png"),
                    diff: dir.path().join("gone-diff.png"),
                },
            ],
            mismatches: vec![],
        };

        let out = dir.path().join("annotated");
        let written = write_annotated(&manifest, &out, &ClusterConfig::default()).unwrap();
        assert_eq!(written, vec![out.join("0000-cmp.png")]);

        let annotated = image::open(&written[0]).unwrap().to_rgba8();
        assert_eq!(*annotated.get_pixel(15, 40), BOX_COLOR);
        assert_eq!(*annotated.get_pixel(40, 40), Rgba([255, 255, 255, 255]));
    }
}
