//! Compare a test case's comparison pages against its reference pages.
//!
//! For every variant known to the registry the engine checks, in
//! order: that a reference folder exists, that both sides hold the same
//! number of pages, and then each page pixel by pixel. Findings are
//! appended to the shared [`ResultStore`]; each variant's outcome is
//! also returned so callers can log or test it.

use std::fs;
use std::path::Path;

use log::{info, warn};
use pagecompare_core::diff::{self, DiffError, PageOutcome};
use pagecompare_core::{DiffRecord, HashId, PageCountMismatch, ResultStore, VariantRegistry};

use crate::layout::{self, ArtifactSet, TestCase};

/// What the engine concluded for one variant of one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantOutcome {
    /// No reference folder; nothing recorded.
    MissingReference,
    /// Page counts differ; one mismatch recorded, pages not compared.
    CountMismatch,
    /// Pages compared.
    Compared {
        /// Pages that differ (one diff record each).
        changed: usize,
        /// Pages that could not be decoded or compared (one mismatch
        /// record each).
        anomalies: usize,
    },
}

/// Compare every registered variant of `test_case`.
///
/// Iterates a snapshot of the registry, so no registry lock is held
/// while images are decoded.
pub fn compare_test_case(
    test_case: &TestCase,
    registry: &VariantRegistry,
    results: &ResultStore,
) -> Vec<(HashId, VariantOutcome)> {
    registry
        .snapshot()
        .into_keys()
        .map(|id| {
            let outcome = compare_variant(test_case, &id, results);
            (id, outcome)
        })
        .collect()
}

/// Compare one variant of `test_case`.
pub fn compare_variant(test_case: &TestCase, id: &HashId, results: &ResultStore) -> VariantOutcome {
    let reference_dir = test_case.variant_dir(ArtifactSet::Reference, id);
    let comparison_dir = test_case.variant_dir(ArtifactSet::Comparison, id);

    if !reference_dir.is_dir() {
        info!("{}: no reference images for variant {id}", test_case.name());
        return VariantOutcome::MissingReference;
    }

    let reference_files = list_or_warn(&reference_dir);
    let comparison_files = list_or_warn(&comparison_dir);
    let (reference_count, comparison_count) = (reference_files.len(), comparison_files.len());

    if reference_count != comparison_count && reference_count != 0 {
        warn!(
            "differing number of result images for {}: {reference_count} reference, {comparison_count} comparison",
            reference_dir.display()
        );
        results.push_mismatch(PageCountMismatch {
            reference: reference_dir,
            reference_count,
            comparison_count,
        });
        return VariantOutcome::CountMismatch;
    }

    let diff_dir = test_case.variant_dir(ArtifactSet::Result, id);
    let mut changed = 0;
    let mut anomalies = 0;
    for name in &reference_files {
        let reference = reference_dir.join(name);
        let comparison = comparison_dir.join(name);
        // Diff rasters are always lossless, whatever the page format.
        let diff_path = diff_dir.join(name).with_extension("png");

        let outcome = compare_page(&reference, &comparison).and_then(|outcome| match outcome {
            PageOutcome::Identical => Ok(None),
            PageOutcome::Changed(raster) => {
                write_diff(&diff_dir, &diff_path, &raster)?;
                Ok(Some(diff::changed_pixel_count(&raster)))
            }
        });

        match outcome {
            Ok(None) => {}
            Ok(Some(pixels)) => {
                info!("image {} has changed ({pixels} pixels)", comparison.display());
                results.push_diff(DiffRecord {
                    reference,
                    comparison,
                    diff: diff_path,
                });
                changed += 1;
            }
            Err(e) => {
                warn!("cannot compare {}: {e}", reference.display());
                results.push_mismatch(PageCountMismatch {
                    reference,
                    reference_count,
                    comparison_count,
                });
                anomalies += 1;
            }
        }
    }

    VariantOutcome::Compared { changed, anomalies }
}

fn compare_page(reference: &Path, comparison: &Path) -> Result<PageOutcome, DiffError> {
    let reference = diff::decode_page(&read_page(reference)?)?;
    let comparison = diff::decode_page(&read_page(comparison)?)?;
    diff::diff_pages(&reference, &comparison)
}

fn read_page(path: &Path) -> Result<Vec<u8>, DiffError> {
    fs::read(path).map_err(|e| DiffError::Decode(image::ImageError::IoError(e)))
}

fn write_diff(dir: &Path, path: &Path, raster: &image::RgbImage) -> Result<(), DiffError> {
    fs::create_dir_all(dir).map_err(image::ImageError::IoError)?;
    raster.save(path)?;
    Ok(())
}

fn list_or_warn(dir: &Path) -> Vec<String> {
    layout::list_files(dir).unwrap_or_else(|e| {
        warn!("cannot list {}: {e}", dir.display());
        Vec::new()
    })
}
