//! Compare-run results: diff records, page-count mismatches, and the
//! lock-guarded store workers append them to.
//!
//! The persisted manifest is a two-element JSON array
//! `[diffRecords, pageCountMismatches]` where each diff record is
//! `[referencePath, comparisonPath, diffPath]` and each mismatch is
//! `[referencePath, referenceCount, comparisonCount]`.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// One page whose comparison raster differs from its reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(PathBuf, PathBuf, PathBuf)", into = "(PathBuf, PathBuf, PathBuf)")]
pub struct DiffRecord {
    /// Reference image.
    pub reference: PathBuf,
    /// Comparison image.
    pub comparison: PathBuf,
    /// Difference raster written by the compare step.
    pub diff: PathBuf,
}

impl From<(PathBuf, PathBuf, PathBuf)> for DiffRecord {
    fn from((reference, comparison, diff): (PathBuf, PathBuf, PathBuf)) -> Self {
        Self {
            reference,
            comparison,
            diff,
        }
    }
}

impl From<DiffRecord> for (PathBuf, PathBuf, PathBuf) {
    fn from(record: DiffRecord) -> Self {
        (record.reference, record.comparison, record.diff)
    }
}

/// Reference and comparison disagree on the number of pages for a
/// variant, or a page could not be decoded or compared.
///
/// For a count disagreement `reference` is the variant's reference
/// folder; for a per-page anomaly it is the offending reference image.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(PathBuf, usize, usize)", into = "(PathBuf, usize, usize)")]
pub struct PageCountMismatch {
    /// Reference folder or image.
    pub reference: PathBuf,
    /// Number of reference files for the variant.
    pub reference_count: usize,
    /// Number of comparison files for the variant.
    pub comparison_count: usize,
}

impl From<(PathBuf, usize, usize)> for PageCountMismatch {
    fn from((reference, reference_count, comparison_count): (PathBuf, usize, usize)) -> Self {
        Self {
            reference,
            reference_count,
            comparison_count,
        }
    }
}

impl From<PageCountMismatch> for (PathBuf, usize, usize) {
    fn from(m: PageCountMismatch) -> Self {
        (m.reference, m.reference_count, m.comparison_count)
    }
}

/// The results of a completed compare run.
///
/// Entry order reflects worker scheduling and carries no meaning; use
/// [`ResultManifest::normalized`] before comparing two manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(Vec<DiffRecord>, Vec<PageCountMismatch>)",
    into = "(Vec<DiffRecord>, Vec<PageCountMismatch>)"
)]
pub struct ResultManifest {
    /// Changed pages.
    pub diffs: Vec<DiffRecord>,
    /// Count disagreements and per-page anomalies.
    pub mismatches: Vec<PageCountMismatch>,
}

impl From<(Vec<DiffRecord>, Vec<PageCountMismatch>)> for ResultManifest {
    fn from((diffs, mismatches): (Vec<DiffRecord>, Vec<PageCountMismatch>)) -> Self {
        Self { diffs, mismatches }
    }
}

impl From<ResultManifest> for (Vec<DiffRecord>, Vec<PageCountMismatch>) {
    fn from(m: ResultManifest) -> Self {
        (m.diffs, m.mismatches)
    }
}

impl ResultManifest {
    /// Returns `true` if the run found neither diffs nor mismatches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty() && self.mismatches.is_empty()
    }

    /// Sort both collections so manifests compare as sets.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.diffs.sort();
        self.mismatches.sort();
        self
    }

    /// Parse a persisted manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if `json` is not a manifest.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the manifest with both collections sorted, so equal
    /// result sets persist to identical files.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if a path is not valid UTF-8.
    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string(&self.clone().normalized())?)
    }
}

/// Errors from reading or writing a manifest.
#[derive(Debug, thiserror::Error)]
#[error("malformed result manifest: {0}")]
pub struct ManifestError(#[from] serde_json::Error);

/// Thread-safe accumulator for one run's results.
#[derive(Debug, Default)]
pub struct ResultStore {
    inner: Mutex<ResultManifest>,
}

impl ResultStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a changed page.
    pub fn push_diff(&self, record: DiffRecord) {
        self.lock().diffs.push(record);
    }

    /// Append a count disagreement or per-page anomaly.
    pub fn push_mismatch(&self, mismatch: PageCountMismatch) {
        self.lock().mismatches.push(mismatch);
    }

    /// Number of diff records so far.
    #[must_use]
    pub fn diff_count(&self) -> usize {
        self.lock().diffs.len()
    }

    /// Number of mismatch records so far.
    #[must_use]
    pub fn mismatch_count(&self) -> usize {
        self.lock().mismatches.len()
    }

    /// A copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> ResultManifest {
        self.lock().clone()
    }

    /// Consume the store and return its manifest.
    #[must_use]
    pub fn into_manifest(self) -> ResultManifest {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, ResultManifest> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
