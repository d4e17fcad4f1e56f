//! pagecompare-core: variant registry, pixel diffing, and change
//! clustering (sans-IO).
//!
//! A compare run correlates reference and comparison page images by
//! variant: each combination of output type and raster width is
//! fingerprinted into a [`HashId`] that names the folder holding its
//! pages. This crate provides the fingerprinting and the shared
//! [`VariantRegistry`], the per-page [`diff`](diff::diff_pages), the
//! [`ResultStore`] that workers append findings to, and the
//! [`cluster`] step that turns a difference raster into boxes for
//! display.
//!
//! This crate has **no filesystem or process dependencies** -- it works
//! on in-memory rasters and JSON strings. Directory layout, external
//! tools, and the worker pool live in `pagecompare-run`.

pub mod annotate;
pub mod cluster;
pub mod diff;
pub mod manifest;
pub mod registry;
pub mod types;
pub mod variant;

pub use cluster::{BoundingBox, ClusterConfig};
pub use diff::{DiffError, PageOutcome};
pub use manifest::{DiffRecord, ManifestError, PageCountMismatch, ResultManifest, ResultStore};
pub use registry::{RegistryError, VariantRegistry};
pub use types::{ConfigError, Dimensions, OutputType, Point, RunConfig, RunMode};
pub use variant::{HashId, InvalidHashId, VariantDescriptor};

/// Locate and outline the changed regions of a page.
///
/// Clusters the nonzero pixels of `diff` and draws the resulting boxes
/// onto a copy of `comparison`. The boxes are a review aid; they do not
/// affect whether the page counts as changed.
#[must_use]
pub fn annotate_changes(
    comparison: &types::RgbaImage,
    diff: &types::RgbImage,
    config: &ClusterConfig,
) -> types::RgbaImage {
    let boxes = cluster::locate_changes(diff, config);
    annotate::outline_regions(comparison, &boxes)
}
