//! Shared types for pagecompare: output formats, run modes, and the
//! run configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::variant::VariantDescriptor;

/// Re-export `RgbImage` so downstream crates can pass difference
/// rasters around without depending on `image` directly.
pub use image::RgbImage;

/// Re-export `RgbaImage` for decoded reference/comparison pages.
pub use image::RgbaImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Document output format produced by the build tool.
///
/// The serialized names are part of the registry file format and feed
/// into variant fingerprints, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OutputType {
    /// Paginated PDF, rasterized one image per page.
    #[serde(rename = "pdf")]
    Pdf,
    /// Chunked HTML, one image per HTML file at a given width.
    #[serde(rename = "html")]
    Html,
    /// Single-file HTML at a given width.
    #[serde(rename = "single-html")]
    SingleHtml,
    /// EPUB, rendered per contained XHTML document at a given width.
    #[serde(rename = "epub")]
    Epub,
}

impl OutputType {
    /// All supported output types, in their canonical order.
    pub const ALL: [Self; 4] = [Self::Pdf, Self::Html, Self::SingleHtml, Self::Epub];

    /// The canonical lowercase name (`pdf`, `html`, `single-html`, `epub`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
            Self::SingleHtml => "single-html",
            Self::Epub => "epub",
        }
    }

    /// Whether this type is rasterized at a configurable width.
    #[must_use]
    pub const fn is_html_family(self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownOutputType(s.to_string()))
    }
}

/// Top-level operating mode. Exactly one is active per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// Build and render the reference image set.
    Reference,
    /// Build and render the comparison set, then diff against the reference.
    Compare,
    /// Load the results of the last compare run.
    View,
    /// Remove transient output from every test case.
    Clean,
}

impl RunMode {
    /// Whether this mode drives test cases through the worker pool.
    #[must_use]
    pub const fn builds(self) -> bool {
        matches!(self, Self::Reference | Self::Compare)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reference => "reference",
            Self::Compare => "compare",
            Self::View => "view",
            Self::Clean => "clean",
        })
    }
}

/// Configuration for a reference or compare run.
///
/// Fields are public; call [`RunConfig::validate`] before handing a
/// hand-assembled config to the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Output formats to build and render.
    pub formats: Vec<OutputType>,

    /// Raster widths in pixels for the HTML-family formats. Each width
    /// yields a separate variant.
    pub html_widths: Vec<u32>,

    /// Raster resolution handed to the PDF renderer.
    ///
    /// Not part of the variant descriptor: changing it between the
    /// reference and compare runs is reported as pixel differences.
    pub pdf_dpi: u32,

    /// Wall-clock limit for one build invocation, in seconds.
    pub build_timeout_secs: u64,

    /// Wall-clock limit for one render invocation, in seconds.
    pub render_timeout_secs: u64,

    /// Worker count override. `None` uses one worker per CPU, capped
    /// at the number of test cases.
    pub jobs: Option<usize>,
}

impl RunConfig {
    /// Default raster width for the HTML-family formats.
    pub const DEFAULT_HTML_WIDTH: u32 = 1280;

    /// Default PDF raster resolution.
    pub const DEFAULT_PDF_DPI: u32 = 100;

    /// Default per-invocation timeout for external tools.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

    /// Build timeout as a [`Duration`].
    #[must_use]
    pub const fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// Render timeout as a [`Duration`].
    #[must_use]
    pub const fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    /// Every variant this configuration renders.
    ///
    /// PDF contributes a single width-less variant; each HTML-family
    /// format contributes one variant per configured width.
    #[must_use]
    pub fn variants(&self) -> Vec<VariantDescriptor> {
        let mut variants: Vec<VariantDescriptor> = Vec::new();
        for &output in &self.formats {
            let widths: Vec<Option<u32>> = if output.is_html_family() {
                self.html_widths.iter().copied().map(Some).collect()
            } else {
                vec![None]
            };
            for width in widths {
                let descriptor = VariantDescriptor::new(output, width);
                if !variants.contains(&descriptor) {
                    variants.push(descriptor);
                }
            }
        }
        variants
    }

    /// Merge the formats and widths of previously registered variants
    /// into this configuration, keeping the existing order and
    /// appending new entries.
    pub fn merge_known_variants<'a>(
        &mut self,
        known: impl IntoIterator<Item = &'a VariantDescriptor>,
    ) {
        for descriptor in known {
            if !self.formats.contains(&descriptor.output) {
                self.formats.push(descriptor.output);
            }
            if let Some(width) = descriptor.width
                && !self.html_widths.contains(&width)
            {
                self.html_widths.push(width);
            }
        }
    }

    /// Check the configuration for values the pool cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoFormats`] if no format is selected,
    /// [`ConfigError::NoWidths`] if an HTML-family format is selected
    /// without any width, [`ConfigError::ZeroWidth`] for a zero width,
    /// [`ConfigError::ZeroTimeout`] for a zero timeout, and
    /// [`ConfigError::ZeroJobs`] for an explicit zero worker count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }
        if self.formats.iter().any(|t| t.is_html_family()) && self.html_widths.is_empty() {
            return Err(ConfigError::NoWidths);
        }
        if self.html_widths.contains(&0) {
            return Err(ConfigError::ZeroWidth);
        }
        if self.build_timeout_secs == 0 || self.render_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.jobs == Some(0) {
            return Err(ConfigError::ZeroJobs);
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            formats: vec![OutputType::Pdf],
            html_widths: vec![Self::DEFAULT_HTML_WIDTH],
            pdf_dpi: Self::DEFAULT_PDF_DPI,
            build_timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            render_timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            jobs: None,
        }
    }
}

/// Errors from building or validating a [`RunConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A format name that is not one of `pdf`, `html`, `single-html`, `epub`.
    #[error("unknown output type: {0:?}")]
    UnknownOutputType(String),

    /// No output format selected.
    #[error("no output format selected")]
    NoFormats,

    /// An HTML-family format is selected but no raster width is configured.
    #[error("HTML output selected without any raster width")]
    NoWidths,

    /// A raster width of zero.
    #[error("raster width must be positive")]
    ZeroWidth,

    /// A timeout of zero seconds.
    #[error("timeouts must be positive")]
    ZeroTimeout,

    /// An explicit worker count of zero.
    #[error("worker count must be positive")]
    ZeroJobs,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn output_type_names_round_trip() {
        for t in OutputType::ALL {
            assert_eq!(t.as_str().parse::<OutputType>().unwrap(), t);
            assert_eq!(
                serde_json::to_string(&t).unwrap(),
                format!("\"{}\"", t.as_str())
            );
        }
    }

    #[test]
    fn unknown_output_type_is_rejected() {
        assert_eq!(
            "docx".parse::<OutputType>(),
            Err(ConfigError::UnknownOutputType("docx".to_string()))
        );
    }

    #[test]
    fn only_pdf_is_width_less() {
        assert!(!OutputType::Pdf.is_html_family());
        assert!(OutputType::Html.is_html_family());
        assert!(OutputType::SingleHtml.is_html_family());
        assert!(OutputType::Epub.is_html_family());
    }

    #[test]
    fn default_config_is_valid_pdf_only() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.variants(), vec![VariantDescriptor::new(OutputType::Pdf, None)]);
    }

    #[test]
    fn variants_expand_widths_for_html_family() {
        let config = RunConfig {
            formats: vec![OutputType::Pdf, OutputType::Html, OutputType::Epub],
            html_widths: vec![800, 1280],
            ..RunConfig::default()
        };
        let variants = config.variants();
        assert_eq!(variants.len(), 5);
        assert_eq!(variants[0], VariantDescriptor::new(OutputType::Pdf, None));
        assert_eq!(variants[1], VariantDescriptor::new(OutputType::Html, Some(800)));
        assert_eq!(variants[4], VariantDescriptor::new(OutputType::Epub, Some(1280)));
    }

    #[test]
    fn merge_known_variants_appends_new_formats_and_widths() {
        let mut config = RunConfig::default();
        let known = [
            VariantDescriptor::new(OutputType::Pdf, None),
            VariantDescriptor::new(OutputType::Html, Some(640)),
            VariantDescriptor::new(OutputType::Html, Some(1280)),
        ];
        config.merge_known_variants(&known);
        assert_eq!(config.formats, vec![OutputType::Pdf, OutputType::Html]);
        assert_eq!(config.html_widths, vec![1280, 640]);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let no_formats = RunConfig {
            formats: vec![],
            ..RunConfig::default()
        };
        assert_eq!(no_formats.validate(), Err(ConfigError::NoFormats));

        let no_widths = RunConfig {
            formats: vec![OutputType::Html],
            html_widths: vec![],
            ..RunConfig::default()
        };
        assert_eq!(no_widths.validate(), Err(ConfigError::NoWidths));

        let zero_width = RunConfig {
            html_widths: vec![0],
            ..RunConfig::default()
        };
        assert_eq!(zero_width.validate(), Err(ConfigError::ZeroWidth));

        let zero_timeout = RunConfig {
            render_timeout_secs: 0,
            ..RunConfig::default()
        };
        assert_eq!(zero_timeout.validate(), Err(ConfigError::ZeroTimeout));

        let zero_jobs = RunConfig {
            jobs: Some(0),
            ..RunConfig::default()
        };
        assert_eq!(zero_jobs.validate(), Err(ConfigError::ZeroJobs));
    }

    #[test]
    fn config_json_fills_missing_fields_with_defaults() {
        let config: RunConfig = serde_json::from_str(r#"{"formats":["html"]}"#).unwrap();
        assert_eq!(config.formats, vec![OutputType::Html]);
        assert_eq!(config.html_widths, vec![RunConfig::DEFAULT_HTML_WIDTH]);
        assert_eq!(config.pdf_dpi, RunConfig::DEFAULT_PDF_DPI);
    }
}
