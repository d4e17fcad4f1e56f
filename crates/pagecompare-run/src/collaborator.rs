//! External build and render steps.
//!
//! The pool only needs two narrow operations: build a test case's
//! documents, and rasterize one variant into a folder. Both are traits
//! so tests and embedders can supply in-process implementations; the
//! command-backed ones here shell out with a timeout.
//!
//! # Strategy pattern
//!
//! [`Builder`] and [`Renderer`] are object-safe and `Sync`, so a single
//! instance is shared by reference across all workers.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use pagecompare_core::{OutputType, RunConfig, VariantDescriptor};

use crate::error::CollaboratorError;
use crate::layout::TestCase;
use crate::process::run_with_timeout;

/// Builds the documents of one test case into its build folder.
pub trait Builder: Sync {
    /// Build `test_case` for the given output formats.
    ///
    /// # Errors
    ///
    /// Any error fails this test case only.
    fn build(&self, test_case: &TestCase, formats: &[OutputType]) -> Result<(), CollaboratorError>;
}

/// One rasterization request.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    /// Test case whose build output is rendered.
    pub test_case: &'a TestCase,
    /// Variant being rendered.
    pub variant: &'a VariantDescriptor,
    /// Folder named by the variant's hash; one image per page goes here.
    pub output_dir: &'a Path,
    /// Raster resolution for PDF pages.
    pub pdf_dpi: u32,
}

/// Rasterizes a test case's build output for one variant.
pub trait Renderer: Sync {
    /// Render `job`, writing page images into `job.output_dir`.
    ///
    /// # Errors
    ///
    /// Any error fails this test case only.
    fn render(&self, job: &RenderJob<'_>) -> Result<(), CollaboratorError>;
}

/// Name of the build log inside a test case's build folder.
pub const BUILD_LOG: &str = ".pagecompare-build.log";

/// Name of the render log inside a test case's build folder.
pub const RENDER_LOG: &str = ".pagecompare-render.log";

/// Runs a build program once per format inside the test case folder:
/// `<program> <args...> <format>`.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    /// Program to run.
    pub program: String,
    /// Arguments placed before the format name.
    pub args: Vec<String>,
    /// Limit per invocation.
    pub timeout: Duration,
}

impl CommandBuilder {
    /// Default build program.
    pub const DEFAULT_PROGRAM: &'static str = "daps";

    /// Default arguments for [`Self::DEFAULT_PROGRAM`].
    pub const DEFAULT_ARGS: &'static [&'static str] = &["--force"];

    /// The default build program with the configured timeout.
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            program: Self::DEFAULT_PROGRAM.to_string(),
            args: Self::DEFAULT_ARGS.iter().map(ToString::to_string).collect(),
            timeout: config.build_timeout(),
        }
    }
}

impl Builder for CommandBuilder {
    fn build(&self, test_case: &TestCase, formats: &[OutputType]) -> Result<(), CollaboratorError> {
        let log = test_case.build_dir().join(BUILD_LOG);
        for format in formats {
            let mut command = Command::new(&self.program);
            command
                .args(&self.args)
                .arg(format.as_str())
                .current_dir(test_case.path());
            run_with_timeout(&mut command, self.timeout, Some(&log))?;
        }
        Ok(())
    }
}

/// Runs a render program once per variant:
/// `<program> <args...> --type <t> [--width <w>] [--dpi <d>] --source <build> --output <dir>`.
///
/// `--width` is passed for HTML-family variants and `--dpi` for PDF.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    /// Program to run.
    pub program: String,
    /// Arguments placed before the generated ones.
    pub args: Vec<String>,
    /// Limit per invocation.
    pub timeout: Duration,
}

impl CommandRenderer {
    /// Default render program.
    pub const DEFAULT_PROGRAM: &'static str = "pagecompare-render";

    /// The default render program with the configured timeout.
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            program: Self::DEFAULT_PROGRAM.to_string(),
            args: Vec::new(),
            timeout: config.render_timeout(),
        }
    }

    fn command(&self, job: &RenderJob<'_>) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--type")
            .arg(job.variant.output.as_str());
        match job.variant.width {
            Some(width) => command.arg("--width").arg(width.to_string()),
            None => command.arg("--dpi").arg(job.pdf_dpi.to_string()),
        };
        command
            .arg("--source")
            .arg(job.test_case.build_dir())
            .arg("--output")
            .arg(job.output_dir)
            .current_dir(job.test_case.path());
        command
    }
}

impl Renderer for CommandRenderer {
    fn render(&self, job: &RenderJob<'_>) -> Result<(), CollaboratorError> {
        let log: PathBuf = job.test_case.build_dir().join(RENDER_LOG);
        run_with_timeout(&mut self.command(job), self.timeout, Some(&log))
    }
}
