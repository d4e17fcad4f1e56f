//! pagecompare-run: runs the build, render, and compare pipeline over a
//! working root of test cases.
//!
//! [`run`] is the single entry point. It dispatches on [`RunMode`]:
//!
//! - **Reference / Compare**: discover test cases, load the persisted
//!   variant registry, drain a [`TestCaseQueue`] with a worker pool, and
//!   persist the registry (and in compare mode the result manifest).
//! - **View**: load the last manifest and optionally write annotated
//!   copies of the changed pages.
//! - **Clean**: remove every test case's transient output.
//!
//! The build and render steps are supplied as [`Builder`] and
//! [`Renderer`] implementations so the pipeline can be driven by
//! external programs ([`CommandBuilder`], [`CommandRenderer`]) or by
//! in-process fakes.

pub mod collaborator;
pub mod engine;
pub mod error;
pub mod layout;
pub mod persist;
pub mod pool;
pub mod process;
pub mod queue;
pub mod view;

use std::path::PathBuf;

use log::info;
use pagecompare_core::{ClusterConfig, ResultManifest, ResultStore, RunConfig, RunMode, VariantRegistry};

pub use collaborator::{Builder, CommandBuilder, CommandRenderer, RenderJob, Renderer};
pub use engine::VariantOutcome;
pub use error::{CollaboratorError, RunError, TestCaseError};
pub use layout::{ArtifactSet, TestCase};
pub use pool::{Failure, PoolReport, RunContext};
pub use queue::TestCaseQueue;

/// What to run and where.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Working root whose subdirectories are test cases.
    pub root: PathBuf,
    /// Requested operation.
    pub mode: RunMode,
    /// Formats, widths, and limits for building modes.
    pub config: RunConfig,
    /// Add the formats and widths of previously registered variants
    /// to `config` before running.
    pub merge_known: bool,
    /// Clean mode: keep the registry and manifest files.
    pub keep_state: bool,
    /// View mode: write annotated changed pages into this folder.
    pub annotate: Option<PathBuf>,
}

impl RunOptions {
    /// Options for `mode` at `root` with the default configuration.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, mode: RunMode) -> Self {
        Self {
            root: root.into(),
            mode,
            config: RunConfig::default(),
            merge_known: false,
            keep_state: false,
            annotate: None,
        }
    }
}

/// Outcome of a successful [`run`].
#[derive(Debug)]
pub enum RunSummary {
    /// A reference run finished.
    Built {
        /// Per-test-case results.
        report: PoolReport,
        /// Variants in the persisted registry.
        registered: usize,
    },
    /// A compare run finished; `manifest` is what was persisted.
    Compared {
        /// Per-test-case results.
        report: PoolReport,
        /// Findings, sorted.
        manifest: ResultManifest,
    },
    /// A view run loaded the last manifest.
    Viewed {
        /// Findings of the last compare run.
        manifest: ResultManifest,
        /// Annotated pages written, if requested.
        annotated: Vec<PathBuf>,
    },
    /// View mode found no manifest to show.
    NothingToDo,
    /// A clean run finished.
    Cleaned {
        /// Test cases visited.
        test_cases: usize,
    },
}

/// Run one mode over `options.root`.
///
/// # Errors
///
/// Returns [`RunError::Config`] for an invalid configuration,
/// [`RunError::NoTestCases`] if a building or clean run finds no test
/// cases, and the errors of [`persist`] and [`layout`] for unreadable
/// or unwritable state. Failures of individual test cases are not errors;
/// they are reported in the [`PoolReport`].
pub fn run(
    options: &RunOptions,
    builder: &dyn Builder,
    renderer: &dyn Renderer,
) -> Result<RunSummary, RunError> {
    let root = &options.root;
    match options.mode {
        RunMode::Reference | RunMode::Compare => build_and_render(options, builder, renderer),
        RunMode::View => {
            let Some(manifest) = persist::load_manifest(&root.join(layout::MANIFEST_FILE))? else {
                info!("no compare results in {}; nothing to do", root.display());
                return Ok(RunSummary::NothingToDo);
            };
            let annotated = match &options.annotate {
                Some(dir) => view::write_annotated(&manifest, dir, &ClusterConfig::default())?,
                None => Vec::new(),
            };
            Ok(RunSummary::Viewed { manifest, annotated })
        }
        RunMode::Clean => {
            let test_cases = layout::clean(root, options.keep_state)?;
            if test_cases == 0 {
                return Err(RunError::NoTestCases(root.clone()));
            }
            info!("cleaned {test_cases} test cases");
            Ok(RunSummary::Cleaned { test_cases })
        }
    }
}

fn build_and_render(
    options: &RunOptions,
    builder: &dyn Builder,
    renderer: &dyn Renderer,
) -> Result<RunSummary, RunError> {
    let root = &options.root;
    let registry_path = root.join(layout::REGISTRY_FILE);

    let registry = VariantRegistry::new();
    let loaded = persist::load_registry(&registry_path, &registry)?;
    info!("loaded {loaded} known variants");

    let mut config = options.config.clone();
    if options.merge_known {
        config.merge_known_variants(registry.snapshot().values());
    }
    config.validate()?;

    let test_cases = layout::discover_test_cases(root)?;
    if test_cases.is_empty() {
        return Err(RunError::NoTestCases(root.clone()));
    }
    info!("found {} test cases", test_cases.len());
    let queue: TestCaseQueue = test_cases.into_iter().collect();

    let results = ResultStore::new();
    let ctx = RunContext {
        mode: options.mode,
        config: &config,
        registry: &registry,
        results: &results,
        builder,
        renderer,
    };
    let report = pool::run_pool(&ctx, &queue)?;
    info!(
        "{} test cases completed, {} failed",
        report.completed,
        report.failures.len()
    );

    persist::save_registry(&registry_path, &registry)?;

    if options.mode == RunMode::Compare {
        info!(
            "{} changed pages, {} page count mismatches",
            results.diff_count(),
            results.mismatch_count()
        );
        let manifest = results.into_manifest().normalized();
        persist::save_manifest(&root.join(layout::MANIFEST_FILE), &manifest)?;
        Ok(RunSummary::Compared { report, manifest })
    } else {
        Ok(RunSummary::Built {
            report,
            registered: registry.len(),
        })
    }
}
