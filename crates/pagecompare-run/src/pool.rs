//! Fixed-size pool of worker threads draining the test case queue.
//!
//! Each worker repeatedly claims a test case, resets its transient
//! output, builds it, renders every configured variant into a folder
//! named by the variant's hash, and in compare mode diffs it against
//! the reference. A failure in any of those steps is logged and
//! confined to that test case.
//!
//! Workers share the [`RunContext`] by reference inside a
//! [`std::thread::scope`], so the pool returns only after every worker
//! has observed an empty queue.

use std::fs;
use std::thread;

use log::{error, info, warn};
use pagecompare_core::{ResultStore, RunConfig, RunMode, VariantRegistry};

use crate::collaborator::{Builder, RenderJob, Renderer};
use crate::engine;
use crate::error::{RunError, TestCaseError};
use crate::layout::{ArtifactSet, TestCase};
use crate::queue::TestCaseQueue;

/// Everything a worker needs, constructed once per run.
pub struct RunContext<'a> {
    /// Which set is being produced. Must be a building mode.
    pub mode: RunMode,
    /// Formats, widths, and limits.
    pub config: &'a RunConfig,
    /// Shared variant registry.
    pub registry: &'a VariantRegistry,
    /// Shared result accumulator (only written in compare mode).
    pub results: &'a ResultStore,
    /// Build step.
    pub builder: &'a dyn Builder,
    /// Render step.
    pub renderer: &'a dyn Renderer,
}

/// A test case that did not make it through the pipeline.
#[derive(Debug)]
pub struct Failure {
    /// The failed test case.
    pub test_case: TestCase,
    /// Why it failed.
    pub error: TestCaseError,
}

/// Summary of one pool run.
#[derive(Debug, Default)]
pub struct PoolReport {
    /// Number of worker threads started.
    pub workers: usize,
    /// Test cases that completed every step.
    pub completed: usize,
    /// Test cases that failed, with their errors.
    pub failures: Vec<Failure>,
    /// Workers that panicked. Their current test case is lost; other
    /// test cases are unaffected.
    pub panicked: usize,
}

impl PoolReport {
    fn absorb(&mut self, other: Self) {
        self.completed += other.completed;
        self.failures.extend(other.failures);
        self.panicked += other.panicked;
    }
}

/// Number of workers for `queued` test cases: one per CPU (or the
/// configured override), never more than there is work.
#[must_use]
pub fn worker_count(config: &RunConfig, queued: usize) -> usize {
    config.jobs.unwrap_or_else(num_cpus::get).min(queued)
}

/// Drain `queue` with a pool of workers and wait for all of them.
///
/// # Errors
///
/// Returns [`RunError::Spawn`] if a worker thread cannot be created.
/// Workers already started still drain the queue before this returns.
pub fn run_pool(ctx: &RunContext<'_>, queue: &TestCaseQueue) -> Result<PoolReport, RunError> {
    let workers = worker_count(ctx.config, queue.len());
    info!("creating {workers} worker threads");

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        let mut spawn_error = None;
        for n in 0..workers {
            let name = format!("worker-{n}");
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn_scoped(scope, move || worker_loop(ctx, queue, &name));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    spawn_error = Some(e);
                    break;
                }
            }
        }

        let mut report = PoolReport {
            workers: handles.len(),
            ..PoolReport::default()
        };
        for handle in handles {
            match handle.join() {
                Ok(worker_report) => report.absorb(worker_report),
                Err(_) => {
                    error!("a worker thread panicked");
                    report.panicked += 1;
                }
            }
        }
        info!("all workers finished");

        match spawn_error {
            Some(e) => Err(RunError::Spawn(e)),
            None => Ok(report),
        }
    })
}

fn worker_loop(ctx: &RunContext<'_>, queue: &TestCaseQueue, name: &str) -> PoolReport {
    let mut report = PoolReport::default();
    while let Some(test_case) = queue.try_dequeue() {
        info!("{name} now working on {}", test_case.name());
        match process_test_case(ctx, &test_case) {
            Ok(()) => report.completed += 1,
            Err(error) => {
                error!("{name}: {} failed: {error}", test_case.name());
                report.failures.push(Failure { test_case, error });
            }
        }
    }
    info!("{name} finished");
    report
}

/// Reset, build, render, and (in compare mode) diff one test case.
///
/// # Errors
///
/// Returns the first step that failed; later steps are skipped.
pub fn process_test_case(ctx: &RunContext<'_>, test_case: &TestCase) -> Result<(), TestCaseError> {
    let Some(set) = ArtifactSet::rendered_by(ctx.mode) else {
        warn!("{} mode does not build test cases", ctx.mode);
        return Ok(());
    };

    let mut reset = vec![set];
    if ctx.mode == RunMode::Compare {
        reset.push(ArtifactSet::Result);
    }
    test_case
        .remove_outputs(true, &reset)
        .map_err(|(path, source)| TestCaseError::Io { path, source })?;

    ctx.builder
        .build(test_case, &ctx.config.formats)
        .map_err(TestCaseError::Build)?;

    for variant in ctx.config.variants() {
        let id = ctx.registry.register(&variant);
        let output_dir = test_case.variant_dir(set, &id);
        fs::create_dir_all(&output_dir).map_err(|source| TestCaseError::Io {
            path: output_dir.clone(),
            source,
        })?;
        let job = RenderJob {
            test_case,
            variant: &variant,
            output_dir: &output_dir,
            pdf_dpi: ctx.config.pdf_dpi,
        };
        ctx.renderer
            .render(&job)
            .map_err(|source| TestCaseError::Render {
                variant: variant.to_string(),
                source,
            })?;
    }

    if ctx.mode == RunMode::Compare {
        engine::compare_test_case(test_case, ctx.registry, ctx.results);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_is_capped_by_work() {
        let config = RunConfig::default();
        assert_eq!(worker_count(&config, 0), 0);
        assert_eq!(worker_count(&config, 1), 1);

        let config = RunConfig {
            jobs: Some(3),
            ..RunConfig::default()
        };
        assert_eq!(worker_count(&config, 10), 3);
        assert_eq!(worker_count(&config, 2), 2);
    }
}
