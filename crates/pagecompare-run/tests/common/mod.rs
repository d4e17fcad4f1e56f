//! In-process collaborators and working-root fixtures.

#![allow(dead_code, clippy::unwrap_used)]

use std::fs;
use std::path::Path;

use image::{Rgba, RgbaImage};
use pagecompare_core::OutputType;
use pagecompare_run::{Builder, CollaboratorError, RenderJob, Renderer, TestCase};

/// Pages written per variant.
pub const PAGES: u32 = 3;

/// Test case whose build always fails.
pub const BROKEN: &str = "broken";

/// Writes a marker file into `build/`; fails for [`BROKEN`].
pub struct FakeBuilder;

impl Builder for FakeBuilder {
    fn build(&self, test_case: &TestCase, formats: &[OutputType]) -> Result<(), CollaboratorError> {
        if test_case.name() == BROKEN {
            return Err(CollaboratorError::Other("simulated build failure".into()));
        }
        let build = test_case.build_dir();
        fs::create_dir_all(&build).map_err(|e| CollaboratorError::Other(e.to_string()))?;
        let names: Vec<&str> = formats.iter().map(|f| f.as_str()).collect();
        fs::write(build.join("formats.txt"), names.join("\n"))
            .map_err(|e| CollaboratorError::Other(e.to_string()))
    }
}

/// Writes [`PAGES`] white pages per variant. When `altered` names a
/// test case, one pixel of its `page-2.png` is black.
#[derive(Default)]
pub struct FakeRenderer {
    pub altered: Option<String>,
    pub pages: Option<u32>,
}

impl FakeRenderer {
    pub fn altering(test_case: &str) -> Self {
        Self {
            altered: Some(test_case.to_string()),
            pages: None,
        }
    }

    pub fn with_pages(pages: u32) -> Self {
        Self {
            altered: None,
            pages: Some(pages),
        }
    }
}

impl Renderer for FakeRenderer {
    fn render(&self, job: &RenderJob<'_>) -> Result<(), CollaboratorError> {
        let width = job.variant.width.unwrap_or(40).min(64);
        let alter = self.altered.as_deref() == Some(job.test_case.name().as_str());
        for page in 1..=self.pages.unwrap_or(PAGES) {
            let mut image = RgbaImage::from_pixel(width, 48, Rgba([255, 255, 255, 255]));
            if alter && page == 2 {
                image.put_pixel(10, 20, Rgba([0, 0, 0, 255]));
            }
            image
                .save(job.output_dir.join(format!("page-{page}.png")))
                .map_err(|e| CollaboratorError::Other(e.to_string()))?;
        }
        Ok(())
    }
}

/// Create a working root with the named (empty) test case folders.
pub fn working_root(cases: &[&str]) -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    for case in cases {
        fs::create_dir(root.path().join(case)).unwrap();
    }
    root
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
