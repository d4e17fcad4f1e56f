//! On-disk layout of a working root and its test cases.
//!
//! ```text
//! <root>/
//!   pagecompare-hash.json          variant registry
//!   pagecompare-diff.json          last compare manifest
//!   <test case>/
//!     build/                       build tool output
//!     pagecompare-reference/<hash>/page images
//!     pagecompare-comparison/<hash>/page images
//!     pagecompare-result/<hash>/   difference rasters
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use pagecompare_core::{HashId, RunMode};

use crate::error::RunError;

/// Registry file name at the working root.
pub const REGISTRY_FILE: &str = "pagecompare-hash.json";

/// Manifest file name at the working root.
pub const MANIFEST_FILE: &str = "pagecompare-diff.json";

/// Build tool output folder inside a test case.
pub const BUILD_DIR: &str = "build";

/// One of the per-test-case image folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSet {
    /// Pages rendered by a reference run.
    Reference,
    /// Pages rendered by a compare run.
    Comparison,
    /// Difference rasters written by a compare run.
    Result,
}

impl ArtifactSet {
    /// All sets, in the order they are produced.
    pub const ALL: [Self; 3] = [Self::Reference, Self::Comparison, Self::Result];

    /// Folder name inside a test case.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Reference => "pagecompare-reference",
            Self::Comparison => "pagecompare-comparison",
            Self::Result => "pagecompare-result",
        }
    }

    /// The set a building mode renders into, if any.
    #[must_use]
    pub const fn rendered_by(mode: RunMode) -> Option<Self> {
        match mode {
            RunMode::Reference => Some(Self::Reference),
            RunMode::Compare => Some(Self::Comparison),
            RunMode::View | RunMode::Clean => None,
        }
    }
}

/// A test case directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TestCase {
    path: PathBuf,
}

impl TestCase {
    /// Wrap a test case directory.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The test case directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name, for log messages.
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Build tool output folder.
    #[must_use]
    pub fn build_dir(&self) -> PathBuf {
        self.path.join(BUILD_DIR)
    }

    /// Root of one artifact set.
    #[must_use]
    pub fn set_dir(&self, set: ArtifactSet) -> PathBuf {
        self.path.join(set.dir_name())
    }

    /// Folder holding one variant's images within an artifact set.
    #[must_use]
    pub fn variant_dir(&self, set: ArtifactSet, id: &HashId) -> PathBuf {
        self.set_dir(set).join(id)
    }

    /// Remove the given transient folders. Missing folders are fine.
    ///
    /// # Errors
    ///
    /// Returns the first removal error other than "not found", with the
    /// offending path.
    pub fn remove_outputs(&self, build: bool, sets: &[ArtifactSet]) -> Result<(), (PathBuf, io::Error)> {
        let dirs = build
            .then(|| self.build_dir())
            .into_iter()
            .chain(sets.iter().map(|&s| self.set_dir(s)));
        for dir in dirs {
            remove_dir_if_present(&dir).map_err(|e| (dir, e))?;
        }
        Ok(())
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// List the test cases under `root`: every immediate, non-hidden
/// subdirectory, sorted by name.
///
/// # Errors
///
/// Returns [`RunError::Io`] if `root` cannot be read.
pub fn discover_test_cases(root: &Path) -> Result<Vec<TestCase>, RunError> {
    let io_err = |source| RunError::Io {
        path: root.to_path_buf(),
        source,
    };
    let mut cases = Vec::new();
    for entry in fs::read_dir(root).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type().map_err(io_err)?.is_dir() {
            cases.push(TestCase::new(entry.path()));
        }
    }
    cases.sort();
    Ok(cases)
}

/// Sorted names of the regular files directly inside `dir`.
///
/// A missing directory has no files.
///
/// # Errors
///
/// Returns any error other than "not found" from reading `dir`.
pub fn list_files(dir: &Path) -> io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Remove every test case's transient output and, unless `keep_state`,
/// the registry and manifest files. Source content is never touched.
///
/// Returns the number of test cases visited.
///
/// # Errors
///
/// Returns [`RunError::Io`] if the root cannot be listed or a folder or
/// state file cannot be removed.
pub fn clean(root: &Path, keep_state: bool) -> Result<usize, RunError> {
    let cases = discover_test_cases(root)?;
    for case in &cases {
        debug!("cleaning {case}");
        case.remove_outputs(true, &ArtifactSet::ALL)
            .map_err(|(path, source)| RunError::Io { path, source })?;
    }
    if !keep_state {
        for name in [REGISTRY_FILE, MANIFEST_FILE] {
            let path = root.join(name);
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(RunError::Io { path, source }),
            }
        }
    }
    Ok(cases.len())
}

fn remove_dir_if_present(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
