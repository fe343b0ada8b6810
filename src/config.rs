use anyhow::{Context, Result};
use log::{debug, info};
use std::path::PathBuf;

use crate::bundle::{BundleLayout, LOCK_FILE_VERSION};
use crate::runtime::Runtime;

/// Environment variable that overrides the default install root.
pub const ROOT_ENV: &str = "BPM_ROOT";

/// Linker store directory under the root.
pub const INDEX_DIR: &str = ".index";

/// Everything the loaders, builder and installer need to know about the
/// local setup. Passed explicitly; there is no process-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory bundles are installed under.
    pub root: PathBuf,
    pub layout: BundleLayout,
    /// Glob patterns, relative to the bundle source, skipped when building.
    pub ignore: Vec<String>,
    pub lock_version: i64,
}

impl Config {
    /// Resolve the install root: `root` argument, then `BPM_ROOT`, then
    /// `<home>/.bpm`.
    #[tracing::instrument(skip(runtime))]
    pub fn new<R: Runtime>(runtime: &R, root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(path) => path,
            None => default_root(runtime)?,
        };
        info!("Using bundle root: {}", root.display());

        Ok(Self::with_root(root))
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            layout: BundleLayout::default(),
            ignore: default_ignore(),
            lock_version: LOCK_FILE_VERSION,
        }
    }

    /// Where the linker persists indexed modules.
    pub fn index_dir(&self) -> PathBuf {
        self.root.join(INDEX_DIR)
    }

    /// Directory a bundle version is installed into.
    pub fn install_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(version)
    }
}

pub fn default_ignore() -> Vec<String> {
    vec![
        ".git/**".to_string(),
        "**/.DS_Store".to_string(),
        "*.tar.gz".to_string(),
    ]
}

#[tracing::instrument(skip(runtime))]
fn default_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    if let Ok(root) = runtime.env_var(ROOT_ENV)
        && !root.is_empty()
    {
        debug!("Using {} from environment", ROOT_ENV);
        return Ok(PathBuf::from(root));
    }

    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory")?;
    Ok(home_dir.join(".bpm"))
}
