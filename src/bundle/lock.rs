//! `bundle.lock`: the durable record of the modules a bundle was built from.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Lock-file format version written by the builder.
pub const LOCK_FILE_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BundleLockFile {
    pub version: i64,
    #[serde(default)]
    pub modules: Vec<ModuleDef>,
}

/// One module present when the bundle was built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDef {
    /// Package path declared by the module.
    pub name: String,
    /// File path of the module.
    pub source: String,
    pub checksum: String,
    /// Import paths, as written in the module.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl BundleLockFile {
    pub fn decode(content: &str) -> Result<Self> {
        toml::from_str(content).context("error parsing bundle.lock content")
    }

    pub fn encode(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to encode bundle.lock file")
    }

    pub fn module(&self, name: &str) -> Option<&ModuleDef> {
        self.modules.iter().find(|m| m.name == name)
    }
}
