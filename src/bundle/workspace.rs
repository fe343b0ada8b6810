//! `bpm.work`: groups several bundles under one development root.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BpmWorkFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WorkspaceDef {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub author: Vec<String>,
    /// Member package paths.
    #[serde(default)]
    pub packages: Vec<String>,
}

impl BpmWorkFile {
    pub fn decode(content: &str) -> Result<Self> {
        toml::from_str(content).context("error parsing bpm.work content")
    }

    pub fn encode(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to encode bpm.work file")
    }
}
