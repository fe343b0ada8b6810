//! `bundle.toml`: the bundle manifest.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::errors::BundleError;

static SEMVER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("semver regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BundleFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDef {
    pub name: String,
    /// `MAJOR.MINOR.PATCH`
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl BundleFile {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: Some(PackageDef {
                name: name.into(),
                version: version.into(),
                author: Vec::new(),
                description: String::new(),
            }),
        }
    }

    pub fn decode(content: &str) -> Result<Self> {
        toml::from_str(content).context("error parsing bundle.toml content")
    }

    pub fn encode(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to encode bundle.toml file")
    }

    /// The `[package]` table, or an error naming what is missing.
    pub fn package(&self) -> Result<&PackageDef> {
        self.package
            .as_ref()
            .ok_or_else(|| BundleError::InvalidManifest("missing [package] table".into()).into())
    }

    /// Check required fields and the version format. Must pass before a
    /// bundle is built or installed.
    pub fn validate(&self) -> Result<()> {
        let package = self.package()?;

        if package.name.trim().is_empty() {
            return Err(BundleError::InvalidManifest("package.name is required".into()).into());
        }
        // the name becomes a directory under the install root
        if package.name == "."
            || package.name.contains("..")
            || package.name.contains(['/', '\\', '\0'])
        {
            return Err(BundleError::InvalidManifest(format!(
                "package.name '{}' must be a single path segment",
                package.name
            ))
            .into());
        }
        if !SEMVER_REGEX.is_match(&package.version) {
            return Err(BundleError::InvalidManifest(format!(
                "package.version '{}' is not in MAJOR.MINOR.PATCH form",
                package.version
            ))
            .into());
        }
        Ok(())
    }
}
