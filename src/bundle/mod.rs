//! Value types describing a bundle's contents.
//!
//! # Structure
//!
//! - `manifest` - `bundle.toml` (name, version, authors)
//! - `lock` - `bundle.lock` (modules present at build time)
//! - `workspace` - `bpm.work` (multi-bundle development root)

mod lock;
mod manifest;
mod workspace;

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::module::RawModule;

pub use lock::{BundleLockFile, LOCK_FILE_VERSION, ModuleDef};
pub use manifest::{BundleFile, PackageDef};
pub use workspace::{BpmWorkFile, WorkspaceDef};

/// A distributable unit: modules plus manifest, lock and workspace metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
    /// Archive or repository name the bundle was read from.
    pub file_name: String,
    pub manifest: Option<BundleFile>,
    pub lock: Option<BundleLockFile>,
    pub workspace: Option<BpmWorkFile>,
    /// In-archive path -> module.
    pub modules: BTreeMap<String, RawModule>,
}

impl Bundle {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    /// The manifest, or an error naming the bundle that lacks one.
    pub fn manifest(&self) -> Result<&BundleFile> {
        self.manifest
            .as_ref()
            .with_context(|| format!("bundle '{}' has no bundle.toml", self.file_name))
    }

    /// `(name, version)` of a validated manifest.
    pub fn name_and_version(&self) -> Result<(&str, &str)> {
        let manifest = self.manifest()?;
        manifest.validate()?;
        let package = manifest.package()?;
        Ok((&package.name, &package.version))
    }
}

/// Fixed file names and extensions that make up a bundle on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLayout {
    pub manifest_file: String,
    pub lock_file: String,
    pub work_file: String,
    /// Module file extension, without the dot.
    pub module_ext: String,
    /// Archive suffix, with the dot.
    pub archive_ext: String,
}

impl Default for BundleLayout {
    fn default() -> Self {
        Self {
            manifest_file: "bundle.toml".into(),
            lock_file: "bundle.lock".into(),
            work_file: "bpm.work".into(),
            module_ext: "rego".into(),
            archive_ext: ".tar.gz".into(),
        }
    }
}

impl BundleLayout {
    pub fn is_module(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .is_some_and(|ext| ext == self.module_ext.as_str())
    }

    pub fn is_archive(&self, path: &str) -> bool {
        path.ends_with(&self.archive_ext)
    }

    /// Archive file name for a bundle called `name`: dots become underscores.
    pub fn archive_name(&self, name: &str) -> String {
        format!("{}{}", name.replace('.', "_"), self.archive_ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_classifies_modules() {
        let layout = BundleLayout::default();
        assert!(layout.is_module("policies/a.rego"));
        assert!(!layout.is_module("policies/a.rego.bak"));
        assert!(!layout.is_module("bundle.toml"));
        assert!(!layout.is_module("rego"));
    }

    #[test]
    fn test_archive_name_replaces_dots() {
        let layout = BundleLayout::default();
        assert_eq!(layout.archive_name("acme.authz"), "acme_authz.tar.gz");
        assert!(layout.is_archive("acme_authz.tar.gz"));
        assert!(!layout.is_archive("https://example.com/acme/authz.git"));
    }

    #[test]
    fn test_name_and_version_requires_valid_manifest() {
        let mut bundle = Bundle::new("acme.tar.gz");
        assert!(bundle.name_and_version().is_err());

        bundle.manifest = Some(BundleFile::new("acme", "1.0"));
        assert!(bundle.name_and_version().is_err());

        bundle.manifest = Some(BundleFile::new("acme", "1.0.0"));
        assert_eq!(bundle.name_and_version().unwrap(), ("acme", "1.0.0"));
    }
}
