//! Source tree -> `bundle.lock` -> `.tar.gz` archive.

use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::archive::TarGz;
use crate::bundle::{BundleLockFile, ModuleDef};
use crate::config::Config;
use crate::loader::walk_files;
use crate::module::{ModuleParser, RawModule};
use crate::runtime::Runtime;

/// What a build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub lock: BundleLockFile,
    pub lock_path: PathBuf,
    pub archive_path: PathBuf,
}

pub struct BundleBuilder<'a, R: Runtime, P: ModuleParser> {
    runtime: &'a R,
    parser: &'a P,
    config: &'a Config,
    archive: TarGz,
}

impl<'a, R: Runtime, P: ModuleParser> BundleBuilder<'a, R, P> {
    pub fn new(runtime: &'a R, parser: &'a P, config: &'a Config) -> Self {
        Self {
            runtime,
            parser,
            config,
            archive: TarGz,
        }
    }

    /// Re-derive the lock file from the modules under `source_dir`, write it
    /// next to them and pack the tree into `<dest_dir>/<archive_name>`.
    /// Compression runs last, so a failed build never leaves an archive
    /// under the final name.
    #[tracing::instrument(skip(self))]
    pub fn build(&self, source_dir: &Path, dest_dir: &Path, archive_name: &str) -> Result<BuildOutput> {
        let layout = &self.config.layout;
        let mut files = walk_files(self.runtime, source_dir, &self.config.ignore)
            .with_context(|| format!("Failed to walk {:?}", source_dir))?;

        let mut modules = Vec::new();
        for relative in files.iter().filter(|f| layout.is_module(f)) {
            let raw = self.runtime.read(&source_dir.join(relative))?;
            let module = RawModule::parse(self.parser, relative.clone(), raw)
                .with_context(|| format!("error parsing file contents of '{}'", relative))?;
            debug!("Found module {} ({})", module.package(), relative);
            modules.push(module_def(&module));
        }

        let lock = BundleLockFile {
            version: self.config.lock_version,
            modules,
        };
        let lock_path = source_dir.join(&layout.lock_file);
        self.write_lock(&lock_path, &lock)?;

        if !files.contains(&layout.lock_file) {
            files.push(layout.lock_file.clone());
            files.sort();
        }

        let archive_path = self
            .archive
            .compress(self.runtime, source_dir, &files, dest_dir, archive_name)
            .with_context(|| format!("Failed to compress {:?}", source_dir))?;

        info!(
            "Built {} with {} modules",
            archive_path.display(),
            lock.modules.len()
        );
        Ok(BuildOutput {
            lock,
            lock_path,
            archive_path,
        })
    }

    fn write_lock(&self, lock_path: &Path, lock: &BundleLockFile) -> Result<()> {
        let content = lock.encode()?;
        let tmp_path = lock_path.with_extension("lock.tmp");

        self.runtime.write(&tmp_path, content.as_bytes())?;
        self.runtime
            .rename(&tmp_path, lock_path)
            .with_context(|| format!("Failed to write lock file {:?}", lock_path))
    }
}

fn module_def(module: &RawModule) -> ModuleDef {
    ModuleDef {
        name: module.package().to_string(),
        source: module.path.clone(),
        checksum: module.checksum(),
        dependencies: module.parsed.import_paths(),
    }
}
