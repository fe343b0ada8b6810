//! Durable storage for indexed modules.

use anyhow::{Context, Result};
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::IndexedModule;
use crate::runtime::Runtime;

/// Backing store the linker persists indexed modules to. A `load` miss is
/// an error.
#[cfg_attr(test, mockall::automock)]
pub trait ModuleStore {
    fn store(&mut self, module: &IndexedModule) -> Result<()>;
    fn load(&self, path: &str) -> Result<IndexedModule>;
}

/// In-process store, keyed by module path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    modules: BTreeMap<String, IndexedModule>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleStore for MemoryStore {
    fn store(&mut self, module: &IndexedModule) -> Result<()> {
        self.modules
            .insert(module.module.path.clone(), module.clone());
        Ok(())
    }

    fn load(&self, path: &str) -> Result<IndexedModule> {
        self.modules
            .get(path)
            .cloned()
            .with_context(|| format!("file {} is undefined", path))
    }
}

/// One JSON document per module under `dir`, named by the SHA-256 of the
/// module path.
pub struct FsStore<'a, R: Runtime> {
    runtime: &'a R,
    dir: PathBuf,
}

impl<'a, R: Runtime> FsStore<'a, R> {
    pub fn new(runtime: &'a R, dir: PathBuf) -> Self {
        Self { runtime, dir }
    }

    fn entry_path(&self, path: &str) -> PathBuf {
        self.dir
            .join(format!("{:x}.json", Sha256::digest(path.as_bytes())))
    }
}

impl<R: Runtime> ModuleStore for FsStore<'_, R> {
    #[tracing::instrument(skip(self, module), fields(path = %module.module.path))]
    fn store(&mut self, module: &IndexedModule) -> Result<()> {
        let entry = self.entry_path(&module.module.path);
        if !self.runtime.exists(&self.dir) {
            self.runtime.create_dir_all(&self.dir)?;
        }

        let json = serde_json::to_string_pretty(module)?;
        let tmp = entry.with_extension("json.tmp");
        self.runtime.write(&tmp, json.as_bytes())?;
        self.runtime.rename(&tmp, &entry)?;
        debug!("Stored {} at {:?}", module.module.path, entry);
        Ok(())
    }

    fn load(&self, path: &str) -> Result<IndexedModule> {
        let entry = self.entry_path(path);
        if !self.runtime.exists(&entry) {
            anyhow::bail!("file {} is undefined", path);
        }
        let content = self.runtime.read_to_string(&entry)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse stored module {:?}", entry))
    }
}
