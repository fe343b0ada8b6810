//! Import resolution.
//!
//! The [`Linker`] keeps three views of the registry:
//!
//! - a backing [`ModuleStore`], the durable source of truth
//! - a volatile path cache, package path -> module file path, rebuilt from
//!   whatever has been indexed in this process
//! - a prefix tree of modules already loaded, keyed by file path
//!
//! A linker is not synchronized. Use one per resolution session.

mod store;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bundle::Bundle;
use crate::errors::BundleError;
use crate::module::RawModule;
use crate::radix::PrefixTree;

pub use store::{FsStore, MemoryStore, ModuleStore};

#[cfg(test)]
pub use store::MockModuleStore;

/// A registered module and the imports it still has to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedModule {
    pub module: RawModule,
    /// Import paths in declaration order.
    pub want_list: Vec<String>,
}

/// A module whose imports all resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedModule {
    pub module: RawModule,
    /// Resolved file path -> module.
    pub dependencies: BTreeMap<String, IndexedModule>,
}

/// Whether a backing-store hit in [`Linker::loading`] is copied into the
/// loaded-module tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Every lookup that misses the tree goes to the store again.
    #[default]
    NoWriteThrough,
    WriteThrough,
}

pub struct Linker<S: ModuleStore> {
    store: S,
    loaded: PrefixTree<IndexedModule>,
    paths: PrefixTree<String>,
    policy: CachePolicy,
}

impl<S: ModuleStore> Linker<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, CachePolicy::default())
    }

    pub fn with_policy(store: S, policy: CachePolicy) -> Self {
        Self {
            store,
            loaded: PrefixTree::new(),
            paths: PrefixTree::new(),
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Modules held in the loaded-module tree.
    pub fn loaded(&self) -> &PrefixTree<IndexedModule> {
        &self.loaded
    }

    /// File path registered for a package, if any.
    pub fn resolve_path(&self, package: &str) -> Option<&str> {
        self.paths.load(package.as_bytes()).map(String::as_str)
    }

    /// Register `raw`: persist it with its want list and map its package to
    /// its path. Re-registering a package points it at the newest path.
    #[tracing::instrument(skip(self, raw), fields(path = %raw.path))]
    pub fn indexing(&mut self, raw: RawModule) -> Result<IndexedModule> {
        let indexed = IndexedModule {
            want_list: raw.parsed.import_paths(),
            module: raw,
        };

        self.store
            .store(&indexed)
            .with_context(|| format!("Failed to store module {}", indexed.module.path))?;

        let package = indexed.module.package().as_bytes().to_vec();
        if let Some(previous) = self.paths.store(&package, indexed.module.path.clone())
            && previous != indexed.module.path
        {
            debug!(
                "Package {} moved from {} to {}",
                indexed.module.package(),
                previous,
                indexed.module.path
            );
        }
        self.loaded.delete(indexed.module.path.as_bytes());

        Ok(indexed)
    }

    /// Index every module of a bundle, in path order.
    #[tracing::instrument(skip(self, bundle), fields(bundle = %bundle.file_name))]
    pub fn index_bundle(&mut self, bundle: &Bundle) -> Result<Vec<IndexedModule>> {
        let indexed = bundle
            .modules
            .values()
            .map(|module| self.indexing(module.clone()))
            .collect::<Result<Vec<_>>>()?;
        info!("Indexed {} modules from {}", indexed.len(), bundle.file_name);
        Ok(indexed)
    }

    /// Find the module registered for an import path.
    #[tracing::instrument(skip(self))]
    pub fn loading(&mut self, import: &str) -> Result<IndexedModule> {
        let path = self
            .resolve_path(import)
            .ok_or_else(|| BundleError::UndefinedImport(import.to_string()))?
            .to_string();
        self.load_path(&path)
    }

    fn load_path(&mut self, path: &str) -> Result<IndexedModule> {
        if let Some(module) = self.loaded.load(path.as_bytes()) {
            return Ok(module.clone());
        }

        let module = self.store.load(path)?;
        if self.policy == CachePolicy::WriteThrough {
            self.loaded.store(path.as_bytes(), module.clone());
        }
        Ok(module)
    }

    /// Resolve every import of `indexed`. The first unresolved import fails
    /// the whole call. Dependencies are keyed by resolved file path.
    #[tracing::instrument(skip(self, indexed), fields(path = %indexed.module.path))]
    pub fn linking(&mut self, indexed: &IndexedModule) -> Result<LinkedModule> {
        let mut dependencies = BTreeMap::new();
        for import in &indexed.want_list {
            let dependency = self.loading(import)?;
            dependencies.insert(dependency.module.path.clone(), dependency);
        }

        Ok(LinkedModule {
            module: indexed.module.clone(),
            dependencies,
        })
    }

    /// Load a group of modules. A target containing `/` selects modules whose
    /// file path starts with it; otherwise a target containing `.` selects
    /// modules whose package starts with it. Results are ordered by path.
    #[tracing::instrument(skip(self))]
    pub fn load_set(&mut self, target: &str) -> Result<Vec<IndexedModule>> {
        let mut paths: Vec<String> = Vec::new();

        if target.contains('/') {
            self.paths.walk(|_, path| {
                if path.starts_with(target) {
                    paths.push(path.clone());
                }
                false
            });
        } else if target.contains('.') {
            if let Some(found) = self.paths.load_prefix(target.as_bytes()) {
                paths.extend(found.into_values().cloned());
            }
        } else {
            debug!("'{}' is neither a path nor a package prefix", target);
        }

        paths.sort();
        paths.dedup();
        paths.iter().map(|path| self.load_path(path)).collect()
    }
}
