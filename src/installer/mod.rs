//! Resolved bundle -> on-disk layout.

use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::Path;

use crate::bundle::{Bundle, BundleLayout};
use crate::runtime::{Runtime, is_path_under};

pub struct BundleInstaller<'a, R: Runtime> {
    runtime: &'a R,
    layout: &'a BundleLayout,
}

impl<'a, R: Runtime> BundleInstaller<'a, R> {
    pub fn new(runtime: &'a R, layout: &'a BundleLayout) -> Self {
        Self { runtime, layout }
    }

    /// Write every module, then the lock file, then the manifest. A module
    /// set without manifests can be repaired by re-running; the reverse
    /// would look like a complete install.
    #[tracing::instrument(skip(self, bundle), fields(bundle = %bundle.file_name))]
    pub fn install(&self, dest_dir: &Path, bundle: &Bundle) -> Result<()> {
        for (path, module) in &bundle.modules {
            let target = dest_dir.join(path);
            if !is_path_under(&target, dest_dir) {
                bail!("module '{}' would be installed outside {:?}", path, dest_dir);
            }
            if let Some(parent) = target.parent()
                && !self.runtime.exists(parent)
            {
                self.runtime.create_dir_all(parent)?;
            }
            self.runtime
                .write(&target, &module.raw)
                .with_context(|| format!("Failed to install module {}", path))?;
            debug!("Installed {:?}", target);
        }

        if !self.runtime.exists(dest_dir) {
            self.runtime.create_dir_all(dest_dir)?;
        }

        if let Some(lock) = &bundle.lock {
            let path = dest_dir.join(&self.layout.lock_file);
            self.runtime.write(&path, lock.encode()?.as_bytes())?;
        }
        if let Some(manifest) = &bundle.manifest {
            let path = dest_dir.join(&self.layout.manifest_file);
            self.runtime.write(&path, manifest.encode()?.as_bytes())?;
        }

        info!(
            "Installed {} modules into {}",
            bundle.modules.len(),
            dest_dir.display()
        );
        Ok(())
    }
}
