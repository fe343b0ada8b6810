use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::Path;

use super::{BundleProcessor, walk_files};
use crate::archive::TarGz;
use crate::bundle::Bundle;
use crate::module::{ModuleParser, RawModule};
use crate::runtime::{Runtime, path::to_slash};

/// Loads modules and bundles from the local file system.
pub struct FsLoader<P: ModuleParser> {
    processor: BundleProcessor<P>,
    archive: TarGz,
}

impl<P: ModuleParser> FsLoader<P> {
    pub fn new(processor: BundleProcessor<P>) -> Self {
        Self {
            processor,
            archive: TarGz,
        }
    }

    pub fn processor(&self) -> &BundleProcessor<P> {
        &self.processor
    }

    /// Read and parse a single module file.
    #[tracing::instrument(skip(self, runtime))]
    pub fn load_module<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<RawModule> {
        let raw = runtime
            .read(path)
            .with_context(|| format!("error opening file {:?}", path))?;
        RawModule::parse(self.processor.parser(), to_slash(path), raw)
            .with_context(|| format!("error parsing file contents of {:?}", path))
    }

    /// Read a `.tar.gz` bundle archive.
    #[tracing::instrument(skip(self, runtime))]
    pub fn load_bundle<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<Bundle> {
        if !self.archive.can_handle(path) {
            bail!("'{}' is not a bundle archive", path.display());
        }

        let files = self.archive.read_files(runtime, path)?;
        debug!("Read {} files from {:?}", files.len(), path);

        let bundle = self.processor.process(&to_slash(path), files)?;
        info!(
            "Loaded bundle {} with {} modules",
            bundle.file_name,
            bundle.modules.len()
        );
        Ok(bundle)
    }

    /// Every module file under `dir`, keyed by its path relative to `dir`.
    #[tracing::instrument(skip(self, runtime))]
    pub fn load_dir<R: Runtime>(&self, runtime: &R, dir: &Path) -> Result<Vec<RawModule>> {
        if !runtime.is_dir(dir) {
            bail!("'{}' is not a directory", dir.display());
        }

        let layout = self.processor.layout();
        let mut modules = Vec::new();
        for relative in walk_files(runtime, dir, &[])? {
            if !layout.is_module(&relative) {
                continue;
            }
            let raw = runtime.read(&dir.join(&relative))?;
            let module = RawModule::parse(self.processor.parser(), relative.clone(), raw)
                .with_context(|| format!("error parsing file contents of '{}'", relative))?;
            modules.push(module);
        }
        Ok(modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleLayout;
    use crate::module::RegoHeaderParser;
    use crate::runtime::{MockRuntime, RealRuntime};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use mockall::predicate::eq;
    use std::fs::{self, File};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn loader() -> FsLoader<RegoHeaderParser> {
        FsLoader::new(BundleProcessor::new(
            RegoHeaderParser::default(),
            BundleLayout::default(),
        ))
    }

    fn create_test_archive(path: &Path, files: &[(&str, &str)]) -> Result<()> {
        let mut tar = tar::Builder::new(GzEncoder::new(File::create(path)?, Compression::default()));
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name)?;
            header.set_size(content.len() as u64);
            header.set_cksum();
            tar.append(&header, content.as_bytes())?;
        }
        tar.into_inner()?.finish()?;
        Ok(())
    }

    #[test]
    fn test_load_module_with_mock_runtime() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/src/a.rego");
        runtime
            .expect_read()
            .with(eq(path.clone()))
            .returning(|_| Ok(b"package pkg.a\n".to_vec()));

        let module = loader().load_module(&runtime, &path).unwrap();
        assert_eq!(module.path, "/src/a.rego");
        assert_eq!(module.package(), "data.pkg.a");
    }

    #[test]
    fn test_load_module_missing_file() {
        let err = loader()
            .load_module(&RealRuntime, Path::new("/nonexistent/a.rego"))
            .unwrap_err();
        assert!(err.to_string().contains("error opening file"));
    }

    #[test]
    fn test_load_bundle() -> Result<()> {
        let dir = tempdir()?;
        let archive = dir.path().join("acme.tar.gz");
        create_test_archive(
            &archive,
            &[
                ("bundle.toml", "[package]\nname = \"acme\"\nversion = \"0.1.0\"\n"),
                ("a.rego", "package pkg.a\n"),
                ("lib/b.rego", "package pkg.b\nimport data.pkg.a\n"),
            ],
        )?;

        let bundle = loader().load_bundle(&RealRuntime, &archive)?;
        assert_eq!(bundle.name_and_version()?, ("acme", "0.1.0"));
        assert_eq!(
            bundle.modules.keys().collect::<Vec<_>>(),
            vec!["a.rego", "lib/b.rego"]
        );
        Ok(())
    }

    #[test]
    fn test_load_bundle_rejects_other_extensions() {
        let err = loader()
            .load_bundle(&RealRuntime, Path::new("acme.zip"))
            .unwrap_err();
        assert!(err.to_string().contains("not a bundle archive"));
    }

    #[test]
    fn test_load_dir() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("nested"))?;
        fs::write(dir.path().join("a.rego"), "package pkg.a\n")?;
        fs::write(dir.path().join("nested/b.rego"), "package pkg.b\n")?;
        fs::write(dir.path().join("notes.txt"), "package nope\n")?;

        let modules = loader().load_dir(&RealRuntime, dir.path())?;
        let paths: Vec<_> = modules.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["a.rego", "nested/b.rego"]);
        Ok(())
    }
}
