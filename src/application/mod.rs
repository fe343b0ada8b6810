//! Use cases behind the `bpm` subcommands.
//!
//! Each function builds its collaborators from a [`Runtime`] and an optional
//! root override, then runs through the command registry or the linker.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::bundle::{BundleFile, PackageDef};
use crate::command::{
    BUILD, BuildCommand, BundleSource, CommandInput, CommandOutput, CommandRegistry, GET,
    GetCommand, VALIDATE, ValidateCommand,
};
use crate::config::Config;
use crate::linker::{FsStore, LinkedModule, Linker};
use crate::loader::{BundleProcessor, FsLoader, GitCli, GitLoader};
use crate::module::RegoHeaderParser;
use crate::runtime::Runtime;

/// Registry with `validate`, `build` and `get`, registered in dependency order.
pub fn default_registry<R: Runtime + 'static>(
    runtime: Rc<R>,
    config: Rc<Config>,
) -> Result<CommandRegistry> {
    let parser = RegoHeaderParser::default();
    let processor = || BundleProcessor::new(parser.clone(), config.layout.clone());

    let mut registry = CommandRegistry::new();
    registry.set(Box::new(ValidateCommand))?;
    registry.set(Box::new(BuildCommand::new(
        Rc::clone(&runtime),
        parser.clone(),
        Rc::clone(&config),
    )))?;
    registry.set(Box::new(GetCommand::new(
        Rc::clone(&runtime),
        Rc::clone(&config),
        FsLoader::new(processor()),
        GitLoader::new(GitCli, processor()),
    )))?;
    Ok(registry)
}

fn read_manifest<R: Runtime>(runtime: &R, config: &Config, source_dir: &Path) -> Result<BundleFile> {
    let path = source_dir.join(&config.layout.manifest_file);
    let content = runtime
        .read_to_string(&path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    BundleFile::decode(&content)
}

/// Validate `<source_dir>/bundle.toml`.
#[tracing::instrument(skip(runtime))]
pub fn validate<R: Runtime>(runtime: &R, source_dir: &Path) -> Result<PackageDef> {
    let config = Config::with_root(PathBuf::new());
    let manifest = read_manifest(runtime, &config, source_dir)?;
    let mut registry = CommandRegistry::new();
    registry.set(Box::new(ValidateCommand))?;
    registry.execute(
        VALIDATE,
        &CommandInput::Validate {
            manifest: manifest.clone(),
        },
    )?;
    Ok(manifest.package()?.clone())
}

/// Build `<source_dir>` into an archive under `dest_dir`; returns its path.
#[tracing::instrument(skip(runtime))]
pub fn build<R: Runtime + 'static>(
    runtime: R,
    source_dir: &Path,
    dest_dir: &Path,
    root: Option<PathBuf>,
) -> Result<PathBuf> {
    let config = Rc::new(Config::new(&runtime, root)?);
    let manifest = read_manifest(&runtime, &config, source_dir)?;

    let registry = default_registry(Rc::new(runtime), Rc::clone(&config))?;
    let output = registry.execute(
        BUILD,
        &CommandInput::Build {
            manifest,
            source_dir: source_dir.to_path_buf(),
            dest_dir: dest_dir.to_path_buf(),
        },
    )?;
    match output {
        CommandOutput::Built(output) => Ok(output.archive_path),
        other => anyhow::bail!("'{}' command produced {:?}", BUILD, other),
    }
}

/// Fetch an archive or git repository and install it under the root.
#[tracing::instrument(skip(runtime))]
pub fn get<R: Runtime + 'static>(
    runtime: R,
    source: &str,
    tag: Option<String>,
    root: Option<PathBuf>,
) -> Result<CommandOutput> {
    let config = Rc::new(Config::new(&runtime, root)?);
    let registry = default_registry(Rc::new(runtime), config)?;
    registry.execute(
        GET,
        &CommandInput::Get {
            source: BundleSource::parse(source, tag),
        },
    )
}

/// Load a bundle archive, index all of its modules and link `module_path`.
/// Indexed modules are persisted under `<root>/.index`.
#[tracing::instrument(skip(runtime))]
pub fn link<R: Runtime>(
    runtime: &R,
    bundle_path: &Path,
    module_path: &str,
    root: Option<PathBuf>,
) -> Result<LinkedModule> {
    let config = Config::new(runtime, root)?;
    let loader = FsLoader::new(BundleProcessor::new(
        RegoHeaderParser::default(),
        config.layout.clone(),
    ));
    let bundle = loader.load_bundle(runtime, bundle_path)?;

    let mut linker = Linker::new(FsStore::new(runtime, config.index_dir()));
    let indexed = linker.index_bundle(&bundle)?;
    let target = indexed
        .iter()
        .find(|m| m.module.path == module_path)
        .with_context(|| {
            format!(
                "module '{}' is not in bundle {}",
                module_path, bundle.file_name
            )
        })?;
    linker.linking(target)
}
