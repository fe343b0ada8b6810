use anyhow::{Context, Result};
use log::{info, warn};
use std::rc::Rc;

use super::{BundleSource, Command, CommandInput, CommandOutput, GET, invalid_input};
use crate::bundle::Bundle;
use crate::config::Config;
use crate::installer::BundleInstaller;
use crate::loader::{FsLoader, GitClient, GitLoader};
use crate::module::ModuleParser;
use crate::errors::BundleError;
use crate::runtime::{Runtime, is_path_under};

/// Fetches a bundle and installs it into `<root>/<name>/<version>`.
pub struct GetCommand<R: Runtime, G: GitClient, P: ModuleParser> {
    runtime: Rc<R>,
    config: Rc<Config>,
    fs: FsLoader<P>,
    git: GitLoader<G, P>,
}

impl<R: Runtime, G: GitClient, P: ModuleParser> GetCommand<R, G, P> {
    pub fn new(runtime: Rc<R>, config: Rc<Config>, fs: FsLoader<P>, git: GitLoader<G, P>) -> Self {
        Self {
            runtime,
            config,
            fs,
            git,
        }
    }

    fn fetch(&self, source: &BundleSource) -> Result<Bundle> {
        match source {
            BundleSource::Archive(path) => self.fs.load_bundle(self.runtime.as_ref(), path),
            BundleSource::Git { url, tag } => {
                let result = self.git.download_bundle(url, tag.as_deref())?;
                info!("Fetched {} at {}", url, result.hash);
                Ok(result.bundle)
            }
        }
    }
}

impl<R: Runtime, G: GitClient, P: ModuleParser> Command for GetCommand<R, G, P> {
    fn name(&self) -> &str {
        GET
    }

    #[tracing::instrument(skip(self, input))]
    fn execute(&self, input: &CommandInput) -> Result<CommandOutput> {
        let CommandInput::Get { source } = input else {
            return Err(invalid_input(GET));
        };

        let bundle = self.fetch(source)?;
        let (name, version) = bundle.name_and_version()?;
        let version_dir = self.config.install_dir(name, version);

        if !is_path_under(&version_dir, &self.config.root) {
            return Err(BundleError::invalid_path(
                version_dir.display().to_string(),
                format!("is outside the bundle root {}", self.config.root.display()),
            )
            .into());
        }

        if self.runtime.exists(&version_dir) {
            println!(
                "Bundle '{}' with version '{}' is already installed",
                name, version
            );
            return Ok(CommandOutput::AlreadyInstalled { dir: version_dir });
        }

        self.runtime.create_dir_all(&version_dir)?;
        let installed = BundleInstaller::new(self.runtime.as_ref(), &self.config.layout)
            .install(&version_dir, &bundle);
        if let Err(err) = installed {
            // a half-written version dir would read as installed next time
            if let Err(cleanup) = self.runtime.remove_dir_all(&version_dir) {
                warn!("Failed to clean up {}: {}", version_dir.display(), cleanup);
            }
            return Err(err).with_context(|| format!("can't install bundle '{}'", name));
        }

        println!(
            "Installed {} {} into {}",
            name,
            version,
            version_dir.display()
        );
        Ok(CommandOutput::Installed { dir: version_dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleLayout;
    use crate::loader::{BundleProcessor, MockGitClient};
    use crate::module::RegoHeaderParser;
    use crate::runtime::RealRuntime;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::collections::BTreeMap;
    use std::fs::{self, File};
    use std::path::Path;
    use tempfile::tempdir;

    fn processor() -> BundleProcessor<RegoHeaderParser> {
        BundleProcessor::new(RegoHeaderParser::default(), BundleLayout::default())
    }

    fn command(root: &Path, git: MockGitClient) -> GetCommand<RealRuntime, MockGitClient, RegoHeaderParser> {
        GetCommand::new(
            Rc::new(RealRuntime),
            Rc::new(Config::with_root(root.to_path_buf())),
            FsLoader::new(processor()),
            GitLoader::new(git, processor()),
        )
    }

    fn create_bundle_archive(path: &Path, version: &str) -> Result<()> {
        let manifest = format!("[package]\nname = \"acme\"\nversion = \"{}\"\n", version);
        let files = [
            ("bundle.toml", manifest.as_str()),
            ("policies/a.rego", "package pkg.a\n"),
        ];
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
    fn test_get_installs_archive() -> Result<()> {
        let dir = tempdir()?;
        let archive = dir.path().join("acme.tar.gz");
        create_bundle_archive(&archive, "1.0.0")?;
        let root = dir.path().join("root");

        let output = command(&root, MockGitClient::new()).execute(&CommandInput::Get {
            source: BundleSource::Archive(archive),
        })?;

        let installed = root.join("acme").join("1.0.0");
        assert_eq!(output, CommandOutput::Installed { dir: installed.clone() });
        assert_eq!(fs::read(installed.join("policies/a.rego"))?, b"package pkg.a\n");
        assert!(installed.join("bundle.toml").exists());
        Ok(())
    }

    #[test]
    fn test_get_skips_installed_version() -> Result<()> {
        let dir = tempdir()?;
        let archive = dir.path().join("acme.tar.gz");
        create_bundle_archive(&archive, "1.0.0")?;
        let root = dir.path().join("root");
        let installed = root.join("acme").join("1.0.0");
        fs::create_dir_all(&installed)?;

        let output = command(&root, MockGitClient::new()).execute(&CommandInput::Get {
            source: BundleSource::Archive(archive),
        })?;

        assert_eq!(output, CommandOutput::AlreadyInstalled { dir: installed.clone() });
        assert!(!installed.join("policies").exists());
        Ok(())
    }

    #[test]
    fn test_get_rejects_invalid_manifest() -> Result<()> {
        let dir = tempdir()?;
        let archive = dir.path().join("acme.tar.gz");
        create_bundle_archive(&archive, "1.0")?;
        let root = dir.path().join("root");

        let result = command(&root, MockGitClient::new()).execute(&CommandInput::Get {
            source: BundleSource::Archive(archive),
        });
        assert!(result.is_err());
        assert!(!root.exists());
        Ok(())
    }

    #[test]
    fn test_get_refuses_to_install_outside_root() -> Result<()> {
        let dir = tempdir()?;
        let archive = dir.path().join("acme.tar.gz");
        let manifest = "[package]\nname = \"../outside\"\nversion = \"1.0.0\"\n";
        let mut tar = tar::Builder::new(GzEncoder::new(File::create(&archive)?, Compression::default()));
        for (name, content) in [("bundle.toml", manifest), ("a.rego", "package pkg.a\n")] {
            let mut header = tar::Header::new_gnu();
            header.set_path(name)?;
            header.set_size(content.len() as u64);
            header.set_cksum();
            tar.append(&header, content.as_bytes())?;
        }
        tar.into_inner()?.finish()?;
        let root = dir.path().join("root");

        let result = command(&root, MockGitClient::new()).execute(&CommandInput::Get {
            source: BundleSource::Archive(archive),
        });

        assert!(result.is_err());
        assert!(!dir.path().join("outside").exists());
        Ok(())
    }

    #[test]
    fn test_get_version_dir_must_stay_under_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("root");
        let mut git = MockGitClient::new();
        git.expect_clone_repo().returning(|_, _| Ok(()));
        git.expect_resolve().returning(|_, _| Ok("cafe".into()));
        git.expect_files_at().returning(|_, _| {
            Ok(BTreeMap::from([(
                "bundle.toml".to_string(),
                b"[package]\nname = \"acme\"\nversion = \"1.0.0\"\n".to_vec(),
            )]))
        });

        // the root check compares normalized paths
        let escaped = root.join("..").join("root");
        command(&escaped, git)
            .execute(&CommandInput::Get {
                source: BundleSource::Git {
                    url: "https://example.com/acme.git".into(),
                    tag: None,
                },
            })
            .unwrap();
        assert!(root.join("acme/1.0.0/bundle.toml").exists());
    }

    #[test]
    fn test_get_from_git() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("root");

        let mut git = MockGitClient::new();
        git.expect_clone_repo().returning(|_, _| Ok(()));
        git.expect_tags().returning(|_| Ok(vec!["v2.0.0".into()]));
        git.expect_resolve().returning(|_, _| Ok("cafe".into()));
        git.expect_files_at().returning(|_, _| {
            Ok(BTreeMap::from([
                (
                    "bundle.toml".to_string(),
                    b"[package]\nname = \"acme\"\nversion = \"2.0.0\"\n".to_vec(),
                ),
                ("b.rego".to_string(), b"package pkg.b\n".to_vec()),
            ]))
        });

        command(&root, git).execute(&CommandInput::Get {
            source: BundleSource::Git {
                url: "https://example.com/acme.git".into(),
                tag: Some("v2.0.0".into()),
            },
        })?;

        assert!(root.join("acme/2.0.0/b.rego").exists());
        Ok(())
    }

    #[test]
    fn test_get_removes_partial_install() -> Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("root");

        let mut git = MockGitClient::new();
        git.expect_clone_repo().returning(|_, _| Ok(()));
        git.expect_tags().returning(|_| Ok(vec![]));
        git.expect_resolve().returning(|_, _| Ok("cafe".into()));
        git.expect_files_at().returning(|_, _| {
            Ok(BTreeMap::from([
                (
                    "bundle.toml".to_string(),
                    b"[package]\nname = \"acme\"\nversion = \"1.0.0\"\n".to_vec(),
                ),
                ("../escape.rego".to_string(), b"package pkg.x\n".to_vec()),
            ]))
        });

        let result = command(&root, git).execute(&CommandInput::Get {
            source: BundleSource::Git {
                url: "https://example.com/acme.git".into(),
                tag: None,
            },
        });

        assert!(result.is_err());
        assert!(!root.join("acme/1.0.0").exists());
        assert!(!root.join("acme/escape.rego").exists());
        Ok(())
    }

    #[test]
    fn test_get_rejects_other_inputs() {
        let dir = tempdir().unwrap();
        let err = command(dir.path(), MockGitClient::new())
            .execute(&CommandInput::Validate {
                manifest: crate::bundle::BundleFile::new("acme", "1.0.0"),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid input type for 'get' command");
    }
}
