use anyhow::Result;
use std::rc::Rc;

use super::{BUILD, Command, CommandInput, CommandOutput, Subregistry, VALIDATE, invalid_input};
use crate::builder::BundleBuilder;
use crate::config::Config;
use crate::module::ModuleParser;
use crate::runtime::Runtime;

/// Validates the manifest, then builds `<name>.tar.gz` with dots in the
/// bundle name replaced by underscores.
pub struct BuildCommand<R: Runtime, P: ModuleParser> {
    runtime: Rc<R>,
    parser: P,
    config: Rc<Config>,
    subregistry: Subregistry,
}

impl<R: Runtime, P: ModuleParser> BuildCommand<R, P> {
    pub fn new(runtime: Rc<R>, parser: P, config: Rc<Config>) -> Self {
        Self {
            runtime,
            parser,
            config,
            subregistry: Subregistry::new(BUILD),
        }
    }
}

impl<R: Runtime, P: ModuleParser> Command for BuildCommand<R, P> {
    fn name(&self) -> &str {
        BUILD
    }

    fn requires(&self) -> Vec<&'static str> {
        vec![VALIDATE]
    }

    fn set_command(&mut self, command: Rc<dyn Command>) -> Result<()> {
        self.subregistry.insert(command)
    }

    #[tracing::instrument(skip(self, input))]
    fn execute(&self, input: &CommandInput) -> Result<CommandOutput> {
        let CommandInput::Build {
            manifest,
            source_dir,
            dest_dir,
        } = input
        else {
            return Err(invalid_input(BUILD));
        };

        self.subregistry.execute(
            VALIDATE,
            &CommandInput::Validate {
                manifest: manifest.clone(),
            },
        )?;

        let archive_name = self.config.layout.archive_name(&manifest.package()?.name);
        let output = BundleBuilder::new(self.runtime.as_ref(), &self.parser, &self.config)
            .build(source_dir, dest_dir, &archive_name)?;
        Ok(CommandOutput::Built(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleFile;
    use crate::command::{CommandRegistry, ValidateCommand};
    use crate::errors::BundleError;
    use crate::module::RegoHeaderParser;
    use crate::runtime::RealRuntime;
    use std::fs;
    use tempfile::tempdir;

    fn registry(config: Config) -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry.set(Box::new(ValidateCommand)).unwrap();
        registry
            .set(Box::new(BuildCommand::new(
                Rc::new(RealRuntime),
                RegoHeaderParser::default(),
                Rc::new(config),
            )))
            .unwrap();
        registry
    }

    #[test]
    fn test_build_names_archive_after_manifest() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::create_dir_all(&src)?;
        fs::write(src.join("a.rego"), "package pkg.a\n")?;
        let dest = dir.path().join("dist");

        let output = registry(Config::with_root(dir.path().join("root"))).execute(
            BUILD,
            &CommandInput::Build {
                manifest: BundleFile::new("acme.authz", "0.1.0"),
                source_dir: src.clone(),
                dest_dir: dest.clone(),
            },
        )?;

        let CommandOutput::Built(built) = output else {
            panic!("unexpected output {output:?}");
        };
        assert_eq!(built.archive_path, dest.join("acme_authz.tar.gz"));
        assert!(built.archive_path.exists());
        assert!(src.join("bundle.lock").exists());
        Ok(())
    }

    #[test]
    fn test_build_stops_on_invalid_manifest() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("src");
        fs::create_dir_all(&src)?;
        let dest = dir.path().join("dist");

        let err = registry(Config::with_root(dir.path().join("root")))
            .execute(
                BUILD,
                &CommandInput::Build {
                    manifest: BundleFile::new("acme", "1.0"),
                    source_dir: src.clone(),
                    dest_dir: dest.clone(),
                },
            )
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BundleError>(),
            Some(BundleError::InvalidManifest(_))
        ));
        assert!(!dest.exists());
        assert!(!src.join("bundle.lock").exists());
        Ok(())
    }

    #[test]
    fn test_build_without_wired_validate() {
        let command = BuildCommand::new(
            Rc::new(RealRuntime),
            RegoHeaderParser::default(),
            Rc::new(Config::with_root("/tmp/bpm".into())),
        );
        let err = command
            .execute(&CommandInput::Build {
                manifest: BundleFile::new("acme", "1.0.0"),
                source_dir: "/nonexistent".into(),
                dest_dir: "/nonexistent".into(),
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BundleError>(),
            Some(BundleError::MissingDependency { .. })
        ));
    }
}
