//! A small dependency-wired command facility.
//!
//! A command names the commands it requires. [`CommandRegistry::set`] hands
//! each of them to the new command right away, so dependencies must be
//! registered before their dependents. There is no deferred or topological
//! wiring: registering `build` before `validate` fails.

mod build;
mod get;
mod validate;

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use crate::builder::BuildOutput;
use crate::bundle::BundleFile;
use crate::errors::BundleError;

pub use build::BuildCommand;
pub use get::GetCommand;
pub use validate::ValidateCommand;

pub const VALIDATE: &str = "validate";
pub const BUILD: &str = "build";
pub const GET: &str = "get";

/// Where `get` fetches a bundle from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleSource {
    Archive(PathBuf),
    Git { url: String, tag: Option<String> },
}

impl BundleSource {
    /// Anything that looks like a repository URL, or comes with a tag, is a
    /// git source. Everything else is a local archive.
    pub fn parse(source: &str, tag: Option<String>) -> Self {
        let is_git = tag.is_some()
            || source.contains("://")
            || source.starts_with("git@")
            || source.ends_with(".git");
        if is_git {
            BundleSource::Git {
                url: source.to_string(),
                tag,
            }
        } else {
            BundleSource::Archive(PathBuf::from(source))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandInput {
    Validate {
        manifest: BundleFile,
    },
    Build {
        manifest: BundleFile,
        source_dir: PathBuf,
        dest_dir: PathBuf,
    },
    Get {
        source: BundleSource,
    },
}

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    Done,
    Built(BuildOutput),
    Installed { dir: PathBuf },
    AlreadyInstalled { dir: PathBuf },
}

pub trait Command {
    fn name(&self) -> &str;

    /// Names of commands that must be registered first.
    fn requires(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Receive one of the commands named by [`Command::requires`].
    fn set_command(&mut self, _command: Rc<dyn Command>) -> Result<()> {
        Ok(())
    }

    fn execute(&self, input: &CommandInput) -> Result<CommandOutput>;
}

/// The commands wired into a composite command.
pub(crate) struct Subregistry {
    parent: &'static str,
    commands: BTreeMap<String, Rc<dyn Command>>,
}

impl Subregistry {
    pub(crate) fn new(parent: &'static str) -> Self {
        Self {
            parent,
            commands: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, command: Rc<dyn Command>) -> Result<()> {
        let name = command.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(BundleError::DuplicateCommand {
                name,
                parent: self.parent.to_string(),
            }
            .into());
        }
        self.commands.insert(name, command);
        Ok(())
    }

    pub(crate) fn execute(&self, name: &str, input: &CommandInput) -> Result<CommandOutput> {
        self.commands
            .get(name)
            .ok_or_else(|| BundleError::MissingDependency {
                command: self.parent.to_string(),
                requires: name.to_string(),
            })?
            .execute(input)
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Rc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `command`, wiring every command it requires.
    pub fn set(&mut self, mut command: Box<dyn Command>) -> Result<()> {
        let name = command.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(BundleError::DuplicateCommand {
                name,
                parent: "registry".to_string(),
            }
            .into());
        }

        for required in command.requires() {
            let dependency =
                self.commands
                    .get(required)
                    .ok_or_else(|| BundleError::MissingDependency {
                        command: name.clone(),
                        requires: required.to_string(),
                    })?;
            command.set_command(Rc::clone(dependency))?;
        }

        log::debug!("Registered command {}", name);
        self.commands.insert(name, Rc::from(command));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    #[tracing::instrument(skip(self, input))]
    pub fn execute(&self, name: &str, input: &CommandInput) -> Result<CommandOutput> {
        self.commands
            .get(name)
            .ok_or_else(|| BundleError::UnknownCommand(name.to_string()))?
            .execute(input)
    }
}

pub(crate) fn invalid_input(command: &str) -> anyhow::Error {
    BundleError::InvalidInput {
        command: command.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records the order commands ran in.
    struct Probe {
        name: &'static str,
        requires: Vec<&'static str>,
        wired: Subregistry,
        log: Rc<RefCell<Vec<String>>>,
        fail: bool,
    }

    impl Probe {
        fn new(name: &'static str, requires: Vec<&'static str>, log: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                name,
                requires,
                wired: Subregistry::new(name),
                log: Rc::clone(log),
                fail: false,
            }
        }
    }

    impl Command for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn requires(&self) -> Vec<&'static str> {
            self.requires.clone()
        }

        fn set_command(&mut self, command: Rc<dyn Command>) -> Result<()> {
            self.wired.insert(command)
        }

        fn execute(&self, input: &CommandInput) -> Result<CommandOutput> {
            for required in &self.requires {
                self.wired.execute(required, input)?;
            }
            self.log.borrow_mut().push(self.name.to_string());
            if self.fail {
                anyhow::bail!("{} failed", self.name);
            }
            Ok(CommandOutput::Done)
        }
    }

    fn input() -> CommandInput {
        CommandInput::Validate {
            manifest: BundleFile::new("acme", "1.0.0"),
        }
    }

    #[test]
    fn test_dependency_must_be_registered_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CommandRegistry::new();

        let err = registry
            .set(Box::new(Probe::new(BUILD, vec![VALIDATE], &log)))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BundleError>(),
            Some(&BundleError::MissingDependency {
                command: BUILD.into(),
                requires: VALIDATE.into(),
            })
        );
        assert!(registry.get(BUILD).is_none());

        registry
            .set(Box::new(Probe::new(VALIDATE, vec![], &log)))
            .unwrap();
        registry
            .set(Box::new(Probe::new(BUILD, vec![VALIDATE], &log)))
            .unwrap();
        assert_eq!(registry.names(), vec![BUILD, VALIDATE]);
    }

    #[test]
    fn test_composite_runs_dependency_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CommandRegistry::new();
        registry
            .set(Box::new(Probe::new(VALIDATE, vec![], &log)))
            .unwrap();
        registry
            .set(Box::new(Probe::new(BUILD, vec![VALIDATE], &log)))
            .unwrap();

        registry.execute(BUILD, &input()).unwrap();
        assert_eq!(*log.borrow(), vec![VALIDATE, BUILD]);
    }

    #[test]
    fn test_composite_stops_when_dependency_fails() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CommandRegistry::new();
        let mut validate = Probe::new(VALIDATE, vec![], &log);
        validate.fail = true;
        registry.set(Box::new(validate)).unwrap();
        registry
            .set(Box::new(Probe::new(BUILD, vec![VALIDATE], &log)))
            .unwrap();

        assert!(registry.execute(BUILD, &input()).is_err());
        assert_eq!(*log.borrow(), vec![VALIDATE]);
    }

    #[test]
    fn test_duplicate_and_unknown_commands() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = CommandRegistry::new();
        registry.set(Box::new(Probe::new(GET, vec![], &log))).unwrap();

        let err = registry
            .set(Box::new(Probe::new(GET, vec![], &log)))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BundleError>(),
            Some(BundleError::DuplicateCommand { .. })
        ));

        let err = registry.execute("publish", &input()).unwrap_err();
        assert_eq!(err.to_string(), "command 'publish' is not registered");
    }

    #[test]
    fn test_bundle_source_parse() {
        assert_eq!(
            BundleSource::parse("dist/acme.tar.gz", None),
            BundleSource::Archive(PathBuf::from("dist/acme.tar.gz"))
        );
        assert!(matches!(
            BundleSource::parse("https://example.com/acme.git", None),
            BundleSource::Git { tag: None, .. }
        ));
        assert!(matches!(
            BundleSource::parse("git@example.com:acme/policies", None),
            BundleSource::Git { .. }
        ));
        assert!(matches!(
            BundleSource::parse("../policies", Some("v1.0.0".into())),
            BundleSource::Git { tag: Some(_), .. }
        ));
    }
}
