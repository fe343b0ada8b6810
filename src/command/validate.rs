use anyhow::{Context, Result};

use super::{Command, CommandInput, CommandOutput, VALIDATE, invalid_input};

/// Checks a manifest before anything is built or installed.
#[derive(Debug, Default)]
pub struct ValidateCommand;

impl Command for ValidateCommand {
    fn name(&self) -> &str {
        VALIDATE
    }

    fn execute(&self, input: &CommandInput) -> Result<CommandOutput> {
        let CommandInput::Validate { manifest } = input else {
            return Err(invalid_input(VALIDATE));
        };
        manifest
            .validate()
            .with_context(|| format!("failed to execute '{}' command", VALIDATE))?;
        Ok(CommandOutput::Done)
    }
}
