use std::io::Write;

use datamark::{
    DatamarkService,
    domain::{is_valid, trim},
};
use tracing::instrument;

use crate::cli::{print_validation_hint, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The new datamark
    ///
    /// If omitted, the datamark is read interactively.
    value: Option<String>,

    /// Number of interactive attempts before giving up
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,
}

impl Command {
    #[instrument(skip(service, out))]
    pub fn run(self, service: &DatamarkService, out: &mut dyn Write) -> anyhow::Result<()> {
        let value = match self.value {
            Some(value) => value,
            None if !service.update_allowed() => {
                return Err(datamark::Error::UpdateNotAllowed.into());
            }
            None => prompt_datamark(self.max_retries, read_line)?,
        };

        service.update(&value)?;
        writeln!(out, "{}", "updated".success())?;
        Ok(())
    }
}

fn read_line() -> Result<String, dialoguer::Error> {
    dialoguer::Input::<String>::new()
        .with_prompt("New datamark")
        .allow_empty(true)
        .interact_text()
}

/// Reads a datamark, re-prompting on illegal input.
///
/// The returned value is trimmed and legal.
fn prompt_datamark(
    max_attempts: u32,
    mut read: impl FnMut() -> Result<String, dialoguer::Error>,
) -> Result<String, PromptError> {
    eprintln!("Enter the new datamark. Leave it blank to clear the datamark.");

    for attempt in 1..=max_attempts {
        let candidate = read()?;
        let candidate = trim(&candidate);
        if is_valid(candidate) {
            return Ok(candidate.to_string());
        }

        tracing::debug!("Attempt {attempt} of {max_attempts}: rejected '{candidate}'");
        eprintln!("{}", format!("'{candidate}' is not a legal datamark").hint());
        print_validation_hint();
    }

    Err(PromptError::MaxRetriesExceeded {
        retries: max_attempts,
    })
}

#[derive(Debug, thiserror::Error)]
enum PromptError {
    #[error("Gave up after {retries} invalid datamark(s)")]
    MaxRetriesExceeded { retries: u32 },

    #[error("Failed to read datamark: {0}")]
    Input(#[from] dialoguer::Error),
}
