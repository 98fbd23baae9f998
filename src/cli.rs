use std::{io::Write, path::PathBuf, sync::Arc};

mod complete;
mod terminal;
mod update;

use anyhow::bail;
use clap::ArgAction;
use datamark::{
    DatamarkService, Registry, ResourceResolver, Settings,
    domain::{DEFAULT_SERVICE, MAX_LENGTH},
    storage::{FileSystem, MEMORY_SCHEME},
};
use terminal::Colorize;
use tracing::instrument;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file declaring the datamark services
    ///
    /// Relative `file:` resources are resolved against the directory holding
    /// this file. Without it, a single default service reads
    /// `datamark/storage` in the working directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Name of the datamark service to use
    #[arg(short, long, default_value = DEFAULT_SERVICE, global = true)]
    service: String,

    /// Override the resource locator of the selected service
    #[arg(long, global = true)]
    resource: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        if let Command::Completions(command) = self.command {
            command.run();
            return Ok(());
        }

        let service = self.service()?;
        let result = self.command.run(&service, &mut std::io::stdout().lock());
        if let Some(hint) = result
            .as_ref()
            .err()
            .and_then(|e| e.downcast_ref::<datamark::Error>())
            .and_then(error_hint)
        {
            eprintln!("{}", hint.hint());
        }
        result
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }

    /// Resolves the service selected on the command line.
    ///
    /// The binary only reaches the filesystem; `memory:` resources exist
    /// within a single process and are rejected here.
    #[instrument(level = "debug", skip(self))]
    fn service(&self) -> anyhow::Result<Arc<DatamarkService>> {
        let (settings, file_system) = match &self.config {
            Some(path) => {
                let settings = Settings::load(path)?;
                let base = path.parent().map(PathBuf::from).unwrap_or_default();
                (settings, FileSystem::with_base(base))
            }
            None => (Settings::default(), FileSystem::default()),
        };

        let resolver: Arc<dyn ResourceResolver> = Arc::new(file_system);
        let service = Registry::from_settings(&settings, &resolver).get(&self.service)?;

        if let Some(resource) = &self.resource {
            tracing::debug!("Overriding resource of '{}' with {resource}", self.service);
            service.set_config(service.config().with_resource_url(resource));
        }

        let config = service.config();
        if config.resource_url().starts_with(MEMORY_SCHEME) {
            bail!(
                "Service '{}' uses the in-memory resource {}, which is only available to library users",
                self.service,
                config.resource_url()
            );
        }

        Ok(service)
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Show whether the service accepts updates
    UpdateAllowed,

    /// Show the current datamark
    Get,

    /// Reload the datamark from its resource and show it
    Refresh,

    /// Write a new datamark
    Update(update::Command),

    /// Print a shell completion script
    Completions(complete::Command),
}

impl Command {
    fn run(self, service: &DatamarkService, out: &mut dyn Write) -> anyhow::Result<()> {
        match self {
            Self::UpdateAllowed => {
                writeln!(
                    out,
                    "update allowed: {}",
                    service.update_allowed().to_string().value()
                )?;
            }
            Self::Get => {
                writeln!(out, "datamark: {}", service.get()?.value())?;
            }
            Self::Refresh => {
                let datamark = service.refresh_and_get()?;
                writeln!(out, "{}", "refreshed".success())?;
                writeln!(out, "datamark: {}", datamark.value())?;
            }
            Self::Update(command) => command.run(service, out)?,
            Self::Completions(command) => command.run(),
        }
        Ok(())
    }
}

fn validation_hint() -> String {
    format!("A datamark is at most {MAX_LENGTH} characters of A-Z, a-z, 0-9, '.', '_' and '-'.")
}

fn print_validation_hint() {
    eprintln!("{}", validation_hint().hint());
}

/// Returns advice for a failed datamark operation, if there is any to give.
fn error_hint(error: &datamark::Error) -> Option<String> {
    if error.is_illegal_datamark() {
        return Some(validation_hint());
    }
    error
        .locator()
        .map(|locator| format!("Check that {locator} exists and is accessible."))
}
