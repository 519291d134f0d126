use crate::config;
use crate::error::{OpError, ValidationError};
use crate::i18n::Catalog;
use crate::model::Instance;
use crate::ops::{self, rename};
use crate::registry::Registry;
use crate::runner::WslRunner;
use crate::supervisor::{self, TaskStatus};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "wsl-orchestrator",
    version,
    about = "Manage WSL distribution lifecycle (list, start, stop, rename) with an optional TUI"
)]
pub struct Cli {
    /// Control tool binary to invoke
    #[arg(long, default_value = "wsl")]
    pub tool: PathBuf,

    /// Display language (overrides the saved setting)
    #[arg(long)]
    pub lang: Option<String>,

    /// Delay before re-listing after a detached start
    #[arg(long, default_value = "1500ms")]
    pub start_refresh_delay: humantime::Duration,

    /// Interval at which an in-flight rename is polled for completion
    #[arg(long, default_value = "250ms")]
    pub rename_poll_interval: humantime::Duration,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List registered distributions
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start a distribution in a new detached session
    Start { name: String },
    /// Open an interactive shell in a distribution
    Shell { name: String },
    /// Terminate a running distribution
    Terminate {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Shut down all running distributions
    Shutdown {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Rename a stopped distribution (export, unregister, re-import)
    Rename {
        old_name: String,
        new_name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

pub async fn run(args: Cli) -> Result<()> {
    let settings = config::load();
    let language = args.lang.clone().unwrap_or(settings.language.clone());
    let catalog = Catalog::new(&language);

    let Some(command) = args.command.clone() else {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args, settings, catalog).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_headless(&args, &catalog, Command::List { json: false }).await;
        }
    };

    run_headless(&args, &catalog, command).await
}

/// One-shot subcommand execution; diagnostics on stderr, results on stdout.
async fn run_headless(args: &Cli, catalog: &Catalog, command: Command) -> Result<()> {
    let runner = Arc::new(WslRunner::with_program(&args.tool));

    match command {
        Command::List { json } => {
            let registry = refreshed_registry(&runner).await?;
            print_listing(registry.all(), json)?;
        }
        Command::Start { name } => {
            let registry = refreshed_registry(&runner).await?;
            ops::start(&*runner, &registry, &name)?;
            // Give the tool time to flip the state before reporting it.
            tokio::time::sleep(args.start_refresh_delay.into()).await;
            let registry = refreshed_registry(&runner).await?;
            if let Some(inst) = registry.get(&name) {
                eprintln!("{}: {}", inst.name, inst.state);
            }
        }
        Command::Shell { name } => {
            let registry = refreshed_registry(&runner).await?;
            ops::open_shell(&*runner, &registry, &name)?;
        }
        Command::Terminate { name, yes } => {
            let registry = refreshed_registry(&runner).await?;
            if !registry.contains(&name) {
                return Err(OpError::Validation(ValidationError::UnknownInstance(name)).into());
            }
            let prompt = catalog.format("confirm_stop_message", &[("distro_name", &name)]);
            if !(yes || confirm(&prompt)?) {
                return Ok(());
            }
            let r = Arc::clone(&runner);
            let reg = registry.clone();
            tokio::task::spawn_blocking(move || ops::terminate(&*r, &reg, &name))
                .await
                .context("terminate task failed")??;
        }
        Command::Shutdown { yes } => {
            let prompt = catalog.get("confirm_shutdown_message");
            if !(yes || confirm(&prompt)?) {
                return Ok(());
            }
            let r = Arc::clone(&runner);
            tokio::task::spawn_blocking(move || ops::shutdown_all(&*r))
                .await
                .context("shutdown task failed")??;
        }
        Command::Rename {
            old_name,
            new_name,
            yes,
        } => {
            run_rename(args, catalog, &runner, &old_name, &new_name, yes).await?;
        }
    }
    Ok(())
}

/// Validates, confirms and supervises the compound rename, polling for
/// completion instead of blocking on a join.
async fn run_rename(
    args: &Cli,
    catalog: &Catalog,
    runner: &Arc<WslRunner>,
    old_name: &str,
    new_name: &str,
    yes: bool,
) -> Result<()> {
    let registry = refreshed_registry(runner).await?;
    rename::validate(&registry, old_name, new_name).map_err(OpError::Validation)?;

    let prompt = catalog.format(
        "rename_confirm_message",
        &[("old_name", old_name), ("new_name", new_name)],
    );
    if !(yes || confirm(&prompt)?) {
        return Ok(());
    }

    eprintln!("{}", catalog.get("rename_progress_message"));
    let plan = rename::RenamePlan::new(old_name, new_name)?;
    let worker = Arc::clone(runner);
    let handle = supervisor::submit(move || rename::execute(&*worker, &plan));

    let result = loop {
        match handle.poll() {
            TaskStatus::Finished(result) => break result,
            TaskStatus::Pending => {
                tokio::time::sleep(args.rename_poll_interval.into()).await
            }
        }
    };

    match result {
        Ok(()) => {
            eprintln!(
                "{}",
                catalog.format("rename_success_message", &[("new_name", new_name)])
            );
            Ok(())
        }
        Err(err) => {
            if let Some(archive) = err.archive_path() {
                eprintln!(
                    "{}",
                    catalog.format(
                        "rename_archive_note",
                        &[("archive_path", &archive.display().to_string())],
                    )
                );
            }
            Err(err.into())
        }
    }
}

async fn refreshed_registry(runner: &Arc<WslRunner>) -> Result<Registry> {
    let r = Arc::clone(runner);
    tokio::task::spawn_blocking(move || {
        let mut registry = Registry::new();
        let res = registry.refresh(&*r);
        (registry, res)
    })
    .await
    .context("listing task failed")
    .and_then(|(registry, res)| {
        res.context("could not list distributions")?;
        Ok(registry)
    })
}

fn print_listing(instances: &[Instance], json: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        let raw = serde_json::to_string_pretty(instances)?;
        writeln!(out, "{raw}")?;
        return Ok(());
    }
    let width = instances
        .iter()
        .map(|i| i.name.len())
        .chain(std::iter::once(4))
        .max()
        .unwrap_or(4);
    writeln!(out, "  {:width$}  {:12}  VERSION", "NAME", "STATE")?;
    for inst in instances {
        let marker = if inst.is_default { '*' } else { ' ' };
        writeln!(
            out,
            "{marker} {:width$}  {:12}  {}",
            inst.name,
            inst.state.to_string(),
            inst.version
        )?;
    }
    Ok(())
}

/// y/N prompt on stderr, answer read from stdin.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| anyhow!("could not read confirmation: {e}"))?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
