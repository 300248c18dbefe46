//! Command-line interface for tz
//!
//! This module defines the CLI structure using clap derive macros.
//! Command implementations live in the `session` and `task` submodules.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{self, Config};
use crate::error::Result;
use crate::session::{FileIdentityProvider, SessionGate};
use crate::store::LocalStore;

mod session;
mod task;

/// tz - TaskZen
///
/// A personal task manager: tasks with notes, due dates, and subtasks,
/// persisted per signed-in identity and reflected live in the viewer.
#[derive(Parser, Debug)]
#[command(name = "tz")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file (defaults to the platform config dir)
    #[arg(long, global = true, env = "TASKZEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in (federated by default, or as a guest)
    Login {
        /// Sign in anonymously with a transient guest identity
        #[arg(long)]
        guest: bool,
    },

    /// Sign out and discard the local session
    Logout,

    /// Show the signed-in identity
    Whoami,

    /// Create a task
    Add {
        /// Task title
        title: String,

        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,

        /// Due date: YYYY-MM-DD, "today", or "tomorrow" (default: tomorrow)
        #[arg(long)]
        due: Option<String>,

        /// Subtask text (repeatable)
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
    },

    /// List tasks in display order
    List,

    /// Edit a task's fields
    Edit {
        /// Task id (or unique prefix)
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New notes (an empty string clears them)
        #[arg(long)]
        notes: Option<String>,

        /// New due date: YYYY-MM-DD, "today", or "tomorrow"
        #[arg(long)]
        due: Option<String>,

        /// Append a subtask (repeatable)
        #[arg(long = "add-subtask")]
        add_subtasks: Vec<String>,

        /// Remove a subtask by id or 1-based position (repeatable)
        #[arg(long = "remove-subtask")]
        remove_subtasks: Vec<String>,
    },

    /// Mark a task complete (subtasks keep their own states)
    Done {
        /// Task id (or unique prefix)
        id: String,
    },

    /// Mark a task not complete
    Undone {
        /// Task id (or unique prefix)
        id: String,
    },

    /// Mark a subtask complete (parent completion is re-derived)
    Check {
        /// Task id (or unique prefix)
        id: String,

        /// Subtask id or 1-based position
        subtask: String,
    },

    /// Mark a subtask not complete (parent completion is re-derived)
    Uncheck {
        /// Task id (or unique prefix)
        id: String,

        /// Subtask id or 1-based position
        subtask: String,
    },

    /// Delete a task (asks for confirmation)
    Rm {
        /// Task id (or unique prefix)
        id: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Live task viewer (updates as the store changes)
    Watch,
}

impl Cli {
    /// Execute the parsed command
    pub async fn run(self) -> Result<()> {
        let options = crate::output::OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let config_path = self.config.clone();

        match self.command {
            Commands::Login { guest } => session::login(config_path.as_deref(), guest, options),
            Commands::Logout => session::logout(config_path.as_deref(), options),
            Commands::Whoami => session::whoami(config_path.as_deref(), options),
            Commands::Add {
                title,
                notes,
                due,
                subtasks,
            } => {
                task::add(
                    task::AddOptions {
                        config: config_path,
                        title,
                        notes,
                        due,
                        subtasks,
                    },
                    options,
                )
                .await
            }
            Commands::List => task::list(config_path.as_deref(), options).await,
            Commands::Edit {
                id,
                title,
                notes,
                due,
                add_subtasks,
                remove_subtasks,
            } => {
                task::edit(
                    task::EditOptions {
                        config: config_path,
                        id,
                        title,
                        notes,
                        due,
                        add_subtasks,
                        remove_subtasks,
                    },
                    options,
                )
                .await
            }
            Commands::Done { id } => {
                task::set_completed(config_path.as_deref(), &id, true, options).await
            }
            Commands::Undone { id } => {
                task::set_completed(config_path.as_deref(), &id, false, options).await
            }
            Commands::Check { id, subtask } => {
                task::set_subtask(config_path.as_deref(), &id, &subtask, true, options).await
            }
            Commands::Uncheck { id, subtask } => {
                task::set_subtask(config_path.as_deref(), &id, &subtask, false, options).await
            }
            Commands::Rm { id, yes } => task::rm(config_path.as_deref(), &id, yes, options).await,
            Commands::Watch => task::watch(config_path.as_deref()).await,
        }
    }
}

/// Everything a command needs: config, session gate, and the task store.
///
/// Built per invocation and torn down when the process exits; the gate and
/// store are plain owned values, not globals.
pub(crate) struct AppContext {
    pub config: Config,
    pub gate: SessionGate<FileIdentityProvider>,
    pub store: LocalStore,
    pub warnings: Vec<String>,
}

pub(crate) fn open_context(config_path: Option<&std::path::Path>) -> Result<AppContext> {
    let config = Config::load_or_default(config_path)?;
    let data_dir = config::data_dir()?;

    let mut warnings = Vec::new();
    if config.backend.mode == "remote" {
        let reason = if config.backend.remote_configured() {
            "no remote transport is bundled with this build"
        } else {
            "backend.project/backend.api_key missing"
        };
        tracing::warn!(reason, "remote backend unavailable; using local fallback");
        warnings.push(format!(
            "remote backend unavailable ({reason}); using local fallback store"
        ));
    }

    let provider = FileIdentityProvider::new(&data_dir, config.federated_token());
    let mut gate = SessionGate::new(provider);
    gate.resolve();

    let store = LocalStore::open(data_dir.join("store"))?;

    Ok(AppContext {
        config,
        gate,
        store,
        warnings,
    })
}
