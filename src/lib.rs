//! taskzen - Personal Task Management Library
//!
//! This library provides the core functionality for the tz CLI tool:
//! tasks with notes, due dates, and ordered subtasks, behind a session
//! gate and a swappable task store.
//!
//! # Core Concepts
//!
//! - **Tasks**: Title, optional notes, due date, and ordered subtasks
//! - **Derived Completion**: Subtask toggles roll up into the parent task
//! - **Session Gate**: All task access requires a resolved identity
//! - **Task Store**: A common adapter over remote-style and local backends
//! - **Live Feeds**: Snapshot subscriptions that re-emit on every change
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `taskzen.toml`
//! - `error`: Error types and result aliases
//! - `task`: Task data model and completion/ordering rules
//! - `session`: Identity providers and the session gate
//! - `store`: Task store adapter, snapshot feeds, and backends
//! - `lock`: File locking and atomic operations for concurrency safety
//! - `output`: Human and JSON output envelopes
//! - `ui`: Live terminal task list

pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod output;
pub mod session;
pub mod store;
pub mod task;
pub mod ui;

pub use error::{Error, Result};
