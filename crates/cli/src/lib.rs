// crates/cli/src/lib.rs
//! bqops command-line surface: argument definitions, environment-backed
//! configuration, and the command handlers that drive a `Warehouse`.

pub mod args;
pub mod commands;
pub mod config;

pub use args::{Cli, Command};
pub use commands::{App, CommandError};
pub use config::Config;
