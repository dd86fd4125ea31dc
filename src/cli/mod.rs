//! CLI module for wbemcli.
//!
//! The shell is a thin layer over `wbem_client::WbemConnection`: it turns
//! command lines into operation calls and prints the results.
//!
//! ```text
//! +-------------+     +-------------+     +----------------+     +-----------+
//! | repl.rs /   | --> | commands.rs | --> | WbemConnection | --> | output.rs |
//! | runner.rs   |     | (parse)     |     | (wbem-client)  |     | (MOF/JSON)|
//! +-------------+     +-------------+     +----------------+     +-----------+
//! ```
//!
//! # REPL Mode
//!
//! When no command is provided via `-e` or `-f`, the CLI enters
//! interactive REPL mode. See `repl.rs` for details.

mod args;
mod bootstrap;
mod commands;
mod output;
mod repl;
mod runner;

#[cfg(test)]
mod test_support;

pub use args::Args;
pub use bootstrap::{connection_config, initialize, CliContext};
pub use commands::{execute, help_text, Command, CommandOptions, CommandOutput, Operation};
pub use output::render;
pub use repl::{run_repl, ShellInput};
pub use runner::{execute_batch, execute_once, run_command};
