//! wbemcli: an interactive shell for CIM operations against WBEM servers.
//!
//! The protocol engine lives in the `wbem-client` crate; this crate holds
//! argument parsing, the settings file, the REPL and result output.

pub mod cli;
pub mod settings;
