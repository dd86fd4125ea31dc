//! CLI argument parsing using clap.

use std::path::PathBuf;

use clap::Parser;

/// Interactive shell for issuing CIM operations against a WBEM server.
///
/// SERVER is a host name, a full URL (https://host:5989), or the path of a
/// local socket (anything starting with "/").
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "wbemcli")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Host name, URL, or local socket path (default: settings, then WBEM_SERVER)
    pub server: Option<String>,

    /// Port to connect to (default: 5989 for https, 5988 for http)
    #[arg(long)]
    pub port: Option<u16>,

    /// Use http instead of https
    #[arg(long)]
    pub no_ssl: bool,

    /// Default namespace (default: root/cimv2)
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,

    /// User name for HTTP Basic authentication
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Password (default: settings, then WBEM_PASSWORD)
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Skip server certificate verification
    #[arg(long)]
    pub no_verify: bool,

    /// Extra PEM root certificate for https
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,

    /// Execute a single command and exit
    #[arg(short = 'e', long, conflicts_with = "file")]
    pub execute: Option<String>,

    /// Execute commands from a file (one per line) and exit
    #[arg(short = 'f', long, conflicts_with = "execute")]
    pub file: Option<PathBuf>,

    /// Print results as JSON instead of MOF
    #[arg(long)]
    pub json: bool,

    /// Show debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Trace raw CIM-XML requests and responses
    #[arg(long)]
    pub debug: bool,
}
