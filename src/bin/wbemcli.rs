//! wbemcli - Interactive shell for WBEM servers
//!
//! # Usage
//!
//! ```bash
//! # Interactive session over https (port 5989)
//! ./target/debug/wbemcli cimom.example -u admin -p secret
//!
//! # Single command, plain http on a custom port
//! ./target/debug/wbemcli cimom.example --no-ssl --port 15988 -e "ecn di=true"
//!
//! # JSON output for scripting
//! ./target/debug/wbemcli cimom.example -u admin -e "ei CIM_ComputerSystem" --json | jq .
//!
//! # Local socket
//! ./target/debug/wbemcli /var/run/tog-pegasus/cimxml.socket
//! ```

use anyhow::Result;
use clap::Parser;

use wbemcli_lib::cli::{execute_batch, execute_once, initialize, run_repl, Args};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let ctx = initialize(&args).await?;

    if let Some(ref line) = args.execute {
        execute_once(&ctx, line).await
    } else if let Some(ref file) = args.file {
        execute_batch(&ctx, file).await
    } else {
        run_repl(&ctx).await
    }
}
