//! CLI execution runner.
//!
//! Parses one command line, runs it against the connection and prints the
//! rendered result to stdout.

use std::path::Path;

use anyhow::{Context, Result};
use wbem_client::WbemConnection;

use super::bootstrap::CliContext;
use super::commands::{execute, Command};
use super::output::render;
use crate::settings::OutputFormat;

/// Run a command line and return the rendered result.
pub async fn run_command(
    conn: &WbemConnection,
    line: &str,
    format: OutputFormat,
) -> Result<String> {
    let command = Command::parse(line)?;
    tracing::debug!(operation = ?command.operation, "Executing command");
    let output = execute(conn, &command).await?;
    render(&output, format)
}

/// Execute a single command and print its result.
pub async fn execute_once(ctx: &CliContext, line: &str) -> Result<()> {
    let text = run_command(&ctx.connection, line, ctx.format).await?;
    print!("{}", text);
    Ok(())
}

/// Execute commands from a file, one per line.
///
/// Lines starting with `#` are comments. Execution stops on the first error.
pub async fn execute_batch(ctx: &CliContext, file_path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .with_context(|| format!("Failed to read command file: {}", file_path.display()))?;

    let commands: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();

    if commands.is_empty() {
        anyhow::bail!("No commands found in file: {}", file_path.display());
    }

    let total = commands.len();
    for (i, line) in commands.iter().enumerate() {
        if ctx.args.verbose {
            eprintln!("[batch] [{}/{}] {}", i + 1, total, line);
        }
        execute_once(ctx, line)
            .await
            .with_context(|| format!("Command {} of {} failed: {}", i + 1, total, line))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::{scripted_connection, ScriptedServer};

    #[tokio::test]
    async fn run_command_renders_mof() {
        let server = ScriptedServer::new();
        server.respond(
            "EnumerateClassNames",
            r#"<IRETURNVALUE><CLASSNAME NAME="CIM_ManagedElement"/></IRETURNVALUE>"#,
        );
        let conn = scripted_connection(&server);

        let text = run_command(&conn, "ecn", OutputFormat::Mof).await.unwrap();
        assert_eq!(text, "CIM_ManagedElement\n");
    }

    #[tokio::test]
    async fn run_command_surfaces_cim_errors() {
        let server = ScriptedServer::new();
        server.respond(
            "GetClass",
            r#"<ERROR CODE="5" DESCRIPTION="No such class"/>"#,
        );
        let conn = scripted_connection(&server);

        let err = run_command(&conn, "gc CIM_Nope", OutputFormat::Mof)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No such class"));
    }

    #[tokio::test]
    async fn run_command_rejects_unknown_commands() {
        let server = ScriptedServer::new();
        let conn = scripted_connection(&server);
        let err = run_command(&conn, "frobnicate", OutputFormat::Mof)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown command"));
        assert!(server.methods().is_empty());
    }
}
