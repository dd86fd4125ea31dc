//! Interactive shell loop.
//!
//! Each line is either a shell directive (`/quit`, `/exit`, `/q`, `h`,
//! `help`, `?`) or an operation such as `ei CIM_ComputerSystem lo=false`.
//! A failed operation prints its error and the session goes on.

use std::io::{self, BufRead, Write};

use anyhow::Result;

use super::bootstrap::CliContext;
use super::commands::help_text;
use super::runner::execute_once;

const PROMPT: &str = "wbemcli> ";

/// One line of shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellInput {
    Exit,
    Help,
    /// A `/word` the shell does not know
    UnknownDirective(String),
    Operation(String),
    Blank,
}

impl ShellInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ShellInput::Blank;
        }

        let lowered = line.to_ascii_lowercase();
        match lowered.as_str() {
            "/quit" | "/exit" | "/q" => ShellInput::Exit,
            "/help" | "/h" | "h" | "help" | "?" => ShellInput::Help,
            _ if line.starts_with('/') => ShellInput::UnknownDirective(line.to_string()),
            _ => ShellInput::Operation(line.to_string()),
        }
    }
}

/// Read and run lines until `/quit` or end of input.
pub async fn run_repl(ctx: &CliContext) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    eprintln!("{}", ctx.connection.connection_info());
    eprintln!("Type h for help, /quit to exit\n");

    loop {
        print!("{}", PROMPT);
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            eprintln!();
            return Ok(());
        }

        match ShellInput::parse(&line) {
            ShellInput::Blank => {}
            ShellInput::Exit => return Ok(()),
            ShellInput::Help => print!("{}", help_text(&ctx.connection.connection_info())),
            ShellInput::UnknownDirective(word) => {
                eprintln!("Unknown directive {}. Known: /quit, /exit, /q, /help", word);
            }
            ShellInput::Operation(command) => {
                if let Err(e) = execute_once(ctx, &command).await {
                    eprintln!("Error: {:#}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_directives_ignore_case() {
        for line in ["/quit", "/exit", "/q", "/QUIT", "/Exit", "/quit\n"] {
            assert_eq!(ShellInput::parse(line), ShellInput::Exit, "{:?}", line);
        }
    }

    #[test]
    fn help_words() {
        for line in ["h", "HELP", "?", "/help", " /h "] {
            assert_eq!(ShellInput::parse(line), ShellInput::Help, "{:?}", line);
        }
    }

    #[test]
    fn unknown_directive_is_reported() {
        assert_eq!(
            ShellInput::parse("/history"),
            ShellInput::UnknownDirective("/history".to_string())
        );
    }

    #[test]
    fn operations_keep_their_text() {
        assert_eq!(
            ShellInput::parse("  ei CIM_ComputerSystem lo=false \n"),
            ShellInput::Operation("ei CIM_ComputerSystem lo=false".to_string())
        );
        assert_eq!(
            ShellInput::parse(r#"gi root/cimv2:CIM_Foo.Name="/dev/sda""#),
            ShellInput::Operation(r#"gi root/cimv2:CIM_Foo.Name="/dev/sda""#.to_string())
        );
        // "h" alone is help, but a command starting with it is not
        assert_eq!(
            ShellInput::parse("help_me"),
            ShellInput::Operation("help_me".to_string())
        );
    }

    #[test]
    fn whitespace_is_blank() {
        for line in ["", "   ", "\t\n"] {
            assert_eq!(ShellInput::parse(line), ShellInput::Blank);
        }
    }
}
