//! CLI bootstrap: logging, settings, and the WBEM connection.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use wbem_client::{build_url, ConnectionConfig, WbemConnection, DEFAULT_NAMESPACE};

use crate::settings::{get_with_env_fallback, OutputFormat, SettingsManager, WbemSettings};

use super::args::Args;

/// Everything a command needs at run time.
pub struct CliContext {
    pub connection: WbemConnection,

    /// Resolved output format (`--json` or the settings file)
    pub format: OutputFormat,

    /// Command-line arguments
    pub args: Args,
}

/// Initialize logging, load settings and open the connection.
pub async fn initialize(args: &Args) -> Result<CliContext> {
    init_logging(args)?;

    let settings_manager = SettingsManager::new()
        .await
        .context("Failed to initialize settings manager")?;

    // Creates the template on first run
    if let Err(e) = settings_manager.ensure_settings_file().await {
        tracing::warn!("Failed to create settings template: {}", e);
    }

    let settings = settings_manager.get().await;
    if args.verbose {
        eprintln!(
            "[cli] Settings loaded from {}",
            settings_manager.path().display()
        );
    }

    let config = connection_config(args, &settings)?;
    let connection = WbemConnection::new(config).context("Failed to set up connection")?;
    tracing::debug!(url = connection.url(), "Connection configured");

    Ok(CliContext {
        connection,
        format: output_format(args, &settings),
        args: args.clone(),
    })
}

/// Log level from verbosity: `warn` by default, `debug` with `-v`,
/// `trace` with `--debug`. `RUST_LOG` adds to these directives.
fn log_level(args: &Args) -> &'static str {
    if args.debug {
        "trace"
    } else if args.verbose {
        "debug"
    } else {
        "warn"
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let level = log_level(args);
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("wbemcli={}", level).parse()?)
        .add_directive(format!("wbem_client={}", level).parse()?);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

fn output_format(args: &Args, settings: &WbemSettings) -> OutputFormat {
    if args.json {
        OutputFormat::Json
    } else {
        settings.output.format
    }
}

/// Build the connection config. Flags win over the settings file, which
/// wins over `WBEM_SERVER` / `WBEM_USER` / `WBEM_PASSWORD`.
pub fn connection_config(args: &Args, settings: &WbemSettings) -> Result<ConnectionConfig> {
    let conn = &settings.connection;

    let server = args
        .server
        .clone()
        .or_else(|| get_with_env_fallback(&conn.server, &["WBEM_SERVER"], None));
    let Some(server) = server else {
        bail!(
            "No server given. Pass SERVER, set connection.server in {}, or set WBEM_SERVER",
            crate::settings::settings_path().display()
        );
    };

    let no_ssl = args.no_ssl || conn.no_ssl;
    let port = args.port.or(conn.port);
    let url = build_url(&server, no_ssl, port);

    let namespace = args
        .namespace
        .clone()
        .or_else(|| conn.namespace.clone())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

    let timeout = Duration::from_secs(args.timeout.unwrap_or(conn.timeout_secs));

    let mut config = ConnectionConfig::new(url)
        .default_namespace(namespace)
        .timeout(timeout)
        .verify_certificates(!args.no_verify && conn.verify_certificates)
        .debug(args.debug);

    if let Some(ca_cert) = args
        .ca_cert
        .clone()
        .or_else(|| conn.ca_cert.as_ref().map(PathBuf::from))
    {
        config = config.ca_cert(ca_cert);
    }

    let user = args
        .user
        .clone()
        .or_else(|| get_with_env_fallback(&conn.user, &["WBEM_USER"], None));
    let password = args
        .password
        .clone()
        .or_else(|| get_with_env_fallback(&conn.password, &["WBEM_PASSWORD"], None));

    match (user, password) {
        (Some(user), Some(password)) => config = config.credentials(user, password),
        (Some(user), None) => bail!(
            "No password for user '{}'. Pass --password or set WBEM_PASSWORD",
            user
        ),
        (None, Some(_)) => bail!("A password was given without a user. Pass --user"),
        (None, None) => {}
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn settings_with_server(server: &str) -> WbemSettings {
        let mut settings = WbemSettings::default();
        settings.connection.server = Some(server.to_string());
        settings
    }

    #[test]
    fn log_level_follows_verbosity() {
        assert_eq!(log_level(&Args::parse_from(["wbemcli"])), "warn");
        assert_eq!(log_level(&Args::parse_from(["wbemcli", "-v"])), "debug");
        assert_eq!(log_level(&Args::parse_from(["wbemcli", "-v", "--debug"])), "trace");
    }

    #[test]
    fn flags_build_https_url_with_port() {
        let args = Args::parse_from(["wbemcli", "cimom.example", "--port", "15989"]);
        let config = connection_config(&args, &WbemSettings::default()).unwrap();
        assert_eq!(config.url, "https://cimom.example:15989");
        assert_eq!(config.default_namespace, "root/cimv2");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.verify_certificates);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn settings_fill_in_missing_flags() {
        let mut settings = settings_with_server("cimom.example");
        settings.connection.no_ssl = true;
        settings.connection.namespace = Some("root/interop".into());
        settings.connection.user = Some("admin".into());
        settings.connection.password = Some("secret".into());
        settings.connection.timeout_secs = 5;
        settings.connection.ca_cert = Some("/etc/ca.pem".into());

        let config = connection_config(&Args::parse_from(["wbemcli"]), &settings).unwrap();
        assert_eq!(config.url, "http://cimom.example");
        assert_eq!(config.default_namespace, "root/interop");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.ca_cert, Some(PathBuf::from("/etc/ca.pem")));
        let creds = config.credentials.unwrap();
        assert_eq!(creds.user, "admin");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn flags_override_settings() {
        let mut settings = settings_with_server("from-settings");
        settings.connection.user = Some("settings-user".into());
        settings.connection.password = Some("settings-pw".into());
        let args = Args::parse_from([
            "wbemcli", "from-flags", "-u", "flag-user", "-p", "flag-pw", "-n", "ns1", "--no-verify",
            "--debug",
        ]);

        let config = connection_config(&args, &settings).unwrap();
        assert_eq!(config.url, "https://from-flags");
        assert_eq!(config.default_namespace, "ns1");
        assert!(!config.verify_certificates);
        assert!(config.debug);
        let creds = config.credentials.unwrap();
        assert_eq!(creds.user, "flag-user");
        assert_eq!(creds.password, "flag-pw");
    }

    #[test]
    fn socket_path_is_used_as_is() {
        let args = Args::parse_from(["wbemcli", "/var/run/tog-pegasus/cimxml.socket", "--no-ssl"]);
        let config = connection_config(&args, &WbemSettings::default()).unwrap();
        assert_eq!(config.url, "/var/run/tog-pegasus/cimxml.socket");
    }

    #[test]
    fn user_without_password_is_an_error() {
        if std::env::var("WBEM_PASSWORD").is_ok() {
            return;
        }
        let args = Args::parse_from(["wbemcli", "cimom", "-u", "admin"]);
        let err = connection_config(&args, &WbemSettings::default()).unwrap_err();
        assert!(err.to_string().contains("--password"));
    }

    #[test]
    fn password_without_user_is_an_error() {
        if std::env::var("WBEM_USER").is_ok() {
            return;
        }
        let args = Args::parse_from(["wbemcli", "cimom", "-p", "secret"]);
        let err = connection_config(&args, &WbemSettings::default()).unwrap_err();
        assert!(err.to_string().contains("without a user"));
    }

    #[test]
    fn missing_server_is_an_error() {
        if std::env::var("WBEM_SERVER").is_ok() {
            return;
        }
        let err = connection_config(&Args::parse_from(["wbemcli"]), &WbemSettings::default())
            .unwrap_err();
        assert!(err.to_string().contains("No server given"));
    }

    #[test]
    fn json_flag_overrides_settings_format() {
        let settings = WbemSettings::default();
        assert_eq!(
            output_format(&Args::parse_from(["wbemcli"]), &settings),
            OutputFormat::Mof
        );
        assert_eq!(
            output_format(&Args::parse_from(["wbemcli", "--json"]), &settings),
            OutputFormat::Json
        );
    }
}
