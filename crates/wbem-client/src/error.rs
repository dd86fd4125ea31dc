//! Error types for the WBEM client.

use thiserror::Error;

use crate::status::CimStatusCode;

/// Classification of a transport-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, reset, or host unreachable
    Connect,
    /// TLS handshake or certificate validation failure
    Tls,
    /// The per-request timeout elapsed
    Timeout,
    /// Server rejected the credentials (HTTP 401)
    Authentication,
    /// Server answered with a non-200 HTTP status
    HttpStatus(u16),
    /// Local socket I/O or HTTP framing failure
    Io,
    /// Anything else reported by the HTTP stack
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => f.write_str("connection failed"),
            Self::Tls => f.write_str("TLS failure"),
            Self::Timeout => f.write_str("timed out"),
            Self::Authentication => f.write_str("authentication failed"),
            Self::HttpStatus(status) => write!(f, "HTTP status {}", status),
            Self::Io => f.write_str("I/O error"),
            Self::Other => f.write_str("transport error"),
        }
    }
}

/// A failure to complete the HTTP round trip. Never carries a CIM status.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        let cause = source_kind(&err);
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            match cause {
                Some(kind @ (TransportErrorKind::Tls | TransportErrorKind::Timeout)) => kind,
                _ => TransportErrorKind::Connect,
            }
        } else if let Some(status) = err.status() {
            TransportErrorKind::HttpStatus(status.as_u16())
        } else {
            cause.unwrap_or(TransportErrorKind::Other)
        };
        TransportError::new(kind, message)
    }
}

impl From<hyper::Error> for TransportError {
    fn from(err: hyper::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else {
            source_kind(&err).unwrap_or(TransportErrorKind::Io)
        };
        TransportError::new(kind, error_chain(&err))
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::new(io_kind(&err), err.to_string())
    }
}

fn io_kind(err: &std::io::Error) -> TransportErrorKind {
    use std::io::ErrorKind;

    if err.get_ref().is_some_and(|inner| inner.is::<rustls::Error>()) {
        return TransportErrorKind::Tls;
    }
    match err.kind() {
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotFound
        | ErrorKind::PermissionDenied => TransportErrorKind::Connect,
        ErrorKind::TimedOut => TransportErrorKind::Timeout,
        _ => TransportErrorKind::Io,
    }
}

/// Kind of the first rustls or I/O error in the source chain of `err`.
fn source_kind(err: &(dyn std::error::Error + 'static)) -> Option<TransportErrorKind> {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.is::<rustls::Error>() {
            return Some(TransportErrorKind::Tls);
        }
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return Some(io_kind(io));
        }
        source = cause.source();
    }
    None
}

/// Render an error with its source chain, the HTTP stacks hide the useful part there.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// A well-formed fault returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CimError {
    pub status: CimStatusCode,
    pub description: Option<String>,
}

impl CimError {
    pub fn new(status: CimStatusCode, description: Option<String>) -> Self {
        Self {
            status,
            description,
        }
    }

    pub fn code(&self) -> u32 {
        self.status.code()
    }
}

impl std::fmt::Display for CimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.status, description),
            None => write!(f, "{}: {}", self.status, self.status.description()),
        }
    }
}

impl std::error::Error for CimError {}

/// Errors that can occur when issuing a CIM operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The request did not complete at the HTTP level
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server returned a CIM fault
    #[error("CIM error {0}")]
    Cim(#[from] CimError),

    /// The response body could not be understood
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid connection or request configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    pub fn is_cim(&self) -> bool {
        matches!(self, Error::Cim(_))
    }

    /// Status code of a CIM fault, `None` for every other error kind.
    pub fn cim_status(&self) -> Option<CimStatusCode> {
        match self {
            Error::Cim(err) => Some(err.status),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Protocol(format!("Malformed XML: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cim_error_display_prefers_server_description() {
        let err = CimError::new(CimStatusCode::NotFound, Some("no such instance".into()));
        assert_eq!(err.to_string(), "6 (CIM_ERR_NOT_FOUND): no such instance");

        let err = CimError::new(CimStatusCode::InvalidClass, None);
        assert_eq!(
            err.to_string(),
            "5 (CIM_ERR_INVALID_CLASS): The specified class does not exist"
        );
    }

    #[test]
    fn error_kinds_are_disjoint() {
        let transport: Error = TransportError::new(TransportErrorKind::Timeout, "slow").into();
        assert!(transport.is_transport());
        assert!(!transport.is_cim());
        assert_eq!(transport.cim_status(), None);

        let cim: Error = CimError::new(CimStatusCode::Failed, None).into();
        assert!(cim.is_cim());
        assert_eq!(cim.cim_status(), Some(CimStatusCode::Failed));

        let protocol = Error::protocol("garbage");
        assert!(!protocol.is_cim() && !protocol.is_transport());
    }

    #[test]
    fn io_errors_are_classified() {
        let refused = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert_eq!(TransportError::from(refused).kind, TransportErrorKind::Connect);

        let timed_out = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert!(TransportError::from(timed_out).is_timeout());

        let other = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
        assert_eq!(TransportError::from(other).kind, TransportErrorKind::Io);
    }

    #[derive(Debug)]
    struct Wrapped(Box<dyn std::error::Error + Send + Sync>);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("client error")
        }
    }

    impl std::error::Error for Wrapped {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(self.0.as_ref())
        }
    }

    #[test]
    fn rustls_failures_are_tls_regardless_of_wording() {
        let handshake = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::General("peer sent no certificates".into()),
        );
        assert_eq!(TransportError::from(handshake).kind, TransportErrorKind::Tls);

        let wrapped = Wrapped(Box::new(rustls::Error::DecryptError));
        assert_eq!(source_kind(&wrapped), Some(TransportErrorKind::Tls));
    }

    #[test]
    fn source_chain_reaches_nested_io_error() {
        let inner = Wrapped(Box::new(std::io::Error::from(
            std::io::ErrorKind::ConnectionRefused,
        )));
        let outer = Wrapped(Box::new(inner));
        assert_eq!(source_kind(&outer), Some(TransportErrorKind::Connect));

        // "ssl" in a message is not a TLS failure by itself
        let plain = Wrapped(Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            "ssl-offload proxy closed the stream",
        )));
        assert_eq!(source_kind(&plain), Some(TransportErrorKind::Io));
    }
}
