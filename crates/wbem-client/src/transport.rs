//! HTTP transports that carry CIM-XML requests to a WBEM server.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::error::{Error, Result, TransportError, TransportErrorKind};

/// Path every CIM-XML request is posted to.
pub const CIMOM_PATH: &str = "/cimom";

pub const CONTENT_TYPE_XML: &str = "application/xml; charset=\"utf-8\"";

/// A fully prepared CIM-XML POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Extra headers besides `Content-Type`, in send order
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sends one request and returns the body of a 200 response.
///
/// Implementations must be usable from several tasks at once.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    async fn send(&self, request: HttpRequest) -> std::result::Result<String, TransportError>;
}

/// Map a non-200 status to the matching transport error.
fn status_error(status: u16, cim_error: Option<&str>) -> TransportError {
    let reason = StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("");
    let mut message = format!("Server returned HTTP {} {}", status, reason)
        .trim_end()
        .to_string();
    if let Some(cim_error) = cim_error {
        message.push_str(&format!(" (CIMError: {})", cim_error));
    }
    let kind = if status == 401 {
        TransportErrorKind::Authentication
    } else {
        TransportErrorKind::HttpStatus(status)
    };
    TransportError::new(kind, message)
}

/// HTTP(S) transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// `base_url` is `scheme://host:port` without a path.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        verify_certificates: bool,
        ca_cert: Option<&PathBuf>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_certificates);

        if let Some(path) = ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                Error::Config(format!("Cannot read CA certificate {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                Error::Config(format!("Invalid CA certificate {}: {}", path.display(), e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), CIMOM_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn header_map(request: &HttpRequest) -> std::result::Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_XML));
    for (name, value) in &request.headers {
        let invalid = |e: &dyn fmt::Display| {
            TransportError::new(
                TransportErrorKind::Other,
                format!("Invalid header {}: {}", name, e),
            )
        };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(&e))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| invalid(&e))?;
        if header_name == AUTHORIZATION {
            let mut sensitive = header_value;
            sensitive.set_sensitive(true);
            headers.insert(header_name, sensitive);
        } else {
            headers.insert(header_name, header_value);
        }
    }
    Ok(headers)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<String, TransportError> {
        let headers = header_map(&request)?;
        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let cim_error = response
                .headers()
                .get("CIMError")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(status_error(status.as_u16(), cim_error.as_deref()));
        }
        Ok(response.text().await?)
    }
}

/// Largest response body a Unix-socket exchange will buffer.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

/// Local transport speaking HTTP/1.1 over a Unix-domain socket.
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    path: PathBuf,
    timeout: Duration,
    max_response_bytes: usize,
}

impl UnixSocketTransport {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }
}

#[cfg(unix)]
impl UnixSocketTransport {
    async fn exchange(&self, request: HttpRequest) -> std::result::Result<String, TransportError> {
        use bytes::Bytes;
        use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
        use hyper_util::rt::TokioIo;
        use reqwest::header::HOST;

        let mut headers = header_map(&request)?;
        headers.insert(HOST, HeaderValue::from_static("localhost"));

        let stream = tokio::net::UnixStream::connect(&self.path).await?;
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "Unix socket connection ended with an error");
            }
        });

        let mut outgoing = hyper::Request::post(CIMOM_PATH)
            .body(Full::new(Bytes::from(request.body)))
            .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()))?;
        *outgoing.headers_mut() = headers;

        let response = sender.send_request(outgoing).await?;
        let status = response.status();
        if status != StatusCode::OK {
            let cim_error = response
                .headers()
                .get("CIMError")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return Err(status_error(status.as_u16(), cim_error.as_deref()));
        }

        let body = Limited::new(response.into_body(), self.max_response_bytes)
            .collect()
            .await
            .map_err(|e| {
                let message = if e.downcast_ref::<LengthLimitError>().is_some() {
                    format!("Response body exceeds {} bytes", self.max_response_bytes)
                } else {
                    format!("Failed to read response body: {}", e)
                };
                TransportError::new(TransportErrorKind::Io, message)
            })?
            .to_bytes();

        String::from_utf8(body.to_vec()).map_err(|e| {
            TransportError::new(TransportErrorKind::Io, format!("Response is not UTF-8: {}", e))
        })
    }
}

#[cfg(unix)]
#[async_trait]
impl Transport for UnixSocketTransport {
    async fn send(&self, request: HttpRequest) -> std::result::Result<String, TransportError> {
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| {
                TransportError::new(
                    TransportErrorKind::Timeout,
                    format!("No response from {} within {:?}", self.path.display(), self.timeout),
                )
            })?
    }
}

#[cfg(not(unix))]
#[async_trait]
impl Transport for UnixSocketTransport {
    async fn send(&self, _request: HttpRequest) -> std::result::Result<String, TransportError> {
        Err(TransportError::new(
            TransportErrorKind::Other,
            "Unix-domain sockets are not supported on this platform",
        ))
    }
}
