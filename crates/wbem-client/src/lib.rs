//! CIM-XML over HTTP(S) client for WBEM servers.
//!
//! This crate encodes CIM operations as DMTF CIM-XML requests, posts them
//! to a WBEM server, and decodes the responses into typed values. Every
//! operation is one request and one response; a failed call is returned to
//! the caller as is.
//!
//! # Example
//!
//! ```rust,no_run
//! use wbem_client::{ConnectionConfig, EnumerateInstancesOptions, WbemConnection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConnectionConfig::new("https://cimom.example:5989")
//!         .credentials("admin", "secret")
//!         .default_namespace("root/cimv2");
//!     let conn = WbemConnection::new(config)?;
//!
//!     let options = EnumerateInstancesOptions::default().local_only(false);
//!     for instance in conn.enumerate_instances("CIM_ComputerSystem", &options).await? {
//!         println!("{}", wbem_client::mof::instance_to_mof(&instance));
//!     }
//!     Ok(())
//! }
//! ```

mod client;
mod datetime;
mod error;
mod objects;
mod options;
mod path;
mod request;
mod status;
mod transport;
mod value;

pub mod mof;
pub mod response;
pub mod xml;

pub use client::{
    build_url, ConnectionConfig, Credentials, WbemConnection, DEFAULT_HTTPS_PORT,
    DEFAULT_HTTP_PORT, DEFAULT_NAMESPACE, DEFAULT_TIMEOUT,
};
pub use datetime::{CimDateTime, CimInterval};
pub use error::{CimError, Error, Result, TransportError, TransportErrorKind};
pub use objects::{
    AssociatedObject, CimClass, CimInstance, CimMethod, CimParameter, CimProperty, CimQualifier,
    CimQualifierDeclaration, MethodResult, QualifierFlavors, QualifierScopes,
};
pub use options::{
    AssociatorNamesOptions, AssociatorsOptions, EnumerateClassNamesOptions,
    EnumerateClassesOptions, EnumerateInstanceNamesOptions, EnumerateInstancesOptions,
    GetClassOptions, GetInstanceOptions, ModifyInstanceOptions, ReferenceNamesOptions,
    ReferencesOptions,
};
pub use path::{CimClassName, CimInstanceName, CimObjectPath, KeyBinding};
pub use status::CimStatusCode;
pub use transport::{HttpRequest, HttpTransport, Transport, UnixSocketTransport};
pub use value::{CimArray, CimType, CimValue};

/// Namespaces most WBEM servers provide.
pub mod namespaces {
    /// Default namespace for the CIM schema
    pub const CIMV2: &str = "root/cimv2";
    /// DMTF interop namespace (profiles, server information)
    pub const INTEROP: &str = "interop";
    /// Legacy spelling of the interop namespace used by older servers
    pub const ROOT_INTEROP: &str = "root/interop";
}
