//! `WbemConnection`: one async method per CIM operation.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::objects::{AssociatedObject, CimClass, CimInstance, CimQualifierDeclaration, MethodResult};
use crate::options::{
    AssociatorNamesOptions, AssociatorsOptions, EnumerateClassNamesOptions,
    EnumerateClassesOptions, EnumerateInstanceNamesOptions, EnumerateInstancesOptions,
    GetClassOptions, GetInstanceOptions, ModifyInstanceOptions, ReferenceNamesOptions,
    ReferencesOptions,
};
use crate::path::{CimInstanceName, CimObjectPath};
use crate::request::{self, EncodedRequest, IParam, IParamValue, PROTOCOL_VERSION};
use crate::response;
use crate::transport::{HttpRequest, HttpTransport, Transport, UnixSocketTransport};
use crate::value::CimValue;
use crate::xml::Element;

pub const DEFAULT_NAMESPACE: &str = "root/cimv2";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HTTP_PORT: u16 = 5988;
pub const DEFAULT_HTTPS_PORT: u16 = 5989;

/// First message ID used by a new connection.
const FIRST_MESSAGE_ID: u64 = 1001;

/// Username and password for HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    fn authorization(&self) -> String {
        format!(
            "Basic {}",
            BASE64.encode(format!("{}:{}", self.user, self.password))
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Settings a connection is created from.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub url: String,
    pub credentials: Option<Credentials>,
    pub default_namespace: String,
    /// Applied to each HTTP request
    pub timeout: Duration,
    pub verify_certificates: bool,
    /// Extra PEM root certificate for HTTPS
    pub ca_cert: Option<PathBuf>,
    /// Trace raw request and response bodies
    pub debug: bool,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            verify_certificates: true,
            ca_cert: None,
            debug: false,
        }
    }

    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(user, password));
        self
    }

    pub fn default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = namespace.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn verify_certificates(mut self, verify: bool) -> Self {
        self.verify_certificates = verify;
        self
    }

    pub fn ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Compose a connection URL the way the command line does: a `/`-prefixed
/// server is a local socket path, anything else gets a scheme and an
/// optional port.
pub fn build_url(server: &str, no_ssl: bool, port: Option<u16>) -> String {
    if server.starts_with('/') {
        return server.to_string();
    }
    let scheme = if no_ssl { "http" } else { "https" };
    match port {
        Some(port) => format!("{}://{}:{}", scheme, server, port),
        None => format!("{}://{}", scheme, server),
    }
}

/// Where requests go, resolved from the connection URL.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    Http { base: String, host: String },
    Unix(PathBuf),
}

fn resolve_endpoint(raw: &str) -> Result<Endpoint> {
    let raw = raw.trim();
    if raw.starts_with('/') {
        return Ok(Endpoint::Unix(PathBuf::from(raw)));
    }
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let url = url::Url::parse(&with_scheme)
        .map_err(|e| Error::Config(format!("Invalid URL {:?}: {}", raw, e)))?;
    let default_port = match url.scheme() {
        "http" => DEFAULT_HTTP_PORT,
        "https" => DEFAULT_HTTPS_PORT,
        other => {
            return Err(Error::Config(format!(
                "Unsupported URL scheme {:?}, expected http or https",
                other
            )))
        }
    };
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::Config(format!("URL {:?} has no host", raw)))?;
    let port = url.port().unwrap_or(default_port);
    Ok(Endpoint::Http {
        base: format!("{}://{}:{}", url.scheme(), host, port),
        host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
    })
}

/// A connection to one WBEM server.
///
/// Cloning is cheap and clones share the transport, so one connection can
/// serve concurrent callers. The only state that changes between calls is
/// the message ID counter.
#[derive(Debug, Clone)]
pub struct WbemConnection {
    url: String,
    host: Option<String>,
    credentials: Option<Credentials>,
    default_namespace: String,
    debug: bool,
    transport: Arc<dyn Transport>,
    next_id: Arc<AtomicU64>,
}

impl WbemConnection {
    /// Connect with the transport the URL calls for.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let transport: Arc<dyn Transport> = match resolve_endpoint(&config.url)? {
            Endpoint::Http { base, .. } => Arc::new(HttpTransport::new(
                &base,
                config.timeout,
                config.verify_certificates,
                config.ca_cert.as_ref(),
            )?),
            Endpoint::Unix(path) => Arc::new(UnixSocketTransport::new(path, config.timeout)),
        };
        Self::with_transport(config, transport)
    }

    /// Connect over a caller-supplied transport.
    pub fn with_transport(config: ConnectionConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let host = match resolve_endpoint(&config.url)? {
            Endpoint::Http { host, .. } => Some(host),
            Endpoint::Unix(_) => None,
        };
        let default_namespace = request::normalize_namespace(&config.default_namespace)?;
        Ok(Self {
            url: config.url,
            host,
            credentials: config.credentials,
            default_namespace,
            debug: config.debug,
            transport,
            next_id: Arc::new(AtomicU64::new(FIRST_MESSAGE_ID)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn set_credentials(&mut self, credentials: Option<Credentials>) {
        self.credentials = credentials;
    }

    pub fn set_default_namespace(&mut self, namespace: &str) -> Result<()> {
        self.default_namespace = request::normalize_namespace(namespace)?;
        Ok(())
    }

    /// One-line description of the connection for banners and help output.
    pub fn connection_info(&self) -> String {
        let who = match &self.credentials {
            Some(creds) => format!(" as {}", creds.user),
            None => " without credentials".to_string(),
        };
        format!(
            "Connected to {}{}, default namespace {}",
            self.url, who, self.default_namespace
        )
    }

    fn next_message_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn namespace<'a>(&'a self, explicit: Option<&'a str>) -> &'a str {
        explicit.unwrap_or(&self.default_namespace)
    }

    fn http_request(&self, encoded: &EncodedRequest) -> HttpRequest {
        let mut headers = vec![
            ("CIMOperation".to_string(), "MethodCall".to_string()),
            ("CIMMethod".to_string(), encoded.method.clone()),
            ("CIMObject".to_string(), encoded.object.clone()),
            ("CIMProtocolVersion".to_string(), PROTOCOL_VERSION.to_string()),
        ];
        if let Some(creds) = &self.credentials {
            headers.push(("Authorization".to_string(), creds.authorization()));
        }
        HttpRequest {
            headers,
            body: encoded.body.clone(),
        }
    }

    async fn round_trip(&self, encoded: &EncodedRequest) -> Result<String> {
        if self.debug {
            trace!(message_id = encoded.message_id, body = %encoded.body, "CIM-XML request");
        }
        let body = self
            .transport
            .send(self.http_request(encoded))
            .await
            .map_err(|e| {
                debug!(method = %encoded.method, message_id = encoded.message_id, error = %e, "Transport failure");
                Error::Transport(e)
            })?;
        if self.debug {
            trace!(message_id = encoded.message_id, body = %body, "CIM-XML response");
        }
        Ok(body)
    }

    async fn imethod_call(
        &self,
        method: &'static str,
        namespace: &str,
        params: Vec<IParam>,
    ) -> Result<Vec<Element>> {
        let message_id = self.next_message_id();
        let encoded = request::intrinsic(message_id, method, namespace, &params)?;
        debug!(method, namespace, message_id, "Sending intrinsic method call");
        let body = self.round_trip(&encoded).await?;
        response::parse_imethod_response(&body, message_id, method)
    }

    /// Run an intrinsic call and check that every returned element is
    /// named `expected`.
    async fn imethod_list(
        &self,
        method: &'static str,
        namespace: &str,
        params: Vec<IParam>,
        expected: &str,
    ) -> Result<Vec<Element>> {
        let children = self.imethod_call(method, namespace, params).await?;
        if let Some(other) = children.iter().find(|c| !c.is(expected)) {
            return Err(Error::Protocol(format!(
                "{} returned <{}>, expected <{}>",
                method, other.name, expected
            )));
        }
        Ok(children)
    }

    /// Run an intrinsic call that returns exactly one `expected` element.
    async fn imethod_single(
        &self,
        method: &'static str,
        namespace: &str,
        params: Vec<IParam>,
        expected: &str,
    ) -> Result<Element> {
        let mut children = self.imethod_list(method, namespace, params, expected).await?;
        match children.len() {
            1 => Ok(children.remove(0)),
            n => Err(Error::Protocol(format!(
                "{} returned {} <{}> elements, expected one",
                method, n, expected
            ))),
        }
    }

    async fn imethod_void(
        &self,
        method: &'static str,
        namespace: &str,
        params: Vec<IParam>,
    ) -> Result<()> {
        self.imethod_call(method, namespace, params).await.map(|_| ())
    }

    fn located_instance_name(&self, mut name: CimInstanceName, namespace: &str) -> CimInstanceName {
        name.inherit_location(namespace, self.host.as_deref());
        name
    }

    fn located_instance(&self, mut instance: CimInstance, namespace: &str) -> CimInstance {
        if let Some(path) = instance.path.take() {
            instance.path = Some(self.located_instance_name(path, namespace));
        }
        instance
    }

    fn located_object(&self, object: AssociatedObject, namespace: &str) -> AssociatedObject {
        match object {
            AssociatedObject::Instance(instance) => {
                AssociatedObject::Instance(self.located_instance(instance, namespace))
            }
            AssociatedObject::Class { mut path, class } => {
                path.inherit_location(namespace, self.host.as_deref());
                AssociatedObject::Class { path, class }
            }
        }
    }

    // Instance operations

    /// Names of all instances of `classname` and its subclasses.
    pub async fn enumerate_instance_names(
        &self,
        classname: &str,
        options: &EnumerateInstanceNamesOptions,
    ) -> Result<Vec<CimInstanceName>> {
        let namespace = self.namespace(options.namespace.as_deref());
        let params = vec![IParam::new(
            "ClassName",
            IParamValue::ClassName(classname.to_string()),
        )];
        self.imethod_list("EnumerateInstanceNames", namespace, params, "INSTANCENAME")
            .await?
            .iter()
            .map(|el| {
                response::decode_instance_name(el)
                    .map(|name| self.located_instance_name(name, namespace))
            })
            .collect()
    }

    /// All instances of `classname`, each carrying its path.
    pub async fn enumerate_instances(
        &self,
        classname: &str,
        options: &EnumerateInstancesOptions,
    ) -> Result<Vec<CimInstance>> {
        let namespace = self.namespace(options.namespace.as_deref());
        let mut params = vec![IParam::new(
            "ClassName",
            IParamValue::ClassName(classname.to_string()),
        )];
        options.push_iparams(&mut params);
        self.imethod_list("EnumerateInstances", namespace, params, "VALUE.NAMEDINSTANCE")
            .await?
            .iter()
            .map(|el| {
                response::decode_named_instance(el)
                    .map(|inst| self.located_instance(inst, namespace))
            })
            .collect()
    }

    /// Fetch one instance. The namespace is taken from `path`, falling back
    /// to the default namespace.
    pub async fn get_instance(
        &self,
        path: &CimInstanceName,
        options: &GetInstanceOptions,
    ) -> Result<CimInstance> {
        let namespace = self.namespace(path.namespace.as_deref());
        let mut params = vec![IParam::new(
            "InstanceName",
            IParamValue::InstanceName(path.clone()),
        )];
        options.push_iparams(&mut params);
        let el = self
            .imethod_single("GetInstance", namespace, params, "INSTANCE")
            .await?;
        let instance = response::decode_instance(&el)?;
        Ok(instance.with_path(self.located_instance_name(path.clone(), namespace)))
    }

    /// Replace properties of an existing instance. `instance.path` names
    /// the instance to modify.
    pub async fn modify_instance(
        &self,
        instance: &CimInstance,
        options: &ModifyInstanceOptions,
    ) -> Result<()> {
        let namespace = self.namespace(instance.path.as_ref().and_then(|p| p.namespace.as_deref()));
        let mut params = vec![IParam::new(
            "ModifiedInstance",
            IParamValue::NamedInstance(instance.clone()),
        )];
        options.push_iparams(&mut params);
        self.imethod_void("ModifyInstance", namespace, params).await
    }

    /// Create an instance and return the path the server assigned. Without
    /// an explicit namespace, the one in `instance.path` or the default is
    /// used.
    pub async fn create_instance(
        &self,
        instance: &CimInstance,
        namespace: Option<&str>,
    ) -> Result<CimInstanceName> {
        let namespace = namespace
            .or_else(|| instance.path.as_ref().and_then(|p| p.namespace.as_deref()))
            .unwrap_or(&self.default_namespace);
        let mut new_instance = instance.clone();
        new_instance.path = None;
        let params = vec![IParam::new("NewInstance", IParamValue::Instance(new_instance))];
        let el = self
            .imethod_single("CreateInstance", namespace, params, "INSTANCENAME")
            .await?;
        Ok(self.located_instance_name(response::decode_instance_name(&el)?, namespace))
    }

    pub async fn delete_instance(&self, path: &CimInstanceName) -> Result<()> {
        let namespace = self.namespace(path.namespace.as_deref());
        let params = vec![IParam::new(
            "InstanceName",
            IParamValue::InstanceName(path.clone()),
        )];
        self.imethod_void("DeleteInstance", namespace, params).await
    }

    // Association operations

    /// Paths of objects associated with `object`.
    pub async fn associator_names(
        &self,
        object: &CimObjectPath,
        options: &AssociatorNamesOptions,
    ) -> Result<Vec<CimObjectPath>> {
        let namespace = self.namespace(object.namespace());
        let mut params = vec![IParam::new("ObjectName", IParamValue::ObjectName(object.clone()))];
        options.push_iparams(&mut params);
        self.object_paths("AssociatorNames", namespace, params).await
    }

    /// Objects associated with `object`, each with its path.
    pub async fn associators(
        &self,
        object: &CimObjectPath,
        options: &AssociatorsOptions,
    ) -> Result<Vec<AssociatedObject>> {
        let namespace = self.namespace(object.namespace());
        let mut params = vec![IParam::new("ObjectName", IParamValue::ObjectName(object.clone()))];
        options.push_iparams(&mut params);
        self.objects_with_path("Associators", namespace, params).await
    }

    /// Paths of association objects that refer to `object`.
    pub async fn reference_names(
        &self,
        object: &CimObjectPath,
        options: &ReferenceNamesOptions,
    ) -> Result<Vec<CimObjectPath>> {
        let namespace = self.namespace(object.namespace());
        let mut params = vec![IParam::new("ObjectName", IParamValue::ObjectName(object.clone()))];
        options.push_iparams(&mut params);
        self.object_paths("ReferenceNames", namespace, params).await
    }

    /// Association objects that refer to `object`.
    pub async fn references(
        &self,
        object: &CimObjectPath,
        options: &ReferencesOptions,
    ) -> Result<Vec<AssociatedObject>> {
        let namespace = self.namespace(object.namespace());
        let mut params = vec![IParam::new("ObjectName", IParamValue::ObjectName(object.clone()))];
        options.push_iparams(&mut params);
        self.objects_with_path("References", namespace, params).await
    }

    async fn object_paths(
        &self,
        method: &'static str,
        namespace: &str,
        params: Vec<IParam>,
    ) -> Result<Vec<CimObjectPath>> {
        self.imethod_list(method, namespace, params, "OBJECTPATH")
            .await?
            .iter()
            .map(|el| {
                response::decode_object_path(el).map(|mut path| {
                    path.inherit_location(namespace, self.host.as_deref());
                    path
                })
            })
            .collect()
    }

    async fn objects_with_path(
        &self,
        method: &'static str,
        namespace: &str,
        params: Vec<IParam>,
    ) -> Result<Vec<AssociatedObject>> {
        self.imethod_list(method, namespace, params, "VALUE.OBJECTWITHPATH")
            .await?
            .iter()
            .map(|el| {
                response::decode_object_with_path(el)
                    .map(|object| self.located_object(object, namespace))
            })
            .collect()
    }

    // Method invocation

    /// Invoke an extrinsic method on an instance or a class.
    pub async fn invoke_method(
        &self,
        method: &str,
        object: &CimObjectPath,
        params: &[(String, Option<CimValue>)],
    ) -> Result<MethodResult> {
        let message_id = self.next_message_id();
        let encoded =
            request::extrinsic(message_id, method, object, &self.default_namespace, params)?;
        debug!(method, object = %object, message_id, "Sending extrinsic method call");
        let body = self.round_trip(&encoded).await?;
        response::parse_method_response(&body, message_id, method)
    }

    // Schema operations

    /// Class names, in server order.
    pub async fn enumerate_class_names(
        &self,
        options: &EnumerateClassNamesOptions,
    ) -> Result<Vec<String>> {
        let namespace = self.namespace(options.namespace.as_deref());
        let mut params = Vec::new();
        options.push_iparams(&mut params);
        self.imethod_list("EnumerateClassNames", namespace, params, "CLASSNAME")
            .await?
            .iter()
            .map(|el| el.required_attr("NAME").map(str::to_string))
            .collect()
    }

    pub async fn enumerate_classes(
        &self,
        options: &EnumerateClassesOptions,
    ) -> Result<Vec<CimClass>> {
        let namespace = self.namespace(options.namespace.as_deref());
        let mut params = Vec::new();
        options.push_iparams(&mut params);
        self.imethod_list("EnumerateClasses", namespace, params, "CLASS")
            .await?
            .iter()
            .map(response::decode_class)
            .collect()
    }

    pub async fn get_class(&self, classname: &str, options: &GetClassOptions) -> Result<CimClass> {
        let namespace = self.namespace(options.namespace.as_deref());
        let mut params = vec![IParam::new(
            "ClassName",
            IParamValue::ClassName(classname.to_string()),
        )];
        options.push_iparams(&mut params);
        let el = self
            .imethod_single("GetClass", namespace, params, "CLASS")
            .await?;
        response::decode_class(&el)
    }

    pub async fn modify_class(&self, class: &CimClass, namespace: Option<&str>) -> Result<()> {
        let params = vec![IParam::new("ModifiedClass", IParamValue::Class(class.clone()))];
        self.imethod_void("ModifyClass", self.namespace(namespace), params)
            .await
    }

    pub async fn create_class(&self, class: &CimClass, namespace: Option<&str>) -> Result<()> {
        let params = vec![IParam::new("NewClass", IParamValue::Class(class.clone()))];
        self.imethod_void("CreateClass", self.namespace(namespace), params)
            .await
    }

    pub async fn delete_class(&self, classname: &str, namespace: Option<&str>) -> Result<()> {
        let params = vec![IParam::new(
            "ClassName",
            IParamValue::ClassName(classname.to_string()),
        )];
        self.imethod_void("DeleteClass", self.namespace(namespace), params)
            .await
    }

    // Qualifier operations

    pub async fn enumerate_qualifiers(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<CimQualifierDeclaration>> {
        self.imethod_list(
            "EnumerateQualifiers",
            self.namespace(namespace),
            Vec::new(),
            "QUALIFIER.DECLARATION",
        )
        .await?
        .iter()
        .map(response::decode_qualifier_declaration)
        .collect()
    }

    pub async fn get_qualifier(
        &self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<CimQualifierDeclaration> {
        let params = vec![IParam::new(
            "QualifierName",
            IParamValue::String(name.to_string()),
        )];
        let el = self
            .imethod_single(
                "GetQualifier",
                self.namespace(namespace),
                params,
                "QUALIFIER.DECLARATION",
            )
            .await?;
        response::decode_qualifier_declaration(&el)
    }

    pub async fn set_qualifier(
        &self,
        declaration: &CimQualifierDeclaration,
        namespace: Option<&str>,
    ) -> Result<()> {
        let params = vec![IParam::new(
            "QualifierDeclaration",
            IParamValue::QualifierDeclaration(declaration.clone()),
        )];
        self.imethod_void("SetQualifier", self.namespace(namespace), params)
            .await
    }

    pub async fn delete_qualifier(&self, name: &str, namespace: Option<&str>) -> Result<()> {
        let params = vec![IParam::new(
            "QualifierName",
            IParamValue::String(name.to_string()),
        )];
        self.imethod_void("DeleteQualifier", self.namespace(namespace), params)
            .await
    }

    // Queries

    /// Run a query (for example `query_language = "WQL"`) and return the
    /// matching instances.
    pub async fn exec_query(
        &self,
        query_language: &str,
        query: &str,
        namespace: Option<&str>,
    ) -> Result<Vec<CimInstance>> {
        let namespace = self.namespace(namespace);
        let params = vec![
            IParam::new("QueryLanguage", IParamValue::String(query_language.to_string())),
            IParam::new("Query", IParamValue::String(query.to_string())),
        ];
        self.imethod_call("ExecQuery", namespace, params)
            .await?
            .iter()
            .map(|el| {
                response::decode_query_object(el).map(|inst| self.located_instance(inst, namespace))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, TransportErrorKind};
    use crate::path::CimClassName;
    use crate::status::CimStatusCode;
    use crate::transport::mock::MockTransport;

    fn envelope(id: u64, inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8" ?><CIM CIMVERSION="2.0" DTDVERSION="2.0"><MESSAGE ID="{}" PROTOCOLVERSION="1.0"><SIMPLERSP>{}</SIMPLERSP></MESSAGE></CIM>"#,
            id, inner
        )
    }

    fn imethod(id: u64, method: &str, ret: &str) -> String {
        envelope(
            id,
            &format!(
                r#"<IMETHODRESPONSE NAME="{}"><IRETURNVALUE>{}</IRETURNVALUE></IMETHODRESPONSE>"#,
                method, ret
            ),
        )
    }

    fn connect(mock: Arc<MockTransport>) -> WbemConnection {
        let config = ConnectionConfig::new("https://cimom.example:5989").credentials("admin", "s3cret");
        WbemConnection::with_transport(config, mock).unwrap()
    }

    #[test]
    fn builds_urls_like_the_command_line() {
        assert_eq!(build_url("/var/run/cimom.sock", false, Some(1)), "/var/run/cimom.sock");
        assert_eq!(build_url("srv", false, None), "https://srv");
        assert_eq!(build_url("srv", true, Some(15988)), "http://srv:15988");
    }

    #[test]
    fn resolves_endpoints_with_default_ports() {
        assert_eq!(
            resolve_endpoint("srv").unwrap(),
            Endpoint::Http {
                base: "https://srv:5989".into(),
                host: "srv".into()
            }
        );
        assert_eq!(
            resolve_endpoint("http://srv").unwrap(),
            Endpoint::Http {
                base: "http://srv:5988".into(),
                host: "srv".into()
            }
        );
        assert_eq!(
            resolve_endpoint("https://[::1]:15989").unwrap(),
            Endpoint::Http {
                base: "https://[::1]:15989".into(),
                host: "::1".into()
            }
        );
        assert_eq!(
            resolve_endpoint("/tmp/wbem.sock").unwrap(),
            Endpoint::Unix(PathBuf::from("/tmp/wbem.sock"))
        );
        assert!(matches!(resolve_endpoint("ftp://srv"), Err(Error::Config(_))));
    }

    #[test]
    fn connection_info_and_accessors() {
        let conn = connect(Arc::new(MockTransport::new()));
        assert_eq!(conn.url(), "https://cimom.example:5989");
        assert_eq!(conn.credentials().unwrap().user, "admin");
        assert_eq!(
            conn.connection_info(),
            "Connected to https://cimom.example:5989 as admin, default namespace root/cimv2"
        );

        let mut anonymous = conn.clone();
        anonymous.set_credentials(None);
        anonymous.set_default_namespace("/interop/").unwrap();
        assert_eq!(
            anonymous.connection_info(),
            "Connected to https://cimom.example:5989 without credentials, default namespace interop"
        );
        assert!(!format!("{:?}", conn).contains("s3cret"));
    }

    #[tokio::test]
    async fn get_instance_round_trip() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(
            1001,
            "GetInstance",
            r#"<INSTANCE CLASSNAME="SMX_ComputerSystem"><PROPERTY NAME="Name" TYPE="string"><VALUE>sys1</VALUE></PROPERTY><PROPERTY NAME="Dedicated" TYPE="uint16"><VALUE>4</VALUE></PROPERTY></INSTANCE>"#,
        ));
        let conn = connect(mock.clone());

        let path = CimInstanceName::new("SMX_ComputerSystem").with_key("Name", "sys1");
        let inst = conn
            .get_instance(&path, &GetInstanceOptions::default())
            .await
            .unwrap();

        assert_eq!(inst.classname, "SMX_ComputerSystem");
        assert_eq!(inst.get("Name"), Some(&CimValue::String("sys1".into())));
        assert_eq!(inst.get("Dedicated"), Some(&CimValue::Uint16(4)));
        let returned = inst.path.unwrap();
        assert_eq!(returned.namespace.as_deref(), Some("root/cimv2"));
        assert_eq!(returned.host.as_deref(), Some("cimom.example"));

        let req = mock.last_request();
        assert_eq!(req.header("CIMOperation"), Some("MethodCall"));
        assert_eq!(req.header("CIMMethod"), Some("GetInstance"));
        assert_eq!(req.header("CIMObject"), Some("root/cimv2"));
        assert_eq!(req.header("CIMProtocolVersion"), Some("1.0"));
        assert_eq!(req.header("Authorization"), Some("Basic YWRtaW46czNjcmV0"));
        assert!(req.body.contains(r#"<IMETHODCALL NAME="GetInstance">"#));
        assert!(req.body.contains(r#"<INSTANCENAME CLASSNAME="SMX_ComputerSystem">"#));
        assert!(!req.body.contains("LocalOnly"));
    }

    #[tokio::test]
    async fn enumerate_class_names_omits_unset_options() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(
            1001,
            "EnumerateClassNames",
            r#"<CLASSNAME NAME="CIM_Z"/><CLASSNAME NAME="CIM_A"/><CLASSNAME NAME="CIM_M"/>"#,
        ));
        let conn = connect(mock.clone());

        let names = conn
            .enumerate_class_names(&EnumerateClassNamesOptions::default().namespace("root/cimv2"))
            .await
            .unwrap();
        assert_eq!(names, vec!["CIM_Z", "CIM_A", "CIM_M"]);

        let body = mock.last_request().body;
        assert!(!body.contains(r#"NAME="ClassName""#));
        assert!(!body.contains("DeepInheritance"));
        assert!(!body.contains("IPARAMVALUE"));
    }

    #[tokio::test]
    async fn explicit_false_flags_are_sent() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(1001, "EnumerateInstances", ""));
        let conn = connect(mock.clone());

        let options = EnumerateInstancesOptions::default()
            .deep_inheritance(false)
            .property_list(Vec::<String>::new());
        let instances = conn.enumerate_instances("CIM_Foo", &options).await.unwrap();
        assert!(instances.is_empty());

        let body = mock.last_request().body;
        assert!(body.contains(
            r#"<IPARAMVALUE NAME="DeepInheritance"><VALUE>FALSE</VALUE></IPARAMVALUE>"#
        ));
        assert!(body.contains(
            r#"<IPARAMVALUE NAME="PropertyList"><VALUE.ARRAY></VALUE.ARRAY></IPARAMVALUE>"#
        ));
        assert!(!body.contains("LocalOnly"));
    }

    #[tokio::test]
    async fn faults_surface_as_cim_errors() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(envelope(
            1001,
            r#"<IMETHODRESPONSE NAME="GetClass"><ERROR CODE="5" DESCRIPTION="CIM_Nope is not a class"/></IMETHODRESPONSE>"#,
        ));
        let conn = connect(mock);
        let err = conn
            .get_class("CIM_Nope", &GetClassOptions::default())
            .await
            .unwrap_err();
        match err {
            Error::Cim(cim) => {
                assert_eq!(cim.code(), 5);
                assert_eq!(cim.status, CimStatusCode::InvalidClass);
                assert_eq!(cim.description.as_deref(), Some("CIM_Nope is not a class"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn timeouts_surface_as_transport_errors() {
        let mock = Arc::new(MockTransport::new());
        mock.push_error(TransportError::new(TransportErrorKind::Timeout, "30s elapsed"));
        let conn = connect(mock);
        let err = conn
            .delete_instance(&CimInstanceName::new("CIM_Foo").with_key("Id", 1u32))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.cim_status(), None);
    }

    #[tokio::test]
    async fn message_ids_increase_per_call() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(1001, "EnumerateQualifiers", ""));
        mock.push_response(imethod(1002, "EnumerateQualifiers", ""));
        let conn = connect(mock.clone());
        conn.enumerate_qualifiers(None).await.unwrap();
        conn.clone().enumerate_qualifiers(Some("interop")).await.unwrap();

        let requests = mock.requests();
        assert!(requests[0].body.contains(r#"<MESSAGE ID="1001""#));
        assert!(requests[1].body.contains(r#"<MESSAGE ID="1002""#));
        assert_eq!(requests[1].header("CIMObject"), Some("interop"));
    }

    #[tokio::test]
    async fn associator_names_inherit_location() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(
            1001,
            "AssociatorNames",
            r#"<OBJECTPATH><INSTANCENAME CLASSNAME="SMX_Disk"><KEYBINDING NAME="Id"><KEYVALUE VALUETYPE="numeric">7</KEYVALUE></KEYBINDING></INSTANCENAME></OBJECTPATH><OBJECTPATH><INSTANCEPATH><NAMESPACEPATH><HOST>other</HOST><LOCALNAMESPACEPATH><NAMESPACE NAME="root"/><NAMESPACE NAME="smx"/></LOCALNAMESPACEPATH></NAMESPACEPATH><INSTANCENAME CLASSNAME="SMX_Fan"/></INSTANCEPATH></OBJECTPATH>"#,
        ));
        let conn = connect(mock.clone());
        let object = CimObjectPath::Instance(
            CimInstanceName::new("SMX_ComputerSystem").with_key("Name", "sys1"),
        );
        let options = AssociatorNamesOptions::default().assoc_class("SMX_SystemDevice");
        let paths = conn.associator_names(&object, &options).await.unwrap();

        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].namespace(), Some("root/cimv2"));
        assert_eq!(paths[0].host(), Some("cimom.example"));
        assert_eq!(paths[1].namespace(), Some("root/smx"));
        assert_eq!(paths[1].host(), Some("other"));

        let body = mock.last_request().body;
        assert!(body.contains(
            r#"<IPARAMVALUE NAME="AssocClass"><CLASSNAME NAME="SMX_SystemDevice"/></IPARAMVALUE>"#
        ));
        assert!(!body.contains("ResultRole"));
    }

    #[tokio::test]
    async fn class_level_references() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(
            1001,
            "References",
            r#"<VALUE.OBJECTWITHPATH><CLASSPATH><NAMESPACEPATH><HOST>h</HOST><LOCALNAMESPACEPATH><NAMESPACE NAME="root"/><NAMESPACE NAME="cimv2"/></LOCALNAMESPACEPATH></NAMESPACEPATH><CLASSNAME NAME="CIM_Assoc"/></CLASSPATH><CLASS NAME="CIM_Assoc"/></VALUE.OBJECTWITHPATH>"#,
        ));
        let conn = connect(mock);
        let object = CimObjectPath::Class(CimClassName::new("CIM_Foo"));
        let results = conn
            .references(&object, &ReferencesOptions::default())
            .await
            .unwrap();
        match &results[0] {
            AssociatedObject::Class { path, class } => {
                assert_eq!(path.classname, "CIM_Assoc");
                assert_eq!(class.classname, "CIM_Assoc");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_and_modify_instance() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(
            1001,
            "CreateInstance",
            r#"<INSTANCENAME CLASSNAME="SMX_Account"><KEYBINDING NAME="Name"><KEYVALUE>bob</KEYVALUE></KEYBINDING></INSTANCENAME>"#,
        ));
        mock.push_response(envelope(1002, r#"<IMETHODRESPONSE NAME="ModifyInstance"/>"#));
        let conn = connect(mock.clone());

        let inst = CimInstance::new("SMX_Account").with_property("Name", "bob");
        let path = conn.create_instance(&inst, Some("root/smx")).await.unwrap();
        assert_eq!(path.namespace.as_deref(), Some("root/smx"));
        assert!(mock.last_request().body.contains(r#"<IPARAMVALUE NAME="NewInstance"><INSTANCE CLASSNAME="SMX_Account">"#));

        let modified = inst.with_property("Shell", "/bin/sh").with_path(path);
        conn.modify_instance(&modified, &ModifyInstanceOptions::default())
            .await
            .unwrap();
        let req = mock.last_request();
        assert_eq!(req.header("CIMObject"), Some("root/smx"));
        assert!(req.body.contains(r#"<IPARAMVALUE NAME="ModifiedInstance"><VALUE.NAMEDINSTANCE>"#));
    }

    #[tokio::test]
    async fn invoke_method_returns_out_params() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(envelope(
            1001,
            r#"<METHODRESPONSE NAME="RequestStateChange"><RETURNVALUE PARAMTYPE="uint32"><VALUE>0</VALUE></RETURNVALUE><PARAMVALUE NAME="Count" PARAMTYPE="uint16"><VALUE>2</VALUE></PARAMVALUE></METHODRESPONSE>"#,
        ));
        let conn = connect(mock.clone());
        let object = CimObjectPath::Instance(
            CimInstanceName::new("SMX_ComputerSystem").with_key("Name", "sys1"),
        );
        let result = conn
            .invoke_method(
                "RequestStateChange",
                &object,
                &[("RequestedState".into(), Some(CimValue::Uint16(3)))],
            )
            .await
            .unwrap();
        assert_eq!(result.return_value, Some(CimValue::Uint32(0)));
        assert_eq!(result.out_param("Count"), Some(&CimValue::Uint16(2)));

        let req = mock.last_request();
        assert_eq!(req.header("CIMMethod"), Some("RequestStateChange"));
        assert_eq!(
            req.header("CIMObject"),
            Some("root/cimv2:SMX_ComputerSystem.Name=%22sys1%22")
        );
    }

    #[tokio::test]
    async fn qualifier_operations() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(
            1001,
            "GetQualifier",
            r#"<QUALIFIER.DECLARATION NAME="Key" TYPE="boolean" ISARRAY="false" OVERRIDABLE="false"><SCOPE PROPERTY="true" REFERENCE="true"/><VALUE>FALSE</VALUE></QUALIFIER.DECLARATION>"#,
        ));
        mock.push_response(envelope(1002, r#"<IMETHODRESPONSE NAME="DeleteQualifier"/>"#));
        let conn = connect(mock.clone());

        let decl = conn.get_qualifier("Key", None).await.unwrap();
        assert!(decl.scopes.property && decl.scopes.reference && !decl.scopes.class);
        assert_eq!(decl.value, Some(CimValue::Boolean(false)));
        assert!(mock.last_request().body.contains(
            r#"<IPARAMVALUE NAME="QualifierName"><VALUE>Key</VALUE></IPARAMVALUE>"#
        ));

        conn.delete_qualifier("Obsolete", None).await.unwrap();
        assert_eq!(mock.last_request().header("CIMMethod"), Some("DeleteQualifier"));
    }

    #[tokio::test]
    async fn exec_query_returns_instances() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(
            1001,
            "ExecQuery",
            r#"<VALUE.OBJECTWITHPATH><INSTANCEPATH><NAMESPACEPATH><HOST>h</HOST><LOCALNAMESPACEPATH><NAMESPACE NAME="root"/></LOCALNAMESPACEPATH></NAMESPACEPATH><INSTANCENAME CLASSNAME="CIM_Foo"/></INSTANCEPATH><INSTANCE CLASSNAME="CIM_Foo"/></VALUE.OBJECTWITHPATH><VALUE.OBJECT><INSTANCE CLASSNAME="CIM_Bar"/></VALUE.OBJECT>"#,
        ));
        let conn = connect(mock.clone());
        let found = conn
            .exec_query("WQL", "SELECT * FROM CIM_Foo", None)
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].path.is_some());
        assert!(found[1].path.is_none());
        assert!(mock.last_request().body.contains(
            r#"<IPARAMVALUE NAME="QueryLanguage"><VALUE>WQL</VALUE></IPARAMVALUE>"#
        ));
    }

    #[tokio::test]
    async fn wrong_element_is_a_protocol_error() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(1001, "GetClass", r#"<INSTANCE CLASSNAME="X"/>"#));
        let conn = connect(mock);
        let err = conn
            .get_class("X", &GetClassOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn schema_operations_name_their_parameters() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(
            1001,
            "EnumerateClasses",
            r#"<CLASS NAME="SMX_Widget" SUPERCLASS="CIM_LogicalElement"/><CLASS NAME="SMX_Gadget"/>"#,
        ));
        mock.push_response(envelope(1002, r#"<IMETHODRESPONSE NAME="CreateClass"/>"#));
        mock.push_response(envelope(1003, r#"<IMETHODRESPONSE NAME="ModifyClass"/>"#));
        mock.push_response(envelope(1004, r#"<IMETHODRESPONSE NAME="DeleteClass"/>"#));
        mock.push_response(envelope(1005, r#"<IMETHODRESPONSE NAME="SetQualifier"/>"#));
        let conn = connect(mock.clone());

        let options = EnumerateClassesOptions::default().deep_inheritance(true);
        let classes = conn.enumerate_classes(&options).await.unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].superclass.as_deref(), Some("CIM_LogicalElement"));
        assert!(mock.last_request().body.contains(
            r#"<IPARAMVALUE NAME="DeepInheritance"><VALUE>TRUE</VALUE></IPARAMVALUE>"#
        ));

        let class = CimClass::new("SMX_Widget");
        conn.create_class(&class, Some("root/smx")).await.unwrap();
        let req = mock.last_request();
        assert_eq!(req.header("CIMObject"), Some("root/smx"));
        assert!(req
            .body
            .contains(r#"<IPARAMVALUE NAME="NewClass"><CLASS NAME="SMX_Widget""#));

        conn.modify_class(&class, None).await.unwrap();
        assert!(mock
            .last_request()
            .body
            .contains(r#"<IPARAMVALUE NAME="ModifiedClass"><CLASS NAME="SMX_Widget""#));

        conn.delete_class("SMX_Widget", None).await.unwrap();
        assert!(mock.last_request().body.contains(
            r#"<IPARAMVALUE NAME="ClassName"><CLASSNAME NAME="SMX_Widget"/></IPARAMVALUE>"#
        ));

        let decl = CimQualifierDeclaration::new("Vendor", crate::value::CimType::String);
        conn.set_qualifier(&decl, None).await.unwrap();
        assert!(mock.last_request().body.contains(
            r#"<IPARAMVALUE NAME="QualifierDeclaration"><QUALIFIER.DECLARATION NAME="Vendor""#
        ));

        let methods: Vec<_> = mock
            .requests()
            .iter()
            .filter_map(|r| r.header("CIMMethod").map(str::to_string))
            .collect();
        assert_eq!(
            methods,
            vec!["EnumerateClasses", "CreateClass", "ModifyClass", "DeleteClass", "SetQualifier"]
        );
    }

    #[tokio::test]
    async fn instance_names_and_association_objects() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(imethod(
            1001,
            "EnumerateInstanceNames",
            r#"<INSTANCENAME CLASSNAME="SMX_Disk"><KEYBINDING NAME="Id"><KEYVALUE VALUETYPE="numeric">1</KEYVALUE></KEYBINDING></INSTANCENAME><INSTANCENAME CLASSNAME="SMX_Disk"><KEYBINDING NAME="Id"><KEYVALUE VALUETYPE="numeric">2</KEYVALUE></KEYBINDING></INSTANCENAME>"#,
        ));
        mock.push_response(imethod(
            1002,
            "Associators",
            r#"<VALUE.OBJECTWITHPATH><INSTANCEPATH><NAMESPACEPATH><HOST>h</HOST><LOCALNAMESPACEPATH><NAMESPACE NAME="root"/><NAMESPACE NAME="cimv2"/></LOCALNAMESPACEPATH></NAMESPACEPATH><INSTANCENAME CLASSNAME="SMX_Fan"/></INSTANCEPATH><INSTANCE CLASSNAME="SMX_Fan"/></VALUE.OBJECTWITHPATH>"#,
        ));
        mock.push_response(imethod(
            1003,
            "ReferenceNames",
            r#"<OBJECTPATH><INSTANCENAME CLASSNAME="SMX_SystemDevice"/></OBJECTPATH>"#,
        ));
        let conn = connect(mock.clone());

        let names = conn
            .enumerate_instance_names("SMX_Disk", &EnumerateInstanceNamesOptions::default())
            .await
            .unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.namespace.as_deref() == Some("root/cimv2")));

        let object = CimObjectPath::Instance(CimInstanceName::new("SMX_Disk").with_key("Id", 1u32));
        let options = AssociatorsOptions::default().result_class("SMX_Fan");
        let objects = conn.associators(&object, &options).await.unwrap();
        assert!(matches!(&objects[0], AssociatedObject::Instance(i) if i.classname == "SMX_Fan"));
        assert!(mock.last_request().body.contains(
            r#"<IPARAMVALUE NAME="ResultClass"><CLASSNAME NAME="SMX_Fan"/></IPARAMVALUE>"#
        ));

        let refs = conn
            .reference_names(&object, &ReferenceNamesOptions::default().role("Antecedent"))
            .await
            .unwrap();
        assert_eq!(refs[0].classname(), "SMX_SystemDevice");
        assert!(mock.last_request().body.contains(
            r#"<IPARAMVALUE NAME="Role"><VALUE>Antecedent</VALUE></IPARAMVALUE>"#
        ));
    }
}
