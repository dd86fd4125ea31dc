//! In-process CIM server stand-in for shell tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wbem_client::{ConnectionConfig, HttpRequest, Transport, TransportError, WbemConnection};

#[derive(Debug, Default)]
struct Inner {
    replies: HashMap<String, String>,
    requests: Vec<HttpRequest>,
}

/// Answers each CIM method with a fixed reply body and records requests.
/// Methods without a reply get an empty successful response.
#[derive(Debug, Clone, Default)]
pub struct ScriptedServer {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content placed inside the `IMETHODRESPONSE` / `METHODRESPONSE`.
    pub fn respond(&self, method: &str, content: &str) {
        self.inner
            .lock()
            .unwrap()
            .replies
            .insert(method.to_string(), content.to_string());
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.header("CIMMethod").map(str::to_string))
            .collect()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Body of the last request for `method`.
    pub fn body_of(&self, method: &str) -> String {
        self.requests()
            .iter()
            .rev()
            .find(|r| r.header("CIMMethod") == Some(method))
            .map(|r| r.body.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for ScriptedServer {
    async fn send(&self, request: HttpRequest) -> Result<String, TransportError> {
        let method = request.header("CIMMethod").unwrap_or_default().to_string();
        let id = request
            .body
            .split("MESSAGE ID=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap_or("0")
            .to_string();
        let element = if request.body.contains("<METHODCALL") {
            "METHODRESPONSE"
        } else {
            "IMETHODRESPONSE"
        };

        let mut inner = self.inner.lock().unwrap();
        let content = inner.replies.get(&method).cloned().unwrap_or_default();
        inner.requests.push(request);

        Ok(format!(
            r#"<?xml version="1.0" encoding="utf-8" ?><CIM CIMVERSION="2.0" DTDVERSION="2.0"><MESSAGE ID="{id}" PROTOCOLVERSION="1.0"><SIMPLERSP><{element} NAME="{method}">{content}</{element}></SIMPLERSP></MESSAGE></CIM>"#
        ))
    }
}

/// A connection to `server` with credentials and the default namespace.
pub fn scripted_connection(server: &ScriptedServer) -> WbemConnection {
    let config = ConnectionConfig::new("https://cimom.test").credentials("admin", "secret");
    WbemConnection::with_transport(config, Arc::new(server.clone())).unwrap()
}
