//! Object paths: instance names, class names, and the union of both.
//!
//! The textual form follows the untyped WBEM URI conventions:
//!
//! ```text
//! //host/root/cimv2:CIM_ComputerSystem.CreationClassName="CIM_ComputerSystem",Name="sys1"
//! root/cimv2:CIM_ComputerSystem
//! PG_ServerSingleton=@
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::Error;
use crate::value::{escape_quoted, unescape_quoted, CimValue};

/// One key property of an instance path.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBinding {
    pub name: String,
    pub value: CimValue,
}

/// Identifies one instance within a namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct CimInstanceName {
    pub classname: String,
    /// Key bindings in wire order
    pub keybindings: Vec<KeyBinding>,
    pub namespace: Option<String>,
    pub host: Option<String>,
}

impl CimInstanceName {
    pub fn new(classname: impl Into<String>) -> Self {
        Self {
            classname: classname.into(),
            keybindings: Vec::new(),
            namespace: None,
            host: None,
        }
    }

    /// Add a key binding, builder style.
    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<CimValue>) -> Self {
        self.set_key(name, value);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set a key binding, replacing an existing one with the same
    /// (case-insensitive) name in place.
    pub fn set_key(&mut self, name: impl Into<String>, value: impl Into<CimValue>) {
        let name = name.into();
        let value = value.into();
        match self
            .keybindings
            .iter_mut()
            .find(|kb| kb.name.eq_ignore_ascii_case(&name))
        {
            Some(existing) => existing.value = value,
            None => self.keybindings.push(KeyBinding { name, value }),
        }
    }

    /// Look up a key value by case-insensitive name.
    pub fn key(&self, name: &str) -> Option<&CimValue> {
        self.keybindings
            .iter()
            .find(|kb| kb.name.eq_ignore_ascii_case(name))
            .map(|kb| &kb.value)
    }

    /// Fill in namespace and host where they are missing.
    pub(crate) fn inherit_location(&mut self, namespace: &str, host: Option<&str>) {
        if self.namespace.is_none() {
            self.namespace = Some(namespace.to_string());
        }
        if self.host.is_none() {
            self.host = host.map(str::to_string);
        }
    }
}

/// Identifies a class within a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CimClassName {
    pub classname: String,
    pub namespace: Option<String>,
    pub host: Option<String>,
}

impl CimClassName {
    pub fn new(classname: impl Into<String>) -> Self {
        Self {
            classname: classname.into(),
            namespace: None,
            host: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub(crate) fn inherit_location(&mut self, namespace: &str, host: Option<&str>) {
        if self.namespace.is_none() {
            self.namespace = Some(namespace.to_string());
        }
        if self.host.is_none() {
            self.host = host.map(str::to_string);
        }
    }
}

/// Target of association traversal and method invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum CimObjectPath {
    Instance(CimInstanceName),
    Class(CimClassName),
}

impl CimObjectPath {
    pub fn classname(&self) -> &str {
        match self {
            CimObjectPath::Instance(p) => &p.classname,
            CimObjectPath::Class(p) => &p.classname,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            CimObjectPath::Instance(p) => p.namespace.as_deref(),
            CimObjectPath::Class(p) => p.namespace.as_deref(),
        }
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            CimObjectPath::Instance(p) => p.host.as_deref(),
            CimObjectPath::Class(p) => p.host.as_deref(),
        }
    }

    pub(crate) fn inherit_location(&mut self, namespace: &str, host: Option<&str>) {
        match self {
            CimObjectPath::Instance(p) => p.inherit_location(namespace, host),
            CimObjectPath::Class(p) => p.inherit_location(namespace, host),
        }
    }
}

impl From<CimInstanceName> for CimObjectPath {
    fn from(value: CimInstanceName) -> Self {
        CimObjectPath::Instance(value)
    }
}

impl From<CimClassName> for CimObjectPath {
    fn from(value: CimClassName) -> Self {
        CimObjectPath::Class(value)
    }
}

fn write_location(
    f: &mut fmt::Formatter<'_>,
    host: Option<&str>,
    namespace: Option<&str>,
) -> fmt::Result {
    if let Some(host) = host {
        write!(f, "//{}/", host)?;
    }
    if let Some(namespace) = namespace {
        write!(f, "{}:", namespace)?;
    }
    Ok(())
}

fn key_literal(value: &CimValue) -> String {
    match value {
        CimValue::Boolean(b) => b.to_string(),
        CimValue::String(s) => escape_quoted(s),
        CimValue::Char16(c) => escape_quoted(&c.to_string()),
        CimValue::DateTime(dt) => escape_quoted(&dt.to_string()),
        CimValue::Reference(path) => escape_quoted(&path.to_string()),
        other => other.to_wire_string().unwrap_or_default(),
    }
}

impl fmt::Display for CimInstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_location(f, self.host.as_deref(), self.namespace.as_deref())?;
        f.write_str(&self.classname)?;
        if self.keybindings.is_empty() {
            return f.write_str("=@");
        }
        for (i, kb) in self.keybindings.iter().enumerate() {
            f.write_str(if i == 0 { "." } else { "," })?;
            write!(f, "{}={}", kb.name, key_literal(&kb.value))?;
        }
        Ok(())
    }
}

impl fmt::Display for CimClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_location(f, self.host.as_deref(), self.namespace.as_deref())?;
        f.write_str(&self.classname)
    }
}

impl fmt::Display for CimObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CimObjectPath::Instance(p) => p.fmt(f),
            CimObjectPath::Class(p) => p.fmt(f),
        }
    }
}

/// Split `[//host/][namespace:]Class<rest>` into its parts. `rest` starts
/// at the first `.` or `=` following the class name.
fn split_location(s: &str) -> Result<(Option<String>, Option<String>, &str, &str), Error> {
    let mut body = s.trim();
    let mut host = None;
    if let Some(after) = body.strip_prefix("//") {
        let slash = after
            .find('/')
            .ok_or_else(|| Error::Config(format!("Missing namespace after host in {:?}", s)))?;
        host = Some(after[..slash].to_string());
        body = &after[slash + 1..];
    }

    let class_end = body.find(['.', '=']).unwrap_or(body.len());
    let (location, rest) = body.split_at(class_end);
    let (namespace, classname) = match location.rfind(':') {
        Some(colon) => (
            Some(location[..colon].to_string()),
            &location[colon + 1..],
        ),
        None => (None, location),
    };
    if classname.is_empty() {
        return Err(Error::Config(format!("Missing class name in {:?}", s)));
    }
    Ok((host, namespace, classname, rest))
}

/// Split `k1="a,b",k2=5` at commas outside quotes.
fn split_keys(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Reference keys render as a quoted instance path. A quoted value that
/// parses back as one with a namespace and key bindings is taken as a
/// reference. Anything else, including a reference rendered without its
/// namespace, stays a string.
fn quoted_key_value(text: String) -> CimValue {
    fn is_identifier(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    match text.parse::<CimInstanceName>() {
        Ok(path)
            if !path.keybindings.is_empty()
                && is_identifier(&path.classname)
                && path
                    .namespace
                    .as_deref()
                    .is_some_and(|ns| ns.split('/').all(is_identifier)) =>
        {
            CimValue::reference(path)
        }
        _ => CimValue::String(text),
    }
}

impl FromStr for CimInstanceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, namespace, classname, rest) = split_location(s)?;
        let mut name = CimInstanceName::new(classname);
        name.host = host;
        name.namespace = namespace;

        if rest == "=@" {
            return Ok(name);
        }
        let keys = rest
            .strip_prefix('.')
            .ok_or_else(|| Error::Config(format!("Missing key bindings in {:?}", s)))?;
        for part in split_keys(keys) {
            let (key, literal) = part
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("Invalid key binding {:?}", part)))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(Error::Config(format!("Empty key name in {:?}", s)));
            }
            let literal = literal.trim();
            let value = if literal.len() >= 2 && literal.starts_with('"') && literal.ends_with('"')
            {
                quoted_key_value(unescape_quoted(&literal[1..literal.len() - 1]))
            } else if literal.is_empty() {
                return Err(Error::Config(format!("Empty value for key {:?}", key)));
            } else {
                CimValue::infer(literal)
            };
            name.keybindings.push(KeyBinding {
                name: key.to_string(),
                value,
            });
        }
        Ok(name)
    }
}

impl FromStr for CimClassName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, namespace, classname, rest) = split_location(s)?;
        if !rest.is_empty() {
            return Err(Error::Config(format!("Unexpected key bindings in class path {:?}", s)));
        }
        Ok(CimClassName {
            classname: classname.to_string(),
            namespace,
            host,
        })
    }
}

impl FromStr for CimObjectPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, _, _, rest) = split_location(s)?;
        if rest.is_empty() {
            Ok(CimObjectPath::Class(s.parse()?))
        } else {
            Ok(CimObjectPath::Instance(s.parse()?))
        }
    }
}

impl Serialize for CimInstanceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for CimClassName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for CimObjectPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
