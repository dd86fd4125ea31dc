//! Request encoder: builds CIM-XML `SIMPLEREQ` documents.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{Error, Result};
use crate::objects::{
    CimClass, CimInstance, CimMethod, CimParameter, CimProperty, CimQualifier,
    CimQualifierDeclaration, QualifierFlavors,
};
use crate::path::{CimClassName, CimInstanceName, CimObjectPath};
use crate::value::{CimType, CimValue};
use crate::xml::XmlWriter;

pub const CIM_VERSION: &str = "2.0";
pub const DTD_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "1.0";

/// Characters escaped in the `CIMObject` header.
const HEADER_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Value of one `IPARAMVALUE` of an intrinsic call.
#[derive(Debug, Clone)]
pub(crate) enum IParamValue {
    Boolean(bool),
    String(String),
    ClassName(String),
    InstanceName(CimInstanceName),
    ObjectName(CimObjectPath),
    PropertyList(Vec<String>),
    Instance(CimInstance),
    NamedInstance(CimInstance),
    Class(CimClass),
    QualifierDeclaration(CimQualifierDeclaration),
}

#[derive(Debug, Clone)]
pub(crate) struct IParam {
    pub name: &'static str,
    pub value: IParamValue,
}

impl IParam {
    pub fn new(name: &'static str, value: IParamValue) -> Self {
        Self { name, value }
    }
}

/// A serialized operation ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    pub message_id: u64,
    /// `CIMMethod` header value
    pub method: String,
    /// `CIMObject` header value, already percent-encoded
    pub object: String,
    pub body: String,
}

/// Normalise a namespace name: surrounding slashes are dropped.
pub(crate) fn normalize_namespace(namespace: &str) -> Result<String> {
    let trimmed = namespace.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(str::is_empty) {
        return Err(Error::Config(format!("Invalid namespace {:?}", namespace)));
    }
    Ok(trimmed.to_string())
}

fn header_value(raw: &str) -> String {
    utf8_percent_encode(raw, HEADER_ESCAPE).to_string()
}

fn open_envelope(w: &mut XmlWriter, message_id: u64) {
    let id = message_id.to_string();
    w.declaration();
    w.start("CIM", &[("CIMVERSION", CIM_VERSION), ("DTDVERSION", DTD_VERSION)]);
    w.start("MESSAGE", &[("ID", &id), ("PROTOCOLVERSION", PROTOCOL_VERSION)]);
    w.start("SIMPLEREQ", &[]);
}

fn close_envelope(w: &mut XmlWriter) {
    w.end("SIMPLEREQ");
    w.end("MESSAGE");
    w.end("CIM");
}

/// Encode an intrinsic method call against `namespace`.
pub(crate) fn intrinsic(
    message_id: u64,
    method: &str,
    namespace: &str,
    params: &[IParam],
) -> Result<EncodedRequest> {
    let namespace = normalize_namespace(namespace)?;
    let mut w = XmlWriter::new();
    open_envelope(&mut w, message_id);
    w.start("IMETHODCALL", &[("NAME", method)]);
    write_local_namespace_path(&mut w, &namespace);
    for param in params {
        write_iparam(&mut w, param)?;
    }
    w.end("IMETHODCALL");
    close_envelope(&mut w);

    Ok(EncodedRequest {
        message_id,
        method: method.to_string(),
        object: header_value(&namespace),
        body: w.into_string(),
    })
}

/// Encode an extrinsic method call on `target`. `default_namespace` is used
/// when the target path carries none.
pub(crate) fn extrinsic(
    message_id: u64,
    method: &str,
    target: &CimObjectPath,
    default_namespace: &str,
    params: &[(String, Option<CimValue>)],
) -> Result<EncodedRequest> {
    let namespace = normalize_namespace(target.namespace().unwrap_or(default_namespace))?;
    let mut w = XmlWriter::new();
    open_envelope(&mut w, message_id);
    w.start("METHODCALL", &[("NAME", method)]);
    let object = match target {
        CimObjectPath::Instance(path) => {
            w.start("LOCALINSTANCEPATH", &[]);
            write_local_namespace_path(&mut w, &namespace);
            write_instance_name(&mut w, path)?;
            w.end("LOCALINSTANCEPATH");
            let mut local = path.clone();
            local.host = None;
            local.namespace = Some(namespace.clone());
            local.to_string()
        }
        CimObjectPath::Class(path) => {
            w.start("LOCALCLASSPATH", &[]);
            write_local_namespace_path(&mut w, &namespace);
            w.empty("CLASSNAME", &[("NAME", &path.classname)]);
            w.end("LOCALCLASSPATH");
            format!("{}:{}", namespace, path.classname)
        }
    };
    for (name, value) in params {
        write_param_value(&mut w, name, value.as_ref())?;
    }
    w.end("METHODCALL");
    close_envelope(&mut w);

    Ok(EncodedRequest {
        message_id,
        method: method.to_string(),
        object: header_value(&object),
        body: w.into_string(),
    })
}

fn write_local_namespace_path(w: &mut XmlWriter, namespace: &str) {
    w.start("LOCALNAMESPACEPATH", &[]);
    for segment in namespace.split('/').filter(|s| !s.is_empty()) {
        w.empty("NAMESPACE", &[("NAME", segment)]);
    }
    w.end("LOCALNAMESPACEPATH");
}

fn write_namespace_path(w: &mut XmlWriter, host: &str, namespace: &str) {
    w.start("NAMESPACEPATH", &[]);
    w.text_element("HOST", &[], host);
    write_local_namespace_path(w, namespace);
    w.end("NAMESPACEPATH");
}

fn write_iparam(w: &mut XmlWriter, param: &IParam) -> Result<()> {
    w.start("IPARAMVALUE", &[("NAME", param.name)]);
    match &param.value {
        IParamValue::Boolean(b) => w.text_element("VALUE", &[], if *b { "TRUE" } else { "FALSE" }),
        IParamValue::String(s) => w.text_element("VALUE", &[], s),
        IParamValue::ClassName(name) => w.empty("CLASSNAME", &[("NAME", name)]),
        IParamValue::InstanceName(path) => write_instance_name(w, path)?,
        IParamValue::ObjectName(CimObjectPath::Instance(path)) => write_instance_name(w, path)?,
        IParamValue::ObjectName(CimObjectPath::Class(path)) => {
            w.empty("CLASSNAME", &[("NAME", &path.classname)])
        }
        IParamValue::PropertyList(names) => {
            w.start("VALUE.ARRAY", &[]);
            for name in names {
                w.text_element("VALUE", &[], name);
            }
            w.end("VALUE.ARRAY");
        }
        IParamValue::Instance(inst) => write_instance(w, inst)?,
        IParamValue::NamedInstance(inst) => {
            let path = inst.path.as_ref().ok_or_else(|| {
                Error::Config(format!(
                    "Instance of {} has no path; ModifyInstance needs one",
                    inst.classname
                ))
            })?;
            w.start("VALUE.NAMEDINSTANCE", &[]);
            write_instance_name(w, path)?;
            write_instance(w, inst)?;
            w.end("VALUE.NAMEDINSTANCE");
        }
        IParamValue::Class(class) => write_class(w, class)?,
        IParamValue::QualifierDeclaration(decl) => write_qualifier_declaration(w, decl)?,
    }
    w.end("IPARAMVALUE");
    Ok(())
}

fn write_param_value(w: &mut XmlWriter, name: &str, value: Option<&CimValue>) -> Result<()> {
    let Some(value) = value else {
        w.empty("PARAMVALUE", &[("NAME", name)]);
        return Ok(());
    };
    let ty = value.cim_type();
    let mut attrs = vec![("NAME", name), ("PARAMTYPE", ty.as_str())];
    if let Some(embedded) = ty.embedded_object() {
        attrs.push(("EmbeddedObject", embedded));
    }
    w.start("PARAMVALUE", &attrs);
    write_value(w, value)?;
    w.end("PARAMVALUE");
    Ok(())
}

fn keyvalue_type(value: &CimValue) -> Result<&'static str> {
    match value {
        CimValue::Boolean(_) => Ok("boolean"),
        CimValue::String(_) | CimValue::Char16(_) | CimValue::DateTime(_) => Ok("string"),
        v if v.cim_type().is_integer() || v.cim_type().is_real() => Ok("numeric"),
        other => Err(Error::Config(format!(
            "{} values cannot be used as keys",
            other.cim_type()
        ))),
    }
}

pub(crate) fn write_instance_name(w: &mut XmlWriter, path: &CimInstanceName) -> Result<()> {
    w.start("INSTANCENAME", &[("CLASSNAME", &path.classname)]);
    for kb in &path.keybindings {
        w.start("KEYBINDING", &[("NAME", &kb.name)]);
        match &kb.value {
            CimValue::Reference(target) => write_value_reference(w, target)?,
            value => {
                let text = value.to_wire_string().unwrap_or_default();
                w.text_element(
                    "KEYVALUE",
                    &[
                        ("VALUETYPE", keyvalue_type(value)?),
                        ("TYPE", value.cim_type().as_str()),
                    ],
                    &text,
                );
            }
        }
        w.end("KEYBINDING");
    }
    w.end("INSTANCENAME");
    Ok(())
}

fn write_class_path(w: &mut XmlWriter, path: &CimClassName) {
    match (&path.host, &path.namespace) {
        (Some(host), Some(ns)) => {
            w.start("CLASSPATH", &[]);
            write_namespace_path(w, host, ns);
            w.empty("CLASSNAME", &[("NAME", &path.classname)]);
            w.end("CLASSPATH");
        }
        (None, Some(ns)) => {
            w.start("LOCALCLASSPATH", &[]);
            write_local_namespace_path(w, ns);
            w.empty("CLASSNAME", &[("NAME", &path.classname)]);
            w.end("LOCALCLASSPATH");
        }
        _ => w.empty("CLASSNAME", &[("NAME", &path.classname)]),
    }
}

fn write_value_reference(w: &mut XmlWriter, target: &CimObjectPath) -> Result<()> {
    // CIM-XML can only carry a host inside a full namespace path
    if target.host().is_some() && target.namespace().is_none() {
        return Err(Error::Config(format!(
            "Reference {} names a host but no namespace",
            target
        )));
    }
    w.start("VALUE.REFERENCE", &[]);
    match target {
        CimObjectPath::Instance(path) => match (&path.host, &path.namespace) {
            (Some(host), Some(ns)) => {
                w.start("INSTANCEPATH", &[]);
                write_namespace_path(w, host, ns);
                write_instance_name(w, path)?;
                w.end("INSTANCEPATH");
            }
            (None, Some(ns)) => {
                w.start("LOCALINSTANCEPATH", &[]);
                write_local_namespace_path(w, ns);
                write_instance_name(w, path)?;
                w.end("LOCALINSTANCEPATH");
            }
            _ => write_instance_name(w, path)?,
        },
        CimObjectPath::Class(path) => write_class_path(w, path),
    }
    w.end("VALUE.REFERENCE");
    Ok(())
}

/// Standalone CIM-XML text of an embedded instance or class.
fn embedded_text(value: &CimValue) -> Result<String> {
    let mut inner = XmlWriter::new();
    match value {
        CimValue::Instance(inst) => write_instance(&mut inner, inst)?,
        CimValue::Class(class) => write_class(&mut inner, class)?,
        other => {
            return Err(Error::Config(format!(
                "{} is not an embedded object",
                other.cim_type()
            )))
        }
    }
    Ok(inner.into_string())
}

fn write_scalar(w: &mut XmlWriter, value: &CimValue) -> Result<()> {
    match value {
        CimValue::Reference(target) => write_value_reference(w, target),
        CimValue::Instance(_) | CimValue::Class(_) => {
            w.text_element("VALUE", &[], &embedded_text(value)?);
            Ok(())
        }
        CimValue::Array(_) => Err(Error::Config("Nested arrays are not allowed".into())),
        scalar => {
            w.text_element("VALUE", &[], &scalar.to_wire_string().unwrap_or_default());
            Ok(())
        }
    }
}

/// Write `VALUE`, `VALUE.ARRAY`, `VALUE.REFERENCE` or `VALUE.REFARRAY`.
pub(crate) fn write_value(w: &mut XmlWriter, value: &CimValue) -> Result<()> {
    match value {
        CimValue::Array(array) => {
            let wrapper = if array.element_type() == CimType::Reference {
                "VALUE.REFARRAY"
            } else {
                "VALUE.ARRAY"
            };
            w.start(wrapper, &[]);
            for item in array.items() {
                match item {
                    Some(v) => write_scalar(w, v)?,
                    None => w.empty("VALUE.NULL", &[]),
                }
            }
            w.end(wrapper);
            Ok(())
        }
        scalar => write_scalar(w, scalar),
    }
}

fn bool_text(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

fn push_flavors<'a>(attrs: &mut Vec<(&'a str, &'a str)>, flavors: &QualifierFlavors) {
    let entries = [
        ("OVERRIDABLE", flavors.overridable),
        ("TOSUBCLASS", flavors.tosubclass),
        ("TOINSTANCE", flavors.toinstance),
        ("TRANSLATABLE", flavors.translatable),
    ];
    for (name, value) in entries {
        if let Some(value) = value {
            attrs.push((name, bool_text(value)));
        }
    }
}

fn write_qualifier(w: &mut XmlWriter, q: &CimQualifier) -> Result<()> {
    let mut attrs = vec![("NAME", q.name.as_str()), ("TYPE", q.cim_type.as_str())];
    if let Some(propagated) = q.propagated {
        attrs.push(("PROPAGATED", bool_text(propagated)));
    }
    push_flavors(&mut attrs, &q.flavors);
    match &q.value {
        Some(value) => {
            w.start("QUALIFIER", &attrs);
            write_value(w, value)?;
            w.end("QUALIFIER");
        }
        None => w.empty("QUALIFIER", &attrs),
    }
    Ok(())
}

fn write_qualifiers(w: &mut XmlWriter, qualifiers: &[CimQualifier]) -> Result<()> {
    for q in qualifiers {
        write_qualifier(w, q)?;
    }
    Ok(())
}

pub(crate) fn write_property(w: &mut XmlWriter, p: &CimProperty) -> Result<()> {
    let array_size = p.array_size.map(|n| n.to_string());
    let (element, mut attrs) = if p.cim_type == CimType::Reference && !p.is_array {
        let mut attrs = vec![("NAME", p.name.as_str())];
        if let Some(rc) = &p.reference_class {
            attrs.push(("REFERENCECLASS", rc.as_str()));
        }
        ("PROPERTY.REFERENCE", attrs)
    } else {
        let element = if p.is_array { "PROPERTY.ARRAY" } else { "PROPERTY" };
        let mut attrs = vec![("NAME", p.name.as_str()), ("TYPE", p.cim_type.as_str())];
        if let Some(size) = &array_size {
            attrs.push(("ARRAYSIZE", size.as_str()));
        }
        if let Some(embedded) = p.cim_type.embedded_object() {
            attrs.push(("EmbeddedObject", embedded));
        }
        (element, attrs)
    };
    if let Some(origin) = &p.class_origin {
        attrs.push(("CLASSORIGIN", origin.as_str()));
    }
    if let Some(propagated) = p.propagated {
        attrs.push(("PROPAGATED", bool_text(propagated)));
    }

    w.start(element, &attrs);
    write_qualifiers(w, &p.qualifiers)?;
    if let Some(value) = &p.value {
        write_value(w, value)?;
    }
    w.end(element);
    Ok(())
}

pub(crate) fn write_instance(w: &mut XmlWriter, inst: &CimInstance) -> Result<()> {
    w.start("INSTANCE", &[("CLASSNAME", &inst.classname)]);
    write_qualifiers(w, &inst.qualifiers)?;
    for p in &inst.properties {
        write_property(w, p)?;
    }
    w.end("INSTANCE");
    Ok(())
}

fn write_parameter(w: &mut XmlWriter, p: &CimParameter) -> Result<()> {
    let array_size = p.array_size.map(|n| n.to_string());
    let is_ref = p.cim_type == CimType::Reference;
    let element = match (is_ref, p.is_array) {
        (false, false) => "PARAMETER",
        (true, false) => "PARAMETER.REFERENCE",
        (false, true) => "PARAMETER.ARRAY",
        (true, true) => "PARAMETER.REFARRAY",
    };
    let mut attrs = vec![("NAME", p.name.as_str())];
    if is_ref {
        if let Some(rc) = &p.reference_class {
            attrs.push(("REFERENCECLASS", rc.as_str()));
        }
    } else {
        attrs.push(("TYPE", p.cim_type.as_str()));
    }
    if let Some(size) = &array_size {
        attrs.push(("ARRAYSIZE", size.as_str()));
    }
    if let Some(embedded) = p.cim_type.embedded_object() {
        attrs.push(("EmbeddedObject", embedded));
    }
    w.start(element, &attrs);
    write_qualifiers(w, &p.qualifiers)?;
    w.end(element);
    Ok(())
}

fn write_method(w: &mut XmlWriter, m: &CimMethod) -> Result<()> {
    let mut attrs = vec![("NAME", m.name.as_str())];
    if let Some(ty) = m.return_type {
        attrs.push(("TYPE", ty.as_str()));
    }
    if let Some(origin) = &m.class_origin {
        attrs.push(("CLASSORIGIN", origin.as_str()));
    }
    if let Some(propagated) = m.propagated {
        attrs.push(("PROPAGATED", bool_text(propagated)));
    }
    w.start("METHOD", &attrs);
    write_qualifiers(w, &m.qualifiers)?;
    for p in &m.parameters {
        write_parameter(w, p)?;
    }
    w.end("METHOD");
    Ok(())
}

pub(crate) fn write_class(w: &mut XmlWriter, class: &CimClass) -> Result<()> {
    let mut attrs = vec![("NAME", class.classname.as_str())];
    if let Some(superclass) = &class.superclass {
        attrs.push(("SUPERCLASS", superclass.as_str()));
    }
    w.start("CLASS", &attrs);
    write_qualifiers(w, &class.qualifiers)?;
    for p in &class.properties {
        write_property(w, p)?;
    }
    for m in &class.methods {
        write_method(w, m)?;
    }
    w.end("CLASS");
    Ok(())
}

pub(crate) fn write_qualifier_declaration(
    w: &mut XmlWriter,
    decl: &CimQualifierDeclaration,
) -> Result<()> {
    let array_size = decl.array_size.map(|n| n.to_string());
    let mut attrs = vec![
        ("NAME", decl.name.as_str()),
        ("TYPE", decl.cim_type.as_str()),
        ("ISARRAY", bool_text(decl.is_array)),
    ];
    if let Some(size) = &array_size {
        attrs.push(("ARRAYSIZE", size.as_str()));
    }
    push_flavors(&mut attrs, &decl.flavors);

    w.start("QUALIFIER.DECLARATION", &attrs);
    let scopes: Vec<(&str, &str)> = decl
        .scopes
        .entries()
        .into_iter()
        .filter(|(_, enabled)| *enabled)
        .map(|(name, _)| (name, "true"))
        .collect();
    w.empty("SCOPE", &scopes);
    if let Some(value) = &decl.value {
        write_value(w, value)?;
    }
    w.end("QUALIFIER.DECLARATION");
    Ok(())
}
