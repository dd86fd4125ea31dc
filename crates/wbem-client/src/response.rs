//! Response decoder: turns CIM-XML `SIMPLERSP` documents into typed values.
//!
//! The element decoders are public so callers can load CIM-XML fragments
//! (a class or qualifier declaration kept in a file, for example) with the
//! same rules the client applies to server responses.

use tracing::warn;

use crate::error::{CimError, Error, Result};
use crate::objects::{
    AssociatedObject, CimClass, CimInstance, CimMethod, CimParameter, CimProperty, CimQualifier,
    CimQualifierDeclaration, MethodResult, QualifierFlavors,
};
use crate::path::{CimClassName, CimInstanceName, CimObjectPath, KeyBinding};
use crate::status::CimStatusCode;
use crate::value::{CimArray, CimType, CimValue};
use crate::xml::{self, Element};

fn unexpected(parent: &str, child: &Element) -> Error {
    Error::protocol(format!("Unexpected <{}> inside <{}>", child.name, parent))
}

fn skip_unknown(parent: &str, child: &Element) {
    warn!(element = %child.name, parent, "Skipping unknown CIM-XML element");
}

/// Validate the envelope and return the `*RESPONSE` element named `method`.
fn open_envelope(
    document: &Element,
    expected_id: u64,
    response: &str,
    method: &str,
) -> Result<Element> {
    if !document.is("CIM") {
        return Err(Error::protocol(format!(
            "Expected <CIM> root element, found <{}>",
            document.name
        )));
    }
    let message = document.required_child("MESSAGE")?;
    let id = message.required_attr("ID")?;
    if id.trim() != expected_id.to_string() {
        return Err(Error::protocol(format!(
            "Response message ID {} does not match request ID {}",
            id, expected_id
        )));
    }
    let simple = message.required_child("SIMPLERSP")?;
    let body = simple.required_child(response)?;
    let name = body.required_attr("NAME")?;
    if !name.eq_ignore_ascii_case(method) {
        return Err(Error::protocol(format!(
            "Response is for {}, expected {}",
            name, method
        )));
    }
    if let Some(error) = body.child("ERROR") {
        return Err(decode_error(error)?.into());
    }
    Ok(body.clone())
}

fn decode_error(error: &Element) -> Result<CimError> {
    let code = error.required_attr("CODE")?;
    let status = code
        .trim()
        .parse::<u32>()
        .map(CimStatusCode::from_code)
        .map_err(|_| Error::protocol(format!("Invalid ERROR CODE {:?}", code)))?;
    let description = error
        .attr("DESCRIPTION")
        .map(str::to_string)
        .filter(|d| !d.is_empty());
    Ok(CimError::new(status, description))
}

/// Parse an intrinsic response and return the children of `IRETURNVALUE`
/// (empty when the operation returns nothing).
pub fn parse_imethod_response(body: &str, message_id: u64, method: &str) -> Result<Vec<Element>> {
    let document = xml::parse(body)?;
    let response = open_envelope(&document, message_id, "IMETHODRESPONSE", method)?;
    Ok(response
        .child("IRETURNVALUE")
        .map(|r| r.children.clone())
        .unwrap_or_default())
}

/// Parse an extrinsic method response.
pub fn parse_method_response(body: &str, message_id: u64, method: &str) -> Result<MethodResult> {
    let document = xml::parse(body)?;
    let response = open_envelope(&document, message_id, "METHODRESPONSE", method)?;

    let mut result = MethodResult::default();
    for child in &response.children {
        match child.name.as_str() {
            "RETURNVALUE" => result.return_value = decode_typed_slot(child, "PARAMTYPE")?,
            "PARAMVALUE" => {
                let name = child.required_attr("NAME")?.to_string();
                result.out_params.push((name, decode_typed_slot(child, "PARAMTYPE")?));
            }
            _ => skip_unknown("METHODRESPONSE", child),
        }
    }
    Ok(result)
}

/// Value of a `RETURNVALUE` or `PARAMVALUE`, whose type attribute is
/// optional. Untyped values decode as strings.
fn decode_typed_slot(el: &Element, type_attr: &str) -> Result<Option<CimValue>> {
    let declared = match el.attr(type_attr) {
        Some(ty) => Some(CimType::from_wire(ty, embedded_attr(el))?),
        None => None,
    };
    let Some(content) = el.children.first() else {
        return Ok(None);
    };
    let ty = match (declared, content.name.as_str()) {
        (Some(ty), _) => ty,
        (None, "VALUE.REFERENCE" | "VALUE.REFARRAY") => CimType::Reference,
        (None, _) => CimType::String,
    };
    let is_array = matches!(content.name.as_str(), "VALUE.ARRAY" | "VALUE.REFARRAY");
    decode_value_content(content, ty, is_array)
}

fn embedded_attr(el: &Element) -> Option<&str> {
    el.attr("EmbeddedObject")
}

// Paths

fn decode_local_namespace(el: &Element) -> Result<String> {
    let segments: Vec<&str> = el
        .children_named("NAMESPACE")
        .map(|ns| ns.required_attr("NAME"))
        .collect::<Result<_>>()?;
    if segments.is_empty() {
        return Err(Error::protocol("<LOCALNAMESPACEPATH> has no <NAMESPACE>"));
    }
    Ok(segments.join("/"))
}

fn decode_namespace_path(el: &Element) -> Result<(String, String)> {
    let host = el.required_child("HOST")?.text.trim().to_string();
    let namespace = decode_local_namespace(el.required_child("LOCALNAMESPACEPATH")?)?;
    Ok((host, namespace))
}

fn decode_key_value(el: &Element) -> Result<CimValue> {
    let text = el.text.as_str();
    if let Some(ty) = el.attr("TYPE") {
        return CimValue::parse_scalar(ty.parse()?, text);
    }
    let value_type = el.attr("VALUETYPE").unwrap_or("string");
    match value_type.to_ascii_lowercase().as_str() {
        "string" => Ok(CimValue::String(text.to_string())),
        "boolean" => CimValue::parse_scalar(CimType::Boolean, text),
        "numeric" => match CimValue::infer(text) {
            v @ (CimValue::Uint64(_) | CimValue::Sint64(_) | CimValue::Real64(_)) => Ok(v),
            _ => Err(Error::protocol(format!("Invalid numeric key value {:?}", text))),
        },
        other => Err(Error::protocol(format!("Unknown KEYVALUE VALUETYPE {:?}", other))),
    }
}

/// Decode an `INSTANCENAME` element.
pub fn decode_instance_name(el: &Element) -> Result<CimInstanceName> {
    if !el.is("INSTANCENAME") {
        return Err(Error::protocol(format!("Expected <INSTANCENAME>, found <{}>", el.name)));
    }
    let mut name = CimInstanceName::new(el.required_attr("CLASSNAME")?);
    for child in &el.children {
        match child.name.as_str() {
            "KEYBINDING" => {
                let key = child.required_attr("NAME")?.to_string();
                let value = match child.children.first() {
                    Some(v) if v.is("KEYVALUE") => decode_key_value(v)?,
                    Some(v) if v.is("VALUE.REFERENCE") => {
                        CimValue::reference(decode_value_reference(v)?)
                    }
                    _ => {
                        return Err(Error::protocol(format!(
                            "<KEYBINDING NAME=\"{}\"> has no value",
                            key
                        )))
                    }
                };
                name.keybindings.push(KeyBinding { name: key, value });
            }
            // Single unnamed key, DSP0201 allows it for one-key classes
            "KEYVALUE" => name.keybindings.push(KeyBinding {
                name: String::new(),
                value: decode_key_value(child)?,
            }),
            "VALUE.REFERENCE" => name.keybindings.push(KeyBinding {
                name: String::new(),
                value: CimValue::reference(decode_value_reference(child)?),
            }),
            _ => skip_unknown("INSTANCENAME", child),
        }
    }
    Ok(name)
}

fn decode_class_name(el: &Element) -> Result<CimClassName> {
    if !el.is("CLASSNAME") {
        return Err(Error::protocol(format!("Expected <CLASSNAME>, found <{}>", el.name)));
    }
    Ok(CimClassName::new(el.required_attr("NAME")?))
}

/// Decode any of the instance or class path forms: `INSTANCEPATH`,
/// `LOCALINSTANCEPATH`, `INSTANCENAME`, `CLASSPATH`, `LOCALCLASSPATH`,
/// `CLASSNAME`, or an `OBJECTPATH` wrapping one of them.
pub fn decode_object_path(el: &Element) -> Result<CimObjectPath> {
    match el.name.as_str() {
        "OBJECTPATH" => match el.children.first() {
            Some(inner) => decode_object_path(inner),
            None => Err(Error::protocol("Empty <OBJECTPATH>")),
        },
        "INSTANCEPATH" => {
            let (host, namespace) = decode_namespace_path(el.required_child("NAMESPACEPATH")?)?;
            let name = decode_instance_name(el.required_child("INSTANCENAME")?)?;
            Ok(name.with_host(host).with_namespace(namespace).into())
        }
        "LOCALINSTANCEPATH" => {
            let namespace = decode_local_namespace(el.required_child("LOCALNAMESPACEPATH")?)?;
            let name = decode_instance_name(el.required_child("INSTANCENAME")?)?;
            Ok(name.with_namespace(namespace).into())
        }
        "INSTANCENAME" => Ok(decode_instance_name(el)?.into()),
        "CLASSPATH" => {
            let (host, namespace) = decode_namespace_path(el.required_child("NAMESPACEPATH")?)?;
            let name = decode_class_name(el.required_child("CLASSNAME")?)?;
            Ok(name.with_host(host).with_namespace(namespace).into())
        }
        "LOCALCLASSPATH" => {
            let namespace = decode_local_namespace(el.required_child("LOCALNAMESPACEPATH")?)?;
            let name = decode_class_name(el.required_child("CLASSNAME")?)?;
            Ok(name.with_namespace(namespace).into())
        }
        "CLASSNAME" => Ok(decode_class_name(el)?.into()),
        other => Err(Error::protocol(format!("<{}> is not an object path", other))),
    }
}

fn decode_instance_path(el: &Element) -> Result<CimInstanceName> {
    match decode_object_path(el)? {
        CimObjectPath::Instance(name) => Ok(name),
        CimObjectPath::Class(name) => Err(Error::protocol(format!(
            "Expected an instance path, found class path {}",
            name
        ))),
    }
}

fn decode_value_reference(el: &Element) -> Result<CimObjectPath> {
    match el.children.first() {
        Some(inner) => decode_object_path(inner),
        None => Err(Error::protocol("Empty <VALUE.REFERENCE>")),
    }
}

// Values

fn decode_embedded(text: &str, ty: CimType) -> Result<CimValue> {
    let root = xml::parse(text)?;
    match root.name.as_str() {
        "INSTANCE" => Ok(CimValue::Instance(Box::new(decode_instance(&root)?))),
        "CLASS" if ty == CimType::Object => Ok(CimValue::Class(Box::new(decode_class(&root)?))),
        other => Err(Error::protocol(format!(
            "Embedded {} holds unexpected <{}>",
            ty, other
        ))),
    }
}

fn decode_scalar(el: &Element, ty: CimType) -> Result<CimValue> {
    match (el.name.as_str(), ty) {
        ("VALUE.REFERENCE", _) => Ok(CimValue::reference(decode_value_reference(el)?)),
        ("VALUE", CimType::Instance | CimType::Object) => decode_embedded(&el.text, ty),
        ("VALUE", ty) => CimValue::parse_scalar(ty, &el.text),
        (other, _) => Err(Error::protocol(format!("<{}> is not a scalar value", other))),
    }
}

fn decode_array(el: &Element, ty: CimType) -> Result<CimValue> {
    let mut items = Vec::with_capacity(el.children.len());
    for child in &el.children {
        items.push(match child.name.as_str() {
            "VALUE.NULL" => None,
            "VALUE" | "VALUE.REFERENCE" => Some(decode_scalar(child, ty)?),
            _ => return Err(unexpected(&el.name, child)),
        });
    }
    CimArray::new(ty, items)
        .map(CimValue::Array)
        .map_err(|e| Error::protocol(e.to_string()))
}

/// Decode a value element (`VALUE`, `VALUE.ARRAY`, `VALUE.REFERENCE` or
/// `VALUE.REFARRAY`) against its declared type.
fn decode_value_content(el: &Element, ty: CimType, is_array: bool) -> Result<Option<CimValue>> {
    let value = match el.name.as_str() {
        "VALUE.NULL" => return Ok(None),
        "VALUE.ARRAY" | "VALUE.REFARRAY" if is_array => decode_array(el, ty)?,
        "VALUE" | "VALUE.REFERENCE" if !is_array => decode_scalar(el, ty)?,
        other => {
            return Err(Error::protocol(format!(
                "<{}> does not match declared {}{}",
                other,
                ty,
                if is_array { " array" } else { "" }
            )))
        }
    };
    Ok(Some(value))
}

/// First value element among `children`, if any.
fn find_value(el: &Element) -> Option<&Element> {
    el.children.iter().find(|c| {
        matches!(
            c.name.as_str(),
            "VALUE" | "VALUE.ARRAY" | "VALUE.REFERENCE" | "VALUE.REFARRAY" | "VALUE.NULL"
        )
    })
}

// Qualifiers

fn decode_flavors(el: &Element) -> Result<QualifierFlavors> {
    Ok(QualifierFlavors {
        overridable: el.bool_attr("OVERRIDABLE")?,
        tosubclass: el.bool_attr("TOSUBCLASS")?,
        toinstance: el.bool_attr("TOINSTANCE")?,
        translatable: el.bool_attr("TRANSLATABLE")?,
    })
}

fn decode_qualifier(el: &Element) -> Result<CimQualifier> {
    let cim_type: CimType = el.required_attr("TYPE")?.parse()?;
    let value_el = find_value(el);
    let is_array = value_el.map(|v| v.is("VALUE.ARRAY")).unwrap_or(false);
    let value = match value_el {
        Some(v) => decode_value_content(v, cim_type, is_array)?,
        None => None,
    };
    Ok(CimQualifier {
        name: el.required_attr("NAME")?.to_string(),
        cim_type,
        is_array,
        value,
        propagated: el.bool_attr("PROPAGATED")?,
        flavors: decode_flavors(el)?,
    })
}

fn decode_qualifiers(el: &Element) -> Result<Vec<CimQualifier>> {
    el.children_named("QUALIFIER").map(decode_qualifier).collect()
}

/// Decode a `QUALIFIER.DECLARATION` element.
pub fn decode_qualifier_declaration(el: &Element) -> Result<CimQualifierDeclaration> {
    if !el.is("QUALIFIER.DECLARATION") {
        return Err(Error::protocol(format!(
            "Expected <QUALIFIER.DECLARATION>, found <{}>",
            el.name
        )));
    }
    let mut decl = CimQualifierDeclaration::new(
        el.required_attr("NAME")?,
        el.required_attr("TYPE")?.parse()?,
    );
    decl.is_array = el.bool_attr("ISARRAY")?.unwrap_or(false);
    decl.array_size = parse_array_size(el)?;
    decl.flavors = decode_flavors(el)?;
    if let Some(scope) = el.child("SCOPE") {
        for (attribute, value) in &scope.attributes {
            decl.scopes.set(attribute, value.eq_ignore_ascii_case("true"));
        }
    }
    if let Some(v) = find_value(el) {
        decl.value = decode_value_content(v, decl.cim_type, decl.is_array)?;
    }
    Ok(decl)
}

fn parse_array_size(el: &Element) -> Result<Option<u32>> {
    match el.attr("ARRAYSIZE") {
        None => Ok(None),
        Some(size) => size
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::protocol(format!("Invalid ARRAYSIZE {:?}", size))),
    }
}

// Properties, instances, classes

fn decode_property(el: &Element) -> Result<CimProperty> {
    let name = el.required_attr("NAME")?;
    let (cim_type, is_array) = match el.name.as_str() {
        "PROPERTY" => (CimType::from_wire(el.required_attr("TYPE")?, embedded_attr(el))?, false),
        "PROPERTY.ARRAY" => (CimType::from_wire(el.required_attr("TYPE")?, embedded_attr(el))?, true),
        "PROPERTY.REFERENCE" => (CimType::Reference, false),
        other => return Err(Error::protocol(format!("<{}> is not a property", other))),
    };
    let mut property = CimProperty::null(name, cim_type, is_array);
    property.array_size = parse_array_size(el)?;
    property.reference_class = el.attr("REFERENCECLASS").map(str::to_string);
    property.class_origin = el.attr("CLASSORIGIN").map(str::to_string);
    property.propagated = el.bool_attr("PROPAGATED")?;
    property.qualifiers = decode_qualifiers(el)?;
    if let Some(v) = find_value(el) {
        property.value = decode_value_content(v, cim_type, is_array)?;
    }
    Ok(property)
}

fn is_property(el: &Element) -> bool {
    matches!(
        el.name.as_str(),
        "PROPERTY" | "PROPERTY.ARRAY" | "PROPERTY.REFERENCE"
    )
}

/// Decode an `INSTANCE` element. The result has no path.
pub fn decode_instance(el: &Element) -> Result<CimInstance> {
    if !el.is("INSTANCE") {
        return Err(Error::protocol(format!("Expected <INSTANCE>, found <{}>", el.name)));
    }
    let mut instance = CimInstance::new(el.required_attr("CLASSNAME")?);
    for child in &el.children {
        match child.name.as_str() {
            "QUALIFIER" => instance.qualifiers.push(decode_qualifier(child)?),
            _ if is_property(child) => instance.properties.push(decode_property(child)?),
            _ => skip_unknown("INSTANCE", child),
        }
    }
    Ok(instance)
}

fn decode_parameter(el: &Element) -> Result<CimParameter> {
    let name = el.required_attr("NAME")?;
    let (cim_type, is_array) = match el.name.as_str() {
        "PARAMETER" => (CimType::from_wire(el.required_attr("TYPE")?, embedded_attr(el))?, false),
        "PARAMETER.ARRAY" => {
            (CimType::from_wire(el.required_attr("TYPE")?, embedded_attr(el))?, true)
        }
        "PARAMETER.REFERENCE" => (CimType::Reference, false),
        "PARAMETER.REFARRAY" => (CimType::Reference, true),
        other => return Err(Error::protocol(format!("<{}> is not a parameter", other))),
    };
    let mut parameter = CimParameter::new(name, cim_type);
    parameter.is_array = is_array;
    parameter.array_size = parse_array_size(el)?;
    parameter.reference_class = el.attr("REFERENCECLASS").map(str::to_string);
    parameter.qualifiers = decode_qualifiers(el)?;
    Ok(parameter)
}

fn decode_method(el: &Element) -> Result<CimMethod> {
    let return_type = match el.attr("TYPE") {
        Some(ty) => Some(ty.parse()?),
        None => None,
    };
    let mut method = CimMethod::new(el.required_attr("NAME")?, return_type);
    method.class_origin = el.attr("CLASSORIGIN").map(str::to_string);
    method.propagated = el.bool_attr("PROPAGATED")?;
    for child in &el.children {
        match child.name.as_str() {
            "QUALIFIER" => method.qualifiers.push(decode_qualifier(child)?),
            name if name.starts_with("PARAMETER") => {
                method.parameters.push(decode_parameter(child)?)
            }
            _ => skip_unknown("METHOD", child),
        }
    }
    Ok(method)
}

/// Decode a `CLASS` element.
pub fn decode_class(el: &Element) -> Result<CimClass> {
    if !el.is("CLASS") {
        return Err(Error::protocol(format!("Expected <CLASS>, found <{}>", el.name)));
    }
    let mut class = CimClass::new(el.required_attr("NAME")?);
    class.superclass = el.attr("SUPERCLASS").map(str::to_string);
    for child in &el.children {
        match child.name.as_str() {
            "QUALIFIER" => class.qualifiers.push(decode_qualifier(child)?),
            "METHOD" => class.methods.push(decode_method(child)?),
            _ if is_property(child) => class.properties.push(decode_property(child)?),
            _ => skip_unknown("CLASS", child),
        }
    }
    Ok(class)
}

/// Decode `VALUE.NAMEDINSTANCE` into an instance carrying its path.
pub fn decode_named_instance(el: &Element) -> Result<CimInstance> {
    let name = decode_instance_name(el.required_child("INSTANCENAME")?)?;
    Ok(decode_instance(el.required_child("INSTANCE")?)?.with_path(name))
}

/// Decode `VALUE.OBJECTWITHPATH` (or `VALUE.INSTANCEWITHPATH`).
pub fn decode_object_with_path(el: &Element) -> Result<AssociatedObject> {
    if let Some(instance) = el.child("INSTANCE") {
        let path = match el.child("INSTANCEPATH") {
            Some(p) => decode_instance_path(p)?,
            None => return Err(Error::protocol(format!("<{}> has no <INSTANCEPATH>", el.name))),
        };
        return Ok(AssociatedObject::Instance(
            decode_instance(instance)?.with_path(path),
        ));
    }
    let class = decode_class(el.required_child("CLASS")?)?;
    match decode_object_path(el.required_child("CLASSPATH")?)? {
        CimObjectPath::Class(path) => Ok(AssociatedObject::Class { path, class }),
        CimObjectPath::Instance(name) => Err(Error::protocol(format!(
            "Class returned with instance path {}",
            name
        ))),
    }
}

/// Decode one object of an `ExecQuery` result as an instance.
pub fn decode_query_object(el: &Element) -> Result<CimInstance> {
    match el.name.as_str() {
        "INSTANCE" => decode_instance(el),
        "VALUE.OBJECT" => decode_instance(el.required_child("INSTANCE")?),
        "VALUE.NAMEDINSTANCE" => decode_named_instance(el),
        "VALUE.OBJECTWITHPATH" | "VALUE.INSTANCEWITHPATH" => match decode_object_with_path(el)? {
            AssociatedObject::Instance(instance) => Ok(instance),
            AssociatedObject::Class { path, .. } => Err(Error::protocol(format!(
                "Query returned class {} instead of an instance",
                path
            ))),
        },
        other => Err(Error::protocol(format!("<{}> is not a query result", other))),
    }
}

/// Load a class from a standalone CIM-XML `CLASS` document.
pub fn class_from_xml(document: &str) -> Result<CimClass> {
    decode_class(&xml::parse(document)?)
}

/// Load a qualifier declaration from a standalone CIM-XML document.
pub fn qualifier_declaration_from_xml(document: &str) -> Result<CimQualifierDeclaration> {
    decode_qualifier_declaration(&xml::parse(document)?)
}

/// Load an instance from a standalone CIM-XML `INSTANCE` document.
pub fn instance_from_xml(document: &str) -> Result<CimInstance> {
    decode_instance(&xml::parse(document)?)
}
