//! MOF text rendering for display.

use std::fmt::Write as _;

use crate::objects::{
    CimClass, CimInstance, CimMethod, CimParameter, CimProperty, CimQualifier,
    CimQualifierDeclaration, QualifierFlavors,
};
use crate::value::{CimType, CimValue};

const INDENT: &str = "   ";

fn value_literal(value: Option<&CimValue>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "NULL".to_string(),
    }
}

fn qualifier_entry(q: &CimQualifier) -> String {
    match &q.value {
        Some(CimValue::Boolean(true)) => q.name.clone(),
        Some(v @ CimValue::Array(_)) => format!("{} {}", q.name, v),
        Some(v) => format!("{} ({})", q.name, v),
        None => format!("{} (NULL)", q.name),
    }
}

/// `[A, B ("x")]` followed by a newline, or nothing without qualifiers.
fn qualifier_list(qualifiers: &[CimQualifier], indent: &str) -> String {
    if qualifiers.is_empty() {
        return String::new();
    }
    let entries: Vec<String> = qualifiers.iter().map(qualifier_entry).collect();
    format!("{}[{}]\n", indent, entries.join(", "))
}

fn type_name(ty: CimType) -> &'static str {
    ty.as_str()
}

fn array_suffix(is_array: bool, size: Option<u32>) -> String {
    match (is_array, size) {
        (false, _) => String::new(),
        (true, Some(n)) => format!("[{}]", n),
        (true, None) => "[]".to_string(),
    }
}

/// Render an instance as a MOF `instance of` block.
pub fn instance_to_mof(instance: &CimInstance) -> String {
    let mut out = qualifier_list(&instance.qualifiers, "");
    let _ = writeln!(out, "instance of {} {{", instance.classname);
    for p in &instance.properties {
        let _ = writeln!(out, "{}{} = {};", INDENT, p.name, value_literal(p.value.as_ref()));
    }
    out.push_str("};\n");
    out
}

fn property_declaration(p: &CimProperty) -> String {
    let mut out = qualifier_list(&p.qualifiers, INDENT);
    out.push_str(INDENT);
    if p.cim_type == CimType::Reference && !p.is_array {
        let target = p.reference_class.as_deref().unwrap_or("object");
        let _ = write!(out, "{} REF {}", target, p.name);
    } else {
        let _ = write!(
            out,
            "{} {}{}",
            type_name(p.cim_type),
            p.name,
            array_suffix(p.is_array, p.array_size)
        );
    }
    if let Some(value) = &p.value {
        let _ = write!(out, " = {}", value);
    }
    out.push_str(";\n");
    out
}

fn parameter_declaration(p: &CimParameter) -> String {
    let mut out = String::new();
    if !p.qualifiers.is_empty() {
        let entries: Vec<String> = p.qualifiers.iter().map(qualifier_entry).collect();
        let _ = write!(out, "[{}] ", entries.join(", "));
    }
    if p.cim_type == CimType::Reference {
        let target = p.reference_class.as_deref().unwrap_or("object");
        let _ = write!(out, "{} REF {}", target, p.name);
    } else {
        let _ = write!(out, "{} {}", type_name(p.cim_type), p.name);
    }
    out.push_str(&array_suffix(p.is_array, p.array_size));
    out
}

fn method_declaration(m: &CimMethod) -> String {
    let mut out = qualifier_list(&m.qualifiers, INDENT);
    let return_type = m.return_type.map(type_name).unwrap_or("void");
    let _ = write!(out, "{}{} {}(", INDENT, return_type, m.name);
    let params: Vec<String> = m
        .parameters
        .iter()
        .map(|p| format!("\n{}{}{}", INDENT, INDENT, parameter_declaration(p)))
        .collect();
    out.push_str(&params.join(","));
    out.push_str(");\n");
    out
}

/// Render a class declaration as MOF.
pub fn class_to_mof(class: &CimClass) -> String {
    let mut out = qualifier_list(&class.qualifiers, "");
    let _ = write!(out, "class {}", class.classname);
    if let Some(superclass) = &class.superclass {
        let _ = write!(out, " : {}", superclass);
    }
    out.push_str(" {\n");
    for p in &class.properties {
        out.push('\n');
        out.push_str(&property_declaration(p));
    }
    for m in &class.methods {
        out.push('\n');
        out.push_str(&method_declaration(m));
    }
    out.push_str("\n};\n");
    out
}

fn flavor_names(flavors: &QualifierFlavors) -> Vec<&'static str> {
    let mut names = Vec::new();
    match flavors.overridable {
        Some(true) => names.push("EnableOverride"),
        Some(false) => names.push("DisableOverride"),
        None => {}
    }
    match flavors.tosubclass {
        Some(true) => names.push("ToSubclass"),
        Some(false) => names.push("Restricted"),
        None => {}
    }
    if flavors.toinstance == Some(true) {
        names.push("ToInstance");
    }
    if flavors.translatable == Some(true) {
        names.push("Translatable");
    }
    names
}

/// Render a qualifier declaration as a MOF `Qualifier` statement.
pub fn qualifier_declaration_to_mof(decl: &CimQualifierDeclaration) -> String {
    let mut out = format!(
        "Qualifier {} : {}{}",
        decl.name,
        type_name(decl.cim_type),
        array_suffix(decl.is_array, decl.array_size)
    );
    if let Some(value) = &decl.value {
        let _ = write!(out, " = {}", value);
    }
    let scopes = if decl.scopes.is_any() {
        "any".to_string()
    } else {
        decl.scopes
            .entries()
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(name, _)| name.to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = write!(out, ",\n{}Scope({})", INDENT, scopes);
    let flavors = flavor_names(&decl.flavors);
    if !flavors.is_empty() {
        let _ = write!(out, ",\n{}Flavor({})", INDENT, flavors.join(", "));
    }
    out.push_str(";\n");
    out
}
