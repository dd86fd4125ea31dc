//! Instances, classes, and the declarations they are built from.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::path::{CimClassName, CimInstanceName};
use crate::value::{CimType, CimValue};

fn find_named<'a, T>(items: &'a [T], name: &str, key: impl Fn(&T) -> &str) -> Option<&'a T> {
    items.iter().find(|item| key(item).eq_ignore_ascii_case(name))
}

/// Qualifier flavor attributes. `None` means the attribute was absent and
/// the DMTF default applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualifierFlavors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overridable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tosubclass: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toinstance: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translatable: Option<bool>,
}

/// A qualifier value attached to a class, property, method or parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CimQualifier {
    pub name: String,
    pub cim_type: CimType,
    pub is_array: bool,
    pub value: Option<CimValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagated: Option<bool>,
    #[serde(flatten)]
    pub flavors: QualifierFlavors,
}

impl CimQualifier {
    /// A scalar qualifier whose type is taken from the value.
    pub fn new(name: impl Into<String>, value: impl Into<CimValue>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            cim_type: value.cim_type(),
            is_array: value.is_array(),
            value: Some(value),
            propagated: None,
            flavors: QualifierFlavors::default(),
        }
    }
}

/// Scopes a qualifier declaration applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QualifierScopes {
    pub class: bool,
    pub association: bool,
    pub reference: bool,
    pub property: bool,
    pub method: bool,
    pub parameter: bool,
    pub indication: bool,
}

impl QualifierScopes {
    pub fn any() -> Self {
        Self {
            class: true,
            association: true,
            reference: true,
            property: true,
            method: true,
            parameter: true,
            indication: true,
        }
    }

    pub fn is_any(&self) -> bool {
        *self == Self::any()
    }

    /// (CIM-XML attribute name, enabled) pairs in DTD order.
    pub fn entries(&self) -> [(&'static str, bool); 7] {
        [
            ("CLASS", self.class),
            ("ASSOCIATION", self.association),
            ("REFERENCE", self.reference),
            ("PROPERTY", self.property),
            ("METHOD", self.method),
            ("PARAMETER", self.parameter),
            ("INDICATION", self.indication),
        ]
    }

    pub(crate) fn set(&mut self, attribute: &str, enabled: bool) {
        match attribute.to_ascii_uppercase().as_str() {
            "CLASS" => self.class = enabled,
            "ASSOCIATION" => self.association = enabled,
            "REFERENCE" => self.reference = enabled,
            "PROPERTY" => self.property = enabled,
            "METHOD" => self.method = enabled,
            "PARAMETER" => self.parameter = enabled,
            "INDICATION" => self.indication = enabled,
            _ => {}
        }
    }
}

/// `QUALIFIER.DECLARATION`: the schema-level definition of a qualifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CimQualifierDeclaration {
    pub name: String,
    pub cim_type: CimType,
    pub is_array: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_size: Option<u32>,
    pub value: Option<CimValue>,
    pub scopes: QualifierScopes,
    #[serde(flatten)]
    pub flavors: QualifierFlavors,
}

impl CimQualifierDeclaration {
    pub fn new(name: impl Into<String>, cim_type: CimType) -> Self {
        Self {
            name: name.into(),
            cim_type,
            is_array: false,
            array_size: None,
            value: None,
            scopes: QualifierScopes::default(),
            flavors: QualifierFlavors::default(),
        }
    }
}

/// A property of an instance or a property declaration of a class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CimProperty {
    pub name: String,
    pub cim_type: CimType,
    pub is_array: bool,
    pub value: Option<CimValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagated: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<CimQualifier>,
}

impl CimProperty {
    /// A property whose type is taken from the value.
    pub fn new(name: impl Into<String>, value: impl Into<CimValue>) -> Self {
        let value = value.into();
        let mut property = Self::null(name, value.cim_type(), value.is_array());
        property.value = Some(value);
        property
    }

    /// A property with a null value of the given type.
    pub fn null(name: impl Into<String>, cim_type: CimType, is_array: bool) -> Self {
        Self {
            name: name.into(),
            cim_type,
            is_array,
            value: None,
            array_size: None,
            reference_class: None,
            class_origin: None,
            propagated: None,
            qualifiers: Vec::new(),
        }
    }

    pub fn qualifier(&self, name: &str) -> Option<&CimQualifier> {
        find_named(&self.qualifiers, name, |q| &q.name)
    }

    pub fn is_key(&self) -> bool {
        self.qualifier("Key")
            .and_then(|q| q.value.as_ref())
            .and_then(CimValue::as_bool)
            .unwrap_or(false)
    }
}

/// A CIM instance. Properties keep the order the server sent them in.
#[derive(Debug, Clone, PartialEq)]
pub struct CimInstance {
    pub classname: String,
    pub properties: Vec<CimProperty>,
    pub qualifiers: Vec<CimQualifier>,
    pub path: Option<CimInstanceName>,
}

impl CimInstance {
    pub fn new(classname: impl Into<String>) -> Self {
        Self {
            classname: classname.into(),
            properties: Vec::new(),
            qualifiers: Vec::new(),
            path: None,
        }
    }

    /// Add or replace a property, builder style.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<CimValue>) -> Self {
        self.set_property(CimProperty::new(name, value));
        self
    }

    pub fn with_path(mut self, path: CimInstanceName) -> Self {
        self.path = Some(path);
        self
    }

    /// Insert a property, replacing one with the same case-insensitive name
    /// in place.
    pub fn set_property(&mut self, property: CimProperty) {
        match self
            .properties
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&property.name))
        {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    pub fn property(&self, name: &str) -> Option<&CimProperty> {
        find_named(&self.properties, name, |p| &p.name)
    }

    /// Value of a property; `None` both for missing and null properties.
    pub fn get(&self, name: &str) -> Option<&CimValue> {
        self.property(name).and_then(|p| p.value.as_ref())
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }
}

impl Serialize for CimInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Properties<'a>(&'a [CimProperty]);

        impl Serialize for Properties<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for property in self.0 {
                    map.serialize_entry(&property.name, &property.value)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("classname", &self.classname)?;
        if let Some(path) = &self.path {
            map.serialize_entry("path", path)?;
        }
        map.serialize_entry("properties", &Properties(&self.properties))?;
        map.end()
    }
}

/// A method parameter declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CimParameter {
    pub name: String,
    pub cim_type: CimType,
    pub is_array: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_class: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<CimQualifier>,
}

impl CimParameter {
    pub fn new(name: impl Into<String>, cim_type: CimType) -> Self {
        Self {
            name: name.into(),
            cim_type,
            is_array: false,
            array_size: None,
            reference_class: None,
            qualifiers: Vec::new(),
        }
    }
}

/// A method declaration of a class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CimMethod {
    pub name: String,
    /// `None` for methods declared without a return type
    pub return_type: Option<CimType>,
    pub parameters: Vec<CimParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propagated: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<CimQualifier>,
}

impl CimMethod {
    pub fn new(name: impl Into<String>, return_type: Option<CimType>) -> Self {
        Self {
            name: name.into(),
            return_type,
            parameters: Vec::new(),
            class_origin: None,
            propagated: None,
            qualifiers: Vec::new(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&CimParameter> {
        find_named(&self.parameters, name, |p| &p.name)
    }
}

/// A class declaration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CimClass {
    pub classname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
    pub properties: Vec<CimProperty>,
    pub methods: Vec<CimMethod>,
    pub qualifiers: Vec<CimQualifier>,
}

impl CimClass {
    pub fn new(classname: impl Into<String>) -> Self {
        Self {
            classname: classname.into(),
            superclass: None,
            properties: Vec::new(),
            methods: Vec::new(),
            qualifiers: Vec::new(),
        }
    }

    pub fn with_superclass(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&CimProperty> {
        find_named(&self.properties, name, |p| &p.name)
    }

    pub fn method(&self, name: &str) -> Option<&CimMethod> {
        find_named(&self.methods, name, |m| &m.name)
    }

    pub fn qualifier(&self, name: &str) -> Option<&CimQualifier> {
        find_named(&self.qualifiers, name, |q| &q.name)
    }

    /// Names of properties carrying a true `Key` qualifier.
    pub fn key_properties(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|p| p.is_key())
            .map(|p| p.name.as_str())
    }
}

/// Result of an association traversal: an instance (with its path) or a
/// class together with its path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AssociatedObject {
    Instance(CimInstance),
    Class { path: CimClassName, class: CimClass },
}

/// Output of an extrinsic method call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MethodResult {
    pub return_value: Option<CimValue>,
    /// Output parameters in wire order
    pub out_params: Vec<(String, Option<CimValue>)>,
}

impl MethodResult {
    pub fn out_param(&self, name: &str) -> Option<&CimValue> {
        self.out_params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_ref())
    }
}
