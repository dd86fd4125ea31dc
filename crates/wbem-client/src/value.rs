//! CIM data types and typed values.

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::datetime::CimDateTime;
use crate::error::Error;
use crate::objects::{CimClass, CimInstance};
use crate::path::{CimInstanceName, CimObjectPath};

/// The CIM type of a property, parameter, qualifier or key binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CimType {
    Boolean,
    Uint8,
    Sint8,
    Uint16,
    Sint16,
    Uint32,
    Sint32,
    Uint64,
    Sint64,
    Real32,
    Real64,
    Char16,
    String,
    DateTime,
    Reference,
    /// String typed on the wire, carries an embedded instance
    Instance,
    /// String typed on the wire, carries an embedded instance or class
    Object,
}

impl CimType {
    /// Value of the CIM-XML `TYPE`/`PARAMTYPE` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            CimType::Boolean => "boolean",
            CimType::Uint8 => "uint8",
            CimType::Sint8 => "sint8",
            CimType::Uint16 => "uint16",
            CimType::Sint16 => "sint16",
            CimType::Uint32 => "uint32",
            CimType::Sint32 => "sint32",
            CimType::Uint64 => "uint64",
            CimType::Sint64 => "sint64",
            CimType::Real32 => "real32",
            CimType::Real64 => "real64",
            CimType::Char16 => "char16",
            CimType::String | CimType::Instance | CimType::Object => "string",
            CimType::DateTime => "datetime",
            CimType::Reference => "reference",
        }
    }

    /// Value of the `EmbeddedObject` attribute, if this type needs one.
    pub fn embedded_object(&self) -> Option<&'static str> {
        match self {
            CimType::Instance => Some("instance"),
            CimType::Object => Some("object"),
            _ => None,
        }
    }

    /// Resolve a wire `TYPE` together with an optional `EmbeddedObject`
    /// attribute into a type.
    pub fn from_wire(type_attr: &str, embedded_object: Option<&str>) -> Result<Self, Error> {
        let ty: CimType = type_attr.parse()?;
        match (ty, embedded_object) {
            (CimType::String, Some(e)) if e.eq_ignore_ascii_case("instance") => {
                Ok(CimType::Instance)
            }
            (CimType::String, Some(e)) if e.eq_ignore_ascii_case("object") => Ok(CimType::Object),
            (_, Some(e)) => Err(Error::protocol(format!(
                "EmbeddedObject={:?} on non-string type {}",
                e, type_attr
            ))),
            (ty, None) => Ok(ty),
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            CimType::Uint8
                | CimType::Sint8
                | CimType::Uint16
                | CimType::Sint16
                | CimType::Uint32
                | CimType::Sint32
                | CimType::Uint64
                | CimType::Sint64
        )
    }

    pub fn is_real(&self) -> bool {
        matches!(self, CimType::Real32 | CimType::Real64)
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, CimType::Instance | CimType::Object)
    }
}

impl FromStr for CimType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "boolean" => CimType::Boolean,
            "uint8" => CimType::Uint8,
            "sint8" => CimType::Sint8,
            "uint16" => CimType::Uint16,
            "sint16" => CimType::Sint16,
            "uint32" => CimType::Uint32,
            "sint32" => CimType::Sint32,
            "uint64" => CimType::Uint64,
            "sint64" => CimType::Sint64,
            "real32" => CimType::Real32,
            "real64" => CimType::Real64,
            "char16" => CimType::Char16,
            "string" => CimType::String,
            "datetime" => CimType::DateTime,
            "reference" => CimType::Reference,
            _ => return Err(Error::protocol(format!("Unknown CIM type {:?}", s))),
        })
    }
}

impl fmt::Display for CimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed CIM value. Null is represented as `None` wherever a value
/// may be absent (`Option<CimValue>`), never as a variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CimValue {
    Boolean(bool),
    Uint8(u8),
    Sint8(i8),
    Uint16(u16),
    Sint16(i16),
    Uint32(u32),
    Sint32(i32),
    Uint64(u64),
    Sint64(i64),
    Real32(f32),
    Real64(f64),
    Char16(char),
    String(String),
    DateTime(CimDateTime),
    Reference(Box<CimObjectPath>),
    Instance(Box<CimInstance>),
    Class(Box<CimClass>),
    Array(CimArray),
}

impl CimValue {
    /// Type of a scalar value, or the element type of an array.
    pub fn cim_type(&self) -> CimType {
        match self {
            CimValue::Boolean(_) => CimType::Boolean,
            CimValue::Uint8(_) => CimType::Uint8,
            CimValue::Sint8(_) => CimType::Sint8,
            CimValue::Uint16(_) => CimType::Uint16,
            CimValue::Sint16(_) => CimType::Sint16,
            CimValue::Uint32(_) => CimType::Uint32,
            CimValue::Sint32(_) => CimType::Sint32,
            CimValue::Uint64(_) => CimType::Uint64,
            CimValue::Sint64(_) => CimType::Sint64,
            CimValue::Real32(_) => CimType::Real32,
            CimValue::Real64(_) => CimType::Real64,
            CimValue::Char16(_) => CimType::Char16,
            CimValue::String(_) => CimType::String,
            CimValue::DateTime(_) => CimType::DateTime,
            CimValue::Reference(_) => CimType::Reference,
            CimValue::Instance(_) => CimType::Instance,
            CimValue::Class(_) => CimType::Object,
            CimValue::Array(array) => array.element_type(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, CimValue::Array(_))
    }

    /// Whether this scalar may be stored in a slot declared with `ty`.
    pub fn fits(&self, ty: CimType) -> bool {
        match (self, ty) {
            (CimValue::Array(_), _) => false,
            (CimValue::Instance(_), CimType::Instance | CimType::Object) => true,
            (CimValue::Class(_), CimType::Object) => true,
            (value, ty) => value.cim_type() == ty,
        }
    }

    pub fn reference(path: impl Into<CimObjectPath>) -> Self {
        CimValue::Reference(Box::new(path.into()))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CimValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CimValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer value widened to `i128`.
    pub fn as_integer(&self) -> Option<i128> {
        Some(match self {
            CimValue::Uint8(v) => *v as i128,
            CimValue::Sint8(v) => *v as i128,
            CimValue::Uint16(v) => *v as i128,
            CimValue::Sint16(v) => *v as i128,
            CimValue::Uint32(v) => *v as i128,
            CimValue::Sint32(v) => *v as i128,
            CimValue::Uint64(v) => *v as i128,
            CimValue::Sint64(v) => *v as i128,
            _ => return None,
        })
    }

    pub fn as_instance_name(&self) -> Option<&CimInstanceName> {
        match self {
            CimValue::Reference(path) => match path.as_ref() {
                CimObjectPath::Instance(name) => Some(name),
                CimObjectPath::Class(_) => None,
            },
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&CimArray> {
        match self {
            CimValue::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Parse the text content of a CIM-XML `VALUE` element as `ty`.
    pub fn parse_scalar(ty: CimType, text: &str) -> Result<Self, Error> {
        let bad = || Error::protocol(format!("Invalid {} value {:?}", ty, text));
        Ok(match ty {
            CimType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" => CimValue::Boolean(true),
                "false" => CimValue::Boolean(false),
                _ => return Err(bad()),
            },
            CimType::Uint8 => CimValue::Uint8(parse_int(text).ok_or_else(bad)?),
            CimType::Sint8 => CimValue::Sint8(parse_int(text).ok_or_else(bad)?),
            CimType::Uint16 => CimValue::Uint16(parse_int(text).ok_or_else(bad)?),
            CimType::Sint16 => CimValue::Sint16(parse_int(text).ok_or_else(bad)?),
            CimType::Uint32 => CimValue::Uint32(parse_int(text).ok_or_else(bad)?),
            CimType::Sint32 => CimValue::Sint32(parse_int(text).ok_or_else(bad)?),
            CimType::Uint64 => CimValue::Uint64(parse_int(text).ok_or_else(bad)?),
            CimType::Sint64 => CimValue::Sint64(parse_int(text).ok_or_else(bad)?),
            CimType::Real32 => CimValue::Real32(text.trim().parse().map_err(|_| bad())?),
            CimType::Real64 => CimValue::Real64(text.trim().parse().map_err(|_| bad())?),
            CimType::Char16 => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => CimValue::Char16(c),
                    _ => return Err(bad()),
                }
            }
            CimType::String => CimValue::String(text.to_string()),
            CimType::DateTime => CimValue::DateTime(text.trim().parse()?),
            CimType::Reference | CimType::Instance | CimType::Object => {
                return Err(Error::protocol(format!(
                    "{} values are not carried as plain text",
                    ty
                )))
            }
        })
    }

    /// Text content used inside a CIM-XML `VALUE` element. `None` for
    /// values that are encoded as elements (references, embedded objects,
    /// arrays).
    pub fn to_wire_string(&self) -> Option<String> {
        Some(match self {
            CimValue::Boolean(true) => "TRUE".to_string(),
            CimValue::Boolean(false) => "FALSE".to_string(),
            CimValue::Uint8(v) => v.to_string(),
            CimValue::Sint8(v) => v.to_string(),
            CimValue::Uint16(v) => v.to_string(),
            CimValue::Sint16(v) => v.to_string(),
            CimValue::Uint32(v) => v.to_string(),
            CimValue::Sint32(v) => v.to_string(),
            CimValue::Uint64(v) => v.to_string(),
            CimValue::Sint64(v) => v.to_string(),
            CimValue::Real32(v) => format_real(*v as f64, v.to_string()),
            CimValue::Real64(v) => format_real(*v, v.to_string()),
            CimValue::Char16(c) => c.to_string(),
            CimValue::String(s) => s.clone(),
            CimValue::DateTime(dt) => dt.to_string(),
            CimValue::Reference(_)
            | CimValue::Instance(_)
            | CimValue::Class(_)
            | CimValue::Array(_) => return None,
        })
    }

    /// Infer a value from an untyped literal as typed by a user or found in
    /// a WBEM URI: `"quoted"` is a string, `true`/`false` a boolean, and
    /// anything numeric becomes `Sint64`, `Uint64` or `Real64`. Any other
    /// text is taken as an unquoted string.
    pub fn infer(literal: &str) -> Self {
        let trimmed = literal.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            return CimValue::String(unescape_quoted(&trimmed[1..trimmed.len() - 1]));
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return CimValue::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return CimValue::Boolean(false);
        }
        if let Ok(v) = trimmed.parse::<i64>() {
            return if v < 0 {
                CimValue::Sint64(v)
            } else {
                CimValue::Uint64(v as u64)
            };
        }
        if let Ok(v) = trimmed.parse::<u64>() {
            return CimValue::Uint64(v);
        }
        if trimmed.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(v) = trimmed.parse::<f64>() {
                return CimValue::Real64(v);
            }
        }
        CimValue::String(literal.to_string())
    }
}

fn format_real(value: f64, shortest: String) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        shortest
    }
}

/// Decimal or `0x` hexadecimal integer literal.
fn parse_int<T>(text: &str) -> Option<T>
where
    T: TryFrom<i128>,
{
    let trimmed = text.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let magnitude = match body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => body.parse::<i128>().ok()?,
    };
    let value = if negative { -magnitude } else { magnitude };
    T::try_from(value).ok()
}

pub(crate) fn unescape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub(crate) fn escape_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for CimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CimValue::Boolean(b) => write!(f, "{}", b),
            CimValue::String(s) => f.write_str(&escape_quoted(s)),
            CimValue::Char16(c) => {
                let mut buf = [0u8; 4];
                let quoted = escape_quoted(c.encode_utf8(&mut buf));
                write!(f, "'{}'", &quoted[1..quoted.len() - 1])
            }
            CimValue::DateTime(dt) => write!(f, "\"{}\"", dt),
            CimValue::Reference(path) => f.write_str(&escape_quoted(&path.to_string())),
            CimValue::Instance(inst) => f.write_str(&crate::mof::instance_to_mof(inst)),
            CimValue::Class(class) => f.write_str(&crate::mof::class_to_mof(class)),
            CimValue::Array(array) => {
                f.write_str("{")?;
                for (i, item) in array.items().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match item {
                        Some(value) => write!(f, "{}", value)?,
                        None => f.write_str("NULL")?,
                    }
                }
                f.write_str("}")
            }
            other => match other.to_wire_string() {
                Some(text) => f.write_str(&text),
                None => Ok(()),
            },
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for CimValue {
                fn from(value: $ty) -> Self {
                    CimValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => Boolean,
    u8 => Uint8,
    i8 => Sint8,
    u16 => Uint16,
    i16 => Sint16,
    u32 => Uint32,
    i32 => Sint32,
    u64 => Uint64,
    i64 => Sint64,
    f32 => Real32,
    f64 => Real64,
    char => Char16,
    String => String,
    CimDateTime => DateTime,
    CimArray => Array,
}

impl From<&str> for CimValue {
    fn from(value: &str) -> Self {
        CimValue::String(value.to_string())
    }
}

impl From<CimInstanceName> for CimValue {
    fn from(value: CimInstanceName) -> Self {
        CimValue::reference(value)
    }
}

impl From<CimInstance> for CimValue {
    fn from(value: CimInstance) -> Self {
        CimValue::Instance(Box::new(value))
    }
}

/// An ordered array whose elements all share one type. Elements may be
/// null individually.
#[derive(Debug, Clone, PartialEq)]
pub struct CimArray {
    element_type: CimType,
    items: Vec<Option<CimValue>>,
}

impl CimArray {
    /// Build an array, checking every non-null element against
    /// `element_type`.
    pub fn new(element_type: CimType, items: Vec<Option<CimValue>>) -> Result<Self, Error> {
        for item in items.iter().flatten() {
            if !item.fits(element_type) {
                return Err(Error::Config(format!(
                    "Array element of type {:?} in array of {:?}",
                    item.cim_type(),
                    element_type
                )));
            }
        }
        Ok(Self {
            element_type,
            items,
        })
    }

    /// An array with no null elements.
    pub fn from_values(
        element_type: CimType,
        values: impl IntoIterator<Item = CimValue>,
    ) -> Result<Self, Error> {
        Self::new(element_type, values.into_iter().map(Some).collect())
    }

    pub fn element_type(&self) -> CimType {
        self.element_type
    }

    pub fn items(&self) -> &[Option<CimValue>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<Option<CimValue>> {
        self.items
    }
}

impl Serialize for CimArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for item in &self.items {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integers_in_range() {
        assert_eq!(
            CimValue::parse_scalar(CimType::Uint8, "255").unwrap(),
            CimValue::Uint8(255)
        );
        assert!(CimValue::parse_scalar(CimType::Uint8, "256").is_err());
        assert!(CimValue::parse_scalar(CimType::Uint32, "-1").is_err());
        assert_eq!(
            CimValue::parse_scalar(CimType::Sint16, " -32768 ").unwrap(),
            CimValue::Sint16(-32768)
        );
        assert_eq!(
            CimValue::parse_scalar(CimType::Uint16, "0x1F").unwrap(),
            CimValue::Uint16(31)
        );
        assert_eq!(
            CimValue::parse_scalar(CimType::Uint64, "18446744073709551615").unwrap(),
            CimValue::Uint64(u64::MAX)
        );
    }

    #[test]
    fn parses_booleans_case_insensitively() {
        assert_eq!(
            CimValue::parse_scalar(CimType::Boolean, "TRUE").unwrap(),
            CimValue::Boolean(true)
        );
        assert_eq!(
            CimValue::parse_scalar(CimType::Boolean, "false").unwrap(),
            CimValue::Boolean(false)
        );
        assert!(CimValue::parse_scalar(CimType::Boolean, "yes").is_err());
    }

    #[test]
    fn string_values_keep_whitespace() {
        assert_eq!(
            CimValue::parse_scalar(CimType::String, "  padded ").unwrap(),
            CimValue::String("  padded ".into())
        );
    }

    #[test]
    fn char16_requires_single_character() {
        assert_eq!(
            CimValue::parse_scalar(CimType::Char16, "x").unwrap(),
            CimValue::Char16('x')
        );
        assert!(CimValue::parse_scalar(CimType::Char16, "xy").is_err());
        assert!(CimValue::parse_scalar(CimType::Char16, "").is_err());
    }

    #[test]
    fn special_reals_use_cim_spelling() {
        assert_eq!(
            CimValue::Real64(f64::INFINITY).to_wire_string().unwrap(),
            "INF"
        );
        assert_eq!(
            CimValue::Real32(f32::NEG_INFINITY).to_wire_string().unwrap(),
            "-INF"
        );
        assert_eq!(CimValue::Real64(f64::NAN).to_wire_string().unwrap(), "NaN");
        assert_eq!(
            CimValue::parse_scalar(CimType::Real64, "INF").unwrap(),
            CimValue::Real64(f64::INFINITY)
        );
    }

    #[test]
    fn embedded_object_types_resolve() {
        assert_eq!(
            CimType::from_wire("string", Some("instance")).unwrap(),
            CimType::Instance
        );
        assert_eq!(
            CimType::from_wire("string", Some("object")).unwrap(),
            CimType::Object
        );
        assert!(CimType::from_wire("uint8", Some("instance")).is_err());
        assert_eq!(CimType::Instance.as_str(), "string");
    }

    #[test]
    fn arrays_reject_mixed_elements() {
        let ok = CimArray::new(
            CimType::Uint32,
            vec![Some(CimValue::Uint32(1)), None, Some(CimValue::Uint32(3))],
        )
        .unwrap();
        assert_eq!(ok.len(), 3);
        assert_eq!(ok.items()[1], None);

        let err = CimArray::new(
            CimType::Uint32,
            vec![Some(CimValue::Uint32(1)), Some(CimValue::String("x".into()))],
        );
        assert!(err.is_err());
    }

    #[test]
    fn infers_untyped_literals() {
        assert_eq!(CimValue::infer("\"a \\\"b\\\"\""), CimValue::String("a \"b\"".into()));
        assert_eq!(CimValue::infer("TRUE"), CimValue::Boolean(true));
        assert_eq!(CimValue::infer("42"), CimValue::Uint64(42));
        assert_eq!(CimValue::infer("-42"), CimValue::Sint64(-42));
        assert_eq!(CimValue::infer("1.5"), CimValue::Real64(1.5));
        assert_eq!(CimValue::infer("sys1"), CimValue::String("sys1".into()));
        assert_eq!(CimValue::infer("nan"), CimValue::String("nan".into()));
    }

    #[test]
    fn display_renders_mof_literals() {
        let array = CimArray::new(
            CimType::String,
            vec![Some("a".into()), None, Some("b\"c".into())],
        )
        .unwrap();
        assert_eq!(
            CimValue::Array(array).to_string(),
            "{\"a\", NULL, \"b\\\"c\"}"
        );
        assert_eq!(CimValue::Boolean(false).to_string(), "false");
        assert_eq!(CimValue::Char16('q').to_string(), "'q'");
    }

    #[test]
    fn serializes_as_plain_json() {
        let array = CimArray::new(CimType::Uint8, vec![Some(CimValue::Uint8(1)), None]).unwrap();
        let json = serde_json::to_value(CimValue::Array(array)).unwrap();
        assert_eq!(json, serde_json::json!([1, null]));
        assert_eq!(
            serde_json::to_value(CimValue::String("x".into())).unwrap(),
            serde_json::json!("x")
        );
    }
}
