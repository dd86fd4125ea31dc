//! Per-operation option sets.
//!
//! Every field is an `Option`. `None` means the parameter is left out of
//! the request entirely so the server default applies; `Some(false)` is
//! sent as an explicit `FALSE`.

use crate::request::{IParam, IParamValue};

macro_rules! flag_setters {
    ($($(#[$doc:meta])* $field:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $field(mut self, value: bool) -> Self {
                self.$field = Some(value);
                self
            }
        )*
    };
}

macro_rules! string_setters {
    ($($(#[$doc:meta])* $field:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $field(mut self, value: impl Into<String>) -> Self {
                self.$field = Some(value.into());
                self
            }
        )*
    };
}

macro_rules! property_list_setter {
    () => {
        /// Restrict returned properties. An empty list asks for none.
        pub fn property_list<I, S>(mut self, names: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.property_list = Some(names.into_iter().map(Into::into).collect());
            self
        }
    };
}

fn push_flag(params: &mut Vec<IParam>, name: &'static str, value: Option<bool>) {
    if let Some(value) = value {
        params.push(IParam::new(name, IParamValue::Boolean(value)));
    }
}

fn push_class(params: &mut Vec<IParam>, name: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        params.push(IParam::new(name, IParamValue::ClassName(value.clone())));
    }
}

fn push_string(params: &mut Vec<IParam>, name: &'static str, value: &Option<String>) {
    if let Some(value) = value {
        params.push(IParam::new(name, IParamValue::String(value.clone())));
    }
}

fn push_property_list(params: &mut Vec<IParam>, value: &Option<Vec<String>>) {
    if let Some(names) = value {
        params.push(IParam::new(
            "PropertyList",
            IParamValue::PropertyList(names.clone()),
        ));
    }
}

/// Options for `EnumerateInstanceNames`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerateInstanceNamesOptions {
    pub namespace: Option<String>,
}

impl EnumerateInstanceNamesOptions {
    string_setters!(namespace);
}

/// Options for `EnumerateInstances`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerateInstancesOptions {
    pub namespace: Option<String>,
    pub local_only: Option<bool>,
    pub deep_inheritance: Option<bool>,
    pub include_qualifiers: Option<bool>,
    pub include_class_origin: Option<bool>,
    pub property_list: Option<Vec<String>>,
}

impl EnumerateInstancesOptions {
    string_setters!(namespace);
    flag_setters!(
        /// Exclude inherited properties. Server implementations vary for true.
        local_only,
        /// Include properties added by subclasses.
        deep_inheritance,
        include_qualifiers,
        include_class_origin,
    );
    property_list_setter!();

    pub(crate) fn push_iparams(&self, params: &mut Vec<IParam>) {
        push_flag(params, "LocalOnly", self.local_only);
        push_flag(params, "DeepInheritance", self.deep_inheritance);
        push_flag(params, "IncludeQualifiers", self.include_qualifiers);
        push_flag(params, "IncludeClassOrigin", self.include_class_origin);
        push_property_list(params, &self.property_list);
    }
}

/// Options for `GetInstance`. The namespace comes from the instance path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetInstanceOptions {
    pub local_only: Option<bool>,
    pub include_qualifiers: Option<bool>,
    pub include_class_origin: Option<bool>,
    pub property_list: Option<Vec<String>>,
}

impl GetInstanceOptions {
    flag_setters!(local_only, include_qualifiers, include_class_origin);
    property_list_setter!();

    pub(crate) fn push_iparams(&self, params: &mut Vec<IParam>) {
        push_flag(params, "LocalOnly", self.local_only);
        push_flag(params, "IncludeQualifiers", self.include_qualifiers);
        push_flag(params, "IncludeClassOrigin", self.include_class_origin);
        push_property_list(params, &self.property_list);
    }
}

/// Options for `ModifyInstance`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyInstanceOptions {
    pub include_qualifiers: Option<bool>,
    pub property_list: Option<Vec<String>>,
}

impl ModifyInstanceOptions {
    flag_setters!(include_qualifiers);
    property_list_setter!();

    pub(crate) fn push_iparams(&self, params: &mut Vec<IParam>) {
        push_flag(params, "IncludeQualifiers", self.include_qualifiers);
        push_property_list(params, &self.property_list);
    }
}

/// Options for `AssociatorNames`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociatorNamesOptions {
    pub assoc_class: Option<String>,
    pub result_class: Option<String>,
    pub role: Option<String>,
    pub result_role: Option<String>,
}

impl AssociatorNamesOptions {
    string_setters!(assoc_class, result_class, role, result_role);

    pub(crate) fn push_iparams(&self, params: &mut Vec<IParam>) {
        push_class(params, "AssocClass", &self.assoc_class);
        push_class(params, "ResultClass", &self.result_class);
        push_string(params, "Role", &self.role);
        push_string(params, "ResultRole", &self.result_role);
    }
}

/// Options for `Associators`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociatorsOptions {
    pub assoc_class: Option<String>,
    pub result_class: Option<String>,
    pub role: Option<String>,
    pub result_role: Option<String>,
    pub include_qualifiers: Option<bool>,
    pub include_class_origin: Option<bool>,
    pub property_list: Option<Vec<String>>,
}

impl AssociatorsOptions {
    string_setters!(assoc_class, result_class, role, result_role);
    flag_setters!(include_qualifiers, include_class_origin);
    property_list_setter!();

    pub(crate) fn push_iparams(&self, params: &mut Vec<IParam>) {
        push_class(params, "AssocClass", &self.assoc_class);
        push_class(params, "ResultClass", &self.result_class);
        push_string(params, "Role", &self.role);
        push_string(params, "ResultRole", &self.result_role);
        push_flag(params, "IncludeQualifiers", self.include_qualifiers);
        push_flag(params, "IncludeClassOrigin", self.include_class_origin);
        push_property_list(params, &self.property_list);
    }
}

/// Options for `ReferenceNames`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceNamesOptions {
    pub result_class: Option<String>,
    pub role: Option<String>,
}

impl ReferenceNamesOptions {
    string_setters!(result_class, role);

    pub(crate) fn push_iparams(&self, params: &mut Vec<IParam>) {
        push_class(params, "ResultClass", &self.result_class);
        push_string(params, "Role", &self.role);
    }
}

/// Options for `References`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferencesOptions {
    pub result_class: Option<String>,
    pub role: Option<String>,
    pub include_qualifiers: Option<bool>,
    pub include_class_origin: Option<bool>,
    pub property_list: Option<Vec<String>>,
}

impl ReferencesOptions {
    string_setters!(result_class, role);
    flag_setters!(include_qualifiers, include_class_origin);
    property_list_setter!();

    pub(crate) fn push_iparams(&self, params: &mut Vec<IParam>) {
        push_class(params, "ResultClass", &self.result_class);
        push_string(params, "Role", &self.role);
        push_flag(params, "IncludeQualifiers", self.include_qualifiers);
        push_flag(params, "IncludeClassOrigin", self.include_class_origin);
        push_property_list(params, &self.property_list);
    }
}

/// Options for `EnumerateClassNames`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerateClassNamesOptions {
    pub namespace: Option<String>,
    /// Start below this class; `None` enumerates from the top.
    pub classname: Option<String>,
    pub deep_inheritance: Option<bool>,
}

impl EnumerateClassNamesOptions {
    string_setters!(namespace, classname);
    flag_setters!(deep_inheritance);

    pub(crate) fn push_iparams(&self, params: &mut Vec<IParam>) {
        push_class(params, "ClassName", &self.classname);
        push_flag(params, "DeepInheritance", self.deep_inheritance);
    }
}

/// Options for `EnumerateClasses`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerateClassesOptions {
    pub namespace: Option<String>,
    pub classname: Option<String>,
    pub deep_inheritance: Option<bool>,
    pub local_only: Option<bool>,
    pub include_qualifiers: Option<bool>,
    pub include_class_origin: Option<bool>,
}

impl EnumerateClassesOptions {
    string_setters!(namespace, classname);
    flag_setters!(
        deep_inheritance,
        local_only,
        include_qualifiers,
        include_class_origin
    );

    pub(crate) fn push_iparams(&self, params: &mut Vec<IParam>) {
        push_class(params, "ClassName", &self.classname);
        push_flag(params, "DeepInheritance", self.deep_inheritance);
        push_flag(params, "LocalOnly", self.local_only);
        push_flag(params, "IncludeQualifiers", self.include_qualifiers);
        push_flag(params, "IncludeClassOrigin", self.include_class_origin);
    }
}

/// Options for `GetClass`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetClassOptions {
    pub namespace: Option<String>,
    pub local_only: Option<bool>,
    pub include_qualifiers: Option<bool>,
    pub include_class_origin: Option<bool>,
    pub property_list: Option<Vec<String>>,
}

impl GetClassOptions {
    string_setters!(namespace);
    flag_setters!(local_only, include_qualifiers, include_class_origin);
    property_list_setter!();

    pub(crate) fn push_iparams(&self, params: &mut Vec<IParam>) {
        push_flag(params, "LocalOnly", self.local_only);
        push_flag(params, "IncludeQualifiers", self.include_qualifiers);
        push_flag(params, "IncludeClassOrigin", self.include_class_origin);
        push_property_list(params, &self.property_list);
    }
}
