//! Shell command table: parses a command line and dispatches it onto
//! `WbemConnection`.
//!
//! A command is an operation word (short alias such as `ei` or the
//! operation name such as `EnumerateInstances`), its positional arguments,
//! then `key=value` tokens. Keys from the option table (`ns`, `lo`, `di`,
//! `iq`, `ico`, `pl`, `ac`, `rc`, `r`, `rr`) set operation options; any
//! other `Name=value` token is a property or parameter value for
//! `mi`, `ci` and `im`.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use wbem_client::response::{class_from_xml, qualifier_declaration_from_xml};
use wbem_client::{
    AssociatedObject, AssociatorNamesOptions, AssociatorsOptions, CimArray, CimClass,
    CimInstance, CimInstanceName, CimObjectPath, CimProperty,
    CimQualifierDeclaration, CimType, CimValue, EnumerateClassNamesOptions,
    EnumerateClassesOptions, EnumerateInstanceNamesOptions, EnumerateInstancesOptions,
    GetClassOptions, GetInstanceOptions, MethodResult, ModifyInstanceOptions,
    ReferenceNamesOptions, ReferencesOptions, WbemConnection,
};

/// The CIM operations the shell can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    EnumerateInstanceNames,
    EnumerateInstances,
    GetInstance,
    ModifyInstance,
    CreateInstance,
    DeleteInstance,
    AssociatorNames,
    Associators,
    ReferenceNames,
    References,
    InvokeMethod,
    EnumerateClassNames,
    EnumerateClasses,
    GetClass,
    ModifyClass,
    CreateClass,
    DeleteClass,
    EnumerateQualifiers,
    GetQualifier,
    SetQualifier,
    DeleteQualifier,
    ExecQuery,
}

struct CommandSpec {
    alias: Option<&'static str>,
    name: &'static str,
    operation: Operation,
    usage: &'static str,
    /// Minimum and maximum number of positional arguments
    arity: (usize, usize),
    options: &'static [&'static str],
    /// Whether `Name=value` property or parameter tokens are accepted
    takes_values: bool,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        alias: Some("ein"),
        name: "EnumerateInstanceNames",
        operation: Operation::EnumerateInstanceNames,
        usage: "ein CLASSNAME [ns=]",
        arity: (1, 1),
        options: &["ns"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("ei"),
        name: "EnumerateInstances",
        operation: Operation::EnumerateInstances,
        usage: "ei CLASSNAME [ns= lo= di= iq= ico= pl=]",
        arity: (1, 1),
        options: &["ns", "lo", "di", "iq", "ico", "pl"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("gi"),
        name: "GetInstance",
        operation: Operation::GetInstance,
        usage: "gi INSTANCEPATH [ns= lo= iq= ico= pl=]",
        arity: (1, 1),
        options: &["ns", "lo", "iq", "ico", "pl"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("mi"),
        name: "ModifyInstance",
        operation: Operation::ModifyInstance,
        usage: "mi INSTANCEPATH Prop=value... [ns= iq= pl=]",
        arity: (1, 1),
        options: &["ns", "iq", "pl"],
        takes_values: true,
    },
    CommandSpec {
        alias: Some("ci"),
        name: "CreateInstance",
        operation: Operation::CreateInstance,
        usage: "ci CLASSNAME Prop=value... [ns=]",
        arity: (1, 1),
        options: &["ns"],
        takes_values: true,
    },
    CommandSpec {
        alias: Some("di"),
        name: "DeleteInstance",
        operation: Operation::DeleteInstance,
        usage: "di INSTANCEPATH [ns=]",
        arity: (1, 1),
        options: &["ns"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("an"),
        name: "AssociatorNames",
        operation: Operation::AssociatorNames,
        usage: "an OBJECTPATH [ns= ac= rc= r= rr=]",
        arity: (1, 1),
        options: &["ns", "ac", "rc", "r", "rr"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("a"),
        name: "Associators",
        operation: Operation::Associators,
        usage: "a OBJECTPATH [ns= ac= rc= r= rr= iq= ico= pl=]",
        arity: (1, 1),
        options: &["ns", "ac", "rc", "r", "rr", "iq", "ico", "pl"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("rn"),
        name: "ReferenceNames",
        operation: Operation::ReferenceNames,
        usage: "rn OBJECTPATH [ns= rc= r=]",
        arity: (1, 1),
        options: &["ns", "rc", "r"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("r"),
        name: "References",
        operation: Operation::References,
        usage: "r OBJECTPATH [ns= rc= r= iq= ico= pl=]",
        arity: (1, 1),
        options: &["ns", "rc", "r", "iq", "ico", "pl"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("im"),
        name: "InvokeMethod",
        operation: Operation::InvokeMethod,
        usage: "im OBJECTPATH METHOD [Param=value...] [ns=]",
        arity: (2, 2),
        options: &["ns"],
        takes_values: true,
    },
    CommandSpec {
        alias: Some("ecn"),
        name: "EnumerateClassNames",
        operation: Operation::EnumerateClassNames,
        usage: "ecn [CLASSNAME] [ns= di=]",
        arity: (0, 1),
        options: &["ns", "di"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("ec"),
        name: "EnumerateClasses",
        operation: Operation::EnumerateClasses,
        usage: "ec [CLASSNAME] [ns= di= lo= iq= ico=]",
        arity: (0, 1),
        options: &["ns", "di", "lo", "iq", "ico"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("gc"),
        name: "GetClass",
        operation: Operation::GetClass,
        usage: "gc CLASSNAME [ns= lo= iq= ico= pl=]",
        arity: (1, 1),
        options: &["ns", "lo", "iq", "ico", "pl"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("mc"),
        name: "ModifyClass",
        operation: Operation::ModifyClass,
        usage: "mc @CLASS.xml [ns=]",
        arity: (1, 1),
        options: &["ns"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("cc"),
        name: "CreateClass",
        operation: Operation::CreateClass,
        usage: "cc @CLASS.xml [ns=]",
        arity: (1, 1),
        options: &["ns"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("dc"),
        name: "DeleteClass",
        operation: Operation::DeleteClass,
        usage: "dc CLASSNAME [ns=]",
        arity: (1, 1),
        options: &["ns"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("eq"),
        name: "EnumerateQualifiers",
        operation: Operation::EnumerateQualifiers,
        usage: "eq [ns=]",
        arity: (0, 0),
        options: &["ns"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("gq"),
        name: "GetQualifier",
        operation: Operation::GetQualifier,
        usage: "gq NAME [ns=]",
        arity: (1, 1),
        options: &["ns"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("sq"),
        name: "SetQualifier",
        operation: Operation::SetQualifier,
        usage: "sq @QUALIFIER.xml [ns=]",
        arity: (1, 1),
        options: &["ns"],
        takes_values: false,
    },
    CommandSpec {
        alias: Some("dq"),
        name: "DeleteQualifier",
        operation: Operation::DeleteQualifier,
        usage: "dq NAME [ns=]",
        arity: (1, 1),
        options: &["ns"],
        takes_values: false,
    },
    CommandSpec {
        alias: None,
        name: "ExecQuery",
        operation: Operation::ExecQuery,
        usage: "ExecQuery LANGUAGE QUERY [ns=]",
        arity: (2, 2),
        options: &["ns"],
        takes_values: false,
    },
];

const OPTION_KEYS: &[&str] = &["ns", "lo", "di", "iq", "ico", "pl", "ac", "rc", "r", "rr"];

fn lookup(word: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|c| {
        c.alias.is_some_and(|a| a.eq_ignore_ascii_case(word)) || c.name.eq_ignore_ascii_case(word)
    })
}

/// Help listing for the `h` command.
pub fn help_text(connection_info: &str) -> String {
    let mut out = format!("{}\n\nCommands:\n", connection_info);
    for spec in COMMANDS {
        out.push_str(&format!("  {:<48} {}\n", spec.usage, spec.name));
    }
    out.push_str(
        "\nOptions:\n  ns=NAMESPACE  lo=BOOL (LocalOnly)  di=BOOL (DeepInheritance)\n  \
         iq=BOOL (IncludeQualifiers)  ico=BOOL (IncludeClassOrigin)  pl=A,B (PropertyList)\n  \
         ac=CLASS (AssocClass)  rc=CLASS (ResultClass)  r=ROLE  rr=ROLE (ResultRole)\n\n\
         Paths are written as [NAMESPACE:]CLASS.Key=\"value\",... and values as\n\
         \"text\", numbers, true/false, {a,b} for arrays, or NULL.\n\
         Type /quit to exit.\n",
    );
    out
}

/// Operation options collected from `key=value` tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    pub namespace: Option<String>,
    pub local_only: Option<bool>,
    pub deep_inheritance: Option<bool>,
    pub include_qualifiers: Option<bool>,
    pub include_class_origin: Option<bool>,
    pub property_list: Option<Vec<String>>,
    pub assoc_class: Option<String>,
    pub result_class: Option<String>,
    pub role: Option<String>,
    pub result_role: Option<String>,
}

impl CommandOptions {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let text = unquote(value);
        match key {
            "ns" => self.namespace = Some(text),
            "lo" => self.local_only = Some(parse_bool(key, &text)?),
            "di" => self.deep_inheritance = Some(parse_bool(key, &text)?),
            "iq" => self.include_qualifiers = Some(parse_bool(key, &text)?),
            "ico" => self.include_class_origin = Some(parse_bool(key, &text)?),
            "pl" => {
                self.property_list = Some(
                    text.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                )
            }
            "ac" => self.assoc_class = Some(text),
            "rc" => self.result_class = Some(text),
            "r" => self.role = Some(text),
            "rr" => self.result_role = Some(text),
            other => bail!("Unknown option '{}='", other),
        }
        Ok(())
    }
}

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub operation: Operation,
    /// Positional arguments with their quoting intact
    pub args: Vec<String>,
    pub options: CommandOptions,
    /// `Name=value` pairs in the order given
    pub values: Vec<(String, String)>,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let tokens = tokenize(line)?;
        let (word, rest) = tokens
            .split_first()
            .ok_or_else(|| anyhow!("Empty command"))?;
        let spec = lookup(word)
            .ok_or_else(|| anyhow!("Unknown command '{}'. Type h for help.", word))?;

        let mut command = Command {
            operation: spec.operation,
            args: Vec::new(),
            options: CommandOptions::default(),
            values: Vec::new(),
        };
        for token in rest {
            match split_pair(token) {
                Some((key, value)) if OPTION_KEYS.contains(&key) => {
                    if !spec.options.contains(&key) {
                        bail!("Option '{}=' does not apply to {}", key, spec.name);
                    }
                    command.options.set(key, value)?;
                }
                Some((key, value)) => {
                    if !spec.takes_values {
                        bail!("Unexpected '{}'. Usage: {}", token, spec.usage);
                    }
                    command.values.push((key.to_string(), value.to_string()));
                }
                None => {
                    if !command.values.is_empty() {
                        bail!("Positional argument '{}' after values. Usage: {}", token, spec.usage);
                    }
                    command.args.push(token.clone());
                }
            }
        }

        let (min, max) = spec.arity;
        if command.args.len() < min || command.args.len() > max {
            bail!("Usage: {}", spec.usage);
        }
        Ok(command)
    }

    fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    fn required_arg(&self, index: usize) -> Result<&str> {
        self.arg(index)
            .ok_or_else(|| anyhow!("Missing argument {}", index + 1))
    }

    fn namespace(&self) -> Option<&str> {
        self.options.namespace.as_deref()
    }

    fn instance_path(&self, index: usize) -> Result<CimInstanceName> {
        let text = self.required_arg(index)?;
        let mut path = CimInstanceName::from_str(text)
            .with_context(|| format!("Invalid instance path {}", text))?;
        if path.namespace.is_none() {
            path.namespace = self.options.namespace.clone();
        }
        Ok(path)
    }

    fn object_path(&self, index: usize) -> Result<CimObjectPath> {
        let text = self.required_arg(index)?;
        let mut path = CimObjectPath::from_str(text)
            .with_context(|| format!("Invalid object path {}", text))?;
        if let Some(ns) = &self.options.namespace {
            match &mut path {
                CimObjectPath::Instance(p) if p.namespace.is_none() => {
                    p.namespace = Some(ns.clone())
                }
                CimObjectPath::Class(p) if p.namespace.is_none() => p.namespace = Some(ns.clone()),
                _ => {}
            }
        }
        Ok(path)
    }
}

/// Result of one command, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    InstanceNames(Vec<CimInstanceName>),
    Instances(Vec<CimInstance>),
    Instance(CimInstance),
    ObjectPaths(Vec<CimObjectPath>),
    Objects(Vec<AssociatedObject>),
    ClassNames(Vec<String>),
    Classes(Vec<CimClass>),
    Class(CimClass),
    QualifierDeclarations(Vec<CimQualifierDeclaration>),
    QualifierDeclaration(CimQualifierDeclaration),
    MethodResult(MethodResult),
    Created(CimInstanceName),
    Done,
}

/// Run a parsed command against the server.
pub async fn execute(conn: &WbemConnection, command: &Command) -> Result<CommandOutput> {
    let o = &command.options;
    let output = match command.operation {
        Operation::EnumerateInstanceNames => {
            let options = EnumerateInstanceNamesOptions {
                namespace: o.namespace.clone(),
            };
            let names = conn
                .enumerate_instance_names(&unquote(command.required_arg(0)?), &options)
                .await?;
            CommandOutput::InstanceNames(names)
        }
        Operation::EnumerateInstances => {
            let options = EnumerateInstancesOptions {
                namespace: o.namespace.clone(),
                local_only: o.local_only,
                deep_inheritance: o.deep_inheritance,
                include_qualifiers: o.include_qualifiers,
                include_class_origin: o.include_class_origin,
                property_list: o.property_list.clone(),
            };
            let instances = conn
                .enumerate_instances(&unquote(command.required_arg(0)?), &options)
                .await?;
            CommandOutput::Instances(instances)
        }
        Operation::GetInstance => {
            let options = GetInstanceOptions {
                local_only: o.local_only,
                include_qualifiers: o.include_qualifiers,
                include_class_origin: o.include_class_origin,
                property_list: o.property_list.clone(),
            };
            let instance = conn
                .get_instance(&command.instance_path(0)?, &options)
                .await?;
            CommandOutput::Instance(instance)
        }
        Operation::ModifyInstance => {
            let path = command.instance_path(0)?;
            let class = declared_class(conn, &path.classname, path.namespace.as_deref()).await;
            let mut instance = CimInstance::new(path.classname.clone());
            for (name, literal) in &command.values {
                let declared = class
                    .as_ref()
                    .and_then(|c| c.property(name))
                    .map(|p| (p.cim_type, p.is_array));
                instance.set_property(property_from_literal(name, literal, declared)?);
            }
            instance.path = Some(path);
            let options = ModifyInstanceOptions {
                include_qualifiers: o.include_qualifiers,
                property_list: o.property_list.clone(),
            };
            conn.modify_instance(&instance, &options).await?;
            CommandOutput::Done
        }
        Operation::CreateInstance => {
            let classname = unquote(command.required_arg(0)?);
            let class = declared_class(conn, &classname, command.namespace()).await;
            let mut instance = CimInstance::new(classname);
            for (name, literal) in &command.values {
                let declared = class
                    .as_ref()
                    .and_then(|c| c.property(name))
                    .map(|p| (p.cim_type, p.is_array));
                instance.set_property(property_from_literal(name, literal, declared)?);
            }
            let path = conn.create_instance(&instance, command.namespace()).await?;
            CommandOutput::Created(path)
        }
        Operation::DeleteInstance => {
            conn.delete_instance(&command.instance_path(0)?).await?;
            CommandOutput::Done
        }
        Operation::AssociatorNames => {
            let options = AssociatorNamesOptions {
                assoc_class: o.assoc_class.clone(),
                result_class: o.result_class.clone(),
                role: o.role.clone(),
                result_role: o.result_role.clone(),
            };
            let paths = conn
                .associator_names(&command.object_path(0)?, &options)
                .await?;
            CommandOutput::ObjectPaths(paths)
        }
        Operation::Associators => {
            let options = AssociatorsOptions {
                assoc_class: o.assoc_class.clone(),
                result_class: o.result_class.clone(),
                role: o.role.clone(),
                result_role: o.result_role.clone(),
                include_qualifiers: o.include_qualifiers,
                include_class_origin: o.include_class_origin,
                property_list: o.property_list.clone(),
            };
            let objects = conn.associators(&command.object_path(0)?, &options).await?;
            CommandOutput::Objects(objects)
        }
        Operation::ReferenceNames => {
            let options = ReferenceNamesOptions {
                result_class: o.result_class.clone(),
                role: o.role.clone(),
            };
            let paths = conn
                .reference_names(&command.object_path(0)?, &options)
                .await?;
            CommandOutput::ObjectPaths(paths)
        }
        Operation::References => {
            let options = ReferencesOptions {
                result_class: o.result_class.clone(),
                role: o.role.clone(),
                include_qualifiers: o.include_qualifiers,
                include_class_origin: o.include_class_origin,
                property_list: o.property_list.clone(),
            };
            let objects = conn.references(&command.object_path(0)?, &options).await?;
            CommandOutput::Objects(objects)
        }
        Operation::InvokeMethod => {
            let object = command.object_path(0)?;
            let method = unquote(command.required_arg(1)?);
            let class = declared_class(conn, object.classname(), object.namespace()).await;
            let signature = class.as_ref().and_then(|c| c.method(&method));
            let mut params = Vec::with_capacity(command.values.len());
            for (name, literal) in &command.values {
                let declared = signature
                    .and_then(|m| m.parameter(name))
                    .map(|p| (p.cim_type, p.is_array));
                params.push((name.clone(), value_from_literal(literal, declared)?));
            }
            let result = conn.invoke_method(&method, &object, &params).await?;
            CommandOutput::MethodResult(result)
        }
        Operation::EnumerateClassNames => {
            let options = EnumerateClassNamesOptions {
                namespace: o.namespace.clone(),
                classname: command.arg(0).map(unquote),
                deep_inheritance: o.deep_inheritance,
            };
            CommandOutput::ClassNames(conn.enumerate_class_names(&options).await?)
        }
        Operation::EnumerateClasses => {
            let options = EnumerateClassesOptions {
                namespace: o.namespace.clone(),
                classname: command.arg(0).map(unquote),
                deep_inheritance: o.deep_inheritance,
                local_only: o.local_only,
                include_qualifiers: o.include_qualifiers,
                include_class_origin: o.include_class_origin,
            };
            CommandOutput::Classes(conn.enumerate_classes(&options).await?)
        }
        Operation::GetClass => {
            let options = GetClassOptions {
                namespace: o.namespace.clone(),
                local_only: o.local_only,
                include_qualifiers: o.include_qualifiers,
                include_class_origin: o.include_class_origin,
                property_list: o.property_list.clone(),
            };
            let class = conn
                .get_class(&unquote(command.required_arg(0)?), &options)
                .await?;
            CommandOutput::Class(class)
        }
        Operation::ModifyClass => {
            let class = read_class(command.required_arg(0)?).await?;
            conn.modify_class(&class, command.namespace()).await?;
            CommandOutput::Done
        }
        Operation::CreateClass => {
            let class = read_class(command.required_arg(0)?).await?;
            conn.create_class(&class, command.namespace()).await?;
            CommandOutput::Done
        }
        Operation::DeleteClass => {
            conn.delete_class(&unquote(command.required_arg(0)?), command.namespace())
                .await?;
            CommandOutput::Done
        }
        Operation::EnumerateQualifiers => {
            CommandOutput::QualifierDeclarations(
                conn.enumerate_qualifiers(command.namespace()).await?,
            )
        }
        Operation::GetQualifier => {
            let decl = conn
                .get_qualifier(&unquote(command.required_arg(0)?), command.namespace())
                .await?;
            CommandOutput::QualifierDeclaration(decl)
        }
        Operation::SetQualifier => {
            let text = read_file_arg(command.required_arg(0)?).await?;
            let decl = qualifier_declaration_from_xml(&text)
                .context("Invalid QUALIFIER.DECLARATION document")?;
            conn.set_qualifier(&decl, command.namespace()).await?;
            CommandOutput::Done
        }
        Operation::DeleteQualifier => {
            conn.delete_qualifier(&unquote(command.required_arg(0)?), command.namespace())
                .await?;
            CommandOutput::Done
        }
        Operation::ExecQuery => {
            let language = unquote(command.required_arg(0)?);
            let query = unquote(command.required_arg(1)?);
            CommandOutput::Instances(conn.exec_query(&language, &query, command.namespace()).await?)
        }
    };
    Ok(output)
}

/// Class declaration used to type `Name=value` literals. A failure only
/// means values are typed from their spelling.
async fn declared_class(
    conn: &WbemConnection,
    classname: &str,
    namespace: Option<&str>,
) -> Option<CimClass> {
    let options = GetClassOptions {
        namespace: namespace.map(str::to_string),
        local_only: Some(false),
        ..GetClassOptions::default()
    };
    match conn.get_class(classname, &options).await {
        Ok(class) => Some(class),
        Err(e) => {
            tracing::debug!(classname, error = %e, "Class lookup failed, inferring value types");
            None
        }
    }
}

async fn read_file_arg(arg: &str) -> Result<String> {
    let path = arg
        .strip_prefix('@')
        .map(|p| PathBuf::from(unquote(p)))
        .ok_or_else(|| anyhow!("Expected @FILE naming a CIM-XML document, got '{}'", arg))?;
    tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn read_class(arg: &str) -> Result<CimClass> {
    let text = read_file_arg(arg).await?;
    class_from_xml(&text).context("Invalid CLASS document")
}

fn property_from_literal(
    name: &str,
    literal: &str,
    declared: Option<(CimType, bool)>,
) -> Result<CimProperty> {
    Ok(match value_from_literal(literal, declared)? {
        Some(value) => CimProperty::new(name, value),
        None => {
            let (ty, is_array) = declared.unwrap_or((CimType::String, false));
            CimProperty::null(name, ty, is_array)
        }
    })
}

/// Convert a literal typed at the prompt. `NULL` is a null value; with a
/// declared type the literal must parse as that type.
fn value_from_literal(literal: &str, declared: Option<(CimType, bool)>) -> Result<Option<CimValue>> {
    if literal.eq_ignore_ascii_case("NULL") {
        return Ok(None);
    }
    let value = match declared {
        None if literal.starts_with('{') => {
            let items: Vec<CimValue> = array_items(literal)?
                .iter()
                .map(|item| CimValue::infer(item))
                .collect();
            let ty = items.first().map(CimValue::cim_type).unwrap_or(CimType::String);
            CimValue::Array(CimArray::from_values(ty, items)?)
        }
        None => CimValue::infer(literal),
        Some((ty, true)) => {
            let mut items = Vec::new();
            for item in array_items(literal)? {
                if item.eq_ignore_ascii_case("NULL") {
                    items.push(None);
                } else {
                    items.push(Some(scalar_from_literal(ty, &item)?));
                }
            }
            CimValue::Array(CimArray::new(ty, items)?)
        }
        Some((ty, false)) => scalar_from_literal(ty, literal)?,
    };
    Ok(Some(value))
}

fn scalar_from_literal(ty: CimType, literal: &str) -> Result<CimValue> {
    let text = unquote(literal);
    if ty == CimType::Reference {
        let path = CimObjectPath::from_str(&text)
            .with_context(|| format!("Invalid reference {}", text))?;
        return Ok(CimValue::reference(path));
    }
    CimValue::parse_scalar(ty, &text).map_err(|_| anyhow!("'{}' is not a valid {} value", text, ty))
}

/// Items of `{a, "b,c", NULL}`; a bare literal is a one-element array.
fn array_items(literal: &str) -> Result<Vec<String>> {
    let inner = match literal.strip_prefix('{') {
        Some(rest) => rest
            .strip_suffix('}')
            .ok_or_else(|| anyhow!("Unterminated array literal {}", literal))?,
        None => literal,
    };
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(split_outside_quotes(inner, |c| c == ',')?
        .into_iter()
        .map(|s| s.trim().to_string())
        .collect())
}

fn parse_bool(key: &str, text: &str) -> Result<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("Option '{}=' expects true or false, got '{}'", key, text),
    }
}

/// `Name=value` where `Name` is an identifier. Anything else (paths like
/// `CIM_Foo.Key="x"`, keyless `CIM_Foo=@`) is positional.
fn split_pair(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once('=')?;
    let mut chars = key.chars();
    let first = chars.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') || value == "@" {
        return None;
    }
    Some((key, value))
}

/// Strip one pair of surrounding double quotes and undo `\"` / `\\`.
fn unquote(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        _ => trimmed.to_string(),
    }
}

fn split_outside_quotes(text: &str, is_separator: impl Fn(char) -> bool) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            c if !in_quotes && is_separator(c) => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    if in_quotes {
        bail!("Unterminated quote in: {}", text);
    }
    parts.push(current);
    Ok(parts)
}

/// Split a command line on whitespace, keeping quoted runs together.
fn tokenize(line: &str) -> Result<Vec<String>> {
    Ok(split_outside_quotes(line.trim(), char::is_whitespace)?
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::{scripted_connection, ScriptedServer};

    mod parse_tests {
        use super::*;

        #[test]
        fn accepts_aliases_and_operation_names() {
            let short = Command::parse("ei CIM_ComputerSystem").unwrap();
            let long = Command::parse("enumerateinstances CIM_ComputerSystem").unwrap();
            assert_eq!(short.operation, Operation::EnumerateInstances);
            assert_eq!(short, long);
            assert_eq!(
                Command::parse("ExecQuery WQL \"SELECT * FROM CIM_Foo\"")
                    .unwrap()
                    .operation,
                Operation::ExecQuery
            );
        }

        #[test]
        fn collects_options() {
            let command =
                Command::parse("ei CIM_Foo lo=false di=yes pl=Name,Caption ns=root/smx").unwrap();
            assert_eq!(command.args, vec!["CIM_Foo"]);
            assert_eq!(command.options.local_only, Some(false));
            assert_eq!(command.options.deep_inheritance, Some(true));
            assert_eq!(
                command.options.property_list,
                Some(vec!["Name".to_string(), "Caption".to_string()])
            );
            assert_eq!(command.options.namespace.as_deref(), Some("root/smx"));
        }

        #[test]
        fn rejects_options_that_do_not_apply() {
            let err = Command::parse("gq Key lo=true").unwrap_err();
            assert_eq!(err.to_string(), "Option 'lo=' does not apply to GetQualifier");
        }

        #[test]
        fn rejects_bad_boolean_option() {
            let err = Command::parse("gc CIM_Foo lo=maybe").unwrap_err();
            assert!(err.to_string().contains("expects true or false"));
        }

        #[test]
        fn checks_positional_arity() {
            assert_eq!(
                Command::parse("gi").unwrap_err().to_string(),
                "Usage: gi INSTANCEPATH [ns= lo= iq= ico= pl=]"
            );
            assert!(Command::parse("ecn A B").is_err());
            assert!(Command::parse("ecn").is_ok());
        }

        #[test]
        fn unknown_and_empty_commands() {
            assert_eq!(
                Command::parse("frobnicate").unwrap_err().to_string(),
                "Unknown command 'frobnicate'. Type h for help."
            );
            assert_eq!(Command::parse("   ").unwrap_err().to_string(), "Empty command");
        }

        #[test]
        fn keeps_quoted_paths_together() {
            let command = Command::parse(r#"gi CIM_Foo.Name="a b",Id=3"#).unwrap();
            assert_eq!(command.args, vec![r#"CIM_Foo.Name="a b",Id=3"#]);
        }

        #[test]
        fn unterminated_quote_is_an_error() {
            let err = Command::parse(r#"gi CIM_Foo.Name="open"#).unwrap_err();
            assert!(err.to_string().starts_with("Unterminated quote"));
        }

        #[test]
        fn keyless_path_is_positional() {
            let command = Command::parse("gi CIM_Singleton=@").unwrap();
            assert_eq!(command.args, vec!["CIM_Singleton=@"]);
            assert!(command.values.is_empty());
        }

        #[test]
        fn values_follow_positionals() {
            let command = Command::parse(r#"ci CIM_Foo Name="x y" Count=3 ns=root/test"#).unwrap();
            assert_eq!(
                command.values,
                vec![
                    ("Name".to_string(), "\"x y\"".to_string()),
                    ("Count".to_string(), "3".to_string()),
                ]
            );
            assert_eq!(command.options.namespace.as_deref(), Some("root/test"));

            let err = Command::parse("im CIM_Foo.Id=1 Count=3 Reset").unwrap_err();
            assert!(err.to_string().starts_with("Positional argument 'Reset' after values"));
        }

        #[test]
        fn values_are_rejected_where_not_taken() {
            let err = Command::parse("gc CIM_Foo Name=x").unwrap_err();
            assert!(err.to_string().starts_with("Unexpected 'Name=x'"));
        }
    }

    mod literal_tests {
        use super::*;

        #[test]
        fn null_literal_is_no_value() {
            assert_eq!(value_from_literal("NULL", None).unwrap(), None);
            assert_eq!(
                value_from_literal("null", Some((CimType::Uint32, false))).unwrap(),
                None
            );
        }

        #[test]
        fn declared_array_accepts_null_items() {
            let value = value_from_literal("{1, NULL, 3}", Some((CimType::Uint16, true)))
                .unwrap()
                .unwrap();
            let array = value.as_array().unwrap();
            assert_eq!(array.element_type(), CimType::Uint16);
            assert_eq!(
                array.items(),
                &[Some(CimValue::Uint16(1)), None, Some(CimValue::Uint16(3))]
            );
        }

        #[test]
        fn declared_type_must_fit() {
            let err = value_from_literal("300", Some((CimType::Uint8, false))).unwrap_err();
            assert_eq!(err.to_string(), "'300' is not a valid uint8 value");
        }

        #[test]
        fn undeclared_literals_are_inferred() {
            assert_eq!(
                value_from_literal("\"x\"", None).unwrap(),
                Some(CimValue::String("x".to_string()))
            );
            assert_eq!(
                value_from_literal("true", None).unwrap(),
                Some(CimValue::Boolean(true))
            );
            let array = value_from_literal("{\"a,b\", \"c\"}", None).unwrap().unwrap();
            assert_eq!(
                array.as_array().unwrap().items(),
                &[
                    Some(CimValue::String("a,b".to_string())),
                    Some(CimValue::String("c".to_string()))
                ]
            );
        }

        #[test]
        fn unquote_undoes_escapes() {
            assert_eq!(unquote(r#""say \"hi\"""#), r#"say "hi""#);
            assert_eq!(unquote("plain"), "plain");
        }
    }

    mod execute_tests {
        use super::*;

        #[tokio::test]
        async fn enumerate_instances_sends_options() {
            let server = ScriptedServer::new();
            let conn = scripted_connection(&server);

            let command = Command::parse("ei CIM_Foo lo=false").unwrap();
            let output = execute(&conn, &command).await.unwrap();

            assert_eq!(output, CommandOutput::Instances(Vec::new()));
            assert!(server
                .body_of("EnumerateInstances")
                .contains(r#"<IPARAMVALUE NAME="LocalOnly"><VALUE>FALSE</VALUE></IPARAMVALUE>"#));
        }

        #[tokio::test]
        async fn create_instance_types_values_from_the_class() {
            let server = ScriptedServer::new();
            server.respond(
                "GetClass",
                r#"<IRETURNVALUE><CLASS NAME="CIM_Foo"><PROPERTY NAME="Id" TYPE="string"/><PROPERTY NAME="Count" TYPE="uint32"/></CLASS></IRETURNVALUE>"#,
            );
            server.respond(
                "CreateInstance",
                r#"<IRETURNVALUE><INSTANCENAME CLASSNAME="CIM_Foo"><KEYBINDING NAME="Id"><KEYVALUE VALUETYPE="string">a</KEYVALUE></KEYBINDING></INSTANCENAME></IRETURNVALUE>"#,
            );
            let conn = scripted_connection(&server);

            let command = Command::parse(r#"ci CIM_Foo Id="a" Count=3"#).unwrap();
            let output = execute(&conn, &command).await.unwrap();

            let CommandOutput::Created(path) = output else {
                panic!("expected a created path, got {:?}", output);
            };
            assert_eq!(path.classname, "CIM_Foo");
            assert_eq!(path.namespace.as_deref(), Some("root/cimv2"));
            assert_eq!(server.methods(), vec!["GetClass", "CreateInstance"]);
            assert!(server
                .body_of("CreateInstance")
                .contains(r#"<PROPERTY NAME="Count" TYPE="uint32"><VALUE>3</VALUE></PROPERTY>"#));
        }

        #[tokio::test]
        async fn modify_instance_infers_types_without_a_class() {
            let server = ScriptedServer::new();
            let conn = scripted_connection(&server);

            let command = Command::parse(r#"mi CIM_Foo.Id="a" Count=5"#).unwrap();
            assert_eq!(execute(&conn, &command).await.unwrap(), CommandOutput::Done);

            assert_eq!(server.methods(), vec!["GetClass", "ModifyInstance"]);
            assert!(server
                .body_of("ModifyInstance")
                .contains(r#"<PROPERTY NAME="Count" TYPE="uint64"><VALUE>5</VALUE></PROPERTY>"#));
        }

        #[tokio::test]
        async fn invoke_method_types_parameters_from_the_signature() {
            let server = ScriptedServer::new();
            server.respond(
                "GetClass",
                r#"<IRETURNVALUE><CLASS NAME="CIM_Service"><PROPERTY NAME="Name" TYPE="string"/><METHOD NAME="StartService" TYPE="uint32"><PARAMETER NAME="Timeout" TYPE="uint32"/></METHOD></CLASS></IRETURNVALUE>"#,
            );
            server.respond(
                "StartService",
                r#"<RETURNVALUE PARAMTYPE="uint32"><VALUE>0</VALUE></RETURNVALUE>"#,
            );
            let conn = scripted_connection(&server);

            let command =
                Command::parse(r#"im CIM_Service.Name="sshd" StartService Timeout=30"#).unwrap();
            let output = execute(&conn, &command).await.unwrap();

            let CommandOutput::MethodResult(result) = output else {
                panic!("expected a method result, got {:?}", output);
            };
            assert_eq!(result.return_value, Some(CimValue::Uint32(0)));
            assert!(server.body_of("StartService").contains(
                r#"<PARAMVALUE NAME="Timeout" PARAMTYPE="uint32"><VALUE>30</VALUE></PARAMVALUE>"#
            ));
        }

        #[tokio::test]
        async fn set_qualifier_reads_the_declaration_file() {
            let dir = tempfile::tempdir().unwrap();
            let file = dir.path().join("vendor.xml");
            std::fs::write(
                &file,
                r#"<?xml version="1.0" encoding="utf-8"?>
<QUALIFIER.DECLARATION NAME="Vendor" TYPE="string"><SCOPE CLASS="true"/></QUALIFIER.DECLARATION>"#,
            )
            .unwrap();
            let server = ScriptedServer::new();
            let conn = scripted_connection(&server);

            let command = Command::parse(&format!("sq @{}", file.display())).unwrap();
            assert_eq!(execute(&conn, &command).await.unwrap(), CommandOutput::Done);
            assert!(server
                .body_of("SetQualifier")
                .contains(r#"QUALIFIER.DECLARATION NAME="Vendor""#));
        }

        #[tokio::test]
        async fn class_commands_need_a_file_argument() {
            let server = ScriptedServer::new();
            let conn = scripted_connection(&server);

            let command = Command::parse("mc CIM_Foo").unwrap();
            let err = execute(&conn, &command).await.unwrap_err();
            assert!(err.to_string().starts_with("Expected @FILE naming a CIM-XML document"));
            assert!(server.requests().is_empty());
        }
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text("https://cimom.test (user admin, namespace root/cimv2)");
        for spec in COMMANDS {
            assert!(help.contains(spec.usage), "missing {}", spec.name);
        }
        assert!(help.ends_with("Type /quit to exit.\n"));
    }
}
