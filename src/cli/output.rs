//! Rendering of command results as MOF text or JSON.

use std::fmt::Write as _;

use anyhow::Result;
use wbem_client::mof::{class_to_mof, instance_to_mof, qualifier_declaration_to_mof};
use wbem_client::{AssociatedObject, CimInstance, MethodResult};

use super::commands::CommandOutput;
use crate::settings::OutputFormat;

/// Render a command result. Operations without a result render as an
/// empty string in both formats.
pub fn render(output: &CommandOutput, format: OutputFormat) -> Result<String> {
    if *output == CommandOutput::Done {
        return Ok(String::new());
    }
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(output)?)),
        OutputFormat::Mof => Ok(render_mof(output)),
    }
}

fn render_mof(output: &CommandOutput) -> String {
    let mut out = String::new();
    match output {
        CommandOutput::InstanceNames(names) => {
            for name in names {
                let _ = writeln!(out, "{}", name);
            }
        }
        CommandOutput::ObjectPaths(paths) => {
            for path in paths {
                let _ = writeln!(out, "{}", path);
            }
        }
        CommandOutput::ClassNames(names) => {
            for name in names {
                let _ = writeln!(out, "{}", name);
            }
        }
        CommandOutput::Instances(instances) => {
            for instance in instances {
                out.push_str(&instance_block(instance));
            }
        }
        CommandOutput::Instance(instance) => out.push_str(&instance_block(instance)),
        CommandOutput::Objects(objects) => {
            for object in objects {
                match object {
                    AssociatedObject::Instance(instance) => out.push_str(&instance_block(instance)),
                    AssociatedObject::Class { path, class } => {
                        let _ = writeln!(out, "// {}", path);
                        out.push_str(&class_to_mof(class));
                    }
                }
            }
        }
        CommandOutput::Classes(classes) => {
            for class in classes {
                out.push_str(&class_to_mof(class));
            }
        }
        CommandOutput::Class(class) => out.push_str(&class_to_mof(class)),
        CommandOutput::QualifierDeclarations(decls) => {
            for decl in decls {
                out.push_str(&qualifier_declaration_to_mof(decl));
            }
        }
        CommandOutput::QualifierDeclaration(decl) => {
            out.push_str(&qualifier_declaration_to_mof(decl))
        }
        CommandOutput::MethodResult(result) => out.push_str(&method_result(result)),
        CommandOutput::Created(path) => {
            let _ = writeln!(out, "{}", path);
        }
        CommandOutput::Done => {}
    }
    out
}

/// An instance preceded by its path as a MOF comment.
fn instance_block(instance: &CimInstance) -> String {
    let mut out = String::new();
    if let Some(path) = &instance.path {
        let _ = writeln!(out, "// {}", path);
    }
    out.push_str(&instance_to_mof(instance));
    out
}

fn method_result(result: &MethodResult) -> String {
    let mut out = String::new();
    let literal = |v: Option<&wbem_client::CimValue>| match v {
        Some(v) => v.to_string(),
        None => "NULL".to_string(),
    };
    let _ = writeln!(out, "ReturnValue = {};", literal(result.return_value.as_ref()));
    for (name, value) in &result.out_params {
        let _ = writeln!(out, "{} = {};", name, literal(value.as_ref()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wbem_client::{CimClass, CimClassName, CimInstanceName, CimValue};

    fn disk() -> CimInstance {
        CimInstance::new("SMX_Disk")
            .with_property("DeviceID", "sda")
            .with_path(
                CimInstanceName::new("SMX_Disk")
                    .with_key("DeviceID", "sda")
                    .with_namespace("root/cimv2"),
            )
    }

    #[test]
    fn done_renders_nothing() {
        assert_eq!(render(&CommandOutput::Done, OutputFormat::Mof).unwrap(), "");
        assert_eq!(render(&CommandOutput::Done, OutputFormat::Json).unwrap(), "");
    }

    #[test]
    fn class_names_one_per_line() {
        let output = CommandOutput::ClassNames(vec!["CIM_A".into(), "CIM_B".into()]);
        assert_eq!(render(&output, OutputFormat::Mof).unwrap(), "CIM_A\nCIM_B\n");
    }

    #[test]
    fn instance_mof_carries_path_comment() {
        let text = render(&CommandOutput::Instance(disk()), OutputFormat::Mof).unwrap();
        assert_eq!(
            text,
            "// root/cimv2:SMX_Disk.DeviceID=\"sda\"\ninstance of SMX_Disk {\n   DeviceID = \"sda\";\n};\n"
        );
    }

    #[test]
    fn instances_as_json() {
        let text = render(&CommandOutput::Instances(vec![disk()]), OutputFormat::Json).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json[0]["classname"], "SMX_Disk");
        assert_eq!(json[0]["properties"]["DeviceID"], "sda");
        assert_eq!(json[0]["path"], "root/cimv2:SMX_Disk.DeviceID=\"sda\"");
    }

    #[test]
    fn class_association_result() {
        let output = CommandOutput::Objects(vec![AssociatedObject::Class {
            path: CimClassName::new("SMX_Service").with_namespace("root/smx"),
            class: CimClass::new("SMX_Service"),
        }]);
        let text = render(&output, OutputFormat::Mof).unwrap();
        assert!(text.starts_with("// root/smx:SMX_Service\nclass SMX_Service {"));
    }

    #[test]
    fn method_result_lists_out_params() {
        let output = CommandOutput::MethodResult(MethodResult {
            return_value: Some(CimValue::Uint32(0)),
            out_params: vec![
                ("Job".into(), None),
                ("Message".into(), Some(CimValue::String("ok".into()))),
            ],
        });
        assert_eq!(
            render(&output, OutputFormat::Mof).unwrap(),
            "ReturnValue = 0;\nJob = NULL;\nMessage = \"ok\";\n"
        );
    }
}
