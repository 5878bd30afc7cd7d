//! Generates the prost messages and the zrpc bindings of `roundtrip.proto`
//! from one descriptor, so both sides always agree on the schema.

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MethodDescriptorProto, OneofDescriptorProto,
    ServiceDescriptorProto,
};
use std::env;
use std::error::Error;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use zrpc_codegen::{plugin, GeneratorConfig, RawOptions, Target};

const SCHEMA: &str = "roundtrip.proto";

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=roundtrip.options");

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let file = schema();

    prost_build::Config::new()
        .out_dir(&out_dir)
        .compile_fds(FileDescriptorSet {
            file: vec![file.clone()],
        })?;

    let config = GeneratorConfig::new()
        .targets([Target::Client, Target::Server])
        .include_path(manifest_dir);
    let units = plugin::generate(&[file], &RawOptions::new(), &[SCHEMA.to_string()], &config)?;

    // Units open with inner attributes, which `include!` rejects
    let mut modules = String::new();
    for unit in &units {
        let path = unit.write_to(&out_dir)?;
        let module = unit.name.trim_end_matches(".rs");
        writeln!(modules, "#[path = {:?}]", path.display().to_string())?;
        writeln!(modules, "pub mod {};", module)?;
    }
    fs::write(out_dir.join("bindings.rs"), modules)?;
    Ok(())
}

fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        r#type: Some(ty as i32),
        label: Some(Label::Optional as i32),
        ..Default::default()
    }
}

fn typed(name: &str, number: i32, ty: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, ty)
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn method(name: &str, input: &str, output: &str) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(format!(".roundtrip.{}", input)),
        output_type: Some(format!(".roundtrip.{}", output)),
        ..Default::default()
    }
}

/// Every scalar kind, an enum, top-level and nested message fields, a
/// proto3 `optional`, a keyword-named field and a repeated field
fn primitives() -> DescriptorProto {
    let limit = FieldDescriptorProto {
        oneof_index: Some(0),
        proto3_optional: Some(true),
        ..field("limit", 18, Type::Uint32)
    };
    let samples = FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        ..field("samples", 20, Type::Int32)
    };

    DescriptorProto {
        nested_type: vec![message("Calibration", vec![field("scale", 1, Type::Float)])],
        oneof_decl: vec![OneofDescriptorProto {
            name: Some("_limit".to_string()),
            ..Default::default()
        }],
        ..message(
            "Primitives",
            vec![
                field("ratio", 1, Type::Double),
                field("gain", 2, Type::Float),
                field("offset", 3, Type::Int32),
                field("epoch", 4, Type::Int64),
                field("count", 5, Type::Uint32),
                field("total", 6, Type::Uint64),
                field("delta", 7, Type::Sint32),
                field("drift", 8, Type::Sint64),
                field("mask", 9, Type::Fixed32),
                field("serial", 10, Type::Fixed64),
                field("bias", 11, Type::Sfixed32),
                field("skew", 12, Type::Sfixed64),
                field("enabled", 13, Type::Bool),
                field("label", 14, Type::String),
                field("payload", 15, Type::Bytes),
                typed("mode", 16, Type::Enum, ".roundtrip.Mode"),
                typed("origin", 17, Type::Message, ".roundtrip.Point"),
                limit,
                field("type", 19, Type::String),
                samples,
                typed(
                    "calibration",
                    21,
                    Type::Message,
                    ".roundtrip.Primitives.Calibration",
                ),
            ],
        )
    }
}

fn schema() -> FileDescriptorProto {
    let value = |name: &str, number: i32| EnumValueDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some(SCHEMA.to_string()),
        package: Some("roundtrip".to_string()),
        syntax: Some("proto3".to_string()),
        enum_type: vec![EnumDescriptorProto {
            name: Some("Mode".to_string()),
            value: vec![value("MODE_IDLE", 0), value("MODE_RUN", 1)],
            ..Default::default()
        }],
        message_type: vec![
            message(
                "Point",
                vec![field("x", 1, Type::Sint32), field("y", 2, Type::Sint32)],
            ),
            primitives(),
            message("ResetRequest", vec![field("hard", 1, Type::Bool)]),
            message("Empty", vec![]),
            message("SensorTelemetry", vec![field("celsius", 1, Type::Float)]),
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("Lab".to_string()),
            method: vec![
                method("Echo", "Primitives", "Primitives"),
                method("Reset", "ResetRequest", "Empty"),
                method("Ping", "Empty", "Point"),
            ],
            ..Default::default()
        }],
        ..Default::default()
    }
}
