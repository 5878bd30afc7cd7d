//! Field kind folding checked against prost-reflect's view of the same schema.

use prost::bytes::Bytes;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, Kind, ReflectMessage, Value};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet,
};
use zrpc_codegen::descriptor::wire::Fields;
use zrpc_codegen::{GeneratorConfig, RawOptions, SchemaSet, Target};

const SCALARS: &[(&str, Type)] = &[
    ("f_double", Type::Double),
    ("f_float", Type::Float),
    ("f_int32", Type::Int32),
    ("f_int64", Type::Int64),
    ("f_uint32", Type::Uint32),
    ("f_uint64", Type::Uint64),
    ("f_sint32", Type::Sint32),
    ("f_sint64", Type::Sint64),
    ("f_fixed32", Type::Fixed32),
    ("f_fixed64", Type::Fixed64),
    ("f_sfixed32", Type::Sfixed32),
    ("f_sfixed64", Type::Sfixed64),
    ("f_bool", Type::Bool),
    ("f_string", Type::String),
    ("f_bytes", Type::Bytes),
];

fn kinds_file() -> FileDescriptorProto {
    let mut fields: Vec<_> = SCALARS
        .iter()
        .enumerate()
        .map(|(i, (name, ty))| FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(i as i32 + 1),
            r#type: Some(*ty as i32),
            label: Some(Label::Optional as i32),
            ..Default::default()
        })
        .collect();
    fields.push(FieldDescriptorProto {
        name: Some("f_mode".to_string()),
        number: Some(SCALARS.len() as i32 + 1),
        r#type: Some(Type::Enum as i32),
        type_name: Some(".kinds.Mode".to_string()),
        label: Some(Label::Optional as i32),
        ..Default::default()
    });

    let value = |name: &str, number: i32| EnumValueDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("kinds.proto".to_string()),
        package: Some("kinds".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![DescriptorProto {
            name: Some("AllKinds".to_string()),
            field: fields,
            ..Default::default()
        }],
        enum_type: vec![EnumDescriptorProto {
            name: Some("Mode".to_string()),
            value: vec![value("MODE_OFF", 0), value("MODE_ON", 1)],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn prost_scalar(kind: &Kind) -> Option<&'static str> {
    match kind {
        Kind::Double => Some("f64"),
        Kind::Float => Some("f32"),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 | Kind::Enum(_) => Some("i32"),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Some("i64"),
        Kind::Uint32 | Kind::Fixed32 => Some("u32"),
        Kind::Uint64 | Kind::Fixed64 => Some("u64"),
        Kind::Bool => Some("bool"),
        Kind::String => Some("String"),
        Kind::Bytes => Some("Vec<u8>"),
        Kind::Message(_) => None,
    }
}

#[test]
fn test_folded_kinds_match_prost_representation() {
    let file = kinds_file();
    let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
        file: vec![file.clone()],
    })
    .unwrap();
    let reflected = pool.get_message_by_name("kinds.AllKinds").unwrap();

    let schema = SchemaSet::new(&[file], &RawOptions::new());
    let message = schema.message(".kinds.AllKinds").unwrap();
    assert_eq!(message.fields.len(), reflected.fields().len());

    for field in &message.fields {
        let expected = reflected.get_field_by_name(&field.name).unwrap();
        assert_eq!(
            field.kind.rust_scalar(),
            prost_scalar(&expected.kind()),
            "{}",
            field.name
        );
        assert!(field.is_settable());
    }
}

#[test]
fn test_wire_walker_reads_every_encoded_kind() {
    let file = kinds_file();
    let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
        .unwrap();
    let descriptor = pool.get_message_by_name("kinds.AllKinds").unwrap();

    let mut message = DynamicMessage::new(descriptor);
    message.set_field_by_name("f_double", Value::F64(2.5));
    message.set_field_by_name("f_float", Value::F32(-1.25));
    message.set_field_by_name("f_int32", Value::I32(-7));
    message.set_field_by_name("f_int64", Value::I64(-70_000_000_000));
    message.set_field_by_name("f_uint32", Value::U32(7));
    message.set_field_by_name("f_uint64", Value::U64(u64::MAX));
    message.set_field_by_name("f_sint32", Value::I32(-3));
    message.set_field_by_name("f_sint64", Value::I64(-3));
    message.set_field_by_name("f_fixed32", Value::U32(0xDEAD_BEEF));
    message.set_field_by_name("f_fixed64", Value::U64(1));
    message.set_field_by_name("f_sfixed32", Value::I32(-1));
    message.set_field_by_name("f_sfixed64", Value::I64(-1));
    message.set_field_by_name("f_bool", Value::Bool(true));
    message.set_field_by_name("f_string", Value::String("héllo".to_string()));
    message.set_field_by_name("f_bytes", Value::Bytes(Bytes::from_static(&[0, 1, 2])));
    message.set_field_by_name("f_mode", Value::EnumNumber(1));

    let encoded = message.encode_to_vec();
    let numbers: Vec<u32> = Fields::new(&encoded)
        .map(|field| field.unwrap().number)
        .collect();
    let expected: Vec<u32> = (1..=SCALARS.len() as u32 + 1).collect();
    assert_eq!(numbers, expected);

    let decoded = DynamicMessage::decode(message.descriptor(), encoded.as_slice()).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn test_client_assigns_every_scalar_param() {
    let mut file = kinds_file();
    file.message_type.push(DescriptorProto {
        name: Some("Ack".to_string()),
        ..Default::default()
    });
    file.service.push(prost_types::ServiceDescriptorProto {
        name: Some("Kinds".to_string()),
        method: vec![prost_types::MethodDescriptorProto {
            name: Some("Put".to_string()),
            input_type: Some(".kinds.AllKinds".to_string()),
            output_type: Some(".kinds.Ack".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    });

    let config = GeneratorConfig::new().targets([Target::Client]);
    let units = zrpc_codegen::plugin::generate(
        &[file],
        &RawOptions::new(),
        &["kinds.proto".to_string()],
        &config,
    )
    .unwrap();
    let client = &units[0].content;

    for (name, _) in SCALARS {
        assert!(client.contains(&format!("request.{} = value;", name)), "{}", name);
    }
    assert!(client.contains("pub f_bytes: Option<Vec<u8>>,"));
    assert!(client.contains("pub f_mode: Option<i32>,"));
}
