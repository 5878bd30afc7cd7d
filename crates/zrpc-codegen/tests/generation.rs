//! End-to-end generation through the plugin entry point.

use pretty_assertions::assert_eq;
use prost::Message;
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, MethodDescriptorProto,
    ServiceDescriptorProto,
};
use std::fs;
use tempfile::TempDir;
use zrpc_codegen::descriptor::wire::encode_len_field;
use zrpc_codegen::plugin;

const KEY_FIELD: u32 = 50001;

fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        r#type: Some(ty as i32),
        label: Some(Label::Optional as i32),
        ..Default::default()
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
        input_type: Some(format!(".demo.{}", input)),
        output_type: Some(format!(".demo.{}", output)),
        ..Default::default()
    }
}

fn service(name: &str, methods: Vec<MethodDescriptorProto>) -> ServiceDescriptorProto {
    ServiceDescriptorProto {
        name: Some(name.to_string()),
        method: methods,
        ..Default::default()
    }
}

/// Two services, three methods, one telemetry message
fn demo_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("demo.proto".to_string()),
        package: Some("demo".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            message(
                "LedRequest",
                vec![field("on", 1, Type::Bool), field("level", 2, Type::Sint32)],
            ),
            message("Empty", vec![]),
            message("StatusRequest", vec![]),
            message(
                "StatusResponse",
                vec![field("uptime_ms", 1, Type::Uint64)],
            ),
            message("EchoRequest", vec![field("msg", 1, Type::String)]),
            message("EchoResponse", vec![field("msg", 1, Type::String)]),
            message("SensorTelemetry", vec![field("celsius", 1, Type::Float)]),
        ],
        service: vec![
            service(
                "DeviceService",
                vec![
                    method("SetLed", "LedRequest", "Empty"),
                    method("GetStatus", "StatusRequest", "StatusResponse"),
                ],
            ),
            service("EchoService", vec![method("Echo", "EchoRequest", "EchoResponse")]),
        ],
        ..Default::default()
    }
}

fn request_for(files: Vec<FileDescriptorProto>, parameter: &str) -> Vec<u8> {
    CodeGeneratorRequest {
        file_to_generate: vec!["demo.proto".to_string()],
        parameter: (!parameter.is_empty()).then(|| parameter.to_string()),
        proto_file: files,
        ..Default::default()
    }
    .encode_to_vec()
}

fn respond(input: &[u8]) -> CodeGeneratorResponse {
    let output = plugin::run(input).unwrap();
    CodeGeneratorResponse::decode(output.as_slice()).unwrap()
}

fn unit<'a>(response: &'a CodeGeneratorResponse, name: &str) -> &'a str {
    response
        .file
        .iter()
        .find(|f| f.name() == name)
        .unwrap_or_else(|| panic!("{} not generated", name))
        .content()
}

#[test]
fn test_one_client_per_service_and_one_call_per_method() {
    let response = respond(&request_for(vec![demo_file()], "target=client"));
    assert_eq!(response.error, None);
    let client = unit(&response, "demo_client.rs");

    assert_eq!(client.matches("pub struct DeviceServiceClient<T> {").count(), 1);
    assert_eq!(client.matches("pub struct EchoServiceClient<T> {").count(), 1);
    assert_eq!(client.matches("pub struct ").count() - client.matches("Params {").count(), 3);
    assert_eq!(client.matches("(&self, request: Option<").count(), 3);
    assert!(client.contains("pub fn set_led("));
    assert!(client.contains("pub fn get_status("));
    assert!(client.contains("pub fn echo("));
}

#[test]
fn test_generation_is_idempotent() {
    let input = request_for(vec![demo_file()], "");
    let first = plugin::run(&input).unwrap();
    let second = plugin::run(&input).unwrap();
    assert_eq!(first, second);

    let response = CodeGeneratorResponse::decode(first.as_slice()).unwrap();
    let names: Vec<_> = response.file.iter().map(|f| f.name()).collect();
    assert_eq!(names, ["demo_client.rs", "demo_server.rs", "demo_ui.rs"]);
}

#[test]
fn test_empty_output_returns_marker_only() {
    let response = respond(&request_for(vec![demo_file()], "target=client"));
    let client = unit(&response, "demo_client.rs");

    assert!(client.contains(
        "pub fn set_led(&self, request: Option<super::pb::LedRequest>, params: SetLedParams) -> RpcResponse {"
    ));
    assert!(client.contains(
        "pub fn get_status(&self, request: Option<super::pb::StatusRequest>) -> (RpcResponse, Option<super::pb::StatusResponse>) {"
    ));
    assert!(!client.contains("Option<super::pb::Empty>)"));
}

#[test]
fn test_default_telemetry_topic() {
    let response = respond(&request_for(vec![demo_file()], "target=client"));
    let client = unit(&response, "demo_client.rs");

    assert!(client.contains("pub const SENSOR_TELEMETRY_TOPIC: &str = \"/telemetry/sensor\";"));
    assert!(client.contains("keys::telemetry_key(&self.device_id, SENSOR_TELEMETRY_TOPIC)"));
    assert_eq!(
        zrpc_codegen::emit::TELEMETRY_TOPIC_PREFIX,
        zrpc_runtime::keys::TELEMETRY_PREFIX
    );
    assert_eq!(
        zrpc_runtime::keys::telemetry_key("dev1", "/telemetry/sensor"),
        "dev1/telemetry/sensor"
    );
}

/// Encodes `demo.proto` with a raw `MessageOptions` extension on
/// `SensorTelemetry`, the way protoc sends it.
fn request_with_key_option(key: &str) -> Vec<u8> {
    let mut file = demo_file();
    let position = file
        .message_type
        .iter()
        .position(|m| m.name() == "SensorTelemetry")
        .unwrap();
    let telemetry = file.message_type.remove(position);

    let mut options = Vec::new();
    encode_len_field(KEY_FIELD, key.as_bytes(), &mut options);
    let mut telemetry_bytes = telemetry.encode_to_vec();
    encode_len_field(7, &options, &mut telemetry_bytes);

    let mut file_bytes = file.encode_to_vec();
    encode_len_field(4, &telemetry_bytes, &mut file_bytes);

    let mut request = CodeGeneratorRequest {
        file_to_generate: vec!["demo.proto".to_string()],
        ..Default::default()
    }
    .encode_to_vec();
    encode_len_field(15, &file_bytes, &mut request);
    request
}

#[test]
fn test_custom_option_overrides_topic() {
    let response = respond(&request_with_key_option("/telemetry/env"));
    assert_eq!(response.error, None);

    let client = unit(&response, "demo_client.rs");
    assert!(client.contains("pub const SENSOR_TELEMETRY_TOPIC: &str = \"/telemetry/env\";"));

    let server = unit(&response, "demo_server.rs");
    assert!(server.contains("pub const SENSOR_TELEMETRY_ZENOH_KEY: &str = \"/telemetry/env\";"));
}

#[test]
fn test_release_follows_sidecar() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("demo.options"),
        "# nanopb\ndemo.EchoRequest.msg type:FT_POINTER\ndemo.EchoResponse.msg type:FT_POINTER\n",
    )
    .unwrap();

    let parameter = format!("target=server,-I{}", dir.path().display());
    let response = respond(&request_for(vec![demo_file()], &parameter));
    let server = unit(&response, "demo_server.rs");

    let echo = &server[server.find("pub fn handle_echo(").unwrap()..];
    assert_eq!(echo.matches("release(&mut request);").count(), 3);
    assert_eq!(echo.matches("release(&mut response);").count(), 2);

    let set_led = &server[server.find("pub fn handle_set_led(").unwrap()..];
    let set_led = &set_led[..set_led.find("\n    }\n").unwrap()];
    assert!(!set_led.contains("release("));
}

#[test]
fn test_missing_sidecar_generates_without_release() {
    let dir = TempDir::new().unwrap();
    let parameter = format!("target=server,-I{}", dir.path().display());
    let response = respond(&request_for(vec![demo_file()], &parameter));
    assert_eq!(response.error, None);
    assert!(!unit(&response, "demo_server.rs").contains("release(&mut"));
}

#[test]
fn test_missing_file_aborts_whole_run() {
    let input = CodeGeneratorRequest {
        file_to_generate: vec!["demo.proto".to_string(), "ghost.proto".to_string()],
        proto_file: vec![demo_file()],
        ..Default::default()
    }
    .encode_to_vec();

    let response = respond(&input);
    assert!(response.file.is_empty());
    assert_eq!(
        response.error.as_deref(),
        Some("file to generate 'ghost.proto' was not found in the request")
    );
}

#[test]
fn test_undecodable_request_is_an_error() {
    assert!(plugin::run(&[0x7A, 0x09, 0x01]).is_err());
}
