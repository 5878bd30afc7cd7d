//! Plugin driver.
//!
//! Reads a `CodeGeneratorRequest`, builds the descriptor model once, resolves
//! the key option field number once, and runs the selected emitters over
//! every requested file. Any error aborts the whole run and is reported in
//! the response's `error` field with no files.

use crate::config::{GeneratorConfig, Target};
use crate::descriptor::{RawOptions, SchemaFile, SchemaSet};
use crate::emit::{emitter_for, EmitContext, GeneratedFile};
use crate::error::{Error, Result};
use crate::options::OptionKey;
use crate::pointer::PointerRegistry;
use prost::Message;
use prost_types::compiler::code_generator_response::{Feature, File};
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use tracing::{debug, info, warn};

/// Files under this path are never generated
pub const WELL_KNOWN_PREFIX: &str = "google/protobuf";

/// Generates the units for `files_to_generate`.
///
/// `protos` must contain every file the requested ones depend on, since
/// message lookup and key option resolution span all of them.
pub fn generate(
    protos: &[FileDescriptorProto],
    raw: &RawOptions,
    files_to_generate: &[String],
    config: &GeneratorConfig,
) -> Result<Vec<GeneratedFile>> {
    let schema = SchemaSet::new(protos, raw);
    let option_key = OptionKey::resolve(&schema);
    debug!("key option field number: {}", option_key.field_number());

    let mut targets: Vec<Target> = config.targets.iter().copied().collect();
    if config.emits(Target::Ui) && !config.emits(Target::Client) {
        debug!("ui target needs the client unit; emitting it as well");
        targets.insert(0, Target::Client);
    }

    let mut generated = Vec::new();
    for name in files_to_generate {
        if name.contains(WELL_KNOWN_PREFIX) {
            debug!("skipping well-known file {}", name);
            continue;
        }
        let file = schema.file(name).ok_or_else(|| Error::missing_file(name))?;

        let pointers = if targets.contains(&Target::Server) {
            PointerRegistry::load(name, &config.search_paths())
        } else {
            PointerRegistry::new()
        };

        let ctx = EmitContext {
            schema: &schema,
            file,
            option_key,
            pointers: &pointers,
            config,
        };

        for target in &targets {
            let unit = emitter_for(*target).emit(&ctx);
            debug!("emitted {} ({} bytes)", unit.name, unit.content.len());
            generated.push(unit);
        }
        info!(
            "generated {} for {} ({} services, {} methods)",
            targets
                .iter()
                .map(Target::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            name,
            file.services.len(),
            file.method_count()
        );
    }

    Ok(generated)
}

/// Runs generation for a decoded request and its retained option blobs
pub fn generate_response(
    request: &CodeGeneratorRequest,
    raw: &RawOptions,
    config: &GeneratorConfig,
) -> CodeGeneratorResponse {
    let mut response = CodeGeneratorResponse {
        supported_features: Some(Feature::Proto3Optional as u64),
        ..Default::default()
    };

    match generate(&request.proto_file, raw, &request.file_to_generate, config) {
        Ok(files) => {
            response.file = files
                .into_iter()
                .map(|unit| File {
                    name: Some(unit.name),
                    content: Some(unit.content),
                    ..Default::default()
                })
                .collect();
        }
        Err(e) => {
            warn!("generation failed: {}", e);
            response.error = Some(e.to_string());
        }
    }
    response
}

/// Handles one encoded plugin request and returns the encoded response.
///
/// Only an undecodable request is an error here; generation failures and
/// malformed parameters go into the response.
pub fn run(input: &[u8]) -> Result<Vec<u8>> {
    let request = CodeGeneratorRequest::decode(input)?;
    let raw = RawOptions::from_request(input)?;
    debug!(
        "request: {} file(s) to generate, {} proto file(s), {} with options",
        request.file_to_generate.len(),
        request.proto_file.len(),
        raw.len()
    );

    let response = match GeneratorConfig::from_parameter(request.parameter()) {
        Ok(config) => generate_response(&request, &raw, &config),
        Err(e) => CodeGeneratorResponse {
            error: Some(e.to_string()),
            supported_features: Some(Feature::Proto3Optional as u64),
            ..Default::default()
        },
    };
    Ok(response.encode_to_vec())
}

/// Generates from an encoded `FileDescriptorSet`.
///
/// With no explicit file list, every file declaring a service or a
/// telemetry message is generated.
pub fn generate_from_descriptor_set(
    data: &[u8],
    files: &[String],
    config: &GeneratorConfig,
) -> Result<Vec<GeneratedFile>> {
    let set = FileDescriptorSet::decode(data)?;
    let raw = RawOptions::from_descriptor_set(data)?;

    let files = if files.is_empty() {
        let schema = SchemaSet::new(&set.file, &raw);
        schema
            .files()
            .iter()
            .filter(|file| has_bindings(file))
            .map(|file| file.name.clone())
            .collect()
    } else {
        files.to_vec()
    };

    generate(&set.file, &raw, &files, config)
}

fn has_bindings(file: &SchemaFile) -> bool {
    !file.name.contains(WELL_KNOWN_PREFIX)
        && (!file.services.is_empty() || file.telemetry_messages().next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::{DescriptorProto, ServiceDescriptorProto};

    fn file(name: &str) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some(name.to_string()),
            package: Some("pkg".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Ping".to_string()),
                ..Default::default()
            }],
            service: vec![ServiceDescriptorProto {
                name: Some("Svc".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_file_aborts_run() {
        let request = CodeGeneratorRequest {
            file_to_generate: vec!["absent.proto".to_string()],
            proto_file: vec![file("present.proto")],
            ..Default::default()
        };

        let response = generate_response(&request, &RawOptions::new(), &GeneratorConfig::new());
        assert!(response.file.is_empty());
        assert_eq!(
            response.error.as_deref(),
            Some("file to generate 'absent.proto' was not found in the request")
        );
        assert_eq!(response.supported_features, Some(1));
    }

    #[test]
    fn test_well_known_files_are_skipped() {
        let files = generate(
            &[file("google/protobuf/empty.proto")],
            &RawOptions::new(),
            &["google/protobuf/empty.proto".to_string()],
            &GeneratorConfig::new(),
        )
        .unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_ui_pulls_in_client() {
        let config = GeneratorConfig::new().targets([Target::Ui]);
        let files = generate(
            &[file("svc.proto")],
            &RawOptions::new(),
            &["svc.proto".to_string()],
            &config,
        )
        .unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["svc_client.rs", "svc_ui.rs"]);
    }

    #[test]
    fn test_camel_case_file_names_match_module_paths() {
        let config = GeneratorConfig::new().targets([Target::Ui]);
        let files = generate(
            &[file("protos/DeviceApi.proto"), file("my-svc.proto")],
            &RawOptions::new(),
            &["protos/DeviceApi.proto".to_string(), "my-svc.proto".to_string()],
            &config,
        )
        .unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "protos/device_api_client.rs",
                "protos/device_api_ui.rs",
                "my_svc_client.rs",
                "my_svc_ui.rs"
            ]
        );
        assert!(files[1]
            .content
            .contains("use super::device_api_client as client;"));
        assert!(files[3].content.contains("use super::my_svc_client as client;"));
    }

    #[test]
    fn test_bad_parameter_is_reported() {
        let request = CodeGeneratorRequest {
            parameter: Some("target=web".to_string()),
            ..Default::default()
        };
        let output = run(&request.encode_to_vec()).unwrap();
        let response = CodeGeneratorResponse::decode(output.as_slice()).unwrap();
        assert_eq!(
            response.error.as_deref(),
            Some("invalid plugin parameter 'web': expected one of client, server, ui, all")
        );
        assert!(response.file.is_empty());
    }

    #[test]
    fn test_descriptor_set_defaults_to_files_with_bindings() {
        let options_only = FileDescriptorProto {
            name: Some("options.proto".to_string()),
            ..Default::default()
        };
        let set = FileDescriptorSet {
            file: vec![options_only, file("svc.proto")],
        };
        let config = GeneratorConfig::new().targets([Target::Client]);
        let files =
            generate_from_descriptor_set(&set.encode_to_vec(), &[], &config).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "svc_client.rs");
    }
}
