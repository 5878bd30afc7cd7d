//! Descriptor model.
//!
//! A read-only view of the schema files in one generation request. The model
//! is built once from `prost-types` descriptors plus the raw option blobs
//! that `prost` cannot keep (see [`raw`]), and is never mutated afterwards.
//!
//! Option bytes are carried as opaque blobs; interpreting them is the job of
//! [`crate::options`].

pub mod raw;
pub mod wire;

use prost::Message as _;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, MethodDescriptorProto,
    ServiceDescriptorProto,
};
use std::collections::HashMap;
use tracing::debug;

pub use raw::RawOptions;

/// Suffix marking a periodic device-to-host status message
pub const TELEMETRY_SUFFIX: &str = "Telemetry";

/// Suffix marking an output type with no decoded payload
pub const EMPTY_SUFFIX: &str = "Empty";

/// Field kinds the emitters distinguish.
///
/// Every descriptor type folds into one of these: signed and fixed variants
/// map to the integer of the same width and signedness, enums to `Int32`
/// (their `prost` representation) and groups to `Message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// 64-bit float
    Double,
    /// 32-bit float
    Float,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 32-bit integer
    Uint32,
    /// Unsigned 64-bit integer
    Uint64,
    /// Boolean
    Bool,
    /// UTF-8 string
    String,
    /// Raw bytes
    Bytes,
    /// Embedded message
    Message,
}

impl FieldKind {
    /// Folds a descriptor type into a field kind
    pub fn from_type(ty: Type) -> Self {
        match ty {
            Type::Double => FieldKind::Double,
            Type::Float => FieldKind::Float,
            Type::Int32 | Type::Sint32 | Type::Sfixed32 | Type::Enum => FieldKind::Int32,
            Type::Int64 | Type::Sint64 | Type::Sfixed64 => FieldKind::Int64,
            Type::Uint32 | Type::Fixed32 => FieldKind::Uint32,
            Type::Uint64 | Type::Fixed64 => FieldKind::Uint64,
            Type::Bool => FieldKind::Bool,
            Type::String => FieldKind::String,
            Type::Bytes => FieldKind::Bytes,
            Type::Message | Type::Group => FieldKind::Message,
        }
    }

    /// Returns true for integer and floating point kinds
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldKind::Double
                | FieldKind::Float
                | FieldKind::Int32
                | FieldKind::Int64
                | FieldKind::Uint32
                | FieldKind::Uint64
        )
    }

    /// Rust scalar type `prost` uses for this kind, `None` for messages
    pub fn rust_scalar(&self) -> Option<&'static str> {
        match self {
            FieldKind::Double => Some("f64"),
            FieldKind::Float => Some("f32"),
            FieldKind::Int32 => Some("i32"),
            FieldKind::Int64 => Some("i64"),
            FieldKind::Uint32 => Some("u32"),
            FieldKind::Uint64 => Some("u64"),
            FieldKind::Bool => Some("bool"),
            FieldKind::String => Some("String"),
            FieldKind::Bytes => Some("Vec<u8>"),
            FieldKind::Message => None,
        }
    }
}

/// A message field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name as declared
    pub name: String,
    /// Field number
    pub number: i32,
    /// Folded field kind
    pub kind: FieldKind,
    /// Declared `repeated`
    pub repeated: bool,
    /// Explicit presence: proto3 `optional`, or `optional` in a proto2 file
    pub optional: bool,
    /// Member of a real `oneof`
    pub in_oneof: bool,
    /// Map field (repeated synthetic entry message)
    pub map: bool,
    /// Qualified type name for message kinds
    pub type_name: Option<String>,
}

impl FieldDef {
    fn from_proto(field: &FieldDescriptorProto, proto2: bool, map_entries: &[String]) -> Self {
        let kind = FieldKind::from_type(field.r#type());
        let repeated = field.label() == Label::Repeated;
        let proto3_optional = field.proto3_optional();
        Self {
            name: field.name().to_string(),
            number: field.number(),
            kind,
            repeated,
            optional: proto3_optional || (proto2 && field.label() == Label::Optional),
            in_oneof: field.oneof_index.is_some() && !proto3_optional,
            map: repeated && map_entries.iter().any(|entry| entry == field.type_name()),
            type_name: (kind == FieldKind::Message).then(|| field.type_name().to_string()),
        }
    }

    /// Returns true if the field is a plain struct member of the `prost` type.
    ///
    /// `oneof` members live in a separate enum and maps in a `HashMap`; the
    /// generated bindings leave both unset.
    pub fn is_settable(&self) -> bool {
        !self.in_oneof && !self.map
    }
}

/// A message definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDef {
    /// Simple name
    pub name: String,
    /// Qualified name (`.pkg.Msg`)
    pub qualified_name: String,
    /// Fields in declaration order
    pub fields: Vec<FieldDef>,
    /// Serialized `MessageOptions`, empty when the message has none
    pub options: Vec<u8>,
}

impl MessageDef {
    /// Returns true if the message follows the telemetry naming convention
    pub fn is_telemetry(&self) -> bool {
        self.name.ends_with(TELEMETRY_SUFFIX)
    }

    /// Message name with `Telemetry` removed
    pub fn telemetry_base(&self) -> String {
        self.name.replace(TELEMETRY_SUFFIX, "")
    }
}

/// An RPC method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Qualified input type as declared
    pub input_type: String,
    /// Qualified output type as declared
    pub output_type: String,
}

impl MethodDef {
    fn from_proto(method: &MethodDescriptorProto) -> Self {
        Self {
            name: method.name().to_string(),
            input_type: method.input_type().to_string(),
            output_type: method.output_type().to_string(),
        }
    }

    /// Unqualified input message name
    pub fn input_name(&self) -> &str {
        simple_name(&self.input_type)
    }

    /// Unqualified output message name
    pub fn output_name(&self) -> &str {
        simple_name(&self.output_type)
    }

    /// Returns true if the output carries no payload worth decoding
    pub fn is_fire_and_forget(&self) -> bool {
        self.output_type.ends_with(EMPTY_SUFFIX)
    }
}

/// An RPC service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDef {
    /// Service name
    pub name: String,
    /// Methods in declaration order
    pub methods: Vec<MethodDef>,
}

impl ServiceDef {
    fn from_proto(service: &ServiceDescriptorProto) -> Self {
        Self {
            name: service.name().to_string(),
            methods: service.method.iter().map(MethodDef::from_proto).collect(),
        }
    }
}

/// A top-level extension declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionDef {
    /// Extension field name
    pub name: String,
    /// Extension field number
    pub number: u32,
    /// Extended message (for custom message options, `.google.protobuf.MessageOptions`)
    pub extendee: String,
}

/// One schema file of the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFile {
    /// File name as given to the compiler (`dir/service.proto`)
    pub name: String,
    /// Package, empty when undeclared
    pub package: String,
    /// Top-level messages in declaration order
    pub messages: Vec<MessageDef>,
    /// Services in declaration order
    pub services: Vec<ServiceDef>,
    /// Top-level extensions
    pub extensions: Vec<ExtensionDef>,
}

impl SchemaFile {
    /// Base file name without directory and `.proto` extension
    pub fn stem(&self) -> &str {
        let base = self.name.rsplit('/').next().unwrap_or(&self.name);
        base.strip_suffix(".proto").unwrap_or(base)
    }

    /// Qualified name of a top-level message declared in this file
    pub fn qualify(&self, name: &str) -> String {
        if self.package.is_empty() {
            format!(".{}", name)
        } else {
            format!(".{}.{}", self.package, name)
        }
    }

    /// Top-level messages following the telemetry naming convention
    pub fn telemetry_messages(&self) -> impl Iterator<Item = &MessageDef> {
        self.messages.iter().filter(|m| m.is_telemetry())
    }

    /// Total number of methods across services
    pub fn method_count(&self) -> usize {
        self.services.iter().map(|s| s.methods.len()).sum()
    }
}

/// All schema files of one request, with qualified-name message lookup
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    files: Vec<SchemaFile>,
    /// Qualified name -> nested-aware message definition
    index: HashMap<String, MessageDef>,
}

impl SchemaSet {
    /// Builds the model from descriptors and their retained option blobs.
    ///
    /// When no raw blob was retained for a message, its decoded
    /// `MessageOptions` (if any) are re-serialized instead.
    pub fn new(protos: &[FileDescriptorProto], raw: &RawOptions) -> Self {
        let mut index = HashMap::new();
        let files = protos
            .iter()
            .map(|proto| {
                let scope = if proto.package().is_empty() {
                    String::new()
                } else {
                    format!(".{}", proto.package())
                };
                let proto2 = matches!(proto.syntax(), "" | "proto2");

                for message in &proto.message_type {
                    index_message(message, &scope, proto2, raw, &mut index);
                }

                SchemaFile {
                    name: proto.name().to_string(),
                    package: proto.package().to_string(),
                    messages: proto
                        .message_type
                        .iter()
                        .filter_map(|m| index.get(&format!("{}.{}", scope, m.name())).cloned())
                        .collect(),
                    services: proto.service.iter().map(ServiceDef::from_proto).collect(),
                    extensions: proto
                        .extension
                        .iter()
                        .map(|ext| ExtensionDef {
                            name: ext.name().to_string(),
                            number: u32::try_from(ext.number()).unwrap_or_default(),
                            extendee: ext.extendee().to_string(),
                        })
                        .collect(),
                }
            })
            .collect();

        Self { files, index }
    }

    /// Files in request order
    pub fn files(&self) -> &[SchemaFile] {
        &self.files
    }

    /// Looks up a file by the name the compiler used
    pub fn file(&self, name: &str) -> Option<&SchemaFile> {
        self.files.iter().find(|f| f.name == name)
    }

    /// Looks up a message by qualified name (`.pkg.Msg` or `.Msg`).
    ///
    /// A name without the leading dot is treated as fully qualified.
    pub fn message(&self, type_name: &str) -> Option<&MessageDef> {
        if type_name.starts_with('.') {
            self.index.get(type_name)
        } else {
            self.index.get(&format!(".{}", type_name))
        }
    }

    /// Fields of a method's input message.
    ///
    /// An unresolvable input type yields no fields, which callers render as
    /// a zero-argument call.
    pub fn input_fields(&self, method: &MethodDef) -> &[FieldDef] {
        match self.message(&method.input_type) {
            Some(message) => &message.fields,
            None => {
                debug!(
                    "input type {} of {} not found; using empty field list",
                    method.input_type, method.name
                );
                &[]
            }
        }
    }
}

fn index_message(
    message: &DescriptorProto,
    scope: &str,
    proto2: bool,
    raw: &RawOptions,
    index: &mut HashMap<String, MessageDef>,
) {
    let qualified_name = format!("{}.{}", scope, message.name());

    // Map entries are synthetic and never addressed by methods
    let mut map_entries = Vec::new();
    for nested in &message.nested_type {
        if nested.options.as_ref().is_some_and(|o| o.map_entry()) {
            map_entries.push(format!("{}.{}", qualified_name, nested.name()));
        } else {
            index_message(nested, &qualified_name, proto2, raw, index);
        }
    }

    let options = match raw.get(&qualified_name) {
        Some(bytes) => bytes.to_vec(),
        None => message
            .options
            .as_ref()
            .map(|o| o.encode_to_vec())
            .unwrap_or_default(),
    };

    index.insert(
        qualified_name.clone(),
        MessageDef {
            name: message.name().to_string(),
            qualified_name,
            fields: message
                .field
                .iter()
                .map(|field| FieldDef::from_proto(field, proto2, &map_entries))
                .collect(),
            options,
        },
    );
}

/// Last segment of a dotted type name
pub fn simple_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}
