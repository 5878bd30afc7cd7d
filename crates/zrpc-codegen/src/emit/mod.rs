//! Binding emitters.
//!
//! Each emitter turns one schema file into one generated Rust unit. All three
//! read the same [`EmitContext`], so the names, topics and call contracts they
//! produce agree with each other.
//!
//! - [`ClientEmitter`]: typed calls over `RpcTransport` plus a telemetry subscriber
//! - [`ServerEmitter`]: handler traits and dispatchers for `RpcChannel`
//! - [`UiEmitter`]: an `egui` control surface built on the client unit

mod client;
mod server;
mod ui;

use crate::config::{GeneratorConfig, Target};
use crate::descriptor::{FieldDef, FieldKind, MessageDef, SchemaFile, SchemaSet};
use crate::error::{Error, Result};
use crate::naming::{self, to_snake_case};
use crate::options::OptionKey;
use crate::pointer::PointerRegistry;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub use client::ClientEmitter;
pub use server::ServerEmitter;
pub use ui::UiEmitter;

/// Prefix of the default telemetry topic suffix
pub const TELEMETRY_TOPIC_PREFIX: &str = "/telemetry/";

/// One generated unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Output path relative to the output directory
    pub name: String,
    /// Full file content
    pub content: String,
}

impl GeneratedFile {
    /// Resolves the unit's location under `output_dir`.
    ///
    /// Absolute names and names with `..` components are rejected.
    pub fn output_path(&self, output_dir: &Path) -> Result<PathBuf> {
        let relative = Path::new(&self.name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if self.name.is_empty() || escapes {
            return Err(Error::path_traversal(relative));
        }
        Ok(output_dir.join(relative))
    }

    /// Writes the unit under `output_dir`, creating parent directories
    pub fn write_to(&self, output_dir: &Path) -> Result<PathBuf> {
        let path = self.output_path(output_dir)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::directory_create(parent, e))?;
        }
        fs::write(&path, &self.content).map_err(|e| Error::file_write(&path, e))?;
        Ok(path)
    }
}

/// Produces one generated unit for a schema file
pub trait Emitter {
    /// Target this emitter implements
    fn target(&self) -> Target;

    /// Generates the unit for `ctx.file`
    fn emit(&self, ctx: &EmitContext<'_>) -> GeneratedFile;
}

/// Returns the emitter for `target`
pub fn emitter_for(target: Target) -> Box<dyn Emitter> {
    match target {
        Target::Client => Box::new(ClientEmitter),
        Target::Server => Box::new(ServerEmitter),
        Target::Ui => Box::new(UiEmitter),
    }
}

/// Shared, read-only inputs of one emission
#[derive(Debug, Clone, Copy)]
pub struct EmitContext<'a> {
    /// Every file of the request
    pub schema: &'a SchemaSet,
    /// The file being generated
    pub file: &'a SchemaFile,
    /// Custom key option resolved for this run
    pub option_key: OptionKey,
    /// Messages that need an explicit release
    pub pointers: &'a PointerRegistry,
    /// Generator settings
    pub config: &'a GeneratorConfig,
}

/// A telemetry message with its resolved topic suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryTopic<'a> {
    /// The message
    pub message: &'a MessageDef,
    /// Message name without `Telemetry`
    pub base: String,
    /// Topic suffix appended to the device id
    pub suffix: String,
}

impl TelemetryTopic<'_> {
    /// Name of the generated suffix constant (`SENSOR_TELEMETRY_TOPIC`)
    pub fn const_name(&self) -> String {
        format!("{}_TOPIC", naming::to_screaming_snake_case(&self.message.name))
    }

    /// Name of the generated subscribe method (`subscribe_sensor`)
    pub fn subscribe_fn(&self) -> String {
        format!("subscribe_{}", to_snake_case(&self.base))
    }
}

/// Default topic suffix for a telemetry base name (`Sensor` -> `/telemetry/sensor`)
pub fn default_telemetry_suffix(base: &str) -> String {
    format!("{}{}", TELEMETRY_TOPIC_PREFIX, to_snake_case(base))
}

impl<'a> EmitContext<'a> {
    /// Output name of the unit for `target`: the schema's directory plus
    /// [`unit_module`](Self::unit_module) and `.rs`
    pub fn unit_name(&self, target: Target) -> String {
        let dir = match self.file.name.rfind('/') {
            Some(idx) => &self.file.name[..=idx],
            None => "",
        };
        format!("{}{}.rs", dir, self.unit_module(target))
    }

    /// Module name of the unit for `target`, as seen from a sibling unit.
    ///
    /// The stem is snake cased and anything outside `[a-z0-9_]` becomes `_`,
    /// so the file name is always a valid module name.
    pub fn unit_module(&self, target: Target) -> String {
        let stem: String = to_snake_case(self.file.stem())
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        format!("{}_{}", stem, target.unit_suffix())
    }

    /// Runtime crate path used by generated code
    pub fn runtime(&self) -> &str {
        &self.config.runtime_crate
    }

    /// Rust path of a message type
    pub fn type_path(&self, type_name: &str) -> String {
        naming::rust_type_path(type_name, &self.file.package, &self.config.pb_module)
    }

    /// Telemetry messages of the file, with their topic suffix.
    ///
    /// The custom key option wins over the naming-convention default.
    pub fn telemetry_topics(&self) -> Vec<TelemetryTopic<'a>> {
        self.file
            .telemetry_messages()
            .map(|message| {
                let base = message.telemetry_base();
                let suffix = self
                    .option_key
                    .value_for(message)
                    .unwrap_or_else(|| default_telemetry_suffix(&base));
                TelemetryTopic {
                    message,
                    base,
                    suffix,
                }
            })
            .collect()
    }

    /// Rust type of a field as it appears in the `prost` struct, without
    /// the presence wrapper.
    pub fn field_type(&self, field: &FieldDef) -> String {
        let element = match field.kind.rust_scalar() {
            Some(scalar) => scalar.to_string(),
            None => self.type_path(field.type_name.as_deref().unwrap_or_default()),
        };
        if field.repeated {
            format!("Vec<{}>", element)
        } else {
            element
        }
    }

    /// Statement assigning `value` to the `prost` field on `target`
    pub fn assign_field(&self, target: &str, field: &FieldDef, value: &str) -> String {
        let ident = naming::field_ident(&field.name);
        let wrapped = !field.repeated && (field.optional || field.kind == FieldKind::Message);
        if wrapped {
            format!("{}.{} = Some({});", target, ident, value)
        } else {
            format!("{}.{} = {};", target, ident, value)
        }
    }

    /// Generated-file banner and module docs
    pub fn header(&self, w: &mut CodeWriter, what: &str) {
        w.line(format!(
            "// @generated by protoc-gen-zrpc from {}. Do not edit.",
            self.file.name
        ));
        w.line(format!("//! {} for `{}`.", what, self.file.name));
        w.blank();
        w.line("#![allow(dead_code, unused_imports, unused_mut, clippy::all)]");
        w.blank();
    }
}

/// Indenting line writer for generated source
#[derive(Debug)]
pub struct CodeWriter {
    output: String,
    indent_str: String,
    indent_level: usize,
}

impl CodeWriter {
    /// Creates a writer using `indent_str` per level
    pub fn new(indent_str: impl Into<String>) -> Self {
        Self {
            output: String::new(),
            indent_str: indent_str.into(),
            indent_level: 0,
        }
    }

    /// Increases indentation
    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    /// Decreases indentation
    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    /// Writes one indented line
    pub fn line(&mut self, s: impl AsRef<str>) {
        let s = s.as_ref();
        if !s.is_empty() {
            for _ in 0..self.indent_level {
                self.output.push_str(&self.indent_str);
            }
            self.output.push_str(s);
        }
        self.output.push('\n');
    }

    /// Writes an empty line
    pub fn blank(&mut self) {
        self.output.push('\n');
    }

    /// Writes `s` and indents the following lines
    pub fn open(&mut self, s: impl AsRef<str>) {
        self.line(s);
        self.indent();
    }

    /// Dedents and writes `s`
    pub fn close(&mut self, s: impl AsRef<str>) {
        self.dedent();
        self.line(s);
    }

    /// Returns the written text
    pub fn finish(self) -> String {
        self.output
    }
}
