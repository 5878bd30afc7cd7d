//! Server emitter.
//!
//! Per service: a handler trait with one operation per method, and a
//! `<Service>Server` dispatcher that registers one handler per method on an
//! `RpcChannel`. Each handler runs decode, invoke, encode, release in that
//! order and releases pointer-bearing messages on every exit path.

use super::{CodeWriter, EmitContext, Emitter, GeneratedFile};
use crate::config::Target;
use crate::descriptor::{MethodDef, ServiceDef};
use crate::naming::{escape_str, method_ident, to_screaming_snake_case};
use tracing::debug;

/// Emits `<stem>_server.rs`
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerEmitter;

impl Emitter for ServerEmitter {
    fn target(&self) -> Target {
        Target::Server
    }

    fn emit(&self, ctx: &EmitContext<'_>) -> GeneratedFile {
        let mut w = CodeWriter::new(&ctx.config.indent_str);
        let rt = ctx.runtime();

        ctx.header(&mut w, "RPC server bindings");
        w.line("use std::sync::Arc;");
        w.blank();
        w.line(format!("use {}::prost::Message as _;", rt));
        w.line(format!("use {}::tracing::{{error, info, warn}};", rt));
        w.line(format!("use {}::{{release, RpcChannel, RpcStatus}};", rt));

        write_key_constants(&mut w, ctx);

        for service in &ctx.file.services {
            debug!(
                "emitting server for {} ({} methods)",
                service.name,
                service.methods.len()
            );
            w.blank();
            write_trait(&mut w, ctx, service);
            w.blank();
            write_dispatcher(&mut w, ctx, service);
        }

        GeneratedFile {
            name: ctx.unit_name(Target::Server),
            content: w.finish(),
        }
    }
}

/// `<MSG>_ZENOH_KEY` for every message of the file carrying the key option
fn write_key_constants(w: &mut CodeWriter, ctx: &EmitContext<'_>) {
    for message in &ctx.file.messages {
        if let Some(key) = ctx.option_key.value_for(message) {
            w.blank();
            w.line(format!("/// Key expression suffix declared by `{}`.", message.name));
            w.line(format!(
                "pub const {}_ZENOH_KEY: &str = \"{}\";",
                to_screaming_snake_case(&message.name),
                escape_str(&key)
            ));
        }
    }
}

fn write_trait(w: &mut CodeWriter, ctx: &EmitContext<'_>, service: &ServiceDef) {
    w.line(format!("/// Business logic of `{}`.", service.name));
    w.line("///");
    w.line("/// Each operation gets the decoded request and fills the response.");
    w.line("/// Any status other than `RpcStatus::Ok` is returned to the caller as is.");
    w.open(format!("pub trait {}: Send + Sync + 'static {{", service.name));
    for (i, method) in service.methods.iter().enumerate() {
        if i > 0 {
            w.blank();
        }
        w.line(format!("/// Handles `{}`.", method.name));
        w.open(format!("fn {}(", method_ident(&method.name)));
        w.line("&self,");
        w.line(format!("request: &{},", ctx.type_path(&method.input_type)));
        w.line(format!("response: &mut {},", ctx.type_path(&method.output_type)));
        w.close(") -> RpcStatus;");
    }
    w.close("}");
}

fn handler_fn(method: &MethodDef) -> String {
    format!("handle_{}", crate::naming::to_snake_case(&method.name))
}

fn write_dispatcher(w: &mut CodeWriter, ctx: &EmitContext<'_>, service: &ServiceDef) {
    let name = format!("{}Server", service.name);

    w.line(format!("/// Registers `{}` handlers on a routing channel.", service.name));
    w.open(format!("pub struct {}<T: ?Sized> {{", name));
    w.line("service: Arc<T>,");
    w.close("}");
    w.blank();

    w.open(format!("impl<T: {} + ?Sized> {}<T> {{", service.name, name));
    w.line("/// Service name used in every handler key");
    w.line(format!(
        "pub const SERVICE_NAME: &'static str = \"{}\";",
        escape_str(&service.name)
    ));
    w.blank();
    w.line("/// Wraps a shared implementation");
    w.open("pub fn from_arc(service: Arc<T>) -> Self {");
    w.line("Self { service }");
    w.close("}");
    w.blank();
    w.line("/// Returns the implementation");
    w.open("pub fn service(&self) -> &Arc<T> {");
    w.line("&self.service");
    w.close("}");
    w.blank();

    w.line("/// Registers one handler per method.");
    w.line("///");
    w.line("/// Returns true only if every registration succeeded.");
    w.open("pub fn register_handlers<C: RpcChannel + ?Sized>(&self, channel: &C) -> bool {");
    w.line("let mut success = true;");
    for method in &service.methods {
        w.blank();
        w.line("let service = Arc::clone(&self.service);");
        w.open("success &= channel.register_handler(");
        w.line("Self::SERVICE_NAME,");
        w.line(format!("\"{}\",", escape_str(&method.name)));
        w.open("Box::new(move |request: &[u8], sink: &mut Vec<u8>| {");
        w.line(format!("Self::{}(&*service, request, sink)", handler_fn(method)));
        w.close("}),");
        w.close(");");
    }
    w.blank();
    w.open("if success {");
    w.line(format!("info!(\"All {} handlers registered\");", service.name));
    w.close("} else {");
    w.indent();
    w.line(format!(
        "error!(\"Failed to register some {} handlers\");",
        service.name
    ));
    w.close("}");
    w.line("success");
    w.close("}");

    for method in &service.methods {
        w.blank();
        write_handler(w, ctx, service, method);
    }
    w.close("}");
    w.blank();

    w.open(format!("impl<T: {}> {}<T> {{", service.name, name));
    w.line("/// Wraps an implementation");
    w.open("pub fn new(service: T) -> Self {");
    w.line("Self::from_arc(Arc::new(service))");
    w.close("}");
    w.close("}");
}

fn write_handler(w: &mut CodeWriter, ctx: &EmitContext<'_>, service: &ServiceDef, method: &MethodDef) {
    let input = ctx.type_path(&method.input_type);
    let output = ctx.type_path(&method.output_type);
    let release_request = ctx.pointers.contains(method.input_name());
    let release_response = ctx.pointers.contains(method.output_name());
    let label = format!("{}.{}", service.name, method.name);

    let release = |w: &mut CodeWriter, request: bool, response: bool| {
        if request {
            w.line("release(&mut request);");
        }
        if response {
            w.line("release(&mut response);");
        }
    };

    w.line(format!(
        "/// Decodes, invokes and encodes one `{}` call.",
        method.name
    ));
    w.open(format!(
        "pub fn {}(service: &T, request: &[u8], sink: &mut Vec<u8>) -> RpcStatus {{",
        handler_fn(method)
    ));

    let binding = if release_request { "let mut request" } else { "let request" };
    w.open(format!("{} = match {}::decode(request) {{", binding, input));
    w.line("Ok(request) => request,");
    w.open("Err(e) => {");
    w.line(format!(
        "warn!(\"{}: failed to decode request: {{}}\", e);",
        escape_str(&label)
    ));
    w.line("return RpcStatus::DecodeError;");
    w.close("}");
    w.close("};");
    w.blank();

    w.line(format!("let mut response = {}::default();", output));
    w.line(format!(
        "let status = service.{}(&request, &mut response);",
        method_ident(&method.name)
    ));
    w.open("if !status.is_ok() {");
    release(w, release_request, false);
    w.line("return status;");
    w.close("}");
    w.blank();

    w.open("if let Err(e) = response.encode(sink) {");
    w.line(format!(
        "warn!(\"{}: failed to encode response: {{}}\", e);",
        escape_str(&label)
    ));
    release(w, release_request, release_response);
    w.line("return RpcStatus::EncodeError;");
    w.close("}");
    release(w, release_request, release_response);
    w.line("RpcStatus::Ok");
    w.close("}");
}
