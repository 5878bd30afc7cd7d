//! Client emitter.
//!
//! Per service: a `<Service>Client<T: RpcTransport>` with one blocking call
//! per method and a `<Method>Params` struct of named optional parameters.
//! Per file with telemetry messages: one `TelemetrySubscriber<S: Subscriber>`.

use super::{CodeWriter, EmitContext, Emitter, GeneratedFile};
use crate::config::Target;
use crate::descriptor::{FieldDef, MethodDef, ServiceDef};
use crate::naming::{escape_str, field_ident, method_ident};
use tracing::debug;

/// Emits `<stem>_client.rs`
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientEmitter;

impl Emitter for ClientEmitter {
    fn target(&self) -> Target {
        Target::Client
    }

    fn emit(&self, ctx: &EmitContext<'_>) -> GeneratedFile {
        let mut w = CodeWriter::new(&ctx.config.indent_str);
        let rt = ctx.runtime();

        ctx.header(&mut w, "RPC client bindings");
        w.line("use std::sync::{Mutex, PoisonError};");
        w.line("use std::time::Duration;");
        w.blank();
        w.line(format!("use {}::prost::Message as _;", rt));
        w.line(format!("use {}::tracing::info;", rt));
        w.line(format!(
            "use {}::{{keys, CallError, RpcResponse, RpcTransport, Subscriber, SubscriptionId, DEFAULT_TIMEOUT}};",
            rt
        ));

        for service in &ctx.file.services {
            debug!(
                "emitting client for {} ({} methods)",
                service.name,
                service.methods.len()
            );
            for method in &service.methods {
                let fields = call_fields(ctx, method);
                if !fields.is_empty() {
                    w.blank();
                    write_params(&mut w, ctx, service, method, &fields);
                }
            }
            w.blank();
            write_client(&mut w, ctx, service);
        }

        write_telemetry(&mut w, ctx);

        GeneratedFile {
            name: ctx.unit_name(Target::Client),
            content: w.finish(),
        }
    }
}

/// Input fields a call can set by name
pub(crate) fn call_fields<'a>(ctx: &EmitContext<'a>, method: &MethodDef) -> Vec<&'a FieldDef> {
    ctx.schema
        .input_fields(method)
        .iter()
        .filter(|field| field.is_settable())
        .collect()
}

/// Name of the named-parameter struct of a method.
///
/// Method names shared by several services in one file are prefixed with
/// the service name.
pub(crate) fn params_type(ctx: &EmitContext<'_>, service: &ServiceDef, method: &MethodDef) -> String {
    let shared = ctx
        .file
        .services
        .iter()
        .filter(|s| s.methods.iter().any(|m| m.name == method.name))
        .count()
        > 1;
    if shared {
        format!("{}{}Params", service.name, method.name)
    } else {
        format!("{}Params", method.name)
    }
}

/// Name of the generated client type
pub(crate) fn client_type(service: &ServiceDef) -> String {
    format!("{}Client", service.name)
}

fn write_params(
    w: &mut CodeWriter,
    ctx: &EmitContext<'_>,
    service: &ServiceDef,
    method: &MethodDef,
    fields: &[&FieldDef],
) {
    w.line(format!(
        "/// Named parameters of `{}.{}`. Unset fields keep their defaults.",
        service.name, method.name
    ));
    w.line("#[derive(Debug, Clone, Default, PartialEq)]");
    w.open(format!("pub struct {} {{", params_type(ctx, service, method)));
    for field in fields {
        w.line(format!(
            "pub {}: Option<{}>,",
            field_ident(&field.name),
            ctx.field_type(field)
        ));
    }
    w.close("}");
}

fn write_client(w: &mut CodeWriter, ctx: &EmitContext<'_>, service: &ServiceDef) {
    let name = client_type(service);

    w.line(format!("/// Client for `{}`.", service.name));
    w.open(format!("pub struct {}<T> {{", name));
    w.line("transport: T,");
    w.line("timeout: Duration,");
    w.close("}");
    w.blank();

    w.open(format!("impl<T: RpcTransport> {}<T> {{", name));
    w.line("/// Service name used in every call key");
    w.line(format!(
        "pub const SERVICE_NAME: &'static str = \"{}\";",
        escape_str(&service.name)
    ));
    w.blank();
    w.line("/// Creates a client with the default call timeout");
    w.open("pub fn new(transport: T) -> Self {");
    w.open("Self {");
    w.line("transport,");
    w.line("timeout: DEFAULT_TIMEOUT,");
    w.close("}");
    w.close("}");
    w.blank();
    w.line("/// Sets the call timeout");
    w.open("pub fn with_timeout(mut self, timeout: Duration) -> Self {");
    w.line("self.timeout = timeout;");
    w.line("self");
    w.close("}");
    w.blank();
    w.line("/// Returns the underlying transport");
    w.open("pub fn transport(&self) -> &T {");
    w.line("&self.transport");
    w.close("}");

    for method in &service.methods {
        w.blank();
        write_call(w, ctx, service, method);
    }
    w.close("}");
}

fn write_call(w: &mut CodeWriter, ctx: &EmitContext<'_>, service: &ServiceDef, method: &MethodDef) {
    let fields = call_fields(ctx, method);
    let input = ctx.type_path(&method.input_type);
    let output = ctx.type_path(&method.output_type);

    let params = if fields.is_empty() {
        String::new()
    } else {
        format!(", params: {}", params_type(ctx, service, method))
    };
    let returns = if method.is_fire_and_forget() {
        "RpcResponse".to_string()
    } else {
        format!("(RpcResponse, Option<{}>)", output)
    };

    w.line(format!("/// Calls `{}.{}`.", service.name, method.name));
    if !method.is_fire_and_forget() {
        w.line("///");
        w.line("/// A reply that fails to decode is reported as a failure.");
    }
    w.open(format!(
        "pub fn {}(&self, request: Option<{}>{}) -> {} {{",
        method_ident(&method.name),
        input,
        params,
        returns
    ));

    if fields.is_empty() {
        w.line("let request = request.unwrap_or_default();");
    } else {
        w.open("let request = request.unwrap_or_else(|| {");
        w.line(format!("let mut request = {}::default();", input));
        for field in &fields {
            w.open(format!(
                "if let Some(value) = params.{} {{",
                field_ident(&field.name)
            ));
            w.line(ctx.assign_field("request", field, "value"));
            w.close("}");
        }
        w.line("request");
        w.close("});");
    }

    w.open("let reply = self.transport.call(");
    w.line("Self::SERVICE_NAME,");
    w.line(format!("\"{}\",", escape_str(&method.name)));
    w.line("&request.encode_to_vec(),");
    w.line("self.timeout,");
    w.close(");");

    w.open("match reply {");
    if method.is_fire_and_forget() {
        w.line("Ok(_) => RpcResponse::ok(),");
        w.line("Err(e) => RpcResponse::from(&e),");
    } else {
        w.open(format!("Ok(payload) => match {}::decode(payload) {{", output));
        w.line("Ok(response) => (RpcResponse::ok(), Some(response)),");
        w.open("Err(e) => (");
        w.line(format!(
            "RpcResponse::failed(format!(\"failed to decode {}: {{}}\", e)),",
            escape_str(method.output_name())
        ));
        w.line("None,");
        w.close("),");
        w.close("},");
        w.line("Err(e) => (RpcResponse::from(&e), None),");
    }
    w.close("}");
    w.close("}");
}

fn write_telemetry(w: &mut CodeWriter, ctx: &EmitContext<'_>) {
    let topics = ctx.telemetry_topics();
    if topics.is_empty() {
        return;
    }
    let rt = ctx.runtime();

    for topic in &topics {
        w.blank();
        w.line(format!("/// Topic suffix of `{}`.", topic.message.name));
        w.line(format!(
            "pub const {}: &str = \"{}\";",
            topic.const_name(),
            escape_str(&topic.suffix)
        ));
    }

    w.blank();
    w.line(format!("/// Telemetry subscriptions for `{}`.", ctx.file.name));
    w.line("///");
    w.line("/// Payloads that fail to decode and callbacks that panic are logged and");
    w.line("/// dropped; later samples are still delivered.");
    w.open("pub struct TelemetrySubscriber<S> {");
    w.line("subscriber: S,");
    w.line("device_id: String,");
    w.line("subscriptions: Mutex<Vec<SubscriptionId>>,");
    w.close("}");
    w.blank();

    w.open("impl<S: Subscriber> TelemetrySubscriber<S> {");
    w.line("/// Creates a subscriber for `device_id`");
    w.open("pub fn new(subscriber: S, device_id: impl Into<String>) -> Self {");
    w.open("Self {");
    w.line("subscriber,");
    w.line("device_id: device_id.into(),");
    w.line("subscriptions: Mutex::new(Vec::new()),");
    w.close("}");
    w.close("}");
    w.blank();
    w.line("/// Device whose topics this subscriber listens on");
    w.open("pub fn device_id(&self) -> &str {");
    w.line("&self.device_id");
    w.close("}");

    for topic in &topics {
        let message = ctx.type_path(&topic.message.qualified_name);
        w.blank();
        w.line(format!(
            "/// Subscribes to `{}` on `<device-id>{}`.",
            topic.message.name, topic.suffix
        ));
        w.line(format!(
            "pub fn {}<F>(&self, callback: F) -> Result<(), CallError>",
            topic.subscribe_fn()
        ));
        w.line("where");
        w.indent();
        w.line(format!("F: Fn({}) + Send + Sync + 'static,", message));
        w.dedent();
        w.open("{");
        w.line(format!(
            "let key_expr = keys::telemetry_key(&self.device_id, {});",
            topic.const_name()
        ));
        w.line("info!(\"Subscribing to {}\", key_expr);");
        w.open("let id = self.subscriber.subscribe(");
        w.line("&key_expr,");
        w.open("Box::new(move |payload: &[u8]| {");
        w.line(format!(
            "{}::deliver::<{}, _>(\"{}\", payload, &callback);",
            rt,
            message,
            escape_str(&topic.message.name)
        ));
        w.close("}),");
        w.close(")?;");
        w.open("self.subscriptions");
        w.line(".lock()");
        w.line(".unwrap_or_else(PoisonError::into_inner)");
        w.line(".push(id);");
        w.dedent();
        w.line("Ok(())");
        w.close("}");
    }

    w.blank();
    w.line("/// Drops every subscription made through this subscriber");
    w.open("pub fn unsubscribe_all(&self) {");
    w.open("let ids: Vec<SubscriptionId> = self");
    w.line(".subscriptions");
    w.line(".lock()");
    w.line(".unwrap_or_else(PoisonError::into_inner)");
    w.line(".drain(..)");
    w.line(".collect();");
    w.dedent();
    w.open("for id in ids {");
    w.line("self.subscriber.unsubscribe(id);");
    w.close("}");
    w.line("info!(\"Unsubscribed from all telemetry\");");
    w.close("}");
    w.close("}");
}
