//! UI emitter.
//!
//! Emits an `eframe` application module built only from the client unit's
//! call contract: a device id row, one card per service with a collapsible
//! panel per method, and a side panel fed by the device log and every
//! telemetry topic.
//!
//! Widgets by field kind: bool gets a checkbox, numeric kinds a drag value,
//! string and bytes a text line. 64-bit integers also get a text line, since
//! a drag value carries `f64` and loses precision above 2^53. Message,
//! repeated, `oneof` and map fields get no widget and stay unset. Form values
//! persist through `eframe` storage, except fields whose name contains
//! `password`.
//!
//! The consuming crate depends on `eframe` (with `persistence`), `serde`
//! (with `derive`) and `chrono` next to the runtime crate.

use super::client::{call_fields, client_type, params_type};
use super::{CodeWriter, EmitContext, Emitter, GeneratedFile, TelemetryTopic};
use crate::config::Target;
use crate::descriptor::{FieldDef, FieldKind, MethodDef, ServiceDef};
use crate::naming::{escape_str, field_ident, field_label, method_ident, to_snake_case};
use tracing::debug;

/// Emits `<stem>_ui.rs`
#[derive(Debug, Clone, Copy, Default)]
pub struct UiEmitter;

/// Per-method view of what the surface needs
struct MethodUi<'a> {
    service: &'a ServiceDef,
    method: &'a MethodDef,
    /// `<service>_<method>`, used for form slots and helper names
    slot: String,
    /// Fields with a widget
    widgets: Vec<&'a FieldDef>,
    /// Name of the client's params struct, if the call takes one
    params: Option<String>,
}

impl MethodUi<'_> {
    fn inputs_type(&self) -> String {
        format!("{}{}Inputs", self.service.name, self.method.name)
    }

    /// Type parameter of the method's panel state
    fn panel_inputs(&self) -> String {
        if self.widgets.is_empty() {
            "()".to_string()
        } else {
            self.inputs_type()
        }
    }
}

fn has_widget(field: &FieldDef) -> bool {
    field.is_settable() && !field.repeated && field.kind != FieldKind::Message
}

/// Integer kinds entered as text and parsed exactly
fn is_wide(kind: FieldKind) -> bool {
    matches!(kind, FieldKind::Int64 | FieldKind::Uint64)
}

fn is_secret(field: &FieldDef) -> bool {
    field.name.to_lowercase().contains("password")
}

fn service_slot(service: &ServiceDef) -> String {
    to_snake_case(&service.name)
}

impl Emitter for UiEmitter {
    fn target(&self) -> Target {
        Target::Ui
    }

    fn emit(&self, ctx: &EmitContext<'_>) -> GeneratedFile {
        let mut w = CodeWriter::new(&ctx.config.indent_str);
        let rt = ctx.runtime();

        let methods: Vec<MethodUi<'_>> = ctx
            .file
            .services
            .iter()
            .flat_map(|service| {
                service.methods.iter().map(move |method| {
                    let fields = call_fields(ctx, method);
                    MethodUi {
                        service,
                        method,
                        slot: format!("{}_{}", service_slot(service), to_snake_case(&method.name)),
                        widgets: fields.iter().copied().filter(|f| has_widget(f)).collect(),
                        params: (!fields.is_empty()).then(|| params_type(ctx, service, method)),
                    }
                })
            })
            .collect();
        let topics = ctx.telemetry_topics();
        debug!(
            "emitting ui for {} ({} methods, {} telemetry topics)",
            ctx.file.name,
            methods.len(),
            topics.len()
        );

        ctx.header(&mut w, "Control surface");
        w.line("use std::collections::VecDeque;");
        w.line("use std::fmt::Debug;");
        w.line("use std::sync::{Arc, Mutex, MutexGuard, PoisonError};");
        w.line("use std::thread;");
        w.line("use std::time::Duration;");
        w.blank();
        w.line("use eframe::egui;");
        w.line("use serde::{Deserialize, Serialize};");
        w.line(format!(
            "use {}::{{input, LogSubscriber, Query, RpcClient, RpcResponse, Subscriber}};",
            rt
        ));
        w.blank();
        w.line(format!("use super::{} as client;", ctx.unit_module(Target::Client)));
        w.blank();
        w.line("/// Device id the surface starts with");
        w.line(format!(
            "pub const DEFAULT_DEVICE_ID: &str = \"{}\";",
            escape_str(&ctx.config.default_device_id)
        ));
        w.blank();
        w.line(format!(
            "const STORAGE_KEY: &str = \"zrpc/{}\";",
            escape_str(&ctx.file.name)
        ));
        w.line("const MAX_LOG_LINES: usize = 1000;");
        w.blank();
        w.line("type Transport<S> = Arc<RpcClient<Arc<S>>>;");

        write_state_types(&mut w, &methods);
        write_app_struct(&mut w, ctx);
        write_app_impl(&mut w, ctx, &methods, &topics);
        write_eframe_impl(&mut w, ctx);
        write_helpers(&mut w);

        GeneratedFile {
            name: ctx.unit_name(Target::Ui),
            content: w.finish(),
        }
    }
}

fn write_state_types(w: &mut CodeWriter, methods: &[MethodUi<'_>]) {
    w.blank();
    w.line("/// Persisted state of one method panel");
    w.line("#[derive(Debug, Default, Serialize, Deserialize)]");
    w.line("#[serde(default)]");
    w.open("pub struct MethodPanel<I> {");
    w.line("pub expanded: bool,");
    w.line("pub inputs: I,");
    w.line("#[serde(skip)]");
    w.line("pub result: Arc<Mutex<String>>,");
    w.close("}");

    for m in methods.iter().filter(|m| !m.widgets.is_empty()) {
        w.blank();
        w.line(format!(
            "/// Widget values of `{}.{}`",
            m.service.name, m.method.name
        ));
        w.line("#[derive(Debug, Clone, Default, Serialize, Deserialize)]");
        w.line("#[serde(default)]");
        w.open(format!("pub struct {} {{", m.inputs_type()));
        for field in &m.widgets {
            if is_secret(field) {
                w.line("#[serde(skip)]");
            }
            let ty = match field.kind {
                FieldKind::Bool => "bool",
                kind if kind.is_numeric() && !is_wide(kind) => "f64",
                _ => "String",
            };
            w.line(format!("pub {}: {},", field_ident(&field.name), ty));
        }
        w.close("}");
    }

    w.blank();
    w.line("/// Everything the surface persists between runs");
    w.line("#[derive(Debug, Serialize, Deserialize)]");
    w.line("#[serde(default)]");
    w.open("pub struct Forms {");
    w.line("pub device_id: String,");
    for m in methods {
        w.line(format!("pub {}: MethodPanel<{}>,", m.slot, m.panel_inputs()));
    }
    w.close("}");
    w.blank();
    w.open("impl Default for Forms {");
    w.open("fn default() -> Self {");
    w.open("Self {");
    w.line("device_id: DEFAULT_DEVICE_ID.to_string(),");
    for m in methods {
        w.line(format!("{}: MethodPanel::default(),", m.slot));
    }
    w.close("}");
    w.close("}");
    w.close("}");
}

fn write_app_struct(w: &mut CodeWriter, ctx: &EmitContext<'_>) {
    w.blank();
    w.line(format!("/// Control surface for `{}`.", ctx.file.name));
    w.line("///");
    w.line("/// Calls run on a background thread; the frame only reads their results.");
    w.open("pub struct ControlApp<S: Query + Subscriber + 'static> {");
    w.line("session: Arc<S>,");
    w.line("rpc: Transport<S>,");
    for service in &ctx.file.services {
        w.line(format!(
            "{}: Arc<client::{}<Transport<S>>>,",
            service_slot(service),
            client_type(service)
        ));
    }
    w.line("forms: Forms,");
    w.line("log: Arc<Mutex<VecDeque<String>>>,");
    w.line("log_subscriber: Option<LogSubscriber<Arc<S>>>,");
    if !ctx.telemetry_topics().is_empty() {
        w.line("telemetry: Option<client::TelemetrySubscriber<Arc<S>>>,");
    }
    w.close("}");
}

fn write_app_impl(
    w: &mut CodeWriter,
    ctx: &EmitContext<'_>,
    methods: &[MethodUi<'_>],
    topics: &[TelemetryTopic<'_>],
) {
    w.blank();
    w.open("impl<S: Query + Subscriber + 'static> ControlApp<S> {");

    // constructor
    w.line("/// Creates the surface, restoring persisted forms from `storage`");
    w.open("pub fn new(session: Arc<S>, storage: Option<&dyn eframe::Storage>) -> Self {");
    w.open("let forms: Forms = storage");
    w.line(".and_then(|storage| eframe::get_value(storage, STORAGE_KEY))");
    w.line(".unwrap_or_default();");
    w.dedent();
    w.line("let rpc = Arc::new(RpcClient::new(Arc::clone(&session), forms.device_id.clone()));");
    w.open("let mut app = Self {");
    for service in &ctx.file.services {
        w.line(format!(
            "{}: Arc::new(client::{}::new(Arc::clone(&rpc))),",
            service_slot(service),
            client_type(service)
        ));
    }
    w.line("session,");
    w.line("rpc,");
    w.line("forms,");
    w.line("log: Arc::new(Mutex::new(VecDeque::new())),");
    w.line("log_subscriber: None,");
    if !topics.is_empty() {
        w.line("telemetry: None,");
    }
    w.close("};");
    w.line("app.update_subscriptions();");
    w.line("app");
    w.close("}");

    // subscriptions
    w.blank();
    w.line("/// Re-targets calls and re-subscribes to the current device id");
    w.open("pub fn update_subscriptions(&mut self) {");
    w.open("if let Some(mut log_subscriber) = self.log_subscriber.take() {");
    w.line("log_subscriber.unsubscribe();");
    w.close("}");
    if !topics.is_empty() {
        w.open("if let Some(telemetry) = self.telemetry.take() {");
        w.line("telemetry.unsubscribe_all();");
        w.close("}");
    }
    w.line("lock(&self.log).clear();");
    w.blank();
    w.line("let device_id = self.forms.device_id.clone();");
    w.line("self.rpc.set_device_id(device_id.clone());");
    w.line("push_log(&self.log, format!(\"--- Subscribing to {} ---\", device_id));");
    w.blank();
    w.line("let mut log_subscriber = LogSubscriber::new(Arc::clone(&self.session), device_id.clone());");
    w.line("let sink = Arc::clone(&self.log);");
    w.open("if let Err(e) = log_subscriber.subscribe(move |line| push_log(&sink, format!(\"[LOG] {}\", line))) {");
    w.line("push_log(&self.log, format!(\"[ERR] {}\", e));");
    w.close("}");
    w.line("self.log_subscriber = Some(log_subscriber);");

    if !topics.is_empty() {
        w.blank();
        w.line("let telemetry = client::TelemetrySubscriber::new(Arc::clone(&self.session), device_id);");
        for topic in topics {
            w.line("let sink = Arc::clone(&self.log);");
            w.open(format!(
                "let subscribed = telemetry.{}(move |data| {{",
                topic.subscribe_fn()
            ));
            w.line(format!(
                "push_log(&sink, format!(\"[TEL] {}:\\n{{:#?}}\", data));",
                escape_str(&topic.message.name)
            ));
            w.close("});");
            w.open("if let Err(e) = subscribed {");
            w.line("push_log(&self.log, format!(\"[ERR] {}\", e));");
            w.close("}");
        }
        w.line("self.telemetry = Some(telemetry);");
    }
    w.close("}");

    // layout
    w.blank();
    w.open("fn device_row(&mut self, ui: &mut egui::Ui) {");
    w.line("let mut set = false;");
    w.open("ui.group(|ui| {");
    w.open("ui.horizontal(|ui| {");
    w.line("ui.label(\"Device ID\");");
    w.line("ui.text_edit_singleline(&mut self.forms.device_id);");
    w.line("set = ui.button(\"Set\").clicked();");
    w.close("});");
    w.close("});");
    w.open("if set {");
    w.line("self.update_subscriptions();");
    w.close("}");
    w.close("}");

    for service in &ctx.file.services {
        w.blank();
        w.open(format!(
            "fn {}_card(&mut self, ui: &mut egui::Ui) {{",
            service_slot(service)
        ));
        w.open("ui.group(|ui| {");
        w.line(format!("ui.heading(\"{}\");", escape_str(&service.name)));
        for m in methods.iter().filter(|m| m.service.name == service.name) {
            w.line(format!("self.{}_panel(ui);", m.slot));
        }
        w.close("});");
        w.close("}");
    }

    for m in methods {
        w.blank();
        write_panel(w, m);
        w.blank();
        write_execute(w, m);
    }

    w.blank();
    w.open("fn logs_panel(&mut self, ui: &mut egui::Ui) {");
    w.open("ui.horizontal(|ui| {");
    w.line("ui.heading(\"Logs & Telemetry\");");
    w.open("if ui.button(\"Clear\").clicked() {");
    w.line("lock(&self.log).clear();");
    w.close("}");
    w.close("});");
    w.line("ui.separator();");
    w.open("egui::ScrollArea::vertical().stick_to_bottom(true).show(ui, |ui| {");
    w.open("for line in lock(&self.log).iter() {");
    w.line("ui.monospace(line);");
    w.close("}");
    w.close("});");
    w.close("}");

    w.close("}");
}

fn write_panel(w: &mut CodeWriter, m: &MethodUi<'_>) {
    w.open(format!("fn {}_panel(&mut self, ui: &mut egui::Ui) {{", m.slot));
    w.line(format!("let panel = &mut self.forms.{};", m.slot));
    w.open(format!(
        "let shown = egui::CollapsingHeader::new(\"{}\")",
        escape_str(&m.method.name)
    ));
    w.line(format!(
        ".id_salt(\"{}.{}\")",
        escape_str(&m.service.name),
        escape_str(&m.method.name)
    ));
    w.line(".open(Some(panel.expanded))");
    w.open(".show(ui, |ui| {");
    for field in &m.widgets {
        let ident = field_ident(&field.name);
        let label = escape_str(&field_label(&field.name));
        match field.kind {
            FieldKind::Bool => {
                w.line(format!("ui.checkbox(&mut panel.inputs.{}, \"{}\");", ident, label));
            }
            kind => {
                w.open("ui.horizontal(|ui| {");
                w.line(format!("ui.label(\"{}\");", label));
                if is_wide(kind) {
                    w.line(format!(
                        "ui.add(egui::TextEdit::singleline(&mut panel.inputs.{}).hint_text(\"0\"));",
                        ident
                    ));
                } else if kind.is_numeric() {
                    let decimals = if matches!(kind, FieldKind::Double | FieldKind::Float) {
                        2
                    } else {
                        0
                    };
                    w.line(format!(
                        "ui.add(egui::DragValue::new(&mut panel.inputs.{}).fixed_decimals({}));",
                        ident, decimals
                    ));
                } else if is_secret(field) {
                    w.line(format!(
                        "ui.add(egui::TextEdit::singleline(&mut panel.inputs.{}).password(true));",
                        ident
                    ));
                } else if kind == FieldKind::Bytes {
                    w.line(format!(
                        "ui.add(egui::TextEdit::singleline(&mut panel.inputs.{}).hint_text(\"0x00ff or text\"));",
                        ident
                    ));
                } else {
                    w.line(format!("ui.text_edit_singleline(&mut panel.inputs.{});", ident));
                }
                w.close("});");
            }
        }
    }
    w.line("let execute = ui.button(\"Execute\").clicked();");
    w.line("let result = lock(&panel.result).clone();");
    w.open("if !result.is_empty() {");
    w.line("ui.label(result);");
    w.close("}");
    w.line("execute");
    w.close("});");
    w.dedent();
    w.open("if shown.header_response.clicked() {");
    w.line("panel.expanded = !panel.expanded;");
    w.close("}");
    w.open("if shown.body_returned == Some(true) {");
    w.line(format!("self.execute_{}(ui.ctx());", m.slot));
    w.close("}");
    w.close("}");
}

fn write_execute(w: &mut CodeWriter, m: &MethodUi<'_>) {
    let call = method_ident(&m.method.name);
    let client = service_slot(m.service);

    w.open(format!(
        "fn execute_{}(&mut self, ctx: &egui::Context) {{",
        m.slot
    ));
    w.line(format!("let result = Arc::clone(&self.forms.{}.result);", m.slot));

    if let Some(params) = &m.params {
        if m.widgets.is_empty() {
            w.line(format!("let params = client::{}::default();", params));
        } else {
            w.line(format!("let inputs = &self.forms.{}.inputs;", m.slot));
            w.line(format!("let mut params = client::{}::default();", params));
            for field in &m.widgets {
                let ident = field_ident(&field.name);
                let name = escape_str(&field.name);
                match field.kind {
                    FieldKind::Bool => {
                        w.line(format!("params.{} = Some(inputs.{});", ident, ident));
                    }
                    FieldKind::String => {
                        w.line(format!("params.{} = Some(inputs.{}.clone());", ident, ident));
                    }
                    kind => {
                        let convert = match kind.rust_scalar() {
                            Some(scalar) if is_wide(kind) => format!(
                                "input::integer::<{}>(\"{}\", &inputs.{})",
                                scalar, name, ident
                            ),
                            Some(scalar) if kind.is_numeric() => format!(
                                "input::number::<{}>(\"{}\", inputs.{})",
                                scalar, name, ident
                            ),
                            _ => format!("input::bytes(\"{}\", &inputs.{})", name, ident),
                        };
                        w.open(format!("match {} {{", convert));
                        w.line(format!("Ok(value) => params.{} = Some(value),", ident));
                        w.open("Err(e) => {");
                        w.line("set_result(&result, format!(\"❌ {}\", e));");
                        w.line("return;");
                        w.close("}");
                        w.close("}");
                    }
                }
            }
        }
    }

    w.line("set_result(&result, \"⏳ Calling RPC...\");");
    w.line(format!("let client = Arc::clone(&self.{});", client));
    w.line("let ctx = ctx.clone();");
    w.open("thread::spawn(move || {");
    let args = if m.params.is_some() { "None, params" } else { "None" };
    if m.method.is_fire_and_forget() {
        w.line(format!("let response = client.{}({});", call, args));
        w.line("set_result(&result, render_result::<()>(&response, None));");
    } else {
        w.line(format!("let (response, payload) = client.{}({});", call, args));
        w.line("set_result(&result, render_result(&response, payload));");
    }
    w.line("ctx.request_repaint();");
    w.close("});");
    w.close("}");
}

fn write_eframe_impl(w: &mut CodeWriter, ctx: &EmitContext<'_>) {
    w.blank();
    w.open("impl<S: Query + Subscriber + 'static> eframe::App for ControlApp<S> {");
    w.open("fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {");
    w.open("egui::SidePanel::right(\"logs\").default_width(400.0).show(ctx, |ui| {");
    w.line("self.logs_panel(ui);");
    w.close("});");
    w.open("egui::CentralPanel::default().show(ctx, |ui| {");
    w.open("egui::ScrollArea::vertical().show(ui, |ui| {");
    w.line("self.device_row(ui);");
    for service in &ctx.file.services {
        w.line(format!("self.{}_card(ui);", service_slot(service)));
    }
    w.close("});");
    w.close("});");
    w.line("// Log and telemetry lines arrive on transport threads");
    w.line("ctx.request_repaint_after(Duration::from_millis(250));");
    w.close("}");
    w.blank();
    w.open("fn save(&mut self, storage: &mut dyn eframe::Storage) {");
    w.line("eframe::set_value(storage, STORAGE_KEY, &self.forms);");
    w.close("}");
    w.close("}");
}

fn write_helpers(w: &mut CodeWriter) {
    w.blank();
    w.open("fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {");
    w.line("mutex.lock().unwrap_or_else(PoisonError::into_inner)");
    w.close("}");
    w.blank();
    w.open("fn set_result(result: &Mutex<String>, text: impl Into<String>) {");
    w.line("*lock(result) = text.into();");
    w.close("}");
    w.blank();
    w.open("fn render_result<P: Debug>(response: &RpcResponse, payload: Option<P>) -> String {");
    w.open("if !response.success {");
    w.line("let error = response.error.as_deref().unwrap_or(\"unknown error\");");
    w.line("return format!(\"❌ Error\\n\\n{}\", error);");
    w.close("}");
    w.open("match payload {");
    w.line("Some(payload) => format!(\"✅ Success\\n\\n{:#?}\", payload),");
    w.line("None => \"✅ Success\".to_string(),");
    w.close("}");
    w.close("}");
    w.blank();
    w.open("fn push_log(log: &Mutex<VecDeque<String>>, line: String) {");
    w.line("let mut log = lock(log);");
    w.open("if log.len() == MAX_LOG_LINES {");
    w.line("log.pop_front();");
    w.close("}");
    w.line("log.push_back(format!(\"[{}] {}\", timestamp(), line));");
    w.close("}");
    w.blank();
    w.line("/// `HH:MM:SS.mmm`, local time");
    w.open("fn timestamp() -> String {");
    w.line("chrono::Local::now().format(\"%H:%M:%S%.3f\").to_string()");
    w.close("}");
}
