//! Identifier and literal helpers shared by the emitters.

/// Converts a CamelCase name to snake_case.
///
/// An underscore goes before every capital that starts a lowercase run and
/// between a lowercase letter or digit and a following capital, so acronyms
/// stay together: `HTTPServer` becomes `http_server`, `SetLed` becomes
/// `set_led`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();

    let mut split = Vec::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        let starts_word = c.is_ascii_uppercase()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
        if i > 0 && starts_word {
            split.push('_');
        }
        split.push(c);
    }

    let mut result = String::with_capacity(split.len() + 4);
    for (i, &c) in split.iter().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            let prev = split[i - 1];
            if prev.is_ascii_lowercase() || prev.is_ascii_digit() {
                result.push('_');
            }
        }
        result.extend(c.to_lowercase());
    }
    result
}

/// Converts a CamelCase name to SCREAMING_SNAKE_CASE
pub fn to_screaming_snake_case(name: &str) -> String {
    to_snake_case(name).to_uppercase()
}

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Turns a snake_case name into a usable Rust identifier.
///
/// Keywords get the raw prefix; the few that cannot be raw get a trailing
/// underscore. This matches how `prost` names struct fields.
pub fn rust_ident(name: &str) -> String {
    match name {
        "self" | "super" | "crate" | "Self" => format!("{}_", name),
        _ if KEYWORDS.contains(&name) => format!("r#{}", name),
        _ => name.to_string(),
    }
}

/// Rust identifier for a proto field
pub fn field_ident(field_name: &str) -> String {
    rust_ident(&to_snake_case(field_name))
}

/// Rust identifier for a generated method
pub fn method_ident(method_name: &str) -> String {
    rust_ident(&to_snake_case(method_name))
}

/// Path of a message type inside the `prost` module `pb_module`.
///
/// The package prefix is stripped; enclosing message names become the
/// snake_case modules `prost` nests types in (`.pkg.Outer.Inner` ->
/// `pb::outer::Inner`). Types from other packages are addressed by their
/// simple name.
pub fn rust_type_path(type_name: &str, package: &str, pb_module: &str) -> String {
    let trimmed = type_name.trim_start_matches('.');
    let local = if package.is_empty() {
        trimmed
    } else {
        match trimmed
            .strip_prefix(package)
            .and_then(|rest| rest.strip_prefix('.'))
        {
            Some(rest) => rest,
            None => trimmed.rsplit('.').next().unwrap_or(trimmed),
        }
    };

    let mut segments: Vec<&str> = local.split('.').collect();
    let name = segments.pop().unwrap_or(local);

    let mut path = String::from(pb_module);
    for module in segments {
        path.push_str("::");
        path.push_str(&rust_ident(&to_snake_case(module)));
    }
    path.push_str("::");
    path.push_str(name);
    path
}

/// Human label for a field: underscores become spaces, first letter capitalized
pub fn field_label(field_name: &str) -> String {
    let spaced = field_name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Escape a string for a Rust string literal
pub fn escape_str(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ if c.is_control() => {
                result.push_str(&format!("\\u{{{:x}}}", c as u32));
            }
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("SetLed"), "set_led");
        assert_eq!(to_snake_case("StartSensorStream"), "start_sensor_stream");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("Sensor"), "sensor");
        assert_eq!(to_snake_case("Env2Sensor"), "env2_sensor");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case(""), "");
    }

    #[test]
    fn test_screaming_snake_case() {
        assert_eq!(to_screaming_snake_case("SensorTelemetry"), "SENSOR_TELEMETRY");
    }

    #[test]
    fn test_rust_ident_escapes_keywords() {
        assert_eq!(rust_ident("type"), "r#type");
        assert_eq!(rust_ident("self"), "self_");
        assert_eq!(rust_ident("value"), "value");
        assert_eq!(field_ident("ledOn"), "led_on");
        assert_eq!(method_ident("Move"), "r#move");
    }

    #[test]
    fn test_rust_type_path() {
        assert_eq!(
            rust_type_path(".practice.rpc.LedRequest", "practice.rpc", "super::pb"),
            "super::pb::LedRequest"
        );
        assert_eq!(
            rust_type_path(".practice.rpc.Outer.InnerThing", "practice.rpc", "pb"),
            "pb::outer::InnerThing"
        );
        assert_eq!(rust_type_path(".Bare", "", "pb"), "pb::Bare");
        assert_eq!(
            rust_type_path(".google.protobuf.Empty", "practice.rpc", "pb"),
            "pb::Empty"
        );
    }

    #[test]
    fn test_field_label() {
        assert_eq!(field_label("wifi_password"), "Wifi password");
        assert_eq!(field_label("LED_on"), "Led on");
        assert_eq!(field_label(""), "");
    }

    #[test]
    fn test_escape_str() {
        assert_eq!(escape_str("/telemetry/env"), "/telemetry/env");
        assert_eq!(escape_str("a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(escape_str("line\nbreak"), "line\\nbreak");
        assert_eq!(escape_str("\u{1}"), "\\u{1}");
    }
}
