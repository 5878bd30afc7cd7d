//! Generator configuration.
//!
//! Built with chained setters, or parsed from the protoc plugin parameter:
//!
//! ```text
//! --zrpc_opt=target=client,target=ui,pb_module=crate::pb,-I./protos
//! ```

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// A generated binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    /// Client calls and telemetry subscriber
    Client,
    /// Handler traits and dispatchers
    Server,
    /// Interactive control surface
    Ui,
}

impl Target {
    /// Every target, in emission order
    pub const ALL: [Target; 3] = [Target::Client, Target::Server, Target::Ui];

    /// Parameter spelling of the target
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Client => "client",
            Target::Server => "server",
            Target::Ui => "ui",
        }
    }

    /// Suffix of the generated unit (`<stem>_<suffix>.rs`)
    pub fn unit_suffix(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "client" => Ok(Target::Client),
            "server" => Ok(Target::Server),
            "ui" => Ok(Target::Ui),
            _ => Err(Error::invalid_parameter(
                s,
                "expected one of client, server, ui, all",
            )),
        }
    }
}

/// Parses a target list entry, expanding `all`
pub fn parse_targets(s: &str) -> Result<Vec<Target>> {
    if s == "all" {
        Ok(Target::ALL.to_vec())
    } else {
        Ok(vec![s.parse()?])
    }
}

/// Configuration for one generation run
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Targets to emit
    pub targets: BTreeSet<Target>,
    /// Directories searched for `.options` sidecars
    pub include_paths: Vec<PathBuf>,
    /// Rust path of the `prost`-generated module, relative to the generated unit
    pub pb_module: String,
    /// Crate name of the runtime used by generated code
    pub runtime_crate: String,
    /// Device id the UI starts with
    pub default_device_id: String,
    /// Indentation string (default: 4 spaces)
    pub indent_str: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            targets: Target::ALL.into_iter().collect(),
            include_paths: Vec::new(),
            pb_module: "super::pb".to_string(),
            runtime_crate: "zrpc_runtime".to_string(),
            default_device_id: "pico2w-001".to_string(),
            indent_str: "    ".to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the target set
    pub fn targets(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    /// Adds a sidecar search path
    pub fn include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    /// Sets the `prost` module path
    pub fn pb_module(mut self, path: impl Into<String>) -> Self {
        self.pb_module = path.into();
        self
    }

    /// Sets the runtime crate name
    pub fn runtime_crate(mut self, name: impl Into<String>) -> Self {
        self.runtime_crate = name.into();
        self
    }

    /// Sets the UI's initial device id
    pub fn default_device_id(mut self, id: impl Into<String>) -> Self {
        self.default_device_id = id.into();
        self
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }

    /// Returns true if `target` is selected
    pub fn emits(&self, target: Target) -> bool {
        self.targets.contains(&target)
    }

    /// Sidecar search paths: the include paths, then the current directory
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.include_paths.clone();
        paths.push(PathBuf::from("."));
        paths
    }

    /// Parses a plugin parameter string.
    ///
    /// Entries are separated by commas or whitespace. `-I` takes its path
    /// attached (`-I/p`, `-I=/p`) or as the next entry (`-I /p`). The first
    /// `target=` replaces the default target set; later ones add to it.
    /// Unknown keys are ignored with a warning.
    pub fn from_parameter(parameter: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut explicit_targets: Option<BTreeSet<Target>> = None;

        let mut tokens = parameter
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty());

        while let Some(token) = tokens.next() {
            if let Some(rest) = token.strip_prefix("-I") {
                let path = match rest.strip_prefix('=').unwrap_or(rest) {
                    "" => tokens
                        .next()
                        .ok_or_else(|| Error::invalid_parameter(token, "missing include path"))?,
                    path => path,
                };
                config.include_paths.push(PathBuf::from(path));
                continue;
            }

            let Some((key, value)) = token.split_once('=') else {
                warn!("ignoring plugin parameter without value: {}", token);
                continue;
            };
            if value.is_empty() {
                return Err(Error::invalid_parameter(token, "empty value"));
            }

            match key {
                "target" => explicit_targets
                    .get_or_insert_with(BTreeSet::new)
                    .extend(parse_targets(value)?),
                "pb_module" => config.pb_module = value.to_string(),
                "runtime" => config.runtime_crate = value.to_string(),
                "device_id" => config.default_device_id = value.to_string(),
                _ => warn!("ignoring unknown plugin parameter: {}", key),
            }
        }

        if let Some(targets) = explicit_targets {
            config.targets = targets;
        }
        Ok(config)
    }
}
