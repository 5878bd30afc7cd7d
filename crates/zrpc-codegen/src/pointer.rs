//! Pointer-field analysis.
//!
//! The embedded target encodes messages with nanopb. Fields marked
//! `type:FT_POINTER` in the nanopb sidecar (`service.options` next to
//! `service.proto`) are heap allocated on decode, so generated handlers must
//! release those messages after use. The sidecar is the only source of that
//! knowledge:
//!
//! ```text
//! # comment
//! practice.rpc.EchoRequestMalloc.msg type:FT_POINTER
//! ```
//!
//! Only the message segment (second to last) of each directive is kept, so
//! lookups are by unqualified name and same-named messages in different
//! packages share one entry.

use crate::descriptor::simple_name;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directive that marks a heap-allocated field
pub const POINTER_DIRECTIVE: &str = "type:FT_POINTER";

/// Extension of the sidecar file that replaces `.proto`
pub const SIDECAR_EXTENSION: &str = ".options";

/// Unqualified names of messages that need an explicit release
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointerRegistry {
    messages: BTreeSet<String>,
}

impl PointerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses sidecar text
    pub fn parse(text: &str) -> Self {
        let messages = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter(|line| line.contains(POINTER_DIRECTIVE))
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let field_path = parts.next()?;
                parts.next()?;
                let mut segments = field_path.rsplit('.');
                segments.next()?;
                segments.next().map(str::to_string)
            })
            .collect();

        Self { messages }
    }

    /// Reads and parses a sidecar file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Ok(Self::parse(&text))
    }

    /// Finds the sidecar for `schema_name`.
    ///
    /// Tried in order: the sibling of an absolute schema path, the schema's
    /// own directory, each search path (with the full relative name, then the
    /// bare file name), and finally the bare file name in the current
    /// directory.
    pub fn locate(schema_name: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
        let sidecar_name = sidecar_name(schema_name);
        let sidecar = Path::new(&sidecar_name);
        let base = sidecar.file_name().map(Path::new).unwrap_or(sidecar);

        let schema = Path::new(schema_name);
        let mut candidates = Vec::new();

        if schema.is_absolute() {
            candidates.push(sidecar.to_path_buf());
        }
        if let Some(dir) = schema.parent().filter(|d| !d.as_os_str().is_empty()) {
            candidates.push(dir.join(base));
        }
        for path in search_paths {
            candidates.push(path.join(sidecar));
            candidates.push(path.join(base));
        }
        candidates.push(base.to_path_buf());

        candidates.into_iter().find(|candidate| {
            let found = candidate.is_file();
            debug!("sidecar candidate {} (found: {})", candidate.display(), found);
            found
        })
    }

    /// Locates and reads the sidecar for `schema_name`.
    ///
    /// Never fails: a missing or unreadable sidecar yields an empty registry
    /// and a warning.
    pub fn load(schema_name: &str, search_paths: &[PathBuf]) -> Self {
        let Some(path) = Self::locate(schema_name, search_paths) else {
            warn!(
                "no {} sidecar found for {}; assuming no pointer fields",
                SIDECAR_EXTENSION, schema_name
            );
            return Self::new();
        };

        match Self::read(&path) {
            Ok(registry) => {
                debug!(
                    "loaded {} pointer-bearing message(s) from {}",
                    registry.len(),
                    path.display()
                );
                registry
            }
            Err(e) => {
                warn!("Could not read {} file: {}", SIDECAR_EXTENSION, e);
                Self::new()
            }
        }
    }

    /// Returns true if the message needs an explicit release.
    ///
    /// Qualified names are reduced to their last segment first.
    pub fn contains(&self, message_name: &str) -> bool {
        self.messages.contains(simple_name(message_name))
    }

    /// Adds a message by unqualified name
    pub fn insert(&mut self, message_name: impl Into<String>) {
        self.messages.insert(message_name.into());
    }

    /// Number of pointer-bearing messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if no message needs a release
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Pointer-bearing message names in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }
}

/// Sidecar file name for a schema file name (`a/b.proto` -> `a/b.options`)
pub fn sidecar_name(schema_name: &str) -> String {
    match schema_name.strip_suffix(".proto") {
        Some(stem) => format!("{}{}", stem, SIDECAR_EXTENSION),
        None => format!("{}{}", schema_name, SIDECAR_EXTENSION),
    }
}
