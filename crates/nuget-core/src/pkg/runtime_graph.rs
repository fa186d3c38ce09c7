//! Runtime graphs from a package's `runtime.json`.
//!
//! ```json
//! {
//!   "runtimes": {
//!     "win-x64": { "#import": ["win"], "Pkg": { "runtime.win-x64.Pkg": "1.0.0" } }
//!   },
//!   "supports": {
//!     "net8.0.app": { "net8.0": ["win-x64", "linux-x64"] }
//!   }
//! }
//! ```

use super::error::PkgError;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;

/// File name of the runtime graph inside a package folder.
pub const RUNTIME_GRAPH_FILE_NAME: &str = "runtime.json";

const IMPORT_KEY: &str = "#import";

/// One runtime identifier and what it inherits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeDescription {
    pub runtime_identifier: String,
    /// RIDs this runtime imports, in declaration order.
    pub inherited_runtimes: Vec<String>,
    /// Package id -> (runtime package id -> version range).
    pub dependency_sets: BTreeMap<String, BTreeMap<String, String>>,
}

/// A named set of `(framework, rid)` restore contexts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompatibilityProfile {
    pub name: String,
    pub restore_contexts: Vec<(String, String)>,
}

/// Parsed `runtime.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeGraph {
    pub runtimes: BTreeMap<String, RuntimeDescription>,
    pub supports: BTreeMap<String, CompatibilityProfile>,
}

impl RuntimeGraph {
    /// Read `runtime.json`.
    ///
    /// # Errors
    /// Returns `PKG_RUNTIME_GRAPH_INVALID` if the file cannot be read or has
    /// the wrong shape.
    pub fn read(path: &Path) -> Result<Self, PkgError> {
        let content = nuget_util::fs::read_to_string_lossy(path)
            .map_err(|e| PkgError::runtime_graph_invalid(path, e))?;
        Self::parse(&content, path)
    }

    /// Parse runtime graph JSON. `path` is only used in error messages.
    ///
    /// # Errors
    /// Returns `PKG_RUNTIME_GRAPH_INVALID` on malformed input.
    pub fn parse(content: &str, path: &Path) -> Result<Self, PkgError> {
        let root: Value = serde_json::from_str(content)
            .map_err(|e| PkgError::runtime_graph_invalid(path, e))?;
        let invalid = |detail: &str| PkgError::runtime_graph_invalid(path, detail);

        let mut graph = Self::default();

        if let Some(runtimes) = root.get("runtimes") {
            let runtimes = runtimes
                .as_object()
                .ok_or_else(|| invalid("'runtimes' must be an object"))?;
            for (rid, body) in runtimes {
                let body = body
                    .as_object()
                    .ok_or_else(|| invalid("runtime entries must be objects"))?;
                let mut description = RuntimeDescription {
                    runtime_identifier: rid.clone(),
                    ..Default::default()
                };
                for (key, value) in body {
                    if key == IMPORT_KEY {
                        description.inherited_runtimes = string_array(value)
                            .ok_or_else(|| invalid("'#import' must be an array of strings"))?;
                    } else {
                        let deps = value
                            .as_object()
                            .ok_or_else(|| invalid("runtime dependency sets must be objects"))?;
                        let mut set = BTreeMap::new();
                        for (dep_id, range) in deps {
                            let range = range
                                .as_str()
                                .ok_or_else(|| invalid("runtime dependency versions must be strings"))?;
                            set.insert(dep_id.clone(), range.to_string());
                        }
                        description.dependency_sets.insert(key.clone(), set);
                    }
                }
                graph.runtimes.insert(rid.clone(), description);
            }
        }

        if let Some(supports) = root.get("supports") {
            let supports = supports
                .as_object()
                .ok_or_else(|| invalid("'supports' must be an object"))?;
            for (name, body) in supports {
                let body = body
                    .as_object()
                    .ok_or_else(|| invalid("'supports' entries must be objects"))?;
                let mut profile = CompatibilityProfile {
                    name: name.clone(),
                    restore_contexts: Vec::new(),
                };
                for (framework, rids) in body {
                    let rids = match rids {
                        Value::String(rid) => vec![rid.clone()],
                        other => string_array(other)
                            .ok_or_else(|| invalid("'supports' runtimes must be strings"))?,
                    };
                    for rid in rids {
                        profile.restore_contexts.push((framework.clone(), rid));
                    }
                }
                graph.supports.insert(name.clone(), profile);
            }
        }

        Ok(graph)
    }

    /// The runtime followed by everything it imports, breadth first, each
    /// RID once. Unknown RIDs expand to themselves.
    #[must_use]
    pub fn expand_runtime(&self, rid: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([rid.to_string()]);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(description) = self.runtimes.get(&current) {
                queue.extend(description.inherited_runtimes.iter().cloned());
            }
            order.push(current);
        }
        order
    }

    /// True if `compatible` appears in the expansion of `rid`.
    #[must_use]
    pub fn are_compatible(&self, rid: &str, compatible: &str) -> bool {
        self.expand_runtime(rid).iter().any(|r| r == compatible)
    }
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}
