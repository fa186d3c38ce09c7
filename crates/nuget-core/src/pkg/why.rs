//! Package "why" explanation - dependency paths per framework.
//!
//! Frameworks whose graphs have the same shape are printed once under a
//! shared header. Trees are drawn with box-drawing glyphs, siblings in
//! ascending id order:
//!
//! ```text
//! Project 'App' has the following dependency graph(s) for 'B':
//!
//!   [net8.0]
//!   [net472]
//!   │
//!   └─ A (v1.0.0)
//!      ├─ B (v1.0.0)
//!      └─ C (v1.0.0)
//! ```

use super::assets::AssetsFile;
use super::graph::{find_dependency_graphs, DependencyGraph, FrameworkGraph, NodeId};
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;

/// Schema version for the why output format.
pub const PKG_WHY_SCHEMA_VERSION: u32 = 1;

const CHILD_NODE: &str = "├─ ";
const LAST_CHILD_NODE: &str = "└─ ";
const CHILD_PREFIX: &str = "│  ";
const LAST_CHILD_PREFIX: &str = "   ";
const INDENT: &str = "  ";

/// Error codes for why operations.
pub mod why_codes {
    pub const PKG_WHY_ARGS_INVALID: &str = "PKG_WHY_ARGS_INVALID";
    pub const PKG_WHY_PATH_INVALID: &str = "PKG_WHY_PATH_INVALID";
    pub const PKG_WHY_PROJECT_UNREADABLE: &str = "PKG_WHY_PROJECT_UNREADABLE";
    pub const PKG_WHY_NOT_SDK_PROJECT: &str = "PKG_WHY_NOT_SDK_PROJECT";
    pub const PKG_WHY_NOT_PACKAGE_REFERENCE: &str = "PKG_WHY_NOT_PACKAGE_REFERENCE";
    pub const PKG_WHY_ASSETS_NOT_FOUND: &str = "PKG_WHY_ASSETS_NOT_FOUND";
    pub const PKG_WHY_ASSETS_INVALID: &str = "PKG_WHY_ASSETS_INVALID";
}

/// Error for why operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhyError {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl WhyError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// True for errors caused by bad command-line input rather than by
    /// the projects being inspected.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self.code,
            why_codes::PKG_WHY_ARGS_INVALID | why_codes::PKG_WHY_PATH_INVALID
        )
    }
}

impl fmt::Display for WhyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for WhyError {}

/// Frameworks sharing one graph; `graph` is `None` for the group of
/// frameworks that do not contain the package.
#[derive(Debug, Clone)]
pub struct FrameworkGroup {
    pub frameworks: Vec<String>,
    pub graph: Option<DependencyGraph>,
}

/// Group frameworks whose graphs have the same shape.
///
/// Groups keep the order in which their first framework appears. Candidates
/// with equal structural hashes are compared in full before merging. All
/// frameworks without a graph form one final group.
#[must_use]
pub fn deduplicated_frameworks(graphs: &[FrameworkGraph]) -> Vec<FrameworkGroup> {
    let mut groups: Vec<([u8; 32], FrameworkGroup)> = Vec::new();
    let mut without_graph: Vec<String> = Vec::new();

    for entry in graphs {
        let Some(graph) = &entry.graph else {
            without_graph.push(entry.framework.clone());
            continue;
        };

        let hash = graph.structural_hash();
        let existing = groups.iter_mut().find(|(h, group)| {
            *h == hash
                && group
                    .graph
                    .as_ref()
                    .is_some_and(|g| g.structurally_equal(graph))
        });
        match existing {
            Some((_, group)) => group.frameworks.push(entry.framework.clone()),
            None => groups.push((
                hash,
                FrameworkGroup {
                    frameworks: vec![entry.framework.clone()],
                    graph: Some(graph.clone()),
                },
            )),
        }
    }

    let mut result: Vec<FrameworkGroup> = groups.into_iter().map(|(_, g)| g).collect();
    if !without_graph.is_empty() {
        result.push(FrameworkGroup {
            frameworks: without_graph,
            graph: None,
        });
    }
    result
}

/// One rendered tree line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeLine {
    /// Box-drawing prefix including the branch glyph.
    pub prefix: String,
    pub id: String,
    pub version: String,
    /// The queried package.
    pub is_target: bool,
}

impl TreeLine {
    /// `"<id> (v<version>)"` without the prefix.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} (v{})", self.id, self.version)
    }
}

impl fmt::Display for TreeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} (v{})", self.prefix, self.id, self.version)
    }
}

/// Draw a graph as a tree.
///
/// Uses an explicit stack rather than recursion. Siblings are pushed in
/// descending id order so they pop, and print, in ascending order. A node
/// that already appears on the current path is not expanded again.
#[must_use]
pub fn render_graph(graph: &DependencyGraph, target_package: &str) -> Vec<TreeLine> {
    struct Frame {
        node: NodeId,
        prefix: String,
        is_last: bool,
        depth: usize,
    }

    let mut lines = Vec::new();
    let mut stack: Vec<Frame> = sorted_descending(graph, graph.roots())
        .into_iter()
        .enumerate()
        .map(|(i, node)| Frame {
            node,
            prefix: String::new(),
            is_last: i == 0,
            depth: 0,
        })
        .collect();
    let mut path: Vec<NodeId> = Vec::new();

    while let Some(frame) = stack.pop() {
        path.truncate(frame.depth);
        path.push(frame.node);

        let node = graph.node(frame.node);
        let glyph = if frame.is_last { LAST_CHILD_NODE } else { CHILD_NODE };
        lines.push(TreeLine {
            prefix: format!("{}{glyph}", frame.prefix),
            id: node.id.clone(),
            version: node.version.clone(),
            is_target: node.id.eq_ignore_ascii_case(target_package),
        });

        let child_prefix = format!(
            "{}{}",
            frame.prefix,
            if frame.is_last { LAST_CHILD_PREFIX } else { CHILD_PREFIX }
        );
        let children: Vec<NodeId> = node
            .children
            .iter()
            .copied()
            .filter(|c| !path.contains(c))
            .collect();
        for (i, child) in sorted_descending(graph, &children).into_iter().enumerate() {
            stack.push(Frame {
                node: child,
                prefix: child_prefix.clone(),
                is_last: i == 0,
                depth: frame.depth + 1,
            });
        }
    }
    lines
}

fn sorted_descending(graph: &DependencyGraph, nodes: &[NodeId]) -> Vec<NodeId> {
    let mut sorted = nodes.to_vec();
    sorted.sort_by(|&a, &b| {
        let a = &graph.node(a).id;
        let b = &graph.node(b).id;
        b.to_ascii_lowercase()
            .cmp(&a.to_ascii_lowercase())
            .then_with(|| b.cmp(a))
    });
    sorted
}

/// Rendered frameworks sharing one tree; `lines` is empty when the package
/// is not in these frameworks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhyGroup {
    pub frameworks: Vec<String>,
    pub lines: Vec<TreeLine>,
}

/// Why result for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectWhyResult {
    pub schema_version: u32,
    pub project: String,
    pub package: String,
    /// Empty when no framework depends on the package.
    pub groups: Vec<WhyGroup>,
}

impl ProjectWhyResult {
    /// True if at least one framework depends on the package.
    #[must_use]
    pub fn has_dependency(&self) -> bool {
        !self.groups.is_empty()
    }

    /// First line of the human-readable report.
    #[must_use]
    pub fn header(&self) -> String {
        if self.has_dependency() {
            format!(
                "Project '{}' has the following dependency graph(s) for '{}':",
                self.project, self.package
            )
        } else {
            format!(
                "Project '{}' does not have any dependency graph(s) for '{}'",
                self.project, self.package
            )
        }
    }

    /// The human-readable report. `node` formats each tree node label,
    /// letting callers highlight the queried package.
    pub fn format_with(&self, node: impl Fn(&TreeLine) -> String) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.header());
        if !self.has_dependency() {
            return out;
        }
        out.push('\n');

        for group in &self.groups {
            for framework in &group.frameworks {
                let _ = writeln!(out, "{INDENT}[{framework}]");
            }
            let _ = writeln!(out, "{INDENT}{}", CHILD_PREFIX.trim_end());
            if group.lines.is_empty() {
                let _ = writeln!(out, "{INDENT}{LAST_CHILD_NODE}No dependency graph(s) found");
            } else {
                for line in &group.lines {
                    let _ = writeln!(out, "{INDENT}{}{}", line.prefix, node(line));
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Build the why result for one project from its assets file.
#[must_use]
pub fn why_for_project(
    project: &str,
    assets: &AssetsFile,
    package: &str,
    frameworks: &[String],
) -> ProjectWhyResult {
    let groups = match find_dependency_graphs(assets, package, frameworks) {
        Some(graphs) => deduplicated_frameworks(&graphs)
            .into_iter()
            .map(|group| WhyGroup {
                lines: group
                    .graph
                    .as_ref()
                    .map(|g| render_graph(g, package))
                    .unwrap_or_default(),
                frameworks: group.frameworks,
            })
            .collect(),
        None => Vec::new(),
    };

    ProjectWhyResult {
        schema_version: PKG_WHY_SCHEMA_VERSION,
        project: project.to_string(),
        package: package.to_string(),
        groups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leafy(root: &str, children: &[&str]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        let r = graph.add_node(root, "1.0.0");
        for child in children {
            let c = graph.add_node(*child, "1.0.0");
            graph.add_child(r, c);
        }
        graph.add_root(r);
        graph
    }

    fn text(lines: &[TreeLine]) -> Vec<String> {
        lines.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_error_codes_are_uppercase() {
        let all_codes = [
            why_codes::PKG_WHY_ARGS_INVALID,
            why_codes::PKG_WHY_PATH_INVALID,
            why_codes::PKG_WHY_PROJECT_UNREADABLE,
            why_codes::PKG_WHY_NOT_SDK_PROJECT,
            why_codes::PKG_WHY_NOT_PACKAGE_REFERENCE,
            why_codes::PKG_WHY_ASSETS_NOT_FOUND,
            why_codes::PKG_WHY_ASSETS_INVALID,
        ];

        for code in all_codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Error code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }

    #[test]
    fn test_render_children_ascending_with_last_glyph() {
        let graph = leafy("A", &["C", "B"]);
        let lines = render_graph(&graph, "B");

        assert_eq!(
            text(&lines),
            ["└─ A (v1.0.0)", "   ├─ B (v1.0.0)", "   └─ C (v1.0.0)"]
        );
        let targets: Vec<&str> = lines
            .iter()
            .filter(|l| l.is_target)
            .map(|l| l.id.as_str())
            .collect();
        assert_eq!(targets, ["B"]);
    }

    #[test]
    fn test_render_nested_prefixes() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node("A", "1.0.0");
        let b = graph.add_node("B", "2.0.0");
        let c = graph.add_node("C", "3.0.0");
        let t = graph.add_node("T", "4.0.0");
        let z = graph.add_node("Z", "5.0.0");
        graph.add_child(a, b);
        graph.add_child(a, c);
        graph.add_child(b, t);
        graph.add_child(c, t);
        graph.add_child(z, t);
        graph.add_root(z);
        graph.add_root(a);

        assert_eq!(
            text(&render_graph(&graph, "t")),
            [
                "├─ A (v1.0.0)",
                "│  ├─ B (v2.0.0)",
                "│  │  └─ T (v4.0.0)",
                "│  └─ C (v3.0.0)",
                "│     └─ T (v4.0.0)",
                "└─ Z (v5.0.0)",
                "   └─ T (v4.0.0)",
            ]
        );
    }

    #[test]
    fn test_every_occurrence_of_target_is_flagged() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node("A", "1.0.0");
        let t = graph.add_node("Target", "1.0.0");
        graph.add_child(a, t);
        graph.add_root(a);
        graph.add_root(t);

        let flagged = render_graph(&graph, "TARGET")
            .iter()
            .filter(|l| l.is_target)
            .count();
        assert_eq!(flagged, 2);
    }

    #[test]
    fn test_render_cycle_is_not_expanded() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node("A", "1.0.0");
        let b = graph.add_node("B", "1.0.0");
        graph.add_child(a, b);
        graph.add_child(b, a);
        graph.add_root(a);

        assert_eq!(
            text(&render_graph(&graph, "B")),
            ["└─ A (v1.0.0)", "   └─ B (v1.0.0)"]
        );
    }

    #[test]
    fn test_deduplicated_frameworks() {
        let graphs = vec![
            FrameworkGraph {
                framework: "net8.0".to_string(),
                graph: Some(leafy("A", &["B", "C"])),
            },
            FrameworkGraph {
                framework: "netstandard2.0".to_string(),
                graph: None,
            },
            FrameworkGraph {
                framework: "net472".to_string(),
                graph: Some(leafy("A", &["C", "B"])),
            },
            FrameworkGraph {
                framework: "net6.0".to_string(),
                graph: Some(leafy("A", &["B"])),
            },
        ];

        let groups = deduplicated_frameworks(&graphs);
        let frameworks: Vec<Vec<String>> = groups.iter().map(|g| g.frameworks.clone()).collect();
        assert_eq!(
            frameworks,
            vec![
                vec!["net8.0".to_string(), "net472".to_string()],
                vec!["net6.0".to_string()],
                vec!["netstandard2.0".to_string()],
            ]
        );
        assert!(groups[2].graph.is_none());
    }

    #[test]
    fn test_report_text() {
        let result = ProjectWhyResult {
            schema_version: PKG_WHY_SCHEMA_VERSION,
            project: "App".to_string(),
            package: "B".to_string(),
            groups: vec![
                WhyGroup {
                    frameworks: vec!["net8.0".to_string(), "net472".to_string()],
                    lines: render_graph(&leafy("A", &["B"]), "B"),
                },
                WhyGroup {
                    frameworks: vec!["netstandard2.0".to_string()],
                    lines: Vec::new(),
                },
            ],
        };

        let expected = "\
Project 'App' has the following dependency graph(s) for 'B':

  [net8.0]
  [net472]
  │
  └─ A (v1.0.0)
     └─ B (v1.0.0)

  [netstandard2.0]
  │
  └─ No dependency graph(s) found

";
        assert_eq!(result.format_with(TreeLine::label), expected);
    }

    #[test]
    fn test_report_without_dependency() {
        let result = ProjectWhyResult {
            schema_version: PKG_WHY_SCHEMA_VERSION,
            project: "App".to_string(),
            package: "Nope".to_string(),
            groups: Vec::new(),
        };
        assert_eq!(
            result.format_with(TreeLine::label),
            "Project 'App' does not have any dependency graph(s) for 'Nope'\n"
        );
    }

    #[test]
    fn test_why_for_project() {
        let assets = AssetsFile::from_json(
            r#"{
              "version": 3,
              "targets": {
                ".NETCoreApp,Version=v8.0": {
                  "A/1.0.0": { "dependencies": { "B": "1.0.0" } },
                  "B/1.0.0": {}
                },
                ".NETFramework,Version=v4.7.2": {
                  "A/1.0.0": { "dependencies": { "B": "1.0.0" } },
                  "B/1.0.0": {}
                }
              },
              "projectFileDependencyGroups": {
                ".NETCoreApp,Version=v8.0": [ "A >= 1.0.0" ],
                ".NETFramework,Version=v4.7.2": [ "A >= 1.0.0" ]
              }
            }"#,
        )
        .unwrap();

        let result = why_for_project("App", &assets, "b", &[]);
        assert!(result.has_dependency());
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].frameworks, ["net8.0", "net472"]);
        assert_eq!(
            text(&result.groups[0].lines),
            ["└─ A (v1.0.0)", "   └─ B (v1.0.0)"]
        );

        let missing = why_for_project("App", &assets, "Z", &[]);
        assert!(!missing.has_dependency());
    }
}
