//! Dependency paths to a package, rebuilt from an assets file.
//!
//! For each framework the finder keeps only the packages that can reach the
//! queried package and links them from the project's top-level references
//! down to it. Each package id gets exactly one node per graph, so a package
//! reached along several paths is shared between its parents.

use super::assets::{AssetsFile, AssetsTarget};
use std::collections::{HashMap, HashSet, VecDeque};

/// Index of a node inside its [`DependencyGraph`].
pub type NodeId = usize;

/// A package in a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    pub id: String,
    pub version: String,
    pub children: Vec<NodeId>,
}

/// Arena of nodes plus the top-level entries.
///
/// Children of a node are unique by case-insensitive id; adding a second
/// child with an id already present is a no-op even if its version differs.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    roots: Vec<NodeId>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node without linking it.
    pub fn add_node(&mut self, id: impl Into<String>, version: impl Into<String>) -> NodeId {
        self.nodes.push(DependencyNode {
            id: id.into(),
            version: version.into(),
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Link `child` under `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        let child_id = self.nodes[child].id.to_ascii_lowercase();
        let duplicate = self.nodes[parent]
            .children
            .iter()
            .any(|&c| self.nodes[c].id.to_ascii_lowercase() == child_id);
        if !duplicate {
            self.nodes[parent].children.push(child);
        }
    }

    /// Mark `node` as a top-level entry.
    pub fn add_root(&mut self, node: NodeId) {
        let id = self.nodes[node].id.to_ascii_lowercase();
        if !self
            .roots
            .iter()
            .any(|&r| self.nodes[r].id.to_ascii_lowercase() == id)
        {
            self.roots.push(node);
        }
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id]
    }

    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Order-insensitive digest of the graph's shape.
    ///
    /// Two graphs with the same ids (case-insensitive), versions and child
    /// sets hash the same regardless of insertion order. A node reached again
    /// while it is still being hashed contributes a marker instead of
    /// recursing, so cyclic input terminates.
    #[must_use]
    pub fn structural_hash(&self) -> [u8; 32] {
        let node_hashes = self.node_hashes();
        let roots = self.roots.iter().map(|&r| node_hashes[r]).collect();
        nuget_util::hash::combine_unordered(b"graph", roots)
    }

    fn node_tag(&self, node: NodeId) -> Vec<u8> {
        let n = &self.nodes[node];
        format!("node\0{}\0{}", n.id.to_ascii_lowercase(), n.version).into_bytes()
    }

    fn node_hashes(&self) -> Vec<[u8; 32]> {
        const UNVISITED: u8 = 0;
        const ON_PATH: u8 = 1;
        const DONE: u8 = 2;

        let mut hashes = vec![[0u8; 32]; self.nodes.len()];
        let mut state = vec![UNVISITED; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if state[start] != UNVISITED {
                continue;
            }
            state[start] = ON_PATH;
            let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];

            while let Some(&mut (node, ref mut next)) = stack.last_mut() {
                let children = &self.nodes[node].children;
                if *next < children.len() {
                    let child = children[*next];
                    *next += 1;
                    if state[child] == UNVISITED {
                        state[child] = ON_PATH;
                        stack.push((child, 0));
                    }
                    continue;
                }

                // Children still on the path are back edges.
                let parts = children
                    .iter()
                    .map(|&c| {
                        if state[c] == DONE {
                            hashes[c]
                        } else {
                            let tag = *blake3::hash(&self.node_tag(c)).as_bytes();
                            nuget_util::hash::combine_unordered(b"cycle", vec![tag])
                        }
                    })
                    .collect();
                hashes[node] = nuget_util::hash::combine_unordered(&self.node_tag(node), parts);
                state[node] = DONE;
                stack.pop();
            }
        }
        hashes
    }

    /// Full structural comparison with the same semantics as
    /// [`structural_hash`](Self::structural_hash).
    #[must_use]
    pub fn structurally_equal(&self, other: &Self) -> bool {
        self.structural_hash() == other.structural_hash() && self.canonical() == other.canonical()
    }

    /// Every root-to-node path as a sorted list of `id@version` chains,
    /// stopping at repeated nodes on a path.
    fn canonical(&self) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        let mut stack: Vec<(NodeId, Vec<NodeId>)> =
            self.roots.iter().map(|&r| (r, vec![r])).collect();

        while let Some((node, path)) = stack.pop() {
            paths.push(
                path.iter()
                    .map(|&n| {
                        let n = &self.nodes[n];
                        format!("{}@{}", n.id.to_ascii_lowercase(), n.version)
                    })
                    .collect(),
            );
            for &child in &self.nodes[node].children {
                if path.contains(&child) {
                    continue;
                }
                let mut next = path.clone();
                next.push(child);
                stack.push((child, next));
            }
        }
        paths.sort();
        paths
    }
}

/// The graph for one framework; `None` when the package is not in it.
#[derive(Debug, Clone)]
pub struct FrameworkGraph {
    /// Short framework name.
    pub framework: String,
    pub graph: Option<DependencyGraph>,
}

/// Build per-framework dependency graphs leading to `target_package`.
///
/// Only targets without a runtime identifier are considered. When
/// `frameworks` is non-empty, only targets whose short name matches one of
/// them (case-insensitively) are included.
///
/// Returns `None` if no considered framework contains the package at all.
#[must_use]
pub fn find_dependency_graphs(
    assets: &AssetsFile,
    target_package: &str,
    frameworks: &[String],
) -> Option<Vec<FrameworkGraph>> {
    let mut found_any = false;
    let mut result = Vec::new();

    for target in assets.framework_targets() {
        let short = target.short_framework();
        if !frameworks.is_empty() && !frameworks.iter().any(|f| f.eq_ignore_ascii_case(&short)) {
            continue;
        }

        let top_level = assets.top_level_dependencies(&target.framework);
        let graph = build_graph(target, &top_level, target_package);
        found_any |= graph.is_some();
        result.push(FrameworkGraph {
            framework: short,
            graph,
        });
    }

    found_any.then_some(result)
}

/// Lower-cased ids of every library that can reach `target`, including it.
fn ids_reaching(target: &AssetsTarget, target_package: &str) -> HashSet<String> {
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for library in &target.libraries {
        for dep in library.dependencies.keys() {
            dependents
                .entry(dep.to_ascii_lowercase())
                .or_default()
                .push(library.name.to_ascii_lowercase());
        }
    }

    let start = target_package.to_ascii_lowercase();
    let mut reaching = HashSet::from([start.clone()]);
    let mut queue = VecDeque::from([start]);
    while let Some(id) = queue.pop_front() {
        for parent in dependents.get(&id).into_iter().flatten() {
            if reaching.insert(parent.clone()) {
                queue.push_back(parent.clone());
            }
        }
    }
    reaching
}

fn build_graph(
    target: &AssetsTarget,
    top_level: &[String],
    target_package: &str,
) -> Option<DependencyGraph> {
    target.library(target_package)?;

    let reaching = ids_reaching(target, target_package);
    let target_key = target_package.to_ascii_lowercase();

    let mut graph = DependencyGraph::new();
    let mut nodes: HashMap<String, NodeId> = HashMap::new();
    let mut stack: Vec<NodeId> = Vec::new();

    let mut node_for = |graph: &mut DependencyGraph, stack: &mut Vec<NodeId>, id: &str| -> NodeId {
        let key = id.to_ascii_lowercase();
        if let Some(&existing) = nodes.get(&key) {
            return existing;
        }
        let (name, version) = match target.library(id) {
            Some(library) => (library.name.as_str(), library.version.as_str()),
            None => (id, ""),
        };
        let node = graph.add_node(name, version);
        nodes.insert(key, node);
        stack.push(node);
        node
    };

    for id in top_level {
        if reaching.contains(&id.to_ascii_lowercase()) {
            let root = node_for(&mut graph, &mut stack, id);
            graph.add_root(root);
        }
    }

    while let Some(node) = stack.pop() {
        let id = graph.node(node).id.clone();
        if id.eq_ignore_ascii_case(&target_key) {
            continue;
        }
        let Some(library) = target.library(&id) else {
            continue;
        };
        for dep in library.dependencies.keys() {
            if reaching.contains(&dep.to_ascii_lowercase()) {
                let child = node_for(&mut graph, &mut stack, dep);
                graph.add_child(node, child);
            }
        }
    }

    if graph.roots().is_empty() {
        None
    } else {
        Some(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets(json: &str) -> AssetsFile {
        AssetsFile::from_json(json).unwrap()
    }

    const DIAMOND: &str = r#"{
      "version": 3,
      "targets": {
        ".NETCoreApp,Version=v8.0": {
          "Top/1.0.0": { "type": "package", "dependencies": { "Left": "1.0.0", "Right": "1.0.0", "Other": "1.0.0" } },
          "Left/1.0.0": { "type": "package", "dependencies": { "Target": "2.0.0" } },
          "Right/1.0.0": { "type": "package", "dependencies": { "Target": "2.0.0" } },
          "Other/1.0.0": { "type": "package" },
          "Target/2.0.0": { "type": "package", "dependencies": { "Leaf": "1.0.0" } },
          "Leaf/1.0.0": { "type": "package" },
          "Unrelated/1.0.0": { "type": "package" }
        },
        ".NETStandard,Version=v2.0": {
          "Unrelated/1.0.0": { "type": "package" }
        }
      },
      "projectFileDependencyGroups": {
        ".NETCoreApp,Version=v8.0": [ "Top >= 1.0.0", "Unrelated >= 1.0.0" ],
        ".NETStandard,Version=v2.0": [ "Unrelated >= 1.0.0" ]
      }
    }"#;

    fn ids(graph: &DependencyGraph, nodes: &[NodeId]) -> Vec<String> {
        nodes.iter().map(|&n| graph.node(n).id.clone()).collect()
    }

    #[test]
    fn test_diamond_shares_target_node() {
        let graphs = find_dependency_graphs(&assets(DIAMOND), "target", &[]).unwrap();
        assert_eq!(graphs.len(), 2);

        let net8 = graphs.iter().find(|g| g.framework == "net8.0").unwrap();
        let graph = net8.graph.as_ref().unwrap();
        assert_eq!(ids(graph, graph.roots()), ["Top"]);

        let top = graph.node(graph.roots()[0]);
        let mut children = ids(graph, &top.children);
        children.sort();
        assert_eq!(children, ["Left", "Right"]);

        let left = graph.node(top.children[0]);
        let right = graph.node(top.children[1]);
        assert_eq!(left.children, right.children);

        let target = graph.node(left.children[0]);
        assert_eq!(target.id, "Target");
        assert_eq!(target.version, "2.0.0");
        assert!(target.children.is_empty());
        // Top, Left, Right, Target
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_framework_without_package_has_no_graph() {
        let graphs = find_dependency_graphs(&assets(DIAMOND), "Target", &[]).unwrap();
        let ns = graphs
            .iter()
            .find(|g| g.framework == "netstandard2.0")
            .unwrap();
        assert!(ns.graph.is_none());
    }

    #[test]
    fn test_package_absent_everywhere() {
        assert!(find_dependency_graphs(&assets(DIAMOND), "Missing", &[]).is_none());
    }

    #[test]
    fn test_framework_filter() {
        let graphs =
            find_dependency_graphs(&assets(DIAMOND), "Target", &["NET8.0".to_string()]).unwrap();
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].framework, "net8.0");

        assert!(
            find_dependency_graphs(&assets(DIAMOND), "Target", &["netstandard2.0".to_string()])
                .is_none()
        );
    }

    #[test]
    fn test_top_level_target_is_a_leaf_root() {
        let graphs = find_dependency_graphs(&assets(DIAMOND), "Unrelated", &[]).unwrap();
        for fg in graphs {
            let graph = fg.graph.unwrap();
            assert_eq!(ids(&graph, graph.roots()), ["Unrelated"]);
            assert!(graph.node(graph.roots()[0]).children.is_empty());
        }
    }

    #[test]
    fn test_children_deduplicated_by_id() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_node("A", "1.0.0");
        let b1 = graph.add_node("B", "1.0.0");
        let b2 = graph.add_node("b", "2.0.0");
        graph.add_child(a, b1);
        graph.add_child(a, b2);
        graph.add_root(a);
        graph.add_root(a);

        assert_eq!(graph.node(a).children, vec![b1]);
        assert_eq!(graph.roots(), [a]);
    }

    #[test]
    fn test_structural_hash_ignores_order_and_case() {
        let mut one = DependencyGraph::new();
        let a = one.add_node("A", "1.0.0");
        let b = one.add_node("B", "1.0.0");
        let c = one.add_node("C", "1.0.0");
        one.add_child(a, b);
        one.add_child(a, c);
        one.add_root(a);

        let mut two = DependencyGraph::new();
        let c = two.add_node("c", "1.0.0");
        let a = two.add_node("a", "1.0.0");
        let b = two.add_node("b", "1.0.0");
        two.add_child(a, c);
        two.add_child(a, b);
        two.add_root(a);

        assert_eq!(one.structural_hash(), two.structural_hash());
        assert!(one.structurally_equal(&two));

        let mut three = two.clone();
        let d = three.add_node("D", "1.0.0");
        three.add_child(b, d);
        assert_ne!(one.structural_hash(), three.structural_hash());
        assert!(!one.structurally_equal(&three));
    }

    #[test]
    fn test_structural_hash_version_sensitive() {
        let mut one = DependencyGraph::new();
        let a = one.add_node("A", "1.0.0");
        one.add_root(a);
        let mut two = DependencyGraph::new();
        let a = two.add_node("A", "2.0.0");
        two.add_root(a);
        assert!(!one.structurally_equal(&two));
    }

    #[test]
    fn test_cyclic_input_terminates() {
        let json = r#"{
          "version": 3,
          "targets": {
            ".NETCoreApp,Version=v8.0": {
              "A/1.0.0": { "dependencies": { "B": "1.0.0" } },
              "B/1.0.0": { "dependencies": { "A": "1.0.0", "T": "1.0.0" } },
              "T/1.0.0": {}
            }
          },
          "projectFileDependencyGroups": { ".NETCoreApp,Version=v8.0": [ "A >= 1.0.0" ] }
        }"#;
        let graphs = find_dependency_graphs(&assets(json), "T", &[]).unwrap();
        let graph = graphs[0].graph.as_ref().unwrap();
        assert_eq!(graph.len(), 3);
        let _ = graph.structural_hash();
        assert!(graph.structurally_equal(&graph.clone()));
    }
}
