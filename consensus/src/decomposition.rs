//! Hierarchical task decomposition
//!
//! Turns a task plus a target subtask count into a width-bounded tree:
//!
//! ```text
//! task
//!  ├─ component-0                 (≤ 10 components)
//!  │   ├─ subtask-0-0             (≤ 20 subtasks per component)
//!  │   │   ├─ step-0-0-0          (≤ 10 steps per subtask)
//!  │   │   └─ ...
//!  │   └─ ...
//!  └─ ...
//! ```
//!
//! Levels below steps keep the 10-wide cap. The width caps are part of the
//! product contract: the same `(task, target, max_depth)` always yields the
//! same node ids and the same tree shape.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Deepest decomposition the decomposer accepts.
pub const MAX_SUPPORTED_DEPTH: usize = 16;

/// Width caps for levels 1..=3; deeper levels reuse the last cap.
const LEVEL_WIDTH_CAPS: [usize; 3] = [10, 20, 10];
const DEEP_LEVEL_WIDTH_CAP: usize = 10;

/// Target subtasks per component at the top level.
const SUBTASKS_PER_COMPONENT: usize = 10;

/// Error type for decomposition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecompositionError {
    #[error("target subtask count must be at least 1, got {0}")]
    InvalidTarget(usize),

    #[error("max depth must be between 1 and {max}, got {got}")]
    InvalidDepth { got: usize, max: usize },
}

/// Result type for decomposition
pub type DecompositionResult<T> = Result<T, DecompositionError>;

/// A unit of work submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    /// Opaque caller context, carried through untouched
    #[serde(default)]
    pub context: serde_json::Value,
}

impl Task {
    /// Create a task with a fresh UUID v4 id.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            context: serde_json::Value::Null,
        }
    }

    /// Override the generated id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Index of a node inside a [`Decomposition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(pub usize);

/// Level a node sits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Task,
    Component,
    Subtask,
    Step,
}

impl NodeKind {
    fn for_depth(depth: usize) -> Self {
        match depth {
            0 => Self::Task,
            1 => Self::Component,
            2 => Self::Subtask,
            _ => Self::Step,
        }
    }
}

/// One node of the decomposition tree.
///
/// `parent` is a non-owning back reference into the owning
/// [`Decomposition`]'s arena.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskNode {
    /// Path-derived identifier (`component-1`, `subtask-1-4`, `step-1-4-2`)
    pub id: String,
    pub description: String,
    pub depth: usize,
    pub kind: NodeKind,
    /// Position of this node among its siblings, from the root down
    pub path: Vec<usize>,
    pub children: Vec<NodeIndex>,
    pub parent: Option<NodeIndex>,
}

impl SubtaskNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A decomposed task: the node arena plus summary counts.
///
/// Trees built by [`Decomposer`] always have a root at index 0. A
/// deserialized document may not, so lookups return `Option` or empty
/// results rather than indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    pub task: Task,
    pub target_subtask_count: usize,
    pub max_depth: usize,
    nodes: Vec<SubtaskNode>,
    /// Number of leaf nodes (the units that get solved and verified)
    pub leaf_count: usize,
}

impl Decomposition {
    pub fn root(&self) -> Option<&SubtaskNode> {
        self.nodes.first()
    }

    pub fn node(&self, index: NodeIndex) -> Option<&SubtaskNode> {
        self.nodes.get(index.0)
    }

    pub fn parent(&self, index: NodeIndex) -> Option<&SubtaskNode> {
        self.node(index)?.parent.and_then(|p| self.node(p))
    }

    pub fn children(&self, index: NodeIndex) -> impl Iterator<Item = &SubtaskNode> + '_ {
        self.node(index)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|c| self.node(*c))
    }

    /// Find a node by its path-derived id.
    pub fn find(&self, id: &str) -> Option<&SubtaskNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level components, in order.
    pub fn components(&self) -> impl Iterator<Item = &SubtaskNode> + '_ {
        self.children(NodeIndex(0))
    }

    /// Leaves in depth-first order.
    pub fn leaves(&self) -> Vec<NodeIndex> {
        let mut leaves = Vec::new();
        let mut stack = vec![NodeIndex(0)];
        while let Some(index) = stack.pop() {
            let Some(node) = self.node(index) else {
                continue;
            };
            if node.is_leaf() {
                leaves.push(index);
            } else {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        leaves
    }

    /// Index of the top-level component a node belongs to.
    pub fn component_of(&self, index: NodeIndex) -> Option<NodeIndex> {
        let mut current = index;
        loop {
            let node = self.node(current)?;
            match node.parent {
                Some(NodeIndex(0)) => return Some(current),
                Some(parent) => current = parent,
                None => return None,
            }
        }
    }

    /// Child counts per level, starting at the components.
    pub fn level_widths(&self) -> Vec<usize> {
        let mut widths = vec![0; self.max_depth];
        for node in self.nodes.iter().skip(1) {
            if let Some(width) = node
                .depth
                .checked_sub(1)
                .and_then(|level| widths.get_mut(level))
            {
                *width += 1;
            }
        }
        widths
    }
}

/// Builds bounded decomposition trees.
#[derive(Debug, Clone)]
pub struct Decomposer {
    pub target_subtask_count: usize,
    pub max_depth: usize,
}

impl Default for Decomposer {
    fn default() -> Self {
        Self {
            target_subtask_count: 100,
            max_depth: 3,
        }
    }
}

impl Decomposer {
    pub fn new(target_subtask_count: usize, max_depth: usize) -> Self {
        Self {
            target_subtask_count,
            max_depth,
        }
    }

    pub fn decompose(&self, task: &Task) -> DecompositionResult<Decomposition> {
        decompose(task, self.target_subtask_count, self.max_depth)
    }
}

/// Number of top-level components for a target count. Never zero.
pub fn component_count(target_subtask_count: usize) -> usize {
    (target_subtask_count / SUBTASKS_PER_COMPONENT)
        .min(LEVEL_WIDTH_CAPS[0])
        .max(1)
}

/// Width of level `depth` (2 and deeper) given the product of the widths above.
fn level_width(target_subtask_count: usize, depth: usize, widths_above: usize) -> usize {
    if widths_above == 0 {
        return 0;
    }
    let cap = LEVEL_WIDTH_CAPS
        .get(depth - 1)
        .copied()
        .unwrap_or(DEEP_LEVEL_WIDTH_CAP);
    (target_subtask_count / widths_above).min(cap)
}

fn node_id(path: &[usize]) -> String {
    let prefix = match path.len() {
        1 => "component",
        2 => "subtask",
        _ => "step",
    };
    let parts: Vec<String> = path.iter().map(|p| p.to_string()).collect();
    format!("{}-{}", prefix, parts.join("-"))
}

fn node_description(task: &Task, path: &[usize]) -> String {
    match path {
        [i] => format!("Component {}: {} part {}", i, task.description, i + 1),
        [i, j] => format!("Subtask {} of component {}", j, i),
        [.., k] => format!("Execute step {}", k),
        [] => task.description.clone(),
    }
}

/// Decompose `task` into a bounded tree.
///
/// Fails fast on `target_subtask_count < 1` or a `max_depth` outside
/// `1..=MAX_SUPPORTED_DEPTH`; no partial tree is ever returned.
pub fn decompose(
    task: &Task,
    target_subtask_count: usize,
    max_depth: usize,
) -> DecompositionResult<Decomposition> {
    if target_subtask_count < 1 {
        return Err(DecompositionError::InvalidTarget(target_subtask_count));
    }
    if max_depth < 1 || max_depth > MAX_SUPPORTED_DEPTH {
        return Err(DecompositionError::InvalidDepth {
            got: max_depth,
            max: MAX_SUPPORTED_DEPTH,
        });
    }

    info!(
        task_id = %task.id,
        target = target_subtask_count,
        max_depth,
        "Decomposing task"
    );

    let mut nodes = vec![SubtaskNode {
        id: task.id.clone(),
        description: task.description.clone(),
        depth: 0,
        kind: NodeKind::Task,
        path: Vec::new(),
        children: Vec::new(),
        parent: None,
    }];

    // Breadth-first by level; every node on a level shares the same width
    let mut frontier = vec![NodeIndex(0)];
    let mut widths_above = 1usize;
    for depth in 1..=max_depth {
        let width = if depth == 1 {
            component_count(target_subtask_count)
        } else {
            level_width(target_subtask_count, depth, widths_above)
        };
        debug!(depth, width, "Decomposition level");
        if width == 0 {
            break;
        }

        let mut next = Vec::with_capacity(frontier.len() * width);
        for parent in frontier {
            for position in 0..width {
                let mut path = nodes[parent.0].path.clone();
                path.push(position);
                let index = NodeIndex(nodes.len());
                nodes.push(SubtaskNode {
                    id: node_id(&path),
                    description: node_description(task, &path),
                    depth,
                    kind: NodeKind::for_depth(depth),
                    path,
                    children: Vec::new(),
                    parent: Some(parent),
                });
                nodes[parent.0].children.push(index);
                next.push(index);
            }
        }

        frontier = next;
        widths_above = widths_above.saturating_mul(width);
    }

    let leaf_count = nodes.iter().filter(|n| n.is_leaf()).count();
    let components = nodes[0].children.len();
    info!(
        task_id = %task.id,
        components,
        leaves = leaf_count,
        nodes = nodes.len(),
        "Task decomposed"
    );

    Ok(Decomposition {
        task: task.clone(),
        target_subtask_count,
        max_depth,
        nodes,
        leaf_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new("Build a data pipeline").with_id("task-1")
    }

    #[test]
    fn test_thousand_subtasks_three_levels() {
        let tree = decompose(&task(), 1000, 3).unwrap();
        assert_eq!(tree.components().count(), 10);
        for component in tree.components() {
            assert_eq!(component.children.len(), 20);
        }
        for subtask in tree.components().flat_map(|c| c.children.iter()) {
            let node = tree.node(*subtask).unwrap();
            assert_eq!(node.kind, NodeKind::Subtask);
            assert_eq!(node.children.len(), 5);
        }
        assert_eq!(tree.leaf_count, 1000);
        assert_eq!(tree.level_widths(), vec![10, 200, 1000]);
    }

    #[test]
    fn test_default_target_hundred() {
        let tree = decompose(&task(), 100, 3).unwrap();
        assert_eq!(tree.level_widths(), vec![10, 100, 100]);
        assert_eq!(tree.leaf_count, 100);
    }

    #[test]
    fn test_small_target_still_has_a_component() {
        let tree = decompose(&task(), 5, 3).unwrap();
        assert_eq!(tree.components().count(), 1);
        let component = tree.components().next().unwrap();
        assert_eq!(component.children.len(), 5);
        assert_eq!(tree.leaf_count, 5);
    }

    #[test]
    fn test_target_one() {
        let tree = decompose(&task(), 1, 3).unwrap();
        assert_eq!(tree.level_widths(), vec![1, 1, 1]);
        assert_eq!(tree.leaf_count, 1);
        assert!(tree.find("step-0-0-0").is_some());
    }

    #[test]
    fn test_depth_one_components_are_leaves() {
        let tree = decompose(&task(), 1000, 1).unwrap();
        assert_eq!(tree.leaf_count, 10);
        assert!(tree.components().all(|c| c.is_leaf()));
    }

    #[test]
    fn test_depth_two_stops_at_subtasks() {
        let tree = decompose(&task(), 1000, 2).unwrap();
        assert_eq!(tree.leaf_count, 200);
        let leaf = tree.node(tree.leaves()[0]).unwrap();
        assert_eq!(leaf.kind, NodeKind::Subtask);
        assert_eq!(leaf.depth, 2);
    }

    #[test]
    fn test_width_caps_hold_for_huge_targets() {
        let tree = decompose(&task(), 1_000_000, 3).unwrap();
        assert_eq!(tree.level_widths(), vec![10, 200, 2000]);
    }

    #[test]
    fn test_deeper_levels_use_remaining_budget() {
        let tree = decompose(&task(), 1000, 4).unwrap();
        // 1000 / (10 * 20 * 5) = 1 step below each step
        assert_eq!(tree.level_widths(), vec![10, 200, 1000, 1000]);
        assert!(tree.find("step-9-19-4-0").is_some());
        for leaf in tree.leaves() {
            assert_eq!(tree.node(leaf).unwrap().depth, 4);
        }
    }

    #[test]
    fn test_leaves_at_max_depth_have_no_children() {
        let tree = decompose(&task(), 300, 3).unwrap();
        for index in tree.leaves() {
            let node = tree.node(index).unwrap();
            assert!(node.depth <= 3);
            assert!(node.is_leaf());
        }
    }

    #[test]
    fn test_ids_are_path_derived_and_reproducible() {
        let a = decompose(&task(), 120, 3).unwrap();
        let b = decompose(&task(), 120, 3).unwrap();
        let ids_a: Vec<&str> = a.leaves().iter().map(|i| a.node(*i).unwrap().id.as_str()).collect();
        let ids_b: Vec<&str> = b.leaves().iter().map(|i| b.node(*i).unwrap().id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(ids_a[0], "step-0-0-0");
        assert!(a.find("component-3").is_some());
        assert!(a.find("subtask-3-7").is_some());
    }

    #[test]
    fn test_leaves_are_depth_first() {
        let tree = decompose(&task(), 40, 3).unwrap();
        // 4 components, 10 subtasks, 1 step
        let ids: Vec<String> = tree
            .leaves()
            .iter()
            .take(3)
            .map(|i| tree.node(*i).unwrap().id.clone())
            .collect();
        assert_eq!(ids, vec!["step-0-0-0", "step-0-1-0", "step-0-2-0"]);
    }

    #[test]
    fn test_parent_and_component_links() {
        let tree = decompose(&task(), 100, 3).unwrap();
        let leaf = tree.leaves()[25];
        let node = tree.node(leaf).unwrap();
        let parent = tree.parent(leaf).unwrap();
        assert!(node.id.starts_with(&parent.id.replace("subtask", "step")));
        let component = tree.node(tree.component_of(leaf).unwrap()).unwrap();
        assert_eq!(component.kind, NodeKind::Component);
        assert_eq!(component.path[0], node.path[0]);
        assert!(tree.parent(NodeIndex(0)).is_none());
    }

    #[test]
    fn test_descriptions() {
        let tree = decompose(&task(), 100, 3).unwrap();
        assert_eq!(
            tree.find("component-2").unwrap().description,
            "Component 2: Build a data pipeline part 3"
        );
        assert_eq!(tree.find("subtask-2-4").unwrap().description, "Subtask 4 of component 2");
        assert_eq!(tree.find("step-2-4-0").unwrap().description, "Execute step 0");
    }

    #[test]
    fn test_deserialized_tree_without_nodes() {
        let tree = decompose(&task(), 20, 2).unwrap();
        assert_eq!(tree.root().unwrap().kind, NodeKind::Task);

        let mut json = serde_json::to_value(&tree).unwrap();
        json["nodes"] = serde_json::json!([]);
        let empty: Decomposition = serde_json::from_value(json).unwrap();

        assert!(empty.is_empty());
        assert!(empty.root().is_none());
        assert!(empty.leaves().is_empty());
        assert_eq!(empty.components().count(), 0);
        assert!(empty.component_of(NodeIndex(0)).is_none());
        assert_eq!(empty.level_widths(), vec![0, 0]);
    }

    #[test]
    fn test_invalid_configuration() {
        assert_eq!(
            decompose(&task(), 0, 3).unwrap_err(),
            DecompositionError::InvalidTarget(0)
        );
        assert!(matches!(
            decompose(&task(), 10, 0),
            Err(DecompositionError::InvalidDepth { got: 0, .. })
        ));
        assert!(matches!(
            decompose(&task(), 10, MAX_SUPPORTED_DEPTH + 1),
            Err(DecompositionError::InvalidDepth { .. })
        ));
    }

    #[test]
    fn test_component_count() {
        assert_eq!(component_count(1), 1);
        assert_eq!(component_count(9), 1);
        assert_eq!(component_count(35), 3);
        assert_eq!(component_count(5000), 10);
    }
}
