// In-memory scene graph: the sink used for offline/editing runs and tests.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::model::Placement;

use super::traits::{NodeId, SceneSink};

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    placement: Placement,
    artifact: Option<String>,
}

/// Serialized form of a saved unit: the subtree with names, placements,
/// and artifact references.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnitNode {
    name: String,
    placement: Placement,
    artifact: Option<String>,
    children: Vec<UnitNode>,
}

struct SceneInner {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    container: NodeId,
}

pub struct MemoryScene {
    inner: RwLock<SceneInner>,
}

impl MemoryScene {
    pub fn new(container_name: &str) -> Self {
        let container = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            container,
            Node {
                name: container_name.to_string(),
                parent: None,
                children: Vec::new(),
                placement: Placement::default(),
                artifact: None,
            },
        );
        Self {
            inner: RwLock::new(SceneInner {
                nodes,
                next_id: 1,
                container,
            }),
        }
    }

    fn insert_node(inner: &mut SceneInner, node: Node) -> NodeId {
        let id = NodeId(inner.next_id);
        inner.next_id += 1;
        inner.nodes.insert(id, node);
        id
    }

    fn subtree_to_unit(inner: &SceneInner, id: NodeId) -> Option<UnitNode> {
        let node = inner.nodes.get(&id)?;
        let children = node
            .children
            .iter()
            .filter_map(|child| Self::subtree_to_unit(inner, *child))
            .collect();
        Some(UnitNode {
            name: node.name.clone(),
            placement: node.placement,
            artifact: node.artifact.clone(),
            children,
        })
    }

    fn unit_to_subtree(inner: &mut SceneInner, unit: &UnitNode) -> NodeId {
        let id = Self::insert_node(
            inner,
            Node {
                name: unit.name.clone(),
                parent: None,
                children: Vec::new(),
                placement: unit.placement,
                artifact: unit.artifact.clone(),
            },
        );
        for child_unit in &unit.children {
            let child = Self::unit_to_subtree(inner, child_unit);
            if let Some(node) = inner.nodes.get_mut(&child) {
                node.parent = Some(id);
            }
            if let Some(node) = inner.nodes.get_mut(&id) {
                node.children.push(child);
            }
        }
        id
    }

    fn remove_subtree(inner: &mut SceneInner, id: NodeId) {
        if let Some(node) = inner.nodes.remove(&id) {
            for child in node.children {
                Self::remove_subtree(inner, child);
            }
        }
    }

    /// Number of nodes carrying the given name. Test helper.
    pub fn node_count_named(&self, name: &str) -> usize {
        let inner = self.inner.read();
        inner.nodes.values().filter(|n| n.name == name).count()
    }

    /// Names of the direct children of the first node with the given name,
    /// in attachment order. Test helper.
    pub fn child_names_of(&self, name: &str) -> Vec<String> {
        let inner = self.inner.read();
        let Some((_, node)) = inner.nodes.iter().find(|(_, n)| n.name == name) else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter_map(|id| inner.nodes.get(id).map(|n| n.name.clone()))
            .collect()
    }

    /// Placement of the first node with the given name. Test helper.
    pub fn placement_of(&self, name: &str) -> Option<Placement> {
        let inner = self.inner.read();
        inner
            .nodes
            .values()
            .find(|n| n.name == name)
            .map(|n| n.placement)
    }
}

impl SceneSink for MemoryScene {
    fn load_artifact(&self, path: &Path, name: &str) -> Result<NodeId> {
        if !path.is_file() {
            return Err(PipelineError::Import(format!(
                "artifact not found at {}",
                path.display()
            )));
        }
        let mut inner = self.inner.write();
        Ok(Self::insert_node(
            &mut inner,
            Node {
                name: name.to_string(),
                parent: None,
                children: Vec::new(),
                placement: Placement::default(),
                artifact: Some(path.display().to_string()),
            },
        ))
    }

    fn find_node(&self, name: &str) -> Option<NodeId> {
        let inner = self.inner.read();
        inner
            .nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| *id)
    }

    fn create_node(&self, name: &str) -> NodeId {
        let mut inner = self.inner.write();
        Self::insert_node(
            &mut inner,
            Node {
                name: name.to_string(),
                parent: None,
                children: Vec::new(),
                placement: Placement::default(),
                artifact: None,
            },
        )
    }

    fn attach(&self, node: NodeId, parent: NodeId) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(&node) || !inner.nodes.contains_key(&parent) {
            return Err(PipelineError::Import("attach on unknown node".to_string()));
        }
        let previous = inner.nodes.get(&node).and_then(|n| n.parent);
        if let Some(prev) = previous {
            if let Some(prev_node) = inner.nodes.get_mut(&prev) {
                prev_node.children.retain(|c| *c != node);
            }
        }
        if let Some(n) = inner.nodes.get_mut(&node) {
            n.parent = Some(parent);
        }
        if let Some(p) = inner.nodes.get_mut(&parent) {
            p.children.push(node);
        }
        Ok(())
    }

    fn set_placement(&self, node: NodeId, placement: &Placement) -> Result<()> {
        let mut inner = self.inner.write();
        let n = inner
            .nodes
            .get_mut(&node)
            .ok_or_else(|| PipelineError::Import("placement on unknown node".to_string()))?;
        n.placement = *placement;
        Ok(())
    }

    fn save_unit(&self, root: NodeId, unit_path: &Path) -> Result<()> {
        let unit = {
            let inner = self.inner.read();
            Self::subtree_to_unit(&inner, root)
                .ok_or_else(|| PipelineError::Import("save of unknown node".to_string()))?
        };
        if let Some(parent) = unit_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_vec_pretty(&unit)?;
        fs::write(unit_path, encoded)?;
        Ok(())
    }

    fn instantiate_unit(&self, unit_path: &Path) -> Result<NodeId> {
        let raw = fs::read(unit_path)?;
        let unit: UnitNode = serde_json::from_slice(&raw)?;
        let mut inner = self.inner.write();
        Ok(Self::unit_to_subtree(&mut inner, &unit))
    }

    fn remove(&self, node: NodeId) -> Result<()> {
        let mut inner = self.inner.write();
        let parent = inner.nodes.get(&node).and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Some(p) = inner.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != node);
            }
        }
        Self::remove_subtree(&mut inner, node);
        Ok(())
    }

    fn container(&self) -> NodeId {
        self.inner.read().container
    }
}
