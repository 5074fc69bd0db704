use std::path::Path;

use crate::error::Result;
use crate::model::Placement;

/// Handle to one node in the destination scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u64);

/// Scene-graph/import sink consumed by the assembler.
///
/// Only available in an offline/editing context; the assembler treats an
/// absent sink as a graceful no-op, never an error.
pub trait SceneSink: Send + Sync {
    /// Load a persisted artifact and create an unattached node for it.
    fn load_artifact(&self, path: &Path, name: &str) -> Result<NodeId>;

    /// Find a node anywhere in the graph by name.
    fn find_node(&self, name: &str) -> Option<NodeId>;

    /// Create an empty, unattached node.
    fn create_node(&self, name: &str) -> NodeId;

    /// Attach `node` under `parent`, detaching it from any previous parent.
    fn attach(&self, node: NodeId, parent: NodeId) -> Result<()>;

    /// Apply position + rotation to a node.
    fn set_placement(&self, node: NodeId, placement: &Placement) -> Result<()>;

    /// Persist the subtree rooted at `root` as a reusable unit on disk.
    fn save_unit(&self, root: NodeId, unit_path: &Path) -> Result<()>;

    /// Instantiate a previously saved unit, returning its unattached root.
    fn instantiate_unit(&self, unit_path: &Path) -> Result<NodeId>;

    /// Remove a node and its whole subtree from the graph.
    fn remove(&self, node: NodeId) -> Result<()>;

    /// The final destination container for imported content.
    fn container(&self) -> NodeId;
}
