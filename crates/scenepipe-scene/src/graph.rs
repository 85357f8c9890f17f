//! The abstract scene-graph capability the pipeline is written against.

use scenepipe_types::{AttributeSet, NodeId, Result, SetKind};

/// Abstraction over the host scene graph.
///
/// Read accessors report the scene as it is right now; mutators are fallible
/// and propagate their errors unchanged. The pipeline assumes it is the sole
/// mutator of the scene for the duration of a run, so implementations do not
/// need any locking.
pub trait SceneGraph {
    // --- queries ---

    /// The caller-visible current selection, in selection order.
    fn active_selection(&self) -> Vec<NodeId>;

    /// Whether the node is still alive.
    fn exists(&self, id: NodeId) -> bool;

    /// Display name of a node. Not guaranteed unique outside `full_path`.
    fn name(&self, id: NodeId) -> Result<String>;

    /// Slash-separated absolute path, unique per node.
    fn full_path(&self, id: NodeId) -> Result<String>;

    /// The parent, or `None` for a root node (or a dead id).
    fn parent_of(&self, id: NodeId) -> Option<NodeId>;

    /// Immediate children, in scene order.
    fn children_of(&self, id: NodeId) -> Vec<NodeId>;

    /// Every node in the scene, roots first, depth-first.
    fn all_nodes(&self) -> Vec<NodeId>;

    /// Whether this node carries renderable geometry directly.
    fn has_geometry(&self, id: NodeId) -> bool;

    // --- attribute sets ---

    /// Sets of one kind on a node, in set order. Empty for dead ids and
    /// nodes without geometry.
    fn attribute_sets_of(&self, id: NodeId, kind: SetKind) -> Vec<AttributeSet>;

    fn rename_attribute_set(
        &mut self,
        id: NodeId,
        kind: SetKind,
        from: &str,
        to: &str,
    ) -> Result<()>;

    fn delete_attribute_set(&mut self, id: NodeId, kind: SetKind, name: &str) -> Result<()>;

    fn set_current_attribute_set(&mut self, id: NodeId, kind: SetKind, name: &str) -> Result<()>;

    // --- structural mutations ---

    /// Merge the geometry of all given nodes into one new node. The sources
    /// are consumed; the merged node comes back unparented.
    fn merge_geometry(&mut self, ids: &[NodeId]) -> Result<NodeId>;

    fn freeze_transform(&mut self, id: NodeId) -> Result<()>;

    fn reset_pivot(&mut self, id: NodeId) -> Result<()>;

    /// Move a node under `new_parent`, or to the scene root when `None`.
    fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> Result<()>;

    fn rename(&mut self, id: NodeId, new_name: &str) -> Result<()>;

    /// Delete a node and its whole subtree.
    fn delete(&mut self, id: NodeId) -> Result<()>;

    // --- scene-wide cleanup ---

    /// Delete construction history on the given nodes.
    fn delete_construction_history(&mut self, ids: &[NodeId]) -> Result<()>;

    /// Delete object sets that no longer reference any member.
    fn delete_orphan_object_sets(&mut self) -> Result<()>;

    /// Delete dangling helper nodes (expired intermediate state).
    fn delete_unused_nodes(&mut self) -> Result<()>;
}
