//! In-memory scene graph used by tests and headless pipeline runs.

use std::collections::BTreeMap;

use scenepipe_types::{AttributeSet, NodeId, PipelineError, Result, SetKind};
use tracing::debug;

use crate::graph::SceneGraph;

#[derive(Debug, Clone)]
struct SetRecord {
    name: String,
    is_current: bool,
}

#[derive(Debug, Clone)]
struct NodeData {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    has_geometry: bool,
    frozen: bool,
    pivot_reset: bool,
    has_history: bool,
    uv_sets: Vec<SetRecord>,
    color_sets: Vec<SetRecord>,
}

impl NodeData {
    fn new(name: &str, parent: Option<NodeId>, has_geometry: bool) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            has_geometry,
            frozen: false,
            pivot_reset: false,
            has_history: has_geometry,
            uv_sets: Vec::new(),
            color_sets: Vec::new(),
        }
    }

    fn sets(&self, kind: SetKind) -> &Vec<SetRecord> {
        match kind {
            SetKind::Uv => &self.uv_sets,
            SetKind::Color => &self.color_sets,
        }
    }

    fn sets_mut(&mut self, kind: SetKind) -> &mut Vec<SetRecord> {
        match kind {
            SetKind::Uv => &mut self.uv_sets,
            SetKind::Color => &mut self.color_sets,
        }
    }
}

/// A concrete [`SceneGraph`] that lives entirely in memory.
///
/// Construction is builder-flavored: `add_root` / `add_group` / `add_mesh`
/// grow the hierarchy, `set_uv_sets` / `set_color_sets` attach named channels.
/// Meshes start with a single current `map1` UV set, matching what a host
/// application gives a freshly created poly object.
pub struct MemoryScene {
    nodes: BTreeMap<u64, NodeData>,
    roots: Vec<NodeId>,
    selection: Vec<NodeId>,
    next_id: u64,
    orphan_object_sets: usize,
    unused_nodes: usize,
    merge_failure: Option<String>,
    merge_removes_emptied_groups: bool,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            roots: Vec::new(),
            selection: Vec::new(),
            next_id: 1,
            orphan_object_sets: 0,
            unused_nodes: 0,
            merge_failure: None,
            merge_removes_emptied_groups: false,
        }
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id.0, data);
        id
    }

    fn data(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes
            .get(&id.0)
            .ok_or_else(|| PipelineError::NodeNotFound {
                node: id.to_string(),
            })
    }

    fn data_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes
            .get_mut(&id.0)
            .ok_or_else(|| PipelineError::NodeNotFound {
                node: id.to_string(),
            })
    }

    // --- construction ---

    /// Add a root-level group (no geometry).
    pub fn add_root(&mut self, name: &str) -> NodeId {
        let id = self.alloc(NodeData::new(name, None, false));
        self.roots.push(id);
        id
    }

    /// Add a child group (no geometry) under `parent`.
    pub fn add_group(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.data(parent)?;
        let id = self.alloc(NodeData::new(name, Some(parent), false));
        self.data_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Add a geometry-bearing child under `parent`, with a current `map1`
    /// UV set.
    pub fn add_mesh(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        self.data(parent)?;
        let mut data = NodeData::new(name, Some(parent), true);
        data.uv_sets.push(SetRecord {
            name: "map1".to_string(),
            is_current: true,
        });
        let id = self.alloc(data);
        self.data_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Replace the UV sets of a node. `current` is an index into `names`.
    pub fn set_uv_sets(&mut self, id: NodeId, names: &[&str], current: usize) -> Result<()> {
        let data = self.data_mut(id)?;
        data.uv_sets = names
            .iter()
            .enumerate()
            .map(|(i, n)| SetRecord {
                name: n.to_string(),
                is_current: i == current,
            })
            .collect();
        Ok(())
    }

    /// Replace the color sets of a node; the first one becomes current.
    pub fn set_color_sets(&mut self, id: NodeId, names: &[&str]) -> Result<()> {
        let data = self.data_mut(id)?;
        data.color_sets = names
            .iter()
            .enumerate()
            .map(|(i, n)| SetRecord {
                name: n.to_string(),
                is_current: i == 0,
            })
            .collect();
        Ok(())
    }

    /// Replace the active selection.
    pub fn select(&mut self, ids: &[NodeId]) {
        self.selection = ids.to_vec();
    }

    // --- ambient scene state used by cleanup steps ---

    pub fn set_orphan_object_sets(&mut self, count: usize) {
        self.orphan_object_sets = count;
    }

    pub fn orphan_object_sets(&self) -> usize {
        self.orphan_object_sets
    }

    pub fn set_unused_nodes(&mut self, count: usize) {
        self.unused_nodes = count;
    }

    pub fn unused_nodes(&self) -> usize {
        self.unused_nodes
    }

    // --- failure / behavior injection ---

    /// Make the next `merge_geometry` call fail with the given message.
    pub fn fail_next_merge(&mut self, message: &str) {
        self.merge_failure = Some(message.to_string());
    }

    /// When enabled, merging also deletes source parents that end up with no
    /// children and no geometry, mimicking hosts where the emptied group is
    /// swallowed by merge history.
    pub fn merge_removes_emptied_groups(&mut self, on: bool) {
        self.merge_removes_emptied_groups = on;
    }

    // --- test observability ---

    pub fn is_frozen(&self, id: NodeId) -> bool {
        self.nodes.get(&id.0).map(|d| d.frozen).unwrap_or(false)
    }

    pub fn is_pivot_reset(&self, id: NodeId) -> bool {
        self.nodes.get(&id.0).map(|d| d.pivot_reset).unwrap_or(false)
    }

    pub fn has_history(&self, id: NodeId) -> bool {
        self.nodes.get(&id.0).map(|d| d.has_history).unwrap_or(false)
    }

    pub fn set_names(&self, id: NodeId, kind: SetKind) -> Vec<String> {
        self.nodes
            .get(&id.0)
            .map(|d| d.sets(kind).iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Find a live node by display name (first match in id order).
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, d)| d.name == name)
            .map(|(id, _)| NodeId(*id))
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes.get(&id.0).and_then(|d| d.parent) {
            if let Some(pd) = self.nodes.get_mut(&parent.0) {
                pd.children.retain(|c| *c != id);
            }
        } else {
            self.roots.retain(|r| *r != id);
        }
    }

    fn delete_subtree(&mut self, id: NodeId) {
        let children = self
            .nodes
            .get(&id.0)
            .map(|d| d.children.clone())
            .unwrap_or_default();
        for child in children {
            self.delete_subtree(child);
        }
        self.nodes.remove(&id.0);
    }

    fn is_descendant(&self, candidate: NodeId, of: NodeId) -> bool {
        let mut cursor = self.nodes.get(&candidate.0).and_then(|d| d.parent);
        while let Some(p) = cursor {
            if p == of {
                return true;
            }
            cursor = self.nodes.get(&p.0).and_then(|d| d.parent);
        }
        false
    }

    fn collect_depth_first(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        if let Some(data) = self.nodes.get(&id.0) {
            for child in &data.children {
                self.collect_depth_first(*child, out);
            }
        }
    }
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph for MemoryScene {
    fn active_selection(&self) -> Vec<NodeId> {
        self.selection
            .iter()
            .copied()
            .filter(|id| self.nodes.contains_key(&id.0))
            .collect()
    }

    fn exists(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id.0)
    }

    fn name(&self, id: NodeId) -> Result<String> {
        Ok(self.data(id)?.name.clone())
    }

    fn full_path(&self, id: NodeId) -> Result<String> {
        let mut segments = vec![self.data(id)?.name.clone()];
        let mut cursor = self.data(id)?.parent;
        while let Some(p) = cursor {
            let data = self.data(p)?;
            segments.push(data.name.clone());
            cursor = data.parent;
        }
        segments.reverse();
        Ok(format!("/{}", segments.join("/")))
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id.0).and_then(|d| d.parent)
    }

    fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&id.0)
            .map(|d| d.children.clone())
            .unwrap_or_default()
    }

    fn all_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for root in self.roots.clone() {
            self.collect_depth_first(root, &mut out);
        }
        out
    }

    fn has_geometry(&self, id: NodeId) -> bool {
        self.nodes.get(&id.0).map(|d| d.has_geometry).unwrap_or(false)
    }

    fn attribute_sets_of(&self, id: NodeId, kind: SetKind) -> Vec<AttributeSet> {
        self.nodes
            .get(&id.0)
            .map(|d| {
                d.sets(kind)
                    .iter()
                    .enumerate()
                    .map(|(i, s)| AttributeSet {
                        name: s.name.clone(),
                        ordinal: i + 1,
                        is_current: s.is_current,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn rename_attribute_set(
        &mut self,
        id: NodeId,
        kind: SetKind,
        from: &str,
        to: &str,
    ) -> Result<()> {
        let node = self.data(id)?.name.clone();
        let sets = self.data_mut(id)?.sets_mut(kind);
        if sets.iter().any(|s| s.name == to) {
            return Err(PipelineError::Other(format!(
                "a {kind:?} set named '{to}' already exists on '{node}'"
            )));
        }
        match sets.iter_mut().find(|s| s.name == from) {
            Some(set) => {
                set.name = to.to_string();
                Ok(())
            }
            None => Err(PipelineError::SetNotFound {
                node,
                set: from.to_string(),
            }),
        }
    }

    fn delete_attribute_set(&mut self, id: NodeId, kind: SetKind, name: &str) -> Result<()> {
        let node = self.data(id)?.name.clone();
        let sets = self.data_mut(id)?.sets_mut(kind);
        let Some(pos) = sets.iter().position(|s| s.name == name) else {
            return Err(PipelineError::SetNotFound {
                node,
                set: name.to_string(),
            });
        };
        let was_current = sets[pos].is_current;
        sets.remove(pos);
        if was_current {
            if let Some(first) = sets.first_mut() {
                first.is_current = true;
            }
        }
        Ok(())
    }

    fn set_current_attribute_set(&mut self, id: NodeId, kind: SetKind, name: &str) -> Result<()> {
        let node = self.data(id)?.name.clone();
        let sets = self.data_mut(id)?.sets_mut(kind);
        if !sets.iter().any(|s| s.name == name) {
            return Err(PipelineError::SetNotFound {
                node,
                set: name.to_string(),
            });
        }
        for set in sets.iter_mut() {
            set.is_current = set.name == name;
        }
        Ok(())
    }

    fn merge_geometry(&mut self, ids: &[NodeId]) -> Result<NodeId> {
        if let Some(message) = self.merge_failure.take() {
            return Err(PipelineError::Other(message));
        }
        if ids.is_empty() {
            return Err(PipelineError::Other("merge of zero nodes".into()));
        }
        for id in ids {
            self.data(*id)?;
        }

        // Union of the sources' channels, first-seen order, first current.
        let mut uv_union: Vec<SetRecord> = Vec::new();
        let mut color_union: Vec<SetRecord> = Vec::new();
        for id in ids {
            let data = self.data(*id)?;
            for record in &data.uv_sets {
                if !uv_union.iter().any(|s| s.name == record.name) {
                    uv_union.push(SetRecord {
                        name: record.name.clone(),
                        is_current: false,
                    });
                }
            }
            for record in &data.color_sets {
                if !color_union.iter().any(|s| s.name == record.name) {
                    color_union.push(SetRecord {
                        name: record.name.clone(),
                        is_current: false,
                    });
                }
            }
        }
        if let Some(first) = uv_union.first_mut() {
            first.is_current = true;
        }
        if let Some(first) = color_union.first_mut() {
            first.is_current = true;
        }

        let former_parents: Vec<NodeId> =
            ids.iter().filter_map(|id| self.parent_of(*id)).collect();

        let mut merged = NodeData::new(&format!("polyUnited{}", self.next_id), None, true);
        merged.uv_sets = uv_union;
        merged.color_sets = color_union;
        let merged_id = self.alloc(merged);
        self.roots.push(merged_id);

        for id in ids {
            self.detach(*id);
            self.delete_subtree(*id);
        }

        if self.merge_removes_emptied_groups {
            for parent in former_parents {
                let emptied = self
                    .nodes
                    .get(&parent.0)
                    .map(|d| d.children.is_empty() && !d.has_geometry)
                    .unwrap_or(false);
                if emptied {
                    debug!(group = parent.0, "merge swallowed emptied group");
                    self.detach(parent);
                    self.delete_subtree(parent);
                }
            }
        }

        Ok(merged_id)
    }

    fn freeze_transform(&mut self, id: NodeId) -> Result<()> {
        self.data_mut(id)?.frozen = true;
        Ok(())
    }

    fn reset_pivot(&mut self, id: NodeId) -> Result<()> {
        self.data_mut(id)?.pivot_reset = true;
        Ok(())
    }

    fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> Result<()> {
        self.data(id)?;
        if let Some(p) = new_parent {
            self.data(p)?;
            if p == id || self.is_descendant(p, id) {
                return Err(PipelineError::Other(format!(
                    "cannot parent {id} under its own descendant {p}"
                )));
            }
        }
        self.detach(id);
        self.data_mut(id)?.parent = new_parent;
        match new_parent {
            Some(p) => self.data_mut(p)?.children.push(id),
            None => self.roots.push(id),
        }
        Ok(())
    }

    fn rename(&mut self, id: NodeId, new_name: &str) -> Result<()> {
        self.data_mut(id)?.name = new_name.to_string();
        Ok(())
    }

    fn delete(&mut self, id: NodeId) -> Result<()> {
        self.data(id)?;
        debug!(node = id.0, "deleting subtree");
        self.detach(id);
        self.delete_subtree(id);
        Ok(())
    }

    fn delete_construction_history(&mut self, ids: &[NodeId]) -> Result<()> {
        // Dead ids are skipped: earlier steps may have consumed them.
        for id in ids {
            if let Some(data) = self.nodes.get_mut(&id.0) {
                data.has_history = false;
            }
        }
        Ok(())
    }

    fn delete_orphan_object_sets(&mut self) -> Result<()> {
        self.orphan_object_sets = 0;
        Ok(())
    }

    fn delete_unused_nodes(&mut self) -> Result<()> {
        self.unused_nodes = 0;
        Ok(())
    }
}
