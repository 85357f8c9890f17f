//! Hierarchy resolution: canonical object lists, descendant closures, and
//! ancestor sets.

use std::collections::HashSet;

use scenepipe_scene::SceneGraph;
use scenepipe_types::{NodeId, PipelineError, Result};

/// Deduplicate by identity, preserving first-seen order.
pub fn dedup_preserving_order(ids: &[NodeId]) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    ids.iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Turn caller input into a canonical, deduplicated object list.
///
/// An empty `input` with `use_active_selection_if_empty` substitutes the
/// scene's current selection. A caller-supplied id that no longer resolves
/// is an error, never silently dropped; an empty result is not.
pub fn resolve_objects(
    scene: &dyn SceneGraph,
    input: &[NodeId],
    use_active_selection_if_empty: bool,
) -> Result<Vec<NodeId>> {
    let source = if input.is_empty() && use_active_selection_if_empty {
        scene.active_selection()
    } else {
        input.to_vec()
    };
    for id in &source {
        if !scene.exists(*id) {
            return Err(PipelineError::UnresolvedReference {
                reference: id.to_string(),
            });
        }
    }
    Ok(dedup_preserving_order(&source))
}

/// Descendants of the given roots, in root order then scene child order.
///
/// `immediate_only` limits the walk to first-level children; otherwise the
/// full transitive closure is returned. `include_geometry` controls whether
/// geometry-bearing nodes appear in the result or only structural ones.
/// The roots themselves are never included.
pub fn expand_descendants(
    scene: &dyn SceneGraph,
    roots: &[NodeId],
    immediate_only: bool,
    include_geometry: bool,
) -> Vec<NodeId> {
    fn walk(
        scene: &dyn SceneGraph,
        id: NodeId,
        immediate_only: bool,
        include_geometry: bool,
        out: &mut Vec<NodeId>,
    ) {
        for child in scene.children_of(id) {
            if include_geometry || !scene.has_geometry(child) {
                out.push(child);
            }
            if !immediate_only {
                walk(scene, child, immediate_only, include_geometry, out);
            }
        }
    }

    let mut out = Vec::new();
    for root in roots {
        walk(scene, *root, immediate_only, include_geometry, &mut out);
    }
    dedup_preserving_order(&out)
}

/// The export closure of a set of roots: the roots themselves plus their
/// full descendant hierarchy, geometry included.
pub fn export_closure(scene: &dyn SceneGraph, roots: &[NodeId]) -> Vec<NodeId> {
    let mut out = roots.to_vec();
    out.extend(expand_descendants(scene, roots, false, true));
    dedup_preserving_order(&out)
}

/// Every proper ancestor of every given node, first-seen order.
pub fn all_ancestors(scene: &dyn SceneGraph, nodes: &[NodeId]) -> Vec<NodeId> {
    let mut out = Vec::new();
    for node in nodes {
        let mut cursor = scene.parent_of(*node);
        while let Some(parent) = cursor {
            out.push(parent);
            cursor = scene.parent_of(parent);
        }
    }
    dedup_preserving_order(&out)
}

/// Sort by the stable full-path key. Use only where order is declared
/// insignificant; export-unit and rule-evaluation order must stay as given.
pub fn sorted_by_path(scene: &dyn SceneGraph, ids: &[NodeId]) -> Result<Vec<NodeId>> {
    let mut keyed = ids
        .iter()
        .map(|id| Ok((scene.full_path(*id)?, *id)))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort();
    Ok(keyed.into_iter().map(|(_, id)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenepipe_scene::MemoryScene;

    fn two_islands() -> (MemoryScene, NodeId, NodeId) {
        let mut scene = MemoryScene::new();
        let a = scene.add_root("Island_B");
        let grp = scene.add_group(a, "Rocks").unwrap();
        scene.add_mesh(grp, "rock").unwrap();
        let b = scene.add_root("Island_A");
        scene.add_mesh(b, "ground").unwrap();
        (scene, a, b)
    }

    #[test]
    fn resolve_uses_selection_when_empty() {
        let (mut scene, a, b) = two_islands();
        scene.select(&[b, a, b]);
        let resolved = resolve_objects(&scene, &[], true).unwrap();
        assert_eq!(resolved, vec![b, a]);
    }

    #[test]
    fn resolve_ignores_selection_when_input_given() {
        let (mut scene, a, b) = two_islands();
        scene.select(&[b]);
        let resolved = resolve_objects(&scene, &[a], true).unwrap();
        assert_eq!(resolved, vec![a]);
    }

    #[test]
    fn resolve_empty_without_flag_is_empty_not_error() {
        let (scene, _, _) = two_islands();
        assert!(resolve_objects(&scene, &[], false).unwrap().is_empty());
    }

    #[test]
    fn resolve_dead_reference_is_an_error() {
        let (scene, _, _) = two_islands();
        let err = resolve_objects(&scene, &[NodeId(999)], false).unwrap_err();
        assert!(matches!(err, PipelineError::UnresolvedReference { .. }));
    }

    #[test]
    fn resolve_dedups_preserving_first_seen_order() {
        let (scene, a, b) = two_islands();
        let resolved = resolve_objects(&scene, &[b, a, b, a], false).unwrap();
        assert_eq!(resolved, vec![b, a]);
    }

    #[test]
    fn expand_immediate_excludes_grandchildren() {
        let (scene, a, _) = two_islands();
        let children = expand_descendants(&scene, &[a], true, true);
        assert_eq!(children.len(), 1);
        assert_eq!(scene.name(children[0]).unwrap(), "Rocks");
    }

    #[test]
    fn expand_full_closure_reaches_leaves() {
        let (scene, a, _) = two_islands();
        let all = expand_descendants(&scene, &[a], false, true);
        let names: Vec<String> = all.iter().map(|n| scene.name(*n).unwrap()).collect();
        assert_eq!(names, vec!["Rocks", "rock"]);
    }

    #[test]
    fn expand_can_exclude_geometry() {
        let (scene, a, _) = two_islands();
        let structural = expand_descendants(&scene, &[a], false, false);
        let names: Vec<String> = structural.iter().map(|n| scene.name(*n).unwrap()).collect();
        assert_eq!(names, vec!["Rocks"]);
    }

    #[test]
    fn closure_includes_roots_first() {
        let (scene, a, _) = two_islands();
        let closure = export_closure(&scene, &[a]);
        assert_eq!(closure[0], a);
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn ancestors_are_proper_and_deduplicated() {
        let (scene, a, _) = two_islands();
        let rocks = scene.children_of(a)[0];
        let rock = scene.children_of(rocks)[0];
        let ancestors = all_ancestors(&scene, &[rock, rocks]);
        assert_eq!(ancestors, vec![rocks, a]);
    }

    #[test]
    fn sorted_by_path_is_deterministic() {
        let (scene, a, b) = two_islands();
        let sorted = sorted_by_path(&scene, &[a, b]).unwrap();
        // "/Island_A" < "/Island_B"
        assert_eq!(sorted, vec![b, a]);
    }
}
