//! Attribute-set rule resolution: evaluating a [`KeepRule`] fallback chain
//! against the concrete sets on one node.

use scenepipe_scene::SceneGraph;
use scenepipe_types::{AttributeSet, KeepMode, KeepRule, NodeId, Result, Selector, SetKind};
use tracing::debug;

/// The partition a rule produces over one node's sets of one kind.
/// `matched` and `unmatched` never overlap and together cover every set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPartition {
    pub matched: Vec<AttributeSet>,
    pub unmatched: Vec<AttributeSet>,
}

impl SetPartition {
    /// The sets the rule says to retain, honoring the rule's mode.
    pub fn retained(&self, mode: KeepMode) -> &[AttributeSet] {
        match mode {
            KeepMode::Keep => &self.matched,
            KeepMode::Remove => &self.unmatched,
        }
    }

    /// The sets the rule says to delete, honoring the rule's mode.
    pub fn removed(&self, mode: KeepMode) -> &[AttributeSet] {
        match mode {
            KeepMode::Keep => &self.unmatched,
            KeepMode::Remove => &self.matched,
        }
    }
}

/// Resolve one selector against the snapshot. `None` means "does not apply
/// here" and the fallback chain moves on.
fn resolve_selector<'a>(
    selector: &Selector,
    all_sets: &'a [AttributeSet],
) -> Option<&'a AttributeSet> {
    match selector {
        Selector::ByName(name) => all_sets.iter().find(|s| &s.name == name),
        Selector::ByOrdinal(0) => all_sets.iter().find(|s| s.is_current),
        Selector::ByOrdinal(k) if *k > 0 => {
            let idx = (*k - 1) as usize;
            all_sets.get(idx)
        }
        Selector::ByOrdinal(k) => {
            // Negative: 1-based from the end. Out of range is a skip.
            let back = k.unsigned_abs() as usize;
            if back <= all_sets.len() {
                all_sets.get(all_sets.len() - back)
            } else {
                None
            }
        }
    }
}

/// Evaluate `rule` against the sets of `kind` on `node`.
///
/// Elements are evaluated left to right, each stopping at its first selector
/// that resolves; an element where nothing resolves contributes nothing.
/// Matches accumulate deduplicated in first-seen order, and ordinals are
/// interpreted against the snapshot taken at call time.
pub fn resolve_rule(
    scene: &dyn SceneGraph,
    node: NodeId,
    kind: SetKind,
    rule: &KeepRule,
) -> SetPartition {
    let all_sets = scene.attribute_sets_of(node, kind);

    let mut matched: Vec<AttributeSet> = Vec::new();
    for element in &rule.elements {
        let hit = element
            .iter()
            .find_map(|selector| resolve_selector(selector, &all_sets));
        if let Some(set) = hit {
            if !matched.iter().any(|m| m.name == set.name) {
                matched.push(set.clone());
            }
        }
    }

    let unmatched = all_sets
        .iter()
        .filter(|s| !matched.iter().any(|m| m.name == s.name))
        .cloned()
        .collect();

    SetPartition { matched, unmatched }
}

/// Rename the first set of `kind` on `node` to the canonical name.
/// Returns whether a rename actually happened.
pub fn rename_first_set(
    scene: &mut dyn SceneGraph,
    node: NodeId,
    kind: SetKind,
    canonical: &str,
) -> Result<bool> {
    let sets = scene.attribute_sets_of(node, kind);
    let Some(first) = sets.first() else {
        return Ok(false);
    };
    if first.name == canonical {
        return Ok(false);
    }
    let from = first.name.clone();
    scene.rename_attribute_set(node, kind, &from, canonical)?;
    debug!(node = node.0, %from, to = canonical, "renamed first set");
    Ok(true)
}

/// Delete every set the rule does not retain. Returns the deleted names.
pub fn remove_extra_sets(
    scene: &mut dyn SceneGraph,
    node: NodeId,
    kind: SetKind,
    rule: &KeepRule,
) -> Result<Vec<String>> {
    let partition = resolve_rule(scene, node, kind, rule);
    let doomed: Vec<String> = partition
        .removed(rule.mode)
        .iter()
        .map(|s| s.name.clone())
        .collect();
    for name in &doomed {
        scene.delete_attribute_set(node, kind, name)?;
    }
    Ok(doomed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenepipe_scene::MemoryScene;

    /// A mesh with UV sets `["map1", "LM", "extra"]`, current = `map1`.
    fn mesh_with_sets() -> (MemoryScene, NodeId) {
        let mut scene = MemoryScene::new();
        let root = scene.add_root("Island");
        let mesh = scene.add_mesh(root, "ground").unwrap();
        scene
            .set_uv_sets(mesh, &["map1", "LM", "extra"], 0)
            .unwrap();
        (scene, mesh)
    }

    fn names(sets: &[AttributeSet]) -> Vec<&str> {
        sets.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn name_then_ordinal_fallback_chain() {
        // [["LM"], [1]] keeps LM (by name) and map1 (first set).
        let (scene, mesh) = mesh_with_sets();
        let rule = KeepRule::keep(vec![
            vec![Selector::ByName("LM".into())],
            vec![Selector::ByOrdinal(1)],
        ]);
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        assert_eq!(names(&partition.matched), vec!["LM", "map1"]);
        assert_eq!(names(&partition.unmatched), vec!["extra"]);
    }

    #[test]
    fn empty_remove_rule_retains_everything() {
        let (scene, mesh) = mesh_with_sets();
        let rule = KeepRule::keep_all();
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        assert!(partition.matched.is_empty());
        assert_eq!(
            names(partition.retained(rule.mode)),
            vec!["map1", "LM", "extra"]
        );
        assert!(partition.removed(rule.mode).is_empty());
    }

    #[test]
    fn empty_keep_rule_retains_nothing() {
        let (scene, mesh) = mesh_with_sets();
        let rule = KeepRule::keep_none();
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        assert!(partition.retained(rule.mode).is_empty());
        assert_eq!(partition.removed(rule.mode).len(), 3);
    }

    #[test]
    fn ordinal_zero_selects_current() {
        let (mut scene, mesh) = mesh_with_sets();
        scene
            .set_current_attribute_set(mesh, SetKind::Uv, "LM")
            .unwrap();
        let rule = KeepRule::keep(vec![vec![Selector::ByOrdinal(0)]]);
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        assert_eq!(names(&partition.matched), vec!["LM"]);
    }

    #[test]
    fn negative_ordinal_counts_from_end() {
        let (scene, mesh) = mesh_with_sets();
        let rule = KeepRule::keep(vec![vec![Selector::ByOrdinal(-1)], vec![Selector::ByOrdinal(-3)]]);
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        assert_eq!(names(&partition.matched), vec!["extra", "map1"]);
    }

    #[test]
    fn out_of_range_ordinal_is_a_skip_not_an_error() {
        let (scene, mesh) = mesh_with_sets();
        let rule = KeepRule::keep(vec![
            vec![Selector::ByOrdinal(10)],
            vec![Selector::ByOrdinal(-5)],
        ]);
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        assert!(partition.matched.is_empty());
        assert_eq!(partition.unmatched.len(), 3);
    }

    #[test]
    fn fallback_stops_at_first_resolving_selector() {
        let (scene, mesh) = mesh_with_sets();
        // LM_out does not exist, LM does; the element resolves to LM only.
        let rule = KeepRule::keep(vec![vec![
            Selector::ByName("LM_out".into()),
            Selector::ByName("LM".into()),
            Selector::ByName("extra".into()),
        ]]);
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        assert_eq!(names(&partition.matched), vec!["LM"]);
    }

    #[test]
    fn duplicate_matches_collapse_preserving_first_seen() {
        let (scene, mesh) = mesh_with_sets();
        // Both elements resolve to map1 (current and first).
        let rule = KeepRule::keep(vec![
            vec![Selector::ByOrdinal(0)],
            vec![Selector::ByOrdinal(1)],
            vec![Selector::ByName("LM".into())],
        ]);
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        assert_eq!(names(&partition.matched), vec!["map1", "LM"]);
    }

    #[test]
    fn partition_is_exact() {
        let (scene, mesh) = mesh_with_sets();
        let rule = KeepRule::keep(vec![vec![Selector::ByName("LM".into())]]);
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        let mut all: Vec<&str> = names(&partition.matched);
        all.extend(names(&partition.unmatched));
        all.sort_unstable();
        assert_eq!(all, vec!["LM", "extra", "map1"]);
    }

    #[test]
    fn rename_first_set_to_canonical() {
        let (mut scene, mesh) = mesh_with_sets();
        scene
            .set_uv_sets(mesh, &["uvSet1", "LM"], 0)
            .unwrap();
        assert!(rename_first_set(&mut scene, mesh, SetKind::Uv, "map1").unwrap());
        assert_eq!(scene.set_names(mesh, SetKind::Uv), vec!["map1", "LM"]);
        // Idempotent on a second run.
        assert!(!rename_first_set(&mut scene, mesh, SetKind::Uv, "map1").unwrap());
    }

    #[test]
    fn rename_resolves_by_current_name_not_target() {
        // A set literally named like the rename target elsewhere must still
        // be matched by its on-disk name: no look-ahead.
        let (mut scene, mesh) = mesh_with_sets();
        let rule = KeepRule::keep(vec![vec![Selector::ByName("map1".into())]]);
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        assert_eq!(names(&partition.matched), vec!["map1"]);

        scene
            .rename_attribute_set(mesh, SetKind::Uv, "map1", "base")
            .unwrap();
        let partition = resolve_rule(&scene, mesh, SetKind::Uv, &rule);
        assert!(partition.matched.is_empty());
    }

    #[test]
    fn remove_extra_sets_applies_partition() {
        let (mut scene, mesh) = mesh_with_sets();
        let rule = KeepRule::keep(vec![
            vec![Selector::ByOrdinal(1)],
            vec![Selector::ByName("LM".into())],
        ]);
        let removed = remove_extra_sets(&mut scene, mesh, SetKind::Uv, &rule).unwrap();
        assert_eq!(removed, vec!["extra"]);
        assert_eq!(scene.set_names(mesh, SetKind::Uv), vec!["map1", "LM"]);
    }

    #[test]
    fn default_uv_keep_against_typical_island_mesh() {
        let (mut scene, mesh) = mesh_with_sets();
        scene
            .set_uv_sets(mesh, &["map1", "LM_out", "windUVs", "bakeTmp"], 0)
            .unwrap();
        let removed =
            remove_extra_sets(&mut scene, mesh, SetKind::Uv, &KeepRule::default_uv_keep())
                .unwrap();
        assert_eq!(removed, vec!["bakeTmp"]);
    }
}
