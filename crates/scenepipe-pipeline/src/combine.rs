//! Child-group combining: a bounded tree rewrite that replaces selected
//! child groups with a single merged, normalized object in the same
//! hierarchy position under the same name.

use scenepipe_scene::SceneGraph;
use scenepipe_types::{NodeId, PipelineError, Result};
use tracing::debug;

// ---------------------------------------------------------------------------
// CombineRule
// ---------------------------------------------------------------------------

/// Predicate over a child node's name selecting the groups to combine.
/// Pure: evaluation never mutates scene state.
pub struct CombineRule {
    predicate: Box<dyn Fn(&str) -> bool>,
}

impl CombineRule {
    /// Lowercased name ends with the given suffix (itself lowercased).
    pub fn name_ends_with(suffix: &str) -> Self {
        let suffix = suffix.to_lowercase();
        Self::custom(move |name| name.to_lowercase().ends_with(&suffix))
    }

    /// Like `name_ends_with`, but with trailing digits and plural `s`
    /// stripped first, so `Island_Waterfalls2` matches `_waterfall`.
    pub fn name_ends_with_trimmed(suffix: &str) -> Self {
        let suffix = suffix.to_lowercase();
        Self::custom(move |name| {
            name.to_lowercase()
                .trim_end_matches(|c: char| c.is_ascii_digit() || c == 's')
                .ends_with(&suffix)
        })
    }

    pub fn custom(predicate: impl Fn(&str) -> bool + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        (self.predicate)(name)
    }
}

// ---------------------------------------------------------------------------
// Combining
// ---------------------------------------------------------------------------

/// Freeze transform, strip construction history, reset pivot.
fn normalize(scene: &mut dyn SceneGraph, id: NodeId) -> Result<()> {
    scene.freeze_transform(id)?;
    scene.delete_construction_history(&[id])?;
    scene.reset_pivot(id)?;
    Ok(())
}

/// Combine one selected child group. Returns the node now occupying the
/// group's old position, if any.
///
/// The resulting object (merge, promotion, or normalized leaf) keeps the
/// group's hierarchy position and name; downstream steps never need to know
/// which branch ran.
fn combine_single(scene: &mut dyn SceneGraph, group: NodeId) -> Result<Option<NodeId>> {
    let name = scene.name(group)?;
    let parent = scene.parent_of(group);
    let children = scene.children_of(group);

    if children.is_empty() {
        if scene.has_geometry(group) {
            // A leaf that is itself geometry: normalize in place, no rename.
            normalize(scene, group)?;
            return Ok(Some(group));
        }
        // Dead weight: nothing to merge, nothing to keep.
        debug!(group = group.0, %name, "dropping empty group");
        scene.delete(group)?;
        return Ok(None);
    }

    if scene.has_geometry(group) {
        // A group that both carries geometry and has children is left alone;
        // collapsing it would discard its own mesh.
        return Ok(Some(group));
    }

    let combined = if children.len() == 1 {
        // Promote the only child. The extra freeze prevents the reparent
        // from introducing a scale-parent.
        let child = children[0];
        scene.freeze_transform(child)?;
        child
    } else {
        scene.merge_geometry(&children)?
    };

    scene.reparent(combined, parent)?;
    normalize(scene, combined)?;

    // Free the name before reusing it. The old group may already be gone,
    // swallowed by merge history.
    if scene.exists(group) {
        scene.delete(group)?;
    }
    scene.rename(combined, &name)?;
    debug!(%name, node = combined.0, "combined child group");
    Ok(Some(combined))
}

/// Under each root, combine every immediate child group matching `rule`.
/// Returns the resulting nodes across all roots, in processing order.
///
/// A failure mid-rewrite propagates as `CombineFailure` and leaves the
/// current group in whatever intermediate state the scene is in; there is
/// no rollback.
pub fn combine(
    scene: &mut dyn SceneGraph,
    roots: &[NodeId],
    rule: &CombineRule,
) -> Result<Vec<NodeId>> {
    let mut results = Vec::new();
    for root in roots {
        let selected: Vec<NodeId> = scene
            .children_of(*root)
            .into_iter()
            .filter(|child| {
                scene
                    .name(*child)
                    .map(|n| rule.matches(&n))
                    .unwrap_or(false)
            })
            .collect();
        for group in selected {
            let group_name = scene.name(group).unwrap_or_else(|_| group.to_string());
            let combined = combine_single(scene, group).map_err(|e| match e {
                already @ PipelineError::CombineFailure { .. } => already,
                other => PipelineError::CombineFailure {
                    group: group_name.clone(),
                    message: other.to_string(),
                },
            })?;
            results.extend(combined);
        }
    }
    Ok(results)
}
