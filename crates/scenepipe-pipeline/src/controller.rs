//! The pipeline controller: wires the individual stages into the canonical
//! prepare-and-export sequence over one scene.

use std::path::PathBuf;

use scenepipe_scene::{InterchangeWriter, SceneGraph};
use scenepipe_types::{ExportPolicy, KeepRule, NodeId, Result, SetKind};
use tracing::info;

use crate::combine::{combine, CombineRule};
use crate::export::{ConflictResolver, ExportReport, ExportUnit, Exporter};
use crate::hierarchy::{all_ancestors, export_closure, resolve_objects, sorted_by_path};
use crate::retention::{Classifier, Decision, Escalation, RetentionPolicy};
use crate::rules::{remove_extra_sets, rename_first_set};

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

/// Everything a pipeline run needs besides the scene itself.
pub struct PipelineConfig {
    /// Which UV sets survive on each geometry node.
    pub keep_rule: KeepRule,
    /// Canonical name for each node's first UV set.
    pub first_set_name: String,
    /// Color retention policy. `None` skips color cleanup entirely.
    pub retention: Option<RetentionPolicy>,
    /// Child groups matching any of these rules are combined under each root.
    pub combine_rules: Vec<CombineRule>,
    pub export_policy: ExportPolicy,
    pub folder: PathBuf,
    pub extension: String,
    /// Nodes with these names survive `remove_unmarked` even when outside
    /// the export closure. Host-owned objects like default cameras.
    pub protected: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keep_rule: KeepRule::default_uv_keep(),
            first_set_name: "map1".to_string(),
            retention: None,
            combine_rules: Vec::new(),
            export_policy: ExportPolicy::Overwrite,
            folder: PathBuf::new(),
            extension: "fbx".to_string(),
            protected: ["persp", "top", "front", "side"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl PipelineConfig {
    /// The production island configuration: stock UV keep rule, island color
    /// retention, and one combine rule per canonical island part.
    pub fn island_defaults(folder: impl Into<PathBuf>) -> Result<Self> {
        let parts = ["IslandUp", "GroundPatch", "Rock", "Flag", "IslandDn"];
        Ok(Self {
            retention: Some(RetentionPolicy::from_name_parts(&parts)?),
            combine_rules: parts
                .iter()
                .map(|part| CombineRule::name_ends_with(&format!("_{part}")))
                .collect(),
            folder: folder.into(),
            ..Self::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// One run over one scene. Steps are explicit methods so a caller can run the
/// canonical sequence ([`run_pipeline`]) or any subset in order.
pub struct Pipeline<'s> {
    scene: &'s mut dyn SceneGraph,
    config: PipelineConfig,
    working: Vec<NodeId>,
}

impl std::fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("working", &self.working)
            .finish_non_exhaustive()
    }
}

impl<'s> Pipeline<'s> {
    /// Resolve the working set. Empty `roots` falls back to the active
    /// selection; dead references fail here, before anything is mutated.
    pub fn new(
        scene: &'s mut dyn SceneGraph,
        config: PipelineConfig,
        roots: &[NodeId],
    ) -> Result<Self> {
        let working = resolve_objects(&*scene, roots, true)?;
        info!(count = working.len(), "pipeline working set resolved");
        Ok(Self {
            scene,
            config,
            working,
        })
    }

    /// The current working set of export roots.
    pub fn working(&self) -> &[NodeId] {
        &self.working
    }

    /// Move every export root to world level so targets import without
    /// inherited transforms.
    pub fn unparent_to_root(&mut self) -> Result<&mut Self> {
        for id in self.working.clone() {
            if self.scene.parent_of(id).is_some() {
                self.scene.reparent(id, None)?;
            }
        }
        Ok(self)
    }

    /// Delete every node outside the export closure, its ancestry, and the
    /// protected list. Deletion goes in path order so parents fall before
    /// children and each id is checked for liveness first.
    pub fn remove_unmarked(&mut self) -> Result<&mut Self> {
        let mut kept = export_closure(&*self.scene, &self.working);
        kept.extend(all_ancestors(&*self.scene, &self.working));
        for id in self.scene.all_nodes() {
            let name = self.scene.name(id)?;
            if self.config.protected.iter().any(|p| *p == name) {
                kept.extend(export_closure(&*self.scene, &[id]));
                kept.extend(all_ancestors(&*self.scene, &[id]));
            }
        }

        let doomed: Vec<NodeId> = self
            .scene
            .all_nodes()
            .into_iter()
            .filter(|id| !kept.contains(id))
            .collect();
        let mut removed = 0usize;
        for id in sorted_by_path(&*self.scene, &doomed)? {
            if self.scene.exists(id) {
                self.scene.delete(id)?;
                removed += 1;
            }
        }
        info!(removed, "removed nodes outside the export set");
        Ok(self)
    }

    /// Canonicalize the first UV set's name and strip the sets the keep rule
    /// does not retain, on every geometry node in the closure.
    pub fn normalize_uv_sets(&mut self) -> Result<&mut Self> {
        for node in export_closure(&*self.scene, &self.working) {
            if !self.scene.has_geometry(node) {
                continue;
            }
            rename_first_set(self.scene, node, SetKind::Uv, &self.config.first_set_name)?;
            remove_extra_sets(self.scene, node, SetKind::Uv, &self.config.keep_rule)?;
        }
        Ok(self)
    }

    /// Combine child groups under every root, one configured rule at a time.
    pub fn combine_child_groups(&mut self) -> Result<&mut Self> {
        for rule in &self.config.combine_rules {
            combine(&mut *self.scene, &self.working, rule)?;
        }
        Ok(self)
    }

    /// Classify every geometry node in the closure against the retention
    /// policy and drop all color sets on discarded nodes. A configured
    /// `retention` of `None` makes this a no-op.
    pub fn cleanup_color_sets(&mut self, escalate: &mut dyn Escalation) -> Result<&mut Self> {
        let Some(policy) = &self.config.retention else {
            return Ok(self);
        };
        let mut classifier = Classifier::new(policy);
        for node in export_closure(&*self.scene, &self.working) {
            if !self.scene.has_geometry(node) {
                continue;
            }
            let name = self.scene.name(node)?;
            if classifier.classify(&name, escalate)? == Decision::Kept {
                continue;
            }
            for set in self.scene.attribute_sets_of(node, SetKind::Color) {
                self.scene
                    .delete_attribute_set(node, SetKind::Color, &set.name)?;
            }
            info!(%name, "discarded color sets");
        }
        Ok(self)
    }

    /// Strip construction history from the whole export closure.
    pub fn cleanup_history(&mut self) -> Result<&mut Self> {
        let closure = export_closure(&*self.scene, &self.working);
        self.scene.delete_construction_history(&closure)?;
        Ok(self)
    }

    /// Scene-wide cleanup of orphaned object sets and unused nodes.
    pub fn cleanup_scene(&mut self) -> Result<&mut Self> {
        self.scene.delete_orphan_object_sets()?;
        self.scene.delete_unused_nodes()?;
        Ok(self)
    }

    /// Export every working root as one unit.
    pub fn export(
        &mut self,
        writer: &mut dyn InterchangeWriter,
        resolve_conflict: Option<&mut dyn ConflictResolver>,
    ) -> Result<ExportReport> {
        let units = self
            .working
            .iter()
            .map(|id| ExportUnit::from_node(&*self.scene, *id))
            .collect::<Result<Vec<_>>>()?;
        Exporter::new(self.config.folder.clone())
            .with_extension(&self.config.extension)
            .export_all(
                &*self.scene,
                &units,
                self.config.export_policy,
                writer,
                resolve_conflict,
            )
    }
}

/// The canonical end-to-end sequence: resolve, unparent, prune, normalize
/// UVs, combine groups, clean colors and history, then export.
pub fn run_pipeline(
    scene: &mut dyn SceneGraph,
    config: PipelineConfig,
    roots: &[NodeId],
    escalate: &mut dyn Escalation,
    writer: &mut dyn InterchangeWriter,
    resolve_conflict: Option<&mut dyn ConflictResolver>,
) -> Result<ExportReport> {
    let mut pipeline = Pipeline::new(scene, config, roots)?;
    pipeline
        .unparent_to_root()?
        .remove_unmarked()?
        .normalize_uv_sets()?
        .combine_child_groups()?
        .cleanup_color_sets(escalate)?
        .cleanup_history()?
        .cleanup_scene()?;
    let report = pipeline.export(writer, resolve_conflict)?;
    info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        "pipeline run complete"
    );
    Ok(report)
}
