//! Batch export: per-unit target resolution, overwrite policy, and
//! partial-failure tolerance.

use std::path::{Path, PathBuf};

use scenepipe_scene::{InterchangeWriter, SceneGraph};
use scenepipe_types::{
    ConflictChoice, ExportPolicy, NodeId, PipelineError, Result,
};
use serde::Serialize;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// ExportUnit
// ---------------------------------------------------------------------------

/// One root node bound to one output file (named after the node).
#[derive(Debug, Clone)]
pub struct ExportUnit {
    pub root: NodeId,
    pub name: String,
}

impl ExportUnit {
    /// Build a unit from a live node, using its display name for the file.
    pub fn from_node(scene: &dyn SceneGraph, root: NodeId) -> Result<Self> {
        Ok(Self {
            root,
            name: scene.name(root)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Conflict resolution seam
// ---------------------------------------------------------------------------

/// Blocking decision point for pre-existing target files under
/// `PromptIfExists`.
pub trait ConflictResolver {
    fn resolve(&mut self, path: &Path) -> Result<ConflictChoice>;
}

/// Unattended policy: always replace.
pub struct AlwaysOverwrite;

impl ConflictResolver for AlwaysOverwrite {
    fn resolve(&mut self, _path: &Path) -> Result<ConflictChoice> {
        Ok(ConflictChoice::Overwrite)
    }
}

/// Unattended policy: always keep what is on disk.
pub struct AlwaysSkip;

impl ConflictResolver for AlwaysSkip {
    fn resolve(&mut self, _path: &Path) -> Result<ConflictChoice> {
        Ok(ConflictChoice::Skip)
    }
}

/// Test double playing back scripted choices and recording the paths it was
/// asked about. Running out of script means skip.
pub struct ScriptedConflicts {
    script: Vec<ConflictChoice>,
    asked: Vec<PathBuf>,
}

impl ScriptedConflicts {
    pub fn new(script: Vec<ConflictChoice>) -> Self {
        let mut reversed = script;
        reversed.reverse();
        Self {
            script: reversed,
            asked: Vec::new(),
        }
    }

    pub fn asked(&self) -> &[PathBuf] {
        &self.asked
    }
}

impl ConflictResolver for ScriptedConflicts {
    fn resolve(&mut self, path: &Path) -> Result<ConflictChoice> {
        self.asked.push(path.to_path_buf());
        Ok(self.script.pop().unwrap_or(ConflictChoice::Skip))
    }
}

// ---------------------------------------------------------------------------
// Exporter
// ---------------------------------------------------------------------------

/// Summary of one batch, serialized into the run log.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

/// Drives per-unit export into a folder through an [`InterchangeWriter`].
pub struct Exporter {
    folder: PathBuf,
    extension: String,
}

impl Exporter {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            extension: "fbx".to_string(),
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    fn target_path(&self, unit: &ExportUnit) -> PathBuf {
        self.folder.join(format!("{}.{}", unit.name, self.extension))
    }

    /// Export every unit, in input order.
    ///
    /// A unit skipped by the conflict resolver is omitted from the result and
    /// the batch continues: this is the one place where a single unit's
    /// failure does not abort the run. A plain write IO failure likewise
    /// only drops that unit. Everything else is batch-fatal.
    pub fn export_all(
        &self,
        scene: &dyn SceneGraph,
        units: &[ExportUnit],
        policy: ExportPolicy,
        writer: &mut dyn InterchangeWriter,
        mut resolve_conflict: Option<&mut dyn ConflictResolver>,
    ) -> Result<ExportReport> {
        if units.is_empty() {
            return Err(PipelineError::NothingToExport);
        }
        if self.folder.as_os_str().is_empty() {
            return Err(PipelineError::EmptyFolder);
        }
        std::fs::create_dir_all(&self.folder)?;

        // All-or-nothing: under FailIfExists any conflicting target anywhere
        // in the batch fails the call before a single file is written.
        if policy == ExportPolicy::FailIfExists {
            for unit in units {
                let path = self.target_path(unit);
                if path.exists() {
                    return Err(PipelineError::TargetExists { path });
                }
            }
        }

        let mut report = ExportReport::default();
        for unit in units {
            if !scene.exists(unit.root) {
                return Err(PipelineError::UnresolvedReference {
                    reference: unit.root.to_string(),
                });
            }
            let path = self.target_path(unit);

            if path.exists() {
                match policy {
                    ExportPolicy::FailIfExists => {
                        return Err(PipelineError::TargetExists { path });
                    }
                    ExportPolicy::Overwrite => {}
                    ExportPolicy::PromptIfExists => {
                        let resolver = resolve_conflict.as_deref_mut().ok_or_else(|| {
                            PipelineError::Other(
                                "prompt_if_exists policy requires a conflict resolver".into(),
                            )
                        })?;
                        match resolver.resolve(&path)? {
                            ConflictChoice::Overwrite => {}
                            ConflictChoice::Skip => {
                                info!(path = %path.display(), "unit skipped by caller");
                                report.skipped.push(path);
                                continue;
                            }
                        }
                    }
                }
                std::fs::remove_file(&path)?;
            }

            match writer.write(&path, &[unit.root], scene) {
                Ok(()) => {
                    info!(unit = %unit.name, path = %path.display(), "exported");
                    report.written.push(path);
                }
                Err(PipelineError::Io(e)) => {
                    warn!(unit = %unit.name, error = %e, "write failed, unit dropped");
                    report.failed.push(path);
                }
                Err(other) => return Err(other),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenepipe_scene::{MemoryScene, RecordingWriter};

    fn three_unit_scene() -> (MemoryScene, Vec<ExportUnit>) {
        let mut scene = MemoryScene::new();
        let mut units = Vec::new();
        for name in ["Island_01", "Island_02", "Island_03"] {
            let root = scene.add_root(name);
            scene.add_mesh(root, "ground").unwrap();
            units.push(ExportUnit {
                root,
                name: name.to_string(),
            });
        }
        (scene, units)
    }

    #[test]
    fn clean_folder_writes_every_unit_in_order() {
        let (scene, units) = three_unit_scene();
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordingWriter::new();

        let report = Exporter::new(dir.path())
            .export_all(&scene, &units, ExportPolicy::FailIfExists, &mut writer, None)
            .unwrap();

        let expected: Vec<PathBuf> = units
            .iter()
            .map(|u| dir.path().join(format!("{}.fbx", u.name)))
            .collect();
        assert_eq!(report.written, expected);
        assert!(report.skipped.is_empty());
        assert_eq!(writer.calls().len(), 3);
    }

    #[test]
    fn fail_if_exists_is_all_or_nothing() {
        let (scene, units) = three_unit_scene();
        let dir = tempfile::tempdir().unwrap();
        // Only the LAST unit's target pre-exists; nothing may be written.
        std::fs::write(dir.path().join("Island_03.fbx"), b"old").unwrap();
        let mut writer = RecordingWriter::new();

        let err = Exporter::new(dir.path())
            .export_all(&scene, &units, ExportPolicy::FailIfExists, &mut writer, None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::TargetExists { .. }));
        assert!(writer.calls().is_empty());
    }

    #[test]
    fn overwrite_replaces_existing_files() {
        let (scene, units) = three_unit_scene();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Island_02.fbx"), b"old").unwrap();
        let mut writer = RecordingWriter::new();

        let report = Exporter::new(dir.path())
            .export_all(&scene, &units, ExportPolicy::Overwrite, &mut writer, None)
            .unwrap();
        assert_eq!(report.written.len(), 3);
        // The stub left by the writer replaced the old content.
        assert_eq!(
            std::fs::read(dir.path().join("Island_02.fbx")).unwrap(),
            b""
        );
    }

    #[test]
    fn prompt_skip_omits_unit_and_continues() {
        // 3 units, unit 2 pre-exists, callback skips it.
        let (scene, units) = three_unit_scene();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Island_02.fbx"), b"old").unwrap();
        let mut writer = RecordingWriter::new();
        let mut resolver = ScriptedConflicts::new(vec![ConflictChoice::Skip]);

        let report = Exporter::new(dir.path())
            .export_all(
                &scene,
                &units,
                ExportPolicy::PromptIfExists,
                &mut writer,
                Some(&mut resolver),
            )
            .unwrap();

        assert_eq!(
            report.written,
            vec![
                dir.path().join("Island_01.fbx"),
                dir.path().join("Island_03.fbx"),
            ]
        );
        assert_eq!(report.skipped, vec![dir.path().join("Island_02.fbx")]);
        assert_eq!(resolver.asked(), &[dir.path().join("Island_02.fbx")]);
    }

    #[test]
    fn prompt_overwrite_writes_the_unit() {
        let (scene, units) = three_unit_scene();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Island_01.fbx"), b"old").unwrap();
        let mut writer = RecordingWriter::new();
        let mut resolver = ScriptedConflicts::new(vec![ConflictChoice::Overwrite]);

        let report = Exporter::new(dir.path())
            .export_all(
                &scene,
                &units,
                ExportPolicy::PromptIfExists,
                &mut writer,
                Some(&mut resolver),
            )
            .unwrap();
        assert_eq!(report.written.len(), 3);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn always_skip_never_raises_and_shortens_result() {
        let (scene, units) = three_unit_scene();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Island_01.fbx"), b"old").unwrap();
        std::fs::write(dir.path().join("Island_03.fbx"), b"old").unwrap();
        let mut writer = RecordingWriter::new();
        let mut resolver = AlwaysSkip;

        let report = Exporter::new(dir.path())
            .export_all(
                &scene,
                &units,
                ExportPolicy::PromptIfExists,
                &mut writer,
                Some(&mut resolver),
            )
            .unwrap();
        assert_eq!(report.written, vec![dir.path().join("Island_02.fbx")]);
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn empty_units_is_nothing_to_export() {
        let (scene, _) = three_unit_scene();
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordingWriter::new();
        let err = Exporter::new(dir.path())
            .export_all(&scene, &[], ExportPolicy::Overwrite, &mut writer, None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NothingToExport));
    }

    #[test]
    fn empty_folder_is_rejected_before_io() {
        let (scene, units) = three_unit_scene();
        let mut writer = RecordingWriter::new();
        let err = Exporter::new("")
            .export_all(&scene, &units, ExportPolicy::Overwrite, &mut writer, None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyFolder));
    }

    #[test]
    fn dead_unit_root_is_unresolved() {
        let (scene, mut units) = three_unit_scene();
        units[1].root = NodeId(999);
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordingWriter::new();
        let err = Exporter::new(dir.path())
            .export_all(&scene, &units, ExportPolicy::Overwrite, &mut writer, None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnresolvedReference { .. }));
    }

    #[test]
    fn extension_is_configurable() {
        let (scene, units) = three_unit_scene();
        let dir = tempfile::tempdir().unwrap();
        let mut writer = RecordingWriter::new();
        let report = Exporter::new(dir.path())
            .with_extension(".json")
            .export_all(&scene, &units[..1], ExportPolicy::Overwrite, &mut writer, None)
            .unwrap();
        assert_eq!(report.written, vec![dir.path().join("Island_01.json")]);
    }
}
