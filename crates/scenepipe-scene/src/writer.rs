//! Interchange-file writer seam and its built-in implementations.

use std::path::{Path, PathBuf};

use scenepipe_types::{NodeId, Result, SetKind};
use tracing::info;

use crate::graph::SceneGraph;

/// Abstraction over the on-disk interchange writer. One call per export unit.
pub trait InterchangeWriter {
    fn write(&mut self, path: &Path, roots: &[NodeId], scene: &dyn SceneGraph) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JsonSnapshotWriter
// ---------------------------------------------------------------------------

/// Writes each export unit as a pretty-printed JSON snapshot of its subtree.
///
/// This is a debug artifact, not an interchange format: it exists so headless
/// runs produce something inspectable without a host application attached.
pub struct JsonSnapshotWriter;

impl JsonSnapshotWriter {
    fn snapshot(scene: &dyn SceneGraph, id: NodeId) -> Result<serde_json::Value> {
        let children = scene
            .children_of(id)
            .into_iter()
            .map(|c| Self::snapshot(scene, c))
            .collect::<Result<Vec<_>>>()?;
        let set_names = |kind: SetKind| -> Vec<String> {
            scene
                .attribute_sets_of(id, kind)
                .into_iter()
                .map(|s| s.name)
                .collect()
        };
        Ok(serde_json::json!({
            "name": scene.name(id)?,
            "has_geometry": scene.has_geometry(id),
            "uv_sets": set_names(SetKind::Uv),
            "color_sets": set_names(SetKind::Color),
            "children": children,
        }))
    }
}

impl InterchangeWriter for JsonSnapshotWriter {
    fn write(&mut self, path: &Path, roots: &[NodeId], scene: &dyn SceneGraph) -> Result<()> {
        let snapshots = roots
            .iter()
            .map(|r| Self::snapshot(scene, *r))
            .collect::<Result<Vec<_>>>()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&snapshots)?)?;
        info!(path = %path.display(), roots = roots.len(), "wrote snapshot");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingWriter
// ---------------------------------------------------------------------------

/// Test double that records every write call and leaves a stub file behind,
/// so overwrite-policy checks see the target as existing.
#[derive(Default)]
pub struct RecordingWriter {
    calls: Vec<(PathBuf, Vec<NodeId>)>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[(PathBuf, Vec<NodeId>)] {
        &self.calls
    }

    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.calls.iter().map(|(p, _)| p.clone()).collect()
    }
}

impl InterchangeWriter for RecordingWriter {
    fn write(&mut self, path: &Path, roots: &[NodeId], _scene: &dyn SceneGraph) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"")?;
        self.calls.push((path.to_path_buf(), roots.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryScene;

    #[test]
    fn json_snapshot_writes_subtree() {
        let mut scene = MemoryScene::new();
        let island = scene.add_root("Island_01");
        let group = scene.add_group(island, "Rocks").unwrap();
        scene.add_mesh(group, "rock_a").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Island_01.json");
        JsonSnapshotWriter
            .write(&path, &[island], &scene)
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0]["name"], "Island_01");
        assert_eq!(parsed[0]["children"][0]["name"], "Rocks");
        assert_eq!(
            parsed[0]["children"][0]["children"][0]["uv_sets"][0],
            "map1"
        );
    }

    #[test]
    fn recording_writer_leaves_stub_and_records() {
        let scene = MemoryScene::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unit.fbx");

        let mut writer = RecordingWriter::new();
        writer.write(&path, &[NodeId(5)], &scene).unwrap();

        assert!(path.exists());
        assert_eq!(writer.calls().len(), 1);
        assert_eq!(writer.calls()[0].1, vec![NodeId(5)]);
    }
}
