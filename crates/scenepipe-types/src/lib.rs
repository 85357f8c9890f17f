//! Shared types, rules, and errors for the scenepipe export engine.
//!
//! This crate provides the foundational types used across the other scenepipe
//! crates:
//! - `PipelineError` — unified error taxonomy
//! - `NodeId` / `AttributeSet` — the scene data model the pipeline reads
//! - `KeepRule` / `Selector` — declarative attribute-set retention rules
//! - `ExportPolicy` and the escalation decision enums

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Unified error type for all scenepipe subsystems.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    // === Resolution errors ===
    #[error("Reference '{reference}' does not resolve to a live node")]
    UnresolvedReference { reference: String },

    #[error("Node '{node}' not found in scene")]
    NodeNotFound { node: String },

    #[error("Attribute set '{set}' not found on node '{node}'")]
    SetNotFound { node: String, set: String },

    // === Pipeline errors ===
    #[error("Export aborted while classifying node '{node}'")]
    RetentionAborted { node: String },

    #[error("Combining children of group '{group}' failed: {message}")]
    CombineFailure { group: String, message: String },

    // === Export errors ===
    #[error("Target file already exists: {}", path.display())]
    TargetExists { path: PathBuf },

    #[error("Nothing to export")]
    NothingToExport,

    #[error("Export folder is not specified")]
    EmptyFolder,

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Returns `true` if the error stops the whole pipeline run.
    ///
    /// Everything except per-unit IO failures is batch-fatal; user-skipped
    /// export units never surface as errors at all.
    pub fn is_batch_fatal(&self) -> bool {
        !matches!(self, PipelineError::Io(_))
    }

    /// Returns `true` if the error stems from an explicit user choice or
    /// configuration, rather than a pipeline bug or environment failure.
    /// Callers should present these as direct, actionable messages.
    pub fn is_user_choice(&self) -> bool {
        matches!(
            self,
            PipelineError::RetentionAborted { .. } | PipelineError::TargetExists { .. }
        )
    }
}

/// A convenience alias for `Result<T, PipelineError>`.
pub type Result<T> = std::result::Result<T, PipelineError>;

// ---------------------------------------------------------------------------
// NodeId — opaque handle to one scene object
// ---------------------------------------------------------------------------

/// Stable opaque handle to one scene object. Identity and lifetime are owned
/// by the scene; the pipeline only references nodes, never constructs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AttributeSet — one named UV-set or color-set on a node's geometry
// ---------------------------------------------------------------------------

/// The kind of a named attribute set. Each kind has its own ordering and its
/// own "current" set on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetKind {
    Uv,
    Color,
}

/// One named attribute set on a node, as observed in a single snapshot.
///
/// `ordinal` is the 1-based position among sets of the same kind on that
/// node. Ordinal selectors are only meaningful against the snapshot they
/// were read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSet {
    pub name: String,
    pub ordinal: usize,
    pub is_current: bool,
}

// ---------------------------------------------------------------------------
// KeepRule — declarative fallback-chain rule for attribute sets
// ---------------------------------------------------------------------------

/// One atomic match criterion inside a rule element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Match the set with this exact name, if it exists.
    ByName(String),
    /// Match by 1-based position: positive counts from the start, negative
    /// from the end, zero means "the current set".
    ByOrdinal(i64),
}

/// Whether the matched sets are the ones to retain or the ones to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepMode {
    Keep,
    Remove,
}

/// A declarative rule selecting which attribute sets to retain or remove.
///
/// Each element of `elements` is an ordered fallback sequence of selectors:
/// the first selector that resolves on a given node wins for that element,
/// and an element where nothing resolves contributes nothing. For example
///
/// ```
/// use scenepipe_types::{KeepRule, Selector};
/// let rule = KeepRule::keep(vec![
///     vec![Selector::ByOrdinal(1)],
///     vec![Selector::ByName("LM_out".into()), Selector::ByName("LM".into())],
/// ]);
/// ```
///
/// keeps the first set plus `LM_out` (falling back to `LM`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeepRule {
    pub elements: Vec<Vec<Selector>>,
    pub mode: KeepMode,
}

impl KeepRule {
    pub fn keep(elements: Vec<Vec<Selector>>) -> Self {
        Self {
            elements,
            mode: KeepMode::Keep,
        }
    }

    pub fn remove(elements: Vec<Vec<Selector>>) -> Self {
        Self {
            elements,
            mode: KeepMode::Remove,
        }
    }

    /// The rule that matches nothing and removes the match: retains every set.
    pub fn keep_all() -> Self {
        Self::remove(Vec::new())
    }

    /// The rule that matches nothing and keeps only the match: retains no set.
    pub fn keep_none() -> Self {
        Self::keep(Vec::new())
    }

    /// The stock UV cleanup rule: keep the first set, the lightmap set under
    /// any of its historical names, and the wind/array-id channels.
    pub fn default_uv_keep() -> Self {
        Self::keep(vec![
            vec![Selector::ByOrdinal(1)],
            vec![
                Selector::ByName("LM_color".into()),
                Selector::ByName("LM_out".into()),
                Selector::ByName("LM".into()),
            ],
            vec![Selector::ByName("windUVs".into())],
            vec![Selector::ByName("arrayID".into())],
        ])
    }
}

// ---------------------------------------------------------------------------
// ExportPolicy and escalation decisions
// ---------------------------------------------------------------------------

/// What to do when an export target file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPolicy {
    /// Raise `TargetExists` and abort the whole batch.
    FailIfExists,
    /// Silently replace the existing file.
    Overwrite,
    /// Ask the conflict callback per file; `Skip` omits the unit.
    PromptIfExists,
}

/// Outcome of a retention escalation. Normal control flow, not an error:
/// only `Abort` is turned into `PipelineError::RetentionAborted` by the
/// classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionChoice {
    Keep,
    Discard,
    Abort,
    /// Keep this node and every remaining ambiguous node in the same pass.
    KeepAll,
}

/// Outcome of an export-conflict escalation under `PromptIfExists`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictChoice {
    Overwrite,
    Skip,
}
