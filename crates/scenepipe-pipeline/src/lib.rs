//! Scene export pipeline engine: hierarchy resolution, attribute-set rules,
//! retention classification, child-group combining, and batch export.
//!
//! This crate implements the core scenepipe runner: canonical object-list
//! resolution, UV/color set cleanup with escalation for ambiguous retention
//! matches, the child-group combine rewrite, and the export orchestrator
//! with per-file overwrite policy.

pub mod combine;
pub mod controller;
pub mod export;
pub mod hierarchy;
pub mod retention;
pub mod rules;

pub use combine::{combine, CombineRule};
pub use controller::{run_pipeline, Pipeline, PipelineConfig};
pub use export::{
    AlwaysOverwrite, AlwaysSkip, ConflictResolver, ExportReport, ExportUnit, Exporter,
    ScriptedConflicts,
};
pub use hierarchy::{
    all_ancestors, expand_descendants, export_closure, resolve_objects, sorted_by_path,
};
pub use retention::{
    AutoDiscard, AutoKeep, Classifier, ConsoleEscalation, Decision, Escalation,
    RecordingEscalation, RetentionPolicy,
};
pub use rules::{remove_extra_sets, rename_first_set, resolve_rule, SetPartition};
