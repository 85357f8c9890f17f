//! Retention classification: tiered name patterns deciding whether a node's
//! color data survives export, with escalation for ambiguous matches.

use regex::{Regex, RegexBuilder};
use scenepipe_types::{PipelineError, Result, RetentionChoice};
use tracing::debug;

// ---------------------------------------------------------------------------
// RetentionPolicy
// ---------------------------------------------------------------------------

/// Tiered pattern policy.
///
/// `exact_tier` patterns are case-sensitive and decide "keep" outright.
/// `fallback_tier` patterns run against the lowercased name and always
/// escalate, carrying the canonical label the name was expected to use.
pub struct RetentionPolicy {
    exact_tier: Vec<Regex>,
    fallback_tier: Vec<(Regex, String)>,
}

impl RetentionPolicy {
    pub fn new(exact_tier: Vec<Regex>, fallback_tier: Vec<(Regex, String)>) -> Self {
        Self {
            exact_tier,
            fallback_tier,
        }
    }

    /// Build both tiers from canonical name fragments. A node keeps its
    /// colors when its name ends in `_{part}` plus an optional alphanumeric
    /// tail; a case-mangled variant of the same shape escalates instead.
    pub fn from_name_parts(parts: &[&str]) -> Result<Self> {
        let compile = |pattern: &str| -> Result<Regex> {
            Regex::new(pattern)
                .map_err(|e| PipelineError::Other(format!("bad retention pattern: {e}")))
        };
        let mut exact_tier = Vec::with_capacity(parts.len());
        let mut fallback_tier = Vec::with_capacity(parts.len());
        for part in parts {
            exact_tier.push(compile(&format!(
                "^.*_{}[0-9A-Za-z]*$",
                regex::escape(part)
            ))?);
            fallback_tier.push((
                compile(&format!(
                    "^.*_{}[0-9A-Za-z]*$",
                    regex::escape(&part.to_lowercase())
                ))?,
                part.to_string(),
            ));
        }
        Ok(Self::new(exact_tier, fallback_tier))
    }

    /// The stock island policy from the production scenes.
    pub fn island_defaults() -> Result<Self> {
        Self::from_name_parts(&["IslandUp", "GroundPatch", "Rock", "Flag", "IslandDn"])
    }

    /// A catch-all policy: every node is kept without escalation.
    pub fn keep_everything() -> Self {
        // `.*` always compiles.
        let catch_all = RegexBuilder::new(".*").build().into_iter().collect();
        Self::new(catch_all, Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Escalation seam
// ---------------------------------------------------------------------------

/// Blocking decision point for ambiguous retention matches. Supplied by the
/// caller: an interactive UI, or one of the unattended policies below.
pub trait Escalation {
    fn decide(&mut self, name: &str, canonical: &str) -> Result<RetentionChoice>;
}

/// Unattended policy: keep every ambiguous match.
pub struct AutoKeep;

impl Escalation for AutoKeep {
    fn decide(&mut self, _name: &str, _canonical: &str) -> Result<RetentionChoice> {
        Ok(RetentionChoice::Keep)
    }
}

/// Unattended policy: discard every ambiguous match.
pub struct AutoDiscard;

impl Escalation for AutoDiscard {
    fn decide(&mut self, _name: &str, _canonical: &str) -> Result<RetentionChoice> {
        Ok(RetentionChoice::Discard)
    }
}

/// Interactive stdin/stdout escalation.
pub struct ConsoleEscalation;

impl Escalation for ConsoleEscalation {
    fn decide(&mut self, name: &str, canonical: &str) -> Result<RetentionChoice> {
        println!(
            "\n'{name}' looks like a '{canonical}' object but the case differs."
        );
        println!("  [1] keep its colors");
        println!("  [2] discard its colors");
        println!("  [3] keep colors for all remaining matches");
        println!("  [4] abort the export");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        Ok(match input.trim() {
            "2" => RetentionChoice::Discard,
            "3" => RetentionChoice::KeepAll,
            "4" => RetentionChoice::Abort,
            _ => RetentionChoice::Keep,
        })
    }
}

/// Test double that plays back a scripted sequence of choices and records
/// every question it was asked. Running out of script means keep.
pub struct RecordingEscalation {
    script: Vec<RetentionChoice>,
    asked: Vec<(String, String)>,
}

impl RecordingEscalation {
    pub fn new(script: Vec<RetentionChoice>) -> Self {
        let mut reversed = script;
        reversed.reverse();
        Self {
            script: reversed,
            asked: Vec::new(),
        }
    }

    pub fn asked(&self) -> &[(String, String)] {
        &self.asked
    }
}

impl Escalation for RecordingEscalation {
    fn decide(&mut self, name: &str, canonical: &str) -> Result<RetentionChoice> {
        self.asked.push((name.to_string(), canonical.to_string()));
        Ok(self.script.pop().unwrap_or(RetentionChoice::Keep))
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// The per-node outcome of one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Kept,
    Discarded,
}

/// One classification pass. The session override set by a `KeepAll` choice
/// lives exactly as long as this value.
pub struct Classifier<'p> {
    policy: &'p RetentionPolicy,
    override_active: bool,
}

impl<'p> Classifier<'p> {
    pub fn new(policy: &'p RetentionPolicy) -> Self {
        Self {
            policy,
            override_active: false,
        }
    }

    pub fn override_active(&self) -> bool {
        self.override_active
    }

    /// Classify one node name. Escalates on a fallback-tier match; an
    /// `Abort` choice cancels the whole run via `RetentionAborted`.
    pub fn classify(
        &mut self,
        name: &str,
        escalate: &mut dyn Escalation,
    ) -> Result<Decision> {
        if self.override_active {
            return Ok(Decision::Kept);
        }

        if self.policy.exact_tier.iter().any(|re| re.is_match(name)) {
            return Ok(Decision::Kept);
        }

        let lowered = name.to_lowercase();
        for (pattern, canonical) in &self.policy.fallback_tier {
            if pattern.is_match(&lowered) {
                debug!(%name, %canonical, "escalating ambiguous retention match");
                return match escalate.decide(name, canonical)? {
                    RetentionChoice::Keep => Ok(Decision::Kept),
                    RetentionChoice::Discard => Ok(Decision::Discarded),
                    RetentionChoice::KeepAll => {
                        self.override_active = true;
                        Ok(Decision::Kept)
                    }
                    RetentionChoice::Abort => Err(PipelineError::RetentionAborted {
                        node: name.to_string(),
                    }),
                };
            }
        }

        Ok(Decision::Discarded)
    }
}
