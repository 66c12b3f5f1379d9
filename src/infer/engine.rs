//! Inference runner: clears the inferred graph and re-evaluates every rule.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::InferError;
use crate::graph::index::TripleStore;
use crate::graph::{GraphKind, Triple};

use super::rules::RuleSet;

/// Lifecycle of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceState {
    Idle,
    Running,
}

/// What one rule contributed to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub rule: String,
    /// Local name of the asserted class.
    pub target_class: String,
    /// Distinct subjects tagged.
    pub count: usize,
    /// Set when the rule could not be evaluated and was skipped.
    pub error: Option<String>,
}

/// Result of one inference run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceReport {
    pub outcomes: Vec<RuleOutcome>,
    /// Inferred triples written.
    pub total: usize,
    /// Rules skipped because they failed.
    pub failed: usize,
    /// Inferred triples discarded before re-evaluation.
    pub cleared: usize,
    pub elapsed_ms: u64,
}

impl InferenceReport {
    /// Per-rule counts keyed by rule name.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.outcomes
            .iter()
            .map(|o| (o.rule.clone(), o.count))
            .collect()
    }

    pub fn count_for(&self, rule: &str) -> Option<usize> {
        self.outcomes.iter().find(|o| o.rule == rule).map(|o| o.count)
    }
}

/// Single-level forward-chaining evaluator over a fixed rule set.
#[derive(Debug)]
pub struct InferenceEngine {
    rules: RuleSet,
    running: AtomicBool,
}

/// Marks the engine as running until dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, InferError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| InferError::AlreadyRunning)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl InferenceEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            running: AtomicBool::new(false),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn state(&self) -> InferenceState {
        if self.running.load(Ordering::Acquire) {
            InferenceState::Running
        } else {
            InferenceState::Idle
        }
    }

    /// Discard the inferred graph and re-derive it from the base graph.
    ///
    /// A rule that fails to evaluate is logged, recorded in its outcome and
    /// skipped; the remaining rules still run.
    pub fn run(&self, store: &mut TripleStore) -> Result<InferenceReport, InferError> {
        let _guard = RunGuard::acquire(&self.running)?;
        let start = Instant::now();
        let cleared = store.clear_inferred();

        let mut outcomes = Vec::with_capacity(self.rules.len());
        let mut derived = Vec::new();
        let mut failed = 0;
        for rule in self.rules.iter() {
            let class = rule.target_class.local_name().to_string();
            match rule.matches(store.base()) {
                Ok(subjects) => {
                    tracing::debug!(rule = %rule.name, count = subjects.len(), "rule evaluated");
                    outcomes.push(RuleOutcome {
                        rule: rule.name.clone(),
                        target_class: class,
                        count: subjects.len(),
                        error: None,
                    });
                    derived.extend(
                        subjects
                            .into_iter()
                            .map(|s| Triple::type_assertion(s, rule.target_class.clone())),
                    );
                }
                Err(source) => {
                    let e = InferError::RuleExecution {
                        rule: rule.name.clone(),
                        message: source.to_string(),
                    };
                    tracing::warn!(rule = %rule.name, error = %e, "rule skipped");
                    failed += 1;
                    outcomes.push(RuleOutcome {
                        rule: rule.name.clone(),
                        target_class: class,
                        count: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let total = store.extend(GraphKind::Inferred, derived);
        let report = InferenceReport {
            outcomes,
            total,
            failed,
            cleared,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            total = report.total,
            failed = report.failed,
            elapsed_ms = report.elapsed_ms,
            "inference complete"
        );
        Ok(report)
    }
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self::new(RuleSet::builtin())
    }
}
