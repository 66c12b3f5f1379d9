//! Forward-chaining tag inference.
//!
//! A fixed [`RuleSet`] is evaluated against the base graph only; each match
//! asserts `(subject, rdf:type, targetClass)` into the inferred graph, which is
//! discarded and recomputed on every run.

pub mod engine;
pub mod rules;

pub use engine::{InferenceEngine, InferenceReport, InferenceState, RuleOutcome};
pub use rules::{Rule, RuleKind, RuleSet};
