// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # smartplay-reasoner
//!
//! The reasoning layer of the SmartPlay fantasy-football backend: a fact graph
//! of players, teams and fixtures, a fixed forward-chaining rule set that
//! derives tags from it, declarative validation, and cached read-only queries.
//!
//! ## Architecture
//!
//! - **Triple store** (`graph`): indexed base and inferred graphs plus a typed pattern evaluator
//! - **Ontology bootstrap** (`ontology`): bundled TOML schema with a minimal fallback
//! - **Ingestion** (`ingest`): snapshots of teams, players, fixtures, scores and injuries
//! - **Inference** (`infer`): twelve single-level tag rules over the base graph
//! - **Queries** (`query`): SPARQL over an oxigraph snapshot with a TTL cache
//! - **Validation** (`validate`): constraint table, soft checks and squad shape
//!
//! ## Library usage
//!
//! ```no_run
//! use smartplay_reasoner::config::EngineConfig;
//! use smartplay_reasoner::engine::Engine;
//! use smartplay_reasoner::ingest::Snapshot;
//!
//! let engine = Engine::new(EngineConfig::default()).unwrap();
//! let snapshot = Snapshot::from_json_str(&std::fs::read_to_string("snapshot.json").unwrap()).unwrap();
//! engine.rebuild(&snapshot).unwrap();
//! println!("{:?}", engine.tags_for_player(7).unwrap());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod graph;
pub mod infer;
pub mod ingest;
pub mod ontology;
pub mod query;
pub mod validate;
pub mod vocab;
