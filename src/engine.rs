//! Engine facade: the single entry point the application layer talks to.
//!
//! The engine owns the triple store behind a single-writer/multi-reader lock
//! and the query cache behind its own lock-free map. Every mutating operation
//! (rebuild, score sync, injury sync, inference) holds the write lock for the
//! whole ingest, re-infer and cache-clear sequence, so readers never observe a
//! half-built graph or a cache entry computed from a superseded one.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, ReasonerResult};
use crate::export::{self, TripleExport};
use crate::graph::index::{TripleSource, TripleStore};
use crate::graph::{GraphKind, Term};
use crate::infer::{InferenceEngine, InferenceReport, InferenceState};
use crate::ingest::{self, IngestReport, InjuryRecord, ScoreSnapshot, Snapshot};
use crate::ontology::{Ontology, OntologySource};
use crate::query::{CacheStats, Position, QueryEngine, QueryOptions, QueryResponse, templates};
use crate::validate::{self, Constraint, SquadReport, ValidationReport};
use crate::vocab;

/// Whether the graph holds facts yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Schema loaded, no rebuild yet.
    Bootstrapped,
    /// At least one rebuild has completed.
    Ready,
}

/// Result of a rebuild or sync: what was ingested and what was re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub ingest: IngestReport,
    pub inference: InferenceReport,
    pub elapsed_ms: u64,
}

/// Engine statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub state: EngineState,
    pub ontology: String,
    pub total_triples: usize,
    pub base_triples: usize,
    pub inferred_triples: usize,
    pub classes: usize,
    pub properties: usize,
    /// Per-rule counts from the last inference run.
    pub rule_counts: BTreeMap<String, usize>,
    pub constraint_checks: usize,
    pub cache: CacheStats,
}

impl std::fmt::Display for EngineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "smartplay reasoner")?;
        writeln!(f, "  state:        {:?}", self.state)?;
        writeln!(f, "  ontology:     {}", self.ontology)?;
        writeln!(f, "  classes:      {}", self.classes)?;
        writeln!(f, "  properties:   {}", self.properties)?;
        writeln!(
            f,
            "  triples:      {} ({} base, {} inferred)",
            self.total_triples, self.base_triples, self.inferred_triples
        )?;
        writeln!(f, "  constraints:  {}", self.constraint_checks)?;
        writeln!(
            f,
            "  cache:        {} entries, {} hits, {} misses",
            self.cache.entries, self.cache.hits, self.cache.misses
        )?;
        for (rule, count) in &self.rule_counts {
            writeln!(f, "    {rule:<20} {count}")?;
        }
        Ok(())
    }
}

/// State guarded by the graph lock.
#[derive(Debug)]
struct Shared {
    store: TripleStore,
    state: EngineState,
    last_inference: Option<InferenceReport>,
}

/// The reasoning engine.
pub struct Engine {
    config: EngineConfig,
    ontology: Ontology,
    shared: RwLock<Shared>,
    inference: InferenceEngine,
    queries: QueryEngine,
    constraints: Vec<Constraint>,
}

impl Engine {
    /// Bootstrap an engine: load the ontology and write its schema triples.
    ///
    /// The engine starts in [`EngineState::Bootstrapped`]; call
    /// [`Engine::rebuild`] before querying.
    pub fn new(config: EngineConfig) -> ReasonerResult<Self> {
        config.validate()?;
        let ontology = Ontology::load(config.ontology_path.as_deref());
        let mut store = TripleStore::new();
        let schema = store.extend(GraphKind::Base, ontology.triples());
        tracing::info!(schema_triples = schema, "engine bootstrapped");

        Ok(Self {
            queries: QueryEngine::new(config.cache_max_entries),
            config,
            ontology,
            shared: RwLock::new(Shared {
                store,
                state: EngineState::Bootstrapped,
                last_inference: None,
            }),
            inference: InferenceEngine::default(),
            constraints: validate::constraints::builtin(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    pub fn queries(&self) -> &QueryEngine {
        &self.queries
    }

    pub fn inference_state(&self) -> InferenceState {
        self.inference.state()
    }

    pub fn state(&self) -> ReasonerResult<EngineState> {
        Ok(self.read()?.state)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state(), Ok(EngineState::Ready))
    }

    // ── Locking ─────────────────────────────────────────────────────────

    fn read(&self) -> Result<RwLockReadGuard<'_, Shared>, EngineError> {
        self.shared.read().map_err(|_| EngineError::LockPoisoned {
            lock: "graph".into(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Shared>, EngineError> {
        self.shared.write().map_err(|_| EngineError::LockPoisoned {
            lock: "graph".into(),
        })
    }

    fn read_ready(&self) -> Result<RwLockReadGuard<'_, Shared>, EngineError> {
        let guard = self.read()?;
        match guard.state {
            EngineState::Ready => Ok(guard),
            EngineState::Bootstrapped => Err(EngineError::NotInitialized),
        }
    }

    fn write_ready(&self) -> Result<RwLockWriteGuard<'_, Shared>, EngineError> {
        let guard = self.write()?;
        match guard.state {
            EngineState::Ready => Ok(guard),
            EngineState::Bootstrapped => Err(EngineError::NotInitialized),
        }
    }

    // ── Mutations ───────────────────────────────────────────────────────

    /// Re-infer and clear the cache after a base-graph change.
    fn finish(
        &self,
        shared: &mut Shared,
        ingest: IngestReport,
        start: Instant,
    ) -> ReasonerResult<SyncReport> {
        let inference = self.inference.run(&mut shared.store)?;
        shared.last_inference = Some(inference.clone());
        self.queries.clear_cache();
        Ok(SyncReport {
            ingest,
            inference,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Replace all team, player and fixture facts, then re-infer.
    pub fn rebuild(&self, snapshot: &Snapshot) -> ReasonerResult<SyncReport> {
        let start = Instant::now();
        let mut shared = self.write()?;
        let ingest = ingest::rebuild(&mut shared.store, snapshot);
        shared.state = EngineState::Ready;
        let report = self.finish(&mut shared, ingest, start)?;
        tracing::info!(
            players = report.ingest.players,
            inferred = report.inference.total,
            elapsed_ms = report.elapsed_ms,
            "rebuild complete"
        );
        Ok(report)
    }

    /// Attach or replace SmartPlay scores, then re-infer.
    pub fn sync_scores(&self, scores: &[ScoreSnapshot]) -> ReasonerResult<SyncReport> {
        let start = Instant::now();
        let mut shared = self.write_ready()?;
        let mut ingest = IngestReport::default();
        ingest::sync_scores(&mut shared.store, scores, &mut ingest);
        let report = self.finish(&mut shared, ingest, start)?;
        tracing::info!(
            scores = report.ingest.scores,
            skipped = report.ingest.skipped.len(),
            "score sync complete"
        );
        Ok(report)
    }

    /// Add injury events, then re-infer.
    pub fn sync_injuries(&self, injuries: &[InjuryRecord]) -> ReasonerResult<SyncReport> {
        let start = Instant::now();
        let mut shared = self.write_ready()?;
        let mut ingest = IngestReport::default();
        ingest::sync_injuries(&mut shared.store, injuries, &mut ingest);
        let report = self.finish(&mut shared, ingest, start)?;
        tracing::info!(
            injuries = report.ingest.injuries,
            skipped = report.ingest.skipped.len(),
            "injury sync complete"
        );
        Ok(report)
    }

    /// Re-run inference over the unchanged base graph.
    pub fn run_inference(&self) -> ReasonerResult<InferenceReport> {
        let mut shared = self.write_ready()?;
        let report = self.inference.run(&mut shared.store)?;
        shared.last_inference = Some(report.clone());
        self.queries.clear_cache();
        Ok(report)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Execute read-only SPARQL text. Never fails outward: every problem,
    /// including an uninitialized engine, is a `success = false` outcome.
    pub fn query(&self, sparql: &str, options: &QueryOptions) -> QueryResponse {
        match self.read_ready() {
            Ok(shared) => self.queries.execute(&shared.store, sparql, options),
            Err(e) => QueryResponse::failed(e),
        }
    }

    fn template_options(&self) -> QueryOptions {
        QueryOptions {
            ttl: self.config.default_ttl(),
            ..QueryOptions::default()
        }
    }

    /// Scored players, best first.
    pub fn top_by_score(&self, limit: usize) -> ReasonerResult<QueryResponse> {
        let sparql = templates::top_by_score(limit)?;
        Ok(self.query(&sparql, &self.template_options()))
    }

    pub fn players_by_position(
        &self,
        position: Position,
        limit: usize,
    ) -> ReasonerResult<QueryResponse> {
        let sparql = templates::by_position(position, limit)?;
        Ok(self.query(&sparql, &self.template_options()))
    }

    /// Players of the team with the given three-letter short name.
    pub fn players_by_team(&self, short_name: &str, limit: usize) -> ReasonerResult<QueryResponse> {
        let sparql = templates::by_team(short_name, limit)?;
        Ok(self.query(&sparql, &self.template_options()))
    }

    /// Scored players owned by fewer than `max_ownership` percent of managers.
    pub fn differentials(&self, max_ownership: f64, limit: usize) -> ReasonerResult<QueryResponse> {
        let sparql = templates::differentials(max_ownership, limit)?;
        Ok(self.query(&sparql, &self.template_options()))
    }

    // ── Tags ────────────────────────────────────────────────────────────

    /// Inferred classes of one player, sorted. Unknown players have none.
    pub fn tags_for_player(&self, player_id: u32) -> ReasonerResult<Vec<String>> {
        let shared = self.read_ready()?;
        let mut tags: Vec<String> = shared
            .store
            .inferred()
            .objects(&vocab::player(player_id), &vocab::rdf_type())
            .filter_map(Term::as_iri)
            .map(|class| class.local_name().to_string())
            .collect();
        tags.sort();
        Ok(tags)
    }

    /// Local identifiers of every entity typed with `class` (asserted or
    /// inferred), sorted.
    pub fn entities_of_class(&self, class: &str) -> ReasonerResult<Vec<String>> {
        let shared = self.read_ready()?;
        let rdf_type = vocab::rdf_type();
        let class = Term::Iri(vocab::sp(class));
        let mut entities: Vec<String> = shared
            .store
            .union()
            .matching(None, Some(&rdf_type), Some(&class))
            .map(|t| t.subject.local_name().to_string())
            .collect();
        entities.sort();
        entities.dedup();
        Ok(entities)
    }

    /// Entities per inferred class, zero counts included.
    pub fn tag_summary(&self) -> ReasonerResult<BTreeMap<String, usize>> {
        let shared = self.read_ready()?;
        let rdf_type = vocab::rdf_type();
        Ok(self
            .inference
            .rules()
            .iter()
            .map(|rule| {
                let class = Term::Iri(rule.target_class.clone());
                let count = shared.store.inferred().subjects(&rdf_type, &class).count();
                (rule.target_class.local_name().to_string(), count)
            })
            .collect())
    }

    // ── Validation & export ─────────────────────────────────────────────

    pub fn validate(&self) -> ReasonerResult<ValidationReport> {
        let shared = self.read_ready()?;
        Ok(validate::validate(&shared.store, &self.constraints))
    }

    pub fn validate_squad(&self, player_ids: &[u32]) -> ReasonerResult<SquadReport> {
        let shared = self.read_ready()?;
        Ok(validate::validate_squad(&shared.store, player_ids, &self.config.squad))
    }

    /// The full graph (base ∪ inferred) as sorted N-Triples.
    pub fn export_ntriples(&self) -> ReasonerResult<String> {
        let shared = self.read_ready()?;
        Ok(export::export_ntriples(&shared.store))
    }

    pub fn export_triples(&self) -> ReasonerResult<Vec<TripleExport>> {
        let shared = self.read_ready()?;
        Ok(export::export_triples(&shared.store))
    }

    // ── Introspection ───────────────────────────────────────────────────

    pub fn stats(&self) -> ReasonerResult<EngineStats> {
        let shared = self.read()?;
        let ontology = match &self.ontology.source {
            OntologySource::Bundled => {
                format!("{} {} (bundled)", self.ontology.name, self.ontology.version)
            }
            OntologySource::External(path) => format!(
                "{} {} ({})",
                self.ontology.name,
                self.ontology.version,
                path.display()
            ),
            OntologySource::Minimal => format!("{} (minimal fallback)", self.ontology.name),
        };
        Ok(EngineStats {
            state: shared.state,
            ontology,
            total_triples: shared.store.len(),
            base_triples: shared.store.base().len(),
            inferred_triples: shared.store.inferred().len(),
            classes: self.ontology.class_count(),
            properties: self.ontology.property_count(),
            rule_counts: shared
                .last_inference
                .as_ref()
                .map(InferenceReport::counts)
                .unwrap_or_default(),
            constraint_checks: self.constraints.len(),
            cache: self.queries.cache_stats(),
        })
    }

    pub fn clear_cache(&self) {
        self.queries.clear_cache();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.queries.cache_stats()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("ontology", &self.ontology.name)
            .field("rules", &self.inference.rules().len())
            .field("constraints", &self.constraints.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasonerError;
    use crate::ingest::{PlayerSnapshot, TeamSnapshot};

    fn snapshot() -> Snapshot {
        Snapshot {
            teams: vec![TeamSnapshot {
                id: 1,
                name: Some("Arsenal".into()),
                short_name: Some("ARS".into()),
                strength: Some(4),
                ..TeamSnapshot::default()
            }],
            players: vec![PlayerSnapshot {
                id: 10,
                web_name: Some("Saka".into()),
                team: Some(1),
                position: Some("MID".into()),
                price: Some(10.0),
                status: Some("a".into()),
                ..PlayerSnapshot::default()
            }],
            scores: vec![ScoreSnapshot {
                player_id: 10,
                final_score: 8.0,
                nailedness: 9.0,
                form_xg: 6.0,
                form_pts: 6.0,
                fixture: 6.0,
                gameweek: None,
                calculated_at: None,
            }],
            ..Snapshot::default()
        }
    }

    #[test]
    fn operations_before_rebuild_are_rejected() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.state().unwrap(), EngineState::Bootstrapped);
        assert!(matches!(
            engine.validate(),
            Err(ReasonerError::Engine(EngineError::NotInitialized))
        ));
        assert!(matches!(
            engine.sync_scores(&[]),
            Err(ReasonerError::Engine(EngineError::NotInitialized))
        ));
        let response = engine.query("SELECT * WHERE { ?s ?p ?o }", &QueryOptions::default());
        assert!(!response.outcome.success);
        assert!(engine.stats().unwrap().base_triples > 0);
    }

    #[test]
    fn rebuild_tags_and_stats() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let report = engine.rebuild(&snapshot()).unwrap();
        assert_eq!(report.ingest.players, 1);
        assert!(engine.is_ready());

        let tags = engine.tags_for_player(10).unwrap();
        assert!(tags.contains(&"CaptainCandidate".to_string()));
        assert!(tags.contains(&"Premium".to_string()));
        assert_eq!(engine.entities_of_class("TopPlayer").unwrap(), vec!["player_10"]);
        assert_eq!(engine.tag_summary().unwrap()["NailedOn"], 1);
        assert!(engine.tags_for_player(999).unwrap().is_empty());

        let stats = engine.stats().unwrap();
        assert_eq!(stats.rule_counts.len(), 12);
        assert_eq!(stats.constraint_checks, 17);
        assert_eq!(stats.total_triples, stats.base_triples + stats.inferred_triples);
    }

    #[test]
    fn mutations_clear_the_cache() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine.rebuild(&snapshot()).unwrap();
        let top = engine.top_by_score(5).unwrap();
        assert!(top.outcome.success, "{:?}", top.outcome.error);
        assert_eq!(top.outcome.count, 1);
        assert_eq!(engine.cache_stats().entries, 1);

        engine.sync_scores(&snapshot().scores).unwrap();
        assert_eq!(engine.cache_stats().entries, 0);
    }

    #[test]
    fn invalid_template_parameter_is_an_error() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        engine.rebuild(&snapshot()).unwrap();
        assert!(matches!(engine.players_by_team("arsenal", 5), Err(ReasonerError::Query(_))));
    }
}
