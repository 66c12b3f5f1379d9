//! Rich diagnostic error types for the SmartPlay reasoner.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know exactly what went wrong
//! and how to fix it. Rule failures, constraint violations and squad problems are
//! *not* errors: they are reported as data in the respective report types.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the reasoner.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum ReasonerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ontology(#[from] OntologyError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Infer(#[from] InferError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("invalid IRI: {iri}")]
    #[diagnostic(
        code(smartplay::graph::invalid_iri),
        help("IRIs must be absolute (scheme followed by ':') and contain no whitespace or angle brackets.")
    )]
    InvalidIri { iri: String },

    #[error("SPARQL store error: {message}")]
    #[diagnostic(
        code(smartplay::graph::sparql),
        help(
            "The in-memory oxigraph snapshot used for text queries could not be built \
             or evaluated. This indicates an internal inconsistency; rebuild the graph."
        )
    )]
    Sparql { message: String },
}

// ---------------------------------------------------------------------------
// Pattern evaluation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PatternError {
    #[error("type mismatch in filter: cannot {operation} {left} and {right}")]
    #[diagnostic(
        code(smartplay::pattern::type_mismatch),
        help(
            "A filter compared values of incompatible kinds (e.g. a number against a string). \
             The facts in the graph do not have the shape the pattern expects; check ingestion."
        )
    )]
    TypeMismatch {
        operation: String,
        left: String,
        right: String,
    },

    #[error("pattern term is not an IRI: {term}")]
    #[diagnostic(
        code(smartplay::pattern::not_an_iri),
        help("Subjects and predicates must be IRIs. A variable bound to a literal cannot be used in subject position.")
    )]
    NotAnIri { term: String },
}

// ---------------------------------------------------------------------------
// Ontology errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OntologyError {
    #[error("failed to read ontology file: {path}")]
    #[diagnostic(
        code(smartplay::ontology::io),
        help("Ensure the ontology file exists and is readable. The engine falls back to its minimal built-in schema.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse ontology \"{source_name}\": {message}")]
    #[diagnostic(
        code(smartplay::ontology::parse),
        help("Check the ontology TOML syntax: [[classes]] and [[properties]] tables with `name` keys.")
    )]
    Parse { source_name: String, message: String },

    #[error("ontology \"{source_name}\" declares no class named {class}")]
    #[diagnostic(
        code(smartplay::ontology::missing_core_class),
        help("The schema must at least declare Player, Team, Fixture, SmartPlayScore and InjuryEvent.")
    )]
    MissingCoreClass { source_name: String, class: String },
}

// ---------------------------------------------------------------------------
// Ingestion errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("{entity} is missing required field `{field}`")]
    #[diagnostic(
        code(smartplay::ingest::missing_field),
        help("The upstream snapshot omitted a field every entity of this kind must carry. The entity was skipped.")
    )]
    MissingField { entity: String, field: String },

    #[error("{entity} has an invalid value for `{field}`: {message}")]
    #[diagnostic(
        code(smartplay::ingest::invalid_field),
        help("The value could not be represented as a typed literal. The entity was skipped.")
    )]
    InvalidField {
        entity: String,
        field: String,
        message: String,
    },

    #[error("{entity} references unknown player {player_id}")]
    #[diagnostic(
        code(smartplay::ingest::unknown_player),
        help("Scores and injuries can only be attached to players present in the graph. Rebuild first.")
    )]
    UnknownPlayer { entity: String, player_id: u32 },

    #[error("failed to decode {kind} record: {message}")]
    #[diagnostic(
        code(smartplay::ingest::decode),
        help("The JSON record does not match the expected snapshot shape. The record was skipped.")
    )]
    Decode { kind: String, message: String },

    #[error("failed to parse snapshot bundle: {message}")]
    #[diagnostic(
        code(smartplay::ingest::bundle),
        help("A snapshot bundle is a JSON object with optional `teams`, `players`, `fixtures`, `scores` and `injuries` arrays.")
    )]
    Bundle { message: String },
}

// ---------------------------------------------------------------------------
// Inference errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InferError {
    #[error("rule '{rule}' failed: {message}")]
    #[diagnostic(
        code(smartplay::infer::rule_execution),
        help("The rule's pattern could not be evaluated against the current facts. The rule was skipped; the other rules still ran.")
    )]
    RuleExecution { rule: String, message: String },

    #[error("inference is already running")]
    #[diagnostic(
        code(smartplay::infer::already_running),
        help("Inference runs are serialized by the engine's write lock. Do not call the inference engine directly from several threads.")
    )]
    AlreadyRunning,

    #[error("rules '{first}' and '{second}' both assert class {class}")]
    #[diagnostic(
        code(smartplay::infer::duplicate_target),
        help("Every inferred fact must be attributable to exactly one rule. Give each rule its own target class.")
    )]
    DuplicateTarget {
        first: String,
        second: String,
        class: String,
    },

    #[error("two rules are named '{name}'")]
    #[diagnostic(
        code(smartplay::infer::duplicate_name),
        help("Rules are looked up and reported by name. Rename one of them.")
    )]
    DuplicateName { name: String },
}

// ---------------------------------------------------------------------------
// Query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("invalid template parameter `{name}`: {value} (expected {expected})")]
    #[diagnostic(
        code(smartplay::query::invalid_parameter),
        help("Named templates only accept typed parameters; nothing is spliced into the query unchecked.")
    )]
    InvalidParameter {
        name: String,
        value: String,
        expected: String,
    },
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("failed to parse N-Triples: {message}")]
    #[diagnostic(
        code(smartplay::export::parse),
        help("The input is not valid N-Triples. Exports produced by `smartplay export` always parse.")
    )]
    Parse { message: String },

    #[error("unsupported term in N-Triples input: {term}")]
    #[diagnostic(
        code(smartplay::export::unsupported_term),
        help("Blank nodes and RDF 1.2 triple terms are not part of the fact graph model.")
    )]
    UnsupportedTerm { term: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(smartplay::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(smartplay::config::parse),
        help("Check the TOML syntax. Unknown keys are rejected.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(smartplay::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(smartplay::config::invalid), help("{message}"))]
    Invalid { message: String },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("engine not initialized: no rebuild has populated the graph yet")]
    #[diagnostic(
        code(smartplay::engine::not_initialized),
        help("Call `Engine::rebuild` with a team/player/fixture snapshot before querying, syncing or validating.")
    )]
    NotInitialized,

    #[error("internal lock poisoned: {lock}")]
    #[diagnostic(
        code(smartplay::engine::lock_poisoned),
        help(
            "A thread panicked while mutating shared engine state, so the graph may be half-built. \
             Construct a new engine and rebuild it."
        )
    )]
    LockPoisoned { lock: String },
}

/// Convenience alias for functions returning reasoner results.
pub type ReasonerResult<T> = std::result::Result<T, ReasonerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_reasoner_error() {
        let err = GraphError::InvalidIri {
            iri: "not an iri".into(),
        };
        let top: ReasonerError = err.into();
        assert!(matches!(top, ReasonerError::Graph(GraphError::InvalidIri { .. })));
    }

    #[test]
    fn engine_error_converts_to_reasoner_error() {
        let top: ReasonerError = EngineError::NotInitialized.into();
        assert!(matches!(
            top,
            ReasonerError::Engine(EngineError::NotInitialized)
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = IngestError::MissingField {
            entity: "player 12".into(),
            field: "price".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("player 12"));
        assert!(msg.contains("price"));

        let err = InferError::RuleExecution {
            rule: "ValuePick".into(),
            message: "boom".into(),
        };
        assert!(format!("{err}").contains("ValuePick"));
    }
}
