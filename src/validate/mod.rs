//! Graph validation: the constraint table plus soft consistency checks.
//!
//! Constraints run against the base graph only. Soft checks may look at the
//! inferred graph and only ever produce warnings.

pub mod constraints;
pub mod squad;

use serde::{Deserialize, Serialize};

use crate::graph::index::{TripleSource, TripleStore};
use crate::graph::pattern::{Filter, GraphPattern, PatternTerm, TriplePattern};
use crate::graph::{Iri, Term};
use crate::vocab;

pub use constraints::{Constraint, ConstraintKind, ConstraintViolation, PropertyPath};
pub use squad::{SquadReport, SquadRules, SquadViolation, SquadWarning, validate_squad};

/// Name of the soft check for players lacking a score.
pub const PLAYER_HAS_SCORE: &str = "player_has_score";
/// Name of the soft check for contradictory captaincy tags.
pub const CAPTAIN_INJURY_EXCLUSIVE: &str = "captain_injury_exclusive";

// ── Report types ────────────────────────────────────────────────────────

/// A non-blocking finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub check: String,
    pub focus_node: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// `true` iff there are no violations. Warnings never affect it.
    pub conforms: bool,
    pub violations: Vec<ConstraintViolation>,
    pub warnings: Vec<ValidationWarning>,
    /// Every check attempted, whatever its outcome.
    pub checks_performed: Vec<String>,
    pub triple_count_checked: usize,
}

impl ValidationReport {
    /// Violations of one named constraint.
    pub fn violations_of<'a>(
        &'a self,
        constraint: &'a str,
    ) -> impl Iterator<Item = &'a ConstraintViolation> {
        self.violations.iter().filter(move |v| v.constraint == constraint)
    }
}

// ── Validation ──────────────────────────────────────────────────────────

/// Run `constraints` over the base graph, then the soft checks.
///
/// A value of the wrong kind is a violation of the constraint inspecting it.
/// A constraint whose check cannot execute at all is still listed in
/// `checks_performed` and reported as a warning.
pub fn validate(store: &TripleStore, constraints: &[Constraint]) -> ValidationReport {
    let mut report = ValidationReport {
        triple_count_checked: store.len(),
        ..ValidationReport::default()
    };

    for constraint in constraints {
        report.checks_performed.push(constraint.name.clone());
        match constraint.check(store.base()) {
            Ok(found) => report.violations.extend(found),
            Err(e) => {
                tracing::warn!(
                    constraint = %constraint.name,
                    error = %e,
                    "constraint check failed"
                );
                report.warnings.push(ValidationWarning {
                    check: constraint.name.clone(),
                    focus_node: None,
                    message: format!("check could not be executed: {e}"),
                });
            }
        }
    }

    report.checks_performed.push(PLAYER_HAS_SCORE.to_string());
    report.warnings.extend(players_without_score(store));
    report.checks_performed.push(CAPTAIN_INJURY_EXCLUSIVE.to_string());
    report.warnings.extend(captain_injury_overlap(store));

    report.conforms = report.violations.is_empty();
    tracing::info!(
        conforms = report.conforms,
        violations = report.violations.len(),
        warnings = report.warnings.len(),
        "validation complete"
    );
    report
}

fn focus(term: &Term) -> String {
    match term {
        Term::Iri(iri) => iri.local_name().to_string(),
        other => other.to_string(),
    }
}

fn players_without_score(store: &TripleStore) -> Vec<ValidationWarning> {
    let pattern = GraphPattern::new()
        .triple(PatternTerm::var("p"), vocab::rdf_type(), vocab::sp(vocab::PLAYER))
        .filter(Filter::NotExists(vec![TriplePattern::new(
            PatternTerm::var("p"),
            vocab::sp(vocab::HAS_SCORE),
            PatternTerm::var("s"),
        )]));
    select_warnings(store.base(), &pattern, PLAYER_HAS_SCORE, "Player has no SmartPlay score")
}

fn captain_injury_overlap(store: &TripleStore) -> Vec<ValidationWarning> {
    let tag = |name: &str| -> Iri { vocab::sp(name) };
    let pattern = GraphPattern::new()
        .triple(PatternTerm::var("p"), vocab::rdf_type(), tag("CaptainCandidate"))
        .triple(PatternTerm::var("p"), vocab::rdf_type(), tag("InjuryConcern"));
    select_warnings(
        store.inferred(),
        &pattern,
        CAPTAIN_INJURY_EXCLUSIVE,
        "Entity is both a captain candidate and an injury concern",
    )
}

fn select_warnings(
    source: &dyn TripleSource,
    pattern: &GraphPattern,
    check: &str,
    message: &str,
) -> Vec<ValidationWarning> {
    match pattern.select(source, "p") {
        Ok(terms) => terms
            .iter()
            .map(|term| ValidationWarning {
                check: check.to_string(),
                focus_node: Some(focus(term)),
                message: message.to_string(),
            })
            .collect(),
        Err(e) => {
            tracing::warn!(check, error = %e, "soft check failed");
            vec![ValidationWarning {
                check: check.to_string(),
                focus_node: None,
                message: format!("check could not be executed: {e}"),
            }]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphKind, Literal, Triple};

    fn add_player(store: &mut TripleStore, id: u32, price: f64, scored: bool) {
        let p = vocab::player(id);
        let base = [
            Triple::type_assertion(p.clone(), vocab::sp(vocab::PLAYER)),
            Triple::new(p.clone(), vocab::sp("price"), Literal::Decimal(price)),
            Triple::new(p.clone(), vocab::sp(vocab::PLAYS_FOR), vocab::team(1)),
        ];
        for triple in base {
            store.add(GraphKind::Base, triple);
        }
        if scored {
            let score = Triple::new(p, vocab::sp(vocab::HAS_SCORE), vocab::score(id));
            store.add(GraphKind::Base, score);
        }
    }

    #[test]
    fn clean_graph_conforms() {
        let mut store = TripleStore::new();
        add_player(&mut store, 1, 6.0, true);
        let report = validate(&store, &constraints::builtin());
        assert!(report.conforms);
        assert!(report.warnings.is_empty());
        assert_eq!(report.checks_performed.len(), 19);
        assert_eq!(report.triple_count_checked, store.len());
    }

    #[test]
    fn out_of_range_price_is_one_violation() {
        let mut store = TripleStore::new();
        add_player(&mut store, 1, 16.0, true);
        let report = validate(&store, &constraints::builtin());
        assert!(!report.conforms);
        let found: Vec<_> = report.violations_of("price_range").collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].focus_node, "player_1");
        assert_eq!(report.violations.len(), 1);
    }

    #[test]
    fn malformed_value_does_not_hide_other_violations() {
        let mut store = TripleStore::new();
        add_player(&mut store, 1, 6.0, true);
        add_player(&mut store, 2, 6.0, true);
        let form = |id: u32, value: Literal| {
            Triple::new(vocab::player(id), vocab::sp("form"), value)
        };
        store.add(GraphKind::Base, form(1, Literal::from("hot")));
        store.add(GraphKind::Base, form(2, Literal::Decimal(12.0)));

        let report = validate(&store, &constraints::builtin());
        assert!(!report.conforms);
        assert!(report.checks_performed.iter().any(|c| c == "form_range"));
        assert!(report.warnings.iter().all(|w| w.check != "form_range"));
        let mut nodes: Vec<_> = report
            .violations_of("form_range")
            .map(|v| v.focus_node.as_str())
            .collect();
        nodes.sort();
        assert_eq!(nodes, vec!["player_1", "player_2"]);
    }

    #[test]
    fn soft_checks_only_warn() {
        let mut store = TripleStore::new();
        add_player(&mut store, 1, 6.0, false);
        add_player(&mut store, 2, 6.0, true);
        let p2 = vocab::player(2);
        let tag = |p: &Iri, class: &str| Triple::type_assertion(p.clone(), vocab::sp(class));
        store.add(GraphKind::Inferred, tag(&p2, "CaptainCandidate"));
        store.add(GraphKind::Inferred, tag(&p2, "InjuryConcern"));

        let report = validate(&store, &constraints::builtin());
        assert!(report.conforms);
        let checks: Vec<_> = report
            .warnings
            .iter()
            .map(|w| (w.check.as_str(), w.focus_node.as_deref()))
            .collect();
        assert_eq!(
            checks,
            vec![
                (PLAYER_HAS_SCORE, Some("player_1")),
                (CAPTAIN_INJURY_EXCLUSIVE, Some("player_2")),
            ]
        );
    }
}
