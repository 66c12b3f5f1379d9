//! Declarative property constraints over the base graph.
//!
//! Each constraint selects the `(entity, value)` pairs of one target class
//! through a typed [`GraphPattern`] and tests every row against its violation
//! [`Filter`]. A value of the wrong kind (text where a number is expected, a
//! number where text is expected) cannot satisfy the constraint and is
//! reported as a violation of its own.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use crate::graph::index::TripleSource;
use crate::graph::pattern::{Filter, GraphPattern, PatternTerm};
use crate::graph::sparql::Value;
use crate::graph::{Iri, Term};
use crate::vocab;

// ── Constraint model ────────────────────────────────────────────────────

/// The property (or alternative properties) a constraint inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyPath {
    Predicate(String),
    /// Any of the listed properties; each is checked on its own.
    Alternative(Vec<String>),
}

impl PropertyPath {
    fn predicates(&self) -> Vec<&str> {
        match self {
            Self::Predicate(p) => vec![p.as_str()],
            Self::Alternative(ps) => ps.iter().map(String::as_str).collect(),
        }
    }
}

/// What a constraint demands of the property value.
#[derive(Debug, Clone)]
pub enum ConstraintKind {
    /// `min <= value <= max`.
    Range { min: f64, max: f64 },
    /// `value >= min`.
    MinOnly { min: f64 },
    /// String value matching the regex.
    Pattern(Regex),
    /// Exactly one value.
    Required,
}

/// A named constraint on one property of one class.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    /// Local name of the target class.
    pub target_class: String,
    pub path: PropertyPath,
    pub kind: ConstraintKind,
    pub message: String,
}

/// One offending value (or missing/duplicated property) on one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub constraint: String,
    /// Local identifier of the offending entity.
    pub focus_node: String,
    /// Local name of the offending property.
    pub path: String,
    /// Offending value; for `Required`, the number of values found.
    pub value: Option<Value>,
    pub message: String,
}

impl Constraint {
    fn new(
        name: &str,
        class: &str,
        path: PropertyPath,
        kind: ConstraintKind,
        message: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            target_class: class.to_string(),
            path,
            kind,
            message: message.to_string(),
        }
    }

    fn range(name: &str, class: &str, property: &str, min: f64, max: f64, message: &str) -> Self {
        Self::new(
            name,
            class,
            PropertyPath::Predicate(property.into()),
            ConstraintKind::Range { min, max },
            message,
        )
    }

    fn min_only(name: &str, class: &str, property: &str, min: f64, message: &str) -> Self {
        Self::new(
            name,
            class,
            PropertyPath::Predicate(property.into()),
            ConstraintKind::MinOnly { min },
            message,
        )
    }

    fn pattern(name: &str, class: &str, property: &str, regex: &str, message: &str) -> Self {
        let regex = Regex::new(regex).expect("built-in constraint regex is valid");
        Self::new(
            name,
            class,
            PropertyPath::Predicate(property.into()),
            ConstraintKind::Pattern(regex),
            message,
        )
    }

    /// Filter that holds for an *offending* `?value`.
    fn violation_filter(&self) -> Option<Filter> {
        match &self.kind {
            ConstraintKind::Range { min, max } => Some(Filter::Or(vec![
                Filter::lt("value", *min),
                Filter::gt("value", *max),
            ])),
            ConstraintKind::MinOnly { min } => Some(Filter::lt("value", *min)),
            ConstraintKind::Pattern(regex) => {
                Some(Filter::negate(Filter::matches("value", regex.clone())))
            }
            ConstraintKind::Required => None,
        }
    }

    fn class_iri(&self) -> Iri {
        vocab::sp(&self.target_class)
    }

    /// All violations of this constraint in `source`.
    pub fn check(
        &self,
        source: &dyn TripleSource,
    ) -> Result<Vec<ConstraintViolation>, PatternError> {
        let mut violations = Vec::new();
        for predicate in self.path.predicates() {
            match self.violation_filter() {
                Some(filter) => {
                    let rows = GraphPattern::new()
                        .triple(PatternTerm::var("e"), vocab::rdf_type(), self.class_iri())
                        .triple(
                            PatternTerm::var("e"),
                            vocab::sp(predicate),
                            PatternTerm::var("value"),
                        )
                        .evaluate(source)?;
                    for row in rows {
                        let offending = match filter.eval(source, &row) {
                            Ok(verdict) => verdict == Some(true),
                            Err(PatternError::TypeMismatch { .. }) => true,
                            Err(e) => return Err(e),
                        };
                        if offending {
                            let value = row.get("value").map(Value::from);
                            violations.push(self.violation(row.get("e"), predicate, value));
                        }
                    }
                }
                None => {
                    let entities = GraphPattern::new()
                        .triple(PatternTerm::var("e"), vocab::rdf_type(), self.class_iri())
                        .select(source, "e")?;
                    let property = vocab::sp(predicate);
                    for entity in &entities {
                        let Some(iri) = entity.as_iri() else { continue };
                        let count = source.matching(Some(iri), Some(&property), None).count();
                        if count != 1 {
                            let value = Value::Integer(count as i64);
                            violations.push(self.violation(Some(entity), predicate, Some(value)));
                        }
                    }
                }
            }
        }
        Ok(violations)
    }

    fn violation(
        &self,
        entity: Option<&Term>,
        predicate: &str,
        value: Option<Value>,
    ) -> ConstraintViolation {
        let focus_node = match entity {
            Some(Term::Iri(iri)) => iri.local_name().to_string(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        ConstraintViolation {
            constraint: self.name.clone(),
            focus_node,
            path: predicate.to_string(),
            value,
            message: self.message.clone(),
        }
    }
}

/// The built-in constraint table.
#[rustfmt::skip]
pub fn builtin() -> Vec<Constraint> {
    use vocab::{FIXTURE, PLAYER, TEAM};
    vec![
        Constraint::range("price_range", PLAYER, "price", 3.5, 15.5, "Player price must be between 3.5 and 15.5"),
        Constraint::range("ownership_range", PLAYER, "ownership", 0.0, 100.0, "Ownership must be a percentage between 0 and 100"),
        Constraint::range("form_range", PLAYER, "form", 0.0, 10.0, "Form must be between 0 and 10"),
        Constraint::range("minutes_range", PLAYER, "minutes", 0.0, 3420.0, "Minutes must be between 0 and 3420 (38 full matches)"),
        Constraint::min_only("goals_non_negative", PLAYER, "goals", 0.0, "Goals cannot be negative"),
        Constraint::min_only("assists_non_negative", PLAYER, "assists", 0.0, "Assists cannot be negative"),
        Constraint::range("xg_range", PLAYER, "xG", 0.0, 50.0, "Expected goals must be between 0 and 50"),
        Constraint::range("xa_range", PLAYER, "xA", 0.0, 50.0, "Expected assists must be between 0 and 50"),
        Constraint::range("points_per_game_range", PLAYER, "pointsPerGame", 0.0, 20.0, "Points per game must be between 0 and 20"),
        Constraint::pattern("status_pattern", PLAYER, "status", "^[aidsu]$", "Status must be one of a, i, d, s, u"),
        Constraint::pattern("position_pattern", PLAYER, "position", "^(GKP|DEF|MID|FWD)$", "Position must be GKP, DEF, MID or FWD"),
        Constraint::range("team_strength_range", TEAM, "strength", 1.0, 5.0, "Team strength must be between 1 and 5"),
        Constraint::pattern("short_name_pattern", TEAM, "shortName", "^[A-Z]{3}$", "Team short name must be three uppercase letters"),
        Constraint::new(
            "fixture_difficulty_range",
            FIXTURE,
            PropertyPath::Alternative(vec!["homeDifficulty".into(), "awayDifficulty".into()]),
            ConstraintKind::Range { min: 1.0, max: 5.0 },
            "Fixture difficulty must be between 1 and 5",
        ),
        Constraint::range("gameweek_range", FIXTURE, "gameweek", 1.0, 38.0, "Gameweek must be between 1 and 38"),
        Constraint::range("chance_of_playing_range", PLAYER, "chanceOfPlaying", 0.0, 100.0, "Chance of playing must be between 0 and 100"),
        Constraint::new(
            "plays_for_required",
            PLAYER,
            PropertyPath::Predicate(vocab::PLAYS_FOR.into()),
            ConstraintKind::Required,
            "Every player must play for exactly one team",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::index::Graph;
    use crate::graph::{Literal, Triple};

    fn player(g: &mut Graph, id: u32, price: f64, status: &str) {
        let p = vocab::player(id);
        g.insert(Triple::type_assertion(p.clone(), vocab::sp(vocab::PLAYER)));
        g.insert(Triple::new(p.clone(), vocab::sp("price"), Literal::Decimal(price)));
        g.insert(Triple::new(p.clone(), vocab::sp("status"), Literal::from(status)));
        g.insert(Triple::new(p, vocab::sp(vocab::PLAYS_FOR), vocab::team(1)));
    }

    fn named(name: &str) -> Constraint {
        builtin().into_iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn table_has_seventeen_uniquely_named_constraints() {
        let table = builtin();
        assert_eq!(table.len(), 17);
        let mut names: Vec<_> = table.iter().map(|c| c.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 17);
    }

    #[test]
    fn range_reports_each_offender() {
        let mut g = Graph::new();
        player(&mut g, 1, 3.0, "a");
        player(&mut g, 2, 7.0, "a");
        player(&mut g, 3, 16.0, "a");
        let violations = named("price_range").check(&g).unwrap();
        let mut nodes: Vec<_> = violations.iter().map(|v| v.focus_node.as_str()).collect();
        nodes.sort();
        assert_eq!(nodes, vec!["player_1", "player_3"]);
        assert!(violations.iter().any(|v| v.value == Some(Value::Decimal(16.0))));
    }

    #[test]
    fn pattern_constraint() {
        let mut g = Graph::new();
        player(&mut g, 1, 5.0, "x");
        player(&mut g, 2, 5.0, "d");
        let violations = named("status_pattern").check(&g).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].value, Some(Value::Text("x".into())));
    }

    #[test]
    fn required_edge_counts() {
        let mut g = Graph::new();
        player(&mut g, 1, 5.0, "a");
        player(&mut g, 2, 5.0, "a");
        g.insert(Triple::new(vocab::player(2), vocab::sp(vocab::PLAYS_FOR), vocab::team(2)));
        let p3 = vocab::player(3);
        g.insert(Triple::type_assertion(p3, vocab::sp(vocab::PLAYER)));

        let violations = named("plays_for_required").check(&g).unwrap();
        assert_eq!(violations.len(), 2);
        let by_node = |node: &str| {
            violations.iter().find(|v| v.focus_node == node).unwrap().value.clone()
        };
        assert_eq!(by_node("player_2"), Some(Value::Integer(2)));
        assert_eq!(by_node("player_3"), Some(Value::Integer(0)));
    }

    #[test]
    fn alternative_path_checks_both_sides() {
        let mut g = Graph::new();
        let f = vocab::fixture(9);
        g.insert(Triple::type_assertion(f.clone(), vocab::sp(vocab::FIXTURE)));
        g.insert(Triple::new(f.clone(), vocab::sp("homeDifficulty"), Literal::Integer(0)));
        g.insert(Triple::new(f, vocab::sp("awayDifficulty"), Literal::Integer(6)));
        let violations = named("fixture_difficulty_range").check(&g).unwrap();
        assert_eq!(violations.len(), 2);
    }

    fn entity(g: &mut Graph, class: &str, n: usize, predicate: &str, value: Literal) -> String {
        let iri = Iri::new_unchecked(format!("{}e_{n}", vocab::DATA_NS));
        g.insert(Triple::type_assertion(iri.clone(), vocab::sp(class)));
        g.insert(Triple::new(iri, vocab::sp(predicate), value));
        format!("e_{n}")
    }

    fn offenders(constraint: &Constraint, g: &Graph) -> Vec<String> {
        let mut nodes: Vec<_> = constraint
            .check(g)
            .unwrap()
            .into_iter()
            .map(|v| v.focus_node)
            .collect();
        nodes.sort();
        nodes
    }

    #[test]
    fn wrong_kind_value_is_a_violation_and_other_rows_still_checked() {
        let mut g = Graph::new();
        let text = entity(&mut g, vocab::PLAYER, 1, "minutes", Literal::from("ninety"));
        let over = entity(&mut g, vocab::PLAYER, 2, "minutes", Literal::Integer(5000));
        entity(&mut g, vocab::PLAYER, 3, "minutes", Literal::Integer(900));
        let violations = named("minutes_range").check(&g).unwrap();
        assert_eq!(violations.len(), 2);
        let mut nodes: Vec<_> = violations.iter().map(|v| v.focus_node.clone()).collect();
        nodes.sort();
        assert_eq!(nodes, vec![text, over]);
        assert!(violations.iter().any(|v| v.value == Some(Value::Text("ninety".into()))));
    }

    #[test]
    fn number_in_text_slot_is_a_violation() {
        let mut g = Graph::new();
        let bad = entity(&mut g, vocab::TEAM, 1, "shortName", Literal::Integer(3));
        entity(&mut g, vocab::TEAM, 2, "shortName", Literal::from("ARS"));
        assert_eq!(offenders(&named("short_name_pattern"), &g), vec![bad]);
    }

    fn valid_text(predicate: &str) -> &'static str {
        match predicate {
            "status" => "a",
            "position" => "MID",
            "shortName" => "ARS",
            other => panic!("no sample value for {other}"),
        }
    }

    /// Every built-in constraint accepts its bounds and rejects values just
    /// outside them, on every property of its path.
    #[test]
    fn every_builtin_constraint_enforces_its_bounds() {
        for constraint in builtin() {
            for predicate in constraint.path.predicates() {
                let mut g = Graph::new();
                let class = constraint.target_class.as_str();
                let mut n = 0;
                let mut plant = |g: &mut Graph, value: Literal| {
                    n += 1;
                    entity(g, class, n, predicate, value)
                };
                let expected = match &constraint.kind {
                    ConstraintKind::Range { min, max } => {
                        plant(&mut g, Literal::Decimal(*min));
                        plant(&mut g, Literal::Decimal(*max));
                        vec![
                            plant(&mut g, Literal::Decimal(min - 0.01)),
                            plant(&mut g, Literal::Decimal(max + 0.01)),
                        ]
                    }
                    ConstraintKind::MinOnly { min } => {
                        plant(&mut g, Literal::Decimal(*min));
                        plant(&mut g, Literal::Decimal(min + 1000.0));
                        vec![
                            plant(&mut g, Literal::Decimal(min - 0.01)),
                            plant(&mut g, Literal::Decimal(min - 1.0)),
                        ]
                    }
                    ConstraintKind::Pattern(_) => {
                        plant(&mut g, Literal::from(valid_text(predicate)));
                        vec![plant(&mut g, Literal::from("zz"))]
                    }
                    ConstraintKind::Required => continue,
                };
                let mut expected = expected;
                expected.sort();
                assert_eq!(
                    offenders(&constraint, &g),
                    expected,
                    "{} on {predicate}",
                    constraint.name
                );
            }
        }
    }

    #[test]
    fn integer_bounds_are_inclusive() {
        let mut g = Graph::new();
        entity(&mut g, vocab::FIXTURE, 1, "gameweek", Literal::Integer(1));
        entity(&mut g, vocab::FIXTURE, 2, "gameweek", Literal::Integer(38));
        let late = entity(&mut g, vocab::FIXTURE, 3, "gameweek", Literal::Integer(39));
        let early = entity(&mut g, vocab::FIXTURE, 4, "gameweek", Literal::Integer(0));
        assert_eq!(offenders(&named("gameweek_range"), &g), vec![late, early]);
    }
}
