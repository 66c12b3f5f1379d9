//! The fixed tag rules.
//!
//! Rules are data: a [`GraphPattern`] that selects player subjects from the base
//! graph, and the class every match is asserted into. Rules are single-level;
//! none of them reads inferred facts, so evaluation order is irrelevant.

use crate::error::{InferError, PatternError};
use crate::graph::index::TripleSource;
use crate::graph::pattern::{CompareOp, Expr, Filter, GraphPattern, PatternTerm};
use crate::graph::{Iri, Literal};
use crate::vocab;

/// Variable every rule binds to the tagged subject.
pub const SUBJECT_VAR: &str = "p";

/// What a rule's condition is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// Reads the player's SmartPlay score (and player attributes).
    Score,
    /// Reads the player's injury events.
    Injury,
}

/// A named forward-chaining rule: condition pattern plus target class.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    /// Human-readable condition.
    pub description: String,
    pub kind: RuleKind,
    pub pattern: GraphPattern,
    pub target_class: Iri,
}

impl Rule {
    pub fn new(name: &str, description: &str, kind: RuleKind, pattern: GraphPattern) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            pattern,
            target_class: vocab::sp(name),
        }
    }

    /// Distinct subjects satisfying the condition.
    pub fn matches(&self, source: &dyn TripleSource) -> Result<Vec<Iri>, PatternError> {
        Ok(self
            .pattern
            .select(source, SUBJECT_VAR)?
            .into_iter()
            .filter_map(|term| term.as_iri().cloned())
            .collect())
    }
}

/// An ordered collection of rules with unique names and target classes.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Build a rule set, rejecting two rules that share a name or assert the
    /// same class.
    pub fn new(rules: Vec<Rule>) -> Result<Self, InferError> {
        for (i, rule) in rules.iter().enumerate() {
            let earlier = &rules[..i];
            if earlier.iter().any(|r| r.name == rule.name) {
                return Err(InferError::DuplicateName {
                    name: rule.name.clone(),
                });
            }
            if let Some(first) = earlier.iter().find(|r| r.target_class == rule.target_class) {
                return Err(InferError::DuplicateTarget {
                    first: first.name.clone(),
                    second: rule.name.clone(),
                    class: rule.target_class.local_name().to_string(),
                });
            }
        }
        Ok(Self { rules })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// The built-in tag rules: ten score-based, two injury-based.
    pub fn builtin() -> Self {
        let rules = vec![
            Rule::new(
                "CaptainCandidate",
                "final >= 7.5 AND nailedness >= 8.0 AND status = \"a\"",
                RuleKind::Score,
                scored()
                    .triple(var("s"), sp("nailednessScore"), var("nailed"))
                    .triple(var(SUBJECT_VAR), sp("status"), var("status"))
                    .filter(Filter::ge("final", 7.5))
                    .filter(Filter::ge("nailed", 8.0))
                    .filter(Filter::eq_text("status", "a")),
            ),
            Rule::new(
                "TopPlayer",
                "final >= 7.0",
                RuleKind::Score,
                scored().filter(Filter::ge("final", 7.0)),
            ),
            Rule::new(
                "DifferentialPick",
                "ownership < 10% AND final >= 6.0",
                RuleKind::Score,
                scored()
                    .triple(var(SUBJECT_VAR), sp("ownership"), var("own"))
                    .filter(Filter::lt("own", 10.0))
                    .filter(Filter::ge("final", 6.0)),
            ),
            Rule::new(
                "RotationRisk",
                "nailedness < 5.0",
                RuleKind::Score,
                scored()
                    .triple(var("s"), sp("nailednessScore"), var("nailed"))
                    .filter(Filter::lt("nailed", 5.0)),
            ),
            Rule::new(
                "ValuePick",
                "totalPoints / price >= 20 AND final >= 5.5",
                RuleKind::Score,
                scored()
                    .triple(var(SUBJECT_VAR), sp("totalPoints"), var("points"))
                    .triple(var(SUBJECT_VAR), sp("price"), var("price"))
                    .filter(Filter::compare(
                        Expr::div(Expr::var("points"), Expr::var("price")),
                        CompareOp::Ge,
                        Expr::num(20.0),
                    ))
                    .filter(Filter::ge("final", 5.5)),
            ),
            Rule::new(
                "Premium",
                "price >= 10.0 AND final >= 6.5",
                RuleKind::Score,
                scored()
                    .triple(var(SUBJECT_VAR), sp("price"), var("price"))
                    .filter(Filter::ge("price", 10.0))
                    .filter(Filter::ge("final", 6.5)),
            ),
            Rule::new(
                "InjuryConcern",
                "status != \"a\"",
                RuleKind::Score,
                scored()
                    .triple(var(SUBJECT_VAR), sp("status"), var("status"))
                    .filter(Filter::ne_text("status", "a")),
            ),
            Rule::new(
                "FormPlayer",
                "formPts >= 7.0 OR formXg >= 7.0",
                RuleKind::Score,
                scored()
                    .triple(var("s"), sp("formPtsScore"), var("form_pts"))
                    .triple(var("s"), sp("formXgScore"), var("form_xg"))
                    .filter(Filter::Or(vec![
                        Filter::ge("form_pts", 7.0),
                        Filter::ge("form_xg", 7.0),
                    ])),
            ),
            Rule::new(
                "FixtureFriendly",
                "fixtureScore >= 7.0",
                RuleKind::Score,
                scored()
                    .triple(var("s"), sp("fixtureScore"), var("fixture"))
                    .filter(Filter::ge("fixture", 7.0)),
            ),
            Rule::new(
                "NailedOn",
                "nailedness >= 9.0",
                RuleKind::Score,
                scored()
                    .triple(var("s"), sp("nailednessScore"), var("nailed"))
                    .filter(Filter::ge("nailed", 9.0)),
            ),
            Rule::new(
                "HighRecurrenceRisk",
                "has an injury event with recurrenceRisk = \"high\"",
                RuleKind::Injury,
                injured().triple(
                    var("i"),
                    sp("recurrenceRisk"),
                    Literal::String("high".into()),
                ),
            ),
            Rule::new(
                "RecentlyReturned",
                "status = \"a\" AND has an injury event with a recorded recovery date",
                RuleKind::Injury,
                injured()
                    .triple(var(SUBJECT_VAR), sp("status"), Literal::String("a".into()))
                    .triple(var("i"), sp("recordedRecoveryDate"), var("recovered")),
            ),
        ];
        Self { rules }
    }
}

fn var(name: &str) -> PatternTerm {
    PatternTerm::var(name)
}

fn sp(local: &str) -> PatternTerm {
    PatternTerm::Iri(vocab::sp(local))
}

fn player() -> GraphPattern {
    GraphPattern::new().triple(var(SUBJECT_VAR), vocab::rdf_type(), vocab::sp(vocab::PLAYER))
}

/// `?p a Player ; hasScore ?s . ?s finalScore ?final`
fn scored() -> GraphPattern {
    player()
        .triple(var(SUBJECT_VAR), sp(vocab::HAS_SCORE), var("s"))
        .triple(var("s"), sp("finalScore"), var("final"))
}

/// `?p a Player ; hasInjury ?i`
fn injured() -> GraphPattern {
    player().triple(var(SUBJECT_VAR), sp(vocab::HAS_INJURY), var("i"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_twelve_rules_with_unique_targets() {
        let builtin = RuleSet::builtin();
        assert_eq!(builtin.len(), 12);
        let revalidated = RuleSet::new(builtin.iter().cloned().collect()).unwrap();
        assert_eq!(revalidated.len(), 12);
        let injury = builtin.iter().filter(|r| r.kind == RuleKind::Injury).count();
        assert_eq!(injury, 2);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let a = Rule::new("TopPlayer", "a", RuleKind::Score, scored());
        let b = Rule::new("TopPlayer", "b", RuleKind::Score, scored());
        assert!(matches!(
            RuleSet::new(vec![a, b]),
            Err(InferError::DuplicateName { name }) if name == "TopPlayer"
        ));
    }

    #[test]
    fn duplicate_target_is_rejected() {
        let a = Rule::new("TopPlayer", "a", RuleKind::Score, scored());
        let mut b = Rule::new("EliteScorer", "b", RuleKind::Score, scored());
        b.target_class = vocab::sp("TopPlayer");
        match RuleSet::new(vec![a, b]) {
            Err(InferError::DuplicateTarget {
                first,
                second,
                class,
            }) => {
                assert_eq!(first, "TopPlayer");
                assert_eq!(second, "EliteScorer");
                assert_eq!(class, "TopPlayer");
            }
            other => panic!("expected a duplicate target, got {other:?}"),
        }
    }

    #[test]
    fn target_class_is_in_ontology_namespace() {
        let rules = RuleSet::builtin();
        let rule = rules.get("NailedOn").unwrap();
        assert_eq!(rule.target_class, vocab::sp("NailedOn"));
    }
}
