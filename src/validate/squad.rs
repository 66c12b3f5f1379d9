//! Squad-shape validation for a proposed 15-player selection.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::graph::index::TripleStore;
use crate::graph::{Iri, Literal, Term, Triple};
use crate::vocab;

const PRICE_EPSILON: f64 = 1e-6;

/// Shape a squad must have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SquadRules {
    pub size: usize,
    pub budget: f64,
    pub goalkeepers: usize,
    pub defenders: usize,
    pub midfielders: usize,
    pub forwards: usize,
    pub max_per_team: usize,
}

impl Default for SquadRules {
    fn default() -> Self {
        Self {
            size: 15,
            budget: 100.0,
            goalkeepers: 2,
            defenders: 5,
            midfielders: 5,
            forwards: 3,
            max_per_team: 3,
        }
    }
}

/// A hard squad constraint failure. Any violation makes the squad invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SquadViolation {
    SquadSize { expected: usize, actual: usize },
    PlayerNotFound { player_id: u32 },
    DuplicatePlayer { player_id: u32 },
    BudgetExceeded { total: f64, budget: f64 },
    GoalkeeperCount { expected: usize, actual: usize },
    DefenderCount { expected: usize, actual: usize },
    MidfielderCount { expected: usize, actual: usize },
    ForwardCount { expected: usize, actual: usize },
    TeamLimit { team: String, count: usize, limit: usize },
}

/// A soft concern. Never affects validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SquadWarning {
    /// Status other than available.
    Unavailable { player_id: u32, name: String, status: String },
    RotationRisk { player_id: u32, name: String },
    HighRecurrenceRisk { player_id: u32, name: String },
}

/// A squad member as read from the base graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadPlayer {
    pub id: u32,
    pub name: String,
    pub position: String,
    /// Team short name (or team identifier if the team has none).
    pub team: String,
    pub price: f64,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SquadSummary {
    pub players: Vec<SquadPlayer>,
    pub position_counts: BTreeMap<String, usize>,
    pub team_counts: BTreeMap<String, usize>,
    pub total_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SquadReport {
    pub valid: bool,
    pub violations: Vec<SquadViolation>,
    pub warnings: Vec<SquadWarning>,
    pub summary: SquadSummary,
}

fn text(store: &TripleStore, subject: &Iri, property: &str) -> Option<String> {
    store
        .base()
        .object(subject, &vocab::sp(property))
        .and_then(Term::as_literal)
        .and_then(Literal::as_str)
        .map(str::to_string)
}

/// Current attributes of a player, or `None` if the id is not a known player.
pub fn lookup_player(store: &TripleStore, id: u32) -> Option<SquadPlayer> {
    let iri = vocab::player(id);
    let typed = Triple::type_assertion(iri.clone(), vocab::sp(vocab::PLAYER));
    if !store.base().contains(&typed) {
        return None;
    }
    let team = store
        .base()
        .object(&iri, &vocab::sp(vocab::PLAYS_FOR))
        .and_then(Term::as_iri)
        .map(|team| {
            text(store, team, "shortName").unwrap_or_else(|| team.local_name().to_string())
        })
        .unwrap_or_default();
    let price = store
        .base()
        .object(&iri, &vocab::sp("price"))
        .and_then(Term::as_literal)
        .and_then(Literal::as_f64)
        .unwrap_or_default();
    Some(SquadPlayer {
        id,
        name: text(store, &iri, "webName").unwrap_or_default(),
        position: text(store, &iri, "position").unwrap_or_default(),
        team,
        price,
        status: text(store, &iri, "status").unwrap_or_default(),
    })
}

fn has_tag(store: &TripleStore, id: u32, class: &str) -> bool {
    store
        .inferred()
        .contains(&Triple::type_assertion(vocab::player(id), vocab::sp(class)))
}

/// Check a proposed squad against `rules`.
///
/// Size and duplicates are checked first. If any id cannot be resolved the
/// report stops there: one `PlayerNotFound` per missing id, no shape checks.
pub fn validate_squad(store: &TripleStore, ids: &[u32], rules: &SquadRules) -> SquadReport {
    let mut report = SquadReport::default();
    if ids.len() != rules.size {
        report.violations.push(SquadViolation::SquadSize {
            expected: rules.size,
            actual: ids.len(),
        });
    }

    let mut seen = BTreeSet::new();
    let mut flagged = BTreeSet::new();
    let mut distinct = Vec::with_capacity(ids.len());
    for &id in ids {
        if seen.insert(id) {
            distinct.push(id);
        } else if flagged.insert(id) {
            report.violations.push(SquadViolation::DuplicatePlayer { player_id: id });
        }
    }

    let mut missing = false;
    for &id in &distinct {
        match lookup_player(store, id) {
            Some(player) => report.summary.players.push(player),
            None => {
                missing = true;
                report.violations.push(SquadViolation::PlayerNotFound { player_id: id });
            }
        }
    }
    if missing {
        tracing::debug!(violations = report.violations.len(), "squad has unknown players");
        return report;
    }

    let summary = &mut report.summary;
    for player in &summary.players {
        *summary.position_counts.entry(player.position.clone()).or_default() += 1;
        *summary.team_counts.entry(player.team.clone()).or_default() += 1;
        summary.total_price += player.price;
    }
    summary.total_price = (summary.total_price * 100.0).round() / 100.0;

    if summary.total_price > rules.budget + PRICE_EPSILON {
        report.violations.push(SquadViolation::BudgetExceeded {
            total: summary.total_price,
            budget: rules.budget,
        });
    }

    let in_position = |position: &str| summary.position_counts.get(position).copied().unwrap_or(0);
    let (gkp, def, mid, fwd) = (
        in_position("GKP"),
        in_position("DEF"),
        in_position("MID"),
        in_position("FWD"),
    );
    if gkp != rules.goalkeepers {
        report.violations.push(SquadViolation::GoalkeeperCount {
            expected: rules.goalkeepers,
            actual: gkp,
        });
    }
    if def != rules.defenders {
        report.violations.push(SquadViolation::DefenderCount {
            expected: rules.defenders,
            actual: def,
        });
    }
    if mid != rules.midfielders {
        report.violations.push(SquadViolation::MidfielderCount {
            expected: rules.midfielders,
            actual: mid,
        });
    }
    if fwd != rules.forwards {
        report.violations.push(SquadViolation::ForwardCount {
            expected: rules.forwards,
            actual: fwd,
        });
    }
    for (team, &count) in &summary.team_counts {
        if count > rules.max_per_team {
            report.violations.push(SquadViolation::TeamLimit {
                team: team.clone(),
                count,
                limit: rules.max_per_team,
            });
        }
    }

    for player in &summary.players {
        if player.status != "a" {
            report.warnings.push(SquadWarning::Unavailable {
                player_id: player.id,
                name: player.name.clone(),
                status: player.status.clone(),
            });
        }
        if has_tag(store, player.id, "RotationRisk") {
            report.warnings.push(SquadWarning::RotationRisk {
                player_id: player.id,
                name: player.name.clone(),
            });
        }
        if has_tag(store, player.id, "HighRecurrenceRisk") {
            report.warnings.push(SquadWarning::HighRecurrenceRisk {
                player_id: player.id,
                name: player.name.clone(),
            });
        }
    }

    report.valid = report.violations.is_empty();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphKind;

    /// 15 players on 5 teams: ids 1-2 GKP, 3-7 DEF, 8-12 MID, 13-15 FWD.
    fn league() -> TripleStore {
        let mut store = TripleStore::new();
        for (team, short) in (1..=5).zip(["ARS", "CHE", "LIV", "MCI", "TOT"]) {
            let t = vocab::team(team);
            store.add(GraphKind::Base, Triple::type_assertion(t.clone(), vocab::sp(vocab::TEAM)));
            let short_name = Triple::new(t, vocab::sp("shortName"), Literal::from(short));
            store.add(GraphKind::Base, short_name);
        }
        for id in 1..=16u32 {
            let position = match id {
                1 | 2 | 16 => "GKP",
                3..=7 => "DEF",
                8..=12 => "MID",
                _ => "FWD",
            };
            let p = vocab::player(id);
            let facts = [
                Triple::type_assertion(p.clone(), vocab::sp(vocab::PLAYER)),
                Triple::new(p.clone(), vocab::sp("webName"), Literal::String(format!("P{id}"))),
                Triple::new(p.clone(), vocab::sp("position"), Literal::from(position)),
                Triple::new(p.clone(), vocab::sp("price"), Literal::Decimal(6.5)),
                Triple::new(p.clone(), vocab::sp("status"), Literal::from("a")),
                Triple::new(p, vocab::sp(vocab::PLAYS_FOR), vocab::team((id - 1) % 5 + 1)),
            ];
            store.extend(GraphKind::Base, facts);
        }
        store
    }

    fn squad() -> Vec<u32> {
        (1..=15).collect()
    }

    #[test]
    fn valid_squad() {
        let report = validate_squad(&league(), &squad(), &SquadRules::default());
        assert!(report.valid, "{:?}", report.violations);
        assert!(report.violations.is_empty());
        assert_eq!(report.summary.total_price, 97.5);
        assert_eq!(report.summary.position_counts["GKP"], 2);
    }

    #[test]
    fn third_goalkeeper() {
        let mut ids = squad();
        ids[14] = 16;
        let report = validate_squad(&league(), &ids, &SquadRules::default());
        assert!(!report.valid);
        let gk: Vec<_> = report
            .violations
            .iter()
            .filter(|v| matches!(v, SquadViolation::GoalkeeperCount { .. }))
            .collect();
        assert_eq!(gk, vec![&SquadViolation::GoalkeeperCount { expected: 2, actual: 3 }]);
    }

    #[test]
    fn missing_player_short_circuits() {
        let mut ids = squad();
        ids.pop();
        ids.push(99);
        let report = validate_squad(&league(), &ids, &SquadRules::default());
        assert_eq!(report.violations, vec![SquadViolation::PlayerNotFound { player_id: 99 }]);
        assert!(!report.valid);
    }

    #[test]
    fn duplicates_and_size() {
        let mut ids = squad();
        ids.push(3);
        let report = validate_squad(&league(), &ids, &SquadRules::default());
        let oversized = SquadViolation::SquadSize {
            expected: 15,
            actual: 16,
        };
        assert!(report.violations.contains(&oversized));
        assert!(report.violations.contains(&SquadViolation::DuplicatePlayer { player_id: 3 }));
    }

    fn reprice(store: &mut TripleStore, id: u32, value: f64) {
        let p = vocab::player(id);
        let price = vocab::sp("price");
        store.remove_matching(GraphKind::Base, Some(&p), Some(&price), None);
        store.add(GraphKind::Base, Triple::new(p, price, Literal::Decimal(value)));
    }

    #[test]
    fn budget_is_inclusive() {
        let mut store = league();
        reprice(&mut store, 1, 9.0);
        let at_limit = validate_squad(&store, &squad(), &SquadRules::default());
        assert_eq!(at_limit.summary.total_price, 100.0);
        assert!(at_limit.valid);

        reprice(&mut store, 1, 9.5);
        let over = validate_squad(&store, &squad(), &SquadRules::default());
        assert_eq!(
            over.violations,
            vec![SquadViolation::BudgetExceeded { total: 100.5, budget: 100.0 }]
        );
    }

    #[test]
    fn team_limit_is_one_violation_per_team() {
        let rules = SquadRules {
            max_per_team: 2,
            ..SquadRules::default()
        };
        let report = validate_squad(&league(), &squad(), &rules);
        let limits = report
            .violations
            .iter()
            .filter(|v| matches!(v, SquadViolation::TeamLimit { count: 3, limit: 2, .. }))
            .count();
        assert_eq!(limits, 5);
        assert_eq!(report.violations.len(), 5);
    }

    #[test]
    fn warnings_do_not_affect_validity() {
        let mut store = league();
        let p4 = vocab::player(4);
        let status = vocab::sp("status");
        store.remove_matching(GraphKind::Base, Some(&p4), Some(&status), None);
        store.add(GraphKind::Base, Triple::new(p4.clone(), status, Literal::from("d")));
        store.add(GraphKind::Inferred, Triple::type_assertion(p4, vocab::sp("RotationRisk")));

        let report = validate_squad(&store, &squad(), &SquadRules::default());
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 2);
    }
}
