//! Fact ingestion: upstream snapshots → base-graph triples.
//!
//! Each entity is converted to its full triple set before anything is written,
//! so an entity with a missing or unrepresentable field is skipped as a whole
//! and the rest of the batch continues. Derived attributes (points per game,
//! expected goal involvement) are computed here, once.

pub mod snapshot;

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::graph::index::{TripleSource, TripleStore};
use crate::graph::{GraphKind, Iri, Literal, Term, Triple};
use crate::vocab;

pub use snapshot::{
    EntityKind, FixtureSnapshot, InjuryRecord, PlayerSnapshot, RecurrenceRisk, ScoreSnapshot,
    SkippedRecord, Snapshot, TeamSnapshot,
};

/// Counts of what an ingestion pass wrote, plus everything it skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub teams: usize,
    pub players: usize,
    pub fixtures: usize,
    pub scores: usize,
    pub injuries: usize,
    /// Base triples removed by the pass (replaced entities, old scores, orphans).
    pub triples_removed: usize,
    pub triples_added: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl IngestReport {
    fn skip(&mut self, kind: EntityKind, id: Option<u32>, error: &IngestError) {
        tracing::warn!(%kind, ?id, error = %error, "skipping record");
        self.skipped.push(SkippedRecord {
            kind,
            id,
            reason: error.to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// Per-entity triple builders
// ---------------------------------------------------------------------------

/// Accumulates one entity's triples; typed-literal constructors validate values.
struct EntityTriples {
    subject: Iri,
    entity: String,
    triples: Vec<Triple>,
}

impl EntityTriples {
    fn new(subject: Iri, entity: String, class: &str) -> Self {
        let triples = vec![Triple::type_assertion(subject.clone(), vocab::sp(class))];
        Self {
            subject,
            entity,
            triples,
        }
    }

    fn push(&mut self, property: &str, object: impl Into<Term>) {
        self.triples
            .push(Triple::new(self.subject.clone(), vocab::sp(property), object));
    }

    fn integer(&mut self, property: &str, value: i64) {
        self.push(property, Literal::Integer(value));
    }

    fn decimal(&mut self, property: &str, value: f64) -> Result<(), IngestError> {
        if !value.is_finite() {
            return Err(IngestError::InvalidField {
                entity: self.entity.clone(),
                field: property.to_string(),
                message: format!("{value} is not a finite number"),
            });
        }
        self.push(property, Literal::Decimal(value));
        Ok(())
    }

    fn text(&mut self, property: &str, value: &str) {
        self.push(property, Literal::String(value.to_string()));
    }

    fn flag(&mut self, property: &str, value: bool) {
        self.push(property, Literal::Boolean(value));
    }

    fn link(&mut self, property: &str, target: Iri) {
        self.push(property, target);
    }

    fn required<'a, T>(&self, value: &'a Option<T>, field: &str) -> Result<&'a T, IngestError> {
        value.as_ref().ok_or_else(|| IngestError::MissingField {
            entity: self.entity.clone(),
            field: field.to_string(),
        })
    }

    fn finish(self) -> Vec<Triple> {
        self.triples
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Points per game, treating every 90 minutes played as one game (at least one).
pub fn points_per_game(total_points: i64, minutes: i64) -> f64 {
    let games = (minutes as f64 / 90.0).max(1.0);
    round2(total_points as f64 / games)
}

pub(crate) fn team_triples(team: &TeamSnapshot) -> Result<Vec<Triple>, IngestError> {
    let mut e = EntityTriples::new(vocab::team(team.id), format!("team {}", team.id), vocab::TEAM);
    let name = e.required(&team.name, "name")?;
    let short_name = e.required(&team.short_name, "short_name")?;
    let strength = *e.required(&team.strength, "strength")?;

    e.integer("teamId", i64::from(team.id));
    e.text("name", name);
    e.text("shortName", short_name);
    e.integer("strength", strength);
    for (property, value) in [
        ("strengthAttackHome", team.strength_attack_home),
        ("strengthAttackAway", team.strength_attack_away),
        ("strengthDefenceHome", team.strength_defence_home),
        ("strengthDefenceAway", team.strength_defence_away),
    ] {
        if let Some(value) = value {
            e.integer(property, value);
        }
    }
    Ok(e.finish())
}

pub(crate) fn player_triples(player: &PlayerSnapshot) -> Result<Vec<Triple>, IngestError> {
    let mut e = EntityTriples::new(
        vocab::player(player.id),
        format!("player {}", player.id),
        vocab::PLAYER,
    );
    let web_name = e.required(&player.web_name, "web_name")?;
    let team = *e.required(&player.team, "team")?;
    let position = e.required(&player.position, "position")?;
    let price = *e.required(&player.price, "price")?;
    let status = e.required(&player.status, "status")?;

    e.integer("playerId", i64::from(player.id));
    e.text("webName", web_name);
    if let Some(first) = &player.first_name {
        e.text("firstName", first);
    }
    if let Some(second) = &player.second_name {
        e.text("secondName", second);
    }
    e.text("position", position);
    e.link(vocab::PLAYS_FOR, vocab::team(team));
    e.decimal("price", price)?;
    e.text("status", status);
    e.text("news", &player.news);
    if let Some(chance) = player.chance_of_playing {
        e.integer("chanceOfPlaying", chance);
    }

    for (property, value) in [
        ("minutes", player.minutes),
        ("goals", player.goals),
        ("assists", player.assists),
        ("cleanSheets", player.clean_sheets),
        ("goalsConceded", player.goals_conceded),
        ("yellowCards", player.yellow_cards),
        ("redCards", player.red_cards),
        ("saves", player.saves),
        ("bonus", player.bonus),
        ("starts", player.starts),
        ("totalPoints", player.total_points),
        ("transfersIn", player.transfers_in),
        ("transfersOut", player.transfers_out),
    ] {
        e.integer(property, value);
    }

    let xgi = player.xgi.unwrap_or(player.xg + player.xa);
    for (property, value) in [
        ("form", player.form),
        ("ownership", player.ownership),
        ("xG", player.xg),
        ("xA", player.xa),
        ("xGI", xgi),
        ("influence", player.influence),
        ("creativity", player.creativity),
        ("threat", player.threat),
        ("ictIndex", player.ict_index),
        (
            "pointsPerGame",
            points_per_game(player.total_points, player.minutes),
        ),
    ] {
        e.decimal(property, value)?;
    }
    Ok(e.finish())
}

pub(crate) fn fixture_triples(fixture: &FixtureSnapshot) -> Result<Vec<Triple>, IngestError> {
    let mut e = EntityTriples::new(
        vocab::fixture(fixture.id),
        format!("fixture {}", fixture.id),
        vocab::FIXTURE,
    );
    let home = *e.required(&fixture.home_team, "home_team")?;
    let away = *e.required(&fixture.away_team, "away_team")?;

    e.integer("fixtureId", i64::from(fixture.id));
    e.link(vocab::HOME_TEAM, vocab::team(home));
    e.link(vocab::AWAY_TEAM, vocab::team(away));
    e.flag("finished", fixture.finished);
    for (property, value) in [
        ("gameweek", fixture.gameweek),
        ("homeDifficulty", fixture.home_difficulty),
        ("awayDifficulty", fixture.away_difficulty),
        ("homeScore", fixture.home_score),
        ("awayScore", fixture.away_score),
    ] {
        if let Some(value) = value {
            e.integer(property, value);
        }
    }
    if let Some(kickoff) = &fixture.kickoff_time {
        e.text("kickoffTime", kickoff);
    }
    Ok(e.finish())
}

/// The score entity plus the player's `hasScore` edge.
pub(crate) fn score_triples(score: &ScoreSnapshot) -> Result<Vec<Triple>, IngestError> {
    let player = vocab::player(score.player_id);
    let iri = vocab::score(score.player_id);
    let mut e = EntityTriples::new(
        iri.clone(),
        format!("score for player {}", score.player_id),
        vocab::SMARTPLAY_SCORE,
    );
    for (property, value) in [
        ("finalScore", score.final_score),
        ("nailednessScore", score.nailedness),
        ("formXgScore", score.form_xg),
        ("formPtsScore", score.form_pts),
        ("fixtureScore", score.fixture),
    ] {
        e.decimal(property, value)?;
    }
    let calculated_at = score.calculated_at.unwrap_or_else(Utc::now);
    e.text("calculatedAt", &calculated_at.to_rfc3339());
    if let Some(gameweek) = score.gameweek {
        e.integer("forGameweek", gameweek);
    }
    let mut triples = e.finish();
    triples.push(Triple::new(player, vocab::sp(vocab::HAS_SCORE), iri));
    Ok(triples)
}

/// The injury event plus the player's `hasInjury` edge.
pub(crate) fn injury_triples(record: &InjuryRecord, iri: Iri) -> Result<Vec<Triple>, IngestError> {
    let player = vocab::player(record.player_id);
    let mut e = EntityTriples::new(
        iri.clone(),
        format!("injury for player {}", record.player_id),
        vocab::INJURY_EVENT,
    );
    e.text("injuryType", &record.injury_type);
    e.text("severity", &record.severity);
    e.flag("isSuspension", record.is_suspension);
    e.text("recurrenceRisk", record.recurrence_risk.as_str());
    e.text(
        "recordedAt",
        &record.recorded_at.unwrap_or_else(Utc::now).to_rfc3339(),
    );
    if let Some(chance) = record.chance_of_playing {
        e.integer("chanceOfPlaying", chance);
    }
    if let Some(expected) = &record.expected_return {
        e.text("expectedReturn", expected);
    }
    if let Some(matches) = record.suspension_matches {
        e.integer("suspensionMatches", matches);
    }
    if let Some(recovered) = &record.recovery_date {
        e.text("recordedRecoveryDate", recovered);
    }
    let mut triples = e.finish();
    triples.push(Triple::new(player, vocab::sp(vocab::HAS_INJURY), iri));
    Ok(triples)
}

// ---------------------------------------------------------------------------
// Store operations
// ---------------------------------------------------------------------------

fn is_player(store: &TripleStore, player: &Iri) -> bool {
    store
        .base()
        .contains(&Triple::type_assertion(player.clone(), vocab::sp(vocab::PLAYER)))
}

fn subjects_of_class(store: &TripleStore, class: &str) -> Vec<Iri> {
    let class = Term::Iri(vocab::sp(class));
    store
        .base()
        .subjects(&vocab::rdf_type(), &class)
        .cloned()
        .collect()
}

/// Remove an entity's own triples and every edge pointing at it.
fn remove_entity(store: &mut TripleStore, entity: &Iri) -> usize {
    let as_object = Term::Iri(entity.clone());
    store.remove_matching(GraphKind::Base, Some(entity), None, None)
        + store.remove_matching(GraphKind::Base, None, None, Some(&as_object))
}

fn write(store: &mut TripleStore, triples: Vec<Triple>, report: &mut IngestReport) {
    report.triples_added += store.extend(GraphKind::Base, triples);
}

/// Replace all team, player and fixture facts with the snapshot's.
///
/// Score and injury links survive for players still present; score and
/// injury entities whose player disappeared are swept afterwards. The
/// snapshot's own scores and injuries are then synced.
pub fn rebuild(store: &mut TripleStore, snapshot: &Snapshot) -> IngestReport {
    let mut report = IngestReport {
        skipped: snapshot.rejected.clone(),
        ..IngestReport::default()
    };

    let kept_links: BTreeSet<Iri> = [vocab::HAS_SCORE, vocab::HAS_INJURY]
        .into_iter()
        .map(vocab::sp)
        .collect();
    let mut doomed = Vec::new();
    for class in [vocab::TEAM, vocab::PLAYER, vocab::FIXTURE] {
        for subject in subjects_of_class(store, class) {
            doomed.extend(
                store
                    .base()
                    .matching(Some(&subject), None, None)
                    .filter(|t| !kept_links.contains(&t.predicate))
                    .cloned(),
            );
        }
    }
    report.triples_removed += doomed
        .iter()
        .filter(|t| store.remove(GraphKind::Base, t))
        .count();

    for team in &snapshot.teams {
        match team_triples(team) {
            Ok(triples) => {
                write(store, triples, &mut report);
                report.teams += 1;
            }
            Err(e) => report.skip(EntityKind::Team, Some(team.id), &e),
        }
    }
    for player in &snapshot.players {
        match player_triples(player) {
            Ok(triples) => {
                write(store, triples, &mut report);
                report.players += 1;
            }
            Err(e) => report.skip(EntityKind::Player, Some(player.id), &e),
        }
    }
    for fixture in &snapshot.fixtures {
        match fixture_triples(fixture) {
            Ok(triples) => {
                write(store, triples, &mut report);
                report.fixtures += 1;
            }
            Err(e) => report.skip(EntityKind::Fixture, Some(fixture.id), &e),
        }
    }

    report.triples_removed += sweep_orphans(store);
    sync_scores(store, &snapshot.scores, &mut report);
    sync_injuries(store, &snapshot.injuries, &mut report);

    tracing::info!(
        teams = report.teams,
        players = report.players,
        fixtures = report.fixtures,
        skipped = report.skipped.len(),
        "base graph rebuilt"
    );
    report
}

/// Drop score and injury entities whose owning player no longer exists.
fn sweep_orphans(store: &mut TripleStore) -> usize {
    let mut removed = 0;
    for link in [vocab::HAS_SCORE, vocab::HAS_INJURY] {
        let link = vocab::sp(link);
        let view: &TripleStore = store;
        let orphans: Vec<Iri> = view
            .base()
            .matching(None, Some(&link), None)
            .filter(|t| !is_player(view, &t.subject))
            .filter_map(|t| t.object.as_iri().cloned())
            .collect();
        for entity in orphans {
            removed += remove_entity(store, &entity);
        }
    }
    if removed > 0 {
        tracing::debug!(removed, "swept orphaned score/injury facts");
    }
    removed
}

/// Attach scores, replacing each player's previous score entity.
pub fn sync_scores(store: &mut TripleStore, scores: &[ScoreSnapshot], report: &mut IngestReport) {
    let has_score = vocab::sp(vocab::HAS_SCORE);
    for score in scores {
        let player = vocab::player(score.player_id);
        if !is_player(store, &player) {
            let e = IngestError::UnknownPlayer {
                entity: "score".into(),
                player_id: score.player_id,
            };
            report.skip(EntityKind::Score, Some(score.player_id), &e);
            continue;
        }
        let triples = match score_triples(score) {
            Ok(triples) => triples,
            Err(e) => {
                report.skip(EntityKind::Score, Some(score.player_id), &e);
                continue;
            }
        };
        let previous: Vec<Iri> = store
            .base()
            .objects(&player, &has_score)
            .filter_map(Term::as_iri)
            .cloned()
            .collect();
        for old in &previous {
            report.triples_removed += remove_entity(store, old);
        }
        write(store, triples, report);
        report.scores += 1;
    }
}

/// Add injury events. Events are never replaced; each sync adds new ones.
pub fn sync_injuries(
    store: &mut TripleStore,
    injuries: &[InjuryRecord],
    report: &mut IngestReport,
) {
    for record in injuries {
        let player = vocab::player(record.player_id);
        if !is_player(store, &player) {
            let e = IngestError::UnknownPlayer {
                entity: "injury".into(),
                player_id: record.player_id,
            };
            report.skip(EntityKind::Injury, Some(record.player_id), &e);
            continue;
        }
        let iri = vocab::injury(record.player_id, store.next_injury_seq());
        match injury_triples(record, iri) {
            Ok(triples) => {
                write(store, triples, report);
                report.injuries += 1;
            }
            Err(e) => report.skip(EntityKind::Injury, Some(record.player_id), &e),
        }
    }
}
