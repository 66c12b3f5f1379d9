//! Upstream entity snapshots, as delivered by the data collaborators.
//!
//! Field names follow the upstream JSON feed (with aliases for the raw
//! fantasy-league names). Fields every entity of a kind must carry are still
//! `Option` here so a missing one surfaces as a per-entity
//! [`IngestError::MissingField`](crate::error::IngestError::MissingField) at
//! ingestion instead of failing the whole decode.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Team attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub strength: Option<i64>,
    #[serde(default)]
    pub strength_attack_home: Option<i64>,
    #[serde(default)]
    pub strength_attack_away: Option<i64>,
    #[serde(default)]
    pub strength_defence_home: Option<i64>,
    #[serde(default)]
    pub strength_defence_away: Option<i64>,
}

/// Player attributes. Statistics default to zero when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSnapshot {
    pub id: u32,
    pub web_name: Option<String>,
    pub first_name: Option<String>,
    pub second_name: Option<String>,
    /// Team id.
    pub team: Option<u32>,
    /// `GKP`, `DEF`, `MID` or `FWD`.
    pub position: Option<String>,
    /// Price in millions.
    pub price: Option<f64>,
    /// Availability flag: `a`, `i`, `d`, `s` or `u`.
    pub status: Option<String>,
    pub news: String,
    #[serde(alias = "chance_of_playing_next_round")]
    pub chance_of_playing: Option<i64>,
    pub form: f64,
    #[serde(alias = "selected_by_percent")]
    pub ownership: f64,
    pub minutes: i64,
    #[serde(alias = "goals_scored")]
    pub goals: i64,
    pub assists: i64,
    pub clean_sheets: i64,
    pub goals_conceded: i64,
    pub yellow_cards: i64,
    pub red_cards: i64,
    pub saves: i64,
    pub bonus: i64,
    pub starts: i64,
    pub total_points: i64,
    #[serde(alias = "expected_goals")]
    pub xg: f64,
    #[serde(alias = "expected_assists")]
    pub xa: f64,
    /// Supplied involvement figure; derived as `xg + xa` when absent.
    #[serde(alias = "expected_goal_involvements")]
    pub xgi: Option<f64>,
    pub influence: f64,
    pub creativity: f64,
    pub threat: f64,
    pub ict_index: f64,
    pub transfers_in: i64,
    pub transfers_out: i64,
}

/// Fixture attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureSnapshot {
    pub id: u32,
    /// Gameweek; unscheduled fixtures have none.
    #[serde(alias = "event")]
    pub gameweek: Option<i64>,
    #[serde(alias = "team_h")]
    pub home_team: Option<u32>,
    #[serde(alias = "team_a")]
    pub away_team: Option<u32>,
    #[serde(alias = "team_h_difficulty")]
    pub home_difficulty: Option<i64>,
    #[serde(alias = "team_a_difficulty")]
    pub away_difficulty: Option<i64>,
    pub kickoff_time: Option<String>,
    pub finished: bool,
    #[serde(alias = "team_h_score")]
    pub home_score: Option<i64>,
    #[serde(alias = "team_a_score")]
    pub away_score: Option<i64>,
}

/// A computed SmartPlay score: five components on a 0-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub player_id: u32,
    pub final_score: f64,
    pub nailedness: f64,
    pub form_xg: f64,
    pub form_pts: f64,
    pub fixture: f64,
    #[serde(default)]
    pub gameweek: Option<i64>,
    /// Defaults to ingestion time.
    #[serde(default)]
    pub calculated_at: Option<DateTime<Utc>>,
}

/// Recurrence risk of a parsed injury.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceRisk {
    #[default]
    Low,
    Medium,
    High,
}

impl RecurrenceRisk {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A parsed injury or suspension record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryRecord {
    pub player_id: u32,
    #[serde(default = "unknown")]
    pub injury_type: String,
    #[serde(default = "unknown")]
    pub severity: String,
    #[serde(default)]
    pub chance_of_playing: Option<i64>,
    #[serde(default)]
    pub expected_return: Option<String>,
    #[serde(default)]
    pub is_suspension: bool,
    #[serde(default)]
    pub suspension_matches: Option<i64>,
    #[serde(default)]
    pub recurrence_risk: RecurrenceRisk,
    /// Defaults to ingestion time.
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
    /// Set once the player has returned from this injury.
    #[serde(default)]
    pub recovery_date: Option<String>,
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Kind of an ingested record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Team,
    Player,
    Fixture,
    Score,
    Injury,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Team => "team",
            Self::Player => "player",
            Self::Fixture => "fixture",
            Self::Score => "score",
            Self::Injury => "injury",
        };
        f.write_str(name)
    }
}

/// A record that was not ingested, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub kind: EntityKind,
    /// Entity id, when one could be read.
    pub id: Option<u32>,
    pub reason: String,
}

/// Everything one rebuild ingests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub teams: Vec<TeamSnapshot>,
    pub players: Vec<PlayerSnapshot>,
    pub fixtures: Vec<FixtureSnapshot>,
    pub scores: Vec<ScoreSnapshot>,
    pub injuries: Vec<InjuryRecord>,
    /// Records rejected while decoding the bundle.
    #[serde(skip)]
    pub rejected: Vec<SkippedRecord>,
}

impl Snapshot {
    /// Decode a JSON bundle. Each array element is decoded on its own, so a
    /// malformed record lands in [`Snapshot::rejected`] instead of failing
    /// the batch. Only a non-object document is an error.
    pub fn from_json_str(json: &str) -> Result<Self, IngestError> {
        let document: serde_json::Value =
            serde_json::from_str(json).map_err(|e| IngestError::Bundle {
                message: e.to_string(),
            })?;
        let serde_json::Value::Object(mut sections) = document else {
            return Err(IngestError::Bundle {
                message: "top-level value must be an object".into(),
            });
        };

        let mut snapshot = Self::default();
        let mut take = |name: &str| sections.remove(name);
        snapshot.teams = decode_section(take("teams"), EntityKind::Team, &mut snapshot.rejected);
        snapshot.players =
            decode_section(take("players"), EntityKind::Player, &mut snapshot.rejected);
        snapshot.fixtures =
            decode_section(take("fixtures"), EntityKind::Fixture, &mut snapshot.rejected);
        snapshot.scores = decode_section(take("scores"), EntityKind::Score, &mut snapshot.rejected);
        snapshot.injuries =
            decode_section(take("injuries"), EntityKind::Injury, &mut snapshot.rejected);
        Ok(snapshot)
    }
}

fn decode_section<T: DeserializeOwned>(
    section: Option<serde_json::Value>,
    kind: EntityKind,
    rejected: &mut Vec<SkippedRecord>,
) -> Vec<T> {
    let items = match section {
        None | Some(serde_json::Value::Null) => return Vec::new(),
        Some(serde_json::Value::Array(items)) => items,
        Some(_) => {
            let e = IngestError::Decode {
                kind: kind.to_string(),
                message: "section is not an array".into(),
            };
            tracing::warn!(error = %e, "skipping snapshot section");
            rejected.push(SkippedRecord {
                kind,
                id: None,
                reason: e.to_string(),
            });
            return Vec::new();
        }
    };

    let mut decoded = Vec::with_capacity(items.len());
    for item in items {
        let id = ["id", "player_id"]
            .iter()
            .find_map(|key| item.get(*key).and_then(serde_json::Value::as_u64))
            .and_then(|raw| u32::try_from(raw).ok());
        match serde_json::from_value::<T>(item) {
            Ok(value) => decoded.push(value),
            Err(source) => {
                let e = IngestError::Decode {
                    kind: kind.to_string(),
                    message: source.to_string(),
                };
                tracing::warn!(%kind, ?id, error = %e, "skipping malformed record");
                rejected.push(SkippedRecord {
                    kind,
                    id,
                    reason: e.to_string(),
                });
            }
        }
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_decodes_with_upstream_aliases() {
        let json = r#"{
            "teams": [{"id": 1, "name": "Arsenal", "short_name": "ARS", "strength": 4}],
            "players": [{
                "id": 7, "web_name": "Saka", "team": 1, "position": "MID", "price": 10.0,
                "status": "a", "selected_by_percent": 35.2, "goals_scored": 9,
                "expected_goals": 8.1, "chance_of_playing_next_round": 100
            }],
            "fixtures": [{"id": 3, "event": 5, "team_h": 1, "team_a": 2}]
        }"#;
        let snapshot = Snapshot::from_json_str(json).unwrap();
        assert!(snapshot.rejected.is_empty());
        let player = &snapshot.players[0];
        assert_eq!(player.ownership, 35.2);
        assert_eq!(player.goals, 9);
        assert_eq!(player.chance_of_playing, Some(100));
        assert_eq!(snapshot.fixtures[0].gameweek, Some(5));
        assert_eq!(snapshot.fixtures[0].home_team, Some(1));
    }

    #[test]
    fn malformed_record_is_isolated() {
        let json = r#"{
            "players": [
                {"id": 1, "web_name": "Ok"},
                {"id": 2, "minutes": "lots"},
                {"id": 3, "web_name": "AlsoOk"}
            ],
            "scores": [{"player_id": 1}]
        }"#;
        let snapshot = Snapshot::from_json_str(json).unwrap();
        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.rejected.len(), 2);
        assert_eq!(snapshot.rejected[0].kind, EntityKind::Player);
        assert_eq!(snapshot.rejected[0].id, Some(2));
        assert_eq!(snapshot.rejected[1].kind, EntityKind::Score);
    }

    #[test]
    fn non_object_bundle_is_an_error() {
        assert!(matches!(
            Snapshot::from_json_str("[1, 2]"),
            Err(IngestError::Bundle { .. })
        ));
    }

    #[test]
    fn injury_defaults() {
        let record: InjuryRecord = serde_json::from_str(r#"{"player_id": 4}"#).unwrap();
        assert_eq!(record.injury_type, "unknown");
        assert_eq!(record.recurrence_risk, RecurrenceRisk::Low);
        assert!(!record.is_suspension);
    }
}
