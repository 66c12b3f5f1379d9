//! Named query templates built from typed parameters.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::vocab;

static TEAM_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").expect("team code regex is valid"));

/// Playing position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Gkp,
    Def,
    Mid,
    Fwd,
}

impl Position {
    pub const ALL: [Position; 4] = [Self::Gkp, Self::Def, Self::Mid, Self::Fwd];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gkp => "GKP",
            Self::Def => "DEF",
            Self::Mid => "MID",
            Self::Fwd => "FWD",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GKP" | "GK" => Ok(Self::Gkp),
            "DEF" => Ok(Self::Def),
            "MID" => Ok(Self::Mid),
            "FWD" => Ok(Self::Fwd),
            _ => Err(QueryError::InvalidParameter {
                name: "position".into(),
                value: s.to_string(),
                expected: "GKP, DEF, MID or FWD".into(),
            }),
        }
    }
}

fn check_limit(limit: usize) -> Result<usize, QueryError> {
    if (1..=1000).contains(&limit) {
        Ok(limit)
    } else {
        Err(QueryError::InvalidParameter {
            name: "limit".into(),
            value: limit.to_string(),
            expected: "1..=1000".into(),
        })
    }
}

const PLAYER_COLUMNS: &str = "?player ?name ?position ?team ?price ?final";

const PLAYER_BODY: &str = "?player a sp:Player ;
      sp:webName ?name ;
      sp:position ?position ;
      sp:price ?price ;
      sp:playsFor ?t .
  ?t sp:shortName ?team .
";

/// Scored players ordered by final score.
pub fn top_by_score(limit: usize) -> Result<String, QueryError> {
    let limit = check_limit(limit)?;
    Ok(format!(
        "{prefixes}SELECT {PLAYER_COLUMNS} WHERE {{\n  {PLAYER_BODY}  ?player sp:hasScore ?s .\n  ?s sp:finalScore ?final .\n}}\nORDER BY DESC(?final) ?player\nLIMIT {limit}",
        prefixes = vocab::sparql_prefixes(),
    ))
}

/// Players in one position, best scored first (unscored players last).
pub fn by_position(position: Position, limit: usize) -> Result<String, QueryError> {
    let limit = check_limit(limit)?;
    Ok(format!(
        "{prefixes}SELECT {PLAYER_COLUMNS} WHERE {{\n  {PLAYER_BODY}  OPTIONAL {{ ?player sp:hasScore ?s . ?s sp:finalScore ?final }}\n  FILTER(?position = \"{position}\")\n}}\nORDER BY DESC(?final) ?player\nLIMIT {limit}",
        prefixes = vocab::sparql_prefixes(),
    ))
}

/// Players of one team, identified by its three-letter short name.
pub fn by_team(short_name: &str, limit: usize) -> Result<String, QueryError> {
    if !TEAM_CODE.is_match(short_name) {
        return Err(QueryError::InvalidParameter {
            name: "team".into(),
            value: short_name.to_string(),
            expected: "three uppercase letters".into(),
        });
    }
    let limit = check_limit(limit)?;
    Ok(format!(
        "{prefixes}SELECT {PLAYER_COLUMNS} WHERE {{\n  {PLAYER_BODY}  OPTIONAL {{ ?player sp:hasScore ?s . ?s sp:finalScore ?final }}\n  FILTER(?team = \"{short_name}\")\n}}\nORDER BY DESC(?final) ?player\nLIMIT {limit}",
        prefixes = vocab::sparql_prefixes(),
    ))
}

/// Low-ownership scored players.
pub fn differentials(max_ownership: f64, limit: usize) -> Result<String, QueryError> {
    if !(0.0..=100.0).contains(&max_ownership) {
        return Err(QueryError::InvalidParameter {
            name: "max_ownership".into(),
            value: max_ownership.to_string(),
            expected: "a percentage between 0 and 100".into(),
        });
    }
    let limit = check_limit(limit)?;
    Ok(format!(
        "{prefixes}SELECT {PLAYER_COLUMNS} ?ownership WHERE {{\n  {PLAYER_BODY}  ?player sp:ownership ?ownership ;\n      sp:hasScore ?s .\n  ?s sp:finalScore ?final .\n  FILTER(?ownership < {max_ownership:.2})\n}}\nORDER BY DESC(?final) ?player\nLIMIT {limit}",
        prefixes = vocab::sparql_prefixes(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_parses_case_insensitively() {
        assert_eq!("mid".parse::<Position>().unwrap(), Position::Mid);
        assert_eq!("GK".parse::<Position>().unwrap(), Position::Gkp);
        assert!("striker".parse::<Position>().is_err());
    }

    #[test]
    fn team_code_is_validated() {
        assert!(by_team("ARS", 10).is_ok());
        assert!(by_team("ars", 10).is_err());
        assert!(by_team("ARS\" } DROP", 10).is_err());
    }

    #[test]
    fn limits_and_ownership_are_bounded() {
        assert!(top_by_score(0).is_err());
        assert!(differentials(150.0, 5).is_err());
        assert!(differentials(f64::NAN, 5).is_err());
        let text = differentials(10.0, 5).unwrap();
        assert!(text.contains("?ownership < 10.00"));
        assert!(text.ends_with("LIMIT 5"));
    }
}
