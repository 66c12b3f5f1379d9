//! Vocabulary constants for the SmartPlay fact graph.
//!
//! - `sp:` (`https://smartplay.dev/ontology#`): classes and properties
//! - data namespace (`https://smartplay.dev/data/`): minted entity IRIs
//! - standard RDF/RDFS/OWL/XSD IRIs used by the schema

use crate::graph::Iri;

/// Ontology namespace.
pub const SP_NS: &str = "https://smartplay.dev/ontology#";

/// Namespace for minted entity IRIs.
pub const DATA_NS: &str = "https://smartplay.dev/data/";

/// Standard namespaces.
pub mod standard {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
    pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    pub const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
    pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
    pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
    pub const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
    pub const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
}

// Core classes.
pub const PLAYER: &str = "Player";
pub const TEAM: &str = "Team";
pub const FIXTURE: &str = "Fixture";
pub const SMARTPLAY_SCORE: &str = "SmartPlayScore";
pub const INJURY_EVENT: &str = "InjuryEvent";

/// Classes every schema (bundled, external or minimal) must declare.
pub const CORE_CLASSES: [&str; 5] = [PLAYER, TEAM, FIXTURE, SMARTPLAY_SCORE, INJURY_EVENT];

// Link properties.
pub const PLAYS_FOR: &str = "playsFor";
pub const HAS_SCORE: &str = "hasScore";
pub const HAS_INJURY: &str = "hasInjury";
pub const HOME_TEAM: &str = "homeTeam";
pub const AWAY_TEAM: &str = "awayTeam";

/// `rdf:type`.
pub fn rdf_type() -> Iri {
    Iri::new_unchecked(standard::RDF_TYPE)
}

/// An IRI in the `sp:` ontology namespace.
pub fn sp(local: &str) -> Iri {
    Iri::new_unchecked(format!("{SP_NS}{local}"))
}

/// An XSD datatype IRI.
pub fn xsd(local: &str) -> Iri {
    Iri::new_unchecked(format!("{}{local}", standard::XSD))
}

/// IRI of a player entity.
pub fn player(id: u32) -> Iri {
    Iri::new_unchecked(format!("{DATA_NS}player_{id}"))
}

/// IRI of a team entity.
pub fn team(id: u32) -> Iri {
    Iri::new_unchecked(format!("{DATA_NS}team_{id}"))
}

/// IRI of a fixture entity.
pub fn fixture(id: u32) -> Iri {
    Iri::new_unchecked(format!("{DATA_NS}fixture_{id}"))
}

/// IRI of a player's (single) SmartPlay score entity.
pub fn score(player_id: u32) -> Iri {
    Iri::new_unchecked(format!("{DATA_NS}score_{player_id}"))
}

/// IRI of an injury event. `seq` is store-wide so events are never overwritten.
pub fn injury(player_id: u32, seq: u64) -> Iri {
    Iri::new_unchecked(format!("{DATA_NS}injury_{player_id}_{seq}"))
}

/// Shorten an IRI to its local identifier: the text after the last `#` or `/`.
pub fn local_name(iri: &str) -> &str {
    iri.rfind(|c| c == '#' || c == '/')
        .map(|idx| &iri[idx + 1..])
        .filter(|name| !name.is_empty())
        .unwrap_or(iri)
}

/// Recover the numeric player id from a player IRI.
pub fn player_id_of(iri: &Iri) -> Option<u32> {
    local_name(iri.as_str())
        .strip_prefix("player_")
        .and_then(|raw| raw.parse().ok())
}

/// `PREFIX` header shared by the SPARQL templates.
pub fn sparql_prefixes() -> String {
    format!(
        "PREFIX sp: <{SP_NS}>\nPREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>\n\
         PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_name_strips_namespace() {
        assert_eq!(local_name("https://smartplay.dev/ontology#Player"), "Player");
        assert_eq!(local_name("https://smartplay.dev/data/player_7"), "player_7");
        assert_eq!(local_name("urn:plain"), "urn:plain");
    }

    #[test]
    fn player_iri_roundtrip() {
        let iri = player(42);
        assert_eq!(player_id_of(&iri), Some(42));
        assert_eq!(player_id_of(&team(42)), None);
    }

    #[test]
    fn injury_iris_are_distinct_per_sequence() {
        assert_ne!(injury(5, 1), injury(5, 2));
    }
}
