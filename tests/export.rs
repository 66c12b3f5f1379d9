//! N-Triples export round-trip through a fresh store.

use smartplay_reasoner::config::EngineConfig;
use smartplay_reasoner::engine::Engine;
use smartplay_reasoner::export::{export_ntriples, parse_ntriples};
use smartplay_reasoner::graph::GraphKind;
use smartplay_reasoner::graph::index::TripleStore;
use smartplay_reasoner::ingest::Snapshot;

const BUNDLE: &str = r#"{
  "teams": [ { "id": 1, "name": "Brighton & Hove \"Albion\"", "short_name": "BHA", "strength": 3 } ],
  "players": [
    { "id": 7, "web_name": "Mitoma", "team": 1, "position": "MID", "price": 6.5, "status": "a",
      "news": "Back in training\nfit", "expected_goals": 3.25, "total_points": 88, "minutes": 1800 },
    { "id": 8, "web_name": "Verbruggen", "team": 1, "position": "GKP", "price": 4.5, "status": "d",
      "chance_of_playing_next_round": 50 }
  ],
  "scores": [
    { "player_id": 7, "final_score": 7.25, "nailedness": 8.5, "form_xg": 7.0, "form_pts": 6.0,
      "fixture": 5.5, "calculated_at": "2024-10-05T12:00:00Z" }
  ]
}"#;

#[test]
fn export_reparses_to_the_same_triple_set() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    engine.rebuild(&Snapshot::from_json_str(BUNDLE).unwrap()).unwrap();
    let exported = engine.export_ntriples().unwrap();

    let graph = parse_ntriples(&exported).unwrap();
    let mut fresh = TripleStore::new();
    fresh.extend(GraphKind::Base, graph.iter().cloned());

    assert_eq!(fresh.len(), exported.lines().count());
    assert_eq!(export_ntriples(&fresh), exported);
}

#[test]
fn export_contains_inferred_tags() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    engine.rebuild(&Snapshot::from_json_str(BUNDLE).unwrap()).unwrap();
    let exported = engine.export_ntriples().unwrap();
    let tagged = |player: u32, class: &str| {
        format!(
            "<https://smartplay.dev/data/player_{player}> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <https://smartplay.dev/ontology#{class}> ."
        )
    };
    assert!(exported.lines().any(|l| l == tagged(7, "TopPlayer")));
    // Player 8 is doubtful but unscored, so no score rule fires for them.
    assert!(!exported.lines().any(|l| l == tagged(8, "InjuryConcern")));

    let rows = engine.export_triples().unwrap();
    assert!(rows.iter().any(|r| r.graph == "inferred" && r.subject == "player_7"));
}
