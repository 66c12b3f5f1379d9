//! Serialization of the fact graph.
//!
//! N-Triples is the interchange form: [`export_ntriples`] writes base ∪
//! inferred, one triple per line in sorted order, and [`parse_ntriples`]
//! reads such a dump back into a [`Graph`]. [`TripleExport`] is the
//! label-resolved JSON form used by the CLI.

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Term as OxTerm;
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::graph::index::{Graph, TripleSource, TripleStore};
use crate::graph::sparql::{Value, from_ox_literal, to_ox_triple};
use crate::graph::{GraphKind, Iri, Term, Triple};

/// A triple with local names in place of full IRIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleExport {
    pub subject: String,
    pub predicate: String,
    /// Local name for IRI objects, native value for literals.
    pub object: Value,
    /// Which layer holds the triple.
    pub graph: String,
}

impl TripleExport {
    fn new(triple: &Triple, kind: GraphKind) -> Self {
        Self {
            subject: triple.subject.local_name().to_string(),
            predicate: triple.predicate.local_name().to_string(),
            object: Value::from(&triple.object),
            graph: match kind {
                GraphKind::Base => "base".into(),
                GraphKind::Inferred => "inferred".into(),
            },
        }
    }
}

/// Every triple of both layers as a sorted N-Triples document.
pub fn export_ntriples(store: &TripleStore) -> String {
    let mut lines: Vec<String> = store
        .union()
        .matching(None, None, None)
        .map(|t| format!("{} .", to_ox_triple(t)))
        .collect();
    lines.sort_unstable();
    lines.dedup();
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Label-resolved rows for both layers, base first.
pub fn export_triples(store: &TripleStore) -> Vec<TripleExport> {
    store
        .base()
        .iter()
        .map(|t| TripleExport::new(t, GraphKind::Base))
        .chain(
            store
                .inferred()
                .iter()
                .filter(|t| !store.base().contains(t))
                .map(|t| TripleExport::new(t, GraphKind::Inferred)),
        )
        .collect()
}

fn named(term: OxTerm) -> Result<Iri, ExportError> {
    match term {
        OxTerm::NamedNode(node) => Iri::new(node.into_string()).map_err(|e| ExportError::Parse {
            message: e.to_string(),
        }),
        other => Err(ExportError::UnsupportedTerm {
            term: other.to_string(),
        }),
    }
}

/// Parse an N-Triples document into a fresh graph.
///
/// Blank nodes and triple terms have no counterpart in the fact graph and
/// are rejected.
pub fn parse_ntriples(input: &str) -> Result<Graph, ExportError> {
    let mut graph = Graph::new();
    for quad in RdfParser::from_format(RdfFormat::NTriples).for_reader(input.as_bytes()) {
        let quad = quad.map_err(|e| ExportError::Parse {
            message: e.to_string(),
        })?;
        let subject = named(OxTerm::from(quad.subject))?;
        let predicate = Iri::new(quad.predicate.into_string()).map_err(|e| ExportError::Parse {
            message: e.to_string(),
        })?;
        let object = match quad.object {
            OxTerm::Literal(lit) => Term::Literal(from_ox_literal(&lit)),
            other => Term::Iri(named(other)?),
        };
        graph.insert(Triple::new(subject, predicate, object));
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Literal;
    use crate::vocab;

    fn store() -> TripleStore {
        let mut store = TripleStore::new();
        let p = vocab::player(7);
        let fact = |predicate: &str, value: Literal| {
            Triple::new(p.clone(), vocab::sp(predicate), value)
        };
        store.add(GraphKind::Base, Triple::type_assertion(p.clone(), vocab::sp(vocab::PLAYER)));
        store.add(GraphKind::Base, fact("webName", Literal::from("Saka \"B\"")));
        store.add(GraphKind::Base, fact("price", Literal::Decimal(10.5)));
        store.add(GraphKind::Base, fact("minutes", Literal::Integer(900)));
        store.add(GraphKind::Inferred, Triple::type_assertion(p, vocab::sp("TopPlayer")));
        store
    }

    #[test]
    fn export_is_sorted_and_complete() {
        let text = export_ntriples(&store());
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        let mut sorted = lines.clone();
        sorted.sort_unstable();
        assert_eq!(lines, sorted);
        assert!(lines.iter().all(|l| l.ends_with(" .")));
    }

    #[test]
    fn reparse_restores_the_union() {
        let store = store();
        let graph = parse_ntriples(&export_ntriples(&store)).unwrap();
        let expected: Vec<_> = store.union().matching(None, None, None).cloned().collect();
        assert_eq!(graph.len(), expected.len());
        assert!(expected.iter().all(|t| graph.contains(t)));
    }

    #[test]
    fn blank_nodes_are_rejected() {
        let input = "_:b0 <https://smartplay.dev/ontology#price> \"5\" .\n";
        assert!(matches!(
            parse_ntriples(input),
            Err(ExportError::UnsupportedTerm { .. })
        ));
        assert!(matches!(
            parse_ntriples("not n-triples"),
            Err(ExportError::Parse { .. })
        ));
    }

    #[test]
    fn json_rows_use_local_names() {
        let rows = export_triples(&store());
        assert_eq!(rows.len(), 5);
        let tagged = rows.iter().find(|r| r.graph == "inferred").unwrap();
        assert_eq!(tagged.subject, "player_7");
        assert_eq!(tagged.object, Value::Text("TopPlayer".into()));
    }
}
