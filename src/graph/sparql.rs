//! SPARQL execution over an oxigraph mirror of the fact graph.
//!
//! Caller-supplied query text is evaluated by oxigraph against a snapshot of the
//! [`TripleStore`]. The snapshot holds two in-memory stores (base only, and
//! base ∪ inferred) and remembers the store generation it was built from, so a
//! stale snapshot is detected and rebuilt instead of being patched.

use std::collections::BTreeMap;

use oxigraph::model::vocab::xsd;
use oxigraph::model::{GraphName, Literal as OxLiteral, NamedNode, Quad, Term as OxTerm};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::vocab;

use super::index::TripleStore;
use super::{Literal, Term, Triple};

/// A result value: URIs are shortened to their local identifier, literals are
/// converted to their native form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Term> for Value {
    fn from(term: &Term) -> Self {
        match term {
            Term::Iri(iri) => Self::Text(iri.local_name().to_string()),
            Term::Literal(Literal::Boolean(b)) => Self::Boolean(*b),
            Term::Literal(Literal::Integer(i)) => Self::Integer(*i),
            Term::Literal(Literal::Decimal(d)) => Self::Decimal(*d),
            Term::Literal(Literal::String(s)) => Self::Text(s.clone()),
        }
    }
}

/// One result row: variable name → value.
pub type Row = BTreeMap<String, Value>;

/// Convert a fact-graph term into an oxigraph term.
pub(crate) fn to_ox_term(term: &Term) -> OxTerm {
    match term {
        Term::Iri(iri) => NamedNode::new_unchecked(iri.as_str()).into(),
        Term::Literal(lit) => to_ox_literal(lit).into(),
    }
}

fn to_ox_literal(lit: &Literal) -> OxLiteral {
    match lit {
        Literal::String(s) => OxLiteral::new_simple_literal(s.as_str()),
        Literal::Boolean(b) => OxLiteral::from(*b),
        Literal::Integer(i) => OxLiteral::from(*i),
        Literal::Decimal(_) => OxLiteral::new_typed_literal(lit.lexical(), xsd::DECIMAL),
    }
}

/// Convert a fact-graph triple into an oxigraph triple.
pub(crate) fn to_ox_triple(triple: &Triple) -> oxigraph::model::Triple {
    oxigraph::model::Triple::new(
        NamedNode::new_unchecked(triple.subject.as_str()),
        NamedNode::new_unchecked(triple.predicate.as_str()),
        to_ox_term(&triple.object),
    )
}

/// Convert an oxigraph literal back into a typed literal.
pub(crate) fn from_ox_literal(lit: &OxLiteral) -> Literal {
    let lexical = lit.value();
    let datatype = lit.datatype().as_str();
    let Some(local) = datatype.strip_prefix(vocab::standard::XSD) else {
        return Literal::String(lexical.to_string());
    };
    match local {
        "integer" | "int" | "long" | "short" | "byte" | "nonNegativeInteger"
        | "positiveInteger" | "nonPositiveInteger" | "negativeInteger" | "unsignedInt"
        | "unsignedLong" | "unsignedShort" | "unsignedByte" => lexical
            .parse()
            .map(Literal::Integer)
            .unwrap_or_else(|_| Literal::String(lexical.to_string())),
        "decimal" | "double" | "float" => lexical
            .parse()
            .map(Literal::Decimal)
            .unwrap_or_else(|_| Literal::String(lexical.to_string())),
        "boolean" => match lexical {
            "true" | "1" => Literal::Boolean(true),
            "false" | "0" => Literal::Boolean(false),
            other => Literal::String(other.to_string()),
        },
        _ => Literal::String(lexical.to_string()),
    }
}

fn to_value(term: &OxTerm) -> Value {
    match term {
        OxTerm::NamedNode(node) => Value::Text(vocab::local_name(node.as_str()).to_string()),
        OxTerm::BlankNode(node) => Value::Text(node.as_str().to_string()),
        OxTerm::Literal(lit) => Value::from(&Term::Literal(from_ox_literal(lit))),
        #[allow(unreachable_patterns)]
        other => Value::Text(other.to_string()),
    }
}

/// Point-in-time oxigraph mirror of a [`TripleStore`].
pub struct SparqlSnapshot {
    generation: u64,
    base: Store,
    union: Store,
}

impl SparqlSnapshot {
    /// Mirror the store's current contents.
    pub fn build(store: &TripleStore) -> Result<Self, GraphError> {
        let base = new_store()?;
        let union = new_store()?;
        for triple in store.base().iter() {
            let quad = to_quad(triple);
            insert(&base, &quad)?;
            insert(&union, &quad)?;
        }
        for triple in store.inferred().iter() {
            insert(&union, &to_quad(triple))?;
        }
        Ok(Self {
            generation: store.generation(),
            base,
            union,
        })
    }

    /// Store generation this snapshot mirrors.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Execute a SPARQL SELECT (or ASK) query and return rows of named values.
    pub fn select(&self, sparql: &str, include_inferred: bool) -> Result<Vec<Row>, GraphError> {
        let store = if include_inferred { &self.union } else { &self.base };
        #[allow(deprecated)]
        let results = store.query(sparql).map_err(|e| GraphError::Sparql {
            message: format!("SPARQL query failed: {e}"),
        })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| GraphError::Sparql {
                        message: format!("solution error: {e}"),
                    })?;
                    let row: Row = solution
                        .iter()
                        .map(|(var, term)| (var.as_str().to_string(), to_value(term)))
                        .collect();
                    rows.push(row);
                }
                Ok(rows)
            }
            QueryResults::Boolean(b) => {
                Ok(vec![Row::from([("result".to_string(), Value::Boolean(b))])])
            }
            _ => Err(GraphError::Sparql {
                message: "CONSTRUCT/DESCRIBE queries are not supported; use SELECT or ASK".into(),
            }),
        }
    }
}

fn new_store() -> Result<Store, GraphError> {
    Store::new().map_err(|e| GraphError::Sparql {
        message: format!("failed to create oxigraph store: {e}"),
    })
}

fn to_quad(triple: &Triple) -> Quad {
    Quad::new(
        NamedNode::new_unchecked(triple.subject.as_str()),
        NamedNode::new_unchecked(triple.predicate.as_str()),
        to_ox_term(&triple.object),
        GraphName::DefaultGraph,
    )
}

fn insert(store: &Store, quad: &Quad) -> Result<(), GraphError> {
    store.insert(quad).map_err(|e| GraphError::Sparql {
        message: format!("insert failed: {e}"),
    })?;
    Ok(())
}

impl std::fmt::Debug for SparqlSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparqlSnapshot")
            .field("generation", &self.generation)
            .finish()
    }
}
