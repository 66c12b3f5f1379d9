//! Fact graph: typed triples split into a base and an inferred layer.
//!
//! - **Store** ([`index::TripleStore`]): indexed in-memory sets for the base graph
//!   (ingested facts + schema) and the inferred graph (rule output)
//! - **Patterns** ([`pattern`]): typed triple patterns and filters used by rules
//!   and constraints
//! - **SPARQL** ([`sparql::SparqlSnapshot`]): oxigraph mirror for caller-supplied
//!   query text
//!
//! All layers share the [`Triple`] data model.

pub mod index;
pub mod pattern;
pub mod sparql;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::vocab;

/// An absolute IRI naming an entity, class or property.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Iri(String);

impl Iri {
    /// Validate and wrap an IRI.
    pub fn new(iri: impl Into<String>) -> Result<Self, GraphError> {
        let iri = iri.into();
        let has_scheme = iri.split_once(':').is_some_and(|(scheme, _)| {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
        });
        let forbidden = iri
            .chars()
            .any(|c| c.is_whitespace() || "<>\"{}|^`\\".contains(c));
        if !has_scheme || forbidden {
            return Err(GraphError::InvalidIri { iri });
        }
        Ok(Self(iri))
    }

    /// Wrap an IRI minted by this crate without validation.
    pub(crate) fn new_unchecked(iri: impl Into<String>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The local identifier (text after the last `#` or `/`).
    pub fn local_name(&self) -> &str {
        vocab::local_name(&self.0)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// A typed literal value.
///
/// Decimals compare and hash by bit pattern (with `-0.0` folded into `0.0`) so
/// literals can live in ordered sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
}

impl Literal {
    /// Numeric view of integer and decimal literals.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// XSD datatype local name for this literal.
    pub fn datatype(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Decimal(_) => "decimal",
            Self::String(_) => "string",
        }
    }

    /// Lexical form as written in RDF serializations.
    pub fn lexical(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Decimal(d) => {
                let text = d.to_string();
                if text.contains('.') {
                    text
                } else {
                    format!("{text}.0")
                }
            }
            Self::String(s) => s.clone(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Boolean(_) => 0,
            Self::Integer(_) => 1,
            Self::Decimal(_) => 2,
            Self::String(_) => 3,
        }
    }

    /// Fold `-0.0` into `0.0` so equality, hashing and ordering agree.
    fn fold(d: f64) -> f64 {
        if d == 0.0 { 0.0 } else { d }
    }

    fn decimal_bits(d: f64) -> u64 {
        Self::fold(d).to_bits()
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => {
                Self::decimal_bits(*a) == Self::decimal_bits(*b)
            }
            (Self::String(a), Self::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Boolean(b) => b.hash(state),
            Self::Integer(i) => i.hash(state),
            Self::Decimal(d) => Self::decimal_bits(*d).hash(state),
            Self::String(s) => s.hash(state),
        }
    }
}

impl PartialOrd for Literal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Literal {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Decimal(a), Self::Decimal(b)) => Self::fold(*a).total_cmp(&Self::fold(*b)),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            other => write!(f, "{}", other.lexical()),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Literal {
    fn from(d: f64) -> Self {
        Self::Decimal(d)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Object position of a triple: an IRI or a typed literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Iri(Iri),
    Literal(Literal),
}

impl Term {
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Self::Iri(iri) => Some(iri),
            Self::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(lit) => Some(lit),
            Self::Iri(_) => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => iri.fmt(f),
            Self::Literal(lit) => lit.fmt(f),
        }
    }
}

impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

impl From<Literal> for Term {
    fn from(lit: Literal) -> Self {
        Self::Literal(lit)
    }
}

/// A fact (subject, predicate, object).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Iri,
    pub predicate: Iri,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Iri, predicate: Iri, object: impl Into<Term>) -> Self {
        Self {
            subject,
            predicate,
            object: object.into(),
        }
    }

    /// `(subject, rdf:type, class)`.
    pub fn type_assertion(subject: Iri, class: Iri) -> Self {
        Self::new(subject, vocab::rdf_type(), class)
    }
}

/// Which layer of the store a triple lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphKind {
    /// Ingested facts and schema declarations.
    Base,
    /// Class memberships derived by rules.
    Inferred,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn iri_validation() {
        assert!(Iri::new("https://smartplay.dev/data/player_1").is_ok());
        assert!(Iri::new("urn:x").is_ok());
        assert!(Iri::new("no scheme").is_err());
        assert!(Iri::new("http://bad iri").is_err());
        assert!(Iri::new(":missing").is_err());
    }

    #[test]
    fn decimal_literals_are_set_members() {
        let mut set = BTreeSet::new();
        set.insert(Literal::Decimal(7.5));
        set.insert(Literal::Decimal(7.5));
        set.insert(Literal::Decimal(-0.0));
        set.insert(Literal::Decimal(0.0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn literal_kinds_do_not_compare_equal() {
        assert_ne!(Literal::Integer(1), Literal::Decimal(1.0));
        assert_ne!(Literal::from("1"), Literal::Integer(1));
    }

    #[test]
    fn decimal_lexical_form_always_has_point() {
        assert_eq!(Literal::Decimal(10.0).lexical(), "10.0");
        assert_eq!(Literal::Decimal(7.25).lexical(), "7.25");
    }
}
