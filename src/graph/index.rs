//! In-memory triple store with subject and predicate indexes.
//!
//! A [`Graph`] is an ordered set of triples plus two secondary indexes. The
//! [`TripleStore`] owns two of them: the base graph (schema + ingested facts)
//! and the inferred graph (rule output). The store itself does no locking; the
//! engine wraps it in a single-writer/multi-reader lock.

use std::collections::{BTreeSet, HashMap};

use super::{GraphKind, Iri, Term, Triple};

/// Anything pattern evaluation can scan for matching triples.
pub trait TripleSource {
    /// All triples matching the given (optionally bound) positions.
    fn matching<'a>(
        &'a self,
        subject: Option<&'a Iri>,
        predicate: Option<&'a Iri>,
        object: Option<&'a Term>,
    ) -> Box<dyn Iterator<Item = &'a Triple> + 'a>;

    /// Whether at least one triple matches.
    fn contains_match(
        &self,
        subject: Option<&Iri>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> bool {
        self.matching(subject, predicate, object).next().is_some()
    }
}

/// An indexed set of triples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    triples: BTreeSet<Triple>,
    by_subject: HashMap<Iri, BTreeSet<Triple>>,
    by_predicate: HashMap<Iri, BTreeSet<Triple>>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple. Returns `false` if it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if self.triples.contains(&triple) {
            return false;
        }
        self.by_subject
            .entry(triple.subject.clone())
            .or_default()
            .insert(triple.clone());
        self.by_predicate
            .entry(triple.predicate.clone())
            .or_default()
            .insert(triple.clone());
        self.triples.insert(triple)
    }

    /// Remove one triple. Returns `false` if it was absent.
    pub fn remove(&mut self, triple: &Triple) -> bool {
        if !self.triples.remove(triple) {
            return false;
        }
        if let Some(set) = self.by_subject.get_mut(&triple.subject) {
            set.remove(triple);
            if set.is_empty() {
                self.by_subject.remove(&triple.subject);
            }
        }
        if let Some(set) = self.by_predicate.get_mut(&triple.predicate) {
            set.remove(triple);
            if set.is_empty() {
                self.by_predicate.remove(&triple.predicate);
            }
        }
        true
    }

    /// Remove every triple matching the pattern. Returns how many were removed.
    pub fn remove_matching(
        &mut self,
        subject: Option<&Iri>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> usize {
        let doomed: Vec<Triple> = self.matching(subject, predicate, object).cloned().collect();
        doomed.iter().filter(|t| self.remove(t)).count()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn clear(&mut self) {
        self.triples.clear();
        self.by_subject.clear();
        self.by_predicate.clear();
    }

    /// All triples in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Objects of `(subject, predicate, ?)`.
    pub fn objects<'a>(
        &'a self,
        subject: &Iri,
        predicate: &Iri,
    ) -> impl Iterator<Item = &'a Term> + use<'a> {
        let predicate = predicate.clone();
        self.by_subject
            .get(subject)
            .into_iter()
            .flatten()
            .filter(move |t| t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// First object of `(subject, predicate, ?)`, if any.
    pub fn object(&self, subject: &Iri, predicate: &Iri) -> Option<&Term> {
        self.objects(subject, predicate).next()
    }

    /// Subjects of `(?, predicate, object)`.
    pub fn subjects<'a>(
        &'a self,
        predicate: &Iri,
        object: &Term,
    ) -> impl Iterator<Item = &'a Iri> + use<'a> {
        let object = object.clone();
        self.by_predicate
            .get(predicate)
            .into_iter()
            .flatten()
            .filter(move |t| t.object == object)
            .map(|t| &t.subject)
    }

    /// Distinct subjects in the graph.
    pub fn subject_count(&self) -> usize {
        self.by_subject.len()
    }
}

impl TripleSource for Graph {
    fn matching<'a>(
        &'a self,
        subject: Option<&'a Iri>,
        predicate: Option<&'a Iri>,
        object: Option<&'a Term>,
    ) -> Box<dyn Iterator<Item = &'a Triple> + 'a> {
        let candidates: Box<dyn Iterator<Item = &'a Triple> + 'a> = match (subject, predicate) {
            (Some(s), _) => match self.by_subject.get(s) {
                Some(set) => Box::new(set.iter()),
                None => return Box::new(std::iter::empty()),
            },
            (None, Some(p)) => match self.by_predicate.get(p) {
                Some(set) => Box::new(set.iter()),
                None => return Box::new(std::iter::empty()),
            },
            (None, None) => Box::new(self.triples.iter()),
        };
        Box::new(candidates.filter(move |t| {
            subject.is_none_or(|s| &t.subject == s)
                && predicate.is_none_or(|p| &t.predicate == p)
                && object.is_none_or(|o| &t.object == o)
        }))
    }
}

/// Read-only view over base ∪ inferred.
#[derive(Debug, Clone, Copy)]
pub struct Union<'g> {
    pub base: &'g Graph,
    pub inferred: &'g Graph,
}

impl TripleSource for Union<'_> {
    fn matching<'a>(
        &'a self,
        subject: Option<&'a Iri>,
        predicate: Option<&'a Iri>,
        object: Option<&'a Term>,
    ) -> Box<dyn Iterator<Item = &'a Triple> + 'a> {
        let inferred = self.inferred;
        Box::new(
            self.base
                .matching(subject, predicate, object)
                .chain(
                    inferred
                        .matching(subject, predicate, object)
                        .filter(move |t| !self.base.contains(t)),
                ),
        )
    }
}

/// The fact graph: a base layer and an inferred layer.
///
/// Every effective mutation bumps [`TripleStore::generation`], which derived
/// views (the SPARQL snapshot) use to detect staleness.
#[derive(Debug, Default)]
pub struct TripleStore {
    base: Graph,
    inferred: Graph,
    generation: u64,
    injury_seq: u64,
}

impl TripleStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(&self) -> &Graph {
        &self.base
    }

    pub fn inferred(&self) -> &Graph {
        &self.inferred
    }

    /// Base ∪ inferred.
    pub fn union(&self) -> Union<'_> {
        Union {
            base: &self.base,
            inferred: &self.inferred,
        }
    }

    fn graph_mut(&mut self, kind: GraphKind) -> &mut Graph {
        match kind {
            GraphKind::Base => &mut self.base,
            GraphKind::Inferred => &mut self.inferred,
        }
    }

    /// Add a triple to one layer.
    pub fn add(&mut self, kind: GraphKind, triple: Triple) -> bool {
        let added = self.graph_mut(kind).insert(triple);
        if added {
            self.generation += 1;
        }
        added
    }

    /// Add several triples to one layer. Returns how many were new.
    pub fn extend(&mut self, kind: GraphKind, triples: impl IntoIterator<Item = Triple>) -> usize {
        triples
            .into_iter()
            .filter(|t| self.add(kind, t.clone()))
            .count()
    }

    /// Remove one triple from one layer.
    pub fn remove(&mut self, kind: GraphKind, triple: &Triple) -> bool {
        let removed = self.graph_mut(kind).remove(triple);
        if removed {
            self.generation += 1;
        }
        removed
    }

    /// Remove every triple in one layer matching the pattern.
    pub fn remove_matching(
        &mut self,
        kind: GraphKind,
        subject: Option<&Iri>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> usize {
        let removed = self.graph_mut(kind).remove_matching(subject, predicate, object);
        if removed > 0 {
            self.generation += 1;
        }
        removed
    }

    /// Discard the whole inferred layer.
    pub fn clear_inferred(&mut self) -> usize {
        let removed = self.inferred.len();
        self.inferred.clear();
        if removed > 0 {
            self.generation += 1;
        }
        removed
    }

    /// Monotonic mutation counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Next injury-event sequence number (never reused within a store).
    pub fn next_injury_seq(&mut self) -> u64 {
        self.injury_seq += 1;
        self.injury_seq
    }

    pub fn len(&self) -> usize {
        self.base.len() + self.inferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.inferred.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Literal;
    use crate::vocab;

    fn price(id: u32, value: f64) -> Triple {
        Triple::new(vocab::player(id), vocab::sp("price"), Literal::Decimal(value))
    }

    #[test]
    fn insert_and_match() {
        let mut g = Graph::new();
        assert!(g.insert(price(1, 5.5)));
        assert!(!g.insert(price(1, 5.5)));
        g.insert(price(2, 10.0));

        assert_eq!(g.len(), 2);
        let p = vocab::sp("price");
        assert_eq!(g.matching(None, Some(&p), None).count(), 2);
        let one = vocab::player(1);
        assert_eq!(g.matching(Some(&one), None, None).count(), 1);
        let ten = Term::Literal(Literal::Decimal(10.0));
        assert_eq!(g.subjects(&p, &ten).collect::<Vec<_>>(), vec![&vocab::player(2)]);
    }

    #[test]
    fn signed_zero_is_one_fact() {
        let form = |value: f64| {
            Triple::new(vocab::player(1), vocab::sp("form"), Literal::Decimal(value))
        };
        let mut g = Graph::new();
        assert!(g.insert(form(0.0)));
        assert!(g.contains(&form(-0.0)));
        assert!(!g.insert(form(-0.0)));
        assert_eq!(g.len(), 1);
        assert_eq!(
            Literal::Decimal(-0.0).cmp(&Literal::Decimal(0.0)),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn remove_keeps_indexes_consistent() {
        let mut g = Graph::new();
        g.insert(price(1, 5.5));
        g.insert(Triple::type_assertion(vocab::player(1), vocab::sp("Player")));

        let one = vocab::player(1);
        assert_eq!(g.remove_matching(Some(&one), Some(&vocab::sp("price")), None), 1);
        assert_eq!(g.len(), 1);
        assert_eq!(g.matching(None, Some(&vocab::sp("price")), None).count(), 0);
        assert_eq!(g.subject_count(), 1);
        assert_eq!(g.remove_matching(Some(&one), None, None), 1);
        assert!(g.is_empty());
        assert_eq!(g.subject_count(), 0);
    }

    #[test]
    fn union_deduplicates_shared_triples() {
        let mut store = TripleStore::new();
        let t = Triple::type_assertion(vocab::player(1), vocab::sp("TopPlayer"));
        store.add(GraphKind::Base, t.clone());
        store.add(GraphKind::Inferred, t);
        store.add(
            GraphKind::Inferred,
            Triple::type_assertion(vocab::player(1), vocab::sp("NailedOn")),
        );
        let one = vocab::player(1);
        assert_eq!(store.union().matching(Some(&one), None, None).count(), 2);
    }

    #[test]
    fn generation_tracks_effective_mutations() {
        let mut store = TripleStore::new();
        let g0 = store.generation();
        store.add(GraphKind::Base, price(1, 5.5));
        let g1 = store.generation();
        assert!(g1 > g0);
        store.add(GraphKind::Base, price(1, 5.5));
        assert_eq!(store.generation(), g1);
        assert_eq!(store.clear_inferred(), 0);
        assert_eq!(store.generation(), g1);
    }
}
