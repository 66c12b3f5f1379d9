//! Typed graph patterns: triple patterns plus filter expressions.
//!
//! Rules and constraints are data, not query strings. A [`GraphPattern`] is a
//! conjunction of [`TriplePattern`]s joined on shared variables, followed by
//! [`Filter`]s evaluated per solution with three-valued logic (an unbound or
//! undefined operand makes a filter *undefined*, which drops the row). A filter
//! that compares incompatible literal kinds is a data-shape mismatch and fails
//! the whole evaluation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::error::PatternError;

use super::index::TripleSource;
use super::{Iri, Literal, Term};

/// Variable bindings for one solution.
pub type Bindings = BTreeMap<String, Term>;

/// A term in a triple pattern: a variable or a constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm {
    Var(String),
    Iri(Iri),
    Literal(Literal),
}

impl PatternTerm {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    fn resolve(&self, bindings: &Bindings) -> Option<Term> {
        match self {
            Self::Var(name) => bindings.get(name).cloned(),
            Self::Iri(iri) => Some(Term::Iri(iri.clone())),
            Self::Literal(lit) => Some(Term::Literal(lit.clone())),
        }
    }
}

impl From<Iri> for PatternTerm {
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

impl From<Literal> for PatternTerm {
    fn from(lit: Literal) -> Self {
        Self::Literal(lit)
    }
}

/// A triple pattern `(subject predicate object)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl TriplePattern {
    pub fn new(
        subject: impl Into<PatternTerm>,
        predicate: impl Into<PatternTerm>,
        object: impl Into<PatternTerm>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Extend `bindings` with every way this pattern matches the source.
    fn extend(
        &self,
        source: &dyn TripleSource,
        bindings: &Bindings,
        out: &mut Vec<Bindings>,
    ) -> Result<(), PatternError> {
        let subject = match position_iri(&self.subject, bindings)? {
            Position::Bound(iri) => Some(iri),
            Position::Free => None,
            Position::Unmatchable => return Ok(()),
        };
        let predicate = match position_iri(&self.predicate, bindings)? {
            Position::Bound(iri) => Some(iri),
            Position::Free => None,
            Position::Unmatchable => return Ok(()),
        };
        let object = self.object.resolve(bindings);

        for triple in source.matching(subject.as_ref(), predicate.as_ref(), object.as_ref()) {
            let mut next = bindings.clone();
            if bind(&mut next, &self.subject, Term::Iri(triple.subject.clone()))
                && bind(&mut next, &self.predicate, Term::Iri(triple.predicate.clone()))
                && bind(&mut next, &self.object, triple.object.clone())
            {
                out.push(next);
            }
        }
        Ok(())
    }
}

enum Position {
    Bound(Iri),
    Free,
    /// A variable already bound to a literal: nothing can match.
    Unmatchable,
}

fn position_iri(term: &PatternTerm, bindings: &Bindings) -> Result<Position, PatternError> {
    match term {
        PatternTerm::Iri(iri) => Ok(Position::Bound(iri.clone())),
        PatternTerm::Literal(lit) => Err(PatternError::NotAnIri {
            term: lit.to_string(),
        }),
        PatternTerm::Var(name) => Ok(match bindings.get(name) {
            Some(Term::Iri(iri)) => Position::Bound(iri.clone()),
            Some(Term::Literal(_)) => Position::Unmatchable,
            None => Position::Free,
        }),
    }
}

fn bind(bindings: &mut Bindings, term: &PatternTerm, value: Term) -> bool {
    match term {
        PatternTerm::Var(name) => match bindings.get(name) {
            Some(existing) => *existing == value,
            None => {
                bindings.insert(name.clone(), value);
                true
            }
        },
        _ => true,
    }
}

/// A value expression inside a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(String),
    Const(Literal),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub fn num(value: f64) -> Self {
        Self::Const(Literal::Decimal(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Const(Literal::String(value.into()))
    }

    pub fn div(left: Expr, right: Expr) -> Self {
        Self::Div(Box::new(left), Box::new(right))
    }

    /// Evaluate to a term. `Ok(None)` means undefined (unbound variable,
    /// division by zero).
    fn eval(&self, bindings: &Bindings) -> Result<Option<Term>, PatternError> {
        match self {
            Self::Var(name) => Ok(bindings.get(name).cloned()),
            Self::Const(lit) => Ok(Some(Term::Literal(lit.clone()))),
            Self::Div(left, right) => {
                let (Some(l), Some(r)) = (left.eval(bindings)?, right.eval(bindings)?) else {
                    return Ok(None);
                };
                let (Some(a), Some(b)) = (numeric(&l), numeric(&r)) else {
                    return Err(mismatch("divide", &l, &r));
                };
                if b == 0.0 {
                    return Ok(None);
                }
                Ok(Some(Term::Literal(Literal::Decimal(a / b))))
            }
        }
    }
}

fn numeric(term: &Term) -> Option<f64> {
    term.as_literal().and_then(Literal::as_f64)
}

fn mismatch(operation: &str, left: &Term, right: &Term) -> PatternError {
    PatternError::TypeMismatch {
        operation: operation.to_string(),
        left: left.to_string(),
        right: right.to_string(),
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// A boolean filter over one solution.
#[derive(Debug, Clone)]
pub enum Filter {
    Compare {
        left: Expr,
        op: CompareOp,
        right: Expr,
    },
    /// The expression is a string literal matching the regex.
    Matches { expr: Expr, regex: Regex },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// The sub-patterns have at least one solution extending this one.
    Exists(Vec<TriplePattern>),
    NotExists(Vec<TriplePattern>),
}

impl Filter {
    pub fn compare(left: Expr, op: CompareOp, right: Expr) -> Self {
        Self::Compare { left, op, right }
    }

    /// `?var >= value`.
    pub fn ge(var: &str, value: f64) -> Self {
        Self::compare(Expr::var(var), CompareOp::Ge, Expr::num(value))
    }

    /// `?var < value`.
    pub fn lt(var: &str, value: f64) -> Self {
        Self::compare(Expr::var(var), CompareOp::Lt, Expr::num(value))
    }

    /// `?var > value`.
    pub fn gt(var: &str, value: f64) -> Self {
        Self::compare(Expr::var(var), CompareOp::Gt, Expr::num(value))
    }

    /// `?var = "value"`.
    pub fn eq_text(var: &str, value: &str) -> Self {
        Self::compare(Expr::var(var), CompareOp::Eq, Expr::text(value))
    }

    /// `?var != "value"`.
    pub fn ne_text(var: &str, value: &str) -> Self {
        Self::compare(Expr::var(var), CompareOp::Ne, Expr::text(value))
    }

    pub fn matches(var: &str, regex: Regex) -> Self {
        Self::Matches {
            expr: Expr::var(var),
            regex,
        }
    }

    pub fn negate(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Evaluate against one solution with three-valued logic: `Ok(None)` is
    /// *undefined*. Comparing incompatible literal kinds is an error.
    pub fn eval(
        &self,
        source: &dyn TripleSource,
        bindings: &Bindings,
    ) -> Result<Option<bool>, PatternError> {
        match self {
            Self::Compare { left, op, right } => {
                let (Some(l), Some(r)) = (left.eval(bindings)?, right.eval(bindings)?) else {
                    return Ok(None);
                };
                compare(&l, *op, &r)
            }
            Self::Matches { expr, regex } => {
                let Some(value) = expr.eval(bindings)? else {
                    return Ok(None);
                };
                match value.as_literal().and_then(Literal::as_str) {
                    Some(text) => Ok(Some(regex.is_match(text))),
                    None => Err(PatternError::TypeMismatch {
                        operation: "match".into(),
                        left: value.to_string(),
                        right: format!("/{}/", regex.as_str()),
                    }),
                }
            }
            Self::And(filters) => {
                let mut result = Some(true);
                for f in filters {
                    match f.eval(source, bindings)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }
            Self::Or(filters) => {
                let mut result = Some(false);
                for f in filters {
                    match f.eval(source, bindings)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(result)
            }
            Self::Not(inner) => Ok(inner.eval(source, bindings)?.map(|b| !b)),
            Self::Exists(patterns) => {
                Ok(Some(!join(source, patterns, bindings.clone())?.is_empty()))
            }
            Self::NotExists(patterns) => {
                Ok(Some(join(source, patterns, bindings.clone())?.is_empty()))
            }
        }
    }
}

fn compare(left: &Term, op: CompareOp, right: &Term) -> Result<Option<bool>, PatternError> {
    let operation = || format!("compare ({})", op.symbol());
    match (left, right) {
        (Term::Iri(a), Term::Iri(b)) => match op {
            CompareOp::Eq => Ok(Some(a == b)),
            CompareOp::Ne => Ok(Some(a != b)),
            _ => Err(mismatch(&operation(), left, right)),
        },
        (Term::Iri(_), Term::Literal(_)) | (Term::Literal(_), Term::Iri(_)) => match op {
            CompareOp::Eq => Ok(Some(false)),
            CompareOp::Ne => Ok(Some(true)),
            _ => Err(mismatch(&operation(), left, right)),
        },
        (Term::Literal(a), Term::Literal(b)) => {
            let ordering = match (a, b) {
                (Literal::String(x), Literal::String(y)) => Some(x.cmp(y)),
                (Literal::Boolean(x), Literal::Boolean(y)) => Some(x.cmp(y)),
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y),
                    _ => return Err(mismatch(&operation(), left, right)),
                },
            };
            Ok(ordering.map(|o| op.holds(o)))
        }
    }
}

fn join(
    source: &dyn TripleSource,
    patterns: &[TriplePattern],
    seed: Bindings,
) -> Result<Vec<Bindings>, PatternError> {
    let mut solutions = vec![seed];
    for pattern in patterns {
        let mut next = Vec::new();
        for bindings in &solutions {
            pattern.extend(source, bindings, &mut next)?;
        }
        if next.is_empty() {
            return Ok(next);
        }
        solutions = next;
    }
    Ok(solutions)
}

/// A basic graph pattern with filters.
#[derive(Debug, Clone, Default)]
pub struct GraphPattern {
    pub patterns: Vec<TriplePattern>,
    pub filters: Vec<Filter>,
}

impl GraphPattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a triple pattern.
    pub fn triple(
        mut self,
        subject: impl Into<PatternTerm>,
        predicate: impl Into<PatternTerm>,
        object: impl Into<PatternTerm>,
    ) -> Self {
        self.patterns
            .push(TriplePattern::new(subject, predicate, object));
        self
    }

    /// Append a filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// All solutions, in the source's iteration order.
    pub fn evaluate(&self, source: &dyn TripleSource) -> Result<Vec<Bindings>, PatternError> {
        let candidates = join(source, &self.patterns, Bindings::new())?;
        let mut solutions = Vec::with_capacity(candidates.len());
        'rows: for bindings in candidates {
            for filter in &self.filters {
                if filter.eval(source, &bindings)? != Some(true) {
                    continue 'rows;
                }
            }
            solutions.push(bindings);
        }
        Ok(solutions)
    }

    /// Distinct values bound to `var` across all solutions, ordered.
    pub fn select(&self, source: &dyn TripleSource, var: &str) -> Result<Vec<Term>, PatternError> {
        let distinct: BTreeSet<Term> = self
            .evaluate(source)?
            .into_iter()
            .filter_map(|mut b| b.remove(var))
            .collect();
        Ok(distinct.into_iter().collect())
    }
}
