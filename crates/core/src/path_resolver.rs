//! Property path resolution.
//!
//! The temporal rewrite works on basic graph patterns only, so every property
//! path has to become plain triple patterns first. Sequence paths expand into
//! a chain of triples joined through fresh variables and inverse IRIs swap
//! subject and object. Paths that cannot be written as a fixed set of triples
//! (alternatives, `*`, `+`, `?`, negated sets) are rejected.
//!
//! The same pass makes the parsed query deterministic. The parser introduces
//! randomly named blank nodes (for `[]` and path steps) and randomly named
//! variables (for aggregates); both are renamed to fresh, numbered variables
//! that do not clash with anything the caller wrote.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::OnceLock;

use regex::Regex;
use spargebra::algebra::{GraphPattern, PropertyPathExpression};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern, Variable};
use spargebra::Query;

use crate::visit::{walk_query, AlgebraVisitor};
use crate::{Result, StarversError};

/// Stem of the variables that replace blank nodes and path steps.
const ANON_STEM: &str = "anon";
/// Stem of the variables that replace parser-generated aggregate names.
const AGGREGATE_STEM: &str = "agg";

/// Rewrites property paths into triple patterns and names anonymous terms.
#[derive(Debug, Default)]
pub struct PathResolver {
    /// Variable names written by the caller; never renamed or reused.
    user_variables: HashSet<String>,
    /// Variable names this resolver introduced.
    minted: HashSet<String>,
    blank_nodes: HashMap<String, Variable>,
    generated: HashMap<String, Variable>,
    counter: usize,
}

impl PathResolver {
    pub fn new(user_variables: HashSet<String>) -> Self {
        Self {
            user_variables,
            ..Self::default()
        }
    }

    /// A resolver that treats every `?name` / `$name` token of `text` as a
    /// caller variable.
    pub fn for_query_text(text: &str) -> Self {
        Self::new(query_variable_names(text))
    }

    /// Resolve every path in `query` in place.
    pub fn resolve(&mut self, query: &mut Query) -> Result<()> {
        walk_query(self, query)
    }

    /// Whether `name` is already used by the caller or by this resolver.
    pub fn is_taken(&self, name: &str) -> bool {
        self.user_variables.contains(name) || self.minted.contains(name)
    }

    /// Mint a variable `{stem}{n}` that is not yet taken.
    pub fn fresh(&mut self, stem: &str) -> Variable {
        loop {
            self.counter += 1;
            let name = format!("{stem}{}", self.counter);
            if !self.is_taken(&name) {
                self.minted.insert(name.clone());
                return Variable::new_unchecked(name);
            }
        }
    }

    fn expand_path(
        &mut self,
        subject: TermPattern,
        path: &PropertyPathExpression,
        object: TermPattern,
        out: &mut Vec<TriplePattern>,
    ) -> Result<()> {
        match path {
            PropertyPathExpression::NamedNode(predicate) => {
                out.push(TriplePattern {
                    subject,
                    predicate: NamedNodePattern::NamedNode(predicate.clone()),
                    object,
                });
                Ok(())
            }
            PropertyPathExpression::Reverse(inner) => match inner.as_ref() {
                PropertyPathExpression::NamedNode(predicate) => {
                    out.push(TriplePattern {
                        subject: object,
                        predicate: NamedNodePattern::NamedNode(predicate.clone()),
                        object: subject,
                    });
                    Ok(())
                }
                other => Err(not_covered(
                    &format!("inverse of {}", path_kind(other)),
                    path,
                )),
            },
            PropertyPathExpression::Sequence(first, second) => {
                let step = TermPattern::Variable(self.fresh(ANON_STEM));
                self.expand_path(subject, first, step.clone(), out)?;
                self.expand_path(step, second, object, out)
            }
            other => Err(not_covered(path_kind(other), other)),
        }
    }
}

impl AlgebraVisitor for PathResolver {
    fn enter_pattern(&mut self, pattern: &mut GraphPattern) -> Result<()> {
        if let GraphPattern::Path {
            subject,
            path,
            object,
        } = pattern
        {
            let mut triples = Vec::new();
            self.expand_path(subject.clone(), path, object.clone(), &mut triples)?;
            *pattern = GraphPattern::Bgp { patterns: triples };
        }
        Ok(())
    }

    fn leave_pattern(&mut self, pattern: &mut GraphPattern) -> Result<()> {
        let merged = match pattern {
            GraphPattern::Join { left, right } => match (left.as_mut(), right.as_mut()) {
                (GraphPattern::Bgp { patterns: l }, GraphPattern::Bgp { patterns: r }) => {
                    let mut all = mem::take(l);
                    all.append(r);
                    Some(all)
                }
                _ => None,
            },
            _ => None,
        };
        if let Some(patterns) = merged {
            *pattern = GraphPattern::Bgp { patterns };
        }
        if let GraphPattern::Bgp { patterns } = pattern {
            *patterns = reorder_triples(mem::take(patterns));
        }
        Ok(())
    }

    fn visit_term(&mut self, term: &mut TermPattern) {
        if let TermPattern::BlankNode(node) = term {
            let id = node.as_str().to_string();
            let variable = match self.blank_nodes.get(&id) {
                Some(v) => v.clone(),
                None => {
                    let v = self.fresh(ANON_STEM);
                    self.blank_nodes.insert(id, v.clone());
                    v
                }
            };
            *term = TermPattern::Variable(variable);
        }
    }

    fn visit_variable(&mut self, variable: &mut Variable) {
        let name = variable.as_str();
        if self.is_taken(name) {
            return;
        }
        // Not written by the caller: the parser invented it.
        let renamed = match self.generated.get(name) {
            Some(v) => v.clone(),
            None => {
                let old = name.to_string();
                let v = self.fresh(AGGREGATE_STEM);
                self.generated.insert(old, v.clone());
                v
            }
        };
        *variable = renamed;
    }
}

/// Every `?name` / `$name` token in a query text.
///
/// Over-approximates (tokens inside IRIs or strings count too), which only
/// makes fresh names skip a few more candidates.
pub fn query_variable_names(text: &str) -> HashSet<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[?$]([\w\x{B7}]+)").expect("variable token pattern"));
    re.captures_iter(text).map(|c| c[1].to_string()).collect()
}

fn path_kind(path: &PropertyPathExpression) -> &'static str {
    match path {
        PropertyPathExpression::NamedNode(_) => "IRI",
        PropertyPathExpression::Reverse(_) => "inverse path",
        PropertyPathExpression::Sequence(..) => "sequence path",
        PropertyPathExpression::Alternative(..) => "alternative path (|)",
        PropertyPathExpression::ZeroOrMore(_) => "zero-or-more path (*)",
        PropertyPathExpression::OneOrMore(_) => "one-or-more path (+)",
        PropertyPathExpression::ZeroOrOne(_) => "zero-or-one path (?)",
        PropertyPathExpression::NegatedPropertySet(_) => "negated property set (!)",
    }
}

fn not_covered(kind: &str, path: &PropertyPathExpression) -> StarversError {
    let hint = match path {
        PropertyPathExpression::Alternative(..) => ", rewrite it as a UNION of triple patterns",
        _ => "",
    };
    StarversError::ExpressionNotCovered(format!(
        "{kind} {path} has not been covered yet{hint}"
    ))
}

// ---------------------------------------------------------------------------
// Triple ordering
// ---------------------------------------------------------------------------

/// Order triple patterns so each one shares as many variables as possible
/// with the ones before it.
///
/// Greedy: repeatedly take the pattern with the fewest still-unbound
/// variables, preferring patterns whose variables are used often in the group
/// and patterns with a literal object. Ties keep the written order.
pub fn reorder_triples(triples: Vec<TriplePattern>) -> Vec<TriplePattern> {
    if triples.len() < 2 {
        return triples;
    }
    let mut counts: HashMap<String, usize> = HashMap::new();
    for triple in &triples {
        for name in triple_variables(triple) {
            *counts.entry(name).or_default() += 1;
        }
    }

    let mut known: HashSet<String> = HashSet::new();
    let mut pending: Vec<(usize, TriplePattern)> = triples.into_iter().enumerate().collect();
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        pending.sort_by_cached_key(|(index, triple)| {
            let vars = triple_variables(triple);
            let unknown = vars.iter().filter(|v| !known.contains(*v)).count();
            let weight: usize = vars.iter().map(|v| counts.get(v).copied().unwrap_or(0)).sum();
            let non_literal_object = !matches!(triple.object, TermPattern::Literal(_));
            (unknown, Reverse(weight), non_literal_object, *index)
        });
        let (_, next) = pending.remove(0);
        known.extend(triple_variables(&next));
        ordered.push(next);
    }
    ordered
}

fn triple_variables(triple: &TriplePattern) -> Vec<String> {
    let mut out = Vec::new();
    collect_term_variables(&triple.subject, &mut out);
    if let NamedNodePattern::Variable(v) = &triple.predicate {
        out.push(v.as_str().to_string());
    }
    collect_term_variables(&triple.object, &mut out);
    out
}

fn collect_term_variables(term: &TermPattern, out: &mut Vec<String>) {
    match term {
        TermPattern::Variable(v) => out.push(v.as_str().to_string()),
        TermPattern::Triple(quoted) => out.extend(triple_variables(quoted)),
        TermPattern::NamedNode(_) | TermPattern::BlankNode(_) | TermPattern::Literal(_) => {}
    }
}
