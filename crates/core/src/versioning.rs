//! Versioning injection.
//!
//! Every non-empty basic graph pattern of a resolved query is swapped for a
//! single placeholder triple whose three components carry the pattern's
//! identifier (`BGP_0`, `BGP_1`, … in traversal order). The original triples
//! are kept in an ordered side table so the expander can splice a temporal
//! block in place of each placeholder once the query is serialized again.

use spargebra::algebra::GraphPattern;
use spargebra::term::{Literal, NamedNode, NamedNodePattern, TermPattern, TriplePattern};
use spargebra::Query;

use crate::visit::{walk_query, AlgebraVisitor};
use crate::{Result, StarversError};

/// IRI namespace of placeholder predicates.
const PLACEHOLDER_NAMESPACE: &str = "urn:starvers:placeholder:";

/// One basic graph pattern lifted out of the query.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedBgp {
    pub id: String,
    /// The pattern's triples, in resolved order.
    pub triples: Vec<TriplePattern>,
}

impl VersionedBgp {
    pub fn placeholder(&self) -> TriplePattern {
        placeholder_triple(&self.id)
    }
}

/// The placeholder standing in for the basic graph pattern `id`.
pub fn placeholder_triple(id: &str) -> TriplePattern {
    TriplePattern {
        subject: TermPattern::Literal(Literal::new_simple_literal(format!(
            "__{id}dummy_subject__"
        ))),
        predicate: NamedNodePattern::NamedNode(NamedNode::new_unchecked(format!(
            "{PLACEHOLDER_NAMESPACE}{id}"
        ))),
        object: TermPattern::Literal(Literal::new_simple_literal(format!(
            "__{id}dummy_object__"
        ))),
    }
}

/// Collects the side table while replacing patterns with placeholders.
#[derive(Debug, Default)]
pub struct VersioningInjector {
    bgps: Vec<VersionedBgp>,
}

impl VersioningInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject placeholders into `query` and return the side table.
    ///
    /// The query must already be path-resolved.
    pub fn inject(mut self, query: &mut Query) -> Result<Vec<VersionedBgp>> {
        walk_query(&mut self, query)?;
        Ok(self.bgps)
    }
}

impl AlgebraVisitor for VersioningInjector {
    fn enter_pattern(&mut self, pattern: &mut GraphPattern) -> Result<()> {
        match pattern {
            // An empty group matches the single empty solution at any instant.
            GraphPattern::Bgp { patterns } if patterns.is_empty() => Ok(()),
            GraphPattern::Bgp { patterns } => {
                let id = format!("BGP_{}", self.bgps.len());
                let placeholder = placeholder_triple(&id);
                let triples = std::mem::replace(patterns, vec![placeholder]);
                self.bgps.push(VersionedBgp { id, triples });
                Ok(())
            }
            GraphPattern::Path { path, .. } => Err(StarversError::ExpressionNotCovered(format!(
                "property path {path} must be resolved before versioning"
            ))),
            GraphPattern::Service { name, .. } => Err(StarversError::ExpressionNotCovered(
                format!("SERVICE {name} cannot be versioned; federated patterns are not covered"),
            )),
            _ => Ok(()),
        }
    }
}

/// Replace every basic graph pattern of `query` with its placeholder.
pub fn inject_versioning(query: &mut Query) -> Result<Vec<VersionedBgp>> {
    VersioningInjector::new().inject(query)
}
