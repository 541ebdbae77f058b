//! Mutable traversal over the SPARQL algebra tree.
//!
//! Every rewrite pass is an [`AlgebraVisitor`]. The walker matches each
//! algebra node kind exhaustively, so a node kind the passes do not know about
//! is a compile error rather than a silently skipped subtree. Graph patterns
//! nested in `EXISTS` / `NOT EXISTS` expressions are walked like any other.

use spargebra::algebra::{AggregateExpression, Expression, GraphPattern, OrderExpression};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern, Variable};
use spargebra::Query;

use crate::{Result, StarversError};

/// Hooks called while walking a query.
///
/// `enter_pattern` runs before the children of a node are walked and may
/// replace the node; the walker then descends into whatever the node became.
/// `leave_pattern` runs after all children were walked.
pub trait AlgebraVisitor {
    fn enter_pattern(&mut self, _pattern: &mut GraphPattern) -> Result<()> {
        Ok(())
    }

    fn leave_pattern(&mut self, _pattern: &mut GraphPattern) -> Result<()> {
        Ok(())
    }

    /// Called for every subject / object position, before descending into
    /// quoted triples or reporting the term's variable.
    fn visit_term(&mut self, _term: &mut TermPattern) {}

    fn visit_variable(&mut self, _variable: &mut Variable) {}
}

/// Walk the WHERE pattern of any query form.
///
/// CONSTRUCT templates are not walked: they describe output, not matching.
pub fn walk_query<V: AlgebraVisitor + ?Sized>(visitor: &mut V, query: &mut Query) -> Result<()> {
    let pattern = match query {
        Query::Select { pattern, .. }
        | Query::Construct { pattern, .. }
        | Query::Describe { pattern, .. }
        | Query::Ask { pattern, .. } => pattern,
    };
    walk_pattern(visitor, pattern)
}

pub fn walk_pattern<V: AlgebraVisitor + ?Sized>(
    visitor: &mut V,
    pattern: &mut GraphPattern,
) -> Result<()> {
    visitor.enter_pattern(pattern)?;
    match pattern {
        GraphPattern::Bgp { patterns } => {
            for triple in patterns {
                walk_triple(visitor, triple);
            }
        }
        GraphPattern::Path {
            subject, object, ..
        } => {
            walk_term(visitor, subject);
            walk_term(visitor, object);
        }
        GraphPattern::Join { left, right }
        | GraphPattern::Union { left, right }
        | GraphPattern::Minus { left, right }
        | GraphPattern::Lateral { left, right } => {
            walk_pattern(visitor, left)?;
            walk_pattern(visitor, right)?;
        }
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => {
            walk_pattern(visitor, left)?;
            walk_pattern(visitor, right)?;
            if let Some(expression) = expression {
                walk_expression(visitor, expression)?;
            }
        }
        GraphPattern::Filter { expr, inner } => {
            walk_pattern(visitor, inner)?;
            walk_expression(visitor, expr)?;
        }
        GraphPattern::Graph { name, inner } => {
            walk_named_node_pattern(visitor, name);
            walk_pattern(visitor, inner)?;
        }
        GraphPattern::Extend {
            inner,
            variable,
            expression,
        } => {
            walk_pattern(visitor, inner)?;
            visitor.visit_variable(variable);
            walk_expression(visitor, expression)?;
        }
        GraphPattern::Values { variables, .. } => {
            for variable in variables {
                visitor.visit_variable(variable);
            }
        }
        GraphPattern::OrderBy { inner, expression } => {
            walk_pattern(visitor, inner)?;
            for order in expression {
                match order {
                    OrderExpression::Asc(e) | OrderExpression::Desc(e) => {
                        walk_expression(visitor, e)?
                    }
                }
            }
        }
        GraphPattern::Project { inner, variables } => {
            walk_pattern(visitor, inner)?;
            for variable in variables {
                visitor.visit_variable(variable);
            }
        }
        GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::Slice { inner, .. } => {
            walk_pattern(visitor, inner)?;
        }
        GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } => {
            walk_pattern(visitor, inner)?;
            for variable in variables {
                visitor.visit_variable(variable);
            }
            for (variable, aggregate) in aggregates {
                visitor.visit_variable(variable);
                if let AggregateExpression::FunctionCall { expr, .. } = aggregate {
                    // A graph pattern inside an aggregate argument could not be versioned.
                    let mut finder = ExistsFinder::default();
                    walk_expression(&mut finder, expr)?;
                    if finder.found {
                        return Err(StarversError::ExpressionNotCovered(format!(
                            "EXISTS inside the aggregate argument {expr} has not been covered yet"
                        )));
                    }
                    walk_expression(visitor, expr)?;
                }
            }
        }
        GraphPattern::Service { name, inner, .. } => {
            walk_named_node_pattern(visitor, name);
            walk_pattern(visitor, inner)?;
        }
    }
    visitor.leave_pattern(pattern)
}

#[derive(Default)]
struct ExistsFinder {
    found: bool,
}

impl AlgebraVisitor for ExistsFinder {
    fn enter_pattern(&mut self, _pattern: &mut GraphPattern) -> Result<()> {
        self.found = true;
        Ok(())
    }
}

pub fn walk_expression<V: AlgebraVisitor + ?Sized>(
    visitor: &mut V,
    expression: &mut Expression,
) -> Result<()> {
    match expression {
        Expression::NamedNode(_) | Expression::Literal(_) => {}
        Expression::Variable(variable) | Expression::Bound(variable) => {
            visitor.visit_variable(variable)
        }
        Expression::Or(a, b)
        | Expression::And(a, b)
        | Expression::Equal(a, b)
        | Expression::SameTerm(a, b)
        | Expression::Greater(a, b)
        | Expression::GreaterOrEqual(a, b)
        | Expression::Less(a, b)
        | Expression::LessOrEqual(a, b)
        | Expression::Add(a, b)
        | Expression::Subtract(a, b)
        | Expression::Multiply(a, b)
        | Expression::Divide(a, b) => {
            walk_expression(visitor, a)?;
            walk_expression(visitor, b)?;
        }
        Expression::UnaryPlus(e) | Expression::UnaryMinus(e) | Expression::Not(e) => {
            walk_expression(visitor, e)?;
        }
        Expression::In(e, list) => {
            walk_expression(visitor, e)?;
            for item in list {
                walk_expression(visitor, item)?;
            }
        }
        Expression::If(condition, then, otherwise) => {
            walk_expression(visitor, condition)?;
            walk_expression(visitor, then)?;
            walk_expression(visitor, otherwise)?;
        }
        Expression::Coalesce(list) | Expression::FunctionCall(_, list) => {
            for item in list {
                walk_expression(visitor, item)?;
            }
        }
        Expression::Exists(pattern) => walk_pattern(visitor, pattern)?,
    }
    Ok(())
}

fn walk_triple<V: AlgebraVisitor + ?Sized>(visitor: &mut V, triple: &mut TriplePattern) {
    walk_term(visitor, &mut triple.subject);
    walk_named_node_pattern(visitor, &mut triple.predicate);
    walk_term(visitor, &mut triple.object);
}

fn walk_term<V: AlgebraVisitor + ?Sized>(visitor: &mut V, term: &mut TermPattern) {
    visitor.visit_term(term);
    match term {
        TermPattern::Variable(variable) => visitor.visit_variable(variable),
        TermPattern::Triple(quoted) => walk_triple(visitor, quoted),
        TermPattern::NamedNode(_) | TermPattern::BlankNode(_) | TermPattern::Literal(_) => {}
    }
}

fn walk_named_node_pattern<V: AlgebraVisitor + ?Sized>(
    visitor: &mut V,
    name: &mut NamedNodePattern,
) {
    if let NamedNodePattern::Variable(variable) = name {
        visitor.visit_variable(variable);
    }
}
