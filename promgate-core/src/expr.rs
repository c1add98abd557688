//! Read-only view over a parsed PromQL expression tree.
//!
//! Parsing is delegated to [`promql_parser`]. This module exposes the parsed
//! [`Expr`] as a borrowed, tagged [`Node`] so validators can walk the tree
//! with [`inspect`] without re-parsing text or matching on the parser's
//! boxing layout.
//!
//! # Example
//!
//! ```
//! use promgate_core::expr::{self, Node};
//!
//! let tree = expr::parse(r#"sum(rate(http_requests_total{space="a"}[5m]))"#).unwrap();
//!
//! let mut kinds = Vec::new();
//! expr::inspect(&tree, |node, path| kinds.push((node.kind(), path.len())));
//!
//! assert_eq!(
//!     kinds,
//!     vec![
//!         ("AggregateExpr", 0),
//!         ("Call", 1),
//!         ("MatrixSelector", 2),
//!         ("VectorSelector", 3),
//!     ]
//! );
//! ```

use std::fmt::Write;

use promql_parser::label::{METRIC_NAME, MatchOp, Matcher};
use promql_parser::parser::{
    self, AggregateExpr, BinaryExpr, Call, Expr, Extension, LabelModifier, MatrixSelector,
    NumberLiteral, ParenExpr, StringLiteral, SubqueryExpr, UnaryExpr, VectorSelector,
};

use crate::duration::format_duration;
use crate::error::{PromGateError, Result};

/// Parses query text into an expression tree.
///
/// Syntax errors are reported as [`PromGateError::InvalidQuery`].
pub fn parse(query: &str) -> Result<Expr> {
    parser::parse(query).map_err(PromGateError::InvalidQuery)
}

/// One node of a parsed expression, borrowed from the owning [`Expr`].
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// Instant vector selector: metric name plus label matchers.
    Selector(&'a VectorSelector),
    /// Range vector selector; its inner selector is visited as a child.
    MatrixSelector(&'a MatrixSelector),
    /// Function call.
    Call(&'a Call),
    /// Aggregation (`sum`, `topk`, ...), with optional grouping.
    Aggregate(&'a AggregateExpr),
    /// Binary operation.
    Binary(&'a BinaryExpr),
    /// Unary negation.
    Unary(&'a UnaryExpr),
    /// Parenthesised expression.
    Paren(&'a ParenExpr),
    /// Number literal.
    NumberLiteral(&'a NumberLiteral),
    /// String literal.
    StringLiteral(&'a StringLiteral),
    /// Subquery with range and optional step.
    Subquery(&'a SubqueryExpr),
    /// Parser extension node. Treated as a leaf.
    Extension(&'a Extension),
}

impl<'a> From<&'a Expr> for Node<'a> {
    fn from(expr: &'a Expr) -> Self {
        match expr {
            Expr::VectorSelector(vs) => Node::Selector(vs),
            Expr::MatrixSelector(ms) => Node::MatrixSelector(ms),
            Expr::Call(call) => Node::Call(call),
            Expr::Aggregate(agg) => Node::Aggregate(agg),
            Expr::Binary(bin) => Node::Binary(bin),
            Expr::Unary(unary) => Node::Unary(unary),
            Expr::Paren(paren) => Node::Paren(paren),
            Expr::NumberLiteral(lit) => Node::NumberLiteral(lit),
            Expr::StringLiteral(lit) => Node::StringLiteral(lit),
            Expr::Subquery(sq) => Node::Subquery(sq),
            Expr::Extension(ext) => Node::Extension(ext),
        }
    }
}

impl<'a> Node<'a> {
    /// Short name of the node kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Selector(_) => "VectorSelector",
            Node::MatrixSelector(_) => "MatrixSelector",
            Node::Call(_) => "Call",
            Node::Aggregate(_) => "AggregateExpr",
            Node::Binary(_) => "BinaryExpr",
            Node::Unary(_) => "UnaryExpr",
            Node::Paren(_) => "ParenExpr",
            Node::NumberLiteral(_) => "NumberLiteral",
            Node::StringLiteral(_) => "StringLiteral",
            Node::Subquery(_) => "SubqueryExpr",
            Node::Extension(_) => "Extension",
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<Node<'a>> {
        match *self {
            Node::MatrixSelector(ms) => vec![Node::Selector(&ms.vs)],
            Node::Call(call) => call.args.args.iter().map(|arg| Node::from(&**arg)).collect(),
            Node::Aggregate(agg) => {
                let mut children = Vec::with_capacity(2);
                if let Some(param) = &agg.param {
                    children.push(Node::from(&**param));
                }
                children.push(Node::from(&*agg.expr));
                children
            }
            Node::Binary(bin) => vec![Node::from(&*bin.lhs), Node::from(&*bin.rhs)],
            Node::Unary(unary) => vec![Node::from(&*unary.expr)],
            Node::Paren(paren) => vec![Node::from(&*paren.expr)],
            Node::Subquery(sq) => vec![Node::from(&*sq.expr)],
            Node::Selector(_)
            | Node::NumberLiteral(_)
            | Node::StringLiteral(_)
            | Node::Extension(_) => Vec::new(),
        }
    }
}

/// Visits every node depth-first, pre-order.
///
/// The callback receives the node and the path of its ancestors, root first.
/// The root is visited with an empty path.
pub fn inspect<'a, F>(expr: &'a Expr, mut visit: F)
where
    F: FnMut(Node<'a>, &[Node<'a>]),
{
    let mut path = Vec::new();
    walk(Node::from(expr), &mut path, &mut visit);
}

fn walk<'a, F>(node: Node<'a>, path: &mut Vec<Node<'a>>, visit: &mut F)
where
    F: FnMut(Node<'a>, &[Node<'a>]),
{
    visit(node, path);
    path.push(node);
    for child in node.children() {
        walk(child, path, visit);
    }
    path.pop();
}

/// Symbol of a label matcher operator as written in PromQL.
pub fn match_op_symbol(op: &MatchOp) -> &'static str {
    match op {
        MatchOp::Equal => "=",
        MatchOp::NotEqual => "!=",
        MatchOp::Re(_) => "=~",
        MatchOp::NotRe(_) => "!~",
    }
}

/// Renders an indented, human-readable dump of the expression tree.
///
/// Used by the `/debug/parse` endpoint.
pub fn render_tree(expr: &Expr) -> String {
    let mut out = String::new();
    render_node(&mut out, Node::from(expr), 0);
    out
}

fn render_node(out: &mut String, node: Node<'_>, depth: usize) {
    let indent = "  ".repeat(depth);

    // Writing into a String cannot fail.
    let _ = match node {
        Node::Selector(vs) => {
            let name = vs.name.as_deref().unwrap_or_default();
            let matchers = render_matchers(&vs.matchers.matchers, vs.name.is_some());
            writeln!(out, "{indent}VectorSelector: {name}{matchers}")
        }
        Node::MatrixSelector(ms) => {
            writeln!(out, "{indent}MatrixSelector[{}]", format_duration(ms.range))
        }
        Node::Call(call) => writeln!(out, "{indent}Call: {}()", call.func.name),
        Node::Aggregate(agg) => {
            let grouping = match &agg.modifier {
                Some(LabelModifier::Include(labels)) if !labels.labels.is_empty() => {
                    format!(" by ({})", labels.labels.join(", "))
                }
                Some(LabelModifier::Exclude(labels)) if !labels.labels.is_empty() => {
                    format!(" without ({})", labels.labels.join(", "))
                }
                _ => String::new(),
            };
            writeln!(out, "{indent}AggregateExpr: {}{grouping}", agg.op)
        }
        Node::Binary(bin) => {
            let _ = writeln!(out, "{indent}BinaryExpr: {}", bin.op);
            let _ = writeln!(out, "{indent}  LHS:");
            render_node(out, Node::from(&*bin.lhs), depth + 2);
            let _ = writeln!(out, "{indent}  RHS:");
            render_node(out, Node::from(&*bin.rhs), depth + 2);
            return;
        }
        Node::Unary(_) => writeln!(out, "{indent}UnaryExpr: -"),
        Node::Paren(_) => writeln!(out, "{indent}ParenExpr"),
        Node::NumberLiteral(lit) => writeln!(out, "{indent}NumberLiteral: {}", lit.val),
        Node::StringLiteral(lit) => writeln!(out, "{indent}StringLiteral: {:?}", lit.val),
        Node::Subquery(sq) => {
            let step = sq.step.map(format_duration).unwrap_or_default();
            writeln!(
                out,
                "{indent}SubqueryExpr[{}:{step}]",
                format_duration(sq.range)
            )
        }
        Node::Extension(_) => writeln!(out, "{indent}Extension"),
    };

    for child in node.children() {
        render_node(out, child, depth + 1);
    }
}

fn render_matchers(matchers: &[Matcher], named: bool) -> String {
    let rendered: Vec<String> = matchers
        .iter()
        .filter(|m| !(named && m.name == METRIC_NAME))
        .map(|m| format!("{}{}{:?}", m.name, match_op_symbol(&m.op), m.value))
        .collect();
    if rendered.is_empty() {
        return String::new();
    }
    format!("{{{}}}", rendered.join(", "))
}
