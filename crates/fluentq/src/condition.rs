//! The boolean condition tree backing WHERE and HAVING clauses.
//!
//! Conditions accumulate into four flat slots: the AND and OR branches, each
//! split into plain and negated entries. A slot entry is either a rendered
//! comparison leaf or a nested tree contributed by a sub-builder, which keeps
//! its own bracket scope when rendered.

use std::sync::LazyLock;

use regex::Regex;
use rusqlite::types::Value;

use crate::{
    builder::QueryBuilder,
    shape::scalar_text,
    subquery::SqlSource,
};

static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d+(\.\d+)?$").expect("unable to compile numeric literal regex")
});

/// Boolean operator joining a condition to the rest of its branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

/// One entry in a condition slot.
#[derive(Clone, Debug)]
pub enum Node {
    /// `attribute comparator value`, with the value already rendered to text.
    Leaf {
        attribute: String,
        comparator: String,
        value: String,
    },
    /// A nested tree, rendered inside parentheses.
    Group(ConditionTree),
}

/// The two-branch condition tree.
///
/// The AND branch binds tighter: when both branches hold entries the tree
/// renders as `<ands> AND (<ors>)`.
#[derive(Clone, Debug, Default)]
pub struct ConditionTree {
    and_plain: Vec<Node>,
    and_negated: Vec<Node>,
    or_plain: Vec<Node>,
    or_negated: Vec<Node>,
}

impl ConditionTree {
    pub fn is_empty(&self) -> bool {
        self.and_plain.is_empty()
            && self.and_negated.is_empty()
            && self.or_plain.is_empty()
            && self.or_negated.is_empty()
    }

    pub fn push(&mut self, connector: Connector, negated: bool, node: Node) {
        let slot = match (connector, negated) {
            (Connector::And, false) => &mut self.and_plain,
            (Connector::And, true) => &mut self.and_negated,
            (Connector::Or, false) => &mut self.or_plain,
            (Connector::Or, true) => &mut self.or_negated,
        };
        slot.push(node);
    }

    /// Renders the tree to SQL text. An empty tree renders as an empty
    /// string; negation prefixes `NOT` on leaves only.
    pub fn render(&self) -> String {
        let mut ands = Vec::new();
        let mut ors = Vec::new();

        for (nodes, negated) in [(&self.and_plain, false), (&self.and_negated, true)] {
            for node in nodes {
                ands.push(render_node(node, negated));
            }
        }
        for (nodes, negated) in [(&self.or_plain, false), (&self.or_negated, true)] {
            for node in nodes {
                ors.push(render_node(node, negated));
            }
        }

        if !ands.is_empty() {
            let mut text = ands.join(" AND ");
            if !ors.is_empty() {
                text.push_str(&format!(" AND ({})", ors.join(" OR ")));
            }
            text
        } else if !ors.is_empty() {
            ors.join(" OR ")
        } else {
            String::new()
        }
    }
}

fn render_node(node: &Node, negated: bool) -> String {
    match node {
        Node::Leaf {
            attribute,
            comparator,
            value,
        } => {
            let prefix = if negated { "NOT " } else { "" };
            format!("{prefix}{attribute} {comparator} {value}")
        }
        Node::Group(tree) => format!("({})", tree.render()),
    }
}

/// Right-hand side of a comparison: a plain value or a subquery source.
pub enum Operand {
    Value(Value),
    Source(SqlSource),
}

/// A filter argument: one comparison, a batch of comparisons, a nested
/// closure opening a bracket scope, or an already-configured sub-builder
/// whose tree is adopted wholesale.
pub enum Predicate {
    Triple(String, String, Operand),
    Triples(Vec<(String, String, Operand)>),
    Group(Box<dyn FnOnce(QueryBuilder) -> QueryBuilder>),
    Builder(Box<QueryBuilder>),
}

impl Predicate {
    /// A nested bracket scope: the closure receives a fresh builder bound to
    /// the same table and its conditions are appended as one group.
    pub fn group<F>(f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder + 'static,
    {
        Predicate::Group(Box::new(f))
    }
}

impl<O: Into<Operand>> From<(&str, &str, O)> for Predicate {
    fn from((attribute, comparator, value): (&str, &str, O)) -> Self {
        Predicate::Triple(attribute.to_string(), comparator.to_string(), value.into())
    }
}

impl<O: Into<Operand>> From<Vec<(&str, &str, O)>> for Predicate {
    fn from(triples: Vec<(&str, &str, O)>) -> Self {
        Predicate::Triples(
            triples
                .into_iter()
                .map(|(a, c, v)| (a.to_string(), c.to_string(), v.into()))
                .collect(),
        )
    }
}

impl From<QueryBuilder> for Predicate {
    fn from(builder: QueryBuilder) -> Self {
        Predicate::Builder(Box::new(builder))
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Value(Value::Integer(value as i64))
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Value(Value::Integer(value))
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Value(Value::Real(value))
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Value(Value::Text(value.to_string()))
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Operand::Value(Value::Text(value))
    }
}

impl From<QueryBuilder> for Operand {
    fn from(builder: QueryBuilder) -> Self {
        Operand::Source(SqlSource::from(builder))
    }
}

impl From<SqlSource> for Operand {
    fn from(source: SqlSource) -> Self {
        Operand::Source(source)
    }
}

/// Renders a comparison value to inline SQL text.
///
/// For `=`, `<>` and `LIKE` a numeric-looking value is quoted as a string
/// literal so it compares correctly against columns storing numeric-looking
/// text. Everything else passes through unchanged: values reaching this path
/// are inlined, not bound, and string values must already carry their own
/// quoting/escaping.
pub(crate) fn render_comparison_value(comparator: &str, value: &Value) -> String {
    let quoting = matches!(
        comparator.to_ascii_uppercase().as_str(),
        "=" | "<>" | "LIKE"
    );
    match value {
        Value::Null => "NULL".to_string(),
        Value::Text(s) => {
            if quoting && NUMERIC_RE.is_match(s) {
                format!("'{s}'")
            } else {
                s.clone()
            }
        }
        Value::Blob(_) => format!("X'{}'", scalar_text(value)),
        other => {
            let text = scalar_text(other);
            if quoting {
                format!("'{text}'")
            } else {
                text
            }
        }
    }
}
