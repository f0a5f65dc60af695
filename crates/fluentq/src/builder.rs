//! The fluent statement builder.
//!
//! A [`QueryBuilder`] is bound to a table and a shared connection at
//! construction. Chained calls record the intended statement without touching
//! the database; [`QueryBuilder::to_statement_text`] renders it and
//! [`QueryBuilder::execute`] runs it. After execution the builder can be
//! [`QueryBuilder::clear`]-ed and reused against the same table.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use rusqlite::{types::Value, Connection};

use crate::{
    condition::{render_comparison_value, ConditionTree, Connector, Node, Operand, Predicate},
    error::{Error, Result},
    shape::{dimension_depth, is_named_row_set, Input, Mode},
    subquery::SqlSource,
};

/// Statement method recorded by the fluent calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Select,
    Insert,
    Update,
    Delete,
}

impl Method {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Method::Select => "SELECT",
            Method::Insert => "INSERT",
            Method::Update => "UPDATE",
            Method::Delete => "DELETE",
        }
    }

    fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_uppercase().as_str() {
            "SELECT" => Some(Method::Select),
            "INSERT" => Some(Method::Insert),
            "UPDATE" => Some(Method::Update),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }
}

/// Join flavor; ordering fixes the rendering order of grouped join clauses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Cross => "CROSS",
        }
    }
}

/// One join descriptor. CROSS JOIN carries only a table name.
#[derive(Clone, Debug)]
pub(crate) enum JoinSpec {
    Table(String),
    On {
        table: String,
        left: String,
        comparator: String,
        right: String,
    },
}

/// Which condition tree a predicate targets.
#[derive(Clone, Copy)]
enum TreeKind {
    Where,
    Having,
}

#[derive(Debug)]
pub struct QueryBuilder {
    pub(crate) db: Arc<Mutex<Connection>>,
    /// Current table (or FROM alias once a subquery source is set).
    pub(crate) table: String,
    /// Table the builder was constructed with; restored by `clear`.
    base_table: String,
    pub(crate) method: Option<Method>,
    pub(crate) mode: Mode,
    /// Attribute sets; outer dimension drives batch iteration.
    pub(crate) attribute_rows: Vec<Vec<String>>,
    /// Value rows; bound per execution.
    pub(crate) value_rows: Vec<Vec<Value>>,
    /// Rendered `(subquery) ` prefix when FROM is a subquery, else empty.
    pub(crate) from: String,
    /// Named subselects, alias paired with rendered SQL.
    pub(crate) subselects: Vec<(String, String)>,
    pub(crate) where_tree: ConditionTree,
    pub(crate) having_tree: ConditionTree,
    pub(crate) raw_statement: String,
    pub(crate) raw_where: String,
    pub(crate) raw_having: String,
    pub(crate) order_attributes: Vec<String>,
    pub(crate) order_desc: bool,
    pub(crate) group_attribute: String,
    pub(crate) limit_up: Option<i64>,
    pub(crate) limit_down: Option<i64>,
    pub(crate) joins: BTreeMap<JoinKind, Vec<JoinSpec>>,
    /// Aggregation functions with their attributes, in call order.
    pub(crate) aggregations: Vec<(&'static str, Vec<String>)>,
}

impl QueryBuilder {
    /// Creates a builder bound to `table`, borrowing the shared connection
    /// for the lifetime of each `execute` call.
    pub fn new(db: Arc<Mutex<Connection>>, table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            db,
            base_table: table.clone(),
            table,
            method: None,
            mode: Mode::Single,
            attribute_rows: vec![],
            value_rows: vec![],
            from: String::new(),
            subselects: vec![],
            where_tree: ConditionTree::default(),
            having_tree: ConditionTree::default(),
            raw_statement: String::new(),
            raw_where: String::new(),
            raw_having: String::new(),
            order_attributes: vec![],
            order_desc: false,
            group_attribute: String::new(),
            limit_up: None,
            limit_down: None,
            joins: BTreeMap::new(),
            aggregations: vec![],
        }
    }

    /// Resets all statement state except the table the builder was created
    /// for, enabling reuse.
    pub fn clear(&mut self) {
        self.table = self.base_table.clone();
        self.method = None;
        self.mode = Mode::Single;
        self.attribute_rows.clear();
        self.value_rows.clear();
        self.from.clear();
        self.subselects.clear();
        self.where_tree = ConditionTree::default();
        self.having_tree = ConditionTree::default();
        self.raw_statement.clear();
        self.raw_where.clear();
        self.raw_having.clear();
        self.order_attributes.clear();
        self.order_desc = false;
        self.group_attribute.clear();
        self.limit_up = None;
        self.limit_down = None;
        self.joins.clear();
        self.aggregations.clear();
    }

    // --- statement methods ---

    /// Records a SELECT. Empty attributes select all columns; a flat list
    /// selects those columns; a nested list switches to batch mode with one
    /// attribute set per iteration.
    pub fn select(mut self, attributes: impl Into<Input>) -> Result<Self> {
        let attributes = attributes.into();
        self.method = Some(Method::Select);
        self.value_rows.clear();

        if attributes.is_empty() {
            self.mode = Mode::Single;
            self.attribute_rows.clear();
        } else if dimension_depth(&attributes) > 1 {
            self.mode = Mode::Batch;
            self.attribute_rows = attributes.string_sets()?;
        } else {
            self.mode = Mode::Single;
            self.attribute_rows = vec![attributes.flat_strings()?];
        }
        Ok(self)
    }

    /// Records a SELECT of all columns.
    pub fn select_all(mut self) -> Self {
        self.method = Some(Method::Select);
        self.mode = Mode::Single;
        self.attribute_rows.clear();
        self.value_rows.clear();
        self
    }

    /// Records an INSERT. Three shapes are accepted:
    /// full value rows with no column list (positional binding), a column
    /// list plus value rows (named binding, one execution per row), or keyed
    /// column-to-value rows with empty `values` (batch mode, one iteration
    /// per keyed row).
    pub fn insert(mut self, attributes: impl Into<Input>, values: impl Into<Input>) -> Result<Self> {
        let attributes = attributes.into();
        let values = values.into();
        self.method = Some(Method::Insert);

        if values.is_empty() {
            if is_named_row_set(&attributes) {
                self.mode = Mode::Batch;
                let (attrs, vals) = attributes.split_keyed_rows()?;
                self.attribute_rows = attrs;
                self.value_rows = vals;
            } else {
                self.mode = Mode::Single;
                self.attribute_rows = vec![];
                self.value_rows = attributes.value_rows()?;
                let width = match self.value_rows.first() {
                    Some(first) => first.len(),
                    None => {
                        return Err(Error::MalformedInput(
                            "insert requires at least one value row".into(),
                        ))
                    }
                };
                if self.value_rows.iter().any(|row| row.len() != width) {
                    return Err(Error::MalformedInput(
                        "positional insert rows must share an identical length".into(),
                    ));
                }
            }
        } else {
            let columns = attributes.flat_strings()?;
            let rows = if dimension_depth(&values) > 1 {
                values.value_rows()?
            } else {
                vec![values.flat_values()?]
            };
            if rows.iter().any(|row| row.len() != columns.len()) {
                return Err(Error::MalformedInput(
                    "insert value rows must match the column list length".into(),
                ));
            }
            self.mode = if rows.len() > 1 {
                Mode::Batch
            } else {
                Mode::Single
            };
            self.attribute_rows = vec![columns];
            self.value_rows = rows;
        }
        Ok(self)
    }

    /// Records an UPDATE. A column list plus a flat value row updates once;
    /// keyed multi-row input switches to batch mode, one UPDATE per row.
    pub fn update(mut self, attributes: impl Into<Input>, values: impl Into<Input>) -> Result<Self> {
        let attributes = attributes.into();
        let values = values.into();
        self.method = Some(Method::Update);
        self.mode = if dimension_depth(&attributes) > 1 {
            Mode::Batch
        } else {
            Mode::Single
        };

        if values.is_empty() {
            let (attrs, vals) = attributes.split_keyed_rows()?;
            self.attribute_rows = attrs;
            self.value_rows = vals;
        } else {
            let columns = attributes.flat_strings()?;
            let row = values.flat_values()?;
            if row.len() != columns.len() {
                return Err(Error::MalformedInput(
                    "update values must match the column list length".into(),
                ));
            }
            self.attribute_rows = vec![columns];
            self.value_rows = vec![row];
        }
        Ok(self)
    }

    /// Records a DELETE; always single mode. Scope it with filters.
    pub fn delete(mut self) -> Self {
        self.method = Some(Method::Delete);
        self.mode = Mode::Single;
        self
    }

    // --- clause state ---

    /// Orders by the given attributes, all in one direction.
    pub fn order<I, S>(mut self, attributes: I, desc: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_attributes = attributes.into_iter().map(Into::into).collect();
        self.order_desc = desc;
        self
    }

    /// Groups records by one attribute; pair with the aggregation methods
    /// and `having`.
    pub fn group(mut self, attribute: impl Into<String>) -> Self {
        self.group_attribute = attribute.into();
        self
    }

    /// Limits fetched records. With `down` set, `up` acts as the offset.
    pub fn limit(mut self, up: i64, down: Option<i64>) -> Self {
        self.limit_up = Some(up);
        self.limit_down = down;
        self
    }

    // --- joins ---

    fn add_join(mut self, kind: JoinKind, spec: JoinSpec) -> Self {
        self.joins.entry(kind).or_default().push(spec);
        self
    }

    pub fn join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        comparator: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.add_join(
            JoinKind::Inner,
            JoinSpec::On {
                table: table.into(),
                left: left.into(),
                comparator: comparator.into(),
                right: right.into(),
            },
        )
    }

    pub fn left_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        comparator: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.add_join(
            JoinKind::Left,
            JoinSpec::On {
                table: table.into(),
                left: left.into(),
                comparator: comparator.into(),
                right: right.into(),
            },
        )
    }

    pub fn right_join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        comparator: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        self.add_join(
            JoinKind::Right,
            JoinSpec::On {
                table: table.into(),
                left: left.into(),
                comparator: comparator.into(),
                right: right.into(),
            },
        )
    }

    pub fn cross_join(self, table: impl Into<String>) -> Self {
        self.add_join(JoinKind::Cross, JoinSpec::Table(table.into()))
    }

    // --- aggregations (SQLite set) ---

    fn add_aggregation(mut self, function: &'static str, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        match self.aggregations.iter_mut().find(|(f, _)| *f == function) {
            Some((_, attrs)) => attrs.push(attribute),
            None => self.aggregations.push((function, vec![attribute])),
        }
        self
    }

    pub fn avg(self, attribute: impl Into<String>) -> Self {
        self.add_aggregation("avg", attribute)
    }

    pub fn count(self, attribute: impl Into<String>) -> Self {
        self.add_aggregation("count", attribute)
    }

    pub fn group_concat(self, attribute: impl Into<String>) -> Self {
        self.add_aggregation("group_concat", attribute)
    }

    pub fn max(self, attribute: impl Into<String>) -> Self {
        self.add_aggregation("max", attribute)
    }

    pub fn min(self, attribute: impl Into<String>) -> Self {
        self.add_aggregation("min", attribute)
    }

    pub fn sum(self, attribute: impl Into<String>) -> Self {
        self.add_aggregation("sum", attribute)
    }

    pub fn total(self, attribute: impl Into<String>) -> Self {
        self.add_aggregation("total", attribute)
    }

    // --- FROM and subselects ---

    /// Sets the base source records are fetched from: a table name, a nested
    /// builder, or a deferred constructor. Subquery sources require `alias`,
    /// which becomes the prefix for selected attributes.
    pub fn from(mut self, source: impl Into<SqlSource>, alias: impl Into<String>) -> Result<Self> {
        match source.into() {
            SqlSource::Literal(name) => {
                self.table = name;
            }
            other => {
                let sql = other.resolved_text(&self.db, &self.table)?;
                self.from = format!("({sql}) ");
                self.table = alias.into();
            }
        }
        Ok(self)
    }

    /// Adds a named subselect, rendered after the base FROM source as
    /// `(<sql>) alias`. Mostly used to reference derived columns in filters.
    pub fn subselect(
        mut self,
        source: impl Into<SqlSource>,
        alias: impl Into<String>,
    ) -> Result<Self> {
        let sql = source.into().resolved_text(&self.db, &self.table)?;
        self.subselects.push((alias.into(), sql));
        Ok(self)
    }

    // --- raw overrides ---

    /// Overrides the whole method clause with raw SQL. The statement method
    /// is derived from the leading keyword for execution dispatch.
    pub fn raw_statement(mut self, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let keyword = sql.split_whitespace().next().unwrap_or("");
        self.method = Method::parse(keyword);
        self.raw_statement = sql;
        self
    }

    /// Overrides the WHERE clause with a raw fragment (keyword included).
    pub fn raw_where(mut self, sql: impl Into<String>) -> Self {
        self.raw_where = sql.into();
        self
    }

    /// Overrides the HAVING clause with a raw fragment (keyword included).
    pub fn raw_having(mut self, sql: impl Into<String>) -> Self {
        self.raw_having = sql.into();
        self
    }

    // --- WHERE family ---

    /// Joins a condition with AND.
    pub fn filter(self, predicate: impl Into<Predicate>) -> Result<Self> {
        self.add_condition(predicate.into(), TreeKind::Where, Connector::And, false)
    }

    /// Joins a condition with AND NOT.
    pub fn not_filter(self, predicate: impl Into<Predicate>) -> Result<Self> {
        self.add_condition(predicate.into(), TreeKind::Where, Connector::And, true)
    }

    /// Joins a condition with OR.
    pub fn or_filter(self, predicate: impl Into<Predicate>) -> Result<Self> {
        self.add_condition(predicate.into(), TreeKind::Where, Connector::Or, false)
    }

    /// Joins a condition with OR NOT.
    pub fn or_not_filter(self, predicate: impl Into<Predicate>) -> Result<Self> {
        self.add_condition(predicate.into(), TreeKind::Where, Connector::Or, true)
    }

    // --- HAVING family ---

    /// Joins an aggregation condition with AND.
    pub fn having(self, predicate: impl Into<Predicate>) -> Result<Self> {
        self.add_condition(predicate.into(), TreeKind::Having, Connector::And, false)
    }

    /// Joins an aggregation condition with AND NOT.
    pub fn not_having(self, predicate: impl Into<Predicate>) -> Result<Self> {
        self.add_condition(predicate.into(), TreeKind::Having, Connector::And, true)
    }

    /// Joins an aggregation condition with OR.
    pub fn or_having(self, predicate: impl Into<Predicate>) -> Result<Self> {
        self.add_condition(predicate.into(), TreeKind::Having, Connector::Or, false)
    }

    /// Joins an aggregation condition with OR NOT.
    pub fn or_not_having(self, predicate: impl Into<Predicate>) -> Result<Self> {
        self.add_condition(predicate.into(), TreeKind::Having, Connector::Or, true)
    }

    fn add_condition(
        mut self,
        predicate: Predicate,
        tree: TreeKind,
        connector: Connector,
        negated: bool,
    ) -> Result<Self> {
        let nodes = self.resolve_predicate(predicate, tree)?;
        let target = match tree {
            TreeKind::Where => &mut self.where_tree,
            TreeKind::Having => &mut self.having_tree,
        };
        for node in nodes {
            target.push(connector, negated, node);
        }
        Ok(self)
    }

    fn resolve_predicate(&self, predicate: Predicate, tree: TreeKind) -> Result<Vec<Node>> {
        match predicate {
            Predicate::Triple(attribute, comparator, operand) => {
                Ok(vec![self.leaf(attribute, comparator, operand)?])
            }
            Predicate::Triples(triples) => triples
                .into_iter()
                .map(|(attribute, comparator, operand)| self.leaf(attribute, comparator, operand))
                .collect(),
            Predicate::Group(construct) => {
                let built = construct(QueryBuilder::new(self.db.clone(), self.table.clone()));
                Ok(vec![Node::Group(match tree {
                    TreeKind::Where => built.where_tree,
                    TreeKind::Having => built.having_tree,
                })])
            }
            Predicate::Builder(builder) => Ok(vec![Node::Group(match tree {
                TreeKind::Where => builder.where_tree,
                TreeKind::Having => builder.having_tree,
            })]),
        }
    }

    fn leaf(&self, attribute: String, comparator: String, operand: Operand) -> Result<Node> {
        let value = match operand {
            Operand::Value(v) => render_comparison_value(&comparator, &v),
            Operand::Source(source) => {
                format!("({})", source.resolved_text(&self.db, &self.table)?)
            }
        };
        Ok(Node::Leaf {
            attribute,
            comparator,
            value,
        })
    }

    /// Attribute set for the current (or only) batch slice.
    pub(crate) fn current_attributes(&self) -> &[String] {
        self.attribute_rows.first().map(Vec::as_slice).unwrap_or(&[])
    }
}
