//! Subquery sources for FROM, subselect slots and comparison operands.
//!
//! Anywhere a statement accepts a nested query, the caller may supply a
//! literal SQL fragment, an already-configured builder, or a deferred
//! constructor that receives a fresh builder bound to the outer table.
//! Sources resolve to text once, at the call site; resolution has no side
//! effects on the outer builder.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{builder::QueryBuilder, error::Result};

pub enum SqlSource {
    /// Already-rendered SQL text (or a bare table name for FROM).
    Literal(String),
    /// A configured nested builder, rendered on demand.
    Builder(Box<QueryBuilder>),
    /// A constructor invoked with a fresh builder bound to the outer table.
    Deferred(Box<dyn FnOnce(QueryBuilder) -> QueryBuilder>),
}

impl SqlSource {
    pub fn deferred<F>(f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder + 'static,
    {
        SqlSource::Deferred(Box::new(f))
    }

    /// Resolves this source to SQL text. Callers add parentheses where the
    /// use site requires them.
    pub(crate) fn resolved_text(self, db: &Arc<Mutex<Connection>>, table: &str) -> Result<String> {
        match self {
            SqlSource::Literal(text) => Ok(text),
            SqlSource::Builder(builder) => builder.to_statement_text(),
            SqlSource::Deferred(construct) => {
                let built = construct(QueryBuilder::new(db.clone(), table));
                built.to_statement_text()
            }
        }
    }
}

impl From<&str> for SqlSource {
    fn from(text: &str) -> Self {
        SqlSource::Literal(text.to_string())
    }
}

impl From<String> for SqlSource {
    fn from(text: String) -> Self {
        SqlSource::Literal(text)
    }
}

impl From<QueryBuilder> for SqlSource {
    fn from(builder: QueryBuilder) -> Self {
        SqlSource::Builder(Box::new(builder))
    }
}
