//! A fluent SQL statement builder and executor for SQLite.
//!
//! A [`QueryBuilder`] accumulates statement state through chained calls,
//! renders it to SQL text, and executes it through a shared [`rusqlite`]
//! connection. Inputs whose shape carries more than one attribute set or
//! keyed row switch the builder into batch mode, where one statement is
//! rendered and executed per row group.
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//!
//! use fluentq::QueryBuilder;
//! use rusqlite::Connection;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Arc::new(Mutex::new(Connection::open("app.db")?));
//!     let rows = QueryBuilder::new(db, "users")
//!         .select(vec!["name", "age"])?
//!         .filter(("age", ">", 18))?
//!         .order(["name"], false)
//!         .fetch()?;
//!     println!("{} adults", rows.len());
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod condition;
pub mod error;
pub mod exec;
pub mod helpers;
pub mod shape;
pub mod subquery;
pub mod traits;
mod translate;

pub use builder::{JoinKind, Method, QueryBuilder};
pub use condition::{Operand, Predicate};
pub use error::{Error, Result};
pub use exec::{ResultSet, RowMap};
pub use helpers::*;
pub use shape::{Input, Layout, Mode};
pub use subquery::SqlSource;
pub use traits::FromRow;
