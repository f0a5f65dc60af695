//! Row-mapping contract used by [`crate::QueryBuilder::fetch_as`].

use rusqlite::Row;

/// A trait for types that can be constructed from a SQLite row.
///
/// # Example
///
/// ```rust
/// use fluentq::FromRow;
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// impl FromRow for User {
///     fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
///         Ok(User {
///             id: row.get("id")?,
///             name: row.get("name")?,
///         })
///     }
/// }
/// ```
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}
