//! Error types for fluentq.

use miette::Diagnostic;
use thiserror::Error;

/// Error type for statement construction and execution.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Unsupported statement method: {0}")]
    #[diagnostic(
        code(fluentq::unsupported_method),
        help("Call select(), insert(), update() or delete() before rendering the statement")
    )]
    UnsupportedMethod(String),

    #[error("{clause} clause is not compatible with {method}")]
    #[diagnostic(
        code(fluentq::incompatible_clause),
        help("Remove the offending clause or change the statement method")
    )]
    IncompatibleClause {
        clause: &'static str,
        method: String,
    },

    #[error("Malformed statement input: {0}")]
    #[diagnostic(
        code(fluentq::malformed_input),
        help("Check the nesting and column/value alignment of the provided rows")
    )]
    MalformedInput(String),

    #[error("Statement execution failed{}: {source}", row_suffix(.row))]
    #[diagnostic(
        code(fluentq::execution),
        help("The failing statement text is attached for diagnosis")
    )]
    Execution {
        sql: String,
        row: Option<usize>,
        source: rusqlite::Error,
    },
}

impl Error {
    pub(crate) fn execution(sql: &str, row: Option<usize>, source: rusqlite::Error) -> Self {
        Error::Execution {
            sql: sql.to_string(),
            row,
            source,
        }
    }
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(i) => format!(" at row {i}"),
        None => String::new(),
    }
}

/// Result type alias for fluentq operations.
pub type Result<T> = std::result::Result<T, Error>;
