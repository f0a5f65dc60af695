//! Shape analysis for loosely-structured statement input.
//!
//! `select`, `insert` and `update` accept their attributes and values at
//! several nesting depths and decide between single and batch execution from
//! the shape alone, with no explicit flag from the caller. [`Input`] models
//! that nested structure and the free functions here classify it.

use rusqlite::types::Value;

use crate::error::{Error, Result};

/// Execution strategy inferred from input shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Single,
    Batch,
}

/// Value layout inferred from input shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Rows are column-to-value maps; binding is by column name.
    Named,
    /// Rows are plain value lists; binding is by position.
    Positional,
}

/// Nested statement input: a scalar, a list of inputs, or a keyed row.
#[derive(Clone, Debug, Default)]
pub enum Input {
    Scalar(Value),
    #[default]
    Empty,
    List(Vec<Input>),
    Map(Vec<(String, Value)>),
}

/// Counts nesting levels by descending into the first element until a
/// non-container is reached. An empty container counts as one level and
/// terminates the descent.
///
/// This is a first-element approximation, not a worst-case maximum over all
/// branches; ragged input may report a smaller depth than its deepest branch.
pub fn dimension_depth(input: &Input) -> usize {
    let mut depth = 0;
    let mut current = input;
    loop {
        match current {
            Input::Scalar(_) => break,
            Input::Empty => {
                depth += 1;
                break;
            }
            Input::Map(_) => {
                depth += 1;
                break;
            }
            Input::List(items) => {
                depth += 1;
                match items.first() {
                    Some(inner) => current = inner,
                    None => break,
                }
            }
        }
    }
    depth
}

/// Returns true when a two-level structure holds keyed rows, judged from the
/// first inner element only.
pub fn is_named_row_set(input: &Input) -> bool {
    match input {
        Input::List(items) => matches!(items.first(), Some(Input::Map(_))),
        _ => false,
    }
}

/// Classifies input into execution mode and value layout in one step, so the
/// inference is testable independently of any builder method.
pub fn classify_shape(input: &Input) -> (Mode, Layout) {
    let layout = if is_named_row_set(input) {
        Layout::Named
    } else {
        Layout::Positional
    };
    let mode = if dimension_depth(input) > 1 {
        Mode::Batch
    } else {
        Mode::Single
    };
    (mode, layout)
}

impl Input {
    pub fn is_empty(&self) -> bool {
        match self {
            Input::Empty => true,
            Input::List(items) => items.is_empty(),
            Input::Map(entries) => entries.is_empty(),
            Input::Scalar(_) => false,
        }
    }

    /// Extracts a flat list of attribute names.
    pub(crate) fn flat_strings(&self) -> Result<Vec<String>> {
        match self {
            Input::Empty => Ok(vec![]),
            Input::List(items) => items
                .iter()
                .map(|item| match item {
                    Input::Scalar(v) => Ok(scalar_text(v)),
                    _ => Err(Error::MalformedInput(
                        "expected a flat list of attribute names".into(),
                    )),
                })
                .collect(),
            _ => Err(Error::MalformedInput(
                "expected a flat list of attribute names".into(),
            )),
        }
    }

    /// Extracts a two-level list of attribute-name sets (batch select input).
    pub(crate) fn string_sets(&self) -> Result<Vec<Vec<String>>> {
        match self {
            Input::List(items) => items.iter().map(|item| item.flat_strings()).collect(),
            _ => Err(Error::MalformedInput(
                "expected a nested list of attribute sets".into(),
            )),
        }
    }

    /// Extracts two-dimensional positional value rows.
    pub(crate) fn value_rows(&self) -> Result<Vec<Vec<Value>>> {
        match self {
            Input::Empty => Ok(vec![]),
            Input::List(items) => items
                .iter()
                .map(|row| match row {
                    Input::List(cells) => cells
                        .iter()
                        .map(|cell| match cell {
                            Input::Scalar(v) => Ok(v.clone()),
                            _ => Err(Error::MalformedInput(
                                "value rows must contain scalars only".into(),
                            )),
                        })
                        .collect(),
                    _ => Err(Error::MalformedInput(
                        "values must be provided as rows of scalars".into(),
                    )),
                })
                .collect(),
            _ => Err(Error::MalformedInput(
                "values must be provided as rows of scalars".into(),
            )),
        }
    }

    /// Extracts a flat value row (single update input).
    pub(crate) fn flat_values(&self) -> Result<Vec<Value>> {
        match self {
            Input::Empty => Ok(vec![]),
            Input::List(items) => items
                .iter()
                .map(|item| match item {
                    Input::Scalar(v) => Ok(v.clone()),
                    _ => Err(Error::MalformedInput("expected a flat value list".into())),
                })
                .collect(),
            _ => Err(Error::MalformedInput("expected a flat value list".into())),
        }
    }

    /// Splits keyed rows into parallel attribute and value rows.
    ///
    /// Rows with differing column counts are rejected; a batch built from
    /// keyed maps binds by name per iteration, so ragged rows would silently
    /// misalign.
    pub(crate) fn split_keyed_rows(&self) -> Result<(Vec<Vec<String>>, Vec<Vec<Value>>)> {
        let rows: Vec<&Vec<(String, Value)>> = match self {
            Input::Map(entries) => vec![entries],
            Input::List(items) => items
                .iter()
                .map(|item| match item {
                    Input::Map(entries) => Ok(entries),
                    _ => Err(Error::MalformedInput(
                        "expected keyed column-to-value rows".into(),
                    )),
                })
                .collect::<Result<_>>()?,
            _ => {
                return Err(Error::MalformedInput(
                    "expected keyed column-to-value rows".into(),
                ))
            }
        };

        if let Some(first) = rows.first() {
            if rows.iter().any(|row| row.len() != first.len()) {
                return Err(Error::MalformedInput(
                    "keyed rows must share an identical column count".into(),
                ));
            }
        }

        let mut attributes = Vec::with_capacity(rows.len());
        let mut values = Vec::with_capacity(rows.len());
        for row in rows {
            attributes.push(row.iter().map(|(k, _)| k.clone()).collect());
            values.push(row.iter().map(|(_, v)| v.clone()).collect());
        }
        Ok((attributes, values))
    }
}

pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(bytes) => bytes.iter().map(|b| format!("{b:02X}")).collect(),
    }
}

impl From<()> for Input {
    fn from(_: ()) -> Self {
        Input::Empty
    }
}

impl From<Vec<&str>> for Input {
    fn from(items: Vec<&str>) -> Self {
        Input::List(
            items
                .into_iter()
                .map(|s| Input::Scalar(Value::Text(s.to_string())))
                .collect(),
        )
    }
}

impl From<Vec<String>> for Input {
    fn from(items: Vec<String>) -> Self {
        Input::List(items.into_iter().map(|s| Input::Scalar(Value::Text(s))).collect())
    }
}

impl From<Vec<Value>> for Input {
    fn from(items: Vec<Value>) -> Self {
        Input::List(items.into_iter().map(Input::Scalar).collect())
    }
}

impl From<Vec<Vec<&str>>> for Input {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        Input::List(rows.into_iter().map(Input::from).collect())
    }
}

impl From<Vec<Vec<String>>> for Input {
    fn from(rows: Vec<Vec<String>>) -> Self {
        Input::List(rows.into_iter().map(Input::from).collect())
    }
}

impl From<Vec<Vec<Value>>> for Input {
    fn from(rows: Vec<Vec<Value>>) -> Self {
        Input::List(rows.into_iter().map(Input::from).collect())
    }
}

impl From<Vec<(&str, Value)>> for Input {
    fn from(entries: Vec<(&str, Value)>) -> Self {
        Input::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

impl From<Vec<Vec<(&str, Value)>>> for Input {
    fn from(rows: Vec<Vec<(&str, Value)>>) -> Self {
        Input::List(rows.into_iter().map(Input::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_counts_one_level() {
        assert_eq!(dimension_depth(&Input::List(vec![])), 1);
        assert_eq!(dimension_depth(&Input::Empty), 1);
    }

    #[test]
    fn depth_follows_first_element() {
        let two = Input::from(vec![vec!["1", "2"], vec!["3", "4"]]);
        assert_eq!(dimension_depth(&two), 2);

        let three = Input::List(vec![Input::from(vec![vec!["1"]])]);
        assert_eq!(dimension_depth(&three), 3);

        let scalar = Input::Scalar(Value::Integer(7));
        assert_eq!(dimension_depth(&scalar), 0);
    }

    #[test]
    fn named_row_set_detection() {
        let named = Input::from(vec![
            vec![("a", Value::Integer(1))],
            vec![("a", Value::Integer(2))],
        ]);
        assert!(is_named_row_set(&named));

        let positional = Input::from(vec![vec!["1", "2"], vec!["3", "4"]]);
        assert!(!is_named_row_set(&positional));

        assert!(!is_named_row_set(&Input::List(vec![])));
    }

    #[test]
    fn classify_combines_mode_and_layout() {
        let named = Input::from(vec![vec![("a", Value::Integer(1))]]);
        assert_eq!(classify_shape(&named), (Mode::Batch, Layout::Named));

        let flat = Input::from(vec!["name", "age"]);
        assert_eq!(classify_shape(&flat), (Mode::Single, Layout::Positional));

        assert_eq!(
            classify_shape(&Input::List(vec![])),
            (Mode::Single, Layout::Positional)
        );
    }

    #[test]
    fn keyed_rows_split_into_parallel_sequences() {
        let rows = Input::from(vec![
            vec![("name", Value::from("ann".to_string())), ("age", Value::Integer(30))],
            vec![("name", Value::from("bo".to_string())), ("age", Value::Integer(40))],
        ]);
        let (attrs, values) = rows.split_keyed_rows().unwrap();
        assert_eq!(attrs, vec![vec!["name", "age"], vec!["name", "age"]]);
        assert_eq!(values[1][1], Value::Integer(40));
    }

    #[test]
    fn ragged_keyed_rows_are_rejected() {
        let rows = Input::from(vec![
            vec![("name", Value::from("ann".to_string())), ("age", Value::Integer(30))],
            vec![("name", Value::from("bo".to_string()))],
        ]);
        assert!(matches!(
            rows.split_keyed_rows(),
            Err(Error::MalformedInput(_))
        ));
    }
}
