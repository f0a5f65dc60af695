//! SQLite statement rendering.
//!
//! Each clause renders independently from builder state; `to_statement_text`
//! assembles them in fixed order: method, join, where, group + having,
//! order, limit. Clause/method compatibility is checked here, before any
//! binding or execution happens.

use crate::{
    builder::{JoinSpec, Method, QueryBuilder},
    error::{Error, Result},
};

impl QueryBuilder {
    /// Renders the full statement. Rendering is read-only and idempotent:
    /// two calls without intervening mutation yield identical text.
    pub fn to_statement_text(&self) -> Result<String> {
        let clauses = [
            self.method_clause()?,
            self.join_clause()?,
            self.where_clause()?,
            self.group_clause()?,
            self.order_clause()?,
            self.limit_clause()?,
        ];
        Ok(clauses
            .iter()
            .filter(|clause| !clause.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn method_clause(&self) -> Result<String> {
        if !self.raw_statement.is_empty() {
            return Ok(self.raw_statement.clone());
        }
        match self.method {
            Some(Method::Select) => Ok(self.render_select()),
            Some(Method::Insert) => Ok(self.render_insert()),
            Some(Method::Update) => Ok(self.render_update()),
            Some(Method::Delete) => Ok(format!("DELETE FROM {}", self.table)),
            None => Err(Error::UnsupportedMethod("no method recorded".into())),
        }
    }

    fn render_select(&self) -> String {
        let prefix = format!("{}.", self.table);
        let attributes = self.current_attributes();

        let columns = if attributes.is_empty() {
            format!("{prefix}*")
        } else {
            attributes
                .iter()
                .map(|attr| qualify(&prefix, attr))
                .collect::<Vec<_>>()
                .join(",")
        };

        let aggregation = self.aggregation_text();
        let aggregation = if aggregation.is_empty() {
            String::new()
        } else {
            format!(", {aggregation}")
        };

        let subselects = if self.subselects.is_empty() {
            String::new()
        } else {
            let rendered = self
                .subselects
                .iter()
                .map(|(alias, sql)| format!("({sql}) {alias}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(", {rendered}")
        };

        format!(
            "SELECT {columns}{aggregation} FROM {}{}{subselects}",
            self.from, self.table
        )
    }

    /// Aggregate calls as `func(table.attr)`, comma-joined in call order.
    /// Attributes from other tables are expected to arrive pre-qualified.
    pub(crate) fn aggregation_text(&self) -> String {
        let prefix = format!("{}.", self.table);
        let prefix = prefix.as_str();
        self.aggregations
            .iter()
            .flat_map(|(function, attributes)| {
                attributes
                    .iter()
                    .map(move |attr| format!("{function}({})", qualify(prefix, attr)))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn render_insert(&self) -> String {
        let columns = self.current_attributes();
        if columns.is_empty() {
            // Full rows in table-column order, bound positionally.
            let width = self.value_rows.first().map(Vec::len).unwrap_or(0);
            let placeholders = vec!["?"; width].join(",");
            format!("INSERT INTO {} VALUES ({placeholders})", self.table)
        } else {
            let binds = columns
                .iter()
                .map(|col| format!(":{col}"))
                .collect::<Vec<_>>()
                .join(",");
            format!(
                "INSERT INTO {} ({}) VALUES ({binds})",
                self.table,
                columns.join(",")
            )
        }
    }

    fn render_update(&self) -> String {
        let setters = self
            .current_attributes()
            .iter()
            .map(|col| format!("{col} = :{col}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("UPDATE {} SET {setters}", self.table)
    }

    fn join_clause(&self) -> Result<String> {
        if self.joins.is_empty() {
            return Ok(String::new());
        }
        if self.method != Some(Method::Select) {
            return Err(self.incompatible("JOIN"));
        }
        let mut lines = Vec::new();
        for (kind, specs) in &self.joins {
            for spec in specs {
                lines.push(match spec {
                    JoinSpec::Table(table) => format!("{} JOIN {table}", kind.as_str()),
                    JoinSpec::On {
                        table,
                        left,
                        comparator,
                        right,
                    } => format!(
                        "{} JOIN {table} ON {left} {comparator} {right}",
                        kind.as_str()
                    ),
                });
            }
        }
        Ok(lines.join(" "))
    }

    fn where_clause(&self) -> Result<String> {
        if !self.raw_where.is_empty() {
            if self.method == Some(Method::Insert) {
                return Err(self.incompatible("WHERE"));
            }
            return Ok(self.raw_where.clone());
        }
        if self.where_tree.is_empty() {
            return Ok(String::new());
        }
        if self.method == Some(Method::Insert) {
            return Err(self.incompatible("WHERE"));
        }
        Ok(format!("WHERE {}", self.where_tree.render()))
    }

    fn group_clause(&self) -> Result<String> {
        if self.group_attribute.is_empty() {
            return Ok(String::new());
        }
        if self.method != Some(Method::Select) {
            return Err(self.incompatible("GROUP BY"));
        }
        let mut clause = format!("GROUP BY {}", self.group_attribute);
        if !self.raw_having.is_empty() {
            clause.push(' ');
            clause.push_str(&self.raw_having);
        } else if !self.having_tree.is_empty() {
            clause.push_str(&format!(" HAVING {}", self.having_tree.render()));
        }
        Ok(clause)
    }

    fn order_clause(&self) -> Result<String> {
        if self.order_attributes.is_empty() {
            return Ok(String::new());
        }
        if self.method == Some(Method::Insert) {
            return Err(self.incompatible("ORDER BY"));
        }
        Ok(format!(
            "ORDER BY {} {}",
            self.order_attributes.join(", "),
            if self.order_desc { "DESC" } else { "ASC" }
        ))
    }

    fn limit_clause(&self) -> Result<String> {
        let Some(up) = self.limit_up else {
            return Ok(String::new());
        };
        if self.method == Some(Method::Insert) {
            return Err(self.incompatible("LIMIT"));
        }
        Ok(match self.limit_down {
            Some(down) => format!("LIMIT {up}, {down}"),
            None => format!("LIMIT {up}"),
        })
    }

    fn incompatible(&self, clause: &'static str) -> Error {
        Error::IncompatibleClause {
            clause,
            method: self
                .method
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "unset method".to_string()),
        }
    }
}

/// Prefixes `attr` with the base table unless it already carries a
/// qualifier.
fn qualify(prefix: &str, attr: &str) -> String {
    if attr.contains('.') {
        attr.to_string()
    } else {
        format!("{prefix}{attr}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rusqlite::Connection;

    use super::*;
    use crate::condition::Predicate;

    fn builder() -> QueryBuilder {
        let conn = Connection::open_in_memory().unwrap();
        QueryBuilder::new(Arc::new(Mutex::new(conn)), "users")
    }

    #[test]
    fn select_all_renders_star_with_prefix() {
        let qb = builder().select_all();
        assert_eq!(qb.to_statement_text().unwrap(), "SELECT users.* FROM users");
    }

    #[test]
    fn select_columns_are_table_prefixed() {
        let qb = builder().select(vec!["name", "profiles.bio"]).unwrap();
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "SELECT users.name,profiles.bio FROM users"
        );
    }

    #[test]
    fn rendering_is_idempotent() {
        let qb = builder()
            .select(vec!["name"])
            .unwrap()
            .filter(("age", ">", 18))
            .unwrap()
            .order(["age"], true)
            .limit(10, None);
        let first = qb.to_statement_text().unwrap();
        let second = qb.to_statement_text().unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            "SELECT users.name FROM users WHERE age > 18 ORDER BY age DESC LIMIT 10"
        );
    }

    #[test]
    fn insert_named_uses_named_placeholders() {
        let qb = builder()
            .insert(
                vec!["name", "age"],
                vec![vec!["ann".into(), 30.to_string()]],
            )
            .unwrap();
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "INSERT INTO users (name,age) VALUES (:name,:age)"
        );
    }

    #[test]
    fn insert_positional_uses_question_marks() {
        let qb = builder()
            .insert(vec![vec!["1", "ann", "30"]], ())
            .unwrap();
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "INSERT INTO users VALUES (?,?,?)"
        );
    }

    #[test]
    fn update_always_binds_by_name() {
        let qb = builder()
            .update(vec!["name", "age"], vec!["bo".to_string(), 40.to_string()])
            .unwrap()
            .filter(("id", "=", 1))
            .unwrap();
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "UPDATE users SET name = :name, age = :age WHERE id = '1'"
        );
    }

    #[test]
    fn delete_with_filter() {
        let qb = builder().delete().filter(("id", "=", 7)).unwrap();
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "DELETE FROM users WHERE id = '7'"
        );
    }

    #[test]
    fn group_having_and_aggregation_render_inside_select() {
        let qb = builder()
            .select(vec!["city"])
            .unwrap()
            .avg("age")
            .group("city")
            .having(("avg(age)", ">", 30))
            .unwrap();
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "SELECT users.city, avg(users.age) FROM users GROUP BY city HAVING avg(age) > 30"
        );
    }

    #[test]
    fn joins_render_grouped_by_kind() {
        let qb = builder()
            .select_all()
            .join("profiles", "users.id", "=", "profiles.user_id")
            .cross_join("tags");
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "SELECT users.* FROM users INNER JOIN profiles ON users.id = profiles.user_id CROSS JOIN tags"
        );
    }

    #[test]
    fn subselect_appends_after_base_table() {
        let sub = builder().select(vec!["id"]).unwrap();
        let qb = builder().select_all().subselect(sub, "s").unwrap();
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "SELECT users.* FROM users, (SELECT users.id FROM users) s"
        );
    }

    #[test]
    fn from_subquery_switches_prefix_to_alias() {
        let sub = builder().select(vec!["id", "name"]).unwrap();
        let qb = builder().select(vec!["name"]).unwrap().from(sub, "u").unwrap();
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "SELECT u.name FROM (SELECT users.id,users.name FROM users) u"
        );
    }

    #[test]
    fn nested_filter_group_renders_in_brackets() {
        let qb = builder()
            .select_all()
            .filter(("age", ">", 18))
            .unwrap()
            .filter(Predicate::group(|inner| {
                inner
                    .or_filter(("city", "=", "'x'"))
                    .unwrap()
                    .or_filter(("city", "=", "'y'"))
                    .unwrap()
            }))
            .unwrap();
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "SELECT users.* FROM users WHERE age > 18 AND (city = 'x' OR city = 'y')"
        );
    }

    #[test]
    fn filter_value_may_be_a_subquery() {
        let sub = builder().select(vec!["id"]).unwrap();
        let qb = builder().select_all().filter(("id", "in", sub)).unwrap();
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "SELECT users.* FROM users WHERE id in (SELECT users.id FROM users)"
        );
    }

    #[test]
    fn order_on_insert_is_rejected() {
        let qb = builder()
            .insert(
                vec!["name"],
                vec![vec!["ann".to_string()]],
            )
            .unwrap()
            .order(["name"], false);
        assert!(matches!(
            qb.to_statement_text(),
            Err(Error::IncompatibleClause { clause: "ORDER BY", .. })
        ));
    }

    #[test]
    fn filter_on_insert_is_rejected() {
        let qb = builder()
            .insert(vec!["name"], vec![vec!["ann".to_string()]])
            .unwrap()
            .filter(("id", "=", 1))
            .unwrap();
        assert!(matches!(
            qb.to_statement_text(),
            Err(Error::IncompatibleClause { clause: "WHERE", .. })
        ));
    }

    #[test]
    fn group_outside_select_is_rejected() {
        let qb = builder().delete().group("city");
        assert!(matches!(
            qb.to_statement_text(),
            Err(Error::IncompatibleClause { clause: "GROUP BY", .. })
        ));
    }

    #[test]
    fn missing_method_is_unsupported() {
        let qb = builder();
        assert!(matches!(
            qb.to_statement_text(),
            Err(Error::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn raw_statement_overrides_method_clause() {
        let qb = builder()
            .raw_statement("SELECT count(*) FROM users")
            .limit(5, None);
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "SELECT count(*) FROM users LIMIT 5"
        );
        assert_eq!(qb.method, Some(Method::Select));
    }

    #[test]
    fn raw_where_is_passed_through() {
        let qb = builder().select_all().raw_where("WHERE length(name) > 3");
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "SELECT users.* FROM users WHERE length(name) > 3"
        );
    }

    #[test]
    fn clear_resets_everything_but_the_table() {
        let mut qb = builder()
            .select(vec!["name"])
            .unwrap()
            .filter(("age", ">", 18))
            .unwrap()
            .limit(3, Some(10));
        qb.clear();
        let qb = qb.select_all();
        assert_eq!(qb.to_statement_text().unwrap(), "SELECT users.* FROM users");
    }

    #[test]
    fn limit_renders_offset_form() {
        let qb = builder().select_all().limit(20, Some(10));
        assert_eq!(
            qb.to_statement_text().unwrap(),
            "SELECT users.* FROM users LIMIT 20, 10"
        );
    }
}
