//! # Query Model
//!
//! Structured queries over the document store.
//!
//! A [`Query`] names a collection and carries a closed set of field
//! filters plus optional ordering, a cursor, and a limit. Filters compare
//! against JSON fields of the document payload, so the set is fixed to
//! what the storage layer can evaluate with json_extract:
//!
//! - [`Filter::Eq`] - field equals a value
//! - [`Filter::Range`] - field between two values (inclusive)
//! - [`Filter::ArrayContains`] - a JSON array field contains a value
//!
//! Cursors are plain field values (epoch-millisecond integers in
//! practice): `start_after` resumes strictly past the cursor in the sort
//! direction, and is only meaningful together with `order_by`.

use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Sort direction for ordered queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest value first
    Ascending,
    /// Largest value first
    Descending,
}

impl SortDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }

    /// Comparison operator that moves strictly past a cursor value.
    fn cursor_op(&self) -> &'static str {
        match self {
            SortDirection::Ascending => ">",
            SortDirection::Descending => "<",
        }
    }
}

/// A single field predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value
    Eq(String, Value),
    /// Field lies within [lo, hi], both ends inclusive
    Range(String, Value, Value),
    /// A JSON array field contains the value
    ArrayContains(String, Value),
}

/// A query against one collection
///
/// Built with chained calls and handed to the database:
///
/// ```ignore
/// let pending = Query::collection("friendRequests")
///     .where_eq("targetUid", uid)
///     .where_eq("status", "pending")
///     .order_by("createdAt", SortDirection::Descending);
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    collection: String,
    filters: Vec<Filter>,
    order: Option<(String, SortDirection)>,
    start_after: Option<Value>,
    limit: Option<usize>,
}

impl Query {
    /// Start a query over the named collection
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order: None,
            start_after: None,
            limit: None,
        }
    }

    /// The collection this query reads
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Add an arbitrary filter
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an equality filter
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }

    /// Add an inclusive range filter
    pub fn where_range(
        self,
        field: impl Into<String>,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> Self {
        self.filter(Filter::Range(field.into(), lo.into(), hi.into()))
    }

    /// Add an array-membership filter
    pub fn where_array_contains(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::ArrayContains(field.into(), value.into()))
    }

    /// Order results by a field
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order = Some((field.into(), direction));
        self
    }

    /// Resume strictly past this value of the ordering field
    ///
    /// Ignored unless `order_by` is also set.
    pub fn start_after(mut self, cursor: impl Into<Value>) -> Self {
        self.start_after = Some(cursor.into());
        self
    }

    /// Cap the number of returned documents
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Compile to SQL over the documents table
    ///
    /// Field paths, filter values, the cursor, and the limit are all bound
    /// as parameters; no caller-supplied text is spliced into the SQL.
    pub(crate) fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let mut sql =
            String::from("SELECT id, data, updated_at FROM documents WHERE collection = ?");
        let mut params: Vec<SqlValue> = vec![SqlValue::Text(self.collection.clone())];

        for filter in &self.filters {
            match filter {
                Filter::Eq(field, value) => {
                    sql.push_str(" AND json_extract(data, ?) = ?");
                    params.push(field_path(field));
                    params.push(sql_value(value));
                }
                Filter::Range(field, lo, hi) => {
                    sql.push_str(" AND json_extract(data, ?) >= ? AND json_extract(data, ?) <= ?");
                    params.push(field_path(field));
                    params.push(sql_value(lo));
                    params.push(field_path(field));
                    params.push(sql_value(hi));
                }
                Filter::ArrayContains(field, value) => {
                    sql.push_str(
                        " AND EXISTS (SELECT 1 FROM json_each(documents.data, ?) AS entries \
                         WHERE entries.value = ?)",
                    );
                    params.push(field_path(field));
                    params.push(sql_value(value));
                }
            }
        }

        if let Some((field, direction)) = &self.order {
            if let Some(cursor) = &self.start_after {
                sql.push_str(" AND json_extract(data, ?) ");
                sql.push_str(direction.cursor_op());
                sql.push_str(" ?");
                params.push(field_path(field));
                params.push(sql_value(cursor));
            }

            sql.push_str(" ORDER BY json_extract(data, ?) ");
            sql.push_str(direction.as_sql());
            params.push(field_path(field));
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(SqlValue::Integer(limit as i64));
        }

        (sql, params)
    }
}

/// json_extract path for a field name, bound as a parameter
fn field_path(field: &str) -> SqlValue {
    SqlValue::Text(format!("$.{}", field))
}

/// Convert a JSON value to its SQL binding
///
/// Booleans bind as 0/1 because json_extract yields integers for JSON
/// booleans. Nested arrays/objects bind as their canonical JSON text,
/// matching what json_extract returns for them.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn placeholder_count(sql: &str) -> usize {
        sql.matches('?').count()
    }

    #[test]
    fn test_bare_query_selects_collection() {
        let (sql, params) = Query::collection("friendRequests").to_sql();
        assert!(sql.starts_with("SELECT id, data, updated_at FROM documents"));
        assert!(sql.contains("collection = ?"));
        assert_eq!(params.len(), 1);
        assert_eq!(params[0], SqlValue::Text("friendRequests".into()));
    }

    #[test]
    fn test_placeholders_match_params() {
        let (sql, params) = Query::collection("friendRequests")
            .where_eq("targetUid", "u1")
            .where_eq("status", "pending")
            .where_range("createdAt", 100, 200)
            .where_array_contains("tags", "vip")
            .order_by("createdAt", SortDirection::Descending)
            .start_after(150)
            .limit(20)
            .to_sql();
        assert_eq!(placeholder_count(&sql), params.len());
    }

    #[test]
    fn test_eq_filter_binds_field_path() {
        let (sql, params) = Query::collection("c").where_eq("status", "pending").to_sql();
        assert!(sql.contains("json_extract(data, ?) = ?"));
        assert_eq!(params[1], SqlValue::Text("$.status".into()));
        assert_eq!(params[2], SqlValue::Text("pending".into()));
    }

    #[test]
    fn test_bool_values_bind_as_integers() {
        let (_, params) = Query::collection("c").where_eq("isBlocked", true).to_sql();
        assert_eq!(params[2], SqlValue::Integer(1));
    }

    #[test]
    fn test_cursor_direction_flips_operator() {
        let (desc, _) = Query::collection("c")
            .order_by("lastInteractionAt", SortDirection::Descending)
            .start_after(1000)
            .to_sql();
        assert!(desc.contains("json_extract(data, ?) < ?"));
        assert!(desc.contains("ORDER BY json_extract(data, ?) DESC"));

        let (asc, _) = Query::collection("c")
            .order_by("createdAt", SortDirection::Ascending)
            .start_after(1000)
            .to_sql();
        assert!(asc.contains("json_extract(data, ?) > ?"));
        assert!(asc.contains("ORDER BY json_extract(data, ?) ASC"));
    }

    #[test]
    fn test_cursor_without_order_is_ignored() {
        let (sql, params) = Query::collection("c").start_after(1000).to_sql();
        assert!(!sql.contains('<'));
        assert!(!sql.contains('>'));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_range_filter_is_inclusive() {
        let (sql, params) = Query::collection("c").where_range("until", 10, 20).to_sql();
        assert!(sql.contains(">= ?"));
        assert!(sql.contains("<= ?"));
        assert_eq!(params[2], SqlValue::Integer(10));
        assert_eq!(params[4], SqlValue::Integer(20));
    }

    #[test]
    fn test_array_contains_uses_json_each() {
        let (sql, _) = Query::collection("c")
            .where_array_contains("participants", "u1")
            .to_sql();
        assert!(sql.contains("json_each(documents.data, ?)"));
    }

    #[test]
    fn test_limit_binds_as_parameter() {
        let (sql, params) = Query::collection("c").limit(20).to_sql();
        assert!(sql.ends_with("LIMIT ?"));
        assert_eq!(params[1], SqlValue::Integer(20));
    }

    #[test]
    fn test_nested_values_bind_as_json_text() {
        let (_, params) = Query::collection("c")
            .where_eq("meta", json!({"a": 1}))
            .to_sql();
        assert_eq!(params[2], SqlValue::Text("{\"a\":1}".into()));
    }
}
