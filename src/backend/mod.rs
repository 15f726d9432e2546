//! Remote structured-data backend.
//!
//! The backend is table oriented: projections (with relational embedding
//! written in the select string, e.g. `"id, chapter(id, chapter_name)"`),
//! equality filters, ordering, limit, insert, update and delete. Every call
//! returns a [`Result`]; callers never inspect ad-hoc error fields.

#[cfg(test)]
pub mod memory;
mod project;
mod rest;

pub use project::Project;
pub use rest::RestBackend;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// One row as returned by the backend.
pub type Row = Map<String, Value>;

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
  pub column: String,
  pub value: Value,
}

impl Filter {
  pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
    Self {
      column: column.into(),
      value: value.into(),
    }
  }

  /// Whether `row` satisfies this filter.
  pub fn matches(&self, row: &Row) -> bool {
    row.get(&self.column).unwrap_or(&Value::Null) == &self.value
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
  pub column: String,
  pub ascending: bool,
  /// Sort nulls after every value regardless of direction
  pub nulls_last: bool,
}

/// A select query against one table.
#[derive(Debug, Clone)]
pub struct Select {
  pub table: String,
  pub columns: String,
  pub filters: Vec<Filter>,
  pub order: Vec<Order>,
  pub limit: Option<usize>,
}

impl Select {
  pub fn from(table: impl Into<String>) -> Self {
    Self {
      table: table.into(),
      columns: "*".to_string(),
      filters: Vec::new(),
      order: Vec::new(),
      limit: None,
    }
  }

  /// Projection, including embedded relations.
  pub fn columns(mut self, columns: impl Into<String>) -> Self {
    self.columns = compact_columns(&columns.into());
    self
  }

  pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.filters.push(Filter::eq(column, value));
    self
  }

  pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
    self.order.push(Order {
      column: column.into(),
      ascending,
      nulls_last: false,
    });
    self
  }

  pub fn order_nulls_last(mut self, column: impl Into<String>, ascending: bool) -> Self {
    self.order.push(Order {
      column: column.into(),
      ascending,
      nulls_last: true,
    });
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }
}

/// Client for the table backend.
#[async_trait]
pub trait TableBackend: Send + Sync {
  async fn select(&self, query: &Select) -> Result<Vec<Row>>;

  /// Insert one row and return it as stored (with generated columns).
  async fn insert(&self, table: &str, row: Row) -> Result<Row>;

  async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<()>;

  async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()>;

  /// Fetch exactly one row, failing with [`Error::NotFound`] when there is none.
  async fn select_one(&self, query: &Select) -> Result<Row> {
    let query = query.clone().limit(1);
    self
      .select(&query)
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| Error::NotFound(describe(&query)))
  }
}

/// Decode backend rows into domain values.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
  rows.into_iter().map(decode_row).collect()
}

pub fn decode_row<T: DeserializeOwned>(row: Row) -> Result<T> {
  Ok(serde_json::from_value(Value::Object(row))?)
}

/// Encode a value that serializes to a JSON object as a row.
pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
  match serde_json::to_value(value)? {
    Value::Object(map) => Ok(map),
    _ => Err(Error::UnexpectedResponse(
      "row payload must serialize to an object".to_string(),
    )),
  }
}

/// Render a filter value the way the REST filter syntax expects it.
pub fn filter_literal(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => "null".to_string(),
    other => other.to_string(),
  }
}

fn describe(query: &Select) -> String {
  let filters: Vec<String> = query
    .filters
    .iter()
    .map(|f| format!("{}={}", f.column, filter_literal(&f.value)))
    .collect();
  if filters.is_empty() {
    query.table.clone()
  } else {
    format!("{} where {}", query.table, filters.join(" and "))
  }
}

/// Drop whitespace from a multi-line projection.
fn compact_columns(columns: &str) -> String {
  columns.split_whitespace().collect::<Vec<_>>().join("")
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_select_builder() {
    let query = Select::from("chapter")
      .columns(
        "id,
         chapter_name,
         chapter_image (
           chapter_image_url
         )",
      )
      .eq("book_id", "book-1")
      .order("sort_order", true)
      .limit(5);

    assert_eq!(query.columns, "id,chapter_name,chapter_image(chapter_image_url)");
    assert_eq!(query.filters, vec![Filter::eq("book_id", "book-1")]);
    assert_eq!(query.order[0].column, "sort_order");
    assert_eq!(query.limit, Some(5));
  }

  #[test]
  fn test_filter_matches() {
    let row = json!({"id": 1, "enable": true}).as_object().unwrap().clone();
    assert!(Filter::eq("enable", true).matches(&row));
    assert!(!Filter::eq("enable", false).matches(&row));
    assert!(!Filter::eq("missing", 1).matches(&row));
    assert!(Filter::eq("missing", Value::Null).matches(&row));
  }

  #[test]
  fn test_filter_literal() {
    assert_eq!(filter_literal(&json!("abc")), "abc");
    assert_eq!(filter_literal(&json!(true)), "true");
    assert_eq!(filter_literal(&json!(42)), "42");
    assert_eq!(filter_literal(&Value::Null), "null");
  }

  #[test]
  fn test_describe_query() {
    let query = Select::from("book").eq("id", 7);
    assert_eq!(describe(&query), "book where id=7");
    assert_eq!(describe(&Select::from("book")), "book");
  }
}
