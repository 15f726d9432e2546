//! In-process table backend with a call log, for tests.

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{Filter, Row, Select, TableBackend};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct MemoryBackend {
  tables: Mutex<HashMap<String, Vec<Row>>>,
  calls: Mutex<Vec<String>>,
  next_id: Mutex<u64>,
  /// Operations whose log line starts with this prefix fail, once the
  /// given number of matching calls has gone through
  fail_prefix: Mutex<Option<(String, usize)>>,
  latency: Option<Duration>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Delay every call, giving concurrent callers a chance to interleave.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = Some(latency);
    self
  }

  pub fn seed(&self, table: &str, rows: Vec<Value>) {
    let mut tables = self.tables.lock().unwrap();
    let entry = tables.entry(table.to_string()).or_default();
    for row in rows {
      if let Value::Object(map) = row {
        entry.push(map);
      }
    }
  }

  /// Every call made so far, as `"<op> <table>"`.
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  pub fn fail_on(&self, prefix: &str) {
    self.fail_after(prefix, 0);
  }

  /// Let `skip` matching calls succeed, then fail every later one.
  pub fn fail_after(&self, prefix: &str, skip: usize) {
    *self.fail_prefix.lock().unwrap() = Some((prefix.to_string(), skip));
  }

  pub fn rows(&self, table: &str) -> Vec<Row> {
    self
      .tables
      .lock()
      .unwrap()
      .get(table)
      .cloned()
      .unwrap_or_default()
  }

  async fn record(&self, op: &str, table: &str) -> Result<()> {
    let line = format!("{} {}", op, table);
    self.calls.lock().unwrap().push(line.clone());
    if let Some(latency) = self.latency {
      tokio::time::sleep(latency).await;
    }
    let failing = match self.fail_prefix.lock().unwrap().as_mut() {
      Some((prefix, skip)) if line.starts_with(prefix.as_str()) => {
        if *skip > 0 {
          *skip -= 1;
          false
        } else {
          true
        }
      }
      _ => false,
    };
    if failing {
      return Err(Error::backend(500, format!("{} failed", line)));
    }
    Ok(())
  }
}

fn is_null(value: Option<&Value>) -> bool {
  matches!(value, None | Some(Value::Null))
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
  match (a, b) {
    (Some(Value::Number(x)), Some(Value::Number(y))) => x
      .as_f64()
      .partial_cmp(&y.as_f64())
      .unwrap_or(Ordering::Equal),
    (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
    (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
    (None | Some(Value::Null), _) => Ordering::Less,
    (_, None | Some(Value::Null)) => Ordering::Greater,
    _ => Ordering::Equal,
  }
}

#[async_trait]
impl TableBackend for MemoryBackend {
  async fn select(&self, query: &Select) -> Result<Vec<Row>> {
    self.record("select", &query.table).await?;
    let tables = self.tables.lock().unwrap();
    let mut rows: Vec<Row> = tables
      .get(&query.table)
      .map(|rows| {
        rows
          .iter()
          .filter(|row| query.filters.iter().all(|f| f.matches(row)))
          .cloned()
          .collect()
      })
      .unwrap_or_default();

    rows.sort_by(|a, b| {
      for order in &query.order {
        let (x, y) = (a.get(&order.column), b.get(&order.column));
        if order.nulls_last {
          match (is_null(x), is_null(y)) {
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            _ => {}
          }
        }
        let ord = compare(x, y);
        let ord = if order.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
          return ord;
        }
      }
      Ordering::Equal
    });

    if let Some(limit) = query.limit {
      rows.truncate(limit);
    }
    Ok(rows)
  }

  async fn insert(&self, table: &str, mut row: Row) -> Result<Row> {
    self.record("insert", table).await?;
    if !row.contains_key("id") {
      let mut next = self.next_id.lock().unwrap();
      *next += 1;
      row.insert("id".to_string(), Value::from(format!("{}-{}", table, *next)));
    }
    row
      .entry("created_at".to_string())
      .or_insert_with(|| Value::from(chrono::Utc::now().to_rfc3339()));

    self
      .tables
      .lock()
      .unwrap()
      .entry(table.to_string())
      .or_default()
      .push(row.clone());
    Ok(row)
  }

  async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<()> {
    self.record("update", table).await?;
    let mut tables = self.tables.lock().unwrap();
    if let Some(rows) = tables.get_mut(table) {
      for row in rows
        .iter_mut()
        .filter(|row| filters.iter().all(|f| f.matches(row)))
      {
        for (column, value) in &patch {
          row.insert(column.clone(), value.clone());
        }
      }
    }
    Ok(())
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
    self.record("delete", table).await?;
    let mut tables = self.tables.lock().unwrap();
    if let Some(rows) = tables.get_mut(table) {
      rows.retain(|row| !filters.iter().all(|f| f.matches(row)));
    }
    Ok(())
  }
}
