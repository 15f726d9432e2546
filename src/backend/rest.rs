//! Table backend speaking the PostgREST dialect under `/rest/v1`.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::project::Project;
use super::{filter_literal, Filter, Row, Select, TableBackend};
use crate::error::{check_response, Error, Result};

#[derive(Clone)]
pub struct RestBackend {
  project: Project,
}

impl RestBackend {
  pub fn new(project: Project) -> Self {
    Self { project }
  }

  fn table_url(&self, table: &str, filters: &[Filter]) -> Result<Url> {
    let mut url = self.project.url(&format!("rest/v1/{}", table))?;
    {
      let mut pairs = url.query_pairs_mut();
      for filter in filters {
        let condition = match &filter.value {
          Value::Null => "is.null".to_string(),
          value => format!("eq.{}", filter_literal(value)),
        };
        pairs.append_pair(&filter.column, &condition);
      }
    }
    Ok(url)
  }
}

#[async_trait]
impl TableBackend for RestBackend {
  async fn select(&self, query: &Select) -> Result<Vec<Row>> {
    let mut url = self.table_url(&query.table, &query.filters)?;
    {
      let mut pairs = url.query_pairs_mut();
      pairs.append_pair("select", &query.columns);
      if !query.order.is_empty() {
        let order: Vec<String> = query
          .order
          .iter()
          .map(|o| {
            let direction = if o.ascending { "asc" } else { "desc" };
            if o.nulls_last {
              format!("{}.{}.nullslast", o.column, direction)
            } else {
              format!("{}.{}", o.column, direction)
            }
          })
          .collect();
        pairs.append_pair("order", &order.join(","));
      }
      if let Some(limit) = query.limit {
        pairs.append_pair("limit", &limit.to_string());
      }
    }

    debug!(target: "backend", table = %query.table, url = %url, "select");
    let response = self.project.request(Method::GET, url).send().await?;
    let rows: Vec<Row> = check_response(response).await?.json().await?;
    Ok(rows)
  }

  async fn insert(&self, table: &str, row: Row) -> Result<Row> {
    let url = self.table_url(table, &[])?;
    debug!(target: "backend", table, "insert");

    let response = self
      .project
      .request(Method::POST, url)
      .header("Prefer", "return=representation")
      .json(&vec![Value::Object(row)])
      .send()
      .await?;

    let rows: Vec<Row> = check_response(response).await?.json().await?;
    rows
      .into_iter()
      .next()
      .ok_or_else(|| Error::UnexpectedResponse(format!("insert into {} returned no row", table)))
  }

  async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> Result<()> {
    let url = self.table_url(table, filters)?;
    debug!(target: "backend", table, url = %url, "update");

    let response = self
      .project
      .request(Method::PATCH, url)
      .header("Prefer", "return=minimal")
      .json(&Value::Object(patch))
      .send()
      .await?;
    check_response(response).await?;
    Ok(())
  }

  async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
    let url = self.table_url(table, filters)?;
    debug!(target: "backend", table, url = %url, "delete");

    let response = self.project.request(Method::DELETE, url).send().await?;
    check_response(response).await?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{body_json, header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn backend(server: &MockServer) -> RestBackend {
    RestBackend::new(Project::new(&server.uri(), "anon-key").unwrap())
  }

  #[tokio::test]
  async fn test_select_builds_postgrest_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/chapter"))
      .and(query_param("book_id", "eq.book-1"))
      .and(query_param("select", "*"))
      .and(query_param("order", "sort_order.asc"))
      .and(header("apikey", "anon-key"))
      .and(header("authorization", "Bearer anon-key"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"id": "c1", "sort_order": 1},
        {"id": "c2", "sort_order": 2}
      ])))
      .mount(&server)
      .await;

    let rows = backend(&server)
      .await
      .select(
        &Select::from("chapter")
          .eq("book_id", "book-1")
          .order("sort_order", true),
      )
      .await
      .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["id"], "c2");
  }

  #[tokio::test]
  async fn test_nulls_last_ordering() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/chapter"))
      .and(query_param("order", "sort_order.desc.nullslast"))
      .and(query_param("limit", "1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"sort_order": 4}])))
      .expect(1)
      .mount(&server)
      .await;

    let rows = backend(&server)
      .await
      .select(
        &Select::from("chapter")
          .order_nulls_last("sort_order", false)
          .limit(1),
      )
      .await
      .unwrap();
    assert_eq!(rows[0]["sort_order"], 4);
  }

  #[tokio::test]
  async fn test_access_token_replaces_anon_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/book"))
      .and(header("authorization", "Bearer user-jwt"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .mount(&server)
      .await;

    let backend = backend(&server).await;
    backend
      .project
      .set_access_token(Some("user-jwt".to_string()));
    let rows = backend.select(&Select::from("book")).await.unwrap();
    assert!(rows.is_empty());
  }

  #[tokio::test]
  async fn test_insert_returns_representation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/rest/v1/book"))
      .and(header("prefer", "return=representation"))
      .and(body_json(json!([{"book_name": "Dagboek"}])))
      .respond_with(
        ResponseTemplate::new(201).set_body_json(json!([{"id": 9, "book_name": "Dagboek"}])),
      )
      .mount(&server)
      .await;

    let mut row = Row::new();
    row.insert("book_name".to_string(), json!("Dagboek"));
    let inserted = backend(&server).await.insert("book", row).await.unwrap();
    assert_eq!(inserted["id"], 9);
  }

  #[tokio::test]
  async fn test_update_and_delete_use_filters() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
      .and(path("/rest/v1/chapter"))
      .and(query_param("id", "eq.c1"))
      .and(body_json(json!({"sort_order": 2})))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("DELETE"))
      .and(path("/rest/v1/chapter"))
      .and(query_param("id", "eq.c1"))
      .respond_with(ResponseTemplate::new(204))
      .expect(1)
      .mount(&server)
      .await;

    let backend = backend(&server).await;
    let mut patch = Row::new();
    patch.insert("sort_order".to_string(), json!(2));
    backend
      .update("chapter", &[Filter::eq("id", "c1")], patch)
      .await
      .unwrap();
    backend
      .delete("chapter", &[Filter::eq("id", "c1")])
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_error_body_becomes_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/article"))
      .respond_with(
        ResponseTemplate::new(400)
          .set_body_json(json!({"message": "column article.nope does not exist"})),
      )
      .mount(&server)
      .await;

    let err = backend(&server)
      .await
      .select(&Select::from("article"))
      .await
      .unwrap_err();
    match err {
      Error::Backend { status, message } => {
        assert_eq!(status, 400);
        assert_eq!(message, "column article.nope does not exist");
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_select_one_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/rest/v1/book"))
      .and(query_param("limit", "1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
      .mount(&server)
      .await;

    let err = backend(&server)
      .await
      .select_one(&Select::from("book").eq("id", 3))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }
}
