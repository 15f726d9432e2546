use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::api_types::{ApiBlock, ApiBlockList, ApiPage};
use crate::error::{check_response, Error, Result};

pub const DEFAULT_API_URL: &str = "https://api.notion.com/v1/";
pub const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: &str = "100";

/// Notion API client wrapper
#[derive(Clone)]
pub struct NotionClient {
  http: Client,
  base_url: Url,
  token: String,
}

impl NotionClient {
  pub fn new(api_url: &str, token: impl Into<String>) -> Result<Self> {
    let normalized = if api_url.ends_with('/') {
      api_url.to_string()
    } else {
      format!("{}/", api_url)
    };
    let base_url = Url::parse(&normalized)
      .map_err(|e| Error::validation(format!("Invalid Notion API URL '{}': {}", api_url, e)))?;
    let http = Client::builder()
      .timeout(Duration::from_secs(30))
      .user_agent(concat!("quire/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self {
      http,
      base_url,
      token: token.into().trim().to_string(),
    })
  }

  async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
    let url = self
      .base_url
      .join(path)
      .map_err(|e| Error::validation(format!("Invalid Notion path '{}': {}", path, e)))?;
    debug!(target: "notion", url = %url, "GET");

    let response = self
      .http
      .get(url)
      .query(query)
      .bearer_auth(&self.token)
      .header("Notion-Version", NOTION_VERSION)
      .send()
      .await?;
    Ok(check_response(response).await?.json().await?)
  }

  /// Get a page's metadata and properties
  pub async fn retrieve_page(&self, page_id: &str) -> Result<ApiPage> {
    self.get(&format!("pages/{}", page_id), &[]).await
  }

  /// One page of a block's children, starting at `cursor`
  pub async fn list_children(&self, block_id: &str, cursor: Option<&str>) -> Result<ApiBlockList> {
    let path = format!("blocks/{}/children", block_id);
    match cursor {
      Some(cursor) => {
        self
          .get(&path, &[("page_size", PAGE_SIZE), ("start_cursor", cursor)])
          .await
      }
      None => self.get(&path, &[("page_size", PAGE_SIZE)]).await,
    }
  }

  /// Every child of a block, following the cursor until the last page
  pub async fn list_all_children(&self, block_id: &str) -> Result<Vec<ApiBlock>> {
    let mut all_blocks = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
      let page = self.list_children(block_id, cursor.as_deref()).await?;
      all_blocks.extend(page.results);

      match page.next_cursor {
        Some(next) if page.has_more => cursor = Some(next),
        _ => break,
      }
    }

    debug!(target: "notion", block_id, count = all_blocks.len(), "listed children");
    Ok(all_blocks)
  }

  /// Child pages of a page, in document order
  pub async fn child_pages(&self, page_id: &str) -> Result<Vec<super::PageRef>> {
    Ok(
      self
        .list_all_children(page_id)
        .await?
        .into_iter()
        .filter_map(ApiBlock::into_child_page)
        .collect(),
    )
  }

  /// Raw page object and its raw top-level blocks
  pub async fn page_with_blocks(&self, page_id: &str) -> Result<(Value, Vec<Value>)> {
    let page: Value = self.get(&format!("pages/{}", page_id), &[]).await?;
    let blocks: Value = self
      .get(
        &format!("blocks/{}/children", page_id),
        &[("page_size", PAGE_SIZE)],
      )
      .await?;
    let results = blocks
      .get("results")
      .and_then(Value::as_array)
      .cloned()
      .ok_or_else(|| Error::UnexpectedResponse("block list without results".to_string()))?;
    Ok((page, results))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{header, method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[tokio::test]
  async fn test_headers_and_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/blocks/root/children"))
      .and(query_param("start_cursor", "c2"))
      .and(header("authorization", "Bearer secret"))
      .and(header("notion-version", NOTION_VERSION))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "results": [{"id": "p2", "type": "child_page", "child_page": {"title": "Deel 2"}}],
        "has_more": false,
        "next_cursor": null
      })))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/blocks/root/children"))
      .and(query_param("page_size", "100"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "results": [
          {"id": "p1", "type": "child_page", "child_page": {"title": "Deel 1"}},
          {"id": "x", "type": "paragraph", "paragraph": {"rich_text": []}}
        ],
        "has_more": true,
        "next_cursor": "c2"
      })))
      .mount(&server)
      .await;

    let client = NotionClient::new(&server.uri(), " secret\n").unwrap();
    let pages = client.child_pages("root").await.unwrap();

    let titles: Vec<&str> = pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["Deel 1", "Deel 2"]);
  }

  #[tokio::test]
  async fn test_error_message_from_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/pages/missing"))
      .respond_with(ResponseTemplate::new(404).set_body_json(json!({
        "object": "error",
        "status": 404,
        "message": "Could not find page with ID: missing."
      })))
      .mount(&server)
      .await;

    let client = NotionClient::new(&server.uri(), "secret").unwrap();
    let err = client.retrieve_page("missing").await.unwrap_err();
    assert_eq!(
      err.to_string(),
      "backend returned 404: Could not find page with ID: missing."
    );
  }

  #[tokio::test]
  async fn test_page_with_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/pages/p1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "p1", "object": "page"})))
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/blocks/p1/children"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "results": [{"id": "b1", "type": "divider"}],
        "has_more": false
      })))
      .mount(&server)
      .await;

    let client = NotionClient::new(&server.uri(), "secret").unwrap();
    let (page, blocks) = client.page_with_blocks("p1").await.unwrap();
    assert_eq!(page["object"], "page");
    assert_eq!(blocks.len(), 1);
  }
}
