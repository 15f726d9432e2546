//! Notion as a second article source.

mod api_types;
mod articles;
mod client;
mod preface;
mod types;

pub use articles::{ArticleNode, NotionArticles, DEFAULT_SECTION_PREFIX, TREE_CACHE_KEY};
pub use client::{NotionClient, DEFAULT_API_URL, NOTION_VERSION};
pub use preface::NotionPreface;
pub use types::{ContentBlock, PageRef, PrefacePage, TextSpan};
