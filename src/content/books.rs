//! Books, plus the ranked chapter and header tables under each book.

use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use super::keys::{ContentQuery, Listing};
use super::ordered::{OrderedCollection, OrderedItem};
use super::types::{Book, BookDraft, BookHeader, BookHeaderDraft, BookPatch, Chapter, ChapterDraft};
use crate::backend::{decode_row, decode_rows, to_row, Filter, Select, TableBackend};
use crate::cache::CacheResult;
use crate::error::{Error, Result};
use crate::refresh::Refresher;
use crate::state::StatusHandle;

pub type ChapterStore = OrderedCollection<Chapter>;
pub type HeaderStore = OrderedCollection<BookHeader>;

impl OrderedItem for Chapter {
  type Draft = ChapterDraft;
  const TABLE: &'static str = "chapter";
  const PARENT_COLUMN: &'static str = "book_id";

  fn id(&self) -> &str {
    &self.id
  }

  fn rank(&self) -> i64 {
    self.sort_order
  }
}

impl OrderedItem for BookHeader {
  type Draft = BookHeaderDraft;
  const TABLE: &'static str = "book_header";
  const PARENT_COLUMN: &'static str = "book_id";

  fn id(&self) -> &str {
    &self.id
  }

  fn rank(&self) -> i64 {
    self.sort_order
  }
}

const BOOK_COLUMNS: &str = "
  id,
  book_name,
  created_at,
  enable,
  book_image (
    id,
    book_image_url
  ),
  book_header (
    id,
    book_header_name,
    book_header_text,
    book_header_image_url,
    enable,
    sort_order
  ),
  chapter (
    id,
    chapter_name,
    chapter_text,
    book_chapter_image_url,
    enable,
    sort_order,
    created_at
  )";

/// Embedded relations come back unordered; put them in rank order.
fn sort_relations(book: &mut Book) {
  book.chapters.sort_by_key(|c| c.sort_order);
  book.headers.sort_by_key(|h| h.sort_order);
}

pub struct BookStore {
  backend: Arc<dyn TableBackend>,
  refresher: Refresher,
  books: Mutex<Vec<Book>>,
  status: StatusHandle,
}

impl BookStore {
  pub fn new(backend: Arc<dyn TableBackend>, refresher: Refresher) -> Self {
    Self {
      backend,
      refresher,
      books: Mutex::new(Vec::new()),
      status: StatusHandle::new(),
    }
  }

  /// Books from the last admin listing.
  pub fn books(&self) -> Vec<Book> {
    self.books.lock().unwrap_or_else(|p| p.into_inner()).clone()
  }

  pub fn status(&self) -> &StatusHandle {
    &self.status
  }

  /// Every book, newest first, with images, headers and chapters.
  pub async fn fetch_books(&self) -> Result<Vec<Book>> {
    self.status.track(self.load()).await
  }

  pub async fn fetch_book(&self, book_id: &str) -> Result<Book> {
    self
      .status
      .track(async {
        let row = self
          .backend
          .select_one(&Select::from("book").columns(BOOK_COLUMNS).eq("id", book_id))
          .await
          .inspect_err(|e| error!(target: "books", book_id, error = %e, "fetch failed"))?;
        let mut book: Book = decode_row(row)?;
        sort_relations(&mut book);
        Ok(book)
      })
      .await
  }

  pub async fn create_book(&self, draft: &BookDraft) -> Result<Book> {
    let book = self
      .status
      .track(async {
        let row = self.backend.insert("book", to_row(draft)?).await?;
        let book: Book = decode_row(row)?;
        info!(target: "books", id = %book.id, name = %book.book_name, "created");
        Ok::<_, Error>(book)
      })
      .await?;

    self.reload_after_write().await;
    Ok(book)
  }

  pub async fn update_book(&self, book_id: &str, patch: &BookPatch) -> Result<()> {
    self
      .status
      .track(async {
        self
          .backend
          .update("book", &[Filter::eq("id", book_id)], to_row(patch)?)
          .await?;
        info!(target: "books", book_id, enable = patch.enable, "updated");
        Ok(())
      })
      .await
  }

  pub async fn delete_book(&self, book_id: &str) -> Result<()> {
    self
      .status
      .track(async {
        self
          .backend
          .delete("book", &[Filter::eq("id", book_id)])
          .await?;
        info!(target: "books", book_id, "deleted");
        Ok::<_, Error>(())
      })
      .await?;

    self.reload_after_write().await;
    Ok(())
  }

  /// Books readers may see, oldest first, with only enabled chapters and
  /// headers. Served from the cache while fresh.
  pub async fn enabled_books(&self) -> Result<CacheResult<Vec<Book>>> {
    let query = ContentQuery::EnabledBooks;
    let key = query.cache_key();
    let max_age = self.refresher.cache().max_age();

    let result = self
      .status
      .track(self.refresher.get_or_refresh(&key, max_age, || async {
        let select = Select::from("book")
          .columns(BOOK_COLUMNS)
          .eq("enable", true)
          .order("created_at", true);
        let mut books: Vec<Book> = decode_rows(self.backend.select(&select).await?)?;
        for book in &mut books {
          book.chapters.retain(|c| c.enable);
          book.headers.retain(|h| h.enable);
          sort_relations(book);
        }
        Ok(Listing { items: books })
      }))
      .await?;

    debug!(target: "books", query = %query.description(), source = ?result.source, "served");
    Ok(result.map(|listing| listing.items))
  }

  /// Refetch the admin listing after a completed write. A failure is
  /// recorded on the status; the write's own result stands.
  async fn reload_after_write(&self) {
    if let Err(e) = self.fetch_books().await {
      warn!(target: "books", error = %e, "refetch after write failed");
    }
  }

  async fn load(&self) -> Result<Vec<Book>> {
    let select = Select::from("book")
      .columns(BOOK_COLUMNS)
      .order("created_at", false);
    let rows = self
      .backend
      .select(&select)
      .await
      .inspect_err(|e| error!(target: "books", error = %e, "fetch failed"))?;

    let mut books: Vec<Book> = decode_rows(rows)?;
    books.iter_mut().for_each(sort_relations);
    debug!(target: "books", count = books.len(), "fetched");
    *self.books.lock().unwrap_or_else(|p| p.into_inner()) = books.clone();
    Ok(books)
  }
}
