//! Publishing content stored in the table backend.
//!
//! Each store owns its last fetched rows and a [`StatusHandle`](crate::state::StatusHandle).
//! Admin operations always go to the backend; public listings go through
//! the cache-or-fetch [`Refresher`](crate::refresh::Refresher).

mod articles;
mod books;
mod categories;
mod keys;
mod ordered;
mod types;

pub use articles::ArticleStore;
pub use books::{BookStore, ChapterStore, HeaderStore};
pub use categories::CategoryStore;
pub use keys::ContentQuery;
pub use ordered::{OrderedCollection, OrderedItem};
pub use types::*;
