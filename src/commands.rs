//! Command-line surface. Every command prints JSON on stdout.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::content::{ArticleDraft, BookHeaderDraft, ChapterDraft};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Enabled books with their enabled headers and chapters
  Books {
    /// Every book, newest first, enabled or not
    #[arg(long)]
    all: bool,
  },
  /// Manage a single book
  Book {
    #[command(subcommand)]
    action: BookAction,
  },
  /// Chapters of a book, in reading order
  Chapters {
    #[command(subcommand)]
    action: RankedAction,
  },
  /// Headers of a book, in reading order
  Headers {
    #[command(subcommand)]
    action: RankedAction,
  },
  Articles {
    #[command(subcommand)]
    action: ArticleAction,
  },
  Categories {
    #[command(subcommand)]
    action: CategoryAction,
  },
  /// Images in the media bucket
  Media {
    /// Bucket to work in (defaults to the configured one)
    #[arg(long, global = true)]
    bucket: Option<String>,
    #[command(subcommand)]
    action: MediaAction,
  },
  Notion {
    #[command(subcommand)]
    action: NotionAction,
  },
  Auth {
    #[command(subcommand)]
    action: AuthAction,
  },
  /// Trigger the configured webhook
  Webhook,
  /// Random landscape photo, refreshed once a day
  ImageOfTheDay,
}

#[derive(Subcommand, Debug)]
pub enum BookAction {
  Show { id: String },
  Create { name: String },
  Update {
    id: String,
    name: String,
    #[arg(long)]
    disabled: bool,
  },
  Delete { id: String },
}

/// Operations shared by chapters and headers.
#[derive(Subcommand, Debug)]
pub enum RankedAction {
  List { book_id: String },
  Show { id: String },
  /// Append at the end of the book
  Add {
    book_id: String,
    #[command(flatten)]
    fields: RankedFields,
  },
  Update {
    book_id: String,
    id: String,
    #[command(flatten)]
    fields: RankedFields,
  },
  Remove { book_id: String, id: String },
  /// Give the listed ids ranks 1..n in the given order
  Reorder {
    book_id: String,
    #[arg(required = true)]
    ids: Vec<String>,
  },
}

#[derive(Args, Debug, Clone)]
pub struct RankedFields {
  pub name: String,
  #[arg(long)]
  pub text: Option<String>,
  #[arg(long)]
  pub image_url: Option<String>,
  #[arg(long)]
  pub disabled: bool,
}

impl From<RankedFields> for ChapterDraft {
  fn from(fields: RankedFields) -> Self {
    Self {
      chapter_name: fields.name,
      chapter_text: fields.text,
      enable: !fields.disabled,
      book_chapter_image_url: fields.image_url,
    }
  }
}

impl From<RankedFields> for BookHeaderDraft {
  fn from(fields: RankedFields) -> Self {
    Self {
      book_header_name: fields.name,
      book_header_text: fields.text,
      enable: !fields.disabled,
      book_header_image_url: fields.image_url,
    }
  }
}

#[derive(Subcommand, Debug)]
pub enum ArticleAction {
  /// Enabled, featured articles
  Featured,
  /// Enabled, non-featured articles
  Published,
  ByCategory { category_id: String },
  /// Every article, newest first
  All,
  Show { id: String },
  Create {
    #[command(flatten)]
    fields: ArticleFields,
  },
  Update {
    id: String,
    #[command(flatten)]
    fields: ArticleFields,
  },
  Delete { id: String },
}

#[derive(Args, Debug, Clone)]
pub struct ArticleFields {
  pub name: String,
  #[arg(long)]
  pub text: Option<String>,
  #[arg(long)]
  pub image_url: Option<String>,
  #[arg(long)]
  pub featured: bool,
  #[arg(long)]
  pub disabled: bool,
  #[arg(long)]
  pub category: Option<String>,
}

impl From<ArticleFields> for ArticleDraft {
  fn from(fields: ArticleFields) -> Self {
    Self {
      article_name: fields.name,
      article_text: fields.text,
      article_image_url: fields.image_url,
      article_featured: fields.featured,
      enable: !fields.disabled,
      article_catagory_id: fields.category,
    }
  }
}

#[derive(Subcommand, Debug)]
pub enum CategoryAction {
  /// Categories with at least one published article
  List,
  /// Every category, by name
  All,
  Create { name: String },
  Update { id: String, name: String },
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum MediaAction {
  List {
    #[arg(long, default_value = "")]
    folder: String,
  },
  Upload {
    #[arg(required = true)]
    files: Vec<PathBuf>,
    #[arg(long, default_value = "")]
    folder: String,
    /// Stored file name (single file only)
    #[arg(long)]
    name: Option<String>,
  },
  Delete {
    #[arg(required = true)]
    paths: Vec<String>,
  },
  Url { path: String },
  /// Time-limited URL for a private bucket
  Sign {
    path: String,
    #[arg(long)]
    expires_in: Option<u64>,
  },
  /// Images whose name contains the term
  Search {
    term: String,
    #[arg(long, default_value = "")]
    folder: String,
  },
  /// Total size of the images in a folder
  Usage {
    #[arg(long, default_value = "")]
    folder: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum NotionAction {
  /// Section and article pages under the main page
  Articles,
  /// A preface page's title and blocks
  Preface {
    /// Defaults to the configured preface page
    page_id: Option<String>,
    /// Also load every remaining page of blocks
    #[arg(long)]
    all: bool,
  },
  /// Raw page and block JSON, uncached
  Blocks { page_id: String },
}

#[derive(Subcommand, Debug)]
pub enum AuthAction {
  /// Sign in; the password is read from stdin when not given
  SignIn {
    email: String,
    #[arg(long)]
    password: Option<String>,
  },
  SignOut,
  /// The signed-in user according to the auth service
  Whoami,
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(subcommand)]
    command: Command,
  }

  #[test]
  fn test_reorder_collects_ids() {
    let cli = Cli::parse_from(["quire", "chapters", "reorder", "b1", "c3", "c1", "c2"]);
    match cli.command {
      Command::Chapters {
        action: RankedAction::Reorder { book_id, ids },
      } => {
        assert_eq!(book_id, "b1");
        assert_eq!(ids, vec!["c3", "c1", "c2"]);
      }
      other => panic!("unexpected command: {:?}", other),
    }
  }

  #[test]
  fn test_ranked_fields_map_to_drafts() {
    let cli = Cli::parse_from([
      "quire", "headers", "add", "b1", "Proloog", "--text", "Eerst", "--disabled",
    ]);
    let Command::Headers {
      action: RankedAction::Add { fields, .. },
    } = cli.command
    else {
      panic!("expected headers add");
    };
    let draft = BookHeaderDraft::from(fields.clone());
    assert_eq!(draft.book_header_name, "Proloog");
    assert_eq!(draft.book_header_text.as_deref(), Some("Eerst"));
    assert!(!draft.enable);
    assert!(!ChapterDraft::from(fields).enable);
  }

  #[test]
  fn test_media_bucket_is_global() {
    let cli = Cli::parse_from([
      "quire", "media", "list", "--folder", "covers", "--bucket", "private",
    ]);
    match cli.command {
      Command::Media {
        bucket,
        action: MediaAction::List { folder },
      } => {
        assert_eq!(bucket.as_deref(), Some("private"));
        assert_eq!(folder, "covers");
      }
      other => panic!("unexpected command: {:?}", other),
    }
  }

  #[test]
  fn test_image_of_the_day_name() {
    let cli = Cli::parse_from(["quire", "image-of-the-day"]);
    assert!(matches!(cli.command, Command::ImageOfTheDay));
  }
}
