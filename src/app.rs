use color_eyre::{eyre::eyre, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::auth::AuthStore;
use crate::backend::{Project, RestBackend, TableBackend};
use crate::blob::{BlobStorage, RestStorage};
use crate::cache::{ContentCache, KvStorage, MemoryStorage, SqliteStorage};
use crate::commands::{
  ArticleAction, AuthAction, BookAction, CategoryAction, Command, MediaAction, NotionAction,
  RankedAction,
};
use crate::config::Config;
use crate::content::{
  ArticleStore, BookDraft, BookPatch, BookStore, CategoryDraft, CategoryStore, ChapterStore,
  HeaderStore, OrderedCollection, OrderedItem,
};
use crate::media::{format_file_size, MediaManager, UploadFile};
use crate::notion::{NotionArticles, NotionClient, NotionPreface};
use crate::refresh::Refresher;
use crate::unsplash::ImageOfTheDay;
use crate::webhook::WebhookStore;

/// Everything a command needs, built once from the configuration.
pub struct App {
  config: Config,
  http: Client,
  refresher: Refresher,
  books: BookStore,
  chapters: ChapterStore,
  headers: HeaderStore,
  articles: ArticleStore,
  categories: CategoryStore,
  media: MediaManager,
  auth: AuthStore,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let project = Project::new(&config.backend.url, config.anon_key()?)?;
    let http = Client::builder()
      .timeout(Duration::from_secs(30))
      .user_agent(concat!("quire/", env!("CARGO_PKG_VERSION")))
      .build()?;

    let kv: Arc<dyn KvStorage> = if config.cache.enabled {
      Arc::new(SqliteStorage::open(config.cache.path.as_deref())?)
    } else {
      debug!(target: "app", "durable cache disabled, using memory storage");
      Arc::new(MemoryStorage::new())
    };
    let cache = ContentCache::new(kv.clone()).with_max_age(config.cache.max_age()?);
    let refresher =
      Refresher::new(cache).with_timeout(config.cache.timeout_secs.map(Duration::from_secs));

    let backend: Arc<dyn TableBackend> = Arc::new(RestBackend::new(project.clone()));
    let storage: Arc<dyn BlobStorage> = Arc::new(RestStorage::new(project.clone()));

    let media = MediaManager::new(storage).with_max_upload_bytes(config.media.max_upload_bytes);
    media.set_bucket(&config.media.bucket);

    let auth = AuthStore::new(project, kv);
    if let Some(session) = auth.initialize() {
      debug!(target: "app", user_id = %session.user.id, "running as signed-in user");
    }

    Ok(Self {
      books: BookStore::new(backend.clone(), refresher.clone()),
      chapters: OrderedCollection::new(backend.clone()),
      headers: OrderedCollection::new(backend.clone()),
      articles: ArticleStore::new(backend.clone(), refresher.clone()),
      categories: CategoryStore::new(backend, refresher.clone()),
      media,
      auth,
      refresher,
      http,
      config,
    })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Books { all: true } => emit(&self.books.fetch_books().await?),
      Command::Books { all: false } => emit(&self.books.enabled_books().await?),
      Command::Book { action } => self.book(action).await,
      Command::Chapters { action } => ranked(&self.chapters, action).await,
      Command::Headers { action } => ranked(&self.headers, action).await,
      Command::Articles { action } => self.article(action).await,
      Command::Categories { action } => self.category(action).await,
      Command::Media { bucket, action } => {
        if let Some(bucket) = bucket {
          self.media.set_bucket(&bucket);
        }
        self.media_action(action).await
      }
      Command::Notion { action } => self.notion(action).await,
      Command::Auth { action } => self.auth_action(action).await,
      Command::Webhook => {
        let url = self
          .config
          .webhook
          .url
          .as_deref()
          .ok_or_else(|| eyre!("No webhook configured. Set webhook.url in the config file."))?;
        let webhook = WebhookStore::new(self.http.clone(), url);
        emit(&webhook.fetch_webhook_data().await?)
      }
      Command::ImageOfTheDay => {
        let unsplash = ImageOfTheDay::new(
          self.http.clone(),
          &self.config.unsplash.api_url,
          Config::unsplash_key()?,
          self.refresher.clone(),
        )
        .with_query(self.config.unsplash.query.clone());
        emit(&unsplash.fetch_random_image().await?)
      }
    }
  }

  async fn book(&self, action: BookAction) -> Result<()> {
    match action {
      BookAction::Show { id } => emit(&self.books.fetch_book(&id).await?),
      BookAction::Create { name } => {
        emit(&self.books.create_book(&BookDraft { book_name: name }).await?)
      }
      BookAction::Update { id, name, disabled } => {
        let patch = BookPatch {
          book_name: name,
          enable: !disabled,
        };
        self.books.update_book(&id, &patch).await?;
        emit(&self.books.fetch_book(&id).await?)
      }
      BookAction::Delete { id } => {
        self.books.delete_book(&id).await?;
        emit(&json!({ "deleted": id }))
      }
    }
  }

  async fn article(&self, action: ArticleAction) -> Result<()> {
    match action {
      ArticleAction::Featured => emit(&self.articles.featured().await?),
      ArticleAction::Published => emit(&self.articles.published().await?),
      ArticleAction::ByCategory { category_id } => {
        emit(&self.articles.by_category(&category_id).await?)
      }
      ArticleAction::All => emit(&self.articles.fetch_articles().await?),
      ArticleAction::Show { id } => emit(&self.articles.fetch_article(&id).await?),
      ArticleAction::Create { fields } => {
        emit(&self.articles.create_article(&fields.into()).await?)
      }
      ArticleAction::Update { id, fields } => {
        self.articles.update_article(&id, &fields.into()).await?;
        emit(&self.articles.fetch_article(&id).await?)
      }
      ArticleAction::Delete { id } => {
        self.articles.delete_article(&id).await?;
        emit(&json!({ "deleted": id }))
      }
    }
  }

  async fn category(&self, action: CategoryAction) -> Result<()> {
    match action {
      CategoryAction::List => emit(&self.categories.with_published_articles().await?),
      CategoryAction::All => emit(&self.categories.fetch_categories().await?),
      CategoryAction::Create { name } => emit(
        &self
          .categories
          .create_category(&CategoryDraft {
            catagory_name: name,
          })
          .await?,
      ),
      CategoryAction::Update { id, name } => {
        self
          .categories
          .update_category(
            &id,
            &CategoryDraft {
              catagory_name: name,
            },
          )
          .await?;
        emit(&self.categories.fetch_category(&id).await?)
      }
      CategoryAction::Delete { id } => {
        self.categories.delete_category(&id).await?;
        emit(&json!({ "deleted": id }))
      }
    }
  }

  async fn media_action(&self, action: MediaAction) -> Result<()> {
    let media = &self.media;
    match action {
      MediaAction::List { folder } => emit(&media.fetch_images(&folder).await?),
      MediaAction::Upload {
        files,
        folder,
        name,
      } => {
        let mut uploads = Vec::with_capacity(files.len());
        for path in &files {
          uploads.push(UploadFile::from_path(path).await?);
        }
        match uploads.as_slice() {
          [single] => emit(&media.upload_image(single, &folder, name.as_deref()).await?),
          _ if name.is_some() => Err(eyre!("--name only applies to a single file")),
          many => emit(&media.upload_many(many, &folder).await?),
        }
      }
      MediaAction::Delete { paths } => {
        match paths.as_slice() {
          [single] => media.delete_image(single).await?,
          many => media.delete_many(many).await?,
        }
        emit(&json!({ "deleted": paths }))
      }
      MediaAction::Url { path } => emit(&json!({ "url": media.image_url(&path)? })),
      MediaAction::Sign { path, expires_in } => {
        emit(&json!({ "signed_url": media.signed_url(&path, expires_in).await? }))
      }
      MediaAction::Search { term, folder } => {
        media.fetch_images(&folder).await?;
        emit(&media.search(&term))
      }
      MediaAction::Usage { folder } => {
        media.fetch_images(&folder).await?;
        let in_folder = media.in_folder(&folder);
        let total = media.total_size();
        emit(&json!({
          "bucket": media.bucket(),
          "folder": folder,
          "count": in_folder.len(),
          "total_size": total,
          "total_size_human": format_file_size(total),
        }))
      }
    }
  }

  async fn notion(&self, action: NotionAction) -> Result<()> {
    let client = NotionClient::new(&self.config.notion.api_url, Config::notion_token()?)?;
    match action {
      NotionAction::Articles => {
        let main_page_id = self
          .config
          .notion
          .main_page_id
          .clone()
          .ok_or_else(|| eyre!("No Notion main page configured. Set notion.main_page_id."))?;
        let tree = NotionArticles::new(client, self.refresher.clone(), main_page_id)
          .with_section_prefix(&self.config.notion.child_prefix);
        emit(&tree.fetch_articles().await?)
      }
      NotionAction::Preface { page_id, all } => {
        let page_id = page_id
          .or_else(|| self.config.notion.preface_page_id.clone())
          .ok_or_else(|| eyre!("No preface page given or configured (notion.preface_page_id)."))?;
        let preface = NotionPreface::new(client, self.refresher.clone());
        let first = preface.fetch_preface(&page_id).await?;
        if !all {
          return emit(&first);
        }
        emit(&preface.load_remaining(&page_id).await?)
      }
      NotionAction::Blocks { page_id } => {
        let (page, blocks) = client.page_with_blocks(&page_id).await?;
        emit(&json!({ "page": page, "blocks": blocks }))
      }
    }
  }

  async fn auth_action(&self, action: AuthAction) -> Result<()> {
    match action {
      AuthAction::SignIn { email, password } => {
        let password = match password {
          Some(password) => password,
          None => read_password()?,
        };
        let session = self.auth.sign_in(&email, &password).await?;
        info!(target: "app", user_id = %session.user.id, "signed in");
        emit(&session.user)
      }
      AuthAction::SignOut => {
        if let Err(e) = self.auth.sign_out().await {
          warn!(target: "app", error = %e, "signed out locally only");
        }
        emit(&json!({ "signed_out": true }))
      }
      AuthAction::Whoami => match self.auth.current_user() {
        Some(_) => emit(&self.auth.fetch_user().await?),
        None => emit(&json!({ "user": null })),
      },
    }
  }
}

async fn ranked<T>(store: &OrderedCollection<T>, action: RankedAction) -> Result<()>
where
  T: OrderedItem + Serialize,
  T::Draft: From<crate::commands::RankedFields>,
{
  match action {
    RankedAction::List { book_id } => emit(&store.fetch_ordered(Some(&book_id)).await?),
    RankedAction::Show { id } => emit(&store.fetch_one(&id).await?),
    RankedAction::Add { book_id, fields } => emit(&store.append(&book_id, &fields.into()).await?),
    RankedAction::Update {
      book_id,
      id,
      fields,
    } => {
      store.update(&book_id, &id, &fields.into()).await?;
      emit(&store.items())
    }
    RankedAction::Remove { book_id, id } => {
      store.remove(&book_id, &id).await?;
      emit(&store.items())
    }
    RankedAction::Reorder { book_id, ids } => {
      store.reorder(&book_id, &ids).await?;
      emit(&store.items())
    }
  }
}

fn read_password() -> Result<String> {
  let mut line = String::new();
  std::io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn emit<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
