//! Password sign-in against the project's auth endpoints.
//!
//! The session is kept in the durable key-value store so a later run starts
//! signed in, and its access token is installed on the shared [`Project`]
//! so every table and storage call is made as the signed-in user.
//! Changes are published on a watch channel.

use chrono::Duration;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::Project;
use crate::cache::{Clock, KvStorage, SystemClock};
use crate::error::{check_response, Error, Result};
use crate::validation::{validate_email, validate_password};

pub const SESSION_KEY: &str = "auth_session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub access_token: String,
  #[serde(default)]
  pub refresh_token: Option<String>,
  #[serde(default)]
  pub token_type: Option<String>,
  #[serde(default)]
  pub expires_in: Option<i64>,
  /// Unix seconds
  #[serde(default)]
  pub expires_at: Option<i64>,
  pub user: User,
}

pub struct AuthStore {
  project: Project,
  storage: Arc<dyn KvStorage>,
  clock: Arc<dyn Clock>,
  session: watch::Sender<Option<Session>>,
}

impl AuthStore {
  pub fn new(project: Project, storage: Arc<dyn KvStorage>) -> Self {
    let (session, _) = watch::channel(None);
    Self {
      project,
      storage,
      clock: Arc::new(SystemClock),
      session,
    }
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Restore a persisted session. Expired or unreadable sessions are dropped.
  pub fn initialize(&self) -> Option<Session> {
    let stored = match self.storage.get(SESSION_KEY) {
      Ok(stored) => stored?,
      Err(e) => {
        warn!(target: "auth", error = %e, "could not read stored session");
        return None;
      }
    };

    let session = match serde_json::from_str::<Session>(&stored) {
      Ok(session) if !self.is_expired(&session) => session,
      Ok(_) => {
        debug!(target: "auth", "stored session expired");
        self.forget();
        return None;
      }
      Err(e) => {
        warn!(target: "auth", error = %e, "stored session unreadable");
        self.forget();
        return None;
      }
    };

    debug!(target: "auth", user_id = %session.user.id, "session restored");
    self.project.set_access_token(Some(session.access_token.clone()));
    self.session.send_replace(Some(session.clone()));
    Some(session)
  }

  pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
    if email.is_empty() || password.is_empty() {
      return Err(Error::validation("Email and password are required"));
    }
    for problem in [validate_email(email), validate_password(password)] {
      if !problem.is_empty() {
        return Err(Error::Validation(problem));
      }
    }

    let mut url = self.project.url("auth/v1/token")?;
    url.query_pairs_mut().append_pair("grant_type", "password");
    let response = self
      .project
      .request(Method::POST, url)
      .json(&json!({ "email": email, "password": password }))
      .send()
      .await?;
    let mut session: Session = check_response(response)
      .await
      .inspect_err(|e| warn!(target: "auth", error = %e, "sign-in failed"))?
      .json()
      .await?;

    if session.expires_at.is_none() {
      if let Some(secs) = session.expires_in {
        let expires_at = Duration::try_seconds(secs)
          .and_then(|lifetime| self.clock.now().checked_add_signed(lifetime))
          .ok_or_else(|| {
            Error::UnexpectedResponse(format!("session lifetime out of range: {}s", secs))
          })?;
        session.expires_at = Some(expires_at.timestamp());
      }
    }

    if let Err(e) = self
      .storage
      .set(SESSION_KEY, &serde_json::to_string(&session)?)
    {
      warn!(target: "auth", error = %e, "could not persist session");
    }
    self.project.set_access_token(Some(session.access_token.clone()));
    self.session.send_replace(Some(session.clone()));
    info!(target: "auth", user_id = %session.user.id, "signed in");
    Ok(session)
  }

  /// End the session. The local session is cleared even when the remote
  /// call fails; that failure is still returned.
  pub async fn sign_out(&self) -> Result<()> {
    let remote = match self.project.access_token() {
      Some(_) => {
        let url = self.project.url("auth/v1/logout")?;
        match self.project.request(Method::POST, url).send().await {
          Ok(response) => check_response(response).await.map(|_| ()),
          Err(e) => Err(e.into()),
        }
      }
      None => Ok(()),
    };

    self.forget();
    self.project.set_access_token(None);
    self.session.send_replace(None);
    info!(target: "auth", "signed out");

    remote.inspect_err(|e| warn!(target: "auth", error = %e, "remote sign-out failed"))
  }

  /// Ask the auth service who the current token belongs to.
  pub async fn fetch_user(&self) -> Result<User> {
    if self.project.access_token().is_none() {
      return Err(Error::validation("Not signed in"));
    }
    let url = self.project.url("auth/v1/user")?;
    let response = self.project.request(Method::GET, url).send().await?;
    Ok(check_response(response).await?.json().await?)
  }

  pub fn session(&self) -> Option<Session> {
    self.session.borrow().clone()
  }

  pub fn current_user(&self) -> Option<User> {
    self.session.borrow().as_ref().map(|s| s.user.clone())
  }

  /// Receives every sign-in and sign-out from now on.
  pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
    self.session.subscribe()
  }

  fn is_expired(&self, session: &Session) -> bool {
    session
      .expires_at
      .is_some_and(|at| at <= self.clock.now().timestamp())
  }

  fn forget(&self) {
    if let Err(e) = self.storage.remove(SESSION_KEY) {
      warn!(target: "auth", error = %e, "could not remove stored session");
    }
  }
}
