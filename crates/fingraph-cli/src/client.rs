//! Async HTTP client wrapping the fingraph JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use fingraph_core::graph::FieldHistoryEntry;
use fingraph_session::{SessionStateView, TurnReply};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Connection settings for the fingraph API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
  pub base_url: String,
  pub user_id:  String,
}

/// What the server made of a message.
#[derive(Debug)]
pub enum Said {
  Reply(TurnReply),
  /// The agents could not process the message; the server asks for it again.
  Rephrase(String),
}

#[derive(Deserialize)]
struct ErrorBody {
  #[serde(default)]
  error:   String,
  #[serde(default)]
  message: Option<String>,
}

/// Async HTTP client for the fingraph JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    // A turn may span several retried agent calls.
    let client = Client::builder()
      .timeout(Duration::from_secs(180))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  pub fn user_id(&self) -> &str { &self.config.user_id }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn session_url(&self, path: &str) -> String {
    self.url(&format!("/sessions/{}{}", self.config.user_id, path))
  }

  // ── Conversation ──────────────────────────────────────────────────────────

  /// `POST /api/sessions/<user>/messages`
  pub async fn send(&self, text: &str) -> Result<Said> {
    let resp = self
      .client
      .post(self.session_url("/messages"))
      .json(&json!({ "text": text }))
      .send()
      .await
      .context("POST /messages failed")?;

    match resp.status() {
      status if status.is_success() => {
        let reply = resp.json().await.context("deserialising reply")?;
        Ok(Said::Reply(reply))
      }
      StatusCode::SERVICE_UNAVAILABLE => {
        let body: ErrorBody =
          resp.json().await.context("deserialising error")?;
        Ok(Said::Rephrase(body.message.unwrap_or(body.error)))
      }
      status => {
        let body: Option<ErrorBody> = resp.json().await.ok();
        let detail = body.map(|b| b.error).unwrap_or_default();
        Err(anyhow!("POST /messages → {status} {detail}"))
      }
    }
  }

  // ── Introspection ─────────────────────────────────────────────────────────

  /// `GET /api/sessions/<user>/state`
  pub async fn state(&self) -> Result<SessionStateView> {
    let resp = self
      .client
      .get(self.session_url("/state"))
      .send()
      .await
      .context("GET /state failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /state → {}", resp.status()));
    }
    resp.json().await.context("deserialising state")
  }

  /// `GET /api/sessions/<user>/topics/<topic>/history/<field>`
  pub async fn history(
    &self,
    topic: &str,
    field: &str,
  ) -> Result<Vec<FieldHistoryEntry>> {
    let resp = self
      .client
      .get(self.session_url(&format!("/topics/{topic}/history/{field}")))
      .send()
      .await
      .context("GET /history failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /history → {}", resp.status()));
    }
    resp.json().await.context("deserialising history")
  }

  /// `GET /api/sessions`
  pub async fn sessions(&self) -> Result<Vec<String>> {
    let resp = self
      .client
      .get(self.url("/sessions"))
      .send()
      .await
      .context("GET /sessions failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /sessions → {}", resp.status()));
    }
    resp.json().await.context("deserialising sessions")
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  /// `POST /api/sessions/<user>/reset`
  pub async fn reset(&self) -> Result<bool> {
    #[derive(Deserialize)]
    struct Body {
      reset: bool,
    }

    let resp = self
      .client
      .post(self.session_url("/reset"))
      .send()
      .await
      .context("POST /reset failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("POST /reset → {}", resp.status()));
    }
    let body: Body = resp.json().await.context("deserialising reset")?;
    Ok(body.reset)
  }
}
