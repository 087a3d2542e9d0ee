//! HTTP-backed implementations of the agent contracts.
//!
//! Every call is a JSON `POST` to `<base_url>/<operation>`. Connection
//! failures, timeouts, and non-2xx statuses are transport errors; a body that
//! does not decode into the expected response is a parse error. Both are
//! retried by the session layer.

use std::time::Duration;

use fingraph_session::{
  AgentError, ExtractionAgent, InterviewAgent, RankingAgent,
  agent::{
    ExtractionResponse, RankRequest, RankingResponse, ResolveRequest,
    RespondRequest, RespondResponse, StartRequest, StartResponse,
  },
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{AgentsConfig, error::Result};

/// Talks to the three agents over HTTP.
#[derive(Clone)]
pub struct HttpAgents {
  client:         reqwest::Client,
  interview_url:  String,
  extraction_url: String,
  ranking_url:    String,
}

impl HttpAgents {
  pub fn new(config: &AgentsConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self {
      client,
      interview_url: config.interview_url.trim_end_matches('/').to_owned(),
      extraction_url: config.extraction_url.trim_end_matches('/').to_owned(),
      ranking_url: config.ranking_url.trim_end_matches('/').to_owned(),
    })
  }

  async fn post<B, R>(&self, base: &str, operation: &str, body: &B) -> Result<R, AgentError>
  where
    B: Serialize + Sync,
    R: DeserializeOwned,
  {
    let url = format!("{base}/{operation}");
    let response = self
      .client
      .post(&url)
      .json(body)
      .send()
      .await
      .map_err(|e| AgentError::Transport(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
      return Err(AgentError::Transport(format!("{url}: HTTP {status}")));
    }

    let bytes = response
      .bytes()
      .await
      .map_err(|e| AgentError::Transport(format!("{url}: {e}")))?;
    serde_json::from_slice(&bytes)
      .map_err(|e| AgentError::Parse(format!("{url}: {e}")))
  }
}

impl InterviewAgent for HttpAgents {
  async fn start(
    &self,
    request: StartRequest,
  ) -> Result<StartResponse, AgentError> {
    self.post(&self.interview_url, "start", &request).await
  }

  async fn respond(
    &self,
    request: RespondRequest,
  ) -> Result<RespondResponse, AgentError> {
    self.post(&self.interview_url, "respond", &request).await
  }
}

impl ExtractionAgent for HttpAgents {
  async fn resolve(
    &self,
    request: ResolveRequest,
  ) -> Result<ExtractionResponse, AgentError> {
    self.post(&self.extraction_url, "resolve", &request).await
  }
}

impl RankingAgent for HttpAgents {
  async fn rank(
    &self,
    request: RankRequest,
  ) -> Result<RankingResponse, AgentError> {
    self.post(&self.ranking_url, "rank", &request).await
  }
}

#[cfg(test)]
mod tests {
  use axum::{Json, Router, http::StatusCode, routing::post};
  use fingraph_core::schema::SchemaRegistry;
  use serde_json::{Value, json};
  use tokio::net::TcpListener;

  use super::*;

  /// Serve a fake agent on an ephemeral port and return its base URL.
  async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{address}/")
  }

  fn agents(base: &str) -> HttpAgents {
    HttpAgents::new(&AgentsConfig {
      interview_url:  base.to_owned(),
      extraction_url: base.to_owned(),
      ranking_url:    base.to_owned(),
      timeout_secs:   5,
    })
    .unwrap()
  }

  fn start_request() -> StartRequest {
    let registry = SchemaRegistry::financial();
    StartRequest {
      topic:  "Personal".into(),
      schema: registry.get("Personal").unwrap().clone(),
    }
  }

  #[tokio::test]
  async fn posts_json_and_decodes_reply() {
    let app = Router::new()
      .route(
        "/start",
        post(|Json(body): Json<Value>| async move {
          Json(json!({
            "question": format!("Opening {}", body["topic"].as_str().unwrap_or("")),
          }))
        }),
      )
      .route(
        "/resolve",
        post(|| async {
          Json(json!({
            "updates": [
              { "topic": "Income", "field": "annual_income", "value": 80000,
                "temporal_context": "future" }
            ],
            "answer_consumed_for_current_topic": true,
          }))
        }),
      );
    let base = serve(app).await;
    let agents = agents(&base);

    let start = agents.start(start_request()).await.unwrap();
    assert_eq!(start.question, "Opening Personal");
    assert!(!start.topic_complete);

    let resolved = agents
      .resolve(ResolveRequest {
        user_text:        "I'll earn 80k".into(),
        current_topic:    None,
        current_question: None,
        snapshots:        Default::default(),
        schemas:          Vec::new(),
      })
      .await
      .unwrap();
    assert_eq!(resolved.updates.len(), 1);
    assert_eq!(resolved.updates[0].confidence, 1.0);
    assert!(resolved.priority_shift.is_none());
  }

  #[tokio::test]
  async fn error_status_is_transport_failure() {
    let app = Router::new().route(
      "/rank",
      post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let agents = agents(&serve(app).await);

    let err = agents
      .rank(RankRequest {
        visited:          Vec::new(),
        pending:          Vec::new(),
        available_topics: Vec::new(),
        snapshots:        Default::default(),
      })
      .await
      .unwrap_err();
    assert!(matches!(err, AgentError::Transport(_)));
  }

  #[tokio::test]
  async fn malformed_body_is_parse_failure() {
    let app = Router::new().route("/start", post(|| async { "not json" }));
    let agents = agents(&serve(app).await);

    let err = agents.start(start_request()).await.unwrap_err();
    assert!(matches!(err, AgentError::Parse(_)));
  }
}
