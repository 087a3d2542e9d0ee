//! Server assembly for fingraph.
//!
//! Loads configuration, builds the HTTP-backed agents and the session
//! registry, and wraps the API router with request tracing.

pub mod agents;
pub mod error;

pub use agents::HttpAgents;
pub use error::{Error, Result};

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use fingraph_core::schema::SchemaRegistry;
use fingraph_session::SessionRegistry;
use serde::{Deserialize, de::DeserializeOwned};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_timeout_secs() -> u64 { 30 }

/// Base URLs of the external agents.
#[derive(Debug, Deserialize, Clone)]
pub struct AgentsConfig {
  pub interview_url:  String,
  pub extraction_url: String,
  pub ranking_url:    String,
  /// Per-request timeout.
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:   u64,
}

/// Runtime server configuration, deserialised from `config.toml` and
/// `FINGRAPH_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:        String,
  #[serde(default = "default_port")]
  pub port:        u16,
  pub agents:      AgentsConfig,
  /// JSON topic registry; the built-in financial registry when unset.
  #[serde(default)]
  pub schema_path: Option<PathBuf>,
}

/// Just the part of the configuration that selects the topic registry.
/// Loads without an `[agents]` table, for tooling that never calls out.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SchemaConfig {
  #[serde(default)]
  pub schema_path: Option<PathBuf>,
}

/// Layer the environment (`FINGRAPH_AGENTS__INTERVIEW_URL`, ...) over an
/// optional TOML file.
fn load_layered<T: DeserializeOwned>(path: PathBuf) -> Result<T> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("FINGRAPH")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()?;
  Ok(settings.try_deserialize()?)
}

fn load_schema(path: Option<&Path>) -> Result<SchemaRegistry> {
  match path {
    Some(path) => {
      let raw = std::fs::read_to_string(path)?;
      Ok(SchemaRegistry::from_json(&raw)?)
    }
    None => Ok(SchemaRegistry::financial()),
  }
}

impl ServerConfig {
  pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
    load_layered(path.into())
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// The topic registry this server should run with.
  pub fn schema(&self) -> Result<SchemaRegistry> {
    load_schema(self.schema_path.as_deref())
  }
}

impl SchemaConfig {
  pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
    load_layered(path.into())
  }

  pub fn schema(&self) -> Result<SchemaRegistry> {
    load_schema(self.schema_path.as_deref())
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the session registry described by `config`.
pub fn registry(config: &ServerConfig) -> Result<Arc<SessionRegistry<HttpAgents>>> {
  let agents = HttpAgents::new(&config.agents)?;
  let schema = config.schema()?;
  Ok(Arc::new(SessionRegistry::new(Arc::new(agents), Arc::new(schema))))
}

/// Build the application router, with the API mounted under `/api`.
pub fn router(registry: Arc<SessionRegistry<HttpAgents>>) -> Router {
  Router::new()
    .nest("/api", fingraph_api::api_router(registry))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  const CONFIG: &str = r#"
port = 9000

[agents]
interview_url  = "http://localhost:7001"
extraction_url = "http://localhost:7002"
ranking_url    = "http://localhost:7003"
"#;

  fn from_toml<T: DeserializeOwned>(raw: &str) -> T {
    config::Config::builder()
      .add_source(config::File::from_str(raw, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn config_defaults_fill_gaps() {
    let config: ServerConfig = from_toml(CONFIG);
    assert_eq!(config.address(), "127.0.0.1:9000");
    assert_eq!(config.agents.timeout_secs, 30);
    assert!(config.schema_path.is_none());
    assert!(config.schema().unwrap().contains("Personal"));
  }

  #[test]
  fn custom_schema_is_loaded_and_validated() {
    let dir = std::env::temp_dir().join(format!(
      "fingraph-schema-{}",
      std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();

    let good = dir.join("good.json");
    let registry = SchemaRegistry::financial();
    std::fs::File::create(&good)
      .unwrap()
      .write_all(serde_json::to_string(&registry).unwrap().as_bytes())
      .unwrap();

    let bad = dir.join("bad.json");
    std::fs::write(
      &bad,
      r#"{"topics": [], "seed_order": ["Nowhere"]}"#,
    )
    .unwrap();

    let mut config: ServerConfig = from_toml(CONFIG);
    config.schema_path = Some(good);
    assert_eq!(config.schema().unwrap(), registry);

    config.schema_path = Some(bad);
    assert!(matches!(config.schema(), Err(Error::Schema(_))));

    std::fs::remove_dir_all(dir).ok();
  }

  #[test]
  fn schema_config_loads_without_agents() {
    let path = std::env::temp_dir().join(format!(
      "fingraph-no-agents-{}.toml",
      std::process::id()
    ));
    std::fs::write(&path, "port = 9000\n").unwrap();

    let config = SchemaConfig::load(&path).unwrap();
    assert!(config.schema_path.is_none());
    assert!(config.schema().unwrap().contains("Personal"));
    assert!(ServerConfig::load(&path).is_err());

    std::fs::remove_file(path).ok();
  }
}
