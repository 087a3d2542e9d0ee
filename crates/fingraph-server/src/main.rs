//! fingraph server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `FINGRAPH_*` environment variables, connects to the configured agents, and
//! serves the session API over HTTP.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use fingraph_server::{SchemaConfig, ServerConfig};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "fingraph interview server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the loaded topic registry as JSON and exit.
  #[arg(long)]
  dump_schema: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: print the registry an operator can start customising from.
  if cli.dump_schema {
    let schema = SchemaConfig::load(&cli.config)
      .and_then(|cfg| cfg.schema())
      .context("failed to load schema")?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    return Ok(());
  }

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load config from {:?}", cli.config))?;

  let registry = fingraph_server::registry(&server_cfg)
    .context("failed to build session registry")?;
  let app = fingraph_server::router(registry);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
