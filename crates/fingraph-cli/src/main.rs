//! `fingraph`: line-oriented chat client for the fingraph interview server.
//!
//! # Usage
//!
//! ```text
//! fingraph --url http://localhost:8080 --user alice
//! fingraph --config ~/.config/fingraph/config.toml state
//! ```
//!
//! In chat mode, lines starting with `/` are commands: `/state`, `/reset`,
//! `/history <topic> <field>`, `/quit`.

mod client;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig, Said};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "fingraph", about = "Chat client for the fingraph interview server")]
struct Args {
  /// Path to a TOML config file (url, user).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the fingraph server (default: http://localhost:8080).
  #[arg(long, env = "FINGRAPH_URL")]
  url: Option<String>,

  /// User id to converse as (default: a fresh random id).
  #[arg(long, env = "FINGRAPH_USER")]
  user: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
  /// Interactive interview (the default).
  Chat,
  /// Print the session state.
  State,
  /// Discard the session and start over.
  Reset,
  /// Print the recorded history of one field.
  History { topic: String, field: String },
  /// List users with a live session.
  Sessions,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:  String,
  #[serde(default)]
  user: String,
}

/// CLI flags override the config file, which overrides defaults.
fn resolve_config(args: &Args, file_cfg: &ConfigFile) -> ApiConfig {
  ApiConfig {
    base_url: args
      .url
      .clone()
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    user_id:  args
      .user
      .clone()
      .or_else(|| (!file_cfg.user.is_empty()).then(|| file_cfg.user.clone()))
      .unwrap_or_else(|| Uuid::new_v4().to_string()),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let client = ApiClient::new(resolve_config(&args, &file_cfg))?;

  match args.command.clone().unwrap_or(Command::Chat) {
    Command::Chat => chat(&client).await,
    Command::State => {
      println!("{}", render::state(&client.state().await?));
      Ok(())
    }
    Command::Reset => {
      let reset = client.reset().await?;
      println!("{}", if reset { "session reset" } else { "no session" });
      Ok(())
    }
    Command::History { topic, field } => {
      println!("{}", render::history(&client.history(&topic, &field).await?));
      Ok(())
    }
    Command::Sessions => {
      for user in client.sessions().await? {
        println!("{user}");
      }
      Ok(())
    }
  }
}

// ─── Chat loop ────────────────────────────────────────────────────────────────

async fn chat(client: &ApiClient) -> Result<()> {
  println!("Chatting as {} (/quit to leave)", client.user_id());
  say(client, "").await?;

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let mut stdout = tokio::io::stdout();
  loop {
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;

    let Some(line) = lines.next_line().await.context("reading stdin")? else {
      break;
    };
    let line = line.trim();
    match line.split_whitespace().collect::<Vec<_>>().as_slice() {
      [] => continue,
      ["/quit"] | ["/exit"] => break,
      ["/state"] => println!("{}", render::state(&client.state().await?)),
      ["/reset"] => {
        client.reset().await?;
        say(client, "").await?;
      }
      ["/history", topic, field] => {
        println!("{}", render::history(&client.history(topic, field).await?));
      }
      [command, ..] if command.starts_with('/') => {
        println!("unknown command {command}");
      }
      _ => say(client, line).await?,
    }
  }
  Ok(())
}

async fn say(client: &ApiClient, text: &str) -> Result<()> {
  match client.send(text).await? {
    Said::Reply(reply) => println!("{}", render::reply(&reply)),
    Said::Rephrase(message) => println!("{message}"),
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flags_override_config_file() {
    let args = Args::parse_from(["fingraph", "--url", "http://flag:1"]);
    let file = ConfigFile {
      url:  "http://file:2".into(),
      user: "from-file".into(),
    };
    let config = resolve_config(&args, &file);
    assert_eq!(config.base_url, "http://flag:1");
    assert_eq!(config.user_id, "from-file");
  }

  #[test]
  fn missing_user_gets_random_id() {
    let args = Args::parse_from(["fingraph", "state"]);
    let config = resolve_config(&args, &ConfigFile::default());
    assert_eq!(config.base_url, "http://localhost:8080");
    assert!(Uuid::parse_str(&config.user_id).is_ok());
    assert_eq!(args.command, Some(Command::State));
  }

  #[test]
  fn history_subcommand_takes_topic_and_field() {
    let args =
      Args::parse_from(["fingraph", "--user", "bob", "history", "Income", "annual_income"]);
    assert_eq!(args.command, Some(Command::History {
      topic: "Income".into(),
      field: "annual_income".into(),
    }));
  }
}
