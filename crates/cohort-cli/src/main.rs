//! `cohort`: command-line client for the Cohort segment server.
//!
//! # Usage
//!
//! ```
//! cohort segments create VOICE_MESSAGES --auto-percent 30
//! cohort user update 1000 --add VOICE_MESSAGES --remove LEGACY_UI --ttl-hours 24
//! cohort history --year 2025 --month 9
//! cohort --host http://cohort.internal:8080 request --method GET --endpoint /segments
//! ```

mod client;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use client::ApiClient;
use cohort_core::update::MembershipUpdate;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

const DEFAULT_URL: &str = "http://localhost:8080";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "cohort", version, about = "Client for the Cohort segment server")]
struct Args {
  /// Path to a TOML config file (`url = "..."`).
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  /// Base URL of the server (default: http://localhost:8080).
  #[arg(long, env = "COHORT_URL", global = true)]
  host: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Manage the segment catalog.
  #[command(subcommand)]
  Segments(SegmentsCommand),

  /// Inspect and change one user's memberships.
  #[command(subcommand)]
  User(UserCommand),

  /// Show the membership audit trail, optionally for one elapsed month.
  History {
    #[arg(long, requires = "month")]
    year:  Option<i32>,
    #[arg(long, requires = "year")]
    month: Option<u32>,
  },

  /// Send a raw request and print the response body.
  Request {
    #[arg(short, long, default_value = "GET")]
    method:   String,
    /// Path relative to the host, e.g. `/segments`.
    #[arg(short, long)]
    endpoint: String,
    /// JSON request body.
    #[arg(short, long)]
    data:     Option<String>,
  },
}

#[derive(Subcommand, Debug)]
enum SegmentsCommand {
  /// List every segment slug.
  List,
  /// Create a segment.
  Create {
    slug:         String,
    /// Share of users (0–100) placed in the segment automatically.
    #[arg(long)]
    auto_percent: Option<i64>,
  },
  /// Delete a segment and its manual memberships.
  Delete { slug: String },
}

#[derive(Subcommand, Debug)]
enum UserCommand {
  /// Show the segments currently active for a user.
  Get { user_id: i64 },
  /// Permanently assign a user to a segment.
  Add { user_id: i64, slug: String },
  /// Add and remove memberships in one atomic batch.
  Update {
    user_id:   i64,
    #[arg(long, value_delimiter = ',')]
    add:       Vec<String>,
    #[arg(long, value_delimiter = ',')]
    remove:    Vec<String>,
    /// Lifetime of the added memberships, in hours (1–719).
    #[arg(long)]
    ttl_hours: Option<i64>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url: String,
}

fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
  let Some(path) = path else {
    return Ok(ConfigFile::default());
  };
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading config file {}", path.display()))?;
  toml::from_str(&raw).context("parsing config file")
}

/// `--host` / `COHORT_URL` override the config file, which overrides the default.
fn resolve_base_url(flag: Option<String>, file_cfg: &ConfigFile) -> String {
  flag
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| DEFAULT_URL.to_string())
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(LevelFilter::WARN)
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let file_cfg = load_config_file(args.config.as_deref())?;
  let client = ApiClient::new(resolve_base_url(args.host, &file_cfg))?;

  match args.command {
    Command::Segments(cmd) => match cmd {
      SegmentsCommand::List => print_json(&client.list_segments().await?),
      SegmentsCommand::Create { slug, auto_percent } => {
        print_json(&client.create_segment(&slug, auto_percent).await?)
      }
      SegmentsCommand::Delete { slug } => {
        client.delete_segment(&slug).await?;
        println!("deleted segment {slug}");
        Ok(())
      }
    },
    Command::User(cmd) => match cmd {
      UserCommand::Get { user_id } => print_json(&client.user_segments(user_id).await?),
      UserCommand::Add { user_id, slug } => print_json(&client.add_user(user_id, &slug).await?),
      UserCommand::Update { user_id, add, remove, ttl_hours } => {
        client
          .update_user(user_id, &MembershipUpdate { add, remove, ttl_hours })
          .await?;
        println!("updated user {user_id}");
        Ok(())
      }
    },
    Command::History { year, month } => {
      print_json(&client.history(year.zip(month)).await?)
    }
    Command::Request { method, endpoint, data } => {
      let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| anyhow!("invalid HTTP method {method:?}"))?;
      let (status, body) = client.raw(method, &endpoint, data).await?;
      println!("{status}");
      match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => print_json(&json),
        Err(_) => {
          if !body.is_empty() {
            println!("{body}");
          }
          Ok(())
        }
      }
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
