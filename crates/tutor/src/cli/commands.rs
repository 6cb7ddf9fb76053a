use anyhow::{anyhow, Context, Result};
use colored::*;
use futures::StreamExt;
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;

use crate::cli::client::{ClientConfig, TutorClient};
use crate::config::Settings;
use crate::server::models::conversation::Message;
use crate::server::models::review::parse_reviews;
use crate::server::startup::start_server;
use crate::server::types::ChatStreamEvent;

/// Run the HTTP server in the foreground
pub async fn serve(settings: &Settings, addr: Option<SocketAddr>) -> Result<()> {
  let mut settings = settings.clone();
  if let Some(addr) = addr {
    settings.server.addr = addr;
  }
  start_server(&settings).await
}

/// Report whether a server is up and which backends it runs
pub async fn status(server: &str) -> Result<()> {
  let client = TutorClient::with_config(ClientConfig::for_server(server))?;
  let status = client.status().await?;

  println!("{} Tutor server {} is {}", "✓".green(), status.version, status.status.green());
  println!("  {} {}", "Store:".bold(), status.store);
  println!("  {} {}", "Embedding model:".bold(), status.embedding_model.yellow());
  println!("  {} {}", "Generation model:".bold(), status.generation_model.yellow());
  println!("  {} {}", "Top K:".bold(), status.top_k);
  println!("  {} {}", "Up since:".bold(), status.started_at.to_rfc3339().dimmed());
  Ok(())
}

/// Send reviews to the server for embedding and storage
pub async fn ingest(server: &str, file: Option<&Path>) -> Result<()> {
  let document = match file {
    Some(path) => {
      let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
      let count = parse_reviews(&bytes)?.len();
      println!("{} Sending {} review(s) from {}", "→".blue(), count, path.display().to_string().cyan());
      Some(bytes)
    }
    None => {
      println!("{} Asking the server to ingest its configured reviews file", "→".blue());
      None
    }
  };

  let client = TutorClient::with_config(ClientConfig::for_server(server))?;
  let report = client.ingest(document).await?;

  println!("{} Upserted {} review(s) using {}", "✓".green(), report.upserted, report.model.yellow());
  Ok(())
}

/// Ask one question and print the answer as it streams in
pub async fn chat(server: &str, message: &str) -> Result<()> {
  let client = TutorClient::with_config(ClientConfig::for_server(server))?;
  let mut events = client.chat(&[Message::user(message)]).await?;
  let mut stdout = std::io::stdout();

  while let Some(event) = events.next().await {
    match event {
      Ok(ChatStreamEvent::Chunk { text }) => {
        print!("{text}");
        stdout.flush()?;
      }
      Ok(ChatStreamEvent::Done) => {
        println!();
        return Ok(());
      }
      Ok(ChatStreamEvent::Error { key, message }) => {
        println!();
        eprintln!("{} Answer was cut off: {} ({})", "⚠".yellow(), message, key.dimmed());
        return Err(anyhow!("Answer incomplete: {message}"));
      }
      Err(e) => {
        println!();
        eprintln!("{} Answer was cut off: {e:#}", "⚠".yellow());
        return Err(e);
      }
    }
  }

  println!();
  eprintln!("{} Server closed the stream without finishing the answer", "⚠".yellow());
  Err(anyhow!("Answer incomplete: stream ended early"))
}

/// Print the effective settings with credentials redacted
pub fn show_config(settings: &Settings) -> Result<()> {
  println!("{}", settings.to_redacted_yaml()?);
  Ok(())
}
