use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tutor::cli::{client::DEFAULT_SERVER_URL, commands};
use tutor::config::{self, Settings};
use tutor::logging;

#[derive(Parser)]
#[command(name = "tutor")]
#[command(about = "Tutor - ask questions about professors, answered from student reviews")]
#[command(version)]
struct Cli {
  /// Settings file (defaults to ~/.tutor/config.yaml when it exists)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Debug-level logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run the HTTP server
  Serve {
    /// Listen address, overriding the configured one
    #[arg(long)]
    addr: Option<SocketAddr>,
  },
  /// Check a running server and the backends it uses
  Status {
    #[arg(long, env = "TUTOR_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,
  },
  /// Embed and store reviews through a running server
  Ingest {
    /// Reviews JSON file; omit to let the server read its configured file
    #[arg(short, long)]
    file: Option<PathBuf>,
    #[arg(long, env = "TUTOR_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,
  },
  /// Ask a question
  Chat {
    #[arg(long, env = "TUTOR_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,
    /// Question text
    #[arg(required = true)]
    message: Vec<String>,
  },
  /// Print the effective settings
  Config,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  logging::init(cli.verbose);

  match cli.command {
    Command::Serve { addr } => {
      let settings = config::init(Settings::load(cli.config.as_deref())?)?;
      commands::serve(settings, addr).await
    }
    Command::Status { server } => commands::status(&server).await,
    Command::Ingest { file, server } => commands::ingest(&server, file.as_deref()).await,
    Command::Chat { server, message } => commands::chat(&server, &message.join(" ")).await,
    Command::Config => {
      let settings = Settings::load(cli.config.as_deref())?;
      commands::show_config(&settings)
    }
  }
}
