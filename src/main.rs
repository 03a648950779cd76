use std::net::SocketAddr;

use askdocs::Result;
use askdocs::config::Config;
use askdocs::server;
use askdocs::service::RagService;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "askdocs")]
#[command(about = "Retrieval-augmented chat backend for local documentation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Bind address, overriding BIND_ADDR
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Rebuild the vector index from the documents directory
    Reindex,
    /// Show retrieval configuration and health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env.local wins over .env; neither is required.
    dotenv::from_filename(".env.local").ok();
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or(config.bind_addr);
            server::serve(RagService::new(config), addr).await?;
        }
        Commands::Reindex => {
            let service = RagService::new(config);
            let summary = tokio::task::spawn_blocking(move || service.reindex())
                .await
                .map_err(|err| anyhow::anyhow!("reindex task panicked: {err}"))??;
            println!(
                "Indexed {} documents into {} chunks at {}",
                summary.docs, summary.chunks, summary.store_path
            );
        }
        Commands::Status => {
            let service = RagService::new(config);
            let status = service.status();
            println!("API key configured: {}", status.has_api_key);
            println!("Embedding backend healthy: {}", status.healthy);
            println!("RAG enabled for chat: {}", status.enabled_for_chat);
            println!("Embedding model: {}", status.embed_model);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["askdocs", "status"]);
        assert!(cli.is_ok());
        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
        }

        let cli = Cli::try_parse_from(["askdocs", "serve", "--addr", "127.0.0.1:9000"]);
        assert!(matches!(
            cli.expect("serve should parse").command,
            Commands::Serve { addr: Some(_) }
        ));

        let err = Cli::try_parse_from(["askdocs"]).expect_err("subcommand is required");
        assert!(matches!(
            err.kind(),
            ErrorKind::MissingSubcommand | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        ));
    }
}
