//! Binary entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use dealdesk::channels::ReplChannel;
use dealdesk::config::Config;
use dealdesk::export;
use dealdesk::model::HttpModelClient;
use dealdesk::pipeline::DealPipeline;
use dealdesk::state::{ChatMessage, StateStore};
use dealdesk::store::{default_data_dir, FileBlobStore};

#[derive(Parser)]
#[command(name = "dealdesk", version, about = "Private-equity deal-team orchestration runtime")]
struct Cli {
    /// One-shot sourcing mandate: run a single pipeline, print the memo, exit.
    #[arg(short, long)]
    message: Option<String>,

    /// Data directory for persisted state.
    #[arg(long, env = "DEALDESK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive REPL (the default).
    Repl,
    /// Clear all persisted state.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dealdesk=info")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);

    let blobs = Arc::new(FileBlobStore::new(&data_dir).context("opening data directory")?);
    let state = Arc::new(StateStore::hydrate(blobs).await);

    if matches!(cli.command, Some(Command::Reset)) {
        state.reset().await.context("clearing state")?;
        println!("State cleared.");
        return Ok(());
    }

    let config = Config::from_env().context("loading configuration")?;
    let model = Arc::new(HttpModelClient::new(
        config.model.base_url.clone(),
        config.model.api_key.clone(),
    ));
    let pipeline = Arc::new(DealPipeline::new(
        Arc::clone(&state),
        model,
        config.model.roster(),
    ));

    if let Some(mandate) = cli.message {
        state.push_message(ChatMessage::user(mandate.clone())).await;
        pipeline.run_sourcing(&mandate).await?;
        if let Some(deal) = state.active_deal().await {
            print!("{}", export::memo_markdown(&deal));
        }
        return Ok(());
    }

    ReplChannel::new(state, pipeline, &data_dir).run().await?;
    Ok(())
}
