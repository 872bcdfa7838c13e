use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use token_scanner::config::Config;
use token_scanner::output::write_results;
use token_scanner::rpc::RpcClient;
use token_scanner::scanner::ScanCoordinator;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Flags override the matching environment variables (also read from `.env`).
#[derive(Parser)]
#[command(name = "token-scan")]
#[command(about = "Scan a block range for token transfers and enrich the emitting contracts", long_about = None)]
struct Cli {
    /// JSON-RPC endpoint, or several separated by commas [env: JSON_RPC_URLS / JSON_RPC_URL]
    #[arg(long)]
    rpc: Option<String>,

    /// First block to scan [env: FROM_BLOCK]
    #[arg(long)]
    from: Option<u64>,

    /// Last block to scan, or "latest" [env: TO_BLOCK]
    #[arg(long)]
    to: Option<String>,

    /// Blocks per log query [env: CHUNK_SIZE]
    #[arg(long)]
    chunk: Option<u64>,

    /// Concurrent log queries [env: LOG_FETCH_CONCURRENCY]
    #[arg(long)]
    concurrency: Option<usize>,

    /// Concurrent address enrichments [env: ENRICHMENT_CONCURRENCY]
    #[arg(long)]
    enrichment_concurrency: Option<usize>,

    /// Retries per failed chunk [env: CHUNK_RETRIES]
    #[arg(long)]
    chunk_retries: Option<usize>,

    /// Record chunks that keep failing instead of aborting [env: ON_CHUNK_FAILURE=skip]
    #[arg(long, default_value = "false")]
    skip_failed_chunks: bool,

    /// Output file [env: OUTPUT_PATH]
    #[arg(long)]
    out: Option<String>,
}

impl Cli {
    fn value_for(&self, key: &str) -> Option<String> {
        match key {
            "JSON_RPC_URLS" => self.rpc.clone(),
            "FROM_BLOCK" => self.from.map(|v| v.to_string()),
            "TO_BLOCK" => self.to.clone(),
            "CHUNK_SIZE" => self.chunk.map(|v| v.to_string()),
            "LOG_FETCH_CONCURRENCY" => self.concurrency.map(|v| v.to_string()),
            "ENRICHMENT_CONCURRENCY" => self.enrichment_concurrency.map(|v| v.to_string()),
            "CHUNK_RETRIES" => self.chunk_retries.map(|v| v.to_string()),
            "ON_CHUNK_FAILURE" if self.skip_failed_chunks => Some("skip".to_string()),
            "OUTPUT_PATH" => self.out.clone(),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    dotenv::dotenv().ok();

    let config =
        Config::from_lookup(|key| cli.value_for(key).or_else(|| std::env::var(key).ok()))?;
    info!("Configuration loaded");
    info!(
        "RPC URLs: {} endpoint(s) configured",
        config.json_rpc_urls.len()
    );

    let client = RpcClient::with_limits(
        &config.json_rpc_urls,
        config.request_timeout,
        config.rpc_max_retries,
    )?;
    let scanner = ScanCoordinator::new(Arc::new(client), config.scan.clone())?;

    let cancel = scanner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, waiting for in-flight requests before stopping");
            cancel.cancel();
        }
    });

    let result = match scanner.run(config.from_block, config.to_block).await {
        Ok(result) => result,
        Err(e) => {
            error!("Scan failed during {} phase: {}", e.phase(), e);
            return Err(e.into());
        }
    };

    write_results(&config.output_path, &result)?;

    Ok(())
}
