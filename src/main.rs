//! NAVPOKE — ETF NAV on-chain price oracle updater
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the page source and chain client, and runs the
//! fetch→extract→validate→compare→submit pipeline once per configured
//! URL, strictly sequentially, with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

use navpoke::chain::HttpChainClient;
use navpoke::config;
use navpoke::page::HttpPageSource;
use navpoke::pipeline::Pipeline;
use navpoke::types::RunOutcome;

const BANNER: &str = r#"
 _   _    ___     ______   ___  _  _______
| \ | |  / \ \   / /  _ \ / _ \| |/ / ____|
|  \| | / _ \ \ / /| |_) | | | | ' /|  _|
| |\  |/ ___ \ V / |  __/| |_| | . \| |___
|_| \_/_/   \_\_/  |_|    \___/|_|\_\_____|

  NAV price oracle updater
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        name = %cfg.oracle.name,
        urls = cfg.oracle.start_urls.len(),
        "NAVPOKE starting up"
    );

    // -- Initialise components -------------------------------------------

    let source = Arc::new(HttpPageSource::new(&cfg.source)?);

    let rpc_url = cfg.chain.rpc_url()?;
    let registry = cfg.chain.registry()?;
    let chain = Arc::new(HttpChainClient::new(&rpc_url, registry)?);
    let account = cfg.chain.account()?;
    info!(account = %account.address, registry = %registry, "Chain client ready");

    let pipeline = Pipeline::new(source, chain, account, &cfg.chain)?;

    // -- Sequential run loop ---------------------------------------------
    //
    // URLs are processed one at a time so at most one transaction per
    // account is ever in flight (nonce acquisition and submission are not
    // atomic together).

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut failures = 0usize;
    for url in &cfg.oracle.start_urls {
        tokio::select! {
            outcome = pipeline.run(url) => match outcome {
                Ok(RunOutcome::Skipped { ticker, price }) => {
                    info!(%ticker, price = %price, "No-op: registry already current");
                }
                Ok(RunOutcome::Confirmed { ticker, transaction, confirmation }) => {
                    info!(
                        %ticker,
                        tx_hash = %transaction.hash,
                        block = ?confirmation.block_number,
                        "Run complete: update confirmed"
                    );
                }
                Err(e) => {
                    failures += 1;
                    error!(%url, error = %e, "Run failed");
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} run(s) failed");
    }
    info!("NAVPOKE finished cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("navpoke=info"));

    let json_logging = std::env::var("NAVPOKE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
