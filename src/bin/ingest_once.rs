//! One aggregation run: refresh aliases, fetch every enabled source,
//! dedupe + enrich, append to the JSON-lines output.
//!
//! Scheduling (cron, systemd timers) is left to the deployment.

use anyhow::Result;
use crypto_news_ingest::ingest::config::load_config_default;
use crypto_news_ingest::features::SourceWeights;
use crypto_news_ingest::symbols::JsonFileRegistry;
use crypto_news_ingest::{Aggregator, AliasBook, JsonLinesGateway, RunError, TimeWindow};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// INGEST_LOG_JSON=1 switches to JSON lines (for log shippers).
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ingest=info,warn"));
    let json = std::env::var("INGEST_LOG_JSON").ok().is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_config_default()?;

    let book = AliasBook::default();
    match &cfg.symbols_path {
        Some(path) => {
            book.refresh(&JsonFileRegistry::new(path)).await;
        }
        None => warn!(target: "ingest", "no symbols_path configured; using built-in ticker set"),
    }
    let dict = book.snapshot();

    let weights = cfg
        .source_weights_path
        .as_ref()
        .map(SourceWeights::load_from_file)
        .unwrap_or_else(SourceWeights::default_seed);

    let aggregator = Aggregator::new(cfg.build_adapters()?, cfg.limits()).with_source_weights(weights);
    let window = TimeWindow::lookback(chrono::Utc::now(), cfg.lookback_days);
    let gateway = JsonLinesGateway::new(&cfg.output_path);

    info!(
        target: "ingest",
        sources = ?aggregator.adapter_names(),
        symbols = dict.len(),
        lookback_days = cfg.lookback_days,
        "starting ingest run"
    );

    match aggregator.run(&window, &dict, &gateway).await {
        Ok(report) => {
            info!(
                target: "ingest",
                stored = report.records.len(),
                contributing = report.contributing_sources(),
                output = %cfg.output_path.display(),
                "ingest run finished"
            );
            Ok(())
        }
        Err(RunError::NotPersisted { report, source }) => {
            warn!(
                target: "ingest",
                computed = report.records.len(),
                "records were enriched but not stored"
            );
            Err(source.into())
        }
    }
}
