use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use pricehound_common::observability::{LogConfig, init_logging};
use pricehound_config::{PricehoundConfig, PricehoundConfigLoader};
use pricehound_extract::RunOutput;
use pricehound_runtime::PricehoundRuntime;
use serde::Serialize;
use tracing::info;

mod wiring;

const DEFAULT_CONFIG: &str = "pricehound.yaml";

/// Look up current stock prices from finance pages
#[derive(Parser, Debug)]
#[command(name = "pricehound")]
#[command(version)]
struct Cli {
    /// YAML config file (defaults to ./pricehound.yaml when present)
    #[arg(long, env = "PRICEHOUND_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum concurrent lookups; overrides `workers` from config
    #[arg(long)]
    workers: Option<usize>,

    /// Print one JSON object per ticker instead of tab-separated lines
    #[arg(long)]
    json: bool,

    /// Bare tickers such as PETR4 or VALE3
    #[arg(required = true)]
    tickers: Vec<String>,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    ticker: &'a str,
    #[serde(flatten)]
    output: &'a RunOutput,
}

fn load_config(cli: &Cli) -> Result<PricehoundConfig> {
    let loader = match &cli.config {
        Some(path) => PricehoundConfigLoader::new().with_file(path),
        None => PricehoundConfigLoader::new().with_optional_file(DEFAULT_CONFIG),
    };
    let mut cfg = loader.load()?;
    if let Some(workers) = cli.workers {
        cfg.workers = workers.max(1);
    }
    Ok(cfg)
}

fn render(ticker: &str, output: &RunOutput, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string(&JsonLine { ticker, output })?)
    } else {
        Ok(format!("{ticker}\t{output}"))
    }
}

fn skipped() -> RunOutput {
    RunOutput::Error("cancelled before start".to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    let log_path = init_logging(LogConfig {
        app_name: "pricehound",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.emit_stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    })?;
    info!(log = %log_path.display(), workers = cfg.workers, "app.start");

    let runtime = PricehoundRuntime::build("pricehound-worker", Some(cfg.workers))?;
    let handle = runtime.handle();
    handle.cancel_on_ctrl_c();

    let outputs = runtime.block_on(async {
        let service = wiring::build_service(&cfg).await?;
        let service = &service;
        let outputs = handle
            .run_bounded(cli.tickers.iter(), cfg.workers, move |ticker| async move {
                service.run(ticker).await
            })
            .await;
        anyhow::Ok(outputs)
    })?;

    let results: Vec<(&str, RunOutput)> = cli
        .tickers
        .iter()
        .zip(outputs)
        .map(|(ticker, output)| (ticker.as_str(), output.unwrap_or_else(skipped)))
        .collect();

    for (ticker, output) in &results {
        println!("{}", render(ticker, output, cli.json)?);
    }

    let failed = results.iter().filter(|(_, o)| o.is_error()).count();
    info!(tickers = results.len(), failed, "app.done");
    runtime.shutdown(Duration::from_secs(2));
    Ok(())
}
