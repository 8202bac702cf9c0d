//! Stockpile entry point.
//!
//! Wires configuration, the record cache, the rate limiter, the FMP
//! client and the optional insight provider into one [`ScreenPipeline`]
//! run, then prints the summary.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use stockpile_batch::BatchProcessor;
use stockpile_core::{ConfigError, StockpileConfig, StockpileResult};
use stockpile_fetch::{probe_auth, FmpClient, FmpRecordSource, RateLimiter};
use stockpile_llm::{InsightProvider, OpenAiInsightProvider};
use stockpile_screener::{load_universe, ScreenPipeline, ScreenSummary};
use stockpile_store::{CacheStore, CacheTtl};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "\
Usage: stockpile [OPTIONS]

Options:
  --config <path>    TOML configuration file (defaults + env otherwise)
  --tickers <path>   JSON ticker list; repeatable, overrides the config universe
  --clear-cache      Delete the record cache before the run
  --limit <n>        Truncate the universe to the first n symbols
  -h, --help         Show this help

Environment:
  FMP_API_KEY        required; Financial Modeling Prep API key
  OPENAI_API_KEY     optional; absent disables insight generation
  RUST_LOG           tracing filter, e.g. 'stockpile_batch=debug,info'";

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    config_path: Option<PathBuf>,
    ticker_paths: Vec<PathBuf>,
    clear_cache: bool,
    limit: Option<usize>,
    help: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };
    if args.help {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    init_tracing();

    match run(args).await {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Run failed");
            eprintln!("stockpile: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> StockpileResult<ScreenSummary> {
    let mut config = load_config(args.config_path.as_deref())?;
    if !args.ticker_paths.is_empty() {
        config.screen.universe_paths = args.ticker_paths;
    }
    config.validate()?;

    let fmp_api_key = require_env("FMP_API_KEY")?;

    let mut universe = load_universe(&config.screen.universe_paths)?;
    if let Some(limit) = args.limit {
        if universe.len() > limit {
            tracing::info!(limit, full = universe.len(), "Truncating universe");
            universe.truncate(limit);
        }
    }
    if universe.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "screen.universe_paths".to_string(),
            value: format!("{:?}", config.screen.universe_paths),
            reason: "screening universe is empty; pass --tickers or set universe_paths"
                .to_string(),
        }
        .into());
    }

    let store = Arc::new(CacheStore::open(
        &config.cache.path,
        CacheTtl::After(config.cache.ttl()),
    ));
    if args.clear_cache {
        store.clear()?;
        tracing::info!(path = %config.cache.path.display(), "Record cache cleared");
    }

    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let client = FmpClient::new(
        fmp_api_key,
        config.fetch.clone(),
        Arc::clone(&store),
        Arc::clone(&limiter),
    )?;
    probe_auth(&client).await?;

    let source = Arc::new(FmpRecordSource::new(client));
    let processor = BatchProcessor::new(source, config.batch.clone());
    let insights = insight_provider(&config)?;

    let pipeline = ScreenPipeline::new(
        processor,
        insights,
        config.screen.clone(),
        Arc::clone(&store),
        Arc::clone(&limiter),
    );
    pipeline.run(&universe).await
}

fn parse_args<I>(args: I) -> Result<CliArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut parsed = CliArgs::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--config requires a path".to_string())?;
                parsed.config_path = Some(PathBuf::from(value));
            }
            "--tickers" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--tickers requires a path".to_string())?;
                parsed.ticker_paths.push(PathBuf::from(value));
            }
            "--clear-cache" => parsed.clear_cache = true,
            "--limit" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--limit requires a number".to_string())?;
                let limit = value
                    .parse::<usize>()
                    .map_err(|_| format!("invalid --limit value: {}", value))?;
                parsed.limit = Some(limit);
            }
            "--help" | "-h" => parsed.help = true,
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(parsed)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();
}

fn load_config(path: Option<&Path>) -> StockpileResult<StockpileConfig> {
    let Some(path) = path else {
        return Ok(StockpileConfig::from_env());
    };
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let config = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })?;
    tracing::info!(path = %path.display(), "Loaded configuration file");
    Ok(config)
}

fn require_env(var: &'static str) -> StockpileResult<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingApiKey {
            var: var.to_string(),
        }
        .into()),
    }
}

fn insight_provider(config: &StockpileConfig) -> StockpileResult<Option<Arc<dyn InsightProvider>>> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.trim().is_empty() => {
            let provider = OpenAiInsightProvider::new(key, config.llm.clone())?;
            Ok(Some(Arc::new(provider)))
        }
        _ => {
            tracing::warn!("OPENAI_API_KEY not set, insight columns will carry fallback text");
            Ok(None)
        }
    }
}

fn print_summary(summary: &ScreenSummary) {
    println!("Screen complete: run {}", summary.run_id);
    println!(
        "  screened {} symbols, {} passed, {} skipped (already exported)",
        summary.screened, summary.passed, summary.skipped
    );
    println!(
        "  fetch failures: {} ({} dropped by the retry queue) across {} rounds",
        summary.batch.failed, summary.batch.dropped, summary.batch.rounds
    );
    println!(
        "  cache hit rate: {:.1}%, provider requests admitted: {}",
        summary.cache.hit_rate() * 100.0,
        summary.admitted
    );
    println!("  output: {}", summary.output_path.display());
}

// ============================================================================
// TESTS
// ============================================================================
