use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::info;

use intrinsic_core::market_data::{FixtureProvider, RetryingProvider};
use intrinsic_core::pipeline::{BatchReport, TickerOutcome};
use intrinsic_core::valuation::dcf::{self, DcfInput};
use intrinsic_core::valuation::wacc::{self, WaccInput};
use intrinsic_core::{Pipeline, ValuationConfig};

use crate::input;

type CmdResult = Result<Value, Box<dyn std::error::Error>>;

/// Market data and run configuration shared by the data-driven commands
#[derive(Args)]
pub struct DataArgs {
    /// Market-data snapshot: JSON `{"symbols": {...}}` of prices, statements and profiles
    #[arg(long)]
    pub data: String,

    /// Valuation config file (YAML or JSON); flags below override it
    #[arg(long)]
    pub config: Option<String>,

    /// Peer tickers for the industry beta (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Market index ticker (e.g. ^NSEI)
    #[arg(long)]
    pub market_index: Option<String>,

    /// End of the estimation window (YYYY-MM-DD), default today
    #[arg(long)]
    pub valuation_date: Option<NaiveDate>,

    /// Price and beta statement window in years
    #[arg(long)]
    pub lookback_years: Option<u32>,

    /// Risk-free rate (e.g. 0.072 for 7.2%)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,

    /// Ceiling on terminal growth (e.g. 0.06)
    #[arg(long)]
    pub growth_ceiling: Option<Decimal>,
}

/// Arguments for the full batch valuation
#[derive(Args)]
pub struct ValueArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Tickers to value (comma-separated), default the peer list
    #[arg(long, value_delimiter = ',')]
    pub tickers: Vec<String>,

    /// Explicit forecast horizon in years
    #[arg(long)]
    pub forecast_years: Option<u32>,
}

/// Arguments for a single-ticker WACC estimate
#[derive(Args)]
pub struct WaccArgs {
    /// Ticker to estimate WACC for (data-driven mode)
    #[arg(long)]
    pub ticker: Option<String>,

    /// Market-data snapshot (data-driven mode)
    #[arg(long)]
    pub data: Option<String>,

    /// Valuation config file (YAML or JSON)
    #[arg(long)]
    pub config: Option<String>,

    /// Use this industry unlevered beta instead of the peer median
    #[arg(long)]
    pub unlevered_beta: Option<Decimal>,

    /// Path to a JSON WaccInput with explicit components
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for a single-ticker long-term growth estimate
#[derive(Args)]
pub struct LtgrArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Ticker to estimate growth for
    #[arg(long)]
    pub ticker: String,
}

/// Arguments for a DCF projection from explicit assumptions
#[derive(Args)]
pub struct DcfArgs {
    /// Path to JSON DcfInput (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn run_value(args: ValueArgs) -> CmdResult {
    let mut config = load_config(&args.data)?;
    if !args.tickers.is_empty() {
        config.tickers = args.tickers;
    }
    if let Some(n) = args.forecast_years {
        config.forecast_years = n;
    }

    let pipeline = build_pipeline(&args.data.data, config)?;
    let report = pipeline.run()?;
    info!(
        valued = report.valued().count(),
        failed = report.failed_count(),
        "batch complete"
    );
    batch_to_value(&report)
}

pub fn run_beta(args: DataArgs) -> CmdResult {
    let config = load_config(&args)?;
    let pipeline = build_pipeline(&args.data, config)?;
    let window = pipeline.window()?;
    let market = pipeline.market_prices(&window)?;
    let summary = pipeline.peer_beta(&market, &window)?;

    Ok(json!({
        "result": {
            "median_unlevered_beta": summary.median_unlevered_beta,
            "peers_used": summary.peers.len(),
            "peers_skipped": summary.skipped.len(),
        },
        "results": serde_json::to_value(&summary.peers)?,
        "skipped": serde_json::to_value(&summary.skipped)?,
        "warnings": summary
            .skipped
            .iter()
            .map(|s| format!("{}: {}", s.ticker, s.reason))
            .collect::<Vec<_>>(),
    }))
}

pub fn run_wacc(args: WaccArgs) -> CmdResult {
    if let Some(ref path) = args.input {
        let wacc_input: WaccInput = input::file::read_json(path)?;
        return Ok(serde_json::to_value(wacc::calculate_wacc(&wacc_input)?)?);
    }

    let (Some(ticker), Some(data)) = (args.ticker, args.data) else {
        if let Some(wacc_input) = input::stdin::read_stdin::<WaccInput>()? {
            return Ok(serde_json::to_value(wacc::calculate_wacc(&wacc_input)?)?);
        }
        return Err("--ticker and --data are required (or provide --input)".into());
    };

    let config = match args.config {
        Some(ref path) => input::file::read_config(path)?,
        None => ValuationConfig {
            peers: vec![ticker.clone()],
            ..ValuationConfig::default()
        },
    };
    let pipeline = build_pipeline(&data, config)?;
    let window = pipeline.window()?;
    let market = pipeline.market_prices(&window)?;
    let industry_beta = match args.unlevered_beta {
        Some(beta) => beta,
        None => pipeline.peer_beta(&market, &window)?.median_unlevered_beta,
    };

    let breakdown = pipeline.wacc(&ticker, industry_beta, &market, &window)?;
    let warnings = breakdown.warnings.clone();
    Ok(json!({ "result": breakdown, "warnings": warnings }))
}

pub fn run_ltgr(args: LtgrArgs) -> CmdResult {
    let mut config = load_config(&args.data)?;
    if config.peers.is_empty() {
        config.peers = vec![args.ticker.clone()];
    }
    let pipeline = build_pipeline(&args.data.data, config)?;
    let summary = pipeline.ltgr(&args.ticker)?;

    let rows = serde_json::to_value(&summary.years)?;
    let mut result = serde_json::to_value(&summary)?;
    if let Value::Object(ref mut map) = result {
        map.remove("years");
    }
    Ok(json!({ "result": result, "results": rows }))
}

pub fn run_dcf(args: DcfArgs) -> CmdResult {
    let dcf_input: DcfInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        data
    } else {
        return Err("--input file (or JSON on stdin) is required for dcf".into());
    };

    let output = dcf::calculate_dcf(&dcf_input)?;
    let mut value = serde_json::to_value(&output)?;
    let forecast = value
        .get_mut("result")
        .and_then(Value::as_object_mut)
        .and_then(|result| result.remove("forecast"));
    if let Some(rows) = forecast {
        value["results"] = rows;
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(args: &DataArgs) -> Result<ValuationConfig, Box<dyn std::error::Error>> {
    let mut config: ValuationConfig = match args.config {
        Some(ref path) => input::file::read_config(path)?,
        None => ValuationConfig::default(),
    };
    if !args.peers.is_empty() {
        config.peers = args.peers.clone();
    }
    if let Some(ref index) = args.market_index {
        config.market_index = index.clone();
    }
    if let Some(date) = args.valuation_date {
        config.valuation_date = Some(date);
    }
    if let Some(years) = args.lookback_years {
        config.lookback_years = years;
    }
    if let Some(rf) = args.risk_free_rate {
        config.risk_free_rate = rf;
    }
    if let Some(ceiling) = args.growth_ceiling {
        config.terminal_growth_ceiling = ceiling;
    }
    Ok(config)
}

fn build_pipeline(
    data_path: &str,
    config: ValuationConfig,
) -> Result<Pipeline<RetryingProvider<FixtureProvider>>, Box<dyn std::error::Error>> {
    let fixtures: FixtureProvider = input::file::read_json(data_path)?;
    let provider = RetryingProvider::new(fixtures, config.retry.clone());
    Ok(Pipeline::new(provider, config)?)
}

/// One summary row per ticker, plus the full report.
fn batch_to_value(report: &BatchReport) -> CmdResult {
    let mut warnings: Vec<String> = Vec::new();
    let rows: Vec<Value> = report
        .outcomes
        .iter()
        .map(|outcome| match outcome {
            TickerOutcome::Valued(r) => {
                warnings.extend(r.warnings.iter().map(|w| format!("{}: {w}", r.ticker)));
                json!({
                    "ticker": r.ticker,
                    "company_name": r.company_name,
                    "status": "valued",
                    "wacc": r.wacc.wacc,
                    "terminal_growth": r.ltgr.terminal_growth,
                    "intrinsic_value_per_share": r.intrinsic_value_per_share,
                    "market_price_per_share": r.market_price_per_share,
                    "recommendation": r.recommendation,
                    "error": Value::Null,
                    "error_kind": Value::Null,
                })
            }
            TickerOutcome::Failed {
                ticker,
                kind,
                message,
            } => json!({
                "ticker": ticker,
                "company_name": Value::Null,
                "status": "failed",
                "wacc": Value::Null,
                "terminal_growth": Value::Null,
                "intrinsic_value_per_share": Value::Null,
                "market_price_per_share": Value::Null,
                "recommendation": Value::Null,
                "error": message,
                "error_kind": kind,
            }),
        })
        .collect();

    Ok(json!({
        "results": rows,
        "warnings": warnings,
        "report": serde_json::to_value(report)?,
    }))
}
