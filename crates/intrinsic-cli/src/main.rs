mod commands;
mod input;
mod logging;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::valuation::{DataArgs, DcfArgs, LtgrArgs, ValueArgs, WaccArgs};

/// DCF equity valuation against a peer-derived cost of capital
#[derive(Parser)]
#[command(
    name = "intrinsic",
    version,
    about = "DCF equity valuation against a peer-derived cost of capital",
    long_about = "Estimates an industry unlevered beta from peer regressions, builds a \
                  per-company WACC and long-term growth rate from reported statements, \
                  projects free cash flow to the firm and issues a BUY/SELL/HOLD call \
                  against the current price. All arithmetic is decimal."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Value every target ticker and issue recommendations
    Value(ValueArgs),
    /// Median unlevered beta across the peer group
    Beta(DataArgs),
    /// Weighted average cost of capital for one ticker (or explicit inputs)
    Wacc(WaccArgs),
    /// Long-term growth rate from ROIC and reinvestment
    Ltgr(LtgrArgs),
    /// Project FCFF and discount from explicit assumptions
    Dcf(DcfArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Value(args) => commands::valuation::run_value(args),
        Commands::Beta(args) => commands::valuation::run_beta(args),
        Commands::Wacc(args) => commands::valuation::run_wacc(args),
        Commands::Ltgr(args) => commands::valuation::run_ltgr(args),
        Commands::Dcf(args) => commands::valuation::run_dcf(args),
        Commands::Version => {
            println!("intrinsic {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
