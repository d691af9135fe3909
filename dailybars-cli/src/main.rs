//! dailybars CLI: debug tooling for the Alpha Vantage daily series client.
//!
//! Commands:
//! - `ping`: check the service is reachable
//! - `fetch`: fetch a symbol's compact daily series and print the first rows
//! - `check`: fetch a symbol and run the data-quality rule set

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dailybars_core::config::ClientConfig;
use dailybars_core::data::{
    ping_service, AlphaVantageClient, BlockingTransport, DailyRecord, DailyTable, DataRetrievalError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dailybars",
    about = "dailybars: fetch and sanity-check Alpha Vantage daily stock prices"
)]
struct Cli {
    /// TOML config file (api_key, base_url). Defaults to the environment / .env.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the service answers at its base URL.
    Ping,
    /// Fetch the compact daily series for a symbol and print a sample.
    Fetch {
        /// Symbol to fetch (e.g., IBM).
        symbol: String,

        /// Number of rows to print.
        #[arg(long, default_value_t = 5)]
        rows: usize,

        /// Print the sample as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Fetch a symbol and run every data-quality rule. Exits 1 if any rule fails.
    Check {
        /// Symbol to check (e.g., IBM).
        symbol: String,

        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            if err.downcast_ref::<DataRetrievalError>().is_some() {
                eprintln!();
                eprintln!("Common causes:");
                eprintln!("  1. The API key is invalid. Claim a new one and update ALPHAVANTAGE_API_KEY.");
                eprintln!("  2. The free tier's daily request limit is used up. Wait or use another key.");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Ping => run_ping(&config),
        Commands::Fetch { symbol, rows, json } => {
            run_fetch(&AlphaVantageClient::new(config)?, &symbol, rows, json)
        }
        Commands::Check { symbol, json } => {
            run_check(&AlphaVantageClient::new(config)?, &symbol, json)
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::from_toml_file(&path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(ClientConfig::from_env()),
    }
}

/// Needs no API key; only the base URL is contacted.
fn run_ping(config: &ClientConfig) -> Result<ExitCode> {
    let transport = BlockingTransport::new()?;
    ping_service(&transport, config.base_url())?;
    println!("OK: {} is reachable", config.base_url());
    Ok(ExitCode::SUCCESS)
}

fn run_fetch(client: &AlphaVantageClient, symbol: &str, rows: usize, json: bool) -> Result<ExitCode> {
    if rows == 0 {
        bail!("--rows must be at least 1");
    }
    let table = client.fetch_daily(symbol)?;
    let sample = table.head(rows)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sample)?);
    } else {
        print_summary(symbol, &table)?;
        print_records(&sample);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_check(client: &AlphaVantageClient, symbol: &str, json: bool) -> Result<ExitCode> {
    let table = client.fetch_daily(symbol)?;
    let report = table.validate();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(symbol, &table)?;
        println!("{report}");
    }

    Ok(if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(symbol: &str, table: &DailyTable) -> Result<()> {
    let dates = table.dates()?;
    match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => println!(
            "{symbol}: {} daily records, {first} to {last}",
            table.len()
        ),
        _ => println!("{symbol}: no records"),
    }
    Ok(())
}

fn print_records(records: &[DailyRecord]) {
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "date", "open", "high", "low", "close", "volume"
    );
    for r in records {
        println!(
            "{:<12} {:>10.4} {:>10.4} {:>10.4} {:>10.4} {:>12}",
            r.date.to_string(),
            r.open,
            r.high,
            r.low,
            r.close,
            r.volume
        );
    }
}
