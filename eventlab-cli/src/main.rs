//! EventLab CLI — run event-driven backtests.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML config file
//! - `demo` — moving-average crossover on synthetic data, no files needed
//! - `report` — print the Markdown report of a saved run

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use eventlab_runner::export::{generate_report, load_artifacts, save_artifacts};
use eventlab_runner::{run_backtest, BacktestConfig, BacktestResult, OutputFormat};

#[derive(Parser)]
#[command(name = "eventlab", about = "EventLab CLI — event-driven backtesting engine")]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to the TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Override `[output].dir`.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Override `[output].format`: csv, json or none.
        #[arg(long)]
        format: Option<String>,
    },
    /// Run a moving-average crossover on synthetic bars.
    Demo {
        /// Comma-separated tickers.
        #[arg(long, default_value = "AAA,BBB,CCC")]
        tickers: String,

        #[arg(long, default_value_t = 252)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, default_value_t = 100_000.0)]
        capital: f64,

        #[arg(long, default_value_t = 10)]
        fast: usize,

        #[arg(long, default_value_t = 30)]
        slow: usize,

        /// Write series and artifacts here. Nothing is written without it.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the report for a saved run directory.
    Report {
        #[arg(long)]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            format,
        } => run_cmd(config, output_dir, format),
        Commands::Demo {
            tickers,
            bars,
            seed,
            capital,
            fast,
            slow,
            output_dir,
        } => demo_cmd(&tickers, bars, seed, capital, fast, slow, output_dir),
        Commands::Report { dir } => {
            let result = load_artifacts(&dir)?;
            print!("{}", generate_report(&result));
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_format(s: &str) -> Result<OutputFormat> {
    Ok(match s {
        "csv" => OutputFormat::Csv,
        "json" => OutputFormat::Json,
        "none" => OutputFormat::None,
        _ => bail!("unknown output format '{s}'. Valid: csv, json, none"),
    })
}

fn run_cmd(path: PathBuf, output_dir: Option<PathBuf>, format: Option<String>) -> Result<()> {
    let mut config = BacktestConfig::from_file(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }
    if let Some(format) = format {
        config.output.format = parse_format(&format)?;
    }
    debug!(path = %path.display(), backtest = ?config.backtest, "config loaded");
    execute(&config)
}

fn demo_cmd(
    tickers: &str,
    bars: usize,
    seed: u64,
    capital: f64,
    fast: usize,
    slow: usize,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let tickers: Vec<String> = tickers
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("{t:?}"))
        .collect();
    if tickers.is_empty() {
        bail!("--tickers must name at least one ticker");
    }
    let (dir, format) = match &output_dir {
        Some(d) => (d.display().to_string(), "csv"),
        None => ("results".to_string(), "none"),
    };

    // Build TOML and parse it so the demo goes through the same validation.
    let toml_str = format!(
        r#"[backtest]
tickers = [{tickers}]
initial_capital = {capital:?}

[data]
source = "synthetic"
bars = {bars}
seed = {seed}

[strategy]
type = "ma_crossover"
fast = {fast}
slow = {slow}
allow_short = true

[sizer]
type = "fixed_fraction"
fraction = 0.1

[execution]
commission = "per_share"
rate = 0.005
minimum = 1.0

[output]
dir = {dir:?}
format = "{format}"
"#,
        tickers = tickers.join(", "),
    );
    let config = BacktestConfig::from_toml(&toml_str)?;
    execute(&config)
}

fn execute(config: &BacktestConfig) -> Result<()> {
    let result = run_backtest(config)?;
    print_summary(&result);

    if let Some(dir) = &result.output_dir {
        save_artifacts(&result, dir)?;
        std::fs::write(dir.join("report.md"), generate_report(&result))
            .context("failed to write report.md")?;
        println!("Results saved to: {}", dir.display());
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    let s = &result.summary;
    println!();
    println!("Run:           {}", result.run_id);
    println!("Strategy:      {} ({})", result.strategy, result.sizer);
    println!("Tickers:       {}", result.tickers.join(", "));
    if let (Some(start), Some(end)) = (result.start, result.end) {
        println!("Period:        {} → {}", start.date(), end.date());
    }
    println!("Bars:          {}", s.bars);
    println!(
        "Orders:        {} ({} filled, {} rejected)",
        s.orders, s.fills, s.rejected_orders
    );
    println!("Signals:       {} ({} rejected)", s.signals, s.rejected_signals);
    println!("Final equity:  {:.2}", m.final_equity);
    println!("Total return:  {:.2}%", m.total_return * 100.0);
    println!("Max drawdown:  {:.2}%", m.max_drawdown * 100.0);
    println!("Sharpe:        {:.3}", m.sharpe);
    println!("Commission:    {:.2}", m.total_commission);
    println!("Open positions: {}", result.final_holdings.len());
}
