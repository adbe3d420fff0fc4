//! CoinLab CLI: run, sweep, fetch and strategy listing commands.
//!
//! Commands:
//! - `run`: execute one backtest from a TOML config file or from flags
//! - `sweep`: run a parameter grid in parallel and print a leaderboard
//! - `fetch`: download a CoinGecko price history to a bar CSV
//! - `coins`: list CoinGecko coin ids
//! - `strategies`: print every strategy's parameter schema

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use coinlab_core::strategy::{ParamValue, StrategyParams};
use coinlab_core::{BacktestResult, StrategyKind, StrategySpec};
use coinlab_runner::data_loader::{bars_from_prices, normalize, write_csv};
use coinlab_runner::export::{
    export_json, generate_sweep_table, save_artifacts, write_orders_csv,
};
use coinlab_runner::{
    load_bars, run_from_config, run_sweep, BacktestSection, CoinGeckoClient, DataSource,
    ParamGrid, ParamRange, RunConfig,
};

#[derive(Parser)]
#[command(name = "coinlab", version, about = "CoinLab CLI: crypto strategy backtester")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file or from flags.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Strategy name: sma_crossover, rsi or arima (aliases accepted).
        #[arg(long, short)]
        strategy: Option<String>,

        /// Strategy parameter as name=value. Repeatable.
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,

        #[command(flatten)]
        data: DataArgs,

        /// How to print the order history.
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,

        /// Write the printed output to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Also save the full artifact set (result.json, orders.csv, equity.csv, report.md).
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,
    },
    /// Run every point of a parameter grid and rank by profit.
    Sweep {
        /// Strategy name.
        #[arg(long, short)]
        strategy: String,

        /// Parameter range: name=start..end:step or name=a,b,c. Repeatable.
        #[arg(long = "range", short = 'r')]
        ranges: Vec<ParamRange>,

        #[command(flatten)]
        data: DataArgs,

        /// Show only the best N rows.
        #[arg(long)]
        top: Option<usize>,
    },
    /// Download a price history from CoinGecko and save it as bar CSV.
    Fetch {
        #[arg(long, default_value = "bitcoin")]
        coin: String,

        #[arg(long, default_value = "usd")]
        vs_currency: String,

        #[arg(long, default_value_t = 180)]
        days: u32,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,
    },
    /// List CoinGecko coin ids, optionally filtered by substring.
    Coins {
        filter: Option<String>,
    },
    /// Print each strategy's parameters, ranges and defaults.
    Strategies,
}

/// Data and balance overrides shared by `run` and `sweep`.
#[derive(Args)]
struct DataArgs {
    /// CoinGecko coin id.
    #[arg(long)]
    coin: Option<String>,

    #[arg(long)]
    vs_currency: Option<String>,

    /// Days of history.
    #[arg(long)]
    days: Option<u32>,

    /// Starting cash.
    #[arg(long)]
    balance: Option<f64>,

    /// Read bars from a CSV file instead of CoinGecko.
    #[arg(long, conflicts_with = "synthetic")]
    csv: Option<PathBuf>,

    /// Use a seeded synthetic random walk instead of CoinGecko.
    #[arg(long)]
    synthetic: Option<u64>,
}

impl DataArgs {
    fn apply(&self, section: &mut BacktestSection) {
        if let Some(coin) = &self.coin {
            section.coin = coin.clone();
        }
        if let Some(vs) = &self.vs_currency {
            section.vs_currency = vs.clone();
        }
        if let Some(days) = self.days {
            section.days = days;
        }
        if let Some(balance) = self.balance {
            section.initial_balance = balance;
        }
        if let Some(path) = &self.csv {
            section.source = DataSource::Csv { path: path.clone() };
        }
        if let Some(seed) = self.synthetic {
            section.source = DataSource::Synthetic {
                seed,
                start_price: 30_000.0,
            };
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            strategy,
            params,
            data,
            output,
            out,
            artifacts_dir,
        } => run_cmd(config, strategy, &params, &data, output, out, artifacts_dir),
        Commands::Sweep {
            strategy,
            ranges,
            data,
            top,
        } => sweep_cmd(&strategy, ranges, &data, top),
        Commands::Fetch {
            coin,
            vs_currency,
            days,
            out,
        } => fetch_cmd(&coin, &vs_currency, days, &out),
        Commands::Coins { filter } => coins_cmd(filter.as_deref()),
        Commands::Strategies => strategies_cmd(),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "coinlab_core=debug,coinlab_runner=debug,info",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_params(raw: &[String]) -> Result<StrategyParams> {
    let mut params = StrategyParams::new();
    for item in raw {
        let (name, value) = item
            .split_once('=')
            .with_context(|| format!("expected name=value, got '{item}'"))?;
        let value: ParamValue = value
            .parse()
            .map_err(|e: String| anyhow::anyhow!("parameter '{name}': {e}"))?;
        params.insert(name.trim().to_string(), value);
    }
    Ok(params)
}

#[allow(clippy::too_many_arguments)]
fn run_cmd(
    config_path: Option<PathBuf>,
    strategy: Option<String>,
    params: &[String],
    data: &DataArgs,
    output: OutputFormat,
    out: Option<PathBuf>,
    artifacts_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = match (config_path, strategy) {
        (Some(_), Some(_)) => bail!("--config and --strategy are mutually exclusive"),
        (Some(path), None) => {
            if !params.is_empty() {
                bail!("--param cannot be combined with --config");
            }
            RunConfig::load(&path)?
        }
        (None, Some(name)) => {
            RunConfig::new(StrategySpec::from_params(&name, &parse_params(params)?)?)
        }
        (None, None) => bail!("one of --config or --strategy is required"),
    };
    data.apply(&mut config.backtest);

    let outcome = run_from_config(&config)?;

    let mut sink: Box<dyn Write> = match &out {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    match output {
        OutputFormat::Table => print_summary(&mut sink, &outcome.result)?,
        OutputFormat::Csv => write_orders_csv(&outcome.result.order_table(), &mut sink)?,
        OutputFormat::Json => writeln!(sink, "{}", export_json(&outcome)?)?,
    }
    sink.flush()?;

    if let Some(dir) = artifacts_dir {
        let run_dir = save_artifacts(&outcome, &dir)?;
        eprintln!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn sweep_cmd(
    strategy: &str,
    ranges: Vec<ParamRange>,
    data: &DataArgs,
    top: Option<usize>,
) -> Result<()> {
    let kind: StrategyKind = strategy.parse()?;
    let grid = ranges
        .into_iter()
        .fold(ParamGrid::new(kind), ParamGrid::with_range);
    let specs = grid.specs()?;
    if specs.is_empty() {
        bail!("no valid parameter combinations in a grid of {}", grid.size());
    }

    let mut section = BacktestSection::default();
    data.apply(&mut section);
    section.validate()?;
    let loaded = load_bars(&section)?;

    eprintln!("Running {} backtests on {} bars...", specs.len(), loaded.bars.len());
    let mut entries = run_sweep(&loaded.bars, section.initial_balance, &specs);
    if let Some(n) = top {
        entries.truncate(n);
    }
    print!("{}", generate_sweep_table(&entries));
    Ok(())
}

fn fetch_cmd(coin: &str, vs_currency: &str, days: u32, out: &Path) -> Result<()> {
    let client = CoinGeckoClient::new()?;
    let points = client
        .market_chart(coin, vs_currency, days)
        .with_context(|| format!("failed to fetch {coin}/{vs_currency}"))?;
    let bars = normalize(bars_from_prices(&points));

    let file = std::fs::File::create(out)
        .with_context(|| format!("failed to create {}", out.display()))?;
    write_csv(&bars, file)?;
    println!("Wrote {} bars to {}", bars.len(), out.display());
    Ok(())
}

fn coins_cmd(filter: Option<&str>) -> Result<()> {
    let coins = CoinGeckoClient::new()?.coin_list()?;
    let filter = filter.map(str::to_lowercase);
    let mut shown = 0usize;
    for coin in &coins {
        let matches = filter.as_deref().map_or(true, |f| {
            coin.id.contains(f) || coin.symbol.contains(f) || coin.name.to_lowercase().contains(f)
        });
        if matches {
            println!("{:<32} {:<10} {}", coin.id, coin.symbol, coin.name);
            shown += 1;
        }
    }
    eprintln!("{shown} of {} coins", coins.len());
    Ok(())
}

fn strategies_cmd() -> Result<()> {
    for kind in StrategyKind::ALL {
        println!("{kind}");
        for spec in kind.schema() {
            println!(
                "  {:<14} {:<8} [{}, {}] default {}  {}",
                spec.name,
                format!("{:?}", spec.kind).to_lowercase(),
                spec.min,
                spec.max,
                spec.default,
                spec.description
            );
        }
        println!();
    }
    Ok(())
}

fn print_summary(out: &mut dyn Write, result: &BacktestResult) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "=== Backtest Result ===")?;
    writeln!(out, "Strategy:       {}", result.strategy)?;
    writeln!(out, "Bars:           {} ({} decisions)", result.bar_count, result.decision_bars)?;
    writeln!(out, "Trades:         {}", result.trade_count())?;
    writeln!(out)?;
    writeln!(out, "--- Performance ---")?;
    writeln!(out, "Initial:        {:.2}", result.initial_balance)?;
    writeln!(out, "Final Value:    {:.2}", result.final_value)?;
    writeln!(out, "Profit:         {:.2}", result.profit)?;
    writeln!(out, "Return:         {:.2}%", result.return_pct())?;
    writeln!(out, "Max Drawdown:   {:.2}%", result.max_drawdown() * 100.0)?;
    if result.model_fit_failures > 0 {
        writeln!(out, "WARNING: {} bars skipped after model fit failures", result.model_fit_failures)?;
    }

    let table = result.order_table();
    if !table.is_empty() {
        writeln!(out)?;
        writeln!(out, "--- Orders ---")?;
        writeln!(out, "{:<12} {:>14} {:>14} {:>14} {:<5}", "Date", "Price", "Size", "Value", "Type")?;
        writeln!(out, "{}", "-".repeat(63))?;
        for row in table.rows() {
            writeln!(
                out,
                "{:<12} {:>14.2} {:>14.6} {:>14.2} {:<5}",
                row.date.to_string(),
                row.price,
                row.size,
                row.value,
                row.order_type.as_str()
            )?;
        }
    }
    writeln!(out)?;
    Ok(())
}
