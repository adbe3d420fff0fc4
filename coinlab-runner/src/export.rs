//! Reporting and export: JSON, CSV and Markdown artifacts.
//!
//! - **JSON**: the full [`RunOutcome`], round-trippable
//! - **CSV**: order table and equity curve, to any `io::Write`
//! - **Markdown**: single-run summary and sweep leaderboard

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use coinlab_core::OrderTable;

use crate::runner::RunOutcome;
use crate::sweep::SweepEntry;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(outcome: &RunOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).context("failed to serialize RunOutcome to JSON")
}

pub fn import_json(json: &str) -> Result<RunOutcome> {
    serde_json::from_str(json).context("failed to deserialize RunOutcome from JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Write the order table as CSV: header row, then one record per order.
/// Unset indicator cells are empty.
pub fn write_orders_csv<W: Write>(table: &OrderTable, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.columns())?;
    for record in table.records() {
        wtr.write_record(&record)?;
    }
    wtr.flush().context("failed to flush CSV writer")?;
    Ok(())
}

pub fn export_orders_csv(table: &OrderTable) -> Result<String> {
    let mut buf = Vec::new();
    write_orders_csv(table, &mut buf)?;
    String::from_utf8(buf).context("CSV output is not valid UTF-8")
}

/// Write an equity curve as CSV with bar_index and equity columns.
pub fn write_equity_csv<W: Write>(equity_curve: &[f64], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["bar_index", "equity"])?;
    for (i, eq) in equity_curve.iter().enumerate() {
        wtr.write_record([i.to_string(), format!("{eq:.2}")])?;
    }
    wtr.flush().context("failed to flush CSV writer")?;
    Ok(())
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for one run.
///
/// Creates `{coin}_{strategy}_{run_id prefix}/` under `output_dir` holding
/// `result.json`, `orders.csv`, `equity.csv` and `report.md`. Returns the
/// created directory.
pub fn save_artifacts(outcome: &RunOutcome, output_dir: &Path) -> Result<PathBuf> {
    let short_id = outcome.run_id.get(..12).unwrap_or(&outcome.run_id);
    let dirname = format!(
        "{}_{}_{}",
        outcome.config.backtest.coin,
        outcome.result.strategy,
        short_id
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("result.json"), export_json(outcome)?)?;

    let orders = std::fs::File::create(run_dir.join("orders.csv"))?;
    write_orders_csv(&outcome.result.order_table(), orders)?;

    let equity = std::fs::File::create(run_dir.join("equity.csv"))?;
    write_equity_csv(&outcome.result.equity_curve, equity)?;

    std::fs::write(run_dir.join("report.md"), generate_report(outcome))?;

    tracing::info!(dir = %run_dir.display(), "saved artifacts");
    Ok(run_dir)
}

/// Load a `RunOutcome` from an artifact directory's result.json.
pub fn load_artifacts(dir: &Path) -> Result<RunOutcome> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Markdown report for a single run.
pub fn generate_report(outcome: &RunOutcome) -> String {
    let r = &outcome.result;
    let b = &outcome.config.backtest;
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Coin | {} / {} |\n", b.coin, b.vs_currency));
    md.push_str(&format!("| Strategy | {} |\n", outcome.config.strategy.label()));
    md.push_str(&format!("| Bars | {} ({} decisions) |\n", r.bar_count, r.decision_bars));
    md.push_str(&format!("| Run ID | {} |\n", outcome.run_id));
    md.push_str(&format!("| Dataset Hash | {} |\n", outcome.dataset_hash));
    md.push('\n');

    md.push_str("## Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Initial Balance | {:.2} |\n", r.initial_balance));
    md.push_str(&format!("| Final Value | {:.2} |\n", r.final_value));
    md.push_str(&format!("| Profit | {:.2} |\n", r.profit));
    md.push_str(&format!("| Return | {:.2}% |\n", r.return_pct()));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", r.max_drawdown() * 100.0));
    md.push_str(&format!("| Trades | {} |\n", r.trade_count()));
    md.push_str(&format!("| Round Trips | {} |\n", r.round_trips()));
    md.push_str(&format!("| Open Position | {:.6} |\n", r.final_position.size));
    if r.model_fit_failures > 0 {
        md.push_str(&format!("| Model Fit Failures | {} |\n", r.model_fit_failures));
    }
    md.push('\n');

    let table = r.order_table();
    if !table.is_empty() {
        md.push_str("## Orders\n\n");
        md.push_str(&format!("| {} |\n", table.columns().join(" | ")));
        md.push_str(&format!(
            "|{}\n",
            " --- |".repeat(table.columns().len())
        ));
        for record in table.records() {
            md.push_str(&format!("| {} |\n", record.join(" | ")));
        }
        md.push('\n');
    }

    md
}

/// Markdown leaderboard for a sweep, in the order given.
pub fn generate_sweep_table(entries: &[SweepEntry]) -> String {
    let mut md = String::with_capacity(256 + entries.len() * 96);
    md.push_str("| # | Strategy | Profit | Return | Trades | Max DD |\n");
    md.push_str("| ---: | --- | ---: | ---: | ---: | ---: |\n");
    for (rank, entry) in entries.iter().enumerate() {
        match &entry.outcome {
            Ok(r) => md.push_str(&format!(
                "| {} | {} | {:.2} | {:.2}% | {} | {:.2}% |\n",
                rank + 1,
                entry.spec.label(),
                r.profit,
                r.return_pct(),
                r.trade_count(),
                r.max_drawdown() * 100.0
            )),
            Err(err) => md.push_str(&format!(
                "| {} | {} | error: {err} | | | |\n",
                rank + 1,
                entry.spec.label()
            )),
        }
    }
    md
}
