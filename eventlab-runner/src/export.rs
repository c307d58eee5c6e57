//! Result export: JSON manifest, rejected-signal CSV, and a Markdown report.
//!
//! Persisted manifests carry `schema_version`; newer versions are rejected on
//! load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use eventlab_core::engine::RejectedSignal;

use crate::runner::{BacktestResult, SCHEMA_VERSION};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const REJECTIONS_FILE: &str = "rejected_signals.csv";

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a result, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Columns: timestamp, ticker, direction, reason, required_cash, available_cash.
pub fn export_rejections_csv(rejected: &[RejectedSignal]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "ticker",
        "direction",
        "reason",
        "required_cash",
        "available_cash",
    ])?;
    for r in rejected {
        wtr.write_record([
            &r.signal.timestamp.to_string(),
            &r.signal.ticker,
            &r.signal.direction.to_string(),
            &r.reason.to_string(),
            &format!("{:.2}", r.required_cash),
            &format!("{:.2}", r.available_cash),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifacts ──────────────────────────────────────────────────────

/// Write the manifest and rejection log into `dir`, creating it if needed.
pub fn save_artifacts(result: &BacktestResult, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;
    std::fs::write(dir.join(MANIFEST_FILE), export_json(result)?)
        .with_context(|| format!("failed to write {MANIFEST_FILE}"))?;
    std::fs::write(
        dir.join(REJECTIONS_FILE),
        export_rejections_csv(&result.rejected_signals)?,
    )
    .with_context(|| format!("failed to write {REJECTIONS_FILE}"))?;
    Ok(dir.to_path_buf())
}

pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join(MANIFEST_FILE);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Report ─────────────────────────────────────────────────────────

pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(1024);
    let m = &result.metrics;
    let s = &result.summary;
    let period = match (result.start, result.end) {
        (Some(a), Some(b)) => format!("{} → {}", a.date(), b.date()),
        _ => "no bars".to_string(),
    };

    // Writing to a String cannot fail.
    let _ = writeln!(md, "# Backtest Report\n");
    let _ = writeln!(md, "- Run: `{}`", result.run_id);
    let _ = writeln!(
        md,
        "- Strategy: {} / sizer {} / feed {}",
        result.strategy, result.sizer, result.feed
    );
    let _ = writeln!(md, "- Tickers: {}", result.tickers.join(", "));
    let _ = writeln!(md, "- Period: {period}\n");

    md.push_str("## Performance\n\n| Metric | Value |\n|---|---|\n");
    let _ = writeln!(md, "| Initial capital | {:.2} |", result.initial_capital);
    let _ = writeln!(md, "| Final equity | {:.2} |", m.final_equity);
    let _ = writeln!(md, "| Total return | {:.2}% |", m.total_return * 100.0);
    let _ = writeln!(md, "| ROI | {:.2}% |", m.roi * 100.0);
    let _ = writeln!(md, "| Max drawdown | {:.2}% |", m.max_drawdown * 100.0);
    let _ = writeln!(md, "| Sharpe | {:.3} |", m.sharpe);
    let _ = writeln!(md, "| Realized P&L | {:.2} |", m.realized_pnl);
    let _ = writeln!(md, "| Commission | {:.2} |\n", m.total_commission);

    md.push_str("## Activity\n\n| Count | Value |\n|---|---|\n");
    for (label, v) in [
        ("Bars", s.bars),
        ("Signals", s.signals),
        ("Orders", s.orders),
        ("Fills", s.fills),
        ("Rejected orders", s.rejected_orders),
        ("Rejected signals", s.rejected_signals),
    ] {
        let _ = writeln!(md, "| {label} | {v} |");
    }

    if !result.final_holdings.is_empty() {
        md.push_str("\n## Open positions\n\n| Ticker | Side | Shares | Avg price | Last | Unrealized |\n|---|---|---|---|---|---|\n");
        for (ticker, h) in &result.final_holdings {
            let _ = writeln!(
                md,
                "| {ticker} | {} | {} | {:.2} | {:.2} | {:.2} |",
                h.position,
                h.shares_owned,
                h.average_share_price_paid,
                h.latest_price,
                h.unrealized_pnl()
            );
        }
    }
    md
}
