//! Dataset Store - JSON Historical Bets and Report Output
//!
//! Reads the backtest dataset (a JSON array of historical bets) and
//! writes reports atomically (write to a tmp file, then rename), so a
//! crash never leaves a half-written report behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, instrument};

use crate::usecases::backtest::HistoricalBet;

/// Load and validate historical bets from a JSON file.
///
/// Every market snapshot is validated; the first invalid one fails the
/// load with its position in the file.
#[instrument]
pub async fn load_dataset(path: &str) -> Result<Vec<HistoricalBet>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read dataset: {path}"))?;

    let bets: Vec<HistoricalBet> =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse dataset: {path}"))?;

    for (i, bet) in bets.iter().enumerate() {
        bet.market
            .validate()
            .with_context(|| format!("Bet {i} ({}) has an invalid market snapshot", bet.market.id))?;
    }

    info!(bets = bets.len(), "Dataset loaded");
    Ok(bets)
}

/// Write `content` to `path` atomically (tmp → rename).
#[instrument(skip(content))]
pub async fn write_report(path: &str, content: &str) -> Result<()> {
    let final_path = Path::new(path);
    if let Some(dir) = final_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .context("Failed to create report directory")?;
    }

    let mut tmp_path = PathBuf::from(final_path);
    tmp_path.as_mut_os_string().push(".tmp");

    fs::write(&tmp_path, content)
        .await
        .context("Failed to write tmp report file")?;
    fs::rename(&tmp_path, final_path)
        .await
        .context("Failed to rename report file")?;

    info!(path = %final_path.display(), bytes = content.len(), "Report written");
    Ok(())
}
