use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::PortfolioError;
use crate::models::portfolio::{PortfolioDiff, PortfolioSnapshot};
use crate::traits::event_handler::PortfolioEventHandler;
use crate::utils::helper::{format_address, format_usd};

/// Console logging event handler
pub struct ConsoleEventHandler {
    /// Log holdings even when nothing changed
    verbose: bool,
}

impl ConsoleEventHandler {
    /// Create a new console event handler
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn log_snapshot(&self, snapshot: &PortfolioSnapshot) {
        info!("{}", "=".repeat(80));
        info!("PORTFOLIO SNAPSHOT");
        info!("{}", "=".repeat(80));
        info!(
            "Chain: {} | Generation: {} | {}",
            snapshot.chain_id,
            snapshot.generation,
            snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );

        if snapshot.is_empty() {
            info!("No holdings found in selected wallets");
        } else {
            info!("");
            info!("HOLDINGS:");
            info!("{}", "-".repeat(80));
            for ((wallet, asset), amount) in &snapshot.holdings {
                info!("  {} {}: {}", format_address(wallet), asset, amount);
            }
        }

        if !snapshot.value_by_asset.is_empty() {
            info!("");
            info!("VALUE BY ASSET:");
            info!("{}", "-".repeat(80));
            for (asset, usd) in &snapshot.value_by_asset {
                info!("  {}: {}", asset, format_usd(usd));
            }
        }

        info!("{}", "-".repeat(80));
        info!("➤ Total Portfolio Value: {}", format_usd(&snapshot.total_usd));
        if snapshot.partial {
            let issues: Vec<String> = snapshot.issues.iter().map(ToString::to_string).collect();
            warn!("Snapshot is partial: {}", issues.join("; "));
        }
        info!("{}", "=".repeat(80));
    }

    fn log_diff(&self, diff: &PortfolioDiff) {
        info!("Portfolio changes detected:");
        info!("{}", "-".repeat(80));

        for ((wallet, asset), amount) in &diff.added {
            info!("  + {} on {}", asset, format_address(wallet));
            info!("     Amount: {}", amount);
        }

        for ((wallet, asset), amount) in &diff.removed {
            info!("  - {} on {}", asset, format_address(wallet));
            info!("     Last amount: {}", amount);
        }

        if !diff.changes.is_empty() {
            info!("  Balance Changes:");
            for change in &diff.changes {
                let indicator = if change.is_increase() { "↑" } else { "↓" };
                let (wallet, asset) = &change.key;
                info!("    {} {} on {}", indicator, asset, format_address(wallet));
                info!("       From: {} → {}", change.old_amount, change.new_amount);
                info!("       Change: {}", change.change);
            }
        }

        info!("  Total value change: {}", format_usd(&diff.total_change_usd));
    }
}

impl Default for ConsoleEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortfolioEventHandler for ConsoleEventHandler {
    async fn handle_snapshot(&self, snapshot: &PortfolioSnapshot, diff: &PortfolioDiff) {
        if diff.is_empty() && !self.verbose {
            info!(
                "Portfolio unchanged: {} (partial: {})",
                format_usd(&snapshot.total_usd),
                snapshot.partial
            );
            return;
        }

        self.log_snapshot(snapshot);
        if !diff.is_empty() {
            self.log_diff(diff);
        }
    }

    async fn handle_error(&self, error: &PortfolioError) {
        warn!("Portfolio tracker error: {}", error);
    }
}
