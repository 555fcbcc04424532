use std::collections::BTreeMap;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};

use super::balance::AssetKey;
use crate::error::PortfolioError;

/// (wallet address, asset) pair used to key holdings
pub type HoldingKey = (String, AssetKey);

/// Valuation of the selected wallets at a specific time
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub chain_id: u64,
    /// Refresh generation the snapshot was computed for
    pub generation: u64,
    /// Non-zero decimal amounts per wallet and asset
    pub holdings: BTreeMap<HoldingKey, BigDecimal>,
    /// USD value per asset summed across wallets
    pub value_by_asset: BTreeMap<AssetKey, BigDecimal>,
    pub total_usd: BigDecimal,
    /// True if any required fetch failed
    pub partial: bool,
    /// Degradations observed while building the snapshot
    pub issues: Vec<PortfolioError>,
}

impl PortfolioSnapshot {
    /// Snapshot with nothing in it
    pub fn empty(chain_id: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            chain_id,
            generation: 0,
            holdings: BTreeMap::new(),
            value_by_asset: BTreeMap::new(),
            total_usd: BigDecimal::zero(),
            partial: false,
            issues: Vec::new(),
        }
    }

    /// Amount held by a wallet for an asset
    pub fn holding(&self, wallet: &str, asset: &AssetKey) -> Option<&BigDecimal> {
        self.holdings.get(&(wallet.to_string(), asset.clone()))
    }

    /// Total amount of an asset across wallets
    pub fn asset_amount(&self, asset: &AssetKey) -> BigDecimal {
        self.holdings
            .iter()
            .filter(|((_, a), _)| a == asset)
            .fold(BigDecimal::zero(), |acc, (_, amount)| acc + amount)
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    /// Number of non-zero holdings
    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    /// Same valuation, ignoring timestamp and generation
    pub fn same_valuation(&self, other: &PortfolioSnapshot) -> bool {
        self.chain_id == other.chain_id
            && self.holdings == other.holdings
            && self.value_by_asset == other.value_by_asset
            && self.total_usd == other.total_usd
            && self.partial == other.partial
            && self.issues == other.issues
    }
}

/// Difference between two portfolio snapshots
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PortfolioDiff {
    pub added: Vec<(HoldingKey, BigDecimal)>,
    pub removed: Vec<(HoldingKey, BigDecimal)>,
    pub changes: Vec<HoldingChange>,
    pub total_change_usd: BigDecimal,
}

impl PortfolioDiff {
    /// Create a new empty diff
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare two snapshots
    pub fn between(old: &PortfolioSnapshot, new: &PortfolioSnapshot) -> Self {
        let mut diff = Self::new();

        for (key, new_amount) in &new.holdings {
            match old.holdings.get(key) {
                Some(old_amount) if old_amount != new_amount => {
                    diff.changes.push(HoldingChange::new(key.clone(), old_amount, new_amount));
                }
                Some(_) => {}
                None => diff.added.push((key.clone(), new_amount.clone())),
            }
        }

        for (key, old_amount) in &old.holdings {
            if !new.holdings.contains_key(key) {
                diff.removed.push((key.clone(), old_amount.clone()));
            }
        }

        diff.total_change_usd = &new.total_usd - &old.total_usd;
        diff
    }

    /// Diff for the first published snapshot: everything is new
    pub fn initial(snapshot: &PortfolioSnapshot) -> Self {
        Self {
            added: snapshot
                .holdings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            removed: Vec::new(),
            changes: Vec::new(),
            total_change_usd: snapshot.total_usd.clone(),
        }
    }

    /// Check if holdings changed at all
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changes.is_empty()
    }
}

/// Change in one holding between two snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingChange {
    pub key: HoldingKey,
    pub old_amount: BigDecimal,
    pub new_amount: BigDecimal,
    pub change: BigDecimal,
}

impl HoldingChange {
    pub fn new(key: HoldingKey, old_amount: &BigDecimal, new_amount: &BigDecimal) -> Self {
        Self {
            key,
            old_amount: old_amount.clone(),
            new_amount: new_amount.clone(),
            change: new_amount - old_amount,
        }
    }

    pub fn is_increase(&self) -> bool {
        self.change > BigDecimal::zero()
    }
}
