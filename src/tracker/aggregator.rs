use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use futures_util::future::join_all;
use num_bigint::BigUint;
use tracing::{debug, info, warn};

use crate::error::PortfolioError;
use crate::models::balance::{AssetKey, BalanceEntry, BalanceResult, BalanceSheet, CallOutcome, ContractCall};
use crate::models::portfolio::PortfolioSnapshot;
use crate::models::price::PriceSnapshot;
use crate::models::token::{chain_info, TokenDescriptor, BITCOIN_DECIMALS, BITCOIN_FEED_ID};
use crate::models::wallet::{classify, AddressKind};
use crate::traits::{BalanceProvider, BitcoinBalanceProvider, PriceProvider};
use crate::tracker::token_registry::TokenRegistry;
use crate::utils::helper::to_decimal_amount;

/// Everything one valuation needs, frozen at the time it was built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationInput {
    pub chain_id: u64,
    /// Selected wallets; invalid entries are skipped
    pub wallets: Vec<String>,
    /// Tracked tokens for `chain_id`
    pub tokens: Vec<TokenDescriptor>,
}

impl AggregationInput {
    pub fn new(chain_id: u64, wallets: Vec<String>, registry: &TokenRegistry) -> Self {
        Self {
            chain_id,
            wallets,
            tokens: registry.resolve(chain_id),
        }
    }

    /// Input with no wallets selected
    pub fn empty(chain_id: u64) -> Self {
        Self {
            chain_id,
            wallets: Vec::new(),
            tokens: Vec::new(),
        }
    }

    /// Price feed ids needed to value this input
    pub fn price_ids(&self) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        ids.insert(chain_info(self.chain_id).native_feed_id.to_string());
        ids.insert(BITCOIN_FEED_ID.to_string());
        for token in &self.tokens {
            ids.insert(token.price_feed_id.clone());
        }
        ids
    }

    fn partition_wallets(&self) -> (Vec<&str>, Vec<&str>) {
        let mut evm = Vec::new();
        let mut bitcoin = Vec::new();
        for wallet in &self.wallets {
            match classify(wallet) {
                AddressKind::Evm => evm.push(wallet.as_str()),
                AddressKind::Bitcoin => bitcoin.push(wallet.as_str()),
                AddressKind::Invalid => debug!("Skipping invalid wallet {}", wallet),
            }
        }
        (evm, bitcoin)
    }
}

/// Computes portfolio snapshots from balance and price providers
pub struct PortfolioAggregator {
    balances: Arc<dyn BalanceProvider>,
    prices: Arc<dyn PriceProvider>,
    bitcoin: Arc<dyn BitcoinBalanceProvider>,
}

impl PortfolioAggregator {
    pub fn new(
        balances: Arc<dyn BalanceProvider>,
        prices: Arc<dyn PriceProvider>,
        bitcoin: Arc<dyn BitcoinBalanceProvider>,
    ) -> Self {
        Self {
            balances,
            prices,
            bitcoin,
        }
    }

    pub fn balance_provider(&self) -> Arc<dyn BalanceProvider> {
        self.balances.clone()
    }

    /// Value the given wallets on one chain. Never fails; degradations are
    /// reported on the snapshot.
    pub async fn aggregate(&self, wallets: &[String], registry: &TokenRegistry, chain_id: u64) -> PortfolioSnapshot {
        let input = AggregationInput::new(chain_id, wallets.to_vec(), registry);
        self.aggregate_input(&input, 0).await
    }

    /// Full cycle: prices and balances fetched concurrently, then valued
    pub async fn aggregate_input(&self, input: &AggregationInput, generation: u64) -> PortfolioSnapshot {
        debug!(
            "Aggregating {} wallet(s) and {} token(s) on chain {}",
            input.wallets.len(),
            input.tokens.len(),
            input.chain_id
        );
        let (prices, balances) = tokio::join!(self.fetch_prices(input), self.fetch_balances(input));
        Self::value(input, &balances, &prices, generation)
    }

    /// One batched price request for every feed the input needs
    pub async fn fetch_prices(&self, input: &AggregationInput) -> PriceSnapshot {
        let ids = input.price_ids();
        match self.prices.get_usd_prices(&ids).await {
            Ok(prices) => {
                debug!("Fetched {} of {} price(s)", prices.len(), ids.len());
                PriceSnapshot::new(prices)
            }
            Err(e) => {
                warn!("Price fetch failed: {:#}", e);
                PriceSnapshot::unavailable(format!("{:#}", e))
            }
        }
    }

    /// Read every balance of the input. Token balances go out as one batch,
    /// native and Bitcoin reads fan out alongside it.
    pub async fn fetch_balances(&self, input: &AggregationInput) -> BalanceSheet {
        let (evm_wallets, bitcoin_wallets) = input.partition_wallets();
        let chain_id = input.chain_id;

        // wallet-major cross product; results are correlated by position
        let mut token_targets: Vec<(&str, &TokenDescriptor)> = Vec::new();
        let mut calls = Vec::new();
        for &wallet in &evm_wallets {
            for token in &input.tokens {
                if let Some(contract) = token.contract_address.as_deref() {
                    token_targets.push((wallet, token));
                    calls.push(ContractCall::balance_of(chain_id, contract, wallet));
                }
            }
        }

        let token_reads = async {
            if calls.is_empty() {
                Ok(Vec::new())
            } else {
                self.balances.batch_read(&calls).await
            }
        };
        let native_reads = join_all(
            evm_wallets
                .iter()
                .map(|wallet| self.balances.read_native(chain_id, wallet)),
        );
        let bitcoin_reads = join_all(bitcoin_wallets.iter().map(|wallet| self.bitcoin.get_balance(wallet)));

        let (token_outcomes, native_results, bitcoin_results) = tokio::join!(token_reads, native_reads, bitcoin_reads);

        let mut sheet = BalanceSheet::default();

        let native = TokenDescriptor::native(chain_id);
        for (wallet, result) in evm_wallets.iter().zip(native_results) {
            if let Err(e) = &result {
                warn!("Native balance read failed for {}: {:#}", wallet, e);
            }
            sheet.entries.push(entry(wallet, &native, result.into()));
        }

        let outcomes: Vec<BalanceResult> = match token_outcomes {
            Ok(outcomes) if outcomes.len() == calls.len() => {
                outcomes.into_iter().map(CallOutcome::into_balance).collect()
            }
            Ok(outcomes) => {
                let reason = format!("expected {} results, got {}", calls.len(), outcomes.len());
                warn!("Token balance batch on chain {} is malformed: {}", chain_id, reason);
                vec![BalanceResult::Failure(reason); calls.len()]
            }
            Err(e) => {
                warn!("Token balance batch on chain {} failed: {:#}", chain_id, e);
                vec![BalanceResult::Failure(format!("{:#}", e)); calls.len()]
            }
        };
        for ((wallet, token), result) in token_targets.into_iter().zip(outcomes) {
            sheet.entries.push(entry(wallet, token, result));
        }

        for (wallet, result) in bitcoin_wallets.iter().zip(bitcoin_results) {
            if let Err(e) = &result {
                warn!("Bitcoin balance read failed for {}: {:#}", wallet, e);
            }
            sheet.entries.push(BalanceEntry {
                wallet: wallet.to_string(),
                asset: AssetKey::Bitcoin,
                symbol: "BTC".to_string(),
                price_feed_id: BITCOIN_FEED_ID.to_string(),
                decimals: BITCOIN_DECIMALS,
                result: result.map(BigUint::from).into(),
            });
        }

        debug!("Read {} balance(s), {} failed", sheet.attempted(), sheet.failed());
        sheet
    }

    /// Turn balances and prices into a snapshot. Pure.
    pub fn value(
        input: &AggregationInput,
        balances: &BalanceSheet,
        prices: &PriceSnapshot,
        generation: u64,
    ) -> PortfolioSnapshot {
        let priced = prices.is_usable();
        let mut holdings = BTreeMap::new();
        let mut value_by_asset: BTreeMap<AssetKey, BigDecimal> = BTreeMap::new();
        let mut total_usd = BigDecimal::zero();

        for balance in &balances.entries {
            let raw = match &balance.result {
                BalanceResult::Success(raw) if !raw.is_zero() => raw,
                _ => continue,
            };
            let amount = to_decimal_amount(raw, balance.decimals);

            if priced {
                let price = prices.get(&balance.price_feed_id).cloned().unwrap_or_else(BigDecimal::zero);
                let usd = &amount * &price;
                total_usd += &usd;
                *value_by_asset
                    .entry(balance.asset.clone())
                    .or_insert_with(BigDecimal::zero) += usd;
            }

            *holdings
                .entry((balance.wallet.clone(), balance.asset.clone()))
                .or_insert_with(BigDecimal::zero) += amount;
        }

        let mut issues = Vec::new();
        if !priced {
            let reason = prices
                .error
                .clone()
                .unwrap_or_else(|| "no prices returned".to_string());
            issues.push(PortfolioError::remote_unavailable("price", reason));
        }
        let failed = balances.failed();
        if failed > 0 {
            issues.push(PortfolioError::PartialFailure {
                failed,
                attempted: balances.attempted(),
            });
        }

        let snapshot = PortfolioSnapshot {
            timestamp: Utc::now(),
            chain_id: input.chain_id,
            generation,
            holdings,
            value_by_asset,
            total_usd,
            partial: !issues.is_empty(),
            issues,
        };

        info!(
            "Valued {} holding(s) on chain {}: ${} (partial: {})",
            snapshot.holding_count(),
            snapshot.chain_id,
            snapshot.total_usd.round(2),
            snapshot.partial
        );
        snapshot
    }
}

fn entry(wallet: &str, token: &TokenDescriptor, result: BalanceResult) -> BalanceEntry {
    BalanceEntry {
        wallet: wallet.to_string(),
        asset: token.asset_key(),
        symbol: token.symbol.clone(),
        price_feed_id: token.price_feed_id.clone(),
        decimals: token.resolved_decimals(),
        result,
    }
}
