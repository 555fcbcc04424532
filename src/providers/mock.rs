//! In-process providers with canned answers, for tests and offline demos.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use num_bigint::BigUint;
use tokio::sync::Notify;

use crate::models::balance::{CallOutcome, ContractCall, ContractMethod};
use crate::traits::{BalanceProvider, BitcoinBalanceProvider, PriceProvider};

/// Price provider returning a fixed table
#[derive(Default)]
pub struct StaticPriceProvider {
    prices: HashMap<String, BigDecimal>,
    unreachable: bool,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl StaticPriceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, feed_id: &str, usd: BigDecimal) -> Self {
        self.prices.insert(feed_id.to_string(), usd);
        self
    }

    /// Every request fails as if the API were down
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Hold every request until the gate is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceProvider for StaticPriceProvider {
    async fn get_usd_prices(&self, ids: &BTreeSet<String>) -> anyhow::Result<HashMap<String, BigDecimal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.unreachable {
            bail!("connection refused");
        }
        Ok(ids
            .iter()
            .filter_map(|id| self.prices.get(id).map(|p| (id.clone(), p.clone())))
            .collect())
    }
}

/// Balance provider backed by in-memory tables
#[derive(Default)]
pub struct StaticBalanceProvider {
    token_balances: HashMap<(String, String), BigUint>,
    native_balances: HashMap<(u64, String), BigUint>,
    metadata: HashMap<String, (String, String, Option<u8>)>,
    failing_owners: HashSet<String>,
    batch_unreachable: bool,
    batch_calls: AtomicUsize,
    native_calls: AtomicUsize,
}

impl StaticBalanceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_balance(mut self, contract: &str, owner: &str, raw: impl Into<BigUint>) -> Self {
        self.token_balances
            .insert((contract.to_ascii_lowercase(), owner.to_ascii_lowercase()), raw.into());
        self
    }

    pub fn with_native_balance(mut self, chain_id: u64, owner: &str, raw: impl Into<BigUint>) -> Self {
        self.native_balances
            .insert((chain_id, owner.to_ascii_lowercase()), raw.into());
        self
    }

    /// Metadata answered by `symbol()`, `name()` and `decimals()`
    pub fn with_metadata(mut self, contract: &str, symbol: &str, name: &str, decimals: Option<u8>) -> Self {
        self.metadata.insert(
            contract.to_ascii_lowercase(),
            (symbol.to_string(), name.to_string(), decimals),
        );
        self
    }

    /// Every read involving this owner fails
    pub fn failing_owner(mut self, owner: &str) -> Self {
        self.failing_owners.insert(owner.to_ascii_lowercase());
        self
    }

    /// Batched reads fail at the transport level
    pub fn batch_unreachable(mut self) -> Self {
        self.batch_unreachable = true;
        self
    }

    pub fn batch_call_count(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn native_call_count(&self) -> usize {
        self.native_calls.load(Ordering::SeqCst)
    }

    fn answer(&self, call: &ContractCall) -> CallOutcome {
        let contract = call.contract.to_ascii_lowercase();
        match &call.method {
            ContractMethod::BalanceOf { owner } => {
                let owner = owner.to_ascii_lowercase();
                if self.failing_owners.contains(&owner) {
                    return CallOutcome::failure("execution reverted");
                }
                let raw = self
                    .token_balances
                    .get(&(contract, owner))
                    .cloned()
                    .unwrap_or_default();
                CallOutcome::uint(raw)
            }
            ContractMethod::Symbol => match self.metadata.get(&contract) {
                Some((symbol, _, _)) => CallOutcome::text(symbol.clone()),
                None => CallOutcome::failure("execution reverted"),
            },
            ContractMethod::Name => match self.metadata.get(&contract) {
                Some((_, name, _)) => CallOutcome::text(name.clone()),
                None => CallOutcome::failure("execution reverted"),
            },
            ContractMethod::Decimals => match self.metadata.get(&contract) {
                Some((_, _, Some(decimals))) => CallOutcome::uint(*decimals),
                _ => CallOutcome::failure("execution reverted"),
            },
        }
    }
}

#[async_trait]
impl BalanceProvider for StaticBalanceProvider {
    async fn batch_read(&self, calls: &[ContractCall]) -> anyhow::Result<Vec<CallOutcome>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.batch_unreachable {
            bail!("RPC endpoint unreachable");
        }
        Ok(calls.iter().map(|c| self.answer(c)).collect())
    }

    async fn read_native(&self, chain_id: u64, address: &str) -> anyhow::Result<BigUint> {
        self.native_calls.fetch_add(1, Ordering::SeqCst);
        let owner = address.to_ascii_lowercase();
        if self.failing_owners.contains(&owner) {
            return Err(anyhow!("eth_getBalance failed for {}", address));
        }
        Ok(self
            .native_balances
            .get(&(chain_id, owner))
            .cloned()
            .unwrap_or_default())
    }
}

/// Bitcoin provider backed by a satoshi table
#[derive(Default)]
pub struct StaticBitcoinProvider {
    balances: HashMap<String, u64>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl StaticBitcoinProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, address: &str, sats: u64) -> Self {
        self.balances.insert(address.to_string(), sats);
        self
    }

    pub fn failing(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BitcoinBalanceProvider for StaticBitcoinProvider {
    async fn get_balance(&self, address: &str) -> anyhow::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(address) {
            bail!("bitcoin API returned status 502 for {}", address);
        }
        Ok(self.balances.get(address).copied().unwrap_or(0))
    }
}
