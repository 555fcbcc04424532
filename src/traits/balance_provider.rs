use async_trait::async_trait;
use num_bigint::BigUint;

use crate::models::balance::{CallOutcome, ContractCall};

/// Read-only access to EVM chain state
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Execute many contract reads in one round trip.
    ///
    /// The returned outcomes are in call order. A transport error fails the
    /// whole batch; a reverted call only fails its own entry.
    async fn batch_read(&self, calls: &[ContractCall]) -> anyhow::Result<Vec<CallOutcome>>;

    /// Native coin balance of an address, in wei
    async fn read_native(&self, chain_id: u64, address: &str) -> anyhow::Result<BigUint>;
}
