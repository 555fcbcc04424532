use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use bigdecimal::BigDecimal;

/// Trait for price feed providers
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// USD unit prices for a set of feed ids.
    ///
    /// Ids missing from the result are unknown and valued at zero.
    async fn get_usd_prices(&self, ids: &BTreeSet<String>) -> anyhow::Result<HashMap<String, BigDecimal>>;
}
