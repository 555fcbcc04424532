use std::collections::HashMap;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

/// USD unit prices keyed by price feed id, replaced wholesale on every fetch
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub prices: HashMap<String, BigDecimal>,
    pub fetched_at: DateTime<Utc>,
    /// Why the fetch failed; `None` when the provider answered
    pub error: Option<String>,
}

impl PriceSnapshot {
    pub fn new(prices: HashMap<String, BigDecimal>) -> Self {
        Self {
            prices,
            fetched_at: Utc::now(),
            error: None,
        }
    }

    /// Snapshot for a provider that could not be reached
    pub fn unavailable(reason: impl ToString) -> Self {
        Self {
            prices: HashMap::new(),
            fetched_at: Utc::now(),
            error: Some(reason.to_string()),
        }
    }

    /// Price for a feed id; missing feeds are priced at zero by the caller
    pub fn get(&self, feed_id: &str) -> Option<&BigDecimal> {
        self.prices.get(feed_id)
    }

    /// A fetch that failed or returned nothing cannot value anything
    pub fn is_usable(&self) -> bool {
        self.error.is_none() && !self.prices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn empty_or_failed_snapshots_are_unusable() {
        assert!(!PriceSnapshot::new(HashMap::new()).is_usable());
        assert!(!PriceSnapshot::unavailable("timeout").is_usable());

        let mut prices = HashMap::new();
        prices.insert("bitcoin".to_string(), BigDecimal::from_str("65000").unwrap());
        let snapshot = PriceSnapshot::new(prices);
        assert!(snapshot.is_usable());
        assert!(snapshot.get("ethereum").is_none());
    }
}
