use std::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Identifies one asset in a valuation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetKey {
    Native { chain_id: u64 },
    Token { chain_id: u64, contract: String },
    Bitcoin,
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKey::Native { chain_id } => write!(f, "native:{}", chain_id),
            AssetKey::Token { chain_id, contract } => write!(f, "{}:{}", chain_id, contract),
            AssetKey::Bitcoin => write!(f, "bitcoin"),
        }
    }
}

/// Read-only contract method understood by a [`crate::BalanceProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractMethod {
    BalanceOf { owner: String },
    Symbol,
    Name,
    Decimals,
}

/// One entry of a batched read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub chain_id: u64,
    pub contract: String,
    pub method: ContractMethod,
}

impl ContractCall {
    pub fn balance_of(chain_id: u64, contract: &str, owner: &str) -> Self {
        Self {
            chain_id,
            contract: contract.to_string(),
            method: ContractMethod::BalanceOf { owner: owner.to_string() },
        }
    }

    pub fn symbol(chain_id: u64, contract: &str) -> Self {
        Self { chain_id, contract: contract.to_string(), method: ContractMethod::Symbol }
    }

    pub fn name(chain_id: u64, contract: &str) -> Self {
        Self { chain_id, contract: contract.to_string(), method: ContractMethod::Name }
    }

    pub fn decimals(chain_id: u64, contract: &str) -> Self {
        Self { chain_id, contract: contract.to_string(), method: ContractMethod::Decimals }
    }
}

/// Decoded return value of a contract read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallValue {
    Uint(BigUint),
    Text(String),
}

/// Per-call status of a batched read, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success(CallValue),
    Failure(String),
}

impl CallOutcome {
    pub fn uint(value: impl Into<BigUint>) -> Self {
        CallOutcome::Success(CallValue::Uint(value.into()))
    }

    pub fn text(value: impl Into<String>) -> Self {
        CallOutcome::Success(CallValue::Text(value.into()))
    }

    pub fn failure(reason: impl ToString) -> Self {
        CallOutcome::Failure(reason.to_string())
    }

    /// Interpret the outcome as a balance
    pub fn into_balance(self) -> BalanceResult {
        match self {
            CallOutcome::Success(CallValue::Uint(amount)) => BalanceResult::Success(amount),
            CallOutcome::Success(CallValue::Text(_)) => {
                BalanceResult::Failure("expected an integer balance".to_string())
            }
            CallOutcome::Failure(reason) => BalanceResult::Failure(reason),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CallOutcome::Success(CallValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<&BigUint> {
        match self {
            CallOutcome::Success(CallValue::Uint(v)) => Some(v),
            _ => None,
        }
    }
}

/// Raw balance in the asset's smallest unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceResult {
    Success(BigUint),
    Failure(String),
}

impl BalanceResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, BalanceResult::Failure(_))
    }
}

impl<E: fmt::Display> From<Result<BigUint, E>> for BalanceResult {
    fn from(result: Result<BigUint, E>) -> Self {
        match result {
            Ok(amount) => BalanceResult::Success(amount),
            Err(e) => BalanceResult::Failure(e.to_string()),
        }
    }
}

/// A balance read for one wallet and asset, with what is needed to value it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceEntry {
    pub wallet: String,
    pub asset: AssetKey,
    pub symbol: String,
    pub price_feed_id: String,
    pub decimals: u8,
    pub result: BalanceResult,
}

/// All balance reads of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSheet {
    pub entries: Vec<BalanceEntry>,
}

impl BalanceSheet {
    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_failure()).count()
    }

    pub fn attempted(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_to_balance() {
        assert_eq!(
            CallOutcome::uint(42u32).into_balance(),
            BalanceResult::Success(BigUint::from(42u32))
        );
        assert!(CallOutcome::text("USDT").into_balance().is_failure());
        assert!(CallOutcome::failure("reverted").into_balance().is_failure());
    }

    #[test]
    fn sheet_counts_failures() {
        let entry = |result| BalanceEntry {
            wallet: "w".into(),
            asset: AssetKey::Bitcoin,
            symbol: "BTC".into(),
            price_feed_id: "bitcoin".into(),
            decimals: 8,
            result,
        };
        let sheet = BalanceSheet {
            entries: vec![
                entry(BalanceResult::Success(BigUint::from(1u8))),
                entry(BalanceResult::Failure("timeout".into())),
            ],
        };
        assert_eq!(sheet.failed(), 1);
        assert_eq!(sheet.attempted(), 2);
    }
}
