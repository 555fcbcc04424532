use thiserror::Error;

/// Errors surfaced by the portfolio engine.
///
/// `InvalidAddress` and `ContractReadError` are returned to the caller as
/// rejections. `RemoteUnavailable` and `PartialFailure` never abort a
/// valuation; they are attached to the snapshot as issues instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortfolioError {
    #[error("invalid address: {address}")]
    InvalidAddress { address: String },

    #[error("contract read failed for {address}: {reason}")]
    ContractReadError { address: String, reason: String },

    #[error("{provider} provider unavailable: {reason}")]
    RemoteUnavailable { provider: String, reason: String },

    #[error("{failed} of {attempted} balance reads failed")]
    PartialFailure { failed: usize, attempted: usize },
}

impl PortfolioError {
    pub fn invalid_address(address: impl Into<String>) -> Self {
        Self::InvalidAddress { address: address.into() }
    }

    pub fn contract_read(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::ContractReadError {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn remote_unavailable(provider: impl Into<String>, reason: impl ToString) -> Self {
        Self::RemoteUnavailable {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_carry_the_offending_input() {
        let err = PortfolioError::invalid_address("0xnope");
        assert_eq!(err.to_string(), "invalid address: 0xnope");

        let err = PortfolioError::contract_read("0xabc", "execution reverted");
        assert!(err.to_string().contains("0xabc"));
        assert!(err.to_string().contains("execution reverted"));
    }

    #[test]
    fn partial_failure_reports_counts() {
        let err = PortfolioError::PartialFailure { failed: 1, attempted: 3 };
        assert_eq!(err.to_string(), "1 of 3 balance reads failed");
    }
}
