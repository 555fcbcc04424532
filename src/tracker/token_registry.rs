use std::collections::HashMap;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::PortfolioError;
use crate::models::balance::{CallOutcome, ContractCall};
use crate::models::token::{default_tokens, price_feed_id_from_name, supported_chains, TokenDescriptor};
use crate::models::wallet::{classify, AddressKind};
use crate::traits::balance_provider::BalanceProvider;
use crate::traits::store::CustomTokens;

const DEFAULT_IMPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Merge custom tokens after defaults, dropping any whose contract is already
/// present (case-insensitive) among the defaults or earlier custom tokens
pub fn merge_tokens(defaults: &[TokenDescriptor], custom: &[TokenDescriptor]) -> Vec<TokenDescriptor> {
    let mut merged: Vec<TokenDescriptor> = defaults.to_vec();
    for token in custom {
        if !merged.iter().any(|t| t.same_contract(token)) {
            merged.push(token.clone());
        }
    }
    merged
}

/// Per-chain tracked tokens: built-in defaults plus user-imported ones
pub struct TokenRegistry {
    defaults: HashMap<u64, Vec<TokenDescriptor>>,
    custom: DashMap<u64, Vec<TokenDescriptor>>,
    import_timeout: Duration,
}

impl TokenRegistry {
    /// Registry with the built-in token tables of every supported chain
    pub fn new() -> Self {
        let defaults = supported_chains()
            .map(|chain| (chain, default_tokens(chain)))
            .collect();
        Self::with_defaults(defaults)
    }

    /// Registry with caller-provided defaults
    pub fn with_defaults(defaults: HashMap<u64, Vec<TokenDescriptor>>) -> Self {
        Self {
            defaults,
            custom: DashMap::new(),
            import_timeout: DEFAULT_IMPORT_TIMEOUT,
        }
    }

    pub fn with_import_timeout(mut self, import_timeout: Duration) -> Self {
        self.import_timeout = import_timeout;
        self
    }

    /// Load persisted custom tokens, skipping duplicates
    pub fn load_custom(&self, tokens: CustomTokens) {
        let mut loaded = 0;
        for (_, list) in tokens {
            for token in list {
                if self.register_custom(token) {
                    loaded += 1;
                }
            }
        }
        debug!("Loaded {} custom token(s)", loaded);
    }

    /// Tracked tokens for a chain, sorted by symbol
    pub fn resolve(&self, chain_id: u64) -> Vec<TokenDescriptor> {
        let defaults = self.defaults.get(&chain_id).map(Vec::as_slice).unwrap_or(&[]);
        let custom = self
            .custom
            .get(&chain_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        let mut tokens = merge_tokens(defaults, &custom);
        tokens.sort_by(|a, b| a.symbol.to_lowercase().cmp(&b.symbol.to_lowercase()));
        tokens
    }

    /// Snapshot of custom tokens for persistence
    pub fn custom_tokens(&self) -> CustomTokens {
        self.custom
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Find the tracked descriptor for a contract
    pub fn find(&self, chain_id: u64, address: &str) -> Option<TokenDescriptor> {
        self.resolve(chain_id).into_iter().find(|t| {
            t.contract_address
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(address))
        })
    }

    /// Add a custom token. Returns false when the contract is already tracked.
    pub fn register_custom(&self, token: TokenDescriptor) -> bool {
        if token.contract_address.is_none() {
            return false;
        }
        let in_defaults = self
            .defaults
            .get(&token.chain_id)
            .is_some_and(|d| d.iter().any(|t| t.same_contract(&token)));
        if in_defaults {
            return false;
        }

        let mut entry = self.custom.entry(token.chain_id).or_default();
        if entry.iter().any(|t| t.same_contract(&token)) {
            return false;
        }
        entry.push(token);
        true
    }

    /// Remove a custom token. Default tokens cannot be removed.
    pub fn remove_custom(&self, chain_id: u64, address: &str) -> bool {
        match self.custom.get_mut(&chain_id) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|t| {
                    !t.contract_address
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(address))
                });
                entry.len() != before
            }
            None => false,
        }
    }

    /// Import an ERC-20 by reading its metadata from the chain.
    ///
    /// `symbol()` and `name()` are required; `decimals()` is best effort and
    /// falls back to the symbol table. A contract that is already tracked
    /// returns the existing descriptor unchanged.
    pub async fn import_token(
        &self,
        provider: &dyn BalanceProvider,
        chain_id: u64,
        address: &str,
    ) -> Result<TokenDescriptor, PortfolioError> {
        let address = address.trim();
        if classify(address) != AddressKind::Evm {
            return Err(PortfolioError::invalid_address(address));
        }
        if let Some(existing) = self.find(chain_id, address) {
            debug!("{} is already tracked on chain {}", address, chain_id);
            return Ok(existing);
        }

        let calls = [
            ContractCall::symbol(chain_id, address),
            ContractCall::name(chain_id, address),
            ContractCall::decimals(chain_id, address),
        ];
        let outcomes = match timeout(self.import_timeout, provider.batch_read(&calls)).await {
            Ok(Ok(outcomes)) => outcomes,
            Ok(Err(e)) => return Err(PortfolioError::contract_read(address, format!("{:#}", e))),
            Err(_) => {
                return Err(PortfolioError::contract_read(
                    address,
                    format!("timed out after {:?}", self.import_timeout),
                ))
            }
        };

        let symbol = text_result(&outcomes, 0, "symbol", address)?;
        let name = text_result(&outcomes, 1, "name", address)?;
        let decimals = outcomes
            .get(2)
            .and_then(CallOutcome::as_uint)
            .and_then(|d| u8::try_from(d).ok());

        let token = TokenDescriptor {
            contract_address: Some(address.to_string()),
            price_feed_id: price_feed_id_from_name(&name),
            symbol,
            name,
            decimals,
            chain_id,
        };

        if self.register_custom(token.clone()) {
            info!(
                "Imported {} ({}) on chain {} with feed id {}",
                token.symbol, token.name, chain_id, token.price_feed_id
            );
            Ok(token)
        } else {
            debug!("{} is already tracked on chain {}", address, chain_id);
            Ok(self.find(chain_id, address).unwrap_or(token))
        }
    }
}

impl Default for TokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn text_result(
    outcomes: &[CallOutcome],
    idx: usize,
    field: &str,
    address: &str,
) -> Result<String, PortfolioError> {
    match outcomes.get(idx) {
        Some(CallOutcome::Failure(reason)) => {
            Err(PortfolioError::contract_read(address, format!("{}() failed: {}", field, reason)))
        }
        Some(outcome) => match outcome.as_text().map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            _ => Err(PortfolioError::contract_read(address, format!("{}() returned no text", field))),
        },
        None => Err(PortfolioError::contract_read(address, format!("missing {}() result", field))),
    }
}
