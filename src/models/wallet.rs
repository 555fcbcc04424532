use serde::{Deserialize, Serialize};

use crate::error::PortfolioError;

const EVM_ADDRESS_LEN: usize = 42;
const BITCOIN_MIN_LEN_EXCLUSIVE: usize = 25;
const BITCOIN_MAX_LEN_EXCLUSIVE: usize = 65;

/// Address family of a tracked wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    Evm,
    Bitcoin,
    Invalid,
}

/// Classify a raw address string.
///
/// EVM means `0x` followed by exactly 40 hex digits of either case. Bitcoin is a
/// loose prefix heuristic (`1`, `3` or `bc1`) with a length strictly between 25
/// and 65 characters; malformed addresses that pass it simply fail later at the
/// balance lookup.
pub fn classify(address: &str) -> AddressKind {
    if is_evm_address(address) {
        return AddressKind::Evm;
    }

    let has_btc_prefix =
        address.starts_with('1') || address.starts_with('3') || address.starts_with("bc1");
    let len = address.chars().count();

    if has_btc_prefix && len > BITCOIN_MIN_LEN_EXCLUSIVE && len < BITCOIN_MAX_LEN_EXCLUSIVE {
        AddressKind::Bitcoin
    } else {
        AddressKind::Invalid
    }
}

fn is_evm_address(address: &str) -> bool {
    address.len() == EVM_ADDRESS_LEN
        && address.starts_with("0x")
        && address[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// A wallet admitted to the tracked list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Wallet {
    pub address: String,
    pub kind: AddressKind,
}

impl Wallet {
    /// Parse a wallet, rejecting anything the classifier calls invalid
    pub fn parse(address: &str) -> Result<Self, PortfolioError> {
        match classify(address) {
            AddressKind::Invalid => Err(PortfolioError::invalid_address(address)),
            kind => Ok(Self {
                address: address.to_string(),
                kind,
            }),
        }
    }

    /// Two wallets refer to the same account. EVM hex is case-insensitive.
    pub fn same_account(&self, other: &str) -> bool {
        match self.kind {
            AddressKind::Evm => self.address.eq_ignore_ascii_case(other),
            _ => self.address == other,
        }
    }
}

/// The user's wallet list plus the subset currently selected for valuation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBook {
    wallets: Vec<String>,
    selected: Vec<String>,
}

impl WalletBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a book from persisted state, dropping entries that no longer
    /// classify and selections that point at unknown wallets
    pub fn from_parts(wallets: Vec<String>, selected: Vec<String>) -> Self {
        let mut book = Self::new();
        for address in wallets {
            if let Ok(wallet) = Wallet::parse(address.trim()) {
                if book.position(&wallet.address).is_none() {
                    book.wallets.push(wallet.address);
                }
            }
        }
        for address in selected {
            if let Some(idx) = book.position(&address) {
                let canonical = book.wallets[idx].clone();
                if !book.selected.contains(&canonical) {
                    book.selected.push(canonical);
                }
            }
        }
        book
    }

    pub fn wallets(&self) -> &[String] {
        &self.wallets
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn is_selected(&self, address: &str) -> bool {
        self.position(address)
            .map(|idx| self.selected.contains(&self.wallets[idx]))
            .unwrap_or(false)
    }

    /// Selected wallets, in list order
    pub fn selected_wallets(&self) -> Vec<String> {
        self.wallets
            .iter()
            .filter(|w| self.selected.contains(w))
            .cloned()
            .collect()
    }

    /// Add a wallet; new wallets start selected. Returns false if already present.
    pub fn add(&mut self, address: &str) -> Result<bool, PortfolioError> {
        let wallet = Wallet::parse(address.trim())?;
        if self.position(&wallet.address).is_some() {
            return Ok(false);
        }
        self.selected.push(wallet.address.clone());
        self.wallets.push(wallet.address);
        Ok(true)
    }

    /// Remove a wallet and its selection. Returns false if it was not tracked.
    pub fn remove(&mut self, address: &str) -> bool {
        match self.position(address.trim()) {
            Some(idx) => {
                let removed = self.wallets.remove(idx);
                self.selected.retain(|w| w != &removed);
                true
            }
            None => false,
        }
    }

    /// Flip selection for a tracked wallet. Returns the new state, or None if unknown.
    pub fn toggle(&mut self, address: &str) -> Option<bool> {
        let idx = self.position(address.trim())?;
        let canonical = self.wallets[idx].clone();
        if let Some(pos) = self.selected.iter().position(|w| w == &canonical) {
            self.selected.remove(pos);
            Some(false)
        } else {
            self.selected.push(canonical);
            Some(true)
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.wallets.clone();
    }

    /// Selected addresses in persisted form
    pub fn selection(&self) -> &[String] {
        &self.selected
    }

    fn position(&self, address: &str) -> Option<usize> {
        let probe = Wallet {
            address: address.to_string(),
            kind: classify(address),
        };
        self.wallets.iter().position(|w| probe.same_account(w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVM: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
    const BTC: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    #[test]
    fn classifies_evm_addresses_case_insensitively() {
        assert_eq!(classify(EVM), AddressKind::Evm);
        assert_eq!(classify(&EVM.to_lowercase()), AddressKind::Evm);
        assert_eq!(classify(&format!("0x{}", "f".repeat(40))), AddressKind::Evm);
        // 39 and 41 hex digits
        assert_eq!(classify(&format!("0x{}", "a".repeat(39))), AddressKind::Invalid);
        assert_eq!(classify(&format!("0x{}", "a".repeat(41))), AddressKind::Invalid);
        assert_eq!(classify(&format!("0x{}g", "a".repeat(39))), AddressKind::Invalid);
    }

    #[test]
    fn classifies_bitcoin_by_prefix_and_length() {
        assert_eq!(BTC.len(), 42);
        assert_eq!(classify(BTC), AddressKind::Bitcoin);
        assert_eq!(classify("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"), AddressKind::Bitcoin);
        assert_eq!(classify("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy"), AddressKind::Bitcoin);
    }

    #[test]
    fn bitcoin_length_bounds_are_exclusive() {
        let at_min = format!("1{}", "a".repeat(24));
        let above_min = format!("1{}", "a".repeat(25));
        let below_max = format!("bc1{}", "q".repeat(61));
        let at_max = format!("bc1{}", "q".repeat(62));

        assert_eq!(at_min.len(), 25);
        assert_eq!(classify(&at_min), AddressKind::Invalid);
        assert_eq!(classify(&above_min), AddressKind::Bitcoin);
        assert_eq!(below_max.len(), 64);
        assert_eq!(classify(&below_max), AddressKind::Bitcoin);
        assert_eq!(classify(&at_max), AddressKind::Invalid);
    }

    #[test]
    fn everything_else_is_invalid() {
        for input in ["notanaddress", "", "0x", " 0x52908400098527886E0F7030069857D2E4169EE7", "2NBFNJTktNa7GZusGbDbGKRZTxdK9VVez3n"] {
            assert_eq!(classify(input), AddressKind::Invalid, "{input}");
            // idempotent
            assert_eq!(classify(input), classify(input));
        }
    }

    #[test]
    fn book_adds_selects_and_dedups() {
        let mut book = WalletBook::new();
        assert!(book.add(EVM).unwrap());
        assert!(!book.add(&EVM.to_lowercase()).unwrap());
        assert!(book.add(&format!("  {BTC} ")).unwrap());
        assert_eq!(book.len(), 2);
        assert_eq!(book.selected_wallets(), vec![EVM.to_string(), BTC.to_string()]);

        let err = book.add("notanaddress").unwrap_err();
        assert_eq!(err, PortfolioError::invalid_address("notanaddress"));
    }

    #[test]
    fn book_toggle_and_remove() {
        let mut book = WalletBook::new();
        book.add(EVM).unwrap();
        book.add(BTC).unwrap();

        assert_eq!(book.toggle(&EVM.to_lowercase()), Some(false));
        assert_eq!(book.selected_wallets(), vec![BTC.to_string()]);
        assert_eq!(book.toggle("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"), None);

        book.select_all();
        assert!(book.is_selected(EVM));

        assert!(book.remove(BTC));
        assert!(!book.remove(BTC));
        assert_eq!(book.selected_wallets(), vec![EVM.to_string()]);
    }

    #[test]
    fn from_parts_drops_garbage() {
        let book = WalletBook::from_parts(
            vec![EVM.to_string(), "junk".to_string(), EVM.to_lowercase()],
            vec![EVM.to_lowercase(), BTC.to_string()],
        );
        assert_eq!(book.wallets(), &[EVM.to_string()]);
        assert_eq!(book.selection(), &[EVM.to_string()]);
    }
}
