//! Minimal ERC-20 ABI encoding for the read calls we issue.

use anyhow::{anyhow, bail, Context};
use num_bigint::BigUint;

use crate::models::balance::{CallValue, ContractMethod};
use crate::models::wallet::{classify, AddressKind};

const BALANCE_OF_SELECTOR: &str = "70a08231";
const SYMBOL_SELECTOR: &str = "95d89b41";
const NAME_SELECTOR: &str = "06fdde03";
const DECIMALS_SELECTOR: &str = "313ce567";

const WORD: usize = 32;

/// Calldata for a method, `0x`-prefixed
pub fn encode_call(method: &ContractMethod) -> anyhow::Result<String> {
    let data = match method {
        ContractMethod::BalanceOf { owner } => {
            if classify(owner) != AddressKind::Evm {
                bail!("balanceOf owner is not an EVM address: {}", owner);
            }
            // address left-padded to one word
            format!("{}{:0>64}", BALANCE_OF_SELECTOR, owner[2..].to_ascii_lowercase())
        }
        ContractMethod::Symbol => SYMBOL_SELECTOR.to_string(),
        ContractMethod::Name => NAME_SELECTOR.to_string(),
        ContractMethod::Decimals => DECIMALS_SELECTOR.to_string(),
    };
    Ok(format!("0x{}", data))
}

/// Decode the hex return data of a method
pub fn decode_result(method: &ContractMethod, hex_data: &str) -> anyhow::Result<CallValue> {
    let bytes = decode_hex(hex_data)?;
    if bytes.is_empty() {
        bail!("empty return data");
    }
    match method {
        ContractMethod::BalanceOf { .. } | ContractMethod::Decimals => {
            Ok(CallValue::Uint(decode_uint(&bytes)?))
        }
        ContractMethod::Symbol | ContractMethod::Name => Ok(CallValue::Text(decode_string(&bytes)?)),
    }
}

/// Parse a JSON-RPC quantity (`0x1bc16d674ec80000`)
pub fn parse_quantity(quantity: &str) -> anyhow::Result<BigUint> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| anyhow!("quantity without 0x prefix: {}", quantity))?;
    if digits.is_empty() {
        return Ok(BigUint::default());
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| anyhow!("invalid hex quantity: {}", quantity))
}

fn decode_hex(hex_data: &str) -> anyhow::Result<Vec<u8>> {
    let digits = hex_data.strip_prefix("0x").unwrap_or(hex_data);
    hex::decode(digits).with_context(|| format!("invalid hex return data: {}", hex_data))
}

fn decode_uint(bytes: &[u8]) -> anyhow::Result<BigUint> {
    if bytes.len() < WORD {
        bail!("uint return shorter than one word ({} bytes)", bytes.len());
    }
    Ok(BigUint::from_bytes_be(&bytes[..WORD]))
}

/// Dynamic `string`, or a legacy `bytes32` symbol padded with zeros
fn decode_string(bytes: &[u8]) -> anyhow::Result<String> {
    if bytes.len() == WORD {
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(WORD);
        return String::from_utf8(bytes[..end].to_vec()).context("bytes32 string is not utf-8");
    }

    let offset = word_as_usize(bytes, 0)?;
    let len = word_as_usize(bytes, offset)?;
    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| anyhow!("string offset {} overflows", offset))?;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| anyhow!("string length {} exceeds return data", len))?;

    String::from_utf8(bytes[start..end].to_vec()).context("string is not utf-8")
}

fn word_as_usize(bytes: &[u8], at: usize) -> anyhow::Result<usize> {
    let word = at
        .checked_add(WORD)
        .and_then(|end| bytes.get(at..end))
        .ok_or_else(|| anyhow!("return data truncated at byte {}", at))?;
    // anything above the low 8 bytes would be an absurd offset or length
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        bail!("word at byte {} does not fit in usize", at);
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(low)).context("word does not fit in usize")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abi_string(s: &str) -> String {
        let mut out = format!("{:064x}{:064x}", 32, s.len());
        let mut data = hex::encode(s);
        while data.len() % 64 != 0 {
            data.push('0');
        }
        out.push_str(&data);
        format!("0x{}", out)
    }

    #[test]
    fn encodes_balance_of() {
        let call = ContractMethod::BalanceOf {
            owner: "0x52908400098527886E0F7030069857D2E4169EE7".to_string(),
        };
        let data = encode_call(&call).unwrap();
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.starts_with("0x70a08231000000000000000000000000"));
        assert!(data.ends_with("52908400098527886e0f7030069857d2e4169ee7"));

        let bad = ContractMethod::BalanceOf { owner: "bc1qxyz".to_string() };
        assert!(encode_call(&bad).is_err());
    }

    #[test]
    fn decodes_uint_word() {
        let data = format!("0x{:064x}", 1_500_000u64);
        let value = decode_result(&ContractMethod::Decimals, &data).unwrap();
        assert_eq!(value, CallValue::Uint(BigUint::from(1_500_000u64)));
        assert!(decode_result(&ContractMethod::Decimals, "0x").is_err());
    }

    #[test]
    fn decodes_dynamic_and_bytes32_strings() {
        let value = decode_result(&ContractMethod::Name, &abi_string("Tether USD")).unwrap();
        assert_eq!(value, CallValue::Text("Tether USD".to_string()));

        let bytes32 = format!("0x{:0<64}", hex::encode("MKR"));
        let value = decode_result(&ContractMethod::Symbol, &bytes32).unwrap();
        assert_eq!(value, CallValue::Text("MKR".to_string()));
    }

    #[test]
    fn hostile_string_offsets_are_errors() {
        // offset word just under usize::MAX
        let huge = format!("0x{:064x}{:064x}", u64::MAX, 0);
        assert!(decode_result(&ContractMethod::Name, &huge).is_err());

        let past_end = format!("0x{:064x}{:064x}", 4096, 3);
        assert!(decode_result(&ContractMethod::Symbol, &past_end).is_err());

        let huge_len = format!("0x{:064x}{:064x}", 32, u64::MAX);
        assert!(decode_result(&ContractMethod::Name, &huge_len).is_err());
    }

    #[test]
    fn parses_quantities() {
        assert_eq!(parse_quantity("0x0").unwrap(), BigUint::default());
        assert_eq!(
            parse_quantity("0xde0b6b3a7640000").unwrap(),
            BigUint::from(1_000_000_000_000_000_000u64)
        );
        assert!(parse_quantity("1234").is_err());
    }
}
