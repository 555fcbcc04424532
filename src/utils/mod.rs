//! Helpers shared by providers and handlers

pub mod abi;
pub mod helper;

pub use helper::{format_address, format_usd, to_decimal_amount};
