//! Error types shared across custody components
//!
//! Parsing and balance arithmetic errors using thiserror

use thiserror::Error;

/// Address or token identifier could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseAddressError {
    #[error("Invalid address length: expected {expected} hex digits, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid address hex: {0}")]
    InvalidHex(String),
}

/// Balance arithmetic failure on an escrow record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Insufficient balance: required {required}, available {available}")]
    Insufficient { required: u128, available: u128 },

    #[error("Arithmetic overflow in balance calculation")]
    Overflow,

    #[error("Conservation violated: total {total}, sum of token balances {sum}")]
    Unbalanced { total: u128, sum: u128 },
}
