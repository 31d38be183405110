//! Integer amount types
//!
//! Token amounts are unsigned base units, matching fungible-token ledgers.
//! All arithmetic on them is checked by callers; nothing here wraps.

/// Token amount in base units
pub type Amount = u128;

/// Authorization tier of an account
pub type ClearanceLevel = u64;

/// Convert whole token units into base units for a token with `decimals`.
///
/// Returns `None` when the result does not fit in an [`Amount`].
pub fn to_base_units(whole: u128, decimals: u32) -> Option<Amount> {
    10u128
        .checked_pow(decimals)
        .and_then(|scale| whole.checked_mul(scale))
}
