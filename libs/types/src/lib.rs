//! Types library for the copy-trading custody core
//!
//! Provides the identifier and record types shared by the access registry,
//! escrow ledger and transfer engine.
//!
//! # Modules
//! - `ids`: Address and token identifiers
//! - `numeric`: Integer amount and clearance types
//! - `account`: Registry and escrow records
//! - `errors`: Parsing and balance arithmetic errors

// Public modules
pub mod ids;
pub mod numeric;
pub mod account;
pub mod errors;
