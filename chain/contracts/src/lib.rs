//! Custody core for copy-trading accounts
//!
//! This crate implements the accounting layer that holds follower funds:
//! who may participate, how much is escrowed per follower and token, and
//! how value moves between accounts. Actual token balances live in an
//! external ledger reached through the `TokenLedger` trait.
//!
//! # Modules
//! - `registry`: Account status and clearance levels, owner-only writes
//! - `escrow`: Per-follower escrow records, deposits, releases
//! - `transfer`: Spendable balances and authorized transfers
//! - `custody`: Facade that serializes calls and owns the state lock
//! - `txn`: Unit of work with rollback-on-drop
//! - `token`: External token ledger trait and an in-memory implementation
//! - `events`: Committed event records and the append-only log
//! - `config`: Deployment policy (deposit gate, clearance levels)
//! - `state`: Combined state and its persisted snapshot
//! - `security`: Owner credential and reentrancy guard
//! - `errors`: Error enums per component

pub mod config;
pub mod custody;
pub mod errors;
pub mod escrow;
pub mod events;
pub mod registry;
pub mod security;
pub mod state;
pub mod token;
pub mod transfer;
pub mod txn;

pub use config::{CustodyConfig, DepositGate};
pub use custody::Custody;
pub use errors::{CustodyError, ErrorKind};
pub use token::{InMemoryTokenLedger, TokenLedger};

/// Event schema version, bumped when an event payload changes
pub const EVENT_SCHEMA_VERSION: &str = "1.0.0";
