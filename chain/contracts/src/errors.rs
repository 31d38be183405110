//! Contract-specific error types
//!
//! One enum per component, wrapped upward with `#[from]`. Every error is a
//! clean abort: the operation that produced it changed nothing.
//! `ErrorKind` flattens the nested enums for callers that only care about
//! the category of failure.

use thiserror::Error;
use types::errors::BalanceError;
use types::ids::{Address, TokenId};
use types::numeric::{Amount, ClearanceLevel};

/// Flat failure category shared by every error enum in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotOwner,
    AccountInactive,
    NotAuthorized,
    InvalidToken,
    InvalidAmount,
    InvalidFollowerAccount,
    InvalidAddress,
    NotDepositor,
    InsufficientAllowance,
    InsufficientBalance,
    ExternalTransferFailed,
    UnknownToken,
    Overflow,
    InvariantViolation,
    InvalidConfig,
    Reentrancy,
}

/// Access registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Caller {caller} is not the registry owner")]
    NotOwner { caller: Address },

    #[error("Account {account} is inactive")]
    AccountInactive { account: Address },

    #[error("New owner cannot be the null address")]
    NullOwner,

    #[error("Event log error: {0}")]
    Log(#[from] EventLogError),
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::NotOwner { .. } => ErrorKind::NotOwner,
            AccessError::AccountInactive { .. } => ErrorKind::AccountInactive,
            AccessError::NullOwner => ErrorKind::InvalidAddress,
            AccessError::Log(e) => e.kind(),
        }
    }
}

/// Event log append failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventLogError {
    #[error("Event sequence exhausted after {last}")]
    SequenceExhausted { last: u64 },
}

impl EventLogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventLogError::SequenceExhausted { .. } => ErrorKind::Overflow,
        }
    }
}

/// Failures reported by the external token ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("ERC20: insufficient allowance: required {required}, approved {approved}")]
    InsufficientAllowance { required: Amount, approved: Amount },

    #[error("ERC20: transfer amount exceeds balance: required {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("Unknown token: {token}")]
    UnknownToken { token: TokenId },

    #[error("External transfer failed: {reason}")]
    TransferFailed { reason: String },
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::InsufficientAllowance { .. } => ErrorKind::InsufficientAllowance,
            TokenError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            TokenError::UnknownToken { .. } => ErrorKind::UnknownToken,
            TokenError::TransferFailed { .. } => ErrorKind::ExternalTransferFailed,
        }
    }
}

/// Escrow ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Not authorized: {account} lacks clearance level {required}")]
    NotAuthorized {
        account: Address,
        required: ClearanceLevel,
    },

    #[error("Invalid token address")]
    InvalidToken,

    #[error("Deposit amount must be greater than zero")]
    InvalidAmount,

    #[error("Follower account address cannot be null or zero")]
    InvalidFollowerAccount,

    #[error("Release recipient cannot be the null address")]
    InvalidRecipient,

    #[error("Only the depositor can update the deposit")]
    NotDepositor { caller: Address, follower: Address },

    #[error("Insufficient escrow balance for {token}: required {required}, available {available}")]
    InsufficientBalance {
        token: TokenId,
        required: Amount,
        available: Amount,
    },

    #[error("Arithmetic overflow in balance calculation")]
    Overflow,

    #[error("Escrow invariant violated for follower {follower}: total {total}, sum {sum}")]
    InvariantViolation {
        follower: Address,
        total: Amount,
        sum: Amount,
    },

    #[error("Token ledger error: {0}")]
    Token(#[from] TokenError),

    #[error("Event log error: {0}")]
    Log(#[from] EventLogError),
}

impl EscrowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EscrowError::Access(e) => e.kind(),
            EscrowError::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            EscrowError::InvalidToken => ErrorKind::InvalidToken,
            EscrowError::InvalidAmount => ErrorKind::InvalidAmount,
            EscrowError::InvalidFollowerAccount => ErrorKind::InvalidFollowerAccount,
            EscrowError::InvalidRecipient => ErrorKind::InvalidAddress,
            EscrowError::NotDepositor { .. } => ErrorKind::NotDepositor,
            EscrowError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            EscrowError::Overflow => ErrorKind::Overflow,
            EscrowError::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            EscrowError::Token(e) => e.kind(),
            EscrowError::Log(e) => e.kind(),
        }
    }

    /// Map a record-level balance failure onto the follower's escrow
    pub(crate) fn from_balance(follower: Address, token: TokenId, err: BalanceError) -> Self {
        match err {
            BalanceError::Insufficient {
                required,
                available,
            } => EscrowError::InsufficientBalance {
                token,
                required,
                available,
            },
            BalanceError::Overflow => EscrowError::Overflow,
            BalanceError::Unbalanced { total, sum } => EscrowError::InvariantViolation {
                follower,
                total,
                sum,
            },
        }
    }
}

/// Transfer engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("TokenTransfer: invalid token address")]
    InvalidToken,

    #[error("TokenTransfer: amount must be greater than zero")]
    InvalidAmount,

    #[error("TokenTransfer: follower account address cannot be null or zero")]
    InvalidFollowerAccount,

    #[error("Not authorized: {account} lacks clearance level {required}")]
    NotAuthorized {
        account: Address,
        required: ClearanceLevel,
    },

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("TokenTransfer: insufficient balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: Address,
        required: Amount,
        available: Amount,
    },

    #[error("Arithmetic overflow in transfer bookkeeping")]
    Overflow,

    #[error("Escrow error: {0}")]
    Escrow(#[from] EscrowError),

    #[error("Token ledger error: {0}")]
    Token(#[from] TokenError),

    #[error("Event log error: {0}")]
    Log(#[from] EventLogError),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InvalidToken => ErrorKind::InvalidToken,
            TransferError::InvalidAmount => ErrorKind::InvalidAmount,
            TransferError::InvalidFollowerAccount => ErrorKind::InvalidFollowerAccount,
            TransferError::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            TransferError::Access(e) => e.kind(),
            TransferError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            TransferError::Overflow => ErrorKind::Overflow,
            TransferError::Escrow(e) => e.kind(),
            TransferError::Token(e) => e.kind(),
            TransferError::Log(e) => e.kind(),
        }
    }
}

/// Errors surfaced by the `Custody` facade
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Escrow(#[from] EscrowError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Reentrant call into custody from inside a token-ledger callback")]
    Reentrancy,
}

impl CustodyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CustodyError::Access(e) => e.kind(),
            CustodyError::Escrow(e) => e.kind(),
            CustodyError::Transfer(e) => e.kind(),
            CustodyError::Config(_) => ErrorKind::InvalidConfig,
            CustodyError::Snapshot(e) => e.kind(),
            CustodyError::Reentrancy => ErrorKind::Reentrancy,
        }
    }
}

/// A persisted snapshot that cannot be loaded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Snapshot owner cannot be the null address")]
    NullOwner,

    #[error("Next event sequence {next} is out of range")]
    SequenceOutOfRange { next: u64 },

    #[error("Duplicate account row for {account}")]
    DuplicateAccount { account: Address },

    #[error("Duplicate escrow row for {follower}")]
    DuplicateEscrow { follower: Address },

    #[error("Duplicate balance row for {account} in {token}")]
    DuplicateBalance { account: Address, token: TokenId },

    #[error("Escrow row has a null follower")]
    NullFollower,

    #[error("Escrow row for {follower} is not marked as existing")]
    EscrowNotOpen { follower: Address },

    #[error("Escrow row for {follower} has no depositor of record")]
    NullDepositor { follower: Address },

    #[error("Escrow error: {0}")]
    Escrow(#[from] EscrowError),
}

impl SnapshotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SnapshotError::NullOwner => ErrorKind::InvalidAddress,
            SnapshotError::Escrow(e) => e.kind(),
            _ => ErrorKind::InvariantViolation,
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Custody address cannot be the null address")]
    NullCustodyAddress,
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
