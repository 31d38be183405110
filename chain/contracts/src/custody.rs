//! Custody facade — the entry points hosts call
//!
//! Owns the configuration, the external token ledger and the locked custody
//! state. Each mutating call:
//! - enters the reentrancy guard (callbacks from the token ledger are refused)
//! - takes the state write lock for the whole call
//! - runs the operation inside a `UnitOfWork`, committing one event or nothing
//!
//! Reads take the read lock and see only committed state.

use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};
use types::account::{AccountRecord, EscrowAccount};
use types::ids::{Address, TokenId};
use types::numeric::{Amount, ClearanceLevel};

use crate::config::CustodyConfig;
use crate::errors::CustodyError;
use crate::escrow;
use crate::events::EventRecord;
use crate::registry;
use crate::security::{Entered, ReentrancyGuard};
use crate::state::{CustodySnapshot, CustodyState};
use crate::token::TokenLedger;
use crate::transfer;
use crate::txn::UnitOfWork;

/// Copy-trading custody over an external token ledger.
pub struct Custody<L> {
    config: CustodyConfig,
    tokens: L,
    state: RwLock<CustodyState>,
    guard: ReentrancyGuard,
}

impl<L: TokenLedger> Custody<L> {
    pub fn new(owner: Address, config: CustodyConfig, tokens: L) -> Result<Self, CustodyError> {
        config.validate()?;
        let state = CustodyState::new(owner, config.event_log_capacity);
        Ok(Self::assemble(state, config, tokens))
    }

    /// Custody with the default configuration.
    pub fn with_defaults(owner: Address, tokens: L) -> Self {
        let config = CustodyConfig::default();
        let state = CustodyState::new(owner, config.event_log_capacity);
        Self::assemble(state, config, tokens)
    }

    /// Rebuild custody from persisted tables.
    pub fn from_snapshot(
        snapshot: CustodySnapshot,
        config: CustodyConfig,
        tokens: L,
    ) -> Result<Self, CustodyError> {
        config.validate()?;
        let state = CustodyState::restore(snapshot, config.event_log_capacity)?;
        Ok(Self::assemble(state, config, tokens))
    }

    fn assemble(state: CustodyState, config: CustodyConfig, tokens: L) -> Self {
        info!(
            owner = %state.registry().owner(),
            custody_address = %config.custody_address,
            deposit_gate = ?config.deposit_gate,
            "Custody initialized"
        );
        Self {
            config,
            tokens,
            state: RwLock::new(state),
            guard: ReentrancyGuard::new(),
        }
    }

    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    pub fn tokens(&self) -> &L {
        &self.tokens
    }

    // ───────────────────────── Access Registry ─────────────────────────

    pub fn set_status(
        &self,
        caller: Address,
        account: Address,
        active: bool,
    ) -> Result<EventRecord, CustodyError> {
        self.transact("set_status", |uow| {
            registry::set_status(uow, caller, account, active)
        })
    }

    pub fn set_clearance_level(
        &self,
        caller: Address,
        account: Address,
        clearance_level: ClearanceLevel,
    ) -> Result<EventRecord, CustodyError> {
        self.transact("set_clearance_level", |uow| {
            registry::set_clearance_level(uow, caller, account, clearance_level)
        })
    }

    pub fn transfer_ownership(
        &self,
        caller: Address,
        new_owner: Address,
    ) -> Result<EventRecord, CustodyError> {
        let record = self.transact("transfer_ownership", |uow| {
            registry::transfer_ownership(uow, caller, new_owner)
        })?;
        info!(previous_owner = %caller, %new_owner, "Registry ownership transferred");
        Ok(record)
    }

    pub fn owner(&self) -> Result<Address, CustodyError> {
        self.read("owner", |state| state.registry().owner())
    }

    pub fn account(&self, account: Address) -> Result<AccountRecord, CustodyError> {
        self.read("account", |state| state.registry().account(&account))
    }

    /// Fails with `AccountInactive` for inactive accounts.
    pub fn is_authorized(
        &self,
        account: Address,
        required: ClearanceLevel,
    ) -> Result<bool, CustodyError> {
        self.read("is_authorized", |state| {
            state.registry().is_authorized(account, required)
        })?
        .map_err(CustodyError::from)
    }

    // ───────────────────────── Escrow Ledger ─────────────────────────

    /// Pull `amount` of `token` from `caller` into `follower`'s escrow.
    pub fn deposit(
        &self,
        follower: Address,
        token: TokenId,
        amount: Amount,
        caller: Address,
    ) -> Result<EventRecord, CustodyError> {
        self.transact("deposit", |uow| {
            escrow::deposit(uow, follower, token, amount, caller)
        })
    }

    pub fn update_deposit(
        &self,
        follower: Address,
        token: TokenId,
        amount: Amount,
        caller: Address,
    ) -> Result<EventRecord, CustodyError> {
        self.transact("update_deposit", |uow| {
            escrow::update_deposit(uow, follower, token, amount, caller)
        })
    }

    pub fn release(
        &self,
        operator: Address,
        follower: Address,
        token: TokenId,
        amount: Amount,
        recipient: Address,
    ) -> Result<EventRecord, CustodyError> {
        self.transact("release", |uow| {
            escrow::release(uow, operator, follower, token, amount, recipient)
        })
    }

    pub fn get_account_info(&self, follower: Address) -> Result<EscrowAccount, CustodyError> {
        self.read("get_account_info", |state| {
            state.ledger().get_account_info(&follower)
        })
    }

    pub fn escrow_balance(&self, follower: Address, token: TokenId) -> Result<Amount, CustodyError> {
        self.read("escrow_balance", |state| {
            state.ledger().balance_of(&follower, &token)
        })
    }

    pub fn verify_conservation(&self, follower: Address) -> Result<(), CustodyError> {
        self.read("verify_conservation", |state| {
            state.ledger().verify_conservation(&follower)
        })?
        .map_err(CustodyError::from)
    }

    // ───────────────────────── Transfer Engine ─────────────────────────

    pub fn transfer_tokens(
        &self,
        token: TokenId,
        from: Address,
        to: Address,
        amount: Amount,
        follower: Address,
    ) -> Result<EventRecord, CustodyError> {
        self.transact("transfer_tokens", |uow| {
            transfer::transfer_tokens(uow, token, from, to, amount, follower)
        })
    }

    pub fn get_balance(&self, account: Address, token: TokenId) -> Result<Amount, CustodyError> {
        self.read("get_balance", |state| {
            state.engine().get_balance(account, token)
        })?
        .map_err(CustodyError::from)
    }

    // ───────────────────────── Events & Persistence ─────────────────────────

    /// All retained event records, oldest first.
    pub fn events(&self) -> Result<Vec<EventRecord>, CustodyError> {
        self.read("events", |state| state.events().records().cloned().collect())
    }

    /// Retained event records with `sequence > after`.
    pub fn events_since(&self, after: u64) -> Result<Vec<EventRecord>, CustodyError> {
        self.read("events_since", |state| state.events().since(after))
    }

    pub fn latest_sequence(&self) -> Result<u64, CustodyError> {
        self.read("latest_sequence", |state| state.events().latest_sequence())
    }

    pub fn snapshot(&self) -> Result<CustodySnapshot, CustodyError> {
        self.read("snapshot", CustodyState::snapshot)
    }

    // ───────────────────────── Internals ─────────────────────────

    fn enter(&self, operation: &'static str) -> Result<Entered<'_>, CustodyError> {
        self.guard.enter().ok_or_else(|| {
            warn!(operation, "Reentrant custody call refused");
            CustodyError::Reentrancy
        })
    }

    fn transact<E, F>(&self, operation: &'static str, op: F) -> Result<EventRecord, CustodyError>
    where
        F: FnOnce(UnitOfWork<'_>) -> Result<EventRecord, E>,
        CustodyError: From<E>,
    {
        let _entered = self.enter(operation)?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let uow = UnitOfWork::begin(&mut *state, &self.tokens, &self.config);

        match op(uow) {
            Ok(record) => {
                debug!(
                    operation,
                    sequence = record.sequence,
                    event = record.event.label(),
                    "Custody call committed"
                );
                Ok(record)
            }
            Err(err) => {
                let err = CustodyError::from(err);
                warn!(operation, kind = ?err.kind(), error = %err, "Custody call rejected");
                Err(err)
            }
        }
    }

    fn read<T, F>(&self, operation: &'static str, f: F) -> Result<T, CustodyError>
    where
        F: FnOnce(&CustodyState) -> T,
    {
        let _entered = self.enter(operation)?;
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&state))
    }
}

impl<L> std::fmt::Debug for Custody<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Custody")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
