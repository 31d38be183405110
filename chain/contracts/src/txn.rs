//! Unit of work — the transaction boundary around every mutating call
//!
//! A `UnitOfWork` is opened on the exclusively-locked custody state. Every
//! write goes through it and is journaled with the value it replaced. The
//! call commits by handing over its single event; if the work is dropped
//! without committing (early `?` return, failed external call, panic) the
//! journal is replayed backwards and the state is exactly as it was.
//!
//! The external token-ledger call is made by `commit_after`, after all local
//! staging: its result is the last gate before the commit.

use tracing::trace;
use types::account::{AccountRecord, EscrowAccount};
use types::ids::{Address, TokenId};
use types::numeric::Amount;

use crate::config::CustodyConfig;
use crate::errors::{EventLogError, TokenError};
use crate::events::{ContractEvent, EventRecord};
use crate::security::Ownership;
use crate::state::CustodyState;
use crate::token::TokenLedger;

#[derive(Debug)]
enum Undo {
    Ownership(Ownership),
    Account(Address, Option<AccountRecord>),
    Escrow(Address, Option<EscrowAccount>),
    Balance(Address, TokenId, Option<Amount>),
}

/// Staged, rollback-on-drop access to custody state.
pub struct UnitOfWork<'a> {
    state: &'a mut CustodyState,
    tokens: &'a dyn TokenLedger,
    config: &'a CustodyConfig,
    journal: Vec<Undo>,
    committed: bool,
}

impl<'a> UnitOfWork<'a> {
    pub(crate) fn begin(
        state: &'a mut CustodyState,
        tokens: &'a dyn TokenLedger,
        config: &'a CustodyConfig,
    ) -> Self {
        Self {
            state,
            tokens,
            config,
            journal: Vec::new(),
            committed: false,
        }
    }

    /// Current state, including writes staged so far.
    pub fn state(&self) -> &CustodyState {
        self.state
    }

    pub fn config(&self) -> &CustodyConfig {
        self.config
    }

    /// Number of writes staged so far.
    pub fn staged_writes(&self) -> usize {
        self.journal.len()
    }

    pub(crate) fn put_ownership(&mut self, ownership: Ownership) {
        let previous = *self.state.registry.ownership();
        self.journal.push(Undo::Ownership(previous));
        self.state.registry.set_ownership(ownership);
    }

    pub(crate) fn put_account(&mut self, account: Address, record: AccountRecord) {
        let previous = self.state.registry.insert_record(account, record);
        self.journal.push(Undo::Account(account, previous));
    }

    pub(crate) fn put_escrow(&mut self, follower: Address, escrow: EscrowAccount) {
        let previous = self.state.ledger.insert_escrow(follower, escrow);
        self.journal.push(Undo::Escrow(follower, previous));
    }

    pub(crate) fn put_balance(&mut self, account: Address, token: TokenId, amount: Amount) {
        let previous = self.state.engine.insert_balance(account, token, amount);
        self.journal.push(Undo::Balance(account, token, previous));
    }

    /// Append `event` to the log, then keep the staged writes.
    ///
    /// If the append fails the work is dropped and rolled back.
    pub(crate) fn commit(mut self, event: ContractEvent) -> Result<EventRecord, EventLogError> {
        let record = self.state.events.append(event)?;
        self.committed = true;
        self.journal.clear();
        Ok(record)
    }

    /// Run the external token-ledger call, then commit if it succeeded.
    ///
    /// The log is checked for room first so a successful external call is
    /// always followed by its event. On failure the work is dropped and every
    /// staged write is undone.
    pub(crate) fn commit_after<E, F>(
        self,
        event: ContractEvent,
        external: F,
    ) -> Result<EventRecord, E>
    where
        F: FnOnce(&dyn TokenLedger) -> Result<(), TokenError>,
        E: From<TokenError> + From<EventLogError>,
    {
        self.state.events.ensure_room()?;
        external(self.tokens)?;
        Ok(self.commit(event)?)
    }

    fn rollback(&mut self) {
        trace!(writes = self.journal.len(), "Rolling back unit of work");
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Ownership(ownership) => self.state.registry.set_ownership(ownership),
                Undo::Account(account, Some(record)) => {
                    self.state.registry.insert_record(account, record);
                }
                Undo::Account(account, None) => self.state.registry.remove_record(&account),
                Undo::Escrow(follower, Some(escrow)) => {
                    self.state.ledger.insert_escrow(follower, escrow);
                }
                Undo::Escrow(follower, None) => self.state.ledger.remove_escrow(&follower),
                Undo::Balance(account, token, Some(amount)) => {
                    self.state.engine.insert_balance(account, token, amount);
                }
                Undo::Balance(account, token, None) => {
                    self.state.engine.remove_balance(&account, &token)
                }
            }
        }
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}
