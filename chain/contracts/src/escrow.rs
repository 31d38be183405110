//! Escrow ledger — per-follower custody records
//!
//! Holds one `EscrowAccount` per follower and is the only writer of
//! per-token escrow balances. Every escrow keeps
//! `total_deposit == Σ token_balances` after every committed call.
//!
//! Deposit flow:
//! 1. Null follower rejected, then the gate check against the access
//!    registry (`DepositGate`)
//! 2. Input validation (token, amount)
//! 3. Depositor-of-record check; the first deposit fixes it for good
//! 4. Stage escrow credit and transfer bookkeeping
//! 5. Pull the funds from the depositor; commit only if the pull succeeds

use std::collections::HashMap;
use tracing::debug;
use types::account::EscrowAccount;
use types::ids::{Address, TokenId};
use types::numeric::Amount;

use crate::errors::EscrowError;
use crate::events::{ContractEvent, DepositUpdated, Deposited, EventRecord, EscrowReleased};
use crate::txn::UnitOfWork;

/// Follower → escrow table.
#[derive(Debug, Clone, Default)]
pub struct EscrowLedger {
    escrows: HashMap<Address, EscrowAccount>,
}

impl EscrowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Escrow record for `follower`, or an all-zero record with
    /// `exists == false`.
    pub fn get_account_info(&self, follower: &Address) -> EscrowAccount {
        self.escrows.get(follower).cloned().unwrap_or_default()
    }

    pub fn escrow(&self, follower: &Address) -> Option<&EscrowAccount> {
        self.escrows.get(follower)
    }

    pub fn balance_of(&self, follower: &Address, token: &TokenId) -> Amount {
        self.escrows
            .get(follower)
            .map_or(0, |escrow| escrow.balance(token))
    }

    /// Check `total_deposit == Σ token_balances` for one follower.
    pub fn verify_conservation(&self, follower: &Address) -> Result<(), EscrowError> {
        match self.escrows.get(follower) {
            Some(escrow) => escrow
                .check_conservation()
                .map_err(|e| EscrowError::from_balance(*follower, TokenId::NULL, e)),
            None => Ok(()),
        }
    }

    pub fn escrows(&self) -> impl Iterator<Item = (&Address, &EscrowAccount)> {
        self.escrows.iter()
    }

    pub fn len(&self) -> usize {
        self.escrows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.escrows.is_empty()
    }

    pub(crate) fn insert_escrow(
        &mut self,
        follower: Address,
        escrow: EscrowAccount,
    ) -> Option<EscrowAccount> {
        self.escrows.insert(follower, escrow)
    }

    pub(crate) fn remove_escrow(&mut self, follower: &Address) {
        self.escrows.remove(follower);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepositKind {
    /// Opens the escrow if needed.
    Initial,
    /// Requires an existing escrow.
    TopUp,
}

/// Pull `amount` of `token` from `caller` into `follower`'s escrow.
pub(crate) fn deposit(
    uow: UnitOfWork<'_>,
    follower: Address,
    token: TokenId,
    amount: Amount,
    caller: Address,
) -> Result<EventRecord, EscrowError> {
    pull_into_escrow(uow, DepositKind::Initial, follower, token, amount, caller)
}

/// Top up an existing escrow. Only its depositor of record may call.
pub(crate) fn update_deposit(
    uow: UnitOfWork<'_>,
    follower: Address,
    token: TokenId,
    amount: Amount,
    caller: Address,
) -> Result<EventRecord, EscrowError> {
    pull_into_escrow(uow, DepositKind::TopUp, follower, token, amount, caller)
}

fn pull_into_escrow(
    mut uow: UnitOfWork<'_>,
    kind: DepositKind,
    follower: Address,
    token: TokenId,
    amount: Amount,
    caller: Address,
) -> Result<EventRecord, EscrowError> {
    if follower.is_zero() {
        return Err(EscrowError::InvalidFollowerAccount);
    }
    check_deposit_gate(&uow, follower, caller)?;

    if token.is_null() {
        return Err(EscrowError::InvalidToken);
    }
    if amount == 0 {
        return Err(EscrowError::InvalidAmount);
    }

    let mut escrow = match (kind, uow.state().ledger().escrow(&follower)) {
        (_, Some(existing)) if existing.depositor_of_record != caller => {
            return Err(EscrowError::NotDepositor { caller, follower });
        }
        (_, Some(existing)) => existing.clone(),
        (DepositKind::Initial, None) => EscrowAccount::open(caller),
        (DepositKind::TopUp, None) => return Err(EscrowError::NotDepositor { caller, follower }),
    };
    escrow
        .credit(token, amount)
        .map_err(|e| EscrowError::from_balance(follower, token, e))?;
    uow.put_escrow(follower, escrow);

    // Deposited value becomes spendable by the follower through the transfer engine.
    let spendable = uow
        .state()
        .engine()
        .credited(&follower, &token, amount)
        .ok_or(EscrowError::Overflow)?;
    uow.put_balance(follower, token, spendable);

    let custody = uow.config().custody_address;
    let event = match kind {
        DepositKind::Initial => ContractEvent::Deposited(Deposited {
            follower,
            depositor: caller,
            token,
            amount,
        }),
        DepositKind::TopUp => ContractEvent::DepositUpdated(DepositUpdated {
            follower,
            depositor: caller,
            token,
            amount,
        }),
    };
    let record = uow.commit_after::<EscrowError, _>(event, |tokens| {
        tokens.transfer_from(token, custody, caller, custody, amount)
    })?;

    debug!(
        %follower,
        depositor = %caller,
        %token,
        %amount,
        sequence = record.sequence,
        "Escrow credited"
    );
    Ok(record)
}

fn check_deposit_gate(
    uow: &UnitOfWork<'_>,
    follower: Address,
    caller: Address,
) -> Result<(), EscrowError> {
    let config = uow.config();
    let required = config.deposit_clearance_level;
    for account in config.deposit_gate.accounts(follower, caller) {
        if !uow.state().registry().is_authorized(account, required)? {
            return Err(EscrowError::NotAuthorized { account, required });
        }
    }
    Ok(())
}

/// Stage a debit of `follower`'s escrow.
pub(crate) fn debit(
    uow: &mut UnitOfWork<'_>,
    follower: Address,
    token: TokenId,
    amount: Amount,
) -> Result<(), EscrowError> {
    let mut escrow = uow
        .state()
        .ledger()
        .escrow(&follower)
        .cloned()
        .ok_or(EscrowError::InsufficientBalance {
            token,
            required: amount,
            available: 0,
        })?;
    escrow
        .debit(token, amount)
        .map_err(|e| EscrowError::from_balance(follower, token, e))?;
    uow.put_escrow(follower, escrow);
    Ok(())
}

/// Pay escrowed funds out of custody to `recipient`.
///
/// `operator` must clear the withdrawal level. The follower's spendable
/// transfer balance shrinks by the same amount, floored at zero.
pub(crate) fn release(
    mut uow: UnitOfWork<'_>,
    operator: Address,
    follower: Address,
    token: TokenId,
    amount: Amount,
    recipient: Address,
) -> Result<EventRecord, EscrowError> {
    let required = uow.config().withdrawal_clearance_level;
    if !uow.state().registry().is_authorized(operator, required)? {
        return Err(EscrowError::NotAuthorized {
            account: operator,
            required,
        });
    }

    if token.is_null() {
        return Err(EscrowError::InvalidToken);
    }
    if amount == 0 {
        return Err(EscrowError::InvalidAmount);
    }
    if follower.is_zero() {
        return Err(EscrowError::InvalidFollowerAccount);
    }
    if recipient.is_zero() {
        return Err(EscrowError::InvalidRecipient);
    }

    debit(&mut uow, follower, token, amount)?;

    let spendable = uow
        .state()
        .engine()
        .balance(&follower, &token)
        .saturating_sub(amount);
    uow.put_balance(follower, token, spendable);

    let custody = uow.config().custody_address;
    let event = ContractEvent::EscrowReleased(EscrowReleased {
        operator,
        follower,
        token,
        amount,
        recipient,
    });
    let record = uow.commit_after::<EscrowError, _>(event, |tokens| {
        tokens.transfer(token, custody, recipient, amount)
    })?;

    debug!(%operator, %follower, %token, %amount, %recipient, "Escrow released");
    Ok(record)
}
