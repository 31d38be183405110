//! Registry and escrow record types
//!
//! `AccountRecord` is the access-registry row for a participant.
//! `EscrowAccount` is the per-follower escrow row.
//!
//! Invariant: `total_deposit == sum(token_balances)` for every escrow record.

use crate::errors::BalanceError;
use crate::ids::{Address, TokenId};
use crate::numeric::{Amount, ClearanceLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Access-registry entry for a participant
///
/// Accounts are created implicitly on first registry write and start
/// inactive with clearance level 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountRecord {
    pub active: bool,
    pub clearance_level: ClearanceLevel,
}

impl AccountRecord {
    /// Whether an active account meets the required level
    pub fn meets(&self, required: ClearanceLevel) -> bool {
        self.clearance_level >= required
    }
}

/// Escrow record for a single follower
///
/// The depositor of record is fixed by the first deposit and is the only
/// account allowed to add funds afterwards. A record is never removed; a
/// zero balance is a valid state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EscrowAccount {
    pub depositor_of_record: Address,
    pub total_deposit: Amount,
    pub token_balances: BTreeMap<TokenId, Amount>,
    pub exists: bool,
}

impl EscrowAccount {
    /// Open an empty escrow owned by `depositor`
    pub fn open(depositor: Address) -> Self {
        Self {
            depositor_of_record: depositor,
            total_deposit: 0,
            token_balances: BTreeMap::new(),
            exists: true,
        }
    }

    /// Balance held for a token (0 if never deposited)
    pub fn balance(&self, token: &TokenId) -> Amount {
        self.token_balances.get(token).copied().unwrap_or(0)
    }

    /// Add `amount` of `token`, creating the entry lazily.
    ///
    /// Conservation and both sums are checked before either field is
    /// written, so a failed credit leaves the record untouched.
    pub fn credit(&mut self, token: TokenId, amount: Amount) -> Result<(), BalanceError> {
        self.check_conservation()?;
        let balance = self
            .balance(&token)
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;
        let total = self
            .total_deposit
            .checked_add(amount)
            .ok_or(BalanceError::Overflow)?;

        self.token_balances.insert(token, balance);
        self.total_deposit = total;
        Ok(())
    }

    /// Remove `amount` of `token`; never leaves a balance negative.
    ///
    /// Like `credit`, a failed debit leaves the record untouched.
    pub fn debit(&mut self, token: TokenId, amount: Amount) -> Result<(), BalanceError> {
        self.check_conservation()?;
        let available = self.balance(&token);
        let balance = available
            .checked_sub(amount)
            .ok_or(BalanceError::Insufficient {
                required: amount,
                available,
            })?;
        let total = self
            .total_deposit
            .checked_sub(amount)
            .ok_or(BalanceError::Unbalanced {
                total: self.total_deposit,
                sum: self.token_sum().unwrap_or(Amount::MAX),
            })?;

        self.token_balances.insert(token, balance);
        self.total_deposit = total;
        Ok(())
    }

    /// Verify `total_deposit == sum(token_balances)`
    pub fn check_conservation(&self) -> Result<(), BalanceError> {
        let sum = self.token_sum().ok_or(BalanceError::Overflow)?;
        if sum != self.total_deposit {
            return Err(BalanceError::Unbalanced {
                total: self.total_deposit,
                sum,
            });
        }
        Ok(())
    }

    fn token_sum(&self) -> Option<Amount> {
        self.token_balances
            .values()
            .try_fold(0u128, |acc, v| acc.checked_add(*v))
    }
}
