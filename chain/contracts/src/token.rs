//! External fungible-token ledger boundary
//!
//! Custody never implements token balances itself; it moves value through a
//! `TokenLedger`. Calls across this boundary are treated as untrusted and
//! happen only after all local validation and staging is done. Any error
//! from them aborts the surrounding custody call.
//!
//! `InMemoryTokenLedger` implements standard balance/allowance semantics
//! for tests and hosts that run without a chain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use types::ids::{Address, TokenId};
use types::numeric::Amount;

use crate::errors::TokenError;

/// Multi-token view of a fungible-token ledger.
pub trait TokenLedger: Send + Sync {
    /// Balance held by `account`.
    fn balance_of(&self, token: TokenId, account: Address) -> Amount;

    /// Amount `spender` may still pull from `owner`.
    fn allowance(&self, token: TokenId, owner: Address, spender: Address) -> Amount;

    /// Move `amount` from `owner` to `to`, spending `spender`'s allowance.
    fn transfer_from(
        &self,
        token: TokenId,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError>;

    /// Move `amount` from `from`'s own holdings to `to`.
    fn transfer(
        &self,
        token: TokenId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError>;
}

impl<T: TokenLedger + ?Sized> TokenLedger for Arc<T> {
    fn balance_of(&self, token: TokenId, account: Address) -> Amount {
        (**self).balance_of(token, account)
    }

    fn allowance(&self, token: TokenId, owner: Address, spender: Address) -> Amount {
        (**self).allowance(token, owner, spender)
    }

    fn transfer_from(
        &self,
        token: TokenId,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        (**self).transfer_from(token, spender, owner, to, amount)
    }

    fn transfer(
        &self,
        token: TokenId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        (**self).transfer(token, from, to, amount)
    }
}

#[derive(Debug, Default)]
struct TokenBook {
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
    total_supply: Amount,
}

impl TokenBook {
    fn balance(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn move_funds(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
        let available = self.balance(&from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance(&to)
            .checked_add(amount)
            .ok_or_else(|| TokenError::TransferFailed {
                reason: "recipient balance overflow".to_string(),
            })?;
        self.balances.insert(from, available - amount);
        self.balances.insert(to, credited);
        Ok(())
    }
}

/// In-process token ledger with standard allowance semantics.
///
/// A token exists once something has been minted for it. Transfers of an
/// unknown token fail with `UnknownToken`.
#[derive(Debug, Default)]
pub struct InMemoryTokenLedger {
    tokens: Mutex<HashMap<TokenId, TokenBook>>,
}

impl InMemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` new units of `token` for `to`.
    pub fn mint(&self, token: TokenId, to: Address, amount: Amount) -> Result<(), TokenError> {
        let mut tokens = self.lock();
        let book = tokens.entry(token).or_default();
        let supply = book
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| TokenError::TransferFailed {
                reason: "total supply overflow".to_string(),
            })?;
        let balance = book.balance(&to).checked_add(amount).ok_or_else(|| {
            TokenError::TransferFailed {
                reason: "recipient balance overflow".to_string(),
            }
        })?;
        book.total_supply = supply;
        book.balances.insert(to, balance);
        debug!(%token, %to, %amount, "Minted tokens");
        Ok(())
    }

    /// Set `spender`'s allowance over `owner`'s funds (overwrites).
    pub fn approve(&self, token: TokenId, owner: Address, spender: Address, amount: Amount) {
        let mut tokens = self.lock();
        tokens
            .entry(token)
            .or_default()
            .allowances
            .insert((owner, spender), amount);
    }

    /// Total minted supply of `token`.
    pub fn total_supply(&self, token: TokenId) -> Amount {
        self.lock().get(&token).map_or(0, |book| book.total_supply)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TokenId, TokenBook>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn balance_of(&self, token: TokenId, account: Address) -> Amount {
        self.lock().get(&token).map_or(0, |book| book.balance(&account))
    }

    fn allowance(&self, token: TokenId, owner: Address, spender: Address) -> Amount {
        self.lock()
            .get(&token)
            .and_then(|book| book.allowances.get(&(owner, spender)).copied())
            .unwrap_or(0)
    }

    fn transfer_from(
        &self,
        token: TokenId,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let mut tokens = self.lock();
        let book = tokens
            .get_mut(&token)
            .ok_or(TokenError::UnknownToken { token })?;

        let approved = book.allowances.get(&(owner, spender)).copied().unwrap_or(0);
        if approved < amount {
            return Err(TokenError::InsufficientAllowance {
                required: amount,
                approved,
            });
        }
        book.move_funds(owner, to, amount)?;
        book.allowances.insert((owner, spender), approved - amount);
        Ok(())
    }

    fn transfer(
        &self,
        token: TokenId,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let mut tokens = self.lock();
        let book = tokens
            .get_mut(&token)
            .ok_or(TokenError::UnknownToken { token })?;
        book.move_funds(from, to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (InMemoryTokenLedger, TokenId, Address, Address) {
        let ledger = InMemoryTokenLedger::new();
        let token = TokenId::from_label("TTT");
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        ledger.mint(token, alice, 1_000).unwrap();
        (ledger, token, alice, bob)
    }

    #[test]
    fn test_mint_and_balance() {
        let (ledger, token, alice, bob) = setup();
        assert_eq!(ledger.balance_of(token, alice), 1_000);
        assert_eq!(ledger.balance_of(token, bob), 0);
        assert_eq!(ledger.total_supply(token), 1_000);
    }

    #[test]
    fn test_transfer() {
        let (ledger, token, alice, bob) = setup();
        ledger.transfer(token, alice, bob, 300).unwrap();
        assert_eq!(ledger.balance_of(token, alice), 700);
        assert_eq!(ledger.balance_of(token, bob), 300);
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let (ledger, token, alice, bob) = setup();
        let err = ledger.transfer(token, alice, bob, 1_001).unwrap_err();
        assert_eq!(
            err,
            TokenError::InsufficientBalance {
                required: 1_001,
                available: 1_000
            }
        );
        assert_eq!(ledger.balance_of(token, alice), 1_000);
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let (ledger, token, alice, bob) = setup();
        let spender = Address::from_label("custody");
        ledger.approve(token, alice, spender, 500);
        ledger.transfer_from(token, spender, alice, bob, 200).unwrap();
        assert_eq!(ledger.allowance(token, alice, spender), 300);
        assert_eq!(ledger.balance_of(token, bob), 200);
    }

    #[test]
    fn test_transfer_from_without_allowance() {
        let (ledger, token, alice, bob) = setup();
        let spender = Address::from_label("custody");
        let err = ledger
            .transfer_from(token, spender, alice, bob, 1)
            .unwrap_err();
        assert_eq!(
            err,
            TokenError::InsufficientAllowance {
                required: 1,
                approved: 0
            }
        );
    }

    #[test]
    fn test_transfer_from_balance_checked_after_allowance() {
        let (ledger, token, alice, bob) = setup();
        let spender = Address::from_label("custody");
        ledger.approve(token, alice, spender, 5_000);
        let err = ledger
            .transfer_from(token, spender, alice, bob, 2_000)
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { .. }));
        assert_eq!(ledger.allowance(token, alice, spender), 5_000);
    }

    #[test]
    fn test_unknown_token() {
        let ledger = InMemoryTokenLedger::new();
        let token = TokenId::from_label("NOPE");
        let err = ledger
            .transfer(token, Address::from_label("a"), Address::from_label("b"), 1)
            .unwrap_err();
        assert_eq!(err, TokenError::UnknownToken { token });
    }

    #[test]
    fn test_arc_forwarding() {
        let (ledger, token, alice, _) = setup();
        let shared: Arc<InMemoryTokenLedger> = Arc::new(ledger);
        assert_eq!(TokenLedger::balance_of(&shared, token, alice), 1_000);
    }
}
