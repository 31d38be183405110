//! Transfer engine — authorized value movement between accounts
//!
//! Keeps a spendable balance per (account, token). Deposits credit the
//! follower's entry; transfers debit the sender, credit the recipient and
//! draw the same amount down from the attributed follower's escrow, then
//! settle on the external token ledger using custody's allowance over the
//! sender.

use std::collections::HashMap;
use tracing::debug;
use types::ids::{Address, TokenId};
use types::numeric::Amount;

use crate::errors::TransferError;
use crate::escrow;
use crate::events::{ContractEvent, EventRecord, TokensTransferred};
use crate::txn::UnitOfWork;

/// (account, token) → spendable amount.
#[derive(Debug, Clone, Default)]
pub struct TransferEngine {
    balances: HashMap<(Address, TokenId), Amount>,
}

impl TransferEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spendable balance; unknown entries read as 0.
    pub fn balance(&self, account: &Address, token: &TokenId) -> Amount {
        self.balances.get(&(*account, *token)).copied().unwrap_or(0)
    }

    pub fn get_balance(&self, account: Address, token: TokenId) -> Result<Amount, TransferError> {
        if token.is_null() {
            return Err(TransferError::InvalidToken);
        }
        Ok(self.balance(&account, &token))
    }

    pub fn entries(&self) -> impl Iterator<Item = (Address, TokenId, Amount)> + '_ {
        self.balances
            .iter()
            .map(|(&(account, token), &amount)| (account, token, amount))
    }

    /// Balance after crediting `amount`, or `None` on overflow.
    pub(crate) fn credited(&self, account: &Address, token: &TokenId, amount: Amount) -> Option<Amount> {
        self.balance(account, token).checked_add(amount)
    }

    pub(crate) fn insert_balance(
        &mut self,
        account: Address,
        token: TokenId,
        amount: Amount,
    ) -> Option<Amount> {
        self.balances.insert((account, token), amount)
    }

    pub(crate) fn remove_balance(&mut self, account: &Address, token: &TokenId) {
        self.balances.remove(&(*account, *token));
    }
}

/// Move `amount` of `token` from `from` to `to`, attributed to `follower`.
pub(crate) fn transfer_tokens(
    mut uow: UnitOfWork<'_>,
    token: TokenId,
    from: Address,
    to: Address,
    amount: Amount,
    follower: Address,
) -> Result<EventRecord, TransferError> {
    if token.is_null() {
        return Err(TransferError::InvalidToken);
    }
    if amount == 0 {
        return Err(TransferError::InvalidAmount);
    }
    if follower.is_zero() {
        return Err(TransferError::InvalidFollowerAccount);
    }

    let required = uow.config().transfer_clearance_level;
    if !uow.state().registry().is_authorized(from, required)? {
        return Err(TransferError::NotAuthorized {
            account: from,
            required,
        });
    }

    let available = uow.state().engine().balance(&from, &token);
    if available < amount {
        return Err(TransferError::InsufficientBalance {
            account: from,
            required: amount,
            available,
        });
    }
    uow.put_balance(from, token, available - amount);
    // Read after the debit so from == to nets out.
    let credited = uow
        .state()
        .engine()
        .credited(&to, &token, amount)
        .ok_or(TransferError::Overflow)?;
    uow.put_balance(to, token, credited);

    escrow::debit(&mut uow, follower, token, amount)?;

    let spender = uow.config().custody_address;
    let event = ContractEvent::TokensTransferred(TokensTransferred {
        token,
        from,
        to,
        amount,
        follower,
    });
    let record = uow.commit_after::<TransferError, _>(event, |tokens| {
        tokens.transfer_from(token, spender, from, to, amount)
    })?;

    debug!(%token, %from, %to, %amount, %follower, sequence = record.sequence, "Tokens transferred");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustodyConfig;
    use crate::errors::{AccessError, EscrowError, TokenError};
    use crate::state::CustodyState;
    use crate::token::{InMemoryTokenLedger, TokenLedger};
    use types::account::AccountRecord;

    struct Fixture {
        state: CustodyState,
        tokens: InMemoryTokenLedger,
        config: CustodyConfig,
        token: TokenId,
        sender: Address,
        recipient: Address,
    }

    impl Fixture {
        /// Sender is active at level 1 with 100 deposited into its own escrow.
        fn new() -> Self {
            let config = CustodyConfig::default();
            let token = TokenId::from_label("TTT");
            let sender = Address::from_label("sender");
            let recipient = Address::from_label("recipient");

            let tokens = InMemoryTokenLedger::new();
            tokens.mint(token, sender, 1_500).unwrap();
            tokens.approve(token, sender, config.custody_address, 1_000);

            let mut state = CustodyState::new(Address::from_label("owner"), None);
            state.registry.insert_record(
                sender,
                AccountRecord {
                    active: true,
                    clearance_level: 1,
                },
            );

            let mut fx = Self {
                state,
                tokens,
                config,
                token,
                sender,
                recipient,
            };
            let uow = fx.uow();
            escrow::deposit(uow, sender, token, 100, sender).unwrap();
            fx
        }

        fn uow(&mut self) -> UnitOfWork<'_> {
            UnitOfWork::begin(&mut self.state, &self.tokens, &self.config)
        }
    }

    #[test]
    fn test_transfer_tokens() {
        let mut fx = Fixture::new();
        let (t, s, r) = (fx.token, fx.sender, fx.recipient);
        let record = transfer_tokens(fx.uow(), t, s, r, 100, s).unwrap();

        assert_eq!(fx.state.engine().get_balance(r, t), Ok(100));
        assert_eq!(fx.state.engine().get_balance(s, t), Ok(0));
        assert_eq!(fx.state.ledger().balance_of(&s, &t), 0);
        assert_eq!(fx.tokens.balance_of(t, r), 100);
        assert_eq!(fx.tokens.balance_of(t, s), 1_300);
        assert_eq!(
            record.event,
            ContractEvent::TokensTransferred(TokensTransferred {
                token: t,
                from: s,
                to: r,
                amount: 100,
                follower: s
            })
        );
    }

    #[test]
    fn test_transfer_unauthorized_sender() {
        let mut fx = Fixture::new();
        let (t, s, r) = (fx.token, fx.sender, fx.recipient);
        fx.state.registry.insert_record(
            s,
            AccountRecord {
                active: true,
                clearance_level: 0,
            },
        );
        let err = transfer_tokens(fx.uow(), t, s, r, 10, s).unwrap_err();
        assert_eq!(
            err,
            TransferError::NotAuthorized {
                account: s,
                required: 1
            }
        );
        assert_eq!(fx.state.engine().balance(&s, &t), 100);
    }

    #[test]
    fn test_transfer_inactive_sender() {
        let mut fx = Fixture::new();
        let (t, s, r) = (fx.token, fx.sender, fx.recipient);
        let err = transfer_tokens(fx.uow(), t, r, s, 10, s).unwrap_err();
        assert_eq!(
            err,
            TransferError::Access(AccessError::AccountInactive { account: r })
        );
    }

    #[test]
    fn test_transfer_zero_amount() {
        let mut fx = Fixture::new();
        let (t, s, r) = (fx.token, fx.sender, fx.recipient);
        assert_eq!(
            transfer_tokens(fx.uow(), t, s, r, 0, s),
            Err(TransferError::InvalidAmount)
        );
    }

    #[test]
    fn test_transfer_null_follower() {
        let mut fx = Fixture::new();
        let (t, s, r) = (fx.token, fx.sender, fx.recipient);
        assert_eq!(
            transfer_tokens(fx.uow(), t, s, r, 10, Address::ZERO),
            Err(TransferError::InvalidFollowerAccount)
        );
    }

    #[test]
    fn test_transfer_null_token() {
        let mut fx = Fixture::new();
        let (s, r) = (fx.sender, fx.recipient);
        assert_eq!(
            transfer_tokens(fx.uow(), TokenId::NULL, s, r, 10, s),
            Err(TransferError::InvalidToken)
        );
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut fx = Fixture::new();
        let (t, s, r) = (fx.token, fx.sender, fx.recipient);
        let external = fx.tokens.balance_of(t, s);
        let err = transfer_tokens(fx.uow(), t, s, r, external + 1, s).unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientBalance {
                account: s,
                required: external + 1,
                available: 100
            }
        );
    }

    #[test]
    fn test_transfer_follower_without_escrow_rolls_back() {
        let mut fx = Fixture::new();
        let (t, s, r) = (fx.token, fx.sender, fx.recipient);
        let stranger = Address::from_label("stranger");
        let err = transfer_tokens(fx.uow(), t, s, r, 10, stranger).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Escrow(EscrowError::InsufficientBalance { .. })
        ));
        assert_eq!(fx.state.engine().balance(&s, &t), 100);
        assert_eq!(fx.state.engine().balance(&r, &t), 0);
    }

    #[test]
    fn test_transfer_without_allowance_rolls_back() {
        let mut fx = Fixture::new();
        let (t, s, r) = (fx.token, fx.sender, fx.recipient);
        let custody = fx.config.custody_address;
        fx.tokens.approve(t, s, custody, 0);

        let before = fx.state.snapshot();
        let err = transfer_tokens(fx.uow(), t, s, r, 50, s).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Token(TokenError::InsufficientAllowance { .. })
        ));
        assert_eq!(fx.state.snapshot(), before);
        assert_eq!(fx.state.events().len(), 1);
    }

    #[test]
    fn test_transfer_to_self() {
        let mut fx = Fixture::new();
        let (t, s) = (fx.token, fx.sender);
        transfer_tokens(fx.uow(), t, s, s, 40, s).unwrap();
        assert_eq!(fx.state.engine().balance(&s, &t), 100);
        assert_eq!(fx.state.ledger().balance_of(&s, &t), 60);
    }

    #[test]
    fn test_get_balance_null_token_and_unknown_account() {
        let fx = Fixture::new();
        assert_eq!(
            fx.state.engine().get_balance(fx.sender, TokenId::NULL),
            Err(TransferError::InvalidToken)
        );
        assert_eq!(
            fx.state
                .engine()
                .get_balance(Address::from_label("nobody"), fx.token),
            Ok(0)
        );
    }
}
