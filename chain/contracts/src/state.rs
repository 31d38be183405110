//! Custody state — the single consistency domain
//!
//! Registry, escrow ledger, transfer bookkeeping and the event log live in
//! one struct so one lock and one unit of work cover all of them.
//!
//! `CustodySnapshot` is the persisted state surface: three point-addressable
//! tables plus the next event sequence.

use serde::{Deserialize, Serialize};
use types::account::{AccountRecord, EscrowAccount};
use types::ids::{Address, TokenId};
use types::numeric::Amount;

use crate::errors::SnapshotError;
use crate::escrow::EscrowLedger;
use crate::events::EventLog;
use crate::registry::AccessRegistry;
use crate::transfer::TransferEngine;

#[derive(Debug, Clone)]
pub struct CustodyState {
    pub(crate) registry: AccessRegistry,
    pub(crate) ledger: EscrowLedger,
    pub(crate) engine: TransferEngine,
    pub(crate) events: EventLog,
}

impl CustodyState {
    pub fn new(owner: Address, event_log_capacity: Option<usize>) -> Self {
        Self {
            registry: AccessRegistry::new(owner),
            ledger: EscrowLedger::new(),
            engine: TransferEngine::new(),
            events: EventLog::new(event_log_capacity),
        }
    }

    pub fn registry(&self) -> &AccessRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &EscrowLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Export all tables, sorted by key.
    pub fn snapshot(&self) -> CustodySnapshot {
        let mut accounts: Vec<AccountEntry> = self
            .registry
            .accounts()
            .map(|(account, record)| AccountEntry {
                account: *account,
                record: *record,
            })
            .collect();
        accounts.sort_by_key(|e| e.account);

        let mut escrows: Vec<EscrowEntry> = self
            .ledger
            .escrows()
            .map(|(follower, escrow)| EscrowEntry {
                follower: *follower,
                escrow: escrow.clone(),
            })
            .collect();
        escrows.sort_by_key(|e| e.follower);

        let mut balances: Vec<BalanceEntry> = self
            .engine
            .entries()
            .map(|(account, token, amount)| BalanceEntry {
                account,
                token,
                amount,
            })
            .collect();
        balances.sort_by_key(|e| (e.account, e.token));

        CustodySnapshot {
            owner: self.registry.owner(),
            accounts,
            escrows,
            balances,
            next_event_sequence: self.events.next_sequence(),
        }
    }

    /// Rebuild state from a snapshot.
    ///
    /// Rows are checked the way live calls would have written them: one row
    /// per key, escrows open with a depositor of record and conserved, and
    /// an event sequence that can still advance.
    pub fn restore(
        snapshot: CustodySnapshot,
        event_log_capacity: Option<usize>,
    ) -> Result<Self, SnapshotError> {
        if snapshot.owner.is_zero() {
            return Err(SnapshotError::NullOwner);
        }
        let next = snapshot.next_event_sequence;
        if next == 0 || next == u64::MAX {
            return Err(SnapshotError::SequenceOutOfRange { next });
        }

        let mut state = Self::new(snapshot.owner, event_log_capacity);
        state.events = EventLog::resume(next, event_log_capacity);

        for entry in snapshot.accounts {
            if state
                .registry
                .insert_record(entry.account, entry.record)
                .is_some()
            {
                return Err(SnapshotError::DuplicateAccount {
                    account: entry.account,
                });
            }
        }
        for entry in snapshot.escrows {
            let follower = entry.follower;
            if follower.is_zero() {
                return Err(SnapshotError::NullFollower);
            }
            if !entry.escrow.exists {
                return Err(SnapshotError::EscrowNotOpen { follower });
            }
            if entry.escrow.depositor_of_record.is_zero() {
                return Err(SnapshotError::NullDepositor { follower });
            }
            if state.ledger.insert_escrow(follower, entry.escrow).is_some() {
                return Err(SnapshotError::DuplicateEscrow { follower });
            }
            state.ledger.verify_conservation(&follower)?;
        }
        for entry in snapshot.balances {
            if state
                .engine
                .insert_balance(entry.account, entry.token, entry.amount)
                .is_some()
            {
                return Err(SnapshotError::DuplicateBalance {
                    account: entry.account,
                    token: entry.token,
                });
            }
        }
        Ok(state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account: Address,
    pub record: AccountRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEntry {
    pub follower: Address,
    pub escrow: EscrowAccount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub account: Address,
    pub token: TokenId,
    pub amount: Amount,
}

/// Serializable copy of the three custody tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodySnapshot {
    pub owner: Address,
    pub accounts: Vec<AccountEntry>,
    pub escrows: Vec<EscrowEntry>,
    pub balances: Vec<BalanceEntry>,
    pub next_event_sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustodyConfig;
    use crate::errors::{EscrowError, ErrorKind};
    use crate::registry;
    use crate::token::InMemoryTokenLedger;
    use crate::txn::UnitOfWork;

    fn populated() -> CustodyState {
        let mut state = CustodyState::new(Address::from_label("owner"), None);
        let follower = Address::from_label("follower");
        let depositor = Address::from_label("depositor");
        let token = TokenId::from_label("USDT");

        state.registry.insert_record(
            depositor,
            AccountRecord {
                active: true,
                clearance_level: 1,
            },
        );
        let mut escrow = EscrowAccount::open(depositor);
        escrow.credit(token, 100_000_000_000_000_000_000).unwrap();
        state.ledger.insert_escrow(follower, escrow);
        state
            .engine
            .insert_balance(follower, token, 100_000_000_000_000_000_000);
        state
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let state = populated();
        let snapshot = state.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let deser: CustodySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(deser, snapshot);

        let restored = CustodyState::restore(deser, None).unwrap();
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn test_restore_rejects_unbalanced_escrow() {
        let mut snapshot = populated().snapshot();
        snapshot.escrows[0].escrow.total_deposit += 1;
        let err = CustodyState::restore(snapshot, None).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::Escrow(EscrowError::InvariantViolation { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_restore_rejects_unopened_escrow() {
        let mut snapshot = populated().snapshot();
        let follower = snapshot.escrows[0].follower;
        snapshot.escrows[0].escrow.exists = false;
        assert_eq!(
            CustodyState::restore(snapshot, None).unwrap_err(),
            SnapshotError::EscrowNotOpen { follower }
        );
    }

    #[test]
    fn test_restore_rejects_null_depositor() {
        let mut snapshot = populated().snapshot();
        let follower = snapshot.escrows[0].follower;
        snapshot.escrows[0].escrow.depositor_of_record = Address::ZERO;
        let err = CustodyState::restore(snapshot, None).unwrap_err();
        assert_eq!(err, SnapshotError::NullDepositor { follower });
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_restore_rejects_null_follower_and_owner() {
        let mut snapshot = populated().snapshot();
        snapshot.escrows[0].follower = Address::ZERO;
        assert_eq!(
            CustodyState::restore(snapshot, None).unwrap_err(),
            SnapshotError::NullFollower
        );

        let mut snapshot = populated().snapshot();
        snapshot.owner = Address::ZERO;
        assert_eq!(
            CustodyState::restore(snapshot, None).unwrap_err(),
            SnapshotError::NullOwner
        );
    }

    #[test]
    fn test_restore_rejects_duplicate_rows() {
        let mut snapshot = populated().snapshot();
        let account = snapshot.accounts[0].clone();
        snapshot.accounts.push(account.clone());
        assert_eq!(
            CustodyState::restore(snapshot, None).unwrap_err(),
            SnapshotError::DuplicateAccount {
                account: account.account
            }
        );

        let mut snapshot = populated().snapshot();
        let escrow = snapshot.escrows[0].clone();
        snapshot.escrows.push(escrow.clone());
        assert_eq!(
            CustodyState::restore(snapshot, None).unwrap_err(),
            SnapshotError::DuplicateEscrow {
                follower: escrow.follower
            }
        );

        let mut snapshot = populated().snapshot();
        let balance = snapshot.balances[0].clone();
        snapshot.balances.push(BalanceEntry {
            amount: 1,
            ..balance.clone()
        });
        assert_eq!(
            CustodyState::restore(snapshot, None).unwrap_err(),
            SnapshotError::DuplicateBalance {
                account: balance.account,
                token: balance.token
            }
        );
    }

    #[test]
    fn test_restore_rejects_sequence_out_of_range() {
        for next in [0, u64::MAX] {
            let mut snapshot = populated().snapshot();
            snapshot.next_event_sequence = next;
            assert_eq!(
                CustodyState::restore(snapshot, None).unwrap_err(),
                SnapshotError::SequenceOutOfRange { next }
            );
        }
    }

    #[test]
    fn test_last_sequence_fails_cleanly_without_state_change() {
        let owner = Address::from_label("owner");
        let account = Address::from_label("account");
        let mut snapshot = populated().snapshot();
        snapshot.next_event_sequence = u64::MAX - 1;
        let mut state = CustodyState::restore(snapshot, None).unwrap();
        let tokens = InMemoryTokenLedger::new();
        let config = CustodyConfig::default();

        let uow = UnitOfWork::begin(&mut state, &tokens, &config);
        let record = registry::set_status(uow, owner, account, true).unwrap();
        assert_eq!(record.sequence, u64::MAX - 1);

        let before = state.snapshot();
        let uow = UnitOfWork::begin(&mut state, &tokens, &config);
        let err = registry::set_clearance_level(uow, owner, account, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Overflow);
        assert_eq!(state.snapshot(), before);
        assert_eq!(state.registry().account(&account).clearance_level, 0);
        assert_eq!(state.events().len(), 1);
    }

    #[test]
    fn test_restore_continues_event_sequence() {
        let mut snapshot = populated().snapshot();
        snapshot.next_event_sequence = 10;
        let restored = CustodyState::restore(snapshot, None).unwrap();
        assert_eq!(restored.events().next_sequence(), 10);
        assert_eq!(restored.events().latest_sequence(), 9);
    }
}
