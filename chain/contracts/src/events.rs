//! Contract events and the append-only event log
//!
//! Every successful mutating call produces exactly one event. Events are
//! staged inside a unit of work and only reach the log when it commits, so
//! a rolled-back call never leaves a trace here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use types::ids::{Address, TokenId};
use types::numeric::{Amount, ClearanceLevel};
use uuid::Uuid;

use crate::errors::EventLogError;

/// Registry owner changed an account's active flag.
///
/// Emitted on every successful call, including writes of the current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatusChanged {
    pub account: Address,
    pub active: bool,
}

/// Registry owner changed an account's clearance level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearanceLevelChanged {
    pub account: Address,
    pub clearance_level: ClearanceLevel,
}

/// Registry ownership moved to a new address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTransferred {
    pub previous_owner: Address,
    pub new_owner: Address,
}

/// Funds pulled from a depositor into a follower's escrow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposited {
    pub follower: Address,
    pub depositor: Address,
    pub token: TokenId,
    pub amount: Amount,
}

/// Depositor of record topped up an existing escrow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositUpdated {
    pub follower: Address,
    pub depositor: Address,
    pub token: TokenId,
    pub amount: Amount,
}

/// Value moved by the transfer engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensTransferred {
    pub token: TokenId,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub follower: Address,
}

/// Escrowed funds paid out of custody by an authorized operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowReleased {
    pub operator: Address,
    pub follower: Address,
    pub token: TokenId,
    pub amount: Amount,
    pub recipient: Address,
}

/// Enum wrapper for all contract events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    AccountStatusChanged(AccountStatusChanged),
    ClearanceLevelChanged(ClearanceLevelChanged),
    OwnershipTransferred(OwnershipTransferred),
    Deposited(Deposited),
    DepositUpdated(DepositUpdated),
    TokensTransferred(TokensTransferred),
    EscrowReleased(EscrowReleased),
}

impl ContractEvent {
    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            ContractEvent::AccountStatusChanged(_) => "account_status_changed",
            ContractEvent::ClearanceLevelChanged(_) => "clearance_level_changed",
            ContractEvent::OwnershipTransferred(_) => "ownership_transferred",
            ContractEvent::Deposited(_) => "deposited",
            ContractEvent::DepositUpdated(_) => "deposit_updated",
            ContractEvent::TokensTransferred(_) => "tokens_transferred",
            ContractEvent::EscrowReleased(_) => "escrow_released",
        }
    }
}

/// A committed event with its position in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Strictly increasing, starting at 1, never reused
    pub sequence: u64,
    pub event_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub event: ContractEvent,
}

/// Append-only notification stream consumed by dispatchers.
///
/// With a capacity set, the oldest records are evicted once it is reached;
/// sequence numbers keep increasing regardless.
#[derive(Debug, Clone)]
pub struct EventLog {
    records: VecDeque<EventRecord>,
    next_sequence: u64,
    capacity: Option<usize>,
}

impl EventLog {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            records: VecDeque::new(),
            next_sequence: 1,
            capacity,
        }
    }

    /// Resume a log whose earlier records were persisted elsewhere.
    pub fn resume(next_sequence: u64, capacity: Option<usize>) -> Self {
        Self {
            records: VecDeque::new(),
            next_sequence: next_sequence.max(1),
            capacity,
        }
    }

    /// Fails once the sequence numbers are exhausted. Nothing is appended then.
    pub fn ensure_room(&self) -> Result<(), EventLogError> {
        self.following_sequence().map(|_| ())
    }

    /// Append an event and return the committed record.
    pub fn append(&mut self, event: ContractEvent) -> Result<EventRecord, EventLogError> {
        let following = self.following_sequence()?;
        let record = EventRecord {
            sequence: self.next_sequence,
            event_id: Uuid::now_v7(),
            recorded_at: Utc::now(),
            event,
        };
        self.next_sequence = following;

        if let Some(cap) = self.capacity {
            while self.records.len() >= cap.max(1) {
                self.records.pop_front();
            }
        }
        self.records.push_back(record.clone());
        Ok(record)
    }

    fn following_sequence(&self) -> Result<u64, EventLogError> {
        self.next_sequence
            .checked_add(1)
            .ok_or(EventLogError::SequenceExhausted {
                last: self.latest_sequence(),
            })
    }

    /// All retained records, oldest first
    pub fn records(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    /// Retained records with `sequence > after`
    pub fn since(&self, after: u64) -> Vec<EventRecord> {
        self.records
            .iter()
            .filter(|r| r.sequence > after)
            .cloned()
            .collect()
    }

    /// Sequence of the most recent committed record (0 if none)
    pub fn latest_sequence(&self) -> u64 {
        self.next_sequence - 1
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(None)
    }
}
