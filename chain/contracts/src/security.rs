//! Shared security primitives for contract modules
//!
//! Provides the owner credential check used by the access registry and the
//! reentrancy guard that keeps token-ledger callbacks from re-entering the
//! custody facade while it holds its state lock.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};
use types::ids::Address;

use crate::errors::AccessError;

/// Single-writer capability for registry setters.
///
/// The caller's address is passed explicitly into every restricted call and
/// compared against the configured owner; there is no ambient "current
/// sender".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    owner: Address,
}

impl Ownership {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    /// Get the current owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Reject any caller other than the owner.
    pub fn ensure_owner(&self, caller: Address) -> Result<(), AccessError> {
        if caller != self.owner {
            return Err(AccessError::NotOwner { caller });
        }
        Ok(())
    }

    /// Hand ownership to `new_owner`. Caller must be the current owner.
    pub fn transfer(&mut self, caller: Address, new_owner: Address) -> Result<Address, AccessError> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(AccessError::NullOwner);
        }
        let previous = self.owner;
        self.owner = new_owner;
        Ok(previous)
    }
}

/// Reentrancy guard keyed by thread.
///
/// A thread enters before touching custody state and leaves when the
/// returned token drops. A second entry from the same thread (i.e. from a
/// token-ledger callback running inside a custody call) is refused instead
/// of deadlocking on the state lock. Other threads are unaffected and simply
/// queue on the lock.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    active: Mutex<HashSet<ThreadId>>,
}

impl ReentrancyGuard {
    /// Create a new guard with no threads inside.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the guarded region. Returns `None` on a reentrancy attempt.
    pub fn enter(&self) -> Option<Entered<'_>> {
        let id = thread::current().id();
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(id) {
            return None;
        }
        Some(Entered { guard: self, id })
    }
}

/// Proof of entry; leaves the guarded region on drop.
#[derive(Debug)]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
    id: ThreadId,
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
