//! Access registry — participation status and clearance levels
//!
//! Single source of truth for whether an account may participate and at
//! which tier. Only the owner may write; anyone may query.
//!
//! Querying an inactive account is an error, not `false`: "not
//! participating" and "insufficient clearance" are distinct conditions.

use std::collections::HashMap;
use tracing::debug;
use types::account::AccountRecord;
use types::ids::Address;
use types::numeric::ClearanceLevel;

use crate::errors::AccessError;
use crate::events::{
    AccountStatusChanged, ClearanceLevelChanged, ContractEvent, EventRecord, OwnershipTransferred,
};
use crate::security::Ownership;
use crate::txn::UnitOfWork;

/// Account status and clearance table with an owner credential.
#[derive(Debug, Clone)]
pub struct AccessRegistry {
    ownership: Ownership,
    accounts: HashMap<Address, AccountRecord>,
}

impl AccessRegistry {
    pub fn new(owner: Address) -> Self {
        Self {
            ownership: Ownership::new(owner),
            accounts: HashMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.ownership.owner()
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    /// Registry row for `account`; unknown accounts read as inactive, level 0.
    pub fn account(&self, account: &Address) -> AccountRecord {
        self.accounts.get(account).copied().unwrap_or_default()
    }

    /// `Err(AccountInactive)` for inactive accounts, otherwise whether the
    /// clearance level meets `required`.
    pub fn is_authorized(
        &self,
        account: Address,
        required: ClearanceLevel,
    ) -> Result<bool, AccessError> {
        let record = self.account(&account);
        if !record.active {
            return Err(AccessError::AccountInactive { account });
        }
        Ok(record.meets(required))
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &AccountRecord)> {
        self.accounts.iter()
    }

    pub(crate) fn insert_record(
        &mut self,
        account: Address,
        record: AccountRecord,
    ) -> Option<AccountRecord> {
        self.accounts.insert(account, record)
    }

    pub(crate) fn remove_record(&mut self, account: &Address) {
        self.accounts.remove(account);
    }

    pub(crate) fn set_ownership(&mut self, ownership: Ownership) {
        self.ownership = ownership;
    }
}

/// Owner-only: set `account`'s active flag. Always emits, even if unchanged.
pub(crate) fn set_status(
    mut uow: UnitOfWork<'_>,
    caller: Address,
    account: Address,
    active: bool,
) -> Result<EventRecord, AccessError> {
    uow.state().registry().ownership().ensure_owner(caller)?;

    let mut record = uow.state().registry().account(&account);
    record.active = active;
    uow.put_account(account, record);

    debug!(%account, active, "Account status set");
    Ok(uow.commit(ContractEvent::AccountStatusChanged(AccountStatusChanged {
        account,
        active,
    }))?)
}

/// Owner-only: set `account`'s clearance level.
pub(crate) fn set_clearance_level(
    mut uow: UnitOfWork<'_>,
    caller: Address,
    account: Address,
    clearance_level: ClearanceLevel,
) -> Result<EventRecord, AccessError> {
    uow.state().registry().ownership().ensure_owner(caller)?;

    let mut record = uow.state().registry().account(&account);
    record.clearance_level = clearance_level;
    uow.put_account(account, record);

    debug!(%account, clearance_level, "Clearance level set");
    Ok(uow.commit(ContractEvent::ClearanceLevelChanged(ClearanceLevelChanged {
        account,
        clearance_level,
    }))?)
}

/// Owner-only: hand the registry to `new_owner`.
pub(crate) fn transfer_ownership(
    mut uow: UnitOfWork<'_>,
    caller: Address,
    new_owner: Address,
) -> Result<EventRecord, AccessError> {
    let mut ownership = *uow.state().registry().ownership();
    let previous_owner = ownership.transfer(caller, new_owner)?;
    uow.put_ownership(ownership);

    Ok(uow.commit(ContractEvent::OwnershipTransferred(OwnershipTransferred {
        previous_owner,
        new_owner,
    }))?)
}
