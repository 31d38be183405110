//! Custody configuration
//!
//! Deployment-time policy: which address custody pulls funds as, which
//! account the deposit gate checks, and the clearance level each entry
//! point requires. Missing JSON fields fall back to the defaults.

use serde::{Deserialize, Serialize};
use types::ids::Address;
use types::numeric::ClearanceLevel;

use crate::errors::ConfigError;

/// Account(s) that must pass the registry check before a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositGate {
    /// The follower whose escrow is credited.
    #[default]
    Follower,
    /// The account whose funds are pulled.
    Depositor,
    /// Both of the above.
    Both,
}

impl DepositGate {
    /// Accounts to check, in order.
    pub fn accounts(&self, follower: Address, depositor: Address) -> Vec<Address> {
        match self {
            DepositGate::Follower => vec![follower],
            DepositGate::Depositor => vec![depositor],
            DepositGate::Both => vec![depositor, follower],
        }
    }
}

/// Configuration for a custody instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    /// Address custody holds funds under and spends allowances as.
    pub custody_address: Address,
    pub deposit_gate: DepositGate,
    pub deposit_clearance_level: ClearanceLevel,
    pub transfer_clearance_level: ClearanceLevel,
    pub withdrawal_clearance_level: ClearanceLevel,
    /// Retained event records; `None` keeps all.
    pub event_log_capacity: Option<usize>,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            custody_address: Address::from_label("custody"),
            deposit_gate: DepositGate::Follower,
            deposit_clearance_level: 0,
            transfer_clearance_level: 1,
            withdrawal_clearance_level: 2,
            event_log_capacity: None,
        }
    }
}

impl CustodyConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.custody_address.is_zero() {
            return Err(ConfigError::NullCustodyAddress);
        }
        Ok(())
    }
}
