//! Shared fixtures for custody integration tests
#![allow(dead_code)]

use custody_contracts::{Custody, CustodyConfig, InMemoryTokenLedger, TokenLedger};
use types::ids::{Address, TokenId};
use types::numeric::{to_base_units, Amount};

/// Token with 18 decimals, the way the deployment fixtures mint it.
pub fn units(whole: u128) -> Amount {
    to_base_units(whole, 18).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub struct Harness<L: TokenLedger = InMemoryTokenLedger> {
    pub custody: Custody<L>,
    pub owner: Address,
    pub depositor: Address,
    pub follower: Address,
    pub token: TokenId,
}

impl<L: TokenLedger> Harness<L> {
    pub fn custody_address(&self) -> Address {
        self.custody.config().custody_address
    }

    pub fn activate(&self, account: Address, clearance_level: u64) {
        self.custody.set_status(self.owner, account, true).unwrap();
        self.custody
            .set_clearance_level(self.owner, account, clearance_level)
            .unwrap();
    }

    pub fn external_balance(&self, account: Address) -> Amount {
        self.custody.tokens().balance_of(self.token, account)
    }
}

/// Depositor holds 1500 units and approved 1000 to custody. Depositor and
/// follower are active at clearance level 1.
pub fn setup() -> Harness {
    setup_with(CustodyConfig::default())
}

pub fn setup_with(config: CustodyConfig) -> Harness {
    let tokens = InMemoryTokenLedger::new();
    fund(&tokens, &config);
    build(config, tokens)
}

pub fn fund(tokens: &InMemoryTokenLedger, config: &CustodyConfig) {
    let token = TokenId::from_label("TTT");
    let depositor = Address::from_label("depositor");
    tokens.mint(token, depositor, units(1_500)).unwrap();
    tokens.approve(token, depositor, config.custody_address, units(1_000));
}

pub fn build<L: TokenLedger>(config: CustodyConfig, tokens: L) -> Harness<L> {
    init_tracing();
    let owner = Address::from_label("owner");
    let harness = Harness {
        custody: Custody::new(owner, config, tokens).unwrap(),
        owner,
        depositor: Address::from_label("depositor"),
        follower: Address::from_label("follower"),
        token: TokenId::from_label("TTT"),
    };
    harness.activate(harness.depositor, 1);
    harness.activate(harness.follower, 1);
    harness
}
