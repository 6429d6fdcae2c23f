//! simulation tools for the Tessera ledger

pub mod scenarios;

/// Shape of a randomized workload driven against a fresh ledger.
#[derive(Clone, Debug)]
pub struct WorkloadConfig {
    pub accounts: usize,
    pub token_classes: usize,
    pub operations: u64,
    pub max_amount: u64,
    /// How many accounts get a rejecting receiver hook registered, counted
    /// from the end of the account list.
    pub hostile_receivers: usize,
}

pub struct WorkloadPresets;

impl WorkloadPresets {
    pub fn light_traffic() -> WorkloadConfig {
        WorkloadConfig {
            accounts: 4,
            token_classes: 2,
            operations: 500,
            max_amount: 100,
            hostile_receivers: 0,
        }
    }

    pub fn mixed_traffic() -> WorkloadConfig {
        WorkloadConfig {
            accounts: 8,
            token_classes: 4,
            operations: 2_000,
            max_amount: 500,
            hostile_receivers: 1,
        }
    }

    pub fn adversarial_traffic() -> WorkloadConfig {
        WorkloadConfig {
            accounts: 8,
            token_classes: 4,
            operations: 2_000,
            max_amount: 500,
            hostile_receivers: 4,
        }
    }
}
