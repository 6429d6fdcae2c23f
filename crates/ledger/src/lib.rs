//! multi-token balance ledger and atomic transfer protocol for Tessera

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_core::Amount;

pub mod ledger;
pub mod metadata;
pub mod receiver;
pub mod snapshot;

pub use ledger::MultiTokenLedger;
pub use receiver::{ReceiverAck, TokenReceiver, BATCH_ACK, SINGLE_ACK};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Paired input sequences differ in length: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Caller is neither the balance owner nor an approved operator")]
    Unauthorized,

    #[error("An account cannot approve itself as operator")]
    SelfApprovalForbidden,

    #[error("The null account cannot receive tokens")]
    InvalidRecipient,

    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    #[error("Recipient rejected the transfer")]
    RecipientRejected,

    #[error("Balance arithmetic overflow")]
    Overflow,

    #[error("Ledger is already executing an invocation")]
    ReentrantCall,

    #[error("Snapshot bytes failed to decode")]
    InvalidSnapshot,
}

/// Immutable collection identity, fixed at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub symbol: String,
    pub base_uri: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: "Tessera".to_string(),
            symbol: "TSR".to_string(),
            base_uri: "https://tokens.tessera.example/".to_string(),
        }
    }
}
