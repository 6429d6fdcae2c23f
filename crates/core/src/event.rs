use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, TokenId};

/// Notification emitted by a committed ledger invocation.
///
/// A batch transfer emits exactly one `TransferBatch` carrying the full id
/// and amount sequences, not one event per element. Mint uses the null
/// account as `from`, burn uses it as `to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    TransferSingle {
        operator: Address,
        from: Address,
        to: Address,
        id: TokenId,
        amount: Amount,
    },
    TransferBatch {
        operator: Address,
        from: Address,
        to: Address,
        ids: Vec<TokenId>,
        amounts: Vec<Amount>,
    },
    ApprovalChanged {
        owner: Address,
        operator: Address,
        approved: bool,
    },
    MetadataChanged {
        uri: String,
        id: TokenId,
    },
}
