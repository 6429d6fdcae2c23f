//! Receiver acceptance protocol
//!
//! Transfers and mints into a contract account must be acknowledged by the
//! contract before the invocation commits, so tokens cannot get locked in a
//! destination that has no logic to move them back out. Contract-ness is
//! modeled as registration: the host registers a hook against an address
//! via [`MultiTokenLedger::register_receiver`]; an address without a hook
//! is a plain account and accepts unconditionally.

use tessera_core::{Address, Amount, TokenId};

use crate::ledger::MultiTokenLedger;
use crate::LedgerError;

/// Capability-acknowledgment handshake value. The hook must return the
/// exact constant for its call shape or the whole invocation rolls back.
pub type ReceiverAck = [u8; 4];

pub const SINGLE_ACK: ReceiverAck = *b"TSR1";
pub const BATCH_ACK: ReceiverAck = *b"TSRB";

/// Capability implemented by contract accounts that can receive tokens.
///
/// The hook runs after the ledger mutation is applied, so it observes
/// post-transfer state and may read the ledger freely. Mutating entry
/// points are blocked for the duration of the invocation by the reentrancy
/// guard and return [`LedgerError::ReentrantCall`].
pub trait TokenReceiver: Send + Sync {
    fn on_receive_single(
        &self,
        ledger: &mut MultiTokenLedger,
        operator: Address,
        from: Address,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<ReceiverAck, LedgerError>;

    fn on_receive_batch(
        &self,
        ledger: &mut MultiTokenLedger,
        operator: Address,
        from: Address,
        ids: &[TokenId],
        amounts: &[Amount],
        data: &[u8],
    ) -> Result<ReceiverAck, LedgerError>;
}
