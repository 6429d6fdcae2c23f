//! Snapshot codec for the persistent ledger state
//!
//! Balances, approvals, URI overrides, and supply totals round-trip through
//! bincode. Receiver hooks and in-flight invocation state are host wiring
//! and are not part of a snapshot; a restored ledger starts with no
//! registered receivers.

use crate::ledger::MultiTokenLedger;
use crate::LedgerError;

pub fn encode(ledger: &MultiTokenLedger) -> Result<Vec<u8>, LedgerError> {
    bincode::serde::encode_to_vec(ledger, bincode::config::standard())
        .map_err(|_| LedgerError::InvalidSnapshot)
}

pub fn decode(bytes: &[u8]) -> Result<MultiTokenLedger, LedgerError> {
    let (ledger, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|_| LedgerError::InvalidSnapshot)?;
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollectionConfig;
    use tessera_core::types::{address_from_u64, token_id_from_u64};

    #[test]
    fn snapshot_round_trip_preserves_ledger_state() {
        let mut ledger = MultiTokenLedger::new(CollectionConfig::default());
        let a = address_from_u64(1);
        let b = address_from_u64(2);
        let class = token_id_from_u64(9);

        ledger.mint(a, a, class, 500, &[]).unwrap();
        ledger.safe_transfer_from(a, a, b, class, 200, &[]).unwrap();
        ledger.burn(b, b, class, 50).unwrap();
        ledger.set_approval_for_all(a, b, true).unwrap();
        ledger.set_uri(class, "X".to_string()).unwrap();

        let restored = decode(&encode(&ledger).unwrap()).unwrap();
        assert_eq!(restored.balance_of(a, class), 300);
        assert_eq!(restored.balance_of(b, class), 150);
        assert_eq!(restored.total_minted(class), 500);
        assert_eq!(restored.total_burned(class), 50);
        assert!(restored.is_approved_for_all(a, b));
        assert_eq!(restored.uri(class), "X");
        assert_eq!(restored.name(), ledger.name());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(matches!(
            decode(&[0xde, 0xad, 0xbe, 0xef]),
            Err(LedgerError::InvalidSnapshot)
        ));
    }
}
