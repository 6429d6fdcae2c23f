//! Multi-token ledger state machine
//!
//! Every state-changing operation is a single all-or-nothing transition:
//! authorize, validate, apply journaled mutations, stage the notification,
//! then run the acceptance handshake for contract recipients. Any failure
//! rolls the journal back and leaves no observable state change. A per-
//! invocation guard flag is held across the acceptance callback, so a
//! recipient that re-enters a mutating entry point gets `ReentrantCall`.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use tessera_core::{Address, Amount, Event, TokenId, NULL_ACCOUNT};

use crate::metadata;
use crate::receiver::{TokenReceiver, BATCH_ACK, SINGLE_ACK};
use crate::{CollectionConfig, LedgerError};

/// Previous value of a mutated entry, recorded before every write so a
/// failed invocation can be undone in reverse order.
enum Undo {
    Balance(Address, TokenId, Amount),
    Minted(TokenId, Amount),
    Burned(TokenId, Amount),
}

#[derive(Serialize, Deserialize)]
pub struct MultiTokenLedger {
    config: CollectionConfig,
    balances: BTreeMap<(Address, TokenId), Amount>,
    approvals: BTreeMap<(Address, Address), bool>,
    uri_overrides: BTreeMap<TokenId, String>,
    minted: BTreeMap<TokenId, Amount>,
    burned: BTreeMap<TokenId, Amount>,
    #[serde(skip)]
    events: Vec<Event>,
    #[serde(skip)]
    receivers: BTreeMap<Address, Arc<dyn TokenReceiver>>,
    #[serde(skip)]
    in_flight: bool,
}

impl MultiTokenLedger {
    pub fn new(config: CollectionConfig) -> Self {
        Self {
            config,
            balances: BTreeMap::new(),
            approvals: BTreeMap::new(),
            uri_overrides: BTreeMap::new(),
            minted: BTreeMap::new(),
            burned: BTreeMap::new(),
            events: Vec::new(),
            receivers: BTreeMap::new(),
            in_flight: false,
        }
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// Registers a receiver hook for `address`, marking it as a contract
    /// account. Transfers and mints into it must be acknowledged by the
    /// hook before they commit.
    pub fn register_receiver(&mut self, address: Address, hook: Arc<dyn TokenReceiver>) {
        self.receivers.insert(address, hook);
    }

    // =========================================================================
    // Read operations
    // =========================================================================

    pub fn balance_of(&self, account: Address, id: TokenId) -> Amount {
        self.balances.get(&(account, id)).copied().unwrap_or(0)
    }

    /// Order-preserving batch lookup over paired account/class sequences.
    pub fn balance_of_batch(
        &self,
        accounts: &[Address],
        ids: &[TokenId],
    ) -> Result<Vec<Amount>, LedgerError> {
        if accounts.len() != ids.len() {
            return Err(LedgerError::LengthMismatch {
                left: accounts.len(),
                right: ids.len(),
            });
        }
        Ok(accounts
            .iter()
            .zip(ids)
            .map(|(account, id)| self.balance_of(*account, *id))
            .collect())
    }

    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.approvals.get(&(owner, operator)).copied().unwrap_or(false)
    }

    pub fn uri(&self, id: TokenId) -> String {
        metadata::resolve_uri(&self.uri_overrides, &self.config.base_uri, id)
    }

    pub fn total_minted(&self, id: TokenId) -> Amount {
        self.minted.get(&id).copied().unwrap_or(0)
    }

    pub fn total_burned(&self, id: TokenId) -> Amount {
        self.burned.get(&id).copied().unwrap_or(0)
    }

    /// Total ever minted minus total ever burned for a class.
    pub fn total_supply(&self, id: TokenId) -> Amount {
        self.total_minted(id) - self.total_burned(id)
    }

    /// Sum of all per-account balances for a class. Equal to
    /// [`total_supply`](Self::total_supply) whenever the conservation
    /// invariant holds, which is always.
    pub fn circulating_supply(&self, id: TokenId) -> Amount {
        self.balances
            .iter()
            .filter(|((_, entry_id), _)| *entry_id == id)
            .map(|(_, amount)| amount)
            .sum()
    }

    /// Drains the staged notifications of committed invocations.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // Write operations
    // =========================================================================

    pub fn set_approval_for_all(
        &mut self,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> Result<(), LedgerError> {
        self.enter()?;
        let result = self.set_approval_inner(caller, operator, approved);
        self.in_flight = false;
        result
    }

    pub fn safe_transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<(), LedgerError> {
        self.enter()?;
        let result = self.transfer_single(caller, from, to, id, amount, data);
        self.in_flight = false;
        result
    }

    pub fn safe_batch_transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        ids: &[TokenId],
        amounts: &[Amount],
        data: &[u8],
    ) -> Result<(), LedgerError> {
        self.enter()?;
        let result = self.transfer_batch(caller, from, to, ids, amounts, data);
        self.in_flight = false;
        result
    }

    pub fn mint(
        &mut self,
        caller: Address,
        to: Address,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<(), LedgerError> {
        self.enter()?;
        let result = self.mint_single(caller, to, id, amount, data);
        self.in_flight = false;
        result
    }

    pub fn mint_batch(
        &mut self,
        caller: Address,
        to: Address,
        ids: &[TokenId],
        amounts: &[Amount],
        data: &[u8],
    ) -> Result<(), LedgerError> {
        self.enter()?;
        let result = self.mint_batch_inner(caller, to, ids, amounts, data);
        self.in_flight = false;
        result
    }

    pub fn burn(
        &mut self,
        caller: Address,
        from: Address,
        id: TokenId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.enter()?;
        let result = self.burn_inner(caller, from, id, amount);
        self.in_flight = false;
        result
    }

    pub fn set_uri(&mut self, id: TokenId, new_uri: String) -> Result<(), LedgerError> {
        self.enter()?;
        let result = self.set_uri_inner(id, new_uri);
        self.in_flight = false;
        result
    }

    // =========================================================================
    // Invocation internals
    // =========================================================================

    fn enter(&mut self) -> Result<(), LedgerError> {
        if self.in_flight {
            return Err(LedgerError::ReentrantCall);
        }
        self.in_flight = true;
        Ok(())
    }

    /// Debiting party must be the caller or have approved the caller as
    /// operator. Checked before any mutation.
    fn authorize(&self, caller: Address, from: Address) -> Result<(), LedgerError> {
        if caller == from || self.is_approved_for_all(from, caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized)
        }
    }

    fn set_approval_inner(
        &mut self,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> Result<(), LedgerError> {
        if operator == caller {
            return Err(LedgerError::SelfApprovalForbidden);
        }
        if approved {
            self.approvals.insert((caller, operator), true);
        } else {
            self.approvals.remove(&(caller, operator));
        }
        // Idempotent on state, but a repeated set still notifies.
        self.events.push(Event::ApprovalChanged {
            owner: caller,
            operator,
            approved,
        });
        debug!(
            "approval {} -> {} set to {}",
            tag(&caller),
            tag(&operator),
            approved
        );
        Ok(())
    }

    fn transfer_single(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<(), LedgerError> {
        self.authorize(caller, from)?;
        if to == NULL_ACCOUNT {
            return Err(LedgerError::InvalidRecipient);
        }
        let mut journal = Vec::new();
        if let Err(e) = self.apply_transfer(&mut journal, caller, from, to, id, amount, data) {
            self.rollback(journal);
            return Err(e);
        }
        self.events.push(Event::TransferSingle {
            operator: caller,
            from,
            to,
            id,
            amount,
        });
        debug!(
            "transfer {} -> {}: {} of class {}",
            tag(&from),
            tag(&to),
            amount,
            tag(&id)
        );
        Ok(())
    }

    fn apply_transfer(
        &mut self,
        journal: &mut Vec<Undo>,
        operator: Address,
        from: Address,
        to: Address,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<(), LedgerError> {
        self.debit(journal, from, id, amount)?;
        self.credit(journal, to, id, amount)?;
        self.accept_single(operator, from, to, id, amount, data)
    }

    fn transfer_batch(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        ids: &[TokenId],
        amounts: &[Amount],
        data: &[u8],
    ) -> Result<(), LedgerError> {
        self.authorize(caller, from)?;
        if to == NULL_ACCOUNT {
            return Err(LedgerError::InvalidRecipient);
        }
        check_paired(ids, amounts)?;
        let mut journal = Vec::new();
        if let Err(e) = self.apply_batch(&mut journal, caller, from, to, ids, amounts, data) {
            self.rollback(journal);
            return Err(e);
        }
        self.events.push(Event::TransferBatch {
            operator: caller,
            from,
            to,
            ids: ids.to_vec(),
            amounts: amounts.to_vec(),
        });
        debug!(
            "batch transfer {} -> {}: {} classes",
            tag(&from),
            tag(&to),
            ids.len()
        );
        Ok(())
    }

    fn apply_batch(
        &mut self,
        journal: &mut Vec<Undo>,
        operator: Address,
        from: Address,
        to: Address,
        ids: &[TokenId],
        amounts: &[Amount],
        data: &[u8],
    ) -> Result<(), LedgerError> {
        for (id, amount) in ids.iter().zip(amounts) {
            self.debit(journal, from, *id, *amount)?;
            self.credit(journal, to, *id, *amount)?;
        }
        self.accept_batch(operator, from, to, ids, amounts, data)
    }

    fn mint_single(
        &mut self,
        caller: Address,
        to: Address,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<(), LedgerError> {
        if to == NULL_ACCOUNT {
            return Err(LedgerError::InvalidRecipient);
        }
        let mut journal = Vec::new();
        if let Err(e) = self.apply_mint(&mut journal, caller, to, id, amount, data) {
            self.rollback(journal);
            return Err(e);
        }
        self.events.push(Event::TransferSingle {
            operator: caller,
            from: NULL_ACCOUNT,
            to,
            id,
            amount,
        });
        debug!("mint {} of class {} to {}", amount, tag(&id), tag(&to));
        Ok(())
    }

    fn apply_mint(
        &mut self,
        journal: &mut Vec<Undo>,
        operator: Address,
        to: Address,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<(), LedgerError> {
        self.credit(journal, to, id, amount)?;
        self.record_mint(journal, id, amount)?;
        self.accept_single(operator, NULL_ACCOUNT, to, id, amount, data)
    }

    fn mint_batch_inner(
        &mut self,
        caller: Address,
        to: Address,
        ids: &[TokenId],
        amounts: &[Amount],
        data: &[u8],
    ) -> Result<(), LedgerError> {
        if to == NULL_ACCOUNT {
            return Err(LedgerError::InvalidRecipient);
        }
        check_paired(ids, amounts)?;
        let mut journal = Vec::new();
        if let Err(e) = self.apply_mint_batch(&mut journal, caller, to, ids, amounts, data) {
            self.rollback(journal);
            return Err(e);
        }
        self.events.push(Event::TransferBatch {
            operator: caller,
            from: NULL_ACCOUNT,
            to,
            ids: ids.to_vec(),
            amounts: amounts.to_vec(),
        });
        debug!("batch mint to {}: {} classes", tag(&to), ids.len());
        Ok(())
    }

    fn apply_mint_batch(
        &mut self,
        journal: &mut Vec<Undo>,
        operator: Address,
        to: Address,
        ids: &[TokenId],
        amounts: &[Amount],
        data: &[u8],
    ) -> Result<(), LedgerError> {
        for (id, amount) in ids.iter().zip(amounts) {
            self.credit(journal, to, *id, *amount)?;
            self.record_mint(journal, *id, *amount)?;
        }
        self.accept_batch(operator, NULL_ACCOUNT, to, ids, amounts, data)
    }

    fn burn_inner(
        &mut self,
        caller: Address,
        from: Address,
        id: TokenId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.authorize(caller, from)?;
        let mut journal = Vec::new();
        let applied = self
            .debit(&mut journal, from, id, amount)
            .and_then(|()| self.record_burn(&mut journal, id, amount));
        if let Err(e) = applied {
            self.rollback(journal);
            return Err(e);
        }
        // Burning never requires recipient cooperation; no acceptance check.
        self.events.push(Event::TransferSingle {
            operator: caller,
            from,
            to: NULL_ACCOUNT,
            id,
            amount,
        });
        debug!("burn {} of class {} from {}", amount, tag(&id), tag(&from));
        Ok(())
    }

    fn set_uri_inner(&mut self, id: TokenId, new_uri: String) -> Result<(), LedgerError> {
        self.uri_overrides.insert(id, new_uri.clone());
        self.events.push(Event::MetadataChanged { uri: new_uri, id });
        debug!("uri override set for class {}", tag(&id));
        Ok(())
    }

    // =========================================================================
    // Ledger mutation primitives
    // =========================================================================

    fn credit(
        &mut self,
        journal: &mut Vec<Undo>,
        account: Address,
        id: TokenId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let have = self.balance_of(account, id);
        let new = have.checked_add(amount).ok_or(LedgerError::Overflow)?;
        journal.push(Undo::Balance(account, id, have));
        self.balances.insert((account, id), new);
        Ok(())
    }

    /// Sole enforcement point of the non-negativity invariant.
    fn debit(
        &mut self,
        journal: &mut Vec<Undo>,
        account: Address,
        id: TokenId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let have = self.balance_of(account, id);
        if amount > have {
            return Err(LedgerError::InsufficientBalance { have, need: amount });
        }
        journal.push(Undo::Balance(account, id, have));
        self.balances.insert((account, id), have - amount);
        Ok(())
    }

    fn record_mint(
        &mut self,
        journal: &mut Vec<Undo>,
        id: TokenId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let prev = self.total_minted(id);
        let new = prev.checked_add(amount).ok_or(LedgerError::Overflow)?;
        journal.push(Undo::Minted(id, prev));
        self.minted.insert(id, new);
        Ok(())
    }

    fn record_burn(
        &mut self,
        journal: &mut Vec<Undo>,
        id: TokenId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let prev = self.total_burned(id);
        let new = prev.checked_add(amount).ok_or(LedgerError::Overflow)?;
        journal.push(Undo::Burned(id, prev));
        self.burned.insert(id, new);
        Ok(())
    }

    fn rollback(&mut self, journal: Vec<Undo>) {
        for entry in journal.into_iter().rev() {
            match entry {
                Undo::Balance(account, id, prev) => {
                    self.balances.insert((account, id), prev);
                }
                Undo::Minted(id, prev) => {
                    self.minted.insert(id, prev);
                }
                Undo::Burned(id, prev) => {
                    self.burned.insert(id, prev);
                }
            }
        }
    }

    // =========================================================================
    // Acceptance handshake
    // =========================================================================

    fn accept_single(
        &mut self,
        operator: Address,
        from: Address,
        to: Address,
        id: TokenId,
        amount: Amount,
        data: &[u8],
    ) -> Result<(), LedgerError> {
        let hook = match self.receivers.get(&to) {
            Some(hook) => hook.clone(),
            None => return Ok(()),
        };
        trace!("running single acceptance handshake with {}", tag(&to));
        match hook.on_receive_single(self, operator, from, id, amount, data) {
            Ok(ack) if ack == SINGLE_ACK => Ok(()),
            _ => Err(LedgerError::RecipientRejected),
        }
    }

    fn accept_batch(
        &mut self,
        operator: Address,
        from: Address,
        to: Address,
        ids: &[TokenId],
        amounts: &[Amount],
        data: &[u8],
    ) -> Result<(), LedgerError> {
        let hook = match self.receivers.get(&to) {
            Some(hook) => hook.clone(),
            None => return Ok(()),
        };
        trace!("running batch acceptance handshake with {}", tag(&to));
        match hook.on_receive_batch(self, operator, from, ids, amounts, data) {
            Ok(ack) if ack == BATCH_ACK => Ok(()),
            _ => Err(LedgerError::RecipientRejected),
        }
    }
}

fn check_paired(ids: &[TokenId], amounts: &[Amount]) -> Result<(), LedgerError> {
    if ids.len() != amounts.len() {
        return Err(LedgerError::LengthMismatch {
            left: ids.len(),
            right: amounts.len(),
        });
    }
    Ok(())
}

/// Short hex tag of the trailing bytes, for log lines.
fn tag(bytes: &[u8; 32]) -> String {
    bytes[28..].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::ReceiverAck;
    use std::sync::Mutex;
    use tessera_core::types::{address_from_u64, token_id_from_u64};

    fn ledger() -> MultiTokenLedger {
        MultiTokenLedger::new(CollectionConfig::default())
    }

    fn addr(n: u64) -> Address {
        address_from_u64(n)
    }

    fn id(n: u64) -> TokenId {
        token_id_from_u64(n)
    }

    struct AcceptingReceiver;

    impl TokenReceiver for AcceptingReceiver {
        fn on_receive_single(
            &self,
            _ledger: &mut MultiTokenLedger,
            _operator: Address,
            _from: Address,
            _id: TokenId,
            _amount: Amount,
            _data: &[u8],
        ) -> Result<ReceiverAck, LedgerError> {
            Ok(SINGLE_ACK)
        }

        fn on_receive_batch(
            &self,
            _ledger: &mut MultiTokenLedger,
            _operator: Address,
            _from: Address,
            _ids: &[TokenId],
            _amounts: &[Amount],
            _data: &[u8],
        ) -> Result<ReceiverAck, LedgerError> {
            Ok(BATCH_ACK)
        }
    }

    /// Errors on single receives, returns the wrong magic on batch
    /// receives, so both rejection paths are covered.
    struct RejectingReceiver;

    impl TokenReceiver for RejectingReceiver {
        fn on_receive_single(
            &self,
            _ledger: &mut MultiTokenLedger,
            _operator: Address,
            _from: Address,
            _id: TokenId,
            _amount: Amount,
            _data: &[u8],
        ) -> Result<ReceiverAck, LedgerError> {
            Err(LedgerError::RecipientRejected)
        }

        fn on_receive_batch(
            &self,
            _ledger: &mut MultiTokenLedger,
            _operator: Address,
            _from: Address,
            _ids: &[TokenId],
            _amounts: &[Amount],
            _data: &[u8],
        ) -> Result<ReceiverAck, LedgerError> {
            Ok(SINGLE_ACK)
        }
    }

    /// Records the balance it holds at callback time, proving the ledger
    /// mutation is finalized before the call leaves the trust boundary.
    struct ObservingReceiver {
        address: Address,
        seen: Mutex<Option<Amount>>,
    }

    impl TokenReceiver for ObservingReceiver {
        fn on_receive_single(
            &self,
            ledger: &mut MultiTokenLedger,
            _operator: Address,
            _from: Address,
            id: TokenId,
            _amount: Amount,
            _data: &[u8],
        ) -> Result<ReceiverAck, LedgerError> {
            *self.seen.lock().unwrap() = Some(ledger.balance_of(self.address, id));
            Ok(SINGLE_ACK)
        }

        fn on_receive_batch(
            &self,
            _ledger: &mut MultiTokenLedger,
            _operator: Address,
            _from: Address,
            _ids: &[TokenId],
            _amounts: &[Amount],
            _data: &[u8],
        ) -> Result<ReceiverAck, LedgerError> {
            Ok(BATCH_ACK)
        }
    }

    /// Tries to move the received tokens straight back out during its own
    /// acceptance callback and records what happened.
    struct ReentrantReceiver {
        address: Address,
        observed: Mutex<Option<LedgerError>>,
    }

    impl TokenReceiver for ReentrantReceiver {
        fn on_receive_single(
            &self,
            ledger: &mut MultiTokenLedger,
            _operator: Address,
            from: Address,
            id: TokenId,
            amount: Amount,
            _data: &[u8],
        ) -> Result<ReceiverAck, LedgerError> {
            let attempt =
                ledger.safe_transfer_from(self.address, self.address, from, id, amount, &[]);
            *self.observed.lock().unwrap() = attempt.err();
            Ok(SINGLE_ACK)
        }

        fn on_receive_batch(
            &self,
            _ledger: &mut MultiTokenLedger,
            _operator: Address,
            _from: Address,
            _ids: &[TokenId],
            _amounts: &[Amount],
            _data: &[u8],
        ) -> Result<ReceiverAck, LedgerError> {
            Ok(BATCH_ACK)
        }
    }

    #[test]
    fn balance_defaults_to_zero() {
        let ledger = ledger();
        assert_eq!(ledger.balance_of(addr(1), id(1)), 0);
    }

    #[test]
    fn batch_lookup_preserves_order() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 10, &[]).unwrap();
        ledger.mint(addr(2), addr(2), id(2), 20, &[]).unwrap();

        let balances = ledger
            .balance_of_batch(&[addr(2), addr(1), addr(3)], &[id(2), id(1), id(1)])
            .unwrap();
        assert_eq!(balances, vec![20, 10, 0]);
    }

    #[test]
    fn batch_lookup_rejects_unpaired_inputs() {
        let ledger = ledger();
        let result = ledger.balance_of_batch(&[addr(1)], &[id(1), id(2)]);
        assert!(matches!(
            result,
            Err(LedgerError::LengthMismatch { left: 1, right: 2 })
        ));
    }

    #[test]
    fn mint_then_transfer_walkthrough() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 1000, &[]).unwrap();
        ledger
            .safe_transfer_from(addr(1), addr(1), addr(2), id(1), 400, &[])
            .unwrap();

        assert_eq!(ledger.balance_of(addr(1), id(1)), 600);
        assert_eq!(ledger.balance_of(addr(2), id(1)), 400);
        assert_eq!(ledger.total_supply(id(1)), 1000);

        let events = ledger.take_events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            Event::TransferSingle {
                operator: addr(1),
                from: NULL_ACCOUNT,
                to: addr(1),
                id: id(1),
                amount: 1000,
            }
        );
        assert_eq!(
            events[1],
            Event::TransferSingle {
                operator: addr(1),
                from: addr(1),
                to: addr(2),
                id: id(1),
                amount: 400,
            }
        );
    }

    #[test]
    fn mint_burn_round_trip() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(7), 1000, &[]).unwrap();
        ledger.burn(addr(1), addr(1), id(7), 1000).unwrap();

        assert_eq!(ledger.balance_of(addr(1), id(7)), 0);
        assert_eq!(ledger.total_minted(id(7)), 1000);
        assert_eq!(ledger.total_burned(id(7)), 1000);
        assert_eq!(ledger.total_supply(id(7)), 0);

        let burn_event = ledger.take_events().pop().unwrap();
        assert_eq!(
            burn_event,
            Event::TransferSingle {
                operator: addr(1),
                from: addr(1),
                to: NULL_ACCOUNT,
                id: id(7),
                amount: 1000,
            }
        );
    }

    #[test]
    fn self_approval_always_rejected() {
        let mut ledger = ledger();
        assert!(matches!(
            ledger.set_approval_for_all(addr(1), addr(1), true),
            Err(LedgerError::SelfApprovalForbidden)
        ));
        assert!(matches!(
            ledger.set_approval_for_all(addr(1), addr(1), false),
            Err(LedgerError::SelfApprovalForbidden)
        ));
        assert!(!ledger.is_approved_for_all(addr(1), addr(1)));
        assert!(ledger.take_events().is_empty());
    }

    #[test]
    fn repeated_approval_is_idempotent_but_still_notifies() {
        let mut ledger = ledger();
        ledger.set_approval_for_all(addr(1), addr(2), true).unwrap();
        ledger.set_approval_for_all(addr(1), addr(2), true).unwrap();

        assert!(ledger.is_approved_for_all(addr(1), addr(2)));
        assert_eq!(ledger.take_events().len(), 2);
    }

    #[test]
    fn operator_transfer_honors_grant_and_revoke() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 100, &[]).unwrap();

        ledger.set_approval_for_all(addr(1), addr(9), true).unwrap();
        ledger
            .safe_transfer_from(addr(9), addr(1), addr(2), id(1), 30, &[])
            .unwrap();
        assert_eq!(ledger.balance_of(addr(2), id(1)), 30);

        ledger.set_approval_for_all(addr(1), addr(9), false).unwrap();
        let result = ledger.safe_transfer_from(addr(9), addr(1), addr(2), id(1), 30, &[]);
        assert!(matches!(result, Err(LedgerError::Unauthorized)));
        assert_eq!(ledger.balance_of(addr(1), id(1)), 70);
    }

    #[test]
    fn unauthorized_transfer_has_no_side_effects() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 100, &[]).unwrap();
        ledger.take_events();

        let result = ledger.safe_transfer_from(addr(2), addr(1), addr(2), id(1), 10, &[]);
        assert!(matches!(result, Err(LedgerError::Unauthorized)));
        assert_eq!(ledger.balance_of(addr(1), id(1)), 100);
        assert!(ledger.take_events().is_empty());
    }

    #[test]
    fn null_account_cannot_receive() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 10, &[]).unwrap();

        assert!(matches!(
            ledger.safe_transfer_from(addr(1), addr(1), NULL_ACCOUNT, id(1), 1, &[]),
            Err(LedgerError::InvalidRecipient)
        ));
        assert!(matches!(
            ledger.mint(addr(1), NULL_ACCOUNT, id(1), 1, &[]),
            Err(LedgerError::InvalidRecipient)
        ));
        assert!(matches!(
            ledger.mint_batch(addr(1), NULL_ACCOUNT, &[id(1)], &[1], &[]),
            Err(LedgerError::InvalidRecipient)
        ));
    }

    #[test]
    fn overdraw_fails_and_leaves_balances_unchanged() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 50, &[]).unwrap();

        let result = ledger.safe_transfer_from(addr(1), addr(1), addr(2), id(1), 51, &[]);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { have: 50, need: 51 })
        ));
        assert_eq!(ledger.balance_of(addr(1), id(1)), 50);
        assert_eq!(ledger.balance_of(addr(2), id(1)), 0);

        assert!(matches!(
            ledger.burn(addr(1), addr(1), id(1), 51),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(ledger.balance_of(addr(1), id(1)), 50);
    }

    #[test]
    fn batch_transfer_is_all_or_nothing() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 10, &[]).unwrap();
        ledger.mint(addr(1), addr(1), id(2), 5, &[]).unwrap();
        ledger.take_events();

        let result = ledger.safe_batch_transfer_from(
            addr(1),
            addr(1),
            addr(2),
            &[id(1), id(2)],
            &[10, 20],
            &[],
        );
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { have: 5, need: 20 })
        ));

        // The id(1) debit passed its own check but must be rolled back.
        assert_eq!(ledger.balance_of(addr(1), id(1)), 10);
        assert_eq!(ledger.balance_of(addr(1), id(2)), 5);
        assert_eq!(ledger.balance_of(addr(2), id(1)), 0);
        assert!(ledger.take_events().is_empty());
    }

    #[test]
    fn batch_transfer_rejects_unpaired_inputs() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 10, &[]).unwrap();

        let result =
            ledger.safe_batch_transfer_from(addr(1), addr(1), addr(2), &[id(1)], &[1, 2], &[]);
        assert!(matches!(
            result,
            Err(LedgerError::LengthMismatch { left: 1, right: 2 })
        ));
        assert!(matches!(
            ledger.mint_batch(addr(1), addr(2), &[id(1), id(2)], &[1], &[]),
            Err(LedgerError::LengthMismatch { left: 2, right: 1 })
        ));
    }

    #[test]
    fn batch_transfer_emits_one_event() {
        let mut ledger = ledger();
        ledger
            .mint_batch(addr(1), addr(1), &[id(1), id(2)], &[10, 20], &[])
            .unwrap();
        ledger.take_events();

        ledger
            .safe_batch_transfer_from(addr(1), addr(1), addr(2), &[id(1), id(2)], &[1, 2], &[])
            .unwrap();

        let events = ledger.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            Event::TransferBatch {
                operator: addr(1),
                from: addr(1),
                to: addr(2),
                ids: vec![id(1), id(2)],
                amounts: vec![1, 2],
            }
        );
    }

    #[test]
    fn repeated_class_in_batch_debits_sequentially() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 1000, &[]).unwrap();

        // 600 + 600 exceeds the balance even though each element alone fits.
        let result = ledger.safe_batch_transfer_from(
            addr(1),
            addr(1),
            addr(2),
            &[id(1), id(1)],
            &[600, 600],
            &[],
        );
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { have: 400, need: 600 })
        ));
        assert_eq!(ledger.balance_of(addr(1), id(1)), 1000);
    }

    #[test]
    fn contract_recipient_must_acknowledge() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 100, &[]).unwrap();

        let friendly = addr(100);
        ledger.register_receiver(friendly, Arc::new(AcceptingReceiver));
        ledger
            .safe_transfer_from(addr(1), addr(1), friendly, id(1), 10, &[])
            .unwrap();
        assert_eq!(ledger.balance_of(friendly, id(1)), 10);

        ledger
            .safe_batch_transfer_from(addr(1), addr(1), friendly, &[id(1)], &[5], &[])
            .unwrap();
        assert_eq!(ledger.balance_of(friendly, id(1)), 15);
    }

    #[test]
    fn rejecting_recipient_rolls_back_everything() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 100, &[]).unwrap();
        ledger.take_events();

        let hostile = addr(100);
        ledger.register_receiver(hostile, Arc::new(RejectingReceiver));

        let result = ledger.safe_transfer_from(addr(1), addr(1), hostile, id(1), 10, &[]);
        assert!(matches!(result, Err(LedgerError::RecipientRejected)));
        assert_eq!(ledger.balance_of(addr(1), id(1)), 100);
        assert_eq!(ledger.balance_of(hostile, id(1)), 0);
        assert!(ledger.take_events().is_empty());
    }

    #[test]
    fn wrong_magic_value_counts_as_rejection() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 100, &[]).unwrap();

        // RejectingReceiver answers batch receives with the single-shape ack.
        let hostile = addr(100);
        ledger.register_receiver(hostile, Arc::new(RejectingReceiver));

        let result =
            ledger.safe_batch_transfer_from(addr(1), addr(1), hostile, &[id(1)], &[10], &[]);
        assert!(matches!(result, Err(LedgerError::RecipientRejected)));
        assert_eq!(ledger.balance_of(addr(1), id(1)), 100);
    }

    #[test]
    fn mint_runs_the_acceptance_check() {
        let mut ledger = ledger();
        let hostile = addr(100);
        ledger.register_receiver(hostile, Arc::new(RejectingReceiver));
        ledger.take_events();

        let result = ledger.mint(addr(1), hostile, id(1), 10, &[]);
        assert!(matches!(result, Err(LedgerError::RecipientRejected)));
        assert_eq!(ledger.balance_of(hostile, id(1)), 0);
        assert_eq!(ledger.total_minted(id(1)), 0);
        assert!(ledger.take_events().is_empty());
    }

    #[test]
    fn burn_skips_the_acceptance_check() {
        let mut ledger = ledger();
        let account = addr(100);
        ledger.mint(addr(1), account, id(1), 10, &[]).unwrap();

        // Registering a hostile hook after the mint cannot block burning.
        ledger.register_receiver(account, Arc::new(RejectingReceiver));
        ledger.burn(account, account, id(1), 10).unwrap();
        assert_eq!(ledger.balance_of(account, id(1)), 0);
    }

    #[test]
    fn receiver_observes_post_transfer_state() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 100, &[]).unwrap();

        let observer_addr = addr(100);
        let observer = Arc::new(ObservingReceiver {
            address: observer_addr,
            seen: Mutex::new(None),
        });
        ledger.register_receiver(observer_addr, observer.clone());

        ledger
            .safe_transfer_from(addr(1), addr(1), observer_addr, id(1), 40, &[])
            .unwrap();
        assert_eq!(*observer.seen.lock().unwrap(), Some(40));
    }

    #[test]
    fn reentrant_mutation_is_blocked_for_the_whole_invocation() {
        let mut ledger = ledger();
        ledger.mint(addr(1), addr(1), id(1), 100, &[]).unwrap();

        let hostile = addr(100);
        let receiver = Arc::new(ReentrantReceiver {
            address: hostile,
            observed: Mutex::new(None),
        });
        ledger.register_receiver(hostile, receiver.clone());

        ledger
            .safe_transfer_from(addr(1), addr(1), hostile, id(1), 25, &[])
            .unwrap();

        // The re-entry attempt was refused, the outer transfer committed.
        assert_eq!(
            *receiver.observed.lock().unwrap(),
            Some(LedgerError::ReentrantCall)
        );
        assert_eq!(ledger.balance_of(hostile, id(1)), 25);
        assert_eq!(ledger.balance_of(addr(1), id(1)), 75);
        assert_eq!(ledger.circulating_supply(id(1)), ledger.total_supply(id(1)));
    }

    #[test]
    fn zero_amount_transfer_is_permitted() {
        let mut ledger = ledger();
        ledger
            .safe_transfer_from(addr(1), addr(1), addr(2), id(1), 0, &[])
            .unwrap();
        assert_eq!(ledger.take_events().len(), 1);
    }

    #[test]
    fn supply_counter_overflow_rolls_back_the_credit() {
        let mut ledger = ledger();
        ledger
            .mint(addr(1), addr(1), id(1), u64::MAX, &[])
            .unwrap();

        // The credit to addr(2) succeeds first, then the minted counter
        // overflows; the journal must restore the credited balance.
        let result = ledger.mint(addr(1), addr(2), id(1), 1, &[]);
        assert!(matches!(result, Err(LedgerError::Overflow)));
        assert_eq!(ledger.balance_of(addr(2), id(1)), 0);
        assert_eq!(ledger.total_minted(id(1)), u64::MAX);
    }

    #[test]
    fn conservation_holds_under_random_churn() {
        use rand::Rng;

        let mut ledger = ledger();
        let mut rng = rand::rng();
        let accounts: Vec<Address> = (1..=4).map(addr).collect();
        let classes: Vec<TokenId> = (1..=3).map(id).collect();

        for _ in 0..500 {
            let from = accounts[rng.random_range(0..accounts.len())];
            let to = accounts[rng.random_range(0..accounts.len())];
            let class = classes[rng.random_range(0..classes.len())];
            let amount = rng.random_range(0..200u64);

            // Overdraws are expected along the way; only the invariant at
            // the end matters.
            let _ = match rng.random_range(0..4u32) {
                0 => ledger.mint(from, from, class, amount, &[]),
                1 => ledger.burn(from, from, class, amount),
                _ => ledger.safe_transfer_from(from, from, to, class, amount, &[]),
            };
        }

        for class in classes {
            assert_eq!(
                ledger.circulating_supply(class),
                ledger.total_supply(class),
                "conservation violated for class {:?}",
                class
            );
        }
    }

    #[test]
    fn uri_override_and_fallback() {
        let mut ledger = MultiTokenLedger::new(CollectionConfig {
            name: "Test".to_string(),
            symbol: "TST".to_string(),
            base_uri: "https://meta.example/".to_string(),
        });

        assert_eq!(ledger.uri(id(42)), "https://meta.example/42");

        ledger.set_uri(id(42), "X".to_string()).unwrap();
        assert_eq!(ledger.uri(id(42)), "X");
        assert_eq!(
            ledger.take_events().pop().unwrap(),
            Event::MetadataChanged {
                uri: "X".to_string(),
                id: id(42),
            }
        );
    }
}
