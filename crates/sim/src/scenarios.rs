//! Demonstration scenarios for exercising the Tessera ledger

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;
use log::info;
use rand::Rng;
use tokio::sync::RwLock;

use tessera_core::types::{address_from_u64, token_id_from_u64};
use tessera_core::{Address, Amount, TokenId};
use tessera_ledger::{
    snapshot, CollectionConfig, LedgerError, MultiTokenLedger, ReceiverAck, TokenReceiver,
    BATCH_ACK, SINGLE_ACK,
};

/// Contract account that acknowledges everything sent to it.
struct Vault;

impl TokenReceiver for Vault {
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

/// Contract account that refuses all deposits.
struct ClosedVault;

impl TokenReceiver for ClosedVault {
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
        Err(LedgerError::RecipientRejected)
    }
}

/// Contract account that tries to move the deposit straight back out from
/// inside its own acceptance callback, then acknowledges anyway.
struct GreedyVault {
    address: Address,
}

impl TokenReceiver for GreedyVault {
    fn on_receive_single(
        &self,
        ledger: &mut MultiTokenLedger,
        _operator: Address,
        from: Address,
        id: TokenId,
        amount: Amount,
        _data: &[u8],
    ) -> Result<ReceiverAck, LedgerError> {
        match ledger.safe_transfer_from(self.address, self.address, from, id, amount, &[]) {
            Err(LedgerError::ReentrantCall) => {
                println!("  ✓ re-entry attempt from inside the callback was refused")
            }
            other => println!("  ✗ re-entry attempt was not blocked: {:?}", other),
        }
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

fn short(bytes: &[u8; 32]) -> String {
    hex::encode(&bytes[28..])
}

pub fn walkthrough() {
    println!("Starting ledger walkthrough");
    let mut ledger = MultiTokenLedger::new(CollectionConfig::default());
    println!(
        "Collection: {} ({})",
        ledger.name(),
        ledger.symbol()
    );

    let alice = address_from_u64(1);
    let bob = address_from_u64(2);
    let broker = address_from_u64(3);
    let gold = token_id_from_u64(1);
    let silver = token_id_from_u64(2);

    println!("\n=== Mint and transfer ===");
    match ledger.mint(alice, alice, gold, 1000, &[]) {
        Ok(()) => println!("✓ minted 1000 gold to alice"),
        Err(e) => println!("✗ mint failed: {}", e),
    }
    match ledger.safe_transfer_from(alice, alice, bob, gold, 400, &[]) {
        Ok(()) => println!("✓ alice sent 400 gold to bob"),
        Err(e) => println!("✗ transfer failed: {}", e),
    }
    println!("  alice: {} gold", ledger.balance_of(alice, gold));
    println!("  bob:   {} gold", ledger.balance_of(bob, gold));
    println!("  supply: {}", ledger.total_supply(gold));

    println!("\n=== Operator approvals ===");
    match ledger.set_approval_for_all(alice, broker, true) {
        Ok(()) => println!("✓ alice approved the broker"),
        Err(e) => println!("✗ approval failed: {}", e),
    }
    match ledger.safe_transfer_from(broker, alice, bob, gold, 100, &[]) {
        Ok(()) => println!("✓ broker moved 100 gold on alice's behalf"),
        Err(e) => println!("✗ operator transfer failed: {}", e),
    }
    let _ = ledger.set_approval_for_all(alice, broker, false);
    match ledger.safe_transfer_from(broker, alice, bob, gold, 100, &[]) {
        Err(LedgerError::Unauthorized) => println!("✓ revoked broker is refused"),
        other => println!("✗ expected refusal, got {:?}", other),
    }

    println!("\n=== Batch operations ===");
    match ledger.mint_batch(alice, alice, &[gold, silver], &[0, 50], &[]) {
        Ok(()) => println!("✓ batch mint committed"),
        Err(e) => println!("✗ batch mint failed: {}", e),
    }
    // Second element overdraws, so the first must be rolled back too.
    match ledger.safe_batch_transfer_from(alice, alice, bob, &[gold, silver], &[100, 600], &[]) {
        Err(LedgerError::InsufficientBalance { have, need }) => {
            println!("✓ overdrawing batch refused (have {}, need {})", have, need)
        }
        other => println!("✗ expected refusal, got {:?}", other),
    }
    println!(
        "  alice still holds {} gold and {} silver",
        ledger.balance_of(alice, gold),
        ledger.balance_of(alice, silver)
    );

    println!("\n=== Metadata ===");
    println!("  default uri: {}", ledger.uri(silver));
    match ledger.set_uri(silver, "ipfs://silver-metadata".to_string()) {
        Ok(()) => println!("✓ override set, uri is now {}", ledger.uri(silver)),
        Err(e) => println!("✗ set_uri failed: {}", e),
    }

    println!("\n=== Snapshot ===");
    match snapshot::encode(&ledger) {
        Ok(bytes) => {
            println!("✓ snapshot is {} bytes", bytes.len());
            match snapshot::decode(&bytes) {
                Ok(restored) if restored.balance_of(alice, gold) == ledger.balance_of(alice, gold) => {
                    println!("✓ restored ledger agrees on alice's balance")
                }
                Ok(_) => println!("✗ restored ledger disagrees"),
                Err(e) => println!("✗ decode failed: {}", e),
            }
        }
        Err(e) => println!("✗ encode failed: {}", e),
    }

    let events = ledger.take_events();
    println!("\n{} notifications emitted over the walkthrough", events.len());
}

pub fn acceptance_demo() {
    println!("\n=== Receiver Acceptance Protocol ===");
    let mut ledger = MultiTokenLedger::new(CollectionConfig::default());

    let treasury = address_from_u64(1);
    let vault = address_from_u64(50);
    let closed = address_from_u64(51);
    let greedy = address_from_u64(52);
    let gold = token_id_from_u64(1);

    let _ = ledger.mint(treasury, treasury, gold, 1_000, &[]);
    ledger.register_receiver(vault, Arc::new(Vault));
    ledger.register_receiver(closed, Arc::new(ClosedVault));
    ledger.register_receiver(greedy, Arc::new(GreedyVault { address: greedy }));

    match ledger.safe_transfer_from(treasury, treasury, vault, gold, 100, &[]) {
        Ok(()) => println!("✓ acknowledging vault received 100 gold"),
        Err(e) => println!("✗ deposit into vault failed: {}", e),
    }

    match ledger.safe_transfer_from(treasury, treasury, closed, gold, 100, &[]) {
        Err(LedgerError::RecipientRejected) => {
            println!("✓ closed vault rejected the deposit");
            println!(
                "  treasury still holds {} gold, closed vault holds {}",
                ledger.balance_of(treasury, gold),
                ledger.balance_of(closed, gold)
            );
        }
        other => println!("✗ expected rejection, got {:?}", other),
    }

    println!("depositing into a vault that tries to re-enter the ledger:");
    match ledger.safe_transfer_from(treasury, treasury, greedy, gold, 100, &[]) {
        Ok(()) => println!(
            "✓ outer deposit committed, greedy vault holds {} gold",
            ledger.balance_of(greedy, gold)
        ),
        Err(e) => println!("✗ deposit failed: {}", e),
    }
}

/// Randomized op mix against a fresh ledger, with conservation verified per
/// class at the end.
pub fn churn_test(config: &crate::WorkloadConfig) {
    println!("Running randomized churn: {} operations", config.operations);

    let mut ledger = MultiTokenLedger::new(CollectionConfig::default());
    let accounts: Vec<Address> = (1..=config.accounts as u64).map(address_from_u64).collect();
    let classes: Vec<TokenId> = (1..=config.token_classes as u64)
        .map(token_id_from_u64)
        .collect();

    for account in accounts.iter().rev().take(config.hostile_receivers) {
        ledger.register_receiver(*account, Arc::new(ClosedVault));
    }

    let mut rng = rand::rng();
    let mut committed = 0u64;
    let mut rejected = 0u64;
    let mut refused = 0u64;

    let bar = ProgressBar::new(config.operations);
    for _ in 0..config.operations {
        let from = accounts[rng.random_range(0..accounts.len())];
        let to = accounts[rng.random_range(0..accounts.len())];
        let class = classes[rng.random_range(0..classes.len())];
        let amount = rng.random_range(0..config.max_amount);

        let result = match rng.random_range(0..6u32) {
            0 => ledger.mint(from, from, class, amount, &[]),
            1 => ledger.burn(from, from, class, amount),
            2 => {
                let second = classes[rng.random_range(0..classes.len())];
                ledger.safe_batch_transfer_from(
                    from,
                    from,
                    to,
                    &[class, second],
                    &[amount, amount / 2],
                    &[],
                )
            }
            _ => ledger.safe_transfer_from(from, from, to, class, amount, &[]),
        };
        match result {
            Ok(()) => committed += 1,
            Err(LedgerError::RecipientRejected) => rejected += 1,
            Err(_) => refused += 1,
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!("  committed: {}", committed);
    println!("  rejected by receivers: {}", rejected);
    println!("  refused (overdraws and friends): {}", refused);
    println!("  notifications emitted: {}", ledger.take_events().len());

    let mut intact = true;
    for class in &classes {
        if ledger.circulating_supply(*class) != ledger.total_supply(*class) {
            println!("✗ conservation violated for class {}", short(class));
            intact = false;
        }
    }
    if intact {
        println!("✓ conservation holds across all {} classes", classes.len());
    }

    match snapshot::encode(&ledger) {
        Ok(bytes) => println!("✓ post-churn snapshot is {} bytes", bytes.len()),
        Err(e) => println!("✗ snapshot failed: {}", e),
    }
}

/// Serves the query API over a live ledger and keeps a background workload
/// churning through it until ctrl-c, publishing every committed
/// notification to the event log and WebSocket subscribers.
pub async fn live_session(addr: SocketAddr, config: crate::WorkloadConfig) {
    let ledger = Arc::new(RwLock::new(MultiTokenLedger::new(CollectionConfig::default())));
    let state = rpc::SharedState::new(ledger.clone());

    tokio::spawn(rpc::run_api(state.clone(), addr));
    info!("query API listening on {}", addr);

    let accounts: Vec<Address> = (1..=config.accounts as u64).map(address_from_u64).collect();
    let classes: Vec<TokenId> = (1..=config.token_classes as u64)
        .map(token_id_from_u64)
        .collect();

    // Seed every class so transfers have something to move.
    let seeded = {
        let mut guard = ledger.write().await;
        for class in &classes {
            let _ = guard.mint(accounts[0], accounts[0], *class, config.max_amount * 100, &[]);
        }
        guard.take_events()
    };
    rpc::publish_events(&state, seeded).await;

    let churn = {
        let ledger = ledger.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(250));
            loop {
                ticker.tick().await;
                let committed = {
                    let mut guard = ledger.write().await;
                    let mut rng = rand::rng();
                    let from = accounts[rng.random_range(0..accounts.len())];
                    let to = accounts[rng.random_range(0..accounts.len())];
                    let class = classes[rng.random_range(0..classes.len())];
                    let amount = rng.random_range(0..config.max_amount);
                    let _ = match rng.random_range(0..6u32) {
                        0 => guard.mint(from, from, class, amount, &[]),
                        1 => guard.burn(from, from, class, amount),
                        _ => guard.safe_transfer_from(from, from, to, class, amount, &[]),
                    };
                    guard.take_events()
                };
                rpc::publish_events(&state, committed).await;
            }
        })
    };

    tokio::signal::ctrl_c().await.unwrap();
    churn.abort();
    println!("live session stopped");
}
