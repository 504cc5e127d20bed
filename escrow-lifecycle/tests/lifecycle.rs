//! End-to-end lifecycle behavior against the in-memory ledger and clock.

use escrow_lifecycle::{
    compat::{ERR_DEADLINE, ERR_NOT_FOUND},
    BlockClock, CreateEscrowRequest, DisputeOutcome, EscrowError, EscrowManager,
    EscrowManagerConfig, EscrowStatus, InMemoryLedger, LegacyOutcome,
};
use std::sync::Arc;

const BUYER: &str = "buyer-address";
const SELLER: &str = "seller-address";
const ARBITER: &str = "arbiter-address";

struct Setup {
    manager: Arc<EscrowManager>,
    ledger: Arc<InMemoryLedger>,
}

async fn setup() -> Setup {
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.deposit(BUYER, 10_000, None).await.unwrap();
    let clock = Arc::new(BlockClock::new(100));
    let manager = Arc::new(EscrowManager::new(
        EscrowManagerConfig::default(),
        ledger.clone(),
        clock,
    ));
    Setup { manager, ledger }
}

fn escrow_request(deadline: u64) -> CreateEscrowRequest {
    CreateEscrowRequest {
        buyer: BUYER.to_string(),
        seller: SELLER.to_string(),
        amount: 100,
        deadline,
        token: None,
        arbiter: Some(ARBITER.to_string()),
    }
}

#[tokio::test]
async fn refund_after_deadline_returns_funds() {
    let s = setup().await;
    let escrow_id = s.manager.create(escrow_request(1000)).await.unwrap();
    assert_eq!(escrow_id, 1);

    let escrow = s.manager.refund(1, BUYER, 1001).await.unwrap();

    assert_eq!(escrow.status, EscrowStatus::Refunded);
    assert_eq!(escrow.settled_at_height, Some(1001));
    assert_eq!(s.ledger.balance(BUYER, None).await, 10_000);
}

#[tokio::test]
async fn refund_before_deadline_is_rejected() {
    let s = setup().await;
    let escrow_id = s.manager.create(escrow_request(1000)).await.unwrap();
    let before = s.manager.get_escrow(escrow_id).await.unwrap();

    for height in [999, 1000] {
        let result = s.manager.refund(escrow_id, BUYER, height).await;
        assert_eq!(
            result,
            Err(EscrowError::DeadlineNotReached {
                deadline: 1000,
                current_height: height,
            })
        );
        assert_eq!(s.manager.get_escrow(escrow_id).await.unwrap(), before);
    }

    assert_eq!(before.status, EscrowStatus::Active);
    assert_eq!(s.manager.events_for(escrow_id).await.unwrap().len(), 1);
    assert_eq!(s.ledger.balance(BUYER, None).await, 9_900);
}

#[tokio::test]
async fn refund_by_non_buyer_is_unauthorized_regardless_of_deadline() {
    let s = setup().await;
    let escrow_id = s.manager.create(escrow_request(900)).await.unwrap();
    let before = s.manager.get_escrow(escrow_id).await.unwrap();

    for (caller, height) in [("not-buyer", 1001), ("not-buyer", 500), (SELLER, 1001), (ARBITER, 901)] {
        let result = s.manager.refund(escrow_id, caller, height).await;
        assert!(matches!(result, Err(EscrowError::Unauthorized { .. })));
        assert_eq!(s.manager.get_escrow(escrow_id).await.unwrap(), before);
    }

    assert_eq!(s.manager.events_for(escrow_id).await.unwrap().len(), 1);
    assert_eq!(s.ledger.balance(BUYER, None).await, 9_900);
}

#[tokio::test]
async fn refund_of_missing_escrow_is_not_found() {
    let s = setup().await;

    let result = s.manager.refund(999, BUYER, 1200).await;

    assert_eq!(result, Err(EscrowError::NotFound(999)));
    assert_eq!(LegacyOutcome::from(&result).err, Some(ERR_NOT_FOUND));
}

#[tokio::test]
async fn refund_of_released_escrow_is_invalid_state() {
    let s = setup().await;
    let escrow_id = s.manager.create(escrow_request(900)).await.unwrap();
    let before = s.manager.release(escrow_id, BUYER, 200).await.unwrap();

    let result = s.manager.refund(escrow_id, BUYER, 1200).await;

    assert!(matches!(
        result,
        Err(EscrowError::InvalidState {
            status: EscrowStatus::Released,
            ..
        })
    ));
    assert_eq!(LegacyOutcome::from(&result).err, Some(ERR_DEADLINE));
    assert_eq!(s.manager.get_escrow(escrow_id).await.unwrap(), before);
    assert_eq!(s.manager.events_for(escrow_id).await.unwrap().len(), 2);
    assert_eq!(s.ledger.balance(SELLER, None).await, 100);
    assert_eq!(s.ledger.balance(BUYER, None).await, 9_900);
}

#[tokio::test]
async fn second_refund_fails_with_invalid_state() {
    let s = setup().await;
    let escrow_id = s.manager.create(escrow_request(1000)).await.unwrap();

    s.manager.refund(escrow_id, BUYER, 1001).await.unwrap();
    let result = s.manager.refund(escrow_id, BUYER, 1001).await;

    assert!(matches!(
        result,
        Err(EscrowError::InvalidState {
            status: EscrowStatus::Refunded,
            ..
        })
    ));
    assert_eq!(s.ledger.balance(BUYER, None).await, 10_000);
}

#[tokio::test]
async fn each_escrow_reaches_exactly_one_terminal_state() {
    let s = setup().await;
    let released = s.manager.create(escrow_request(1000)).await.unwrap();
    let refunded = s.manager.create(escrow_request(1000)).await.unwrap();
    let resolved = s.manager.create(escrow_request(1000)).await.unwrap();

    s.manager.release(released, BUYER, 500).await.unwrap();
    s.manager.refund(refunded, BUYER, 1001).await.unwrap();
    s.manager.dispute(resolved, SELLER).await.unwrap();
    s.manager
        .resolve_dispute(resolved, ARBITER, DisputeOutcome::Seller)
        .await
        .unwrap();

    for escrow_id in [released, refunded, resolved] {
        let before = s.manager.get_escrow(escrow_id).await.unwrap();
        assert!(before.status.is_terminal());

        assert!(s.manager.release(escrow_id, BUYER, 2000).await.is_err());
        assert!(s.manager.refund(escrow_id, BUYER, 2000).await.is_err());
        assert!(s.manager.dispute(escrow_id, BUYER).await.is_err());
        assert!(s
            .manager
            .resolve_dispute(escrow_id, ARBITER, DisputeOutcome::Buyer)
            .await
            .is_err());

        assert_eq!(s.manager.get_escrow(escrow_id).await.unwrap(), before);
    }

    assert_eq!(s.ledger.balance(SELLER, None).await, 200);
    assert_eq!(s.ledger.balance(BUYER, None).await, 9_800);
    assert_eq!(s.ledger.balance("escrow-custody", None).await, 0);
}

#[tokio::test]
async fn concurrent_refunds_pay_out_once() {
    let s = setup().await;
    let escrow_id = s.manager.create(escrow_request(1000)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = Arc::clone(&s.manager);
        handles.push(tokio::spawn(async move {
            manager.refund(escrow_id, BUYER, 1001).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => assert!(matches!(err, EscrowError::InvalidState { .. })),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(s.ledger.balance(BUYER, None).await, 10_000);
    assert_eq!(s.manager.events_for(escrow_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_creates_get_unique_ids() {
    let s = setup().await;

    let mut handles = Vec::new();
    for _ in 0..32 {
        let manager = Arc::clone(&s.manager);
        handles.push(tokio::spawn(async move {
            manager.create(escrow_request(1000)).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort_unstable();
    ids.dedup();

    assert_eq!(ids.len(), 32);
    assert_eq!(s.manager.escrow_count().await, 32);
    assert_eq!(s.ledger.balance("escrow-custody", None).await, 3_200);
}

#[tokio::test]
async fn escrows_in_native_and_token_assets_are_independent() {
    let s = setup().await;
    s.ledger.deposit(BUYER, 50, Some("USDC")).await.unwrap();

    let mut token_request = escrow_request(1000);
    token_request.amount = 50;
    token_request.token = Some("USDC".to_string());
    let token_escrow = s.manager.create(token_request).await.unwrap();

    s.manager.release(token_escrow, BUYER, 200).await.unwrap();

    assert_eq!(s.ledger.balance(SELLER, Some("USDC")).await, 50);
    assert_eq!(s.ledger.balance(SELLER, None).await, 0);
    assert_eq!(s.ledger.balance(BUYER, None).await, 10_000);
}
