//! # Token Flows
//!
//! Transfers between bridged users and supply conservation across mint,
//! transfer and burn.

use super::fixtures::*;
use cb_03_token::{BurnRequest, TokenApi, TokenError};
use cb_05_reconciliation::ReconcileApi;
use shared_types::Amount;

const ALICE: &str = "alice::1220";
const BOB: &str = "bob::1220";
const CAROL: &str = "carol::1220";

#[tokio::test]
async fn test_supply_conserved_across_mint_transfer_burn() {
    let fx = Bridge::new(&[ALICE, BOB]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    let bob = fx.onboard(BOB, "0xb0b").await;

    fx.relay_deposit(&alice, "100", "0x01").await;
    fx.relay_deposit(&alice, "20.5", "0x02").await;
    fx.token
        .transfer(ALICE, BOB, &amount("70.25"), SYMBOL)
        .await
        .unwrap();
    assert_eq!(fx.supply().await, amount("120.5"));

    let bob_holding = fx.only_holding(&bob).await;
    fx.token
        .burn(&BurnRequest {
            owner: BOB.into(),
            holding_cid: bob_holding,
            amount: amount("30"),
            symbol: SYMBOL.into(),
            evm_destination: "0xdest".into(),
            user_fingerprint: bob.fingerprint.clone(),
            config_cid: None,
        })
        .await
        .unwrap();

    assert_eq!(fx.balance(&alice).await, amount("50.25"));
    assert_eq!(fx.balance(&bob).await, amount("40.25"));
    assert_eq!(fx.supply().await, amount("90.5"));
    assert_eq!(fx.audited_supply().await, fx.supply().await);
}

#[tokio::test]
async fn test_transfer_by_fingerprint_moves_ledger_and_cache() {
    let fx = Bridge::new(&[ALICE]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    let bob = fx.onboard(BOB, "0xb0b").await;
    fx.relay_deposit(&alice, "12", "0x01").await;
    fx.engine.reconcile_all().await.unwrap();

    fx.token
        .transfer_by_fingerprint("0xA11CE", "b0b", &amount("2.5"), SYMBOL)
        .await
        .unwrap();

    assert_eq!(fx.balance(&bob).await, amount("2.5"));
    assert_eq!(fx.store.balance_of(ALICE, SYMBOL), amount("9.5"));
    assert_eq!(fx.store.balance_of_fingerprint(&bob.fingerprint, SYMBOL), amount("2.5"));

    // The cache agrees with the ledger, so reconciliation changes nothing.
    fx.engine.reconcile_all().await.unwrap();
    assert_eq!(fx.store.balance_of(ALICE, SYMBOL), amount("9.5"));
    assert_eq!(fx.store.balance_of(BOB, SYMBOL), amount("2.5"));
}

#[tokio::test]
async fn test_transfer_without_funds_changes_nothing() {
    let fx = Bridge::new(&[ALICE]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    let carol = fx.onboard(CAROL, "0xca201").await;
    fx.relay_deposit(&alice, "1", "0x01").await;

    let result = fx.token.transfer(ALICE, CAROL, &amount("1.5"), SYMBOL).await;
    assert!(matches!(result, Err(TokenError::InsufficientBalance { .. })));

    assert_eq!(fx.balance(&alice).await, amount("1"));
    assert_eq!(fx.balance(&carol).await, Amount::zero());
    assert!(fx.ledger.executed().is_empty());
}

#[tokio::test]
async fn test_transfer_requires_sender_key() {
    let fx = Bridge::new(&[ALICE]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    let bob = fx.onboard(BOB, "0xb0b").await;
    fx.relay_deposit(&alice, "3", "0x01").await;
    fx.token.transfer(ALICE, BOB, &amount("3"), SYMBOL).await.unwrap();

    // Bob's key is custodied elsewhere.
    let result = fx.token.transfer(BOB, ALICE, &amount("1"), SYMBOL).await;
    assert!(matches!(result, Err(TokenError::NoSignerConfigured(p)) if p == BOB));
    assert_eq!(fx.balance(&bob).await, amount("3"));
}
