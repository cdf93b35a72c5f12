//! # Deposit Flows
//!
//! EVM deposit → pending deposit → mint, as driven by the deposit watcher.
//!
//! ## Properties
//!
//! - A deposit transaction hash mints at most once, whatever its casing
//! - A deposit for the wrong fingerprint never mints
//! - Deposits are recorded under the mapping's canonical fingerprint
//! - Minted supply matches the mint audit trail

use super::fixtures::*;
use cb_03_token::TokenApi;
use cb_04_bridge::BridgeApi;
use shared_types::Amount;

const ALICE: &str = "alice::1220";
const BOB: &str = "bob::1220";

#[tokio::test]
async fn test_deposit_mints_to_mapped_party() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;

    assert!(fx.relay_deposit(&alice, "250.75", "0xd0").await);

    assert_eq!(fx.balance(&alice).await, amount("250.75"));
    assert_eq!(fx.supply().await, amount("250.75"));
    assert_eq!(fx.audited_supply().await, amount("250.75"));
}

#[tokio::test]
async fn test_redelivered_deposit_mints_once() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;

    assert!(fx.relay_deposit(&alice, "10", "0xAbCd").await);
    // The watcher sees the same log again after a restart, lowercased.
    assert!(!fx.relay_deposit(&alice, "10", "0xabcd").await);
    assert!(!fx.relay_deposit(&alice, "10", "0xABCD").await);

    assert_eq!(fx.balance(&alice).await, amount("10"));
    assert_eq!(fx.supply().await, amount("10"));
}

#[tokio::test]
async fn test_deposit_for_other_fingerprint_does_not_mint() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    let bob = fx.onboard(BOB, "0xb0b").await;

    let deposit = fx
        .bridge
        .create_pending_deposit(&alice.fingerprint, &amount("5"), "0xd1")
        .await
        .unwrap();
    tokio_test::assert_err!(
        fx.bridge
            .process_deposit_and_mint(&deposit.contract_id, &bob.mapping_cid)
            .await
    );

    // Still pending, so the watcher will not create it a second time.
    assert!(fx.bridge.is_deposit_processed("0xd1").await.unwrap());
    assert_eq!(fx.supply().await, Amount::zero());

    fx.bridge
        .process_deposit_and_mint(&deposit.contract_id, &alice.mapping_cid)
        .await
        .unwrap();
    assert_eq!(fx.balance(&alice).await, amount("5"));
    assert_eq!(fx.balance(&bob).await, Amount::zero());
}

#[tokio::test]
async fn test_deposit_with_raw_fingerprint_mints() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;

    // The EVM log carries the fingerprint upper-cased and unprefixed.
    let deposit = fx
        .bridge
        .create_pending_deposit("A11CE", &amount("3"), "0xd2")
        .await
        .unwrap();
    assert_eq!(deposit.fingerprint, "0xa11ce");
    fx.bridge
        .process_deposit_and_mint(&deposit.contract_id, &alice.mapping_cid)
        .await
        .unwrap();

    assert_eq!(fx.balance(&alice).await, amount("3"));
    let mints = fx.token.get_mint_events().await.unwrap();
    assert_eq!(mints[0].user_fingerprint, "0xa11ce");
}

#[tokio::test]
async fn test_deposits_from_many_users_sum_exactly() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    let bob = fx.onboard(BOB, "0xb0b").await;

    fx.relay_deposit(&alice, "0.1", "0x01").await;
    fx.relay_deposit(&bob, "0.2", "0x02").await;
    fx.relay_deposit(&alice, "0.0000000001", "0x03").await;

    assert_eq!(fx.balance(&alice).await, amount("0.1000000001"));
    assert_eq!(fx.supply().await, amount("0.3000000001"));
    assert_eq!(fx.audited_supply().await, fx.supply().await);
}
