//! # Reconciliation Flows
//!
//! The off-ledger cache converging on ledger state.
//!
//! ## Properties
//!
//! - After `reconcile_all`, every registered user's cached balance equals
//!   the ledger balance, zero included
//! - Cached supply equals the ledger supply, holders outside the cache
//!   included
//! - A full rebuild repairs drift in both balances and the event log

use super::fixtures::*;
use cb_03_token::test_utils::seed_holding;
use cb_03_token::TokenApi;
use cb_05_reconciliation::ReconcileApi;
use shared_types::{Amount, BalanceStore};

const ALICE: &str = "alice::1220";
const BOB: &str = "bob::1220";
const CAROL: &str = "carol::1220";
const STRANGER: &str = "stranger::1220";

#[tokio::test]
async fn test_cache_converges_on_ledger() {
    let fx = Bridge::new(&[ALICE]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    let bob = fx.onboard(BOB, "0xb0b").await;
    fx.onboard(CAROL, "0xca201").await;

    fx.relay_deposit(&alice, "40", "0x01").await;
    fx.token.transfer(ALICE, BOB, &amount("15.5"), SYMBOL).await.unwrap();
    // Drift: carol's cached balance has no ledger backing.
    fx.store
        .update_balance_by_party_id(CAROL, SYMBOL, &amount("99"))
        .await
        .unwrap();

    let report = fx.engine.reconcile_all().await.unwrap();
    assert_eq!(report.balances_written, 3);
    assert_eq!(report.holdings_skipped, 0);

    assert_eq!(fx.store.balance_of(ALICE, SYMBOL), fx.balance(&alice).await);
    assert_eq!(fx.store.balance_of(BOB, SYMBOL), fx.balance(&bob).await);
    assert_eq!(fx.store.balance_of(BOB, SYMBOL), amount("15.5"));
    assert_eq!(fx.store.balance_of(CAROL, SYMBOL), Amount::zero());
    assert_eq!(fx.store.total_supply(SYMBOL), Some(amount("40")));
}

#[tokio::test]
async fn test_supply_counts_holders_outside_the_cache() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    fx.relay_deposit(&alice, "3", "0x01").await;
    seed_holding(&fx.ledger, &token_config(), STRANGER, "2.25", SYMBOL);

    fx.engine.reconcile_all().await.unwrap();

    assert_eq!(fx.store.balance_of(ALICE, SYMBOL), amount("3"));
    assert_eq!(fx.store.balance_of(STRANGER, SYMBOL), Amount::zero());
    assert_eq!(fx.store.total_supply(SYMBOL), Some(amount("5.25")));
    assert_eq!(fx.store.total_supply(SYMBOL), Some(fx.supply().await));
}

#[tokio::test]
async fn test_repeated_reconciliation_is_stable() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    fx.relay_deposit(&alice, "8", "0x01").await;

    let first = fx.engine.reconcile_all().await.unwrap();
    let second = fx.engine.reconcile_all().await.unwrap();

    assert_eq!(first.total_supply, second.total_supply);
    assert_eq!(fx.store.balance_of(ALICE, SYMBOL), amount("8"));
}

#[tokio::test]
async fn test_full_rebuild_repairs_drift() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    let bob = fx.onboard(BOB, "0xb0b").await;
    fx.relay_deposit(&alice, "6", "0x01").await;
    fx.relay_deposit(&bob, "4", "0x02").await;

    fx.engine.reconcile_from_bridge_events().await.unwrap();
    fx.store
        .update_balance_by_party_id(ALICE, SYMBOL, &amount("1000"))
        .await
        .unwrap();

    let report = fx.engine.full_balance_reconciliation().await.unwrap();
    assert_eq!(report.symbols_reset, vec![SYMBOL.to_string()]);
    assert_eq!(report.events.processed, 2);

    assert_eq!(fx.store.balance_of(ALICE, SYMBOL), amount("6"));
    assert_eq!(fx.store.balance_of(BOB, SYMBOL), amount("4"));
    let state = fx.store.get_reconciliation_state().await.unwrap();
    assert!(state.last_full_reconcile_at.is_some());
    assert_eq!(fx.store.event_count(), 2);
}
