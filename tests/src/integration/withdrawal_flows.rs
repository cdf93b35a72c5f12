//! # Withdrawal Flows
//!
//! Burn on the ledger → pending withdrawal on the stream → EVM release →
//! completion.
//!
//! ## Properties
//!
//! - Every pending withdrawal reaches the releaser, across reconnects
//! - A withdrawal replayed below the resume offset is not forwarded again
//! - Completing a withdrawal twice is success

use super::fixtures::*;
use cb_01_ledger_session::{
    CreatedEvent, Event, LedgerError, LedgerResult, StatusCode, Transaction, Update,
};
use cb_04_bridge::{BridgeApi, WithdrawalStatus};
use cb_05_reconciliation::ReconcileApi;
use shared_types::Amount;

const ALICE: &str = "alice::1220";

/// The created event of withdrawal `contract_id`, as a ledger update.
fn update_of(fx: &Bridge, contract_id: &str) -> LedgerResult<Update> {
    let created: CreatedEvent = fx
        .ledger
        .active(&bridge_config().withdrawal_event_template())
        .into_iter()
        .find(|c| c.contract_id == contract_id)
        .unwrap();
    Ok(Update::Transaction(Transaction {
        update_id: format!("u-{}", contract_id),
        offset: created.offset,
        events: vec![Event::Created(created)],
        ..Default::default()
    }))
}

fn connection_reset() -> LedgerResult<Update> {
    Err(LedgerError::rejected(StatusCode::Unavailable, "connection reset"))
}

#[tokio::test]
async fn test_withdrawal_burns_and_opens_pending_event() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    fx.relay_deposit(&alice, "10", "0x01").await;
    let holding = fx.only_holding(&alice).await;

    let withdrawal = fx
        .bridge
        .initiate_withdrawal(&alice.mapping_cid, &holding, &amount("4"), "0xdest")
        .await
        .unwrap();

    assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
    assert_eq!(withdrawal.user_party, ALICE);
    assert_eq!(withdrawal.amount, "4");
    assert_eq!(fx.balance(&alice).await, amount("6"));
    assert_eq!(fx.supply().await, amount("6"));
    assert_eq!(fx.audited_supply().await, amount("6"));
}

#[tokio::test(start_paused = true)]
async fn test_stream_delivers_each_withdrawal_once_across_reconnect() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    fx.relay_deposit(&alice, "10", "0x01").await;
    let start = fx.session.get_ledger_end().await.unwrap();

    let first = fx
        .bridge
        .initiate_withdrawal(&alice.mapping_cid, &fx.only_holding(&alice).await, &amount("1"), "0xd1")
        .await
        .unwrap();
    let second = fx
        .bridge
        .initiate_withdrawal(&alice.mapping_cid, &fx.only_holding(&alice).await, &amount("2"), "0xd2")
        .await
        .unwrap();

    fx.ledger
        .script_stream(vec![update_of(&fx, &first.contract_id), connection_reset()]);
    // After reconnecting the ledger replays from an older offset.
    fx.ledger.script_stream(vec![
        update_of(&fx, &first.contract_id),
        update_of(&fx, &second.contract_id),
    ]);

    let mut stream = fx.bridge.stream_withdrawal_events(start);
    let got_first = stream.recv().await.unwrap();
    let got_second = stream.recv().await.unwrap();
    assert_eq!(got_first.contract_id, first.contract_id);
    assert_eq!(got_first.evm_destination, "0xd1");
    assert_eq!(got_second.contract_id, second.contract_id);
    assert_eq!(stream.progress().reconnects(), 1);

    let requests = fx.ledger.update_requests();
    assert_eq!(requests[0].begin_exclusive, start);
    assert_eq!(requests[1].begin_exclusive, first.offset);
    assert_eq!(stream.stop().await, second.offset);
}

#[tokio::test]
async fn test_release_completes_once() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    fx.relay_deposit(&alice, "10", "0x01").await;
    let withdrawal = fx
        .bridge
        .initiate_withdrawal(&alice.mapping_cid, &fx.only_holding(&alice).await, &amount("10"), "0xdest")
        .await
        .unwrap();

    fx.bridge
        .complete_withdrawal(&withdrawal.contract_id, "0xre1ease")
        .await
        .unwrap();
    // A releaser retrying after a lost response.
    fx.bridge
        .complete_withdrawal(&withdrawal.contract_id, "0xRE1EASE")
        .await
        .unwrap();

    let events = fx.bridge.list_withdrawal_events().await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, WithdrawalStatus::Completed);
    assert_eq!(events[0].evm_tx_hash.as_deref(), Some("0xre1ease"));
    assert_eq!(fx.supply().await, Amount::zero());
}

#[tokio::test]
async fn test_event_replay_matches_ledger_after_withdrawals() {
    let fx = Bridge::new(&[]);
    let alice = fx.onboard(ALICE, "0xa11ce").await;
    fx.relay_deposit(&alice, "10", "0x01").await;
    fx.relay_deposit(&alice, "5", "0x02").await;
    let holdings = fx.holdings(&alice).await;
    fx.bridge
        .initiate_withdrawal(&alice.mapping_cid, &holdings[0], &amount("3"), "0xdest")
        .await
        .unwrap();

    let report = fx.engine.reconcile_from_bridge_events().await.unwrap();
    assert_eq!(report.mint_events, 2);
    assert_eq!(report.burn_events, 1);
    assert_eq!(report.processed, 3);
    assert_eq!(fx.store.balance_of(ALICE, SYMBOL), amount("12"));
    assert_eq!(fx.store.balance_of(ALICE, SYMBOL), fx.balance(&alice).await);

    // The checkpoint keeps a second pass from double counting.
    let again = fx.engine.reconcile_from_bridge_events().await.unwrap();
    assert_eq!(again.processed, 0);
    assert_eq!(again.already_processed, 3);
    assert_eq!(fx.store.balance_of(ALICE, SYMBOL), amount("12"));
}
