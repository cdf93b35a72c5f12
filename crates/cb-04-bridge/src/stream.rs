//! # Withdrawal Event Stream
//!
//! A supervised task that follows the ledger's update stream from a given
//! offset and forwards every newly created *Pending* withdrawal event to a
//! bounded channel.
//!
//! ## Reconnection
//!
//! - A retryable error reconnects after a delay that starts at the backoff
//!   floor and doubles up to the cap.
//! - An authentication error invalidates the cached token and resets the
//!   delay to the floor. Subscribe failures are invalidated by the session
//!   already; the stream only invalidates for errors on an open stream.
//! - A connection that advanced the offset also resets the delay.
//! - Reconnects resume strictly after the last fully processed offset.
//!
//! The task stops when the shutdown signal fires (checked before sleeping
//! and before reconnecting), when the ledger ends the stream cleanly, when
//! the ledger reports an error that cannot be retried, or when the consumer
//! drops the receiver.

use crate::domain::{BridgeConfig, WithdrawalEvent};
use cb_01_ledger_session::{LedgerError, LedgerSession, Update, UpdatesRequest};
use futures::StreamExt;
use shared_types::Offset;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counters shared between the stream task and its owner.
#[derive(Debug, Default)]
pub struct StreamProgress {
    last_offset: AtomicI64,
    reconnects: AtomicU64,
    forwarded: AtomicU64,
}

impl StreamProgress {
    fn starting_at(offset: Offset) -> Self {
        Self {
            last_offset: AtomicI64::new(offset),
            ..Default::default()
        }
    }

    /// Last offset whose events were all forwarded; resume point.
    ///
    /// The offset moves once per transaction. A transaction holding several
    /// withdrawals that was cut short by shutdown while the channel was full
    /// is replayed in full on resume, so its first withdrawals can be
    /// delivered again. Consumers deduplicate by contract id.
    pub fn last_offset(&self) -> Offset {
        self.last_offset.load(Ordering::SeqCst)
    }

    /// Reconnect attempts so far.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Pending withdrawals forwarded so far.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::SeqCst)
    }

    fn advance(&self, offset: Offset) {
        self.last_offset.fetch_max(offset, Ordering::SeqCst);
    }
}

/// Handle on a running withdrawal stream.
pub struct WithdrawalStream {
    events: mpsc::Receiver<WithdrawalEvent>,
    progress: Arc<StreamProgress>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WithdrawalStream {
    /// Spawn the stream task.
    pub fn spawn(session: Arc<LedgerSession>, config: BridgeConfig, from_offset: Offset) -> Self {
        let (event_tx, events) = mpsc::channel(config.channel_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let progress = Arc::new(StreamProgress::starting_at(from_offset));

        info!(from_offset, "[cb-04] Starting withdrawal stream");
        let task = tokio::spawn(connection_loop(
            session,
            config,
            event_tx,
            progress.clone(),
            shutdown_rx,
        ));

        Self {
            events,
            progress,
            shutdown_tx,
            task,
        }
    }

    /// Next pending withdrawal; `None` once the task has stopped and the
    /// buffer is drained.
    pub async fn recv(&mut self) -> Option<WithdrawalEvent> {
        self.events.recv().await
    }

    /// Shared counters.
    pub fn progress(&self) -> Arc<StreamProgress> {
        self.progress.clone()
    }

    /// Resume point for a later stream.
    pub fn last_offset(&self) -> Offset {
        self.progress.last_offset()
    }

    /// True once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the task to exit.
    pub async fn stop(self) -> Offset {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "[cb-04] Withdrawal stream task failed");
        }
        self.progress.last_offset()
    }
}

/// How a connection ended without an error.
enum ConnectionEnd {
    /// The ledger closed the stream.
    Completed,
    /// The receiver was dropped.
    ConsumerGone,
}

/// Where a connection failed.
enum ConnectionError {
    /// Opening the subscription failed.
    Subscribe(LedgerError),
    /// An open stream delivered an error.
    Stream(LedgerError),
}

impl ConnectionError {
    fn error(&self) -> &LedgerError {
        match self {
            ConnectionError::Subscribe(err) | ConnectionError::Stream(err) => err,
        }
    }
}

async fn connection_loop(
    session: Arc<LedgerSession>,
    config: BridgeConfig,
    event_tx: mpsc::Sender<WithdrawalEvent>,
    progress: Arc<StreamProgress>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut delay = config.backoff_floor;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let offset_before = progress.last_offset();
        let outcome = tokio::select! {
            outcome = run_connection(&session, &config, &event_tx, &progress) => outcome,
            _ = shutdown_rx.changed() => break,
        };

        match outcome {
            Ok(ConnectionEnd::Completed) => {
                info!(
                    offset = progress.last_offset(),
                    "[cb-04] Withdrawal stream ended by the ledger"
                );
                break;
            }
            Ok(ConnectionEnd::ConsumerGone) => {
                debug!("[cb-04] Withdrawal consumer gone, stopping stream");
                break;
            }
            Err(failure) => {
                let err = failure.error();
                if progress.last_offset() > offset_before {
                    delay = config.backoff_floor;
                }
                if err.is_auth_error() {
                    if let ConnectionError::Stream(_) = failure {
                        warn!(error = %err, "[cb-04] Stream authentication failed, invalidating token");
                        session.invalidate_token();
                    }
                    delay = config.backoff_floor;
                }
                if !err.is_retryable() {
                    error!(
                        error = %err,
                        offset = progress.last_offset(),
                        "[cb-04] Withdrawal stream failed permanently, stopping"
                    );
                    break;
                }

                if *shutdown_rx.borrow() {
                    break;
                }
                progress.reconnects.fetch_add(1, Ordering::SeqCst);
                warn!(
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    offset = progress.last_offset(),
                    "[cb-04] Withdrawal stream failed, reconnecting"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_rx.changed() => break,
                }
                delay = (delay * 2).min(config.backoff_cap);
            }
        }
    }

    info!(
        offset = progress.last_offset(),
        forwarded = progress.forwarded(),
        "[cb-04] Withdrawal stream stopped"
    );
}

async fn run_connection(
    session: &LedgerSession,
    config: &BridgeConfig,
    event_tx: &mpsc::Sender<WithdrawalEvent>,
    progress: &StreamProgress,
) -> Result<ConnectionEnd, ConnectionError> {
    let template = config.withdrawal_event_template();
    let request = UpdatesRequest {
        begin_exclusive: progress.last_offset(),
        parties: vec![config.operator_party.clone()],
        template_ids: vec![template.clone()],
    };
    let mut updates = session
        .get_updates(&request)
        .await
        .map_err(ConnectionError::Subscribe)?;
    debug!(begin = request.begin_exclusive, "[cb-04] Subscribed to withdrawal events");

    while let Some(update) = updates.next().await {
        match update.map_err(ConnectionError::Stream)? {
            Update::Transaction(tx) => {
                for created in tx
                    .created_events()
                    .filter(|c| c.template_id.matches(&template))
                {
                    let event = WithdrawalEvent::from_created(created);
                    if !event.is_pending() {
                        debug!(
                            contract_id = %event.contract_id,
                            status = %event.status,
                            "[cb-04] Skipping non-pending withdrawal event"
                        );
                        continue;
                    }
                    debug!(
                        contract_id = %event.contract_id,
                        offset = tx.offset,
                        "[cb-04] Forwarding pending withdrawal"
                    );
                    if event_tx.send(event).await.is_err() {
                        return Ok(ConnectionEnd::ConsumerGone);
                    }
                    progress.forwarded.fetch_add(1, Ordering::SeqCst);
                }
                progress.advance(tx.offset);
            }
            Update::Checkpoint { offset } => progress.advance(offset),
        }
    }
    Ok(ConnectionEnd::Completed)
}
