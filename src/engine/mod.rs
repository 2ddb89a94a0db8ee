mod booking;
mod directory;
mod error;
mod payment;
mod queries;
pub mod reconcile;
mod store;

pub use error::EngineError;
pub use reconcile::{
    check_bookable, is_bookable, reconcile_after_booking, Anomaly, Unbookable, WindowEdit,
};
pub use store::{Account, InMemoryStore};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex, RwLock};

use crate::gateway::PaymentGateway;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        txn: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingTxn = (Vec<Event>, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { txn, response } => {
                let mut batch = vec![(txn, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { txn, response }) => batch.push((txn, response)),
                        Ok(other) => {
                            // Flush the current batch before the non-append command.
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                respond_batch(batch, &result);

                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &[PendingTxn]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (txn, _) in batch {
        if let Err(e) = wal.append_buffered(txn) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: Vec<PendingTxn>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { txn, response } => {
            let result = wal.append_buffered(&txn).and_then(|()| wal.flush_sync());
            let _ = response.send(result);
        }
    }
}

/// Booking and payment engine over an in-memory store backed by a WAL.
///
/// Every operation that writes builds its full list of events first, then
/// commits them as one WAL record and applies them to the store. Nothing is
/// applied unless the record is durable.
pub struct Engine {
    pub store: InMemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    gateway: Arc<dyn PaymentGateway>,
    gateway_timeout: Duration,
    /// Shared by commits, exclusive for compaction, so a snapshot never
    /// races a half-applied transaction.
    commit_gate: RwLock<()>,
    /// Serializes registrations so email uniqueness holds.
    directory_lock: Mutex<()>,
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> io::Result<Self> {
        let txns = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            store: InMemoryStore::new(),
            wal_tx,
            notify,
            gateway,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            commit_gate: RwLock::new(()),
            directory_lock: Mutex::new(()),
        };

        let mut replayed = 0usize;
        for txn in &txns {
            for event in txn {
                engine.store.apply_event(event);
            }
            replayed += 1;
        }
        if replayed > 0 {
            tracing::info!("replayed {replayed} transactions from {}", wal_path.display());
        }

        Ok(engine)
    }

    /// Bound on how long a gateway charge may take before it counts as declined.
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    async fn wal_append(&self, txn: &[Event]) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                txn: txn.to_vec(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Make a transaction durable, then apply it. The caller holds the tutor
    /// lock for every schedule the transaction touches.
    pub(super) async fn commit(&self, txn: Vec<Event>) -> Result<(), EngineError> {
        if txn.is_empty() {
            return Ok(());
        }
        let _gate = self.commit_gate.read().await;
        self.wal_append(&txn).await?;
        for event in &txn {
            self.store.apply_event(event);
        }
        Ok(())
    }

    /// Compact the WAL down to one transaction that recreates the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let events = self.store.snapshot_events();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
