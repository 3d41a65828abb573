use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::storage::CredentialStore;

/// One validated use of a key. `new_count` is the stored count read at
/// validation time plus one.
#[derive(Debug, Clone)]
pub struct UsageEvent {
    pub key_id: String,
    pub new_count: u64,
    pub at: DateTime<Utc>,
}

/// Sending half of the usage queue. Delivery is at most once: an event is
/// dropped when the queue is full or the worker is gone, and a failed write is
/// only logged.
///
/// Two validations of the same key that read the same count both write
/// `count + 1`, so under concurrency the total can lag the real number of
/// uses.
#[derive(Clone)]
pub struct UsageRecorder {
    tx: mpsc::Sender<UsageEvent>,
}

impl UsageRecorder {
    /// Starts the worker. Dropping every recorder clone lets it drain the
    /// queue and finish, which the returned handle reports.
    pub fn spawn(store: Arc<dyn CredentialStore>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = UsageWorker { store, rx };
        let handle = tokio::spawn(async move {
            worker.run().await;
        });
        (Self { tx }, handle)
    }

    /// Never waits.
    pub fn record(&self, event: UsageEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Usage queue full, dropping usage event for key {}", event.key_id);
            }
            Err(TrySendError::Closed(event)) => {
                warn!("Usage worker stopped, dropping usage event for key {}", event.key_id);
            }
        }
    }
}

struct UsageWorker {
    store: Arc<dyn CredentialStore>,
    rx: mpsc::Receiver<UsageEvent>,
}

impl UsageWorker {
    async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            match self.store.update_usage(&event.key_id, event.new_count, event.at).await {
                Ok(()) => debug!("Recorded usage {} for key {}", event.new_count, event.key_id),
                Err(e) => warn!("Failed to record usage for key {}: {}", event.key_id, e),
            }
        }
        info!("Usage worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::credential::tests::{candidate, setup_storage};
    use crate::utils::time;

    #[tokio::test]
    async fn test_worker_writes_events_and_drains_on_shutdown() {
        let (storage, _temp_dir) = setup_storage(15).await;
        let key_id = storage.insert(&candidate("alice")).await.unwrap();
        let (recorder, handle) = UsageRecorder::spawn(storage.clone(), 8);

        let at = time::now();
        recorder.record(UsageEvent { key_id: key_id.clone(), new_count: 1, at });
        recorder.record(UsageEvent { key_id: key_id.clone(), new_count: 2, at });
        drop(recorder);
        handle.await.unwrap();

        let credential = storage.find_by_id(&key_id).await.unwrap();
        assert_eq!(credential.total_queries, 2);
        assert_eq!(credential.latest_query_date, Some(at));
    }

    #[tokio::test]
    async fn test_record_after_worker_exit_is_dropped() {
        let (storage, _temp_dir) = setup_storage(15).await;
        let (recorder, handle) = UsageRecorder::spawn(storage, 1);
        handle.abort();
        let _ = handle.await;

        // Must not panic or block.
        recorder.record(UsageEvent { key_id: "gone".to_string(), new_count: 1, at: time::now() });
    }

    #[tokio::test]
    async fn test_unknown_key_write_is_harmless() {
        let (storage, _temp_dir) = setup_storage(15).await;
        let (recorder, handle) = UsageRecorder::spawn(storage.clone(), 4);

        recorder.record(UsageEvent { key_id: "missing".to_string(), new_count: 1, at: time::now() });
        drop(recorder);
        handle.await.unwrap();

        assert!(storage.list_all().await.unwrap().is_empty());
    }
}
