use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::continuation::activator::ContinuationActivator;
use crate::continuation::pump::ContinuationMessagePump;
use crate::continuation::worker::{ContinuationWorker, ContinuationWorkerConfig};

/// A fleet of continuation workers plus the shared cache-populate loop.
///
/// Shutdown is cooperative: the disposed flag is observed at iteration
/// boundaries, so in-flight steps finish before their worker exits.
pub struct ContinuationWorkerPool {
    disposed: Arc<AtomicBool>,
    wakeup: Arc<Notify>,
    handles: Vec<JoinHandle<()>>,
}

impl ContinuationWorkerPool {
    pub fn start(
        pump: Arc<ContinuationMessagePump>,
        activator: Arc<ContinuationActivator>,
        worker_count: usize,
        worker_config: ContinuationWorkerConfig,
        populate_interval: Duration,
    ) -> Self {
        let disposed = Arc::new(AtomicBool::new(false));
        let wakeup = Arc::new(Notify::new());
        let mut handles = Vec::with_capacity(worker_count + 1);

        info!("🚀 Worker pool: starting {} worker(s)", worker_count);

        for worker_index in 0..worker_count {
            let mut worker = ContinuationWorker::new(
                pump.clone(),
                activator.clone(),
                worker_config.clone(),
                disposed.clone(),
                wakeup.clone(),
            );
            handles.push(tokio::spawn(async move {
                debug!(worker_index, "Worker task started");
                worker.run().await;
            }));
        }

        handles.push(Self::spawn_populate_loop(
            pump,
            disposed.clone(),
            wakeup.clone(),
            populate_interval,
        ));

        Self {
            disposed,
            wakeup,
            handles,
        }
    }

    fn spawn_populate_loop(
        pump: Arc<ContinuationMessagePump>,
        disposed: Arc<AtomicBool>,
        wakeup: Arc<Notify>,
        populate_interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while !disposed.load(Ordering::SeqCst) {
                match pump.try_populate_cache().await {
                    // Fresh work arrived; idle workers can stop backing off.
                    Ok(fetched) if fetched > 0 => wakeup.notify_waiters(),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "⚠️ Worker pool: cache populate failed"),
                }

                tokio::select! {
                    _ = tokio::time::sleep(populate_interval) => {}
                    _ = wakeup.notified() => {}
                }
            }
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Stop polling and wait for every worker to finish its current step.
    pub async fn shutdown(mut self) {
        info!("🛑 Worker pool: shutting down");
        self.disposed.store(true, Ordering::SeqCst);
        self.wakeup.notify_waiters();
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        info!("✅ Worker pool: all workers stopped");
    }
}
