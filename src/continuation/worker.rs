use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::continuation::activator::ContinuationActivator;
use crate::continuation::payload::ContinuationQueuePayload;
use crate::continuation::pump::ContinuationMessagePump;
use crate::messaging::QueueError;

/// Tuning for one worker's polling behavior.
#[derive(Debug, Clone)]
pub struct ContinuationWorkerConfig {
    /// Messages leased more than this many times are dropped unprocessed.
    pub poison_dequeue_limit: i32,
    /// Idle delay while the worker still has recent activity.
    pub busy_idle_delay: Duration,
    /// Bounds for the randomized idle delay once activity has drained.
    pub idle_delay_floor: Duration,
    pub idle_delay_ceiling: Duration,
    /// Clamp for the activity counter.
    pub activity_level_ceiling: u32,
}

impl Default for ContinuationWorkerConfig {
    fn default() -> Self {
        Self {
            poison_dequeue_limit: 10,
            busy_idle_delay: Duration::from_millis(100),
            idle_delay_floor: Duration::from_secs(2),
            idle_delay_ceiling: Duration::from_secs(5),
            activity_level_ceiling: 200,
        }
    }
}

/// One polling loop over the pump.
///
/// Each found message bumps a worker-local activity counter; each empty poll
/// drains it. While the counter is non-zero the worker re-polls quickly,
/// otherwise it backs off for a randomized window so an idle fleet does not
/// hammer the queue in lockstep.
pub struct ContinuationWorker {
    pump: Arc<ContinuationMessagePump>,
    activator: Arc<ContinuationActivator>,
    config: ContinuationWorkerConfig,
    activity_level: u32,
    disposed: Arc<AtomicBool>,
    wakeup: Arc<Notify>,
}

impl ContinuationWorker {
    pub fn new(
        pump: Arc<ContinuationMessagePump>,
        activator: Arc<ContinuationActivator>,
        config: ContinuationWorkerConfig,
        disposed: Arc<AtomicBool>,
        wakeup: Arc<Notify>,
    ) -> Self {
        Self {
            pump,
            activator,
            config,
            activity_level: 0,
            disposed,
            wakeup,
        }
    }

    pub fn activity_level(&self) -> u32 {
        self.activity_level
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Poll until disposed. Disposal is observed between iterations only;
    /// an in-flight step always runs to completion.
    pub async fn run(&mut self) {
        debug!("🚀 Worker: polling loop started");
        while self.run_iteration().await {}
        debug!("🛑 Worker: polling loop stopped");
    }

    /// One iteration. Errors never escape: this is the single catch-and-log
    /// boundary that keeps a bad message from killing the poller. Returns
    /// whether the caller should loop again.
    pub async fn run_iteration(&mut self) -> bool {
        if let Err(e) = self.try_run_iteration().await {
            warn!(error = %e, "⚠️ Worker: iteration failed");
        }
        !self.is_disposed()
    }

    async fn try_run_iteration(&mut self) -> Result<(), QueueError> {
        let Some(message) = self.pump.get_message().await? else {
            self.on_idle().await;
            return Ok(());
        };

        self.activity_level =
            (self.activity_level + 1).min(self.config.activity_level_ceiling);

        if message.dequeue_count > self.config.poison_dequeue_limit {
            warn!(
                message_id = message.message_id,
                dequeue_count = message.dequeue_count,
                "☠️ Worker: dropping poison message"
            );
            return self.pump.delete_message(message.message_id).await;
        }

        let payload: ContinuationQueuePayload = match serde_json::from_value(message.body.clone())
        {
            Ok(payload) => payload,
            Err(e) => {
                // Leave the message leased; redelivery raises its dequeue
                // count until the poison cutoff disposes of it.
                warn!(
                    message_id = message.message_id,
                    error = %e,
                    "⚠️ Worker: undecodable payload, leaving for redelivery"
                );
                return Ok(());
            }
        };

        if let Err(e) = self.activator.continue_payload(&payload).await {
            error!(
                message_id = message.message_id,
                target = %payload.target,
                tracking_id = %payload.tracking_id,
                error = %e,
                "❌ Worker: continuation dispatch failed"
            );
        }

        // Acknowledge exactly once per dequeued message, success or failure.
        self.pump.delete_message(message.message_id).await
    }

    async fn on_idle(&mut self) {
        self.activity_level = self.activity_level.saturating_sub(1);

        let delay = if self.activity_level > 0 {
            self.config.busy_idle_delay
        } else {
            let floor = self.config.idle_delay_floor.as_millis() as u64;
            let ceiling = self.config.idle_delay_ceiling.as_millis() as u64;
            Duration::from_millis(fastrand::u64(floor..=ceiling))
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.wakeup.notified() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::handler::{ContinuationHandler, HandlerError};
    use crate::continuation::payload::{ContinuationInput, ContinuationResult};
    use crate::control_plane::AzureLocation;
    use crate::messaging::{ContinuationJobQueue, InMemoryJobQueue};
    use crate::resources::types::{
        CreateResourceInput, CreateResourceOptions, ResourceDetails, ResourceType,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ContinuationHandler for CountingHandler {
        fn target(&self) -> &str {
            "unit_target"
        }

        async fn continue_operation(
            &self,
            _input: ContinuationInput,
        ) -> Result<ContinuationResult, HandlerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ContinuationResult::succeeded())
        }
    }

    fn sample_payload() -> ContinuationQueuePayload {
        ContinuationQueuePayload::new(
            "unit_target",
            ContinuationInput::CreateResource(CreateResourceInput::new(
                "t0",
                Uuid::new_v4(),
                ResourceType::ComputeVm,
                ResourceDetails {
                    location: AzureLocation::EastUs,
                    sku_name: "standard_d4".into(),
                    sku_family: "standardDFamily".into(),
                    cores: 4,
                    image: None,
                },
                CreateResourceOptions::default(),
            )),
            None,
            HashMap::new(),
        )
    }

    fn harness() -> (
        ContinuationWorker,
        Arc<InMemoryJobQueue>,
        Arc<AtomicUsize>,
        Arc<AtomicBool>,
    ) {
        let queue = Arc::new(InMemoryJobQueue::new());
        let pump = Arc::new(ContinuationMessagePump::new(
            queue.clone(),
            4,
            Duration::from_secs(30),
        ));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut activator = ContinuationActivator::new(pump.clone(), Duration::from_secs(3600));
        activator
            .register_handler(Arc::new(CountingHandler {
                calls: calls.clone(),
            }))
            .unwrap();

        let disposed = Arc::new(AtomicBool::new(false));
        let worker = ContinuationWorker::new(
            pump,
            Arc::new(activator),
            ContinuationWorkerConfig::default(),
            disposed.clone(),
            Arc::new(Notify::new()),
        );
        (worker, queue, calls, disposed)
    }

    #[tokio::test]
    async fn processes_message_then_deletes_it() {
        let (mut worker, queue, calls, _disposed) = harness();
        queue
            .add_message(serde_json::to_value(sample_payload()).unwrap(), Duration::ZERO)
            .await
            .unwrap();

        assert!(worker.run_iteration().await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.depth(), 0);
        assert_eq!(worker.activity_level(), 1);
    }

    #[tokio::test]
    async fn poison_message_is_deleted_without_dispatch() {
        let (mut worker, queue, calls, _disposed) = harness();
        let id = queue
            .add_message(serde_json::to_value(sample_payload()).unwrap(), Duration::ZERO)
            .await
            .unwrap();
        queue.set_dequeue_count(id, 11);

        assert!(worker.run_iteration().await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn undecodable_payload_is_left_for_redelivery() {
        let (mut worker, queue, calls, _disposed) = harness();
        queue
            .add_message(json!({"definitely": "not a payload"}), Duration::ZERO)
            .await
            .unwrap();

        assert!(worker.run_iteration().await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // Still leased in the queue, waiting out its visibility timeout.
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_iteration_drains_activity_level() {
        let (mut worker, _queue, _calls, _disposed) = harness();
        worker.activity_level = 2;

        assert!(worker.run_iteration().await);
        assert_eq!(worker.activity_level(), 1);

        assert!(worker.run_iteration().await);
        assert_eq!(worker.activity_level(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disposal_is_observed_between_iterations() {
        let (mut worker, _queue, _calls, disposed) = harness();
        disposed.store(true, Ordering::SeqCst);

        assert!(!worker.run_iteration().await);
    }
}
