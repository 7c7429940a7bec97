use crate::error::{BrokerError, Result};
use std::time::Duration;

/// Runtime settings for the broker core, sourced from the environment.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub database_url: String,
    /// Name of the durable continuation job queue.
    pub job_queue_name: String,
    /// Number of continuation workers the pool runs; also sizes the pump cache.
    pub target_worker_count: usize,
    /// How long a dequeued message stays invisible to other workers. Must
    /// cover cache dwell time plus one step's processing.
    pub visibility_timeout_secs: u64,
    /// Wall-clock lifetime of one logical operation, measured from the
    /// original trigger. Older payloads are failed unconditionally.
    pub max_operation_lifetime_secs: u64,
    /// Messages dequeued more often than this are treated as poison.
    pub poison_dequeue_limit: i32,
    /// How often the pump tops up its prefetch cache.
    pub cache_populate_interval_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/nimbus_development".to_string(),
            job_queue_name: "resource_continuation_jobs".to_string(),
            target_worker_count: 16,
            visibility_timeout_secs: 300,
            max_operation_lifetime_secs: 3600,
            poison_dequeue_limit: 10,
            cache_populate_interval_ms: 500,
        }
    }
}

impl BrokerConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(queue_name) = std::env::var("NIMBUS_JOB_QUEUE") {
            config.job_queue_name = queue_name;
        }

        if let Ok(worker_count) = std::env::var("NIMBUS_TARGET_WORKER_COUNT") {
            config.target_worker_count = worker_count.parse().map_err(|e| {
                BrokerError::configuration(format!("Invalid target_worker_count: {e}"))
            })?;
        }

        if let Ok(visibility) = std::env::var("NIMBUS_VISIBILITY_TIMEOUT_SECS") {
            config.visibility_timeout_secs = visibility.parse().map_err(|e| {
                BrokerError::configuration(format!("Invalid visibility_timeout_secs: {e}"))
            })?;
        }

        if let Ok(lifetime) = std::env::var("NIMBUS_MAX_OPERATION_LIFETIME_SECS") {
            config.max_operation_lifetime_secs = lifetime.parse().map_err(|e| {
                BrokerError::configuration(format!("Invalid max_operation_lifetime_secs: {e}"))
            })?;
        }

        if let Ok(poison_limit) = std::env::var("NIMBUS_POISON_DEQUEUE_LIMIT") {
            config.poison_dequeue_limit = poison_limit.parse().map_err(|e| {
                BrokerError::configuration(format!("Invalid poison_dequeue_limit: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("NIMBUS_CACHE_POPULATE_INTERVAL_MS") {
            config.cache_populate_interval_ms = interval.parse().map_err(|e| {
                BrokerError::configuration(format!("Invalid cache_populate_interval_ms: {e}"))
            })?;
        }

        Ok(config)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn max_operation_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_operation_lifetime_secs)
    }

    pub fn cache_populate_interval(&self) -> Duration {
        Duration::from_millis(self.cache_populate_interval_ms)
    }
}
