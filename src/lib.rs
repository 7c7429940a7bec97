#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, PGMQ in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Nimbus Core Rust
//!
//! Continuation-based execution engine for the Nimbus resource broker control plane.
//!
//! ## Overview
//!
//! Nimbus Core drives long-running Azure resource provisioning and teardown through
//! short, restartable continuation steps. Every step receives its complete state in
//! the queue message, performs one bounded unit of work against the cloud provider,
//! and either finishes or enqueues the next step. An at-least-once queue (PGMQ) is
//! the only durability substrate: there is no scheduler state, no in-memory workflow,
//! and any worker in the fleet can pick up any step.
//!
//! ## Architecture
//!
//! The engine implements a **continuation pipeline**:
//!
//! 1. [`continuation::ContinuationWorkerPool`] polls the queue through a shared
//!    message pump and hands payloads to the activator.
//! 2. [`continuation::ContinuationActivator`] routes each payload to its registered
//!    handler, applies retry/staleness policy, and enqueues the follow-up hop.
//! 3. Resource handlers ([`resources::handlers`]) translate continuation hops into
//!    creation-strategy or teardown-plan steps against the provider clients.
//!
//! Faults never crash a worker. A transient handler outcome re-enqueues the same
//! payload with a visibility delay; a hard fault marks the tracked resource record
//! failed and queues best-effort cleanup.
//!
//! ## Module Organization
//!
//! - [`continuation`] - Activator, worker pool, message pump, and payload envelope
//! - [`messaging`] - Queue abstraction with PGMQ and in-memory implementations
//! - [`resources`] - Resource records, repositories, creation strategies, handlers
//! - [`providers`] - Provider client traits and the VM deployment/teardown manager
//! - [`capacity`] - Capacity selection and exhaustion-to-backpressure translation
//! - [`control_plane`] - Region topology and cross-region dispatch
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nimbus_core::config::BrokerConfig;
//! use nimbus_core::continuation::{ContinuationActivator, ContinuationMessagePump};
//! use nimbus_core::messaging::PgmqContinuationQueue;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BrokerConfig::from_env()?;
//! let queue =
//!     PgmqContinuationQueue::connect(&config.database_url, &config.job_queue_name).await?;
//! let pump = Arc::new(ContinuationMessagePump::new(
//!     Arc::new(queue),
//!     config.target_worker_count,
//!     config.visibility_timeout(),
//! ));
//! let activator = ContinuationActivator::new(pump.clone(), config.max_operation_lifetime());
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Unit tests live beside the modules they cover; integration tests under `tests/`
//! drive the full pipeline against the in-memory queue:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod capacity;
pub mod config;
pub mod continuation;
pub mod control_plane;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod providers;
pub mod resources;

pub use capacity::{AzureResourceCriterion, AzureResourceLocation, CapacityManager};
pub use config::BrokerConfig;
pub use continuation::{
    ContinuationActivator, ContinuationHandler, ContinuationInput, ContinuationQueuePayload,
    ContinuationResult, ContinuationWorkerPool, OperationState,
};
pub use control_plane::{AzureLocation, ControlPlaneInfo, CrossRegionMessagePump};
pub use error::{BrokerError, Result};
pub use logging::init_structured_logging;
pub use resources::operations::ResourceContinuationOperations;
