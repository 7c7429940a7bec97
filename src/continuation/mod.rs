//! # Continuation Engine
//!
//! Framework for long-running, multi-step operations that survive process
//! restarts. Every step's full state travels inside its queue payload; the
//! at-least-once queue plus visibility delays provide durability, retry,
//! and backoff. Handlers advance an operation exactly one step per hop.

pub mod activator;
pub mod handler;
pub mod payload;
pub mod pool;
pub mod pump;
pub mod state;
pub mod worker;

pub use activator::{ContinuationActivator, ContinuationError};
pub use handler::{ContinuationHandler, HandlerError};
pub use payload::{ContinuationInput, ContinuationQueuePayload, ContinuationResult};
pub use pool::ContinuationWorkerPool;
pub use pump::ContinuationMessagePump;
pub use state::{FinalStatus, OperationState};
pub use worker::{ContinuationWorker, ContinuationWorkerConfig};
