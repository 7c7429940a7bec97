//! Top-level continuation handlers for resource lifecycle operations.
//!
//! Both follow the same template: the first hop (empty token) does record
//! bookkeeping and re-queues; later hops mark the record in-progress, build
//! the operation input once, then advance the strategy or teardown plan one
//! step per hop.

pub mod create;
pub mod delete;

pub use create::CreateResourceHandler;
pub use delete::DeleteResourceHandler;

/// Queue target names the handlers register under.
pub const CREATE_RESOURCE_TARGET: &str = "job_create_resource";
pub const DELETE_RESOURCE_TARGET: &str = "job_delete_resource";
