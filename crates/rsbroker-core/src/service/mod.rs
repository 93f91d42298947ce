//! Domain services
//!
//! The lifecycle engine and its collaborators: the async operation tracker
//! and the backing service contract.

mod backend;
mod lifecycle;
mod operation_tracker;

pub use backend::{DefaultBackend, ServiceBackend};
pub use lifecycle::*;
pub use operation_tracker::OperationTracker;
