//! Port Interfaces
//!
//! Contracts between the application services and the infrastructure
//! adapters that implement them.
//!
//! ## Driven Ports (Outbound)
//!
//! - `UpdatePublisher`: fan-out of live updates to downstream subscribers

use crate::domain::streaming::LiveUpdate;

/// Delivers live updates to downstream subscribers.
///
/// Implementations must never block and must never fail as a whole:
/// delivery problems are contained per subscriber.
#[cfg_attr(test, mockall::automock)]
pub trait UpdatePublisher: Send + Sync {
    /// Publish an update, returning how many subscribers accepted it.
    fn publish(&self, update: &LiveUpdate) -> usize;
}
