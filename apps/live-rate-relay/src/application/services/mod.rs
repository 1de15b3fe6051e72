//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `UpdateDispatcher`: routes decoded topic updates into the cache and
//!   out to subscribers

mod dispatch;

pub use dispatch::{DispatchOutcome, UpdateDispatcher};
