//! Domain Layer - Core relay types.
//!
//! Topics, the latest-value cache and the envelopes pushed downstream.
//! Nothing here performs I/O.

/// Topic names and classification.
pub mod topic;

/// Latest-value cache and snapshots.
pub mod cache;

/// Downstream envelope types.
pub mod streaming;
