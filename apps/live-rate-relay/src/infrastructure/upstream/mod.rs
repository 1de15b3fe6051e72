//! Upstream Feed Adapter
//!
//! WebSocket client for the upstream rate feed.
//!
//! # Components
//!
//! - [`client`]: Connection loop, handshake, subscription and dispatch
//! - [`codec`]: Record splitting and base64 + gzip payload decoding
//! - [`keepalive`]: Keep-alive records and idle detection
//! - [`messages`]: Wire record types
//! - [`reconnect`]: Fixed-delay reconnection policy
//! - [`status`]: Connection state shared with the health endpoints

pub mod client;
pub mod codec;
pub mod keepalive;
pub mod messages;
pub mod reconnect;
pub mod status;

pub use client::{UpstreamClient, UpstreamClientConfig, UpstreamClientError};
pub use codec::{CodecError, FrameCodec, Record};
pub use keepalive::{KeepAliveConfig, KeepAliveEvent};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use status::{ConnectionState, UpstreamStatus};
