//! Push channel SDK for Telesync
//!
//! Provides the `PushTransport` abstraction the sync engine subscribes
//! through, plus a WebSocket implementation with automatic reconnection.
//!
//! # Example
//! ```rust,ignore
//! use telesync_push_sdk::{PushConfig, PushEvent, WsPushTransport};
//!
//! let (transport, mut events) = WsPushTransport::connect(PushConfig::from_env()?);
//! while let Some(event) = events.recv().await {
//!     if let PushEvent::Connected = event {
//!         transport.authenticate().await?;
//!     }
//! }
//! ```

mod client;
mod config;
mod error;
pub mod protocol;
mod transport;

pub use client::WsPushTransport;
pub use config::PushConfig;
pub use error::{PushError, Result};
pub use protocol::Frame;
pub use transport::{PushEvent, PushTransport};
