//! Transport lifecycle state machine
//!
//! Translates push transport lifecycle events into the reactions the engine
//! must perform. Keeping the decisions here, free of I/O, lets the engine stay
//! a thin dispatcher.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use telesync_push_sdk::PushEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Connected,
    Disconnected,
}

impl TransportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::Connected => "connected",
            TransportState::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Send the authentication handshake
    Authenticate,
    /// Re-publish every registered subscription
    Rearm,
    /// Reset to the default live window, clear the chart, restart backfill
    ResetLive,
    /// Leave real-time mode without touching the chart
    GoOffline,
    /// Surface a passive notice
    NotifyDisconnected(String),
    NotifyError(String),
}

#[derive(Debug)]
struct LinkState {
    transport: TransportState,
    authenticated: bool,
}

pub struct ReconnectionManager {
    state: Mutex<LinkState>,
}

impl Default for ReconnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconnectionManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LinkState {
                transport: TransportState::Disconnected,
                authenticated: false,
            }),
        }
    }

    pub fn transport_state(&self) -> TransportState {
        self.state.lock().transport
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().authenticated
    }

    /// Reactions for a lifecycle event; value events yield none
    pub fn on_event(&self, event: &PushEvent) -> Vec<Reaction> {
        let mut state = self.state.lock();
        match event {
            PushEvent::Connected => {
                info!("Push transport connected");
                state.transport = TransportState::Connected;
                state.authenticated = false;
                vec![Reaction::Authenticate]
            }
            PushEvent::Reconnected { attempt } => {
                info!(attempt, "Push transport reconnected, resynchronizing");
                state.transport = TransportState::Connected;
                state.authenticated = false;
                vec![Reaction::Authenticate, Reaction::ResetLive]
            }
            PushEvent::Authenticated => {
                state.authenticated = true;
                vec![Reaction::Rearm]
            }
            PushEvent::Disconnected { reason } => {
                warn!(reason = %reason, "Push transport disconnected, leaving real-time mode");
                state.transport = TransportState::Disconnected;
                state.authenticated = false;
                vec![
                    Reaction::GoOffline,
                    Reaction::NotifyDisconnected(reason.clone()),
                ]
            }
            PushEvent::Error { message } => vec![Reaction::NotifyError(message.clone())],
            PushEvent::Value { .. } => Vec::new(),
        }
    }
}
