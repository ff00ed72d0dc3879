//! Asynchronous ingress events
//!
//! ANQP completions, authorization revocations and connection events arrive
//! from other tasks. They are queued here and applied by the manager under
//! the same lock as direct calls.

use passpoint_common::{AnqpElements, MacAddress};
use tokio::sync::mpsc;
use tracing::warn;

/// Event delivered to the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasspointEvent {
    /// ANQP query answered
    FetchResult {
        bssid: MacAddress,
        elements: AnqpElements,
    },
    /// ANQP query failed or timed out
    FetchFailure { bssid: MacAddress },
    /// An application's Wi-Fi authorization may have changed
    AuthorizationChanged { package: String },
    /// Connected to a Passpoint network
    NetworkConnected { fqdn: String },
}

pub type EventReceiver = mpsc::UnboundedReceiver<PasspointEvent>;

/// Cloneable handle used by collaborators to post events
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<PasspointEvent>,
}

impl EventSender {
    /// Returns false once the receiving side is gone
    pub fn send(&self, event: PasspointEvent) -> bool {
        if self.tx.send(event).is_err() {
            warn!("Passpoint event dropped: receiver closed");
            return false;
        }
        true
    }

    pub fn fetch_result(&self, bssid: MacAddress, elements: AnqpElements) -> bool {
        self.send(PasspointEvent::FetchResult { bssid, elements })
    }

    pub fn fetch_failure(&self, bssid: MacAddress) -> bool {
        self.send(PasspointEvent::FetchFailure { bssid })
    }

    pub fn authorization_changed(&self, package: impl Into<String>) -> bool {
        self.send(PasspointEvent::AuthorizationChanged {
            package: package.into(),
        })
    }

    pub fn network_connected(&self, fqdn: impl Into<String>) -> bool {
        self.send(PasspointEvent::NetworkConnected { fqdn: fqdn.into() })
    }
}

/// Create an event channel
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, rx)
}
