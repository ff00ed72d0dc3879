//! External systems the manager drives
//!
//! Each trait is a call contract only. Implementations live with the front
//! end (or in the test fakes) and are shared through `Arc<dyn ...>`.

use crate::clock::Clock;
use crate::profile::{PersistedState, Profile};
use crate::telemetry::TelemetrySink;
use passpoint_common::{AppIdentity, CollaboratorError, MacAddress};
use std::sync::Arc;

/// Result type of collaborator calls
pub type CollabResult<T> = std::result::Result<T, CollaboratorError>;

/// Issues ANQP queries to access points
///
/// Results come back later as `PasspointEvent::FetchResult` /
/// `PasspointEvent::FetchFailure`.
pub trait MetadataTransport: Send + Sync {
    /// Returns false when the request could not be queued
    fn issue_fetch(&self, bssid: MacAddress, first_attempt: bool, home_realm_biased: bool) -> bool;
}

/// Secure store for certificates and private keys
pub trait CredentialStore: Send + Sync {
    fn install(&self, profile: &Profile) -> CollabResult<()>;
    fn uninstall(&self, profile: &Profile) -> CollabResult<()>;
}

/// CA certificate trust verification
pub trait CaVerifier: Send + Sync {
    fn verify(&self, ca_certificate: &str) -> CollabResult<()>;
}

/// Downstream network configuration and persisted state
pub trait NetworkConfigStore: Send + Sync {
    fn remove_descriptor(&self, key: &str);
    fn persist(&self, immediate: bool, state: &PersistedState) -> CollabResult<()>;
}

/// Maps a subscriber identity to a carrier id when a matching SIM is active
pub trait CarrierResolver: Send + Sync {
    fn resolve(&self, imsi: &str) -> Option<i32>;
}

/// Tracks whether an application may still modify Wi-Fi state
///
/// Revocations arrive as `PasspointEvent::AuthorizationChanged`.
pub trait AuthorizationWatcher: Send + Sync {
    fn start_watching(&self, app: &AppIdentity);
    fn stop_watching(&self, app: &AppIdentity);
    fn is_authorized(&self, app: &AppIdentity) -> bool;
}

/// Current connection state
pub trait ConnectionController: Send + Sync {
    /// Home domain of the connected Passpoint network, if any
    fn current_connected_domain(&self) -> Option<String>;
    fn disconnect(&self);
}

/// Every collaborator the manager needs
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn MetadataTransport>,
    pub credential_store: Arc<dyn CredentialStore>,
    pub ca_verifier: Arc<dyn CaVerifier>,
    pub config_store: Arc<dyn NetworkConfigStore>,
    pub carrier_resolver: Arc<dyn CarrierResolver>,
    pub authorization: Arc<dyn AuthorizationWatcher>,
    pub connection: Arc<dyn ConnectionController>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub clock: Arc<dyn Clock>,
}
