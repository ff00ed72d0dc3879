//! Passpoint Core - Profile management and access point matching
//!
//! This crate provides:
//! - The installed profile registry with Saved / Suggested ownership rules
//! - The ANQP metadata cache and in-flight request tracking
//! - Home / Roaming resolution of scanned access points
//! - Authorization watching and revocation of app-installed profiles
//!
//! External systems (credential store, ANQP transport, persisted store, ...)
//! are reached through the traits in [`collaborators`].
//!
//! # Example
//!
//! ```rust,ignore
//! use passpoint_core::{PasspointManager, Collaborators};
//! use std::sync::Arc;
//!
//! let manager = Arc::new(PasspointManager::new(&config, &collaborators));
//! let (events, rx) = PasspointManager::event_channel();
//! tokio::spawn(manager.clone().run_events(rx));
//!
//! manager.add_or_update_profile(Some(profile), uid, "com.example.app", false)?;
//! let matches = manager.match_one(&access_point);
//! ```

pub mod cache;
pub mod clock;
pub mod collaborators;
pub mod events;
pub mod legacy;
pub mod lifecycle;
pub mod manager;
pub mod matcher;
pub mod profile;
pub mod registry;
pub mod resolver;
pub mod telemetry;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use cache::{MetadataCache, MetadataSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{
    AuthorizationWatcher, CaVerifier, CarrierResolver, CollabResult, Collaborators,
    ConnectionController, CredentialStore, MetadataTransport, NetworkConfigStore,
};
pub use events::{EventReceiver, EventSender, PasspointEvent};
pub use legacy::{LegacyEapMethod, LegacyEnterpriseConfig, LegacyNetworkConfig, LegacyPhase2};
pub use lifecycle::LifecycleCoordinator;
pub use manager::PasspointManager;
pub use matcher::{CredentialMatcher, Matchers, RealmMatcher, SimMatcher};
pub use profile::{
    CertCredential, Credential, CredentialType, HomeSp, NetworkDescriptor, PersistedState,
    Profile, ProfileConfig, SimCredential, UserCredential,
};
pub use registry::ProfileRegistry;
pub use resolver::{MatchGroups, MatchResolver, ProfileMatch};
pub use telemetry::{AtomicTelemetry, Counter, MetricsSnapshot, NoopTelemetry, TelemetrySink};
pub use tracker::{PendingRequest, RequestTracker};
