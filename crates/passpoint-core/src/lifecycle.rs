//! Authorization watching and profile lifecycle events
//!
//! An application is watched while it owns at least one Saved profile. When
//! its permission to modify Wi-Fi state is revoked, all of its Saved
//! profiles are removed and an active connection to one of them is torn
//! down.

use crate::collaborators::{AuthorizationWatcher, Collaborators, ConnectionController};
use crate::registry::ProfileRegistry;
use crate::telemetry::{MetricsSnapshot, ProfileSummary, TelemetrySink};
use passpoint_common::AppIdentity;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Owner of the watched-application map
pub struct LifecycleCoordinator {
    /// package -> uid
    watched: BTreeMap<String, u32>,
    authorization: Arc<dyn AuthorizationWatcher>,
    connection: Arc<dyn ConnectionController>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl LifecycleCoordinator {
    pub fn new(collaborators: &Collaborators) -> Self {
        Self {
            watched: BTreeMap::new(),
            authorization: collaborators.authorization.clone(),
            connection: collaborators.connection.clone(),
            telemetry: collaborators.telemetry.clone(),
        }
    }

    /// Start watching `app` unless its package is already watched
    pub fn start_watching(&mut self, app: &AppIdentity) {
        if self.watched.contains_key(&app.package) {
            return;
        }
        debug!("Watching Wi-Fi authorization of {}", app);
        self.authorization.start_watching(app);
        self.watched.insert(app.package.clone(), app.uid);
    }

    pub fn stop_watching(&mut self, package: &str) {
        if let Some(uid) = self.watched.remove(package) {
            let app = AppIdentity::new(uid, package);
            debug!("No longer watching Wi-Fi authorization of {}", app);
            self.authorization.stop_watching(&app);
        }
    }

    pub fn is_watching(&self, package: &str) -> bool {
        self.watched.contains_key(package)
    }

    pub fn watched_packages(&self) -> impl Iterator<Item = &str> {
        self.watched.keys().map(String::as_str)
    }

    /// Handle an authorization change for `package`
    ///
    /// Returns the number of profiles removed.
    pub fn on_authorization_changed(
        &mut self,
        package: &str,
        registry: &mut ProfileRegistry,
    ) -> usize {
        let Some(&uid) = self.watched.get(package) else {
            debug!("Authorization change for unwatched package {}", package);
            return 0;
        };
        let app = AppIdentity::new(uid, package);
        if self.authorization.is_authorized(&app) {
            debug!("{} is still authorized", app);
            return 0;
        }

        info!("Wi-Fi authorization revoked for {}, removing its profiles", app);
        let connected = self.connection.current_connected_domain();
        let removed = registry.remove_saved_owned_by(package);
        self.stop_watching(package);

        if let Some(domain) = connected
            && removed.iter().any(|p| p.fqdn() == domain)
        {
            info!("Disconnecting from {} after revocation", domain);
            self.connection.disconnect();
        }
        removed.len()
    }

    /// Mark the profile for `fqdn` as having connected at least once
    pub fn on_network_connected(&self, fqdn: &str, registry: &mut ProfileRegistry) -> bool {
        registry.mark_connected(fqdn)
    }

    pub fn snapshot_metrics(&self, registry: &ProfileRegistry) -> MetricsSnapshot {
        let profiles: BTreeMap<String, ProfileSummary> = registry
            .profiles()
            .map(|p| {
                (
                    p.fqdn().to_string(),
                    ProfileSummary {
                        credential_type: p.credential_type,
                        source: p.source,
                        owner: p.owner.package.clone(),
                        has_ever_connected: p.has_ever_connected,
                        auto_join: p.auto_join,
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            installed_count: profiles.len(),
            connected_count: profiles.values().filter(|s| s.has_ever_connected).count(),
            profiles,
        }
    }

    /// Push a snapshot to the telemetry sink
    pub fn publish_metrics(&self, registry: &ProfileRegistry) -> MetricsSnapshot {
        let snapshot = self.snapshot_metrics(registry);
        self.telemetry.record_profiles(&snapshot);
        snapshot
    }
}
