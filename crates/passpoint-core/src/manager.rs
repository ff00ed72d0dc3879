//! Passpoint manager facade
//!
//! Owns the registry, the resolver (cache and request tracker) and the
//! lifecycle coordinator behind one lock. Direct calls and queued events are
//! applied under that lock, so no two operations interleave their state
//! changes.

use crate::collaborators::Collaborators;
use crate::events::{self, EventReceiver, EventSender, PasspointEvent};
use crate::legacy::LegacyNetworkConfig;
use crate::lifecycle::LifecycleCoordinator;
use crate::matcher::Matchers;
use crate::profile::{NetworkDescriptor, PersistedState, ProfileConfig};
use crate::registry::ProfileRegistry;
use crate::resolver::{MatchGroups, MatchResolver, ProfileMatch};
use crate::telemetry::MetricsSnapshot;
use parking_lot::Mutex;
use passpoint_common::{AccessPoint, AnqpElements, AppIdentity, Config, MacAddress, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

struct State {
    registry: ProfileRegistry,
    resolver: MatchResolver,
    lifecycle: LifecycleCoordinator,
}

/// Passpoint profile manager
pub struct PasspointManager {
    state: Mutex<State>,
}

impl PasspointManager {
    /// Create a manager with the default credential matchers
    pub fn new(config: &Config, collaborators: &Collaborators) -> Self {
        Self::with_matchers(config, collaborators, Matchers::default())
    }

    pub fn with_matchers(config: &Config, collaborators: &Collaborators, matchers: Matchers) -> Self {
        Self {
            state: Mutex::new(State {
                registry: ProfileRegistry::new(collaborators),
                resolver: MatchResolver::new(config, collaborators, matchers),
                lifecycle: LifecycleCoordinator::new(collaborators),
            }),
        }
    }

    /// Event channel whose receiving side is handed to `run_events`
    pub fn event_channel() -> (EventSender, EventReceiver) {
        events::channel()
    }

    pub fn add_or_update_profile(
        &self,
        config: Option<ProfileConfig>,
        caller_uid: u32,
        caller_package: &str,
        is_suggestion: bool,
    ) -> Result<()> {
        let caller = AppIdentity::new(caller_uid, caller_package);
        let mut guard = self.state.lock();
        let State {
            registry,
            lifecycle,
            ..
        } = &mut *guard;
        registry.add_or_update(config, &caller, is_suggestion, lifecycle)
    }

    /// Import a legacy enterprise network entry
    pub fn add_legacy_config(&self, legacy: &LegacyNetworkConfig) -> Result<()> {
        let mut guard = self.state.lock();
        let State {
            registry,
            lifecycle,
            ..
        } = &mut *guard;
        registry.add_legacy(legacy, lifecycle)
    }

    pub fn remove_profile(&self, caller_uid: u32, privileged: bool, fqdn: &str) -> Result<()> {
        let mut guard = self.state.lock();
        let State {
            registry,
            lifecycle,
            ..
        } = &mut *guard;
        registry.remove(caller_uid, privileged, fqdn, lifecycle)
    }

    pub fn list_profiles(&self, caller_uid: u32, privileged: bool) -> Vec<ProfileConfig> {
        self.state.lock().registry.list(caller_uid, privileged)
    }

    pub fn match_one(&self, ap: &AccessPoint) -> Vec<ProfileMatch> {
        let mut guard = self.state.lock();
        let State {
            registry, resolver, ..
        } = &mut *guard;
        resolver.match_one(ap, registry)
    }

    pub fn match_all(&self, aps: &[AccessPoint]) -> MatchGroups {
        let mut guard = self.state.lock();
        let State {
            registry, resolver, ..
        } = &mut *guard;
        resolver.match_all(aps, registry)
    }

    pub fn lookup_cached_metadata(&self, ap: &AccessPoint) -> AnqpElements {
        self.state.lock().resolver.lookup_cached_metadata(ap)
    }

    pub fn sweep_cache(&self) -> usize {
        self.state.lock().resolver.sweep()
    }

    /// Apply an ANQP response; false when it was not solicited
    pub fn on_fetch_result(&self, bssid: MacAddress, elements: AnqpElements) -> bool {
        self.state.lock().resolver.on_fetch_result(bssid, elements)
    }

    pub fn on_fetch_failure(&self, bssid: MacAddress) -> bool {
        self.state.lock().resolver.on_fetch_failure(bssid)
    }

    /// Returns the number of profiles removed
    pub fn on_authorization_changed(&self, package: &str) -> usize {
        let mut guard = self.state.lock();
        let State {
            registry,
            lifecycle,
            ..
        } = &mut *guard;
        lifecycle.on_authorization_changed(package, registry)
    }

    pub fn on_network_connected(&self, fqdn: &str) -> bool {
        let mut guard = self.state.lock();
        let State {
            registry,
            lifecycle,
            ..
        } = &mut *guard;
        lifecycle.on_network_connected(fqdn, registry)
    }

    pub fn snapshot_metrics(&self) -> MetricsSnapshot {
        let guard = self.state.lock();
        guard.lifecycle.snapshot_metrics(&guard.registry)
    }

    pub fn publish_metrics(&self) -> MetricsSnapshot {
        let guard = self.state.lock();
        guard.lifecycle.publish_metrics(&guard.registry)
    }

    pub fn enable_auto_join(&self, fqdn: &str, enabled: bool) -> bool {
        self.state.lock().registry.enable_auto_join(fqdn, enabled)
    }

    pub fn descriptors_for_domains(&self, fqdns: &[String]) -> Vec<NetworkDescriptor> {
        self.state.lock().registry.descriptors_for_domains(fqdns)
    }

    /// Load previously persisted profiles
    pub fn restore(&self, state: PersistedState) {
        let mut guard = self.state.lock();
        let State {
            registry,
            lifecycle,
            ..
        } = &mut *guard;
        registry.restore(state, lifecycle);
    }

    pub fn persisted_state(&self) -> PersistedState {
        self.state.lock().registry.persisted_state()
    }

    /// Index the next installed profile will receive
    pub fn profile_index(&self) -> u64 {
        self.state.lock().registry.next_index()
    }

    pub fn is_watching(&self, package: &str) -> bool {
        self.state.lock().lifecycle.is_watching(package)
    }

    pub fn cached_entries(&self) -> usize {
        self.state.lock().resolver.cached_entries()
    }

    /// Apply one queued event
    pub fn handle_event(&self, event: PasspointEvent) {
        match event {
            PasspointEvent::FetchResult { bssid, elements } => {
                self.on_fetch_result(bssid, elements);
            }
            PasspointEvent::FetchFailure { bssid } => {
                self.on_fetch_failure(bssid);
            }
            PasspointEvent::AuthorizationChanged { package } => {
                self.on_authorization_changed(&package);
            }
            PasspointEvent::NetworkConnected { fqdn } => {
                self.on_network_connected(&fqdn);
            }
        }
    }

    /// Apply every event already queued, returning how many were handled
    pub fn drain_events(&self, rx: &mut EventReceiver) -> usize {
        let mut handled = 0;
        while let Ok(event) = rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Apply events until every sender is dropped
    pub async fn run_events(self: Arc<Self>, mut rx: EventReceiver) {
        info!("Passpoint event loop started");
        while let Some(event) = rx.recv().await {
            debug!("Passpoint event: {:?}", event);
            self.handle_event(event);
        }
        info!("Passpoint event loop stopped");
    }

    /// Long-running background task: sweep the ANQP cache every `interval`
    pub async fn sweep_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.sweep_cache();
        }
    }
}
