//! Installed profile registry
//!
//! Profiles are keyed by home domain (FQDN). The registry enforces the
//! replacement policy between Saved and Suggested profiles, installs and
//! uninstalls credentials, allocates profile indexes and writes every change
//! to the persisted store.
//!
//! ## Replacement policy
//!
//! A Suggested profile may only replace a profile owned by the same
//! package. Saved profiles replace anything. Every accepted add, including
//! an identical re-add, consumes a fresh index.

use crate::collaborators::{
    CaVerifier, CarrierResolver, Collaborators, CredentialStore, NetworkConfigStore,
};
use crate::legacy::LegacyNetworkConfig;
use crate::lifecycle::LifecycleCoordinator;
use crate::profile::{NetworkDescriptor, PersistedState, Profile, ProfileConfig};
use crate::telemetry::{Counter, TelemetrySink};
use passpoint_common::{AppIdentity, PasspointError, ProfileSource, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Set of installed profiles
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Profile>,
    next_index: u64,
    credential_store: Arc<dyn CredentialStore>,
    ca_verifier: Arc<dyn CaVerifier>,
    config_store: Arc<dyn NetworkConfigStore>,
    carrier_resolver: Arc<dyn CarrierResolver>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl ProfileRegistry {
    pub fn new(collaborators: &Collaborators) -> Self {
        Self {
            profiles: BTreeMap::new(),
            next_index: 0,
            credential_store: collaborators.credential_store.clone(),
            ca_verifier: collaborators.ca_verifier.clone(),
            config_store: collaborators.config_store.clone(),
            carrier_resolver: collaborators.carrier_resolver.clone(),
            telemetry: collaborators.telemetry.clone(),
        }
    }

    /// Add a profile or replace the one with the same home domain
    pub fn add_or_update(
        &mut self,
        config: Option<ProfileConfig>,
        caller: &AppIdentity,
        is_suggestion: bool,
        lifecycle: &mut LifecycleCoordinator,
    ) -> Result<()> {
        self.telemetry.increment(Counter::ProfileInstallAttempted);

        match self.try_add_or_update(config, caller, is_suggestion, lifecycle) {
            Ok(fqdn) => {
                self.telemetry.increment(Counter::ProfileInstallSucceeded);
                info!("Installed Passpoint profile {} for {}", fqdn, caller);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to install Passpoint profile for {}: {}", caller, e);
                Err(e)
            }
        }
    }

    fn try_add_or_update(
        &mut self,
        config: Option<ProfileConfig>,
        caller: &AppIdentity,
        is_suggestion: bool,
        lifecycle: &mut LifecycleCoordinator,
    ) -> Result<String> {
        let config = config.ok_or_else(|| PasspointError::validation("missing configuration"))?;
        let credential_type = config.validate()?;

        if config.update_identifier == 0
            && let Some(ca) = config.ca_certificate()
        {
            self.ca_verifier
                .verify(ca)
                .map_err(|e| PasspointError::Trust(e.to_string()))?;
        }

        let fqdn = config.fqdn().to_string();
        let source = ProfileSource::from_suggestion(is_suggestion);
        if let Some(existing) = self.profiles.get(&fqdn)
            && is_suggestion
            && existing.owner.package != caller.package
        {
            debug!(
                "Suggestion from {} may not replace profile {} owned by {}",
                caller, fqdn, existing.owner
            );
            return Err(PasspointError::Ownership { fqdn });
        }

        let index = self.allocate_index();
        let profile = Profile::new(config, index, caller.clone(), source, credential_type);
        self.credential_store
            .install(&profile)
            .map_err(|e| PasspointError::Install(e.to_string()))?;

        self.commit(profile, lifecycle);
        if source == ProfileSource::Saved {
            lifecycle.start_watching(caller);
        }
        Ok(fqdn)
    }

    /// Import a legacy enterprise network entry as a Saved profile
    ///
    /// The entry's credentials are already in the secure store, so nothing
    /// is installed and no trust check runs. An entry without a creator
    /// package is not watched.
    pub fn add_legacy(
        &mut self,
        legacy: &LegacyNetworkConfig,
        lifecycle: &mut LifecycleCoordinator,
    ) -> Result<()> {
        self.telemetry.increment(Counter::ProfileInstallAttempted);

        let (config, credential_type) = legacy
            .to_profile_config()
            .inspect_err(|e| warn!("Failed to import legacy network {}: {}", legacy.fqdn, e))?;
        let owner = legacy.creator();
        let index = self.allocate_index();
        let profile = Profile::new(
            config,
            index,
            owner.clone(),
            ProfileSource::Saved,
            credential_type,
        );

        let fqdn = self.commit(profile, lifecycle);
        if !owner.package.is_empty() {
            lifecycle.start_watching(&owner);
        }
        self.telemetry.increment(Counter::ProfileInstallSucceeded);
        info!("Imported legacy network {} as Passpoint profile {}", fqdn, index);
        Ok(())
    }

    /// Insert `profile`, retiring the profile it replaces, and persist
    fn commit(&mut self, profile: Profile, lifecycle: &mut LifecycleCoordinator) -> String {
        let fqdn = profile.fqdn().to_string();
        let descriptor = profile.descriptor();
        let replaced = self.profiles.insert(fqdn.clone(), profile);
        if let Some(old) = &replaced {
            info!("Replacing Passpoint profile {} (index {})", fqdn, old.index);
            if let Err(e) = self.credential_store.uninstall(old) {
                warn!("Failed to uninstall credentials of replaced profile {}: {}", fqdn, e);
            }
            let old_descriptor = old.descriptor();
            if old_descriptor != descriptor {
                self.config_store.remove_descriptor(&old_descriptor.key);
            }
        }
        self.persist();

        if let Some(old) = replaced
            && old.is_saved()
            && !self.has_saved_profiles(&old.owner.package)
        {
            lifecycle.stop_watching(&old.owner.package);
        }
        if self.refresh_carrier_id(&fqdn) {
            self.persist();
        }
        fqdn
    }

    /// Remove the profile for `fqdn`
    ///
    /// Only the owner (by uid) or a privileged caller may remove a profile.
    pub fn remove(
        &mut self,
        caller_uid: u32,
        privileged: bool,
        fqdn: &str,
        lifecycle: &mut LifecycleCoordinator,
    ) -> Result<()> {
        self.telemetry.increment(Counter::ProfileUninstallAttempted);

        let Some(profile) = self.profiles.get(fqdn) else {
            warn!("No Passpoint profile for {}", fqdn);
            return Err(PasspointError::NotFound(fqdn.to_string()));
        };
        if !privileged && profile.owner.uid != caller_uid {
            warn!("uid {} may not remove Passpoint profile {}", caller_uid, fqdn);
            return Err(PasspointError::Ownership {
                fqdn: fqdn.to_string(),
            });
        }

        let Some(profile) = self.profiles.remove(fqdn) else {
            return Err(PasspointError::NotFound(fqdn.to_string()));
        };
        self.retire(&profile);
        self.persist();

        if profile.is_saved() && !self.has_saved_profiles(&profile.owner.package) {
            lifecycle.stop_watching(&profile.owner.package);
        }

        self.telemetry.increment(Counter::ProfileUninstallSucceeded);
        info!("Removed Passpoint profile {}", fqdn);
        Ok(())
    }

    /// Saved profile configurations visible to the caller
    pub fn list(&self, caller_uid: u32, privileged: bool) -> Vec<ProfileConfig> {
        self.profiles
            .values()
            .filter(|p| p.is_saved())
            .filter(|p| privileged || p.owner.uid == caller_uid)
            .map(|p| p.config.clone())
            .collect()
    }

    /// Remove every Saved profile owned by `package`
    ///
    /// Credential uninstall failures are logged and do not stop the cascade.
    pub fn remove_saved_owned_by(&mut self, package: &str) -> Vec<Profile> {
        let fqdns: Vec<String> = self
            .profiles
            .values()
            .filter(|p| p.is_saved() && p.owner.package == package)
            .map(|p| p.fqdn().to_string())
            .collect();

        let removed: Vec<Profile> = fqdns
            .iter()
            .filter_map(|fqdn| self.profiles.remove(fqdn))
            .collect();
        for profile in &removed {
            self.telemetry.increment(Counter::ProfileUninstallAttempted);
            self.retire(profile);
            self.telemetry.increment(Counter::ProfileUninstallSucceeded);
        }
        if !removed.is_empty() {
            self.persist();
        }
        removed
    }

    /// Set the auto-join flag; false when no profile exists for `fqdn`
    pub fn enable_auto_join(&mut self, fqdn: &str, enabled: bool) -> bool {
        let Some(profile) = self.profiles.get_mut(fqdn) else {
            warn!("Cannot set auto-join: no Passpoint profile for {}", fqdn);
            return false;
        };
        if profile.auto_join != enabled {
            profile.auto_join = enabled;
            self.persist();
        }
        true
    }

    /// Record a first connection; true when the flag changed
    pub fn mark_connected(&mut self, fqdn: &str) -> bool {
        let Some(profile) = self.profiles.get_mut(fqdn) else {
            debug!("Connected to {} without a Passpoint profile", fqdn);
            return false;
        };
        if profile.has_ever_connected {
            return false;
        }
        profile.has_ever_connected = true;
        self.persist();
        true
    }

    /// Re-resolve the carrier id of a SIM profile with an unmasked IMSI
    ///
    /// Returns true when the stored carrier id changed. The caller persists.
    pub fn refresh_carrier_id(&mut self, fqdn: &str) -> bool {
        let Some(profile) = self.profiles.get_mut(fqdn) else {
            return false;
        };
        let Some(imsi) = profile
            .config
            .credential
            .as_ref()
            .and_then(|c| c.sim.as_ref())
            .and_then(|sim| sim.full_imsi())
        else {
            return false;
        };
        let Some(carrier_id) = self.carrier_resolver.resolve(imsi) else {
            return false;
        };
        if profile.config.carrier_id == Some(carrier_id) {
            return false;
        }
        debug!("Carrier id of {} is now {}", fqdn, carrier_id);
        profile.config.carrier_id = Some(carrier_id);
        true
    }

    /// Descriptors of the profiles for the given home domains
    pub fn descriptors_for_domains(&self, fqdns: &[String]) -> Vec<NetworkDescriptor> {
        fqdns
            .iter()
            .filter_map(|fqdn| self.profiles.get(fqdn))
            .map(Profile::descriptor)
            .collect()
    }

    /// Replace the registry contents with persisted state
    ///
    /// The index never moves backwards. Watches follow the restored Saved
    /// owners.
    pub fn restore(&mut self, state: PersistedState, lifecycle: &mut LifecycleCoordinator) {
        let highest = state.profiles.iter().map(|p| p.index + 1).max().unwrap_or(0);
        self.next_index = self.next_index.max(state.next_index).max(highest);
        self.profiles = state
            .profiles
            .into_iter()
            .map(|p| (p.fqdn().to_string(), p))
            .collect();

        let owners: BTreeSet<&str> = self
            .profiles
            .values()
            .filter(|p| p.is_saved())
            .map(|p| p.owner.package.as_str())
            .collect();
        let orphaned: Vec<String> = lifecycle
            .watched_packages()
            .filter(|package| !owners.contains(package))
            .map(str::to_string)
            .collect();
        for package in orphaned {
            lifecycle.stop_watching(&package);
        }
        for profile in self.profiles.values().filter(|p| p.is_saved()) {
            lifecycle.start_watching(&profile.owner);
        }
        info!(
            "Restored {} Passpoint profiles, next index {}",
            self.profiles.len(),
            self.next_index
        );
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            profiles: self.profiles.values().cloned().collect(),
            next_index: self.next_index,
        }
    }

    /// Write the current state, logging failures
    pub fn persist(&self) {
        if let Err(e) = self.config_store.persist(true, &self.persisted_state()) {
            warn!("Failed to persist Passpoint profiles: {}", e);
        }
    }

    pub fn get(&self, fqdn: &str) -> Option<&Profile> {
        self.profiles.get(fqdn)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Index the next profile will receive
    pub const fn next_index(&self) -> u64 {
        self.next_index
    }

    fn has_saved_profiles(&self, package: &str) -> bool {
        self.profiles
            .values()
            .any(|p| p.is_saved() && p.owner.package == package)
    }

    const fn allocate_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn retire(&self, profile: &Profile) {
        if let Err(e) = self.credential_store.uninstall(profile) {
            warn!(
                "Failed to uninstall credentials of {}: {}",
                profile.fqdn(),
                e
            );
        }
        self.config_store
            .remove_descriptor(&profile.descriptor().key);
    }
}
