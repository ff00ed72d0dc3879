//! Access point to profile resolution
//!
//! ```text
//! scan result --> identity key --> cache hit  --> matchers --> precedence
//!                                  cache miss --> request tracker --> (later) cache
//! ```
//!
//! A cache miss never waits: the fetch is issued and the caller gets an empty
//! result. Home matches win over Roaming matches, but only while the
//! subscription has not expired; an expired Home match is simply dropped.

use crate::cache::{MetadataCache, MetadataSnapshot};
use crate::clock::Clock;
use crate::collaborators::Collaborators;
use crate::matcher::Matchers;
use crate::profile::Profile;
use crate::registry::ProfileRegistry;
use crate::telemetry::{Counter, TelemetrySink};
use crate::tracker::RequestTracker;
use passpoint_common::ie::Hs20Release;
use passpoint_common::{
    AccessPoint, AnqpElements, Config, IdentityKey, MacAddress, MatchType, NetworkClass,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Matched access points grouped by home domain, then by network class
pub type MatchGroups = BTreeMap<String, BTreeMap<NetworkClass, Vec<AccessPoint>>>;

/// A profile that applies to an access point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileMatch {
    pub profile: Profile,
    pub match_type: MatchType,
}

/// Identity of a scanned access point as far as ANQP is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyedAccessPoint {
    bssid: MacAddress,
    key: IdentityKey,
    release: Option<Hs20Release>,
}

/// Resolves scanned access points to installed profiles
pub struct MatchResolver {
    cache: MetadataCache,
    tracker: RequestTracker,
    matchers: Matchers,
    telemetry: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
}

impl MatchResolver {
    pub fn new(config: &Config, collaborators: &Collaborators, matchers: Matchers) -> Self {
        Self {
            cache: MetadataCache::new(config.cache.staleness_ms, collaborators.clock.clone()),
            tracker: RequestTracker::new(
                config.requests.clone(),
                collaborators.transport.clone(),
                collaborators.telemetry.clone(),
                collaborators.clock.clone(),
            ),
            matchers,
            telemetry: collaborators.telemetry.clone(),
            clock: collaborators.clock.clone(),
        }
    }

    /// Profiles that apply to `ap`, after precedence
    pub fn match_one(&mut self, ap: &AccessPoint, registry: &ProfileRegistry) -> Vec<ProfileMatch> {
        let Some(target) = derive_key(ap) else {
            return Vec::new();
        };

        let Some(snapshot) = self.cache.lookup(&target.key) else {
            let first_attempt = self.tracker.is_first_attempt(target.bssid);
            let home_realm_biased = target.release.is_some_and(|r| r >= Hs20Release::R2);
            self.tracker
                .request_fetch(target.bssid, target.key, first_attempt, home_realm_biased);
            return Vec::new();
        };

        let roaming_consortium = ap.roaming_consortium();
        let now = self.clock.now_millis();
        let mut home = Vec::new();
        let mut roaming = Vec::new();

        for profile in registry.profiles() {
            let match_type = self
                .matchers
                .for_type(profile.credential_type)
                .match_profile(profile, &snapshot.elements, roaming_consortium.as_ref());
            if match_type == MatchType::None {
                continue;
            }
            if profile.is_subscription_expired(now) {
                debug!(
                    "Ignoring {:?} match of {}: subscription expired",
                    match_type,
                    profile.fqdn()
                );
                continue;
            }
            let entry = ProfileMatch {
                profile: profile.clone(),
                match_type,
            };
            match match_type {
                MatchType::Home => home.push(entry),
                MatchType::Roaming => roaming.push(entry),
                MatchType::None => {}
            }
        }

        if home.is_empty() { roaming } else { home }
    }

    /// Match every access point and group the results
    ///
    /// Home matches re-resolve the carrier id of the matched profile.
    pub fn match_all(&mut self, aps: &[AccessPoint], registry: &mut ProfileRegistry) -> MatchGroups {
        let mut groups = MatchGroups::new();
        for ap in aps {
            for m in self.match_one(ap, registry) {
                let fqdn = m.profile.fqdn().to_string();
                if m.match_type == MatchType::Home && registry.refresh_carrier_id(&fqdn) {
                    registry.persist();
                }
                let Some(class) = NetworkClass::from_match(m.match_type) else {
                    continue;
                };
                groups
                    .entry(fqdn)
                    .or_default()
                    .entry(class)
                    .or_default()
                    .push(ap.clone());
            }
        }
        groups
    }

    /// Cached ANQP elements for `ap`, empty on a miss
    pub fn lookup_cached_metadata(&self, ap: &AccessPoint) -> AnqpElements {
        derive_key(ap)
            .and_then(|target| self.cache.lookup(&target.key))
            .map(|snapshot| snapshot.elements.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, key: &IdentityKey) -> Option<&MetadataSnapshot> {
        self.cache.lookup(key)
    }

    /// Evict stale cache entries and lapsed request hold-offs
    ///
    /// Returns the number of cache entries evicted.
    pub fn sweep(&mut self) -> usize {
        let pruned = self.tracker.prune_holdoffs();
        if pruned > 0 {
            debug!("Pruned {} lapsed ANQP hold-offs", pruned);
        }
        self.cache.sweep()
    }

    /// Store a fetch result if it answers a request issued here
    pub fn on_fetch_result(&mut self, bssid: MacAddress, elements: AnqpElements) -> bool {
        match self.tracker.on_fetch_completed(bssid, true) {
            Some(key) => {
                self.cache.insert(key, elements);
                true
            }
            None => {
                debug!("Dropping unsolicited ANQP response from {}", bssid);
                self.telemetry.increment(Counter::AnqpResponseDropped);
                false
            }
        }
    }

    pub fn on_fetch_failure(&mut self, bssid: MacAddress) -> bool {
        let known = self.tracker.on_fetch_completed(bssid, false).is_some();
        if !known {
            debug!("Dropping unsolicited ANQP failure from {}", bssid);
        }
        known
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

fn derive_key(ap: &AccessPoint) -> Option<KeyedAccessPoint> {
    if !ap.passpoint {
        return None;
    }
    let Some(bssid) = ap.bssid_address() else {
        debug!("Ignoring {}: invalid BSSID {:?}", ap.ssid, ap.bssid);
        return None;
    };

    let indication = match ap.hs20_indication() {
        Ok(indication) => indication,
        Err(e) if ap.anqp_domain_id.is_some() => {
            debug!("Malformed HS2.0 indication from {}: {}", bssid, e);
            None
        }
        Err(e) => {
            debug!("Ignoring {}: malformed HS2.0 indication: {}", bssid, e);
            return None;
        }
    };
    let domain_id = ap
        .anqp_domain_id
        .or_else(|| indication.and_then(|i| i.anqp_domain_id))
        .unwrap_or(0);

    Some(KeyedAccessPoint {
        bssid,
        key: IdentityKey::build(&ap.ssid, bssid, ap.hessid, domain_id),
        release: indication.map(|i| i.release),
    })
}
