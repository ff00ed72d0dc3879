//! Local stand-ins for the platform services
//!
//! The CLI has no keystore, SIM or radio. Credentials are only logged, ANQP
//! queries are answered from a canned response file through the event
//! channel, and authorization is revoked explicitly on the command line.

use passpoint_common::{
    AnqpElement, AnqpElements, AppIdentity, CollaboratorError, MacAddress, elements_from_list,
};
use passpoint_core::{
    AuthorizationWatcher, CaVerifier, CarrierResolver, CollabResult, ConnectionController,
    CredentialStore, EventSender, MetadataTransport, Profile,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// One entry of the canned ANQP response file
#[derive(Debug, Clone, Deserialize)]
pub struct CannedResponse {
    pub bssid: MacAddress,
    #[serde(default)]
    pub elements: Vec<AnqpElement>,
}

/// Answers ANQP queries from canned responses
///
/// Unknown BSSIDs are answered with a failure.
pub struct CannedTransport {
    responses: HashMap<MacAddress, AnqpElements>,
    events: EventSender,
}

impl CannedTransport {
    pub fn new(responses: Vec<CannedResponse>, events: EventSender) -> Self {
        let responses = responses
            .into_iter()
            .map(|r| (r.bssid, elements_from_list(r.elements)))
            .collect();
        Self { responses, events }
    }
}

impl MetadataTransport for CannedTransport {
    fn issue_fetch(&self, bssid: MacAddress, first_attempt: bool, _home_realm_biased: bool) -> bool {
        debug!("ANQP query to {} (first attempt: {})", bssid, first_attempt);
        match self.responses.get(&bssid) {
            Some(elements) => self.events.fetch_result(bssid, elements.clone()),
            None => self.events.fetch_failure(bssid),
        }
    }
}

/// Credential store that only records aliases in the log
#[derive(Debug, Default)]
pub struct LoggingCredentialStore;

impl CredentialStore for LoggingCredentialStore {
    fn install(&self, profile: &Profile) -> CollabResult<()> {
        info!(
            "Installing credentials for {} as {}",
            profile.fqdn(),
            profile.credential_alias()
        );
        Ok(())
    }

    fn uninstall(&self, profile: &Profile) -> CollabResult<()> {
        info!(
            "Uninstalling credentials for {} ({})",
            profile.fqdn(),
            profile.credential_alias()
        );
        Ok(())
    }
}

/// Accepts any non-empty CA reference
#[derive(Debug, Default)]
pub struct ReferenceCaVerifier;

impl CaVerifier for ReferenceCaVerifier {
    fn verify(&self, ca_certificate: &str) -> CollabResult<()> {
        if ca_certificate.trim().is_empty() {
            return Err(CollaboratorError::Rejected("empty CA reference".into()));
        }
        Ok(())
    }
}

/// Carrier ids of the SIMs given on the command line (`IMSI=ID`)
#[derive(Debug, Default)]
pub struct StaticCarrierResolver {
    carriers: HashMap<String, i32>,
}

impl StaticCarrierResolver {
    pub fn parse(entries: &[String]) -> anyhow::Result<Self> {
        let mut carriers = HashMap::new();
        for entry in entries {
            let (imsi, id) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("expected IMSI=CARRIER_ID, got {entry}"))?;
            carriers.insert(imsi.to_string(), id.parse()?);
        }
        Ok(Self { carriers })
    }
}

impl CarrierResolver for StaticCarrierResolver {
    fn resolve(&self, imsi: &str) -> Option<i32> {
        self.carriers.get(imsi).copied()
    }
}

/// Authorization watcher with an explicit revocation list
#[derive(Debug, Default)]
pub struct StaticAuthorization {
    revoked: HashSet<String>,
}

impl StaticAuthorization {
    pub fn revoking(packages: impl IntoIterator<Item = String>) -> Self {
        Self {
            revoked: packages.into_iter().collect(),
        }
    }
}

impl AuthorizationWatcher for StaticAuthorization {
    fn start_watching(&self, app: &AppIdentity) {
        debug!("Watching {}", app);
    }

    fn stop_watching(&self, app: &AppIdentity) {
        debug!("Stopped watching {}", app);
    }

    fn is_authorized(&self, app: &AppIdentity) -> bool {
        !self.revoked.contains(&app.package)
    }
}

/// Connection state given on the command line
#[derive(Debug, Default)]
pub struct StaticConnection {
    domain: Option<String>,
    disconnected: AtomicBool,
}

impl StaticConnection {
    pub const fn new(domain: Option<String>) -> Self {
        Self {
            domain,
            disconnected: AtomicBool::new(false),
        }
    }

    pub fn was_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

impl ConnectionController for StaticConnection {
    fn current_connected_domain(&self) -> Option<String> {
        if self.was_disconnected() {
            return None;
        }
        self.domain.clone()
    }

    fn disconnect(&self) {
        warn!("Disconnecting from {:?}", self.domain);
        self.disconnected.store(true, Ordering::SeqCst);
    }
}
