//! Recording fakes of the external collaborators and config builders

use crate::clock::ManualClock;
use crate::collaborators::{
    AuthorizationWatcher, CaVerifier, CarrierResolver, CollabResult, Collaborators,
    ConnectionController, CredentialStore, MetadataTransport, NetworkConfigStore,
};
use crate::manager::PasspointManager;
use crate::matcher::{CredentialMatcher, Matchers};
use crate::profile::{
    CertCredential, Credential, CredentialType, HomeSp, PersistedState, Profile, ProfileConfig,
    SimCredential, UserCredential, eap,
};
use crate::telemetry::AtomicTelemetry;
use parking_lot::Mutex;
use passpoint_common::{
    AccessPoint, AnqpElements, AppIdentity, CollaboratorError, Config, MacAddress, MatchType,
    ProfileSource, RoamingConsortium,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const TEST_REALM: &str = "realm.example.com";
pub const TEST_CA: &str = "ca-cert";

pub fn user_config(fqdn: &str, friendly_name: &str) -> ProfileConfig {
    ProfileConfig {
        home_sp: Some(HomeSp {
            fqdn: fqdn.to_string(),
            friendly_name: friendly_name.to_string(),
            roaming_consortium_ois: Vec::new(),
        }),
        credential: Some(Credential {
            realm: TEST_REALM.to_string(),
            ca_certificate: Some(TEST_CA.to_string()),
            user: Some(UserCredential {
                username: "username".to_string(),
                password: "password".to_string(),
                eap_type: eap::TTLS,
                non_eap_inner_method: "MS-CHAP-V2".to_string(),
            }),
            ..Credential::default()
        }),
        ..ProfileConfig::default()
    }
}

pub fn sim_config(fqdn: &str, imsi: &str) -> ProfileConfig {
    ProfileConfig {
        home_sp: Some(HomeSp {
            fqdn: fqdn.to_string(),
            friendly_name: "sim provider".to_string(),
            roaming_consortium_ois: Vec::new(),
        }),
        credential: Some(Credential {
            realm: TEST_REALM.to_string(),
            sim: Some(SimCredential {
                imsi: imsi.to_string(),
                eap_type: eap::SIM,
            }),
            ..Credential::default()
        }),
        ..ProfileConfig::default()
    }
}

pub fn cert_config(fqdn: &str) -> ProfileConfig {
    ProfileConfig {
        home_sp: Some(HomeSp {
            fqdn: fqdn.to_string(),
            friendly_name: "cert provider".to_string(),
            roaming_consortium_ois: Vec::new(),
        }),
        credential: Some(Credential {
            realm: TEST_REALM.to_string(),
            ca_certificate: Some(TEST_CA.to_string()),
            client_certificate: Some("client-cert".to_string()),
            client_private_key: Some("client-key".to_string()),
            certificate: Some(CertCredential {
                cert_type: "x509v3".to_string(),
                cert_sha256_fingerprint: "ab".repeat(32),
            }),
            ..Credential::default()
        }),
        ..ProfileConfig::default()
    }
}

pub fn saved_profile(config: ProfileConfig) -> Profile {
    let credential_type = config.validate().unwrap_or(CredentialType::User);
    Profile::new(
        config,
        0,
        AppIdentity::new(1234, "com.android.test"),
        ProfileSource::Saved,
        credential_type,
    )
}

pub fn access_point(ssid: &str, bssid: &str) -> AccessPoint {
    AccessPoint::new(ssid, bssid)
}

#[derive(Default)]
pub struct FakeTransport {
    issued: Mutex<Vec<(MacAddress, bool, bool)>>,
    refuse: AtomicBool,
}

impl FakeTransport {
    pub fn issued(&self) -> Vec<MacAddress> {
        self.issued.lock().iter().map(|(bssid, _, _)| *bssid).collect()
    }

    pub fn requests(&self) -> Vec<(MacAddress, bool, bool)> {
        self.issued.lock().clone()
    }

    pub fn set_accept(&self, accept: bool) {
        self.refuse.store(!accept, Ordering::SeqCst);
    }
}

impl MetadataTransport for FakeTransport {
    fn issue_fetch(&self, bssid: MacAddress, first_attempt: bool, home_realm_biased: bool) -> bool {
        if self.refuse.load(Ordering::SeqCst) {
            return false;
        }
        self.issued
            .lock()
            .push((bssid, first_attempt, home_realm_biased));
        true
    }
}

#[derive(Default)]
pub struct FakeCredentialStore {
    installed: Mutex<Vec<String>>,
    uninstalled: Mutex<Vec<String>>,
    fail_install: AtomicBool,
    fail_uninstall: AtomicBool,
}

impl FakeCredentialStore {
    /// Aliases of installed credential sets
    pub fn installed(&self) -> Vec<String> {
        self.installed.lock().clone()
    }

    /// Aliases of uninstalled credential sets
    pub fn uninstalled(&self) -> Vec<String> {
        self.uninstalled.lock().clone()
    }

    pub fn fail_install(&self, fail: bool) {
        self.fail_install.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uninstall(&self, fail: bool) {
        self.fail_uninstall.store(fail, Ordering::SeqCst);
    }
}

impl CredentialStore for FakeCredentialStore {
    fn install(&self, profile: &Profile) -> CollabResult<()> {
        if self.fail_install.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Rejected("keystore locked".into()));
        }
        self.installed.lock().push(profile.credential_alias());
        Ok(())
    }

    fn uninstall(&self, profile: &Profile) -> CollabResult<()> {
        self.uninstalled.lock().push(profile.credential_alias());
        if self.fail_uninstall.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("keystore gone".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCaVerifier {
    verified: Mutex<Vec<String>>,
    reject: AtomicBool,
}

impl FakeCaVerifier {
    pub fn verified(&self) -> Vec<String> {
        self.verified.lock().clone()
    }

    pub fn reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

impl CaVerifier for FakeCaVerifier {
    fn verify(&self, ca_certificate: &str) -> CollabResult<()> {
        self.verified.lock().push(ca_certificate.to_string());
        if self.reject.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Rejected("untrusted root".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeConfigStore {
    removed: Mutex<Vec<String>>,
    persisted: Mutex<Vec<PersistedState>>,
    fail: AtomicBool,
}

impl FakeConfigStore {
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().clone()
    }

    pub fn persist_count(&self) -> usize {
        self.persisted.lock().len()
    }

    pub fn last_state(&self) -> Option<PersistedState> {
        self.persisted.lock().last().cloned()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl NetworkConfigStore for FakeConfigStore {
    fn remove_descriptor(&self, key: &str) {
        self.removed.lock().push(key.to_string());
    }

    fn persist(&self, _immediate: bool, state: &PersistedState) -> CollabResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Unavailable("disk full".into()));
        }
        self.persisted.lock().push(state.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCarrierResolver {
    carriers: Mutex<HashMap<String, i32>>,
}

impl FakeCarrierResolver {
    pub fn set(&self, imsi: &str, carrier_id: i32) {
        self.carriers.lock().insert(imsi.to_string(), carrier_id);
    }
}

impl CarrierResolver for FakeCarrierResolver {
    fn resolve(&self, imsi: &str) -> Option<i32> {
        self.carriers.lock().get(imsi).copied()
    }
}

#[derive(Default)]
pub struct FakeAuthorization {
    started: Mutex<Vec<AppIdentity>>,
    stopped: Mutex<Vec<AppIdentity>>,
    revoked: Mutex<HashSet<String>>,
}

impl FakeAuthorization {
    pub fn started(&self) -> Vec<AppIdentity> {
        self.started.lock().clone()
    }

    pub fn stopped(&self) -> Vec<AppIdentity> {
        self.stopped.lock().clone()
    }

    pub fn revoke(&self, package: &str) {
        self.revoked.lock().insert(package.to_string());
    }
}

impl AuthorizationWatcher for FakeAuthorization {
    fn start_watching(&self, app: &AppIdentity) {
        self.started.lock().push(app.clone());
    }

    fn stop_watching(&self, app: &AppIdentity) {
        self.stopped.lock().push(app.clone());
    }

    fn is_authorized(&self, app: &AppIdentity) -> bool {
        !self.revoked.lock().contains(&app.package)
    }
}

#[derive(Default)]
pub struct FakeConnection {
    connected: Mutex<Option<String>>,
    disconnects: AtomicUsize,
}

impl FakeConnection {
    pub fn connect(&self, fqdn: &str) {
        *self.connected.lock() = Some(fqdn.to_string());
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl ConnectionController for FakeConnection {
    fn current_connected_domain(&self) -> Option<String> {
        self.connected.lock().clone()
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        *self.connected.lock() = None;
    }
}

/// Matcher returning a scripted result per home domain
#[derive(Default)]
pub struct ScriptedMatcher {
    results: Mutex<HashMap<String, MatchType>>,
}

impl ScriptedMatcher {
    pub fn set(&self, fqdn: &str, match_type: MatchType) {
        self.results.lock().insert(fqdn.to_string(), match_type);
    }
}

impl CredentialMatcher for ScriptedMatcher {
    fn match_profile(
        &self,
        profile: &Profile,
        _elements: &AnqpElements,
        _roaming_consortium: Option<&RoamingConsortium>,
    ) -> MatchType {
        self.results
            .lock()
            .get(profile.fqdn())
            .copied()
            .unwrap_or(MatchType::None)
    }
}

/// Manager wired to recording fakes
pub struct Harness {
    pub manager: PasspointManager,
    pub collaborators: Collaborators,
    pub transport: Arc<FakeTransport>,
    pub credentials: Arc<FakeCredentialStore>,
    pub verifier: Arc<FakeCaVerifier>,
    pub config_store: Arc<FakeConfigStore>,
    pub carriers: Arc<FakeCarrierResolver>,
    pub authorization: Arc<FakeAuthorization>,
    pub connection: Arc<FakeConnection>,
    pub telemetry: Arc<AtomicTelemetry>,
    pub clock: Arc<ManualClock>,
    pub matcher: Arc<ScriptedMatcher>,
}

impl Harness {
    pub const START_MS: u64 = 1_000_000;

    /// Harness using the default credential matchers
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Harness whose match results are scripted per home domain
    pub fn scripted() -> Self {
        let matcher = Arc::new(ScriptedMatcher::default());
        Self::build(Some(matcher))
    }

    fn build(scripted: Option<Arc<ScriptedMatcher>>) -> Self {
        let transport = Arc::new(FakeTransport::default());
        let credentials = Arc::new(FakeCredentialStore::default());
        let verifier = Arc::new(FakeCaVerifier::default());
        let config_store = Arc::new(FakeConfigStore::default());
        let carriers = Arc::new(FakeCarrierResolver::default());
        let authorization = Arc::new(FakeAuthorization::default());
        let connection = Arc::new(FakeConnection::default());
        let telemetry = Arc::new(AtomicTelemetry::new());
        let clock = Arc::new(ManualClock::new(Self::START_MS));

        let collaborators = Collaborators {
            transport: transport.clone(),
            credential_store: credentials.clone(),
            ca_verifier: verifier.clone(),
            config_store: config_store.clone(),
            carrier_resolver: carriers.clone(),
            authorization: authorization.clone(),
            connection: connection.clone(),
            telemetry: telemetry.clone(),
            clock: clock.clone(),
        };

        let (matchers, matcher) = match scripted {
            Some(matcher) => (Matchers::uniform(matcher.clone()), matcher),
            None => (Matchers::default(), Arc::new(ScriptedMatcher::default())),
        };
        let manager = PasspointManager::with_matchers(&Config::default(), &collaborators, matchers);

        Self {
            manager,
            collaborators,
            transport,
            credentials,
            verifier,
            config_store,
            carriers,
            authorization,
            connection,
            telemetry,
            clock,
            matcher,
        }
    }

    /// Get `ap` into the metadata cache with an empty snapshot
    pub fn prime_cache(&self, ap: &AccessPoint) {
        self.prime_cache_with(ap, AnqpElements::new());
    }

    pub fn prime_cache_with(&self, ap: &AccessPoint, elements: AnqpElements) {
        assert!(self.manager.match_one(ap).is_empty());
        let bssid = ap.bssid_address().unwrap();
        assert!(self.manager.on_fetch_result(bssid, elements));
    }
}
