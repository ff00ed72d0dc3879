//! Profile configuration and installed profiles
//!
//! `ProfileConfig` is what callers hand in; `Profile` is what the registry
//! keeps after a successful install. Every profile derives a
//! `NetworkDescriptor` that the downstream network-config store is keyed by.

use passpoint_common::{AppIdentity, PasspointError, ProfileSource, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// EAP method types (IANA)
pub mod eap {
    pub const TLS: u8 = 13;
    pub const SIM: u8 = 18;
    pub const TTLS: u8 = 21;
    pub const AKA: u8 = 23;
    pub const AKA_PRIME: u8 = 50;
}

/// Non-EAP inner methods accepted for a user credential
pub const USER_INNER_METHODS: [&str; 3] = ["PAP", "MS-CHAP", "MS-CHAP-V2"];

/// Certificate type accepted for a certificate credential
pub const CERT_TYPE_X509V3: &str = "x509v3";

const MAX_IMSI_LEN: usize = 15;
const SHA256_LEN: usize = 32;

/// Home service provider
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeSp {
    pub fqdn: String,
    pub friendly_name: String,
    #[serde(default)]
    pub roaming_consortium_ois: Vec<u64>,
}

/// Username / password credential
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredential {
    pub username: String,
    pub password: String,
    #[serde(default = "default_user_eap_type")]
    pub eap_type: u8,
    pub non_eap_inner_method: String,
}

const fn default_user_eap_type() -> u8 {
    eap::TTLS
}

/// SIM credential
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimCredential {
    /// Full IMSI or a prefix terminated by `*`
    pub imsi: String,
    pub eap_type: u8,
}

impl SimCredential {
    /// IMSI without the trailing wildcard
    pub fn imsi_prefix(&self) -> &str {
        self.imsi.strip_suffix('*').unwrap_or(&self.imsi)
    }

    /// The IMSI when it is not masked with a wildcard
    pub fn full_imsi(&self) -> Option<&str> {
        if self.imsi.ends_with('*') {
            None
        } else {
            Some(&self.imsi)
        }
    }
}

/// Client certificate credential
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertCredential {
    pub cert_type: String,
    /// Hex encoded SHA-256 of the client certificate
    pub cert_sha256_fingerprint: String,
}

/// Credential section of a profile
///
/// Certificate and key fields are references (aliases) into the secure
/// credential store, not the material itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub realm: String,
    #[serde(default)]
    pub ca_certificate: Option<String>,
    #[serde(default)]
    pub client_certificate: Option<String>,
    #[serde(default)]
    pub client_private_key: Option<String>,
    #[serde(default)]
    pub user: Option<UserCredential>,
    #[serde(default)]
    pub sim: Option<SimCredential>,
    #[serde(default)]
    pub certificate: Option<CertCredential>,
}

/// Credential variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CredentialType {
    User,
    Sim,
    Certificate,
}

impl CredentialType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Sim => "sim",
            Self::Certificate => "certificate",
        }
    }
}

/// Profile configuration supplied by a caller
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub home_sp: Option<HomeSp>,
    #[serde(default)]
    pub credential: Option<Credential>,
    /// Non-zero for profiles delivered by subscription remediation
    #[serde(default)]
    pub update_identifier: u32,
    /// Subscription expiration (milliseconds since the Unix epoch)
    #[serde(default)]
    pub subscription_expiration_ms: Option<u64>,
    #[serde(default)]
    pub service_friendly_names: BTreeMap<String, String>,
    #[serde(default)]
    pub carrier_id: Option<i32>,
}

impl ProfileConfig {
    /// Home domain, empty when no home SP is set
    pub fn fqdn(&self) -> &str {
        self.home_sp.as_ref().map_or("", |sp| sp.fqdn.as_str())
    }

    /// CA certificate reference, if any
    pub fn ca_certificate(&self) -> Option<&str> {
        self.credential
            .as_ref()
            .and_then(|c| c.ca_certificate.as_deref())
    }

    /// Structural validation
    ///
    /// Returns the credential variant of a complete configuration.
    pub fn validate(&self) -> Result<CredentialType> {
        let home_sp = self
            .home_sp
            .as_ref()
            .ok_or_else(|| PasspointError::validation("missing home SP"))?;
        if home_sp.fqdn.is_empty() {
            return Err(PasspointError::validation("missing home SP FQDN"));
        }
        if home_sp.friendly_name.is_empty() {
            return Err(PasspointError::validation("missing home SP friendly name"));
        }

        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| PasspointError::validation("missing credential"))?;
        if credential.realm.is_empty() {
            return Err(PasspointError::validation("missing credential realm"));
        }

        match (&credential.user, &credential.sim, &credential.certificate) {
            (Some(user), None, None) => {
                validate_user(user, credential, self.update_identifier)?;
                Ok(CredentialType::User)
            }
            (None, Some(sim), None) => {
                validate_sim(sim)?;
                Ok(CredentialType::Sim)
            }
            (None, None, Some(cert)) => {
                validate_cert(cert, credential)?;
                Ok(CredentialType::Certificate)
            }
            (None, None, None) => Err(PasspointError::validation("no credential variant set")),
            _ => Err(PasspointError::validation(
                "more than one credential variant set",
            )),
        }
    }
}

fn validate_user(user: &UserCredential, credential: &Credential, update_identifier: u32) -> Result<()> {
    if user.username.is_empty() {
        return Err(PasspointError::validation("missing username"));
    }
    if user.password.is_empty() {
        return Err(PasspointError::validation("missing password"));
    }
    if user.eap_type != eap::TTLS {
        return Err(PasspointError::validation(format!(
            "EAP method {} not allowed for a user credential",
            user.eap_type
        )));
    }
    if !USER_INNER_METHODS.contains(&user.non_eap_inner_method.as_str()) {
        return Err(PasspointError::validation(format!(
            "unsupported inner method {:?}",
            user.non_eap_inner_method
        )));
    }
    if update_identifier == 0 && credential.ca_certificate.is_none() {
        return Err(PasspointError::validation("missing CA certificate"));
    }
    Ok(())
}

fn validate_sim(sim: &SimCredential) -> Result<()> {
    if !is_valid_imsi(&sim.imsi) {
        return Err(PasspointError::validation(format!(
            "invalid IMSI {:?}",
            sim.imsi
        )));
    }
    if ![eap::SIM, eap::AKA, eap::AKA_PRIME].contains(&sim.eap_type) {
        return Err(PasspointError::validation(format!(
            "EAP method {} not allowed for a SIM credential",
            sim.eap_type
        )));
    }
    Ok(())
}

fn validate_cert(cert: &CertCredential, credential: &Credential) -> Result<()> {
    if cert.cert_type != CERT_TYPE_X509V3 {
        return Err(PasspointError::validation(format!(
            "unsupported certificate type {:?}",
            cert.cert_type
        )));
    }
    let fingerprint = hex::decode(&cert.cert_sha256_fingerprint)
        .map_err(|_| PasspointError::validation("fingerprint is not hex"))?;
    if fingerprint.len() != SHA256_LEN {
        return Err(PasspointError::validation(format!(
            "fingerprint must be {SHA256_LEN} bytes, got {}",
            fingerprint.len()
        )));
    }
    if credential.ca_certificate.is_none() {
        return Err(PasspointError::validation("missing CA certificate"));
    }
    if credential.client_certificate.is_none() {
        return Err(PasspointError::validation("missing client certificate"));
    }
    if credential.client_private_key.is_none() {
        return Err(PasspointError::validation("missing client private key"));
    }
    Ok(())
}

/// Digits, optionally ending in a single `*` preceded by at least one digit
fn is_valid_imsi(imsi: &str) -> bool {
    if imsi.is_empty() || imsi.len() > MAX_IMSI_LEN {
        return false;
    }
    let digits = imsi.strip_suffix('*').unwrap_or(imsi);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// An installed profile
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub config: ProfileConfig,
    pub index: u64,
    pub owner: AppIdentity,
    pub source: ProfileSource,
    pub credential_type: CredentialType,
    pub auto_join: bool,
    pub has_ever_connected: bool,
}

impl Profile {
    pub const fn new(
        config: ProfileConfig,
        index: u64,
        owner: AppIdentity,
        source: ProfileSource,
        credential_type: CredentialType,
    ) -> Self {
        Self {
            config,
            index,
            owner,
            source,
            credential_type,
            auto_join: true,
            has_ever_connected: false,
        }
    }

    pub fn fqdn(&self) -> &str {
        self.config.fqdn()
    }

    pub fn home_sp(&self) -> Option<&HomeSp> {
        self.config.home_sp.as_ref()
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.config.credential.as_ref()
    }

    pub fn is_saved(&self) -> bool {
        self.source == ProfileSource::Saved
    }

    /// Alias suffix under which this profile's certificates and keys are
    /// kept in the secure store
    pub fn credential_alias(&self) -> String {
        format!("HS2_{}", self.index)
    }

    /// A subscription is expired once `now` reaches the expiration time
    pub fn is_subscription_expired(&self, now_ms: u64) -> bool {
        self.config
            .subscription_expiration_ms
            .is_some_and(|expiration| now_ms >= expiration)
    }

    /// Network descriptor handed to the network-config store
    pub fn descriptor(&self) -> NetworkDescriptor {
        let home_sp = self.home_sp().cloned().unwrap_or_default();
        let credential = self.credential();
        let eap_method = credential.map_or(0, |c| {
            c.user
                .as_ref()
                .map(|u| u.eap_type)
                .or_else(|| c.sim.as_ref().map(|s| s.eap_type))
                .unwrap_or(eap::TLS)
        });

        NetworkDescriptor {
            key: NetworkDescriptor::key_for(&home_sp.fqdn, self.source),
            fqdn: home_sp.fqdn,
            friendly_name: home_sp.friendly_name,
            realm: credential.map(|c| c.realm.clone()).unwrap_or_default(),
            roaming_consortium_ois: home_sp.roaming_consortium_ois,
            credential_type: self.credential_type,
            eap_method,
            carrier_id: self.config.carrier_id,
            creator: self.owner.clone(),
            source: self.source,
        }
    }
}

/// Downstream network configuration derived from a profile
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub key: String,
    pub fqdn: String,
    pub friendly_name: String,
    pub realm: String,
    pub roaming_consortium_ois: Vec<u64>,
    pub credential_type: CredentialType,
    pub eap_method: u8,
    pub carrier_id: Option<i32>,
    pub creator: AppIdentity,
    pub source: ProfileSource,
}

impl NetworkDescriptor {
    /// Store key of the descriptor for a home domain
    pub fn key_for(fqdn: &str, source: ProfileSource) -> String {
        match source {
            ProfileSource::Saved => format!("\"{fqdn}\"WPA_EAP"),
            ProfileSource::Suggested => format!("\"{fqdn}\"WPA_EAP:suggestion"),
        }
    }
}

/// Registry contents as written to the persisted store
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub profiles: Vec<Profile>,
    pub next_index: u64,
}
