//! Import of legacy enterprise network entries
//!
//! Older releases stored Passpoint networks as plain enterprise network
//! entries. The provider data is carried over into a `ProfileConfig`. The
//! entry's certificates and keys are already in the secure store under its
//! own aliases, so the imported profile references them and installs
//! nothing.

use crate::profile::{
    CERT_TYPE_X509V3, CertCredential, Credential, CredentialType, HomeSp, ProfileConfig,
    SimCredential, UserCredential, eap,
};
use passpoint_common::{AppIdentity, PasspointError, Result};
use serde::{Deserialize, Serialize};

/// EAP method of a legacy entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegacyEapMethod {
    Peap,
    Tls,
    Ttls,
    Pwd,
    Sim,
    Aka,
    AkaPrime,
}

/// Phase 2 (inner) method of a legacy entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegacyPhase2 {
    #[default]
    None,
    Pap,
    Mschap,
    Mschapv2,
    Gtc,
}

impl LegacyPhase2 {
    /// Non-EAP inner method name, for the methods a user credential allows
    const fn inner_method(self) -> Option<&'static str> {
        match self {
            Self::Pap => Some("PAP"),
            Self::Mschap => Some("MS-CHAP"),
            Self::Mschapv2 => Some("MS-CHAP-V2"),
            Self::None | Self::Gtc => None,
        }
    }
}

/// Enterprise section of a legacy entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyEnterpriseConfig {
    pub eap_method: LegacyEapMethod,
    #[serde(default)]
    pub phase2_method: LegacyPhase2,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub realm: String,
    /// IMSI (or IMSI prefix) of a SIM entry
    #[serde(default)]
    pub plmn: String,
    #[serde(default)]
    pub ca_certificate_alias: Option<String>,
    #[serde(default)]
    pub client_certificate_alias: Option<String>,
}

/// A legacy network entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyNetworkConfig {
    pub fqdn: String,
    #[serde(default)]
    pub provider_friendly_name: String,
    #[serde(default)]
    pub roaming_consortium_ois: Vec<u64>,
    #[serde(default)]
    pub creator_uid: u32,
    /// Empty when the creating package is unknown
    #[serde(default)]
    pub creator_package: String,
    pub enterprise: LegacyEnterpriseConfig,
}

impl LegacyNetworkConfig {
    pub fn creator(&self) -> AppIdentity {
        AppIdentity::new(self.creator_uid, self.creator_package.as_str())
    }

    /// Build the equivalent profile configuration
    pub fn to_profile_config(&self) -> Result<(ProfileConfig, CredentialType)> {
        if self.fqdn.is_empty() {
            return Err(PasspointError::validation("legacy entry without FQDN"));
        }
        let enterprise = &self.enterprise;
        let mut credential = Credential {
            realm: enterprise.realm.clone(),
            ..Credential::default()
        };

        let credential_type = match enterprise.eap_method {
            LegacyEapMethod::Ttls => {
                let inner = enterprise.phase2_method.inner_method().ok_or_else(|| {
                    PasspointError::validation(format!(
                        "unsupported phase 2 method {:?}",
                        enterprise.phase2_method
                    ))
                })?;
                credential.ca_certificate = Some(require_alias(
                    enterprise.ca_certificate_alias.as_ref(),
                    "CA certificate",
                )?);
                credential.user = Some(UserCredential {
                    username: enterprise.identity.clone(),
                    password: enterprise.password.clone(),
                    eap_type: eap::TTLS,
                    non_eap_inner_method: inner.to_string(),
                });
                CredentialType::User
            }
            LegacyEapMethod::Tls => {
                credential.ca_certificate = Some(require_alias(
                    enterprise.ca_certificate_alias.as_ref(),
                    "CA certificate",
                )?);
                let client = require_alias(
                    enterprise.client_certificate_alias.as_ref(),
                    "client certificate",
                )?;
                // Key and certificate share the client alias
                credential.client_private_key = Some(client.clone());
                credential.client_certificate = Some(client);
                credential.certificate = Some(CertCredential {
                    cert_type: CERT_TYPE_X509V3.to_string(),
                    cert_sha256_fingerprint: String::new(),
                });
                CredentialType::Certificate
            }
            LegacyEapMethod::Sim | LegacyEapMethod::Aka | LegacyEapMethod::AkaPrime => {
                if enterprise.plmn.is_empty() {
                    return Err(PasspointError::validation("SIM entry without PLMN"));
                }
                let eap_type = match enterprise.eap_method {
                    LegacyEapMethod::Aka => eap::AKA,
                    LegacyEapMethod::AkaPrime => eap::AKA_PRIME,
                    _ => eap::SIM,
                };
                credential.sim = Some(SimCredential {
                    imsi: enterprise.plmn.clone(),
                    eap_type,
                });
                CredentialType::Sim
            }
            LegacyEapMethod::Peap | LegacyEapMethod::Pwd => {
                return Err(PasspointError::validation(format!(
                    "unsupported EAP method {:?}",
                    enterprise.eap_method
                )));
            }
        };

        let config = ProfileConfig {
            home_sp: Some(HomeSp {
                fqdn: self.fqdn.clone(),
                friendly_name: self.provider_friendly_name.clone(),
                roaming_consortium_ois: self.roaming_consortium_ois.clone(),
            }),
            credential: Some(credential),
            ..ProfileConfig::default()
        };
        Ok((config, credential_type))
    }
}

fn require_alias(alias: Option<&String>, what: &str) -> Result<String> {
    match alias {
        Some(alias) if !alias.is_empty() => Ok(alias.clone()),
        _ => Err(PasspointError::validation(format!("missing {what} alias"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RC_OIS: [u64; 2] = [0x1234, 0x2345];

    fn legacy(eap_method: LegacyEapMethod) -> LegacyNetworkConfig {
        LegacyNetworkConfig {
            fqdn: "test.com".into(),
            provider_friendly_name: "Friendly Name".into(),
            roaming_consortium_ois: RC_OIS.to_vec(),
            creator_uid: 1234,
            creator_package: String::new(),
            enterprise: LegacyEnterpriseConfig {
                eap_method,
                phase2_method: LegacyPhase2::None,
                identity: String::new(),
                password: String::new(),
                realm: "realm.com".into(),
                plmn: String::new(),
                ca_certificate_alias: None,
                client_certificate_alias: None,
            },
        }
    }

    fn ttls() -> LegacyNetworkConfig {
        let mut config = legacy(LegacyEapMethod::Ttls);
        config.enterprise.identity = "username".into();
        config.enterprise.password = "password".into();
        config.enterprise.phase2_method = LegacyPhase2::Pap;
        config
    }

    fn tls() -> LegacyNetworkConfig {
        legacy(LegacyEapMethod::Tls)
    }

    #[test]
    fn test_user_credential() {
        let mut config = ttls();
        config.enterprise.ca_certificate_alias = Some("CaCert".into());

        let (profile, credential_type) = config.to_profile_config().unwrap();
        assert_eq!(credential_type, CredentialType::User);
        let home_sp = profile.home_sp.as_ref().unwrap();
        assert_eq!(home_sp.fqdn, "test.com");
        assert_eq!(home_sp.friendly_name, "Friendly Name");
        assert_eq!(home_sp.roaming_consortium_ois, RC_OIS.to_vec());

        let credential = profile.credential.as_ref().unwrap();
        assert_eq!(credential.realm, "realm.com");
        assert_eq!(credential.ca_certificate.as_deref(), Some("CaCert"));
        let user = credential.user.as_ref().unwrap();
        assert_eq!(user.username, "username");
        assert_eq!(user.password, "password");
        assert_eq!(user.eap_type, eap::TTLS);
        assert_eq!(user.non_eap_inner_method, "PAP");
        assert_eq!(profile.validate(), Ok(CredentialType::User));
    }

    #[test]
    fn test_user_credential_without_ca_alias() {
        let result = ttls().to_profile_config();
        assert!(matches!(result, Err(PasspointError::Validation(msg)) if msg.contains("CA")));
    }

    #[test]
    fn test_user_credential_with_unsupported_phase2() {
        let mut config = ttls();
        config.enterprise.ca_certificate_alias = Some("CaCert".into());
        config.enterprise.phase2_method = LegacyPhase2::Gtc;
        assert!(config.to_profile_config().is_err());
    }

    #[test]
    fn test_sim_credential() {
        let mut config = legacy(LegacyEapMethod::Sim);
        config.enterprise.plmn = "1234".into();

        let (profile, credential_type) = config.to_profile_config().unwrap();
        assert_eq!(credential_type, CredentialType::Sim);
        let sim = profile.credential.as_ref().unwrap().sim.as_ref().unwrap();
        assert_eq!(sim.imsi, "1234");
        assert_eq!(sim.eap_type, eap::SIM);

        config.enterprise.eap_method = LegacyEapMethod::AkaPrime;
        let (profile, _) = config.to_profile_config().unwrap();
        assert_eq!(
            profile.credential.unwrap().sim.unwrap().eap_type,
            eap::AKA_PRIME
        );

        config.enterprise.plmn.clear();
        assert!(config.to_profile_config().is_err());
    }

    #[test]
    fn test_cert_credential() {
        let mut config = tls();
        config.enterprise.ca_certificate_alias = Some("CaCert".into());
        config.enterprise.client_certificate_alias = Some("ClientCert".into());

        let (profile, credential_type) = config.to_profile_config().unwrap();
        assert_eq!(credential_type, CredentialType::Certificate);
        let credential = profile.credential.unwrap();
        assert_eq!(credential.ca_certificate.as_deref(), Some("CaCert"));
        assert_eq!(credential.client_certificate.as_deref(), Some("ClientCert"));
        assert_eq!(credential.client_private_key.as_deref(), Some("ClientCert"));
        assert_eq!(credential.certificate.unwrap().cert_type, CERT_TYPE_X509V3);
    }

    #[test]
    fn test_cert_credential_without_ca_alias() {
        let mut config = tls();
        config.enterprise.client_certificate_alias = Some("ClientCert".into());
        assert!(config.to_profile_config().is_err());
    }

    #[test]
    fn test_cert_credential_without_client_alias() {
        let mut config = tls();
        config.enterprise.ca_certificate_alias = Some("CaCert".into());
        assert!(config.to_profile_config().is_err());
    }

    #[test]
    fn test_unsupported_method_and_missing_fqdn() {
        assert!(legacy(LegacyEapMethod::Peap).to_profile_config().is_err());

        let mut config = legacy(LegacyEapMethod::Sim);
        config.enterprise.plmn = "1234".into();
        config.fqdn.clear();
        assert!(config.to_profile_config().is_err());
    }

    #[test]
    fn test_parse_from_json() {
        let config: LegacyNetworkConfig = serde_json::from_value(serde_json::json!({
            "fqdn": "test.com",
            "provider_friendly_name": "Friendly Name",
            "roaming_consortium_ois": [0x1234, 0x2345],
            "creator_uid": 1234,
            "enterprise": {
                "eap_method": "AKA_PRIME",
                "realm": "realm.com",
                "plmn": "310410*"
            }
        }))
        .unwrap();

        assert_eq!(config.enterprise.eap_method, LegacyEapMethod::AkaPrime);
        assert_eq!(config.enterprise.phase2_method, LegacyPhase2::None);
        assert_eq!(config.creator(), AppIdentity::new(1234, ""));
        assert_eq!(config.to_profile_config().unwrap().1, CredentialType::Sim);
    }
}
