//! Core type definitions
//!
//! Identifiers shared by the cache, the request tracker and the profile
//! registry: physical addresses, ANQP identity keys, caller identities and
//! the match classification enums. Scan records and decoded ANQP elements
//! live here too so front ends can deserialize them directly.

use crate::ie::{self, Hs20Indication, InformationElement, RoamingConsortium};
use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 48-bit IEEE MAC address (BSSID)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, From, Into, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress(u64);

impl MacAddress {
    const MASK: u64 = 0xFFFF_FFFF_FFFF;

    /// Create from the low 48 bits of a `u64`
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value & Self::MASK)
    }

    /// Get the address as a `u64`
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Get the six address octets, most significant first
    #[must_use]
    pub fn octets(&self) -> [u8; 6] {
        let bytes = self.0.to_be_bytes();
        [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
    }
}

impl FromStr for MacAddress {
    type Err = MacAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(MacAddressError::WrongLength(parts.len()));
        }

        let mut value = 0u64;
        for part in parts {
            if part.len() != 2 {
                return Err(MacAddressError::InvalidOctet(part.to_string()));
            }
            let mut octet = [0u8; 1];
            hex::decode_to_slice(part, &mut octet)
                .map_err(|_| MacAddressError::InvalidOctet(part.to_string()))?;
            value = (value << 8) | u64::from(octet[0]);
        }
        Ok(Self(value))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = MacAddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octets = self.octets();
        let hex: Vec<String> = octets.iter().map(|o| hex::encode([*o])).collect();
        write!(f, "{}", hex.join(":"))
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

/// Errors that can occur when parsing a MAC address
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacAddressError {
    #[error("expected 6 octets, found {0}")]
    WrongLength(usize),
    #[error("invalid octet: {0:?}")]
    InvalidOctet(String),
}

/// Key under which ANQP metadata is cached
///
/// Access points in the same HESSID (or advertising the same non-zero ANQP
/// domain within an SSID) share one key and therefore one cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub ssid: Option<String>,
    pub bssid: u64,
    pub hessid: u64,
    pub anqp_domain_id: u16,
}

impl IdentityKey {
    /// Build a normalized key
    #[must_use]
    pub fn build(ssid: &str, bssid: MacAddress, hessid: u64, anqp_domain_id: u16) -> Self {
        if hessid != 0 {
            return Self {
                ssid: None,
                bssid: 0,
                hessid,
                anqp_domain_id,
            };
        }
        if anqp_domain_id != 0 {
            return Self {
                ssid: Some(ssid.to_string()),
                bssid: 0,
                hessid: 0,
                anqp_domain_id,
            };
        }
        Self {
            ssid: Some(ssid.to_string()),
            bssid: bssid.as_u64(),
            hessid: 0,
            anqp_domain_id: 0,
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{:x}:{}",
            self.ssid.as_deref().unwrap_or("<any>"),
            MacAddress::from_u64(self.bssid),
            self.hessid,
            self.anqp_domain_id
        )
    }
}

/// Identity of the application calling into the manager
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{package}({uid})")]
pub struct AppIdentity {
    pub uid: u32,
    pub package: String,
}

impl AppIdentity {
    pub fn new(uid: u32, package: impl Into<String>) -> Self {
        Self {
            uid,
            package: package.into(),
        }
    }
}

/// Where a profile came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfileSource {
    /// Installed by the user (or on the user's behalf)
    #[default]
    Saved,
    /// Suggested by an application
    Suggested,
}

impl ProfileSource {
    #[must_use]
    pub const fn from_suggestion(is_suggestion: bool) -> Self {
        if is_suggestion {
            Self::Suggested
        } else {
            Self::Saved
        }
    }
}

/// Outcome of matching a profile against an access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    Home,
    Roaming,
    None,
}

/// Classification of a matched access point for grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NetworkClass {
    HomeNetwork,
    RoamingNetwork,
}

impl NetworkClass {
    /// Map a match type to a network class (`None` has no class)
    #[must_use]
    pub const fn from_match(match_type: MatchType) -> Option<Self> {
        match match_type {
            MatchType::Home => Some(Self::HomeNetwork),
            MatchType::Roaming => Some(Self::RoamingNetwork),
            MatchType::None => None,
        }
    }
}

/// An access point observed in a scan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub ssid: String,
    /// BSSID as reported by the scanner; may be missing or malformed
    #[serde(default)]
    pub bssid: Option<String>,
    #[serde(default)]
    pub hessid: u64,
    /// ANQP domain id when the scanner already extracted it
    #[serde(default)]
    pub anqp_domain_id: Option<u16>,
    /// Passpoint (Hotspot 2.0) indicator
    #[serde(default)]
    pub passpoint: bool,
    #[serde(default)]
    pub information_elements: Vec<InformationElement>,
}

impl AccessPoint {
    pub fn new(ssid: impl Into<String>, bssid: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            bssid: Some(bssid.into()),
            hessid: 0,
            anqp_domain_id: None,
            passpoint: true,
            information_elements: Vec::new(),
        }
    }

    /// Parse the BSSID
    pub fn bssid_address(&self) -> Option<MacAddress> {
        self.bssid.as_deref().and_then(|b| b.parse().ok())
    }

    /// Hotspot 2.0 indication element, if advertised
    pub fn hs20_indication(&self) -> Result<Option<Hs20Indication>, ie::IeError> {
        ie::find_hs20_indication(&self.information_elements)
    }

    /// Roaming Consortium element, if advertised and well formed
    pub fn roaming_consortium(&self) -> Option<RoamingConsortium> {
        ie::find_roaming_consortium(&self.information_elements)
    }
}

/// ANQP element types understood by the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AnqpElementType {
    VenueName,
    RoamingConsortium,
    NaiRealm,
    ThreeGppNetwork,
    DomainName,
    HsFriendlyName,
}

/// A decoded ANQP element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AnqpElement {
    VenueName(Vec<String>),
    /// Roaming consortium OIs
    RoamingConsortium(Vec<u64>),
    /// NAI realms
    NaiRealm(Vec<String>),
    /// PLMNs as concatenated MCC+MNC digits
    ThreeGppNetwork(Vec<String>),
    DomainName(Vec<String>),
    HsFriendlyName(Vec<String>),
}

impl AnqpElement {
    #[must_use]
    pub const fn element_type(&self) -> AnqpElementType {
        match self {
            Self::VenueName(_) => AnqpElementType::VenueName,
            Self::RoamingConsortium(_) => AnqpElementType::RoamingConsortium,
            Self::NaiRealm(_) => AnqpElementType::NaiRealm,
            Self::ThreeGppNetwork(_) => AnqpElementType::ThreeGppNetwork,
            Self::DomainName(_) => AnqpElementType::DomainName,
            Self::HsFriendlyName(_) => AnqpElementType::HsFriendlyName,
        }
    }
}

/// Decoded ANQP elements keyed by type
pub type AnqpElements = BTreeMap<AnqpElementType, AnqpElement>;

/// Collect a list of elements into a map (later duplicates win)
pub fn elements_from_list(list: impl IntoIterator<Item = AnqpElement>) -> AnqpElements {
    list.into_iter().map(|e| (e.element_type(), e)).collect()
}
