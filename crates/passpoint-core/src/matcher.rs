//! Per-credential match predicates
//!
//! A matcher decides whether a profile's provider operates (Home) or is
//! federated with (Roaming) the network described by an ANQP snapshot. One
//! implementation is registered per credential variant.

use crate::profile::{CredentialType, Profile};
use passpoint_common::{AnqpElement, AnqpElementType, AnqpElements, MatchType, RoamingConsortium};
use std::sync::Arc;

/// Match predicate for one credential variant
pub trait CredentialMatcher: Send + Sync {
    fn match_profile(
        &self,
        profile: &Profile,
        elements: &AnqpElements,
        roaming_consortium: Option<&RoamingConsortium>,
    ) -> MatchType;
}

/// Matcher set, selected by credential type
#[derive(Clone)]
pub struct Matchers {
    user: Arc<dyn CredentialMatcher>,
    sim: Arc<dyn CredentialMatcher>,
    certificate: Arc<dyn CredentialMatcher>,
}

impl Matchers {
    pub fn new(
        user: Arc<dyn CredentialMatcher>,
        sim: Arc<dyn CredentialMatcher>,
        certificate: Arc<dyn CredentialMatcher>,
    ) -> Self {
        Self {
            user,
            sim,
            certificate,
        }
    }

    /// Use the same matcher for every credential type
    pub fn uniform(matcher: Arc<dyn CredentialMatcher>) -> Self {
        Self::new(matcher.clone(), matcher.clone(), matcher)
    }

    pub fn for_type(&self, credential_type: CredentialType) -> &dyn CredentialMatcher {
        match credential_type {
            CredentialType::User => self.user.as_ref(),
            CredentialType::Sim => self.sim.as_ref(),
            CredentialType::Certificate => self.certificate.as_ref(),
        }
    }
}

impl Default for Matchers {
    fn default() -> Self {
        Self::new(
            Arc::new(RealmMatcher),
            Arc::new(SimMatcher),
            Arc::new(RealmMatcher),
        )
    }
}

/// Matcher for user and certificate credentials
///
/// Home on a Domain Name hit, Roaming on a roaming consortium or NAI realm
/// hit.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealmMatcher;

impl CredentialMatcher for RealmMatcher {
    fn match_profile(
        &self,
        profile: &Profile,
        elements: &AnqpElements,
        roaming_consortium: Option<&RoamingConsortium>,
    ) -> MatchType {
        if domain_listed(elements, profile.fqdn()) {
            MatchType::Home
        } else if roaming_consortium_match(profile, elements, roaming_consortium)
            || realm_match(profile, elements)
        {
            MatchType::Roaming
        } else {
            MatchType::None
        }
    }
}

/// Matcher for SIM credentials
///
/// Additionally treats the IMSI-derived 3GPP domain as a home domain and a
/// 3GPP network PLMN hit as roaming.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimMatcher;

impl CredentialMatcher for SimMatcher {
    fn match_profile(
        &self,
        profile: &Profile,
        elements: &AnqpElements,
        roaming_consortium: Option<&RoamingConsortium>,
    ) -> MatchType {
        let imsi_prefix = profile
            .credential()
            .and_then(|c| c.sim.as_ref())
            .map(|sim| sim.imsi_prefix())
            .unwrap_or_default();

        let home = domain_listed(elements, profile.fqdn())
            || three_gpp_domain(imsi_prefix).is_some_and(|d| domain_listed(elements, &d));
        if home {
            return MatchType::Home;
        }
        if roaming_consortium_match(profile, elements, roaming_consortium)
            || realm_match(profile, elements)
            || plmn_match(elements, imsi_prefix)
        {
            return MatchType::Roaming;
        }
        MatchType::None
    }
}

fn strings(elements: &AnqpElements, element_type: AnqpElementType) -> &[String] {
    match elements.get(&element_type) {
        Some(
            AnqpElement::DomainName(v)
            | AnqpElement::NaiRealm(v)
            | AnqpElement::ThreeGppNetwork(v)
            | AnqpElement::VenueName(v)
            | AnqpElement::HsFriendlyName(v),
        ) => v.as_slice(),
        _ => &[],
    }
}

fn domain_listed(elements: &AnqpElements, fqdn: &str) -> bool {
    !fqdn.is_empty()
        && strings(elements, AnqpElementType::DomainName)
            .iter()
            .any(|d| d.eq_ignore_ascii_case(fqdn))
}

fn realm_match(profile: &Profile, elements: &AnqpElements) -> bool {
    let Some(realm) = profile.credential().map(|c| c.realm.as_str()) else {
        return false;
    };
    strings(elements, AnqpElementType::NaiRealm)
        .iter()
        .any(|r| r.eq_ignore_ascii_case(realm))
}

fn roaming_consortium_match(
    profile: &Profile,
    elements: &AnqpElements,
    roaming_consortium: Option<&RoamingConsortium>,
) -> bool {
    let Some(home_sp) = profile.home_sp() else {
        return false;
    };
    let anqp_ois: &[u64] = match elements.get(&AnqpElementType::RoamingConsortium) {
        Some(AnqpElement::RoamingConsortium(ois)) => ois.as_slice(),
        _ => &[],
    };
    let beacon_ois = roaming_consortium.map_or(&[][..], |rc| rc.ois.as_slice());

    home_sp
        .roaming_consortium_ois
        .iter()
        .any(|oi| anqp_ois.contains(oi) || beacon_ois.contains(oi))
}

fn plmn_match(elements: &AnqpElements, imsi_prefix: &str) -> bool {
    !imsi_prefix.is_empty()
        && strings(elements, AnqpElementType::ThreeGppNetwork)
            .iter()
            .any(|plmn| imsi_prefix.starts_with(plmn.as_str()) || plmn.starts_with(imsi_prefix))
}

/// `wlan.mnc<MNC>.mcc<MCC>.3gppnetwork.org` for an IMSI prefix of at least
/// five digits
///
/// Restored profiles are not re-validated, so anything but ASCII digits
/// yields no domain.
fn three_gpp_domain(imsi_prefix: &str) -> Option<String> {
    if imsi_prefix.len() < 5 || !imsi_prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (mcc, rest) = imsi_prefix.split_at(3);
    let mnc = if rest.len() >= 3 {
        rest[..3].to_string()
    } else {
        format!("0{rest}")
    };
    Some(format!("wlan.mnc{mnc}.mcc{mcc}.3gppnetwork.org"))
}
