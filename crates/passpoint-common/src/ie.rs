//! Beacon / probe-response information elements
//!
//! Only the two elements the manager needs to route a scan result are
//! decoded here:
//!
//! ```text
//! Hotspot 2.0 Indication (vendor specific, id 221)
//! +-----+-----+------------+-----------+---------------+------------------+
//! | OUI (50:6F:9A)  | type 0x10  | HS config | PPS MO id (2) | ANQP domain (2)  |
//! +-----+-----+------------+-----------+---------------+------------------+
//!                                          optional        optional
//!
//! Roaming Consortium (id 111)
//! +-----------+------------+---------+---------+---------+
//! | ANQP OIs  | OI lengths | OI #1   | OI #2   | OI #3   |
//! +-----------+------------+---------+---------+---------+
//! ```

use bytes::Buf;
use serde::{Deserialize, Serialize};

/// Element id of vendor specific elements
pub const EID_VENDOR_SPECIFIC: u8 = 221;
/// Element id of the Roaming Consortium element
pub const EID_ROAMING_CONSORTIUM: u8 = 111;

/// Wi-Fi Alliance OUI
pub const WFA_OUI: [u8; 3] = [0x50, 0x6F, 0x9A];
/// Vendor type of the Hotspot 2.0 indication
pub const HS20_INDICATION_TYPE: u8 = 0x10;

const HS_CONF_PPS_MO_ID_PRESENT: u8 = 0x02;
const HS_CONF_ANQP_DOMAIN_ID_PRESENT: u8 = 0x04;

/// Raw information element
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InformationElement {
    pub id: u8,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

impl InformationElement {
    pub fn new(id: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }
}

/// Errors raised while decoding an element
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IeError {
    #[error("element truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
}

/// Hotspot 2.0 release advertised by an access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Hs20Release {
    R1,
    R2,
    R3,
}

impl Hs20Release {
    const fn from_nibble(value: u8) -> Self {
        match value {
            0 => Self::R1,
            1 => Self::R2,
            _ => Self::R3,
        }
    }
}

/// Decoded Hotspot 2.0 indication element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hs20Indication {
    pub release: Hs20Release,
    pub pps_mo_id: Option<u16>,
    pub anqp_domain_id: Option<u16>,
}

impl Hs20Indication {
    /// Decode the body of a vendor element already known to carry the
    /// HS2.0 OUI and type (the four header bytes are skipped here)
    pub fn parse(data: &[u8]) -> Result<Self, IeError> {
        let mut buf = data;
        ensure(buf, 5)?;
        buf.advance(4);
        let conf = buf.get_u8();

        let pps_mo_id = if conf & HS_CONF_PPS_MO_ID_PRESENT != 0 {
            ensure(buf, 2)?;
            Some(buf.get_u16_le())
        } else {
            None
        };
        let anqp_domain_id = if conf & HS_CONF_ANQP_DOMAIN_ID_PRESENT != 0 {
            ensure(buf, 2)?;
            Some(buf.get_u16_le())
        } else {
            None
        };

        Ok(Self {
            release: Hs20Release::from_nibble(conf >> 4),
            pps_mo_id,
            anqp_domain_id,
        })
    }
}

/// Decoded Roaming Consortium element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoamingConsortium {
    /// Number of additional OIs only reachable through ANQP
    pub anqp_oi_count: u8,
    /// OIs carried in the beacon (at most three)
    pub ois: Vec<u64>,
}

impl RoamingConsortium {
    pub fn parse(data: &[u8]) -> Result<Self, IeError> {
        let mut buf = data;
        ensure(buf, 2)?;
        let anqp_oi_count = buf.get_u8();
        let lengths = buf.get_u8();
        let oi1_len = usize::from(lengths & 0x0F);
        let oi2_len = usize::from(lengths >> 4);

        let mut ois = Vec::with_capacity(3);
        for len in [oi1_len, oi2_len] {
            if len == 0 {
                continue;
            }
            ensure(buf, len)?;
            ois.push(read_oi(&mut buf, len));
        }
        if buf.has_remaining() {
            let len = buf.remaining();
            ois.push(read_oi(&mut buf, len));
        }

        Ok(Self { anqp_oi_count, ois })
    }
}

fn ensure(buf: &[u8], needed: usize) -> Result<(), IeError> {
    if buf.remaining() < needed {
        return Err(IeError::Truncated {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn read_oi(buf: &mut &[u8], len: usize) -> u64 {
    // OIs longer than eight bytes do not exist on air; keep the low bytes
    let mut value = 0u64;
    for _ in 0..len {
        value = (value << 8) | u64::from(buf.get_u8());
    }
    value
}

fn is_hs20_vendor_element(ie: &InformationElement) -> bool {
    ie.id == EID_VENDOR_SPECIFIC
        && ie.data.len() >= 4
        && ie.data[..3] == WFA_OUI
        && ie.data[3] == HS20_INDICATION_TYPE
}

/// Find and decode the Hotspot 2.0 indication
///
/// `Ok(None)` when no such element is present; an error when the element is
/// present but truncated.
pub fn find_hs20_indication(
    elements: &[InformationElement],
) -> Result<Option<Hs20Indication>, IeError> {
    elements
        .iter()
        .find(|ie| is_hs20_vendor_element(ie))
        .map(|ie| Hs20Indication::parse(&ie.data))
        .transpose()
}

/// Find and decode the Roaming Consortium element, ignoring malformed ones
pub fn find_roaming_consortium(elements: &[InformationElement]) -> Option<RoamingConsortium> {
    elements
        .iter()
        .find(|ie| ie.id == EID_ROAMING_CONSORTIUM)
        .and_then(|ie| RoamingConsortium::parse(&ie.data).ok())
}
