//! In-flight ANQP request tracking
//!
//! At most one request is outstanding per BSSID. Every issued request also
//! arms an exponential hold-off for that BSSID so an unresponsive access
//! point is not queried on every scan; a successful response clears it.

use crate::clock::Clock;
use crate::collaborators::MetadataTransport;
use crate::telemetry::{Counter, TelemetrySink};
use passpoint_common::config::RequestConfig;
use passpoint_common::{IdentityKey, MacAddress};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A request waiting for its response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub bssid: MacAddress,
    pub key: IdentityKey,
    pub issued_at_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct HoldOff {
    retries: u32,
    expires_at_ms: u64,
}

/// Deduplicates ANQP requests and correlates responses
pub struct RequestTracker {
    pending: HashMap<MacAddress, PendingRequest>,
    holdoffs: HashMap<MacAddress, HoldOff>,
    config: RequestConfig,
    transport: Arc<dyn MetadataTransport>,
    telemetry: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
}

impl RequestTracker {
    pub fn new(
        config: RequestConfig,
        transport: Arc<dyn MetadataTransport>,
        telemetry: Arc<dyn TelemetrySink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pending: HashMap::new(),
            holdoffs: HashMap::new(),
            config,
            transport,
            telemetry,
            clock,
        }
    }

    /// Issue a request for `bssid` unless one is outstanding or held off
    ///
    /// Returns true when a request was handed to the transport.
    pub fn request_fetch(
        &mut self,
        bssid: MacAddress,
        key: IdentityKey,
        first_attempt: bool,
        home_realm_biased: bool,
    ) -> bool {
        if self.pending.contains_key(&bssid) {
            debug!("ANQP request for {} already pending", bssid);
            return false;
        }

        let now = self.clock.now_millis();
        if let Some(holdoff) = self.holdoffs.get(&bssid)
            && now < holdoff.expires_at_ms
        {
            debug!(
                "ANQP request for {} held off for another {} ms",
                bssid,
                holdoff.expires_at_ms - now
            );
            return false;
        }

        if !self
            .transport
            .issue_fetch(bssid, first_attempt, home_realm_biased)
        {
            debug!("Transport refused ANQP request for {}", bssid);
            return false;
        }

        self.arm_holdoff(bssid, now);
        self.telemetry.increment(Counter::AnqpRequestIssued);
        debug!("ANQP request issued for {} ({})", bssid, key);
        self.pending.insert(
            bssid,
            PendingRequest {
                bssid,
                key,
                issued_at_ms: now,
            },
        );
        true
    }

    /// Retire the request for `bssid`, returning the key it was issued for
    ///
    /// `None` means the response was not solicited by this tracker.
    pub fn on_fetch_completed(&mut self, bssid: MacAddress, success: bool) -> Option<IdentityKey> {
        let request = self.pending.remove(&bssid)?;
        if success {
            self.holdoffs.remove(&bssid);
        }
        Some(request.key)
    }

    /// Forget hold-offs that lapsed longer ago than the longest hold-off
    ///
    /// A BSSID still being retried keeps its record, so its hold-off keeps
    /// growing. Returns the number of records dropped.
    pub fn prune_holdoffs(&mut self) -> usize {
        let now = self.clock.now_millis();
        let grace = holdoff_ms(self.config.base_holdoff_ms, self.config.max_holdoff_retries);
        let before = self.holdoffs.len();
        let pending = &self.pending;
        self.holdoffs.retain(|bssid, holdoff| {
            pending.contains_key(bssid) || now < holdoff.expires_at_ms.saturating_add(grace)
        });
        before - self.holdoffs.len()
    }

    pub fn holdoff_count(&self) -> usize {
        self.holdoffs.len()
    }

    /// True when no hold-off has been armed for `bssid`
    pub fn is_first_attempt(&self, bssid: MacAddress) -> bool {
        !self.holdoffs.contains_key(&bssid)
    }

    pub fn pending(&self, bssid: MacAddress) -> Option<&PendingRequest> {
        self.pending.get(&bssid)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn arm_holdoff(&mut self, bssid: MacAddress, now: u64) {
        let max_retries = self.config.max_holdoff_retries;
        let base_ms = self.config.base_holdoff_ms;
        let holdoff = self
            .holdoffs
            .entry(bssid)
            .and_modify(|h| {
                if h.retries < max_retries {
                    h.retries += 1;
                }
            })
            .or_insert(HoldOff {
                retries: 0,
                expires_at_ms: 0,
            });
        holdoff.expires_at_ms = now.saturating_add(holdoff_ms(base_ms, holdoff.retries));
    }
}

/// `base * 2^retries`, saturating
fn holdoff_ms(base_ms: u64, retries: u32) -> u64 {
    let factor = 1u64.checked_shl(retries).unwrap_or(u64::MAX);
    base_ms.saturating_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::telemetry::AtomicTelemetry;
    use crate::testing::FakeTransport;

    const BSSID: u64 = 0x1122_3344_5566;

    struct Fixture {
        tracker: RequestTracker,
        transport: Arc<FakeTransport>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(FakeTransport::default());
        let clock = Arc::new(ManualClock::new(0));
        let tracker = RequestTracker::new(
            RequestConfig::default(),
            transport.clone(),
            Arc::new(AtomicTelemetry::new()),
            clock.clone(),
        );
        Fixture {
            tracker,
            transport,
            clock,
        }
    }

    fn bssid() -> MacAddress {
        MacAddress::from_u64(BSSID)
    }

    fn key() -> IdentityKey {
        IdentityKey::build("TestSSID", bssid(), 0, 0)
    }

    #[test]
    fn test_duplicate_request_is_suppressed() {
        let mut f = fixture();
        assert!(f.tracker.request_fetch(bssid(), key(), true, false));
        assert!(!f.tracker.request_fetch(bssid(), key(), true, false));
        assert_eq!(f.transport.issued(), vec![bssid()]);
        assert_eq!(f.tracker.pending_count(), 1);
    }

    #[test]
    fn test_completion_returns_key() {
        let mut f = fixture();
        f.tracker.request_fetch(bssid(), key(), true, false);
        assert_eq!(f.tracker.on_fetch_completed(bssid(), true), Some(key()));
        assert!(f.tracker.pending(bssid()).is_none());
    }

    #[test]
    fn test_unsolicited_completion_returns_none() {
        let mut f = fixture();
        assert_eq!(f.tracker.on_fetch_completed(bssid(), true), None);
        assert_eq!(f.tracker.on_fetch_completed(bssid(), false), None);
    }

    #[test]
    fn test_refused_request_records_nothing() {
        let mut f = fixture();
        f.transport.set_accept(false);
        assert!(!f.tracker.request_fetch(bssid(), key(), true, false));
        assert_eq!(f.tracker.pending_count(), 0);
        assert!(f.tracker.is_first_attempt(bssid()));
    }

    #[test]
    fn test_holdoff_after_failure() {
        let mut f = fixture();
        assert!(f.tracker.request_fetch(bssid(), key(), true, false));
        assert_eq!(f.tracker.on_fetch_completed(bssid(), false), Some(key()));
        assert!(!f.tracker.is_first_attempt(bssid()));

        // Still within the 10s base hold-off
        f.clock.advance(9_999);
        assert!(!f.tracker.request_fetch(bssid(), key(), false, false));

        f.clock.advance(1);
        assert!(f.tracker.request_fetch(bssid(), key(), false, false));
        f.tracker.on_fetch_completed(bssid(), false);

        // Second hold-off doubles
        f.clock.advance(19_999);
        assert!(!f.tracker.request_fetch(bssid(), key(), false, false));
        f.clock.advance(1);
        assert!(f.tracker.request_fetch(bssid(), key(), false, false));
        assert_eq!(f.transport.issued().len(), 3);
    }

    #[test]
    fn test_success_clears_holdoff() {
        let mut f = fixture();
        f.tracker.request_fetch(bssid(), key(), true, false);
        f.tracker.on_fetch_completed(bssid(), true);
        assert!(f.tracker.is_first_attempt(bssid()));
        assert!(f.tracker.request_fetch(bssid(), key(), true, false));
    }

    #[test]
    fn test_late_success_keeps_holdoff() {
        let mut f = fixture();
        f.tracker.request_fetch(bssid(), key(), true, false);
        f.tracker.on_fetch_completed(bssid(), false);

        assert_eq!(f.tracker.on_fetch_completed(bssid(), true), None);
        assert!(!f.tracker.is_first_attempt(bssid()));
        assert!(!f.tracker.request_fetch(bssid(), key(), false, false));
    }

    #[test]
    fn test_prune_drops_lapsed_holdoffs() {
        let mut f = fixture();
        for i in 0..1000u64 {
            let bssid = MacAddress::from_u64(BSSID + i);
            f.tracker.request_fetch(bssid, key(), true, false);
            f.tracker.on_fetch_completed(bssid, false);
        }
        assert_eq!(f.tracker.holdoff_count(), 1000);

        // Expired, but within the grace window of the longest hold-off
        f.clock.advance(20_000);
        assert_eq!(f.tracker.prune_holdoffs(), 0);

        f.clock.advance(10_000_000);
        assert_eq!(f.tracker.prune_holdoffs(), 1000);
        assert_eq!(f.tracker.holdoff_count(), 0);
        assert!(f.tracker.is_first_attempt(bssid()));
    }

    #[test]
    fn test_prune_keeps_pending_requests() {
        let mut f = fixture();
        f.tracker.request_fetch(bssid(), key(), true, false);
        f.clock.advance(10_000_000);
        assert_eq!(f.tracker.prune_holdoffs(), 0);
        assert_eq!(f.tracker.on_fetch_completed(bssid(), false), Some(key()));
        assert_eq!(f.tracker.prune_holdoffs(), 1);
    }
}
