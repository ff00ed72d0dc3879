//! Profile telemetry
//!
//! The core only reports counter increments and profile snapshots; the sink
//! decides what to do with them. `AtomicTelemetry` keeps them in memory and
//! renders Prometheus text.

use crate::profile::CredentialType;
use passpoint_common::ProfileSource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters reported by the registry and the request tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    ProfileInstallAttempted,
    ProfileInstallSucceeded,
    ProfileUninstallAttempted,
    ProfileUninstallSucceeded,
    AnqpRequestIssued,
    AnqpResponseDropped,
}

impl Counter {
    pub const ALL: [Self; 6] = [
        Self::ProfileInstallAttempted,
        Self::ProfileInstallSucceeded,
        Self::ProfileUninstallAttempted,
        Self::ProfileUninstallSucceeded,
        Self::AnqpRequestIssued,
        Self::AnqpResponseDropped,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProfileInstallAttempted => "profile_install_attempted",
            Self::ProfileInstallSucceeded => "profile_install_succeeded",
            Self::ProfileUninstallAttempted => "profile_uninstall_attempted",
            Self::ProfileUninstallSucceeded => "profile_uninstall_succeeded",
            Self::AnqpRequestIssued => "anqp_request_issued",
            Self::AnqpResponseDropped => "anqp_response_dropped",
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

/// Per-profile entry of a metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub credential_type: CredentialType,
    pub source: ProfileSource,
    pub owner: String,
    pub has_ever_connected: bool,
    pub auto_join: bool,
}

/// Point-in-time view of the installed profiles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub installed_count: usize,
    pub connected_count: usize,
    pub profiles: BTreeMap<String, ProfileSummary>,
}

/// Receiver of telemetry
pub trait TelemetrySink: Send + Sync {
    fn increment(&self, counter: Counter);

    fn record_profiles(&self, _snapshot: &MetricsSnapshot) {}
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn increment(&self, _counter: Counter) {}
}

/// In-memory counters with a Prometheus text export
#[derive(Debug, Default)]
pub struct AtomicTelemetry {
    counters: [AtomicU64; Counter::ALL.len()],
    installed_profiles: AtomicU64,
    connected_profiles: AtomicU64,
}

impl AtomicTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.slot()].load(Ordering::Relaxed)
    }

    pub fn installed_profiles(&self) -> u64 {
        self.installed_profiles.load(Ordering::Relaxed)
    }

    pub fn connected_profiles(&self) -> u64 {
        self.connected_profiles.load(Ordering::Relaxed)
    }

    /// Export in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut output = String::with_capacity(1024);

        for counter in Counter::ALL {
            let name = format!("passpoint_{}_total", counter.as_str());
            let _ = writeln!(output, "# TYPE {name} counter");
            let _ = writeln!(output, "{name} {}", self.get(counter));
        }

        let _ = writeln!(
            output,
            "# HELP passpoint_installed_profiles Installed Passpoint profiles"
        );
        let _ = writeln!(output, "# TYPE passpoint_installed_profiles gauge");
        let _ = writeln!(
            output,
            "passpoint_installed_profiles {}",
            self.installed_profiles()
        );

        let _ = writeln!(
            output,
            "# HELP passpoint_connected_profiles Profiles that have ever connected"
        );
        let _ = writeln!(output, "# TYPE passpoint_connected_profiles gauge");
        let _ = writeln!(
            output,
            "passpoint_connected_profiles {}",
            self.connected_profiles()
        );

        output
    }
}

impl TelemetrySink for AtomicTelemetry {
    fn increment(&self, counter: Counter) {
        self.counters[counter.slot()].fetch_add(1, Ordering::Relaxed);
    }

    fn record_profiles(&self, snapshot: &MetricsSnapshot) {
        self.installed_profiles
            .store(snapshot.installed_count as u64, Ordering::Relaxed);
        self.connected_profiles
            .store(snapshot.connected_count as u64, Ordering::Relaxed);
    }
}
