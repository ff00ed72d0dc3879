//! Passpoint CLI - Profile administration
//!
//! Drives the profile manager against a JSON state file. Platform services
//! (keystore, SIM, radio) are replaced by the local stand-ins in `local`.

mod local;
mod store;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use local::{
    CannedResponse, CannedTransport, LoggingCredentialStore, ReferenceCaVerifier,
    StaticAuthorization, StaticCarrierResolver, StaticConnection,
};
use passpoint_common::{AccessPoint, Config, NetworkClass};
use passpoint_core::{
    AtomicTelemetry, Collaborators, EventReceiver, LegacyNetworkConfig, PasspointManager,
    ProfileConfig, SystemClock,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::JsonFileStore;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "passpoint-cli")]
#[command(about = "Passpoint profile manager CLI")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "passpoint.toml")]
    config: String,

    /// State file (overrides the configuration file)
    #[arg(long, env = "PASSPOINT_STATE")]
    state: Option<PathBuf>,

    /// Active SIM as IMSI=CARRIER_ID (repeatable)
    #[arg(long = "carrier")]
    carriers: Vec<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install or replace a profile
    Add {
        /// Profile configuration (JSON)
        #[arg(long)]
        profile: PathBuf,
        /// Caller uid
        #[arg(long)]
        uid: u32,
        /// Caller package name
        #[arg(long)]
        package: String,
        /// Install as an app suggestion
        #[arg(long)]
        suggestion: bool,
    },
    /// Import a legacy enterprise network entry as a profile
    ImportLegacy {
        /// Legacy network entry (JSON)
        #[arg(long)]
        network: PathBuf,
    },
    /// Remove a profile
    Remove {
        /// Home domain of the profile
        #[arg(long)]
        fqdn: String,
        /// Caller uid
        #[arg(long)]
        uid: u32,
        #[arg(long)]
        privileged: bool,
    },
    /// List Saved profiles
    List {
        /// Caller uid
        #[arg(long)]
        uid: u32,
        #[arg(long)]
        privileged: bool,
    },
    /// Match scanned access points against the installed profiles
    Match {
        /// Scan results (JSON list of access points)
        #[arg(long)]
        scan: PathBuf,
        /// Canned ANQP responses (JSON)
        #[arg(long)]
        anqp: Option<PathBuf>,
    },
    /// Revoke an application's Wi-Fi authorization
    Revoke {
        #[arg(long)]
        package: String,
        /// Home domain currently connected to
        #[arg(long)]
        connected: Option<String>,
    },
    /// Record a connection to a profile's network
    Connected {
        #[arg(long)]
        fqdn: String,
    },
    /// Enable or disable auto-join for a profile
    AutoJoin {
        #[arg(long)]
        fqdn: String,
        #[arg(long)]
        disable: bool,
    },
    /// Show profile metrics
    Metrics,
}

/// Collaborator inputs that depend on the command
#[derive(Default)]
struct Setup {
    anqp: Vec<CannedResponse>,
    revoked: Vec<String>,
    connected: Option<String>,
}

struct Session {
    manager: PasspointManager,
    events: EventReceiver,
    telemetry: Arc<AtomicTelemetry>,
    connection: Arc<StaticConnection>,
}

impl Session {
    fn open(config: &Config, carriers: &[String], setup: Setup) -> Result<Self> {
        let store = Arc::new(JsonFileStore::new(&config.store.path));
        let state = store
            .load()
            .with_context(|| format!("reading {}", store.path().display()))?;

        let (sender, events) = PasspointManager::event_channel();
        let telemetry = Arc::new(AtomicTelemetry::new());
        let connection = Arc::new(StaticConnection::new(setup.connected));
        let collaborators = Collaborators {
            transport: Arc::new(CannedTransport::new(setup.anqp, sender)),
            credential_store: Arc::new(LoggingCredentialStore),
            ca_verifier: Arc::new(ReferenceCaVerifier),
            config_store: store,
            carrier_resolver: Arc::new(StaticCarrierResolver::parse(carriers)?),
            authorization: Arc::new(StaticAuthorization::revoking(setup.revoked)),
            connection: connection.clone(),
            telemetry: telemetry.clone(),
            clock: Arc::new(SystemClock),
        };

        let manager = PasspointManager::new(config, &collaborators);
        manager.restore(state);
        Ok(Self {
            manager,
            events,
            telemetry,
            connection,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

fn label(ap: &AccessPoint) -> String {
    format!("{} ({})", ap.ssid, ap.bssid.as_deref().unwrap_or("?"))
}

/// Run one command and return its output
fn execute(command: Commands, config: &Config, carriers: &[String]) -> Result<String> {
    match command {
        Commands::Add {
            profile,
            uid,
            package,
            suggestion,
        } => {
            let profile: ProfileConfig = read_json(&profile)?;
            let fqdn = profile.fqdn().to_string();
            let session = Session::open(config, carriers, Setup::default())?;
            session
                .manager
                .add_or_update_profile(Some(profile), uid, &package, suggestion)?;
            Ok(format!(
                "Installed {fqdn} (next index {})",
                session.manager.profile_index()
            ))
        }
        Commands::ImportLegacy { network } => {
            let legacy: LegacyNetworkConfig = read_json(&network)?;
            let session = Session::open(config, carriers, Setup::default())?;
            session.manager.add_legacy_config(&legacy)?;
            Ok(format!(
                "Imported {} (next index {})",
                legacy.fqdn,
                session.manager.profile_index()
            ))
        }
        Commands::Remove {
            fqdn,
            uid,
            privileged,
        } => {
            let session = Session::open(config, carriers, Setup::default())?;
            session.manager.remove_profile(uid, privileged, &fqdn)?;
            Ok(format!("Removed {fqdn}"))
        }
        Commands::List { uid, privileged } => {
            let session = Session::open(config, carriers, Setup::default())?;
            let profiles = session.manager.list_profiles(uid, privileged);
            Ok(serde_json::to_string_pretty(&profiles)?)
        }
        Commands::Match { scan, anqp } => {
            let aps: Vec<AccessPoint> = read_json(&scan)?;
            let anqp = match anqp {
                Some(path) => read_json(&path)?,
                None => Vec::new(),
            };
            let mut session = Session::open(
                config,
                carriers,
                Setup {
                    anqp,
                    ..Setup::default()
                },
            )?;

            // First pass issues queries for cache misses
            session.manager.match_all(&aps);
            let handled = session.manager.drain_events(&mut session.events);
            info!("Applied {} ANQP responses", handled);
            let groups = session.manager.match_all(&aps);

            let summary: BTreeMap<String, BTreeMap<NetworkClass, Vec<String>>> = groups
                .into_iter()
                .map(|(fqdn, classes)| {
                    let classes = classes
                        .into_iter()
                        .map(|(class, aps)| (class, aps.iter().map(label).collect()))
                        .collect();
                    (fqdn, classes)
                })
                .collect();
            Ok(serde_json::to_string_pretty(&summary)?)
        }
        Commands::Revoke { package, connected } => {
            let session = Session::open(
                config,
                carriers,
                Setup {
                    revoked: vec![package.clone()],
                    connected,
                    ..Setup::default()
                },
            )?;
            let removed = session.manager.on_authorization_changed(&package);
            let mut output = format!("Removed {removed} profiles owned by {package}");
            if session.connection.was_disconnected() {
                output.push_str("; disconnected");
            }
            Ok(output)
        }
        Commands::Connected { fqdn } => {
            let session = Session::open(config, carriers, Setup::default())?;
            if session.manager.on_network_connected(&fqdn) {
                Ok(format!("{fqdn} marked as connected"))
            } else {
                Ok(format!("{fqdn} unchanged"))
            }
        }
        Commands::AutoJoin { fqdn, disable } => {
            let session = Session::open(config, carriers, Setup::default())?;
            if !session.manager.enable_auto_join(&fqdn, !disable) {
                anyhow::bail!("no profile for {fqdn}");
            }
            Ok(format!(
                "Auto-join {} for {fqdn}",
                if disable { "disabled" } else { "enabled" }
            ))
        }
        Commands::Metrics => {
            let session = Session::open(config, carriers, Setup::default())?;
            let snapshot = session.manager.publish_metrics();
            Ok(format!(
                "{}\n{}",
                serde_json::to_string_pretty(&snapshot)?,
                session.telemetry.export_prometheus()
            ))
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load config file if it exists
    let mut config: Config = if Path::new(&args.config).exists() {
        let config_str = std::fs::read_to_string(&args.config)?;
        toml::from_str(&config_str).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse config file: {e}");
            Config::default()
        })
    } else {
        Config::default()
    };

    // CLI takes precedence
    if let Some(state) = args.state {
        config.store.path = state;
    }
    let log_level = if args.log_level == "info" {
        config.logging.level.clone()
    } else {
        args.log_level
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("State file: {}", config.store.path.display());
    match execute(args.command, &config, &args.carriers) {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            warn!("Command failed: {:#}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passpoint_core::PersistedState;
    use tempfile::TempDir;

    const PROFILE: &str = r#"{
        "home_sp": {"fqdn": "test1.test.com", "friendly_name": "Test"},
        "credential": {
            "realm": "test.com",
            "ca_certificate": "ca",
            "user": {"username": "user", "password": "pass", "non_eap_inner_method": "MS-CHAP-V2"}
        }
    }"#;
    const SCAN: &str = r#"[{"ssid": "TestSSID", "bssid": "11:22:33:44:55:66", "passpoint": true}]"#;
    const ANQP: &str = r#"[{
        "bssid": "11:22:33:44:55:66",
        "elements": [{"type": "DomainName", "value": ["test1.test.com"]}]
    }]"#;

    fn setup() -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.path = dir.path().join("state.json");
        (dir, config)
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn add(dir: &TempDir, config: &Config) -> String {
        let profile = write(dir, "profile.json", PROFILE);
        execute(
            Commands::Add {
                profile,
                uid: 1234,
                package: "com.android.test".into(),
                suggestion: false,
            },
            config,
            &[],
        )
        .unwrap()
    }

    fn list(config: &Config) -> Vec<ProfileConfig> {
        let output = execute(
            Commands::List {
                uid: 1234,
                privileged: true,
            },
            config,
            &[],
        )
        .unwrap();
        serde_json::from_str(&output).unwrap()
    }

    #[test]
    fn test_add_then_list() {
        let (dir, config) = setup();
        assert_eq!(add(&dir, &config), "Installed test1.test.com (next index 1)");

        let profiles = list(&config);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].fqdn(), "test1.test.com");

        let state: PersistedState =
            serde_json::from_str(&std::fs::read_to_string(&config.store.path).unwrap()).unwrap();
        assert_eq!(state.next_index, 1);
    }

    #[test]
    fn test_index_survives_restart() {
        let (dir, config) = setup();
        add(&dir, &config);
        assert_eq!(add(&dir, &config), "Installed test1.test.com (next index 2)");
    }

    #[test]
    fn test_remove() {
        let (dir, config) = setup();
        add(&dir, &config);

        let denied = execute(
            Commands::Remove {
                fqdn: "test1.test.com".into(),
                uid: 1,
                privileged: false,
            },
            &config,
            &[],
        );
        assert!(denied.is_err());

        execute(
            Commands::Remove {
                fqdn: "test1.test.com".into(),
                uid: 1234,
                privileged: false,
            },
            &config,
            &[],
        )
        .unwrap();
        assert!(list(&config).is_empty());
    }

    #[test]
    fn test_match_with_canned_anqp() {
        let (dir, config) = setup();
        add(&dir, &config);
        let scan = write(&dir, "scan.json", SCAN);
        let anqp = write(&dir, "anqp.json", ANQP);

        let output = execute(
            Commands::Match {
                scan,
                anqp: Some(anqp),
            },
            &config,
            &[],
        )
        .unwrap();
        let summary: BTreeMap<String, BTreeMap<NetworkClass, Vec<String>>> =
            serde_json::from_str(&output).unwrap();
        assert_eq!(
            summary["test1.test.com"][&NetworkClass::HomeNetwork],
            vec!["TestSSID (11:22:33:44:55:66)".to_string()]
        );
    }

    #[test]
    fn test_match_without_anqp_is_empty() {
        let (dir, config) = setup();
        add(&dir, &config);
        let scan = write(&dir, "scan.json", SCAN);

        let output = execute(Commands::Match { scan, anqp: None }, &config, &[]).unwrap();
        assert_eq!(output, "{}");
    }

    #[test]
    fn test_revoke_while_connected() {
        let (dir, config) = setup();
        add(&dir, &config);

        let output = execute(
            Commands::Revoke {
                package: "com.android.test".into(),
                connected: Some("test1.test.com".into()),
            },
            &config,
            &[],
        )
        .unwrap();
        assert_eq!(
            output,
            "Removed 1 profiles owned by com.android.test; disconnected"
        );
        assert!(list(&config).is_empty());
    }

    #[test]
    fn test_metrics_after_connect() {
        let (dir, config) = setup();
        add(&dir, &config);
        execute(
            Commands::Connected {
                fqdn: "test1.test.com".into(),
            },
            &config,
            &[],
        )
        .unwrap();

        let output = execute(Commands::Metrics, &config, &[]).unwrap();
        assert!(output.contains("\"installed_count\": 1"));
        assert!(output.contains("passpoint_connected_profiles 1"));
    }

    #[test]
    fn test_import_legacy() {
        let (dir, config) = setup();
        let network = write(
            &dir,
            "legacy.json",
            r#"{
                "fqdn": "test.com",
                "provider_friendly_name": "Friendly Name",
                "creator_uid": 1234,
                "enterprise": {"eap_method": "SIM", "realm": "realm.com", "plmn": "1234"}
            }"#,
        );

        let output = execute(Commands::ImportLegacy { network }, &config, &[]).unwrap();
        assert_eq!(output, "Imported test.com (next index 1)");
        assert_eq!(list(&config)[0].fqdn(), "test.com");
    }

    #[test]
    fn test_import_legacy_without_ca_alias() {
        let (dir, config) = setup();
        let network = write(
            &dir,
            "legacy.json",
            r#"{
                "fqdn": "test.com",
                "enterprise": {"eap_method": "TLS", "realm": "realm.com", "client_certificate_alias": "ClientCert"}
            }"#,
        );

        assert!(execute(Commands::ImportLegacy { network }, &config, &[]).is_err());
        assert!(list(&config).is_empty());
    }

    #[test]
    fn test_auto_join_unknown_profile() {
        let (_dir, config) = setup();
        let result = execute(
            Commands::AutoJoin {
                fqdn: "missing.com".into(),
                disable: true,
            },
            &config,
            &[],
        );
        assert!(result.is_err());
    }
}
