// # merakidnsd - Meraki DNS Source Daemon
//
// Thin integration layer around merakidns-core. Reconcile logic lives in the
// library; this binary only wires it up.
//
// The merakidnsd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering the inventory client and stores
// 4. Applying the source manifest and running the controller
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Inventory
// - `MERAKI_API_KEY`: Dashboard API key (required)
// - `MERAKIDNS_API_BASE_URL`: API base URL (default `https://api.meraki.com/api/v0/`)
//
// ### Reconciler
// - `MERAKIDNS_THROTTLE_INTERVAL_SECS`: Minimum time between inventory queries (default 60)
// - `MERAKIDNS_REQUEUE_INTERVAL_SECS`: Periodic resync interval (default 300)
// - `MERAKIDNS_CALL_TIMEOUT_SECS`: Deadline for each inventory/store call (default 30)
// - `MERAKIDNS_WORKERS`: Sources reconciled concurrently (default 4)
//
// ### Store
// - `MERAKIDNS_STORE_TYPE`: Type of resource store (file, memory)
// - `MERAKIDNS_STORE_PATH`: Path to store file (for file store)
//
// ### Sources
// - `MERAKIDNS_SOURCES`: JSON array of `MerakiSource` objects, inline or as a
//   path to a file containing it
//
// ## Example
//
// ```bash
// export MERAKI_API_KEY=your_key
// export MERAKIDNS_STORE_TYPE=file
// export MERAKIDNS_STORE_PATH=/var/lib/merakidns/store.json
// export MERAKIDNS_SOURCES='[{"metadata":{"namespace":"dns","name":"office"},
//   "spec":{"organization":{"name":"Acme"},"network":{"name":"Main Office"},
//   "domain":"home.example.com"}}]'
//
// merakidnsd
// ```

use anyhow::{Context, Result};
use merakidns_core::config::{
    DEFAULT_MERAKI_BASE_URL, InventoryConfig, MerakiDnsConfig, ReconcilerConfig, StoreConfig,
};
use merakidns_core::model::{MerakiSource, ObjectKey};
use merakidns_core::reconciler::ReconcileEvent;
use merakidns_core::traits::ResourceStore;
use merakidns_core::{Controller, Reconciler, Registry};
use std::collections::HashSet;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Time allowed for in-flight reconciles to finish after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the reconcile event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    api_key: String,
    api_base_url: String,
    throttle_interval_secs: u64,
    requeue_interval_secs: u64,
    call_timeout_secs: u64,
    workers: usize,
    store_type: String,
    store_path: Option<String>,
    sources: Option<String>,
    log_level: String,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<REDACTED>")
            .field("api_base_url", &self.api_base_url)
            .field("throttle_interval_secs", &self.throttle_interval_secs)
            .field("requeue_interval_secs", &self.requeue_interval_secs)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("workers", &self.workers)
            .field("store_type", &self.store_type)
            .field("store_path", &self.store_path)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ReconcilerConfig::default();

        Ok(Self {
            api_key: lookup("MERAKI_API_KEY").context("MERAKI_API_KEY is not set")?,
            api_base_url: lookup("MERAKIDNS_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MERAKI_BASE_URL.to_string()),
            throttle_interval_secs: parse_or(
                &lookup,
                "MERAKIDNS_THROTTLE_INTERVAL_SECS",
                defaults.throttle_interval_secs,
            )?,
            requeue_interval_secs: parse_or(
                &lookup,
                "MERAKIDNS_REQUEUE_INTERVAL_SECS",
                defaults.requeue_interval_secs,
            )?,
            call_timeout_secs: parse_or(
                &lookup,
                "MERAKIDNS_CALL_TIMEOUT_SECS",
                defaults.call_timeout_secs,
            )?,
            workers: parse_or(&lookup, "MERAKIDNS_WORKERS", defaults.workers)?,
            store_type: lookup("MERAKIDNS_STORE_TYPE").unwrap_or_else(|| "memory".to_string()),
            store_path: lookup("MERAKIDNS_STORE_PATH"),
            sources: lookup("MERAKIDNS_SOURCES").filter(|s| !s.trim().is_empty()),
            log_level: lookup("MERAKIDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!(
                "MERAKI_API_KEY is required. \
                Set it via: export MERAKI_API_KEY=your_key"
            );
        }

        // Check for obvious placeholder keys (common mistake)
        let key_lower = self.api_key.to_lowercase();
        if key_lower.contains("your_key")
            || key_lower.contains("replace_me")
            || key_lower == "key"
        {
            anyhow::bail!(
                "MERAKI_API_KEY appears to be a placeholder. \
                Use an actual Dashboard API key."
            );
        }

        match self.store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "MERAKIDNS_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        if self.store_type == "file" {
            match self.store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "MERAKIDNS_STORE_PATH is required when MERAKIDNS_STORE_TYPE=file. \
                    Set it via: export MERAKIDNS_STORE_PATH=/var/lib/merakidns/store.json"
                ),
                Some(_) => {}
            }
        }

        if !(1..=3600).contains(&self.call_timeout_secs) {
            anyhow::bail!(
                "MERAKIDNS_CALL_TIMEOUT_SECS must be between 1 and 3600 seconds. Got: {}",
                self.call_timeout_secs
            );
        }

        if self.workers == 0 || self.workers > 64 {
            anyhow::bail!("MERAKIDNS_WORKERS must be between 1 and 64. Got: {}", self.workers);
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "MERAKIDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        // Range checks shared with library users
        self.core_config()
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        Ok(())
    }

    /// Library configuration equivalent of the environment
    fn core_config(&self) -> MerakiDnsConfig {
        let store = match self.store_type.as_str() {
            "file" => StoreConfig::File {
                path: self.store_path.clone().unwrap_or_default(),
            },
            _ => StoreConfig::Memory,
        };

        MerakiDnsConfig {
            inventory: InventoryConfig::Meraki {
                api_key: self.api_key.clone(),
                base_url: self.api_base_url.clone(),
                per_page: 1000,
            },
            store,
            reconciler: ReconcilerConfig {
                throttle_interval_secs: self.throttle_interval_secs,
                requeue_interval_secs: self.requeue_interval_secs,
                call_timeout_secs: self.call_timeout_secs,
                workers: self.workers,
                ..ReconcilerConfig::default()
            },
        }
    }

    /// Parse the source manifest, inline JSON or a file path
    ///
    /// `None` when `MERAKIDNS_SOURCES` is unset.
    fn load_sources(&self) -> Result<Option<Vec<MerakiSource>>> {
        let Some(raw) = self.sources.as_deref() else {
            return Ok(None);
        };

        let manifest = if raw.trim_start().starts_with('[') {
            raw.to_string()
        } else {
            std::fs::read_to_string(raw)
                .with_context(|| format!("Failed to read MERAKIDNS_SOURCES file {raw}"))?
        };

        let sources: Vec<MerakiSource> =
            serde_json::from_str(&manifest).context("MERAKIDNS_SOURCES is not a valid source list")?;

        for source in &sources {
            if source.metadata.name.is_empty() {
                anyhow::bail!("Every source in MERAKIDNS_SOURCES needs metadata.name");
            }
            validate_domain_name(&source.spec.domain)
                .with_context(|| format!("Source {}", source.metadata.key()))?;
        }

        Ok(Some(sources))
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} must be a non-negative integer. Got: {value}")),
    }
}

/// Validate that a string is a usable DNS suffix
///
/// Basic RFC 1035 checks; catches common errors, not every invalid name.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        anyhow::bail!("Domain name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    let sources = match config.load_sources() {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting merakidnsd daemon");
    debug!("Configuration: {:?}", config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config, sources).await {
            error!("Daemon error: {:#}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Build the registry with every component compiled into this binary
fn build_registry() -> Registry {
    let mut registry = Registry::with_builtin_kinds();
    merakidns_core::store::register(&mut registry);

    #[cfg(feature = "meraki")]
    {
        info!("Registering Meraki inventory");
        merakidns_inventory_meraki::register(&mut registry);
    }

    registry
}

/// Run the daemon
async fn run_daemon(config: Config, sources: Option<Vec<MerakiSource>>) -> Result<()> {
    let core = config.core_config();
    let registry = Arc::new(build_registry());

    let inventory = registry.create_inventory(&core.inventory)?;
    let store = registry.create_store(&core.store).await?;
    info!(
        "Using {} inventory and {} store",
        inventory.inventory_name(),
        store.store_name()
    );

    let keys = sync_manifest(store.as_ref(), sources.as_deref()).await?;

    let (reconciler, events) =
        Reconciler::new(inventory, store.clone(), registry, &core.reconciler)?
            .with_events(EVENT_CHANNEL_CAPACITY);
    let event_logger = tokio::spawn(log_events(events));

    let (controller, handle) = Controller::new(Arc::new(reconciler), &core.reconciler);

    if keys.is_empty() {
        warn!("No sources to reconcile; set MERAKIDNS_SOURCES to add some");
    }
    for key in keys {
        handle.enqueue(key);
    }

    let cancel = CancellationToken::new();
    let mut controller_task = tokio::spawn(controller.run(cancel.clone()));

    info!("Daemon initialized successfully");

    let outcome = tokio::select! {
        received = wait_for_shutdown() => {
            info!("Received shutdown signal: {}", received?);
            cancel.cancel();

            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut controller_task).await {
                Ok(joined) => joined.context("Controller task failed")?.map_err(anyhow::Error::from),
                Err(_) => {
                    controller_task.abort();
                    Err(anyhow::anyhow!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT))
                }
            }
        }
        joined = &mut controller_task => {
            warn!("Controller stopped before a shutdown signal");
            joined.context("Controller task failed")?.map_err(anyhow::Error::from)
        }
    };

    drop(handle);
    event_logger.abort();
    flush_store(store.as_ref()).await;

    info!("Shutting down daemon");
    outcome
}

/// Make the stored sources match the manifest
///
/// Sources missing from the manifest are deleted along with the endpoints
/// they own. Without a manifest the stored sources are kept as they are.
/// Returns every source key left in the store.
async fn sync_manifest(
    store: &dyn ResourceStore,
    sources: Option<&[MerakiSource]>,
) -> Result<Vec<ObjectKey>> {
    let Some(sources) = sources else {
        return Ok(store.list_sources().await?);
    };

    let mut wanted = HashSet::new();
    for source in sources {
        let applied = store.apply_source(source).await?;
        info!("Applied source {}", applied.metadata.key());
        wanted.insert(applied.metadata.key());
    }

    for key in store.list_sources().await? {
        if !wanted.contains(&key) && store.delete_source(&key).await? {
            info!("Deleted source {} (no longer in MERAKIDNS_SOURCES)", key);
        }
    }

    Ok(store.list_sources().await?)
}

async fn flush_store(store: &dyn ResourceStore) {
    if let Err(e) = store.flush().await {
        error!("Failed to flush {} store: {}", store.store_name(), e);
    }
}

async fn log_events(mut events: mpsc::Receiver<ReconcileEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ReconcileEvent::Synced {
                key,
                endpoints,
                created,
            } => info!(
                "{} {} with {} endpoint(s)",
                if created { "Created" } else { "Updated" },
                key,
                endpoints
            ),
            ReconcileEvent::Throttled { key, remaining } => {
                debug!("{} throttled for another {:?}", key, remaining)
            }
            ReconcileEvent::SourceMissing { key } => debug!("{} no longer exists", key),
            ReconcileEvent::StatusConflict { key } => debug!("{} status was stale", key),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
