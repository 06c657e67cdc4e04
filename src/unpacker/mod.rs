//! Job controller split into focused submodules.
//!
//! The `Unpacker` struct and its methods are organized by domain:
//! - [`jobs`] - Job processing state machine and the host entry points
//! - [`config_ops`] - Runtime configuration updates
//! - [`lifecycle`] - Shutdown coordination

mod config_ops;
mod jobs;
mod lifecycle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
pub(crate) mod test_helpers;


use crate::config::{Config, ExtractSettings, RetentionPolicy};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::extraction::{CommandResolver, CommandTable, ExtractionPool};
use crate::host::JobHost;
use crate::retention::{self, RetentionTracker};
use crate::types::{Event, JobId, JobState};

/// Per-job state and admission control
#[derive(Clone)]
pub(crate) struct JobTracking {
    /// Jobs currently past `Idle`; absent means `Idle`
    pub(crate) states:
        std::sync::Arc<std::sync::Mutex<std::collections::HashMap<JobId, JobState>>>,
    /// Flag to indicate whether new jobs are accepted (set to false during shutdown)
    pub(crate) accepting_new: std::sync::Arc<std::sync::atomic::AtomicBool>,
    /// Job watcher tasks, drained on shutdown
    pub(crate) watchers: tokio_util::task::TaskTracker,
}

/// Background retention sweep
#[derive(Clone)]
pub(crate) struct SweepService {
    /// Current retention policy, observed by the sweeper
    pub(crate) policy_tx: std::sync::Arc<tokio::sync::watch::Sender<RetentionPolicy>>,
    /// Stops the sweeper
    pub(crate) cancel_token: tokio_util::sync::CancellationToken,
    /// Sweeper task handle, taken on shutdown
    pub(crate) handle: std::sync::Arc<tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

/// Extraction controller (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Unpacker {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to inspect persisted state
    pub db: std::sync::Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Static configuration (tool paths, persistence)
    pub(crate) config: std::sync::Arc<Config>,
    /// Runtime-mutable extraction settings
    pub(crate) settings: std::sync::Arc<tokio::sync::RwLock<ExtractSettings>>,
    /// Archiver commands, resolved once at startup
    pub(crate) commands: std::sync::Arc<CommandTable>,
    /// Shared extraction worker pool
    pub(crate) pool: std::sync::Arc<ExtractionPool>,
    /// Retention tracker for placed output
    pub(crate) retention: RetentionTracker,
    /// The download manager owning the jobs
    pub(crate) host: std::sync::Arc<dyn JobHost>,
    /// Per-job state and admission control
    pub(crate) jobs: JobTracking,
    /// Background retention sweep
    pub(crate) sweep: SweepService,
}

impl Unpacker {
    /// Create a new Unpacker
    ///
    /// This initializes all core components:
    /// - Probes external archivers (fails if none are usable)
    /// - Opens/creates the SQLite database and runs migrations
    /// - Restores persisted settings, which override `config.settings`
    /// - Sizes the worker pool and starts the retention sweeper
    pub async fn new(config: Config, host: std::sync::Arc<dyn JobHost>) -> Result<Self> {
        let commands = CommandResolver::new(&config.tools).resolve()?;
        Self::with_commands(config, host, commands).await
    }

    /// Create an Unpacker with an already-built command table
    pub async fn with_commands(
        config: Config,
        host: std::sync::Arc<dyn JobHost>,
        commands: CommandTable,
    ) -> Result<Self> {
        if commands.is_empty() {
            return Err(Error::config(
                "no extraction commands available",
                "tools",
            ));
        }

        let db = Database::new(&config.persistence.database_path).await?;

        // Settings saved by a previous run win over construction-time defaults
        let settings = match db.load_settings().await? {
            Some(saved) => {
                tracing::info!("Restored persisted extraction settings");
                saved
            }
            None => config.settings.clone(),
        };

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let db_arc = std::sync::Arc::new(db);
        let retention = RetentionTracker::new(db_arc.clone());
        let pool = std::sync::Arc::new(ExtractionPool::new(settings.worker_count()));

        let (policy_tx, policy_rx) = tokio::sync::watch::channel(settings.retention_policy());
        let cancel_token = tokio_util::sync::CancellationToken::new();
        let sweeper = retention::spawn_sweeper(
            retention.clone(),
            config.persistence.sweep_interval,
            policy_rx,
            event_tx.clone(),
            cancel_token.clone(),
        );

        tracing::info!(
            formats = commands.len(),
            workers = settings.worker_count(),
            placement = ?settings.placement(),
            staging = settings.use_temp_dir,
            "Unpacker initialized"
        );

        Ok(Self {
            db: db_arc,
            event_tx,
            config: std::sync::Arc::new(config),
            settings: std::sync::Arc::new(tokio::sync::RwLock::new(settings)),
            commands: std::sync::Arc::new(commands),
            pool,
            retention,
            host,
            jobs: JobTracking {
                states: std::sync::Arc::new(std::sync::Mutex::new(
                    std::collections::HashMap::new(),
                )),
                accepting_new: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true)),
                watchers: tokio_util::task::TaskTracker::new(),
            },
            sweep: SweepService {
                policy_tx: std::sync::Arc::new(policy_tx),
                cancel_token,
                handle: std::sync::Arc::new(tokio::sync::Mutex::new(Some(sweeper))),
            },
        })
    }

    /// Subscribe to unpacker events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Emit an event; having no subscribers is fine
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Configuration the unpacker was built with
    ///
    /// `settings` here are the construction-time values; see
    /// [`Unpacker::settings`] for the live ones.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Archiver commands resolved at startup
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Retention tracker backing the sweep
    pub fn retention(&self) -> &RetentionTracker {
        &self.retention
    }

    /// Current worker pool size
    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }
}
