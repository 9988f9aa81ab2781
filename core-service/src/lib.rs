//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (media engine,
//! audio sampler, recognition service) into the shared Rust core: it opens
//! the library database, creates the event bus and spawns the playback
//! orchestrator.
//!
//! ```no_run
//! # async fn example(deps: core_service::CoreDependencies) -> core_service::Result<()> {
//! use core_service::{CoreConfig, CoreService};
//!
//! let config = CoreConfig::builder().database_path("library.db").build()?;
//! let core = CoreService::bootstrap(config, deps).await?;
//! let mut events = core.events().subscribe();
//! # let _ = events.try_recv();
//! core.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_library::{LibraryStore, Playlist, RecognitionStatus, Track};
pub use core_playback::{PlaybackOrchestrator, PlaybackState, QueueSnapshot, RepeatMode};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{CoreEvent, EventBus, EventStream};

use std::sync::Arc;

use bridge_traits::{AudioSampler, Clock, PlaybackAdapter, RecognitionService, SystemClock};
use core_library::{create_pool, DatabaseConfig};
use core_playback::OrchestratorDeps;
use core_recognition::RecognitionClient;
use sqlx::SqlitePool;
use tracing::info;

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub adapter: Arc<dyn PlaybackAdapter>,
    pub sampler: Arc<dyn AudioSampler>,
    pub recognizer: Arc<dyn RecognitionService>,
    /// Defaults to the system clock.
    pub clock: Option<Arc<dyn Clock>>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        adapter: Arc<dyn PlaybackAdapter>,
        sampler: Arc<dyn AudioSampler>,
        recognizer: Arc<dyn RecognitionService>,
    ) -> Self {
        Self {
            adapter,
            sampler,
            recognizer,
            clock: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    library: Arc<LibraryStore>,
    player: PlaybackOrchestrator,
    events: EventBus,
    pool: SqlitePool,
}

impl CoreService {
    /// Validate `config`, open the library and start the orchestrator.
    ///
    /// Without a `database_path` the library lives in an in-memory SQLite
    /// database that disappears on shutdown.
    pub async fn bootstrap(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

        let clock = deps
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let events = EventBus::from_config(&config.events);

        let database = match &config.database_path {
            Some(path) => DatabaseConfig::new(path),
            None => DatabaseConfig::in_memory(),
        };
        let pool = create_pool(database).await?;
        let library = Arc::new(LibraryStore::sqlite(
            pool.clone(),
            Arc::clone(&clock),
            events.clone(),
        ));

        let player = PlaybackOrchestrator::spawn(
            OrchestratorDeps {
                adapter: deps.adapter,
                sampler: deps.sampler,
                client: RecognitionClient::from_config(deps.recognizer, &config.recognition),
                library: Arc::clone(&library),
                events: events.clone(),
                clock,
            },
            &config.playback,
            &config.recognition,
        );

        info!(
            in_memory = config.is_in_memory(),
            recognition_timeout_ms = config.recognition.timeout.as_millis() as u64,
            "Core service ready"
        );

        Ok(Self {
            config: Arc::new(config),
            library,
            player,
            events,
            pool,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Persisted tracks and playlists.
    pub fn library(&self) -> Arc<LibraryStore> {
        Arc::clone(&self.library)
    }

    /// Handle to the playback orchestrator.
    pub fn player(&self) -> PlaybackOrchestrator {
        self.player.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Stop playback, cancel running recognition and close the database.
    pub async fn shutdown(&self) -> Result<()> {
        self.player.shutdown().await?;
        self.pool.close().await;
        info!("Core service shut down");
        Ok(())
    }
}
