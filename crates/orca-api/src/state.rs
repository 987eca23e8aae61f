//! Application state.

use orca_artifacts::ObjectArtifactStore;
use orca_config::{QueueBackend, StoreBackend, SystemConfig};
use orca_core::artifact::ArtifactStore;
use orca_core::queue::WorkQueue;
use orca_db::{JobStore, MemoryJobStore, PgJobStore, create_pool, run_migrations};
use orca_scheduler::{JobManager, MemoryWorkQueue, PgWorkQueue};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

/// Upper bound on `GET /jobs` results.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<JobManager>,
    pub list_limit: usize,
}

impl AppState {
    pub fn new(manager: Arc<JobManager>) -> Self {
        Self {
            manager,
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }

    pub fn with_list_limit(mut self, limit: usize) -> Self {
        self.list_limit = limit;
        self
    }

    /// Wire up the backends selected in `config`.
    pub async fn from_config(config: &SystemConfig) -> anyhow::Result<Self> {
        let pool = connect(config).await?;

        let jobs: Arc<dyn JobStore> = match (config.store, &pool) {
            (StoreBackend::Postgres, Some(pool)) => Arc::new(PgJobStore::new(pool.clone())),
            _ => Arc::new(MemoryJobStore::new()),
        };
        let queue: Arc<dyn WorkQueue> = match (config.queue.backend, &pool) {
            (QueueBackend::Postgres, Some(pool)) => Arc::new(PgWorkQueue::new(
                pool.clone(),
                config.queue.poll_interval,
            )),
            _ => Arc::new(MemoryWorkQueue::new()),
        };
        let artifacts: Arc<dyn ArtifactStore> =
            Arc::new(ObjectArtifactStore::from_config(&config.artifact_store)?);

        info!(
            store = ?config.store,
            queue = ?config.queue.backend,
            artifacts = ?config.artifact_store.backend,
            "Backends ready"
        );

        let manager = Arc::new(JobManager::new(jobs, queue, artifacts));
        Ok(Self::new(manager).with_list_limit(config.list_limit))
    }
}

/// Open and migrate the database if any backend needs it.
async fn connect(config: &SystemConfig) -> anyhow::Result<Option<PgPool>> {
    let needs_db =
        config.store == StoreBackend::Postgres || config.queue.backend == QueueBackend::Postgres;
    let Some(url) = config.database_url.as_deref().filter(|_| needs_db) else {
        return Ok(None);
    };

    info!("Connecting to database...");
    let pool = create_pool(url).await?;
    run_migrations(&pool).await?;
    info!("Database connected");
    Ok(Some(pool))
}
