//! Service bootstrap: assembles the backend store, adapters, and the
//! `Engine` behind `Arc<dyn Trait>` seams, following a `Services::new`
//! bootstrap pattern — simplified to a single `sqlx::any::AnyPool` since
//! this store has no generic-over-`Database` abstraction to dispatch
//! through (see `DESIGN.md`).

use crate::adapters::{
    HttpParentQueueClient, InMemorySpecStore, MockDbsAdapter, MockPhedexAdapter,
    MockRequestManagerAdapter, MockSiteDbAdapter, MockSubstrateAdapter, ParentQueueClient,
};
use crate::config::{DbConfig, WorkQueueConfig};
use crate::engine::Engine;
use crate::repo::{SqlxElementRepo, SqlxInboxRepo, SqlxJournalRepo};
use anyhow::Context;
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use std::sync::Arc;

#[derive(Clone)]
pub struct Services {
    pub engine: Arc<Engine>,
}

impl Services {
    pub async fn new(config: &WorkQueueConfig) -> Result<Self, anyhow::Error> {
        let pool = connect_pool(&config.db).await?;

        let elements = Arc::new(SqlxElementRepo::new(pool.clone()));
        let inbox = Arc::new(SqlxInboxRepo::new(pool.clone()));
        let journal = Arc::new(SqlxJournalRepo::new(pool));

        // The DBS/PhEDEx/SiteDB/substrate/request-manager adapters are
        // external collaborators out of scope for this engine;
        // only the finite mock dispatch tables are wired here. A real
        // deployment swaps these for `reqwest`-backed implementations of
        // the same traits without touching `Engine`.
        let dbs = Arc::new(MockDbsAdapter::new());
        let phedex = Arc::new(MockPhedexAdapter::new());
        let sitedb = Arc::new(MockSiteDbAdapter::new());
        let substrate = Arc::new(MockSubstrateAdapter::new());
        let request_manager = Arc::new(MockRequestManagerAdapter::new());
        let spec_store = Arc::new(InMemorySpecStore::new());

        let parent_client: Option<Arc<dyn ParentQueueClient>> = config
            .queue
            .parent_queue_url
            .as_ref()
            .map(|url| Arc::new(HttpParentQueueClient::new(url.clone())) as Arc<dyn ParentQueueClient>);

        let engine = Arc::new(Engine::new(
            elements,
            inbox,
            journal,
            dbs,
            phedex,
            sitedb,
            substrate,
            request_manager,
            spec_store,
            parent_client,
            config.queue.clone(),
        ));

        Ok(Self { engine })
    }
}

async fn connect_pool(config: &DbConfig) -> Result<sqlx::any::AnyPool, anyhow::Error> {
    install_default_drivers();

    let (url, max_connections) = match config {
        DbConfig::Sqlite(c) => (format!("sqlite://{}?mode=rwc", c.database), c.max_connections),
        DbConfig::Postgres(c) => (c.connection_string(), c.max_connections),
    };

    let pool = AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(&url)
        .await
        .with_context(|| format!("connecting to database ({url})"))?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("running database migrations")?;

    Ok(pool)
}
