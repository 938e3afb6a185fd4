//! Layered configuration, following `cloud-service`'s `CloudServiceConfig`
//! shape: one top-level struct, nested sub-configs, each with a
//! `SafeDisplay` impl so the whole thing can be logged at startup without
//! leaking secrets.

use crate::error::SafeDisplay;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkQueueConfig {
    pub tracing: TracingConfig,
    pub environment: String,
    pub http_port: u16,
    pub db: DbConfig,
    pub queue: QueueTunables,
    pub cors_origin_regex: String,
}

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self {
            tracing: TracingConfig::default(),
            environment: "dev".to_string(),
            http_port: 8080,
            db: DbConfig::default(),
            queue: QueueTunables::default(),
            cors_origin_regex: "https://*".to_string(),
        }
    }
}

impl SafeDisplay for WorkQueueConfig {
    fn to_safe_string(&self) -> String {
        let mut result = String::new();
        let _ = writeln!(&mut result, "tracing: {:?}", self.tracing);
        let _ = writeln!(&mut result, "environment: {}", self.environment);
        let _ = writeln!(&mut result, "HTTP port: {}", self.http_port);
        let _ = writeln!(&mut result, "DB:");
        let _ = writeln!(&mut result, "{}", self.db.to_safe_string());
        let _ = writeln!(&mut result, "queue:");
        let _ = writeln!(&mut result, "{:?}", self.queue);
        let _ = writeln!(&mut result, "CORS origin regex: {}", self.cors_origin_regex);
        result
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct TracingConfig {
    pub stdout: bool,
    pub json: bool,
}

/// Which queue tier this instance runs as. A global queue runs ingest and
/// close; a local queue runs pull and inject; both run reconcile and the
/// location mapper.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueTier {
    Global,
    Local,
}

impl Default for QueueTier {
    fn default() -> Self {
        QueueTier::Global
    }
}

/// The engine's configured tunables: `WorkPerCycle`,
/// `stuckElementAlertTime`, `cancelGraceTime`, refresh intervals, etc.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueTunables {
    pub tier: QueueTier,

    /// URL of the parent queue; required for a local queue's `pullWork`.
    pub parent_queue_url: Option<url::Url>,

    /// This queue's own URL, recorded on elements it pulls as `ChildQueueUrl`.
    pub self_url: url::Url,

    /// Upper bound on elements replicated down per `pullWork` cycle.
    pub work_per_cycle: usize,

    /// Default `SuccessThreshold` for the `SingleShot` end policy.
    pub success_threshold: f64,

    #[serde(with = "humantime_serde")]
    pub location_refresh_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub full_location_refresh_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub reconcile_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub pull_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub inject_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub close_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub stuck_element_alert_time: Duration,
    #[serde(with = "humantime_serde")]
    pub cancel_grace_time: Duration,

    /// Default `events_per_job` for MonteCarlo splitting when the spec
    /// doesn't override it.
    pub default_events_per_job: u64,
    /// Default `files_per_job` for Block/Dataset splitting.
    pub default_files_per_job: u64,

    pub release_incomplete_blocks: bool,
    pub release_require_subscribed: bool,

    pub bounded_retry_count: u32,
}

impl Default for QueueTunables {
    fn default() -> Self {
        Self {
            tier: QueueTier::default(),
            parent_queue_url: None,
            self_url: url::Url::parse("http://localhost:8080").unwrap(),
            work_per_cycle: 200,
            success_threshold: 0.9,
            location_refresh_interval: Duration::from_secs(600),
            full_location_refresh_interval: Duration::from_secs(3600),
            reconcile_interval: Duration::from_secs(60),
            pull_interval: Duration::from_secs(120),
            inject_interval: Duration::from_secs(30),
            close_interval: Duration::from_secs(300),
            stuck_element_alert_time: Duration::from_secs(86400),
            cancel_grace_time: Duration::from_secs(3600),
            default_events_per_job: 250,
            default_files_per_job: 10,
            release_incomplete_blocks: false,
            release_require_subscribed: true,
            bounded_retry_count: 5,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "config")]
pub enum DbConfig {
    Sqlite(DbSqliteConfig),
    Postgres(DbPostgresConfig),
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig::Sqlite(DbSqliteConfig::default())
    }
}

impl SafeDisplay for DbConfig {
    fn to_safe_string(&self) -> String {
        match self {
            DbConfig::Sqlite(c) => format!("sqlite: {}", c.database),
            DbConfig::Postgres(c) => format!(
                "postgres: {}@{}:{}/{}",
                c.username, c.host, c.port, c.database
            ),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbSqliteConfig {
    pub database: String,
    pub max_connections: u32,
}

impl Default for DbSqliteConfig {
    fn default() -> Self {
        Self {
            database: "../data/workqueue.sqlite".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DbPostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
}

impl Default for DbPostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "workqueue".to_string(),
            username: "workqueue".to_string(),
            password: "workqueue".to_string(),
            max_connections: 10,
        }
    }
}

impl DbPostgresConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// A small layered-config helper: defaults, then an optional TOML file,
/// then environment variables prefixed `WORKQUEUE__`, with `__` as the
/// nested-key separator.
pub struct ConfigLoader<T> {
    file: PathBuf,
    _marker: std::marker::PhantomData<T>,
}

impl<T> ConfigLoader<T>
where
    T: Default + Serialize + for<'de> Deserialize<'de>,
{
    pub fn new(file: &Path) -> Self {
        Self {
            file: file.to_path_buf(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn load(&self) -> Result<T, figment::Error> {
        Figment::from(Serialized::defaults(T::default()))
            .merge(Toml::file(&self.file))
            .merge(Env::prefixed("WORKQUEUE__").split("__"))
            .extract()
    }
}

pub fn make_config_loader() -> ConfigLoader<WorkQueueConfig> {
    ConfigLoader::new(&PathBuf::from("config/workqueue.toml"))
}
