//! Binary entrypoint: loads config, wires services, starts the background
//! maintenance loops and the HTTP server, following `cloud-service`'s
//! `CloudService::run`/`start_http_server` pattern (no gRPC side here — this
//! engine exposes only the REST/replication surface).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use poem::endpoint::PrometheusExporter;
use poem::listener::{Acceptor, Listener};
use poem::middleware::Cors;
use poem::{EndpointExt, Route};
use tokio::task::JoinSet;
use tracing::{error, info, warn, Instrument};

use workqueue::api::make_open_api_service;
use workqueue::bootstrap::Services;
use workqueue::config::{make_config_loader, QueueTier, WorkQueueConfig};
use workqueue::engine::Engine;
use workqueue::error::SafeDisplay;
use workqueue::location;
use workqueue::telemetry;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config: WorkQueueConfig = make_config_loader()
        .load()
        .context("loading configuration")?;

    telemetry::init_tracing(&config.tracing);
    info!("starting work queue:\n{}", config.to_safe_string());

    let services = Services::new(&config)
        .await
        .map_err(|err| anyhow!(err).context("service initialization"))?;

    let mut join_set: JoinSet<Result<(), anyhow::Error>> = JoinSet::new();

    spawn_background_loops(&mut join_set, services.engine.clone(), &config);

    let http_port = start_http_server(&mut join_set, &services, &config).await?;
    info!("work queue listening on port {http_port}");

    while let Some(result) = join_set.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("background task failed: {err:#}"),
            Err(err) => error!("background task panicked: {err:#}"),
        }
    }

    Ok(())
}

/// Spawns the periodic loops a queue instance runs regardless of tier
/// (reconcile, location refresh) plus the tier-specific ones: a global
/// queue runs ingest's sibling, close; a local queue runs pull and inject.
fn spawn_background_loops(
    join_set: &mut JoinSet<Result<(), anyhow::Error>>,
    engine: Arc<Engine>,
    config: &WorkQueueConfig,
) {
    let tunables = config.queue.clone();

    {
        let engine = engine.clone();
        let interval = tunables.reconcile_interval;
        join_set.spawn(
            async move { run_periodic(interval, || reconcile_once(&engine)).await }.in_current_span(),
        );
    }

    {
        let engine = engine.clone();
        let interval = tunables.location_refresh_interval;
        join_set.spawn(
            async move { run_periodic(interval, || refresh_locations_once(&engine)).await }
                .in_current_span(),
        );
    }

    match tunables.tier {
        QueueTier::Local => {
            let engine = engine.clone();
            let interval = tunables.pull_interval;
            join_set.spawn(
                async move { run_periodic(interval, || pull_once(&engine)).await }.in_current_span(),
            );

            let engine = engine.clone();
            let interval = tunables.inject_interval;
            join_set.spawn(
                async move { run_periodic(interval, || inject_once(&engine)).await }.in_current_span(),
            );
        }
        QueueTier::Global => {
            let engine = engine.clone();
            let interval = tunables.close_interval;
            join_set.spawn(
                async move { run_periodic(interval, || close_once(&engine)).await }.in_current_span(),
            );
        }
    }
}

async fn run_periodic<F, Fut>(interval: Duration, mut f: F) -> Result<(), anyhow::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), anyhow::Error>>,
{
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(err) = f().await {
            warn!("periodic task failed: {err:#}");
        }
    }
}

async fn reconcile_once(engine: &Engine) -> Result<(), anyhow::Error> {
    engine.perform_sync_and_cancel_action(false).await?;
    Ok(())
}

async fn pull_once(engine: &Engine) -> Result<(), anyhow::Error> {
    engine.pull_work(None).await?;
    Ok(())
}

async fn inject_once(_engine: &Engine) -> Result<(), anyhow::Error> {
    // `getWork` is driven by the execution agent's own resource report
    // rather than a fixed cadence; nothing to do on a bare timer tick.
    Ok(())
}

async fn close_once(engine: &Engine) -> Result<(), anyhow::Error> {
    engine.close_work(None).await?;
    Ok(())
}

async fn refresh_locations_once(engine: &Engine) -> Result<(), anyhow::Error> {
    let elements = engine
        .elements
        .get(&Default::default())
        .await
        .context("listing elements for location refresh")?;

    let interval = chrono::Duration::from_std(engine.tunables.location_refresh_interval)
        .unwrap_or(chrono::Duration::zero());
    let now = chrono::Utc::now();

    for element in elements {
        if !location::is_due_for_refresh(&element, now, interval) {
            continue;
        }
        match location::refresh_element_sites(
            &element,
            engine.phedex.as_ref(),
            engine.sitedb.as_ref(),
            &engine.tunables,
        )
        .await
        {
            Ok(sites) => {
                engine
                    .elements
                    .update_possible_site(&element.id, &sites)
                    .await
                    .context("recording refreshed possible sites")?;
            }
            Err(err) => warn!(
                element_id = %element.id,
                "location refresh failed: {}",
                err.to_safe_string()
            ),
        }
    }

    Ok(())
}

async fn start_http_server(
    join_set: &mut JoinSet<Result<(), anyhow::Error>>,
    services: &Services,
    config: &WorkQueueConfig,
) -> Result<u16, anyhow::Error> {
    let prometheus_registry = telemetry::new_metrics_registry();

    let api_service = make_open_api_service(services);
    let ui = api_service.swagger_ui();
    let spec = api_service.spec_endpoint_yaml();
    let metrics = PrometheusExporter::new(prometheus_registry);

    let cors = Cors::new()
        .allow_origin_regex(&config.cors_origin_regex)
        .allow_credentials(true);

    let app = Route::new()
        .nest("/", api_service)
        .nest("/docs", ui)
        .nest("/specs", spec)
        .nest("/metrics", metrics)
        .with(cors);

    let listener =
        poem::listener::TcpListener::bind(format!("0.0.0.0:{}", config.http_port));
    let acceptor = listener.into_acceptor().await?;
    let port = acceptor.local_addr()[0]
        .as_socket_addr()
        .expect("socket address")
        .port();

    join_set.spawn(
        async move {
            poem::Server::new_with_acceptor(acceptor)
                .run(app)
                .await
                .map_err(|e| e.into())
        }
        .in_current_span(),
    );

    Ok(port)
}
