//! Event conductor binary entrypoint wiring the phase engine, its tick driver,
//! and the REST and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use event_conductor::{
    config::AppConfig,
    dao::document_store::JsonFileStore,
    routes,
    services::ticker,
    state::{AppState, Backends},
    world::DirectoryWorldManager,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    if let Some(path) = config
        .write_generated_token()
        .context("writing generated admin token")?
    {
        info!(path = %path.display(), "admin token written");
    }

    let worlds = DirectoryWorldManager::new(config.worlds_dir())
        .with_store(Arc::new(JsonFileStore::new(config.worlds_path())))
        .context("restoring imported worlds")?;
    for world in config.event().worlds.iter().filter(|w| w.always_loaded) {
        worlds
            .register_always_loaded(&world.name)
            .with_context(|| format!("loading world `{}`", world.name))?;
    }

    let backends = Backends {
        progress: Arc::new(JsonFileStore::new(config.data_path())),
        locations: Arc::new(JsonFileStore::new(config.locations_path())),
        worlds: Arc::new(worlds),
    };
    let app_state = AppState::bootstrap(&config, backends).context("building event state")?;

    let shutdown = CancellationToken::new();
    let ticker = tokio::spawn(ticker::run(
        app_state.clone(),
        config.tick_interval(),
        shutdown.clone(),
    ));

    let app = routes::build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    shutdown.cancel();
    ticker.await.context("joining phase ticker")?;
    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM, waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
