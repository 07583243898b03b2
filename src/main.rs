use std::{net::SocketAddr, process, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use orgdocs::{
    auth::jwt::JwtService,
    config::AppConfig,
    db, default_registry,
    hooks::{HookOutcome, HookPoint, ServeEvent, TerminateEvent},
    routes, s3,
    state::AppState,
};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "orgdocs server failed");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        public_dir = %config.public_dir.display(),
        s3_bucket = %config.s3_bucket,
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)
        .context("failed to build database pool")?;
    let applied = db::run_migrations(&pool)?;
    tracing::info!(applied, "database migrations up to date");

    let storage = Arc::new(s3::connect(&config).await?);
    let jwt = JwtService::from_config(&config)?;
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("SERVER_HOST and SERVER_PORT must form a socket address")?;
    let public_dir = config.public_dir.clone();

    let cors_origin = config.cors_allowed_origin.clone();

    let state = AppState::new(pool, config, storage, jwt, default_registry());
    let hooks = Arc::clone(&state.hooks);

    let mut serve = ServeEvent {
        router: routes::api_routes(state),
        public_dir,
    };
    hooks
        .serve
        .dispatch(HookPoint::Serve, &mut serve, |_| HookOutcome::Continue)
        .into_result()
        .context("serve hooks failed")?;
    let app = routes::with_layers(serve.router, cors_origin.as_deref());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "orgdocs server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let mut terminate = TerminateEvent {
        reason: "shutdown signal",
    };
    let outcome = hooks
        .terminate
        .dispatch(HookPoint::Terminate, &mut terminate, |_| HookOutcome::Continue);
    if let Err(err) = outcome.into_result() {
        tracing::warn!(error = %err, "terminate hooks failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("orgdocs server received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
