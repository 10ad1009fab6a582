use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use axum_server::{Handle, tls_rustls::RustlsConfig};
use clap::Parser;
use englearn::{
    api::{AppState, router},
    auth::TokenVerifier,
    config::Config,
    store::DocStore,
    utils::init_log,
};
use rustls::crypto::{CryptoProvider, ring};
use tower_http::timeout::TimeoutLayer;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "English learning web server", long_about = None)]
struct Args {
    /// Path to the toml config file
    #[arg(short, long, env = "ENGLEARN_CONFIG", default_value = "englearn.toml")]
    config: PathBuf,
    #[arg(short = 'H', long, env = "ENGLEARN_HOST")]
    host: Option<String>,
    #[arg(short, long, env = "ENGLEARN_PORT")]
    port: Option<u16>,
    /// Path to the sqlite database file
    #[arg(short, long, env = "ENGLEARN_DATABASE")]
    database: Option<PathBuf>,
    /// Directory for daily rotated log files, stdout if absent
    #[arg(short, long, env = "ENGLEARN_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = Config::load(&self.config)?;
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(database) = self.database {
            config.store.database = database;
        }
        if let Some(dir) = self.log_dir {
            config.log.dir = Some(dir);
        }
        Ok(config)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Args::parse().into_config()?;
    let _guard = init_log(config.log.dir.clone())?;

    let store = DocStore::connect(&config.store.database, config.store.max_connections)
        .await
        .with_context(|| format!("open database {}", config.store.database.display()))?;
    let verifier = TokenVerifier::from_config(&config.auth)?;
    let state = AppState::new(
        store,
        verifier,
        config.gamification,
        config.store.syllabus_cache_capacity,
    );
    let app = router(state).layer(TimeoutLayer::new(Duration::from_secs(
        config.server.request_timeout_secs,
    )));

    let addr: SocketAddr = tokio::net::lookup_host((config.server.host.as_str(), config.server.port))
        .await?
        .next()
        .with_context(|| format!("cannot resolve {}", config.server.host))?;

    match (&config.server.cert, &config.server.key) {
        (Some(cert), Some(key)) => {
            CryptoProvider::install_default(ring::default_provider())
                .map_err(|e| anyhow::anyhow!("failed to install rustls crypto provider: {:?}", e))?;
            let tls = RustlsConfig::from_pem_file(cert, key)
                .await
                .context("load tls certificate")?;
            let handle = Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(Duration::from_secs(10)));
            });
            info!("listening on https://{}", addr);
            info!("swagger ui at https://{}/swagger-ui", addr);
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        (None, None) => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("listening on http://{}", addr);
            info!("swagger ui at http://{}/swagger-ui", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        _ => anyhow::bail!("server.cert and server.key must be set together"),
    }
    Ok(())
}
