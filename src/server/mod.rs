//! Platform HTTP server
//!
//! REST surface over the core: model records, dataset upload, training,
//! endpoint generation, served predictions and usage statistics.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::{env_or, PlatformConfig};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

/// Listener settings of the platform server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit in bytes, uploads included
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    /// Reads `API_HOST`, `API_PORT` and `MAX_UPLOAD_SIZE`
    fn default() -> Self {
        Self {
            host: env_or("API_HOST", "0.0.0.0".to_string()),
            port: env_or("API_PORT", DEFAULT_PORT),
            max_upload_size: env_or("MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Resolves on ctrl+c, logging how long `component` ran
pub(crate) async fn shutdown_signal(component: &'static str) {
    let started = Instant::now();
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(
            component,
            uptime_secs = started.elapsed().as_secs(),
            "Shutdown signal received, draining connections"
        );
    }
}

/// Open the metadata store and storage roots, then serve until ctrl+c
pub async fn run_server(config: ServerConfig, platform: PlatformConfig) -> anyhow::Result<()> {
    info!(
        models_dir = %platform.models_dir.display(),
        generated_dir = %platform.generated_dir.display(),
        data_dir = %platform.data_dir.display(),
        metadata = ?platform.metadata_path,
        "Opening platform storage"
    );

    let addr = config.bind_addr()?;
    let upload_limit_mb = config.max_upload_size / 1024 / 1024;
    let state = Arc::new(AppState::new(config, platform)?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, upload_limit_mb, "Platform server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal("platform"))
        .await?;

    info!("Platform server stopped");
    Ok(())
}
