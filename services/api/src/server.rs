//! HTTP server

use crate::routes::routes;
use crate::state::ApiState;
use anyhow::{Context, Result};
use engine_config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use warp::Filter;

pub struct ApiServer {
    config: ServerConfig,
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: Arc<ApiState>) -> Self {
        Self { config, state }
    }

    pub fn state(&self) -> &Arc<ApiState> {
        &self.state
    }

    pub fn address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid listen address {}:{}",
                    self.config.bind_address, self.config.port
                )
            })
    }

    /// Serve until the process stops
    pub async fn start(&self) -> Result<()> {
        let addr = self.address()?;
        let routes = routes(self.state.clone(), self.config.enable_admin);
        if self.config.enable_admin {
            warn!("operator pause/resume routes are enabled");
        }

        if self.config.enable_cors {
            let cors = warp::cors()
                .allow_any_origin()
                .allow_methods(vec!["GET", "POST"])
                .allow_headers(vec!["content-type"]);
            let (bound, server) = warp::serve(routes.with(cors))
                .try_bind_ephemeral(addr)
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(%bound, cors = true, "pool API listening");
            server.await;
        } else {
            let (bound, server) = warp::serve(routes)
                .try_bind_ephemeral(addr)
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(%bound, cors = false, "pool API listening");
            server.await;
        }
        Ok(())
    }
}
