//! The `screen-analysis serve` command.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use screen_analysis_core::{Analyzer, Backend, Config};

use crate::server::{self, AppState};

/// Arguments for the `serve` command.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind (overrides `server.host`)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides `server.port`)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Ollama base URL (overrides `remote.endpoint`)
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Load the local model before accepting requests
    #[arg(long)]
    pub preload: bool,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.ollama_url {
            config.remote.endpoint = url.clone();
        }
        if self.preload {
            config.local.preload = true;
        }
    }
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let analyzer = Arc::new(Analyzer::new(&config));

    if config.local.preload {
        match analyzer.backends().local().preload().await {
            Ok(()) => tracing::info!("Local model preloaded"),
            Err(e) => tracing::warn!("Local model preload failed, will retry on first request: {e}"),
        }
    }

    // Availability is informational only; report it without delaying startup.
    let checker = Arc::clone(&analyzer);
    tokio::spawn(async move {
        for backend in Backend::ALL {
            let adapter = checker.backends().get(backend);
            if adapter.is_available().await {
                tracing::info!("Backend {} ready (model: {})", backend, adapter.default_model());
            } else {
                tracing::warn!("Backend {} is not available yet", backend);
            }
        }
    });

    let app = server::router(AppState::new(analyzer, &config), &config)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Screen Analysis API listening on http://{}", listener.local_addr()?);
    tracing::info!("Remote LLM endpoint: {}", config.remote.endpoint);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
