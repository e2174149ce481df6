//! Bateman Server
//!
//! Serves the roast endpoint over HTTP and wires configuration, the
//! provider registry and the evaluation adapter together.

pub mod config;
pub mod handlers;

use bateman_runtime::{
    EnvLookup, EvaluationAdapter, ProviderError, ProviderRegistry, RuntimeError,
};
use config::ServerConfig;
use handlers::{create_router, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Adapter could not be built
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` level. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Build the adapter described by `config`, reading credentials from `env`.
///
/// Provider settings are validated first, so a malformed `base_url` is
/// reported as [`ProviderError::InvalidConfig`] rather than at request time.
pub fn build_adapter(
    config: &ServerConfig,
    env: &dyn EnvLookup,
) -> Result<EvaluationAdapter, RuntimeError> {
    let registry = ProviderRegistry::with_defaults();
    let settings = config.provider.settings_json();

    registry.validate(&config.provider.kind, &settings, env)?;
    EvaluationAdapter::from_registry(
        &registry,
        &config.provider.kind,
        &settings,
        env,
        config.adapter.clone(),
    )
}

/// Build the shared handler state.
///
/// A missing credential is not fatal: the server still answers preflight
/// and health checks, and `/roast` reports the misconfiguration. Unknown
/// provider types and bad settings are.
pub fn build_state(config: &ServerConfig, env: &dyn EnvLookup) -> Result<AppState, ServerError> {
    let registry = ProviderRegistry::with_defaults();
    if !registry.has_provider(&config.provider.kind) {
        return Err(RuntimeError::Provider(ProviderError::NotConfigured(format!(
            "Unknown provider type: '{}'. Available: {:?}",
            config.provider.kind,
            registry.available_types()
        )))
        .into());
    }

    let adapter = match build_adapter(config, env) {
        Ok(adapter) => {
            info!(
                provider = adapter.provider_name(),
                description = registry.description(&config.provider.kind).unwrap_or_default(),
                model = %adapter.config().model,
                "evaluation adapter ready"
            );
            Some(Arc::new(adapter))
        }
        Err(RuntimeError::Provider(ProviderError::NotConfigured(reason))) => {
            warn!(provider = %config.provider.kind, %reason, "provider credential missing; /roast will answer 500");
            None
        }
        Err(e) => return Err(e.into()),
    };

    Ok(AppState {
        adapter,
        provider: config.provider.kind.clone(),
    })
}

/// Start the HTTP server
///
/// Binds, serves until Ctrl-C, then drains in-flight requests.
pub async fn start_server(config: ServerConfig, env: &dyn EnvLookup) -> Result<(), ServerError> {
    info!("Starting Bateman server");
    info!("Bind address: {}", config.bind_addr());
    info!(
        "Provider: {} (model {}, timeout {:?})",
        config.provider.kind, config.adapter.model, config.adapter.timeout
    );

    let state = build_state(&config, env)?;
    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
