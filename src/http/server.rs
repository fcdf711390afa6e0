//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, auth, metrics)
//! - Bind server to listener
//! - Apply live configuration updates
//! - Shut down gracefully on signal

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::database::Database;
use crate::http::handlers;
use crate::http::request::{request_id, MakeRequestUuid};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::pipeline::PipelineOptions;
use crate::security::bearer_auth_middleware;

/// Settings read on every request. Swapped atomically on config reload.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub auth_token: Option<String>,
    pub region: Option<String>,
    pub pipeline: PipelineOptions,
}

impl From<&GatewayConfig> for RuntimeSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            auth_token: config.auth.token.clone(),
            region: config.deployment.region.clone(),
            pipeline: PipelineOptions {
                statement_timeout: config.timeouts.statement(),
                unknown_requests: config.protocol.unknown_requests,
            },
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    settings: Arc<ArcSwap<RuntimeSettings>>,
}

impl AppState {
    pub fn new(db: Arc<dyn Database>, config: &GatewayConfig) -> Self {
        Self {
            db,
            settings: Arc::new(ArcSwap::from_pointee(RuntimeSettings::from(config))),
        }
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Arc<RuntimeSettings> {
        self.settings.load_full()
    }

    /// Replace the request-time settings with those from `config`.
    pub fn apply_config(&self, config: &GatewayConfig) {
        let next = RuntimeSettings::from(config);
        tracing::info!(
            auth_enabled = next.auth_token.is_some(),
            statement_timeout_ms = (next.pipeline.statement_timeout.as_millis() as u64),
            unknown_requests = ?next.pipeline.unknown_requests,
            "Runtime settings updated"
        );
        self.settings.store(Arc::new(next));
    }
}

/// HTTP server for the pipeline gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server over an already opened database.
    pub fn new(config: GatewayConfig, db: Arc<dyn Database>) -> Self {
        let state = AppState::new(db, &config);
        let router = build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// A clone of the fully layered router, for serving or for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` replace the runtime settings.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let initial = self.config.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                if new_config.listener != initial.listener || new_config.database != initial.database {
                    tracing::warn!("Listener and database changes take effect after a restart");
                }
                state.apply_config(&new_config);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    let pipeline_routes = Router::new()
        .route("/v2/pipeline", post(handlers::pipeline))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        .merge(pipeline_routes)
        .route_layer(middleware::from_fn(track_metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.security.max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        request_id = %request_id(request.headers()),
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let response = next.run(request).await;
    metrics::record_request(&route, response.status().as_u16(), start);
    response
}
