//! passage issues, rotates and revokes credentials for users signing in
//! through third-party identity providers.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod keys;
pub mod lookup;
pub mod message;
pub mod provider;
mod router;
pub mod service;
pub mod store;
pub mod telemetry;
#[cfg(test)]
mod testutil;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::FromRef;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::config::{Backend, ConfigError, Configuration};
use crate::message::NatsMessaging;
use crate::provider::Providers;
use crate::service::{AuthService, ServiceParams};
use crate::store::{MemoryStore, RedisStore, StoreError, TokenStore};

pub use error::ServerError;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    app.oneshot(
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Configuration>,
    pub service: AuthService,
    pub metrics: Option<PrometheusHandle>,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> AuthService {
        state.service.clone()
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .route("/metrics", get(router::status::metrics))
        .route("/login", post(router::auth::login))
        .route("/relogin", post(router::auth::relogin))
        .route("/refresh", post(router::auth::refresh))
        .route("/logout", post(router::auth::logout))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Errors raised while wiring the service.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot connect to token store: {0}")]
    Store(#[from] StoreError),
    #[error("cannot connect to nats: {0}")]
    Nats(#[from] async_nats::ConnectError),
}

/// Initialize the application state.
pub async fn initialize_state(
    config: Configuration,
    metrics: Option<PrometheusHandle>,
) -> Result<AppState, StartupError> {
    // handle jwt.
    let token = config.token.manager()?;
    tracing::info!(algorithm = ?token.algorithm(), "token engine ready");

    let store: Arc<dyn TokenStore> = match config.store.backend {
        Backend::Memory => {
            tracing::warn!("refresh tokens are kept in memory and lost on restart");
            let store = MemoryStore::new();
            store.spawn_cleanup(Duration::from_secs(60));
            Arc::new(store)
        },
        Backend::Redis => Arc::new(
            RedisStore::connect(&config.store.url, &config.store.prefix).await?,
        ),
    };

    let messaging = Arc::new(
        NatsMessaging::connect(
            &config.nats.url,
            Duration::from_secs(config.nats.timeout),
            config.nats.topics.clone(),
        )
        .await?,
    );

    let service = AuthService::new(ServiceParams {
        token,
        policy: config.token.policy(),
        store,
        providers: Providers::with_defaults(config.providers.clone()),
        identities: messaging.clone(),
        users: messaging.clone(),
        topic: messaging.topics().token_issued.clone(),
        publisher: messaging,
    });

    Ok(AppState {
        config: Arc::new(config),
        service,
        metrics,
    })
}
