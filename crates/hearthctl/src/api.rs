use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use axum::extract::Path;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::AlertsConfig;
use crate::engine::{TransitionEngine, TransitionKind};
use crate::store::StateError;
use crate::triggers::{self, ArrivalStage};

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    dry_run: bool,
}

#[derive(Deserialize)]
struct PresenceRequest {
    home: bool,
}

#[derive(Deserialize)]
struct TemperatureRequest {
    temp_f: f64,
}

#[derive(Serialize)]
struct AlertResponse {
    sensor: String,
    alerted: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("unknown {0}")]
    NotFound(String),

    #[error(transparent)]
    State(#[from] StateError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Shared application state
pub struct AppState {
    version: &'static str,
    engine: TransitionEngine,
    alerts: AlertsConfig,
    token: Option<String>,

    /// Webhooks run one at a time, like every other trigger
    busy: Mutex<()>,
}

impl AppState {
    pub fn new(engine: TransitionEngine, alerts: AlertsConfig, token: Option<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            engine,
            alerts,
            token,
            busy: Mutex::new(()),
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = &self.token else {
            return Ok(());
        };
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented == Some(expected.as_str()) {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            dry_run: state.engine.dry_run(),
        }),
    )
}

/// Handler for GET /v1/status
#[tracing::instrument(skip(state, headers))]
async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&headers)?;
    Ok(Json(state.engine.store().snapshot()))
}

/// Handler for POST /v1/transitions/:kind
#[tracing::instrument(skip(state, headers))]
async fn transition(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&headers)?;
    let kind: TransitionKind = kind
        .parse()
        .map_err(|_| ApiError::NotFound(format!("transition '{}'", kind)))?;

    let _guard = state.busy.lock().await;
    Ok(Json(state.engine.run(kind).await))
}

/// Handler for POST /v1/presence
#[tracing::instrument(skip(state, headers, body))]
async fn presence(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PresenceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&headers)?;
    let _guard = state.busy.lock().await;
    Ok(Json(triggers::apply_presence(&state.engine, body.home).await?))
}

/// Handler for POST /v1/arrival/:stage
#[tracing::instrument(skip(state, headers))]
async fn arrival(
    State(state): State<Arc<AppState>>,
    Path(stage): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&headers)?;
    let stage: ArrivalStage = stage
        .parse()
        .map_err(|_| ApiError::NotFound(format!("arrival stage '{}'", stage)))?;

    let _guard = state.busy.lock().await;
    Ok(Json(triggers::handle_arrival(&state.engine, stage).await?))
}

/// Handler for POST /v1/sensors/:name/temperature
#[tracing::instrument(skip(state, headers, body))]
async fn sensor_temperature(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<TemperatureRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.authorize(&headers)?;
    let _guard = state.busy.lock().await;
    let alerted = triggers::check_temperature(
        state.engine.store(),
        state.engine.notifier().as_ref(),
        &state.alerts,
        &name,
        body.temp_f,
        state.engine.dry_run(),
    )
    .await?;
    Ok(Json(AlertResponse {
        sensor: name,
        alerted,
    }))
}

/// Create the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/status", get(status))
        .route("/v1/transitions/:kind", post(transition))
        .route("/v1/presence", post(presence))
        .route("/v1/arrival/:stage", post(arrival))
        .route("/v1/sensors/:name/temperature", post(sensor_temperature))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves until `shutdown_rx` fires.
pub async fn serve(
    state: Arc<AppState>,
    listen: &str,
    port: u16,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

/// Serve until `signal` completes, then shut down gracefully.
///
/// Returns as soon as the server itself stops, so a bind failure surfaces
/// as an error instead of leaving the process waiting on a signal.
pub async fn serve_until(
    state: Arc<AppState>,
    listen: &str,
    port: u16,
    signal: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let listen = listen.to_string();
    let mut server = tokio::spawn(async move { serve(state, &listen, port, shutdown_rx).await });

    tokio::select! {
        finished = &mut server => {
            finished.context("HTTP API server task panicked")??;
            anyhow::bail!("HTTP API server stopped unexpectedly");
        }
        () = signal => {}
    }

    // The server may have exited between the signal and this send
    let _ = shutdown_tx.send(());
    server.await.context("HTTP API server task panicked")??;
    Ok(())
}
