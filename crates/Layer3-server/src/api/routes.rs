//! HTTP route handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::{Request, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use iotask_foundation::ServiceConfig;
use iotask_task::{TaskId, TaskManager};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use validator::Validate;

use super::error::{error_response, ApiError};
use super::types::*;

/// Shared application state.
pub struct AppState {
    pub manager: TaskManager,
}

/// Build the router with tracing, request ids, panic recovery and request
/// timeout applied.
pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let routes = Router::new()
        .route("/health", get(health))
        .route("/tasks", post(create_task))
        .route("/tasks/:id", get(get_task).delete(delete_task))
        .route("/tasks/:id/cancel", post(cancel_task));

    with_middleware(routes, request_timeout).with_state(state)
}

fn with_middleware<S>(routes: Router<S>, request_timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    routes
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::map_response(timeout_body))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn handle_panic(err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "handler panicked");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

/// `TimeoutLayer` answers with an empty 408; give it the usual error body.
async fn timeout_body(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return error_response(StatusCode::REQUEST_TIMEOUT, "request timed out");
    }
    response
}

/// Start the HTTP server and run until SIGINT/SIGTERM.
pub async fn serve(config: &ServiceConfig, manager: TaskManager) -> anyhow::Result<()> {
    let state = Arc::new(AppState { manager });
    let app = router(state, config.server.request_timeout());

    let listener = tokio::net::TcpListener::bind(&config.server.address).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server...");
}

/// Ids that do not parse cannot name a task.
fn parse_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound("task not found".to_owned()))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        in_flight: state.manager.in_flight(),
    })
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskAck>), ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    req.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let id = state.manager.register(req.name).await?;
    Ok((StatusCode::CREATED, Json(TaskAck::new(id, "pending"))))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskView>, ApiError> {
    let task = state.manager.get(parse_id(&id)?).await?;
    Ok(Json(task.into()))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskAck>, ApiError> {
    let id = parse_id(&id)?;
    state.manager.delete(id).await?;
    Ok(Json(TaskAck::new(id, "deleted")))
}

async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskAck>, ApiError> {
    let id = parse_id(&id)?;
    state.manager.cancel(id).await?;
    Ok(Json(TaskAck::new(id, "cancelling")))
}
