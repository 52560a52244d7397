//! HTTP server: JSON API plus the per-workflow SSE event stream.

pub mod routes;
pub mod sse;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{ApiError, ErrorCode};
use crate::hub::BroadcastHub;
use crate::lifecycle::TaskLifecycle;
use crate::membership::WorkflowMembership;

/// Shared state across handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub lifecycle: Arc<TaskLifecycle>,
    pub membership: Arc<WorkflowMembership>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InvalidTransition
            | ErrorCode::AlreadyConfirmed
            | ErrorCode::DuplicateInvite
            | ErrorCode::AlreadyMember => StatusCode::CONFLICT,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let mut body = serde_json::to_value(&self).unwrap_or_else(|_| json!({}));
        body["success"] = json!(false);
        (status, Json(body)).into_response()
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    // Permissive CORS; the API carries no cookies.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Workflows
        .route(
            "/api/workflows",
            get(routes::list_workflows).post(routes::create_workflow),
        )
        .route(
            "/api/workflows/{id}",
            get(routes::get_workflow)
                .put(routes::update_workflow)
                .delete(routes::delete_workflow),
        )
        .route("/api/workflows/{id}/stats", get(routes::workflow_stats))
        // Members
        .route("/api/workflows/{id}/members", post(routes::invite_members))
        .route(
            "/api/workflows/{id}/members/{member_id}",
            delete(routes::remove_member),
        )
        .route(
            "/api/workflows/{id}/members/{member_id}/permissions",
            put(routes::update_member_permissions),
        )
        // Invites
        .route("/api/invites", get(routes::pending_invites))
        .route("/api/invites/{id}/respond", post(routes::respond_to_invite))
        // Directory
        .route("/api/users/search", get(routes::search_users))
        // Tasks
        .route(
            "/api/workflows/{id}/tasks",
            get(routes::list_tasks).post(routes::create_task),
        )
        .route(
            "/api/workflows/{id}/completed-tasks",
            get(routes::list_completed_tasks),
        )
        .route(
            "/api/workflows/{id}/tasks/{task_id}",
            put(routes::edit_task).delete(routes::delete_task),
        )
        .route(
            "/api/workflows/{id}/tasks/{task_id}/status",
            post(routes::update_task_status),
        )
        .route(
            "/api/workflows/{id}/tasks/{task_id}/status-updates",
            get(routes::list_status_updates),
        )
        .route(
            "/api/workflows/{id}/tasks/{task_id}/confirm",
            post(routes::confirm_completion),
        )
        .route(
            "/api/workflows/{id}/tasks/{task_id}/completion-message",
            delete(routes::delete_completion_message),
        )
        .route(
            "/api/workflows/{id}/tasks/{task_id}/feedback-message",
            delete(routes::delete_feedback_message),
        )
        // Event stream
        .route("/api/workflows/{id}/events", get(sse::workflow_events))
        .route("/api/health", get(health))
        // Add middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns a oneshot sender used to signal shutdown and the address the
/// server is actually bound to.
pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;
    info!("crewflow listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("server shutting down");
            })
            .await
        {
            tracing::error!("server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_version() {
        let Json(response) = health().await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
    }
}
