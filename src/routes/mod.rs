pub mod api;
pub mod sse;
pub mod ui;

use axum::{
    Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::error::ConsoleError;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // JSON API
        .route("/api/v1/clusters/{cluster}/nodes", get(api::handle_list_nodes))
        .route(
            "/api/v1/clusters/{cluster}/nodes/refresh",
            post(api::handle_refresh_nodes),
        )
        .route(
            "/api/v1/clusters/{cluster}/nodes/events",
            get(sse::handle_node_events),
        )
        // Health
        .route("/healthz", get(api::handle_healthz))
        // Dashboard UI
        .route("/ui/clusters", get(ui::handle_clusters))
        .route("/ui/clusters/{cluster}/nodes", get(ui::handle_nodes))
        .route("/ui/clusters/{cluster}/nodes/refresh", post(ui::handle_refresh))
        .route("/ui/clusters/{cluster}/nodes/select", post(ui::handle_select))
        .route("/ui/clusters/{cluster}/nodes/create", post(ui::handle_create))
        .route("/ui/clusters/{cluster}/nodes/delete", post(ui::handle_delete))
        .route("/ui/clusters/{cluster}/nodes/close", post(ui::handle_close))
        .route(
            "/ui/clusters/{cluster}/nodes/{name}",
            get(ui::handle_node_detail),
        )
        .route(
            "/ui/clusters/{cluster}/nodes/{name}/status",
            get(ui::handle_node_status),
        )
        // Root redirect
        .route("/", get(ui::handle_root))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn error_response(e: &ConsoleError) -> Response {
    let status = match e {
        ConsoleError::Http(_) | ConsoleError::Backend { .. } => StatusCode::BAD_GATEWAY,
        ConsoleError::ClusterNotFound(_) | ConsoleError::NodeNotFound(_) => StatusCode::NOT_FOUND,
        ConsoleError::NodeNotReady(_) | ConsoleError::Closed => StatusCode::CONFLICT,
        ConsoleError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_status_codes() {
        let backend = ConsoleError::Backend {
            status: 500,
            body: "x".to_string(),
        };
        assert_eq!(error_response(&backend).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            error_response(&ConsoleError::NodeNotFound("n".to_string())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_response(&ConsoleError::ClusterNotFound("c".to_string())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            error_response(&ConsoleError::Closed).status(),
            StatusCode::CONFLICT
        );
    }
}
