use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use crate::AppState;

use super::error_response;

pub async fn handle_list_nodes(
    State(state): State<AppState>,
    Path(cluster): Path<String>,
) -> Response {
    match state.registry.open(&cluster).await {
        Ok(list) => Json(list.view().await).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_refresh_nodes(
    State(state): State<AppState>,
    Path(cluster): Path<String>,
) -> Response {
    let list = match state.registry.open(&cluster).await {
        Ok(list) => list,
        Err(e) => return error_response(&e),
    };
    match list.refresh().await {
        Ok(_) => Json(list.view().await).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_healthz() -> &'static str {
    "ok\n"
}
