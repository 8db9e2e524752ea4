use axum::{
    extract::{Path, State},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use crate::AppState;
use crate::clients::NodeSource;
use crate::lister::NodeList;

use super::error_response;

/// SSE endpoint that pushes the node rows of a cluster whenever they change.
/// The current rows are sent as soon as the stream opens, and the stream ends
/// when the list is closed.
pub async fn handle_node_events(
    State(state): State<AppState>,
    Path(cluster): Path<String>,
) -> Response {
    let list = match state.registry.open(&cluster).await {
        Ok(list) => list,
        Err(e) => return error_response(&e),
    };

    Sse::new(node_list_events(list))
        .keep_alive(KeepAlive::default().interval(Duration::from_secs(15)))
        .into_response()
}

/// Counts as a viewer of `list` for as long as the stream is alive.
fn node_list_events<S: NodeSource>(
    list: Arc<NodeList<S>>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    let viewer = list.viewer();
    list.updates().then(move |_| {
        let list = viewer.list().clone();
        async move {
            let view = list.view().await;
            let data = serde_json::to_string(&view).unwrap_or_default();
            Ok::<_, Infallible>(Event::default().event("node-list").data(data))
        }
    })
}
