use askama::Template;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::AppState;
use crate::clients::NodeSource;
use crate::error::ConsoleError;
use crate::helpers::human_time;
use crate::models::k8s;
use crate::models::views::*;

use super::error_response;

const SHOWN_ALERTS: usize = 5;

#[derive(Debug, Clone)]
struct Breadcrumb {
    label: String,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    page: Option<usize>,
}

impl PageQuery {
    fn pager(&self, total: usize, state: &AppState) -> Pager {
        Pager::new(total, self.page.unwrap_or(1), state.config.page_size)
    }
}

fn render_template(tmpl: &impl Template) -> Response {
    match tmpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("template error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

fn nodes_url(cluster: &str) -> String {
    format!("/ui/clusters/{}/nodes", cluster)
}

fn cluster_breadcrumbs(cluster: &str) -> Vec<Breadcrumb> {
    vec![
        Breadcrumb {
            label: "Clusters".to_string(),
            url: "/ui/clusters".to_string(),
        },
        Breadcrumb {
            label: cluster.to_string(),
            url: nodes_url(cluster),
        },
    ]
}

fn alert_views(state: &AppState, cluster: &str) -> Vec<AlertView> {
    state
        .alerts
        .recent(cluster)
        .into_iter()
        .take(SHOWN_ALERTS)
        .map(|a| AlertView {
            message: a.message,
            level_class: a.level.css_class().to_string(),
            when: human_time(a.at),
        })
        .collect()
}

/// Checkbox forms post one `node=<name>` pair per checked row.
fn checked_nodes(pairs: Vec<(String, String)>) -> Vec<String> {
    pairs
        .into_iter()
        .filter(|(key, _)| key == "node")
        .map(|(_, name)| name)
        .collect()
}

fn condition_views(info: &k8s::Node) -> Vec<ConditionView> {
    info.status
        .conditions
        .iter()
        .map(|c| ConditionView {
            condition_type: c.condition_type.clone(),
            status: c.status.clone(),
            reason: c.reason.clone().unwrap_or_default(),
            message: c.message.clone().unwrap_or_default(),
        })
        .collect()
}

pub async fn handle_root(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.landing_url())
}

// --- Clusters ---

#[derive(Template)]
#[template(path = "clusters.html")]
struct ClustersTemplate {
    title: String,
    breadcrumbs: Vec<Breadcrumb>,
    clusters: Vec<ClusterView>,
    pager: Pager,
    error: String,
}

pub async fn handle_clusters(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Response {
    let (clusters, error) = match state.registry.source().clusters().await {
        Ok(list) => (list.into_iter().map(ClusterView::from).collect(), String::new()),
        Err(e) => {
            tracing::warn!("error listing clusters: {}", e);
            (Vec::new(), e.to_string())
        }
    };
    let pager = query.pager(clusters.len(), &state);

    let tmpl = ClustersTemplate {
        title: "Clusters".to_string(),
        breadcrumbs: vec![Breadcrumb {
            label: "Clusters".to_string(),
            url: "/ui/clusters".to_string(),
        }],
        clusters: pager.slice(clusters),
        pager,
        error,
    };

    render_template(&tmpl)
}

// --- Node list ---

#[derive(Template)]
#[template(path = "nodes.html")]
struct NodesTemplate {
    title: String,
    breadcrumbs: Vec<Breadcrumb>,
    cluster: String,
    loading: bool,
    auto_refresh: bool,
    nodes: Vec<NodeRow>,
    pager: Pager,
    alerts: Vec<AlertView>,
}

pub async fn handle_nodes(
    State(state): State<AppState>,
    Path(cluster): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let list = match state.registry.open(&cluster).await {
        Ok(list) => list,
        Err(e) => return error_response(&e),
    };
    let view = list.view().await;
    let pager = query.pager(view.nodes.len(), &state);

    let tmpl = NodesTemplate {
        title: format!("Nodes: {}", cluster),
        breadcrumbs: cluster_breadcrumbs(&cluster),
        auto_refresh: view.loading || view.polling,
        loading: view.loading,
        nodes: pager.slice(view.nodes),
        pager,
        alerts: alert_views(&state, &cluster),
        cluster,
    };

    render_template(&tmpl)
}

pub async fn handle_refresh(State(state): State<AppState>, Path(cluster): Path<String>) -> Response {
    let list = match state.registry.open(&cluster).await {
        Ok(list) => list,
        Err(e) => return error_response(&e),
    };
    match list.refresh().await {
        Ok(_) => Redirect::to(&nodes_url(&cluster)).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_select(
    State(state): State<AppState>,
    Path(cluster): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let list = match state.registry.open(&cluster).await {
        Ok(list) => list,
        Err(e) => return error_response(&e),
    };
    match list.select(checked_nodes(pairs)).await {
        Ok(_) => Redirect::to(&nodes_url(&cluster)).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_create(State(state): State<AppState>, Path(cluster): Path<String>) -> Response {
    let list = match state.registry.open(&cluster).await {
        Ok(list) => list,
        Err(e) => return error_response(&e),
    };
    match list.request_create() {
        Ok(()) => Redirect::to(&nodes_url(&cluster)).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_delete(
    State(state): State<AppState>,
    Path(cluster): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let list = match state.registry.open(&cluster).await {
        Ok(list) => list,
        Err(e) => return error_response(&e),
    };
    if let Err(e) = list.select(checked_nodes(pairs)).await {
        return error_response(&e);
    }
    match list.request_delete().await {
        Ok(_) => Redirect::to(&nodes_url(&cluster)).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn handle_close(State(state): State<AppState>, Path(cluster): Path<String>) -> Redirect {
    state.registry.close(&cluster).await;
    Redirect::to("/ui/clusters")
}

// --- Node detail ---

#[derive(Template)]
#[template(path = "node_detail.html")]
struct NodeDetailTemplate {
    title: String,
    breadcrumbs: Vec<Breadcrumb>,
    node: NodeRow,
    conditions: Vec<ConditionView>,
    labels: BTreeMap<String, String>,
    raw: String,
}

pub async fn handle_node_detail(
    State(state): State<AppState>,
    Path((cluster, name)): Path<(String, String)>,
) -> Response {
    let list = match state.registry.open(&cluster).await {
        Ok(list) => list,
        Err(e) => return error_response(&e),
    };
    let info = match list.open_detail(&name).await {
        Ok(info) => info,
        // the list already raised an alert for it
        Err(ConsoleError::NodeNotReady(_)) => {
            return Redirect::to(&nodes_url(&cluster)).into_response();
        }
        Err(e) => return error_response(&e),
    };

    let node = match list.snapshot().await.find(&name) {
        Some(n) => NodeRow::build(n, false),
        None => return error_response(&ConsoleError::NodeNotFound(name)),
    };

    let mut breadcrumbs = cluster_breadcrumbs(&cluster);
    breadcrumbs.push(Breadcrumb {
        label: name.clone(),
        url: String::new(),
    });

    let tmpl = NodeDetailTemplate {
        title: format!("Node: {}", name),
        breadcrumbs,
        node,
        conditions: condition_views(&info),
        raw: serde_json::to_string_pretty(&info).unwrap_or_default(),
        labels: info.metadata.labels,
    };

    render_template(&tmpl)
}

// --- Node status ---

#[derive(Template)]
#[template(path = "node_status.html")]
struct NodeStatusTemplate {
    title: String,
    breadcrumbs: Vec<Breadcrumb>,
    cluster: String,
    node: NodeRow,
    conditions: Vec<ConditionView>,
}

pub async fn handle_node_status(
    State(state): State<AppState>,
    Path((cluster, name)): Path<(String, String)>,
) -> Response {
    let list = match state.registry.open(&cluster).await {
        Ok(list) => list,
        Err(e) => return error_response(&e),
    };
    let node = match list.show_status(&name).await {
        Ok(n) => n,
        Err(e) => return error_response(&e),
    };

    let conditions = node
        .state()
        .info()
        .map(condition_views)
        .unwrap_or_default();

    let mut breadcrumbs = cluster_breadcrumbs(&cluster);
    breadcrumbs.push(Breadcrumb {
        label: format!("{} status", name),
        url: String::new(),
    });

    let tmpl = NodeStatusTemplate {
        title: format!("Status: {}", name),
        breadcrumbs,
        node: NodeRow::build(&node, false),
        conditions,
        cluster,
    };

    render_template(&tmpl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_node_pairs_are_checked() {
        let pairs = vec![
            ("node".to_string(), "worker-1".to_string()),
            ("action".to_string(), "delete".to_string()),
            ("node".to_string(), "worker-2".to_string()),
        ];
        assert_eq!(
            checked_nodes(pairs),
            vec!["worker-1".to_string(), "worker-2".to_string()]
        );
    }

    #[test]
    fn breadcrumbs_link_back_to_node_list() {
        let crumbs = cluster_breadcrumbs("prod");
        assert_eq!(crumbs.len(), 2);
        assert_eq!(crumbs[1].url, "/ui/clusters/prod/nodes");
    }
}
