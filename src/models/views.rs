use serde::Serialize;

use crate::helpers;
use crate::models::node::{ClusterNode, ClusterRecord};

/// Display row for one node; every field is already a display string.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeRow {
    pub name: String,
    pub status: String,
    pub status_class: String,
    pub internal_ip: String,
    pub version: String,
    pub ram: String,
    pub cpu_core: String,
    pub roles: Vec<String>,
    pub running: bool,
    pub selected: bool,
}

impl NodeRow {
    pub fn build(node: &ClusterNode, selected: bool) -> Self {
        let state = node.state();
        let status = helpers::node_status(&state);
        NodeRow {
            name: node.name().to_string(),
            status_class: helpers::status_class(&status).to_string(),
            status,
            internal_ip: helpers::internal_ip(&state),
            version: helpers::version(&state),
            ram: helpers::ram(&state),
            cpu_core: helpers::cpu_core(&state),
            roles: helpers::roles(&state),
            running: state.info().is_some(),
            selected,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeListView {
    pub cluster: String,
    pub generation: u64,
    pub loading: bool,
    pub polling: bool,
    pub nodes: Vec<NodeRow>,
}

#[derive(Debug, Clone, Default)]
pub struct ClusterView {
    pub name: String,
    pub status: String,
    pub status_class: String,
    pub node_size: usize,
}

impl From<ClusterRecord> for ClusterView {
    fn from(c: ClusterRecord) -> Self {
        ClusterView {
            status_class: helpers::status_class(&c.status).to_string(),
            name: c.name,
            status: c.status,
            node_size: c.node_size,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlertView {
    pub message: String,
    pub level_class: String,
    pub when: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConditionView {
    pub condition_type: String,
    pub status: String,
    pub reason: String,
    pub message: String,
}

/// Position within a paged table. `page` is 1-based and always in range,
/// even for an empty table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page: usize,
    pub pages: usize,
    pub total: usize,
    size: usize,
}

impl Pager {
    pub fn new(total: usize, page: usize, size: usize) -> Self {
        let size = size.max(1);
        let pages = total.div_ceil(size).max(1);
        Pager {
            page: page.clamp(1, pages),
            pages,
            total,
            size,
        }
    }

    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip((self.page - 1) * self.size)
            .take(self.size)
            .collect()
    }

    pub fn prev(&self) -> Option<usize> {
        (self.page > 1).then(|| self.page - 1)
    }

    pub fn next(&self) -> Option<usize> {
        (self.page < self.pages).then(|| self.page + 1)
    }
}
