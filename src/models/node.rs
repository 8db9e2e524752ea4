use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

use super::k8s;

pub const STATUS_RUNNING: &str = "Running";

/// Statuses that keep the poller fetching.
pub const TRANSIENT_STATUSES: [&str; 3] = ["Waiting", "Initializing", "Terminating"];

pub fn is_transient(status: &str) -> bool {
    TRANSIENT_STATUSES.contains(&status)
}

// --- Backend wire types ---

/// A node entry as the cluster backend returns it. `info` is only populated
/// for running nodes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<k8s::Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub node_size: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchOperation {
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub operation: BatchOperation,
    pub items: Vec<BatchItem>,
}

impl BatchRequest {
    pub fn new(operation: BatchOperation, names: &[String]) -> Self {
        Self {
            operation,
            items: names
                .iter()
                .map(|name| BatchItem { name: name.clone() })
                .collect(),
        }
    }
}

// --- View record ---

#[derive(Debug, Clone, PartialEq)]
pub enum NodeState {
    Running(Box<k8s::Node>),
    NotRunning(String),
}

impl NodeState {
    /// A "Running" record without `info` has nothing to derive fields from,
    /// so it is held as not running.
    pub fn from_wire(status: String, info: Option<k8s::Node>) -> Self {
        match info {
            Some(info) if status == STATUS_RUNNING => NodeState::Running(Box::new(info)),
            _ => NodeState::NotRunning(status),
        }
    }

    pub fn raw_status(&self) -> &str {
        match self {
            NodeState::Running(_) => STATUS_RUNNING,
            NodeState::NotRunning(status) => status,
        }
    }

    pub fn info(&self) -> Option<&k8s::Node> {
        match self {
            NodeState::Running(info) => Some(info),
            NodeState::NotRunning(_) => None,
        }
    }
}

/// A row of the node list. The poller patches `state` in place so the
/// `Arc<ClusterNode>` handed out earlier keeps pointing at the live entry.
#[derive(Debug)]
pub struct ClusterNode {
    name: String,
    state: RwLock<NodeState>,
}

impl ClusterNode {
    pub fn new(name: impl Into<String>, state: NodeState) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(state),
        }
    }

    pub fn from_record(record: NodeRecord) -> Self {
        Self::new(record.name, NodeState::from_wire(record.status, record.info))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> NodeState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn raw_status(&self) -> String {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .raw_status()
            .to_string()
    }

    pub fn is_transient(&self) -> bool {
        is_transient(
            self.state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .raw_status(),
        )
    }

    /// Replaces the state when the fetched status differs from the held one.
    /// Returns whether anything changed.
    pub fn patch(&self, fetched: NodeState) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.raw_status() == fetched.raw_status() {
            return false;
        }
        *state = fetched;
        true
    }
}
