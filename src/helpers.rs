use chrono::{DateTime, Utc};

use crate::models::k8s;
use crate::models::node::{NodeState, is_transient};

pub const NOT_AVAILABLE: &str = "N/A";

const LABEL_ROLE_MASTER: &str = "node-role.kubernetes.io/master";
const LABEL_ROLE_ETCD: &str = "node-role.kubernetes.io/etcd";
const LABEL_ROLE_WORKER: &str = "node-role.kubernetes.io/worker";

const KIB_PER_GIB: f64 = 1024.0 * 1024.0;

/// Display status: readiness for running nodes, the raw backend status otherwise.
pub fn node_status(state: &NodeState) -> String {
    match state {
        NodeState::Running(info) => is_node_ready(info).to_string(),
        NodeState::NotRunning(status) => status.clone(),
    }
}

/// Every "Ready" condition is visited; any "True" one marks the node ready.
pub fn is_node_ready(node: &k8s::Node) -> &'static str {
    let mut result = "NotReady";
    for cond in &node.status.conditions {
        if cond.condition_type == "Ready" && cond.status == "True" {
            result = "Ready";
        }
    }
    result
}

pub fn internal_ip(state: &NodeState) -> String {
    let Some(info) = state.info() else {
        return NOT_AVAILABLE.to_string();
    };

    let mut result = NOT_AVAILABLE;
    for addr in &info.status.addresses {
        if addr.address_type == "InternalIP" {
            result = &addr.address;
        }
    }
    result.to_string()
}

pub fn version(state: &NodeState) -> String {
    match state.info() {
        Some(info) => info.status.node_info.kubelet_version.clone(),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn ram(state: &NodeState) -> String {
    state
        .info()
        .and_then(|info| info.status.capacity.get("memory"))
        .map(|mem| ram_format(mem))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn cpu_core(state: &NodeState) -> String {
    state
        .info()
        .and_then(|info| info.status.capacity.get("cpu"))
        .cloned()
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Converts a kibibyte capacity ("8167940Ki") to gibibytes. Other units are
/// not understood and come out as zero.
pub fn ram_format(memory: &str) -> String {
    let mut gib = 0.0;
    if memory.ends_with("Ki") {
        if let Some(idx) = memory.find("Ki") {
            gib = memory[..idx].trim().parse::<f64>().unwrap_or(0.0) / KIB_PER_GIB;
        }
    }
    format!("{:.2}GB", gib)
}

pub fn roles(state: &NodeState) -> Vec<String> {
    let Some(info) = state.info() else {
        return Vec::new();
    };

    let mut roles = Vec::new();
    for key in info.metadata.labels.keys() {
        match key.as_str() {
            LABEL_ROLE_MASTER => roles.push("master".to_string()),
            LABEL_ROLE_ETCD => roles.push("etcd".to_string()),
            LABEL_ROLE_WORKER => roles.push("worker".to_string()),
            _ => {}
        }
    }
    roles
}

pub fn status_class(status: &str) -> &'static str {
    match status {
        "Ready" | "Running" => "badge-success",
        "NotReady" | "Failed" => "badge-error",
        s if is_transient(s) => "badge-warning",
        _ => "badge-info",
    }
}

pub fn human_time(t: DateTime<Utc>) -> String {
    let d = Utc::now() - t;
    let secs = d.num_seconds();

    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        let m = d.num_minutes();
        if m == 1 {
            "1 minute ago".to_string()
        } else {
            format!("{} minutes ago", m)
        }
    } else if secs < 86400 {
        let h = d.num_hours();
        if h == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{} hours ago", h)
        }
    } else {
        t.format("%b %e, %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::k8s::{NodeAddress, NodeCondition};
    use chrono::Duration;

    fn condition(t: &str, s: &str) -> NodeCondition {
        NodeCondition {
            condition_type: t.to_string(),
            status: s.to_string(),
            ..Default::default()
        }
    }

    fn address(t: &str, a: &str) -> NodeAddress {
        NodeAddress {
            address_type: t.to_string(),
            address: a.to_string(),
        }
    }

    fn running(info: k8s::Node) -> NodeState {
        NodeState::Running(Box::new(info))
    }

    fn sample_info() -> k8s::Node {
        let mut info = k8s::Node::default();
        info.status.conditions = vec![condition("Ready", "True")];
        info.status.addresses = vec![address("InternalIP", "10.0.0.5")];
        info.status
            .capacity
            .insert("memory".to_string(), "2097152Ki".to_string());
        info.status.capacity.insert("cpu".to_string(), "4".to_string());
        info.status.node_info.kubelet_version = "v1.18.6".to_string();
        info.metadata
            .labels
            .insert(LABEL_ROLE_WORKER.to_string(), String::new());
        info
    }

    #[test]
    fn not_running_fields_are_not_available() {
        for status in ["Waiting", "Initializing", "Terminating", "Failed", "Running"] {
            let state = NodeState::NotRunning(status.to_string());
            assert_eq!(node_status(&state), status);
            assert_eq!(internal_ip(&state), NOT_AVAILABLE);
            assert_eq!(version(&state), NOT_AVAILABLE);
            assert_eq!(ram(&state), NOT_AVAILABLE);
            assert_eq!(cpu_core(&state), NOT_AVAILABLE);
            assert!(roles(&state).is_empty());
        }
    }

    #[test]
    fn running_fields_are_derived() {
        let state = running(sample_info());
        assert_eq!(node_status(&state), "Ready");
        assert_eq!(internal_ip(&state), "10.0.0.5");
        assert_eq!(version(&state), "v1.18.6");
        assert_eq!(ram(&state), "2.00GB");
        assert_eq!(cpu_core(&state), "4");
        assert_eq!(roles(&state), vec!["worker".to_string()]);
    }

    #[test]
    fn missing_capacity_is_not_available() {
        let state = running(k8s::Node::default());
        assert_eq!(ram(&state), NOT_AVAILABLE);
        assert_eq!(cpu_core(&state), NOT_AVAILABLE);
        assert_eq!(internal_ip(&state), NOT_AVAILABLE);
    }

    #[test]
    fn ram_format_handles_kibibytes_only() {
        assert_eq!(ram_format("2097152Ki"), "2.00GB");
        assert_eq!(ram_format("1048576Ki"), "1.00GB");
        assert_eq!(ram_format("8167940Ki"), "7.79GB");
        assert_eq!(ram_format("500Mi"), "0.00GB");
        assert_eq!(ram_format("1073741824"), "0.00GB");
        assert_eq!(ram_format("abcKi"), "0.00GB");
    }

    #[test]
    fn readiness_is_not_reset_by_later_conditions() {
        let mut info = k8s::Node::default();
        info.status.conditions = vec![condition("Ready", "False"), condition("Ready", "True")];
        assert_eq!(is_node_ready(&info), "Ready");

        info.status.conditions = vec![condition("MemoryPressure", "False")];
        assert_eq!(is_node_ready(&info), "NotReady");

        info.status.conditions = vec![condition("Ready", "Unknown")];
        assert_eq!(is_node_ready(&info), "NotReady");

        info.status.conditions.clear();
        assert_eq!(is_node_ready(&info), "NotReady");
    }

    #[test]
    fn last_internal_ip_wins() {
        let mut info = k8s::Node::default();
        info.status.addresses = vec![
            address("InternalIP", "10.0.0.1"),
            address("Hostname", "worker-1"),
            address("InternalIP", "10.0.0.2"),
        ];
        assert_eq!(internal_ip(&running(info)), "10.0.0.2");
    }

    #[test]
    fn roles_from_well_known_labels() {
        let mut info = k8s::Node::default();
        info.metadata
            .labels
            .insert(LABEL_ROLE_MASTER.to_string(), String::new());
        info.metadata.labels.insert("foo".to_string(), "bar".to_string());
        assert_eq!(roles(&running(info.clone())), vec!["master".to_string()]);

        info.metadata
            .labels
            .insert(LABEL_ROLE_ETCD.to_string(), String::new());
        assert_eq!(
            roles(&running(info)),
            vec!["etcd".to_string(), "master".to_string()]
        );

        let mut plain = k8s::Node::default();
        plain
            .metadata
            .labels
            .insert("kubernetes.io/hostname".to_string(), "n1".to_string());
        assert!(roles(&running(plain)).is_empty());
    }

    #[test]
    fn status_classes() {
        assert_eq!(status_class("Ready"), "badge-success");
        assert_eq!(status_class("NotReady"), "badge-error");
        assert_eq!(status_class("Waiting"), "badge-warning");
        assert_eq!(status_class("Something"), "badge-info");
    }

    #[test]
    fn human_time_buckets() {
        assert_eq!(human_time(Utc::now()), "just now");
        assert_eq!(human_time(Utc::now() - Duration::minutes(5)), "5 minutes ago");
        assert_eq!(human_time(Utc::now() - Duration::hours(1)), "1 hour ago");
    }
}
