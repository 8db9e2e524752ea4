use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    pub fn css_class(self) -> &'static str {
        match self {
            AlertLevel::Info => "alert-info",
            AlertLevel::Warning => "alert-warning",
            AlertLevel::Error => "alert-error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub cluster: String,
    pub message: String,
    pub level: AlertLevel,
    pub at: DateTime<Utc>,
}

/// Fire-and-forget user notifications.
pub trait AlertSink: Send + Sync {
    fn show_alert(&self, cluster: &str, message: &str, level: AlertLevel);
}

/// Keeps the most recent alerts of each cluster for the UI. `capacity`
/// bounds every cluster's history on its own.
pub struct AlertFeed {
    capacity: usize,
    alerts: Mutex<HashMap<String, VecDeque<Alert>>>,
}

impl AlertFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            alerts: Mutex::new(HashMap::new()),
        }
    }

    /// Newest first.
    pub fn recent(&self, cluster: &str) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cluster)
            .map(|ring| ring.iter().rev().cloned().collect())
            .unwrap_or_default()
    }
}

impl AlertSink for AlertFeed {
    fn show_alert(&self, cluster: &str, message: &str, level: AlertLevel) {
        match level {
            AlertLevel::Info => info!(cluster, "{}", message),
            AlertLevel::Warning => warn!(cluster, "{}", message),
            AlertLevel::Error => error!(cluster, "{}", message),
        }

        let mut alerts = self.alerts.lock().unwrap_or_else(PoisonError::into_inner);
        let ring = alerts.entry(cluster.to_string()).or_default();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(Alert {
            cluster: cluster.to_string(),
            message: message.to_string(),
            level,
            at: Utc::now(),
        });
    }
}
