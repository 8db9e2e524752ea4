use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConsoleError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    pub backend: BackendConfig,
    #[serde(default)]
    pub default_cluster: Option<String>,
    #[serde(default = "default_alert_history")]
    pub alert_history: usize,
    /// Rows per page in the node table and the cluster index.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Seconds a node list may go unused before it is torn down.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_listen_port() -> u16 {
    9090
}

fn default_alert_history() -> usize {
    50
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> usize {
    10
}

fn default_idle_timeout_secs() -> u64 {
    60
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ConsoleError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self> {
        let mut cfg: Config = serde_yaml::from_str(data)
            .map_err(|e| ConsoleError::Config(format!("parsing config: {}", e)))?;

        cfg.backend.base_url = cfg.backend.base_url.trim_end_matches('/').to_string();
        if cfg.backend.base_url.is_empty() {
            return Err(ConsoleError::Config(
                "backend.base_url must be configured".to_string(),
            ));
        }

        if cfg.page_size == 0 {
            return Err(ConsoleError::Config("page_size must be at least 1".to_string()));
        }
        if cfg.idle_timeout_secs == 0 {
            return Err(ConsoleError::Config(
                "idle_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(cfg)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.listen_port)
    }

    pub fn landing_url(&self) -> String {
        match &self.default_cluster {
            Some(cluster) => format!("/ui/clusters/{}/nodes", cluster),
            None => "/ui/clusters".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let cfg = Config::parse("backend:\n  base_url: http://ko:8080/\n").unwrap();
        assert_eq!(cfg.listen_port, 9090);
        assert_eq!(cfg.alert_history, 50);
        assert_eq!(cfg.backend.timeout_secs, 10);
        assert_eq!(cfg.page_size, 10);
        assert_eq!(cfg.idle_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.backend.base_url, "http://ko:8080");
        assert_eq!(cfg.landing_url(), "/ui/clusters");
    }

    #[test]
    fn default_cluster_sets_landing_page() {
        let cfg = Config::parse(
            "listen_port: 8000\ndefault_cluster: prod\nbackend:\n  base_url: http://ko\n",
        )
        .unwrap();
        assert_eq!(cfg.listen_addr(), "0.0.0.0:8000");
        assert_eq!(cfg.landing_url(), "/ui/clusters/prod/nodes");
    }

    #[test]
    fn empty_backend_url_is_rejected() {
        let err = Config::parse("backend:\n  base_url: \"\"\n").unwrap_err();
        assert!(matches!(err, ConsoleError::Config(_)));
    }

    #[test]
    fn zero_page_size_and_idle_timeout_are_rejected() {
        let base = "backend:\n  base_url: http://ko\n";
        assert!(Config::parse(&format!("page_size: 0\n{}", base)).is_err());
        assert!(Config::parse(&format!("idle_timeout_secs: 0\n{}", base)).is_err());
        let cfg = Config::parse(&format!("page_size: 25\nidle_timeout_secs: 300\n{}", base)).unwrap();
        assert_eq!(cfg.page_size, 25);
        assert_eq!(cfg.idle_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn missing_backend_is_rejected() {
        assert!(Config::parse("listen_port: 1\n").is_err());
    }
}
