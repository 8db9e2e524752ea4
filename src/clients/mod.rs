pub mod alerts;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::{ConsoleError, Result};
use crate::models::node::{BatchOperation, BatchRequest, ClusterRecord, NodeRecord};

/// The node query side of the cluster backend.
pub trait NodeSource: Send + Sync + 'static {
    fn list(&self, cluster: &str) -> impl Future<Output = Result<Vec<NodeRecord>>> + Send;

    fn batch(
        &self,
        cluster: &str,
        operation: BatchOperation,
        names: &[String],
    ) -> impl Future<Output = Result<()>> + Send;

    fn clusters(&self) -> impl Future<Output = Result<Vec<ClusterRecord>>> + Send;
}

pub struct NodeService {
    base_url: Url,
    http: Client,
}

impl NodeService {
    pub fn new(cfg: &BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        let base_url = Url::parse(&cfg.base_url)
            .map_err(|e| ConsoleError::Config(format!("backend.base_url {:?}: {}", cfg.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConsoleError::Config(format!(
                "backend.base_url {:?} cannot carry a path",
                cfg.base_url
            )));
        }

        Ok(Self { base_url, http })
    }

    /// Appends `segments` to the base URL, percent-encoding each one so a
    /// cluster name can never add path levels.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let resp = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if resp.status().as_u16() >= 400 {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ConsoleError::Backend { status, body });
        }
        Ok(resp.json().await?)
    }

    async fn post_json(&self, url: Url, body: &impl serde::Serialize) -> Result<()> {
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        if resp.status().as_u16() >= 400 {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ConsoleError::Backend { status, body });
        }
        Ok(())
    }
}

impl NodeSource for NodeService {
    async fn list(&self, cluster: &str) -> Result<Vec<NodeRecord>> {
        self.get_json(self.endpoint(&["api", "v1", "clusters", cluster, "nodes"]))
            .await
    }

    async fn batch(
        &self,
        cluster: &str,
        operation: BatchOperation,
        names: &[String],
    ) -> Result<()> {
        let body = BatchRequest::new(operation, names);
        self.post_json(
            self.endpoint(&["api", "v1", "clusters", cluster, "nodes", "batch"]),
            &body,
        )
        .await
    }

    async fn clusters(&self) -> Result<Vec<ClusterRecord>> {
        self.get_json(self.endpoint(&["api", "v1", "clusters"])).await
    }
}
