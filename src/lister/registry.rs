use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::NodeSource;
use crate::clients::alerts::{AlertLevel, AlertSink};
use crate::error::{ConsoleError, Result};
use crate::models::node::BatchOperation;

use super::poller::Poller;
use super::{NodeList, NodeListEvent};

struct OpenList<S> {
    list: Arc<NodeList<S>>,
    poller: Poller,
    dispatcher: JoinHandle<()>,
    last_used: Instant,
}

impl<S: NodeSource> OpenList<S> {
    fn is_idle(&self, idle: Duration, now: Instant) -> bool {
        self.list.viewer_count() == 0 && now.duration_since(self.last_used) >= idle
    }
}

/// Starts a node list per cluster on first use and tears it down on close,
/// or once nobody has used it for a while.
pub struct NodeListRegistry<S> {
    source: Arc<S>,
    alerts: Arc<dyn AlertSink>,
    lists: Mutex<HashMap<String, OpenList<S>>>,
}

impl<S: NodeSource> NodeListRegistry<S> {
    pub fn new(source: Arc<S>, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            source,
            alerts,
            lists: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Returns the running list of `cluster`, starting one if the backend
    /// knows the cluster.
    pub async fn open(&self, cluster: &str) -> Result<Arc<NodeList<S>>> {
        if let Some(list) = self.touch(cluster).await {
            return Ok(list);
        }

        let known = self.source.clusters().await?;
        if !known.iter().any(|c| c.name == cluster) {
            debug!(cluster, "refusing to open unknown cluster");
            return Err(ConsoleError::ClusterNotFound(cluster.to_string()));
        }

        let mut lists = self.lists.lock().await;
        if let Some(open) = lists.get_mut(cluster) {
            open.last_used = Instant::now();
            return Ok(open.list.clone());
        }

        info!(cluster, "opening node list");
        let (list, events) = NodeList::new(cluster, self.source.clone(), self.alerts.clone());
        let list = Arc::new(list);

        let initial = list.clone();
        tokio::spawn(async move {
            if let Err(e) = initial.refresh().await {
                warn!(cluster = initial.cluster(), "initial node list fetch failed: {}", e);
            }
        });

        let cancel = CancellationToken::new();
        let poller = Poller::spawn(list.clone(), cancel.clone());
        let dispatcher = tokio::spawn(dispatch(
            list.clone(),
            events,
            self.source.clone(),
            self.alerts.clone(),
            cancel,
        ));

        lists.insert(
            cluster.to_string(),
            OpenList {
                list: list.clone(),
                poller,
                dispatcher,
                last_used: Instant::now(),
            },
        );
        Ok(list)
    }

    async fn touch(&self, cluster: &str) -> Option<Arc<NodeList<S>>> {
        let mut lists = self.lists.lock().await;
        let open = lists.get_mut(cluster)?;
        open.last_used = Instant::now();
        Some(open.list.clone())
    }

    /// Tears down every list without viewers that was last opened at least
    /// `idle` ago. Returns the clusters that were closed.
    pub async fn reap_idle(&self, idle: Duration) -> Vec<String> {
        let now = Instant::now();
        let reaped: Vec<(String, OpenList<S>)> = {
            let mut lists = self.lists.lock().await;
            let names: Vec<String> = lists
                .iter()
                .filter(|(_, open)| open.is_idle(idle, now))
                .map(|(name, _)| name.clone())
                .collect();
            names
                .into_iter()
                .filter_map(|name| lists.remove(&name).map(|open| (name, open)))
                .collect()
        };

        let mut closed = Vec::with_capacity(reaped.len());
        for (name, open) in reaped {
            info!(cluster = %name, idle_secs = idle.as_secs(), "closing idle node list");
            teardown(open).await;
            closed.push(name);
        }
        closed
    }

    /// Periodically reaps idle lists until `shutdown` fires.
    pub async fn run_reaper(self: Arc<Self>, idle: Duration, mut shutdown: watch::Receiver<()>) {
        let mut interval = time::interval((idle / 4).max(Duration::from_secs(1)));
        interval.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.reap_idle(idle).await;
                }
                _ = shutdown.changed() => {
                    info!("node list reaper shutting down");
                    return;
                }
            }
        }
    }

    /// Returns false if the cluster had no open list.
    pub async fn close(&self, cluster: &str) -> bool {
        let open = self.lists.lock().await.remove(cluster);
        match open {
            Some(open) => {
                teardown(open).await;
                true
            }
            None => false,
        }
    }

    pub async fn shutdown(&self) {
        let drained: Vec<OpenList<S>> = self.lists.lock().await.drain().map(|(_, o)| o).collect();
        for open in drained {
            teardown(open).await;
        }
    }
}

async fn teardown<S: NodeSource>(open: OpenList<S>) {
    open.list.close();
    open.poller.shutdown().await;
    let _ = open.dispatcher.await;
}

/// Acts on the events a node list emits.
async fn dispatch<S: NodeSource>(
    list: Arc<NodeList<S>>,
    mut events: mpsc::UnboundedReceiver<NodeListEvent>,
    source: Arc<S>,
    alerts: Arc<dyn AlertSink>,
    cancel: CancellationToken,
) {
    let cluster = list.cluster().to_string();
    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => event,
                None => return,
            },
            _ = cancel.cancelled() => return,
        };

        match event {
            NodeListEvent::DeleteRequested(names) => {
                if names.is_empty() {
                    continue;
                }
                info!(cluster = %cluster, nodes = ?names, "deleting nodes");
                match source.batch(&cluster, BatchOperation::Delete, &names).await {
                    Ok(()) => {
                        alerts.show_alert(
                            &cluster,
                            &format!("deleting {} node(s)", names.len()),
                            AlertLevel::Info,
                        );
                        if let Err(e) = list.refresh().await {
                            warn!(cluster = %cluster, "refresh after delete failed: {}", e);
                        }
                    }
                    Err(e) => {
                        alerts.show_alert(
                            &cluster,
                            &format!("delete failed: {}", e),
                            AlertLevel::Error,
                        );
                    }
                }
            }
            NodeListEvent::CreateRequested => {
                alerts.show_alert(&cluster, "node creation requested", AlertLevel::Info);
            }
            NodeListEvent::StatusRequested(node) => {
                debug!(cluster = %cluster, node = node.name(), "status requested");
            }
            NodeListEvent::OpenDetail(node) => {
                debug!(cluster = %cluster, node = %node.metadata.name, "detail opened");
            }
        }
    }
}
