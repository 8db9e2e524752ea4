pub mod poller;
pub mod registry;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use futures_util::stream::{StreamExt, TakeUntil};
use tokio::sync::{RwLock, mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info, warn};

use crate::clients::NodeSource;
use crate::clients::alerts::{AlertLevel, AlertSink};
use crate::error::{ConsoleError, Result};
use crate::models::k8s;
use crate::models::node::{ClusterNode, NodeRecord, NodeState};
use crate::models::views::{NodeListView, NodeRow};

/// Notifications the node list hands to whoever owns it.
#[derive(Debug, Clone)]
pub enum NodeListEvent {
    OpenDetail(Box<k8s::Node>),
    CreateRequested,
    StatusRequested(Arc<ClusterNode>),
    DeleteRequested(Vec<String>),
}

/// Immutable view of the list. Full refreshes and status polls are ordered
/// separately: a poll never supersedes a refresh, it only patches statuses.
#[derive(Debug, Clone, Default)]
pub struct NodeListState {
    /// Ticket of the newest fetch of either kind that was applied.
    pub generation: u64,
    pub refresh_generation: u64,
    pub poll_generation: u64,
    pub loading: bool,
    pub nodes: Vec<Arc<ClusterNode>>,
    pub selected: BTreeSet<String>,
    last_poll: Option<Arc<Vec<NodeRecord>>>,
}

impl NodeListState {
    /// Patches held nodes from `records`. Returns how many changed.
    fn patch_from(&self, cluster: &str, records: &[NodeRecord]) -> usize {
        let mut patched = 0;
        for record in records {
            let Some(node) = self.find(&record.name) else {
                continue;
            };
            let from = node.raw_status();
            if node.patch(NodeState::from_wire(record.status.clone(), record.info.clone())) {
                info!(
                    cluster,
                    node = node.name(),
                    from = %from,
                    to = %node.raw_status(),
                    "node status changed"
                );
                patched += 1;
            }
        }
        patched
    }

    pub fn has_transient(&self) -> bool {
        self.nodes.iter().any(|n| n.is_transient())
    }

    pub fn find(&self, name: &str) -> Option<&Arc<ClusterNode>> {
        self.nodes.iter().find(|n| n.name() == name)
    }
}

/// Nodes of one cluster, refreshed on demand and patched by the poller.
pub struct NodeList<S> {
    cluster: String,
    source: Arc<S>,
    alerts: Arc<dyn AlertSink>,
    events: mpsc::UnboundedSender<NodeListEvent>,
    state: RwLock<Arc<NodeListState>>,
    tickets: AtomicU64,
    closed: CancellationToken,
    changes: watch::Sender<u64>,
    viewers: AtomicUsize,
}

/// Stream of change notifications that ends when the list is closed.
pub type NodeListUpdates = TakeUntil<WatchStream<u64>, WaitForCancellationFutureOwned>;

impl<S: NodeSource> NodeList<S> {
    pub fn new(
        cluster: impl Into<String>,
        source: Arc<S>,
        alerts: Arc<dyn AlertSink>,
    ) -> (Self, mpsc::UnboundedReceiver<NodeListEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (changes, _) = watch::channel(0);
        let list = Self {
            cluster: cluster.into(),
            source,
            alerts,
            events,
            state: RwLock::new(Arc::new(NodeListState {
                loading: true,
                ..Default::default()
            })),
            tickets: AtomicU64::new(0),
            closed: CancellationToken::new(),
            changes,
            viewers: AtomicUsize::new(0),
        };
        (list, events_rx)
    }

    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    pub async fn snapshot(&self) -> Arc<NodeListState> {
        self.state.read().await.clone()
    }

    /// Fires whenever the held nodes change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Yields the current generation right away, then on every change.
    pub fn updates(&self) -> NodeListUpdates {
        WatchStream::new(self.changes.subscribe()).take_until(self.closed.clone().cancelled_owned())
    }

    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            self.closed.cancel();
            info!(cluster = %self.cluster, "node list closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Keeps the list from being reaped as idle while the guard lives.
    pub fn viewer(self: &Arc<Self>) -> ViewerGuard<S> {
        self.viewers.fetch_add(1, Ordering::SeqCst);
        ViewerGuard { list: self.clone() }
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ConsoleError::Closed);
        }
        Ok(())
    }

    fn issue_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn emit(&self, event: NodeListEvent) {
        debug!(cluster = %self.cluster, ?event, "emitting node list event");
        let _ = self.events.send(event);
    }

    // --- Lister ---

    /// Fetches the whole list and replaces the held nodes. Clears the selection.
    /// Returns false when a refresh issued later had already been applied.
    pub async fn refresh(&self) -> Result<bool> {
        self.ensure_open()?;
        let ticket = self.issue_ticket();
        let records = match self.source.list(&self.cluster).await {
            Ok(records) => records,
            Err(e) => {
                warn!(cluster = %self.cluster, "error listing nodes: {}", e);
                return Err(e);
            }
        };
        self.apply_refresh(ticket, records).await
    }

    async fn apply_refresh(&self, ticket: u64, records: Vec<NodeRecord>) -> Result<bool> {
        let mut state = self.state.write().await;
        self.ensure_open()?;
        if ticket <= state.refresh_generation {
            debug!(
                cluster = %self.cluster,
                ticket,
                generation = state.refresh_generation,
                "discarding stale node list"
            );
            return Ok(false);
        }

        let nodes: Vec<Arc<ClusterNode>> = records
            .into_iter()
            .map(|r| Arc::new(ClusterNode::from_record(r)))
            .collect();
        info!(cluster = %self.cluster, nodes = nodes.len(), "node list refreshed");

        let mut next = NodeListState {
            generation: ticket.max(state.poll_generation),
            refresh_generation: ticket,
            poll_generation: state.poll_generation,
            loading: false,
            nodes,
            selected: BTreeSet::new(),
            last_poll: None,
        };
        // a poll issued after this refresh saw fresher statuses
        if state.poll_generation > ticket {
            if let Some(polled) = &state.last_poll {
                next.patch_from(&self.cluster, polled);
                next.last_poll = Some(polled.clone());
            }
        }

        *state = Arc::new(next);
        self.changes.send_replace(state.generation);
        Ok(true)
    }

    // --- Poller support ---

    pub async fn has_transient(&self) -> bool {
        self.state.read().await.has_transient()
    }

    /// One poll tick. Returns whether a fetch was issued.
    pub async fn poll_once(&self) -> Result<bool> {
        self.ensure_open()?;
        if !self.has_transient().await {
            return Ok(false);
        }

        let ticket = self.issue_ticket();
        debug!(cluster = %self.cluster, ticket, "polling transient nodes");
        let records = self.source.list(&self.cluster).await?;
        self.apply_poll(ticket, records).await?;
        Ok(true)
    }

    /// Patches the status of held nodes in place. Unknown names are dropped and
    /// held nodes missing from `records` are left alone.
    async fn apply_poll(&self, ticket: u64, records: Vec<NodeRecord>) -> Result<usize> {
        let mut state = self.state.write().await;
        self.ensure_open()?;
        if ticket <= state.refresh_generation || ticket <= state.poll_generation {
            debug!(cluster = %self.cluster, ticket, "discarding stale poll result");
            return Ok(0);
        }

        let patched = state.patch_from(&self.cluster, &records);

        let mut next = NodeListState::clone(&state);
        next.generation = ticket;
        next.poll_generation = ticket;
        next.last_poll = Some(Arc::new(records));
        *state = Arc::new(next);
        if patched > 0 {
            self.changes.send_replace(ticket);
        }
        Ok(patched)
    }

    // --- Selection ---

    /// Replaces the selection. Names not in the list are ignored.
    pub async fn select<I>(&self, names: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = String>,
    {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        let selected: BTreeSet<String> = names
            .into_iter()
            .filter(|name| state.find(name).is_some())
            .collect();

        let mut next = NodeListState::clone(&state);
        next.selected = selected.clone();
        *state = Arc::new(next);
        Ok(selected)
    }

    pub async fn selection(&self) -> BTreeSet<String> {
        self.state.read().await.selected.clone()
    }

    // --- Outbound actions ---

    pub async fn open_detail(&self, name: &str) -> Result<k8s::Node> {
        self.ensure_open()?;
        let node = self
            .snapshot()
            .await
            .find(name)
            .cloned()
            .ok_or_else(|| ConsoleError::NodeNotFound(name.to_string()))?;

        match node.state() {
            NodeState::Running(info) => {
                self.emit(NodeListEvent::OpenDetail(info.clone()));
                Ok(*info)
            }
            NodeState::NotRunning(_) => {
                self.alerts
                    .show_alert(&self.cluster, "node is not ready", AlertLevel::Error);
                Err(ConsoleError::NodeNotReady(name.to_string()))
            }
        }
    }

    pub fn request_create(&self) -> Result<()> {
        self.ensure_open()?;
        self.emit(NodeListEvent::CreateRequested);
        Ok(())
    }

    pub async fn show_status(&self, name: &str) -> Result<Arc<ClusterNode>> {
        self.ensure_open()?;
        let node = self
            .snapshot()
            .await
            .find(name)
            .cloned()
            .ok_or_else(|| ConsoleError::NodeNotFound(name.to_string()))?;
        self.emit(NodeListEvent::StatusRequested(node.clone()));
        Ok(node)
    }

    /// Emits the current selection for deletion and clears it right away.
    pub async fn request_delete(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut state = self.state.write().await;
        let names: Vec<String> = state.selected.iter().cloned().collect();
        self.emit(NodeListEvent::DeleteRequested(names.clone()));

        let mut next = NodeListState::clone(&state);
        next.selected.clear();
        *state = Arc::new(next);
        Ok(names)
    }

    // --- Views ---

    pub async fn view(&self) -> NodeListView {
        let snapshot = self.snapshot().await;
        NodeListView {
            cluster: self.cluster.clone(),
            generation: snapshot.generation,
            loading: snapshot.loading,
            polling: snapshot.has_transient(),
            nodes: snapshot
                .nodes
                .iter()
                .map(|n| NodeRow::build(n, snapshot.selected.contains(n.name())))
                .collect(),
        }
    }
}

pub struct ViewerGuard<S> {
    list: Arc<NodeList<S>>,
}

impl<S> ViewerGuard<S> {
    pub fn list(&self) -> &Arc<NodeList<S>> {
        &self.list
    }
}

impl<S> Drop for ViewerGuard<S> {
    fn drop(&mut self) {
        self.list.viewers.fetch_sub(1, Ordering::SeqCst);
    }
}
