use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::NodeSource;
use crate::error::ConsoleError;

use super::NodeList;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Re-fetches a node list every second while it holds transient nodes.
pub struct Poller {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Poller {
    pub fn spawn<S: NodeSource>(list: Arc<NodeList<S>>, cancel: CancellationToken) -> Self {
        let task = tokio::spawn(run(list, cancel.clone()));
        Self { cancel, task }
    }

    /// Cancels the task, dropping any fetch still in flight, and waits for it.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn run<S: NodeSource>(list: Arc<NodeList<S>>, cancel: CancellationToken) {
    let mut interval = time::interval(POLL_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = cancel.cancelled() => break,
        }

        tokio::select! {
            result = list.poll_once() => match result {
                Ok(_) => {}
                Err(ConsoleError::Closed) => break,
                Err(e) => warn!(cluster = list.cluster(), "node poll failed: {}", e),
            },
            _ = cancel.cancelled() => {
                debug!(cluster = list.cluster(), "dropping in-flight node poll");
                break;
            }
        }
    }

    info!(cluster = list.cluster(), "node poller shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::alerts::AlertFeed;
    use crate::lister::testing::{FakeSource, record, running};
    use std::sync::atomic::Ordering;

    async fn started(source: Arc<FakeSource>) -> (Arc<NodeList<FakeSource>>, Poller) {
        let (list, _events) = NodeList::new("demo", source, Arc::new(AlertFeed::new(4)));
        let list = Arc::new(list);
        list.refresh().await.unwrap();
        let poller = Poller::spawn(list.clone(), CancellationToken::new());
        (list, poller)
    }

    #[tokio::test(start_paused = true)]
    async fn stable_nodes_are_not_polled() {
        let source = Arc::new(FakeSource::with(vec![running("master-1"), running("worker-1")]));
        let (_list, poller) = started(source.clone()).await;

        time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(source.calls(), 1);
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn transient_node_is_fetched_every_tick() {
        let source = Arc::new(FakeSource::with(vec![running("master-1"), record("worker-1", "Waiting")]));
        let (_list, poller) = started(source.clone()).await;

        time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(source.calls(), 4);
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn polling_stops_once_nodes_settle() {
        let source = Arc::new(FakeSource::with(vec![record("worker-1", "Initializing")]));
        let (list, poller) = started(source.clone()).await;
        let held = list.snapshot().await.nodes[0].clone();

        source.set(vec![running("worker-1")]);
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(source.calls(), 2);
        assert!(held.state().info().is_some());
        assert!(Arc::ptr_eq(&held, &list.snapshot().await.nodes[0]));

        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(source.calls(), 2);
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_keep_the_loop_alive() {
        let source = Arc::new(FakeSource::with(vec![record("worker-1", "Terminating")]));
        let (_list, poller) = started(source.clone()).await;

        source.fail.store(true, Ordering::SeqCst);
        time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(source.calls(), 3);
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_drops_hung_fetch() {
        let source = Arc::new(FakeSource::with(vec![record("worker-1", "Waiting")]));
        let (list, poller) = started(source.clone()).await;

        source.hang.store(true, Ordering::SeqCst);
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(source.calls(), 2);

        time::timeout(Duration::from_secs(1), poller.shutdown())
            .await
            .expect("poller did not stop");
        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(source.calls(), 2);
        assert_eq!(list.snapshot().await.nodes[0].raw_status(), "Waiting");
    }

    #[tokio::test(start_paused = true)]
    async fn closed_list_ends_the_task() {
        let source = Arc::new(FakeSource::with(vec![record("worker-1", "Waiting")]));
        let (list, poller) = started(source.clone()).await;

        list.close();
        time::sleep(Duration::from_millis(1500)).await;
        assert!(poller.task.is_finished());
        assert_eq!(source.calls(), 1);
    }
}
