//! Connectivity monitor

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::remote::{bounded, RemoteDataService};
use crate::state::Connectivity;

const EDGE_CHANNEL_CAPACITY: usize = 16;

/// Two-state reachability tracker publishing every transition.
///
/// Cloning yields a handle to the same monitor.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<Connectivity>>,
    edges: broadcast::Sender<Connectivity>,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (state, _) = watch::channel(initial);
        let (edges, _) = broadcast::channel(EDGE_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(state),
            edges,
        }
    }

    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Record the latest reachability signal.
    ///
    /// Returns `true` when the signal was a transition; repeating the
    /// current state publishes nothing.
    pub fn report(&self, connectivity: Connectivity) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == connectivity {
                false
            } else {
                *current = connectivity;
                true
            }
        });

        if changed {
            tracing::info!("Connectivity changed: {}", connectivity.label());
            // No subscribers is fine; the state itself is still recorded.
            let _ = self.edges.send(connectivity);
        }
        changed
    }

    /// Receive every transition from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Connectivity> {
        self.edges.subscribe()
    }

    /// Observe the current state
    pub fn watch(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }
}

/// Poll `remote` for reachability and feed the result into `monitor`.
///
/// Runs until the task is dropped or aborted.
pub async fn run_probe(
    monitor: ConnectivityMonitor,
    remote: Arc<dyn RemoteDataService>,
    interval: Duration,
    timeout: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let connectivity = match bounded(timeout, remote.ping()).await {
            Ok(()) => Connectivity::Online,
            Err(error) => {
                tracing::debug!("Reachability probe failed: {error}");
                Connectivity::Offline
            }
        };
        monitor.report(connectivity);
    }
}
