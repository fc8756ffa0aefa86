//! Connectivity monitor
//!
//! Polls a reachability endpoint on a fixed cadence and publishes *edges*
//! (online→offline, offline→online), never raw poll results. Probe failures are
//! the expected offline steady state and are folded into `false`.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Transition of the online flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEdge {
    WentOnline,
    WentOffline,
}

/// Reachability check
#[async_trait]
pub trait Prober: Send + Sync {
    /// `true` only when the endpoint answered 2xx within the timeout
    async fn probe(&self) -> bool;
}

/// Probes with a plain HTTP GET
pub struct HttpProber {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self) -> bool {
        match self.http.get(&self.url).timeout(self.timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %self.url, "Connectivity probe failed: {e}");
                false
            }
        }
    }
}

pub struct ConnectivityMonitor {
    prober: Arc<dyn Prober>,
    interval: Duration,
    online: AtomicBool,
    edges: broadcast::Sender<ConnectivityEdge>,
}

impl ConnectivityMonitor {
    /// Starts in the offline state; the first successful probe yields `WentOnline`
    pub fn new(prober: Arc<dyn Prober>, interval: Duration) -> Self {
        let (edges, _) = broadcast::channel(16);
        Self {
            prober,
            interval,
            online: AtomicBool::new(false),
            edges,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEdge> {
        self.edges.subscribe()
    }

    /// Probe once, update the flag and publish an edge if it flipped
    pub async fn probe(&self) -> bool {
        let online = self.prober.probe().await;
        self.set_online(online);
        online
    }

    /// Record a probe result; returns the edge it caused, if any
    pub fn set_online(&self, online: bool) -> Option<ConnectivityEdge> {
        let previous = self.online.swap(online, Ordering::AcqRel);
        if previous == online {
            return None;
        }

        let edge = if online {
            tracing::info!("Connectivity restored");
            ConnectivityEdge::WentOnline
        } else {
            tracing::warn!("Connectivity lost");
            ConnectivityEdge::WentOffline
        };
        // No subscribers is fine
        let _ = self.edges.send(edge);
        Some(edge)
    }

    /// Poll until cancelled
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "Connectivity monitor started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Connectivity monitor stopped");
                    return;
                }
                _ = ticker.tick() => {
                    self.probe().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays scripted probe results, then repeats the last one
    struct ScriptedProber {
        results: Mutex<VecDeque<bool>>,
        last: AtomicBool,
    }

    impl ScriptedProber {
        fn new(results: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.iter().copied().collect()),
                last: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self) -> bool {
            match self.results.lock().pop_front() {
                Some(result) => {
                    self.last.store(result, Ordering::SeqCst);
                    result
                }
                None => self.last.load(Ordering::SeqCst),
            }
        }
    }

    #[tokio::test]
    async fn test_edges_fire_once_per_transition() {
        let prober = ScriptedProber::new(&[false, true, true, true, false, false, true]);
        let monitor = ConnectivityMonitor::new(prober, Duration::from_secs(10));
        let mut edges = monitor.subscribe();

        for _ in 0..7 {
            monitor.probe().await;
        }

        let mut seen = Vec::new();
        while let Ok(edge) = edges.try_recv() {
            seen.push(edge);
        }
        assert_eq!(
            seen,
            vec![
                ConnectivityEdge::WentOnline,
                ConnectivityEdge::WentOffline,
                ConnectivityEdge::WentOnline
            ]
        );
        assert!(monitor.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_cancelled() {
        let prober = ScriptedProber::new(&[true]);
        let monitor = Arc::new(ConnectivityMonitor::new(prober, Duration::from_secs(10)));
        let mut edges = monitor.subscribe();
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(monitor.clone().run(shutdown.clone()));
        assert_eq!(edges.recv().await.unwrap(), ConnectivityEdge::WentOnline);
        assert!(monitor.is_online());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_http_probe_unreachable_is_offline() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = HttpProber::new(format!("http://{addr}/"), Duration::from_millis(500));
        assert!(!prober.probe().await);
    }
}
