//! Main monitor service.
//!
//! Hosts the live feed, keeps the status map reconciled with periodic REST
//! snapshots and refreshes the daily summary when attendance changes.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use attendance_client::ws::{Connector, TungsteniteConnector};
use attendance_client::{
    AttendanceRestClient, ConnectionManager, ConnectionState, DailySummary, Notifier,
    RestError, SideEffectBridge, SnapshotSource, StateReconciler,
};
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::config::{ConfigError, MonitorConfig};
use super::metrics::MonitorMetrics;
use super::notifier::{ChannelRefresh, LogNotifier};

/// Source of the daily attendance summary.
pub trait SummarySource: Send + Sync {
    /// Error returned when the summary cannot be fetched.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches today's summary.
    fn fetch_summary(&self) -> impl Future<Output = Result<DailySummary, Self::Error>> + Send;
}

impl SummarySource for AttendanceRestClient {
    type Error = RestError;

    async fn fetch_summary(&self) -> Result<DailySummary, RestError> {
        self.get_daily_summary(None).await
    }
}

/// The main monitor service.
pub struct MonitorService<C = TungsteniteConnector, S = AttendanceRestClient> {
    /// Configuration.
    config: MonitorConfig,

    /// Live feed connection.
    manager: ConnectionManager<C>,

    /// Status map.
    reconciler: Arc<StateReconciler>,

    /// Snapshot and summary source.
    source: S,

    /// Metrics.
    metrics: Arc<MonitorMetrics>,

    /// Latest daily summary.
    summary: watch::Sender<Option<DailySummary>>,

    /// Summary refresh requests from the side effect bridge.
    refresh_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,

    /// When the status map last received data.
    last_updated: Mutex<Option<Instant>>,

    /// Set when the last summary fetch failed.
    summary_stale: AtomicBool,

    /// Whether the service is running.
    running: Arc<AtomicBool>,

    /// Wakes the run loop on stop.
    shutdown: Notify,
}

impl MonitorService {
    /// Creates a monitor talking to the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: MonitorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let manager = ConnectionManager::new(config.ws_config())
            .map_err(|e| ConfigError::InvalidFeed(e.to_string()))?;
        let rest = AttendanceRestClient::new(config.rest_config())
            .map_err(|e| ConfigError::InvalidApi(e.to_string()))?;

        Ok(Self::with_parts(config, manager, rest, Arc::new(LogNotifier)))
    }
}

impl<C, S> MonitorService<C, S>
where
    C: Connector,
    S: SnapshotSource + SummarySource,
{
    /// Assembles a monitor from its parts and wires the reconciler and side
    /// effects into the manager's router.
    #[must_use]
    pub fn with_parts(
        config: MonitorConfig,
        manager: ConnectionManager<C>,
        source: S,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let metrics = Arc::new(MonitorMetrics::new());
        let reconciler = Arc::new(StateReconciler::new(Arc::clone(manager.metrics())));

        let (refresh, refresh_rx) = ChannelRefresh::channel(Arc::clone(&metrics));
        let bridge = SideEffectBridge::new(notifier, Arc::new(refresh));
        let _ = reconciler.attach(manager.router(), Some(Arc::new(bridge)));

        Self {
            config,
            manager,
            reconciler,
            source,
            metrics,
            summary: watch::Sender::new(None),
            refresh_rx: Mutex::new(Some(refresh_rx)),
            last_updated: Mutex::new(None),
            summary_stale: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Notify::new(),
        }
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<MonitorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Returns the live feed connection.
    #[must_use]
    pub const fn connection(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    /// Returns the status map owner.
    #[must_use]
    pub fn reconciler(&self) -> &Arc<StateReconciler> {
        &self.reconciler
    }

    /// Returns the snapshot and summary source.
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Returns the latest daily summary, if one was fetched.
    #[must_use]
    pub fn latest_summary(&self) -> Option<DailySummary> {
        self.summary.borrow().clone()
    }

    /// Returns a receiver that changes whenever a new summary arrives.
    #[must_use]
    pub fn watch_summary(&self) -> watch::Receiver<Option<DailySummary>> {
        self.summary.subscribe()
    }

    /// Returns how long ago the status map last received data.
    #[must_use]
    pub fn last_updated(&self) -> Option<Duration> {
        self.last_updated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|at| at.elapsed())
    }

    /// Describes the feed state and data freshness in one line.
    #[must_use]
    pub fn status_line(&self) -> String {
        let freshness = match self.last_updated() {
            Some(age) => format!("last updated {} seconds ago", age.as_secs()),
            None => "no data yet".to_string(),
        };

        match self.manager.state() {
            ConnectionState::Open => format!("live, {}", freshness),
            state => format!("offline ({}), {}", state, freshness),
        }
    }

    /// Returns true if the service is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stops the service.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.shutdown.notify_one();
        info!("Attendance monitor stop requested");
    }

    /// Runs the monitor until [`stop`](Self::stop) is called.
    ///
    /// Connects the live feed while applying an initial snapshot and
    /// summary, then polls snapshots and serves debounced summary refreshes. The snapshot
    /// interval drops to the fallback interval once the feed has given up.
    pub async fn run(&self) {
        let refresh_rx = self
            .refresh_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut refresh_rx) = refresh_rx else {
            warn!("Attendance monitor is already running");
            return;
        };

        self.running.store(true, Ordering::Relaxed);
        info!(
            ws_url = %self.config.ws_url,
            api_url = %self.config.api_url,
            "Attendance monitor started"
        );

        let mut state_rx = self.manager.watch_state();
        let mut map_rx = self.reconciler.watch();

        // The first snapshot does not wait out the feed's backoff schedule.
        tokio::join!(self.manager.connect(), async {
            self.poll_snapshot().await;
            self.refresh_summary().await;
        });
        let state = *state_rx.borrow_and_update();
        self.log_state(state);
        map_rx.borrow_and_update();

        let mut next_poll = Instant::now() + self.poll_interval();
        let mut summary_due: Option<Instant> = None;

        while self.is_running() {
            tokio::select! {
                () = self.shutdown.notified() => break,
                () = time::sleep_until(next_poll) => {
                    self.poll_snapshot().await;
                    if self.summary_stale.load(Ordering::Relaxed) {
                        self.refresh_summary().await;
                    }
                    if !self.manager.is_connected() {
                        info!("Attendance monitor {}", self.status_line());
                    }
                    next_poll = Instant::now() + self.poll_interval();
                }
                Some(()) = refresh_rx.recv() => {
                    summary_due = Some(Instant::now() + self.config.summary_debounce());
                }
                () = time::sleep_until(summary_due.unwrap_or(next_poll)), if summary_due.is_some() => {
                    summary_due = None;
                    self.refresh_summary().await;
                }
                Ok(()) = state_rx.changed() => {
                    let state = *state_rx.borrow_and_update();
                    self.log_state(state);
                    if state == ConnectionState::GivenUp {
                        next_poll = next_poll.min(Instant::now() + self.config.fallback_poll_interval());
                    }
                }
                Ok(()) = map_rx.changed() => {
                    map_rx.borrow_and_update();
                    self.touch();
                }
            }
        }

        self.running.store(false, Ordering::Relaxed);
        self.manager.disconnect();
        *self
            .refresh_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(refresh_rx);

        let snapshot = self.metrics.snapshot();
        info!(
            snapshot_polls = snapshot.snapshot_polls,
            snapshot_failures = snapshot.snapshot_failures,
            summary_refreshes = snapshot.summary_refreshes,
            events_applied = self.manager.metrics().events_applied(),
            "Attendance monitor stopped"
        );
    }

    /// Pulls one snapshot into the status map.
    ///
    /// Returns the number of entries applied, or `None` if the fetch failed.
    pub async fn poll_snapshot(&self) -> Option<usize> {
        self.metrics.record_snapshot_poll();

        match self.reconciler.refresh_from(&self.source).await {
            Ok(count) => {
                self.touch();
                debug!(
                    persons = count,
                    checked_in = self.reconciler.checked_in_count(),
                    "Snapshot applied"
                );
                Some(count)
            }
            Err(e) => {
                self.metrics.record_snapshot_failure();
                warn!(
                    error = %e,
                    "Snapshot poll failed, retrying in {}s",
                    self.poll_interval().as_secs()
                );
                None
            }
        }
    }

    /// Fetches the daily summary and publishes it.
    ///
    /// Returns true on success.
    pub async fn refresh_summary(&self) -> bool {
        self.metrics.record_summary_refresh();

        match self.source.fetch_summary().await {
            Ok(summary) => {
                info!(
                    present = summary.present,
                    total = summary.total_persons,
                    presence_percentage = summary.presence_percentage,
                    "Daily summary refreshed"
                );
                self.summary_stale.store(false, Ordering::Relaxed);
                self.summary.send_replace(Some(summary));
                true
            }
            Err(e) => {
                self.metrics.record_summary_failure();
                self.summary_stale.store(true, Ordering::Relaxed);
                warn!(error = %e, "Daily summary refresh failed, retrying on next poll");
                false
            }
        }
    }

    /// Interval until the next snapshot poll.
    fn poll_interval(&self) -> Duration {
        if self.manager.state() == ConnectionState::GivenUp {
            self.config.fallback_poll_interval()
        } else {
            self.config.poll_interval()
        }
    }

    fn touch(&self) {
        *self
            .last_updated
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
    }

    fn log_state(&self, state: ConnectionState) {
        match state {
            ConnectionState::Open => info!(
                client_id = %self.manager.client_identity().as_str(),
                "Live feed connected"
            ),
            ConnectionState::GivenUp => warn!(
                "Live feed offline, polling every {}s ({})",
                self.config.fallback_poll_interval_secs,
                self.status_line()
            ),
            ConnectionState::Reconnecting => info!(
                attempt = self.manager.reconnect_attempts(),
                "Live feed {}",
                self.status_line()
            ),
            state => debug!(%state, "Live feed state changed"),
        }
    }
}
