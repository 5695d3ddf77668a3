//! Client-side poller for the dashboard API.
//!
//! Every poll fetches sessions, cron and status concurrently. A resource that
//! fails to fetch falls back to its last known good value, or to the embedded
//! mock slice, without disturbing the other two. Only a malformed payload
//! fails the whole refresh.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::mock::{mock_cron, mock_dashboard, mock_sessions, mock_status};
use crate::models::{DashboardData, Payload, Resource};

/// Default time between polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Per-request timeout for [`HttpSource`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the poller gets raw resource payloads from.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, resource: Resource) -> Result<Value, FetchError>;
}

/// Fetches `{api_base}/{sessions|cron|status}` over HTTP.
pub struct HttpSource {
    client: reqwest::Client,
    api_base: String,
}

impl HttpSource {
    pub fn new(api_base: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }

    fn url(&self, resource: Resource) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            resource.path_segment()
        )
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn fetch(&self, resource: Resource) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(self.url(resource))
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode {
                resource: resource.to_string(),
                message: e.to_string(),
            })
    }
}

// -----------------------------------------------------------------------------
// Snapshot types
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    /// Nothing fetched yet.
    Loading,
    Ready,
    /// Last refresh failed; the previous data is still shown.
    ErrorWithStaleData,
    /// Refresh failed with nothing to fall back on; mock data is shown.
    ErrorNoData,
}

/// Where one slice of the shown data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Live,
    LastKnownGood,
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SliceOrigins {
    pub sessions: Origin,
    pub cron: Origin,
    pub status: Origin,
}

impl SliceOrigins {
    fn all(origin: Origin) -> Self {
        Self {
            sessions: origin,
            cron: origin,
            status: origin,
        }
    }
}

/// What the dashboard shows after a refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub state: PollState,
    pub data: Option<DashboardData>,
    pub error: Option<String>,
    /// Epoch ms of the last successful refresh.
    pub last_updated: Option<i64>,
    pub origins: Option<SliceOrigins>,
}

impl DashboardSnapshot {
    pub fn loading() -> Self {
        Self {
            state: PollState::Loading,
            data: None,
            error: None,
            last_updated: None,
            origins: None,
        }
    }
}

// -----------------------------------------------------------------------------
// Merge
// -----------------------------------------------------------------------------

fn resolve<T: Clone>(
    resource: Resource,
    fetched: Result<Value, FetchError>,
    previous: Option<&T>,
    mock: impl FnOnce() -> T,
    extract: impl FnOnce(Payload) -> Option<T>,
) -> Result<(T, Origin), FetchError> {
    let decode_error = |message: String| FetchError::Decode {
        resource: resource.to_string(),
        message,
    };

    match fetched {
        Ok(value) => {
            let payload = Payload::decode(resource, value).map_err(|e| decode_error(e.to_string()))?;
            extract(payload)
                .map(|decoded| (decoded, Origin::Live))
                .ok_or_else(|| decode_error("unexpected payload kind".to_string()))
        }
        Err(e) if e.is_decode() => Err(e),
        Err(e) => {
            debug!("Fetching {} failed: {}", resource, e);
            Ok(match previous {
                Some(previous) => (previous.clone(), Origin::LastKnownGood),
                None => (mock(), Origin::Mock),
            })
        }
    }
}

/// Combine three independent fetch results into one dashboard value.
///
/// Transport failures are absorbed per resource. A payload that fetched but
/// does not decode fails the whole merge.
pub fn merge(
    sessions: Result<Value, FetchError>,
    cron: Result<Value, FetchError>,
    status: Result<Value, FetchError>,
    previous: Option<&DashboardData>,
    now_ms: i64,
) -> Result<(DashboardData, SliceOrigins), FetchError> {
    let (sessions, sessions_origin) = resolve(
        Resource::Sessions,
        sessions,
        previous.map(|p| &p.sessions),
        || mock_sessions(now_ms),
        |payload| match payload {
            Payload::Sessions(data) => Some(data),
            _ => None,
        },
    )?;
    let (cron, cron_origin) = resolve(
        Resource::Cron,
        cron,
        previous.map(|p| &p.cron),
        || mock_cron(now_ms),
        |payload| match payload {
            Payload::Cron(data) => Some(data),
            _ => None,
        },
    )?;
    let (status, status_origin) = resolve(
        Resource::Status,
        status,
        previous.map(|p| &p.status),
        mock_status,
        |payload| match payload {
            Payload::Status(data) => Some(data),
            _ => None,
        },
    )?;

    Ok((
        DashboardData {
            sessions,
            cron,
            status,
            last_updated: now_ms,
        },
        SliceOrigins {
            sessions: sessions_origin,
            cron: cron_origin,
            status: status_origin,
        },
    ))
}

// -----------------------------------------------------------------------------
// Poller
// -----------------------------------------------------------------------------

pub struct DashboardPoller {
    source: Arc<dyn DataSource>,
    use_mock: bool,
    interval: Duration,
    current: DashboardSnapshot,
}

impl DashboardPoller {
    pub fn new(source: Arc<dyn DataSource>, interval: Duration, use_mock: bool) -> Self {
        Self {
            source,
            use_mock,
            interval,
            current: DashboardSnapshot::loading(),
        }
    }

    pub fn snapshot(&self) -> &DashboardSnapshot {
        &self.current
    }

    /// Run one poll cycle and return the new snapshot.
    pub async fn refresh(&mut self) -> &DashboardSnapshot {
        let now = Utc::now().timestamp_millis();

        if self.use_mock {
            self.current = DashboardSnapshot {
                state: PollState::Ready,
                data: Some(mock_dashboard(now)),
                error: None,
                last_updated: Some(now),
                origins: Some(SliceOrigins::all(Origin::Mock)),
            };
            return &self.current;
        }

        let (sessions, cron, status) = tokio::join!(
            self.source.fetch(Resource::Sessions),
            self.source.fetch(Resource::Cron),
            self.source.fetch(Resource::Status),
        );

        match merge(sessions, cron, status, self.current.data.as_ref(), now) {
            Ok((data, origins)) => {
                self.current = DashboardSnapshot {
                    state: PollState::Ready,
                    data: Some(data),
                    error: None,
                    last_updated: Some(now),
                    origins: Some(origins),
                };
            }
            Err(e) => {
                warn!("Failed to fetch dashboard data: {}", e);
                let error = Some(e.to_string());
                match self.current.data.take() {
                    Some(stale) => {
                        self.current.state = PollState::ErrorWithStaleData;
                        self.current.data = Some(stale);
                        self.current.error = error;
                    }
                    None => {
                        self.current = DashboardSnapshot {
                            state: PollState::ErrorNoData,
                            data: Some(mock_dashboard(now)),
                            error,
                            last_updated: self.current.last_updated,
                            origins: Some(SliceOrigins::all(Origin::Mock)),
                        };
                    }
                }
            }
        }

        &self.current
    }

    /// Poll now and then every interval until the handle is shut down or dropped.
    pub fn spawn(mut self) -> PollerHandle {
        let (tx, rx) = watch::channel(self.current.clone());
        let refetch = Arc::new(Notify::new());
        let shutdown = Arc::new(Notify::new());

        let task_refetch = refetch.clone();
        let task_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_shutdown.notified() => break,
                    _ = ticker.tick() => {}
                    _ = task_refetch.notified() => debug!("Manual refetch"),
                }

                let snapshot = self.refresh().await.clone();
                if tx.send(snapshot).is_err() {
                    break;
                }
            }
            debug!("Dashboard poller stopped");
        });

        PollerHandle {
            rx,
            refetch,
            shutdown,
            task: Some(task),
        }
    }
}

/// Control handle for a spawned poller. Dropping it stops the timer.
pub struct PollerHandle {
    rx: watch::Receiver<DashboardSnapshot>,
    refetch: Arc<Notify>,
    shutdown: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.rx.clone()
    }

    pub fn current(&self) -> DashboardSnapshot {
        self.rx.borrow().clone()
    }

    /// Poll immediately without resetting the interval.
    pub fn refetch(&self) {
        self.refetch.notify_one();
    }

    /// Stop the timer and wait for an in-flight refresh to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSource {
        responses: Mutex<HashMap<Resource, Result<Value, FetchError>>>,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn healthy() -> Self {
            let responses = HashMap::from([
                (
                    Resource::Sessions,
                    Ok(json!({
                        "path": "/live/sessions.json",
                        "count": 1,
                        "sessions": [{"key": "agent:main:main", "ageMs": 1000, "totalTokens": 10}]
                    })),
                ),
                (
                    Resource::Cron,
                    Ok(json!({"jobs": [{
                        "id": "live-job",
                        "schedule": {"kind": "every", "everyMs": 60000},
                        "payload": {"kind": "systemEvent", "text": "hi"}
                    }]})),
                ),
                (
                    Resource::Status,
                    Ok(json!({"gateway": {"url": "ws://live", "reachable": true}})),
                ),
            ]);
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn set(&self, resource: Resource, response: Result<Value, FetchError>) {
            self.responses.lock().unwrap().insert(resource, response);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DataSource for FakeSource {
        async fn fetch(&self, resource: Resource) -> Result<Value, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap()[&resource].clone()
        }
    }

    fn poller(source: &Arc<FakeSource>) -> DashboardPoller {
        DashboardPoller::new(source.clone(), POLL_INTERVAL, false)
    }

    #[tokio::test]
    async fn test_all_live() {
        let source = Arc::new(FakeSource::healthy());
        let mut poller = poller(&source);
        assert_eq!(poller.snapshot().state, PollState::Loading);

        let snapshot = poller.refresh().await.clone();
        assert_eq!(snapshot.state, PollState::Ready);
        assert_eq!(snapshot.origins, Some(SliceOrigins::all(Origin::Live)));
        assert!(snapshot.last_updated.is_some());

        let data = snapshot.data.unwrap();
        assert_eq!(data.sessions.path, "/live/sessions.json");
        assert_eq!(data.cron.jobs[0].id, "live-job");
        assert_eq!(data.status.gateway.url, "ws://live");
    }

    #[tokio::test]
    async fn test_one_failed_fetch_uses_mock_slice_only() {
        let source = Arc::new(FakeSource::healthy());
        source.set(Resource::Cron, Err(FetchError::Network("connection refused".into())));
        let mut poller = poller(&source);

        let snapshot = poller.refresh().await.clone();
        assert_eq!(snapshot.state, PollState::Ready);
        assert!(snapshot.error.is_none());
        assert_eq!(
            snapshot.origins,
            Some(SliceOrigins {
                sessions: Origin::Live,
                cron: Origin::Mock,
                status: Origin::Live,
            })
        );

        let data = snapshot.data.unwrap();
        assert_eq!(data.sessions.sessions.len(), 1);
        assert_eq!(data.cron.jobs.len(), mock_cron(0).jobs.len());
        assert_eq!(data.status.gateway.url, "ws://live");
    }

    #[tokio::test]
    async fn test_failed_fetch_prefers_last_known_good() {
        let source = Arc::new(FakeSource::healthy());
        let mut poller = poller(&source);
        poller.refresh().await;

        source.set(Resource::Status, Err(FetchError::Status(502)));
        let snapshot = poller.refresh().await.clone();

        assert_eq!(snapshot.state, PollState::Ready);
        assert_eq!(snapshot.origins.unwrap().status, Origin::LastKnownGood);
        assert_eq!(snapshot.data.unwrap().status.gateway.url, "ws://live");
    }

    #[tokio::test]
    async fn test_malformed_payload_without_previous_data_shows_mock() {
        let source = Arc::new(FakeSource::healthy());
        source.set(Resource::Sessions, Ok(json!({"sessions": "nope"})));
        let mut poller = poller(&source);

        let snapshot = poller.refresh().await.clone();
        assert_eq!(snapshot.state, PollState::ErrorNoData);
        assert!(snapshot.error.unwrap().contains("sessions"));
        assert!(snapshot.last_updated.is_none());
        assert_eq!(snapshot.data.unwrap().sessions.sessions.len(), 5);
    }

    #[tokio::test]
    async fn test_malformed_payload_keeps_stale_data() {
        let source = Arc::new(FakeSource::healthy());
        let mut poller = poller(&source);
        let good = poller.refresh().await.clone();

        source.set(
            Resource::Status,
            Err(FetchError::Decode {
                resource: "status".into(),
                message: "expected value at line 1 column 1".into(),
            }),
        );
        let snapshot = poller.refresh().await.clone();

        assert_eq!(snapshot.state, PollState::ErrorWithStaleData);
        assert_eq!(snapshot.data, good.data);
        assert_eq!(snapshot.last_updated, good.last_updated);
        assert!(snapshot.error.is_some());

        // Recovers on the next good poll.
        source.set(Resource::Status, Ok(json!({})));
        assert_eq!(poller.refresh().await.state, PollState::Ready);
    }

    #[test]
    fn test_merge_decodes_each_slice_as_its_resource() {
        let sessions = json!({"count": 1, "sessions": [{"key": "agent:main:main", "ageMs": 5}]});
        let (data, origins) = merge(
            Ok(sessions.clone()),
            Ok(json!({"jobs": []})),
            Err(FetchError::Status(502)),
            None,
            1_000,
        )
        .unwrap();
        assert_eq!(data.sessions.count, 1);
        assert_eq!(data.sessions.sessions[0].key, "agent:main:main");
        assert_eq!(origins.status, Origin::Mock);

        // One malformed slice fails the merge even when the others decode.
        let err = merge(Ok(sessions), Ok(json!({"jobs": 3})), Ok(json!({})), None, 1_000)
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode { ref resource, .. } if resource == "cron"));
    }

    #[tokio::test]
    async fn test_mock_mode_skips_source() {
        let source = Arc::new(FakeSource::healthy());
        let mut poller = DashboardPoller::new(source.clone(), POLL_INTERVAL, true);

        let snapshot = poller.refresh().await.clone();
        assert_eq!(snapshot.state, PollState::Ready);
        assert_eq!(snapshot.origins, Some(SliceOrigins::all(Origin::Mock)));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_poller_interval_refetch_and_shutdown() {
        let source = Arc::new(FakeSource::healthy());
        let handle = poller(&source).spawn();
        let mut rx = handle.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(source.calls(), 3);
        assert_eq!(handle.current().state, PollState::Ready);

        tokio::time::advance(POLL_INTERVAL).await;
        rx.changed().await.unwrap();
        assert_eq!(source.calls(), 6);

        handle.refetch();
        rx.changed().await.unwrap();
        assert_eq!(source.calls(), 9);

        handle.shutdown().await;
        tokio::time::advance(POLL_INTERVAL * 3).await;
        assert_eq!(source.calls(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_timer() {
        let source = Arc::new(FakeSource::healthy());
        let handle = poller(&source).spawn();
        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();

        drop(handle);
        // The sender goes away once the task exits.
        assert!(rx.changed().await.is_err());
        assert_eq!(source.calls(), 3);
    }

    mod http {
        use super::*;
        use axum::{http::StatusCode, routing::get, Json, Router};

        async fn serve(app: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{}/api", addr)
        }

        #[tokio::test]
        async fn test_http_source_maps_responses() {
            let app = Router::new()
                .route("/api/sessions", get(|| async { Json(json!({"count": 0, "sessions": []})) }))
                .route("/api/cron", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
                .route("/api/status", get(|| async { "<html>oops</html>" }));
            let base = serve(app).await;
            let source = HttpSource::new(format!("{}/", base)).unwrap();

            let sessions = source.fetch(Resource::Sessions).await.unwrap();
            assert_eq!(sessions["count"], 0);

            assert!(matches!(
                source.fetch(Resource::Cron).await,
                Err(FetchError::Status(503))
            ));
            assert!(source.fetch(Resource::Status).await.unwrap_err().is_decode());
        }

        #[tokio::test]
        async fn test_http_source_unreachable_is_network_error() {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let source = HttpSource::new(format!("http://{}/api", addr)).unwrap();
            assert!(matches!(
                source.fetch(Resource::Sessions).await,
                Err(FetchError::Network(_))
            ));
        }
    }
}
