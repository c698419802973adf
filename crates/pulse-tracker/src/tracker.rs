//! Session tracker
//!
//! Wraps units of work (human shifts or agent tasks) into timed sessions
//! against the ledger. Usage reports are merged into a pending buffer and
//! pushed by a background flush task on a fixed interval; a failed flush
//! merges the snapshot back so nothing is lost and the next tick retries.

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::events::AgentEvent;
use crate::transport::{HttpTransport, StartSessionBody, Transport};
use pulse_core::{CostCalculator, RuntimeMetrics, WorkSession};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Default)]
struct TrackerState {
    session_id: Option<Uuid>,
    pending: RuntimeMetrics,
}

struct FlushTask {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

/// Tracks one work session at a time for a single worker.
///
/// Precondition: one session per tracker instance. Starting a new session
/// while one is active abandons the local buffer of the previous one; run
/// concurrent sessions through separate tracker instances.
pub struct SessionTracker {
    config: TrackerConfig,
    cost: CostCalculator,
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<TrackerState>>,
    flush_task: Mutex<Option<FlushTask>>,
}

impl SessionTracker {
    /// Create a tracker with the HTTP transport.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a tracker over a custom transport (used by tests and
    /// in-process setups).
    pub fn with_transport(config: TrackerConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            cost: CostCalculator::default(),
            transport,
            state: Arc::new(Mutex::new(TrackerState::default())),
            flush_task: Mutex::new(None),
        }
    }

    /// Replace the default price table.
    #[must_use]
    pub fn with_cost_calculator(mut self, cost: CostCalculator) -> Self {
        self.cost = cost;
        self
    }

    /// Id of the currently open session, if any.
    pub async fn current_session_id(&self) -> Option<Uuid> {
        self.state.lock().await.session_id
    }

    /// Snapshot of metrics not yet acknowledged by the ledger.
    pub async fn pending_metrics(&self) -> RuntimeMetrics {
        self.state.lock().await.pending
    }

    /// Open a session on the ledger and start the periodic flush task.
    ///
    /// On failure the tracker stays idle and the error propagates.
    pub async fn start_session(
        &self,
        task_id: &str,
        task_description: Option<&str>,
    ) -> Result<Uuid> {
        let body = StartSessionBody {
            worker_id: self.config.worker_id,
            task_id: Some(task_id.to_string()),
            task_description: task_description.map(str::to_string),
            model_version: Some(self.config.model_name.clone()),
        };
        let session = self.transport.start_session(&body).await?;

        {
            let mut state = self.state.lock().await;
            state.session_id = Some(session.id);
            state.pending = RuntimeMetrics::default();
        }
        self.start_flush_task().await;

        debug!(session_id = %session.id, task_id, "session started");
        Ok(session.id)
    }

    /// Merge an incremental usage report into the pending buffer.
    ///
    /// Reports carrying token counts also accrue cost for the configured
    /// model. A report with no open session is a precondition violation;
    /// it is logged and dropped rather than treated as fatal.
    pub async fn report_metrics(&self, metrics: RuntimeMetrics) {
        let mut state = self.state.lock().await;
        if state.session_id.is_none() {
            warn!("metrics reported with no active session, discarding");
            return;
        }

        state.pending.merge(&metrics);
        if metrics.tokens_input > 0 || metrics.tokens_output > 0 {
            state.pending.cost_incurred += self.cost.cost(
                &self.config.model_name,
                metrics.tokens_input,
                metrics.tokens_output,
            );
        }
    }

    /// Extract usage from an agent event and report it.
    ///
    /// Events arriving with no open session are ignored.
    pub async fn observe_event(&self, event: &AgentEvent) {
        if self.current_session_id().await.is_none() {
            return;
        }
        if let Some(metrics) = event.usage_metrics() {
            self.report_metrics(metrics).await;
        }
    }

    /// Push the pending buffer to the ledger now.
    ///
    /// Runs on the flush interval as well; failures are recovered by
    /// merging the snapshot back into the buffer and never propagate.
    pub async fn flush(&self) {
        flush_once(&self.state, self.transport.as_ref()).await;
    }

    /// Close the current session, sending the remaining buffer merged
    /// with any caller-supplied final metrics.
    ///
    /// The flush task is stopped cooperatively first: an in-flight flush
    /// cycle runs to completion, so a failing heartbeat still restores
    /// its snapshot to the buffer before the buffer is read here.
    ///
    /// The tracker always returns to idle, even when the network call
    /// fails — the error is still surfaced, but local state is never
    /// left half-ended.
    pub async fn end_session(
        &self,
        final_metrics: Option<RuntimeMetrics>,
    ) -> Result<WorkSession> {
        self.stop_flush_task().await;

        let (session_id, totals) = {
            let mut state = self.state.lock().await;
            let Some(session_id) = state.session_id.take() else {
                return Err(Error::NoActiveSession);
            };
            let mut totals = state.pending;
            state.pending = RuntimeMetrics::default();
            if let Some(final_metrics) = &final_metrics {
                totals.merge(final_metrics);
            }
            (session_id, totals)
        };

        let session = self.transport.end_session(session_id, &totals).await?;
        debug!(session_id = %session_id, status = ?session.status, "session ended");
        Ok(session)
    }

    /// Run `work` inside a session: starts before, ends after, recording
    /// one error when `work` fails.
    ///
    /// The session is closed exactly once however `work` terminates, and
    /// a failure from `work` is returned as-is — a tracking error on the
    /// closing call is logged, never allowed to mask it.
    pub async fn track<T, F, Fut>(&self, task_id: &str, work: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.start_session(task_id, None).await?;

        match work().await {
            Ok(value) => {
                self.end_session(None).await?;
                Ok(value)
            }
            Err(work_err) => {
                let final_metrics = RuntimeMetrics {
                    error_count: 1,
                    ..Default::default()
                };
                if let Err(end_err) = self.end_session(Some(final_metrics)).await {
                    warn!(error = %end_err, "failed to close session after task error");
                }
                Err(work_err)
            }
        }
    }

    async fn start_flush_task(&self) {
        self.stop_flush_task().await;

        let (stop, mut stopped) = watch::channel(false);
        let state = self.state.clone();
        let transport = self.transport.clone();
        let interval = self.config.flush_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so the first
            // flush happens one full interval after session start.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    // A closed channel means the tracker is gone; exit
                    // either way.
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => flush_once(&state, transport.as_ref()).await,
                }
            }
        });
        *self.flush_task.lock().await = Some(FlushTask { handle, stop });
    }

    /// Stop the flush task and wait for it to exit.
    ///
    /// The stop is a signal, not an abort: a flush cycle that is mid
    /// heartbeat finishes, and on failure restores its snapshot to the
    /// buffer, before the task exits. Aborting instead would drop the
    /// snapshot while it is neither in the buffer nor on the ledger.
    async fn stop_flush_task(&self) {
        let task = self.flush_task.lock().await.take();
        if let Some(FlushTask { handle, stop }) = task {
            let _ = stop.send(true);
            if let Err(err) = handle.await {
                warn!(error = %err, "flush task terminated abnormally");
            }
        }
    }
}

/// One flush cycle: snapshot and clear the buffer, send it as a
/// heartbeat, and merge it back on failure so reports received during
/// the attempt are preserved alongside the snapshot.
async fn flush_once(state: &Mutex<TrackerState>, transport: &dyn Transport) {
    let (session_id, snapshot) = {
        let mut state = state.lock().await;
        let Some(session_id) = state.session_id else {
            return;
        };
        if !state.pending.has_pending_work() {
            return;
        }
        let snapshot = state.pending;
        state.pending = RuntimeMetrics::default();
        (session_id, snapshot)
    };

    if let Err(err) = transport.heartbeat(session_id, &snapshot).await {
        let mut state = state.lock().await;
        state.pending.merge(&snapshot);
        warn!(error = %err, session_id = %session_id, "flush failed, metrics will be retried");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use chrono::Utc;
    use mockall::predicate;
    use pulse_core::{SessionStatus, WorkerKind};
    use std::time::Duration;

    fn test_config() -> TrackerConfig {
        TrackerConfig::new(Uuid::new_v4(), "test-key", "http://localhost:8600")
            .with_model("gemini-2.5-flash")
            .with_flush_interval(Duration::from_millis(20))
    }

    fn session_row(id: Uuid, metrics: RuntimeMetrics, status: SessionStatus) -> WorkSession {
        WorkSession {
            id,
            worker_id: Uuid::new_v4(),
            worker_kind: WorkerKind::Agent,
            company_id: Uuid::new_v4(),
            start_time: Utc::now().timestamp(),
            end_time: None,
            duration_seconds: None,
            metrics,
            model_version: Some("gemini-2.5-flash".to_string()),
            task_id: Some("task-1".to_string()),
            task_description: None,
            notes: None,
            metadata: None,
            status,
            created_at: Utc::now(),
        }
    }

    fn tokens(input: u64, output: u64) -> RuntimeMetrics {
        RuntimeMetrics {
            tokens_input: input,
            tokens_output: output,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_session_stores_id() {
        let session_id = Uuid::new_v4();
        let mut mock = MockTransport::new();
        mock.expect_start_session()
            .times(1)
            .returning(move |_| {
                Ok(session_row(
                    session_id,
                    RuntimeMetrics::default(),
                    SessionStatus::InProgress,
                ))
            });

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        let id = tracker.start_session("task-1", None).await.unwrap();
        assert_eq!(id, session_id);
        assert_eq!(tracker.current_session_id().await, Some(session_id));
    }

    #[tokio::test]
    async fn test_start_failure_leaves_tracker_idle() {
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(|_| {
            Err(Error::Api {
                status: 404,
                message: "worker not found".to_string(),
            })
        });

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        let result = tracker.start_session("task-1", None).await;
        assert!(matches!(result, Err(Error::Api { status: 404, .. })));
        assert!(tracker.current_session_id().await.is_none());
    }

    #[tokio::test]
    async fn test_report_accrues_cost_for_known_model() {
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(|_| {
            Ok(session_row(
                Uuid::new_v4(),
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        tracker.start_session("task-1", None).await.unwrap();
        tracker.report_metrics(tokens(1_000_000, 1_000_000)).await;

        let pending = tracker.pending_metrics().await;
        assert_eq!(pending.tokens_input, 1_000_000);
        // gemini-2.5-flash: 0.15 in + 0.60 out per 1M tokens
        assert!((pending.cost_incurred - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_report_without_session_is_dropped() {
        let tracker =
            SessionTracker::with_transport(test_config(), Arc::new(MockTransport::new()));
        tracker.report_metrics(tokens(100, 100)).await;
        assert!(!tracker.pending_metrics().await.has_pending_work());
    }

    #[tokio::test]
    async fn test_flush_with_empty_buffer_is_noop() {
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(|_| {
            Ok(session_row(
                Uuid::new_v4(),
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });
        // No heartbeat expectation: calling it would fail the test.

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        tracker.start_session("task-1", None).await.unwrap();
        tracker.flush().await;
    }

    #[tokio::test]
    async fn test_flush_failure_rebuffers_metrics() {
        let session_id = Uuid::new_v4();
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(move |_| {
            Ok(session_row(
                session_id,
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });
        mock.expect_heartbeat().times(1).returning(|_, _| {
            Err(Error::Network("connection refused".to_string()))
        });

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        tracker.start_session("task-1", None).await.unwrap();
        tracker.report_metrics(tokens(500, 250)).await;
        let before = tracker.pending_metrics().await;

        tracker.flush().await;

        // Nothing lost: the buffer equals its pre-flush contents.
        assert_eq!(tracker.pending_metrics().await, before);

        // A later report still merges on top.
        tracker.report_metrics(tokens(100, 0)).await;
        assert_eq!(tracker.pending_metrics().await.tokens_input, 600);
    }

    #[tokio::test]
    async fn test_flush_success_clears_buffer() {
        let session_id = Uuid::new_v4();
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(move |_| {
            Ok(session_row(
                session_id,
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });
        mock.expect_heartbeat()
            .with(predicate::eq(session_id), predicate::always())
            .times(1)
            .returning(move |id, m| Ok(session_row(id, *m, SessionStatus::InProgress)));

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        tracker.start_session("task-1", None).await.unwrap();
        tracker.report_metrics(tokens(500, 250)).await;
        tracker.flush().await;

        assert!(!tracker.pending_metrics().await.has_pending_work());
    }

    #[tokio::test]
    async fn test_background_flush_fires_on_interval() {
        let session_id = Uuid::new_v4();
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(move |_| {
            Ok(session_row(
                session_id,
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });
        mock.expect_heartbeat()
            .times(1..)
            .returning(move |id, m| Ok(session_row(id, *m, SessionStatus::InProgress)));

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        tracker.start_session("task-1", None).await.unwrap();
        tracker.report_metrics(tokens(10, 5)).await;

        // Flush interval is 20ms in the test config.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!tracker.pending_metrics().await.has_pending_work());
    }

    #[tokio::test]
    async fn test_end_session_sends_buffer_plus_final() {
        let session_id = Uuid::new_v4();
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(move |_| {
            Ok(session_row(
                session_id,
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });
        mock.expect_end_session()
            .withf(|_, totals| totals.tokens_input == 1000 && totals.error_count == 1)
            .times(1)
            .returning(move |id, m| Ok(session_row(id, *m, SessionStatus::Failed)));

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        tracker.start_session("task-1", None).await.unwrap();
        tracker
            .report_metrics(RuntimeMetrics {
                tokens_input: 1000,
                ..Default::default()
            })
            .await;

        let final_metrics = RuntimeMetrics {
            error_count: 1,
            ..Default::default()
        };
        let ended = tracker.end_session(Some(final_metrics)).await.unwrap();
        assert_eq!(ended.status, SessionStatus::Failed);
        assert!(tracker.current_session_id().await.is_none());
    }

    #[tokio::test]
    async fn test_end_failure_still_returns_to_idle() {
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(|_| {
            Ok(session_row(
                Uuid::new_v4(),
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });
        mock.expect_end_session()
            .returning(|_, _| Err(Error::Network("connection reset".to_string())));
        // An immediate restart must be possible after a failed end.

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        tracker.start_session("task-1", None).await.unwrap();

        let result = tracker.end_session(None).await;
        assert!(matches!(result, Err(Error::Network(_))));
        assert!(tracker.current_session_id().await.is_none());
        assert!(!tracker.pending_metrics().await.has_pending_work());

        let restarted = tracker.start_session("task-2", None).await;
        assert!(restarted.is_ok());
    }

    #[tokio::test]
    async fn test_end_without_session_errors() {
        let tracker =
            SessionTracker::with_transport(test_config(), Arc::new(MockTransport::new()));
        let result = tracker.end_session(None).await;
        assert!(matches!(result, Err(Error::NoActiveSession)));
    }

    #[tokio::test]
    async fn test_track_success_ends_clean() {
        let session_id = Uuid::new_v4();
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(move |_| {
            Ok(session_row(
                session_id,
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });
        mock.expect_end_session()
            .withf(|_, totals| totals.error_count == 0)
            .times(1)
            .returning(move |id, m| Ok(session_row(id, *m, SessionStatus::Completed)));

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        let value = tracker
            .track("task-1", || async { Ok::<_, anyhow::Error>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert!(tracker.current_session_id().await.is_none());
    }

    #[tokio::test]
    async fn test_track_failure_records_error_and_rethrows() {
        let session_id = Uuid::new_v4();
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(move |_| {
            Ok(session_row(
                session_id,
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });
        mock.expect_end_session()
            .withf(|_, totals| totals.error_count == 1)
            .times(1)
            .returning(move |id, m| Ok(session_row(id, *m, SessionStatus::Failed)));

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        let result: anyhow::Result<()> = tracker
            .track("task-1", || async { Err(anyhow::anyhow!("task exploded")) })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "task exploded");
        assert!(tracker.current_session_id().await.is_none());
    }

    #[tokio::test]
    async fn test_track_never_masks_work_error_with_end_error() {
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(|_| {
            Ok(session_row(
                Uuid::new_v4(),
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });
        mock.expect_end_session()
            .returning(|_, _| Err(Error::Network("down".to_string())));

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));
        let result: anyhow::Result<()> = tracker
            .track("task-1", || async { Err(anyhow::anyhow!("original error")) })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "original error");
    }

    /// Heartbeats stall for 100ms and then fail; end calls succeed and
    /// record the metrics they were given.
    struct SlowFailTransport {
        ended_with: Arc<std::sync::Mutex<Option<RuntimeMetrics>>>,
    }

    #[async_trait::async_trait]
    impl Transport for SlowFailTransport {
        async fn start_session(&self, _body: &StartSessionBody) -> crate::Result<WorkSession> {
            Ok(session_row(
                Uuid::new_v4(),
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        }

        async fn heartbeat(
            &self,
            _session_id: Uuid,
            _metrics: &RuntimeMetrics,
        ) -> crate::Result<WorkSession> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Err(Error::Network("connection reset".to_string()))
        }

        async fn end_session(
            &self,
            session_id: Uuid,
            metrics: &RuntimeMetrics,
        ) -> crate::Result<WorkSession> {
            *self.ended_with.lock().unwrap() = Some(*metrics);
            Ok(session_row(session_id, *metrics, SessionStatus::Completed))
        }
    }

    #[tokio::test]
    async fn test_end_during_inflight_flush_keeps_metrics() {
        let ended_with = Arc::new(std::sync::Mutex::new(None));
        let transport = Arc::new(SlowFailTransport {
            ended_with: ended_with.clone(),
        });
        let tracker = SessionTracker::with_transport(test_config(), transport);

        tracker.start_session("task-1", None).await.unwrap();
        tracker.report_metrics(tokens(100, 0)).await;

        // Let the 20ms flush fire and get stuck in its failing
        // heartbeat, then end mid-flight. The end must wait for the
        // cycle to restore the snapshot before reading the buffer.
        tokio::time::sleep(Duration::from_millis(40)).await;
        let ended = tracker.end_session(None).await.unwrap();

        assert_eq!(ended.metrics.tokens_input, 100);
        let sent = ended_with.lock().unwrap().unwrap();
        assert_eq!(sent.tokens_input, 100);
    }

    #[tokio::test]
    async fn test_report_during_failed_flush_attempt_is_kept() {
        let ended_with = Arc::new(std::sync::Mutex::new(None));
        let transport = Arc::new(SlowFailTransport {
            ended_with: ended_with.clone(),
        });
        let tracker = SessionTracker::with_transport(test_config(), transport);

        tracker.start_session("task-1", None).await.unwrap();
        tracker.report_metrics(tokens(100, 0)).await;

        // While the flush attempt's heartbeat is still out, another
        // report lands. The final totals must hold both the restored
        // snapshot and the mid-attempt report.
        tokio::time::sleep(Duration::from_millis(40)).await;
        tracker.report_metrics(tokens(50, 0)).await;

        tracker.end_session(None).await.unwrap();
        let sent = ended_with.lock().unwrap().unwrap();
        assert_eq!(sent.tokens_input, 150);
    }

    #[tokio::test]
    async fn test_observe_event_reports_usage_when_active() {
        let mut mock = MockTransport::new();
        mock.expect_start_session().returning(|_| {
            Ok(session_row(
                Uuid::new_v4(),
                RuntimeMetrics::default(),
                SessionStatus::InProgress,
            ))
        });

        let tracker = SessionTracker::with_transport(test_config(), Arc::new(mock));

        let event: AgentEvent = serde_json::from_str(
            r#"{"usage_metadata": {"prompt_token_count": 100, "candidates_token_count": 40}}"#,
        )
        .unwrap();

        // Before a session starts, events are ignored.
        tracker.observe_event(&event).await;
        assert!(!tracker.pending_metrics().await.has_pending_work());

        tracker.start_session("task-1", None).await.unwrap();
        tracker.observe_event(&event).await;

        let pending = tracker.pending_metrics().await;
        assert_eq!(pending.tokens_input, 100);
        assert_eq!(pending.tokens_output, 40);
        assert_eq!(pending.api_calls, 1);
        // Cost accrues from the event's token counts too.
        assert!(pending.cost_incurred > 0.0);
    }
}
