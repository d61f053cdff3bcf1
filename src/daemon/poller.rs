//! Reconcile 루프.
//!
//! 한 cycle = fetch → diff + classify → publish. 동시에 최대 하나의 cycle만 실행된다 (single-flight).
//! 타이머가 cycle 도중에 울리면 그 tick은 no-op이다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::consumer::{ErrorSink, EventConsumer};
use super::store::Store;
use crate::domain::diff::diff_at;
use crate::domain::models::Snapshot;
use crate::domain::state::classify_all;
use crate::infrastructure::gh::GhError;
use crate::scanner::PrSource;

/// cycle 하나의 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 새 snapshot 게시 완료
    Published { prs: usize, events: usize },
    /// fetch 실패: 아무것도 게시하지 않음
    Failed,
    /// 이미 다른 cycle이 진행 중
    Skipped,
    /// abort 요청으로 fetch 중단
    Cancelled,
}

pub struct Poller {
    source: Arc<dyn PrSource>,
    store: Arc<dyn Store>,
    dormant_threshold_hours: u64,
    in_flight: AtomicBool,
    /// 직전 게시 snapshot. publish 단계만 교체한다.
    published: Mutex<Arc<Snapshot>>,
}

/// in-flight 플래그 drop guard. 어떤 경로로 cycle이 끝나도 (panic 포함) 플래그와 polling을 해제한다.
struct InFlightGuard<'a> {
    poller: &'a Poller,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(poller: &'a Poller) -> Option<Self> {
        poller
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        poller.store.set_polling(true);
        Some(Self { poller })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.poller.store.set_polling(false);
        self.poller.in_flight.store(false, Ordering::Release);
    }
}

impl Poller {
    pub fn new(source: Arc<dyn PrSource>, store: Arc<dyn Store>, dormant_threshold_hours: u64) -> Self {
        Self {
            source,
            store,
            dormant_threshold_hours,
            in_flight: AtomicBool::new(false),
            published: Mutex::new(Arc::new(Snapshot::new())),
        }
    }

    /// 마지막으로 게시된 snapshot
    pub fn published(&self) -> Arc<Snapshot> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_polling(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// 즉시 한 cycle 실행 (진행 중이면 Skipped)
    pub async fn poll_once(
        &self,
        repo_scope: &[String],
        consumer: &dyn EventConsumer,
        errors: &dyn ErrorSink,
    ) -> CycleOutcome {
        self.run_cycle(repo_scope, consumer, errors, &CancellationToken::new())
            .await
    }

    async fn run_cycle(
        &self,
        repo_scope: &[String],
        consumer: &dyn EventConsumer,
        errors: &dyn ErrorSink,
        cancel: &CancellationToken,
    ) -> CycleOutcome {
        let Some(_guard) = InFlightGuard::acquire(self) else {
            debug!("poll cycle already in flight, skipping");
            return CycleOutcome::Skipped;
        };

        let previous = self.published();
        let started = std::time::Instant::now();

        let fetched = tokio::select! {
            _ = cancel.cancelled() => Err(GhError::Cancelled),
            result = self.source.fetch(repo_scope, &previous) => result,
        };

        let current = match fetched {
            Ok(snapshot) => snapshot,
            Err(GhError::Cancelled) => {
                info!("poll cycle cancelled");
                return CycleOutcome::Cancelled;
            }
            Err(e) => {
                errors.on_error(&e);
                return CycleOutcome::Failed;
            }
        };

        let now = Utc::now();
        let events = diff_at(&previous, &current, now);
        let states = classify_all(&current, self.dormant_threshold_hours, now);

        // publish
        let current = Arc::new(current);
        self.store.replace_snapshot(Arc::clone(&current));
        for (key, state) in &states {
            self.store.set_state(key, *state);
        }
        self.store.set_last_poll_at(now);
        *self.published.lock().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&current);

        info!(
            "poll cycle done: {} PRs, {} events ({}ms)",
            current.len(),
            events.len(),
            started.elapsed().as_millis()
        );

        if !events.is_empty() {
            consumer.on_events(&events).await;
        }

        CycleOutcome::Published {
            prs: current.len(),
            events: events.len(),
        }
    }

    /// 즉시 한 cycle을 실행하고 이후 `interval`마다 반복한다.
    pub fn start(
        self: &Arc<Self>,
        interval: Duration,
        repo_scope: Vec<String>,
        consumer: Arc<dyn EventConsumer>,
        errors: Arc<dyn ErrorSink>,
    ) -> PollerHandle {
        let stop = CancellationToken::new();
        let abort = CancellationToken::new();
        let poller = Arc::clone(self);
        let scope: Arc<[String]> = repo_scope.into();
        // tokio interval은 0 주기를 허용하지 않는다
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn({
            let stop = stop.clone();
            let abort = abort.clone();
            async move {
                let mut tick = tokio::time::interval(period);
                tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
                let mut cycles: JoinSet<CycleOutcome> = JoinSet::new();

                loop {
                    tokio::select! {
                        biased;
                        _ = stop.cancelled() => break,
                        _ = tick.tick() => {
                            while let Some(done) = cycles.try_join_next() {
                                if let Err(e) = done {
                                    error!("poll cycle panicked: {e}");
                                }
                            }

                            let poller = Arc::clone(&poller);
                            let scope = Arc::clone(&scope);
                            let consumer = Arc::clone(&consumer);
                            let errors = Arc::clone(&errors);
                            let abort = abort.clone();
                            cycles.spawn(async move {
                                poller
                                    .run_cycle(&scope, consumer.as_ref(), errors.as_ref(), &abort)
                                    .await
                            });
                        }
                    }
                }

                // 진행 중인 cycle은 끝까지 기다린다
                while let Some(done) = cycles.join_next().await {
                    if let Err(e) = done {
                        error!("poll cycle panicked: {e}");
                    }
                }
                debug!("poller loop stopped");
            }
        });

        PollerHandle { stop, abort, task }
    }
}

/// `Poller::start`가 돌려주는 제어 핸들
pub struct PollerHandle {
    stop: CancellationToken,
    abort: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// 타이머를 멈추고 진행 중인 cycle이 끝날 때까지 기다린다.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            error!("poller loop panicked: {e}");
        }
    }

    /// 진행 중인 cycle의 fetch까지 취소한 뒤 멈춘다.
    pub async fn abort(self) {
        self.abort.cancel();
        self.stop().await;
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::store::MemoryStore;
    use crate::domain::events::{PrEvent, PrEventKind};
    use crate::domain::fixtures::{check, pr, snapshot_of};
    use crate::domain::models::{
        CheckStatus, Conclusion, Mergeable, PrLifecycle, PullRequest, ReviewDecision,
    };
    use crate::domain::state::PrState;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    // ─── Test doubles ───

    #[derive(Default)]
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Snapshot, GhError>>>,
        calls: AtomicUsize,
        known_sizes: Mutex<Vec<usize>>,
        gate: Option<Arc<Notify>>,
        delay: Option<Duration>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Snapshot, GhError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        fn gated(responses: Vec<Result<Snapshot, GhError>>, gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new(responses)
            }
        }

        fn slow(responses: Vec<Result<Snapshot, GhError>>, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new(responses)
            }
        }
    }

    #[async_trait]
    impl PrSource for ScriptedSource {
        async fn fetch(&self, _scope: &[String], known: &Snapshot) -> Result<Snapshot, GhError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.known_sizes.lock().unwrap().push(known.len());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Snapshot::new()))
        }

        async fn fetch_one_detail(
            &self,
            _owner: &str,
            _repo: &str,
            _number: i64,
        ) -> Result<PullRequest, GhError> {
            Err(GhError::Provider {
                exit_code: 1,
                stderr: "not scripted".into(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingConsumer {
        batches: Mutex<Vec<Vec<PrEvent>>>,
    }

    impl RecordingConsumer {
        fn kinds(&self) -> Vec<Vec<PrEventKind>> {
            self.batches
                .lock()
                .unwrap()
                .iter()
                .map(|b| b.iter().map(|e| e.kind).collect())
                .collect()
        }
    }

    #[async_trait]
    impl EventConsumer for RecordingConsumer {
        async fn on_events(&self, events: &[PrEvent]) {
            self.batches.lock().unwrap().push(events.to_vec());
        }
    }

    #[derive(Default)]
    struct CountingSink(AtomicUsize);

    impl ErrorSink for CountingSink {
        fn on_error(&self, _err: &GhError) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    // 고정 fixture 날짜가 dormant로 분류되지 않도록 threshold 최대
    const NEVER_DORMANT: u64 = u64::MAX;

    fn poller_with(source: ScriptedSource) -> (Arc<Poller>, Arc<MemoryStore>, Arc<ScriptedSource>) {
        let source = Arc::new(source);
        let store = Arc::new(MemoryStore::new());
        let poller = Arc::new(Poller::new(source.clone(), store.clone(), NEVER_DORMANT));
        (poller, store, source)
    }

    fn ready_pr() -> PullRequest {
        let mut p = pr("a/b", 1);
        p.mergeable = Mergeable::Mergeable;
        p.review_decision = Some(ReviewDecision::Approved);
        p.checks = vec![check("ci", CheckStatus::Completed, Some(Conclusion::Success))];
        p
    }

    // ─── Scenarios ───

    #[tokio::test]
    async fn new_pr_is_opened_and_waiting() {
        let (poller, store, _) = poller_with(ScriptedSource::new(vec![Ok(snapshot_of(vec![pr(
            "a/b", 1,
        )]))]));
        let consumer = RecordingConsumer::default();
        let sink = CountingSink::default();

        let outcome = poller.poll_once(&[], &consumer, &sink).await;

        assert_eq!(outcome, CycleOutcome::Published { prs: 1, events: 1 });
        assert_eq!(consumer.kinds(), vec![vec![PrEventKind::Opened]]);
        assert_eq!(store.state("a/b#1"), Some(PrState::Waiting));
        assert!(store.last_poll_at().is_some());
        assert!(!store.is_polling());
    }

    #[tokio::test]
    async fn merged_pr_is_blocked() {
        let mut merged = pr("a/b", 1);
        merged.state = PrLifecycle::Merged;
        let (poller, store, _) = poller_with(ScriptedSource::new(vec![
            Ok(snapshot_of(vec![pr("a/b", 1)])),
            Ok(snapshot_of(vec![merged])),
        ]));
        let consumer = RecordingConsumer::default();
        let sink = CountingSink::default();

        poller.poll_once(&[], &consumer, &sink).await;
        poller.poll_once(&[], &consumer, &sink).await;

        assert_eq!(consumer.kinds()[1], vec![PrEventKind::Merged]);
        assert_eq!(store.state("a/b#1"), Some(PrState::Blocked));
    }

    #[tokio::test]
    async fn failing_check_is_checks_changed_and_hot() {
        let mut failing = pr("a/b", 1);
        failing.checks = vec![check("ci", CheckStatus::Completed, Some(Conclusion::Failure))];
        let (poller, store, _) = poller_with(ScriptedSource::new(vec![
            Ok(snapshot_of(vec![pr("a/b", 1)])),
            Ok(snapshot_of(vec![failing])),
        ]));
        let consumer = RecordingConsumer::default();
        let sink = CountingSink::default();

        poller.poll_once(&[], &consumer, &sink).await;
        poller.poll_once(&[], &consumer, &sink).await;

        assert_eq!(consumer.kinds()[1], vec![PrEventKind::ChecksChanged]);
        assert_eq!(store.state("a/b#1"), Some(PrState::Hot));
    }

    #[tokio::test]
    async fn approval_with_green_checks_is_ready_to_merge() {
        let mut pending = ready_pr();
        pending.review_decision = Some(ReviewDecision::ReviewRequired);
        let (poller, store, _) = poller_with(ScriptedSource::new(vec![
            Ok(snapshot_of(vec![pending])),
            Ok(snapshot_of(vec![ready_pr()])),
        ]));
        let consumer = RecordingConsumer::default();
        let sink = CountingSink::default();

        poller.poll_once(&[], &consumer, &sink).await;
        poller.poll_once(&[], &consumer, &sink).await;

        assert!(consumer.kinds()[1].contains(&PrEventKind::ReadyToMerge));
        assert_eq!(store.state("a/b#1"), Some(PrState::Ready));
    }

    // ─── Failure / publish rules ───

    #[tokio::test]
    async fn failed_fetch_publishes_nothing_and_reports_once() {
        let (poller, store, _) = poller_with(ScriptedSource::new(vec![
            Ok(snapshot_of(vec![pr("a/b", 1)])),
            Err(GhError::Auth("gh auth login".into())),
        ]));
        let consumer = RecordingConsumer::default();
        let sink = CountingSink::default();

        poller.poll_once(&[], &consumer, &sink).await;
        let first_poll = store.last_poll_at();
        let outcome = poller.poll_once(&[], &consumer, &sink).await;

        assert_eq!(outcome, CycleOutcome::Failed);
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.last_poll_at(), first_poll);
        assert_eq!(poller.published().len(), 1);
        assert_eq!(consumer.kinds().len(), 1);
        assert!(!store.is_polling());
    }

    #[tokio::test]
    async fn unchanged_snapshot_does_not_call_consumer() {
        let snap = snapshot_of(vec![pr("a/b", 1)]);
        let (poller, _, source) =
            poller_with(ScriptedSource::new(vec![Ok(snap.clone()), Ok(snap)]));
        let consumer = RecordingConsumer::default();
        let sink = CountingSink::default();

        poller.poll_once(&[], &consumer, &sink).await;
        let outcome = poller.poll_once(&[], &consumer, &sink).await;

        assert_eq!(outcome, CycleOutcome::Published { prs: 1, events: 0 });
        assert_eq!(consumer.kinds().len(), 1);
        // 두 번째 fetch는 직전 snapshot을 hint로 받는다
        assert_eq!(*source.known_sizes.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn vanished_pr_drops_its_state() {
        let (poller, store, _) = poller_with(ScriptedSource::new(vec![
            Ok(snapshot_of(vec![pr("a/b", 1)])),
            Ok(Snapshot::new()),
        ]));
        let consumer = RecordingConsumer::default();
        let sink = CountingSink::default();

        poller.poll_once(&[], &consumer, &sink).await;
        poller.poll_once(&[], &consumer, &sink).await;

        assert_eq!(consumer.kinds()[1], vec![PrEventKind::Closed]);
        assert_eq!(store.state("a/b#1"), None);
    }

    // ─── Single flight / lifecycle ───

    #[tokio::test]
    async fn concurrent_poll_is_skipped() {
        let gate = Arc::new(Notify::new());
        let (poller, _, source) = poller_with(ScriptedSource::gated(
            vec![Ok(snapshot_of(vec![pr("a/b", 1)]))],
            gate.clone(),
        ));
        let consumer = Arc::new(RecordingConsumer::default());
        let sink = Arc::new(CountingSink::default());

        let first = tokio::spawn({
            let poller = poller.clone();
            let consumer = consumer.clone();
            let sink = sink.clone();
            async move { poller.poll_once(&[], consumer.as_ref(), sink.as_ref()).await }
        });

        while source.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(poller.is_polling());

        let second = poller.poll_once(&[], consumer.as_ref(), sink.as_ref()).await;
        assert_eq!(second, CycleOutcome::Skipped);

        gate.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first, CycleOutcome::Published { prs: 1, events: 1 });
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(!poller.is_polling());
    }

    #[tokio::test]
    async fn start_runs_immediately_and_stop_ends_loop() {
        let (poller, store, source) =
            poller_with(ScriptedSource::new(vec![Ok(snapshot_of(vec![pr("a/b", 1)]))]));
        let consumer = Arc::new(RecordingConsumer::default());

        let handle = poller.start(
            Duration::from_secs(3600),
            vec![],
            consumer.clone(),
            Arc::new(CountingSink::default()),
        );

        while store.last_poll_at().is_none() {
            tokio::task::yield_now().await;
        }
        assert!(handle.is_running());
        handle.stop().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(consumer.kinds(), vec![vec![PrEventKind::Opened]]);
    }

    #[tokio::test]
    async fn abort_cancels_in_flight_fetch() {
        let gate = Arc::new(Notify::new());
        let (poller, store, source) = poller_with(ScriptedSource::gated(
            vec![Ok(snapshot_of(vec![pr("a/b", 1)]))],
            gate,
        ));

        let handle = poller.start(
            Duration::from_secs(3600),
            vec![],
            Arc::new(RecordingConsumer::default()),
            Arc::new(CountingSink::default()),
        );

        while source.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        handle.abort().await;

        assert!(store.last_poll_at().is_none());
        assert!(!store.is_polling());
        assert!(poller.published().is_empty());
    }

    #[tokio::test]
    async fn tick_during_cycle_is_skipped_and_stop_waits_for_it() {
        let (poller, store, source) = poller_with(ScriptedSource::slow(
            vec![Ok(snapshot_of(vec![pr("a/b", 1)]))],
            Duration::from_millis(120),
        ));
        let consumer = Arc::new(RecordingConsumer::default());

        // 10ms 주기라 fetch 하나가 도는 동안 여러 tick이 울린다
        let handle = poller.start(
            Duration::from_millis(10),
            vec![],
            consumer.clone(),
            Arc::new(CountingSink::default()),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(poller.is_polling());
        assert!(store.last_poll_at().is_none());
        handle.stop().await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(store.last_poll_at().is_some());
        assert_eq!(consumer.kinds(), vec![vec![PrEventKind::Opened]]);
        assert!(!store.is_polling());
        assert!(!poller.is_polling());
    }
}
