//! Activity tracking and the inactivity sweep.
//!
//! Every request that names a user refreshes that user's `last_activity`;
//! a background worker periodically deletes documents that have gone quiet
//! for longer than the retention policy allows. Nothing here is allowed to
//! fail the request path or take the process down: storage errors are
//! logged and the next scheduled tick is the retry.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    domain::{
        activity::{
            ActivityFilter, ActivityStats, MAX_SWEEP_INTERVAL, RetentionPolicy, SweepReport,
        },
        errors::DomainError,
    },
    infrastructure::PreferencesRepository,
};

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Owns the retention policy and the single recurring sweep worker.
///
/// Built once at startup and shared through `AppState`; `start`/`stop` move
/// it between the `Stopped` and `Running` states.
pub struct LifecycleManager {
    sweeper: Arc<Sweeper>,
    worker: Mutex<Option<SweepWorker>>,
}

impl LifecycleManager {
    pub fn new(repository: Arc<dyn PreferencesRepository>, policy: RetentionPolicy) -> Self {
        Self {
            sweeper: Arc::new(Sweeper {
                repository,
                policy,
                history: Mutex::new(SweepHistory::default()),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.sweeper.policy
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker().is_some()
    }

    /// Records activity for `user_id`, creating a blank document on first
    /// contact. Never fails: tracking is best-effort instrumentation.
    pub async fn touch(&self, user_id: &str) {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return;
        }

        let result = self.sweeper.repository.touch(user_id, Utc::now()).await;
        log_best_effort("touch", user_id, result);
    }

    /// Starts the recurring sweep and runs one sweep right away.
    ///
    /// Returns `false` without doing anything when already running.
    pub async fn start(&self) -> bool {
        {
            let mut worker = self.lock_worker();
            if worker.is_some() {
                info!("inactivity sweep already running");
                return false;
            }
            *worker = Some(SweepWorker::spawn(self.sweeper.clone()));
        }

        let policy = self.sweeper.policy;
        info!(
            inactivity_days = policy.inactivity_threshold_days,
            interval_ms = duration_ms(policy.sweep_interval),
            "inactivity sweep started"
        );

        let _ = self.sweeper.sweep("startup").await;
        true
    }

    /// Cancels the recurring sweep. A sweep that claimed its tick before this
    /// call finishes, but no new one begins once this returns.
    ///
    /// Returns `false` when there was nothing to stop.
    pub fn stop(&self) -> bool {
        let Some(worker) = self.lock_worker().take() else {
            debug!("inactivity sweep already stopped");
            return false;
        };

        // Detach: an in-flight sweep may still complete.
        drop(worker.cancel());
        self.sweeper.history().next_sweep = None;
        info!("inactivity sweep stopped");
        true
    }

    /// Stops the worker and waits for an in-flight sweep to finish.
    pub async fn shutdown(&self) {
        let Some(worker) = self.lock_worker().take() else {
            return;
        };

        let join_handle = worker.cancel();
        self.sweeper.history().next_sweep = None;
        if let Some(join_handle) = join_handle
            && let Err(err) = join_handle.await
        {
            error!(error = %err, "inactivity sweep worker ended abnormally");
        }
        info!("inactivity sweep shut down");
    }

    /// Runs one sweep now. Failures are logged and also returned so an
    /// administrative caller can report them.
    pub async fn sweep_once(&self) -> Result<SweepReport, DomainError> {
        info!("manual inactivity sweep triggered");
        self.sweeper.sweep("manual").await
    }

    /// Fresh counts against the current cutoff; nothing is cached.
    pub async fn stats(&self) -> Result<ActivityStats, DomainError> {
        let policy = self.sweeper.policy;
        let cutoff = policy.cutoff(Utc::now());
        let repository = &self.sweeper.repository;

        let total_users = repository.count(ActivityFilter::All).await?;
        let active_users = repository.count(ActivityFilter::ActiveSince(cutoff)).await?;
        let inactive_users = repository
            .count(ActivityFilter::InactiveBefore(cutoff))
            .await?;

        let is_running = self.is_running();
        let history = self.sweeper.history();

        Ok(ActivityStats {
            total_users,
            active_users,
            inactive_users,
            inactivity_days: policy.inactivity_threshold_days,
            sweep_interval_ms: duration_ms(policy.sweep_interval),
            is_running,
            next_sweep: history.next_sweep.filter(|_| is_running),
            sweeps_completed: history.sweeps_completed,
            last_sweep: history.last_report.clone(),
        })
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<SweepWorker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        if let Some(worker) = self.lock_worker().take() {
            drop(worker.cancel());
        }
    }
}

/// Logs and discards the error of an operation whose failure must never
/// reach the caller.
fn log_best_effort<T>(operation: &'static str, user_id: &str, result: Result<T, DomainError>) {
    if let Err(err) = result {
        warn!(operation, user_id, error = %err, "activity tracking failed");
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Default)]
struct SweepHistory {
    sweeps_completed: u64,
    last_report: Option<SweepReport>,
    next_sweep: Option<DateTime<Utc>>,
}

struct Sweeper {
    repository: Arc<dyn PreferencesRepository>,
    policy: RetentionPolicy,
    history: Mutex<SweepHistory>,
}

impl Sweeper {
    fn history(&self) -> MutexGuard<'_, SweepHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn interval(&self) -> Duration {
        self.policy
            .sweep_interval
            .clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
    }

    fn schedule_next(&self) {
        let next = chrono::Duration::from_std(self.interval())
            .ok()
            .and_then(|interval| Utc::now().checked_add_signed(interval));
        self.history().next_sweep = next;
    }

    async fn sweep(&self, trigger: &'static str) -> Result<SweepReport, DomainError> {
        let result = self.delete_stale().await;
        match &result {
            Ok(report) => {
                info!(
                    trigger,
                    deleted = report.deleted_count,
                    total = report.remaining_total,
                    active = report.remaining_active,
                    "inactivity sweep completed"
                );
                let mut history = self.history();
                history.sweeps_completed += 1;
                history.last_report = Some(report.clone());
            }
            Err(err) => error!(trigger, error = %err, "inactivity sweep failed"),
        }
        result
    }

    async fn delete_stale(&self) -> Result<SweepReport, DomainError> {
        let started_at = Utc::now();
        let cutoff = self.policy.cutoff(started_at);
        debug!(cutoff = %cutoff, "deleting documents inactive since cutoff");

        let deleted_count = self.repository.delete_inactive(cutoff).await?;
        let remaining_total = self.repository.count(ActivityFilter::All).await?;
        let remaining_active = self
            .repository
            .count(ActivityFilter::ActiveSince(cutoff))
            .await?;

        Ok(SweepReport {
            deleted_count,
            cutoff,
            remaining_total,
            remaining_active,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Open while the worker may begin scheduled sweeps.
///
/// Claiming a tick and closing are serialized: once `close` returns, no tick
/// can be claimed and no claimed tick can still write `next_sweep`.
#[derive(Debug)]
struct SweepGate {
    open: Mutex<bool>,
}

impl SweepGate {
    fn new() -> Self {
        Self {
            open: Mutex::new(true),
        }
    }

    /// Runs `on_claim` under the gate when it is still open.
    fn claim(&self, on_claim: impl FnOnce()) -> bool {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            on_claim();
        }
        *open
    }

    fn close(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

/// Handle to the background task driving scheduled sweeps.
struct SweepWorker {
    gate: Arc<SweepGate>,
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl SweepWorker {
    fn spawn(sweeper: Arc<Sweeper>) -> Self {
        let period = sweeper.interval();
        let gate = Arc::new(SweepGate::new());
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let worker_gate = gate.clone();

        sweeper.schedule_next();
        let join_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if !worker_gate.claim(|| sweeper.schedule_next()) {
                            break;
                        }
                        let _ = sweeper.sweep("scheduled").await;
                    }
                }
            }
            debug!("inactivity sweep worker exited");
        });

        Self {
            gate,
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
        }
    }

    /// Closes the gate before signalling the worker, so a tick that races the
    /// signal finds it closed and exits.
    fn cancel(mut self) -> Option<JoinHandle<()>> {
        self.signal();
        self.join_handle.take()
    }

    fn signal(&mut self) {
        self.gate.close();
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

impl Drop for SweepWorker {
    fn drop(&mut self) {
        self.signal();
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{
        domain::preferences::UserPreferences,
        infrastructure::in_memory_preferences_repository::InMemoryPreferencesRepository,
    };

    struct FailingRepository;

    #[async_trait]
    impl PreferencesRepository for FailingRepository {
        async fn find(&self, _user_id: &str) -> Result<Option<UserPreferences>, DomainError> {
            Err(DomainError::storage("store offline"))
        }

        async fn insert(
            &self,
            _preferences: UserPreferences,
        ) -> Result<UserPreferences, DomainError> {
            Err(DomainError::storage("store offline"))
        }

        async fn replace(
            &self,
            _preferences: UserPreferences,
        ) -> Result<UserPreferences, DomainError> {
            Err(DomainError::storage("store offline"))
        }

        async fn touch(&self, _user_id: &str, _at: DateTime<Utc>) -> Result<(), DomainError> {
            Err(DomainError::storage("store offline"))
        }

        async fn delete_inactive(&self, _cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
            Err(DomainError::storage("store offline"))
        }

        async fn count(&self, _filter: ActivityFilter) -> Result<u64, DomainError> {
            Err(DomainError::storage("store offline"))
        }
    }

    fn policy(interval: Duration) -> RetentionPolicy {
        RetentionPolicy {
            inactivity_threshold_days: 25,
            sweep_interval: interval,
        }
    }

    fn seeded(ages_in_days: &[(&str, i64)]) -> Arc<InMemoryPreferencesRepository> {
        let now = Utc::now();
        let documents = ages_in_days.iter().map(|(user_id, days)| {
            let mut document = UserPreferences::blank(*user_id, now);
            document.last_activity = now - ChronoDuration::days(*days);
            document
        });
        Arc::new(InMemoryPreferencesRepository::with_documents(documents))
    }

    fn manager(repository: Arc<dyn PreferencesRepository>, interval: Duration) -> LifecycleManager {
        LifecycleManager::new(repository, policy(interval))
    }

    #[tokio::test]
    async fn touch_on_empty_store_creates_one_recent_record() {
        let repository = Arc::new(InMemoryPreferencesRepository::new());
        let lifecycle = manager(repository.clone(), DEFAULT_INTERVAL);

        lifecycle.touch("user-a").await;

        assert_eq!(
            repository
                .count(ActivityFilter::All)
                .await
                .expect("count should succeed"),
            1
        );
        let document = repository
            .find("user-a")
            .await
            .expect("find should succeed")
            .expect("document should exist");
        assert_eq!(document.user_id, "user-a");
        assert!(Utc::now() - document.last_activity < ChronoDuration::seconds(5));
    }

    #[tokio::test]
    async fn touched_user_counts_as_active() {
        let repository = seeded(&[("user-b", 40)]);
        let lifecycle = manager(repository, DEFAULT_INTERVAL);

        let before = lifecycle.stats().await.expect("stats should succeed");
        assert_eq!(before.active_users, 0);
        assert_eq!(before.inactive_users, 1);

        lifecycle.touch("user-b").await;

        let after = lifecycle.stats().await.expect("stats should succeed");
        assert_eq!(after.active_users, 1);
        assert_eq!(after.inactive_users, 0);
    }

    #[tokio::test]
    async fn blank_touch_is_a_no_op() {
        let repository = Arc::new(InMemoryPreferencesRepository::new());
        let lifecycle = manager(repository.clone(), DEFAULT_INTERVAL);

        lifecycle.touch("   ").await;
        lifecycle.touch("").await;

        assert_eq!(
            repository
                .count(ActivityFilter::All)
                .await
                .expect("count should succeed"),
            0
        );
    }

    #[tokio::test]
    async fn touch_swallows_storage_failures() {
        let lifecycle = manager(Arc::new(FailingRepository), DEFAULT_INTERVAL);
        lifecycle.touch("user-c").await;
    }

    #[tokio::test]
    async fn sweep_removes_only_records_past_the_threshold() {
        let repository = seeded(&[("stale", 26), ("borderline", 24)]);
        let lifecycle = manager(repository.clone(), DEFAULT_INTERVAL);

        let report = lifecycle.sweep_once().await.expect("sweep should succeed");

        assert_eq!(report.deleted_count, 1);
        assert!(
            repository
                .find("stale")
                .await
                .expect("find should succeed")
                .is_none()
        );
        assert!(
            repository
                .find("borderline")
                .await
                .expect("find should succeed")
                .is_some()
        );
    }

    #[tokio::test]
    async fn sweep_scenario_thirty_twenty_one_days() {
        let repository = seeded(&[("old", 30), ("mid", 20), ("new", 1)]);
        let lifecycle = manager(repository.clone(), DEFAULT_INTERVAL);

        let report = lifecycle.sweep_once().await.expect("sweep should succeed");

        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.remaining_total, 2);
        assert_eq!(report.remaining_active, 2);
        assert_eq!(
            repository
                .count(ActivityFilter::All)
                .await
                .expect("count should succeed"),
            2
        );
    }

    #[tokio::test]
    async fn stats_partition_the_total() {
        let repository = seeded(&[("a", 30), ("b", 26), ("c", 3), ("d", 0)]);
        let lifecycle = manager(repository, DEFAULT_INTERVAL);

        let stats = lifecycle.stats().await.expect("stats should succeed");
        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.active_users + stats.inactive_users, stats.total_users);
        assert_eq!(stats.inactive_users, 2);
        assert_eq!(stats.inactivity_days, 25);
        assert!(!stats.is_running);
        assert!(stats.next_sweep.is_none());
    }

    #[tokio::test]
    async fn failed_sweep_is_reported_not_raised() {
        let lifecycle = manager(Arc::new(FailingRepository), DEFAULT_INTERVAL);

        assert!(matches!(
            lifecycle.sweep_once().await,
            Err(DomainError::Storage(_))
        ));
        assert!(lifecycle.start().await);
        assert!(lifecycle.is_running());
        lifecycle.shutdown().await;
    }

    #[tokio::test]
    async fn start_sweeps_immediately_and_schedules_next() {
        let repository = seeded(&[("fresh", 1)]);
        let interval = Duration::from_secs(60 * 60);
        let lifecycle = manager(repository, interval);

        assert!(lifecycle.start().await);
        let stats = lifecycle.stats().await.expect("stats should succeed");

        assert!(stats.is_running);
        assert_eq!(stats.sweeps_completed, 1);
        assert_eq!(
            stats.last_sweep.map(|report| report.deleted_count),
            Some(0)
        );
        let next_sweep = stats.next_sweep.expect("running service has a next sweep");
        let expected = Utc::now() + ChronoDuration::hours(1);
        assert!((expected - next_sweep).num_seconds().abs() <= 5);

        lifecycle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_does_not_add_a_timer() {
        let lifecycle = manager(
            Arc::new(InMemoryPreferencesRepository::new()),
            Duration::from_millis(100),
        );

        assert!(lifecycle.start().await);
        assert!(!lifecycle.start().await);

        tokio::time::sleep(Duration::from_millis(250)).await;

        let stats = lifecycle.stats().await.expect("stats should succeed");
        // one startup sweep plus ticks at 100ms and 200ms
        assert_eq!(stats.sweeps_completed, 3);
        lifecycle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_sweeps() {
        let lifecycle = manager(
            Arc::new(InMemoryPreferencesRepository::new()),
            Duration::from_millis(100),
        );

        assert!(lifecycle.start().await);
        assert!(lifecycle.stop());
        assert!(!lifecycle.is_running());

        tokio::time::sleep(Duration::from_millis(500)).await;

        let stats = lifecycle.stats().await.expect("stats should succeed");
        assert_eq!(stats.sweeps_completed, 1);
        assert!(stats.next_sweep.is_none());
    }

    #[tokio::test]
    async fn stop_when_stopped_is_a_no_op() {
        let lifecycle = manager(
            Arc::new(InMemoryPreferencesRepository::new()),
            DEFAULT_INTERVAL,
        );

        assert!(!lifecycle.stop());
        assert!(!lifecycle.stop());
        assert!(!lifecycle.is_running());
        lifecycle.shutdown().await;
    }

    #[tokio::test]
    async fn service_can_restart_after_stop() {
        let lifecycle = manager(
            Arc::new(InMemoryPreferencesRepository::new()),
            DEFAULT_INTERVAL,
        );

        assert!(lifecycle.start().await);
        assert!(lifecycle.stop());
        assert!(lifecycle.start().await);
        assert!(lifecycle.is_running());

        let stats = lifecycle.stats().await.expect("stats should succeed");
        assert_eq!(stats.sweeps_completed, 2);
        lifecycle.shutdown().await;
    }

    #[test]
    fn closed_gate_claims_nothing() {
        let gate = SweepGate::new();
        let mut claimed = 0;

        assert!(gate.claim(|| claimed += 1));
        gate.close();
        assert!(!gate.claim(|| claimed += 1));
        assert_eq!(claimed, 1);
    }

    /// Delegates to an in-memory store, but parks `delete_inactive` once
    /// `stall` is set until the test releases it.
    #[derive(Default)]
    struct StallingRepository {
        inner: InMemoryPreferencesRepository,
        stall: std::sync::atomic::AtomicBool,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl PreferencesRepository for StallingRepository {
        async fn find(&self, user_id: &str) -> Result<Option<UserPreferences>, DomainError> {
            self.inner.find(user_id).await
        }

        async fn insert(
            &self,
            preferences: UserPreferences,
        ) -> Result<UserPreferences, DomainError> {
            self.inner.insert(preferences).await
        }

        async fn replace(
            &self,
            preferences: UserPreferences,
        ) -> Result<UserPreferences, DomainError> {
            self.inner.replace(preferences).await
        }

        async fn touch(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), DomainError> {
            self.inner.touch(user_id, at).await
        }

        async fn delete_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
            if self.stall.load(std::sync::atomic::Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.delete_inactive(cutoff).await
        }

        async fn count(&self, filter: ActivityFilter) -> Result<u64, DomainError> {
            self.inner.count(filter).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_sweep_finishes_after_stop_without_rescheduling() {
        let repository = Arc::new(StallingRepository::default());
        let lifecycle = manager(repository.clone(), Duration::from_millis(100));

        assert!(lifecycle.start().await);
        repository
            .stall
            .store(true, std::sync::atomic::Ordering::SeqCst);

        // Wait for the first scheduled tick to reach the store.
        repository.entered.notified().await;
        assert!(lifecycle.stop());
        repository.release.notify_one();

        tokio::time::sleep(Duration::from_millis(500)).await;

        let stats = lifecycle.stats().await.expect("stats should succeed");
        assert!(!stats.is_running);
        assert!(stats.next_sweep.is_none());
        // startup sweep plus the in-flight scheduled one, nothing after stop
        assert_eq!(stats.sweeps_completed, 2);
    }

    const DEFAULT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
}
