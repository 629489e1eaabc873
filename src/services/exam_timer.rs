use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::db::types::ExamType;

const PHASE_RUNNING: u8 = 1;
const PHASE_EXPIRED: u8 = 2;
const PHASE_COMPLETED: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TimerPhase {
    Running,
    Expired,
    Completed,
}

impl TimerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            PHASE_EXPIRED => Self::Expired,
            PHASE_COMPLETED => Self::Completed,
            _ => Self::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct TimerKey {
    pub(crate) examinee_name: String,
    pub(crate) examinee_id: String,
    pub(crate) exam_type: ExamType,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct TimerStatus {
    pub(crate) phase: TimerPhase,
    pub(crate) remaining_seconds: i64,
    pub(crate) warning: bool,
}

/// Outcome of the one-shot submit guard. The first caller wins; everyone
/// else becomes a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitClaim {
    /// No countdown is registered for this key; direct submissions proceed.
    NoTimer,
    Claimed,
    AlreadySubmitted,
}

#[derive(Clone)]
struct TimerHandle {
    remaining: Arc<AtomicI64>,
    warning_threshold: i64,
    submitted: Arc<AtomicBool>,
    warned: Arc<AtomicBool>,
    phase: Arc<AtomicU8>,
    cancel: Arc<watch::Sender<bool>>,
}

impl TimerHandle {
    fn status(&self) -> TimerStatus {
        let remaining = self.remaining.load(Ordering::SeqCst).max(0);
        TimerStatus {
            phase: TimerPhase::from_u8(self.phase.load(Ordering::SeqCst)),
            remaining_seconds: remaining,
            warning: remaining <= self.warning_threshold,
        }
    }
}

/// Per-process countdowns keyed by (examinee_name, examinee_id, exam_type).
///
/// Expired and completed entries are retained as submit guards until a new
/// session replaces them or cleanup purges the examinee; no timer state
/// survives a restart.
#[derive(Clone)]
pub(crate) struct TimerRegistry {
    inner: Arc<Mutex<HashMap<TimerKey, TimerHandle>>>,
}

impl TimerRegistry {
    pub(crate) fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Starts a countdown for the key. A countdown already Running for the
    /// same key keeps ticking and its current status is returned instead.
    pub(crate) async fn start<F, Fut>(
        &self,
        key: TimerKey,
        duration_seconds: u64,
        warning_threshold_seconds: u64,
        on_expire: F,
    ) -> TimerStatus
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut timers = self.inner.lock().await;

        if let Some(existing) = timers.get(&key) {
            let status = existing.status();
            if status.phase == TimerPhase::Running {
                return status;
            }
        }

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let handle = TimerHandle {
            remaining: Arc::new(AtomicI64::new(duration_seconds as i64)),
            warning_threshold: warning_threshold_seconds as i64,
            submitted: Arc::new(AtomicBool::new(false)),
            warned: Arc::new(AtomicBool::new(false)),
            phase: Arc::new(AtomicU8::new(PHASE_RUNNING)),
            cancel: Arc::new(cancel_tx),
        };
        let status = handle.status();
        timers.insert(key.clone(), handle.clone());
        drop(timers);

        let remaining = handle.remaining.clone();
        let submitted = handle.submitted.clone();
        let warned = handle.warned.clone();
        let phase = handle.phase.clone();
        let warning_threshold = handle.warning_threshold;

        tokio::spawn(async move {
            let mut on_expire = Some(on_expire);
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel_rx.changed() => return,
                    _ = ticker.tick() => {
                        let left = remaining.fetch_sub(1, Ordering::SeqCst) - 1;

                        if left <= warning_threshold && left > 0 && !warned.swap(true, Ordering::SeqCst) {
                            tracing::warn!(
                                examinee_name = %key.examinee_name,
                                examinee_id = %key.examinee_id,
                                exam_type = %key.exam_type,
                                remaining_seconds = left,
                                "Exam time below warning threshold"
                            );
                        }

                        if left <= 0 {
                            if !submitted.swap(true, Ordering::SeqCst) {
                                phase.store(PHASE_EXPIRED, Ordering::SeqCst);
                                tracing::info!(
                                    examinee_name = %key.examinee_name,
                                    examinee_id = %key.examinee_id,
                                    exam_type = %key.exam_type,
                                    "Exam time expired, auto-submitting"
                                );
                                if let Some(action) = on_expire.take() {
                                    action().await;
                                }
                            }
                            return;
                        }
                    }
                }
            }
        });

        status
    }

    pub(crate) async fn status(&self, key: &TimerKey) -> Option<TimerStatus> {
        self.inner.lock().await.get(key).map(TimerHandle::status)
    }

    /// The one-shot guard for manual submission. `Claimed` stops the ticker
    /// and marks the countdown Completed; the entry stays behind so a
    /// duplicate submit observes `AlreadySubmitted`.
    pub(crate) async fn try_claim_submit(&self, key: &TimerKey) -> SubmitClaim {
        let timers = self.inner.lock().await;
        let Some(handle) = timers.get(key) else {
            return SubmitClaim::NoTimer;
        };

        if handle.submitted.swap(true, Ordering::SeqCst) {
            return SubmitClaim::AlreadySubmitted;
        }

        handle.phase.store(PHASE_COMPLETED, Ordering::SeqCst);
        let _ = handle.cancel.send(true);
        SubmitClaim::Claimed
    }

    /// Re-arms the guard after a failed submission attempt so the caller can
    /// retry. The ticker stays stopped; expiry can no longer fire.
    pub(crate) async fn release_claim(&self, key: &TimerKey) {
        if let Some(handle) = self.inner.lock().await.get(key) {
            handle.submitted.store(false, Ordering::SeqCst);
        }
    }

    /// Stops and forgets the countdown, if any.
    pub(crate) async fn cancel(&self, key: &TimerKey) -> bool {
        let Some(handle) = self.inner.lock().await.remove(key) else {
            return false;
        };
        let _ = handle.cancel.send(true);
        true
    }

    pub(crate) async fn cancel_for_examinee(&self, examinee_id: &str) -> usize {
        let mut timers = self.inner.lock().await;
        let keys: Vec<TimerKey> = timers
            .keys()
            .filter(|key| key.examinee_id == examinee_id)
            .cloned()
            .collect();
        for key in &keys {
            if let Some(handle) = timers.remove(key) {
                let _ = handle.cancel.send(true);
            }
        }
        keys.len()
    }

    pub(crate) async fn cancel_all(&self) -> usize {
        let mut timers = self.inner.lock().await;
        let cancelled = timers.len();
        for (_, handle) in timers.drain() {
            let _ = handle.cancel.send(true);
        }
        cancelled
    }
}
