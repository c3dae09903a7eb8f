use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Callback invoked with the overall completion percentage (0.0 to 100.0).
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// ProgressAggregator
// ---------------------------------------------------------------------------

/// Byte counter shared by all chunk workers of one upload.
///
/// Workers only report deltas. The counter and the callback invocation
/// happen under one lock, so the sequence of percentages a callback sees is
/// non-decreasing no matter how workers interleave. The callback must not
/// call back into the aggregator.
pub struct ProgressAggregator {
    total: u64,
    callback: Option<ProgressCallback>,
    inner: Mutex<ProgressInner>,
}

struct ProgressInner {
    completed: u64,
    finished: bool,
    last_reported: Option<f64>,
}

impl ProgressAggregator {
    pub fn new(total: u64, callback: Option<ProgressCallback>) -> Self {
        Self::with_completed(total, 0, callback)
    }

    /// Starts from `completed` bytes already accepted, without notifying.
    pub fn with_completed(total: u64, completed: u64, callback: Option<ProgressCallback>) -> Self {
        Self {
            total,
            callback,
            inner: Mutex::new(ProgressInner {
                completed,
                finished: false,
                last_reported: None,
            }),
        }
    }

    /// Records `delta` more bytes and notifies the callback.
    ///
    /// Returns the new percentage.
    pub fn add(&self, delta: u64) -> f64 {
        let mut inner = lock(&self.inner);
        inner.completed = inner.completed.saturating_add(delta);
        let pct = self.percent_of(&inner);
        self.report(&mut inner, pct);
        pct
    }

    /// Marks the upload finished and reports 100 unless it already was.
    pub fn complete(&self) {
        let mut inner = lock(&self.inner);
        inner.finished = true;
        inner.completed = inner.completed.max(self.total);
        if inner.last_reported != Some(100.0) {
            self.report(&mut inner, 100.0);
        }
    }

    /// Current percentage, clamped to 100.
    pub fn percent(&self) -> f64 {
        let inner = lock(&self.inner);
        self.percent_of(&inner)
    }

    pub fn bytes_completed(&self) -> u64 {
        lock(&self.inner).completed
    }

    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    fn percent_of(&self, inner: &ProgressInner) -> f64 {
        if self.total == 0 {
            return if inner.finished { 100.0 } else { 0.0 };
        }
        (inner.completed as f64 / self.total as f64 * 100.0).min(100.0)
    }

    fn report(&self, inner: &mut ProgressInner, pct: f64) {
        inner.last_reported = Some(pct);
        if let Some(cb) = &self.callback {
            cb(pct);
        }
    }
}

// ---------------------------------------------------------------------------
// ThroughputMeter
// ---------------------------------------------------------------------------

/// Cumulative byte count at one instant.
#[derive(Clone, Copy)]
struct Mark {
    at: Instant,
    total: u64,
}

const MAX_MARKS: usize = 128;

/// Transfer speed over a sliding time window.
///
/// Callers feed byte deltas as they observe them. The meter keeps running
/// totals, so the rate is the bytes moved between the oldest and newest mark
/// divided by the time between them. Bytes in the very first delta arrived
/// before timing began and never count toward the rate.
pub struct ThroughputMeter {
    window: Duration,
    marks: Mutex<VecDeque<Mark>>,
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl ThroughputMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            marks: Mutex::new(VecDeque::new()),
        }
    }

    /// Records `delta` bytes moved since the previous call.
    pub fn record(&self, delta: u64) {
        self.record_at(Instant::now(), delta);
    }

    /// Records `delta` bytes as of `at`. Marks must arrive in time order.
    pub fn record_at(&self, at: Instant, delta: u64) {
        let mut marks = lock(&self.marks);
        let total = marks.back().map_or(0, |m| m.total).saturating_add(delta);
        marks.push_back(Mark { at, total });

        // The newest mark older than the window stays as the baseline.
        if let Some(cutoff) = at.checked_sub(self.window) {
            while marks.len() > 2 && marks[1].at <= cutoff {
                marks.pop_front();
            }
        }
        while marks.len() > MAX_MARKS {
            marks.pop_front();
        }
    }

    /// Bytes recorded so far.
    pub fn total(&self) -> u64 {
        lock(&self.marks).back().map_or(0, |m| m.total)
    }

    /// 0.0 until two marks with distinct instants exist.
    pub fn bytes_per_second(&self) -> f64 {
        let marks = lock(&self.marks);
        let (Some(first), Some(last)) = (marks.front(), marks.back()) else {
            return 0.0;
        };
        let elapsed = last.at.saturating_duration_since(first.at);
        if elapsed.is_zero() {
            return 0.0;
        }
        (last.total - first.total) as f64 / elapsed.as_secs_f64()
    }

    /// Time to move `remaining_bytes` at the current rate, `None` while the
    /// rate is unknown or zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / rate))
    }
}
