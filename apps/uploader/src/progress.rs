//! Console progress reporting.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cloudmux_transfer::{ProgressCallback, ThroughputMeter};

/// Logs upload progress with speed and ETA at whole-percent steps.
pub struct ProgressReporter {
    total: u64,
    step: f64,
    meter: ThroughputMeter,
    state: Mutex<ReporterState>,
}

#[derive(Default)]
struct ReporterState {
    bytes: u64,
    last_logged: Option<f64>,
}

/// One progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLine {
    pub percent: f64,
    pub bytes: u64,
    pub bytes_per_second: f64,
    pub eta: Option<Duration>,
}

impl ProgressReporter {
    /// Reports at most once per `step` percentage points, plus 100%.
    pub fn new(total: u64, step: f64) -> Self {
        Self {
            total,
            step: step.max(0.1),
            meter: ThroughputMeter::default(),
            state: Mutex::new(ReporterState::default()),
        }
    }

    /// Feeds a percentage; returns a line when it should be shown.
    pub fn observe(&self, percent: f64) -> Option<ProgressLine> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let bytes = ((percent / 100.0) * self.total as f64).round() as u64;
        let delta = bytes.saturating_sub(state.bytes);
        state.bytes = state.bytes.max(bytes);
        if delta > 0 {
            self.meter.record(delta);
        }

        let due = match state.last_logged {
            None => true,
            Some(last) => percent >= 100.0 || percent - last >= self.step,
        };
        if !due || state.last_logged == Some(percent) {
            return None;
        }
        state.last_logged = Some(percent);

        Some(ProgressLine {
            percent,
            bytes: state.bytes,
            bytes_per_second: self.meter.bytes_per_second(),
            eta: self.meter.eta(self.total.saturating_sub(state.bytes)),
        })
    }

    /// Wraps the reporter as an engine progress callback that logs lines.
    pub fn into_callback(self: Arc<Self>) -> ProgressCallback {
        Arc::new(move |percent| {
            if let Some(line) = self.observe(percent) {
                tracing::info!(
                    percent = format_args!("{:.1}", line.percent),
                    sent = %human_bytes(line.bytes as f64),
                    speed = %format!("{}/s", human_bytes(line.bytes_per_second)),
                    eta = %line.eta.map(format_eta).unwrap_or_else(|| "-".into()),
                    "progress"
                );
            }
        })
    }
}

/// Formats a byte count with binary units.
pub fn human_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_eta(eta: Duration) -> String {
    let secs = eta.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
