//! Progress and status reporting.
//!
//! A [`ProgressSink`] receives messages from the controller thread and from
//! every scoring worker at once. [`WorkerProgress`] keeps one percent slot per
//! worker and forwards the average, so workers never coordinate with each
//! other.

use std::sync::atomic::{AtomicU8, Ordering};

/// Importance of a progress message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Normal,
    Warning,
    Error,
    Abort,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Abort => "abort",
        }
    }
}

/// Receiver for progress updates; may be called from several threads at once.
pub trait ProgressSink: Sync {
    fn report(&self, message: &str, percent: u8, severity: Severity);
}

/// Sink that drops every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _message: &str, _percent: u8, _severity: Severity) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&str, u8, Severity) + Sync,
{
    fn report(&self, message: &str, percent: u8, severity: Severity) {
        self(message, percent, severity)
    }
}

/// Aggregates per-worker percentages of one scoring pass.
pub(crate) struct WorkerProgress<'a> {
    sink: &'a dyn ProgressSink,
    message: &'a str,
    slots: Vec<AtomicU8>,
    /// Highest mean handed to the sink so far.
    published: AtomicU8,
}

impl<'a> WorkerProgress<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, message: &'a str, workers: usize) -> Self {
        Self {
            sink,
            message,
            slots: (0..workers.max(1)).map(|_| AtomicU8::new(0)).collect(),
            published: AtomicU8::new(0),
        }
    }

    /// Stores `percent` for `worker` and reports the mean over all workers.
    ///
    /// A mean below one already reported is dropped, so the sink only sees
    /// non-decreasing percentages.
    pub(crate) fn update(&self, worker: usize, percent: u8) {
        if let Some(slot) = self.slots.get(worker) {
            slot.store(percent.min(100), Ordering::Relaxed);
        }
        let total: u32 = self
            .slots
            .iter()
            .map(|s| u32::from(s.load(Ordering::Relaxed)))
            .sum();
        let mean = (total / self.slots.len() as u32) as u8;
        if self.published.fetch_max(mean, Ordering::AcqRel) > mean {
            return;
        }
        self.sink.report(self.message, mean, Severity::Normal);
    }
}
