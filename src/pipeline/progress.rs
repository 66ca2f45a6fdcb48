//! Progress reporting for long running pipeline stages.

use tracing::info;

/// Receives coarse progress updates. Implementations must return quickly and
/// never fail; the pipeline does not wait on them.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(u8, &str) + Send + Sync,
{
    fn report(&self, percent: u8, message: &str) {
        self(percent, message)
    }
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn report(&self, _percent: u8, _message: &str) {}
}

/// Emits updates as `info` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, percent: u8, message: &str) {
        info!(percent, "{message}");
    }
}

/// Item-level stages and the slice of the overall percentage each one owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Primary,
    Families,
    Enrichment,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Self::Primary => "Phase 1: extracting seed patents",
            Self::Families => "Phase 2: expanding patent families",
            Self::Enrichment => "Phase 3: enriching from Google Patents",
        }
    }

    fn band(self) -> (u32, u32) {
        match self {
            Self::Primary => (0, 40),
            Self::Families => (40, 70),
            Self::Enrichment => (70, 95),
        }
    }
}

/// Reports `current/total` within one phase.
pub(crate) struct PhaseProgress<'a> {
    sink: &'a dyn ProgressSink,
    phase: Phase,
    total: usize,
}

impl<'a> PhaseProgress<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, phase: Phase, total: usize) -> Self {
        Self { sink, phase, total }
    }

    pub(crate) fn step(&self, current: usize, identifier: &str) {
        let ratio = if self.total == 0 {
            1.0
        } else {
            current.min(self.total) as f64 / self.total as f64
        };
        let (start, end) = self.phase.band();
        let percent = start + ((end - start) as f64 * ratio).round() as u32;
        let mut message = format!(
            "{}: {current}/{} ({:.1}%)",
            self.phase.label(),
            self.total,
            ratio * 100.0
        );
        if !identifier.is_empty() {
            message.push_str(" - ");
            message.push_str(identifier);
        }
        self.sink.report(percent.min(100) as u8, &message);
    }
}
