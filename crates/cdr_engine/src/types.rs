use std::fmt;

use cdr_core::CdrVersion;

/// Why a record was passed over without producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingContentType,
    UnsupportedContentType { content_type: String },
    MediaNotSupported { version: CdrVersion },
    MissingHost,
}

impl SkipReason {
    /// Anomalies are skips worth a warning; the rest are routine filtering.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, SkipReason::MissingContentType | SkipReason::MissingHost)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingContentType => write!(f, "no content-type"),
            SkipReason::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            SkipReason::MediaNotSupported { version } => {
                write!(f, "{version} does not embed media")
            }
            SkipReason::MissingHost => write!(f, "url has no host"),
        }
    }
}

/// Result of processing one record in either pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Emitted,
    Skipped(SkipReason),
    Failed(String),
}

/// Per-pass counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassStats {
    pub seen: usize,
    pub emitted: usize,
    pub skipped: usize,
    pub anomalies: usize,
    pub failed: usize,
}

impl PassStats {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        self.seen += 1;
        match outcome {
            RecordOutcome::Emitted => self.emitted += 1,
            RecordOutcome::Skipped(reason) => {
                self.skipped += 1;
                if reason.is_anomaly() {
                    self.anomalies += 1;
                }
            }
            RecordOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Moves `count` documents from emitted to failed after a sink lost them.
    pub fn record_dropped(&mut self, count: usize) {
        let moved = count.min(self.emitted);
        self.emitted -= moved;
        self.failed += moved;
    }

    /// A record the repository could not produce at all.
    pub fn record_unreadable(&mut self) {
        self.seen += 1;
        self.failed += 1;
    }
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seen={} emitted={} skipped={} anomalies={} failed={}",
            self.seen, self.emitted, self.skipped, self.anomalies, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    pub media: PassStats,
    pub documents: PassStats,
}
