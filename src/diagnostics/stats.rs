use serde::Serialize;
use std::time::Instant;

use crate::camera::types::SourceKind;

/// Collects diagnostic statistics for a capture session.
pub struct DiagnosticStats {
    frame_count: u64,
    synthetic_count: u64,
    read_failures: u64,
    restarts: u64,
    total_bytes: u64,
    start_time: Instant,
    last_frame_time: Option<Instant>,
    source: Option<SourceKind>,
}

/// Snapshot of diagnostic stats for logging and serialisation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSnapshot {
    pub fps: f64,
    pub frame_count: u64,
    pub synthetic_count: u64,
    pub read_failures: u64,
    pub restarts: u64,
    pub bandwidth_bps: u64,
    pub source: Option<SourceKind>,
    pub ms_since_last_frame: Option<u64>,
}

impl DiagnosticStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            synthetic_count: 0,
            read_failures: 0,
            restarts: 0,
            total_bytes: 0,
            start_time: Instant::now(),
            last_frame_time: None,
            source: None,
        }
    }

    /// Record which source the session settled on.
    pub fn set_source(&mut self, source: Option<SourceKind>) {
        self.source = source;
    }

    /// Record a delivered frame.
    pub fn record_frame(&mut self, bytes: usize, source: SourceKind) {
        self.frame_count += 1;
        if source == SourceKind::Synthetic {
            self.synthetic_count += 1;
        }
        self.total_bytes += bytes as u64;
        self.last_frame_time = Some(Instant::now());
    }

    /// Record a transient read failure.
    pub fn record_read_failure(&mut self) {
        self.read_failures += 1;
    }

    /// Record a completed stop-then-start reconfiguration.
    pub fn record_restart(&mut self) {
        self.restarts += 1;
    }

    /// Calculate current FPS based on elapsed time.
    pub fn fps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.frame_count as f64 / elapsed
    }

    /// Bandwidth in bytes per second.
    pub fn bandwidth_bps(&self) -> u64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0;
        }
        (self.total_bytes as f64 / elapsed) as u64
    }

    /// Reset all counters.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Take a serialisable snapshot.
    pub fn snapshot(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            fps: self.fps(),
            frame_count: self.frame_count,
            synthetic_count: self.synthetic_count,
            read_failures: self.read_failures,
            restarts: self.restarts,
            bandwidth_bps: self.bandwidth_bps(),
            source: self.source,
            ms_since_last_frame: self
                .last_frame_time
                .map(|t| t.elapsed().as_millis() as u64),
        }
    }
}

impl Default for DiagnosticStats {
    fn default() -> Self {
        Self::new()
    }
}
