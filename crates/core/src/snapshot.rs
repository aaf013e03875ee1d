//! Before/after signal images around fault transitions.
//!
//! Each device keeps a ring of its most recent healthy samples and the most
//! recent faulty sample. When a transition is classified the buffer yields
//! the pair of samples that bracket it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::fault::{FaultCode, Transition};
use crate::sample::TelemetrySample;
use crate::stats::WaveformStats;

/// Default number of healthy samples retained per device.
pub const DEFAULT_BUFFER_DEPTH: usize = 10;

/// Which side of a transition a snapshot shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPhase {
    Before,
    After,
    BeforeRecovery,
    AfterRecovery,
}

impl SnapshotPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotPhase::Before => "before",
            SnapshotPhase::After => "after",
            SnapshotPhase::BeforeRecovery => "before_recovery",
            SnapshotPhase::AfterRecovery => "after_recovery",
        }
    }
}

impl fmt::Display for SnapshotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sample selected for durable storage.
#[derive(Debug, Clone)]
pub struct SnapshotCapture {
    pub fault_code: FaultCode,
    pub phase: SnapshotPhase,
    pub sample: Arc<TelemetrySample>,
}

/// One channel of a capture, ready to be written as a row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub channel_id: i64,
    pub label: String,
    pub channel_type: String,
    pub value: f64,
    pub waveform: Vec<f64>,
    pub spectrum: Vec<f64>,
    pub stats: WaveformStats,
}

impl SnapshotCapture {
    /// Per-channel records with waveform statistics. Channels without an
    /// integer id are stored as channel `0`.
    pub fn channel_records(&self) -> Vec<ChannelSnapshot> {
        self.sample
            .channels
            .iter()
            .map(|ch| ChannelSnapshot {
                channel_id: ch.id.unwrap_or(0),
                label: ch.label.clone(),
                channel_type: ch.channel_type.clone(),
                value: ch.value,
                waveform: ch.waveform.clone(),
                spectrum: ch.spectrum.clone(),
                stats: WaveformStats::from_samples(&ch.waveform),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// Per-device snapshot state.
#[derive(Debug)]
pub struct SnapshotBuffer {
    depth: usize,
    normal: VecDeque<Arc<TelemetrySample>>,
    last_fault: Option<Arc<TelemetrySample>>,
    /// Fault code for which onset snapshots were already taken.
    captured_for: Option<FaultCode>,
}

impl SnapshotBuffer {
    /// `depth` is raised to at least 1.
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            normal: VecDeque::with_capacity(depth),
            last_fault: None,
            captured_for: None,
        }
    }

    /// Record an accepted sample: healthy samples enter the ring, faulty
    /// samples replace the fault slot.
    pub fn record(&mut self, sample: Arc<TelemetrySample>) {
        if sample.fault_code.is_normal() {
            if self.normal.len() == self.depth {
                self.normal.pop_front();
            }
            self.normal.push_back(sample);
        } else {
            self.last_fault = Some(sample);
        }
    }

    pub fn latest_normal(&self) -> Option<&Arc<TelemetrySample>> {
        self.normal.back()
    }

    pub fn latest_fault(&self) -> Option<&Arc<TelemetrySample>> {
        self.last_fault.as_ref()
    }

    pub fn normal_len(&self) -> usize {
        self.normal.len()
    }

    pub fn captured_for(&self) -> Option<FaultCode> {
        self.captured_for
    }

    /// Select the samples to persist for `transition`. `current` must
    /// already have been passed to [`record`](Self::record).
    ///
    /// - Onset: latest healthy sample as `before` (omitted if the device
    ///   never reported healthy) and `current` as `after`, unless snapshots
    ///   for this fault code were already taken.
    /// - Recovery: latest faulty sample as `before_recovery` and `current` as
    ///   `after_recovery`; clears the capture guard.
    pub fn capture(
        &mut self,
        transition: Transition,
        current: &Arc<TelemetrySample>,
    ) -> Vec<SnapshotCapture> {
        match transition {
            Transition::NoOp => Vec::new(),
            Transition::Onset(code) => {
                if self.captured_for == Some(code) {
                    return Vec::new();
                }
                self.captured_for = Some(code);
                let mut out = Vec::with_capacity(2);
                if let Some(before) = self.latest_normal() {
                    out.push(SnapshotCapture {
                        fault_code: code,
                        phase: SnapshotPhase::Before,
                        sample: Arc::clone(before),
                    });
                }
                out.push(SnapshotCapture {
                    fault_code: code,
                    phase: SnapshotPhase::After,
                    sample: Arc::clone(current),
                });
                out
            }
            Transition::Recovery(code) => {
                self.captured_for = None;
                let mut out = Vec::with_capacity(2);
                if let Some(before) = self.latest_fault() {
                    out.push(SnapshotCapture {
                        fault_code: code,
                        phase: SnapshotPhase::BeforeRecovery,
                        sample: Arc::clone(before),
                    });
                }
                out.push(SnapshotCapture {
                    fault_code: code,
                    phase: SnapshotPhase::AfterRecovery,
                    sample: Arc::clone(current),
                });
                out
            }
        }
    }
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_DEPTH)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
