//! Per-block diagnostics for development and tuning.
//!
//! The audio thread never formats or logs. It fills a fixed-size
//! [`BlockReport`] on the stack and hands it to a lock-free SPSC queue;
//! a non-real-time thread drains the queue and logs each report. When the
//! reader falls behind, reports are dropped and counted rather than
//! blocking the audio thread.

use crate::config::MAX_TAPS_PER_PHASE;
use log::{debug, warn};
use ringbuf::{Consumer, Producer, RingBuffer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const MAX_REPORT_GROUPS: usize = MAX_TAPS_PER_PHASE;

/// Magnitudes of one block's decimated low-pass samples plus the block's
/// aggregated high-frequency energy, both in units of `2^24`.
#[derive(Clone, Copy, Debug)]
pub struct BlockReport {
    pub block_index: u64,
    pub hf_energy: f32,
    len: usize,
    lowpass: [f32; MAX_REPORT_GROUPS],
}

impl BlockReport {
    pub fn new(block_index: u64) -> Self {
        Self {
            block_index,
            hf_energy: 0.0,
            len: 0,
            lowpass: [0.0; MAX_REPORT_GROUPS],
        }
    }

    /// Extra groups past capacity are ignored.
    #[inline]
    pub fn push_lowpass(&mut self, magnitude: f32) {
        if self.len < MAX_REPORT_GROUPS {
            self.lowpass[self.len] = magnitude;
            self.len += 1;
        }
    }

    pub fn lowpass(&self) -> &[f32] {
        &self.lowpass[..self.len]
    }
}

impl fmt::Display for BlockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, m) in self.lowpass().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:3.0}", m)?;
        }
        write!(f, "] hf={:4.0}", self.hf_energy)
    }
}

/// Audio-thread end of the diagnostics queue.
pub struct DiagnosticsTap {
    producer: Producer<BlockReport>,
    dropped: Arc<AtomicU64>,
}

impl DiagnosticsTap {
    #[inline]
    pub fn publish(&mut self, report: BlockReport) {
        if self.producer.push(report).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Reader end; lives on a non-real-time thread.
pub struct DiagnosticsReader {
    consumer: Consumer<BlockReport>,
    dropped: Arc<AtomicU64>,
    dropped_logged: u64,
}

impl DiagnosticsReader {
    /// Hand every pending report to `f`, oldest first. Returns the count.
    pub fn drain<F: FnMut(&BlockReport)>(&mut self, mut f: F) -> usize {
        let mut n = 0;
        while let Some(report) = self.consumer.pop() {
            f(&report);
            n += 1;
        }
        n
    }

    /// Drain into the `log` facade.
    pub fn log_pending(&mut self) -> usize {
        let n = self.drain(|report| debug!("block {}: {}", report.block_index, report));

        let dropped = self.dropped();
        if dropped > self.dropped_logged {
            warn!(
                "diagnostics queue full: dropped {} block reports",
                dropped - self.dropped_logged
            );
            self.dropped_logged = dropped;
        }
        n
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Create a queue holding up to `capacity` unread reports.
pub fn diagnostics_channel(capacity: usize) -> (DiagnosticsTap, DiagnosticsReader) {
    assert!(capacity > 0, "diagnostics capacity must be > 0");
    let (producer, consumer) = RingBuffer::<BlockReport>::new(capacity).split();
    let dropped = Arc::new(AtomicU64::new(0));
    (
        DiagnosticsTap {
            producer,
            dropped: dropped.clone(),
        },
        DiagnosticsReader {
            consumer,
            dropped,
            dropped_logged: 0,
        },
    )
}
