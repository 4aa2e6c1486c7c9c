//! Interpolating reconstructor.
//!
//! Every decimated low-pass sample is expanded back into `F` output samples.
//! Sub-sample `j` is the dot product of the most recent `taps_per_phase`
//! history entries with kernel phase `j`, plus noise scaled by the current
//! high-frequency energy. Accumulation is in `i64` with the kernel at
//! `2^32` scale; the top half becomes the left-justified output.

use crate::dsp::fir::FirKernel;
use crate::dsp::noise::NoiseTable;
use crate::dsp::sample::Int24;

/// Decimated low-pass history. Length is a power of two; tap `k` behind
/// position `i` lives at `(i + len - k) & (len - 1)`.
pub struct LowpassHistory {
    buf: Box<[i32]>,
    mask: usize,
}

impl LowpassHistory {
    pub fn new(len: usize) -> Self {
        assert!(len.is_power_of_two(), "low-pass history length must be a power of two");
        Self {
            buf: vec![0; len].into_boxed_slice(),
            mask: len - 1,
        }
    }

    #[inline]
    pub fn write(&mut self, pos: usize, v: i32) {
        self.buf[pos & self.mask] = v;
    }

    #[inline]
    pub fn tap(&self, pos: usize, k: usize) -> i32 {
        self.buf[(pos + self.buf.len() - k) & self.mask]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.buf
    }

    pub fn reset(&mut self) {
        self.buf.fill(0);
    }
}

pub struct Reconstructor {
    kernel: FirKernel,
    noise: NoiseTable,
    history: LowpassHistory,
}

impl Reconstructor {
    pub fn new(kernel: FirKernel, noise: NoiseTable) -> Self {
        let history = LowpassHistory::new(kernel.taps_per_phase());
        Self {
            kernel,
            noise,
            history,
        }
    }

    /// Store the decimated sample for group `pos`, overwriting the entry
    /// written one history length ago.
    #[inline]
    pub fn push_lowpass(&mut self, pos: usize, v: i32) {
        self.history.write(pos, v);
    }

    /// FIR dot product for sub-sample `phase` of group `pos`.
    #[inline]
    pub fn interpolate(&self, pos: usize, phase: usize) -> i64 {
        let mut sum: i64 = 0;
        for k in 0..self.kernel.taps_per_phase() {
            let x = self.history.tap(pos, k) as i64;
            let c = self.kernel.coeff(phase, k) as i64;
            sum = sum.saturating_add(x * c);
        }
        sum
    }

    /// Write the `F` output samples of group `pos`.
    ///
    /// `noise_base` is the block's noise cursor. Every sub-sample of the
    /// group takes the same noise entry, `noise_base + pos`.
    pub fn reconstruct_group(&self, pos: usize, noise_base: usize, hifsum: i32, out: &mut [Int24]) {
        debug_assert_eq!(out.len(), self.kernel.phases());
        let dither = self.noise.get(noise_base + pos) as i64 * hifsum as i64;

        for (phase, slot) in out.iter_mut().enumerate() {
            let sum = self.interpolate(pos, phase).saturating_add(dither);
            *slot = Int24::from_i32((sum >> 32) as i32);
        }
    }

    pub fn kernel(&self) -> &FirKernel {
        &self.kernel
    }

    pub fn noise(&self) -> &NoiseTable {
        &self.noise
    }

    pub fn history(&self) -> &LowpassHistory {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.reset();
    }
}
