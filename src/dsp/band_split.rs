//! Low/high band splitter.
//!
//! A single-pole leaky integrator tracks the low band:
//! `prev = prev - (prev >> B) + (v >> B)`. What it leaves behind, `v - prev`,
//! is the high band; its scaled magnitude feeds a ring of `block_len` slots
//! whose running sum `hifsum` is maintained by add-on-insert,
//! subtract-on-evict.

use crate::dsp::sample::Int24;

pub struct BandSplitter {
    prev: i32,
    hif: Box<[i32]>,
    hifsum: i32,
    shift: u32,
    hf_divisor: i64,
}

impl BandSplitter {
    /// `ring_len` is the block length; `hf_divisor` must be at least
    /// `2 * ring_len` for `hifsum` to stay below `2^31`.
    pub fn new(ring_len: usize, filter_freq_bits: u32, hf_divisor: usize) -> Self {
        assert!(ring_len > 0, "hf ring length must be > 0");
        assert!(hf_divisor >= ring_len * 2, "hf divisor too small for ring length");
        Self {
            prev: 0,
            hif: vec![0; ring_len].into_boxed_slice(),
            hifsum: 0,
            shift: filter_freq_bits,
            hf_divisor: hf_divisor as i64,
        }
    }

    /// Feed one left-justified sample landing at block position `pos`.
    ///
    /// The slot at `pos` was written exactly one block ago, so it is the one
    /// leaving the window.
    #[inline]
    pub fn push(&mut self, pos: usize, v: i32) {
        self.prev = self.prev - (self.prev >> self.shift) + (v >> self.shift);

        // Residual against the updated estimate; i64 so v - prev cannot wrap
        let h = ((v as i64 - self.prev as i64).abs() / self.hf_divisor) as i32;

        let slot = &mut self.hif[pos];
        self.hifsum += h - *slot;
        *slot = h;
    }

    /// Consume one decimation group starting at block position `base` and
    /// return the decimated low-pass sample.
    #[inline]
    pub fn split_group(&mut self, base: usize, group: &[Int24]) -> i32 {
        for (j, sample) in group.iter().enumerate() {
            self.push(base + j, sample.to_i32());
        }
        self.prev
    }

    #[inline]
    pub fn prev(&self) -> i32 {
        self.prev
    }

    #[inline]
    pub fn hifsum(&self) -> i32 {
        self.hifsum
    }

    pub fn hif(&self) -> &[i32] {
        &self.hif
    }

    pub fn reset(&mut self) {
        self.prev = 0;
        self.hif.fill(0);
        self.hifsum = 0;
    }
}
