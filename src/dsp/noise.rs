//! High-pass shaped noise table.
//!
//! Each draw is run through the same leaky integrator as the band splitter
//! and only the residual above it is stored, so injected noise occupies the
//! band whose energy scales it.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg32;

pub struct NoiseTable {
    samples: Box<[i32]>,
    mask: usize,
}

impl NoiseTable {
    /// Fill a table of `len` entries (power of two) from `rng`.
    pub fn generate<R: RngCore>(len: usize, filter_freq_bits: u32, rng: &mut R) -> Self {
        assert!(len.is_power_of_two(), "noise table length must be a power of two");

        let mut prev: i32 = 0;
        let samples = (0..len)
            .map(|_| {
                // Halve so prev and v stay within +/-2^30 and v - prev cannot overflow
                let v = (rng.next_u32() as i32) >> 1;
                prev = prev - (prev >> filter_freq_bits) + (v >> filter_freq_bits);
                v - prev
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            samples,
            mask: len - 1,
        }
    }

    /// Reproducible table for a given seed.
    pub fn seeded(len: usize, filter_freq_bits: u32, seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        Self::generate(len, filter_freq_bits, &mut rng)
    }

    pub fn from_entropy(len: usize, filter_freq_bits: u32) -> Self {
        let mut rng = Pcg32::from_entropy();
        Self::generate(len, filter_freq_bits, &mut rng)
    }

    /// Sample at `index`, wrapping modulo the table length.
    #[inline]
    pub fn get(&self, index: usize) -> i32 {
        self.samples[index & self.mask]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.samples
    }
}
