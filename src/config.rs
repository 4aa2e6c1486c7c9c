//! Filter configuration.
//!
//! Every size in the filter is a power of two because the ring buffers wrap
//! with a bitmask. The coupling between the constants:
//!
//! - `filter_freq = 1 << filter_freq_bits` is both the decimation factor and
//!   the leaky-integrator shift.
//! - `taps_per_phase = block_len / filter_freq` is the low-pass history
//!   length, the number of decimated groups per block and the number of FIR
//!   taps used per interpolated output.
//! - `hf_divisor = 2 * block_len` scales the high-frequency residual. The
//!   hf ring holds `block_len` entries, each at most `2^32 / hf_divisor`, so
//!   `hifsum` stays below `2^31`.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_BLOCK_LEN: usize = 256;
pub const DEFAULT_FILTER_FREQ_BITS: u32 = 4;
pub const DEFAULT_NOISE_TABLE_LEN: usize = 16384;

// Centre tap is (4 / F) * 2^32; F >= 16 keeps it inside i32.
pub const MIN_FILTER_FREQ_BITS: u32 = 4;
pub const MIN_TAPS_PER_PHASE: usize = 2;
pub const MAX_TAPS_PER_PHASE: usize = 64;

// hf_divisor = block_len * HF_DIVISOR_BLOCKS. Must not be tied to filter_freq.
const HF_DIVISOR_BLOCKS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub block_len: usize,
    pub filter_freq_bits: u32,
    pub noise_table_len: usize,
    /// `None` seeds the noise table from OS entropy.
    pub noise_seed: Option<u64>,
    pub diagnostics: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            block_len: DEFAULT_BLOCK_LEN,
            filter_freq_bits: DEFAULT_FILTER_FREQ_BITS,
            noise_table_len: DEFAULT_NOISE_TABLE_LEN,
            noise_seed: None,
            diagnostics: false,
        }
    }
}

impl FilterConfig {
    pub fn with_block_len(block_len: usize) -> Self {
        Self {
            block_len,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let cfg: FilterConfig =
            serde_json::from_str(json).context("failed to parse filter config JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read filter config '{}'", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("invalid filter config '{}'", path.display()))
    }

    #[inline]
    pub fn filter_freq(&self) -> usize {
        1 << self.filter_freq_bits
    }

    #[inline]
    pub fn taps_per_phase(&self) -> usize {
        self.block_len >> self.filter_freq_bits
    }

    #[inline]
    pub fn hf_divisor(&self) -> usize {
        self.block_len * HF_DIVISOR_BLOCKS
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.block_len.is_power_of_two() {
            return Err(ConfigError::BlockLenNotPowerOfTwo(self.block_len));
        }
        if !self.noise_table_len.is_power_of_two() {
            return Err(ConfigError::NoiseLenNotPowerOfTwo(self.noise_table_len));
        }
        if self.filter_freq_bits < MIN_FILTER_FREQ_BITS
            || self.filter_freq_bits >= usize::BITS
            || self.taps_per_phase() < MIN_TAPS_PER_PHASE
        {
            return Err(ConfigError::FilterFreqBitsOutOfRange {
                bits: self.filter_freq_bits,
                block_len: self.block_len,
            });
        }
        if self.taps_per_phase() > MAX_TAPS_PER_PHASE {
            return Err(ConfigError::TooManyTaps(self.taps_per_phase()));
        }
        if self.noise_table_len < self.block_len {
            return Err(ConfigError::NoiseTableTooShort {
                noise_table_len: self.noise_table_len,
                block_len: self.block_len,
            });
        }
        Ok(())
    }
}

/// Rejected at stream-open time; the hot path has no error states.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    BlockLenNotPowerOfTwo(usize),
    NoiseLenNotPowerOfTwo(usize),
    FilterFreqBitsOutOfRange { bits: u32, block_len: usize },
    TooManyTaps(usize),
    NoiseTableTooShort { noise_table_len: usize, block_len: usize },
    InvalidSampleRate(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BlockLenNotPowerOfTwo(n) => {
                write!(f, "block length {} is not a power of two", n)
            }
            ConfigError::NoiseLenNotPowerOfTwo(n) => {
                write!(f, "noise table length {} is not a power of two", n)
            }
            ConfigError::FilterFreqBitsOutOfRange { bits, block_len } => write!(
                f,
                "filter frequency bits {} invalid for block length {} (need >= {} and >= {} taps per phase)",
                bits, block_len, MIN_FILTER_FREQ_BITS, MIN_TAPS_PER_PHASE
            ),
            ConfigError::TooManyTaps(n) => write!(
                f,
                "{} taps per phase exceeds the maximum of {}",
                n, MAX_TAPS_PER_PHASE
            ),
            ConfigError::NoiseTableTooShort {
                noise_table_len,
                block_len,
            } => write!(
                f,
                "noise table length {} is shorter than block length {}",
                noise_table_len, block_len
            ),
            ConfigError::InvalidSampleRate(sr) => write!(f, "invalid sample rate {}", sr),
        }
    }
}

impl std::error::Error for ConfigError {}
