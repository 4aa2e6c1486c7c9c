//! Block driver.
//!
//! `MultirateFilter` owns every piece of state that must survive between
//! audio callbacks. Each call to [`MultirateFilter::process`] walks the block
//! one decimation group at a time: split the group's `F` input samples,
//! store the decimated low-pass sample, then reconstruct the group's `F`
//! outputs. Splitting and reconstruction are interleaved so that history
//! taps reaching past the current group read the previous block's entries.
//!
//! Everything is allocated in [`MultirateFilter::from_config`]; `process`
//! does not allocate, lock, or block.

use crate::config::{ConfigError, FilterConfig};
use crate::debug::{diagnostics_channel, BlockReport, DiagnosticsReader, DiagnosticsTap};
use crate::dsp::band_split::BandSplitter;
use crate::dsp::fir::FirKernel;
use crate::dsp::noise::NoiseTable;
use crate::dsp::reconstruct::{LowpassHistory, Reconstructor};
use crate::dsp::sample::Int24;
use log::info;

// Diagnostic magnitudes are reported in units of 2^24.
const REPORT_SCALE: f64 = 16777216.0;

pub struct MultirateFilter {
    config: FilterConfig,
    sample_rate: f32,
    splitter: BandSplitter,
    reconstructor: Reconstructor,
    noise_cursor: usize,
    noise_mask: usize,
    blocks_processed: u64,
    diagnostics: Option<DiagnosticsTap>,
    diagnostics_enabled: bool,
}

impl MultirateFilter {
    /// Default configuration at the given block length.
    pub fn open(sample_rate: f32, block_len: usize) -> Result<Self, ConfigError> {
        Self::from_config(FilterConfig::with_block_len(block_len), sample_rate)
    }

    pub fn from_config(config: FilterConfig, sample_rate: f32) -> Result<Self, ConfigError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }
        config.validate()?;

        let kernel = FirKernel::generate(config.block_len, config.filter_freq_bits);
        let noise = match config.noise_seed {
            Some(seed) => NoiseTable::seeded(config.noise_table_len, config.filter_freq_bits, seed),
            None => NoiseTable::from_entropy(config.noise_table_len, config.filter_freq_bits),
        };

        info!(
            "sample rate: {} Hz, block {} samples, filter freq {} ({} taps/phase), noise table {} ({})",
            sample_rate,
            config.block_len,
            config.filter_freq(),
            config.taps_per_phase(),
            config.noise_table_len,
            match config.noise_seed {
                Some(_) => "seeded",
                None => "entropy",
            }
        );

        Ok(Self {
            splitter: BandSplitter::new(
                config.block_len,
                config.filter_freq_bits,
                config.hf_divisor(),
            ),
            reconstructor: Reconstructor::new(kernel, noise),
            noise_cursor: 0,
            noise_mask: config.noise_table_len - 1,
            blocks_processed: 0,
            diagnostics: None,
            diagnostics_enabled: config.diagnostics,
            sample_rate,
            config,
        })
    }

    /// Filter one block. Both slices must be exactly `block_len` long.
    pub fn process(&mut self, input: &[Int24], output: &mut [Int24]) {
        let block_len = self.config.block_len;
        assert_eq!(input.len(), block_len, "input block length mismatch");
        assert_eq!(output.len(), block_len, "output block length mismatch");

        let f = self.config.filter_freq();
        let mut report = BlockReport::new(self.blocks_processed);
        let mut hf_total: i64 = 0;

        for (pos, (in_group, out_group)) in input
            .chunks_exact(f)
            .zip(output.chunks_exact_mut(f))
            .enumerate()
        {
            let lowpass = self.splitter.split_group(pos * f, in_group);
            self.reconstructor.push_lowpass(pos, lowpass);

            let hifsum = self.splitter.hifsum();
            self.reconstructor
                .reconstruct_group(pos, self.noise_cursor, hifsum, out_group);

            hf_total += (hifsum >> 2) as i64;
            report.push_lowpass((lowpass as f64 / REPORT_SCALE).abs() as f32);
        }

        self.noise_cursor = (self.noise_cursor + block_len) & self.noise_mask;
        self.blocks_processed += 1;

        if self.diagnostics_enabled {
            if let Some(tap) = self.diagnostics.as_mut() {
                report.hf_energy = (hf_total as f64 / REPORT_SCALE) as f32;
                tap.publish(report);
            }
        }
    }

    /// Route per-block reports to the returned reader. Allocates; call before
    /// the stream starts.
    pub fn attach_diagnostics(&mut self, capacity: usize) -> DiagnosticsReader {
        let (tap, reader) = diagnostics_channel(capacity);
        self.diagnostics = Some(tap);
        reader
    }

    pub fn set_diagnostics_enabled(&mut self, enabled: bool) {
        self.diagnostics_enabled = enabled;
    }

    /// Clear the signal state. Kernel and noise table are kept.
    pub fn reset(&mut self) {
        self.splitter.reset();
        self.reconstructor.reset();
        self.noise_cursor = 0;
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    #[inline]
    pub fn block_len(&self) -> usize {
        self.config.block_len
    }

    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed
    }

    pub fn noise_cursor(&self) -> usize {
        self.noise_cursor
    }

    pub fn prev(&self) -> i32 {
        self.splitter.prev()
    }

    pub fn hifsum(&self) -> i32 {
        self.splitter.hifsum()
    }

    pub fn hif(&self) -> &[i32] {
        self.splitter.hif()
    }

    pub fn kernel(&self) -> &FirKernel {
        self.reconstructor.kernel()
    }

    pub fn noise(&self) -> &NoiseTable {
        self.reconstructor.noise()
    }

    pub fn lowpass_history(&self) -> &LowpassHistory {
        self.reconstructor.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    const N: usize = 256;

    fn seeded(seed: u64) -> MultirateFilter {
        let mut cfg = FilterConfig::default();
        cfg.noise_seed = Some(seed);
        MultirateFilter::from_config(cfg, 44100.0).expect("valid config")
    }

    fn small_noise(seed: u64) -> MultirateFilter {
        let mut cfg = FilterConfig::default();
        cfg.noise_seed = Some(seed);
        cfg.noise_table_len = 1024;
        MultirateFilter::from_config(cfg, 44100.0).expect("valid config")
    }

    fn run(filter: &mut MultirateFilter, input: &[Int24]) -> Vec<Int24> {
        let mut out = vec![Int24::ZERO; input.len()];
        filter.process(input, &mut out);
        out
    }

    fn step_block(at: usize, value: i32) -> Vec<Int24> {
        (0..N)
            .map(|i| {
                if i >= at {
                    Int24::from_value(value)
                } else {
                    Int24::ZERO
                }
            })
            .collect()
    }

    #[test]
    fn test_open_validates() {
        assert!(MultirateFilter::open(44100.0, 256).is_ok());
        assert!(matches!(
            MultirateFilter::open(44100.0, 300),
            Err(ConfigError::BlockLenNotPowerOfTwo(300))
        ));
        assert!(matches!(
            MultirateFilter::open(0.0, 256),
            Err(ConfigError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            MultirateFilter::open(f32::NAN, 256),
            Err(ConfigError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn test_sample_rate_does_not_change_coefficients() {
        let a = MultirateFilter::open(44100.0, 256).expect("valid");
        let b = MultirateFilter::open(96000.0, 256).expect("valid");
        assert_eq!(a.kernel().as_slice(), b.kernel().as_slice());
    }

    #[test]
    fn test_zero_block_gives_zero_output() {
        let mut f = seeded(1);
        let mut out = vec![Int24::from_value(12345); N];
        f.process(&vec![Int24::ZERO; N], &mut out);
        // Every output slot is overwritten
        assert!(out.iter().all(|s| *s == Int24::ZERO));
        assert_eq!(f.hifsum(), 0);
    }

    #[test]
    fn test_every_group_expands_to_filter_freq_outputs() {
        let v = Int24::from_value(1 << 20);
        for g in [0usize, 5, 15] {
            let mut f = seeded(1);
            // Only group `g` carries signal
            let input: Vec<Int24> = (0..N)
                .map(|i| if i / 16 == g { v } else { Int24::ZERO })
                .collect();
            let out = run(&mut f, &input);
            assert_eq!(f.lowpass_history().len(), N / 16);

            let history = f.lowpass_history().as_slice();
            assert!(history[..g].iter().all(|&x| x == 0), "group {}", g);
            assert!(history[g] > 0, "group {}", g);

            // Outputs of earlier groups are untouched by the later input,
            // and group `g` owns exactly samples 16g..16g+16
            assert!(out[..16 * g].iter().all(|s| *s == Int24::ZERO), "group {}", g);
            assert!(out[16 * g..16 * (g + 1)].iter().any(|s| *s != Int24::ZERO), "group {}", g);
        }
    }

    #[test]
    fn test_hifsum_invariant_across_blocks() {
        let mut f = seeded(2);
        let mut rng = Pcg32::seed_from_u64(77);
        for _ in 0..12 {
            let input: Vec<Int24> = (0..N)
                .map(|_| Int24::from_value(rng.gen_range(-(1 << 22)..(1 << 22))))
                .collect();
            run(&mut f, &input);
            let recomputed: i64 = f.hif().iter().map(|&h| h as i64).sum();
            assert_eq!(recomputed, f.hifsum() as i64);
        }
    }

    #[test]
    fn test_dc_settles() {
        let mut f = seeded(3);
        let v = 1 << 20;
        let input = vec![Int24::from_value(v); N];
        let mut out = Vec::new();
        for _ in 0..6 {
            out = run(&mut f, &input);
        }
        let target = Int24::from_value(v).to_i32() as i64;
        assert!((f.prev() as i64 - target).abs() < 16);
        assert_eq!(f.hifsum(), 0);
        for s in out {
            let ratio = s.value() as f64 / v as f64;
            assert!(ratio > 0.85 && ratio < 1.15, "ratio {}", ratio);
        }
    }

    #[test]
    fn test_step_response() {
        let mut f = seeded(4);
        let v = 1 << 20;
        let ratio = |s: &Int24| s.value() as f64 / v as f64;

        let first = run(&mut f, &step_block(128, v));
        // Nothing before the step: no low-pass energy, no hf energy, no noise
        assert!(first[..128].iter().all(|s| *s == Int24::ZERO));
        let spike = f.hifsum();
        assert!(spike > 0);

        let settled = vec![Int24::from_value(v); N];
        let mut last = spike;
        let mut blocks = Vec::new();
        for _ in 0..4 {
            blocks.push(run(&mut f, &settled));
            assert!(f.hifsum() <= last);
            last = f.hifsum();
        }
        assert_eq!(last, 0);

        // Overshoot in the block after the step stays under 5%
        let peak = blocks[0].iter().map(ratio).fold(f64::MIN, f64::max);
        assert!(peak > 0.9 && peak < 1.05, "peak {}", peak);
        for s in blocks.iter().flatten() {
            assert!(ratio(s) < 1.05, "ratio {}", ratio(s));
        }

        // Once hf energy has left the ring and the history holds only the
        // settled value, every group repeats the same per-phase outputs
        for block in &blocks[2..] {
            for group in block.chunks_exact(16) {
                assert_eq!(group, &block[..16]);
            }
        }
        assert_eq!(blocks[2], blocks[3]);
        for s in &blocks[3][..16] {
            assert!(ratio(s) > 0.9 && ratio(s) < 0.97, "ratio {}", ratio(s));
        }
    }

    #[test]
    fn test_history_taps_past_the_group_read_previous_block() {
        let mut f = seeded(10);
        let v = 1 << 20;
        let dc = vec![Int24::from_value(v); N];
        for _ in 0..6 {
            run(&mut f, &dc);
        }
        assert_eq!(f.hifsum(), 0);
        let previous: Vec<i32> = f.lowpass_history().as_slice().to_vec();

        let out = run(&mut f, &vec![Int24::ZERO; N]);
        let current = f.lowpass_history().as_slice();

        // Group 0 sees its own sample at tap 0 and the previous block's
        // groups 15..1 at taps 1..15
        let kernel = f.kernel();
        // hifsum only grows during this block, so its final value bounds
        // the noise term of group 0; |noise| <= 2^31
        let tolerance = f.hifsum() as i64 / 2 + 512;
        for (phase, s) in out[..16].iter().enumerate() {
            let mut sum = current[0] as i64 * kernel.coeff(phase, 0) as i64;
            for k in 1..16 {
                sum += previous[16 - k] as i64 * kernel.coeff(phase, k) as i64;
            }
            let expected = (sum >> 32) as i32;
            assert!(
                (s.to_i32() as i64 - expected as i64).abs() <= tolerance,
                "phase {}: {} vs {}",
                phase,
                s.to_i32(),
                expected
            );
            let r = s.value() as f64 / v as f64;
            assert!(r > 0.8, "phase {} ratio {}", phase, r);
        }

        // The last group only reads this block's decaying samples
        for s in &out[N - 16..] {
            let r = (s.value() as f64 / v as f64).abs();
            assert!(r < 0.1, "ratio {}", r);
        }
    }

    #[test]
    fn test_noise_cursor_advances_and_wraps() {
        let mut f = seeded(5);
        let zeros = vec![Int24::ZERO; N];
        run(&mut f, &zeros);
        assert_eq!(f.noise_cursor(), N);
        for _ in 1..(16384 / N) {
            run(&mut f, &zeros);
        }
        assert_eq!(f.noise_cursor(), 0);
    }

    #[test]
    fn test_noise_repeats_after_wrap() {
        let block = step_block(64, 1 << 21);
        let zeros = vec![Int24::ZERO; N];

        // 4 silent blocks wrap a 1024-entry table back to the start
        let mut wrapped = small_noise(6);
        for _ in 0..4 {
            run(&mut wrapped, &zeros);
        }
        assert_eq!(wrapped.noise_cursor(), 0);
        let mut fresh = small_noise(6);
        assert_eq!(run(&mut wrapped, &block), run(&mut fresh, &block));

        // One block short of the wrap reads different noise
        let mut offset = small_noise(6);
        for _ in 0..3 {
            run(&mut offset, &zeros);
        }
        let mut fresh = small_noise(6);
        assert_ne!(run(&mut offset, &block), run(&mut fresh, &block));
    }

    #[test]
    fn test_reset_matches_fresh_filter() {
        let mut used = seeded(8);
        let mut rng = Pcg32::seed_from_u64(1);
        for _ in 0..3 {
            let input: Vec<Int24> = (0..N)
                .map(|_| Int24::from_value(rng.gen_range(-(1 << 20)..(1 << 20))))
                .collect();
            run(&mut used, &input);
        }
        used.reset();
        assert_eq!(used.prev(), 0);
        assert_eq!(used.hifsum(), 0);
        assert_eq!(used.noise_cursor(), 0);

        let mut fresh = seeded(8);
        let block = step_block(10, 1 << 19);
        assert_eq!(run(&mut used, &block), run(&mut fresh, &block));
    }

    #[test]
    fn test_process_does_not_allocate() {
        let mut f = seeded(9);
        let _reader = f.attach_diagnostics(4);
        f.set_diagnostics_enabled(true);
        let input = step_block(100, 1 << 20);
        let mut out = vec![Int24::ZERO; N];
        assert_no_alloc::assert_no_alloc(|| {
            for _ in 0..8 {
                f.process(&input, &mut out);
            }
        });
    }

    #[test]
    fn test_diagnostics_reports_each_group() {
        let mut f = seeded(10);
        let mut reader = f.attach_diagnostics(8);
        f.set_diagnostics_enabled(true);
        run(&mut f, &step_block(128, 1 << 20));
        run(&mut f, &vec![Int24::from_value(1 << 20); N]);

        let mut reports = Vec::new();
        assert_eq!(reader.drain(|r| reports.push(*r)), 2);
        assert_eq!(reports[0].block_index, 0);
        assert_eq!(reports[0].lowpass().len(), N / 16);
        assert_eq!(reports[0].lowpass()[0], 0.0);
        // 2^28 left-justified is 16 in 2^24 units
        assert!(reports[1].lowpass().iter().all(|&m| (m - 16.0).abs() < 1.0));
        assert!(reports[0].hf_energy > 0.0);
    }

    #[test]
    fn test_diagnostics_disabled_publishes_nothing() {
        let mut f = seeded(11);
        let mut reader = f.attach_diagnostics(8);
        f.set_diagnostics_enabled(false);
        run(&mut f, &step_block(0, 1 << 20));
        assert_eq!(reader.drain(|_| {}), 0);
    }

    #[test]
    #[should_panic(expected = "input block length mismatch")]
    fn test_wrong_block_length_panics() {
        let mut f = seeded(12);
        let mut out = vec![Int24::ZERO; N];
        f.process(&vec![Int24::ZERO; N / 2], &mut out);
    }
}
