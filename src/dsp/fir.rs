//! Windowed-sinc interpolation kernel.
//!
//! One kernel of `block_len` taps serves all `F` interpolation phases: phase
//! `j`, history tap `k` reads coefficient `j + F * k`. The sinc is scaled so
//! its first zero sits `4F` taps from centre (cutoff at Nyquist / F of the
//! output rate after the `F`-fold upsample), tapered by a raised-sine window
//! and quantized to `2^32` fixed point with a gain of `4 / F`.

use std::f64::consts::PI;

const FIXED_POINT_ONE: f64 = 4294967296.0;

pub struct FirKernel {
    coeffs: Box<[i32]>,
    phases: usize,
}

impl FirKernel {
    /// Generate the kernel. `len` must be a multiple of `1 << filter_freq_bits`.
    pub fn generate(len: usize, filter_freq_bits: u32) -> Self {
        assert!(len > 0, "kernel length must be > 0");
        let phases = 1usize << filter_freq_bits;
        assert!(len % phases == 0, "kernel length must be a multiple of the phase count");

        let coeffs = (0..len)
            .map(|i| Self::coefficient(i, len, phases))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self { coeffs, phases }
    }

    fn coefficient(i: usize, len: usize, phases: usize) -> i32 {
        let centre = (len / 2) as f64;
        let x = (i as f64 - centre) * PI / (phases as f64 * 4.0);
        let sinc = if x == 0.0 { 1.0 } else { x.sin() / x };

        let gain = 4.0 / phases as f64;
        // Raised sine spanning pi/4..3pi/4, peaking at the centre tap
        let window = ((i as f64 + centre) * PI / (len as f64 * 2.0)).sin();

        // `as` truncates toward zero and saturates
        (gain * window * sinc * FIXED_POINT_ONE) as i32
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Interpolation factor `F`.
    #[inline]
    pub fn phases(&self) -> usize {
        self.phases
    }

    #[inline]
    pub fn taps_per_phase(&self) -> usize {
        self.coeffs.len() / self.phases
    }

    /// Coefficient for sub-sample `phase` against history tap `tap`.
    #[inline]
    pub fn coeff(&self, phase: usize, tap: usize) -> i32 {
        self.coeffs[phase + self.phases * tap]
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.coeffs
    }
}
