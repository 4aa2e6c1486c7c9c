//! Packed 24-bit sample codec.
//!
//! Samples travel as 3 little-endian bytes. Internally they are held
//! left-justified in an `i32` (the 24-bit value occupies the top three
//! bytes, the low byte is zero), which gives the filter arithmetic 8 bits of
//! fractional headroom and lets arithmetic right shifts stay sign-preserving.

/// Full-scale of a left-justified sample as a float divisor.
const LEFT_JUSTIFIED_SCALE: f64 = 2147483648.0;

/// One 24-bit little-endian signed sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Int24(pub [u8; 3]);

impl Int24 {
    pub const ZERO: Int24 = Int24([0; 3]);
    pub const MAX: i32 = (1 << 23) - 1;
    pub const MIN: i32 = -(1 << 23);

    /// Build from a plain 24-bit integer, clamped into range.
    pub fn from_value(value: i32) -> Self {
        Self::from_i32(value.clamp(Self::MIN, Self::MAX) << 8)
    }

    /// Sign-extended 24-bit value.
    #[inline]
    pub fn value(self) -> i32 {
        self.to_i32() >> 8
    }

    /// Sign-extend into the top 24 bits of an `i32`.
    #[inline]
    pub fn to_i32(self) -> i32 {
        let [b0, b1, b2] = self.0;
        i32::from_le_bytes([0, b0, b1, b2])
    }

    /// Keep the top 24 bits of a left-justified `i32`; the low byte is dropped.
    #[inline]
    pub fn from_i32(v: i32) -> Self {
        Int24([(v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8])
    }

    /// Host float in `[-1.0, 1.0]` to a packed sample. Out-of-range values clip.
    #[inline]
    pub fn from_f32(x: f32) -> Self {
        let scaled = (x as f64 * LEFT_JUSTIFIED_SCALE).clamp(i32::MIN as f64, i32::MAX as f64);
        Self::from_i32(scaled as i32)
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        (self.to_i32() as f64 / LEFT_JUSTIFIED_SCALE) as f32
    }

    pub fn to_le_bytes(self) -> [u8; 3] {
        self.0
    }

    pub fn from_le_bytes(bytes: [u8; 3]) -> Self {
        Int24(bytes)
    }
}
