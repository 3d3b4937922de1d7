pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Deterministic pseudo-random stream (SplitMix64).
///
/// Effects seed one of these from their progress value so that a frame's noise is a pure function
/// of `(kind, progress)`.
#[derive(Clone, Debug)]
pub(crate) struct NoiseRng(u64);

impl NoiseRng {
    pub(crate) fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Seed from an effect tag and a progress value.
    pub(crate) fn from_progress(tag: &str, progress: f32) -> Self {
        let mut key = Vec::with_capacity(tag.len() + 4);
        key.extend_from_slice(tag.as_bytes());
        key.extend_from_slice(&progress.to_bits().to_le_bytes());
        Self::new(xxhash_rust::xxh3::xxh3_64(&key))
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    pub(crate) fn next_f32(&mut self) -> f32 {
        ((self.next_u64() >> 40) as f32) / ((1u64 << 24) as f32)
    }

    /// Uniform in `[0, bound)`; returns 0 for an empty range.
    pub(crate) fn below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % u64::from(bound)) as u32
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
