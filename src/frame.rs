use alloc::vec::Vec;
use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Dense depth image.
///
/// Values are millimetres, row-major. `0.0` means "no valid reading".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DepthFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl DepthFrame {
    /// All-invalid frame
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: alloc::vec![0.0; width * height],
        }
    }

    /// Number of pixels
    pub fn pixels(&self) -> usize {
        self.width * self.height
    }

    /// Number of pixels with a valid reading
    pub fn valid(&self) -> usize {
        self.data.iter().filter(|d| **d != 0.0).count()
    }
}

/// Per-pixel divergence of a candidate frame from a reference frame.
///
/// A false positive is a pixel where only the candidate has data, a false
/// negative one where only the reference has data. `max_diff` covers the
/// remaining pixels (both valid or both invalid).
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDiffStats {
    /// Largest absolute difference, in frame units
    pub max_diff: f32,
    pub false_positives: u32,
    pub false_negatives: u32,
    /// Number of compared pixels
    pub pixels: u32,
}

impl FrameDiffStats {
    /// Compare two frames element-wise.
    ///
    /// Both slices are expected to have the same length.
    pub fn compare(reference: &[f32], candidate: &[f32]) -> Self {
        debug_assert_eq!(reference.len(), candidate.len());
        let mut stats = Self::default();
        for (r, c) in reference.iter().zip(candidate) {
            stats.update(*r, *c);
        }
        stats
    }

    /// Account for one pixel.
    #[inline]
    pub fn update(&mut self, reference: f32, candidate: f32) {
        self.pixels += 1;
        match (reference != 0.0, candidate != 0.0) {
            (true, false) => self.false_negatives += 1,
            (false, true) => self.false_positives += 1,
            _ => self.max_diff = Float::max(self.max_diff, Float::abs(reference - candidate)),
        }
    }

    /// Whether any divergence was seen
    pub fn diverged(&self) -> bool {
        self.max_diff != 0.0 || self.false_positives != 0 || self.false_negatives != 0
    }

    /// False positives as a fraction of all pixels
    pub fn false_positive_rate(&self) -> f32 {
        self.rate(self.false_positives)
    }

    /// False negatives as a fraction of all pixels
    pub fn false_negative_rate(&self) -> f32 {
        self.rate(self.false_negatives)
    }

    fn rate(&self, n: u32) -> f32 {
        if self.pixels == 0 {
            0.0
        } else {
            n as f32 / self.pixels as f32
        }
    }
}
