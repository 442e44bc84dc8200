use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};
use core::f32::consts::TAU;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::{Atan2, DepthFrame, Packet};

/// Bytes per pixel in a packet: little endian `i16` in-phase and quadrature.
pub const IQ_BYTES: usize = 4;

/// Bytes per pixel in a calibration blob: little endian `u16` phase offset.
pub const OFFSET_BYTES: usize = 2;

/// Depth pipeline configuration
///
/// Two pipelines under comparison must share one configuration.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Frame width in pixels
    pub width: usize,
    /// Frame height in pixels
    pub height: usize,
    /// Minimum in-phase/quadrature amplitude of a valid pixel
    pub amplitude_threshold: f32,
    /// Depth of one full phase turn (unambiguous range), millimetres
    pub range: f32,
    /// Smooth depth with a 3x3 bilateral kernel
    pub enable_bilateral_filter: bool,
    /// Bilateral range kernel width, millimetres
    pub bilateral_sigma: f32,
    /// Drop pixels at depth discontinuities
    pub enable_edge_aware_filter: bool,
    /// Largest depth step to a valid neighbour of a kept pixel, millimetres
    pub edge_max_delta: f32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 424,
            amplitude_threshold: 10.0,
            range: 4500.0,
            enable_bilateral_filter: false,
            bilateral_sigma: 50.0,
            enable_edge_aware_filter: false,
            edge_max_delta: 200.0,
        }
    }
}

/// [`DepthProcessor`] errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProcessError {
    /// The packet does not hold one frame
    #[error("payload of {actual} bytes, expected {expected}")]
    PayloadSize { expected: usize, actual: usize },
    /// The calibration blob does not match the frame size
    #[error("calibration of {actual} bytes, expected 0 or {expected}")]
    Calibration { expected: usize, actual: usize },
}

/// Packet to depth frame pipeline
pub trait DepthProcessor {
    /// Load the calibration blob of a recording.
    fn load_calibration(&mut self, blob: &[u8]) -> Result<(), ProcessError>;

    /// Decode one packet into exactly one frame.
    ///
    /// The frame is owned by the processor and valid until the next call.
    fn process(&mut self, packet: &Packet) -> Result<&DepthFrame, ProcessError>;
}

impl<P: DepthProcessor + ?Sized> DepthProcessor for &mut P {
    fn load_calibration(&mut self, blob: &[u8]) -> Result<(), ProcessError> {
        (**self).load_calibration(blob)
    }

    fn process(&mut self, packet: &Packet) -> Result<&DepthFrame, ProcessError> {
        (**self).process(packet)
    }
}

// 3x3 Gaussian, one pixel wide
const SPATIAL: [[f32; 3]; 3] = [
    [0.367_879_44, 0.606_530_66, 0.367_879_44],
    [0.606_530_66, 1.0, 0.606_530_66],
    [0.367_879_44, 0.606_530_66, 0.367_879_44],
];

/// Phase based time-of-flight depth decoder.
///
/// Each pixel carries an in-phase/quadrature pair. Its depth is the phase
/// `atan2(q, i)`, less the per pixel calibration offset, wrapped into
/// `[0, 2 pi)` and scaled to the unambiguous range. Pixels with too little
/// amplitude have no reading.
///
/// The pipeline is generic over the [`Atan2`] implementation, which is the
/// per pixel hot spot.
#[derive(Clone, Debug)]
pub struct PhaseProcessor<A> {
    atan2: A,
    config: ProcessorConfig,
    // per pixel phase offset, radians
    offset: Vec<f32>,
    frame: DepthFrame,
    scratch: Vec<f32>,
}

impl<A: Atan2<f32>> PhaseProcessor<A> {
    pub fn new(atan2: A, config: ProcessorConfig) -> Self {
        let frame = DepthFrame::new(config.width, config.height);
        Self {
            atan2,
            config,
            offset: alloc::vec![0.0; frame.pixels()],
            frame,
            scratch: Vec::new(),
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// The most recent frame
    pub fn frame(&self) -> &DepthFrame {
        &self.frame
    }

    fn decode(&mut self, payload: &[u8]) {
        let threshold = self.config.amplitude_threshold * self.config.amplitude_threshold;
        let scale = self.config.range / TAU;
        for ((depth, iq), offset) in self
            .frame
            .data
            .iter_mut()
            .zip(payload.chunks_exact(IQ_BYTES))
            .zip(&self.offset)
        {
            let i = LittleEndian::read_i16(&iq[..2]) as f32;
            let q = LittleEndian::read_i16(&iq[2..]) as f32;
            *depth = if i * i + q * q < threshold {
                0.0
            } else {
                let mut phase = self.atan2.atan2(q, i) - offset;
                while phase < 0.0 {
                    phase += TAU;
                }
                // Rounding of `phase + TAU`
                if phase >= TAU {
                    phase -= TAU;
                }
                phase * scale
            };
        }
    }

    fn bilateral(&mut self) {
        let (w, h) = (self.frame.width, self.frame.height);
        if w < 3 || h < 3 {
            return;
        }
        let k = -0.5 / (self.config.bilateral_sigma * self.config.bilateral_sigma);
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.frame.data);
        let src = &self.scratch;
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let c = src[y * w + x];
                if c == 0.0 {
                    continue;
                }
                let (mut sum, mut norm) = (0.0, 0.0);
                for (dy, row) in SPATIAL.iter().enumerate() {
                    for (dx, s) in row.iter().enumerate() {
                        let d = src[(y + dy - 1) * w + x + dx - 1];
                        if d == 0.0 {
                            continue;
                        }
                        let g = s * Float::exp(k * (d - c) * (d - c));
                        sum += g * d;
                        norm += g;
                    }
                }
                self.frame.data[y * w + x] = sum / norm;
            }
        }
    }

    fn edge_aware(&mut self) {
        let (w, h) = (self.frame.width, self.frame.height);
        let delta = self.config.edge_max_delta;
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.frame.data);
        let src = &self.scratch;
        let mut dropped = 0;
        for y in 0..h {
            for x in 0..w {
                let c = src[y * w + x];
                if c == 0.0 {
                    continue;
                }
                let edge = [
                    (x > 0).then(|| src[y * w + x - 1]),
                    (x + 1 < w).then(|| src[y * w + x + 1]),
                    (y > 0).then(|| src[(y - 1) * w + x]),
                    (y + 1 < h).then(|| src[(y + 1) * w + x]),
                ]
                .into_iter()
                .flatten()
                .any(|n| n != 0.0 && Float::abs(n - c) > delta);
                if edge {
                    self.frame.data[y * w + x] = 0.0;
                    dropped += 1;
                }
            }
        }
        log::trace!("edge filter dropped {dropped} pixels");
    }
}

impl<A: Atan2<f32>> DepthProcessor for PhaseProcessor<A> {
    /// Accepts an empty blob (no offsets) or one `u16` phase offset per
    /// pixel in units of `2 pi / 65536`.
    fn load_calibration(&mut self, blob: &[u8]) -> Result<(), ProcessError> {
        let expected = self.frame.pixels() * OFFSET_BYTES;
        if blob.is_empty() {
            self.offset.fill(0.0);
        } else if blob.len() == expected {
            for (o, b) in self.offset.iter_mut().zip(blob.chunks_exact(OFFSET_BYTES)) {
                *o = LittleEndian::read_u16(b) as f32 * (TAU / 65536.0);
            }
        } else {
            return Err(ProcessError::Calibration {
                expected,
                actual: blob.len(),
            });
        }
        log::debug!("loaded {} phase offsets", blob.len() / OFFSET_BYTES);
        Ok(())
    }

    fn process(&mut self, packet: &Packet) -> Result<&DepthFrame, ProcessError> {
        let expected = self.frame.pixels() * IQ_BYTES;
        if packet.len() != expected {
            return Err(ProcessError::PayloadSize {
                expected,
                actual: packet.len(),
            });
        }
        self.decode(packet.payload());
        if self.config.enable_bilateral_filter {
            self.bilateral();
        }
        if self.config.enable_edge_aware_filter {
            self.edge_aware();
        }
        Ok(&self.frame)
    }
}
