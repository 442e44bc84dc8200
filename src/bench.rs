//! Differential benchmark of two depth pipelines over a recorded log

use core::fmt;
use serde::{Deserialize, Serialize};
use std::{io::Read, time::Duration, time::Instant};

use crate::{
    DepthFrame, DepthProcessor, FrameDiffStats, Packet, PacketReader, ProcessError, ReplayError,
};

/// Depth unit to metre
const MILLI: f32 = 1e-3;

/// Which pipeline of a [`DiffBench`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Side {
    Reference,
    Candidate,
}

/// [`DiffBench`] errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BenchError {
    #[error(transparent)]
    Replay(#[from] ReplayError),
    #[error("{side} pipeline: {source}")]
    Process { side: Side, source: ProcessError },
    /// The two pipelines disagree on the frame dimensions
    #[error("frame shape mismatch: reference {reference:?}, candidate {candidate:?}")]
    FrameShape {
        reference: (usize, usize),
        candidate: (usize, usize),
    },
}

/// Outcome of one packet.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub sequence: u32,
    pub timestamp: u32,
    pub reference_time: Duration,
    pub candidate_time: Duration,
    pub stats: FrameDiffStats,
}

impl fmt::Display for FrameReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frame {}", self.sequence)?;
        writeln!(f)?;
        writeln!(f, "Performance:")?;
        writeln!(f, "    Reference processing took: {:.3} ms", ms(self.reference_time))?;
        writeln!(f, "    Candidate processing took: {:.3} ms", ms(self.candidate_time))?;
        let s = &self.stats;
        if s.diverged() {
            writeln!(f)?;
            writeln!(f, "Validity:")?;
            writeln!(f, "    Max difference  = {} meter", s.max_diff * MILLI)?;
            writeln!(f, "    False positives = {} % of pixels", 100.0 * s.false_positive_rate())?;
            writeln!(f, "    False negatives = {} % of pixels", 100.0 * s.false_negative_rate())?;
        }
        Ok(())
    }
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

/// Totals over a replay session
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub frames: u32,
    pub reference_time: Duration,
    pub candidate_time: Duration,
    /// Largest per frame `max_diff`
    pub max_diff: f32,
    pub false_positives: u64,
    pub false_negatives: u64,
    /// Frames with any divergence
    pub diverged: u32,
}

impl Summary {
    pub fn update(&mut self, report: &FrameReport) {
        let s = &report.stats;
        self.frames += 1;
        self.reference_time += report.reference_time;
        self.candidate_time += report.candidate_time;
        self.max_diff = self.max_diff.max(s.max_diff);
        self.false_positives += s.false_positives as u64;
        self.false_negatives += s.false_negatives as u64;
        self.diverged += s.diverged() as u32;
    }

    /// Reference over candidate time
    pub fn speedup(&self) -> Option<f64> {
        (!self.candidate_time.is_zero())
            .then(|| self.reference_time.as_secs_f64() / self.candidate_time.as_secs_f64())
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary over {} frames:", self.frames)?;
        if self.frames != 0 {
            let n = self.frames as f64;
            writeln!(f, "    Reference mean: {:.3} ms", ms(self.reference_time) / n)?;
            writeln!(f, "    Candidate mean: {:.3} ms", ms(self.candidate_time) / n)?;
        }
        if let Some(s) = self.speedup() {
            writeln!(f, "    Speedup:        {s:.2}x")?;
        }
        writeln!(f, "    Diverged frames: {}", self.diverged)?;
        writeln!(f, "    Max difference:  {} meter", self.max_diff * MILLI)?;
        writeln!(f, "    False positives: {} pixels", self.false_positives)?;
        write!(f, "    False negatives: {} pixels", self.false_negatives)
    }
}

/// Reference and candidate pipeline pair
///
/// Both pipelines see the same calibration and the same packets in log
/// order. Each packet is processed by the reference first, then by the
/// candidate, each timed individually.
#[derive(Debug)]
pub struct DiffBench<R, C> {
    reference: R,
    candidate: C,
}

impl<R: DepthProcessor, C: DepthProcessor> DiffBench<R, C> {
    pub fn new(reference: R, candidate: C) -> Self {
        Self {
            reference,
            candidate,
        }
    }

    /// Load a calibration blob into both pipelines.
    pub fn load_calibration(&mut self, blob: &[u8]) -> Result<(), BenchError> {
        self.reference
            .load_calibration(blob)
            .map_err(|source| BenchError::Process {
                side: Side::Reference,
                source,
            })?;
        self.candidate
            .load_calibration(blob)
            .map_err(|source| BenchError::Process {
                side: Side::Candidate,
                source,
            })
    }

    /// Process one packet with both pipelines and compare the frames.
    pub fn step(&mut self, packet: &Packet) -> Result<FrameReport, BenchError> {
        let (reference, reference_time) =
            timed(&mut self.reference, packet).map_err(|source| BenchError::Process {
                side: Side::Reference,
                source,
            })?;
        let (candidate, candidate_time) =
            timed(&mut self.candidate, packet).map_err(|source| BenchError::Process {
                side: Side::Candidate,
                source,
            })?;
        let shape = |f: &DepthFrame| (f.width, f.height);
        if shape(reference) != shape(candidate) || reference.data.len() != candidate.data.len() {
            return Err(BenchError::FrameShape {
                reference: shape(reference),
                candidate: shape(candidate),
            });
        }
        Ok(FrameReport {
            sequence: packet.sequence,
            timestamp: packet.timestamp,
            reference_time,
            candidate_time,
            stats: FrameDiffStats::compare(&reference.data, &candidate.data),
        })
    }

    /// Replay a whole log.
    ///
    /// Loads the log's calibration, then steps through all packets with a
    /// single reused packet buffer, handing every report to `report`.
    /// The first error ends the replay.
    pub fn run<S: Read>(
        &mut self,
        reader: &mut PacketReader<S>,
        mut report: impl FnMut(&FrameReport),
    ) -> Result<Summary, BenchError> {
        self.load_calibration(reader.calibration())?;
        let mut packet = Packet::default();
        let mut summary = Summary::default();
        while reader.next_packet(&mut packet)? {
            let r = self.step(&packet)?;
            log::debug!("frame {}: {:?}", r.sequence, r.stats);
            summary.update(&r);
            report(&r);
        }
        log::info!(
            "replayed {} frames, {} with divergence",
            summary.frames,
            summary.diverged
        );
        Ok(summary)
    }

    pub fn into_inner(self) -> (R, C) {
        (self.reference, self.candidate)
    }
}

fn timed<'a, P: DepthProcessor>(
    p: &'a mut P,
    packet: &Packet,
) -> Result<(&'a DepthFrame, Duration), ProcessError> {
    let t = Instant::now();
    let frame = p.process(packet)?;
    Ok((frame, t.elapsed()))
}
