//! Stitching of per-chunk audio payloads into one continuous waveform.

use super::decoder::{self, DecodedAudio};
use speech_client::AudioFormat;
use thiserror::Error;

/// Default pause between consecutive segments, in seconds.
pub const DEFAULT_SILENCE_SECS: f64 = 0.5;

/// Longest accepted pause between segments, in seconds.
pub const MAX_SILENCE_SECS: f64 = 10.0;

/// The assembled waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalAudio {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl FinalAudio {
    /// Duration in seconds: total samples over the sample rate.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A chunk that contributed no audio, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedSegment {
    pub index: usize,
    pub reason: String,
}

/// Result of a successful assembly.
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub audio: FinalAudio,
    /// Number of segments that made it into the output
    pub segments: usize,
    /// Chunks with no audio: synthesis failures and undecodable payloads
    pub dropped: Vec<DroppedSegment>,
    /// Number of silence gaps inserted
    pub silence_gaps: usize,
    /// Chunk indices that were resampled to the canonical rate
    pub resampled: Vec<usize>,
}

impl AssemblyReport {
    pub fn duration_secs(&self) -> f64 {
        self.audio.duration_secs()
    }
}

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("No audio was produced ({} chunks dropped)", dropped.len())]
    NoAudioProduced { dropped: Vec<DroppedSegment> },
}

/// Incremental builder for the final waveform.
///
/// Segments must be added in chunk order. The first decoded segment fixes
/// the canonical sample rate; every later segment is preceded by a silence
/// gap and resampled if its rate differs.
#[derive(Debug)]
pub struct AudioAssembler {
    silence_secs: f64,
    sample_rate: Option<u32>,
    samples: Vec<f32>,
    segments: usize,
    silence_gaps: usize,
    dropped: Vec<DroppedSegment>,
    resampled: Vec<usize>,
}

impl Default for AudioAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SILENCE_SECS)
    }
}

impl AudioAssembler {
    pub fn new(silence_secs: f64) -> Self {
        Self {
            silence_secs: silence_secs.max(0.0).min(MAX_SILENCE_SECS),
            sample_rate: None,
            samples: Vec::new(),
            segments: 0,
            silence_gaps: 0,
            dropped: Vec::new(),
            resampled: Vec::new(),
        }
    }

    /// Decode and append the payload of chunk `index`.
    ///
    /// A payload that cannot be decoded is recorded as dropped rather than
    /// failing the whole assembly.
    pub fn add_payload(&mut self, index: usize, bytes: &[u8], format: AudioFormat) {
        match decoder::decode(bytes, format) {
            Ok(segment) => self.add_segment(index, segment),
            Err(e) => {
                log::warn!("Chunk {}: dropping undecodable audio: {}", index + 1, e);
                self.add_failed(index, format!("decode failed: {}", e));
            }
        }
    }

    /// Record a chunk that produced no audio.
    pub fn add_failed(&mut self, index: usize, reason: impl Into<String>) {
        self.dropped.push(DroppedSegment {
            index,
            reason: reason.into(),
        });
    }

    /// Append an already decoded segment.
    pub fn add_segment(&mut self, index: usize, segment: DecodedAudio) {
        let canonical = *self.sample_rate.get_or_insert(segment.sample_rate);

        let samples = if segment.sample_rate == canonical {
            segment.samples
        } else {
            log::warn!(
                "Chunk {}: sample rate {} Hz differs from {} Hz, resampling",
                index + 1,
                segment.sample_rate,
                canonical
            );
            self.resampled.push(index);
            decoder::resample(&segment.samples, segment.sample_rate, canonical)
        };

        if self.segments > 0 {
            let gap = (self.silence_secs * canonical as f64).round() as usize;
            self.samples.resize(self.samples.len() + gap, 0.0);
            self.silence_gaps += 1;
        }

        self.samples.extend(samples);
        self.segments += 1;
    }

    pub fn finish(self) -> Result<AssemblyReport, AssembleError> {
        let Some(sample_rate) = self.sample_rate else {
            return Err(AssembleError::NoAudioProduced {
                dropped: self.dropped,
            });
        };

        Ok(AssemblyReport {
            audio: FinalAudio {
                samples: self.samples,
                sample_rate,
            },
            segments: self.segments,
            dropped: self.dropped,
            silence_gaps: self.silence_gaps,
            resampled: self.resampled,
        })
    }
}
