//! Decoding of synthesized audio payloads into mono PCM samples.

use speech_client::AudioFormat;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Errors that prevent a payload from becoming an audio segment.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("No decodable audio track in payload")]
    NoTrack,

    #[error("Payload does not declare a sample rate")]
    MissingSampleRate,

    #[error("Payload decoded to zero samples")]
    Empty,

    #[error("Decoder error: {0}")]
    Symphonia(#[from] SymphoniaError),
}

/// A decoded, down-mixed audio segment.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode an encoded payload (MP3, WAV or FLAC) into mono samples.
///
/// Multi-channel audio is averaged per frame. Corrupt frames are skipped;
/// anything that stops the stream from being read at all is an error.
pub fn decode(bytes: &[u8], format: AudioFormat) -> Result<DecodedAudio, DecodeError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe().format(
        &hint,
        source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut sample_rate = codec_params.sample_rate;
    let mut samples = Vec::new();

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);

                let channels = spec.channels.count().max(1);
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);

                samples.extend(
                    buffer
                        .samples()
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("Skipping corrupt audio frame: {}", msg);
            }
            Err(e) => return Err(e.into()),
        }
    }

    let sample_rate = sample_rate
        .filter(|&rate| rate > 0)
        .ok_or(DecodeError::MissingSampleRate)?;

    if samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Linear-interpolation resampling of mono samples.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = (source_pos - source_idx as f64) as f32;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx];
                let right = samples[source_idx + 1];
                left + (right - left) * fraction
            }
        })
        .collect()
}
