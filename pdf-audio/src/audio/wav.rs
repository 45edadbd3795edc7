//! WAV output.

use super::assembler::FinalAudio;
use std::path::Path;

/// Write the assembled audio as a mono 16-bit PCM WAV file.
pub fn write_wav(path: &Path, audio: &FinalAudio) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &audio.samples {
        writer.write_sample(to_i16(sample))?;
    }
    writer.finalize()?;

    log::debug!(
        "Wrote {} samples at {} Hz to {}",
        audio.samples.len(),
        audio.sample_rate,
        path.display()
    );
    Ok(())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}
