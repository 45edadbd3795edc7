//! End-to-end job: extract, chunk, synthesize, stitch, write.

use speech_client::{AudioFormat, SpeechProvider};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{AssembleError, AudioAssembler, write_wav};
use crate::config::PdfAudioConfig;
use crate::extract::{ExtractionChain, PdfSource};
use crate::text::split_into_chunks;
use crate::tts::{ChunkOutcome, DispatchOptions, DispatchProgress, SynthesisDispatcher};

/// Settings for one job. Read-only for the whole run.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub voice: String,
    pub format: AudioFormat,
    pub model: Option<String>,
    pub max_chunk_length: usize,
    pub silence_secs: f64,
    pub workers: usize,
    pub max_retries: u32,
    pub timeout: Option<Duration>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self::from(&PdfAudioConfig::default())
    }
}

impl From<&PdfAudioConfig> for JobConfig {
    fn from(config: &PdfAudioConfig) -> Self {
        Self {
            voice: config.voice.clone(),
            format: config.format,
            model: config.model.clone(),
            max_chunk_length: config.max_chunk_length,
            silence_secs: config.silence_secs,
            workers: config.workers,
            max_retries: config.max_retries,
            timeout: config.job_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl JobConfig {
    fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            voice: self.voice.clone(),
            format: self.format,
            model: self.model.clone(),
            workers: self.workers,
            max_retries: self.max_retries,
            timeout: self.timeout,
            ..Default::default()
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Every chunk produced audio
    Success {
        duration_secs: f64,
        chunks: usize,
        /// Chunks converted to the output sample rate
        resampled: usize,
    },
    /// Some chunks produced audio, some did not
    PartialFailure {
        duration_secs: f64,
        succeeded: usize,
        failed: usize,
        resampled: usize,
    },
    /// Provider not usable; nothing was attempted
    ConfigurationFailed(String),
    /// No text could be obtained from the PDF
    ExtractionFailed(String),
    /// Text was chunked but no chunk produced audio
    SynthesisFailed { chunks: usize },
    /// Audio was assembled but could not be written
    OutputFailed(String),
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::PartialFailure { .. })
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success {
                duration_secs,
                chunks,
                resampled,
            } => {
                write!(
                    f,
                    "Audio generated successfully. Duration: {:.1} seconds ({} chunks processed)",
                    duration_secs, chunks
                )?;
                write_resampled(f, *resampled)
            }
            Self::PartialFailure {
                duration_secs,
                succeeded,
                failed,
                resampled,
            } => {
                write!(
                    f,
                    "Audio generated with gaps. Duration: {:.1} seconds ({} of {} chunks processed, {} failed)",
                    duration_secs,
                    succeeded,
                    succeeded + failed,
                    failed
                )?;
                write_resampled(f, *resampled)
            }
            Self::ConfigurationFailed(reason) => write!(f, "Configuration error: {}", reason),
            Self::ExtractionFailed(reason) => write!(f, "Text extraction failed: {}", reason),
            Self::SynthesisFailed { chunks } => write!(
                f,
                "Failed to generate audio for any of {} text chunks",
                chunks
            ),
            Self::OutputFailed(reason) => write!(f, "Failed to write audio: {}", reason),
        }
    }
}

fn write_resampled(f: &mut fmt::Formatter<'_>, resampled: usize) -> fmt::Result {
    match resampled {
        0 => Ok(()),
        1 => write!(f, ". 1 chunk was resampled to match the output sample rate"),
        n => write!(f, ". {} chunks were resampled to match the output sample rate", n),
    }
}

/// Everything a job produced.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Written audio file, when there is one
    pub audio_path: Option<PathBuf>,
    /// Extracted text, empty if extraction failed
    pub extracted_text: String,
    pub status: JobStatus,
}

impl JobOutcome {
    fn failed(status: JobStatus, extracted_text: String) -> Self {
        Self {
            audio_path: None,
            extracted_text,
            status,
        }
    }
}

/// Convert a PDF into one WAV file at `output`.
///
/// Never returns an error: every failure is reported through
/// `JobOutcome::status`. `on_progress` is called after each chunk.
pub async fn run_job<F>(
    pdf: &PdfSource,
    config: &JobConfig,
    provider: Arc<dyn SpeechProvider>,
    extractors: &ExtractionChain,
    output: &Path,
    on_progress: F,
) -> JobOutcome
where
    F: FnMut(DispatchProgress),
{
    if let Err(e) = provider.is_available() {
        return JobOutcome::failed(JobStatus::ConfigurationFailed(e.to_string()), String::new());
    }

    let extracted = match extractors.extract(pdf).await {
        Ok(extracted) => extracted,
        Err(e) => {
            return JobOutcome::failed(JobStatus::ExtractionFailed(e.to_string()), String::new());
        }
    };
    log::info!(
        "Using text from {} ({} characters)",
        extracted.source,
        extracted.text.chars().count()
    );

    let max_length = config.max_chunk_length.min(provider.max_input_chars());
    let chunks = split_into_chunks(&extracted.text, max_length);
    if chunks.is_empty() {
        return JobOutcome::failed(
            JobStatus::ExtractionFailed("No speakable text after cleaning".to_string()),
            extracted.text,
        );
    }
    log::info!(
        "Processing {} text chunks with {} (max {} characters)",
        chunks.len(),
        provider.name(),
        max_length
    );

    let dispatcher = SynthesisDispatcher::new(provider, config.dispatch_options());
    let outcomes = dispatcher.dispatch_all(&chunks, on_progress).await;

    let mut assembler = AudioAssembler::new(config.silence_secs);
    for outcome in outcomes {
        match outcome {
            ChunkOutcome::Synthesized { index, staged } => match staged.read() {
                Ok(bytes) => {
                    assembler.add_payload(index, &bytes, staged.format());
                    // Drops the temp file
                    drop(staged);
                }
                Err(e) => assembler.add_failed(index, format!("could not read staged audio: {}", e)),
            },
            ChunkOutcome::Failed { index, reason } => assembler.add_failed(index, reason.to_string()),
        }
    }

    let report = match assembler.finish() {
        Ok(report) => report,
        Err(AssembleError::NoAudioProduced { dropped }) => {
            log::error!("No audio produced; {} chunks dropped", dropped.len());
            return JobOutcome::failed(
                JobStatus::SynthesisFailed {
                    chunks: chunks.len(),
                },
                extracted.text,
            );
        }
    };

    for dropped in &report.dropped {
        log::warn!("Chunk {} missing from output: {}", dropped.index + 1, dropped.reason);
    }
    log::info!(
        "Assembled {} segments at {} Hz with {} silence gaps",
        report.segments,
        report.audio.sample_rate,
        report.silence_gaps
    );

    if let Err(e) = write_wav(output, &report.audio) {
        return JobOutcome::failed(JobStatus::OutputFailed(e.to_string()), extracted.text);
    }

    let duration_secs = report.duration_secs();
    let resampled = report.resampled.len();
    let status = if report.dropped.is_empty() {
        JobStatus::Success {
            duration_secs,
            chunks: report.segments,
            resampled,
        }
    } else {
        JobStatus::PartialFailure {
            duration_secs,
            succeeded: report.segments,
            failed: report.dropped.len(),
            resampled,
        }
    };

    JobOutcome {
        audio_path: Some(output.to_path_buf()),
        extracted_text: extracted.text,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decoder::tests::make_wav;
    use crate::extract::{ExtractionError, TextExtractor};
    use async_trait::async_trait;
    use speech_client::{MockProvider, SpeechError};
    use tempfile::TempDir;

    struct FixedText(Option<&'static str>);

    #[async_trait]
    impl TextExtractor for FixedText {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn extract(&self, _pdf: &PdfSource) -> Result<String, ExtractionError> {
            self.0.map(str::to_string).ok_or(ExtractionError::NoText)
        }
    }

    fn chain(text: Option<&'static str>) -> ExtractionChain {
        ExtractionChain::new().with(Box::new(FixedText(text)))
    }

    fn pdf() -> PdfSource {
        PdfSource::new("doc.pdf", b"%PDF".to_vec())
    }

    fn wav_config(max_chunk_length: usize) -> JobConfig {
        JobConfig {
            format: AudioFormat::Wav,
            max_chunk_length,
            ..Default::default()
        }
    }

    /// One second of audio at 24 kHz per chunk.
    fn second_of_audio() -> Vec<u8> {
        make_wav(24000, 1, &vec![1000i16; 24000])
    }

    #[tokio::test]
    async fn test_three_chunks_success() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.wav");
        let provider = Arc::new(MockProvider::always_succeeds(second_of_audio()));

        let outcome = run_job(
            &pdf(),
            &wav_config(12),
            provider.clone(),
            &chain(Some("First one. Second one. Third one.")),
            &output,
            |_| {},
        )
        .await;

        assert_eq!(provider.call_count(), 3);
        assert_eq!(outcome.audio_path.as_deref(), Some(output.as_path()));
        assert_eq!(outcome.extracted_text, "First one. Second one. Third one.");
        match outcome.status {
            JobStatus::Success {
                duration_secs,
                chunks,
                resampled,
            } => {
                assert_eq!(chunks, 3);
                assert_eq!(resampled, 0);
                // 3 s of speech + 2 * 0.5 s gaps
                assert!((duration_secs - 4.0).abs() < 1e-9);
            }
            other => panic!("unexpected status: {other}"),
        }

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().sample_rate, 24000);
        assert_eq!(reader.duration(), 96000);
    }

    #[tokio::test]
    async fn test_middle_chunk_failure_is_partial() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.wav");
        let provider = Arc::new(MockProvider::always_succeeds(second_of_audio()).failing_on("Second"));

        let outcome = run_job(
            &pdf(),
            &wav_config(12),
            provider,
            &chain(Some("First one. Second one. Third one.")),
            &output,
            |_| {},
        )
        .await;

        assert_eq!(
            outcome.status,
            JobStatus::PartialFailure {
                duration_secs: 2.5,
                succeeded: 2,
                failed: 1,
                resampled: 0,
            }
        );
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_mixed_sample_rates_are_reported() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.wav");
        // Second chunk comes back as one second at 12 kHz
        let provider = Arc::new(
            MockProvider::always_succeeds(second_of_audio())
                .with_audio_for("Second", make_wav(12000, 1, &vec![1000i16; 12000])),
        );

        let outcome = run_job(
            &pdf(),
            &wav_config(12),
            provider,
            &chain(Some("First one. Second one. Third one.")),
            &output,
            |_| {},
        )
        .await;

        assert_eq!(
            outcome.status,
            JobStatus::Success {
                duration_secs: 4.0,
                chunks: 3,
                resampled: 1,
            }
        );
        assert!(
            outcome
                .status
                .to_string()
                .ends_with("1 chunk was resampled to match the output sample rate")
        );

        let reader = hound::WavReader::open(&output).unwrap();
        assert_eq!(reader.spec().sample_rate, 24000);
        assert_eq!(reader.duration(), 96000);
    }

    #[tokio::test]
    async fn test_total_failure_is_synthesis_failure() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.wav");
        let provider = Arc::new(MockProvider::always_fails(SpeechError::ApiError {
            message: "invalid voice".into(),
            status_code: Some(400),
        }));

        let outcome = run_job(
            &pdf(),
            &wav_config(4000),
            provider,
            &chain(Some("Some text.")),
            &output,
            |_| {},
        )
        .await;

        assert_eq!(outcome.status, JobStatus::SynthesisFailed { chunks: 1 });
        assert!(outcome.audio_path.is_none());
        assert_eq!(outcome.extracted_text, "Some text.");
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_undecodable_audio_is_synthesis_failure() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::always_succeeds(b"not audio".to_vec()));

        let outcome = run_job(
            &pdf(),
            &wav_config(4000),
            provider,
            &chain(Some("Some text.")),
            &dir.path().join("out.wav"),
            |_| {},
        )
        .await;

        assert!(matches!(outcome.status, JobStatus::SynthesisFailed { .. }));
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_synthesis() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::always_succeeds(second_of_audio()));

        let outcome = run_job(
            &pdf(),
            &wav_config(4000),
            provider.clone(),
            &chain(None),
            &dir.path().join("out.wav"),
            |_| {},
        )
        .await;

        assert!(matches!(outcome.status, JobStatus::ExtractionFailed(_)));
        assert_eq!(provider.call_count(), 0);
        assert!(outcome.extracted_text.is_empty());
    }

    #[tokio::test]
    async fn test_unspeakable_text_is_extraction_failure() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::always_succeeds(second_of_audio()));

        let outcome = run_job(
            &pdf(),
            &wav_config(4000),
            provider.clone(),
            &chain(Some("*** ___ ###")),
            &dir.path().join("out.wav"),
            |_| {},
        )
        .await;

        assert!(matches!(outcome.status, JobStatus::ExtractionFailed(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_configuration_failure() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::always_succeeds(second_of_audio()).unavailable());

        let outcome = run_job(
            &pdf(),
            &wav_config(4000),
            provider.clone(),
            &chain(Some("text")),
            &dir.path().join("out.wav"),
            |_| {},
        )
        .await;

        assert!(matches!(outcome.status, JobStatus::ConfigurationFailed(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_limit_caps_chunk_length() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(
            MockProvider::always_succeeds(second_of_audio()).with_max_input_chars(12),
        );

        let outcome = run_job(
            &pdf(),
            &wav_config(4000),
            provider.clone(),
            &chain(Some("First one. Second one. Third one.")),
            &dir.path().join("out.wav"),
            |_| {},
        )
        .await;

        assert!(outcome.status.is_success());
        assert_eq!(provider.call_count(), 3);
        assert!(provider.received().iter().all(|t| t.chars().count() <= 12));
    }

    #[tokio::test]
    async fn test_progress_callback() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::always_succeeds(second_of_audio()));
        let mut last = None;

        run_job(
            &pdf(),
            &wav_config(12),
            provider,
            &chain(Some("First one. Second one. Third one.")),
            &dir.path().join("out.wav"),
            |p| last = Some(p),
        )
        .await;

        let last = last.unwrap();
        assert_eq!((last.completed, last.total, last.failed), (3, 3, 0));
    }

    #[test]
    fn test_status_messages() {
        let ok = JobStatus::Success {
            duration_secs: 12.34,
            chunks: 3,
            resampled: 0,
        };
        assert_eq!(
            ok.to_string(),
            "Audio generated successfully. Duration: 12.3 seconds (3 chunks processed)"
        );

        let partial = JobStatus::PartialFailure {
            duration_secs: 2.5,
            succeeded: 2,
            failed: 1,
            resampled: 2,
        };
        assert!(partial.to_string().contains("2 of 3 chunks"));
        assert!(partial.to_string().ends_with("2 chunks were resampled to match the output sample rate"));
        assert!(partial.is_success());

        let failed = JobStatus::SynthesisFailed { chunks: 4 };
        assert!(!failed.is_success());
    }

    #[test]
    fn test_job_config_from_file_config() {
        let file = PdfAudioConfig {
            voice: "echo".into(),
            job_timeout_secs: Some(90),
            ..Default::default()
        };
        let config = JobConfig::from(&file);
        assert_eq!(config.voice, "echo");
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.max_chunk_length, 4000);
    }
}
