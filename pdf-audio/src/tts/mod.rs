//! Per-chunk speech synthesis with bounded concurrency.

use futures_util::StreamExt;
use speech_client::{AudioFormat, DEFAULT_VOICE, SpeechError, SpeechProvider, SpeechRequest};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::text::{TextChunk, normalize, truncate_to_limit};

/// Why a chunk produced no audio.
#[derive(Error, Debug)]
pub enum ChunkFailure {
    #[error("synthesis failed: {0}")]
    Synthesis(#[from] SpeechError),

    #[error("could not stage audio: {0}")]
    Staging(#[from] std::io::Error),

    #[error("timed out before synthesis finished")]
    TimedOut,
}

/// An audio payload written to a temporary file.
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct StagedAudio {
    file: NamedTempFile,
    format: AudioFormat,
}

impl StagedAudio {
    fn stage(audio: &[u8], format: AudioFormat) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("pdf-audio-chunk-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile()?;
        file.write_all(audio)?;
        file.flush()?;
        Ok(Self { file, format })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Read the staged payload back.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.file.path())
    }
}

/// Result of synthesizing one chunk.
#[derive(Debug)]
pub enum ChunkOutcome {
    Synthesized { index: usize, staged: StagedAudio },
    Failed { index: usize, reason: ChunkFailure },
}

impl ChunkOutcome {
    pub fn index(&self) -> usize {
        match self {
            Self::Synthesized { index, .. } | Self::Failed { index, .. } => *index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Synthesized { .. })
    }
}

/// Progress snapshot reported after each finished chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Settings shared by every synthesis call in a job.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Opaque voice identifier
    pub voice: String,
    pub format: AudioFormat,
    pub model: Option<String>,
    /// Maximum concurrent provider calls (at least 1)
    pub workers: usize,
    /// Extra attempts per chunk after a transient failure
    pub max_retries: u32,
    /// Base delay between attempts, doubled each retry
    pub retry_backoff: Duration,
    /// Deadline for the whole dispatch
    pub timeout: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            format: AudioFormat::default(),
            model: None,
            workers: 1,
            max_retries: 0,
            retry_backoff: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Sends chunks to a speech provider and stages the results.
pub struct SynthesisDispatcher {
    provider: Arc<dyn SpeechProvider>,
    options: DispatchOptions,
}

impl SynthesisDispatcher {
    pub fn new(provider: Arc<dyn SpeechProvider>, options: DispatchOptions) -> Self {
        Self { provider, options }
    }

    /// Synthesize a single chunk.
    ///
    /// Never fails as a whole: every error becomes `ChunkOutcome::Failed`.
    pub async fn synthesize_chunk(&self, chunk: &TextChunk) -> ChunkOutcome {
        let index = chunk.index;
        match self.try_synthesize(chunk).await {
            Ok(staged) => {
                log::debug!("Chunk {}: staged at {}", index + 1, staged.path().display());
                ChunkOutcome::Synthesized { index, staged }
            }
            Err(reason) => {
                log::error!("Chunk {}: {}", index + 1, reason);
                ChunkOutcome::Failed { index, reason }
            }
        }
    }

    async fn try_synthesize(&self, chunk: &TextChunk) -> Result<StagedAudio, ChunkFailure> {
        let normalized = normalize(&chunk.text);
        let limit = self.provider.max_input_chars();
        let text = truncate_to_limit(&normalized, limit);
        if text.len() < normalized.len() {
            log::warn!(
                "Chunk {}: truncated to {} characters for {}",
                chunk.index + 1,
                text.chars().count(),
                self.provider.name()
            );
        }

        let request = SpeechRequest::new(text, self.options.voice.as_str())
            .with_format(self.options.format)
            .with_model(self.options.model.clone());

        let mut attempt = 0;
        let response = loop {
            match self.provider.synthesize(request.clone()).await {
                Ok(response) => break response,
                Err(e) if e.is_transient() && attempt < self.options.max_retries => {
                    attempt += 1;
                    let delay = self.retry_delay(&e, attempt);
                    log::warn!(
                        "Chunk {}: attempt {}/{} failed: {}, retrying in {:?}",
                        chunk.index + 1,
                        attempt,
                        self.options.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        };

        Ok(StagedAudio::stage(&response.audio, response.format)?)
    }

    fn retry_delay(&self, error: &SpeechError, attempt: u32) -> Duration {
        match error {
            SpeechError::RateLimited {
                retry_after: Some(secs),
            } => Duration::from_secs(*secs),
            _ => self.options.retry_backoff * 2u32.saturating_pow(attempt - 1),
        }
    }

    /// Synthesize every chunk with at most `workers` calls in flight.
    ///
    /// Outcomes are returned in chunk order regardless of completion order.
    /// When the timeout expires, unfinished chunks are reported as
    /// `ChunkFailure::TimedOut` and their in-flight calls are cancelled.
    pub async fn dispatch_all<F>(&self, chunks: &[TextChunk], mut on_progress: F) -> Vec<ChunkOutcome>
    where
        F: FnMut(DispatchProgress),
    {
        let mut slots: Vec<Option<ChunkOutcome>> = chunks.iter().map(|_| None).collect();
        let mut progress = DispatchProgress {
            total: chunks.len(),
            completed: 0,
            failed: 0,
        };

        let deadline = self
            .options
            .timeout
            .map(|timeout| tokio::time::Instant::now() + timeout);

        let mut results = futures_util::stream::iter(chunks.iter().enumerate())
            .map(|(slot, chunk)| async move { (slot, self.synthesize_chunk(chunk).await) })
            .buffer_unordered(self.options.workers.max(1));

        loop {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, results.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        log::warn!(
                            "Timeout reached with {} of {} chunks unfinished",
                            progress.total - progress.completed,
                            progress.total
                        );
                        break;
                    }
                },
                None => results.next().await,
            };

            let Some((slot, outcome)) = next else {
                break;
            };

            progress.completed += 1;
            if !outcome.is_success() {
                progress.failed += 1;
            }
            log::debug!(
                "Chunk {} finished ({}/{})",
                outcome.index() + 1,
                progress.completed,
                progress.total
            );
            slots[slot] = Some(outcome);
            on_progress(progress);
        }
        drop(results);

        slots
            .into_iter()
            .zip(chunks)
            .map(|(slot, chunk)| {
                slot.unwrap_or(ChunkOutcome::Failed {
                    index: chunk.index,
                    reason: ChunkFailure::TimedOut,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speech_client::MockProvider;

    fn chunks(texts: &[&str]) -> Vec<TextChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| TextChunk::new(i, t.to_string()))
            .collect()
    }

    fn dispatcher(provider: MockProvider, options: DispatchOptions) -> SynthesisDispatcher {
        SynthesisDispatcher::new(Arc::new(provider), options)
    }

    fn fast_options() -> DispatchOptions {
        DispatchOptions {
            retry_backoff: Duration::ZERO,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_synthesize_chunk_stages_payload() {
        let d = dispatcher(MockProvider::always_succeeds(vec![1, 2, 3]), fast_options());
        let outcome = d.synthesize_chunk(&TextChunk::new(0, "Hello.".into())).await;

        match outcome {
            ChunkOutcome::Synthesized { index, staged } => {
                assert_eq!(index, 0);
                assert_eq!(staged.read().unwrap(), vec![1, 2, 3]);
                assert_eq!(staged.format(), AudioFormat::Mp3);
                assert!(staged.path().to_string_lossy().ends_with(".mp3"));
            }
            ChunkOutcome::Failed { reason, .. } => panic!("unexpected failure: {reason}"),
        }
    }

    #[tokio::test]
    async fn test_staged_file_removed_on_drop() {
        let d = dispatcher(MockProvider::always_succeeds(vec![1]), fast_options());
        let outcome = d.synthesize_chunk(&TextChunk::new(0, "Hi.".into())).await;
        let ChunkOutcome::Synthesized { staged, .. } = outcome else {
            panic!("expected success");
        };
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_request_uses_options() {
        let provider = Arc::new(MockProvider::always_succeeds(vec![1]));
        let d = SynthesisDispatcher::new(
            provider.clone(),
            DispatchOptions {
                voice: "nova".into(),
                format: AudioFormat::Wav,
                ..fast_options()
            },
        );
        let outcome = d.synthesize_chunk(&TextChunk::new(3, "**Bold** text".into())).await;
        assert_eq!(outcome.index(), 3);
        assert_eq!(provider.received(), vec!["Bold text".to_string()]);
    }

    #[tokio::test]
    async fn test_truncates_to_provider_limit() {
        let provider = Arc::new(MockProvider::always_succeeds(vec![1]).with_max_input_chars(10));
        let d = SynthesisDispatcher::new(provider.clone(), fast_options());
        d.synthesize_chunk(&TextChunk::new(0, "alphabet soup".into())).await;
        assert_eq!(provider.received(), vec!["alphabet".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let d = dispatcher(
            MockProvider::always_succeeds(vec![1]).failing_on("BROKEN"),
            fast_options(),
        );
        let outcomes = d
            .dispatch_all(&chunks(&["one", "BROKEN two", "three"]), |_| {})
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_success());
        assert!(matches!(
            outcomes[1],
            ChunkOutcome::Failed {
                index: 1,
                reason: ChunkFailure::Synthesis(_)
            }
        ));
        assert!(outcomes[2].is_success());
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_preserves_order() {
        let provider = MockProvider::always_succeeds(vec![1])
            .delaying("slow", Duration::from_millis(100));
        let d = dispatcher(
            provider,
            DispatchOptions {
                workers: 4,
                ..fast_options()
            },
        );

        let input = chunks(&["slow first", "second", "third", "fourth"]);
        let outcomes = d.dispatch_all(&input, |_| {}).await;

        let indices: Vec<usize> = outcomes.iter().map(ChunkOutcome::index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(outcomes.iter().all(ChunkOutcome::is_success));
    }

    #[tokio::test]
    async fn test_progress_reports_each_chunk() {
        let d = dispatcher(
            MockProvider::always_succeeds(vec![1]).failing_on("bad"),
            fast_options(),
        );
        let mut reports = Vec::new();
        d.dispatch_all(&chunks(&["a", "bad", "c"]), |p| reports.push(p))
            .await;

        assert_eq!(reports.len(), 3);
        let last = reports[2];
        assert_eq!(last.total, 3);
        assert_eq!(last.completed, 3);
        assert_eq!(last.failed, 1);
    }

    #[tokio::test]
    async fn test_timeout_marks_unfinished_chunks() {
        let provider = MockProvider::always_succeeds(vec![1])
            .delaying("stuck", Duration::from_secs(30));
        let d = dispatcher(
            provider,
            DispatchOptions {
                workers: 2,
                timeout: Some(Duration::from_millis(200)),
                ..fast_options()
            },
        );

        let outcomes = d
            .dispatch_all(&chunks(&["fast", "stuck here", "also fast"]), |_| {})
            .await;

        assert!(outcomes[0].is_success());
        assert!(matches!(
            outcomes[1],
            ChunkOutcome::Failed {
                index: 1,
                reason: ChunkFailure::TimedOut
            }
        ));
        assert!(outcomes[2].is_success());
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let provider = Arc::new(MockProvider::fails_then_succeeds(
            2,
            SpeechError::ServerOverloaded {
                message: "busy".into(),
            },
            vec![7],
        ));
        let d = SynthesisDispatcher::new(
            provider.clone(),
            DispatchOptions {
                max_retries: 2,
                ..fast_options()
            },
        );

        let outcome = d.synthesize_chunk(&TextChunk::new(0, "retry me".into())).await;
        assert!(outcome.is_success());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let provider = Arc::new(MockProvider::always_fails(SpeechError::ServerOverloaded {
            message: "busy".into(),
        }));
        let d = SynthesisDispatcher::new(provider.clone(), fast_options());

        let outcome = d.synthesize_chunk(&TextChunk::new(0, "once".into())).await;
        assert!(!outcome.is_success());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_permanent_errors_not_retried() {
        let provider = Arc::new(MockProvider::always_fails(SpeechError::ApiError {
            message: "invalid voice".into(),
            status_code: Some(400),
        }));
        let d = SynthesisDispatcher::new(
            provider.clone(),
            DispatchOptions {
                max_retries: 3,
                ..fast_options()
            },
        );

        d.synthesize_chunk(&TextChunk::new(0, "x".into())).await;
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_payload_fails_chunk() {
        let d = dispatcher(MockProvider::always_succeeds(Vec::new()), fast_options());
        let outcome = d.synthesize_chunk(&TextChunk::new(0, "x".into())).await;
        assert!(matches!(
            outcome,
            ChunkOutcome::Failed {
                reason: ChunkFailure::Synthesis(SpeechError::EmptyAudio),
                ..
            }
        ));
    }
}
