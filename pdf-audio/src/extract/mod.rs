//! PDF text extraction backends, tried in priority order.

mod local;
mod mineru;

pub use local::LocalPdfExtractor;
pub use mineru::{MineruExtractor, MineruOptions};

use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors from a single extractor or from the whole chain.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("No text found in the PDF file")]
    NoText,

    #[error("{backend} failed: {message}")]
    Backend { backend: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("All extractors failed: {}", describe(.failures))]
    Exhausted { failures: Vec<ExtractorFailure> },
}

/// Why one extractor in the chain was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorFailure {
    pub extractor: String,
    pub reason: String,
}

fn describe(failures: &[ExtractorFailure]) -> String {
    if failures.is_empty() {
        return "no extractors configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.extractor, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A PDF loaded into memory.
#[derive(Debug, Clone)]
pub struct PdfSource {
    /// File name sent to backends that want one
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

impl PdfSource {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a PDF from disk.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read PDF: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

/// Extracted document text and the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub source: String,
}

/// A PDF-to-text backend.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    async fn extract(&self, pdf: &PdfSource) -> Result<String, ExtractionError>;
}

/// Ordered list of extractors; the first one returning non-blank text wins.
#[derive(Default)]
pub struct ExtractionChain {
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl ExtractionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extractor with lower priority than those already added.
    pub fn with(mut self, extractor: Box<dyn TextExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    /// Names of the extractors in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    pub async fn extract(&self, pdf: &PdfSource) -> Result<ExtractedText, ExtractionError> {
        let mut failures = Vec::new();
        let mut only_blank = true;

        for extractor in &self.extractors {
            let result = extractor
                .extract(pdf)
                .await
                .and_then(|text| match text.trim() {
                    "" => Err(ExtractionError::NoText),
                    trimmed => Ok(trimmed.to_string()),
                });

            match result {
                Ok(text) => {
                    log::info!(
                        "Extracted {} characters with {}",
                        text.chars().count(),
                        extractor.name()
                    );
                    return Ok(ExtractedText {
                        text,
                        source: extractor.name().to_string(),
                    });
                }
                Err(e) => {
                    log::warn!("{} could not extract text: {}", extractor.name(), e);
                    only_blank &= matches!(e, ExtractionError::NoText);
                    failures.push(ExtractorFailure {
                        extractor: extractor.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if only_blank && !failures.is_empty() {
            return Err(ExtractionError::NoText);
        }

        Err(ExtractionError::Exhausted { failures })
    }
}
