//! In-process text extraction with `pdf-extract`.

use async_trait::async_trait;

use super::{ExtractionError, PdfSource, TextExtractor};

const NAME: &str = "pdf-extract";

/// Reads the PDF's text layer locally. No OCR.
#[derive(Debug, Default)]
pub struct LocalPdfExtractor;

impl LocalPdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

/// Join page text the way a page-by-page reader would.
fn tidy(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[async_trait]
impl TextExtractor for LocalPdfExtractor {
    fn name(&self) -> &str {
        NAME
    }

    async fn extract(&self, pdf: &PdfSource) -> Result<String, ExtractionError> {
        let bytes = pdf.bytes.clone();

        // Parsing is CPU-bound
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ExtractionError::Backend {
                backend: NAME.to_string(),
                message: format!("task join error: {}", e),
            })?
            .map_err(|e| ExtractionError::Backend {
                backend: NAME.to_string(),
                message: e.to_string(),
            })?;

        let text = tidy(&text);
        if text.is_empty() {
            return Err(ExtractionError::NoText);
        }
        Ok(text)
    }
}
