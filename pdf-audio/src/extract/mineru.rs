//! MinerU document-parsing service client.

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::{ExtractionError, PdfSource, TextExtractor};

const NAME: &str = "MinerU";

/// Request options forwarded to `/file_parse`.
#[derive(Debug, Clone)]
pub struct MineruOptions {
    /// Parsing backend, e.g. "pipeline"
    pub backend: String,
    /// OCR language hint
    pub lang: String,
    pub formula_enable: bool,
    pub table_enable: bool,
    pub start_page: u32,
    pub end_page: u32,
    pub timeout: Duration,
}

impl Default for MineruOptions {
    fn default() -> Self {
        Self {
            backend: "pipeline".to_string(),
            lang: "ch".to_string(),
            formula_enable: true,
            table_enable: true,
            start_page: 0,
            end_page: 99999,
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    #[serde(default)]
    results: BTreeMap<String, ParsedDocument>,
}

#[derive(Debug, Deserialize)]
struct ParsedDocument {
    #[serde(default)]
    md_content: Option<String>,
}

/// Extracts Markdown from a running MinerU server.
pub struct MineruExtractor {
    base_url: String,
    options: MineruOptions,
    client: reqwest::Client,
}

impl MineruExtractor {
    pub fn new(base_url: &str, options: MineruOptions) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            options,
            client,
        })
    }

    fn form(&self, pdf: &PdfSource) -> Result<multipart::Form, ExtractionError> {
        let file = multipart::Part::bytes(pdf.bytes.to_vec())
            .file_name(pdf.file_name.clone())
            .mime_str("application/pdf")?;

        let o = &self.options;
        Ok(multipart::Form::new()
            .part("files", file)
            .text("return_md", "true")
            .text("return_middle_json", "false")
            .text("return_model_output", "false")
            .text("return_content_list", "false")
            .text("return_images", "false")
            .text("parse_method", "auto")
            .text("backend", o.backend.clone())
            .text("lang_list", o.lang.clone())
            .text("formula_enable", o.formula_enable.to_string())
            .text("table_enable", o.table_enable.to_string())
            .text("start_page_id", o.start_page.to_string())
            .text("end_page_id", o.end_page.to_string()))
    }
}

#[async_trait]
impl TextExtractor for MineruExtractor {
    fn name(&self) -> &str {
        NAME
    }

    async fn extract(&self, pdf: &PdfSource) -> Result<String, ExtractionError> {
        let url = format!("{}/file_parse", self.base_url);
        log::debug!("Posting {} to {}", pdf.file_name, url);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(self.form(pdf)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ExtractionError::Backend {
                backend: NAME.to_string(),
                message: format!("HTTP {}: {}", status.as_u16(), body.trim()),
            });
        }

        parse_response(&body)
    }
}

/// Pull the Markdown out of a `/file_parse` response.
///
/// Every document's `md_content` is joined with blank lines.
fn parse_response(body: &str) -> Result<String, ExtractionError> {
    let parsed: ParseResponse =
        serde_json::from_str(body).map_err(|e| ExtractionError::Backend {
            backend: NAME.to_string(),
            message: format!("invalid response: {}", e),
        })?;

    let text = parsed
        .results
        .into_values()
        .filter_map(|doc| doc.md_content)
        .filter(|md| !md.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if text.is_empty() {
        return Err(ExtractionError::NoText);
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_document() {
        let body = r##"{
            "backend": "pipeline",
            "version": "2.1.0",
            "results": {
                "01. Notice": { "md_content": "# Notice\n\nPlease read." }
            }
        }"##;
        assert_eq!(parse_response(body).unwrap(), "# Notice\n\nPlease read.");
    }

    #[test]
    fn test_parse_multiple_documents() {
        let body = r#"{
            "results": {
                "a": { "md_content": "First" },
                "b": { "md_content": "Second" },
                "c": { "middle_json": "{}" }
            }
        }"#;
        assert_eq!(parse_response(body).unwrap(), "First\n\nSecond");
    }

    #[test]
    fn test_parse_empty_results() {
        assert!(matches!(
            parse_response(r#"{"results": {}}"#),
            Err(ExtractionError::NoText)
        ));
        assert!(matches!(
            parse_response(r#"{"results": {"a": {"md_content": "  "}}}"#),
            Err(ExtractionError::NoText)
        ));
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_response("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(err.to_string().contains("invalid response"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let extractor =
            MineruExtractor::new("http://localhost:8000/", MineruOptions::default()).unwrap();
        assert_eq!(extractor.base_url, "http://localhost:8000");
        assert_eq!(extractor.name(), "MinerU");
    }

    #[tokio::test]
    async fn test_unreachable_server_fails() {
        let extractor = MineruExtractor::new(
            "http://127.0.0.1:9",
            MineruOptions {
                timeout: Duration::from_secs(2),
                ..Default::default()
            },
        )
        .unwrap();
        let pdf = PdfSource::new("x.pdf", b"%PDF".to_vec());
        assert!(extractor.extract(&pdf).await.is_err());
    }
}
