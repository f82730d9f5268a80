use async_trait::async_trait;

use crate::error::{Result, RfpError};

/// Turns uploaded file bytes into plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Fails with `ExtractionFailed` when the file has no extractable text.
    async fn extract(&self, bytes: Vec<u8>) -> Result<String>;
}

#[derive(Debug, Default, Clone)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, bytes: Vec<u8>) -> Result<String> {
        log::debug!("Extracting text from {} byte PDF", bytes.len());

        // pdf-extract is CPU bound and may panic on malformed input; the
        // blocking task contains both
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| RfpError::ExtractionFailed(format!("extraction task failed: {}", e)))?
            .map_err(|e| RfpError::ExtractionFailed(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(RfpError::ExtractionFailed(
                "No extractable text found in PDF".to_string(),
            ));
        }

        log::info!("Extracted {} characters from PDF", text.len());
        Ok(text)
    }
}
