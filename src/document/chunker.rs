//! Sentence-window chunking with overlap.

use serde::Serialize;
use std::collections::HashMap;

pub const SOURCE_ID: &str = "source_id";
pub const SPLIT_ID: &str = "split_id";
pub const SPLIT_IDX_START: &str = "split_idx_start";
pub const SPLIT_OVERLAP: &str = "split_overlap";

/// A passage of source text. `embedding` is filled in by the embedder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embedding: None,
            metadata: HashMap::new(),
        }
    }

    /// Byte length of the leading region shared with the previous chunk.
    pub fn overlap_len(&self) -> usize {
        self.metadata
            .get(SPLIT_OVERLAP)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

/// Splits text into windows of `split_length` sentences, adjacent windows
/// sharing `overlap` sentences.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    split_length: usize,
    overlap: usize,
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(3, 1)
    }
}

impl SentenceChunker {
    pub fn new(split_length: usize, overlap: usize) -> Self {
        let split_length = split_length.max(1);
        Self {
            split_length,
            overlap: overlap.min(split_length - 1),
        }
    }

    /// Returns no chunks for empty or whitespace-only input.
    pub fn split(&self, text: &str, source_id: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let units = sentence_units(text);
        let step = self.split_length - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.split_length).min(units.len());
            let window = &units[start..end];

            let offset = window[0].0;
            let content: String = window.iter().map(|(_, unit)| *unit).collect();

            let overlap_len = if start == 0 {
                0
            } else {
                // Units shared with the previous window are the first
                // (previous end - start) units of this one
                let shared = (start - step + self.split_length).min(end) - start;
                window[..shared].iter().map(|(_, unit)| unit.len()).sum()
            };

            let mut chunk = Chunk::new(content);
            chunk.metadata.insert(SOURCE_ID.to_string(), source_id.to_string());
            chunk.metadata.insert(SPLIT_ID.to_string(), chunks.len().to_string());
            chunk.metadata.insert(SPLIT_IDX_START.to_string(), offset.to_string());
            chunk.metadata.insert(SPLIT_OVERLAP.to_string(), overlap_len.to_string());
            chunks.push(chunk);

            if end == units.len() {
                break;
            }
            start += step;
        }

        log::debug!(
            "Split {} sentences into {} chunks (length {}, overlap {})",
            units.len(),
            chunks.len(),
            self.split_length,
            self.overlap
        );
        chunks
    }
}

/// Sentence units with their byte offsets. A unit ends after `.`, `!` or `?`
/// followed by whitespace and keeps that whitespace, so the units
/// concatenate back to `text`.
fn sentence_units(text: &str) -> Vec<(usize, &str)> {
    let mut units = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        match chars.peek() {
            Some(&(_, next)) if next.is_whitespace() => {}
            Some(_) => continue,
            None => break,
        }

        let mut end = i + c.len_utf8();
        while let Some(&(j, ws)) = chars.peek() {
            if !ws.is_whitespace() {
                break;
            }
            end = j + ws.len_utf8();
            chars.next();
        }
        units.push((start, &text[start..end]));
        start = end;
    }

    if start < text.len() {
        units.push((start, &text[start..]));
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Budget: $500,000. Submission deadline: March 1. Contact the office! \
                        Is a site visit required? Version 2.5 applies. Final note";

    fn non_overlap_concat(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .map(|c| &c.content[c.overlap_len()..])
            .collect()
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunker = SentenceChunker::default();
        assert!(chunker.split("", "doc").is_empty());
        assert!(chunker.split("  \n\t ", "doc").is_empty());
    }

    #[test]
    fn test_sentence_units_concatenate_back() {
        let units = sentence_units(TEXT);
        let joined: String = units.iter().map(|(_, u)| *u).collect();
        assert_eq!(joined, TEXT);
        assert_eq!(units.len(), 6);
        assert_eq!(units[4].1, "Version 2.5 applies. ");
    }

    #[test]
    fn test_non_overlap_regions_reconstruct_text() {
        for (length, overlap) in [(3, 1), (2, 1), (1, 0), (4, 2), (3, 0)] {
            let chunks = SentenceChunker::new(length, overlap).split(TEXT, "doc");
            assert!(!chunks.is_empty());
            assert_eq!(non_overlap_concat(&chunks), TEXT, "length {} overlap {}", length, overlap);
        }
    }

    #[test]
    fn test_overlap_equals_predecessor_tail() {
        let chunks = SentenceChunker::default().split(TEXT, "doc");
        assert_eq!(chunks.len(), 3);
        for pair in chunks.windows(2) {
            let overlap = pair[1].overlap_len();
            assert!(overlap > 0);
            assert!(pair[0].content.ends_with(&pair[1].content[..overlap]));
        }
    }

    #[test]
    fn test_metadata_records_offsets() {
        let chunks = SentenceChunker::default().split(TEXT, "doc-1");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata[SOURCE_ID], "doc-1");
            assert_eq!(chunk.metadata[SPLIT_ID], i.to_string());
            let start: usize = chunk.metadata[SPLIT_IDX_START].parse().unwrap();
            assert!(TEXT[start..].starts_with(&chunk.content));
            assert!(chunk.embedding.is_none());
        }
        assert_eq!(chunks[0].overlap_len(), 0);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = SentenceChunker::default().split("No punctuation at all", "doc");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "No punctuation at all");
    }

    #[test]
    fn test_overlap_is_clamped() {
        let chunks = SentenceChunker::new(2, 5).split(TEXT, "doc");
        assert_eq!(non_overlap_concat(&chunks), TEXT);
        assert_eq!(chunks.len(), 5);
    }
}
