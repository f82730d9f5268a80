pub mod chunker;
pub mod extractor;
pub mod ingest;

pub use chunker::{Chunk, SentenceChunker};
pub use extractor::{PdfExtractor, TextExtractor};
pub use ingest::DocumentIngestor;
