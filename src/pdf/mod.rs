//! PDF document handling module

pub mod document;
pub mod filters;
pub mod metadata;

// Re-export commonly used items
pub use document::PdfDocument;
pub use metadata::{apply_clean, extract_clean, sanitize_for_output, DocumentMetadata};
