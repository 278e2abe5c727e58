//! Pre-flight processability probe

use std::path::Path;

use crate::pdf::PdfDocument;

/// Outcome of the pre-flight check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionResult {
    pub processable: bool,
    pub reason: Option<String>,
}

/// Check whether a document can be processed: it must parse, and it must not
/// require a password.
///
/// Read-only with respect to the file; may be called repeatedly.
pub fn detect_processable<P: AsRef<Path>>(path: P) -> DetectionResult {
    match PdfDocument::open(path) {
        Ok(_) => DetectionResult {
            processable: true,
            reason: None,
        },
        Err(err) => DetectionResult {
            processable: false,
            reason: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_nonexistent_file_not_processable() {
        let result = detect_processable("no-such-file.pdf");
        assert!(!result.processable);
        assert!(result.reason.is_some());
    }

    #[test]
    fn test_corrupt_file_not_processable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.5\nthis is not a real pdf body").unwrap();

        let result = detect_processable(file.path());
        assert!(!result.processable);
        assert!(result.reason.is_some());
    }
}
