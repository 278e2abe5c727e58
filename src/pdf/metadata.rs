//! Info-dictionary metadata handling
//!
//! Two concerns: an allow-list read of descriptive fields from the source
//! document, and a destructive pass over the output document that clears the
//! fields authoring tools use to identify themselves.

use lopdf::{Dictionary, Object};
use tracing::debug;

use crate::pdf::document::PdfDocument;

/// Descriptive metadata retained from the source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub author: Option<String>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
}

/// Extract the allow-listed descriptive fields from a document.
///
/// A field is included only when present and text-typed; everything else is
/// silently omitted.
pub fn extract_clean(doc: &PdfDocument) -> DocumentMetadata {
    let mut meta = DocumentMetadata::default();
    let info = match doc.info_dict() {
        Some(dict) => dict,
        None => return meta,
    };

    meta.author = text_field(info, b"Author");
    meta.title = text_field(info, b"Title");
    meta.subject = text_field(info, b"Subject");
    meta.keywords = text_field(info, b"Keywords");
    meta
}

/// Strip identifying fields from the output document's info dictionary.
///
/// `/Producer` becomes the empty string; `/Creator`, `/CreationDate` and
/// `/ModDate` are removed. Descriptive fields are not touched. Failure is
/// logged, never raised: metadata must not abort a save.
pub fn sanitize_for_output(doc: &mut PdfDocument) {
    match doc.info_dict_mut() {
        Ok(info) => {
            info.set("Producer", Object::string_literal(""));
            info.remove(b"Creator");
            info.remove(b"CreationDate");
            info.remove(b"ModDate");
        }
        Err(e) => debug!("could not sanitize info dictionary: {}", e),
    }
}

/// Write a snapshot taken from the source document back onto the output's
/// info dictionary, so descriptive fields survive processing unchanged.
pub fn apply_clean(doc: &mut PdfDocument, meta: &DocumentMetadata) {
    let info = match doc.info_dict_mut() {
        Ok(info) => info,
        Err(e) => {
            debug!("could not write descriptive metadata: {}", e);
            return;
        }
    };

    let fields = [
        ("Author", &meta.author),
        ("Title", &meta.title),
        ("Subject", &meta.subject),
        ("Keywords", &meta.keywords),
    ];
    for (key, value) in fields {
        if let Some(value) = value {
            info.set(key, Object::string_literal(value.as_str()));
        }
    }
}

/// Decode a PDF text string: UTF-16BE when it carries a byte-order mark,
/// otherwise treated as a byte string.
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&utf16)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

fn text_field(info: &Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key) {
        Ok(Object::String(bytes, _)) => Some(decode_text_string(bytes)),
        _ => None,
    }
}
