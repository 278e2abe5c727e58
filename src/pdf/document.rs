//! Document model built on lopdf
//!
//! `lopdf` handles the object graph, cross-reference tables and page tree;
//! this wrapper adds the pieces the watermark pipeline needs: ordered page
//! access, per-page content-stream resolution, decoded stream reads, dirty
//! writes, info-dictionary access and a save path that re-encodes exactly
//! the streams that were rewritten.

use std::collections::BTreeSet;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::pdf::filters;

/// A PDF document opened for processing.
///
/// Exclusively owns all page and stream data between `open` and `save`.
pub struct PdfDocument {
    doc: Document,
    /// Content streams holding plain bytes that need re-encoding at save
    dirty: BTreeSet<ObjectId>,
}

impl PdfDocument {
    /// Open a PDF file.
    ///
    /// Fails with `Error::Pdf` when the structure cannot be parsed and with
    /// `Error::Encrypted` when the document is password-protected; empty
    /// passwords are not usable key material, so any `/Encrypt` dictionary
    /// counts.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let doc = Document::load(path)?;
        Self::from_document(doc)
    }

    /// Open a PDF from an in-memory buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes)?;
        Self::from_document(doc)
    }

    pub(crate) fn from_document(doc: Document) -> Result<Self> {
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(Error::Encrypted);
        }
        Ok(Self {
            doc,
            dirty: BTreeSet::new(),
        })
    }

    /// Page object ids in document page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().into_values().collect()
    }

    /// Total number of pages.
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// The content stream ids of a page, in paint order.
    ///
    /// `/Contents` may be absent (a blank page), a reference to a single
    /// stream, a reference to an array of streams, or a direct array.
    pub fn content_streams(&self, page_id: ObjectId) -> Result<Vec<ObjectId>> {
        let page = self.doc.get_object(page_id)?.as_dict()?;
        let contents = match page.get(b"Contents") {
            Ok(obj) => obj,
            Err(_) => return Ok(Vec::new()),
        };

        let ids = match contents {
            Object::Reference(id) => match self.doc.get_object(*id)? {
                Object::Array(arr) => collect_refs(arr),
                _ => vec![*id],
            },
            Object::Array(arr) => collect_refs(arr),
            _ => Vec::new(),
        };

        Ok(ids)
    }

    /// Read a stream's bytes, decoded through its filter chain.
    ///
    /// `Error::UnsupportedFilter` marks a stream that must be left alone;
    /// callers treat it as a per-stream skip, never a document failure.
    pub fn read_decoded(&self, stream_id: ObjectId) -> Result<Vec<u8>> {
        let stream = self.doc.get_object(stream_id)?.as_stream()?;
        filters::decode(stream)
    }

    /// Replace a stream's logical content with plain bytes.
    ///
    /// The filter entries are dropped and the stream is marked dirty; the
    /// bytes are re-encoded when the document is saved.
    pub fn write_decoded(&mut self, stream_id: ObjectId, data: Vec<u8>) -> Result<()> {
        let stream = self.doc.get_object_mut(stream_id)?.as_stream_mut()?;
        stream.dict.remove(b"Filter");
        stream.dict.remove(b"DecodeParms");
        stream.dict.remove(b"DP");
        stream.dict.set("Length", Object::Integer(data.len() as i64));
        stream.content = data;
        self.dirty.insert(stream_id);
        Ok(())
    }

    /// The document information dictionary, if present.
    pub fn info_dict(&self) -> Option<&Dictionary> {
        match self.doc.trailer.get(b"Info").ok()? {
            Object::Reference(id) => self.doc.get_object(*id).ok()?.as_dict().ok(),
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    /// Mutable access to the information dictionary, creating an empty one
    /// when the document has none.
    pub fn info_dict_mut(&mut self) -> Result<&mut Dictionary> {
        let resolved = self.doc.trailer.get(b"Info").ok().cloned();
        match resolved {
            Some(Object::Reference(id))
                if matches!(self.doc.get_object(id), Ok(Object::Dictionary(_))) =>
            {
                Ok(self.doc.get_object_mut(id)?.as_dict_mut()?)
            }
            Some(Object::Dictionary(_)) => Ok(self.doc.trailer.get_mut(b"Info")?.as_dict_mut()?),
            _ => {
                // Missing, dangling or mistyped: start fresh
                let id = self.doc.add_object(Object::Dictionary(Dictionary::new()));
                self.doc.trailer.set("Info", Object::Reference(id));
                Ok(self.doc.get_object_mut(id)?.as_dict_mut()?)
            }
        }
    }

    /// Re-encode every dirty stream with flate and write a complete PDF.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let dirty = std::mem::take(&mut self.dirty);
        for id in dirty {
            let stream = match self.doc.get_object_mut(id) {
                Ok(Object::Stream(stream)) => stream,
                _ => {
                    return Err(Error::Serialization(format!(
                        "dirty object {} {} is no longer a stream",
                        id.0, id.1
                    )))
                }
            };
            let encoded = filters::flate_encode(&stream.content)?;
            stream.dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
            stream.dict.set("Length", Object::Integer(encoded.len() as i64));
            stream.content = encoded;
        }

        self.doc.save(path)?;
        Ok(())
    }
}

fn collect_refs(arr: &[Object]) -> Vec<ObjectId> {
    arr.iter()
        .filter_map(|obj| match obj {
            Object::Reference(id) => Some(*id),
            _ => None,
        })
        .collect()
}
