//! Watermark removal pipeline
//!
//! Ties the pieces together: open the document, snapshot its descriptive
//! metadata, strip artifact regions from every page's content streams,
//! sanitize the info dictionary and save. Stream-level problems are logged
//! and skip that stream only; document-level failures propagate.

use std::fs;
use std::path::Path;

use lopdf::ObjectId;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pdf::{self, PdfDocument};
use crate::scan;

/// Aggregate statistics for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalStats {
    /// Total pages in the document, not just pages a watermark was found on
    pub pages_processed: usize,
}

/// Remove artifact watermarks from `input` and write the cleaned PDF to
/// `output`, creating parent directories as needed.
pub fn remove_watermarks(input: &Path, output: &Path) -> Result<RemovalStats> {
    let mut doc = PdfDocument::open(input)?;

    // Snapshot descriptive metadata before any mutation so the output gets
    // the original values, not whatever processing left behind
    let clean_meta = pdf::extract_clean(&doc);

    let pages = doc.page_ids();
    let page_count = pages.len();

    for (index, page_id) in pages.into_iter().enumerate() {
        let page_num = index + 1;
        process_page(&mut doc, page_id, page_num);

        if page_num % 200 == 0 {
            debug!("processed {} pages", page_num);
        }
    }

    pdf::sanitize_for_output(&mut doc);
    pdf::apply_clean(&mut doc, &clean_meta);

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    doc.save(output)?;

    debug!("watermark removal complete");

    Ok(RemovalStats {
        pages_processed: page_count,
    })
}

/// Scan and rewrite each content stream of one page.
///
/// Every failure here is per-stream: logged, stream left untouched, run
/// continues.
fn process_page(doc: &mut PdfDocument, page_id: ObjectId, page_num: usize) {
    let streams = match doc.content_streams(page_id) {
        Ok(streams) => streams,
        Err(e) => {
            warn!("page {}: could not resolve content streams: {}", page_num, e);
            return;
        }
    };

    for stream_id in streams {
        let data = match doc.read_decoded(stream_id) {
            Ok(data) => data,
            Err(e) => {
                debug!("page {}: skipping stream: {}", page_num, e);
                continue;
            }
        };

        let outcome = scan::strip_artifacts(&data);
        if outcome.unterminated {
            debug!(
                "page {}: unterminated marked-content region left in place",
                page_num
            );
        }
        if outcome.malformed {
            debug!("page {}: stream did not tokenize, left untouched", page_num);
        }
        if !outcome.modified {
            continue;
        }

        debug!(
            "page {}: removed {} artifact region(s)",
            page_num, outcome.regions_removed
        );
        let cleaned = outcome.data.into_owned();
        if let Err(e) = doc.write_decoded(stream_id, cleaned) {
            warn!("page {}: could not write cleaned stream: {}", page_num, e);
        }
    }
}
