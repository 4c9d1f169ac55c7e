// src/pdf.rs

use lopdf::{Dictionary, Document};
use tracing::{info, warn};

/// What a PDF yielded when we tried to read it.
#[derive(Debug)]
pub enum PdfText {
    /// Extractable text content.
    Extracted(String),
    /// Image-only pages — needs a vision model, which this tool does not ship.
    Scanned,
    /// The file could not be parsed as a PDF.
    Failed(String),
}

/// Below this many non-whitespace characters the text layer is assumed to
/// be an artifact and the document is really a scan.
const MIN_TEXT_CHARS: usize = 30;

/// Share of image-only pages above which the whole file counts as scanned.
const SCANNED_PAGE_RATIO: f64 = 0.8;

/// Classify raw PDF bytes and extract their text layer when there is one.
pub fn read_pdf_text(pdf_bytes: &[u8]) -> PdfText {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(doc) => doc,
        Err(e) => return PdfText::Failed(format!("Failed to parse PDF: {e}")),
    };

    if mostly_image_pages(&doc) {
        info!("PDF structural check: likely scanned / image-only");
        return PdfText::Scanned;
    }

    match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => {
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful < MIN_TEXT_CHARS {
                info!(
                    chars = meaningful,
                    "Extracted text too short — treating as scanned"
                );
                PdfText::Scanned
            } else {
                info!(chars = meaningful, "Text extracted successfully");
                PdfText::Extracted(text)
            }
        }
        Err(e) => {
            warn!(error = %e, "pdf-extract failed — may be scanned or corrupted");
            PdfText::Scanned
        }
    }
}

/// A page with XObject images but no Font resources is almost certainly a
/// scan; count how much of the document looks like that.
fn mostly_image_pages(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false; // Can't tell — let text extraction try
    }

    let mut image_only = 0;
    for object_id in pages.values() {
        let Ok(page) = doc.get_object(*object_id) else {
            continue;
        };
        let Ok(page_dict) = page.as_dict() else {
            continue;
        };

        let has_fonts = has_resource(doc, page_dict, b"Font");
        let has_images = has_resource(doc, page_dict, b"XObject");
        if has_images && !has_fonts {
            image_only += 1;
        }
    }

    let ratio = image_only as f64 / pages.len() as f64;
    info!(
        total_pages = pages.len(),
        image_only,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );

    ratio >= SCANNED_PAGE_RATIO
}

/// Whether the page's Resources dictionary carries a non-empty `key` entry.
fn has_resource(doc: &Document, page_dict: &Dictionary, key: &[u8]) -> bool {
    page_dict
        .get(b"Resources")
        .ok()
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .and_then(|res| res.get(key).ok())
        .and_then(|entry| doc.dereference(entry).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .is_some_and(|dict| !dict.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let result = read_pdf_text(b"this is not a pdf");
        assert!(matches!(result, PdfText::Failed(_)));
    }
}
