//! Overlay redaction.

use std::collections::BTreeMap;
use std::time::Instant;

use bytes::Bytes;

use super::document::PdfDocument;
use super::error::RedactionError;
use super::geometry::{ResolvedRect, Rgb, resolve_all};
use super::types::{ApplyOutcome, PageInfo, RedactionRectangle};

/// Validate every rectangle, then paint them onto a fresh decode of
/// `original`. The input bytes are never modified.
pub(crate) fn redact(
    original: &[u8],
    pages: &[PageInfo],
    rects: &[RedactionRectangle],
    fallback: Rgb,
) -> Result<ApplyOutcome, RedactionError> {
    let started = Instant::now();
    let resolved = resolve_all(rects, pages, fallback).map_err(RedactionError::validation)?;

    let mut by_page: BTreeMap<u32, Vec<ResolvedRect>> = BTreeMap::new();
    for rect in resolved {
        by_page.entry(rect.page_number).or_default().push(rect);
    }

    let mut document = PdfDocument::decode(original)?;
    for (page_number, page_rects) in &by_page {
        document.paint(*page_number, page_rects)?;
    }
    let encoded = document.encode()?;

    Ok(ApplyOutcome {
        original_size: original.len(),
        redacted_size: encoded.len(),
        document: Bytes::from(encoded),
        processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        redactions_applied: rects.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redaction::document::fixtures::letter_pdf;

    fn pages() -> Vec<PageInfo> {
        PdfDocument::decode(&letter_pdf()).unwrap().pages().unwrap()
    }

    #[test]
    fn test_redact_reports_sizes() {
        let original = letter_pdf();
        let outcome = redact(
            &original,
            &pages(),
            &[
                RedactionRectangle::new(1, 0.1, 0.1, 0.5, 0.05),
                RedactionRectangle::new(2, 50.0, 50.0, 100.0, 20.0).with_color("#ff0000"),
            ],
            Rgb::BLACK,
        )
        .unwrap();
        assert_eq!(outcome.original_size, original.len());
        assert_eq!(outcome.redacted_size, outcome.document.len());
        assert_eq!(outcome.redactions_applied, 2);
        assert!(outcome.document.starts_with(b"%PDF"));
    }

    #[test]
    fn test_validation_happens_before_decode() {
        let err = redact(
            b"not a pdf",
            &pages(),
            &[RedactionRectangle::new(9, 0.1, 0.1, 0.1, 0.1)],
            Rgb::BLACK,
        )
        .unwrap_err();
        assert!(matches!(err, RedactionError::Validation { ref violations } if violations.len() == 1));
    }

    #[test]
    fn test_empty_list_reencodes_unchanged_pages() {
        let outcome = redact(&letter_pdf(), &pages(), &[], Rgb::BLACK).unwrap();
        let reopened = PdfDocument::decode(&outcome.document).unwrap();
        assert_eq!(reopened.pages().unwrap().len(), 2);
        assert_eq!(outcome.redactions_applied, 0);
    }
}
