//! Redaction session lifecycle.

use std::sync::Arc;

use bytes::Bytes;
use tokio::task;
use tracing::{debug, info};

use super::config::RedactionConfig;
use super::detect;
use super::document::PdfDocument;
use super::engine;
use super::error::RedactionError;
use super::geometry::{Rgb, resolve_all};
use super::preview::{self, PREVIEW_CONTENT_TYPE};
use super::store::{RedactionSession, SessionStore};
use super::types::{
    ApplyOptions, ApplyOutcome, DetectionKind, PreparedSession, Preview, RedactionRectangle,
    RedactionViolation, SaveTarget, SessionDetails, Suggestion,
};
use crate::storage::{Provider, StorageGateway, UploadedObject};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Prepares documents from storage, redacts them in session, and saves the
/// result back through the gateway.
///
/// Reads (details, preview, detect) share a session; apply, save and
/// cleanup hold it exclusively, so a second apply waits for the first.
#[derive(Debug)]
pub struct RedactionService {
    gateway: Arc<StorageGateway>,
    store: SessionStore,
    default_color: Rgb,
}

impl RedactionService {
    /// Create a service over a gateway.
    #[must_use]
    pub fn new(gateway: Arc<StorageGateway>, config: RedactionConfig) -> Self {
        Self {
            gateway,
            store: SessionStore::new(config.session_ttl),
            default_color: config.default_color,
        }
    }

    /// Download and decode a document, opening a session for it.
    pub async fn prepare(
        &self,
        provider: Provider,
        bucket: &str,
        key: &str,
    ) -> Result<PreparedSession, RedactionError> {
        let downloaded = self.gateway.download(provider, bucket, key).await?;
        let bytes = downloaded.bytes.clone();
        let pages = task::spawn_blocking(move || PdfDocument::decode(&bytes)?.pages()).await??;

        let session = RedactionSession::new(provider, bucket, key, downloaded.bytes, pages.clone());
        let session_id = self.store.insert(session);
        info!(%session_id, %provider, bucket, key, pages = pages.len(), "Redaction session prepared");

        Ok(PreparedSession {
            session_id,
            page_count: pages.len(),
            pages,
        })
    }

    /// Paint `redactions` onto a fresh copy of the original document.
    ///
    /// Every rectangle is validated first; on any violation nothing changes
    /// and all violations are returned together. On success the session's
    /// redaction list is replaced.
    pub async fn apply(
        &self,
        session_id: &str,
        redactions: Vec<RedactionRectangle>,
        options: &ApplyOptions,
    ) -> Result<ApplyOutcome, RedactionError> {
        let slot = self.store.get(session_id)?;
        let mut session = slot.write().await?;

        let fallback = self.call_color(options, &redactions, &session)?;
        let original = session.document.clone();
        let pages = session.pages.clone();
        let rects = redactions.clone();
        let outcome =
            task::spawn_blocking(move || engine::redact(&original, &pages, &rects, fallback))
                .await??;

        session.record_redaction(redactions, outcome.document.clone());
        info!(
            session_id,
            redactions = outcome.redactions_applied,
            original_size = outcome.original_size,
            redacted_size = outcome.redacted_size,
            elapsed_ms = outcome.processing_time_ms,
            "Redactions applied"
        );
        Ok(outcome)
    }

    /// Fill color for one apply call.
    ///
    /// An invalid option color is reported alongside any rectangle
    /// violations so the caller sees every problem at once.
    fn call_color(
        &self,
        options: &ApplyOptions,
        redactions: &[RedactionRectangle],
        session: &RedactionSession,
    ) -> Result<Rgb, RedactionError> {
        let Some(raw) = options.color.as_deref() else {
            return Ok(self.default_color);
        };
        if let Some(color) = Rgb::parse(raw) {
            return Ok(color);
        }
        let mut violations = vec![RedactionViolation {
            index: None,
            page_number: None,
            message: format!("color '{raw}' is not a hex color"),
        }];
        if let Err(more) = resolve_all(redactions, &session.pages, self.default_color) {
            violations.extend(more);
        }
        Err(RedactionError::validation(violations))
    }

    /// Render one page with the given overlays. The session is not changed.
    pub async fn preview(
        &self,
        session_id: &str,
        page_number: u32,
        redactions: &[RedactionRectangle],
    ) -> Result<Preview, RedactionError> {
        let slot = self.store.get(session_id)?;
        let session = slot.read().await?;

        let page = session
            .pages
            .iter()
            .find(|p| p.page_number == page_number)
            .ok_or_else(|| {
                RedactionError::validation(vec![RedactionViolation {
                    index: None,
                    page_number: Some(page_number),
                    message: format!(
                        "page {page_number} does not exist (document has {} page(s))",
                        session.pages.len()
                    ),
                }])
            })?;
        let resolved = resolve_all(redactions, &session.pages, self.default_color)
            .map_err(RedactionError::validation)?;
        let on_page: Vec<_> = resolved
            .into_iter()
            .filter(|r| r.page_number == page_number)
            .collect();

        debug!(session_id, page_number, overlays = on_page.len(), "Rendered preview");
        Ok(Preview {
            page_number,
            content_type: PREVIEW_CONTENT_TYPE,
            image: preview::render(page, &on_page),
        })
    }

    /// Suggest redactions from the document's text layer.
    ///
    /// An empty `kinds` slice searches for every kind.
    pub async fn auto_detect(
        &self,
        session_id: &str,
        kinds: &[DetectionKind],
        confidence_threshold: f64,
    ) -> Result<Vec<Suggestion>, RedactionError> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(RedactionError::validation(vec![RedactionViolation {
                index: None,
                page_number: None,
                message: format!("confidence_threshold {confidence_threshold} must be within [0, 1]"),
            }]));
        }
        let slot = self.store.get(session_id)?;
        let (document, pages) = {
            let session = slot.read().await?;
            (session.document.clone(), session.pages.clone())
        };

        let kinds = kinds.to_vec();
        let suggestions = task::spawn_blocking(move || {
            let doc = PdfDocument::decode(&document)?;
            Ok::<_, RedactionError>(
                pages
                    .iter()
                    .flat_map(|p| {
                        detect::scan(
                            p.page_number,
                            &doc.page_text(p.page_number),
                            &kinds,
                            confidence_threshold,
                        )
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .await??;

        debug!(session_id, found = suggestions.len(), "Detection finished");
        Ok(suggestions)
    }

    /// Session metadata.
    pub async fn details(&self, session_id: &str) -> Result<SessionDetails, RedactionError> {
        let slot = self.store.get(session_id)?;
        let session = slot.read().await?;
        Ok(session.details())
    }

    /// Upload the last redacted output.
    ///
    /// Unset target fields default to the source provider and bucket, and
    /// to `<stem>_redacted.pdf` next to the source key.
    pub async fn save(
        &self,
        session_id: &str,
        target: SaveTarget,
    ) -> Result<UploadedObject, RedactionError> {
        let slot = self.store.get(session_id)?;
        let mut session = slot.write().await?;

        let output: Bytes = session
            .redacted
            .clone()
            .ok_or_else(|| RedactionError::NothingToSave {
                session_id: session_id.to_string(),
            })?;
        let provider = target.provider.unwrap_or(session.provider);
        let bucket = target.bucket.unwrap_or_else(|| session.bucket.clone());
        let key = target.key.unwrap_or_else(|| redacted_key(&session.key));

        let saved = self
            .gateway
            .upload(provider, &bucket, &key, output, Some(PDF_CONTENT_TYPE))
            .await?;
        session.record_save(saved.clone());
        info!(session_id, %provider, bucket = %bucket, key = %key, "Redacted document saved");
        Ok(saved)
    }

    /// Drop a session and its buffers.
    ///
    /// Waits for any running apply or save on the session to finish.
    pub async fn cleanup(&self, session_id: &str) -> Result<(), RedactionError> {
        let slot = self.store.get(session_id)?;
        let mut session = slot.write().await?;
        self.store.remove(session_id)?;
        session.release();
        info!(session_id, "Redaction session cleaned up");
        Ok(())
    }

    /// Evict idle sessions. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let evicted = self.store.sweep_expired();
        if evicted > 0 {
            info!(evicted, "Expired redaction sessions evicted");
        }
        evicted
    }

    /// Sessions currently held.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }
}

/// `dir/name.pdf` becomes `dir/name_redacted.pdf`.
fn redacted_key(key: &str) -> String {
    let (dir, file) = match key.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, key),
    };
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    match dir {
        Some(dir) => format!("{dir}/{stem}_redacted.pdf"),
        None => format!("{stem}_redacted.pdf"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redaction::document::fixtures::{letter_pdf, pdf_with_pages};
    use crate::redaction::types::SessionState;
    use crate::storage::GatewayConfig;
    use rstest::rstest;

    async fn service_with(key: &str, pdf: Vec<u8>) -> RedactionService {
        let gateway = Arc::new(StorageGateway::new(&GatewayConfig::in_memory()));
        gateway
            .upload(Provider::Aws, "docs", key, Bytes::from(pdf), None)
            .await
            .unwrap();
        RedactionService::new(gateway, RedactionConfig::default())
    }

    #[rstest]
    #[case("contract.pdf", "contract_redacted.pdf")]
    #[case("legal/2024/contract.pdf", "legal/2024/contract_redacted.pdf")]
    #[case("scan", "scan_redacted.pdf")]
    #[case("dir.v2/scan", "dir.v2/scan_redacted.pdf")]
    #[case(".hidden", ".hidden_redacted.pdf")]
    fn test_redacted_key(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(redacted_key(key), expected);
    }

    #[tokio::test]
    async fn test_prepare_reports_pages() {
        let service = service_with("a.pdf", letter_pdf()).await;
        let prepared = service.prepare(Provider::Aws, "docs", "a.pdf").await.unwrap();
        assert_eq!(prepared.page_count, 2);
        assert_eq!(prepared.pages[0].width_pt, 612.0);
        assert_eq!(service.active_sessions(), 1);
    }

    #[tokio::test]
    async fn test_prepare_rejects_non_pdf() {
        let service = service_with("a.pdf", b"plain text".to_vec()).await;
        let err = service.prepare(Provider::Aws, "docs", "a.pdf").await.unwrap_err();
        assert!(matches!(err, RedactionError::DocumentDecode(_)));
        assert_eq!(service.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_apply_replaces_redaction_list() {
        let service = service_with("a.pdf", letter_pdf()).await;
        let id = service.prepare(Provider::Aws, "docs", "a.pdf").await.unwrap().session_id;

        let two = vec![
            RedactionRectangle::new(1, 0.1, 0.1, 0.2, 0.05),
            RedactionRectangle::new(2, 0.1, 0.1, 0.2, 0.05),
        ];
        service.apply(&id, two, &ApplyOptions::default()).await.unwrap();
        let one = vec![RedactionRectangle::new(1, 0.5, 0.5, 0.2, 0.05)];
        service.apply(&id, one.clone(), &ApplyOptions::default()).await.unwrap();

        let details = service.details(&id).await.unwrap();
        assert_eq!(details.state, SessionState::Redacted);
        assert_eq!(details.redactions, one);
    }

    #[tokio::test]
    async fn test_invalid_option_color_reported_with_rect_violations() {
        let service = service_with("a.pdf", letter_pdf()).await;
        let id = service.prepare(Provider::Aws, "docs", "a.pdf").await.unwrap().session_id;

        let err = service
            .apply(
                &id,
                vec![RedactionRectangle::new(7, 0.1, 0.1, 0.2, 0.05)],
                &ApplyOptions {
                    color: Some("nope".into()),
                },
            )
            .await
            .unwrap_err();
        let RedactionError::Validation { violations } = err else {
            panic!("expected validation error");
        };
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].index, None);
        assert_eq!(violations[1].index, Some(0));

        let details = service.details(&id).await.unwrap();
        assert_eq!(details.state, SessionState::Created);
        assert!(details.redactions.is_empty());
    }

    #[tokio::test]
    async fn test_save_requires_apply() {
        let service = service_with("a.pdf", letter_pdf()).await;
        let id = service.prepare(Provider::Aws, "docs", "a.pdf").await.unwrap().session_id;
        let err = service.save(&id, SaveTarget::default()).await.unwrap_err();
        assert!(matches!(err, RedactionError::NothingToSave { .. }));
    }

    #[tokio::test]
    async fn test_save_defaults_next_to_source() {
        let service = service_with("in/a.pdf", letter_pdf()).await;
        let id = service.prepare(Provider::Aws, "docs", "in/a.pdf").await.unwrap().session_id;
        let outcome = service
            .apply(&id, vec![RedactionRectangle::new(1, 0.1, 0.1, 0.2, 0.05)], &ApplyOptions::default())
            .await
            .unwrap();

        let saved = service.save(&id, SaveTarget::default()).await.unwrap();
        assert_eq!(saved.provider, Provider::Aws);
        assert_eq!(saved.key, "in/a_redacted.pdf");
        assert_eq!(saved.size_bytes, outcome.redacted_size as u64);
        assert_eq!(service.details(&id).await.unwrap().state, SessionState::Saved);

        let stored = service
            .gateway
            .download(Provider::Aws, "docs", "in/a_redacted.pdf")
            .await
            .unwrap();
        assert_eq!(stored.bytes, outcome.document);
        assert_eq!(stored.content_type, PDF_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_preview_draws_only_requested_page() {
        let service = service_with("a.pdf", letter_pdf()).await;
        let id = service.prepare(Provider::Aws, "docs", "a.pdf").await.unwrap().session_id;
        let preview = service
            .preview(
                &id,
                2,
                &[
                    RedactionRectangle::new(1, 0.1, 0.1, 0.2, 0.05),
                    RedactionRectangle::new(2, 0.5, 0.5, 0.25, 0.1),
                ],
            )
            .await
            .unwrap();
        assert_eq!(preview.content_type, "image/svg+xml");
        assert_eq!(preview.image.matches("<rect").count(), 2);
        assert!(preview.image.contains(r#"x="306.00" y="396.00""#));
        assert_eq!(service.details(&id).await.unwrap().state, SessionState::Created);
    }

    #[tokio::test]
    async fn test_auto_detect_reads_text_layer() {
        let pdf = pdf_with_pages(&[&["Name: Jane"], &["Email: jane@example.com", "SSN: 123-45-6789"]], 612, 792);
        let service = service_with("a.pdf", pdf).await;
        let id = service.prepare(Provider::Aws, "docs", "a.pdf").await.unwrap().session_id;

        let all = service.auto_detect(&id, &[], 0.0).await.unwrap();
        assert!(all.iter().any(|s| s.kind == DetectionKind::Email && s.page_number == 2));
        assert!(all.iter().any(|s| s.kind == DetectionKind::Ssn && s.page_number == 2));
        assert!(all.iter().all(|s| s.page_number == 2));

        let only_ssn = service.auto_detect(&id, &[DetectionKind::Ssn], 0.0).await.unwrap();
        assert!(only_ssn.iter().all(|s| s.kind == DetectionKind::Ssn));

        assert!(service.auto_detect(&id, &[], 1.5).await.is_err());
    }

    #[tokio::test]
    async fn test_cleanup_removes_session() {
        let service = service_with("a.pdf", letter_pdf()).await;
        let id = service.prepare(Provider::Aws, "docs", "a.pdf").await.unwrap().session_id;
        service.cleanup(&id).await.unwrap();
        assert!(matches!(
            service.details(&id).await,
            Err(RedactionError::SessionNotFoundOrExpired { .. })
        ));
        assert!(service.cleanup(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_apply_queued_behind_cleanup_finds_no_session() {
        let service = Arc::new(service_with("a.pdf", letter_pdf()).await);
        let id = service.prepare(Provider::Aws, "docs", "a.pdf").await.unwrap().session_id;
        let slot = service.store.get(&id).unwrap();
        let guard = slot.write().await.unwrap();

        let cleanup = tokio::spawn({
            let service = Arc::clone(&service);
            let id = id.clone();
            async move { service.cleanup(&id).await }
        });
        tokio::task::yield_now().await;
        let apply = tokio::spawn({
            let service = Arc::clone(&service);
            let id = id.clone();
            async move {
                let options = ApplyOptions::default();
                let rects = vec![RedactionRectangle::new(1, 0.1, 0.1, 0.2, 0.05)];
                service.apply(&id, rects, &options).await
            }
        });
        tokio::task::yield_now().await;
        drop(guard);

        cleanup.await.unwrap().unwrap();
        let err = apply.await.unwrap().unwrap_err();
        assert!(matches!(err, RedactionError::SessionNotFoundOrExpired { .. }));
        assert_eq!(service.active_sessions(), 0);
    }
}
