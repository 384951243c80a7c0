//! Chunked upload sessions.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};
use tokio::time::Instant;

use super::error::StorageError;
use super::provider::Provider;
use super::types::{CompletedPart, UploadState, UploadStatus};

/// Highest part number any provider accepts.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Lowercase hex SHA-256.
pub(crate) fn digest_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Parts held by the gateway for providers without a chunk protocol.
#[derive(Debug, Default)]
pub(crate) struct PartBuffer {
    parts: Mutex<BTreeMap<u32, Bytes>>,
}

impl PartBuffer {
    pub(crate) fn insert(&self, part_number: u32, body: Bytes) {
        lock(&self.parts).insert(part_number, body);
    }

    /// Concatenate the listed parts in the order given.
    pub(crate) fn assemble(&self, parts: &[CompletedPart]) -> Result<Bytes, StorageError> {
        let buffered = lock(&self.parts);
        let mut body = BytesMut::new();
        for part in parts {
            let chunk = buffered.get(&part.part_number).ok_or_else(|| {
                StorageError::invalid_part_list(format!(
                    "part {} is not buffered",
                    part.part_number
                ))
            })?;
            body.extend_from_slice(chunk);
        }
        Ok(body.freeze())
    }

    pub(crate) fn clear(&self) {
        lock(&self.parts).clear();
    }
}

/// Provider-side state of an upload.
#[derive(Debug, Clone)]
pub(crate) enum UploadHandle {
    /// Provider A: parts buffered in process until completion.
    Buffered(Arc<PartBuffer>),
    /// Provider B: native multipart upload.
    Multipart { provider_upload_id: String },
    /// Provider C: blocks staged against the target blob.
    Staged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AckedPart {
    pub(crate) token: String,
    pub(crate) size: u64,
}

/// Gateway-side bookkeeping for one chunked upload.
#[derive(Debug)]
pub(crate) struct UploadSession {
    pub(crate) upload_id: String,
    pub(crate) provider: Provider,
    pub(crate) bucket: String,
    pub(crate) key: String,
    pub(crate) content_type: String,
    pub(crate) handle: UploadHandle,
    state: UploadState,
    acknowledged: BTreeMap<u32, AckedPart>,
    in_flight: usize,
    last_activity: Instant,
}

impl UploadSession {
    pub(crate) fn new(
        upload_id: String,
        provider: Provider,
        bucket: &str,
        key: &str,
        content_type: &str,
        handle: UploadHandle,
    ) -> Self {
        Self {
            upload_id,
            provider,
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            handle,
            state: UploadState::Initiated,
            acknowledged: BTreeMap::new(),
            in_flight: 0,
            last_activity: Instant::now(),
        }
    }

    #[cfg(test)]
    pub(crate) const fn state(&self) -> UploadState {
        self.state
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Register a part transfer. Fails while completing or once finished.
    pub(crate) fn begin_part(&mut self, part_number: u32) -> Result<UploadHandle, StorageError> {
        if !(1..=MAX_PART_NUMBER).contains(&part_number) {
            return Err(StorageError::invalid_part_list(format!(
                "part number {part_number} is outside 1..={MAX_PART_NUMBER}"
            )));
        }
        match self.state {
            UploadState::Completing => {
                return Err(StorageError::busy(&self.upload_id, "completion in progress"));
            }
            UploadState::Completed | UploadState::Aborted => {
                return Err(StorageError::upload_not_found(&self.upload_id));
            }
            UploadState::Initiated | UploadState::PartsUploading => {}
        }
        self.in_flight += 1;
        self.touch();
        Ok(self.handle.clone())
    }

    /// Record the outcome of a part transfer.
    pub(crate) fn finish_part(&mut self, part_number: u32, outcome: Option<(&str, u64)>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let Some((token, size)) = outcome {
            self.acknowledged.insert(
                part_number,
                AckedPart {
                    token: token.to_string(),
                    size,
                },
            );
            if self.state == UploadState::Initiated {
                self.state = UploadState::PartsUploading;
            }
        }
        self.touch();
    }

    /// Validate a completion request and move to `Completing`.
    ///
    /// Returns the part list sorted by part number and the assembled size.
    pub(crate) fn begin_complete(
        &mut self,
        bucket: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<(Vec<CompletedPart>, u64), StorageError> {
        match self.state {
            UploadState::Completing => {
                return Err(StorageError::busy(&self.upload_id, "completion in progress"));
            }
            UploadState::Completed | UploadState::Aborted => {
                return Err(StorageError::upload_not_found(&self.upload_id));
            }
            UploadState::Initiated | UploadState::PartsUploading => {}
        }
        if self.in_flight > 0 {
            return Err(StorageError::busy(
                &self.upload_id,
                format!("{} part transfer(s) still running", self.in_flight),
            ));
        }
        if bucket != self.bucket || key != self.key {
            return Err(StorageError::invalid_part_list(format!(
                "upload targets {}/{}, not {bucket}/{key}",
                self.bucket, self.key
            )));
        }
        let ordered = validate_part_list(&self.acknowledged, parts)?;
        let size = ordered
            .iter()
            .filter_map(|p| self.acknowledged.get(&p.part_number))
            .map(|acked| acked.size)
            .sum();
        self.state = UploadState::Completing;
        self.touch();
        Ok((ordered, size))
    }

    /// Return to an uploading state after a failed completion.
    pub(crate) fn fail_complete(&mut self) {
        self.state = if self.acknowledged.is_empty() {
            UploadState::Initiated
        } else {
            UploadState::PartsUploading
        };
        self.touch();
    }

    pub(crate) fn mark_completed(&mut self) {
        self.state = UploadState::Completed;
    }

    /// Move to `Aborted`. Fails while any transfer or completion runs.
    pub(crate) fn begin_abort(&mut self) -> Result<(), StorageError> {
        if self.state == UploadState::Completing {
            return Err(StorageError::busy(&self.upload_id, "completion in progress"));
        }
        if self.in_flight > 0 {
            return Err(StorageError::busy(
                &self.upload_id,
                format!("{} part transfer(s) still running", self.in_flight),
            ));
        }
        self.state = UploadState::Aborted;
        Ok(())
    }

    /// Idle uploads with nothing running are eligible for the sweep.
    pub(crate) fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        self.in_flight == 0
            && self.state != UploadState::Completing
            && now.saturating_duration_since(self.last_activity) >= timeout
    }

    pub(crate) fn status(&self) -> UploadStatus {
        UploadStatus {
            upload_id: self.upload_id.clone(),
            provider: self.provider,
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            content_type: self.content_type.clone(),
            state: self.state,
            parts: self
                .acknowledged
                .iter()
                .map(|(n, acked)| CompletedPart::new(*n, acked.token.clone()))
                .collect(),
            parts_in_flight: self.in_flight,
        }
    }
}

/// Check a completion list against acknowledged parts.
///
/// Every problem is reported; the result is sorted ascending.
pub(crate) fn validate_part_list(
    acknowledged: &BTreeMap<u32, AckedPart>,
    parts: &[CompletedPart],
) -> Result<Vec<CompletedPart>, StorageError> {
    if parts.is_empty() {
        return Err(StorageError::invalid_part_list("part list is empty"));
    }

    let mut problems = Vec::new();
    let mut seen = BTreeSet::new();
    for part in parts {
        if !seen.insert(part.part_number) {
            problems.push(format!("part {} is listed more than once", part.part_number));
            continue;
        }
        match acknowledged.get(&part.part_number) {
            None => problems.push(format!("part {} was never uploaded", part.part_number)),
            Some(acked) if acked.token != part.part_token => {
                problems.push(format!("part {} token does not match", part.part_number));
            }
            Some(_) => {}
        }
    }
    if !problems.is_empty() {
        return Err(StorageError::invalid_part_list(problems.join("; ")));
    }

    let mut ordered = parts.to_vec();
    ordered.sort_by_key(|p| p.part_number);
    Ok(ordered)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Any permutation of the acknowledged parts validates to the same
        // ascending order.
        #[test]
        fn prop_any_permutation_sorts_ascending(
            count in 1u32..40,
            seed in any::<u64>(),
        ) {
            let acked: BTreeMap<u32, AckedPart> = (1..=count)
                .map(|n| (n, AckedPart { token: format!("tag-{n}"), size: u64::from(n) }))
                .collect();
            let mut parts: Vec<CompletedPart> = acked
                .iter()
                .map(|(n, a)| CompletedPart::new(*n, a.token.clone()))
                .collect();
            let len = parts.len();
            for i in 0..len {
                let j = ((seed.rotate_left(i as u32) as usize) ^ i) % len;
                parts.swap(i, j);
            }

            let ordered = validate_part_list(&acked, &parts).unwrap();
            let numbers: Vec<u32> = ordered.iter().map(|p| p.part_number).collect();
            prop_assert_eq!(numbers, (1..=count).collect::<Vec<_>>());
        }

        // A list naming a part that was never acknowledged is always rejected.
        #[test]
        fn prop_unacknowledged_part_rejected(count in 1u32..20, extra in 21u32..10_000) {
            let acked: BTreeMap<u32, AckedPart> = (1..=count)
                .map(|n| (n, AckedPart { token: format!("tag-{n}"), size: u64::from(n) }))
                .collect();
            let mut parts: Vec<CompletedPart> = acked
                .iter()
                .map(|(n, a)| CompletedPart::new(*n, a.token.clone()))
                .collect();
            parts.push(CompletedPart::new(extra, "tag"));
            prop_assert!(validate_part_list(&acked, &parts).is_err());
        }
    }
}
