// crates/restic-protect-core/src/runtime/applier.rs
// ============================================================================
// Module: Retention Applier
// Description: Locks each storage key and confirms the lock by read-back.
// Purpose: Drive the gateway sequentially through put/get retention pairs.
// Dependencies: crate::core, crate::interfaces, time
// ============================================================================

//! ## Overview
//! Keys are processed strictly in order, one at a time. Each key is written
//! with the requested retention record and immediately read back; the
//! confirmed record must carry the same mode and a retain-until no earlier
//! than requested.
//!
//! [`RetentionApplier::apply_all`] stops at the first failure. The returned
//! [`ApplyError`] carries the receipts already confirmed and the keys never
//! attempted, so callers can report exactly what is and is not locked.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::LockReceipt;
use crate::core::LockReport;
use crate::core::RetentionPolicy;
use crate::core::RetentionRecord;
use crate::core::StorageKey;
use crate::interfaces::GatewayError;
use crate::interfaces::ObjectStoreGateway;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure while locking a single key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyLockError {
    /// Gateway call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Read-back did not honor the requested record.
    #[error(
        "retention not confirmed for {key}: requested {} until {}, store reports {} until {}",
        .requested.mode,
        .requested.retain_until_rfc3339(),
        .confirmed.mode,
        .confirmed.retain_until_rfc3339()
    )]
    RetentionNotConfirmed {
        /// Key that was checked.
        key: StorageKey,
        /// Record submitted.
        requested: RetentionRecord,
        /// Record read back.
        confirmed: RetentionRecord,
    },
}

/// Aborted batch: the failing key plus what was and was not locked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("locking {failed_key} failed: {source}")]
pub struct ApplyError {
    /// Receipts for keys confirmed before the failure.
    pub locked: Vec<LockReceipt>,
    /// Key whose lock failed.
    pub failed_key: StorageKey,
    /// Keys never attempted, in order.
    pub pending: Vec<StorageKey>,
    /// Underlying failure.
    #[source]
    pub source: Box<KeyLockError>,
}

// ============================================================================
// SECTION: Applier
// ============================================================================

/// Applies a retention policy through an object-store gateway.
pub struct RetentionApplier<'a, G: ObjectStoreGateway + ?Sized> {
    /// Gateway used for every call.
    gateway: &'a G,
    /// Bucket holding the repository.
    bucket: &'a str,
    /// Policy to apply.
    policy: RetentionPolicy,
}

impl ApplyError {
    /// Number of keys left unlocked, the failed key included.
    #[must_use]
    pub fn unlocked_count(&self) -> usize {
        self.pending.len() + 1
    }
}

impl<'a, G: ObjectStoreGateway + ?Sized> RetentionApplier<'a, G> {
    /// Creates an applier for a bucket.
    #[must_use]
    pub const fn new(gateway: &'a G, bucket: &'a str, policy: RetentionPolicy) -> Self {
        Self {
            gateway,
            bucket,
            policy,
        }
    }

    /// Locks one key with `requested` and confirms it by read-back.
    ///
    /// # Errors
    ///
    /// Returns [`KeyLockError`] when a gateway call fails or the read-back
    /// does not honor the request.
    pub fn apply_one(
        &self,
        key: &StorageKey,
        requested: &RetentionRecord,
    ) -> Result<LockReceipt, KeyLockError> {
        self.gateway.put_retention(self.bucket, key, requested, self.policy.governance_bypass)?;
        let confirmed = self.gateway.get_retention(self.bucket, key)?;
        if !confirmed.satisfies(requested) {
            return Err(KeyLockError::RetentionNotConfirmed {
                key: key.clone(),
                requested: *requested,
                confirmed,
            });
        }
        Ok(LockReceipt {
            key: key.clone(),
            requested: *requested,
            confirmed,
        })
    }

    /// Locks every key in order, reporting each receipt to `observer`.
    ///
    /// The requested record is computed once from `now` and shared by all
    /// keys in the batch.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError`] at the first failing key.
    pub fn apply_all<F>(
        &self,
        keys: &[StorageKey],
        now: OffsetDateTime,
        mut observer: F,
    ) -> Result<LockReport, ApplyError>
    where
        F: FnMut(&LockReceipt),
    {
        let requested = self.policy.requested_record(now);
        let mut report = LockReport::default();
        for (index, key) in keys.iter().enumerate() {
            match self.apply_one(key, &requested) {
                Ok(receipt) => {
                    observer(&receipt);
                    report.receipts.push(receipt);
                }
                Err(source) => {
                    return Err(ApplyError {
                        locked: report.receipts,
                        failed_key: key.clone(),
                        pending: keys[index + 1 ..].to_vec(),
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(report)
    }
}
