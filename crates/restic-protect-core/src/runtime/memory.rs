// crates/restic-protect-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Object Store
// Description: Call-recording object-store gateway backed by a BTreeMap.
// Purpose: Deterministic gateway for workflow tests and dry local runs.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryObjectStore`] models one S3-compatible store: per-bucket
//! object-lock state, objects with optional retention records, and the
//! governance rule that a lock cannot be shortened without bypass. Every
//! gateway call is appended to a log so tests can assert ordering and the
//! absence of calls.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::ObjectEntry;
use crate::core::RetentionMode;
use crate::core::RetentionRecord;
use crate::core::StorageKey;
use crate::core::listing_entry_name;
use crate::interfaces::GatewayError;
use crate::interfaces::ObjectListing;
use crate::interfaces::ObjectStoreGateway;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Bucket object-lock configuration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectLockState {
    /// Configuration present and enabled.
    Enabled,
    /// Configuration present but not enabled.
    Disabled,
    /// No configuration on the bucket.
    Missing,
}

/// A recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `check_object_lock_enabled`.
    CheckObjectLock {
        /// Bucket name.
        bucket: String,
    },
    /// `list_objects`.
    ListObjects {
        /// Bucket name.
        bucket: String,
        /// Listing prefix.
        prefix: String,
        /// Recursive flag.
        recursive: bool,
    },
    /// `put_retention`.
    PutRetention {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Submitted record.
        record: RetentionRecord,
        /// Governance bypass flag.
        governance_bypass: bool,
    },
    /// `get_retention`.
    GetRetention {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
    },
}

impl GatewayCall {
    /// Returns true for calls other than the object-lock check.
    #[must_use]
    pub const fn touches_objects(&self) -> bool {
        !matches!(self, Self::CheckObjectLock { .. })
    }
}

/// Mutable store state.
#[derive(Debug, Default)]
struct MemoryState {
    /// Object-lock state per bucket; absent buckets report `Missing`.
    buckets: BTreeMap<String, ObjectLockState>,
    /// Objects keyed by (bucket, key) with their current retention.
    objects: BTreeMap<(String, String), Option<RetentionRecord>>,
    /// Injected put failures by key.
    put_failures: BTreeMap<String, GatewayError>,
    /// Injected read-back overrides by key.
    readback_overrides: BTreeMap<String, RetentionRecord>,
    /// Injected listing failure: items yielded before the error.
    listing_failure: Option<(usize, GatewayError)>,
    /// Call log in order.
    calls: Vec<GatewayCall>,
}

/// In-memory gateway that records every call.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    /// Guarded store state.
    state: Mutex<MemoryState>,
}

// ============================================================================
// SECTION: Setup
// ============================================================================

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bucket with the given object-lock state.
    #[must_use]
    pub fn with_bucket(self, bucket: &str, lock: ObjectLockState) -> Self {
        self.update(|state| {
            state.buckets.insert(bucket.to_string(), lock);
        });
        self
    }

    /// Adds an unlocked object.
    #[must_use]
    pub fn with_object(self, bucket: &str, key: &str) -> Self {
        self.update(|state| {
            state.objects.insert((bucket.to_string(), key.to_string()), None);
        });
        self
    }

    /// Adds several unlocked objects.
    #[must_use]
    pub fn with_objects<'k>(self, bucket: &str, keys: impl IntoIterator<Item = &'k str>) -> Self {
        keys.into_iter().fold(self, |store, key| store.with_object(bucket, key))
    }

    /// Makes `put_retention` fail for a key.
    #[must_use]
    pub fn failing_put(self, key: &str, error: GatewayError) -> Self {
        self.update(|state| {
            state.put_failures.insert(key.to_string(), error);
        });
        self
    }

    /// Makes `get_retention` report `record` for a key regardless of writes.
    #[must_use]
    pub fn overriding_readback(self, key: &str, record: RetentionRecord) -> Self {
        self.update(|state| {
            state.readback_overrides.insert(key.to_string(), record);
        });
        self
    }

    /// Makes listings fail after yielding `after` entries.
    #[must_use]
    pub fn failing_listing(self, after: usize, error: GatewayError) -> Self {
        self.update(|state| state.listing_failure = Some((after, error)));
        self
    }

    /// Returns the call log.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().map(|state| state.calls.clone()).unwrap_or_default()
    }

    /// Returns the current retention of an object.
    #[must_use]
    pub fn retention(&self, bucket: &str, key: &str) -> Option<RetentionRecord> {
        self.state()
            .ok()
            .and_then(|state| state.objects.get(&(bucket.to_string(), key.to_string())).copied())
            .flatten()
    }

    /// Applies a setup mutation, ignoring a poisoned lock.
    fn update(&self, mutate: impl FnOnce(&mut MemoryState)) {
        if let Ok(mut state) = self.state.lock() {
            mutate(&mut state);
        }
    }

    /// Locks the state.
    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, GatewayError> {
        self.state.lock().map_err(|_| GatewayError::StoreUnavailable {
            operation: "memory_store",
            cause: "object store lock poisoned".to_string(),
        })
    }
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

impl ObjectStoreGateway for InMemoryObjectStore {
    fn check_object_lock_enabled(&self, bucket: &str) -> Result<bool, GatewayError> {
        let mut state = self.state()?;
        state.calls.push(GatewayCall::CheckObjectLock {
            bucket: bucket.to_string(),
        });
        match state.buckets.get(bucket).copied().unwrap_or(ObjectLockState::Missing) {
            ObjectLockState::Enabled => Ok(true),
            ObjectLockState::Disabled => Ok(false),
            ObjectLockState::Missing => Err(GatewayError::ObjectLockUnavailable {
                bucket: bucket.to_string(),
                reason: "object lock configuration not found".to_string(),
            }),
        }
    }

    fn list_objects<'a>(
        &'a self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> ObjectListing<'a> {
        let mut state = match self.state() {
            Ok(state) => state,
            Err(err) => return Box::new(std::iter::once(Err(err))),
        };
        state.calls.push(GatewayCall::ListObjects {
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            recursive,
        });
        let mut items: Vec<Result<ObjectEntry, GatewayError>> = state
            .objects
            .keys()
            .filter(|(object_bucket, key)| object_bucket == bucket && key.starts_with(prefix))
            .filter_map(|(_, key)| {
                let name = listing_entry_name(prefix, key)?;
                (recursive || !name.contains('/')).then(|| Ok(ObjectEntry::from_key(key.clone())))
            })
            .collect();
        if let Some((after, err)) = state.listing_failure.clone() {
            items.truncate(after);
            items.push(Err(err));
        }
        Box::new(items.into_iter())
    }

    fn put_retention(
        &self,
        bucket: &str,
        key: &StorageKey,
        record: &RetentionRecord,
        governance_bypass: bool,
    ) -> Result<(), GatewayError> {
        let mut state = self.state()?;
        state.calls.push(GatewayCall::PutRetention {
            bucket: bucket.to_string(),
            key: key.to_string(),
            record: *record,
            governance_bypass,
        });
        if let Some(err) = state.put_failures.get(key.as_str()) {
            return Err(err.clone());
        }
        let slot = state
            .objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| GatewayError::StoreUnavailable {
                operation: "put_object_retention",
                cause: format!("NoSuchKey: {key}"),
            })?;
        if let Some(existing) = slot {
            let shortening = existing.retain_until > record.retain_until;
            let locked = existing.mode == RetentionMode::Compliance || !governance_bypass;
            if shortening && locked {
                return Err(GatewayError::AccessDenied {
                    operation: "put_object_retention",
                    message: format!("cannot shorten retention of {key}"),
                });
            }
        }
        *slot = Some(*record);
        Ok(())
    }

    fn get_retention(
        &self,
        bucket: &str,
        key: &StorageKey,
    ) -> Result<RetentionRecord, GatewayError> {
        let mut state = self.state()?;
        state.calls.push(GatewayCall::GetRetention {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        if let Some(record) = state.readback_overrides.get(key.as_str()) {
            return Ok(*record);
        }
        state.objects.get(&(bucket.to_string(), key.to_string())).copied().flatten().ok_or_else(
            || GatewayError::StoreUnavailable {
                operation: "get_object_retention",
                cause: format!("NoSuchObjectLockConfiguration: {key}"),
            },
        )
    }
}
