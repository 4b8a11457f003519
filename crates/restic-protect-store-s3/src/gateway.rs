// crates/restic-protect-store-s3/src/gateway.rs
// ============================================================================
// Module: S3 Gateway
// Description: Object-store gateway over aws-sdk-s3.
// Purpose: Object-lock check, listing, and retention calls with blocking I/O.
// Dependencies: aws-config, aws-sdk-s3, restic-protect-core, tokio
// ============================================================================

//! ## Overview
//! The gateway is built once per run from the repository location and the
//! resolved credential. It issues exactly four S3 operations:
//! `GetObjectLockConfiguration`, `ListObjectsV2`, `PutObjectRetention`, and
//! `GetObjectRetention`. Listings are paged lazily with continuation tokens.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::types::ObjectLockConfiguration;
use aws_sdk_s3::types::ObjectLockEnabled;
use aws_sdk_s3::types::ObjectLockRetention;
use restic_protect_core::Credential;
use restic_protect_core::GatewayError;
use restic_protect_core::ObjectEntry;
use restic_protect_core::ObjectListing;
use restic_protect_core::ObjectStoreGateway;
use restic_protect_core::RepositoryLocation;
use restic_protect_core::RetentionRecord;
use restic_protect_core::StorageKey;
use restic_protect_core::listing_entry_name;
use tokio::runtime::Runtime;

use crate::blocking::block_on_with_runtime;
use crate::blocking::build_runtime;
use crate::convert::ErrorDetails;
use crate::convert::classify;
use crate::convert::from_sdk_datetime;
use crate::convert::from_sdk_mode;
use crate::convert::to_sdk_datetime;
use crate::convert::to_sdk_mode;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Provider label attached to static SDK credentials.
const CREDENTIAL_PROVIDER_NAME: &str = "restic-protect";
/// Listing delimiter for non-recursive listings.
const LISTING_DELIMITER: &str = "/";

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// S3-compatible object-store gateway.
pub struct S3Gateway {
    /// Underlying S3 client.
    client: Client,
    /// Tokio runtime for blocking S3 operations.
    runtime: Option<Arc<Runtime>>,
}

impl Drop for S3Gateway {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            let _ = std::thread::spawn(move || drop(runtime));
        }
    }
}

impl S3Gateway {
    /// Builds a gateway for the location's endpoint and region.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::StoreUnavailable`] when the runtime cannot be
    /// created.
    pub fn connect(
        location: &RepositoryLocation,
        credential: &Credential,
    ) -> Result<Self, GatewayError> {
        let runtime = build_runtime().map_err(|cause| unavailable("connect", cause))?;
        let region = location.region().to_string();
        let endpoint = location.endpoint_url();
        let credentials = Credentials::new(
            credential.access_key_id(),
            credential.secret_access_key(),
            credential.session_token().map(str::to_string),
            None,
            CREDENTIAL_PROVIDER_NAME,
        );
        let shared_config = block_on_with_runtime(&runtime, async move {
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region))
                .endpoint_url(endpoint)
                .credentials_provider(credentials)
                .load()
                .await
        })
        .map_err(|cause| unavailable("connect", cause))?;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config).force_path_style(true);
        Ok(Self {
            client: Client::from_conf(s3_config.build()),
            runtime: Some(Arc::new(runtime)),
        })
    }

    /// Returns the runtime or an error if shut down.
    fn runtime(&self) -> Result<&Runtime, GatewayError> {
        self.runtime
            .as_ref()
            .map(AsRef::as_ref)
            .ok_or_else(|| unavailable("runtime", "object store runtime closed"))
    }

    /// Fetches one listing page.
    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
        continuation: Option<String>,
    ) -> Result<ListingPage, GatewayError> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        block_on_with_runtime(self.runtime()?, async move {
            let mut request = client.list_objects_v2().bucket(bucket).prefix(prefix);
            if !recursive {
                request = request.delimiter(LISTING_DELIMITER);
            }
            if let Some(token) = continuation {
                request = request.continuation_token(token);
            }
            let output = request
                .send()
                .await
                .map_err(|err| classify("list_objects_v2", &ErrorDetails::from_sdk(&err)))?;
            let entries = output
                .contents()
                .iter()
                .filter_map(|object| {
                    let key = object.key()?;
                    Some(ObjectEntry {
                        key: key.to_string(),
                        size: object.size().and_then(|size| u64::try_from(size).ok()),
                        last_modified: object
                            .last_modified()
                            .and_then(|value| from_sdk_datetime(value).ok()),
                    })
                })
                .collect();
            let next = if output.is_truncated().unwrap_or(false) {
                output.next_continuation_token().map(str::to_string)
            } else {
                None
            };
            Ok(ListingPage {
                entries,
                next,
            })
        })
        .map_err(|cause| unavailable("list_objects_v2", cause))?
    }
}

impl ObjectStoreGateway for S3Gateway {
    fn check_object_lock_enabled(&self, bucket: &str) -> Result<bool, GatewayError> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        block_on_with_runtime(self.runtime()?, async move {
            let output = match client.get_object_lock_configuration().bucket(&bucket).send().await
            {
                Ok(output) => output,
                Err(err) => {
                    let details = ErrorDetails::from_sdk(&err);
                    if details.is_object_lock_missing() {
                        return Err(GatewayError::ObjectLockUnavailable {
                            bucket,
                            reason: details.reason(),
                        });
                    }
                    return Err(classify("get_object_lock_configuration", &details));
                }
            };
            lock_enabled(&bucket, output.object_lock_configuration())
        })
        .map_err(|cause| unavailable("get_object_lock_configuration", cause))?
    }

    fn list_objects<'a>(
        &'a self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> ObjectListing<'a> {
        let bucket = bucket.to_string();
        let listing_prefix = prefix.to_string();
        Box::new(PagedListing::new(prefix, move |continuation| {
            self.list_page(&bucket, &listing_prefix, recursive, continuation)
        }))
    }

    fn put_retention(
        &self,
        bucket: &str,
        key: &StorageKey,
        record: &RetentionRecord,
        governance_bypass: bool,
    ) -> Result<(), GatewayError> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();
        let retention = ObjectLockRetention::builder()
            .mode(to_sdk_mode(record.mode))
            .retain_until_date(to_sdk_datetime(record.retain_until))
            .build();
        block_on_with_runtime(self.runtime()?, async move {
            client
                .put_object_retention()
                .bucket(bucket)
                .key(key)
                .retention(retention)
                .bypass_governance_retention(governance_bypass)
                .send()
                .await
                .map_err(|err| classify("put_object_retention", &ErrorDetails::from_sdk(&err)))?;
            Ok(())
        })
        .map_err(|cause| unavailable("put_object_retention", cause))?
    }

    fn get_retention(
        &self,
        bucket: &str,
        key: &StorageKey,
    ) -> Result<RetentionRecord, GatewayError> {
        let client = self.client.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();
        block_on_with_runtime(self.runtime()?, async move {
            let output = client
                .get_object_retention()
                .bucket(bucket)
                .key(&key)
                .send()
                .await
                .map_err(|err| classify("get_object_retention", &ErrorDetails::from_sdk(&err)))?;
            retention_record(&key, output.retention())
        })
        .map_err(|cause| unavailable("get_object_retention", cause))?
    }
}

// ============================================================================
// SECTION: Listing
// ============================================================================

/// One page of listing results.
pub(crate) struct ListingPage {
    /// Entries in store order.
    pub(crate) entries: Vec<ObjectEntry>,
    /// Continuation token for the next page.
    pub(crate) next: Option<String>,
}

/// Lazy paginated listing over a page-fetch function.
///
/// `fetch` receives the continuation token of the previous page (`None` for
/// the first request). Entries whose name relative to the prefix is empty,
/// such as directory markers, are skipped. The first error ends the listing.
pub(crate) struct PagedListing<F> {
    /// Page-fetch function.
    fetch: F,
    /// Listing prefix.
    prefix: String,
    /// Token for the next page.
    continuation: Option<String>,
    /// Entries fetched but not yet yielded.
    buffer: VecDeque<ObjectEntry>,
    /// No further pages will be requested.
    exhausted: bool,
}

impl<F> PagedListing<F>
where
    F: FnMut(Option<String>) -> Result<ListingPage, GatewayError>,
{
    /// Creates a listing that has not fetched any page yet.
    pub(crate) fn new(prefix: impl Into<String>, fetch: F) -> Self {
        Self {
            fetch,
            prefix: prefix.into(),
            continuation: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl<F> Iterator for PagedListing<F>
where
    F: FnMut(Option<String>) -> Result<ListingPage, GatewayError>,
{
    type Item = Result<ObjectEntry, GatewayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while let Some(entry) = self.buffer.pop_front() {
                if listing_entry_name(&self.prefix, &entry.key).is_some() {
                    return Some(Ok(entry));
                }
            }
            if self.exhausted {
                return None;
            }
            match (self.fetch)(self.continuation.take()) {
                Ok(page) => {
                    self.exhausted = page.next.is_none();
                    self.continuation = page.next;
                    self.buffer.extend(page.entries);
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Response Readers
// ============================================================================

/// Reads the enabled flag from a bucket's object-lock configuration.
///
/// A response without any configuration is reported as unavailable; a
/// configuration that is present but not `Enabled` yields `false`.
pub(crate) fn lock_enabled(
    bucket: &str,
    configuration: Option<&ObjectLockConfiguration>,
) -> Result<bool, GatewayError> {
    let configuration = configuration.ok_or_else(|| GatewayError::ObjectLockUnavailable {
        bucket: bucket.to_string(),
        reason: "object lock configuration not found".to_string(),
    })?;
    Ok(configuration.object_lock_enabled() == Some(&ObjectLockEnabled::Enabled))
}

/// Converts a retention read-back into a core record.
pub(crate) fn retention_record(
    key: &str,
    retention: Option<&ObjectLockRetention>,
) -> Result<RetentionRecord, GatewayError> {
    let retention = retention
        .ok_or_else(|| unavailable("get_object_retention", format!("{key}: no retention")))?;
    let mode = retention.mode().and_then(from_sdk_mode).ok_or_else(|| {
        unavailable("get_object_retention", format!("{key}: unknown retention mode"))
    })?;
    let retain_until = retention
        .retain_until_date()
        .ok_or_else(|| unavailable("get_object_retention", format!("{key}: no retain-until date")))
        .and_then(|value| {
            from_sdk_datetime(value).map_err(|cause| unavailable("get_object_retention", cause))
        })?;
    Ok(RetentionRecord {
        mode,
        retain_until,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a store-unavailable error.
fn unavailable(operation: &'static str, cause: impl Into<String>) -> GatewayError {
    GatewayError::StoreUnavailable {
        operation,
        cause: cause.into(),
    }
}
