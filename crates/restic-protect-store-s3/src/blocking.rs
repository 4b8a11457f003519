// crates/restic-protect-store-s3/src/blocking.rs
// ============================================================================
// Module: Blocking Runtime Helpers
// Description: Drives SDK futures from synchronous call sites.
// Purpose: Own a current-thread runtime and block on it safely.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! The gateway and the instance-metadata provider are synchronous; these
//! helpers bridge them onto tokio.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;

use tokio::runtime::Builder;
use tokio::runtime::Handle;
use tokio::runtime::Runtime;
use tokio::runtime::RuntimeFlavor;

// ============================================================================
// SECTION: Runtime Helpers
// ============================================================================

/// Builds the private current-thread runtime.
pub(crate) fn build_runtime() -> Result<Runtime, String> {
    Builder::new_current_thread().enable_all().build().map_err(|err| err.to_string())
}

/// Blocks on a future using a compatible runtime.
///
/// Inside an existing multi-thread runtime the caller's worker is handed off
/// with `block_in_place`; inside a current-thread runtime the future runs on
/// a helper thread with its own runtime.
pub(crate) fn block_on_with_runtime<F, T>(runtime: &Runtime, future: F) -> Result<T, String>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        if matches!(handle.runtime_flavor(), RuntimeFlavor::MultiThread) {
            return Ok(tokio::task::block_in_place(|| handle.block_on(future)));
        }
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        std::thread::spawn(move || {
            let result = build_runtime().map(|runtime| runtime.block_on(future));
            let _ = tx.send(result);
        });
        return rx.recv().unwrap_or_else(|_| Err("runtime helper thread join failed".to_string()));
    }

    Ok(runtime.block_on(future))
}
