//! Async runtime construction: the node's concurrency width.
//!
//! Built once during bootstrap from `peer.workerThreads`. Command bodies
//! that need async I/O borrow it through the dispatch context.

use std::thread::available_parallelism;

use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::error::AppError;

/// Used when available parallelism cannot be detected.
const DEFAULT_WORKER_THREADS: usize = 4;
const MAX_WORKER_THREADS: usize = 1024;
const THREAD_NAME: &str = "peer-worker";

/// Worker thread count for a configured value; `0` means available cores.
pub fn worker_threads(configured: usize) -> usize {
    if configured > 0 {
        return configured.clamp(1, MAX_WORKER_THREADS);
    }
    available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(DEFAULT_WORKER_THREADS)
}

/// Build the multi-threaded runtime with `threads` workers.
pub fn build(threads: usize) -> Result<Runtime, AppError> {
    let threads = threads.clamp(1, MAX_WORKER_THREADS);
    debug!(worker_threads = threads, "building runtime");

    Builder::new_multi_thread()
        .worker_threads(threads)
        .thread_name(THREAD_NAME)
        .enable_all()
        .build()
        .map_err(|e| AppError::Runtime(format!("failed to initialize runtime: {e}")))
}
