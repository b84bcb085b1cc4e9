//! Cancellation for externally-bound work.
//!
//! Every network call, file read and cache access runs through
//! [`cancellable`], which drops the in-flight future as soon as the
//! caller's [`CancellationToken`] fires. Dropping a `reqwest` or
//! `tokio::fs` future aborts the underlying operation.

use std::future::Future;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Race `fut` against `token`.
///
/// An already-cancelled token wins without polling `fut`.
pub async fn cancellable<F>(token: &CancellationToken, fut: F) -> Result<F::Output, Cancelled>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Cancelled),
        out = fut => Ok(out),
    }
}
