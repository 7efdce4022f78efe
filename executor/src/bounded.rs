//! Optional per-call deadline for network calls.

use std::{future::Future, time::Duration};

/// Await `fut`, bounded by `limit` when one is configured. `Err` carries the elapsed limit.
pub async fn bounded<F: Future>(limit: Option<Duration>, fut: F) -> Result<F::Output, Duration> {
    match limit {
        None => Ok(fut.await),
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| limit),
    }
}
