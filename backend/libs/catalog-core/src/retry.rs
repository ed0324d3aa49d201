use std::future::Future;
use tracing::warn;

/// Retries a read operation exactly once on failure. Reads against the store
/// and cache are the only calls that get a second attempt; writes are either
/// required (surfaced) or fire-and-forget (logged).
pub async fn retry_read_once<T, E, F, Fut>(op_name: &str, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!("{} failed, retrying once: {}", op_name, err);
            op().await
        }
    }
}
