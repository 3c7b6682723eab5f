//! Timeout wrapper producing a labelled [`Error::Timeout`].

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::{Error, Result};

/// Run `operation` with a ceiling of `ceiling`.
///
/// On expiry the operation future is dropped, which cancels it and releases
/// whatever it held, and `Error::Timeout { label, ceiling }` is returned. The
/// deadline is checked before the operation, so an operation finishing exactly
/// at the ceiling counts as timed out.
pub async fn with_timeout<T, F>(operation: F, ceiling: Duration, label: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let deadline = tokio::time::sleep(ceiling);
    tokio::pin!(deadline);
    tokio::pin!(operation);

    tokio::select! {
        biased;
        _ = &mut deadline => {
            warn!(label, ceiling_ms = ceiling.as_millis() as u64, "{label} timed out");
            Err(Error::timeout(label, ceiling))
        }
        result = &mut operation => result,
    }
}
