//! Storage health check

use opendal::Operator;
use seel_core::{SeelError, SeelResult};

/// Verify the storage endpoint is reachable by listing the root
pub async fn check_health(op: &Operator) -> SeelResult<()> {
    op.list("/")
        .await
        .map(|_| ())
        .map_err(|e| SeelError::backend("storage health check", e))
}

/// Returns true if storage is reachable, false otherwise (non-panicking)
pub async fn is_healthy(op: &Operator) -> bool {
    check_health(op).await.is_ok()
}
