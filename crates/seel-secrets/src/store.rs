use async_trait::async_trait;
use seel_core::SeelResult;

/// Device-local, access-controlled key/value storage.
///
/// Implementations must make `put` atomic per key: a reader sees either the
/// previous record or the new one, never a mix.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn put(&self, key: &str, record: &[u8]) -> SeelResult<()>;

    /// `None` when the key was never written or has been deleted.
    async fn get(&self, key: &str) -> SeelResult<Option<Vec<u8>>>;

    /// Idempotent.
    async fn delete(&self, key: &str) -> SeelResult<()>;

    /// Short backend name for logs and `status`.
    fn describe(&self) -> String;
}
