use thiserror::Error;

pub type SeelResult<T> = Result<T, SeelError>;

/// Opaque cause of a backend or local-store failure, kept for logging.
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SeelError {
    /// The platform could not perform a required cryptographic operation.
    #[error("crypto unavailable: {0}")]
    CryptoUnavailable(String),

    /// AEAD tag mismatch: tampered ciphertext or wrong content key.
    #[error("decryption failed: ciphertext was tampered with or the key is wrong")]
    DecryptionFailed,

    /// The wrapped key was not encrypted to the active key pair.
    #[error("key unwrap failed: {0}")]
    UnwrapFailed(String),

    #[error("no manifest pointer is stored on this device")]
    PointerMissing,

    #[error("manifest {cid} could not be retrieved from the backend")]
    ManifestUnreachable {
        cid: String,
        #[source]
        source: BoxedCause,
    },

    #[error("manifest {cid} is corrupt: {reason}")]
    ManifestCorrupt { cid: String, reason: String },

    /// The manifest belongs to a different key pair than the active one.
    #[error("manifest public key does not match the active key pair")]
    IdentityMismatch,

    /// Keys without a pointer, or an unreadable key record.
    #[error("corrupt local state: {0}")]
    CorruptLocalState(String),

    #[error("invalid sync payload: {0}")]
    InvalidSyncPayload(String),

    #[error("not logged in: no active key pair on this device")]
    NotLoggedIn,

    /// The pointer kept moving while publishing; the mutation was not applied.
    #[error("manifest publish lost the pointer race {attempts} times")]
    PublishConflict { attempts: u32 },

    #[error("backend failure: {context}")]
    BackendFailure {
        context: String,
        #[source]
        source: BoxedCause,
    },

    /// Stored bytes no longer hash to their content identifier.
    #[error("content {cid} failed its integrity check (hashes to b3-{actual})")]
    IntegrityMismatch { cid: String, actual: String },

    #[error("local store error: {context}")]
    LocalStore {
        context: String,
        #[source]
        source: BoxedCause,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SeelError {
    pub fn backend(context: impl Into<String>, source: impl Into<BoxedCause>) -> Self {
        SeelError::BackendFailure {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn local_store(context: impl Into<String>, source: impl Into<BoxedCause>) -> Self {
        SeelError::LocalStore {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Whether calling the same operation again can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SeelError::BackendFailure { .. }
                | SeelError::ManifestUnreachable { .. }
                | SeelError::PublishConflict { .. }
        )
    }
}
