//! OpenDAL Operator factory for seel blob backends

use opendal::Operator;
use seel_core::config::{expand_tilde, BackendKind, StorageConfig};
use seel_core::{SeelError, SeelResult};

use crate::health::check_health;

/// S3 credentials, read from the environment
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl S3Credentials {
    /// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`, with `SEEL_S3_*` fallbacks.
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .or_else(|_| std::env::var("SEEL_S3_ACCESS_KEY"))
            .ok()
            .filter(|k| !k.is_empty())?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .or_else(|_| std::env::var("SEEL_S3_SECRET_KEY"))
            .unwrap_or_default();
        Some(Self {
            access_key_id,
            secret_access_key,
        })
    }
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Build an operator for the configured backend. For S3 this uses the first
/// endpoint; see `connect` for fallback across endpoints.
pub fn build_operator(config: &StorageConfig) -> SeelResult<Operator> {
    match config.backend {
        BackendKind::Memory => finish(opendal::services::Memory::default()),
        BackendKind::Fs => {
            let root = expand_tilde(&config.root);
            finish(opendal::services::Fs::default().root(&root.to_string_lossy()))
        }
        BackendKind::S3 => {
            let endpoint = config
                .endpoint
                .first()
                .ok_or_else(|| SeelError::Config("storage.endpoint is empty".into()))?;
            build_s3_operator(endpoint, config, S3Credentials::from_env().as_ref())
        }
    }
}

/// Build an operator for an S3-compatible endpoint.
///
/// If `enforce_tls` is true and the endpoint uses HTTP, this returns an error.
/// Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_s3_operator(
    endpoint: &str,
    config: &StorageConfig,
    creds: Option<&S3Credentials>,
) -> SeelResult<Operator> {
    if endpoint.starts_with("http://") {
        if config.enforce_tls {
            return Err(SeelError::Config(format!(
                "S3 endpoint uses plaintext HTTP ({endpoint}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development."
            )));
        }
        tracing::warn!(
            endpoint,
            "S3 endpoint uses plaintext HTTP; set storage.enforce_tls = true and use HTTPS in production"
        );
    }

    // Path-style addressing is the opendal default, which SeaweedFS and MinIO need.
    let mut builder = opendal::services::S3::default()
        .endpoint(endpoint)
        .region(&config.region)
        .bucket(&config.bucket);
    match creds {
        Some(creds) => {
            builder = builder
                .access_key_id(&creds.access_key_id)
                .secret_access_key(&creds.secret_access_key);
        }
        None => tracing::warn!(endpoint, "no S3 credentials in the environment"),
    }

    finish(builder)
}

fn finish(builder: impl opendal::Builder) -> SeelResult<Operator> {
    let op = Operator::new(builder)
        .map_err(|e| SeelError::Config(format!("creating OpenDAL operator: {e}")))?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();
    Ok(op)
}

/// Build an operator and confirm it is reachable.
///
/// With several S3 endpoints configured, each is tried in order and the
/// first one passing the health check wins.
pub async fn connect(config: &StorageConfig) -> SeelResult<Operator> {
    if config.backend != BackendKind::S3 {
        let op = build_operator(config)?;
        check_health(&op).await?;
        return Ok(op);
    }

    let creds = S3Credentials::from_env();
    let mut last_err = SeelError::Config("storage.endpoint is empty".into());
    for endpoint in config.endpoint.iter() {
        let attempt = match build_s3_operator(endpoint, config, creds.as_ref()) {
            Ok(op) => check_health(&op).await.map(|_| op),
            Err(e) => Err(e),
        };
        match attempt {
            Ok(op) => {
                tracing::info!(endpoint = %endpoint, "connected to storage");
                return Ok(op);
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, "storage endpoint unavailable: {e}");
                last_err = e;
            }
        }
    }
    Err(last_err)
}
