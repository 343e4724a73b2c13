//! AWS Secrets Manager client with a process-lifetime cache.
//!
//! Each secret name is fetched at most once per process and is read-only
//! afterwards. There is no TTL and no rotation support: a running process
//! keeps the value it saw first, and unsynchronized concurrent reads are
//! safe once a value is cached.
//!
//! # Example
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let jwt_secret = secret_cache::fetch("prod/jwt/signing-key").await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;

use aws_config::BehaviorVersion;
use aws_sdk_secretsmanager::Client as SecretsClient;
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("Access denied to secret: {0}")]
    AccessDenied(String),

    #[error("Secret decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid secret format: {0}")]
    InvalidFormat(String),

    #[error("AWS SDK error: {0}")]
    AwsSdk(String),
}

/// Secrets Manager client holding every secret this process has resolved.
pub struct SecretStore {
    client: SecretsClient,
    cache: RwLock<HashMap<String, String>>,
}

impl SecretStore {
    /// Create a store using the default AWS credential chain
    /// (environment, shared credentials file, instance profile, IRSA).
    pub async fn new() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = SecretsClient::new(&config);

        info!("Initialized Secrets Manager client (fetch-once cache)");

        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get a secret by name.
    ///
    /// The first caller fetches from AWS and populates the cache; every
    /// later caller reads the cached value for the rest of the process
    /// lifetime.
    pub async fn get(&self, secret_name: &str) -> Result<String, SecretError> {
        if let Some(cached) = self.cache.read().await.get(secret_name) {
            debug!(secret_name = %secret_name, "Secret retrieved from cache");
            return Ok(cached.clone());
        }

        let value = self.fetch(secret_name).await?;

        // Concurrent first fetches may race here; both resolve the same
        // name, so last-write-wins is harmless.
        self.cache
            .write()
            .await
            .insert(secret_name.to_string(), value.clone());

        info!(secret_name = %secret_name, "Secret fetched and cached");

        Ok(value)
    }

    async fn fetch(&self, secret_name: &str) -> Result<String, SecretError> {
        debug!(secret_name = %secret_name, "Fetching secret from AWS Secrets Manager");

        let response = self
            .client
            .get_secret_value()
            .secret_id(secret_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(secret_name, &e.to_string()))?;

        response
            .secret_string()
            .map(str::to_string)
            .ok_or_else(|| SecretError::InvalidFormat("Secret is binary, not string".to_string()))
    }
}

static GLOBAL_STORE: OnceCell<SecretStore> = OnceCell::const_new();

/// Fetch a secret through the process-wide store, initializing it on first
/// use.
pub async fn fetch(secret_name: &str) -> Result<String, SecretError> {
    let store = GLOBAL_STORE.get_or_init(SecretStore::new).await;
    store.get(secret_name).await
}

fn classify_sdk_error(secret_name: &str, message: &str) -> SecretError {
    if message.contains("ResourceNotFoundException") {
        SecretError::NotFound(secret_name.to_string())
    } else if message.contains("AccessDeniedException") {
        SecretError::AccessDenied(secret_name.to_string())
    } else if message.contains("DecryptionFailure") {
        SecretError::DecryptionFailed(secret_name.to_string())
    } else {
        SecretError::AwsSdk(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = classify_sdk_error("prod/jwt", "service error: ResourceNotFoundException");
        assert!(matches!(err, SecretError::NotFound(name) if name == "prod/jwt"));
    }

    #[test]
    fn test_classify_access_denied() {
        let err = classify_sdk_error("prod/jwt", "AccessDeniedException: no kms:Decrypt");
        assert!(matches!(err, SecretError::AccessDenied(_)));
    }

    #[test]
    fn test_classify_decryption_failure() {
        let err = classify_sdk_error("prod/jwt", "DecryptionFailure: key disabled");
        assert!(matches!(err, SecretError::DecryptionFailed(_)));
    }

    #[test]
    fn test_classify_other_errors_as_sdk() {
        let err = classify_sdk_error("prod/jwt", "dispatch failure: timeout");
        assert!(matches!(err, SecretError::AwsSdk(msg) if msg.contains("timeout")));
    }
}
