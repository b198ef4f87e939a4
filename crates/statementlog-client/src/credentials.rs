//! Credential resolution for the discovery store.
//!
//! The writer itself never reads credentials; callers that also talk to the
//! discovery store resolve its connection string through a
//! [`CredentialResolver`]. The default implementation reads an environment
//! variable and fails fast when it is missing.

use crate::error::{ClientError, Result};
use async_trait::async_trait;

/// Environment variable holding the discovery store connection string.
pub const CONNECTION_URI_VAR: &str = "DISCOVERY_STORE_CONNECTION_URI";

#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve_connection_string(&self) -> Result<String>;
}

/// Reads the connection string from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvCredentialResolver {
    var: String,
}

impl EnvCredentialResolver {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl Default for EnvCredentialResolver {
    fn default() -> Self {
        Self::new(CONNECTION_URI_VAR)
    }
}

#[async_trait]
impl CredentialResolver for EnvCredentialResolver {
    async fn resolve_connection_string(&self) -> Result<String> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ClientError::MissingCredential(self.var.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_var() {
        assert_eq!(EnvCredentialResolver::default().var(), CONNECTION_URI_VAR);
    }

    #[tokio::test]
    async fn test_resolves_set_variable() {
        std::env::set_var("STATEMENTLOG_TEST_URI_SET", "postgres://localhost/discovery");
        let resolver = EnvCredentialResolver::new("STATEMENTLOG_TEST_URI_SET");
        assert_eq!(
            resolver.resolve_connection_string().await.unwrap(),
            "postgres://localhost/discovery"
        );
    }

    #[tokio::test]
    async fn test_missing_variable_fails() {
        let resolver = EnvCredentialResolver::new("STATEMENTLOG_TEST_URI_UNSET");
        let err = resolver.resolve_connection_string().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing STATEMENTLOG_TEST_URI_UNSET env variable; aborting."
        );
    }

    #[tokio::test]
    async fn test_empty_variable_fails() {
        std::env::set_var("STATEMENTLOG_TEST_URI_EMPTY", "");
        let resolver = EnvCredentialResolver::new("STATEMENTLOG_TEST_URI_EMPTY");
        assert!(matches!(
            resolver.resolve_connection_string().await,
            Err(ClientError::MissingCredential(_))
        ));
    }
}
