//! Identity/session provider
//!
//! Yields the opaque bearer credential every mutation requires. The engine
//! never inspects the token; it only checks that one exists and passes it on
//! to the persistence service.

use async_trait::async_trait;

/// Opaque bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Current credential, or `None` when no session is active
    async fn credential(&self) -> Option<Credential>;
}

/// Fixed credential (or none), for tests and the CLI
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    credential: Option<Credential>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credential: Some(Credential::new(token)),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn credential(&self) -> Option<Credential> {
        self.credential.clone()
    }
}

/// Reads the token from an environment variable on every call
#[derive(Debug, Clone)]
pub struct EnvSessionProvider {
    var: String,
}

impl EnvSessionProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

#[async_trait]
impl SessionProvider for EnvSessionProvider {
    async fn credential(&self) -> Option<Credential> {
        std::env::var(&self.var)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(Credential::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn anonymous_session_has_no_credential() {
        assert!(StaticSession::anonymous().credential().await.is_none());
        assert_eq!(
            StaticSession::new("abc").credential().await.unwrap().token(),
            "abc"
        );
    }

    #[tokio::test]
    async fn env_provider_ignores_blank_token() {
        let provider = EnvSessionProvider::new("CAP_TABLE_TEST_BLANK_TOKEN");
        std::env::set_var(provider.var(), "  ");
        assert!(provider.credential().await.is_none());
        std::env::set_var(provider.var(), "token-1");
        assert_eq!(provider.credential().await.unwrap().token(), "token-1");
        std::env::remove_var(provider.var());
    }

    #[test]
    fn debug_never_prints_token() {
        assert_eq!(format!("{:?}", Credential::new("secret")), "Credential(***)");
    }
}
