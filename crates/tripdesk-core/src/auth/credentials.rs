use async_trait::async_trait;

/// Supplies the bearer token for backend requests.
///
/// Returning `None` is not an error: it means "not signed in yet" and the
/// request is sent unauthenticated.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn token(&self) -> Option<String>;
}

/// A credential source that always returns the same token.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    /// A source that never has a token.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl CredentialSource for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.clone()
    }
}
