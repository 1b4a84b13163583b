use crate::application_port::AuthError;
use crate::domain_model::{TokenClaims, TokenPair, UserId};

#[async_trait::async_trait]
pub trait TokenManager: Send + Sync {
    /// Signs a fresh access/refresh pair and registers both with the
    /// security manager. No pair is returned unless both records were written.
    async fn issue_pair(&self, user_id: UserId) -> Result<TokenPair, AuthError>;

    async fn validate(&self, token: &str) -> Result<TokenClaims, AuthError>;

    /// Single-use rotation of a refresh token into a new pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;

    /// Revokes one token for the rest of its lifetime.
    async fn invalidate(&self, token: &str) -> Result<(), AuthError>;

    /// Revokes every token issued to `user_id`. Returns the new version.
    async fn invalidate_all(&self, user_id: UserId) -> Result<i64, AuthError>;
}
