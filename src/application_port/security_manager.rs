use crate::application_port::AuthError;
use crate::domain_model::{TokenId, UserId};
use std::time::Duration;

/// Owner of all revocation state: version counters, blacklist, refresh and
/// session records, and rate-limit counters.
///
/// Store failures come back as errors; no method reports "allowed" or
/// "valid" when it could not reach the store.
#[async_trait::async_trait]
pub trait SecurityManager: Send + Sync {
    /// Idempotent. A zero `remaining` is a no-op since the token already expired.
    async fn blacklist_token(&self, token_id: &TokenId, remaining: Duration)
    -> Result<(), AuthError>;
    async fn is_blacklisted(&self, token_id: &TokenId) -> Result<bool, AuthError>;

    /// Invalidates every token issued to `user_id` so far.
    async fn bump_user_token_version(&self, user_id: UserId) -> Result<i64, AuthError>;
    /// `0` when no bump is on record.
    async fn current_user_token_version(&self, user_id: UserId) -> Result<i64, AuthError>;

    async fn record_refresh_token(
        &self,
        user_id: UserId,
        token_id: &TokenId,
        ttl: Duration,
    ) -> Result<(), AuthError>;
    async fn is_refresh_token_valid(
        &self,
        user_id: UserId,
        token_id: &TokenId,
    ) -> Result<bool, AuthError>;
    /// Returns `true` only for the call that actually removed the record.
    async fn revoke_refresh_token(
        &self,
        user_id: UserId,
        token_id: &TokenId,
    ) -> Result<bool, AuthError>;

    async fn record_session_token(
        &self,
        access_token_id: &TokenId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), AuthError>;
    async fn resolve_session_token(
        &self,
        access_token_id: &TokenId,
    ) -> Result<Option<UserId>, AuthError>;
    async fn revoke_session_token(&self, access_token_id: &TokenId) -> Result<bool, AuthError>;

    /// Fixed window: the first call in a window starts it, every call counts.
    async fn check_rate_limit(
        &self,
        user_id: UserId,
        action: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, AuthError>;
}
