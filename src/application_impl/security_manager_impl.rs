use crate::application_port::*;
use crate::domain_model::{TokenId, UserId};
use crate::domain_port::*;
use crate::logger::*;
use std::sync::Arc;
use std::time::Duration;

const BLACKLIST_MARKER: &str = "blacklisted";
const REFRESH_MARKER: &str = "valid";

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Namespace prepended to every key, e.g. `auth`. Empty for none.
    pub key_prefix: String,
    /// Lifetime of a version counter after a bump. Must cover the longest token TTL.
    pub version_ttl: Duration,
}

pub struct KvSecurityManager {
    store: Arc<dyn KvStore>,
    cfg: SecurityConfig,
}

impl KvSecurityManager {
    pub fn new(store: Arc<dyn KvStore>, cfg: SecurityConfig) -> Self {
        KvSecurityManager { store, cfg }
    }

    fn key(&self, rest: String) -> String {
        if self.cfg.key_prefix.is_empty() {
            rest
        } else {
            format!("{}:{}", self.cfg.key_prefix, rest)
        }
    }

    fn version_key(&self, user_id: UserId) -> String {
        self.key(format!("user:token_version:{}", user_id))
    }

    fn blacklist_key(&self, token_id: &TokenId) -> String {
        self.key(format!("blacklist:token:{}", token_id))
    }

    fn refresh_key(&self, user_id: UserId, token_id: &TokenId) -> String {
        self.key(format!("refresh_token:{}:{}", user_id, token_id))
    }

    fn session_key(&self, token_id: &TokenId) -> String {
        self.key(format!("session:token:{}", token_id))
    }

    fn rate_limit_key(&self, action: &str, user_id: UserId) -> String {
        self.key(format!("rate_limit:{}:{}", action, user_id))
    }
}

#[async_trait::async_trait]
impl SecurityManager for KvSecurityManager {
    async fn blacklist_token(
        &self,
        token_id: &TokenId,
        remaining: Duration,
    ) -> Result<(), AuthError> {
        if remaining.is_zero() {
            return Ok(());
        }
        let key = self.blacklist_key(token_id);
        let fresh = self
            .store
            .set_if_absent(&key, BLACKLIST_MARKER, remaining)
            .await?;
        debug!(%token_id, fresh, "token blacklisted");
        Ok(())
    }

    async fn is_blacklisted(&self, token_id: &TokenId) -> Result<bool, AuthError> {
        Ok(self.store.exists(&self.blacklist_key(token_id)).await?)
    }

    async fn bump_user_token_version(&self, user_id: UserId) -> Result<i64, AuthError> {
        let key = self.version_key(user_id);
        let version = self.store.increment(&key).await?;
        self.store.set_expiry(&key, self.cfg.version_ttl).await?;
        info!(%user_id, version, "user token version bumped");
        Ok(version)
    }

    async fn current_user_token_version(&self, user_id: UserId) -> Result<i64, AuthError> {
        let key = self.version_key(user_id);
        match self.store.get(&key).await {
            Ok(raw) => raw.parse::<i64>().map_err(|e| {
                AuthError::InternalError(format!("token version at {}: {}", key, e))
            }),
            Err(KvError::NotFound) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    async fn record_refresh_token(
        &self,
        user_id: UserId,
        token_id: &TokenId,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let key = self.refresh_key(user_id, token_id);
        self.store.set(&key, REFRESH_MARKER, ttl).await?;
        Ok(())
    }

    async fn is_refresh_token_valid(
        &self,
        user_id: UserId,
        token_id: &TokenId,
    ) -> Result<bool, AuthError> {
        Ok(self.store.exists(&self.refresh_key(user_id, token_id)).await?)
    }

    async fn revoke_refresh_token(
        &self,
        user_id: UserId,
        token_id: &TokenId,
    ) -> Result<bool, AuthError> {
        Ok(self.store.delete(&self.refresh_key(user_id, token_id)).await?)
    }

    async fn record_session_token(
        &self,
        access_token_id: &TokenId,
        user_id: UserId,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let key = self.session_key(access_token_id);
        self.store.set(&key, &user_id.to_string(), ttl).await?;
        Ok(())
    }

    async fn resolve_session_token(
        &self,
        access_token_id: &TokenId,
    ) -> Result<Option<UserId>, AuthError> {
        let key = self.session_key(access_token_id);
        match self.store.get(&key).await {
            Ok(raw) => raw.parse::<UserId>().map(Some).map_err(|e| {
                AuthError::InternalError(format!("session owner at {}: {}", key, e))
            }),
            Err(KvError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn revoke_session_token(&self, access_token_id: &TokenId) -> Result<bool, AuthError> {
        Ok(self.store.delete(&self.session_key(access_token_id)).await?)
    }

    async fn check_rate_limit(
        &self,
        user_id: UserId,
        action: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, AuthError> {
        let key = self.rate_limit_key(action, user_id);
        let count = self.store.increment_with_expiry(&key, window).await?;
        let allowed = count <= i64::from(limit);
        if !allowed {
            warn!(%user_id, action, count, limit, "rate limit exceeded");
        }
        Ok(allowed)
    }
}
