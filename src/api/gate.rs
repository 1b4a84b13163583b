use crate::application_port::*;
use crate::domain_model::{TokenKind, UserId};
use std::sync::Arc;
use std::time::Duration;
use warp::http::HeaderMap;
use warp::http::header::AUTHORIZATION;

#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub action: String,
    pub limit: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        RateLimitPolicy {
            action: "api_call".to_string(),
            limit: 1000,
            window: Duration::from_secs(60 * 60),
        }
    }
}

/// Resolves the caller of an inbound request.
pub struct AuthGate {
    token_manager: Arc<dyn TokenManager>,
    security_manager: Arc<dyn SecurityManager>,
}

impl AuthGate {
    pub fn new(
        token_manager: Arc<dyn TokenManager>,
        security_manager: Arc<dyn SecurityManager>,
    ) -> Self {
        AuthGate {
            token_manager,
            security_manager,
        }
    }

    /// `Authorization: Bearer <token>`; anything else is a rejection.
    pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MalformedRequest)?
            .to_str()
            .map_err(|_| AuthError::MalformedRequest)?;
        let (scheme, token) = value
            .trim_start()
            .split_once(' ')
            .ok_or(AuthError::MalformedRequest)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::MalformedRequest);
        }
        let token = token.trim();
        if token.is_empty() || token.contains(char::is_whitespace) {
            return Err(AuthError::MalformedRequest);
        }
        Ok(token)
    }

    /// Only access tokens authenticate requests.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<UserId, AuthError> {
        let token = Self::extract_bearer_token(headers)?;
        let claims = self.token_manager.validate(token).await?;
        if claims.token_type != TokenKind::Access {
            return Err(AuthError::WrongTokenKind);
        }
        Ok(claims.sub)
    }

    pub async fn enforce_rate_limit(
        &self,
        user_id: UserId,
        action: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, AuthError> {
        self.security_manager
            .check_rate_limit(user_id, action, limit, window)
            .await
    }

    /// Authenticates, then charges the call against `policy`.
    pub async fn identify(
        &self,
        headers: &HeaderMap,
        policy: &RateLimitPolicy,
    ) -> Result<UserId, AuthError> {
        let user_id = self.authenticate(headers).await?;
        if !self
            .enforce_rate_limit(user_id, &policy.action, policy.limit, policy.window)
            .await?
        {
            return Err(AuthError::RateLimitExceeded);
        }
        Ok(user_id)
    }
}
