use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::Clock;
use crate::logger::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Grace applied to `exp` and `nbf`. Store records outlive `exp` by the
    /// same amount. Zero unless configured.
    pub leeway: Duration,
    pub signing_key: Vec<u8>,
}

impl JwtConfig {
    /// How long any issued token can still validate, leeway included.
    pub fn longest_ttl(&self) -> Duration {
        self.access_ttl
            .max(self.refresh_ttl)
            .saturating_add(self.leeway)
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("leeway", &self.leeway)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

pub struct JwtTokenManager {
    security: Arc<dyn SecurityManager>,
    clock: Arc<dyn Clock>,
    cfg: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenManager {
    pub fn new(security: Arc<dyn SecurityManager>, clock: Arc<dyn Clock>, cfg: JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // exp/nbf are checked against the injected clock in `check`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss", "aud"]);
        validation.set_issuer(&[&cfg.issuer]);
        validation.set_audience(&[&cfg.audience]);

        JwtTokenManager {
            security,
            clock,
            encoding_key: EncodingKey::from_secret(&cfg.signing_key),
            decoding_key: DecodingKey::from_secret(&cfg.signing_key),
            validation,
            cfg,
        }
    }

    fn ttl_of(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.cfg.access_ttl,
            TokenKind::Refresh => self.cfg.refresh_ttl,
        }
    }

    /// Lifetime of the store record backing a token of `kind`.
    fn record_ttl(&self, kind: TokenKind) -> Duration {
        self.ttl_of(kind).saturating_add(self.cfg.leeway)
    }

    fn sign(
        &self,
        user_id: UserId,
        token_id: TokenId,
        token_version: i64,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let issued_at = now.timestamp();
        let ttl_secs = i64::try_from(self.ttl_of(kind).as_secs())
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        let exp = issued_at.saturating_add(ttl_secs);
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::InternalError(format!("expiry out of range: {}", exp)))?;

        let claims = TokenClaims {
            sub: user_id,
            jti: token_id,
            token_version,
            token_type: kind,
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
            iat: issued_at,
            nbf: issued_at,
            exp,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(e.to_string()))?;
        Ok((token, expires_at))
    }

    fn decode(&self, token: &str) -> Result<TokenClaims, AuthError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "token failed verification");
                AuthError::InvalidSignature
            })
    }

    fn leeway_secs(&self) -> i64 {
        i64::try_from(self.cfg.leeway.as_secs()).unwrap_or(i64::MAX)
    }

    /// Time left before the token stops validating, leeway included.
    fn remaining_lifetime(&self, claims: &TokenClaims) -> Duration {
        let end_millis = claims
            .exp
            .saturating_add(self.leeway_secs())
            .saturating_mul(1000);
        let left = end_millis.saturating_sub(self.clock.now().timestamp_millis());
        u64::try_from(left)
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO)
    }

    async fn check(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let claims = self.decode(token)?;

        let now = self.clock.now().timestamp();
        let leeway = self.leeway_secs();
        if now >= claims.exp.saturating_add(leeway) {
            return Err(AuthError::Expired);
        }
        if now < claims.nbf.saturating_sub(leeway) {
            return Err(AuthError::NotYetValid);
        }

        if self.security.is_blacklisted(&claims.jti).await? {
            return Err(AuthError::Blacklisted);
        }

        let current = self.security.current_user_token_version(claims.sub).await?;
        if claims.token_version < current {
            return Err(AuthError::StaleVersion);
        }

        match claims.token_type {
            TokenKind::Access => match self.security.resolve_session_token(&claims.jti).await? {
                Some(owner) if owner == claims.sub => {}
                _ => return Err(AuthError::SessionNotLive),
            },
            TokenKind::Refresh => {
                if !self
                    .security
                    .is_refresh_token_valid(claims.sub, &claims.jti)
                    .await?
                {
                    return Err(AuthError::RefreshAlreadyConsumed);
                }
            }
        }

        Ok(claims)
    }
}

#[async_trait::async_trait]
impl TokenManager for JwtTokenManager {
    async fn issue_pair(&self, user_id: UserId) -> Result<TokenPair, AuthError> {
        let version = self.security.current_user_token_version(user_id).await?;
        let now = self.clock.now();
        let access_id = TokenId::generate();
        let refresh_id = TokenId::generate();

        let (access_token, access_exp) =
            self.sign(user_id, access_id, version, TokenKind::Access, now)?;
        let (refresh_token, refresh_exp) =
            self.sign(user_id, refresh_id, version, TokenKind::Refresh, now)?;

        self.security
            .record_session_token(&access_id, user_id, self.record_ttl(TokenKind::Access))
            .await?;
        if let Err(e) = self
            .security
            .record_refresh_token(user_id, &refresh_id, self.record_ttl(TokenKind::Refresh))
            .await
        {
            if let Err(cleanup) = self.security.revoke_session_token(&access_id).await {
                warn!(%user_id, token_id = %access_id, error = %cleanup, "orphaned session record after failed issuance");
            }
            error!(%user_id, error = %e, "token issuance failed");
            return Err(e);
        }

        debug!(%user_id, version, access_id = %access_id, refresh_id = %refresh_id, "token pair issued");
        Ok(TokenPair {
            access_token: AccessToken(access_token),
            refresh_token: RefreshToken(refresh_token),
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }

    async fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.check(token).await.inspect_err(|e| {
            if e.is_credential_rejection() {
                debug!(reason = %e, "token rejected");
            } else {
                error!(error = %e, "token validation aborted");
            }
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.validate(refresh_token).await?;
        if claims.token_type != TokenKind::Refresh {
            return Err(AuthError::WrongTokenKind);
        }

        // Only the caller that deletes the record may rotate.
        if !self
            .security
            .revoke_refresh_token(claims.sub, &claims.jti)
            .await?
        {
            return Err(AuthError::RefreshAlreadyConsumed);
        }
        info!(user_id = %claims.sub, token_id = %claims.jti, "refresh token redeemed");

        self.issue_pair(claims.sub).await
    }

    async fn invalidate(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.validate(token).await?;
        let remaining = self.remaining_lifetime(&claims);
        self.security.blacklist_token(&claims.jti, remaining).await?;

        match claims.token_type {
            TokenKind::Access => {
                self.security.revoke_session_token(&claims.jti).await?;
            }
            TokenKind::Refresh => {
                self.security
                    .revoke_refresh_token(claims.sub, &claims.jti)
                    .await?;
            }
        }
        info!(user_id = %claims.sub, token_id = %claims.jti, kind = %claims.token_type, "token invalidated");
        Ok(())
    }

    async fn invalidate_all(&self, user_id: UserId) -> Result<i64, AuthError> {
        self.security.bump_user_token_version(user_id).await
    }
}
