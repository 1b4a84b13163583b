use crate::domain_port::KvError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed bearer credentials")]
    MalformedRequest,
    #[error("token signature or format invalid")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("token kind not accepted here")]
    WrongTokenKind,
    #[error("token revoked")]
    Blacklisted,
    #[error("token version outdated")]
    StaleVersion,
    #[error("session not live")]
    SessionNotLive,
    #[error("refresh token already consumed")]
    RefreshAlreadyConsumed,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// True for rejections caused by the credentials themselves, as opposed
    /// to throttling or a failing dependency.
    pub fn is_credential_rejection(&self) -> bool {
        !matches!(
            self,
            AuthError::RateLimitExceeded
                | AuthError::StoreUnavailable(_)
                | AuthError::InternalError(_)
        )
    }
}

impl From<KvError> for AuthError {
    fn from(error: KvError) -> Self {
        match error {
            KvError::Unavailable(e) => AuthError::StoreUnavailable(e),
            KvError::NotFound => AuthError::InternalError("unexpected missing key".to_string()),
            corrupt @ KvError::Corrupt { .. } => AuthError::InternalError(corrupt.to_string()),
        }
    }
}
