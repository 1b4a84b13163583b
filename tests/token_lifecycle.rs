use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokengate::api::RateLimitPolicy;
use tokengate::application_impl::JwtConfig;
use tokengate::application_port::AuthError;
use tokengate::domain_model::{TokenKind, UserId};
use tokengate::domain_port::{Clock, KvError, KvStore};
use tokengate::infra_memory::{ManualClock, MemoryKvStore};
use tokengate::server::Server;
use warp::http::header::AUTHORIZATION;
use warp::http::{HeaderMap, HeaderValue};

const ACCESS_TTL: Duration = Duration::from_secs(60 * 60);
const REFRESH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

fn jwt_config() -> JwtConfig {
    JwtConfig {
        issuer: "tokengate".to_string(),
        audience: "tokengate-tests".to_string(),
        access_ttl: ACCESS_TTL,
        refresh_ttl: REFRESH_TTL,
        leeway: Duration::ZERO,
        signing_key: b"lifecycle-test-secret".to_vec(),
    }
}

fn policy(limit: u32) -> RateLimitPolicy {
    RateLimitPolicy {
        action: "api_call".to_string(),
        limit,
        window: Duration::from_secs(60),
    }
}

fn server_with(limit: u32) -> (Server, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(MemoryKvStore::with_clock(clock.clone()));
    let server = Server::from_parts(store, clock.clone(), jwt_config(), "auth", policy(limit));
    (server, clock)
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

#[tokio::test]
async fn issued_pair_validates_for_its_owner() {
    let (server, clock) = server_with(10);
    let user_id = UserId::new_random();

    let pair = server.token_manager.issue_pair(user_id).await.unwrap();
    let access = server.token_manager.validate(&pair.access_token.0).await.unwrap();
    let refresh = server.token_manager.validate(&pair.refresh_token.0).await.unwrap();

    assert_eq!(access.sub, user_id);
    assert_eq!(access.token_type, TokenKind::Access);
    assert_eq!(refresh.sub, user_id);
    assert_eq!(refresh.token_type, TokenKind::Refresh);
    assert_ne!(access.jti, refresh.jti);

    let now = clock.now().timestamp();
    assert_eq!(pair.access_token_expires_at.timestamp(), now + ACCESS_TTL.as_secs() as i64);
    assert_eq!(pair.refresh_token_expires_at.timestamp(), now + REFRESH_TTL.as_secs() as i64);
}

#[tokio::test]
async fn version_bump_revokes_every_outstanding_token() {
    let (server, _clock) = server_with(10);
    let user_id = UserId::new_random();
    let first = server.token_manager.issue_pair(user_id).await.unwrap();
    let second = server.token_manager.issue_pair(user_id).await.unwrap();

    let version = server.token_manager.invalidate_all(user_id).await.unwrap();
    assert_eq!(version, 1);

    for token in [
        &first.access_token.0,
        &first.refresh_token.0,
        &second.access_token.0,
        &second.refresh_token.0,
    ] {
        assert!(matches!(
            server.token_manager.validate(token).await,
            Err(AuthError::StaleVersion)
        ));
    }

    let fresh = server.token_manager.issue_pair(user_id).await.unwrap();
    let claims = server.token_manager.validate(&fresh.access_token.0).await.unwrap();
    assert_eq!(claims.token_version, 1);
}

#[tokio::test]
async fn version_bump_is_scoped_to_one_user() {
    let (server, _clock) = server_with(10);
    let alice = UserId::new_random();
    let bob = UserId::new_random();
    let bobs = server.token_manager.issue_pair(bob).await.unwrap();

    server.token_manager.invalidate_all(alice).await.unwrap();

    assert!(server.token_manager.validate(&bobs.access_token.0).await.is_ok());
}

#[tokio::test]
async fn refresh_token_is_single_use() {
    let (server, _clock) = server_with(10);
    let user_id = UserId::new_random();
    let pair = server.token_manager.issue_pair(user_id).await.unwrap();

    let rotated = server.token_manager.refresh(&pair.refresh_token.0).await.unwrap();
    assert!(server.token_manager.validate(&rotated.access_token.0).await.is_ok());

    assert!(matches!(
        server.token_manager.refresh(&pair.refresh_token.0).await,
        Err(AuthError::RefreshAlreadyConsumed)
    ));
}

#[tokio::test]
async fn concurrent_refresh_has_exactly_one_winner() {
    let (server, _clock) = server_with(10);
    let server = Arc::new(server);
    let pair = server.token_manager.issue_pair(UserId::new_random()).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let server = server.clone();
        let token = pair.refresh_token.0.clone();
        tasks.push(tokio::spawn(async move {
            server.token_manager.refresh(&token).await
        }));
    }

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => winners += 1,
            Err(AuthError::RefreshAlreadyConsumed) => {}
            Err(e) => panic!("unexpected refresh failure: {:?}", e),
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn access_token_cannot_be_used_to_refresh() {
    let (server, _clock) = server_with(10);
    let pair = server.token_manager.issue_pair(UserId::new_random()).await.unwrap();

    assert!(matches!(
        server.token_manager.refresh(&pair.access_token.0).await,
        Err(AuthError::WrongTokenKind)
    ));
}

#[tokio::test]
async fn blacklisting_one_token_leaves_its_sibling_valid() {
    let (server, _clock) = server_with(10);
    let user_id = UserId::new_random();
    let a = server.token_manager.issue_pair(user_id).await.unwrap();
    let b = server.token_manager.issue_pair(user_id).await.unwrap();

    server.token_manager.invalidate(&a.access_token.0).await.unwrap();

    assert!(matches!(
        server.token_manager.validate(&a.access_token.0).await,
        Err(AuthError::Blacklisted)
    ));
    assert!(server.token_manager.validate(&b.access_token.0).await.is_ok());
    assert!(server.token_manager.validate(&a.refresh_token.0).await.is_ok());
}

#[tokio::test]
async fn invalidating_a_dead_token_is_rejected() {
    let (server, _clock) = server_with(10);
    let pair = server.token_manager.issue_pair(UserId::new_random()).await.unwrap();
    server.token_manager.invalidate(&pair.access_token.0).await.unwrap();

    assert!(matches!(
        server.token_manager.invalidate(&pair.access_token.0).await,
        Err(AuthError::Blacklisted)
    ));
    assert!(matches!(
        server.token_manager.invalidate("not-a-token").await,
        Err(AuthError::InvalidSignature)
    ));
}

#[tokio::test]
async fn tokens_expire_with_the_clock() {
    let (server, clock) = server_with(10);
    let pair = server.token_manager.issue_pair(UserId::new_random()).await.unwrap();

    clock.advance(ACCESS_TTL - Duration::from_secs(1));
    assert!(server.token_manager.validate(&pair.access_token.0).await.is_ok());

    clock.advance(Duration::from_secs(1));
    assert!(matches!(
        server.token_manager.validate(&pair.access_token.0).await,
        Err(AuthError::Expired)
    ));
    assert!(server.token_manager.validate(&pair.refresh_token.0).await.is_ok());

    clock.advance(REFRESH_TTL);
    assert!(matches!(
        server.token_manager.refresh(&pair.refresh_token.0).await,
        Err(AuthError::Expired)
    ));
}

#[tokio::test]
async fn gate_resolves_the_caller_from_an_access_token() {
    let (server, _clock) = server_with(10);
    let user_id = UserId::new_random();
    let pair = server.token_manager.issue_pair(user_id).await.unwrap();

    let resolved = server
        .auth_gate
        .authenticate(&bearer(&pair.access_token.0))
        .await
        .unwrap();
    assert_eq!(resolved, user_id);
}

#[tokio::test]
async fn gate_rejects_refresh_tokens_and_bad_headers() {
    let (server, _clock) = server_with(10);
    let pair = server.token_manager.issue_pair(UserId::new_random()).await.unwrap();

    assert!(matches!(
        server.auth_gate.authenticate(&bearer(&pair.refresh_token.0)).await,
        Err(AuthError::WrongTokenKind)
    ));

    let mut wrong_scheme = HeaderMap::new();
    wrong_scheme.insert(AUTHORIZATION, HeaderValue::from_static("Token xyz"));
    assert!(matches!(
        server.auth_gate.authenticate(&wrong_scheme).await,
        Err(AuthError::MalformedRequest)
    ));
    assert!(matches!(
        server.auth_gate.authenticate(&HeaderMap::new()).await,
        Err(AuthError::MalformedRequest)
    ));
}

#[tokio::test]
async fn rate_limit_allows_exactly_the_limit_per_window() {
    let (server, clock) = server_with(3);
    let user_id = UserId::new_random();
    let pair = server.token_manager.issue_pair(user_id).await.unwrap();
    let headers = bearer(&pair.access_token.0);

    for _ in 0..3 {
        assert_eq!(
            server.auth_gate.identify(&headers, &server.rate_limit).await.unwrap(),
            user_id
        );
    }
    assert!(matches!(
        server.auth_gate.identify(&headers, &server.rate_limit).await,
        Err(AuthError::RateLimitExceeded)
    ));

    clock.advance(server.rate_limit.window);
    assert!(server.auth_gate.identify(&headers, &server.rate_limit).await.is_ok());
}

#[tokio::test]
async fn rate_limits_are_counted_per_action() {
    let (server, _clock) = server_with(1);
    let user_id = UserId::new_random();
    let window = Duration::from_secs(60);

    assert!(server.auth_gate.enforce_rate_limit(user_id, "api_call", 1, window).await.unwrap());
    assert!(!server.auth_gate.enforce_rate_limit(user_id, "api_call", 1, window).await.unwrap());
    assert!(server.auth_gate.enforce_rate_limit(user_id, "upload", 1, window).await.unwrap());
}

struct UnreachableStore;

#[async_trait]
impl KvStore for UnreachableStore {
    async fn get(&self, _key: &str) -> Result<String, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
    async fn set_if_absent(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<bool, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
    async fn delete(&self, _key: &str) -> Result<bool, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
    async fn exists(&self, _key: &str) -> Result<bool, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
    async fn increment(&self, _key: &str) -> Result<i64, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
    async fn increment_with_expiry(&self, _key: &str, _ttl: Duration) -> Result<i64, KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
    async fn set_expiry(&self, _key: &str, _ttl: Duration) -> Result<(), KvError> {
        Err(KvError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn store_outage_fails_closed() {
    // Tokens signed by a healthy instance sharing the same key.
    let (healthy, clock) = server_with(10);
    let pair = healthy.token_manager.issue_pair(UserId::new_random()).await.unwrap();

    let degraded = Server::from_parts(
        Arc::new(UnreachableStore),
        clock.clone(),
        jwt_config(),
        "auth",
        policy(10),
    );

    assert!(matches!(
        degraded.token_manager.validate(&pair.access_token.0).await,
        Err(AuthError::StoreUnavailable(_))
    ));
    assert!(matches!(
        degraded.auth_gate.authenticate(&bearer(&pair.access_token.0)).await,
        Err(AuthError::StoreUnavailable(_))
    ));
    assert!(matches!(
        degraded.token_manager.issue_pair(UserId::new_random()).await,
        Err(AuthError::StoreUnavailable(_))
    ));
}

/// Memory store whose standalone expiry writes always fail.
struct ExpiryWritesFail(MemoryKvStore);

#[async_trait]
impl KvStore for ExpiryWritesFail {
    async fn get(&self, key: &str) -> Result<String, KvError> {
        self.0.get(key).await
    }
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        self.0.set(key, value, ttl).await
    }
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, KvError> {
        self.0.set_if_absent(key, value, ttl).await
    }
    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        self.0.delete(key).await
    }
    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        self.0.exists(key).await
    }
    async fn increment(&self, key: &str) -> Result<i64, KvError> {
        self.0.increment(key).await
    }
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        self.0.increment_with_expiry(key, ttl).await
    }
    async fn set_expiry(&self, _key: &str, _ttl: Duration) -> Result<(), KvError> {
        Err(KvError::Unavailable("timed out".to_string()))
    }
}

#[tokio::test]
async fn rate_limit_window_does_not_depend_on_a_separate_expiry_write() {
    let clock = Arc::new(ManualClock::default());
    let store = ExpiryWritesFail(MemoryKvStore::with_clock(clock.clone()));
    let server = Server::from_parts(Arc::new(store), clock.clone(), jwt_config(), "auth", policy(2));
    let user_id = UserId::new_random();
    let pair = server.token_manager.issue_pair(user_id).await.unwrap();
    let headers = bearer(&pair.access_token.0);

    for _ in 0..2 {
        assert!(server.auth_gate.identify(&headers, &server.rate_limit).await.is_ok());
    }
    assert!(matches!(
        server.auth_gate.identify(&headers, &server.rate_limit).await,
        Err(AuthError::RateLimitExceeded)
    ));

    clock.advance(server.rate_limit.window);
    assert_eq!(
        server.auth_gate.identify(&headers, &server.rate_limit).await.unwrap(),
        user_id
    );
}
