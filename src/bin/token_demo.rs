/// Walks through the token lifecycle against the in-memory store:
/// sign-in, authenticated call, refresh rotation, sign-out, and
/// "log out everywhere".
///
/// $ cargo run --bin token_demo
use std::sync::Arc;
use std::time::Duration;
use tokengate::api::RateLimitPolicy;
use tokengate::application_impl::JwtConfig;
use tokengate::domain_model::UserId;
use tokengate::domain_port::SystemClock;
use tokengate::infra_memory::MemoryKvStore;
use tokengate::logger::*;
use tokengate::server::Server;
use warp::http::header::AUTHORIZATION;
use warp::http::{HeaderMap, HeaderValue};

fn bearer(token: &str) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", token))?);
    Ok(headers)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    logger.reload_from_config(&LogConfig {
        filter: "tokengate=debug".to_string(),
        format: LogFormat::Pretty,
    })?;

    let server = Server::from_parts(
        Arc::new(MemoryKvStore::new()),
        Arc::new(SystemClock),
        JwtConfig {
            issuer: "tokengate".to_string(),
            audience: "token-demo".to_string(),
            access_ttl: Duration::from_secs(60 * 60),
            refresh_ttl: Duration::from_secs(24 * 60 * 60),
            leeway: Duration::ZERO,
            signing_key: b"token-demo-secret".to_vec(),
        },
        "demo",
        RateLimitPolicy {
            action: "api_call".to_string(),
            limit: 3,
            window: Duration::from_secs(60),
        },
    );
    let user_id = UserId::new_random();

    let pair = server.token_manager.issue_pair(user_id).await?;
    println!("issued pair, access expires at {}", pair.access_token_expires_at);

    let headers = bearer(&pair.access_token.0)?;
    for attempt in 1..=4 {
        let outcome = server.auth_gate.identify(&headers, &server.rate_limit).await;
        println!("call {}: {:?}", attempt, outcome);
    }

    let rotated = server.token_manager.refresh(&pair.refresh_token.0).await?;
    println!("refresh rotated the pair");
    let replay = server.token_manager.refresh(&pair.refresh_token.0).await;
    println!("replaying the old refresh token: {:?}", replay);

    server.token_manager.invalidate(&rotated.access_token.0).await?;
    println!(
        "after sign-out: {:?}",
        server.token_manager.validate(&rotated.access_token.0).await
    );

    let fresh = server.token_manager.issue_pair(user_id).await?;
    let version = server.token_manager.invalidate_all(user_id).await?;
    println!(
        "after global sign-out (version {}): {:?}",
        version,
        server.token_manager.validate(&fresh.refresh_token.0).await
    );

    Ok(())
}
