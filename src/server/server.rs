use crate::api::{AuthGate, RateLimitPolicy};
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;

const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct Server {
    pub token_manager: Arc<dyn TokenManager>,
    pub security_manager: Arc<dyn SecurityManager>,
    pub auth_gate: Arc<AuthGate>,
    pub rate_limit: RateLimitPolicy,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(settings.store.timeout_ms);
        let store: Arc<dyn KvStore> = match settings.store.backend.as_str() {
            "memory" => {
                warn!("memory store selected; revocation state is lost on restart");
                let store = Arc::new(MemoryKvStore::new());
                store.spawn_sweeper(MEMORY_SWEEP_INTERVAL);
                store
            }
            "redis" => Arc::new(RedisKvStore::connect(&settings.store.redis_url, timeout).await?),
            other => return Err(anyhow!("Unknown store backend: {}", other)),
        };

        let jwt = JwtConfig {
            issuer: settings.auth.issuer.clone(),
            audience: settings.auth.audience.clone(),
            access_ttl: settings.auth.access_ttl(),
            refresh_ttl: settings.auth.refresh_ttl(),
            leeway: settings.auth.leeway(),
            signing_key: settings.auth.signing_key()?,
        };
        let rate_limit = RateLimitPolicy {
            action: settings.rate_limit.action.clone(),
            limit: settings.rate_limit.limit,
            window: Duration::from_secs(settings.rate_limit.window_secs),
        };

        Ok(Self::from_parts(
            store,
            Arc::new(SystemClock),
            jwt,
            &settings.store.key_prefix,
            rate_limit,
        ))
    }

    /// Wires the services around an already-built store and clock.
    pub fn from_parts(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        jwt: JwtConfig,
        key_prefix: &str,
        rate_limit: RateLimitPolicy,
    ) -> Self {
        let security_manager: Arc<dyn SecurityManager> = Arc::new(KvSecurityManager::new(
            store,
            SecurityConfig {
                key_prefix: key_prefix.to_string(),
                version_ttl: jwt.longest_ttl(),
            },
        ));
        info!(?jwt, ?rate_limit, "auth services configured");

        let token_manager: Arc<dyn TokenManager> =
            Arc::new(JwtTokenManager::new(security_manager.clone(), clock, jwt));
        let auth_gate = Arc::new(AuthGate::new(
            token_manager.clone(),
            security_manager.clone(),
        ));

        Self {
            token_manager,
            security_manager,
            auth_gate,
            rate_limit,
        }
    }
}
