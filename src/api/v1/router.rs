use super::error::*;
use super::handler;
use crate::api::{AuthGate, RateLimitPolicy};
use crate::domain_model::UserId;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::HeaderMap;
use warp::{Filter, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let refresh = warp::path("token")
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.token_manager.clone()))
        .and_then(handler::refresh_token);

    let sign_out = warp::path("sign_out")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::header::headers_cloned())
        .and(with(server.token_manager.clone()))
        .and_then(handler::sign_out);

    let sign_out_all = warp::path("sign_out_all")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_identity(
            server.auth_gate.clone(),
            server.rate_limit.clone(),
        ))
        .and(with(server.token_manager.clone()))
        .and_then(handler::sign_out_all);

    let session = warp::path("session")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_identity(
            server.auth_gate.clone(),
            server.rate_limit.clone(),
        ))
        .and_then(handler::session);

    refresh.or(sign_out).or(sign_out_all).or(session)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

/// Resolves the authenticated, rate-limited caller for downstream filters.
pub fn with_identity(
    gate: Arc<AuthGate>,
    policy: RateLimitPolicy,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::header::headers_cloned().and_then(move |headers: HeaderMap| {
        let gate = gate.clone();
        let policy = policy.clone();
        async move {
            gate.identify(&headers, &policy)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)
        }
    })
}
