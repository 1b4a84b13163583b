use super::error::*;
use crate::api::AuthGate;
use crate::application_port::*;
use crate::domain_model::{TokenPair, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::HeaderMap;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub auth_tokens: TokenPair,
}

pub async fn refresh_token(
    body: RefreshRequest,
    token_manager: Arc<dyn TokenManager>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let auth_tokens = token_manager
        .refresh(&body.refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(RefreshResponse {
        auth_tokens,
    })))
}

#[derive(Debug, Serialize)]
pub struct SignOutResponse;

pub async fn sign_out(
    headers: HeaderMap,
    token_manager: Arc<dyn TokenManager>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let token = AuthGate::extract_bearer_token(&headers)
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;
    token_manager
        .invalidate(token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(SignOutResponse)))
}

pub async fn sign_out_all(
    user_id: UserId,
    token_manager: Arc<dyn TokenManager>,
) -> Result<impl warp::Reply, warp::Rejection> {
    token_manager
        .invalidate_all(user_id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(SignOutResponse)))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: UserId,
}

pub async fn session(user_id: UserId) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(SessionResponse {
        user_id,
    })))
}
