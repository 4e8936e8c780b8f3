//! Credential operations over JSON.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::error::Result;
use crate::router::Body;
use crate::service::{
    AuthResult, AuthService, NewLogin, NewRefreshToken, NewRelogin, NewToken,
};
use crate::token::TokenPair;

pub async fn login(
    State(service): State<AuthService>,
    Body(body): Body<NewLogin>,
) -> Result<Json<AuthResult>> {
    Ok(Json(service.login(body).await?))
}

pub async fn relogin(
    State(service): State<AuthService>,
    Body(body): Body<NewRelogin>,
) -> Result<Json<AuthResult>> {
    Ok(Json(service.relogin(body).await?))
}

pub async fn refresh(
    State(service): State<AuthService>,
    Body(body): Body<NewToken>,
) -> Result<Json<TokenPair>> {
    Ok(Json(service.get_refresh_token(body).await?))
}

pub async fn logout(
    State(service): State<AuthService>,
    Body(body): Body<NewRefreshToken>,
) -> Result<StatusCode> {
    service.logout(body).await?;
    Ok(StatusCode::NO_CONTENT)
}
