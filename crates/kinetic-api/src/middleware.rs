use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use kinetic_types::api::Claims;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// Extract and validate the JWT from the Authorization header, then make
/// sure the session user has a row.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    let claims = token_data.claims;
    let (id, username) = (claims.sub, claims.username.clone());
    run_db(&state, move |db| db.ensure_user(id, &username)).await?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Mint a session token. The auth service issues these in production; the
/// secret must match the one this server verifies with.
pub fn issue_token(secret: &str, user_id: Uuid, username: &str, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
