use super::response::ApiError;
use super::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "token";

/// Login of the caller, taken from a valid session cookie.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub login: String,
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| ApiError::unauthorized("missing session cookie"))?;

        match state.verifier.verify(&token).await {
            Some(claims) => Ok(Self {
                login: claims.login,
            }),
            None => {
                tracing::debug!("rejected session token");
                Err(ApiError::unauthorized("invalid token"))
            }
        }
    }
}
