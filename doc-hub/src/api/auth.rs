use super::auth_middleware::SESSION_COOKIE;
use super::response::{decode, ApiError, Envelope};
use super::AppState;
use axum::{body::Bytes, extract::State};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info};

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    token: String,
    #[serde(default)]
    login: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    login: String,
    #[serde(default)]
    password: String,
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::hours(24))
        .build()
}

pub async fn register(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Envelope<Value>, ApiError> {
    let req: RegisterRequest = decode(&body)?;
    if !bool::from(req.token.as_bytes().ct_eq(state.admin_token.as_bytes())) {
        error!(login = %req.login, "registration with invalid admin token");
        return Err(ApiError::unauthorized("invalid token"));
    }

    state
        .credentials
        .register(&req.login, &req.password)
        .await
        .map_err(|e| {
            error!(login = %req.login, "failed to register user: {}", e);
            ApiError::internal("failed to register user")
        })?;

    Ok(Envelope::Response(json!({ "login": req.login })))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Envelope<Value>), ApiError> {
    let req: LoginRequest = decode(&body)?;
    if req.login.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("invalid login or password"));
    }

    let token = state
        .credentials
        .authenticate(&req.login, &req.password)
        .await
        .map_err(|e| {
            error!(login = %req.login, "failed to authenticate: {}", e);
            ApiError::internal("failed to auth user")
        })?;

    info!(login = %req.login, "session issued");
    let jar = jar.add(session_cookie(token.clone()));
    Ok((jar, Envelope::Response(json!({ "token": token }))))
}

/// Clears the session cookie, even an expired one. The path segment is accepted
/// for compatibility and ignored.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Envelope<Value>), ApiError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Err(ApiError::unauthorized("missing session cookie"));
    };
    match state.credentials.verify(cookie.value()) {
        Ok(login) => info!(login = %login, "session cookie cleared"),
        Err(e) => debug!("clearing unverifiable session cookie: {}", e),
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Envelope::Response(json!({ "message": "logged out" }))))
}
