use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::{
    entities::{AuthRequest, UserProfile},
    error::AuthError,
    guard::{token_from_headers, AuthUser},
    store::{is_unique_violation, CredentialStore},
    AppState,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub message: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignInResponse {
    pub message: String,
    pub user: UserProfile,
    pub token: String,
}

// verified against when the username is unknown, so that path costs one
// argon2 run like a wrong password does
static UNKNOWN_USER_HASH: Lazy<String> =
    Lazy::new(|| password_auth::generate_hash("unknown-user-placeholder"));

/// Runs the blocking argon2 comparison off the async runtime. `None` stands
/// for an unknown user and always fails, after the same amount of work.
async fn check_password(password: String, password_hash: Option<String>) -> Result<bool, AuthError> {
    let verified = tokio::task::spawn_blocking(move || {
        let known = password_hash.is_some();
        let hash = password_hash.as_deref().unwrap_or(UNKNOWN_USER_HASH.as_str());
        let matched = password_auth::verify_password(password, hash).is_ok();
        known && matched
    })
    .await?;

    Ok(verified)
}

fn require_fields(auth_request: &AuthRequest) -> Result<(), AuthError> {
    if auth_request.username.trim().is_empty() || auth_request.password.is_empty() {
        return Err(AuthError::Validation("username and password are required"));
    }
    Ok(())
}

pub async fn sign_up(
    State(state): State<AppState>,
    Json(auth_request): Json<AuthRequest>,
) -> Result<impl IntoResponse, AuthError> {
    require_fields(&auth_request)?;
    let username = auth_request.username.trim().to_string();

    // `password_auth::generate_hash()` is blocking, hence using `tokio::task::spawn_blocking()`
    let password = auth_request.password;
    let password_hash =
        tokio::task::spawn_blocking(move || password_auth::generate_hash(password)).await?;

    let user = match state.store.create_user(&username, &password_hash).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            tracing::debug!(%username, "sign up with taken username");
            return Err(AuthError::DuplicateIdentity);
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(user_id = user.id, "registered user");

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            message: "User registered successfully".into(),
            user: UserProfile::from(&user),
        }),
    ))
}

/// Unknown usernames and wrong passwords both answer `InvalidCredentials`.
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(auth_request): Json<AuthRequest>,
) -> Result<impl IntoResponse, AuthError> {
    require_fields(&auth_request)?;

    let user = state
        .store
        .find_user_by_username(auth_request.username.trim())
        .await?;

    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let verified = check_password(auth_request.password, stored_hash).await?;

    let user = match user {
        Some(user) if verified => user,
        Some(user) => {
            tracing::debug!(user_id = user.id, "sign in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        None => {
            tracing::debug!("sign in for unknown username");
            return Err(AuthError::InvalidCredentials);
        }
    };

    let token = state.issuer.issue(&state.store, user.id).await?;
    let jar = jar.add(state.issuer.session_cookie(token.clone()));

    Ok((
        StatusCode::OK,
        jar,
        Json(SignInResponse {
            message: "User logged in successfully".into(),
            user: UserProfile::from(&user),
            token,
        }),
    ))
}

/// Revokes the presented session if it is still valid and always tells the
/// client to drop the cookie.
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AuthError> {
    if let Some(token) = token_from_headers(&headers) {
        match state.guard.authorize(&state.store, &token).await {
            Ok(user) => {
                state.store.update_user_token(user.id, None).await?;
                tracing::info!(user_id = user.id, "signed out");
            }
            Err(e @ (AuthError::Persistence(_) | AuthError::TaskJoin(_))) => return Err(e),
            Err(e) => tracing::debug!(reason = %e, "sign out with stale token"),
        }
    }

    let jar = jar.add(state.issuer.removal_cookie());
    Ok((
        jar,
        Json(serde_json::json!({ "message": "User logged out successfully" })),
    ))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}
