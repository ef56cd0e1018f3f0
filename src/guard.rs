use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    entities::User,
    error::AuthError,
    store::CredentialStore,
    token::{TokenCodec, SESSION_COOKIE},
    AppState,
};

/// Resolves a presented session token to the user it was issued to.
///
/// A token is accepted only if its signature verifies, it has not expired,
/// and it is still the token stored on the user. The last check is what
/// makes logout and a newer login revoke older tokens.
#[derive(Clone)]
pub struct AuthorizationGuard {
    codec: TokenCodec,
}

impl AuthorizationGuard {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    pub async fn authorize<S>(&self, store: &S, token: &str) -> Result<User, AuthError>
    where
        S: CredentialStore + ?Sized,
    {
        let claims = self.codec.verify(token)?;
        let user_id = claims.user_id()?;

        let Some(user) = store.find_user_by_id(user_id).await? else {
            tracing::warn!(user_id, "token references unknown user");
            return Err(AuthError::InvalidToken);
        };

        if user.token.as_deref() != Some(token) {
            tracing::debug!(user_id, "token superseded or revoked");
            return Err(AuthError::InvalidToken);
        }

        Ok(user)
    }
}

/// Reads the session token from the `jwt` cookie, falling back to an
/// `Authorization: Bearer` header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Extractor for handlers that require a logged-in user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_headers(&parts.headers) else {
            tracing::debug!(path = %parts.uri.path(), "no session token presented");
            return Err(AuthError::MissingToken);
        };

        let user = state.guard.authorize(&state.store, &token).await?;
        Ok(AuthUser(user))
    }
}
