use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::CookiePolicy, error::AuthError, store::CredentialStore};

pub const SESSION_COOKIE: &str = "jwt";
pub const TOKEN_LIFETIME_SECS: i64 = 10 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// user id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// fresh per issuance, so back-to-back logins never mint the same token
    pub jti: Uuid,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

/// HS256 signing and verification with the process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn sign(&self, user_id: i64, issued_at: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = issued_at.timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
            jti: Uuid::new_v4(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(error = %e, "failed to sign session token");
            AuthError::InvalidToken
        })
    }

    /// Checks the signature first, then the expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        match jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => {
                tracing::debug!("rejected expired session token");
                Err(AuthError::ExpiredToken)
            }
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                Err(AuthError::InvalidToken)
            }
        }
    }
}

/// Mints session tokens for verified users and records them as the user's
/// single active session.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: TokenCodec,
    cookie: CookiePolicy,
}

impl TokenIssuer {
    pub fn new(codec: TokenCodec, cookie: CookiePolicy) -> Self {
        Self { codec, cookie }
    }

    /// Signs a token for `user_id` and stores it on the user, replacing any
    /// previous one.
    pub async fn issue<S>(&self, store: &S, user_id: i64) -> Result<String, AuthError>
    where
        S: CredentialStore + ?Sized,
    {
        let token = self.codec.sign(user_id, Utc::now())?;
        store.update_user_token(user_id, Some(&token)).await?;
        tracing::info!(user_id, "issued session token");
        Ok(token)
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.cookie.secure)
            .max_age(time::Duration::seconds(self.cookie.max_age_secs))
            .build()
    }

    /// An empty, already expired `jwt` cookie that tells the client to drop
    /// its session.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((SESSION_COOKIE, ""))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.cookie.secure)
            .build();
        cookie.make_removal();
        cookie
    }
}
