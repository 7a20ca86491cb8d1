//! Session token issuance and the request-authentication layer.
//!
//! The issuer is an explicitly injected collaborator: handlers and the
//! `authenticate` middleware only see the [`SessionIssuer`] trait, so tests
//! can swap in a fake without a signing key.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Request},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};
use tracing::debug;
use uuid::Uuid;

use crate::kliento::handlers::Envelope;

/// Claims carried by a session token: the customer's public uid plus the
/// blocked flag captured at signin time.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub blocked: bool,
    pub iat: u64,
    pub exp: u64,
}

/// Mints an opaque session token from a user identity claim, and checks
/// tokens presented on later requests.
pub trait SessionIssuer: Send + Sync {
    /// # Errors
    /// Returns an error if the token cannot be signed.
    fn issue(&self, uid: Uuid, is_blocked: bool) -> Result<String>;

    /// # Errors
    /// Returns an error if the token is invalid or expired.
    fn verify(&self, token: &str) -> Result<SessionClaims>;
}

pub type DynSessionIssuer = Arc<dyn SessionIssuer>;

/// HS256-signed tokens with a fixed time to live.
pub struct JwtSessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtSessionIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }
}

impl SessionIssuer for JwtSessionIssuer {
    fn issue(&self, uid: Uuid, is_blocked: bool) -> Result<String> {
        let now = now_unix_seconds();
        let claims = SessionClaims {
            sub: uid,
            blocked: is_blocked,
            iat: now,
            exp: now + self.ttl.as_secs(),
        };

        encode(&Header::default(), &claims, &self.encoding).context("failed to sign session token")
    }

    fn verify(&self, token: &str) -> Result<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .context("failed to verify session token")?;

        Ok(data.claims)
    }
}

fn now_unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Authenticated-user claim attached to requests that passed [`authenticate`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub uid: Uuid,
    pub is_blocked: bool,
}

/// Middleware for the account routes: resolves the bearer token into an
/// [`AuthUser`] extension or rejects the request before any handler runs.
pub async fn authenticate(
    Extension(issuer): Extension<DynSessionIssuer>,
    mut request: Request,
    next: Next,
) -> Response {
    let verified = bearer_token(request.headers()).map(|token| issuer.verify(token));

    match verified {
        Some(Ok(claims)) => {
            request.extensions_mut().insert(AuthUser {
                uid: claims.sub,
                is_blocked: claims.blocked,
            });
            next.run(request).await
        }
        Some(Err(err)) => {
            debug!("Rejected session token: {err:#}");
            unauthorized()
        }
        None => unauthorized(),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(Envelope::<()>::fail("Unauthorized")),
    )
        .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn issuer(secret: &str, ttl: Duration) -> JwtSessionIssuer {
        JwtSessionIssuer::new(&SecretString::from(secret.to_string()), ttl)
    }

    #[test]
    fn issue_and_verify_round_trip() -> Result<()> {
        let issuer = issuer("top-secret", Duration::from_secs(3600));
        let uid = Uuid::new_v4();

        let token = issuer.issue(uid, false)?;
        assert!(!token.is_empty());

        let claims = issuer.verify(&token)?;
        assert_eq!(claims.sub, uid);
        assert!(!claims.blocked);
        assert!(claims.exp > claims.iat);
        Ok(())
    }

    #[test]
    fn blocked_flag_is_carried() -> Result<()> {
        let issuer = issuer("top-secret", Duration::from_secs(3600));
        let token = issuer.issue(Uuid::new_v4(), true)?;
        assert!(issuer.verify(&token)?.blocked);
        Ok(())
    }

    #[test]
    fn wrong_secret_is_rejected() -> Result<()> {
        let signer = issuer("one-secret", Duration::from_secs(3600));
        let other = issuer("another-secret", Duration::from_secs(3600));

        let token = signer.issue(Uuid::new_v4(), false)?;
        assert!(other.verify(&token).is_err());
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<()> {
        let issuer = issuer("top-secret", Duration::from_secs(3600));

        // Issue a token whose exp is already past the default leeway.
        let now = now_unix_seconds();
        let claims = SessionClaims {
            sub: Uuid::new_v4(),
            blocked: false,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"top-secret"),
        )?;

        assert!(issuer.verify(&token).is_err());
        Ok(())
    }

    #[test]
    fn garbage_token_is_rejected() {
        let issuer = issuer("top-secret", Duration::from_secs(3600));
        assert!(issuer.verify("not-a-token").is_err());
    }

    #[test]
    fn bearer_token_strips_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_token_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn bearer_token_rejects_empty_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn bearer_token_requires_header() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
