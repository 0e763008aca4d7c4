//! Access, refresh and password-reset token issuance and verification.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate secrets. Access tokens are
//! verified statelessly; refresh tokens are additionally checked against the session store
//! by the caller (see [`crate::auth::sessions`]). Reset tokens are opaque random values of
//! which only a digest is stored.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::prelude::RngExt;
use rand::rng;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::{
    auth::{Principal, password},
    config::TokenConfig,
    errors::Error,
    types::{DepartmentId, EmployeeId, RoleId},
};

/// Claims carried by an access token. Enough to authorize a request without a store lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub emp_id: EmployeeId,
    pub name: String,
    pub role: String,
    pub role_id: RoleId,
    pub department_id: DepartmentId,
    pub iat: i64,
    pub exp: i64,
}

impl From<AccessClaims> for Principal {
    fn from(claims: AccessClaims) -> Self {
        Self {
            emp_id: claims.emp_id,
            name: claims.name,
            role: claims.role,
            role_id: claims.role_id,
            department_id: claims.department_id,
        }
    }
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub emp_id: EmployeeId,
    pub name: String,
    /// Random id so two tokens minted in the same second differ
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token together with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// A freshly generated reset token. Only `digest` is persisted.
#[derive(Debug, Clone)]
pub struct IssuedResetToken {
    pub token: String,
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

fn secret<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, Error> {
    value.as_deref().filter(|s| !s.is_empty()).ok_or_else(|| Error::Internal {
        operation: format!("JWT signing: auth.tokens.{name} is required"),
    })
}

fn expiry(now: DateTime<Utc>, lifetime: Duration) -> Result<DateTime<Utc>, Error> {
    let lifetime = chrono::Duration::from_std(lifetime).map_err(|e| Error::Internal {
        operation: format!("convert token lifetime: {e}"),
    })?;
    Ok(now + lifetime)
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, Error> {
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<T>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::Json(_)
        | jsonwebtoken::errors::ErrorKind::Utf8(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Server errors (500) - key issues, internal failures
        jsonwebtoken::errors::ErrorKind::InvalidEcdsaKey
        | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_)
        | jsonwebtoken::errors::ErrorKind::RsaFailedSigning
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName
        | jsonwebtoken::errors::ErrorKind::InvalidKeyFormat
        | jsonwebtoken::errors::ErrorKind::MissingAlgorithm
        | jsonwebtoken::errors::ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    })?;

    Ok(token_data.claims)
}

/// Sign a short-lived access token for `principal`.
pub fn issue_access_token(principal: &Principal, config: &TokenConfig) -> Result<IssuedToken, Error> {
    let now = Utc::now();
    let expires_at = expiry(now, config.access_expiry)?;
    let claims = AccessClaims {
        emp_id: principal.emp_id,
        name: principal.name.clone(),
        role: principal.role.clone(),
        role_id: principal.role_id,
        department_id: principal.department_id,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = sign(&claims, secret(&config.access_secret, "access_secret")?)?;
    Ok(IssuedToken { token, expires_at })
}

/// Sign a refresh token for `principal`.
pub fn issue_refresh_token(principal: &Principal, config: &TokenConfig) -> Result<IssuedToken, Error> {
    let now = Utc::now();
    let expires_at = expiry(now, config.refresh_expiry)?;

    let mut jti = [0u8; 16];
    rng().fill(&mut jti);

    let claims = RefreshClaims {
        emp_id: principal.emp_id,
        name: principal.name.clone(),
        jti: general_purpose::URL_SAFE_NO_PAD.encode(jti),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = sign(&claims, secret(&config.refresh_secret, "refresh_secret")?)?;
    Ok(IssuedToken { token, expires_at })
}

pub fn verify_access_token(token: &str, config: &TokenConfig) -> Result<AccessClaims, Error> {
    verify(token, secret(&config.access_secret, "access_secret")?)
}

/// Verify the signature and expiry of a refresh token. Does not consult the session store.
pub fn verify_refresh_token(token: &str, config: &TokenConfig) -> Result<RefreshClaims, Error> {
    verify(token, secret(&config.refresh_secret, "refresh_secret")?)
}

/// Decode refresh claims while ignoring expiry, so an expired token can still be matched
/// against the stored session for cleanup.
pub fn decode_expired_refresh_token(token: &str, config: &TokenConfig) -> Result<RefreshClaims, Error> {
    let key = DecodingKey::from_secret(secret(&config.refresh_secret, "refresh_secret")?.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = false;

    decode::<RefreshClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| Error::Unauthenticated { message: None })
}

/// SHA-256 digest of a token, base64url encoded. This is the only form tokens are stored in.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate an opaque password-reset token valid for `ttl`.
pub fn issue_reset_token(ttl: Duration) -> Result<IssuedResetToken, Error> {
    let token = password::generate_reset_token();
    let digest = token_digest(&token);
    let expires_at = expiry(Utc::now(), ttl)?;
    Ok(IssuedResetToken { token, digest, expires_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_config() -> TokenConfig {
        TokenConfig {
            access_secret: Some("access-secret-for-tests".to_string()),
            refresh_secret: Some("refresh-secret-for-tests".to_string()),
            ..Default::default()
        }
    }

    fn principal() -> Principal {
        Principal {
            emp_id: Uuid::new_v4(),
            name: "Ada Lovelace".to_string(),
            role: "Department Manager".to_string(),
            role_id: Uuid::new_v4(),
            department_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let config = test_config();
        let principal = principal();

        let issued = issue_access_token(&principal, &config).unwrap();
        assert!(issued.expires_at > Utc::now());

        let claims = verify_access_token(&issued.token, &config).unwrap();
        assert_eq!(claims.emp_id, principal.emp_id);
        assert_eq!(claims.name, principal.name);
        assert_eq!(claims.role, principal.role);
        assert_eq!(claims.role_id, principal.role_id);
        assert_eq!(claims.department_id, principal.department_id);
        assert_eq!(Principal::from(claims), principal);
    }

    #[test]
    fn test_refresh_tokens_are_distinct() {
        let config = test_config();
        let principal = principal();

        let first = issue_refresh_token(&principal, &config).unwrap();
        let second = issue_refresh_token(&principal, &config).unwrap();
        assert_ne!(first.token, second.token);

        let claims = verify_refresh_token(&first.token, &config).unwrap();
        assert_eq!(claims.emp_id, principal.emp_id);
    }

    #[test]
    fn test_secrets_are_not_interchangeable() {
        let config = test_config();
        let principal = principal();

        let access = issue_access_token(&principal, &config).unwrap();
        let refresh = issue_refresh_token(&principal, &config).unwrap();

        assert!(matches!(
            verify_refresh_token(&access.token, &config),
            Err(Error::Unauthenticated { .. })
        ));
        assert!(matches!(
            verify_access_token(&refresh.token, &config),
            Err(Error::Unauthenticated { .. })
        ));
    }

    #[test]
    fn test_expired_access_token() {
        let config = test_config();
        let principal = principal();
        let now = Utc::now();
        let claims = AccessClaims {
            emp_id: principal.emp_id,
            name: principal.name.clone(),
            role: principal.role.clone(),
            role_id: principal.role_id,
            department_id: principal.department_id,
            iat: (now - chrono::Duration::hours(2)).timestamp(),
            exp: (now - chrono::Duration::hours(1)).timestamp(),
        };
        let token = sign(&claims, "access-secret-for-tests").unwrap();

        let result = verify_access_token(&token, &config);
        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
    }

    #[test]
    fn test_expired_refresh_token_still_decodes_for_cleanup() {
        let config = test_config();
        let now = Utc::now();
        let claims = RefreshClaims {
            emp_id: Uuid::new_v4(),
            name: "Ada Lovelace".to_string(),
            jti: "jti".to_string(),
            iat: (now - chrono::Duration::days(8)).timestamp(),
            exp: (now - chrono::Duration::days(1)).timestamp(),
        };
        let token = sign(&claims, "refresh-secret-for-tests").unwrap();

        assert!(verify_refresh_token(&token, &config).is_err());
        assert_eq!(decode_expired_refresh_token(&token, &config).unwrap(), claims);
    }

    #[test]
    fn test_malformed_tokens() {
        let config = test_config();
        for token in ["not.a.token", "invalid", "", "too.many.parts.in.this.token"] {
            assert!(
                matches!(verify_access_token(token, &config), Err(Error::Unauthenticated { .. })),
                "Expected Unauthenticated error for token: {token}"
            );
        }
    }

    #[test]
    fn test_missing_secret_is_internal() {
        let config = TokenConfig::default();
        let result = issue_access_token(&principal(), &config);
        assert!(matches!(result, Err(Error::Internal { .. })));
    }

    #[test]
    fn test_reset_token_digest() {
        let issued = issue_reset_token(Duration::from_secs(1800)).unwrap();
        assert_eq!(issued.token.len(), 43);
        assert_eq!(issued.digest, token_digest(&issued.token));
        assert_ne!(issued.digest, issued.token);
        // SHA-256 is 32 bytes, 43 chars unpadded
        assert_eq!(issued.digest.len(), 43);
    }
}
