//! Bearer token verification. Tokens are JWTs minted by the identity
//! provider; the custom `admin` claim gates privileged actions.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::AuthConfig, error::Error};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("token has no subject")]
    MissingSubject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub admin: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The caller identified by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub admin: bool,
}

/// An [`AuthUser`] whose token carries `admin: true`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// HS256 with a shared secret.
    pub fn from_secret(secret: &[u8], project_id: Option<&str>) -> Self {
        Self::new(DecodingKey::from_secret(secret), Algorithm::HS256, project_id)
    }

    /// RS256 with the provider's public key in PEM form.
    pub fn from_rsa_pem(pem: &[u8], project_id: Option<&str>) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem)?;
        Ok(Self::new(key, Algorithm::RS256, project_id))
    }

    /// Prefer the public key file, then the configured secret, then `AUTH_SECRET`.
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        let project_id = config.project_id.as_deref();
        if let Some(path) = &config.public_key {
            let pem = std::fs::read(path)
                .map_err(|e| anyhow::anyhow!("read public key {}: {}", path.display(), e))?;
            return Ok(Self::from_rsa_pem(&pem, project_id)?);
        }
        let secret = match &config.secret {
            Some(secret) => secret.clone(),
            None => dotenvy::var("AUTH_SECRET")
                .map_err(|_| anyhow::anyhow!("no auth public key, secret or AUTH_SECRET configured"))?,
        };
        Ok(Self::from_secret(secret.as_bytes(), project_id))
    }

    fn new(key: DecodingKey, algorithm: Algorithm, project_id: Option<&str>) -> Self {
        let mut validation = Validation::new(algorithm);
        match project_id {
            Some(project) => {
                validation.set_audience(&[project]);
                validation.set_issuer(&[format!("https://securetoken.google.com/{project}")]);
                validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);
            }
            None => validation.validate_aud = false,
        }
        Self { key, validation }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)?.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        Ok(AuthUser {
            uid: claims.sub,
            email: claims.email,
            admin: claims.admin,
        })
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<TokenVerifier>: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AuthError::MissingToken)?;
        let verifier = Arc::<TokenVerifier>::from_ref(state);
        let user = verifier.verify(bearer.token()).inspect_err(|e| {
            debug!("rejected token: {}", e);
        })?;
        Ok(user)
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    Arc<TokenVerifier>: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.admin {
            debug!("user {} is not an admin", user.uid);
            return Err(Error::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};

    use super::*;

    pub const SECRET: &[u8] = b"test-secret";

    pub fn mint(uid: &str, admin: bool) -> String {
        let claims = Claims {
            sub: uid.to_string(),
            exp: time::OffsetDateTime::now_utc().unix_timestamp() + 3600,
            admin,
            email: None,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[test]
    fn verifies_subject_and_admin_claim() {
        let verifier = TokenVerifier::from_secret(SECRET, None);
        let user = verifier.verify(&mint("alice", true)).unwrap();
        assert_eq!(user.uid, "alice");
        assert!(user.admin);
        assert!(!verifier.verify(&mint("bob", false)).unwrap().admin);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let verifier = TokenVerifier::from_secret(b"other", None);
        assert!(verifier.verify(&mint("alice", false)).is_err());

        let claims = Claims {
            sub: "alice".into(),
            exp: time::OffsetDateTime::now_utc().unix_timestamp() - 3600,
            admin: false,
            email: None,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();
        let verifier = TokenVerifier::from_secret(SECRET, None);
        assert!(matches!(verifier.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn project_id_requires_matching_audience() {
        let verifier = TokenVerifier::from_secret(SECRET, Some("englearn"));
        // minted tokens carry neither aud nor iss
        assert!(verifier.verify(&mint("alice", false)).is_err());
    }

    fn project_token(aud: &str, iss: &str) -> String {
        let claims = serde_json::json!({
            "sub": "alice",
            "exp": time::OffsetDateTime::now_utc().unix_timestamp() + 3600,
            "aud": aud,
            "iss": iss,
        });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[test]
    fn project_tokens_checked_against_audience_and_issuer() {
        let verifier = TokenVerifier::from_secret(SECRET, Some("englearn"));
        let good = project_token("englearn", "https://securetoken.google.com/englearn");
        assert_eq!(verifier.verify(&good).unwrap().uid, "alice");

        let wrong_aud = project_token("other", "https://securetoken.google.com/englearn");
        assert!(verifier.verify(&wrong_aud).is_err());
        let wrong_iss = project_token("englearn", "https://securetoken.google.com/other");
        assert!(verifier.verify(&wrong_iss).is_err());
    }
}
