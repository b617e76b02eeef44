use std::time::Duration;

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use optislip_core::Principal;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::AppError;

/// Claims carried by an access token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    #[serde(default)]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sub_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Verifies HS256 access tokens signed with the shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    clock_skew: Duration,
}

impl JwtVerifier {
    pub fn new(secret: &str, clock_skew: Duration) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            clock_skew,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.auth_clock_skew)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Principal, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let decoded = decode::<TokenClaims>(token, &self.key, &validation).map_err(|error| {
            AppError::unauthorized(format!("Token validation failed: {}", sanitize(&error)))
        })?;
        let claims = decoded.claims;
        validate_temporal_claims(&claims, self.clock_skew)?;

        if claims.is_sub_user.unwrap_or(false) {
            return Ok(Principal {
                user_id: claims.user_id,
                is_sub_user: true,
                sub_user_id: claims.sub_user_id,
            });
        }
        if claims.user_id.trim().is_empty() {
            return Err(AppError::unauthorized("Token subject is missing"));
        }
        Ok(Principal::owner(claims.user_id))
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

fn validate_temporal_claims(claims: &TokenClaims, clock_skew: Duration) -> Result<(), AppError> {
    let now = chrono::Utc::now().timestamp();
    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(0);

    let exp = claims
        .exp
        .ok_or_else(|| AppError::unauthorized("Token missing `exp` claim"))?;
    if exp <= now.saturating_sub(skew) {
        return Err(AppError::unauthorized("Token is expired"));
    }

    if let Some(iat) = claims.iat {
        if iat > now.saturating_add(skew) {
            return Err(AppError::unauthorized("Token `iat` is in the future"));
        }
    }

    Ok(())
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}

#[cfg(test)]
pub(crate) fn sign_for_tests(secret: &str, claims: &TokenClaims) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const SECRET: &str = "test-secret-0123456789";

    fn fresh_claims(user_id: &str) -> TokenClaims {
        let now = chrono::Utc::now().timestamp();
        TokenClaims {
            user_id: user_id.to_string(),
            exp: Some(now + 300),
            iat: Some(now),
            ..TokenClaims::default()
        }
    }

    #[test]
    fn bearer_token_extractor_accepts_standard_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );

        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn bearer_token_extractor_rejects_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn owner_token_becomes_owner_principal() {
        let verifier = JwtVerifier::new(SECRET, Duration::from_secs(60));
        let token = sign_for_tests(SECRET, &fresh_claims("owner-1"));

        let principal = verifier.verify_access_token(&token).unwrap();
        assert_eq!(principal, Principal::owner("owner-1"));
    }

    #[test]
    fn sub_user_token_keeps_sub_user_id() {
        let verifier = JwtVerifier::new(SECRET, Duration::from_secs(60));
        let claims = TokenClaims {
            is_sub_user: Some(true),
            sub_user_id: Some("sub-1".to_string()),
            ..fresh_claims("")
        };
        let token = sign_for_tests(SECRET, &claims);

        let principal = verifier.verify_access_token(&token).unwrap();
        assert!(principal.is_sub_user);
        assert_eq!(principal.sub_user_id.as_deref(), Some("sub-1"));
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let verifier = JwtVerifier::new(SECRET, Duration::from_secs(30));

        let forged = sign_for_tests("another-secret-0123456789", &fresh_claims("owner-1"));
        assert!(verifier.verify_access_token(&forged).is_err());

        let now = chrono::Utc::now().timestamp();
        let expired = TokenClaims {
            exp: Some(now - 120),
            ..fresh_claims("owner-1")
        };
        let err = verifier
            .verify_access_token(&sign_for_tests(SECRET, &expired))
            .unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn temporal_claims_require_exp() {
        let claims = TokenClaims {
            exp: None,
            ..fresh_claims("owner-1")
        };
        let err = validate_temporal_claims(&claims, Duration::from_secs(60)).unwrap_err();
        assert!(err.to_string().contains("missing `exp`"));
    }

    #[test]
    fn temporal_claims_reject_future_iat() {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            iat: Some(now + 120),
            ..fresh_claims("owner-1")
        };
        let err = validate_temporal_claims(&claims, Duration::from_secs(30)).unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn owner_token_without_subject_is_rejected() {
        let verifier = JwtVerifier::new(SECRET, Duration::from_secs(60));
        let token = sign_for_tests(SECRET, &fresh_claims("  "));
        let err = verifier.verify_access_token(&token).unwrap_err();
        assert!(err.to_string().contains("subject"));
    }
}
