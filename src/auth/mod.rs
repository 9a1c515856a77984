use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::types::UserSession;

/// Signing parameters, handed to whoever needs to read or mint tokens
#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub expiry_hours: u64,
}

impl JwtSettings {
    pub fn new(secret: impl Into<String>, expiry_hours: u64) -> Self {
        Self {
            secret: secret.into(),
            expiry_hours,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.security.jwt_secret.clone(), config.security.jwt_expiry_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn for_session(session: &UserSession, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: session.user_id.clone(),
            email: session.email.clone(),
            org: session.org_id.clone(),
            roles: session.roles.iter().cloned().collect(),
            exp,
            iat: now.timestamp(),
        }
    }
}

impl From<Claims> for UserSession {
    fn from(claims: Claims) -> Self {
        let expires_at: Option<DateTime<Utc>> = Utc.timestamp_opt(claims.exp, 0).single();
        Self {
            user_id: claims.sub,
            email: claims.email,
            org_id: claims.org,
            roles: claims.roles.into_iter().collect(),
            expires_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
}

/// Mint a token carrying `session`'s identity and roles
pub fn issue_token(settings: &JwtSettings, session: &UserSession) -> Result<String, JwtError> {
    if settings.secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let claims = Claims::for_session(session, settings.expiry_hours);
    let encoding_key = EncodingKey::from_secret(settings.secret.as_bytes());

    encode(&Header::default(), &claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Verify `token` and turn its claims into a session
pub fn decode_session(settings: &JwtSettings, token: &str) -> Result<UserSession, JwtError> {
    if settings.secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(settings.secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

    Ok(token_data.claims.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_preserves_identity() {
        let settings = JwtSettings::new("test-secret", 1);
        let session = UserSession::new("u-42").with_email("ada@example.com").with_roles(["admin", "user"]);

        let token = issue_token(&settings, &session).unwrap();
        let decoded = decode_session(&settings, &token).unwrap();

        assert_eq!(decoded.user_id, "u-42");
        assert_eq!(decoded.email.as_deref(), Some("ada@example.com"));
        assert!(decoded.roles.contains("admin"));
        assert!(decoded.is_valid());
    }

    #[test]
    fn wrong_secret_and_empty_secret_are_rejected() {
        let token = issue_token(&JwtSettings::new("one", 1), &UserSession::new("u1")).unwrap();
        assert!(matches!(
            decode_session(&JwtSettings::new("two", 1), &token),
            Err(JwtError::InvalidToken(_))
        ));
        assert!(matches!(
            issue_token(&JwtSettings::new("", 1), &UserSession::new("u1")),
            Err(JwtError::InvalidSecret)
        ));
    }
}
