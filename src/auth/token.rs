use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::AppConfig;

/// Name of the claim that carries the stored role strings on access tokens.
pub const ROLES_CLAIM: &str = "roles";

const RESERVED_CLAIMS: [&str; 3] = ["sub", "iat", "exp"];

/// TokenError
///
/// Why a token could not be issued or verified. Only ever logged; clients see a generic 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token signature does not match")]
    SignatureInvalid,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed: {0}")]
    Malformed(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed(e.to_string()),
        }
    }
}

/// TokenKind
///
/// Access tokens carry the roles claim and are presented on every request.
/// Refresh tokens carry only the subject and are exchanged for a new access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn ttl_minutes(self, config: &AppConfig) -> i64 {
        match self {
            Self::Access => config.access_token_ttl_minutes,
            Self::Refresh => config.refresh_token_ttl_minutes,
        }
    }
}

/// Payload
///
/// Wire layout of the signed claims: the registered fields plus any custom claims
/// flattened alongside them.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Payload {
    /// Subject (sub): the member's email.
    sub: String,
    /// Issued At (iat), seconds since the epoch.
    iat: i64,
    /// Expiration Time (exp), seconds since the epoch.
    exp: i64,
    #[serde(flatten)]
    claims: Map<String, Value>,
}

/// VerifiedClaims
///
/// The contents of a token whose signature and expiry have both been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub claims: Map<String, Value>,
}

impl VerifiedClaims {
    /// The roles claim as a list of strings. `None` when it is absent or not an array of strings.
    pub fn roles(&self) -> Option<Vec<String>> {
        self.claims
            .get(ROLES_CLAIM)?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

/// derive_key
///
/// SHA-256 of the plain-text secret. Recomputed on every issue/verify so a secret
/// change takes effect without restarting anything that holds a key.
pub fn derive_key(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

/// expiry_after
///
/// The instant `minutes` from now.
pub fn expiry_after(minutes: i64) -> DateTime<Utc> {
    Utc::now() + Duration::minutes(minutes)
}

/// issue
///
/// Signs a compact HS256 token for `subject` expiring at `expiry`. Reserved keys
/// (`sub`, `iat`, `exp`) inside `claims` are ignored in favour of the explicit arguments.
pub fn issue(
    claims: &Map<String, Value>,
    subject: &str,
    expiry: DateTime<Utc>,
    secret: &str,
) -> Result<String, TokenError> {
    let claims = claims
        .iter()
        .filter(|(k, _)| !RESERVED_CLAIMS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let payload = Payload {
        sub: subject.to_string(),
        iat: Utc::now().timestamp(),
        exp: expiry.timestamp(),
        claims,
    };

    let key = EncodingKey::from_secret(&derive_key(secret));
    Ok(encode(&Header::new(Algorithm::HS256), &payload, &key)?)
}

/// verify
///
/// Checks the signature first, then expiry with zero leeway. A token missing `sub` or
/// `exp` is `Malformed`.
pub fn verify(token: &str, secret: &str) -> Result<VerifiedClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let key = DecodingKey::from_secret(&derive_key(secret));
    let data = decode::<Payload>(token, &key, &validation)?;
    let payload = data.claims;

    let issued_at = DateTime::from_timestamp(payload.iat, 0)
        .ok_or_else(|| TokenError::Malformed("iat out of range".into()))?;
    let expires_at = DateTime::from_timestamp(payload.exp, 0)
        .ok_or_else(|| TokenError::Malformed("exp out of range".into()))?;

    Ok(VerifiedClaims {
        subject: payload.sub,
        issued_at,
        expires_at,
        claims: payload.claims,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derived_key_is_stable_for_the_same_secret() {
        assert_eq!(derive_key("secret"), derive_key("secret"));
        assert_ne!(derive_key("secret"), derive_key("Secret"));
    }

    #[test]
    fn reserved_claims_in_the_map_are_ignored() {
        let mut claims = Map::new();
        claims.insert("sub".into(), json!("intruder@example.com"));
        claims.insert("exp".into(), json!(0));

        let token = issue(&claims, "hgd@gmail.com", expiry_after(5), "k").unwrap();
        let verified = verify(&token, "k").unwrap();

        assert_eq!(verified.subject, "hgd@gmail.com");
        assert!(verified.claims.is_empty());
    }

    #[test]
    fn roles_claim_must_be_an_array_of_strings() {
        let mut claims = Map::new();
        claims.insert(ROLES_CLAIM.into(), json!(["USER", 7]));
        let token = issue(&claims, "a@b.c", expiry_after(5), "k").unwrap();

        assert_eq!(verify(&token, "k").unwrap().roles(), None);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(verify("not-a-token", "k"), Err(TokenError::Malformed(_))));
    }
}
