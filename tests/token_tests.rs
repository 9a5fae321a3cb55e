use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use qa_board::auth::token::{self, ROLES_CLAIM, TokenError, derive_key, expiry_after, issue, verify};
use serde_json::{Map, json};

const SECRET: &str = "token-test-secret";

fn roles_claims(roles: &[&str]) -> Map<String, serde_json::Value> {
    let mut claims = Map::new();
    claims.insert(ROLES_CLAIM.to_string(), json!(roles));
    claims
}

// Signs an arbitrary payload with the same key derivation the codec uses.
fn sign_raw(payload: serde_json::Value, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        &payload,
        &EncodingKey::from_secret(&derive_key(secret)),
    )
    .unwrap()
}

#[test]
fn test_issue_then_verify_returns_original_claims() {
    let claims = roles_claims(&["ADMIN", "USER"]);
    let expiry = expiry_after(30);

    let token = issue(&claims, "hgd@gmail.com", expiry, SECRET).unwrap();
    let verified = verify(&token, SECRET).unwrap();

    assert_eq!(verified.subject, "hgd@gmail.com");
    assert_eq!(verified.claims, claims);
    assert_eq!(verified.expires_at.timestamp(), expiry.timestamp());
    assert!(verified.issued_at <= Utc::now());
    assert_eq!(verified.roles(), Some(vec!["ADMIN".to_string(), "USER".to_string()]));
}

#[test]
fn test_token_has_three_dot_separated_segments() {
    let token = issue(&Map::new(), "a@b.c", expiry_after(1), SECRET).unwrap();
    assert_eq!(token.split('.').count(), 3);
}

#[test]
fn test_expired_token_is_rejected_as_expired() {
    let token = issue(&roles_claims(&["USER"]), "a@b.c", Utc::now() - Duration::minutes(1), SECRET).unwrap();
    assert_eq!(verify(&token, SECRET), Err(TokenError::Expired));
}

#[test]
fn test_wrong_key_is_signature_invalid() {
    let token = issue(&roles_claims(&["USER"]), "a@b.c", expiry_after(30), SECRET).unwrap();
    assert_eq!(verify(&token, "another-secret"), Err(TokenError::SignatureInvalid));
}

#[test]
fn test_signature_is_checked_before_expiry() {
    let token = issue(&Map::new(), "a@b.c", Utc::now() - Duration::minutes(5), SECRET).unwrap();
    assert_eq!(verify(&token, "another-secret"), Err(TokenError::SignatureInvalid));
}

#[test]
fn test_tampered_payload_fails_signature() {
    let token = issue(&roles_claims(&["USER"]), "a@b.c", expiry_after(30), SECRET).unwrap();
    let forged_claims = issue(&roles_claims(&["ADMIN"]), "a@b.c", expiry_after(30), SECRET).unwrap();

    // Header and signature of the first token around the payload of the second.
    let parts: Vec<&str> = token.split('.').collect();
    let forged_payload = forged_claims.split('.').nth(1).unwrap();
    let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

    assert_eq!(verify(&forged, SECRET), Err(TokenError::SignatureInvalid));
}

#[test]
fn test_missing_required_claims_are_malformed() {
    let exp = expiry_after(30).timestamp();
    let now = Utc::now().timestamp();

    let no_subject = sign_raw(json!({ "iat": now, "exp": exp }), SECRET);
    assert!(matches!(verify(&no_subject, SECRET), Err(TokenError::Malformed(_))));

    let no_expiry = sign_raw(json!({ "sub": "a@b.c", "iat": now }), SECRET);
    assert!(matches!(verify(&no_expiry, SECRET), Err(TokenError::Malformed(_))));
}

#[test]
fn test_structurally_broken_tokens_are_malformed() {
    for broken in ["", "abc", "a.b", "a.b.c.d", "###.###.###"] {
        assert!(
            matches!(verify(broken, SECRET), Err(TokenError::Malformed(_))),
            "{broken:?} should be malformed"
        );
    }
}

#[test]
fn test_key_is_derived_from_the_plain_secret_on_every_call() {
    let token = issue(&Map::new(), "a@b.c", expiry_after(30), "rotating").unwrap();
    assert!(verify(&token, "rotating").is_ok());
    // A rotated secret invalidates tokens signed with the old one immediately.
    assert_eq!(verify(&token, "rotated"), Err(TokenError::SignatureInvalid));
}

#[test]
fn test_expiry_after_uses_minute_granularity() {
    let before = Utc::now();
    let expiry = token::expiry_after(30);
    let delta = expiry - before;
    assert!(delta >= Duration::minutes(30) && delta < Duration::minutes(30) + Duration::seconds(5));
}
