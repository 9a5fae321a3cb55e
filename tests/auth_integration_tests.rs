mod common;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{Method, Request, Uri, header, request::Parts},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use common::{ADMIN_EMAIL, PASSWORD, TEST_JWT_SECRET, create_test_state, register};
use qa_board::{
    AppError, AppState,
    auth::{
        AuthResult, AuthUser, AuthenticationGate,
        request::resolve_header,
        token::{self, ROLES_CLAIM, TokenError},
    },
    error::{LifecycleError, Resource},
    lifecycle::Lifecycle,
    models::LoginRequest,
};
use serde_json::{Map, json};

// --- Helper Functions ---

fn access_token(email: &str, roles: &[&str], expiry_minutes: i64) -> String {
    let mut claims = Map::new();
    claims.insert(ROLES_CLAIM.to_string(), json!(roles));
    token::issue(
        &claims,
        email,
        Utc::now() + Duration::minutes(expiry_minutes),
        TEST_JWT_SECRET,
    )
    .unwrap()
}

/// Builds request parts the way they look after the `authenticate` middleware ran.
fn authenticated_parts(authorization: Option<String>) -> Parts {
    let mut builder = Request::builder()
        .method(Method::GET)
        .uri("/boards".parse::<Uri>().unwrap());
    if let Some(value) = &authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let (mut parts, _) = builder.body(axum::body::Body::empty()).unwrap().into_parts();

    let result = resolve_header(parts.headers.get(header::AUTHORIZATION), TEST_JWT_SECRET);
    parts.extensions.insert(result);
    parts
}

async fn extract(state: &AppState, authorization: Option<String>) -> Result<AuthUser, AppError> {
    let mut parts = authenticated_parts(authorization);
    AuthUser::from_request_parts(&mut parts, state).await
}

fn login_request(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

// --- AuthUser Extractor ---

#[tokio::test]
async fn test_auth_success_with_valid_token() {
    let state = create_test_state();
    let member = register(&state, "hgd@gmail.com").await;
    let token = access_token("hgd@gmail.com", &["USER"], 30);

    let auth_user = extract(&state, Some(format!("Bearer {token}"))).await.unwrap();

    assert_eq!(auth_user.identity.member_id, member.id);
    assert_eq!(auth_user.identity.email, "hgd@gmail.com");
    assert!(!auth_user.identity.is_admin());
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let state = create_test_state();
    let result = extract(&state, None).await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_auth_failure_with_expired_token() {
    let state = create_test_state();
    register(&state, "hgd@gmail.com").await;
    let token = access_token("hgd@gmail.com", &["USER"], -1);

    let parts = authenticated_parts(Some(format!("Bearer {token}")));
    assert!(matches!(
        parts.extensions.get::<AuthResult>(),
        Some(AuthResult::Rejected(TokenError::Expired))
    ));

    let result = extract(&state, Some(format!("Bearer {token}"))).await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_rejection_body_does_not_reveal_the_cause() {
    let state = create_test_state();
    register(&state, "hgd@gmail.com").await;
    let expired = access_token("hgd@gmail.com", &["USER"], -1);

    let bodies = [
        extract(&state, None).await,
        extract(&state, Some(format!("Bearer {expired}"))).await,
        extract(&state, Some("Bearer not.a.token".to_string())).await,
    ];

    let mut rendered = Vec::new();
    for result in bodies {
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), 401);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        rendered.push(bytes);
    }
    assert!(rendered.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_roles_come_from_the_token_claims() {
    let state = create_test_state();
    register(&state, ADMIN_EMAIL).await;
    let token = access_token(ADMIN_EMAIL, &["ADMIN", "USER"], 30);

    let auth_user = extract(&state, Some(format!("Bearer {token}"))).await.unwrap();
    assert!(auth_user.identity.is_admin());
}

#[tokio::test]
async fn test_valid_token_for_unknown_member_is_not_found() {
    let state = create_test_state();
    let token = access_token("ghost@gmail.com", &["USER"], 30);

    let result = extract(&state, Some(format!("Bearer {token}"))).await;
    assert!(matches!(
        result,
        Err(AppError::Lifecycle(LifecycleError::NotFound(Resource::Member)))
    ));
}

#[tokio::test]
async fn test_identity_resolved_by_the_route_guard_is_reused() {
    // The first state knows the member; the second does not, so a second lookup would fail.
    let known = create_test_state();
    let member = register(&known, "hgd@gmail.com").await;
    let token = access_token("hgd@gmail.com", &["USER"], 30);
    let resolved = extract(&known, Some(format!("Bearer {token}"))).await.unwrap();

    let empty = create_test_state();
    let mut parts = authenticated_parts(Some(format!("Bearer {token}")));
    parts.extensions.insert(resolved);

    let reused = AuthUser::from_request_parts(&mut parts, &empty).await.unwrap();
    assert_eq!(reused.identity.member_id, member.id);
    assert_eq!(reused.identity.email, "hgd@gmail.com");
}

#[tokio::test]
async fn test_bearer_without_separating_space_is_rejected() {
    let state = create_test_state();
    register(&state, "hgd@gmail.com").await;
    let token = access_token("hgd@gmail.com", &["USER"], 30);

    let result = extract(&state, Some(format!("Bearer{token}"))).await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

// --- Authentication Gate ---

#[tokio::test]
async fn test_login_issues_access_and_refresh_tokens() {
    let state = create_test_state();
    register(&state, ADMIN_EMAIL).await;
    let gate = AuthenticationGate::from_ref(&state);

    let tokens = gate.login(&login_request(ADMIN_EMAIL, PASSWORD)).await.unwrap();

    let access = token::verify(&tokens.access, TEST_JWT_SECRET).unwrap();
    assert_eq!(access.subject, ADMIN_EMAIL);
    assert_eq!(access.roles(), Some(vec!["ADMIN".to_string(), "USER".to_string()]));
    let access_ttl = access.expires_at - access.issued_at;
    assert!(access_ttl <= Duration::minutes(30) && access_ttl >= Duration::minutes(29));

    let refresh = token::verify(&tokens.refresh, TEST_JWT_SECRET).unwrap();
    assert_eq!(refresh.subject, ADMIN_EMAIL);
    assert!(refresh.claims.is_empty());
    assert!(refresh.expires_at - refresh.issued_at >= Duration::minutes(419));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let state = create_test_state();
    let member = register(&state, "hgd@gmail.com").await;
    let gate = AuthenticationGate::from_ref(&state);

    let unknown = gate.login(&login_request("nobody@gmail.com", PASSWORD)).await;
    let wrong = gate.login(&login_request("hgd@gmail.com", "wrong")).await;

    let admin = register(&state, ADMIN_EMAIL).await;
    Lifecycle::from_ref(&state)
        .member_quit(&common::identity_of(&admin), member.id)
        .await
        .unwrap();
    let quit = gate.login(&login_request("hgd@gmail.com", PASSWORD)).await;

    for result in [unknown, wrong, quit] {
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }
}

#[tokio::test]
async fn test_refresh_mints_new_access_token() {
    let state = create_test_state();
    register(&state, "hgd@gmail.com").await;
    let gate = AuthenticationGate::from_ref(&state);
    let tokens = gate.login(&login_request("hgd@gmail.com", PASSWORD)).await.unwrap();

    let access = gate.refresh(&tokens.refresh).await.unwrap();
    let verified = token::verify(&access, TEST_JWT_SECRET).unwrap();
    assert_eq!(verified.subject, "hgd@gmail.com");
    assert_eq!(verified.roles(), Some(vec!["USER".to_string()]));
}

#[tokio::test]
async fn test_refresh_refuses_access_tokens_and_garbage() {
    let state = create_test_state();
    register(&state, "hgd@gmail.com").await;
    let gate = AuthenticationGate::from_ref(&state);
    let tokens = gate.login(&login_request("hgd@gmail.com", PASSWORD)).await.unwrap();

    assert!(matches!(gate.refresh(&tokens.access).await, Err(AppError::Unauthenticated)));
    assert!(matches!(gate.refresh("garbage").await, Err(AppError::Unauthenticated)));
}
