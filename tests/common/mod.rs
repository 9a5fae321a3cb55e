#![allow(dead_code)]

use axum::extract::FromRef;
use qa_board::{
    AppState, AppConfig,
    auth::{CredentialVerifier, authority::authorities_from_roles},
    error::AppError,
    members::MemberService,
    models::{Member, RegisterMemberRequest},
    policy::Identity,
    repository::{InMemoryRepository, RepositoryState},
};
use std::sync::Arc;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
pub const ADMIN_EMAIL: &str = "admin@gmail.com";
pub const PASSWORD: &str = "p4ssw0rd!";

/// PlainCredentials
///
/// Test stand-in for Argon2 so tests do not pay for real password hashing.
pub struct PlainCredentials;

impl CredentialVerifier for PlainCredentials {
    fn hash(&self, password: &str) -> Result<String, AppError> {
        Ok(format!("plain:{password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        hash.strip_prefix("plain:") == Some(password)
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        admin_email: ADMIN_EMAIL.to_string(),
        ..AppConfig::default()
    }
}

pub fn state_with_repo(repo: RepositoryState) -> AppState {
    AppState {
        repo,
        credentials: Arc::new(PlainCredentials),
        config: test_config(),
    }
}

pub fn create_test_state() -> AppState {
    state_with_repo(Arc::new(InMemoryRepository::new()))
}

pub async fn register(state: &AppState, email: &str) -> Member {
    MemberService::from_ref(state)
        .register(RegisterMemberRequest {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            username: email.split('@').next().unwrap_or("member").to_string(),
            phone: "010-1111-2222".to_string(),
        })
        .await
        .expect("registration should succeed")
}

/// The identity the request pipeline would resolve for this member.
pub fn identity_of(member: &Member) -> Identity {
    Identity {
        member_id: member.id,
        email: member.email.clone(),
        status: member.status,
        authorities: authorities_from_roles(&member.roles),
    }
}
