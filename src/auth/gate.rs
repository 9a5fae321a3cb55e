use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::extract::FromRef;
use serde_json::{Map, json};
use std::sync::Arc;

use super::token::{self, ROLES_CLAIM, TokenKind};
use crate::{
    AppState,
    config::AppConfig,
    error::AppError,
    models::{LoginRequest, Member, MemberStatus},
    repository::RepositoryState,
};

/// CredentialVerifier
///
/// Password hashing and checking. Kept behind a trait so tests can swap the
/// deliberately slow production hasher for a trivial one.
pub trait CredentialVerifier: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AppError>;
    fn verify(&self, password: &str, hash: &str) -> bool;
}

pub type CredentialState = Arc<dyn CredentialVerifier>;

/// Argon2Credentials
///
/// Argon2id with default parameters and a random salt per hash, stored as a PHC string.
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2Credentials;

impl CredentialVerifier for Argon2Credentials {
    fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// IssuedTokens
///
/// The pair handed back on a successful login.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access: String,
    pub refresh: String,
}

/// AuthenticationGate
///
/// Turns login credentials into a verified member and a fresh token pair. Holds no
/// session state: every token it issues is self-contained.
#[derive(Clone)]
pub struct AuthenticationGate {
    repo: RepositoryState,
    credentials: CredentialState,
    config: AppConfig,
}

impl FromRef<AppState> for AuthenticationGate {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.repo.clone(), state.credentials.clone(), state.config.clone())
    }
}

impl AuthenticationGate {
    pub fn new(repo: RepositoryState, credentials: CredentialState, config: AppConfig) -> Self {
        Self {
            repo,
            credentials,
            config,
        }
    }

    /// attempt
    ///
    /// Unknown email, wrong password and QUIT members are indistinguishable to the caller.
    pub async fn attempt(&self, credentials: &LoginRequest) -> Result<Member, AppError> {
        let member = self
            .repo
            .find_member_by_email(&credentials.email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if member.status == MemberStatus::Quit {
            return Err(AppError::InvalidCredentials);
        }
        if !self.credentials.verify(&credentials.password, &member.password_hash) {
            return Err(AppError::InvalidCredentials);
        }
        Ok(member)
    }

    /// on_success
    ///
    /// Access token: subject + roles claim. Refresh token: subject only.
    pub fn on_success(&self, member: &Member) -> Result<IssuedTokens, AppError> {
        let access = self.access_token_for(member)?;

        let refresh = token::issue(
            &Map::new(),
            &member.email,
            token::expiry_after(TokenKind::Refresh.ttl_minutes(&self.config)),
            &self.config.jwt_secret,
        )?;

        tracing::info!(member_id = member.id, "Login succeeded, tokens issued");
        Ok(IssuedTokens { access, refresh })
    }

    pub fn on_failure(&self, credentials: &LoginRequest) {
        tracing::warn!(email = %credentials.email, "Login failed");
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<IssuedTokens, AppError> {
        match self.attempt(credentials).await {
            Ok(member) => self.on_success(&member),
            Err(AppError::InvalidCredentials) => {
                self.on_failure(credentials);
                Err(AppError::InvalidCredentials)
            }
            Err(other) => Err(other),
        }
    }

    /// refresh
    ///
    /// Exchanges a refresh token for a new access token. Access tokens are refused here
    /// (they carry a roles claim), as are tokens whose member is no longer ACTIVE.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let verified = token::verify(refresh_token, &self.config.jwt_secret).map_err(|e| {
            tracing::warn!(cause = %e, "Refresh token rejected");
            AppError::Unauthenticated
        })?;

        if verified.claims.contains_key(ROLES_CLAIM) {
            tracing::warn!("Access token presented as refresh token");
            return Err(AppError::Unauthenticated);
        }

        let member = self
            .repo
            .find_member_by_email(&verified.subject)
            .await?
            .filter(Member::is_active)
            .ok_or_else(|| {
                tracing::warn!("Refresh token subject is not an active member");
                AppError::Unauthenticated
            })?;

        self.access_token_for(&member)
    }

    fn access_token_for(&self, member: &Member) -> Result<String, AppError> {
        let mut claims = Map::new();
        claims.insert(ROLES_CLAIM.to_string(), json!(member.roles));

        Ok(token::issue(
            &claims,
            &member.email,
            token::expiry_after(TokenKind::Access.ttl_minutes(&self.config)),
            &self.config.jwt_secret,
        )?)
    }
}
