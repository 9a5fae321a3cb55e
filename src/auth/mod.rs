//! Stateless token authentication: issuing and verifying tokens, resolving roles,
//! logging members in, attaching an `AuthResult` to every request and rejecting
//! requests that need an identity but do not have one.

pub mod authority;
pub mod decision;
pub mod gate;
pub mod request;
pub mod token;

pub use gate::{Argon2Credentials, AuthenticationGate, CredentialState, CredentialVerifier, IssuedTokens};
pub use request::{AuthContext, AuthResult, AuthUser, authenticate};
