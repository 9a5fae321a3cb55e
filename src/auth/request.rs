use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{HeaderValue, header, request::Parts},
    middleware::Next,
    response::Response,
};

use super::{
    authority::{AuthoritySet, authorities_from_roles},
    decision,
    token::{self, TokenError},
};
use crate::{
    config::AppConfig,
    error::{AppError, LifecycleError, Resource},
    policy::Identity,
    repository::RepositoryState,
};

const BEARER_SCHEME: &str = "Bearer";
const BEARER_PREFIX: &str = "Bearer ";

/// AuthContext
///
/// What a verified access token says about its bearer: the subject email and the
/// authorities derived from its roles claim.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub authorities: AuthoritySet,
}

/// AuthResult
///
/// The outcome of per-request authentication, stored in the request extensions.
/// Failures are carried here rather than answered immediately; only a handler that
/// needs an identity turns `Anonymous`/`Rejected` into a 401.
#[derive(Debug, Clone)]
pub enum AuthResult {
    Authenticated(AuthContext),
    Anonymous,
    Rejected(TokenError),
}

/// resolve_header
///
/// Pure mapping from an `Authorization` header value to an `AuthResult`.
pub fn resolve_header(value: Option<&HeaderValue>, secret: &str) -> AuthResult {
    let Some(value) = value else {
        return AuthResult::Anonymous;
    };
    let Ok(value) = value.to_str() else {
        return AuthResult::Rejected(TokenError::Malformed("non-ASCII authorization header".into()));
    };
    if !value.starts_with(BEARER_SCHEME) {
        return AuthResult::Anonymous;
    }
    let Some(raw) = value.strip_prefix(BEARER_PREFIX) else {
        return AuthResult::Rejected(TokenError::Malformed("bearer scheme without a token".into()));
    };

    match verify_access_token(raw.trim(), secret) {
        Ok(context) => AuthResult::Authenticated(context),
        Err(e) => AuthResult::Rejected(e),
    }
}

fn verify_access_token(raw: &str, secret: &str) -> Result<AuthContext, TokenError> {
    let verified = token::verify(raw, secret)?;
    let roles = verified
        .roles()
        .ok_or_else(|| TokenError::Malformed("missing or invalid roles claim".into()))?;

    Ok(AuthContext {
        subject: verified.subject,
        authorities: authorities_from_roles(&roles),
    })
}

/// authenticate
///
/// Middleware layered over the whole router. Never rejects: it only records an
/// `AuthResult` for the request and hands it on.
pub async fn authenticate(
    State(config): State<AppConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let result = resolve_header(
        request.headers().get(header::AUTHORIZATION),
        &config.jwt_secret,
    );
    request.extensions_mut().insert(result);
    next.run(request).await
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Handlers take it as an argument;
/// its presence in a signature is what makes a route require authentication.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
}

/// AuthUser Extractor Implementation
///
/// The process involves:
/// 0. Reuse: a route guard that already resolved the identity leaves it in the
///    extensions, and it is returned without touching the store again.
/// 1. Reading the `AuthResult` left by the `authenticate` middleware.
/// 2. Handing anything other than `Authenticated` to the access decision point.
/// 3. DB Lookup: resolving the token subject to a member so the identity carries a
///    current member id and status.
///
/// Rejection: 401 for missing/invalid tokens, 404 if the subject no longer exists.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 0. Already resolved by the route guard
        if let Some(auth_user) = parts.extensions.get::<AuthUser>() {
            return Ok(auth_user.clone());
        }

        // 1. Authentication outcome
        // A request that never passed the middleware is treated as anonymous.
        let result = parts
            .extensions
            .get::<AuthResult>()
            .cloned()
            .unwrap_or(AuthResult::Anonymous);

        // 2. Deferred rejection
        let context = match result {
            AuthResult::Authenticated(context) => context,
            other => return Err(decision::unauthenticated(&other)),
        };

        // 3. Database Lookup
        let repo = RepositoryState::from_ref(state);
        let member = repo
            .find_member_by_email(&context.subject)
            .await?
            .ok_or(LifecycleError::NotFound(Resource::Member))?;

        Ok(AuthUser {
            identity: Identity {
                member_id: member.id,
                email: member.email,
                status: member.status,
                authorities: context.authorities,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    const SECRET: &str = "request-test-secret";

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    fn access_token(roles: serde_json::Value) -> String {
        let mut claims = Map::new();
        claims.insert(token::ROLES_CLAIM.into(), roles);
        token::issue(&claims, "hgd@gmail.com", token::expiry_after(5), SECRET).unwrap()
    }

    #[test]
    fn missing_or_non_bearer_header_is_anonymous() {
        assert!(matches!(resolve_header(None, SECRET), AuthResult::Anonymous));
        assert!(matches!(
            resolve_header(Some(&header("Basic abc")), SECRET),
            AuthResult::Anonymous
        ));
    }

    #[test]
    fn bearer_scheme_needs_a_separating_space() {
        let token = access_token(json!(["USER"]));
        assert!(matches!(
            resolve_header(Some(&header(&format!("Bearer{token}"))), SECRET),
            AuthResult::Rejected(TokenError::Malformed(_))
        ));
        assert!(matches!(
            resolve_header(Some(&header("BearerXYZ")), SECRET),
            AuthResult::Rejected(TokenError::Malformed(_))
        ));
        assert!(matches!(
            resolve_header(Some(&header(&format!("Bearer  {token}"))), SECRET),
            AuthResult::Authenticated(_)
        ));
    }

    #[test]
    fn valid_bearer_token_is_authenticated_with_prefixed_authorities() {
        let value = header(&format!("Bearer {}", access_token(json!(["ADMIN", "USER"]))));
        match resolve_header(Some(&value), SECRET) {
            AuthResult::Authenticated(ctx) => {
                assert_eq!(ctx.subject, "hgd@gmail.com");
                assert!(ctx.authorities.is_admin());
            }
            other => panic!("expected Authenticated, got {other:?}"),
        }
    }

    #[test]
    fn token_without_roles_claim_is_malformed() {
        let refresh = token::issue(&Map::new(), "hgd@gmail.com", token::expiry_after(5), SECRET).unwrap();
        let value = header(&format!("Bearer {refresh}"));
        assert!(matches!(
            resolve_header(Some(&value), SECRET),
            AuthResult::Rejected(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let value = header(&format!("Bearer {}", access_token(json!(["USER"]))));
        assert!(matches!(
            resolve_header(Some(&value), "other-secret"),
            AuthResult::Rejected(TokenError::SignatureInvalid)
        ));
    }
}
