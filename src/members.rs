use axum::extract::FromRef;

use crate::{
    AppState,
    auth::{CredentialState, authority::AuthorityResolver},
    error::{AppError, LifecycleError, Resource},
    lifecycle::page_bounds,
    models::{Member, MemberPatch, NewMember, RegisterMemberRequest, UpdateMemberRequest},
    policy::{Action, Identity, evaluate},
    repository::RepositoryState,
};

/// MemberService
///
/// Registration and profile management. Role assignment happens exactly once, here,
/// from the registering email.
#[derive(Clone)]
pub struct MemberService {
    repo: RepositoryState,
    credentials: CredentialState,
    resolver: AuthorityResolver,
}

impl FromRef<AppState> for MemberService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.repo.clone(),
            state.credentials.clone(),
            AuthorityResolver::new(state.config.admin_email.clone()),
        )
    }
}

impl MemberService {
    pub fn new(repo: RepositoryState, credentials: CredentialState, resolver: AuthorityResolver) -> Self {
        Self {
            repo,
            credentials,
            resolver,
        }
    }

    pub async fn register(&self, req: RegisterMemberRequest) -> Result<Member, AppError> {
        for (field, value) in [
            ("email", &req.email),
            ("password", &req.password),
            ("username", &req.username),
            ("phone", &req.phone),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::BadRequest(format!("{field} must not be blank")));
            }
        }

        if self.repo.find_member_by_email(&req.email).await?.is_some() {
            return Err(LifecycleError::MemberExists.into());
        }

        let roles = self
            .resolver
            .roles_for_email(&req.email)
            .iter()
            .map(|role| role.as_str().to_string())
            .collect();

        let member = self
            .repo
            .create_member(NewMember {
                password_hash: self.credentials.hash(&req.password)?,
                email: req.email,
                username: req.username,
                phone: req.phone,
                roles,
            })
            .await?;

        tracing::info!(member_id = member.id, roles = ?member.roles, "Member registered");
        Ok(member)
    }

    pub async fn find(&self, identity: &Identity, id: i64) -> Result<Member, AppError> {
        evaluate(identity, Action::ViewMember(id)).into_result()?;
        self.repo
            .find_member(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(Resource::Member).into())
    }

    pub async fn update(
        &self,
        identity: &Identity,
        id: i64,
        req: UpdateMemberRequest,
    ) -> Result<Member, AppError> {
        evaluate(identity, Action::ManageMember(id)).into_result()?;

        let password_hash = match req.password.as_deref() {
            Some(password) if password.trim().is_empty() => {
                return Err(AppError::BadRequest("password must not be blank".into()));
            }
            Some(password) => Some(self.credentials.hash(password)?),
            None => None,
        };

        let patch = MemberPatch {
            username: req.username,
            phone: req.phone,
            password_hash,
        };
        Ok(self.repo.update_member(id, patch).await?)
    }

    pub async fn list(
        &self,
        identity: &Identity,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Member>, AppError> {
        evaluate(identity, Action::ListMembers).into_result()?;
        let (limit, offset) = page_bounds(limit, offset);
        Ok(self.repo.list_members(limit, offset).await?)
    }
}
