use crate::{
    auth::authority::AuthoritySet,
    error::{LifecycleError, Resource},
    models::{Board, BoardStatus, MemberStatus, Visibility},
};

/// Identity
///
/// Who is asking: resolved fresh on every request from the verified token subject plus
/// a member lookup. Never cached between requests.
#[derive(Debug, Clone)]
pub struct Identity {
    pub member_id: i64,
    pub email: String,
    pub status: MemberStatus,
    pub authorities: AuthoritySet,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.authorities.is_admin()
    }

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    // The ADMIN role only counts while the member is ACTIVE; a token issued before
    // the member quit keeps its roles claim until it expires.
    fn acts_as_admin(&self) -> bool {
        self.is_admin() && self.is_active()
    }

    pub fn owns(&self, board: &Board) -> bool {
        board.member_id == self.member_id
    }
}

/// Action
///
/// Everything the lifecycle can be asked to do, paired with the record it applies to.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    CreateBoard,
    // Any comment operation, checked before the board is even looked up.
    ModerateComments,
    ReadBoard(&'a Board),
    UpdateBoard(&'a Board),
    DeleteBoard(&'a Board),
    CreateComment(&'a Board),
    UpdateComment(&'a Board),
    DeleteComment(&'a Board),
    // Profile, boards-by-member.
    ViewMember(i64),
    // Profile update, quit.
    ManageMember(i64),
    ListMembers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(LifecycleError),
}

impl Decision {
    pub fn into_result(self) -> Result<(), LifecycleError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(reason),
        }
    }
}

fn deny_if(cond: bool, reason: LifecycleError) -> Result<(), LifecycleError> {
    if cond { Err(reason) } else { Ok(()) }
}

/// evaluate
///
/// The single place where role, ownership and status rules are decided. Checks run in
/// a fixed order per action and the first failing one wins, so e.g. a DELETED board is
/// `NotFound` even to a requester who could not otherwise see it.
pub fn evaluate(identity: &Identity, action: Action<'_>) -> Decision {
    match check(identity, action) {
        Ok(()) => Decision::Allow,
        Err(reason) => Decision::Deny(reason),
    }
}

fn check(identity: &Identity, action: Action<'_>) -> Result<(), LifecycleError> {
    use LifecycleError::*;

    match action {
        Action::CreateBoard => deny_if(!identity.is_active(), MemberForbidden),

        Action::ModerateComments => deny_if(!identity.acts_as_admin(), MemberForbidden),

        Action::ReadBoard(board) => {
            deny_if(board.status == BoardStatus::Deleted, NotFound(Resource::Board))?;
            deny_if(
                board.visibility == Visibility::Secret
                    && !identity.owns(board)
                    && !identity.acts_as_admin(),
                Unauthorized,
            )
        }

        Action::UpdateBoard(board) => {
            deny_if(!identity.owns(board), Unauthorized)?;
            deny_if(board.status == BoardStatus::Deleted, NotFound(Resource::Board))?;
            deny_if(
                board.status.is_terminal() || board.status == BoardStatus::Answered,
                CannotChangeBoard,
            )
        }

        Action::DeleteBoard(board) => {
            deny_if(!identity.owns(board), Unauthorized)?;
            deny_if(board.status == BoardStatus::Deleted, NotFound(Resource::Board))?;
            deny_if(board.status.is_terminal(), CannotChangeBoard)
        }

        Action::CreateComment(board) => {
            deny_if(!identity.acts_as_admin(), MemberForbidden)?;
            deny_if(board.status != BoardStatus::Registered, CannotLeaveComment)
        }

        Action::UpdateComment(board) => {
            deny_if(!identity.acts_as_admin(), MemberForbidden)?;
            deny_if(board.status == BoardStatus::Deleted, NotFound(Resource::Board))?;
            deny_if(board.comment_id.is_none(), NotFound(Resource::Comment))
        }

        Action::DeleteComment(board) => {
            deny_if(!identity.acts_as_admin(), MemberForbidden)?;
            deny_if(board.status == BoardStatus::Deleted, NotFound(Resource::Board))?;
            deny_if(board.status.is_terminal(), CannotChangeBoard)?;
            deny_if(board.comment_id.is_none(), NotFound(Resource::Comment))
        }

        Action::ViewMember(member_id) => deny_if(
            identity.member_id != member_id && !identity.acts_as_admin(),
            Unauthorized,
        ),

        Action::ManageMember(member_id) => {
            deny_if(!identity.is_active(), MemberForbidden)?;
            deny_if(
                identity.member_id != member_id && !identity.acts_as_admin(),
                Unauthorized,
            )
        }

        Action::ListMembers => deny_if(!identity.acts_as_admin(), MemberForbidden),
    }
}
