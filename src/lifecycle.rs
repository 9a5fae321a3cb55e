use axum::extract::FromRef;

use crate::{
    AppState,
    error::{AppError, LifecycleError, Resource},
    models::{
        Board, Comment, CreateBoardRequest, CreateCommentRequest, NewBoard, NewComment,
        UpdateBoardRequest, UpdateCommentRequest,
    },
    policy::{Action, Identity, evaluate},
    repository::{BoardPatch, QuitOutcome, RepositoryState},
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// page_bounds
///
/// Normalizes client paging parameters: limit defaults to 20 and is clamped to 1..=100,
/// offset defaults to 0 and never goes negative.
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Lifecycle
///
/// The board/comment state machine. Every transition asks `policy::evaluate` first, and
/// every mutating transition asks it again inside the repository's atomic section so the
/// decision is made against the row that is actually written.
#[derive(Clone)]
pub struct Lifecycle {
    repo: RepositoryState,
}

impl FromRef<AppState> for Lifecycle {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.repo.clone())
    }
}

impl Lifecycle {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    fn allow(identity: &Identity, action: Action<'_>) -> Result<(), LifecycleError> {
        let decision = evaluate(identity, action);
        decision.into_result().inspect_err(|reason| {
            tracing::debug!(member_id = identity.member_id, ?reason, "Policy denied action");
        })
    }

    async fn board_or_not_found(&self, id: i64) -> Result<Board, AppError> {
        self.repo
            .find_board(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(Resource::Board).into())
    }

    // --- Boards ---

    pub async fn create_board(
        &self,
        identity: &Identity,
        req: CreateBoardRequest,
    ) -> Result<Board, AppError> {
        Self::allow(identity, Action::CreateBoard)?;
        require_text("title", &req.title)?;
        require_text("content", &req.content)?;

        let board = self
            .repo
            .insert_board(NewBoard {
                member_id: identity.member_id,
                title: req.title,
                content: req.content,
                visibility: req.visibility.unwrap_or_default(),
            })
            .await?;

        tracing::info!(board_id = board.id, member_id = identity.member_id, "Board registered");
        Ok(board)
    }

    /// read_board
    ///
    /// Checks visibility, then counts the view with a single atomic increment. Returns
    /// the board as it is after the increment, with its answer if one is attached.
    pub async fn read_board(
        &self,
        identity: &Identity,
        id: i64,
    ) -> Result<(Board, Option<Comment>), AppError> {
        let board = self.board_or_not_found(id).await?;
        Self::allow(identity, Action::ReadBoard(&board))?;

        // Deleted between the check and the increment.
        let board = self
            .repo
            .increment_views(id)
            .await?
            .ok_or(LifecycleError::NotFound(Resource::Board))?;

        let comment = match board.comment_id {
            Some(comment_id) => self.repo.find_comment(comment_id).await?,
            None => None,
        };
        Ok((board, comment))
    }

    pub async fn update_board(
        &self,
        identity: &Identity,
        id: i64,
        req: UpdateBoardRequest,
    ) -> Result<Board, AppError> {
        for (field, value) in [("title", &req.title), ("content", &req.content)] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }

        let patch = BoardPatch {
            title: req.title,
            content: req.content,
            visibility: req.visibility,
        };
        let guard = |board: &Board| Self::allow(identity, Action::UpdateBoard(board));
        Ok(self.repo.update_board(id, patch, &guard).await?)
    }

    pub async fn delete_board(&self, identity: &Identity, id: i64) -> Result<Board, AppError> {
        let guard = |board: &Board| Self::allow(identity, Action::DeleteBoard(board));
        let board = self.repo.delete_board(id, &guard).await?;

        tracing::info!(board_id = id, member_id = identity.member_id, "Board deleted");
        Ok(board)
    }

    pub async fn list_boards(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Board>, AppError> {
        let (limit, offset) = page_bounds(limit, offset);
        Ok(self.repo.list_boards(limit, offset).await?)
    }

    pub async fn boards_by_member(
        &self,
        identity: &Identity,
        member_id: i64,
    ) -> Result<Vec<Board>, AppError> {
        Self::allow(identity, Action::ViewMember(member_id))?;
        Ok(self.repo.boards_by_member(member_id).await?)
    }

    // --- Comments ---

    pub async fn create_comment(
        &self,
        identity: &Identity,
        board_id: i64,
        req: CreateCommentRequest,
    ) -> Result<(Board, Comment), AppError> {
        Self::allow(identity, Action::ModerateComments)?;
        require_text("content", &req.content)?;

        let comment = NewComment {
            member_id: identity.member_id,
            content: req.content,
        };
        let guard = |board: &Board| Self::allow(identity, Action::CreateComment(board));
        let (board, comment) = self.repo.attach_comment(board_id, comment, &guard).await?;

        tracing::info!(board_id, comment_id = comment.id, "Question answered");
        Ok((board, comment))
    }

    pub async fn update_comment(
        &self,
        identity: &Identity,
        board_id: i64,
        req: UpdateCommentRequest,
    ) -> Result<(Board, Comment), AppError> {
        Self::allow(identity, Action::ModerateComments)?;
        if let Some(content) = &req.content {
            require_text("content", content)?;
        }

        let guard = |board: &Board| Self::allow(identity, Action::UpdateComment(board));
        Ok(self.repo.revise_comment(board_id, req.content, &guard).await?)
    }

    pub async fn delete_comment(&self, identity: &Identity, board_id: i64) -> Result<Board, AppError> {
        Self::allow(identity, Action::ModerateComments)?;

        let guard = |board: &Board| Self::allow(identity, Action::DeleteComment(board));
        let board = self.repo.detach_comment(board_id, &guard).await?;

        tracing::info!(board_id, "Answer removed, question reopened");
        Ok(board)
    }

    // --- Members ---

    /// member_quit
    ///
    /// Marks the member QUIT and deactivates their boards in one atomic step.
    pub async fn member_quit(&self, identity: &Identity, member_id: i64) -> Result<QuitOutcome, AppError> {
        Self::allow(identity, Action::ManageMember(member_id))?;
        let outcome = self.repo.quit_member(member_id).await?;

        tracing::info!(
            member_id,
            deactivated = outcome.deactivated,
            "Member quit, boards deactivated"
        );
        Ok(outcome)
    }
}
