use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    error::{LifecycleError, StoreError},
    models::{Board, Comment, Member, MemberPatch, NewBoard, NewComment, NewMember, Visibility},
};

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// BoardGuard
///
/// A policy check run against the board row *as locked by the repository*. If it
/// returns an error the mutation is abandoned and nothing is written.
pub type BoardGuard<'a> = &'a (dyn Fn(&Board) -> Result<(), LifecycleError> + Send + Sync);

/// BoardPatch
///
/// Partial edit of a board's author-controlled fields. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct BoardPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub visibility: Option<Visibility>,
}

/// QuitOutcome
///
/// The member after the quit, and how many of their boards were deactivated with it.
#[derive(Debug, Clone)]
pub struct QuitOutcome {
    pub member: Member,
    pub deactivated: u64,
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so handlers and the
/// lifecycle never know whether they run on Postgres or on the in-memory store.
///
/// **Atomicity**: every method that takes a `BoardGuard` performs lock, check and write
/// as one unit. Two callers racing on the same board are serialized, and the loser's
/// guard sees the winner's write.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Members ---
    // Fails with `Conflict` if the email is already registered.
    async fn create_member(&self, member: NewMember) -> Result<Member, StoreError>;
    async fn find_member(&self, id: i64) -> Result<Option<Member>, StoreError>;
    async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError>;
    async fn list_members(&self, limit: i64, offset: i64) -> Result<Vec<Member>, StoreError>;
    // Missing or QUIT members are `NotFound`.
    async fn update_member(&self, id: i64, patch: MemberPatch) -> Result<Member, StoreError>;
    // Sets QUIT and deactivates every non-DELETED board of the member in one transaction.
    async fn quit_member(&self, id: i64) -> Result<QuitOutcome, StoreError>;

    // --- Boards ---
    async fn insert_board(&self, board: NewBoard) -> Result<Board, StoreError>;
    async fn find_board(&self, id: i64) -> Result<Option<Board>, StoreError>;
    // Non-deleted boards, newest first.
    async fn list_boards(&self, limit: i64, offset: i64) -> Result<Vec<Board>, StoreError>;
    // Every board of the member, any status, newest first.
    async fn boards_by_member(&self, member_id: i64) -> Result<Vec<Board>, StoreError>;
    // Single-statement `view_count + 1`. `None` if the board is missing or DELETED.
    async fn increment_views(&self, id: i64) -> Result<Option<Board>, StoreError>;

    // --- Guarded Board Mutations ---
    async fn update_board(
        &self,
        id: i64,
        patch: BoardPatch,
        guard: BoardGuard<'_>,
    ) -> Result<Board, StoreError>;
    // Soft delete: status DELETED, attached comment kept.
    async fn delete_board(&self, id: i64, guard: BoardGuard<'_>) -> Result<Board, StoreError>;

    // --- Comments ---
    async fn find_comment(&self, id: i64) -> Result<Option<Comment>, StoreError>;
    // Inserts the comment and moves the board to ANSWERED.
    async fn attach_comment(
        &self,
        board_id: i64,
        comment: NewComment,
        guard: BoardGuard<'_>,
    ) -> Result<(Board, Comment), StoreError>;
    // Edits the attached comment. A board without one is `NotFound(Comment)`.
    async fn revise_comment(
        &self,
        board_id: i64,
        content: Option<String>,
        guard: BoardGuard<'_>,
    ) -> Result<(Board, Comment), StoreError>;
    // Removes the comment row, clears `comment_id` and moves the board back to REGISTERED.
    async fn detach_comment(&self, board_id: i64, guard: BoardGuard<'_>) -> Result<Board, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
