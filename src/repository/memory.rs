use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{BoardGuard, BoardPatch, QuitOutcome, Repository};
use crate::{
    error::{LifecycleError, MEMBER_EMAIL_KEY, Resource, StoreError},
    models::{
        Board, BoardStatus, Comment, CommentStatus, Member, MemberPatch, MemberStatus, NewBoard,
        NewComment, NewMember,
    },
};

#[derive(Default)]
struct Store {
    members: BTreeMap<i64, Member>,
    boards: BTreeMap<i64, Board>,
    comments: BTreeMap<i64, Comment>,
    next_member_id: i64,
    next_board_id: i64,
    next_comment_id: i64,
}

impl Store {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }

    // Looks up the board and runs the guard against it, returning a mutable handle.
    fn guarded_board(&mut self, id: i64, guard: BoardGuard<'_>) -> Result<&mut Board, StoreError> {
        let board = self
            .boards
            .get_mut(&id)
            .ok_or(LifecycleError::NotFound(Resource::Board))?;
        guard(board)?;
        Ok(board)
    }
}

/// InMemoryRepository
///
/// `Repository` backed by ordered maps behind one async mutex. The lock is held for the
/// whole read-check-write of every call, which gives the same serialization the Postgres
/// adapter gets from `SELECT ... FOR UPDATE`. Used for local runs without a database and in tests.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(boards: &mut [Board]) {
    boards.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_member(&self, member: NewMember) -> Result<Member, StoreError> {
        let mut store = self.store.lock().await;
        if store.members.values().any(|m| m.email == member.email) {
            return Err(StoreError::Conflict {
                constraint: MEMBER_EMAIL_KEY.to_string(),
            });
        }

        let now = Utc::now();
        let id = Store::next_id(&mut store.next_member_id);
        let member = Member {
            id,
            email: member.email,
            password_hash: member.password_hash,
            username: member.username,
            phone: member.phone,
            status: MemberStatus::Active,
            roles: member.roles,
            created_at: now,
            updated_at: now,
        };
        store.members.insert(id, member.clone());
        Ok(member)
    }

    async fn find_member(&self, id: i64) -> Result<Option<Member>, StoreError> {
        Ok(self.store.lock().await.members.get(&id).cloned())
    }

    async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError> {
        let store = self.store.lock().await;
        Ok(store.members.values().find(|m| m.email == email).cloned())
    }

    async fn list_members(&self, limit: i64, offset: i64) -> Result<Vec<Member>, StoreError> {
        let store = self.store.lock().await;
        Ok(page(store.members.values().cloned().collect(), limit, offset))
    }

    async fn update_member(&self, id: i64, patch: MemberPatch) -> Result<Member, StoreError> {
        let mut store = self.store.lock().await;
        let member = store
            .members
            .get_mut(&id)
            .filter(|m| m.status != MemberStatus::Quit)
            .ok_or(LifecycleError::NotFound(Resource::Member))?;

        if let Some(username) = patch.username {
            member.username = username;
        }
        if let Some(phone) = patch.phone {
            member.phone = phone;
        }
        if let Some(password_hash) = patch.password_hash {
            member.password_hash = password_hash;
        }
        member.updated_at = Utc::now();
        Ok(member.clone())
    }

    async fn quit_member(&self, id: i64) -> Result<QuitOutcome, StoreError> {
        let mut store = self.store.lock().await;
        let now = Utc::now();

        let member = store
            .members
            .get_mut(&id)
            .filter(|m| m.status != MemberStatus::Quit)
            .ok_or(LifecycleError::NotFound(Resource::Member))?;
        member.status = MemberStatus::Quit;
        member.updated_at = now;
        let member = member.clone();

        let mut deactivated = 0;
        for board in store.boards.values_mut() {
            if board.member_id == id && board.status != BoardStatus::Deleted {
                board.status = BoardStatus::Deactivated;
                board.updated_at = now;
                deactivated += 1;
            }
        }

        Ok(QuitOutcome { member, deactivated })
    }

    async fn insert_board(&self, board: NewBoard) -> Result<Board, StoreError> {
        let mut store = self.store.lock().await;
        let now = Utc::now();
        let id = Store::next_id(&mut store.next_board_id);
        let board = Board {
            id,
            member_id: board.member_id,
            title: board.title,
            content: board.content,
            visibility: board.visibility,
            status: BoardStatus::Registered,
            comment_id: None,
            view_count: 0,
            like_count: 0,
            created_at: now,
            updated_at: now,
        };
        store.boards.insert(id, board.clone());
        Ok(board)
    }

    async fn find_board(&self, id: i64) -> Result<Option<Board>, StoreError> {
        Ok(self.store.lock().await.boards.get(&id).cloned())
    }

    async fn list_boards(&self, limit: i64, offset: i64) -> Result<Vec<Board>, StoreError> {
        let store = self.store.lock().await;
        let mut boards: Vec<Board> = store
            .boards
            .values()
            .filter(|b| b.status != BoardStatus::Deleted)
            .cloned()
            .collect();
        newest_first(&mut boards);
        Ok(page(boards, limit, offset))
    }

    async fn boards_by_member(&self, member_id: i64) -> Result<Vec<Board>, StoreError> {
        let store = self.store.lock().await;
        let mut boards: Vec<Board> = store
            .boards
            .values()
            .filter(|b| b.member_id == member_id)
            .cloned()
            .collect();
        newest_first(&mut boards);
        Ok(boards)
    }

    async fn increment_views(&self, id: i64) -> Result<Option<Board>, StoreError> {
        let mut store = self.store.lock().await;
        Ok(store
            .boards
            .get_mut(&id)
            .filter(|b| b.status != BoardStatus::Deleted)
            .map(|board| {
                board.view_count += 1;
                board.clone()
            }))
    }

    async fn update_board(
        &self,
        id: i64,
        patch: BoardPatch,
        guard: BoardGuard<'_>,
    ) -> Result<Board, StoreError> {
        let mut store = self.store.lock().await;
        let board = store.guarded_board(id, guard)?;

        if let Some(title) = patch.title {
            board.title = title;
        }
        if let Some(content) = patch.content {
            board.content = content;
        }
        if let Some(visibility) = patch.visibility {
            board.visibility = visibility;
        }
        board.updated_at = Utc::now();
        Ok(board.clone())
    }

    async fn delete_board(&self, id: i64, guard: BoardGuard<'_>) -> Result<Board, StoreError> {
        let mut store = self.store.lock().await;
        let board = store.guarded_board(id, guard)?;
        board.status = BoardStatus::Deleted;
        board.updated_at = Utc::now();
        Ok(board.clone())
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>, StoreError> {
        Ok(self.store.lock().await.comments.get(&id).cloned())
    }

    async fn attach_comment(
        &self,
        board_id: i64,
        comment: NewComment,
        guard: BoardGuard<'_>,
    ) -> Result<(Board, Comment), StoreError> {
        let mut store = self.store.lock().await;
        store.guarded_board(board_id, guard)?;

        let now = Utc::now();
        let id = Store::next_id(&mut store.next_comment_id);
        let comment = Comment {
            id,
            board_id,
            member_id: comment.member_id,
            content: comment.content,
            status: CommentStatus::Registered,
            created_at: now,
            updated_at: now,
        };
        store.comments.insert(id, comment.clone());

        let board = store
            .boards
            .get_mut(&board_id)
            .ok_or(LifecycleError::NotFound(Resource::Board))?;
        board.comment_id = Some(id);
        board.status = BoardStatus::Answered;
        board.updated_at = now;
        Ok((board.clone(), comment))
    }

    async fn revise_comment(
        &self,
        board_id: i64,
        content: Option<String>,
        guard: BoardGuard<'_>,
    ) -> Result<(Board, Comment), StoreError> {
        let mut store = self.store.lock().await;
        let board = store.guarded_board(board_id, guard)?.clone();
        let comment_id = board
            .comment_id
            .ok_or(LifecycleError::NotFound(Resource::Comment))?;
        let comment = store
            .comments
            .get_mut(&comment_id)
            .ok_or(LifecycleError::NotFound(Resource::Comment))?;

        if let Some(content) = content {
            comment.content = content;
            comment.updated_at = Utc::now();
        }
        Ok((board, comment.clone()))
    }

    async fn detach_comment(&self, board_id: i64, guard: BoardGuard<'_>) -> Result<Board, StoreError> {
        let mut store = self.store.lock().await;
        let comment_id = store
            .guarded_board(board_id, guard)?
            .comment_id
            .ok_or(LifecycleError::NotFound(Resource::Comment))?;
        store.comments.remove(&comment_id);

        let board = store
            .boards
            .get_mut(&board_id)
            .ok_or(LifecycleError::NotFound(Resource::Board))?;
        board.comment_id = None;
        board.status = BoardStatus::Registered;
        board.updated_at = Utc::now();
        Ok(board.clone())
    }
}
