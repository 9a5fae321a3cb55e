use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use super::{BoardGuard, BoardPatch, QuitOutcome, Repository};
use crate::{
    error::{LifecycleError, Resource, StoreError},
    models::{
        Board, BoardStatus, Comment, Member, MemberPatch, NewBoard, NewComment, NewMember,
        ParseStatusError,
    },
};

const MEMBER_COLUMNS: &str =
    "id, email, password_hash, username, phone, status, roles, created_at, updated_at";
const BOARD_COLUMNS: &str = "id, member_id, title, content, visibility, status, comment_id, \
     view_count, like_count, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, board_id, member_id, content, status, created_at, updated_at";

// --- Row Mapping ---
// Status columns are TEXT; they are parsed into the domain enums when a row is read.

#[derive(FromRow)]
struct MemberRow {
    id: i64,
    email: String,
    password_hash: String,
    username: String,
    phone: String,
    status: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for Member {
    type Error = ParseStatusError;

    fn try_from(row: MemberRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            username: row.username,
            phone: row.phone,
            status: row.status.parse()?,
            roles: row.roles,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct BoardRow {
    id: i64,
    member_id: i64,
    title: String,
    content: String,
    visibility: String,
    status: String,
    comment_id: Option<i64>,
    view_count: i64,
    like_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BoardRow> for Board {
    type Error = ParseStatusError;

    fn try_from(row: BoardRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            member_id: row.member_id,
            title: row.title,
            content: row.content,
            visibility: row.visibility.parse()?,
            status: row.status.parse()?,
            comment_id: row.comment_id,
            view_count: row.view_count,
            like_count: row.like_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: i64,
    board_id: i64,
    member_id: i64,
    content: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = ParseStatusError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            board_id: row.board_id,
            member_id: row.member_id,
            content: row.content,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<ParseStatusError> for StoreError {
    fn from(e: ParseStatusError) -> Self {
        Self::Database(e.to_string())
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = ParseStatusError>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(StoreError::from))
        .collect()
}

fn logged(op: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!("{} error: {:?}", op, e);
        StoreError::from(e)
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Guarded mutations open a transaction, lock the board row with `FOR UPDATE`, run the
/// guard against the locked row and only then write. Dropping an uncommitted
/// transaction rolls it back.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations under `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    // Opens a transaction, locks the board and runs the guard against it.
    async fn lock_board(
        &self,
        id: i64,
        guard: BoardGuard<'_>,
    ) -> Result<(Transaction<'static, Postgres>, Board), StoreError> {
        let mut tx = self.pool.begin().await.map_err(logged("begin"))?;

        let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(logged("lock_board"))?
            .ok_or(LifecycleError::NotFound(Resource::Board))?;
        let board = Board::try_from(row)?;

        guard(&board)?;
        Ok((tx, board))
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn create_member(&self, member: NewMember) -> Result<Member, StoreError> {
        let sql = format!(
            "INSERT INTO members (email, password_hash, username, phone, status, roles) \
             VALUES ($1, $2, $3, $4, 'ACTIVE', $5) RETURNING {MEMBER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(&member.email)
            .bind(&member.password_hash)
            .bind(&member.username)
            .bind(&member.phone)
            .bind(&member.roles)
            .fetch_one(&self.pool)
            .await
            .map_err(logged("create_member"))?;
        Ok(row.try_into()?)
    }

    async fn find_member(&self, id: i64) -> Result<Option<Member>, StoreError> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = $1");
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("find_member"))?;
        Ok(row.map(Member::try_from).transpose()?)
    }

    async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, StoreError> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE email = $1");
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("find_member_by_email"))?;
        Ok(row.map(Member::try_from).transpose()?)
    }

    async fn list_members(&self, limit: i64, offset: i64) -> Result<Vec<Member>, StoreError> {
        let sql = format!("SELECT {MEMBER_COLUMNS} FROM members ORDER BY id LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("list_members"))?;
        convert_all(rows)
    }

    /// update_member
    ///
    /// Uses COALESCE so omitted fields keep their current value.
    async fn update_member(&self, id: i64, patch: MemberPatch) -> Result<Member, StoreError> {
        let sql = format!(
            "UPDATE members SET \
                username = COALESCE($2, username), \
                phone = COALESCE($3, phone), \
                password_hash = COALESCE($4, password_hash), \
                updated_at = NOW() \
             WHERE id = $1 AND status <> 'QUIT' \
             RETURNING {MEMBER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(id)
            .bind(patch.username)
            .bind(patch.phone)
            .bind(patch.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("update_member"))?
            .ok_or(LifecycleError::NotFound(Resource::Member))?;
        Ok(row.try_into()?)
    }

    async fn quit_member(&self, id: i64) -> Result<QuitOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(logged("begin"))?;

        let sql = format!(
            "UPDATE members SET status = 'QUIT', updated_at = NOW() \
             WHERE id = $1 AND status <> 'QUIT' RETURNING {MEMBER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(logged("quit_member"))?
            .ok_or(LifecycleError::NotFound(Resource::Member))?;
        let member = Member::try_from(row)?;

        let deactivated = sqlx::query(
            "UPDATE boards SET status = 'DEACTIVATED', updated_at = NOW() \
             WHERE member_id = $1 AND status <> 'DELETED'",
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(logged("quit_member cascade"))?
        .rows_affected();

        tx.commit().await.map_err(logged("commit"))?;
        Ok(QuitOutcome { member, deactivated })
    }

    async fn insert_board(&self, board: NewBoard) -> Result<Board, StoreError> {
        let sql = format!(
            "INSERT INTO boards (member_id, title, content, visibility, status) \
             VALUES ($1, $2, $3, $4, 'REGISTERED') RETURNING {BOARD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(board.member_id)
            .bind(&board.title)
            .bind(&board.content)
            .bind(board.visibility.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(logged("insert_board"))?;
        Ok(row.try_into()?)
    }

    async fn find_board(&self, id: i64) -> Result<Option<Board>, StoreError> {
        let sql = format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = $1");
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("find_board"))?;
        Ok(row.map(Board::try_from).transpose()?)
    }

    async fn list_boards(&self, limit: i64, offset: i64) -> Result<Vec<Board>, StoreError> {
        let sql = format!(
            "SELECT {BOARD_COLUMNS} FROM boards WHERE status <> 'DELETED' \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("list_boards"))?;
        convert_all(rows)
    }

    async fn boards_by_member(&self, member_id: i64) -> Result<Vec<Board>, StoreError> {
        let sql = format!(
            "SELECT {BOARD_COLUMNS} FROM boards WHERE member_id = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(member_id)
            .fetch_all(&self.pool)
            .await
            .map_err(logged("boards_by_member"))?;
        convert_all(rows)
    }

    async fn increment_views(&self, id: i64) -> Result<Option<Board>, StoreError> {
        let sql = format!(
            "UPDATE boards SET view_count = view_count + 1 \
             WHERE id = $1 AND status <> 'DELETED' RETURNING {BOARD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("increment_views"))?;
        Ok(row.map(Board::try_from).transpose()?)
    }

    async fn update_board(
        &self,
        id: i64,
        patch: BoardPatch,
        guard: BoardGuard<'_>,
    ) -> Result<Board, StoreError> {
        let (mut tx, _) = self.lock_board(id, guard).await?;

        let sql = format!(
            "UPDATE boards SET \
                title = COALESCE($2, title), \
                content = COALESCE($3, content), \
                visibility = COALESCE($4, visibility), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {BOARD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(id)
            .bind(patch.title)
            .bind(patch.content)
            .bind(patch.visibility.map(|v| v.as_str()))
            .fetch_one(&mut *tx)
            .await
            .map_err(logged("update_board"))?;

        tx.commit().await.map_err(logged("commit"))?;
        Ok(row.try_into()?)
    }

    async fn delete_board(&self, id: i64, guard: BoardGuard<'_>) -> Result<Board, StoreError> {
        let (mut tx, _) = self.lock_board(id, guard).await?;

        let sql = format!(
            "UPDATE boards SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {BOARD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(id)
            .bind(BoardStatus::Deleted.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(logged("delete_board"))?;

        tx.commit().await.map_err(logged("commit"))?;
        Ok(row.try_into()?)
    }

    async fn find_comment(&self, id: i64) -> Result<Option<Comment>, StoreError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(logged("find_comment"))?;
        Ok(row.map(Comment::try_from).transpose()?)
    }

    async fn attach_comment(
        &self,
        board_id: i64,
        comment: NewComment,
        guard: BoardGuard<'_>,
    ) -> Result<(Board, Comment), StoreError> {
        let (mut tx, _) = self.lock_board(board_id, guard).await?;

        let sql = format!(
            "INSERT INTO comments (board_id, member_id, content, status) \
             VALUES ($1, $2, $3, 'REGISTERED') RETURNING {COMMENT_COLUMNS}"
        );
        let comment_row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(board_id)
            .bind(comment.member_id)
            .bind(&comment.content)
            .fetch_one(&mut *tx)
            .await
            .map_err(logged("attach_comment insert"))?;

        let sql = format!(
            "UPDATE boards SET comment_id = $2, status = 'ANSWERED', updated_at = NOW() \
             WHERE id = $1 RETURNING {BOARD_COLUMNS}"
        );
        let board_row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(board_id)
            .bind(comment_row.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(logged("attach_comment link"))?;

        tx.commit().await.map_err(logged("commit"))?;
        Ok((board_row.try_into()?, comment_row.try_into()?))
    }

    async fn revise_comment(
        &self,
        board_id: i64,
        content: Option<String>,
        guard: BoardGuard<'_>,
    ) -> Result<(Board, Comment), StoreError> {
        let (mut tx, board) = self.lock_board(board_id, guard).await?;
        let comment_id = board
            .comment_id
            .ok_or(LifecycleError::NotFound(Resource::Comment))?;

        let sql = format!(
            "UPDATE comments SET \
                content = COALESCE($2, content), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(comment_id)
            .bind(content)
            .fetch_optional(&mut *tx)
            .await
            .map_err(logged("revise_comment"))?
            .ok_or(LifecycleError::NotFound(Resource::Comment))?;

        tx.commit().await.map_err(logged("commit"))?;
        Ok((board, row.try_into()?))
    }

    async fn detach_comment(&self, board_id: i64, guard: BoardGuard<'_>) -> Result<Board, StoreError> {
        let (mut tx, board) = self.lock_board(board_id, guard).await?;
        let comment_id = board
            .comment_id
            .ok_or(LifecycleError::NotFound(Resource::Comment))?;

        // The board's foreign key is cleared before the row it points at is removed.
        let sql = format!(
            "UPDATE boards SET comment_id = NULL, status = 'REGISTERED', updated_at = NOW() \
             WHERE id = $1 RETURNING {BOARD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, BoardRow>(&sql)
            .bind(board_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(logged("detach_comment unlink"))?;

        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await
            .map_err(logged("detach_comment delete"))?;

        tx.commit().await.map_err(logged("commit"))?;
        Ok(row.try_into()?)
    }
}
