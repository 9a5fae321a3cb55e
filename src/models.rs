use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

/// ParseStatusError
///
/// Raised when a status/role column holds a value the application does not know about.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

// Text-backed enums are stored as their SCREAMING_SNAKE_CASE name in the database
// and serialized the same way over the wire.
macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseStatusError { kind: $kind, value: other.to_string() }),
                }
            }
        }
    };
}

// --- Enumerations ---

/// Role
///
/// Role names as persisted on a member (`"ADMIN"`, `"USER"`). The canonical
/// authority form (`ROLE_ADMIN`) is produced by the authority resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Role {
    Admin,
    User,
}

text_enum!(Role, "role", { Admin => "ADMIN", User => "USER" });

/// MemberStatus
///
/// Only ACTIVE members may post. QUIT is terminal: the row is kept, never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum MemberStatus {
    #[default]
    Active,
    Sleep,
    Quit,
}

text_enum!(MemberStatus, "member status", { Active => "ACTIVE", Sleep => "SLEEP", Quit => "QUIT" });

/// Visibility
///
/// SECRET boards are readable only by their author and by admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum Visibility {
    #[default]
    Public,
    Secret,
}

text_enum!(Visibility, "visibility", { Public => "PUBLIC", Secret => "SECRET" });

/// BoardStatus
///
/// REGISTERED -> ANSWERED when an answer is attached, back to REGISTERED when it is removed.
/// DELETED and DEACTIVATED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum BoardStatus {
    #[default]
    Registered,
    Answered,
    Deleted,
    Deactivated,
}

text_enum!(BoardStatus, "board status", {
    Registered => "REGISTERED",
    Answered => "ANSWERED",
    Deleted => "DELETED",
    Deactivated => "DEACTIVATED",
});

impl BoardStatus {
    /// No transition leaves DELETED or DEACTIVATED.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted | Self::Deactivated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum CommentStatus {
    #[default]
    Registered,
    Deleted,
}

text_enum!(CommentStatus, "comment status", { Registered => "REGISTERED", Deleted => "DELETED" });

// --- Core Records ---

/// Member
///
/// The canonical account record. Carries the password hash, so it is never serialized
/// directly; handlers respond with `MemberResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: i64,
    // Unique and immutable after registration.
    pub email: String,
    pub password_hash: String,
    pub username: String,
    pub phone: String,
    pub status: MemberStatus,
    // Stored role names ("ADMIN", "USER").
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

/// Board
///
/// A posted question. The owning member and the attached answer are plain foreign keys;
/// the reverse direction is only reachable through repository queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub id: i64,
    pub member_id: i64,
    pub title: String,
    pub content: String,
    pub visibility: Visibility,
    pub status: BoardStatus,
    pub comment_id: Option<i64>,
    pub view_count: i64,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment
///
/// The single admin-authored answer to a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: i64,
    pub board_id: i64,
    pub member_id: i64,
    pub content: String,
    pub status: CommentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Repository Inputs ---

#[derive(Debug, Clone)]
pub struct NewMember {
    pub email: String,
    pub password_hash: String,
    pub username: String,
    pub phone: String,
    pub roles: Vec<String>,
}

/// Partial member update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct MemberPatch {
    pub username: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBoard {
    pub member_id: i64,
    pub title: String,
    pub content: String,
    pub visibility: Visibility,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub member_id: i64,
    pub content: String,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterMemberRequest
///
/// Input payload for the public registration endpoint (POST /members).
/// The password is hashed before it reaches the repository and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterMemberRequest {
    #[schema(example = "hgd@gmail.com")]
    pub email: String,
    pub password: String,
    pub username: String,
    #[schema(example = "010-1111-2222")]
    pub phone: String,
}

/// LoginRequest
///
/// Credentials submitted to POST /auth/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// UpdateMemberRequest
///
/// Partial update payload (PATCH /members/{id}). Omitted fields are left unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateMemberRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// CreateBoardRequest
///
/// Input payload for posting a question (POST /boards). Visibility defaults to PUBLIC.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateBoardRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

/// UpdateBoardRequest
///
/// Partial update payload (PATCH /boards/{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateBoardRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

/// CreateCommentRequest
///
/// Input payload for answering a question (POST /boards/{id}/comment).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCommentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

// --- Response Schemas (Output) ---

/// MemberResponse
///
/// Public view of a member. Omits the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct MemberResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub phone: String,
    pub status: MemberStatus,
    pub roles: Vec<String>,
}

impl From<&Member> for MemberResponse {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id,
            email: member.email.clone(),
            username: member.username.clone(),
            phone: member.phone.clone(),
            status: member.status,
            roles: member.roles.clone(),
        }
    }
}

/// QuitResponse
///
/// Result of DELETE /members/{id}: the member (now QUIT) and how many boards were deactivated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct QuitResponse {
    pub member: MemberResponse,
    pub deactivated_boards: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct CommentResponse {
    pub id: i64,
    pub board_id: i64,
    pub member_id: i64,
    pub content: String,
    pub status: CommentStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Comment> for CommentResponse {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            board_id: comment.board_id,
            member_id: comment.member_id,
            content: comment.content.clone(),
            status: comment.status,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// BoardResponse
///
/// Detail view of a single board (GET /boards/{id}). When the question has been answered
/// the answer is embedded.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct BoardResponse {
    pub id: i64,
    pub member_id: i64,
    pub title: String,
    pub content: String,
    pub visibility: Visibility,
    pub status: BoardStatus,
    pub view_count: i64,
    pub like_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentResponse>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl BoardResponse {
    pub fn new(board: &Board, comment: Option<&Comment>) -> Self {
        Self {
            id: board.id,
            member_id: board.member_id,
            title: board.title.clone(),
            content: board.content.clone(),
            visibility: board.visibility,
            status: board.status,
            view_count: board.view_count,
            like_count: board.like_count,
            comment: comment.map(CommentResponse::from),
            created_at: board.created_at,
            updated_at: board.updated_at,
        }
    }
}

/// BoardSummary
///
/// List entry (GET /boards). Secret boards are listed but flagged, and no list entry
/// carries the question body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct BoardSummary {
    pub id: i64,
    pub member_id: i64,
    pub title: String,
    pub visibility: Visibility,
    pub status: BoardStatus,
    pub view_count: i64,
    pub like_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<&Board> for BoardSummary {
    fn from(board: &Board) -> Self {
        Self {
            id: board.id,
            member_id: board.member_id,
            title: board.title.clone(),
            visibility: board.visibility,
            status: board.status,
            view_count: board.view_count,
            like_count: board.like_count,
            created_at: board.created_at,
        }
    }
}
