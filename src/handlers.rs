use crate::{
    auth::{AuthUser, AuthenticationGate},
    error::{AppError, ErrorBody},
    lifecycle::Lifecycle,
    members::MemberService,
    models::{
        BoardResponse, BoardSummary, CreateBoardRequest, CreateCommentRequest, LoginRequest,
        MemberResponse, QuitResponse, RegisterMemberRequest, UpdateBoardRequest,
        UpdateCommentRequest, UpdateMemberRequest,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;

/// Response header carrying the refresh token on login.
pub const REFRESH_HEADER: &str = "refresh";

// --- Query Structs ---

/// ListQuery
///
/// Paging parameters for list endpoints. Defaults to the first 20 entries; `limit` is capped at 100.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(value).map_err(|e| AppError::Internal(format!("invalid header value: {e}")))
}

// --- Public Handlers ---

/// health_check
///
/// [Public Route] Liveness check.
#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
pub async fn health_check() -> &'static str {
    "ok"
}

/// register_member
///
/// [Public Route] Creates an ACTIVE member. The configured admin address is granted
/// ADMIN in addition to USER; everyone else gets USER.
#[utoipa::path(
    post,
    path = "/members",
    request_body = RegisterMemberRequest,
    responses(
        (status = 201, description = "Member registered", body = MemberResponse),
        (status = 400, description = "Blank field", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register_member(
    State(members): State<MemberService>,
    Json(payload): Json<RegisterMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), AppError> {
    let member = members.register(payload).await?;
    Ok((StatusCode::CREATED, Json(MemberResponse::from(&member))))
}

/// login
///
/// [Public Route] Exchanges credentials for tokens. On success the body is empty and the
/// tokens travel in the `Authorization: Bearer <access>` and `Refresh: <refresh>` headers.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Tokens issued in response headers"),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(gate): State<AuthenticationGate>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let tokens = gate.login(&payload).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, header_value(&format!("Bearer {}", tokens.access))?);
    headers.insert(REFRESH_HEADER, header_value(&tokens.refresh)?);
    Ok((StatusCode::OK, headers))
}

/// refresh_token
///
/// [Public Route] Reads a refresh token from the `Refresh` request header and answers with
/// a new access token in the `Authorization` response header.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New access token in the Authorization header"),
        (status = 401, description = "Missing, expired or invalid refresh token", body = ErrorBody)
    )
)]
pub async fn refresh_token(
    State(gate): State<AuthenticationGate>,
    request_headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let refresh = request_headers
        .get(REFRESH_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthenticated)?;

    let access = gate.refresh(refresh.trim()).await?;

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, header_value(&format!("Bearer {access}"))?);
    Ok((StatusCode::OK, headers))
}

// --- Member Handlers ---

/// get_member
///
/// [Authenticated Route] A member's profile. Visible to the member themself and to admins.
#[utoipa::path(
    get,
    path = "/members/{id}",
    responses(
        (status = 200, description = "Member", body = MemberResponse),
        (status = 403, description = "Not self or admin", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_member(
    AuthUser { identity }: AuthUser,
    State(members): State<MemberService>,
    Path(id): Path<i64>,
) -> Result<Json<MemberResponse>, AppError> {
    let member = members.find(&identity, id).await?;
    Ok(Json(MemberResponse::from(&member)))
}

/// update_member
///
/// [Authenticated Route] Partial profile update. Omitted fields are unchanged; a new
/// password is re-hashed before it is stored.
#[utoipa::path(
    patch,
    path = "/members/{id}",
    request_body = UpdateMemberRequest,
    responses(
        (status = 200, description = "Updated", body = MemberResponse),
        (status = 403, description = "Not self or admin", body = ErrorBody),
        (status = 404, description = "Not Found or quit", body = ErrorBody)
    )
)]
pub async fn update_member(
    AuthUser { identity }: AuthUser,
    State(members): State<MemberService>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateMemberRequest>,
) -> Result<Json<MemberResponse>, AppError> {
    let member = members.update(&identity, id, payload).await?;
    Ok(Json(MemberResponse::from(&member)))
}

/// quit_member
///
/// [Authenticated Route] Closes the account. The member becomes QUIT and each of their
/// boards that is not already DELETED becomes DEACTIVATED, all in one transaction.
#[utoipa::path(
    delete,
    path = "/members/{id}",
    responses(
        (status = 200, description = "Member quit", body = QuitResponse),
        (status = 403, description = "Not self or admin", body = ErrorBody),
        (status = 404, description = "Not Found or already quit", body = ErrorBody)
    )
)]
pub async fn quit_member(
    AuthUser { identity }: AuthUser,
    State(lifecycle): State<Lifecycle>,
    Path(id): Path<i64>,
) -> Result<Json<QuitResponse>, AppError> {
    let outcome = lifecycle.member_quit(&identity, id).await?;
    Ok(Json(QuitResponse {
        member: MemberResponse::from(&outcome.member),
        deactivated_boards: outcome.deactivated,
    }))
}

/// member_boards
///
/// [Authenticated Route] Every board of a member, any status.
#[utoipa::path(
    get,
    path = "/members/{id}/boards",
    responses(
        (status = 200, description = "Boards", body = [BoardSummary]),
        (status = 403, description = "Not self or admin", body = ErrorBody)
    )
)]
pub async fn member_boards(
    AuthUser { identity }: AuthUser,
    State(lifecycle): State<Lifecycle>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<BoardSummary>>, AppError> {
    let boards = lifecycle.boards_by_member(&identity, id).await?;
    Ok(Json(boards.iter().map(BoardSummary::from).collect()))
}

// --- Board Handlers ---

/// create_board
///
/// [Authenticated Route] Posts a question. Only ACTIVE members may post.
#[utoipa::path(
    post,
    path = "/boards",
    request_body = CreateBoardRequest,
    responses(
        (status = 201, description = "Board registered", body = BoardResponse),
        (status = 403, description = "Member not active", body = ErrorBody)
    )
)]
pub async fn create_board(
    AuthUser { identity }: AuthUser,
    State(lifecycle): State<Lifecycle>,
    Json(payload): Json<CreateBoardRequest>,
) -> Result<(StatusCode, Json<BoardResponse>), AppError> {
    let board = lifecycle.create_board(&identity, payload).await?;
    Ok((StatusCode::CREATED, Json(BoardResponse::new(&board, None))))
}

/// list_boards
///
/// [Authenticated Route] Non-deleted boards, newest first. SECRET boards are listed with
/// their visibility flag but without content.
#[utoipa::path(
    get,
    path = "/boards",
    params(ListQuery),
    responses((status = 200, description = "Boards", body = [BoardSummary]))
)]
pub async fn list_boards(
    _auth: AuthUser,
    State(lifecycle): State<Lifecycle>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<BoardSummary>>, AppError> {
    let boards = lifecycle.list_boards(query.limit, query.offset).await?;
    Ok(Json(boards.iter().map(BoardSummary::from).collect()))
}

/// get_board
///
/// [Authenticated Route] A single board with its answer. Each successful read counts one view.
///
/// *Visibility*: SECRET boards are only readable by their author and by admins.
#[utoipa::path(
    get,
    path = "/boards/{id}",
    responses(
        (status = 200, description = "Board", body = BoardResponse),
        (status = 403, description = "Secret board", body = ErrorBody),
        (status = 404, description = "Not Found or deleted", body = ErrorBody)
    )
)]
pub async fn get_board(
    AuthUser { identity }: AuthUser,
    State(lifecycle): State<Lifecycle>,
    Path(id): Path<i64>,
) -> Result<Json<BoardResponse>, AppError> {
    let (board, comment) = lifecycle.read_board(&identity, id).await?;
    Ok(Json(BoardResponse::new(&board, comment.as_ref())))
}

/// update_board
///
/// [Authenticated Route] Author-only partial update. Answered and deactivated boards are frozen.
#[utoipa::path(
    patch,
    path = "/boards/{id}",
    request_body = UpdateBoardRequest,
    responses(
        (status = 200, description = "Updated", body = BoardResponse),
        (status = 400, description = "Board can no longer be changed", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_board(
    AuthUser { identity }: AuthUser,
    State(lifecycle): State<Lifecycle>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateBoardRequest>,
) -> Result<Json<BoardResponse>, AppError> {
    let board = lifecycle.update_board(&identity, id, payload).await?;
    Ok(Json(BoardResponse::new(&board, None)))
}

/// delete_board
///
/// [Authenticated Route] Author-only soft delete.
#[utoipa::path(
    delete,
    path = "/boards/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Board deactivated", body = ErrorBody),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found or already deleted", body = ErrorBody)
    )
)]
pub async fn delete_board(
    AuthUser { identity }: AuthUser,
    State(lifecycle): State<Lifecycle>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    lifecycle.delete_board(&identity, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Comment Handlers ---

/// create_comment
///
/// [Authenticated Route] Admin-only. Answers a REGISTERED question and moves it to ANSWERED.
#[utoipa::path(
    post,
    path = "/boards/{id}/comment",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Answered", body = BoardResponse),
        (status = 400, description = "Question is not waiting for an answer", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn create_comment(
    AuthUser { identity }: AuthUser,
    State(lifecycle): State<Lifecycle>,
    Path(board_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<BoardResponse>), AppError> {
    let (board, comment) = lifecycle.create_comment(&identity, board_id, payload).await?;
    Ok((StatusCode::CREATED, Json(BoardResponse::new(&board, Some(&comment)))))
}

/// update_comment
///
/// [Authenticated Route] Admin-only edit of the attached answer.
#[utoipa::path(
    patch,
    path = "/boards/{id}/comment",
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = BoardResponse),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Board deleted or no answer", body = ErrorBody)
    )
)]
pub async fn update_comment(
    AuthUser { identity }: AuthUser,
    State(lifecycle): State<Lifecycle>,
    Path(board_id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<BoardResponse>, AppError> {
    let (board, comment) = lifecycle.update_comment(&identity, board_id, payload).await?;
    Ok(Json(BoardResponse::new(&board, Some(&comment))))
}

/// delete_comment
///
/// [Authenticated Route] Admin-only. Removes the answer and reopens the question.
#[utoipa::path(
    delete,
    path = "/boards/{id}/comment",
    responses(
        (status = 200, description = "Answer removed", body = BoardResponse),
        (status = 400, description = "Board deactivated", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Board deleted or no answer", body = ErrorBody)
    )
)]
pub async fn delete_comment(
    AuthUser { identity }: AuthUser,
    State(lifecycle): State<Lifecycle>,
    Path(board_id): Path<i64>,
) -> Result<Json<BoardResponse>, AppError> {
    let board = lifecycle.delete_comment(&identity, board_id).await?;
    Ok(Json(BoardResponse::new(&board, None)))
}

// --- Admin Handlers ---

/// list_members
///
/// [Admin Route] Every member, any status, paged by id.
#[utoipa::path(
    get,
    path = "/admin/members",
    params(ListQuery),
    responses(
        (status = 200, description = "Members", body = [MemberResponse]),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn list_members(
    AuthUser { identity }: AuthUser,
    State(members): State<MemberService>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MemberResponse>>, AppError> {
    let members = members.list(&identity, query.limit, query.offset).await?;
    Ok(Json(members.iter().map(MemberResponse::from).collect()))
}
