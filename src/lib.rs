use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod members;
pub mod models;
pub mod policy;
pub mod repository;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::{Argon2Credentials, CredentialState};
pub use config::AppConfig;
pub use error::AppError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Auto-generates the OpenAPI documentation for every handler annotated with
/// `#[utoipa::path]`. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health_check, handlers::register_member, handlers::login,
        handlers::refresh_token, handlers::get_member, handlers::update_member,
        handlers::quit_member, handlers::member_boards, handlers::create_board,
        handlers::list_boards, handlers::get_board, handlers::update_board,
        handlers::delete_board, handlers::create_comment, handlers::update_comment,
        handlers::delete_comment, handlers::list_members
    ),
    components(
        schemas(
            models::Role, models::MemberStatus, models::Visibility, models::BoardStatus,
            models::CommentStatus, models::RegisterMemberRequest, models::LoginRequest,
            models::UpdateMemberRequest, models::CreateBoardRequest, models::UpdateBoardRequest,
            models::CreateCommentRequest, models::UpdateCommentRequest, models::MemberResponse,
            models::QuitResponse, models::BoardResponse, models::BoardSummary,
            models::CommentResponse, error::ErrorBody,
        )
    ),
    tags(
        (name = "qa-board", description = "Question board API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, cloneable container for everything handlers need. Services such as
/// `Lifecycle`, `MemberService` and `AuthenticationGate` are assembled from it per
/// request through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Postgres in production, in-memory locally and in tests.
    pub repo: RepositoryState,
    /// Password hashing and verification.
    pub credentials: CredentialState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for CredentialState {
    fn from_ref(app_state: &AppState) -> CredentialState {
        app_state.credentials.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Route layer for the authenticated and admin routers. Extracting `AuthUser` is the
/// whole check: if the request carries no valid identity the extractor's rejection
/// (a uniform 401) is returned and the handler never runs. The resolved identity is
/// stored in the extensions so the handler's own `AuthUser` reuses it.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any)
        .expose_headers([
            axum::http::header::AUTHORIZATION,
            HeaderName::from_static(handlers::REFRESH_HEADER),
        ]);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: no identity required.
        .merge(public::public_routes())
        // Authenticated Routes: guarded by `auth_middleware`.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Admin Routes: same guard; the admin role is checked by the policy.
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Request authentication: runs for every route and records an `AuthResult`
        // that the guards above read. It never rejects on its own.
        .layer(middleware::from_fn_with_state(state.clone(), auth::authenticate))
        // Apply the Unified State to all routes.
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: wraps the request/response lifecycle in a span
                // carrying the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echoes x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Used by `TraceLayer` to build the per-request span. Includes the `x-request-id`
/// header (if present) alongside the HTTP method and URI so every log line of one
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
