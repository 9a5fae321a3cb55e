/// Router Module Index
///
/// Organizes the routing into access-segregated modules. Authentication is applied per
/// module with a route layer in `create_router`, so a route's module decides whether an
/// identity is required before its handler runs.

/// Routes accessible without a token: health, registration and the token endpoints.
pub mod public;

/// Routes that require a verified access token and a resolvable member.
pub mod authenticated;

/// Routes restricted to members holding ROLE_ADMIN.
pub mod admin;
