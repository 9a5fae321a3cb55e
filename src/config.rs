use std::env;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// pulled into handlers and extractors via FromRef; never mutated afterwards.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects log format and whether secrets may fall back.
    pub env: Env,
    // Postgres connection string. `None` runs the service on the in-memory store.
    pub db_url: Option<String>,
    // Plain-text signing secret. The HMAC key is derived from it on every use.
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_minutes: i64,
    // The single address that is granted ADMIN at registration.
    pub admin_email: String,
    pub bind_addr: String,
}

/// Env
///
/// Defines the runtime context: pretty logs and fallbacks locally, JSON logs and
/// mandatory secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 30;
pub const DEFAULT_REFRESH_TOKEN_TTL_MINUTES: i64 = 420;
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@gmail.com";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for test setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_minutes: DEFAULT_REFRESH_TOKEN_TTL_MINUTES,
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and implements the **fail-fast** principle.
    ///
    /// # Panics
    /// Panics if `JWT_SECRET` or `DATABASE_URL` is missing in production, or if a token
    /// lifetime is set but is not a whole number of minutes.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        // JWT Secret Resolution
        // The production secret is mandatory and must be explicitly set.
        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            _ => env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
        };

        // Locally the service runs without Postgres when DATABASE_URL is absent.
        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
            ),
            _ => env::var("DATABASE_URL").ok(),
        };

        Self {
            env,
            db_url,
            jwt_secret,
            access_token_ttl_minutes: minutes_from_env(
                "JWT_ACCESS_TOKEN_EXPIRATION_MINUTES",
                DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            ),
            refresh_token_ttl_minutes: minutes_from_env(
                "JWT_REFRESH_TOKEN_EXPIRATION_MINUTES",
                DEFAULT_REFRESH_TOKEN_TTL_MINUTES,
            ),
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        }
    }
}

fn minutes_from_env(key: &str, default: i64) -> i64 {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("FATAL: {key} must be a whole number of minutes, got '{raw}'")),
        Err(_) => default,
    }
}
