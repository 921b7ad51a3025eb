use std::env;

/// Fallback signing secret used outside production when `JWT_SECRET` is unset.
pub const LOCAL_JWT_SECRET: &str = "dev-only-secret-not-for-prod";

/// Seven days, the lifetime of an access token unless overridden.
pub const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 7;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Value of `DATABASE_URL` that selects the in-memory repository (local only).
pub const MEMORY_DB_URL: &str = "memory";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// pulled into handlers and extractors through `FromRef<AppState>`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string, or `memory` for the in-process store.
    pub db_url: String,
    // Runtime environment marker. Controls logging format and secret requirements.
    pub env: Env,
    // HS256 secret used to sign and verify access tokens.
    pub jwt_secret: String,
    // Lifetime of issued access tokens.
    pub token_ttl_minutes: i64,
    // Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
}

/// Env
///
/// Defines the runtime context: relaxed local development versus hardened production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration for test state setup.
    fn default() -> Self {
        Self {
            db_url: MEMORY_DB_URL.to_string(),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl_minutes: DEFAULT_TOKEN_TTL_MINUTES,
            allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and fails fast.
    ///
    /// # Panics
    /// Panics if `DATABASE_URL` is missing, if `JWT_SECRET` is missing in production,
    /// or if `ACCESS_TOKEN_EXPIRE_MINUTES` is not a positive integer.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
        };

        let db_url = env::var("DATABASE_URL").expect("FATAL: DATABASE_URL must be set");
        if env == Env::Production && db_url == MEMORY_DB_URL {
            panic!("FATAL: the in-memory store cannot be used in production.");
        }

        let token_ttl_minutes = match env::var("ACCESS_TOKEN_EXPIRE_MINUTES") {
            Ok(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|minutes| *minutes > 0)
                .expect("FATAL: ACCESS_TOKEN_EXPIRE_MINUTES must be a positive integer"),
            Err(_) => DEFAULT_TOKEN_TTL_MINUTES,
        };

        let allowed_origins = parse_origins(
            &env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
        );

        Self {
            db_url,
            env,
            jwt_secret,
            token_ttl_minutes,
            allowed_origins,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
