//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - Access token signing secret (min 32 chars, high entropy)
//! - `JWT_REFRESH_SECRET` - Refresh token signing secret (must differ from `JWT_SECRET`)
//! - `COOKIE_SECRET` - Cookie signing secret
//! - `DATABASE_URL` - `PostgreSQL` connection string (production only)
//!
//! ## Optional
//! - `APP_ENV` - `development`, `production` or `test` (default: development)
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 5000)
//! - `JWT_EXPIRES_IN` - Access token lifetime (default: 15m)
//! - `JWT_REFRESH_EXPIRES_IN` - Refresh token lifetime (default: 7d)
//! - `FRONTEND_URL` - SPA origin allowed by CORS (default: <http://localhost:5173>)
//! - `ALLOWED_ORIGINS` - Extra comma-separated CORS origins
//! - `RATE_LIMIT_ENABLED` - Toggle rate limiting (default: true)
//! - `RATE_LIMIT_WINDOW_MS` - Rate limit window (default: 900000)
//! - `RATE_LIMIT_MAX_REQUESTS` - Requests per window on `/api` (default: 100)
//! - `AUTH_RATE_LIMIT_MAX_REQUESTS` - Requests per window on `/api/auth` (default: 5)
//! - `CATALOG_PATH` - JSON product catalog loaded into the in-memory store
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag (default: `APP_ENV`)

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    /// Name as accepted in `APP_ENV`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Deployment environment
    pub environment: Environment,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// Token and cookie settings
    pub auth: AuthConfig,
    /// Cross-origin settings
    pub cors: CorsConfig,
    /// Rate limiting settings
    pub rate_limit: RateLimitConfig,
    /// Product catalog to seed the in-memory store with
    pub catalog_path: Option<PathBuf>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Token signing and lifetime configuration.
///
/// `SecretString` redacts itself in `Debug` output.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub jwt_refresh_secret: SecretString,
    pub cookie_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

/// Origins allowed to call the API with credentials.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub frontend_url: String,
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// The frontend URL followed by the extra origins, without duplicates.
    #[must_use]
    pub fn origins(&self) -> Vec<String> {
        let mut origins = vec![self.frontend_url.trim_end_matches('/').to_owned()];
        for origin in &self.allowed_origins {
            let origin = origin.trim_end_matches('/');
            if !origins.iter().any(|o| o == origin) {
                origins.push(origin.to_owned());
            }
        }
        origins
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window: Duration,
    pub max_requests: u32,
    pub auth_max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_millis(900_000),
            max_requests: 100,
            auth_max_requests: 5,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ApiConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let environment: Environment = vars.parsed("APP_ENV", "development")?;
        let host: IpAddr = vars.parsed("API_HOST", "127.0.0.1")?;
        let port: u16 = vars.parsed("API_PORT", "5000")?;

        let database_url = vars.optional("DATABASE_URL").map(SecretString::from);
        if environment.is_production() && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_owned()));
        }

        let auth = AuthConfig::from_vars(&vars)?;
        let cors = CorsConfig::from_vars(&vars)?;
        let rate_limit = RateLimitConfig::from_vars(&vars)?;

        let sentry_dsn = vars.optional("SENTRY_DSN");
        let sentry_environment = vars
            .optional("SENTRY_ENVIRONMENT")
            .or_else(|| Some(environment.as_str().to_owned()));

        Ok(Self {
            environment,
            host,
            port,
            database_url,
            auth,
            cors,
            rate_limit,
            catalog_path: vars.optional("CATALOG_PATH").map(PathBuf::from),
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AuthConfig {
    fn from_vars<F>(vars: &Vars<F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = vars.secret("JWT_SECRET")?;
        let jwt_refresh_secret = vars.secret("JWT_REFRESH_SECRET")?;
        if jwt_secret.expose_secret() == jwt_refresh_secret.expose_secret() {
            return Err(ConfigError::InsecureSecret(
                "JWT_REFRESH_SECRET".to_owned(),
                "must differ from JWT_SECRET".to_owned(),
            ));
        }

        Ok(Self {
            jwt_secret,
            jwt_refresh_secret,
            cookie_secret: vars.secret("COOKIE_SECRET")?,
            access_token_ttl: vars.duration("JWT_EXPIRES_IN", "15m")?,
            refresh_token_ttl: vars.duration("JWT_REFRESH_EXPIRES_IN", "7d")?,
        })
    }
}

impl CorsConfig {
    fn from_vars<F>(vars: &Vars<F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let frontend_url = vars.or_default("FRONTEND_URL", "http://localhost:5173");
        validate_origin("FRONTEND_URL", &frontend_url)?;

        let allowed_origins: Vec<String> = vars
            .optional("ALLOWED_ORIGINS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        for origin in &allowed_origins {
            validate_origin("ALLOWED_ORIGINS", origin)?;
        }

        Ok(Self {
            frontend_url,
            allowed_origins,
        })
    }
}

impl RateLimitConfig {
    fn from_vars<F>(vars: &Vars<F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = parse_bool(&vars.or_default("RATE_LIMIT_ENABLED", "true"))
            .map_err(|e| ConfigError::InvalidEnvVar("RATE_LIMIT_ENABLED".to_owned(), e))?;
        let window_ms: u64 = vars.parsed("RATE_LIMIT_WINDOW_MS", "900000")?;
        let max_requests: u32 = vars.parsed("RATE_LIMIT_MAX_REQUESTS", "100")?;
        let auth_max_requests: u32 = vars.parsed("AUTH_RATE_LIMIT_MAX_REQUESTS", "5")?;

        if window_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "RATE_LIMIT_WINDOW_MS".to_owned(),
                "must be positive".to_owned(),
            ));
        }
        for (key, value) in [
            ("RATE_LIMIT_MAX_REQUESTS", max_requests),
            ("AUTH_RATE_LIMIT_MAX_REQUESTS", auth_max_requests),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidEnvVar(
                    key.to_owned(),
                    "must be positive".to_owned(),
                ));
            }
        }

        Ok(Self {
            enabled,
            window: Duration::from_millis(window_ms),
            max_requests,
            auth_max_requests,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Typed access to a variable lookup.
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable. Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_owned())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.or_default(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
    }

    /// Parse a duration variable such as `15m` or `7d`.
    fn duration(&self, key: &str, default: &str) -> Result<Duration, ConfigError> {
        parse_duration(&self.or_default(key, default))
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e))
    }

    /// Load and validate a signing secret.
    fn secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_length(&value, key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Parse a duration string: `Ns`, `Nm`, `Nh`, `Nd`, or bare seconds.
///
/// # Errors
///
/// Returns a description of the problem for malformed or zero durations.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let (digits, multiplier) = [('s', 1), ('m', 60), ('h', 60 * 60), ('d', 24 * 60 * 60)]
        .into_iter()
        .find_map(|(unit, secs)| value.strip_suffix(unit).map(|d| (d, secs)))
        .unwrap_or((value, 1));

    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration '{value}'"))?;
    if amount == 0 {
        return Err("duration must be positive".to_owned());
    }

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{value}' is too large"))
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}

/// Validate that an origin is an absolute http(s) URL.
fn validate_origin(var_name: &str, origin: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(origin)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_owned(), format!("{origin}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_owned(),
            format!("{origin}: must be an http or https URL"),
        ));
    }
    Ok(())
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                secret.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ACCESS: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";
    const REFRESH: &str = "Zq8!Lm3@Vt6#Hy1$Rk4%Nw7^Gp0&Dc2*";
    const COOKIE: &str = "Fj5*Ts2&Qb9^Wm4%Xe7$Kd1#Ur8@Hn3!";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("JWT_SECRET", ACCESS),
            ("JWT_REFRESH_SECRET", REFRESH),
            ("COOKIE_SECRET", COOKIE),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup(&base())).unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:5000");
        assert!(config.database_url.is_none());
        assert_eq!(config.auth.access_token_ttl, Duration::from_secs(15 * 60));
        assert_eq!(
            config.auth.refresh_token_ttl,
            Duration::from_secs(7 * 24 * 60 * 60)
        );
        assert_eq!(config.cors.origins(), vec!["http://localhost:5173"]);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.auth_max_requests, 5);
        assert_eq!(config.sentry_environment.as_deref(), Some("development"));
    }

    #[test]
    fn test_production_requires_database_url() {
        let mut vars = base();
        vars.push(("APP_ENV", "production"));
        let err = ApiConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "DATABASE_URL"));

        vars.push(("DATABASE_URL", "postgres://localhost/shoplane"));
        let config = ApiConfig::from_lookup(lookup(&vars)).unwrap();
        assert!(config.environment.is_production());
    }

    #[test]
    fn test_missing_secret() {
        let err = ApiConfig::from_lookup(lookup(&[("JWT_SECRET", ACCESS)])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "JWT_REFRESH_SECRET"));
    }

    #[test]
    fn test_jwt_secrets_must_differ() {
        let vars = [
            ("JWT_SECRET", ACCESS),
            ("JWT_REFRESH_SECRET", ACCESS),
            ("COOKIE_SECRET", COOKIE),
        ];
        let err = ApiConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_cors_origins_merge_and_dedupe() {
        let mut vars = base();
        vars.push(("FRONTEND_URL", "https://shop.test/"));
        vars.push((
            "ALLOWED_ORIGINS",
            "https://shop.test, https://admin.shop.test ,",
        ));
        let config = ApiConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(
            config.cors.origins(),
            vec!["https://shop.test", "https://admin.shop.test"]
        );
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let mut vars = base();
        vars.push(("FRONTEND_URL", "not a url"));
        assert!(ApiConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_rate_limit_overrides() {
        let mut vars = base();
        vars.push(("RATE_LIMIT_ENABLED", "false"));
        vars.push(("RATE_LIMIT_WINDOW_MS", "60000"));
        vars.push(("RATE_LIMIT_MAX_REQUESTS", "10"));
        let config = ApiConfig::from_lookup(lookup(&vars)).unwrap();
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.rate_limit.max_requests, 10);

        let mut vars = base();
        vars.push(("AUTH_RATE_LIMIT_MAX_REQUESTS", "0"));
        assert!(ApiConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert!(parse_duration("0m").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("10w").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("test".parse::<Environment>().unwrap(), Environment::Test);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-key-goes-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length("short", "TEST_VAR").is_err());
        assert!(validate_secret_length(ACCESS, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ApiConfig::from_lookup(lookup(&base())).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains(ACCESS));
        assert!(!debug_output.contains(COOKIE));
    }
}
