//! Configuration module
//!
//! Configuration is read once from the environment at startup (after loading an
//! optional `.env` file) and is immutable afterwards. Every security knob has a
//! safe default except the token signing secret, which must be supplied.

use std::env;

use crate::validation::upload::DEFAULT_ALLOWED_MIME_TYPES;

// Common constants
const SERVER_PORT: u16 = 4000;
const TOKEN_LIFETIME_MS: i64 = 24 * 60 * 60 * 1000;
const MAX_UPLOAD_SIZE_MB: usize = 50;
const MAX_FORM_BODY_BYTES: usize = 1024 * 1024;
const LOCAL_STORAGE_PATH: &str = "./data/documents";

/// Minimum signing secret length in bytes (256 bits).
pub const MIN_SECRET_BYTES: usize = 32;

/// Longest accepted token lifetime (one year).
pub const MAX_TOKEN_LIFETIME_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// Header names that pass through the request filter untouched.
pub const DEFAULT_SANITIZE_EXEMPT_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "content-type",
];

/// Default Content-Security-Policy attached to every response.
pub const DEFAULT_CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; style-src 'self'; img-src 'self' data: https:; font-src 'self' data:; connect-src 'self'; object-src 'none'; frame-ancestors 'none'";

/// Token, request-filter and role settings.
#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub token_lifetime_ms: i64,
    pub sanitize_exempt_headers: Vec<String>,
    pub content_security_policy: String,
    pub admin_emails: Vec<String>,
    pub max_form_body_bytes: usize,
}

// The secret never shows up in logs or panic messages.
impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_lifetime_ms", &self.token_lifetime_ms)
            .field("sanitize_exempt_headers", &self.sanitize_exempt_headers)
            .field("content_security_policy", &self.content_security_policy)
            .field("admin_emails", &self.admin_emails)
            .field("max_form_body_bytes", &self.max_form_body_bytes)
            .finish()
    }
}

impl SecurityConfig {
    /// Settings with the given secret and every other field at its default.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_lifetime_ms: TOKEN_LIFETIME_MS,
            sanitize_exempt_headers: DEFAULT_SANITIZE_EXEMPT_HEADERS
                .iter()
                .map(|h| h.to_string())
                .collect(),
            content_security_policy: DEFAULT_CONTENT_SECURITY_POLICY.to_string(),
            admin_emails: Vec::new(),
            max_form_body_bytes: MAX_FORM_BODY_BYTES,
        }
    }
}

/// Upload acceptance and storage settings.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub allowed_mime_types: Vec<String>,
    pub max_upload_size_bytes: usize,
    pub local_storage_path: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|m| m.to_string())
                .collect(),
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            local_storage_path: LOCAL_STORAGE_PATH.to_string(),
        }
    }
}

/// Optional account seeded into the in-memory identity directory at startup.
#[derive(Clone)]
pub struct BootstrapUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

impl std::fmt::Debug for BootstrapUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapUser")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub security: SecurityConfig,
    pub uploads: UploadConfig,
    pub bootstrap_user: Option<BootstrapUser>,
}

impl Config {
    /// Development configuration around an explicit signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            security: SecurityConfig::with_secret(jwt_secret),
            uploads: UploadConfig::default(),
            bootstrap_user: None,
        }
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;

        let token_lifetime_ms = env::var("TOKEN_LIFETIME_MS")
            .unwrap_or_else(|_| TOKEN_LIFETIME_MS.to_string())
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("TOKEN_LIFETIME_MS must be a valid number"))?;

        let sanitize_exempt_headers = list_var("SANITIZE_EXEMPT_HEADERS")
            .unwrap_or_else(|| {
                DEFAULT_SANITIZE_EXEMPT_HEADERS
                    .iter()
                    .map(|h| h.to_string())
                    .collect()
            });

        let content_security_policy = env::var("CONTENT_SECURITY_POLICY")
            .ok()
            .filter(|csp| !csp.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_SECURITY_POLICY.to_string());

        let admin_emails = list_var("ADMIN_EMAILS").unwrap_or_default();

        let max_form_body_bytes = parse_form_body_bytes(env::var("MAX_FORM_BODY_BYTES").ok())?;

        let allowed_mime_types = list_var("ALLOWED_UPLOAD_MIME_TYPES").unwrap_or_else(|| {
            DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|m| m.to_string())
                .collect()
        });

        let max_upload_size_bytes = parse_upload_size_bytes(env::var("MAX_UPLOAD_SIZE_MB").ok())?;

        let bootstrap_user = match (
            env::var("BOOTSTRAP_USER_EMAIL").ok(),
            env::var("BOOTSTRAP_USER_PASSWORD").ok(),
        ) {
            (Some(email), Some(password)) => Some(BootstrapUser {
                display_name: env::var("BOOTSTRAP_USER_NAME").unwrap_or_else(|_| email.clone()),
                email,
                password,
            }),
            _ => None,
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            cors_origins,
            security: SecurityConfig {
                jwt_secret,
                token_lifetime_ms,
                sanitize_exempt_headers,
                content_security_policy,
                admin_emails,
                max_form_body_bytes,
            },
            uploads: UploadConfig {
                allowed_mime_types,
                max_upload_size_bytes,
                local_storage_path: env::var("LOCAL_STORAGE_PATH")
                    .unwrap_or_else(|_| LOCAL_STORAGE_PATH.to_string()),
            },
            bootstrap_user,
        })
    }

    /// Reject configurations that would weaken the security core.
    ///
    /// These are the only fatal errors in the system; they abort startup instead of
    /// surfacing per request.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.security.jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least {} bytes long",
                MIN_SECRET_BYTES
            ));
        }

        if self.security.token_lifetime_ms <= 0 {
            return Err(anyhow::anyhow!("TOKEN_LIFETIME_MS must be positive"));
        }

        if self.security.token_lifetime_ms > MAX_TOKEN_LIFETIME_MS {
            return Err(anyhow::anyhow!(
                "TOKEN_LIFETIME_MS cannot exceed {} (one year)",
                MAX_TOKEN_LIFETIME_MS
            ));
        }

        if self.security.content_security_policy.trim().is_empty() {
            return Err(anyhow::anyhow!("CONTENT_SECURITY_POLICY cannot be empty"));
        }

        if self.uploads.allowed_mime_types.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_UPLOAD_MIME_TYPES cannot be empty"
            ));
        }

        if self.uploads.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB cannot be 0"));
        }

        if self.is_production() && self.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        Ok(())
    }
}

fn parse_form_body_bytes(raw: Option<String>) -> Result<usize, anyhow::Error> {
    match raw {
        None => Ok(MAX_FORM_BODY_BYTES),
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| anyhow::anyhow!("MAX_FORM_BODY_BYTES must be a valid number")),
    }
}

/// `MAX_UPLOAD_SIZE_MB` converted to bytes.
fn parse_upload_size_bytes(raw: Option<String>) -> Result<usize, anyhow::Error> {
    let mb = match raw {
        None => MAX_UPLOAD_SIZE_MB,
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be a valid number"))?,
    };
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB is too large"))
}

/// Comma-separated list variable; `None` when unset or blank.
fn list_var(name: &str) -> Option<Vec<String>> {
    let raw = env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
