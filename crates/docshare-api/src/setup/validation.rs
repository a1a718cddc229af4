//! Configuration validation
//!
//! Runs before anything else at startup so a weak or inconsistent configuration
//! never serves traffic. Warnings are returned rather than logged because tracing
//! is not initialized yet.

use anyhow::Result;
use docshare_core::Config;

/// Validate critical configuration values.
///
/// Hard failures come from [`Config::validate`]; suspicious but legal settings come
/// back as warnings for the caller to log.
pub fn validate_config(config: &Config) -> Result<Vec<&'static str>> {
    config.validate()?;

    let mut warnings = Vec::new();

    let is_production = config.is_production();
    let env_var = std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .ok();

    if is_production && env_var.is_none() {
        warnings.push(
            "Production mode detected but ENVIRONMENT/APP_ENV not set - error details may leak",
        );
    }

    if config.security.admin_emails.is_empty() {
        warnings.push("ADMIN_EMAILS is empty - no account will receive the admin role");
    }

    let exempt = &config.security.sanitize_exempt_headers;
    if !exempt.iter().any(|h| h == "authorization") {
        warnings.push(
            "Authorization header is not exempt from sanitization - bearer tokens may be altered",
        );
    }

    if config.bootstrap_user.is_none() {
        warnings.push("No bootstrap user configured - nobody can sign in");
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docshare_core::config::BootstrapUser;

    #[test]
    fn test_valid_config_passes() {
        let config = Config::with_secret("a".repeat(32));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_short_secret_fails() {
        let config = Config::with_secret("short");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_suspicious_settings_come_back_as_warnings() {
        let mut config = Config::with_secret("a".repeat(32));
        config.security.admin_emails = vec!["admin@example.com".to_string()];
        config.bootstrap_user = Some(BootstrapUser {
            email: "admin@example.com".to_string(),
            password: "pw".to_string(),
            display_name: "Admin".to_string(),
        });
        assert!(validate_config(&config).unwrap().is_empty());

        config
            .security
            .sanitize_exempt_headers
            .retain(|h| h != "authorization");
        config.bootstrap_user = None;
        let warnings = validate_config(&config).unwrap();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.starts_with("Authorization header")));
        assert!(warnings.iter().any(|w| w.contains("bootstrap user")));
    }

    #[test]
    fn test_zero_lifetime_fails() {
        let mut config = Config::with_secret("a".repeat(32));
        config.security.token_lifetime_ms = 0;
        assert!(validate_config(&config).is_err());
    }
}
