//! HS256 bearer token issuance and validation
//!
//! Tokens are JWS compact strings carrying `sub`, `id`, `role`, `iat` and `exp`.
//! The time window `iat <= now < exp` is enforced here at millisecond precision
//! rather than by `jsonwebtoken`, whose built-in expiry check works in whole
//! seconds with leeway.
//!
//! Callers only ever see `bool` / `Option`; the reason a token was refused stays
//! inside this module and is logged at debug level.

use crate::auth::models::{NumericDate, SubjectId, TokenClaims};
use chrono::{DateTime, Duration, Utc};
use docshare_core::config::{MAX_TOKEN_LIFETIME_MS, MIN_SECRET_BYTES};
use docshare_core::{AppError, Principal};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

#[derive(Debug, thiserror::Error)]
enum TokenError {
    #[error("token is not three dot-separated segments")]
    Malformed,
    #[error("token could not be verified: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),
    #[error("token expiry does not follow its issue time")]
    InvalidWindow,
    #[error("token used before its issue time")]
    NotYetValid,
    #[error("token expired")]
    Expired,
}

/// Issues and validates signed, time-limited bearer tokens.
///
/// Holds no mutable state; share it behind an `Arc`.
#[derive(Clone)]
pub struct TokenProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime_ms: i64,
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("algorithm", &Algorithm::HS256)
            .field("lifetime_ms", &self.lifetime_ms)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    /// Build a provider from a shared secret and a token lifetime.
    ///
    /// Fails for secrets shorter than 32 bytes or a lifetime outside one millisecond
    /// to one year, so a bad configuration stops the service at startup.
    pub fn new(secret: &str, lifetime_ms: i64) -> Result<Self, AppError> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(AppError::Configuration(format!(
                "JWT secret must be at least {} bytes",
                MIN_SECRET_BYTES
            )));
        }
        if lifetime_ms <= 0 {
            return Err(AppError::Configuration(
                "Token lifetime must be positive".to_string(),
            ));
        }
        if lifetime_ms > MAX_TOKEN_LIFETIME_MS {
            return Err(AppError::Configuration(format!(
                "Token lifetime cannot exceed {} ms",
                MAX_TOKEN_LIFETIME_MS
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            lifetime_ms,
        })
    }

    pub fn lifetime_ms(&self) -> i64 {
        self.lifetime_ms
    }

    pub fn issue(&self, principal: &Principal) -> Result<String, AppError> {
        self.issue_at(principal, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, principal: &Principal, now: DateTime<Utc>) -> Result<String, AppError> {
        let expiry = Duration::try_milliseconds(self.lifetime_ms)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AppError::Configuration("Token expiry is out of range".to_string())
            })?;
        let issued_at = NumericDate::from(now);
        let expires_at = NumericDate::from(expiry);

        let claims = TokenClaims {
            sub: principal.email.clone(),
            id: SubjectId::parse(&principal.subject_id),
            role: principal.role,
            iat: issued_at,
            exp: expires_at,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.claims_at(token, now).is_some()
    }

    pub fn claims(&self, token: &str) -> Option<TokenClaims> {
        self.claims_at(token, Utc::now())
    }

    /// Verified claims, or `None` when the token is refused for any reason.
    pub fn claims_at(&self, token: &str, now: DateTime<Utc>) -> Option<TokenClaims> {
        match self.decode_at(token, now) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(reason = %e, "Token rejected");
                None
            }
        }
    }

    /// Subject (e-mail) of a currently valid token.
    pub fn subject_of(&self, token: &str) -> Option<String> {
        self.claims(token).map(|claims| claims.sub)
    }

    fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, TokenError> {
        if token.is_empty() || token.split('.').count() != 3 {
            return Err(TokenError::Malformed);
        }

        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?.claims;

        if claims.exp <= claims.iat {
            return Err(TokenError::InvalidWindow);
        }

        let now = NumericDate::from(now);
        if now < claims.iat {
            return Err(TokenError::NotYetValid);
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use docshare_core::UserRole;

    const SECRET: &str = "test-secret-that-is-at-least-32-bytes-long";
    const LIFETIME_MS: i64 = 60_000;

    fn provider() -> TokenProvider {
        TokenProvider::new(SECRET, LIFETIME_MS).unwrap()
    }

    fn principal(subject_id: &str) -> Principal {
        Principal {
            subject_id: subject_id.to_string(),
            display_name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: UserRole::User,
            authenticated_at: Utc::now(),
        }
    }

    fn instant() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()
    }

    #[test]
    fn test_issue_then_validate() {
        let provider = provider();
        let token = provider.issue(&principal("17")).unwrap();

        assert!(provider.validate(&token));
        assert_eq!(
            provider.subject_of(&token).as_deref(),
            Some("ada@example.com")
        );
    }

    #[test]
    fn test_claims_carry_identity() {
        let provider = provider();
        let now = instant();
        let token = provider.issue_at(&principal("17"), now).unwrap();
        let claims = provider.claims_at(&token, now).unwrap();

        assert_eq!(claims.sub, "ada@example.com");
        assert_eq!(claims.id, SubjectId::Numeric(17));
        assert_eq!(claims.role, UserRole::User);
        assert_eq!(claims.iat.as_millis(), 1_700_000_000_123);
        assert_eq!(claims.exp.as_millis(), 1_700_000_000_123 + LIFETIME_MS);
    }

    #[test]
    fn test_string_subject_id() {
        let provider = provider();
        let now = instant();
        let token = provider.issue_at(&principal("user-9f2"), now).unwrap();
        let claims = provider.claims_at(&token, now).unwrap();

        assert_eq!(claims.id, SubjectId::Text("user-9f2".to_string()));
    }

    #[test]
    fn test_millisecond_expiry_boundary() {
        let provider = provider();
        let now = instant();
        let token = provider.issue_at(&principal("1"), now).unwrap();
        let exp = now + Duration::milliseconds(LIFETIME_MS);

        assert!(provider.validate_at(&token, now));
        assert!(provider.validate_at(&token, exp - Duration::milliseconds(1)));
        assert!(!provider.validate_at(&token, exp));
        assert!(!provider.validate_at(&token, exp + Duration::milliseconds(1)));
    }

    #[test]
    fn test_not_valid_before_issue_time() {
        let provider = provider();
        let now = instant();
        let token = provider.issue_at(&principal("1"), now).unwrap();

        assert!(!provider.validate_at(&token, now - Duration::milliseconds(1)));
    }

    #[test]
    fn test_expired_token_has_no_subject() {
        let provider = provider();
        let issued = Utc::now() - Duration::milliseconds(LIFETIME_MS + 1);
        let token = provider.issue_at(&principal("1"), issued).unwrap();

        assert!(!provider.validate(&token));
        assert!(provider.subject_of(&token).is_none());
    }

    #[test]
    fn test_altered_last_character_fails() {
        let provider = provider();
        let token = provider.issue(&principal("1")).unwrap();

        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        assert!(!provider.validate(&tampered));
    }

    #[test]
    fn test_any_altered_signature_character_fails() {
        let provider = provider();
        let now = instant();
        let token = provider.issue_at(&principal("1"), now).unwrap();
        let (signed_part, signature) = token.rsplit_once('.').unwrap();
        assert!(!signature.is_empty());

        for (index, original) in signature.char_indices() {
            let replacement = if original == 'A' { 'B' } else { 'A' };
            let mut altered = signature.to_string();
            altered.replace_range(index..index + original.len_utf8(), &replacement.to_string());
            let tampered = format!("{}.{}", signed_part, altered);

            assert!(
                !provider.validate_at(&tampered, now),
                "accepted signature altered at position {}",
                index
            );
        }
        assert!(provider.validate_at(&token, now));
    }

    #[test]
    fn test_other_secret_fails() {
        let token = provider().issue(&principal("1")).unwrap();
        let other =
            TokenProvider::new("another-secret-that-is-at-least-32-bytes", LIFETIME_MS).unwrap();

        assert!(!other.validate(&token));
    }

    #[test]
    fn test_malformed_inputs() {
        let provider = provider();
        for token in [
            "",
            "abc",
            "a.b",
            "a.b.c.d",
            "...",
            "not.a.token",
            "eyJhbGciOiJIUzI1NiJ9.e30.",
        ] {
            assert!(!provider.validate(token), "accepted {:?}", token);
            assert!(provider.subject_of(token).is_none());
        }
    }

    #[test]
    fn test_unsigned_token_fails() {
        let provider = provider();
        let token = provider.issue(&principal("1")).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        // {"alg":"none","typ":"JWT"}
        parts[0] = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";
        parts[2] = "";

        assert!(!provider.validate(&parts.join(".")));
    }

    #[test]
    fn test_short_secret_rejected_at_construction() {
        let err = TokenProvider::new("too-short", LIFETIME_MS).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        assert!(TokenProvider::new(&"x".repeat(31), LIFETIME_MS).is_err());
        assert!(TokenProvider::new(&"x".repeat(32), LIFETIME_MS).is_ok());
    }

    #[test]
    fn test_non_positive_lifetime_rejected() {
        assert!(TokenProvider::new(SECRET, 0).is_err());
        assert!(TokenProvider::new(SECRET, -5).is_err());
    }

    #[test]
    fn test_oversized_lifetime_rejected_at_construction() {
        let err = TokenProvider::new(SECRET, i64::MAX).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
        assert!(TokenProvider::new(SECRET, MAX_TOKEN_LIFETIME_MS + 1).is_err());

        let provider = TokenProvider::new(SECRET, MAX_TOKEN_LIFETIME_MS).unwrap();
        assert!(provider.issue(&principal("1")).is_ok());
    }

    #[test]
    fn test_issue_near_end_of_time_errors_instead_of_panicking() {
        let provider = provider();
        let err = provider
            .issue_at(&principal("1"), DateTime::<Utc>::MAX_UTC)
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", provider());
        assert!(!rendered.contains(SECRET));
    }
}
