use crate::error::HttpAppError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, TimeZone, Utc};
use docshare_core::{AppError, UserRole};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Largest timestamp chrono can represent, in milliseconds.
const MAX_NUMERIC_DATE_MS: f64 = 8_210_266_876_799_999.0;

/// RFC 7519 NumericDate kept at millisecond precision.
///
/// Serialized as seconds since the epoch: a JSON integer for whole seconds, otherwise
/// a number with a millisecond fraction (`1700000000.123`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NumericDate(i64);

impl NumericDate {
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl From<DateTime<Utc>> for NumericDate {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value.timestamp_millis())
    }
}

impl Serialize for NumericDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % 1000 == 0 {
            serializer.serialize_i64(self.0 / 1000)
        } else {
            serializer.serialize_f64(self.0 as f64 / 1000.0)
        }
    }
}

impl<'de> Deserialize<'de> for NumericDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        let millis = (seconds * 1000.0).round();
        if !millis.is_finite() || millis.abs() > MAX_NUMERIC_DATE_MS {
            return Err(de::Error::custom("NumericDate out of range"));
        }
        Ok(Self(millis as i64))
    }
}

/// Subject identifier carried in the `id` claim.
///
/// Identifiers that are canonical integers travel as JSON numbers, everything else
/// as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectId {
    Numeric(i64),
    Text(String),
}

impl SubjectId {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            // "007" or "+7" must not lose their spelling
            Ok(n) if n.to_string() == raw => SubjectId::Numeric(n),
            _ => SubjectId::Text(raw.to_string()),
        }
    }
}

impl Display for SubjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SubjectId::Numeric(n) => write!(f, "{}", n),
            SubjectId::Text(s) => f.write_str(s),
        }
    }
}

/// Claims carried by a Docshare bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Principal e-mail
    pub sub: String,
    pub id: SubjectId,
    /// Role resolved when the token was issued
    pub role: UserRole,
    pub iat: NumericDate,
    pub exp: NumericDate,
}

/// Authenticated caller, inserted into request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub email: String,
    pub subject_id: String,
    pub role: UserRole,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn from_claims(claims: TokenClaims) -> Option<Self> {
        Some(Self {
            issued_at: claims.iat.to_datetime()?,
            expires_at: claims.exp.to_datetime()?,
            subject_id: claims.id.to_string(),
            email: claims.sub,
            role: claims.role,
        })
    }
}

// Extension cannot be combined with Multipart, so handlers extract directly from parts.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| HttpAppError(AppError::Unauthorized("Missing auth context".to_string())))
    }
}
