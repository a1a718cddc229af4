pub mod identity;
pub mod middleware;
pub mod models;
pub mod token;

pub use identity::{IdentityProvider, InMemoryIdentityProvider, VerifiedIdentity};
pub use models::{AuthContext, NumericDate, SubjectId, TokenClaims};
pub use token::TokenProvider;
