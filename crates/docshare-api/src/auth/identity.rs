//! Identity collaborator
//!
//! Credential verification lives behind [`IdentityProvider`] so the token layer never
//! sees passwords. The bundled in-memory directory hashes passwords with Argon2 and
//! is seeded at startup.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use docshare_core::AppError;
use rand_core::OsRng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

/// Identity confirmed by the provider; role resolution happens afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject_id: String,
    pub display_name: String,
    pub email: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` for unknown accounts and wrong passwords alike.
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<VerifiedIdentity>, AppError>;
}

struct Account {
    subject_id: String,
    display_name: String,
    email: String,
    password_hash: String,
}

pub struct InMemoryIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
    next_id: AtomicI64,
    // Verified against for unknown e-mails so both paths cost one Argon2 check.
    dummy_hash: String,
}

const DUMMY_PASSWORD: &str = "docshare-unknown-account";

impl InMemoryIdentityProvider {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            accounts: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            dummy_hash: hash_password(DUMMY_PASSWORD)?,
        })
    }

    /// Add an account and return its subject id. Re-registering an e-mail replaces it.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<String, AppError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AppError::InvalidInput(
                "E-mail and password are required".to_string(),
            ));
        }

        let password = password.to_string();
        let password_hash = run_blocking(move || hash_password(&password)).await?;
        let subject_id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();

        let account = Account {
            subject_id: subject_id.clone(),
            display_name: display_name.to_string(),
            email: email.clone(),
            password_hash,
        };
        self.accounts.write().await.insert(email, account);

        Ok(subject_id)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<VerifiedIdentity>, AppError> {
        let (identity, password_hash) = {
            let accounts = self.accounts.read().await;
            match accounts.get(&normalize_email(email)) {
                Some(account) => (
                    Some(VerifiedIdentity {
                        subject_id: account.subject_id.clone(),
                        display_name: account.display_name.clone(),
                        email: account.email.clone(),
                    }),
                    account.password_hash.clone(),
                ),
                None => (None, self.dummy_hash.clone()),
            }
        };

        let password = password.to_string();
        let verified = run_blocking(move || verify_password(&password, &password_hash)).await?;

        Ok(identity.filter(|_| verified))
    }
}

/// Argon2 is CPU-bound; keep it off the async workers.
async fn run_blocking<T, F>(task: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid hash format: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
