//! Credential store: account creation and password verification.
//!
//! Passwords are hashed with Argon2id and a random per-user salt. Hashing is
//! deliberately slow, so both hashing and verification run on the blocking
//! pool instead of the async workers.

use std::sync::Arc;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use shelf_db::Database;
use shelf_db::models::UserRow;
use shelf_types::models::User;

use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::rows::{timestamp, user_from_row};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=30;

const DUPLICATE_ACCOUNT: &str = "User with this email or username already exists";

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashCost {
    /// Cheapest parameters argon2 accepts. Tests only.
    pub fn minimal() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
        }
    }

    fn params(&self) -> anyhow::Result<Params> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<Database>,
    params: Params,
    /// Hash with the configured cost, checked when the email is unknown so
    /// that a miss costs as much as a wrong password.
    dummy_hash: Arc<str>,
}

impl CredentialStore {
    pub fn new(db: Arc<Database>, cost: HashCost) -> anyhow::Result<Self> {
        let params = cost.params()?;
        let dummy_hash = hash_password("shelf-unknown-account", params.clone())?;
        Ok(Self {
            db,
            params,
            dummy_hash: dummy_hash.into(),
        })
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> ApiResult<User> {
        let username = username.trim().to_string();
        let email = normalize_email(email);
        validate_signup(&username, &email, password)?;

        let db = self.db.clone();
        let (u, e) = (username.clone(), email.clone());
        if blocking(move || db.user_exists(&u, &e)).await? {
            return Err(ApiError::Conflict(DUPLICATE_ACCOUNT.into()));
        }

        let params = self.params.clone();
        let password = password.to_string();
        let password_hash = blocking(move || hash_password(&password, params)).await?;

        let now = timestamp(Utc::now());
        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password: password_hash,
            created_at: now.clone(),
            updated_at: now,
        };

        let db = self.db.clone();
        let user = user_from_row(&row)?;
        let inserted = tokio::task::spawn_blocking(move || db.create_user(&row))
            .await
            .map_err(|e| ApiError::Internal(format!("spawn_blocking join error: {e}")))?;
        match inserted {
            Ok(()) => {}
            // Lost a race with a concurrent signup for the same name/email.
            Err(e) if shelf_db::is_constraint_violation(&e) => {
                return Err(ApiError::Conflict(DUPLICATE_ACCOUNT.into()));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Unknown email and wrong password both yield `InvalidCredentials`.
    pub async fn verify(&self, email: &str, password: &str) -> ApiResult<User> {
        let email = normalize_email(email);
        let db = self.db.clone();
        let row = blocking(move || db.get_user_by_email(&email)).await?;

        let hash = match &row {
            Some(row) => row.password.clone(),
            None => self.dummy_hash.to_string(),
        };
        let password = password.to_string();
        let matches = blocking(move || verify_password(&password, &hash)).await?;

        match row {
            Some(row) if matches => user_from_row(&row),
            _ => Err(ApiError::InvalidCredentials),
        }
    }

    pub async fn get(&self, user_id: Uuid) -> ApiResult<Option<User>> {
        let db = self.db.clone();
        let id = user_id.to_string();
        blocking(move || db.get_user_by_id(&id))
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_signup(username: &str, email: &str, password: &str) -> ApiResult<()> {
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(ApiError::Validation(
            "Username must be between 3 and 30 characters".into(),
        ));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(ApiError::Validation("A valid email is required".into())),
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str, params: Params) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2 hash: {e}"))?
        .to_string();
    Ok(hash)
}

/// Parameters come from the PHC string, so older hashes keep verifying
/// after the configured cost changes.
fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("corrupt password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        let db = Arc::new(Database::open_in_memory().unwrap());
        CredentialStore::new(db, HashCost::minimal()).unwrap()
    }

    #[tokio::test]
    async fn stored_hash_is_not_the_password() {
        let store = store();
        let user = store.register("alice", "Alice@Example.com ", "hunter22").await.unwrap();
        assert_eq!(user.email, "alice@example.com");

        let row = store.db.get_user_by_email("alice@example.com").unwrap().unwrap();
        assert_ne!(row.password, "hunter22");
        assert!(!row.password.contains("hunter22"));
        assert!(row.password.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn verify_accepts_only_the_exact_password() {
        let store = store();
        store.register("alice", "alice@example.com", "hunter22").await.unwrap();

        let user = store.verify("ALICE@example.com", "hunter22").await.unwrap();
        assert_eq!(user.username, "alice");

        for wrong in ["hunter23", "Hunter22", "hunter2", "hunter22 ", ""] {
            assert!(matches!(
                store.verify("alice@example.com", wrong).await,
                Err(ApiError::InvalidCredentials)
            ));
        }
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let store = store();
        store.register("alice", "alice@example.com", "hunter22").await.unwrap();

        let unknown = store.verify("bob@example.com", "hunter22").await.unwrap_err();
        let wrong = store.verify("alice@example.com", "nope-nope").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.status(), wrong.status());
    }

    #[test]
    fn unknown_accounts_are_checked_at_full_cost() {
        let store = store();
        let minimal = HashCost::minimal();
        let parsed = PasswordHash::new(&store.dummy_hash).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        let params = Params::try_from(&parsed).unwrap();
        assert_eq!(params.m_cost(), minimal.memory_kib);
        assert_eq!(params.t_cost(), minimal.iterations);
        assert_eq!(params.p_cost(), minimal.parallelism);
        assert!(!verify_password("shelf-unknown-account ", &store.dummy_hash).unwrap());
    }

    #[tokio::test]
    async fn duplicates_conflict() {
        let store = store();
        store.register("alice", "alice@example.com", "hunter22").await.unwrap();

        assert!(matches!(
            store.register("alice", "other@example.com", "hunter22").await,
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            store.register("alice2", "ALICE@example.com", "hunter22").await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn signup_validation() {
        let store = store();
        for (username, email, password) in [
            ("al", "al@example.com", "hunter22"),
            (&"x".repeat(31) as &str, "x@example.com", "hunter22"),
            ("alice", "not-an-email", "hunter22"),
            ("alice", "alice@example.com", "12345"),
        ] {
            assert!(matches!(
                store.register(username, email, password).await,
                Err(ApiError::Validation(_))
            ));
        }
        assert!(store.db.get_user_by_email("alice@example.com").unwrap().is_none());
    }

    #[tokio::test]
    async fn profile_lookup() {
        let store = store();
        let user = store.register("alice", "alice@example.com", "hunter22").await.unwrap();
        assert_eq!(store.get(user.id).await.unwrap(), Some(user));
        assert_eq!(store.get(Uuid::new_v4()).await.unwrap(), None);
    }
}
