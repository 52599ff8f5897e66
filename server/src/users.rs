//! User lookup and password verification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use async_trait::async_trait;
use rand::rngs::OsRng;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use sso_shared::types::UserRecord;

/// Returned (inside `anyhow::Error`) by [`UserStore::insert`] when another
/// user already has the email.
#[derive(Debug, Error)]
#[error("email {0} is already registered")]
pub struct EmailTaken(pub String);

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>>;
    /// Add a user. Fails with [`EmailTaken`] if the email is in use.
    async fn insert(&self, user: UserRecord) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Users kept as a JSON array of [`UserRecord`]s. Read once at startup;
/// a store loaded from a file writes the whole array back on every insert.
#[derive(Debug)]
pub struct JsonUserStore {
    users: RwLock<Vec<UserRecord>>,
    path: Option<PathBuf>,
}

impl JsonUserStore {
    pub fn from_json(json: &str) -> Result<Self> {
        let users: Vec<UserRecord> =
            serde_json::from_str(json).context("Failed to parse user records")?;

        let mut seen = HashMap::new();
        for user in &users {
            if let Some(previous) = seen.insert(user.email.as_str(), user.id.as_str()) {
                return Err(anyhow!(
                    "Duplicate email {} (users {} and {})",
                    user.email,
                    previous,
                    user.id
                ));
            }
        }

        Ok(Self {
            users: RwLock::new(users),
            path: None,
        })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read users file: {}", path.display()))?;
        let mut store = Self::from_json(&json)?;
        info!(
            "Loaded {} users from {}",
            store.users.get_mut().len(),
            path.display()
        );
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

/// Write `users` to `path` through a temp file and rename.
async fn persist_users(path: &Path, users: &[UserRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(users).context("Failed to serialize users")?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    debug!("Saved {} users to {}", users.len(), path.display());
    Ok(())
}

#[async_trait]
impl UserStore for JsonUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: UserRecord) -> Result<()> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(EmailTaken(user.email).into());
        }

        users.push(user);
        if let Some(path) = &self.path {
            if let Err(e) = persist_users(path, &users).await {
                error!("Rolling back user insert: {:#}", e);
                users.pop();
                return Err(e);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn insert(&self, user: UserRecord) -> Result<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(EmailTaken(user.email).into());
        }
        users.insert(user.id.clone(), user);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Passwords
// ---------------------------------------------------------------------------

/// Well-formed Argon2id hash with the default cost parameters that no
/// password matches. Verified against when a login names an unknown email,
/// so both failure paths cost the same.
pub const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c3NvLWR1bW15LXNhbHQhIQ$bJYUvXIZrviSXXq9Flst/Mv08cPHxYyNvfBWykQtHl8";

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Password hashing failed: {}", e))
}

/// Verify a password against its PHC hash string.
///
/// A malformed hash is an error, a wrong password is `Ok(false)`.
pub fn verify_password(hash: &str, password: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("Password hashing task failed")?
}

/// [`verify_password`] on the blocking pool, Argon2 is deliberately slow.
pub async fn verify_password_blocking(hash: String, password: String) -> Result<bool> {
    debug!("Verifying password hash");
    tokio::task::spawn_blocking(move || verify_password(&hash, &password))
        .await
        .context("Password verification task failed")?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, email: &str) -> UserRecord {
        UserRecord {
            id: id.into(),
            name: "Ann".into(),
            email: email.into(),
            admin: false,
            password_hash: "x".into(),
            created: 0,
        }
    }

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&hash, "hunter22").unwrap());
        assert!(!verify_password(&hash, "hunter23").unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("not-a-hash", "pw").is_err());
    }

    #[tokio::test]
    async fn blocking_verify_matches_sync() {
        let hash = hash_password("pw").unwrap();
        assert!(verify_password_blocking(hash.clone(), "pw".into()).await.unwrap());
        assert!(!verify_password_blocking(hash, "nope".into()).await.unwrap());
    }

    #[tokio::test]
    async fn blocking_hash_verifies() {
        let hash = hash_password_blocking("pw".into()).await.unwrap();
        assert!(verify_password(&hash, "pw").unwrap());
    }

    #[tokio::test]
    async fn json_store_finds_by_email_and_id() {
        let json = serde_json::to_string(&vec![user("1", "ann@x.com"), user("2", "bob@x.com")])
            .unwrap();
        let store = JsonUserStore::from_json(&json).unwrap();

        let bob = store.find_by_email("bob@x.com").await.unwrap().unwrap();
        assert_eq!(bob.id, "2");
        assert_eq!(store.find_by_id("1").await.unwrap().unwrap().email, "ann@x.com");
        assert!(store.find_by_email("eve@x.com").await.unwrap().is_none());
    }

    #[test]
    fn json_store_rejects_duplicate_email() {
        let json = serde_json::to_string(&vec![user("1", "ann@x.com"), user("2", "ann@x.com")])
            .unwrap();
        assert!(JsonUserStore::from_json(&json).is_err());
    }

    #[tokio::test]
    async fn json_store_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, serde_json::to_string(&vec![user("1", "ann@x.com")]).unwrap())
            .unwrap();

        let store = JsonUserStore::load(&path).await.unwrap();
        assert!(store.find_by_id("1").await.unwrap().is_some());
        assert!(JsonUserStore::load(dir.path().join("missing.json")).await.is_err());
    }

    #[tokio::test]
    async fn memory_store_lookup() {
        let store = MemoryUserStore::new();
        store.insert(user("1", "ann@x.com")).await.unwrap();
        assert_eq!(store.find_by_email("ann@x.com").await.unwrap().unwrap().id, "1");
        assert!(store.find_by_id("2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_refuses_taken_email() {
        let store = MemoryUserStore::new();
        store.insert(user("1", "ann@x.com")).await.unwrap();

        let err = store.insert(user("2", "ann@x.com")).await.unwrap_err();
        assert!(err.downcast_ref::<EmailTaken>().is_some());
        assert!(store.find_by_id("2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn json_store_insert_is_written_back_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, serde_json::to_string(&vec![user("1", "ann@x.com")]).unwrap())
            .unwrap();

        let store = JsonUserStore::load(&path).await.unwrap();
        store.insert(user("2", "bob@x.com")).await.unwrap();
        assert_eq!(store.user_count().await, 2);

        let reloaded = JsonUserStore::load(&path).await.unwrap();
        assert_eq!(reloaded.find_by_email("bob@x.com").await.unwrap().unwrap().id, "2");
        assert!(!dir.path().join("users.json.tmp").exists());
    }

    #[tokio::test]
    async fn json_store_refuses_taken_email() {
        let json = serde_json::to_string(&vec![user("1", "ann@x.com")]).unwrap();
        let store = JsonUserStore::from_json(&json).unwrap();

        let err = store.insert(user("2", "ann@x.com")).await.unwrap_err();
        assert!(err.downcast_ref::<EmailTaken>().is_some());
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn json_store_rolls_back_when_the_file_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, "[]").unwrap();
        let store = JsonUserStore::load(&path).await.unwrap();

        std::fs::remove_dir_all(dir.path()).unwrap();
        assert!(store.insert(user("1", "ann@x.com")).await.is_err());
        assert_eq!(store.user_count().await, 0);
    }

    #[test]
    fn dummy_hash_is_well_formed_and_matches_nothing() {
        assert!(!verify_password(DUMMY_PASSWORD_HASH, "").unwrap());
        assert!(!verify_password(DUMMY_PASSWORD_HASH, "password").unwrap());
    }

    #[test]
    fn dummy_hash_costs_the_same_as_a_real_one() {
        let real = hash_password("pw").unwrap();
        let cost = |h: &str| {
            let parsed = PasswordHash::new(h).unwrap();
            let params = argon2::Params::try_from(&parsed).unwrap();
            (parsed.algorithm.to_string(), params.m_cost(), params.t_cost(), params.p_cost())
        };
        assert_eq!(cost(DUMMY_PASSWORD_HASH), cost(&real));
    }
}
