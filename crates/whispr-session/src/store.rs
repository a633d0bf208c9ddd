//! User accounts: the [`UserStore`] trait and two implementations.
//!
//! The session layer never sees a plaintext password after hashing it.
//! A store keeps, per username, a random salt and the digest of
//! `salt || password`, both as hex text.
//!
//! - [`MemoryUserStore`]: a `HashMap`. Accounts vanish on restart.
//! - [`FileUserStore`]: the same map persisted as a JSON object.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use whispr_crypto::verify_password;

use crate::StoreError;

/// What a store keeps for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub salt: String,
    pub salted_hash: String,
}

/// Account storage used by the auth state machine.
///
/// Usernames are unique: `create` on a taken name fails with
/// [`StoreError::Duplicate`]. The server owns its store from a single
/// task, so methods take `&self`/`&mut self` without any locking.
pub trait UserStore: Send + 'static {
    /// Whether an account with this exact (case-sensitive) name exists.
    fn exists(&self, username: &str) -> Result<bool, StoreError>;

    /// Creates an account from an already salted and hashed password.
    fn create(&mut self, username: &str, salt: &str, salted_hash: &str) -> Result<(), StoreError>;

    /// Checks a password. Unknown users simply fail verification.
    fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError>;
}

impl<S: UserStore + ?Sized> UserStore for Box<S> {
    fn exists(&self, username: &str) -> Result<bool, StoreError> {
        (**self).exists(username)
    }

    fn create(&mut self, username: &str, salt: &str, salted_hash: &str) -> Result<(), StoreError> {
        (**self).create(username, salt, salted_hash)
    }

    fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        (**self).verify(username, password)
    }
}

fn verify_record(username: &str, record: &UserRecord, password: &str) -> Result<bool, StoreError> {
    verify_password(&record.salt, &record.salted_hash, password).map_err(|e| StoreError::Corrupt {
        username: username.to_owned(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// MemoryUserStore
// ---------------------------------------------------------------------------

/// An in-memory store. Used by tests and by the server when no users
/// file is configured.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: HashMap<String, UserRecord>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserStore for MemoryUserStore {
    fn exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.users.contains_key(username))
    }

    fn create(&mut self, username: &str, salt: &str, salted_hash: &str) -> Result<(), StoreError> {
        if self.users.contains_key(username) {
            return Err(StoreError::Duplicate(username.to_owned()));
        }
        self.users.insert(
            username.to_owned(),
            UserRecord {
                salt: salt.to_owned(),
                salted_hash: salted_hash.to_owned(),
            },
        );
        Ok(())
    }

    fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        match self.users.get(username) {
            Some(record) => verify_record(username, record, password),
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// FileUserStore
// ---------------------------------------------------------------------------

/// A store persisted as a JSON object of `username → record`.
///
/// The whole file is loaded on open and rewritten on every `create`. The
/// rewrite goes to a sibling temp file that is then renamed over the
/// original, so a crash mid-write leaves the previous file intact.
#[derive(Debug)]
pub struct FileUserStore {
    path: PathBuf,
    users: HashMap<String, UserRecord>,
}

impl FileUserStore {
    /// Opens the store at `path`. A missing file is an empty store; the
    /// file is created on the first `create`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let users = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), users = users.len(), "user file loaded");
        Ok(Self { path, users })
    }

    /// Number of accounts.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn persist(&self) -> Result<(), StoreError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let json = serde_json::to_vec_pretty(&self.users)?;
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl UserStore for FileUserStore {
    fn exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.users.contains_key(username))
    }

    fn create(&mut self, username: &str, salt: &str, salted_hash: &str) -> Result<(), StoreError> {
        if self.users.contains_key(username) {
            return Err(StoreError::Duplicate(username.to_owned()));
        }
        self.users.insert(
            username.to_owned(),
            UserRecord {
                salt: salt.to_owned(),
                salted_hash: salted_hash.to_owned(),
            },
        );
        if let Err(e) = self.persist() {
            // Keep memory and disk in agreement.
            self.users.remove(username);
            return Err(e);
        }
        tracing::info!(username, "account created");
        Ok(())
    }

    fn verify(&self, username: &str, password: &str) -> Result<bool, StoreError> {
        match self.users.get(username) {
            Some(record) => verify_record(username, record, password),
            None => Ok(false),
        }
    }
}
