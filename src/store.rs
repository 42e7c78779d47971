//! User and admin records, persisted as a single JSON document.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::error::{BotError, Result};
use crate::i18n::Language;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: u64,
    pub username: Option<String>,
    pub language: Language,
    pub number_of_files_sent: u64,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn has_premium(&self, now: DateTime<Utc>) -> bool {
        self.premium_expires_at.is_some_and(|expires| expires > now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminRecord {
    pub admin_user_id: u64,
    pub is_owner: bool,
    pub created_at: DateTime<Utc>,
}

/// Persistence for users and admins. Implementations are synchronous and
/// must not be called while holding a lock across `.await`.
pub trait UserStore: Send + Sync {
    /// Creates the user on first sight and refreshes a changed username.
    fn upsert(&self, user_id: u64, username: Option<&str>) -> Result<UserRecord>;
    fn get(&self, user_id: u64) -> Result<Option<UserRecord>>;
    fn set_language(&self, user_id: u64, language: Language) -> Result<()>;
    fn increment_files_sent(&self, user_id: u64) -> Result<u64>;
    fn set_premium(&self, user_id: u64, expires_at: Option<DateTime<Utc>>) -> Result<bool>;
    fn is_admin(&self, user_id: u64) -> Result<bool>;
    fn is_owner(&self, user_id: u64) -> Result<bool>;
    /// Returns false when the user already was an admin.
    fn add_admin(&self, user_id: u64) -> Result<bool>;
    /// Returns false when there was nothing to remove. Owners cannot be removed.
    fn remove_admin(&self, user_id: u64) -> Result<bool>;
    fn seed_owner(&self, user_id: u64) -> Result<()>;
    /// Users ordered oldest first; with `limit`, only the newest `limit` of them.
    fn list_users(&self, limit: Option<usize>) -> Result<Vec<UserRecord>>;
    fn count_by_language(&self) -> Result<BTreeMap<String, u64>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    users: HashMap<u64, UserRecord>,
    #[serde(default)]
    admins: HashMap<u64, AdminRecord>,
}

pub struct JsonUserStore {
    path: PathBuf,
    data: RwLock<StoreData>,
    /// Serializes writers so snapshots reach the disk in order.
    writer: Mutex<()>,
}

impl JsonUserStore {
    /// Loads the store from `path`, starting empty when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => StoreData::default(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(err) => return Err(err.into()),
        };
        info!(
            "Loaded {} users and {} admins from {}",
            data.users.len(),
            data.admins.len(),
            path.display()
        );
        Ok(Self {
            path,
            data: RwLock::new(data),
            writer: Mutex::new(()),
        })
    }

    fn read<T>(&self, f: impl FnOnce(&StoreData) -> T) -> Result<T> {
        let data = self
            .data
            .read()
            .map_err(|e| BotError::Store(format!("lock poisoned: {e}")))?;
        Ok(f(&data))
    }

    /// Applies a mutation to a copy, persists the copy, and only then makes
    /// it visible. Readers are never blocked by file IO, and a failed write
    /// leaves memory matching the file.
    fn write<T>(&self, f: impl FnOnce(&mut StoreData) -> T) -> Result<T> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = self.read(StoreData::clone)?;
        let result = f(&mut next);
        let bytes = serde_json::to_vec_pretty(&next)?;
        off_worker(|| persist(&self.path, &bytes))?;

        let mut data = self
            .data
            .write()
            .map_err(|e| BotError::Store(format!("lock poisoned: {e}")))?;
        *data = next;
        Ok(result)
    }
}

/// Runs blocking file IO without stalling other tasks on a multi-threaded
/// runtime. Elsewhere it just runs inline.
fn off_worker<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    debug!("Persisted user store to {}", path.display());
    Ok(())
}

impl UserStore for JsonUserStore {
    fn upsert(&self, user_id: u64, username: Option<&str>) -> Result<UserRecord> {
        let username = username.map(str::to_string);

        let existing = self.read(|data| data.users.get(&user_id).cloned())?;
        if let Some(user) = existing.filter(|u| u.username == username) {
            return Ok(user);
        }

        self.write(|data| {
            let now = Utc::now();
            let user = data.users.entry(user_id).or_insert_with(|| UserRecord {
                user_id,
                username: None,
                language: Language::En,
                number_of_files_sent: 0,
                premium_expires_at: None,
                created_at: now,
                updated_at: now,
            });
            user.username = username;
            user.updated_at = now;
            user.clone()
        })
    }

    fn get(&self, user_id: u64) -> Result<Option<UserRecord>> {
        self.read(|data| data.users.get(&user_id).cloned())
    }

    fn set_language(&self, user_id: u64, language: Language) -> Result<()> {
        let found = self.write(|data| {
            data.users.get_mut(&user_id).map(|user| {
                user.language = language;
                user.updated_at = Utc::now();
            })
        })?;
        found.ok_or_else(|| BotError::Store(format!("user {user_id} not found")))
    }

    fn increment_files_sent(&self, user_id: u64) -> Result<u64> {
        let count = self.write(|data| {
            data.users.get_mut(&user_id).map(|user| {
                user.number_of_files_sent += 1;
                user.updated_at = Utc::now();
                user.number_of_files_sent
            })
        })?;
        count.ok_or_else(|| BotError::Store(format!("user {user_id} not found")))
    }

    fn set_premium(&self, user_id: u64, expires_at: Option<DateTime<Utc>>) -> Result<bool> {
        self.write(|data| {
            data.users
                .get_mut(&user_id)
                .map(|user| {
                    user.premium_expires_at = expires_at;
                    user.updated_at = Utc::now();
                })
                .is_some()
        })
    }

    fn is_admin(&self, user_id: u64) -> Result<bool> {
        self.read(|data| data.admins.contains_key(&user_id))
    }

    fn is_owner(&self, user_id: u64) -> Result<bool> {
        self.read(|data| data.admins.get(&user_id).is_some_and(|a| a.is_owner))
    }

    fn add_admin(&self, user_id: u64) -> Result<bool> {
        if self.is_admin(user_id)? {
            return Ok(false);
        }
        self.write(|data| {
            data.admins.insert(
                user_id,
                AdminRecord {
                    admin_user_id: user_id,
                    is_owner: false,
                    created_at: Utc::now(),
                },
            );
            true
        })
    }

    fn remove_admin(&self, user_id: u64) -> Result<bool> {
        let removable = self.read(|data| data.admins.get(&user_id).is_some_and(|a| !a.is_owner))?;
        if !removable {
            return Ok(false);
        }
        self.write(|data| data.admins.remove(&user_id).is_some())
    }

    fn seed_owner(&self, user_id: u64) -> Result<()> {
        if self.is_owner(user_id)? {
            return Ok(());
        }
        self.write(|data| {
            let now = Utc::now();
            data.admins
                .entry(user_id)
                .and_modify(|a| a.is_owner = true)
                .or_insert(AdminRecord {
                    admin_user_id: user_id,
                    is_owner: true,
                    created_at: now,
                });
        })?;
        info!("Seeded owner {}", user_id);
        Ok(())
    }

    fn list_users(&self, limit: Option<usize>) -> Result<Vec<UserRecord>> {
        self.read(|data| {
            let mut users: Vec<UserRecord> = data.users.values().cloned().collect();
            users.sort_by_key(|u| (u.created_at, u.user_id));
            if let Some(limit) = limit {
                let skip = users.len().saturating_sub(limit);
                users.drain(..skip);
            }
            users
        })
    }

    fn count_by_language(&self) -> Result<BTreeMap<String, u64>> {
        self.read(|data| {
            let mut counts = BTreeMap::new();
            for user in data.users.values() {
                *counts.entry(user.language.code().to_string()).or_insert(0) += 1;
            }
            counts
        })
    }
}
