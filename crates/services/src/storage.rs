//! Two-tier key-value storage with page-scoped record partitions.
//!
//! The fast tier lives in process memory and is lost on exit; the durable
//! tier is a single JSON document on disk. Reads through [`StorageAdapter::get_cached`]
//! fall back to the durable tier and copy what they find into the fast tier.
//! Nothing here coordinates separate processes: the last write wins.

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use shared::{Credential, PagePartitioned};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Durable key holding the Gemini API key.
pub const CREDENTIAL_KEY: &str = "geminiApiKey";
/// Durable key holding every page's chat messages.
pub const CHAT_HISTORY_KEY: &str = "chatHistory";
/// Key (both tiers) holding every page's code snapshots.
pub const CODE_HISTORY_KEY: &str = "geminiCodeHistory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Fast,
    Durable,
}

/// Minimal key-value backend. Values are arbitrary JSON.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store; backs the fast tier.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// One JSON object on disk, rewritten in full on every change.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A corrupt file is logged and treated as empty rather than failing startup.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating storage dir {}", parent.display()))?;
        }

        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Map<String, Value>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Ignoring unreadable storage file {}: {}", path.display(), e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &Map<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Typed access to the fast and durable tiers.
#[derive(Clone)]
pub struct StorageAdapter {
    fast: Arc<dyn KvStore>,
    durable: Arc<dyn KvStore>,
}

impl StorageAdapter {
    pub fn new(fast: Arc<dyn KvStore>, durable: Arc<dyn KvStore>) -> Self {
        Self { fast, durable }
    }

    /// Both tiers in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Fast tier in memory, durable tier in `storage.json` under the user data dir.
    pub fn open_default() -> Result<Self> {
        let path = default_storage_path();
        debug!("Opening durable storage at {}", path.display());
        let durable = JsonFileStore::open(path)?;
        Ok(Self::new(Arc::new(MemoryStore::new()), Arc::new(durable)))
    }

    fn tier(&self, tier: Tier) -> &dyn KvStore {
        match tier {
            Tier::Fast => self.fast.as_ref(),
            Tier::Durable => self.durable.as_ref(),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, tier: Tier, key: &str) -> Result<Option<T>> {
        match self.tier(tier).get(key)? {
            Some(value) => {
                let typed = serde_json::from_value(value)
                    .with_context(|| format!("decoding {:?} value for {}", tier, key))?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, tier: Tier, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.tier(tier).set(key, value)
    }

    pub fn remove(&self, tier: Tier, key: &str) -> Result<()> {
        self.tier(tier).remove(key)
    }

    /// Read the fast tier, falling back to the durable tier and refilling the fast one.
    pub fn get_cached<T: DeserializeOwned + Serialize>(&self, key: &str) -> Result<Option<T>> {
        if let Some(hit) = self.get::<T>(Tier::Fast, key)? {
            return Ok(Some(hit));
        }
        let Some(value) = self.get::<T>(Tier::Durable, key)? else {
            return Ok(None);
        };
        if let Err(e) = self.set(Tier::Fast, key, &value) {
            warn!("Could not refill fast tier for {}: {:#}", key, e);
        }
        Ok(Some(value))
    }

    /// Write the same value to both tiers.
    pub fn set_through<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        self.set(Tier::Fast, key, value)?;
        self.set(Tier::Durable, key, value)
    }

    /// The stored API key; blank values count as missing.
    pub fn load_credential(&self) -> Result<Option<Credential>> {
        let raw: Option<String> = self.get(Tier::Durable, CREDENTIAL_KEY)?;
        Ok(raw.as_deref().and_then(Credential::new))
    }

    pub fn save_credential(&self, credential: &Credential) -> Result<()> {
        self.set(Tier::Durable, CREDENTIAL_KEY, &credential.api_key)
    }

    /// All records stored under `key` that belong to `page_url`, in append order.
    pub fn get_partition<T>(&self, tier: Tier, key: &str, page_url: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned + PagePartitioned,
    {
        let records: Vec<T> = self.get(tier, key)?.unwrap_or_default();
        Ok(records
            .into_iter()
            .filter(|r| r.page_url() == page_url)
            .collect())
    }

    pub fn append_record<T>(&self, tier: Tier, key: &str, record: &T) -> Result<()>
    where
        T: Serialize,
    {
        let mut records: Vec<Value> = self.get(tier, key)?.unwrap_or_default();
        records.push(serde_json::to_value(record)?);
        self.set(tier, key, &records)
    }

    /// Drop `page_url`'s records under `key`; other pages are left as they were.
    ///
    /// Returns how many records were removed.
    pub fn clear_partition<T>(&self, tier: Tier, key: &str, page_url: &str) -> Result<usize>
    where
        T: DeserializeOwned + Serialize + PagePartitioned,
    {
        let records: Vec<T> = self.get(tier, key)?.unwrap_or_default();
        let before = records.len();
        let kept: Vec<T> = records
            .into_iter()
            .filter(|r| r.page_url() != page_url)
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.set(tier, key, &kept)?;
        }
        Ok(removed)
    }
}

pub fn default_storage_path() -> PathBuf {
    directories::ProjectDirs::from("com.local", "Problem Solver", "ProblemSolver")
        .map(|p| p.data_dir().join("storage.json"))
        .unwrap_or_else(|| PathBuf::from("./data/storage.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ChatMessage, Sender};
    use tempfile::TempDir;

    fn msg(page: &str, text: &str) -> ChatMessage {
        ChatMessage::new(Sender::User, text, page)
    }

    #[test]
    fn test_clear_partition_keeps_other_pages() {
        let storage = StorageAdapter::in_memory();
        storage
            .append_record(Tier::Durable, CHAT_HISTORY_KEY, &msg("A", "one"))
            .unwrap();
        storage
            .append_record(Tier::Durable, CHAT_HISTORY_KEY, &msg("B", "two"))
            .unwrap();

        let removed = storage
            .clear_partition::<ChatMessage>(Tier::Durable, CHAT_HISTORY_KEY, "A")
            .unwrap();
        assert_eq!(removed, 1);

        let all: Vec<ChatMessage> = storage
            .get(Tier::Durable, CHAT_HISTORY_KEY)
            .unwrap()
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].page_url, "B");
        assert_eq!(all[0].text, "two");
    }

    #[test]
    fn test_get_partition_preserves_order() {
        let storage = StorageAdapter::in_memory();
        for (page, text) in [("A", "1"), ("B", "x"), ("A", "2"), ("A", "3")] {
            storage
                .append_record(Tier::Durable, CHAT_HISTORY_KEY, &msg(page, text))
                .unwrap();
        }

        let page_a: Vec<ChatMessage> = storage
            .get_partition(Tier::Durable, CHAT_HISTORY_KEY, "A")
            .unwrap();
        let texts: Vec<&str> = page_a.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_cached_read_refills_fast_tier() {
        let storage = StorageAdapter::in_memory();
        storage
            .set(Tier::Durable, CODE_HISTORY_KEY, &vec!["print(1)".to_string()])
            .unwrap();
        assert!(storage
            .get::<Vec<String>>(Tier::Fast, CODE_HISTORY_KEY)
            .unwrap()
            .is_none());

        let cached: Vec<String> = storage.get_cached(CODE_HISTORY_KEY).unwrap().unwrap();
        assert_eq!(cached, vec!["print(1)".to_string()]);

        let fast: Vec<String> = storage.get(Tier::Fast, CODE_HISTORY_KEY).unwrap().unwrap();
        assert_eq!(fast, cached);
    }

    #[test]
    fn test_credential_lives_in_durable_tier() {
        let storage = StorageAdapter::in_memory();
        assert!(storage.load_credential().unwrap().is_none());

        storage
            .save_credential(&Credential::new("AIza-test").unwrap())
            .unwrap();
        let raw: String = storage.get(Tier::Durable, CREDENTIAL_KEY).unwrap().unwrap();
        assert_eq!(raw, "AIza-test");
        assert!(storage.get::<String>(Tier::Fast, CREDENTIAL_KEY).unwrap().is_none());

        storage.set(Tier::Durable, CREDENTIAL_KEY, "   ").unwrap();
        assert!(storage.load_credential().unwrap().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("storage.json");

        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set(CREDENTIAL_KEY, Value::String("k-123".into())).unwrap();
        }

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get(CREDENTIAL_KEY).unwrap(),
            Some(Value::String("k-123".into()))
        );
        reopened.remove(CREDENTIAL_KEY).unwrap();
        assert_eq!(JsonFileStore::open(&path).unwrap().get(CREDENTIAL_KEY).unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("storage.json");
        fs::write(&path, b"{not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get(CHAT_HISTORY_KEY).unwrap(), None);
    }
}
