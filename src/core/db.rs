use std::collections::HashMap;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use spin_sdk::key_value::Store;

use crate::{posts, relations, users};

/// Handle to the single logical database, passed explicitly into every
/// service operation. One handle scopes one unit of work; isolation is
/// whatever the backing store provides.
pub trait Database {
    fn get_raw(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set_raw(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        match self.get_raw(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        self.set_raw(key, &serde_json::to_vec(value)?)
    }
}

/// Spin key-value store, available inside the Spin runtime.
pub struct KvDatabase {
    store: Store,
}

impl KvDatabase {
    pub fn open_default() -> anyhow::Result<KvDatabase> {
        let store = Store::open_default()
            .map_err(|e| anyhow::anyhow!("failed to open key-value store: {e:?}"))?;
        Ok(KvDatabase { store })
    }
}

impl Database for KvDatabase {
    fn get_raw(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.store
            .get(key)
            .map_err(|e| anyhow::anyhow!("key-value get failed: {e:?}"))
    }

    fn set_raw(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.store
            .set(key, value)
            .map_err(|e| anyhow::anyhow!("key-value set failed: {e:?}"))
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.store
            .delete(key)
            .map_err(|e| anyhow::anyhow!("key-value delete failed: {e:?}"))
    }
}

/// In-process map with the same contract, used by the native dev server
/// and the test suite.
#[derive(Default)]
pub struct MemoryDatabase {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDatabase {
    pub fn new() -> MemoryDatabase {
        MemoryDatabase::default()
    }
}

impl Database for MemoryDatabase {
    fn get_raw(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().expect("database mutex poisoned");
        Ok(entries.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().expect("database mutex poisoned");
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().expect("database mutex poisoned");
        entries.remove(key);
        Ok(())
    }
}

// === Demo data ===

/// Seeds a handful of users with a friendship, a pending request and a
/// few posts so a fresh environment has something to show. Idempotent.
pub fn init_demo_data(db: &impl Database) -> anyhow::Result<()> {
    if users::find_user_by_name(db, "mira")?.is_some() {
        return Ok(());
    }

    let mira = users::register_user(db, "mira", "mira@example.com", "mira")?;
    let jonas = users::register_user(db, "jonas", "jonas@example.com", "jonas")?;
    let petra = users::register_user(db, "petra", "petra@example.com", "petra")?;

    posts::save_post(
        db,
        &mira.id,
        "Hello",
        "First post on circles. https://example.com",
    )?;
    posts::save_post(db, &jonas.id, "Workshop notes", "Slides are up, ask me for the link.")?;
    posts::save_post(db, &jonas.id, "Follow-up", "Recording is online as well.")?;

    // mira and jonas are friends; petra has asked mira and is still waiting.
    relations::send_friend_request(db, &mira.id, &jonas.id)?;
    relations::accept_friend_request(db, &jonas.id, &mira.id)?;
    relations::send_friend_request(db, &petra.id, &mira.id)?;

    Ok(())
}
