//! Local persistent state.
//!
//! [`KeyValueStore`] is the persistence surface: named slots holding text.
//! [`LocalStore`] keeps two JSON arrays in it: the pending items, and the
//! identities of claims the service has not confirmed yet. Only the mutator
//! writes those slots; the reconciler and bootstrap only read.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{ErrorCode, SyncError};
use crate::identity::identity_of;
use crate::lock::{Access, DirLock, LockError};
use crate::model::Item;

/// Slot holding the pending items.
pub const PENDING_SLOT: &str = "pendingItems";

/// Slot holding identities claimed while the service was unreachable.
pub const PENDING_CLAIMS_SLOT: &str = "pendingClaims";

/// Suffix of the slot a corrupt value is moved to before a reset.
pub const QUARANTINE_SUFFIX: &str = ".corrupt";

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors from the persistence surface.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("slot I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Lock(#[from] LockError),

    #[error("invalid slot name '{0}'")]
    InvalidKey(String),

    #[error("failed to encode slot '{slot}': {source}")]
    Encode {
        slot: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Lock(err) => err.code(),
            Self::Io { .. } | Self::Encode { .. } => ErrorCode::StorageWriteFailed,
            Self::InvalidKey(_) => ErrorCode::InternalUnexpected,
        }
    }
}

// ---------------------------------------------------------------------------
// Key-value surface
// ---------------------------------------------------------------------------

/// Slot access inside a [`KeyValueStore::transaction`].
pub trait Slots {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Best-effort persistent key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Run `body` with every slot held exclusively. No other writer runs
    /// between the reads and writes `body` makes.
    ///
    /// # Errors
    ///
    /// Whatever `body` returns, or a lock failure before it runs.
    fn transaction<R>(
        &self,
        body: impl FnOnce(&mut dyn Slots) -> Result<R, StoreError>,
    ) -> Result<R, StoreError>;
}

impl<T: KeyValueStore> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn transaction<R>(
        &self,
        body: impl FnOnce(&mut dyn Slots) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        (**self).transaction(body)
    }
}

/// One `<slot>.json` file per key inside a directory.
///
/// Writes go to a temp file that is renamed over the slot while the
/// directory lock is held exclusively, so concurrent `lf` processes never
/// observe a torn slot or lose each other's updates.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    lock_timeout: Duration,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(".slots.lock")
    }

    fn read_slot(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&path)(err)),
        }
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.slot_path(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_err(&path))
    }

    fn delete_slot(&self, key: &str) -> Result<(), StoreError> {
        let path = self.slot_path(key)?;
        match fs::remove_file(&path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(io_err(&path)(err)),
            _ => Ok(()),
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The slots of a [`FileStore`] whose directory lock is already held.
struct LockedDir<'a>(&'a FileStore);

impl Slots for LockedDir<'_> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.0.read_slot(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.0.write_slot(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.0.delete_slot(key)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if !self.slot_path(key)?.exists() {
            return Ok(None);
        }
        let _lock = DirLock::acquire(&self.lock_path(), Access::Shared, self.lock_timeout)?;
        self.read_slot(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.transaction(|slots| slots.set(key, value))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if !self.slot_path(key)?.exists() {
            return Ok(());
        }
        self.transaction(|slots| slots.remove(key))
    }

    fn transaction<R>(
        &self,
        body: impl FnOnce(&mut dyn Slots) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        DirLock::hold(&self.lock_path(), self.lock_timeout, || body(&mut LockedDir(self)))?
    }
}

/// In-process slots, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Slots for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(BTreeMap::get(self, key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        BTreeMap::remove(self, key);
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.transaction(|slots| slots.get(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.transaction(|slots| slots.set(key, value))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.transaction(|slots| slots.remove(key))
    }

    fn transaction<R>(
        &self,
        body: impl FnOnce(&mut dyn Slots) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        body(&mut *slots)
    }
}

// ---------------------------------------------------------------------------
// Pending items and claims
// ---------------------------------------------------------------------------

type Decoder<T> = fn(&str) -> Result<Vec<T>, String>;

/// The pending-item list kept in [`PENDING_SLOT`], and the unconfirmed
/// claims kept in [`PENDING_CLAIMS_SLOT`].
///
/// Every item in here is, by definition, of local origin.
#[derive(Debug, Clone)]
pub struct LocalStore<S> {
    kv: S,
}

impl<S: KeyValueStore> LocalStore<S> {
    pub const fn new(kv: S) -> Self {
        Self { kv }
    }

    pub const fn kv(&self) -> &S {
        &self.kv
    }

    /// Strict read: absent slot is empty, a corrupt slot is an error.
    ///
    /// # Errors
    ///
    /// [`SyncError::MalformedLocalState`] when the slot is not a JSON array,
    /// [`SyncError::Storage`] when it cannot be read.
    pub fn read(&self) -> Result<Vec<Item>, SyncError> {
        let Some(raw) = self.kv.get(PENDING_SLOT)? else {
            return Ok(Vec::new());
        };
        decode_items(&raw).map_err(|detail| malformed(PENDING_SLOT, detail))
    }

    /// Read that recovers from corruption.
    ///
    /// A corrupt slot is quarantined to `pendingItems.corrupt`, reset, and
    /// reads as empty. Only a slot that cannot be reached is an error.
    ///
    /// # Errors
    ///
    /// [`SyncError::Storage`] when the slot cannot be read or reset.
    pub fn read_or_reset(&self) -> Result<Vec<Item>, SyncError> {
        self.read_recovering(PENDING_SLOT, decode_items)
            .map_err(SyncError::from)
    }

    /// Bootstrap read: never fails. An unreadable slot is treated as empty.
    pub fn load(&self) -> Vec<Item> {
        self.read_or_reset().unwrap_or_else(|err| {
            warn!(error = %err, "pending slot unreadable; treating as empty");
            Vec::new()
        })
    }

    fn read_recovering<T>(&self, slot: &str, decode: Decoder<T>) -> Result<Vec<T>, StoreError> {
        let Some(raw) = self.kv.get(slot)? else {
            return Ok(Vec::new());
        };
        match decode(&raw) {
            Ok(values) => Ok(values),
            Err(_) => self.kv.transaction(|slots| recover(slots, slot, decode)),
        }
    }

    /// Overwrite the slot. An empty list removes it.
    ///
    /// # Errors
    ///
    /// Returns an error when the slot cannot be written.
    pub fn save(&self, items: &[Item]) -> Result<(), StoreError> {
        self.kv
            .transaction(|slots| write_slot(slots, PENDING_SLOT, items))
    }

    /// Append an item.
    ///
    /// # Errors
    ///
    /// Returns an error when the slot cannot be read or written. A corrupt
    /// slot is quarantined and the item becomes its only entry.
    pub fn push(&self, item: Item) -> Result<(), StoreError> {
        self.kv.transaction(|slots| {
            let mut items = recover(slots, PENDING_SLOT, decode_items)?;
            items.push(item);
            write_slot(slots, PENDING_SLOT, &items)
        })
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.load().iter().any(|item| identity_of(item) == Some(id))
    }

    /// Remove the item with `id`, returning it.
    ///
    /// # Errors
    ///
    /// Returns an error when the slot cannot be read or written.
    pub fn remove(&self, id: &str) -> Result<Option<Item>, StoreError> {
        self.kv.transaction(|slots| {
            let mut items = recover(slots, PENDING_SLOT, decode_items)?;
            let Some(pos) = items.iter().position(|item| identity_of(item) == Some(id)) else {
                return Ok(None);
            };
            let removed = items.remove(pos);
            write_slot(slots, PENDING_SLOT, &items)?;
            Ok(Some(removed))
        })
    }

    /// Apply `change` to the item with `id` in place, returning the result.
    ///
    /// # Errors
    ///
    /// Returns an error when the slot cannot be read or written.
    pub fn modify(
        &self,
        id: &str,
        change: impl FnOnce(&mut Item),
    ) -> Result<Option<Item>, StoreError> {
        self.kv.transaction(|slots| {
            let mut items = recover(slots, PENDING_SLOT, decode_items)?;
            let Some(item) = items.iter_mut().find(|item| identity_of(item) == Some(id)) else {
                return Ok(None);
            };
            change(item);
            let updated = item.clone();
            write_slot(slots, PENDING_SLOT, &items)?;
            Ok(Some(updated))
        })
    }

    /// Claims not yet confirmed by the service, oldest first.
    pub fn pending_claims(&self) -> Vec<String> {
        self.read_recovering(PENDING_CLAIMS_SLOT, decode_claims)
            .unwrap_or_else(|err| {
                warn!(error = %err, "claims slot unreadable; treating as empty");
                Vec::new()
            })
    }

    /// Remember a claim the service has not confirmed.
    ///
    /// # Errors
    ///
    /// Returns an error when the slot cannot be written.
    pub fn record_claim(&self, id: &str) -> Result<(), StoreError> {
        self.kv.transaction(|slots| {
            let mut ids = recover(slots, PENDING_CLAIMS_SLOT, decode_claims)?;
            if ids.iter().any(|known| known == id) {
                return Ok(());
            }
            ids.push(id.to_string());
            write_slot(slots, PENDING_CLAIMS_SLOT, &ids)
        })
    }

    /// Forget a pending claim. Returns whether it was recorded.
    ///
    /// # Errors
    ///
    /// Returns an error when the slot cannot be written.
    pub fn settle_claim(&self, id: &str) -> Result<bool, StoreError> {
        self.kv.transaction(|slots| {
            let mut ids = recover(slots, PENDING_CLAIMS_SLOT, decode_claims)?;
            let before = ids.len();
            ids.retain(|known| known != id);
            if ids.len() == before {
                return Ok(false);
            }
            write_slot(slots, PENDING_CLAIMS_SLOT, &ids)?;
            Ok(true)
        })
    }
}

fn malformed(slot: &str, detail: String) -> SyncError {
    SyncError::MalformedLocalState {
        slot: slot.to_string(),
        detail,
    }
}

/// Decode `slot`. A corrupt value is moved to the quarantine slot, the slot
/// is reset, and it decodes as empty.
fn recover<T>(
    slots: &mut dyn Slots,
    slot: &str,
    decode: Decoder<T>,
) -> Result<Vec<T>, StoreError> {
    let Some(raw) = slots.get(slot)? else {
        return Ok(Vec::new());
    };
    match decode(&raw) {
        Ok(values) => Ok(values),
        Err(detail) => {
            let err = malformed(slot, detail);
            warn!(error = %err, code = %err.code(), "resetting corrupt slot");
            slots.set(&format!("{slot}{QUARANTINE_SUFFIX}"), &raw)?;
            slots.remove(slot)?;
            Ok(Vec::new())
        }
    }
}

/// Encode `values` into `slot`. An empty list removes it.
fn write_slot<T: Serialize>(
    slots: &mut dyn Slots,
    slot: &str,
    values: &[T],
) -> Result<(), StoreError> {
    if values.is_empty() {
        return slots.remove(slot);
    }
    let encoded = serde_json::to_string(values).map_err(|source| StoreError::Encode {
        slot: slot.to_string(),
        source,
    })?;
    slots.set(slot, &encoded)
}

fn decode_array(raw: &str) -> Result<Vec<Value>, String> {
    match serde_json::from_str(raw).map_err(|err| err.to_string())? {
        Value::Array(elements) => Ok(elements),
        _ => Err("expected a JSON array".to_string()),
    }
}

fn decode_items(raw: &str) -> Result<Vec<Item>, String> {
    let elements = decode_array(raw)?;
    let total = elements.len();
    let items: Vec<Item> = elements.into_iter().filter_map(Item::from_value_lossy).collect();
    if items.len() < total {
        warn!(
            skipped = total - items.len(),
            "ignored non-object entries in pending slot"
        );
    }
    Ok(items)
}

fn decode_claims(raw: &str) -> Result<Vec<String>, String> {
    Ok(decode_array(raw)?
        .into_iter()
        .filter_map(|value| match value {
            Value::String(id) if !id.trim().is_empty() => Some(id),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> LocalStore<MemoryStore> {
        LocalStore::new(MemoryStore::new())
    }

    #[test]
    fn absent_slot_is_empty() {
        let store = memory();
        assert!(store.load().is_empty());
        assert!(store.read().unwrap().is_empty());
    }

    #[test]
    fn corrupt_slot_is_quarantined_and_reset() {
        let store = memory();
        store.kv().set(PENDING_SLOT, "{not json").unwrap();

        assert!(matches!(
            store.read(),
            Err(SyncError::MalformedLocalState { .. })
        ));
        assert!(store.load().is_empty());
        assert_eq!(store.kv().get(PENDING_SLOT).unwrap(), None);
        assert_eq!(
            store.kv().get("pendingItems.corrupt").unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn non_array_slot_is_malformed() {
        let store = memory();
        store.kv().set(PENDING_SLOT, r#"{"id":"a"}"#).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let store = memory();
        store
            .kv()
            .set(PENDING_SLOT, r#"[{"_id":"a","title":"A"}, 7, null]"#)
            .unwrap();
        let items = store.load();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].identity(), Some("a"));
    }

    #[test]
    fn push_remove_and_modify() {
        let store = memory();
        store.push(Item::new("A").with_id("a")).unwrap();
        store.push(Item::new("B").with_id("b")).unwrap();
        assert!(store.contains("a"));

        let changed = store.modify("b", Item::mark_claimed).unwrap().unwrap();
        assert!(changed.claimed);
        assert!(store.load()[1].claimed);

        let removed = store.remove("a").unwrap().unwrap();
        assert_eq!(removed.title, "A");
        assert!(!store.contains("a"));
        assert_eq!(store.remove("missing").unwrap(), None);
    }

    #[test]
    fn emptying_the_list_removes_the_slot() {
        let store = memory();
        store.push(Item::new("A").with_id("a")).unwrap();
        store.remove("a").unwrap();
        assert_eq!(store.kv().get(PENDING_SLOT).unwrap(), None);
    }

    #[test]
    fn file_store_round_trips_slots() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(FileStore::new(dir.path()));
        store.push(Item::new("Umbrella").with_id("u")).unwrap();

        let reopened = LocalStore::new(FileStore::new(dir.path()));
        let items = reopened.load();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Umbrella");
        assert!(dir.path().join("pendingItems.json").exists());
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn file_store_corrupt_slot_recovers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pendingItems.json"), "[{\"id\": ").unwrap();
        let store = LocalStore::new(FileStore::new(dir.path()));
        assert!(store.load().is_empty());
        assert!(dir.path().join("pendingItems.corrupt.json").exists());
    }

    #[test]
    fn read_or_reset_clears_corruption_for_good() {
        let store = memory();
        store.kv().set(PENDING_SLOT, "[{\"id\": ").unwrap();

        assert!(store.read_or_reset().unwrap().is_empty());
        assert!(store.read_or_reset().unwrap().is_empty());
        assert!(store.read().unwrap().is_empty());
        assert_eq!(
            store.kv().get("pendingItems.corrupt").unwrap().as_deref(),
            Some("[{\"id\": ")
        );
    }

    #[test]
    fn read_or_reset_keeps_valid_items() {
        let store = memory();
        store.push(Item::new("A").with_id("a")).unwrap();
        let items = store.read_or_reset().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(store.kv().get("pendingItems.corrupt").unwrap(), None);
    }

    #[test]
    fn push_onto_corrupt_slot_quarantines_first() {
        let store = memory();
        store.kv().set(PENDING_SLOT, "oops").unwrap();
        store.push(Item::new("A").with_id("a")).unwrap();

        let items = store.read().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            store.kv().get("pendingItems.corrupt").unwrap().as_deref(),
            Some("oops")
        );
    }

    #[test]
    fn claims_are_recorded_once_and_settled() {
        let store = memory();
        assert!(store.pending_claims().is_empty());

        store.record_claim("x").unwrap();
        store.record_claim("y").unwrap();
        store.record_claim("x").unwrap();
        assert_eq!(store.pending_claims(), ["x", "y"]);

        assert!(store.settle_claim("x").unwrap());
        assert!(!store.settle_claim("x").unwrap());
        assert_eq!(store.pending_claims(), ["y"]);

        store.settle_claim("y").unwrap();
        assert_eq!(store.kv().get(PENDING_CLAIMS_SLOT).unwrap(), None);
    }

    #[test]
    fn corrupt_claims_slot_reads_empty() {
        let store = memory();
        store.kv().set(PENDING_CLAIMS_SLOT, "{\"x\": true}").unwrap();
        assert!(store.pending_claims().is_empty());
        assert_eq!(store.kv().get(PENDING_CLAIMS_SLOT).unwrap(), None);

        store.kv().set(PENDING_CLAIMS_SLOT, r#"["x", 3, "", "y"]"#).unwrap();
        assert_eq!(store.pending_claims(), ["x", "y"]);
    }

    #[test]
    fn concurrent_pushes_keep_every_item() {
        let dir = tempfile::tempdir().unwrap();
        let handles: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|writer| {
                let path = dir.path().to_path_buf();
                std::thread::spawn(move || {
                    let store = LocalStore::new(
                        FileStore::new(path).with_lock_timeout(Duration::from_secs(10)),
                    );
                    for n in 0..25 {
                        store
                            .push(Item::new(format!("{writer}{n}")).with_id(format!("{writer}-{n}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let items = LocalStore::new(FileStore::new(dir.path())).read().unwrap();
        assert_eq!(items.len(), 50);
        assert!(items.iter().any(|item| item.identity() == Some("a-24")));
        assert!(items.iter().any(|item| item.identity() == Some("b-24")));
    }

    #[test]
    fn transaction_sees_its_own_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let seen = store
            .transaction(|slots| {
                slots.set("counter", "1")?;
                slots.get("counter")
            })
            .unwrap();
        assert_eq!(seen.as_deref(), Some("1"));
        assert_eq!(store.get("counter").unwrap().as_deref(), Some("1"));
    }
}
