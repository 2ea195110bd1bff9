//! Persisted updater settings.
//!
//! Two durable values survive restarts: the auto-check flag and the list
//! of skipped release tags. They live behind the [`SettingsStore`]
//! capability so embedders can supply their own backend;
//! [`JsonFileStore`] persists to a namespaced JSON file under the
//! platform config directory, and [`MemoryStore`] keeps everything
//! in-process for tests and ephemeral embedders.

use crate::error::{Result, UpdateError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Settings key for the auto-check flag.
pub const AUTO_CHECK_KEY: &str = "auto_check_for_updates";

/// Settings key for the list of skipped release tags.
pub const SKIPPED_VERSIONS_KEY: &str = "skipped_versions";

/// Key-value persistence capability consumed by the updater.
///
/// Each getter returns `None` when the key has never been written. Each
/// field is read and written independently; no multi-key transaction is
/// offered or needed.
pub trait SettingsStore: Send + Sync {
    fn get_bool(&self, key: &str) -> Result<Option<bool>>;
    fn set_bool(&self, key: &str, value: bool) -> Result<()>;
    fn get_string_list(&self, key: &str) -> Result<Option<Vec<String>>>;
    fn set_string_list(&self, key: &str, values: &[String]) -> Result<()>;
}

type ValueMap = BTreeMap<String, serde_json::Value>;

/// File-backed settings store.
///
/// Persists a flat JSON object to `<config dir>/<namespace>/settings.json`.
/// Reads go to disk every time so that separate handles (or a restarted
/// process) observe each other's writes; the file is small enough that
/// this costs nothing.
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the backing file.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store scoped to `namespace` under the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the platform config directory cannot be
    /// determined.
    pub fn for_namespace(namespace: &str) -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| UpdateError::Config("cannot determine config directory".to_owned()))?;
        Ok(Self::at_path(base.join(namespace).join("settings.json")))
    }

    /// Store backed by an explicit file path. Used for test isolation.
    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<ValueMap> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ValueMap::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| UpdateError::Settings(format!("corrupt settings file: {e}")))
    }

    fn store(&self, values: &ValueMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(values)
            .map_err(|e| UpdateError::Settings(format!("cannot serialize settings: {e}")))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| UpdateError::Settings("settings lock poisoned".to_owned()))?;
        let mut values = self.load()?;
        values.insert(key.to_owned(), value);
        self.store(&values)
    }
}

impl SettingsStore for JsonFileStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.load()?.get(key).and_then(|v| v.as_bool()))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, serde_json::Value::Bool(value))
    }

    fn get_string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        let values = self.load()?;
        let Some(value) = values.get(key) else {
            return Ok(None);
        };
        let list = value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(list))
    }

    fn set_string_list(&self, key: &str, values: &[String]) -> Result<()> {
        self.set(key, serde_json::json!(values))
    }
}

/// In-memory settings store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<ValueMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_values<T>(&self, f: impl FnOnce(&mut ValueMap) -> T) -> Result<T> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| UpdateError::Settings("settings lock poisoned".to_owned()))?;
        Ok(f(&mut values))
    }
}

impl SettingsStore for MemoryStore {
    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.with_values(|values| values.get(key).and_then(|v| v.as_bool()))
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.with_values(|values| {
            values.insert(key.to_owned(), serde_json::Value::Bool(value));
        })
    }

    fn get_string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        self.with_values(|values| {
            values.get(key).map(|v| {
                v.as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_owned))
                            .collect()
                    })
                    .unwrap_or_default()
            })
        })
    }

    fn set_string_list(&self, key: &str, values: &[String]) -> Result<()> {
        self.with_values(|map| {
            map.insert(key.to_owned(), serde_json::json!(values));
        })
    }
}

/// Typed view over the updater's two persisted settings.
///
/// `skip`/`unskip` are read-modify-write cycles on the stored list, so
/// they are serialized behind a mutex; the plain getters and the
/// auto-check setter write a single field atomically and take no lock.
pub struct UpdaterSettings {
    store: Box<dyn SettingsStore>,
    skip_lock: Mutex<()>,
}

impl UpdaterSettings {
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        Self {
            store,
            skip_lock: Mutex::new(()),
        }
    }

    /// Seed the auto-check flag on first run, leaving an existing value
    /// untouched.
    pub fn ensure_defaults(&self, auto_check_default: bool) -> Result<()> {
        if self.store.get_bool(AUTO_CHECK_KEY)?.is_none() {
            self.store.set_bool(AUTO_CHECK_KEY, auto_check_default)?;
        }
        Ok(())
    }

    /// Whether a silent check should run at startup. Defaults to `true`
    /// when never set.
    pub fn auto_check(&self) -> Result<bool> {
        Ok(self.store.get_bool(AUTO_CHECK_KEY)?.unwrap_or(true))
    }

    pub fn set_auto_check(&self, value: bool) -> Result<()> {
        self.store.set_bool(AUTO_CHECK_KEY, value)
    }

    /// Tags the user opted out of, in the order they were skipped.
    pub fn skipped_versions(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .get_string_list(SKIPPED_VERSIONS_KEY)?
            .unwrap_or_default())
    }

    /// Add `tag` to the skip list. Idempotent.
    pub fn skip(&self, tag: &str) -> Result<()> {
        let _guard = self.lock_skip()?;
        let mut skipped = self.skipped_versions()?;
        if !skipped.iter().any(|t| t == tag) {
            skipped.push(tag.to_owned());
            self.store.set_string_list(SKIPPED_VERSIONS_KEY, &skipped)?;
        }
        Ok(())
    }

    /// Remove every occurrence of `tag` from the skip list. A no-op when
    /// the tag was never skipped.
    pub fn unskip(&self, tag: &str) -> Result<()> {
        let _guard = self.lock_skip()?;
        let mut skipped = self.skipped_versions()?;
        let before = skipped.len();
        skipped.retain(|t| t != tag);
        if skipped.len() != before {
            self.store.set_string_list(SKIPPED_VERSIONS_KEY, &skipped)?;
        }
        Ok(())
    }

    /// Forget all skipped versions.
    pub fn clear_skipped(&self) -> Result<()> {
        let _guard = self.lock_skip()?;
        self.store.set_string_list(SKIPPED_VERSIONS_KEY, &[])
    }

    fn lock_skip(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.skip_lock
            .lock()
            .map_err(|_| UpdateError::Settings("skip-list lock poisoned".to_owned()))
    }
}
