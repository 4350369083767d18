use crate::infrastructure::error::PlannerError;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub type ValueUpdate<'a> = &'a dyn Fn(Option<Value>) -> Result<Value, PlannerError>;

/// Small JSON document store keyed by string.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, PlannerError>;
    fn put(&self, key: &str, value: Value) -> Result<(), PlannerError>;
    /// Read-modify-write of one key without interleaving other writers.
    fn update(&self, key: &str, update: ValueUpdate<'_>) -> Result<Value, PlannerError>;
}

/// Whole-document JSON file; each write goes to a temp file that is renamed over the target.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, PlannerError> {
        self.write_guard
            .lock()
            .map_err(|error| PlannerError::InvalidConfig(format!("kv store lock poisoned: {error}")))
    }

    fn read_document(&self) -> Result<Map<String, Value>, PlannerError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&raw)? {
            Value::Object(document) => Ok(document),
            _ => Err(PlannerError::InvalidConfig(format!(
                "expected a JSON object in {}",
                self.path.display()
            ))),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), PlannerError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        let formatted = serde_json::to_string_pretty(document)?;
        fs::write(&temp_path, format!("{formatted}\n"))?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, PlannerError> {
        let _guard = self.guard()?;
        Ok(self.read_document()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), PlannerError> {
        let _guard = self.guard()?;
        let mut document = self.read_document()?;
        document.insert(key.to_string(), value);
        self.write_document(&document)
    }

    fn update(&self, key: &str, update: ValueUpdate<'_>) -> Result<Value, PlannerError> {
        let _guard = self.guard()?;
        let mut document = self.read_document()?;
        let next = update(document.get(key).cloned())?;
        document.insert(key.to_string(), next.clone());
        self.write_document(&document)?;
        Ok(next)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    values: Mutex<Map<String, Value>>,
}

impl InMemoryKeyValueStore {
    fn lock(&self) -> Result<MutexGuard<'_, Map<String, Value>>, PlannerError> {
        self.values
            .lock()
            .map_err(|error| PlannerError::InvalidConfig(format!("kv store lock poisoned: {error}")))
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, PlannerError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), PlannerError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn update(&self, key: &str, update: ValueUpdate<'_>) -> Result<Value, PlannerError> {
        let mut values = self.lock()?;
        let next = update(values.get(key).cloned())?;
        values.insert(key.to_string(), next.clone());
        Ok(next)
    }
}
