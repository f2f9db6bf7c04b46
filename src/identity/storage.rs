//! Persisted client state: a tiny string key/value surface with two well-known keys.
//! `MemoryStorage` backs tests and embedded hosts; `FileStorage` backs the CLI.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{GateError, GateResult};

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const AUTH_USER_KEY: &str = "authUser";

pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> GateResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> GateResult<()>;
    fn remove(&self, key: &str) -> GateResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { entries: RwLock::new(map) }
    }

    pub fn len(&self) -> usize { self.entries.read().len() }
    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> GateResult<Option<String>> { Ok(self.entries.read().get(key).cloned()) }

    fn set(&self, key: &str, value: &str) -> GateResult<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> GateResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// One file per key under a state directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

fn valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> GateResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| GateError::storage(format!("cannot create state dir {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path { &self.root }

    fn path_for(&self, key: &str) -> GateResult<PathBuf> {
        if !valid_key(key) {
            return Err(GateError::storage(format!("invalid storage key '{}'", key)));
        }
        Ok(self.root.join(key))
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> GateResult<Option<String>> {
        let p = self.path_for(key)?;
        match std::fs::read_to_string(&p) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> GateResult<()> {
        let p = self.path_for(key)?;
        // write-then-rename so a crash never leaves a half-written profile behind
        let tmp = self.root.join(format!(".{}.tmp", key));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &p)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> GateResult<()> {
        let p = self.path_for(key)?;
        match std::fs::remove_file(&p) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
