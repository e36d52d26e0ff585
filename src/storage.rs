//! Object storage behind a narrow interface.
//!
//! The cleaning code only ever needs to put a byte blob under a key and get
//! it back, so that is all [`ObjectStore`] offers. One store instance is
//! bound to one bucket.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{CleanError, Result};

pub trait ObjectStore {
    /// Name of the bucket this store writes to.
    fn bucket(&self) -> &str;

    /// Store `bytes` under `key`, replacing any previous object.
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Fetch the object stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// `gs://bucket/key`-style location, for log messages.
    fn location(&self, key: &str) -> String {
        format!("gs://{}/{key}", self.bucket())
    }
}

/// Reject keys that could escape the bucket.
pub fn validate_key(key: &str) -> Result<()> {
    let path = Path::new(key);
    let ok = !key.is_empty()
        && !key.ends_with('/')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(CleanError::InvalidKey(key.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Filesystem-backed store
// ---------------------------------------------------------------------------

/// Sidecar written next to every object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub content_type: String,
    pub size: u64,
}

/// A bucket mirrored as `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(&self.bucket).join(key))
    }

    fn meta_path(object: &Path) -> PathBuf {
        let mut name = object.file_name().unwrap_or_default().to_os_string();
        name.push(".meta.json");
        object.with_file_name(name)
    }

    /// Metadata recorded for `key` at upload time.
    pub fn meta(&self, key: &str) -> Result<ObjectMeta> {
        let object = self.object_path(key)?;
        let text = fs::read_to_string(Self::meta_path(&object)).map_err(|e| self.not_found(key, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn not_found(&self, key: &str, err: std::io::Error) -> CleanError {
        if err.kind() == std::io::ErrorKind::NotFound {
            CleanError::ObjectNotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            }
        } else {
            CleanError::Io(err)
        }
    }
}

impl ObjectStore for FsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let object = self.object_path(key)?;
        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&object, bytes)?;
        let meta = ObjectMeta {
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
        };
        fs::write(Self::meta_path(&object), serde_json::to_vec_pretty(&meta)?)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let object = self.object_path(key)?;
        fs::read(&object).map_err(|e| self.not_found(key, e))
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Objects kept in process memory; nothing survives the run.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, (Vec<u8>, String)>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Content type recorded for `key`, if the object exists.
    pub fn content_type(&self, key: &str) -> Option<String> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.get(key).map(|(_, ct)| ct.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.keys().cloned().collect()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        validate_key(key)?;
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| CleanError::ObjectNotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })
    }
}
