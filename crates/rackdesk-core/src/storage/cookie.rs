//! Cookie-jar storage
//!
//! Values live as `name=value` cookies in a jar file, one cookie per line, with
//! both halves percent-encoded. A cookie is limited to [`MAX_COOKIE_BYTES`]; a
//! write that would exceed it is dropped, which is exactly what a browser does
//! with an oversized cookie.

use super::{probe_round_trip, StorageBackend};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Upper bound for `name=value` of a single cookie
pub const MAX_COOKIE_BYTES: usize = 4096;

const JAR_FILE_NAME: &str = "cookies.txt";

#[derive(Debug)]
pub struct CookieStorage {
    jar_path: PathBuf,
    supported: OnceCell<bool>,
    write_lock: Mutex<()>,
}

impl CookieStorage {
    pub fn new(jar_path: PathBuf) -> Self {
        Self {
            jar_path,
            supported: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Jar stored as `cookies.txt` inside a directory
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(JAR_FILE_NAME))
    }

    pub fn jar_path(&self) -> &Path {
        &self.jar_path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let content = match fs::read_to_string(&self.jar_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to read cookie jar {}: {}", self.jar_path.display(), e);
                return BTreeMap::new();
            }
        };

        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .filter_map(|(name, value)| {
                let name = urlencoding::decode(name).ok()?.into_owned();
                Some((name, value.to_string()))
            })
            .collect()
    }

    fn persist(&self, cookies: &BTreeMap<String, String>) -> std::io::Result<()> {
        if let Some(parent) = self.jar_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut content = String::from("# rackdesk cookie jar\n");
        for (name, value) in cookies {
            content.push_str(&urlencoding::encode(name));
            content.push('=');
            content.push_str(value);
            content.push('\n');
        }
        fs::write(&self.jar_path, content)
    }

    fn modify<F>(&self, mutate: F)
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut cookies = self.load();
        mutate(&mut cookies);
        if let Err(e) = self.persist(&cookies) {
            log::warn!("Failed to write cookie jar {}: {}", self.jar_path.display(), e);
        }
    }
}

impl StorageBackend for CookieStorage {
    fn is_supported(&self) -> bool {
        *self.supported.get_or_init(|| probe_round_trip(self))
    }

    fn set(&self, key: &str, value: Value) -> Value {
        let encoded = match serde_json::to_string(&value) {
            Ok(json) => urlencoding::encode(&json).into_owned(),
            Err(e) => {
                log::warn!("Failed to encode cookie '{}': {}", key, e);
                return value;
            }
        };

        let cookie_len = urlencoding::encode(key).len() + 1 + encoded.len();
        if cookie_len > MAX_COOKIE_BYTES {
            log::warn!(
                "Cookie '{}' is {} bytes, over the {} byte limit; value not stored",
                key,
                cookie_len,
                MAX_COOKIE_BYTES
            );
            return value;
        }

        self.modify(|cookies| {
            cookies.insert(key.to_string(), encoded);
        });
        value
    }

    fn get(&self, key: &str) -> Option<Value> {
        let raw = self.load().remove(key)?;
        let json = urlencoding::decode(&raw).ok()?;
        serde_json::from_str(&json).ok()
    }

    fn remove(&self, key: &str) {
        self.modify(|cookies| {
            cookies.remove(key);
        });
    }

    fn keys(&self) -> Vec<String> {
        self.load().into_keys().collect()
    }

    fn clear_all(&self) {
        self.modify(|cookies| cookies.clear());
    }

    fn name(&self) -> &'static str {
        "cookie"
    }
}
