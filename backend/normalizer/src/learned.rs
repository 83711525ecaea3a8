//! Persistent store of key spellings taught at runtime.
//!
//! On disk this is a JSON object of canonical field name to the raw keys as
//! they were taught. Keys are compared by their cleaned form. Every
//! successful `learn` rewrites the whole file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use nameplate_core::{CanonicalField, NameplateError};

use crate::text::clean_text;

pub struct LearnedMappingStore {
    path: Option<PathBuf>,
    table: Mutex<BTreeMap<CanonicalField, Vec<String>>>,
}

impl LearnedMappingStore {
    /// Open the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let table = read_table(&path);
        info!(
            path = %path.display(),
            keys = table.values().map(Vec::len).sum::<usize>(),
            "Learned mappings loaded"
        );
        Self {
            path: Some(path),
            table: Mutex::new(table),
        }
    }

    /// A store that never touches disk (for testing).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            table: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<CanonicalField, Vec<String>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Field learned for an already-cleaned key.
    pub fn lookup(&self, cleaned_key: &str) -> Option<CanonicalField> {
        if cleaned_key.is_empty() {
            return None;
        }
        self.lock()
            .iter()
            .find(|(_, keys)| keys.iter().any(|k| clean_text(k) == cleaned_key))
            .map(|(field, _)| *field)
    }

    /// Remember `raw_key` as a spelling of `field` and persist.
    ///
    /// Returns `Ok(false)` when the cleaned key was already known for that
    /// field (or cleans to nothing); the file is not rewritten in that case.
    /// A failed write is reported as [`NameplateError::Storage`].
    pub fn learn(&self, raw_key: &str, field: CanonicalField) -> Result<bool, NameplateError> {
        let cleaned = clean_text(raw_key);
        if cleaned.is_empty() {
            warn!(raw_key, "Refusing to learn a key with no usable characters");
            return Ok(false);
        }

        let mut table = self.lock();
        let keys = table.entry(field).or_default();
        if keys.iter().any(|k| clean_text(k) == cleaned) {
            debug!(raw_key, %field, "Mapping already learned");
            return Ok(false);
        }
        keys.push(raw_key.to_string());

        if let Some(path) = &self.path {
            // The entry stays in memory even if the write fails.
            write_table(path, &table)?;
        }
        info!(raw_key, %field, "Learned new mapping");
        Ok(true)
    }

    pub fn snapshot(&self) -> BTreeMap<CanonicalField, Vec<String>> {
        self.lock().clone()
    }

    pub fn total_keys(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }
}

fn read_table(path: &Path) -> BTreeMap<CanonicalField, Vec<String>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read learned mappings; starting empty");
            return BTreeMap::new();
        }
    };
    let parsed: BTreeMap<String, Vec<String>> = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed learned mappings; starting empty");
            return BTreeMap::new();
        }
    };

    let mut table: BTreeMap<CanonicalField, Vec<String>> = BTreeMap::new();
    for (name, keys) in parsed {
        match name.parse::<CanonicalField>() {
            Ok(field) => {
                let slot = table.entry(field).or_default();
                for key in keys {
                    let cleaned = clean_text(&key);
                    if !cleaned.is_empty() && !slot.iter().any(|k| clean_text(k) == cleaned) {
                        slot.push(key);
                    }
                }
            }
            Err(e) => warn!(field = %name, "Skipping learned mappings: {}", e),
        }
    }
    table
}

/// Write to a sibling temp file, then rename over the target.
fn write_table(
    path: &Path,
    table: &BTreeMap<CanonicalField, Vec<String>>,
) -> Result<(), NameplateError> {
    let storage = |e: String| NameplateError::Storage(format!("{}: {}", path.display(), e));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| storage(e.to_string()))?;
    }
    let doc: BTreeMap<&str, &Vec<String>> =
        table.iter().map(|(field, keys)| (field.as_str(), keys)).collect();
    let body = serde_json::to_string_pretty(&doc).map_err(|e| storage(e.to_string()))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).map_err(|e| storage(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| storage(e.to_string()))?;
    Ok(())
}
