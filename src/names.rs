//! Faction display names
//!
//! Names are learned from the host whenever it knows them and remembered in
//! `tribe_names.json`, so messages about a faction whose members are all
//! offline still show its name.

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::error::Result;
use crate::core::types::FactionId;
use crate::host::GameHost;

pub const NAMES_FILE: &str = "tribe_names.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct NamesFile {
    #[serde(default)]
    names: BTreeMap<String, String>,
}

/// Cache of faction id → display name
pub struct NameCache {
    path: PathBuf,
    names: Mutex<AHashMap<FactionId, String>>,
    dirty: AtomicBool,
}

impl NameCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            names: Mutex::new(AHashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(NAMES_FILE))
    }

    /// Load cached names; a missing or broken file leaves the cache empty
    pub fn load(&self) {
        if !self.path.exists() {
            return;
        }
        match self.read_file() {
            Ok(loaded) => {
                let count = loaded.len();
                *self.names.lock() = loaded;
                tracing::debug!(count, "Loaded faction names");
            }
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", self.path.display(), e);
            }
        }
    }

    fn read_file(&self) -> Result<AHashMap<FactionId, String>> {
        let content = fs::read_to_string(&self.path)?;
        let file: NamesFile = serde_json::from_str(&content)?;
        Ok(file
            .names
            .into_iter()
            .filter(|(_, name)| !name.is_empty())
            .filter_map(|(id, name)| {
                let raw = id.trim().parse::<i64>().ok()?;
                FactionId::resolve(raw).map(|f| (f, name))
            })
            .collect())
    }

    /// Write the cache if anything changed since the last save
    pub fn save_if_dirty(&self) -> Result<bool> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        let file = NamesFile {
            names: self
                .names
                .lock()
                .iter()
                .map(|(id, name)| (id.0.to_string(), name.clone()))
                .collect(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Err(e) = fs::write(&self.path, serde_json::to_string_pretty(&file)?) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(true)
    }

    /// Remember a name; empty names and unchanged entries are ignored
    pub fn remember(&self, faction: FactionId, name: &str) {
        if faction.is_none() || name.is_empty() {
            return;
        }
        let mut names = self.names.lock();
        if names.get(&faction).map(String::as_str) == Some(name) {
            return;
        }
        names.insert(faction, name.to_string());
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Pull current names of every known faction from the host
    pub fn refresh(&self, host: &dyn GameHost) {
        if !host.is_ready() {
            return;
        }
        for faction in host.known_factions() {
            if let Some(name) = host.faction_name(faction) {
                self.remember(faction, &name);
            }
        }
    }

    pub fn get(&self, faction: FactionId) -> Option<String> {
        self.names.lock().get(&faction).cloned()
    }

    /// `"<name> (ID: <id>)"`, or `"ID: <id>"` when no name is known
    pub fn display(&self, faction: FactionId) -> String {
        match self.get(faction) {
            Some(name) => format!("{} (ID: {})", name, faction),
            None => format!("ID: {}", faction),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }
}
