//! # Multi-Tier Cache
//!
//! Avoids redoing template extraction and patching when nothing changed.
//!
//! ## Tiers
//!
//! 1. **Session**: an in-process map of file hashes already computed during
//!    this run, so large template trees are hashed once. Entries are keyed
//!    by path, size and modification time.
//! 2. **Local**: a marker file (`.template-cache`) inside each working
//!    directory recording the cache key that produced its contents.
//! 3. **Global**: a [`GlobalCacheStore`] mapping cache keys to the hash of
//!    the working directory contents, consulted only once the local marker
//!    matches. It catches a working directory that looks valid but was
//!    produced by a different invocation.
//!
//! ## States
//!
//! ```text
//! Missing --prepare--> Valid --any input change--> Stale --prepare--> Valid
//! ```
//!
//! Validity checks never fail: unreadable markers, hashing errors and store
//! problems all degrade to "recompute". Marker writes are atomic and a
//! failed write is only logged.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::resolver::TemplateResolutionDescriptor;
use crate::store::{write_atomically, GlobalCacheStore};

/// Name of the local marker file inside a working directory
pub const MARKER_FILE: &str = ".template-cache";

/// Source of marker timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hex-encoded SHA-256 of `bytes`
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

/// Content hasher with a session-level memo of file hashes
#[derive(Debug, Default)]
pub struct ContentHasher {
    session: DashMap<SessionKey, String>,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of a file's bytes, memoised for the session
    pub fn hash_file(&self, path: &Path) -> Result<String> {
        let metadata = fs::metadata(path)?;
        let key = SessionKey {
            path: path.to_path_buf(),
            len: metadata.len(),
            modified: metadata.modified().ok(),
        };

        if let Some(hash) = self.session.get(&key) {
            return Ok(hash.value().clone());
        }

        let hash = hash_bytes(&fs::read(path)?);
        self.session.insert(key, hash.clone());
        Ok(hash)
    }

    /// Order-independent hash of every file under `dir`.
    ///
    /// Each file contributes `hash(relative path):hash(content)`; the sorted
    /// list of those pairs is hashed. A missing directory hashes like an
    /// empty one. Files named in `exclude` at the top level are skipped.
    pub fn hash_directory(&self, dir: &Path, exclude: &[&str]) -> Result<String> {
        if !dir.is_dir() {
            return Ok(hash_pairs(Vec::new()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(|e| Error::Cache {
                message: format!("cannot walk {}: {}", dir.display(), e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            if exclude.contains(&relative.as_str()) {
                continue;
            }
            files.push((relative, entry.into_path()));
        }

        let pairs = files
            .par_iter()
            .map(|(relative, path)| {
                self.hash_file(path)
                    .map(|content| format!("{}:{}", hash_bytes(relative.as_bytes()), content))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(hash_pairs(pairs))
    }

    /// Order-independent hash of a name to content map
    pub fn hash_entries(&self, entries: &BTreeMap<String, String>) -> String {
        let pairs = entries
            .iter()
            .map(|(name, content)| {
                format!(
                    "{}:{}",
                    hash_bytes(name.as_bytes()),
                    hash_bytes(content.as_bytes())
                )
            })
            .collect();
        hash_pairs(pairs)
    }

    /// Number of memoised file hashes
    pub fn session_len(&self) -> usize {
        self.session.len()
    }

    pub fn clear_session(&self) {
        self.session.clear();
    }
}

fn hash_pairs(mut pairs: Vec<String>) -> String {
    pairs.sort();
    hash_bytes(pairs.join("\n").as_bytes())
}

/// Everything that contributes to a cache key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheKeyInputs {
    pub generator: String,
    pub tooling_version: String,
    pub generator_version: String,
    /// Contributing source tags in precedence order
    pub sources: Vec<String>,
    pub project_properties_hash: String,
    pub plugin_customizations_hash: String,
    pub library_hash: String,
    pub user_templates_hash: String,
    pub user_customizations_hash: String,
}

impl CacheKeyInputs {
    /// Stable hash over every component
    pub fn cache_key(&self) -> String {
        let composite = format!(
            "generator={}\ntooling={}\nruntime={}\nsources={}\nproperties={}\nplugin={}\nlibrary={}\nuserTemplates={}\nuserCustomizations={}\n",
            self.generator,
            self.tooling_version,
            self.generator_version,
            self.sources.join(","),
            self.project_properties_hash,
            self.plugin_customizations_hash,
            self.library_hash,
            self.user_templates_hash,
            self.user_customizations_hash,
        );
        hash_bytes(composite.as_bytes())
    }
}

/// Contents of a local marker file, stored as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMarker {
    pub cache_key: String,
    pub timestamp: DateTime<Utc>,
}

impl CacheMarker {
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses marker text; `None` when it is not a well-formed marker
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Cache state of one working directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No previous output
    Missing,
    /// Output exists but was produced from different inputs
    Stale,
    /// Output matches the current inputs
    Valid,
}

/// Validates and records cache markers across all tiers
pub struct CacheManager {
    hasher: ContentHasher,
    global: Option<Box<dyn GlobalCacheStore>>,
    clock: Box<dyn Clock>,
}

impl CacheManager {
    /// Manager with only the session and local tiers
    pub fn new() -> Self {
        Self {
            hasher: ContentHasher::new(),
            global: None,
            clock: Box::new(SystemClock),
        }
    }

    /// Enables the global tier
    pub fn with_global_store(mut self, store: Box<dyn GlobalCacheStore>) -> Self {
        self.global = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    pub fn global_store(&self) -> Option<&dyn GlobalCacheStore> {
        self.global.as_deref()
    }

    /// Collects cache key inputs for a resolved generator.
    ///
    /// Only sources the descriptor actually uses contribute, together with
    /// their precedence order and the project properties conditions read.
    pub fn key_inputs(
        &self,
        descriptor: &TemplateResolutionDescriptor,
        generator_version: &str,
        tooling_version: &str,
        project_properties: &HashMap<String, String>,
    ) -> Result<CacheKeyInputs> {
        let user_templates_hash = match (&descriptor.user_templates_dir, descriptor.has_user_templates) {
            (Some(dir), true) => self.hasher.hash_directory(dir, &[])?,
            _ => String::new(),
        };
        let user_customizations_hash = match (
            &descriptor.user_customizations_dir,
            descriptor.has_user_customizations,
        ) {
            (Some(dir), true) => self.hasher.hash_directory(dir, &[])?,
            _ => String::new(),
        };

        let plugin_customizations_hash = if descriptor.has_plugin_customizations {
            self.hasher.hash_entries(&descriptor.plugin_customizations)
        } else {
            String::new()
        };

        let mut library = BTreeMap::new();
        if descriptor.has_library_templates {
            for (name, content) in &descriptor.library_templates {
                library.insert(format!("templates/{}", name), content.clone());
            }
        }
        if descriptor.has_library_customizations {
            for (name, content) in &descriptor.library_customizations {
                library.insert(format!("customizations/{}", name), content.clone());
            }
        }
        let library_hash = if library.is_empty() {
            String::new()
        } else {
            self.hasher.hash_entries(&library)
        };

        let project_properties_hash = if project_properties.is_empty() {
            String::new()
        } else {
            let sorted: BTreeMap<String, String> = project_properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            self.hasher.hash_entries(&sorted)
        };

        Ok(CacheKeyInputs {
            generator: descriptor.generator.clone(),
            tooling_version: tooling_version.to_string(),
            generator_version: generator_version.to_string(),
            sources: descriptor
                .sources
                .iter()
                .map(|source| source.as_str().to_string())
                .collect(),
            project_properties_hash,
            plugin_customizations_hash,
            library_hash,
            user_templates_hash,
            user_customizations_hash,
        })
    }

    /// Cache key for a resolved generator
    pub fn cache_key(
        &self,
        descriptor: &TemplateResolutionDescriptor,
        generator_version: &str,
        tooling_version: &str,
        project_properties: &HashMap<String, String>,
    ) -> Result<String> {
        Ok(self
            .key_inputs(descriptor, generator_version, tooling_version, project_properties)?
            .cache_key())
    }

    /// Reads the local marker, if present and well-formed
    pub fn read_marker(&self, working_dir: &Path) -> Option<CacheMarker> {
        let path = working_dir.join(MARKER_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => CacheMarker::parse(&text),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Cannot read cache marker {}: {}", path.display(), e);
                }
                None
            }
        }
    }

    /// Current state of `working_dir` relative to `expected_key`
    pub fn state(&self, working_dir: &Path, expected_key: &str) -> CacheState {
        let marker = match self.read_marker(working_dir) {
            Some(marker) => marker,
            None => return CacheState::Missing,
        };

        if marker.cache_key != expected_key {
            log::info!("Cache key changed for {}", working_dir.display());
            return CacheState::Stale;
        }

        let store = match &self.global {
            Some(store) => store,
            None => return CacheState::Valid,
        };

        let recorded = match store.get(expected_key) {
            Some(hash) => hash,
            None => {
                log::info!(
                    "No global cache entry for {}, treating as stale",
                    working_dir.display()
                );
                return CacheState::Stale;
            }
        };

        match self.hasher.hash_directory(working_dir, &[MARKER_FILE]) {
            Ok(actual) if actual == recorded => CacheState::Valid,
            Ok(_) => {
                log::info!(
                    "Working directory {} differs from the global cache record",
                    working_dir.display()
                );
                CacheState::Stale
            }
            Err(e) => {
                log::warn!(
                    "Cannot hash working directory {}: {}",
                    working_dir.display(),
                    e
                );
                CacheState::Stale
            }
        }
    }

    /// True when `working_dir` can be reused as-is
    pub fn is_valid(&self, working_dir: &Path, expected_key: &str) -> bool {
        self.state(working_dir, expected_key) == CacheState::Valid
    }

    /// Records `key` for `working_dir` in the local and global tiers.
    ///
    /// Returns false if any tier could not be written; the error is logged.
    pub fn update(&self, working_dir: &Path, key: &str) -> bool {
        let marker = CacheMarker {
            cache_key: key.to_string(),
            timestamp: self.clock.now(),
        };

        let local = fs::create_dir_all(working_dir)
            .map_err(Error::from)
            .and_then(|_| marker.to_text())
            .and_then(|text| write_atomically(&working_dir.join(MARKER_FILE), text.as_bytes()));
        if let Err(e) = local {
            log::warn!(
                "Cannot write cache marker in {}: {}",
                working_dir.display(),
                e
            );
            return false;
        }

        if let Some(store) = &self.global {
            let recorded = self
                .hasher
                .hash_directory(working_dir, &[MARKER_FILE])
                .and_then(|hash| store.put(key, &hash));
            if let Err(e) = recorded {
                log::warn!(
                    "Cannot update global cache for {}: {}",
                    working_dir.display(),
                    e
                );
                return false;
            }
        }

        true
    }

    /// Removes the local marker so the next check reports `Missing`
    pub fn invalidate(&self, working_dir: &Path) -> Result<()> {
        match fs::remove_file(working_dir.join(MARKER_FILE)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("session_entries", &self.hasher.session_len())
            .field("global", &self.global.is_some())
            .finish()
    }
}
