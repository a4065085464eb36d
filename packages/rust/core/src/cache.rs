//! Content-addressed compile cache.
//!
//! Entries are keyed by atom ID and carry the SHA-256 of everything that
//! affects the compiled output. A hit requires both to match. Saving keeps
//! only the entries looked up or inserted during the current run, so atoms
//! that disappeared or changed are evicted on every rebuild.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use coursebuild_markdown::COMPILER_REVISION;
use coursebuild_shared::{Atom, CompiledAtom, CourseBuildError, Result};

/// Bumped when the on-disk layout of the cache file changes.
const CACHE_FORMAT: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheFile {
    format: u32,
    entries: BTreeMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    hash: String,
    compiled: CompiledAtom,
}

/// Compiled atoms persisted between runs.
#[derive(Debug)]
pub struct CompileCache {
    path: PathBuf,
    entries: BTreeMap<String, CacheEntry>,
    live: BTreeSet<String>,
    hits: usize,
    misses: usize,
}

impl CompileCache {
    /// Load the cache at `path`.
    ///
    /// A missing file yields an empty cache. An unreadable or unparsable file
    /// is discarded with a warning.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str::<CacheFile>(&text) {
                Ok(file) if file.format == CACHE_FORMAT => file.entries,
                Ok(file) => {
                    debug!(format = file.format, "cache format changed, starting empty");
                    BTreeMap::new()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable compile cache");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read compile cache");
                BTreeMap::new()
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "compile cache loaded");

        Self {
            path: path.to_path_buf(),
            entries,
            live: BTreeSet::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached output for `atom_id` if its hash still matches.
    pub fn get(&mut self, atom_id: &str, hash: &str) -> Option<CompiledAtom> {
        self.live.insert(atom_id.to_string());
        match self.entries.get(atom_id) {
            Some(entry) if entry.hash == hash => {
                self.hits += 1;
                Some(entry.compiled.clone())
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, atom_id: &str, hash: String, compiled: CompiledAtom) {
        self.live.insert(atom_id.to_string());
        self.entries
            .insert(atom_id.to_string(), CacheEntry { hash, compiled });
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop entries not touched this run and write the cache to disk.
    pub fn save(&mut self) -> Result<()> {
        let before = self.entries.len();
        let live = &self.live;
        self.entries.retain(|id, _| live.contains(id));
        let evicted = before - self.entries.len();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CourseBuildError::io(parent, e))?;
        }

        let file = CacheFile {
            format: CACHE_FORMAT,
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string(&file)
            .map_err(|e| CourseBuildError::Serialization(format!("compile cache: {e}")))?;

        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json).map_err(|e| CourseBuildError::io(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| CourseBuildError::io(&self.path, e))?;

        info!(
            path = %self.path.display(),
            entries = self.entries.len(),
            evicted,
            hits = self.hits,
            misses = self.misses,
            "compile cache saved"
        );
        Ok(())
    }
}

/// Hash of every input that affects an atom's compiled output.
pub fn content_hash(atom: &Atom) -> String {
    let mut hasher = Sha256::new();
    hasher.update(COMPILER_REVISION.to_le_bytes());
    for part in [atom.kind.as_str(), atom.title.as_str()] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(atom.time_minutes.to_le_bytes());
    match atom.correct_option {
        Some(index) => {
            hasher.update([1u8]);
            hasher.update(index.to_le_bytes());
        }
        None => hasher.update([0u8]),
    }
    hasher.update(atom.body.as_bytes());
    format!("{:x}", hasher.finalize())
}
