// src/core/cache.rs

use crate::models::{ParsedArguments, Signature, Value};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use walkdir::WalkDir;

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters
const MAX_STEM_BYTES: usize = 180;
const EXTENSION: &str = "bin.gz";
/// Characters [`sanitize`] maps onto others.
const LOSSY_CHARS: [char; 4] = ['?', '&', '/', '\\'];

/// Failures of the on-disk result cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No cache entry at '{}'.", .0.display())]
    Miss(PathBuf),
    #[error("Could not write cache entry '{}': {reason}", path.display())]
    Write { path: PathBuf, reason: String },
    #[error("Cache entry '{}' is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("Cache I/O failed at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// --- Identity ---

/// The deterministic key of a cached response: the command path and the
/// non-empty values of its cacheable arguments, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheIdentity {
    command: String,
    pairs: Vec<(String, String)>,
}

impl CacheIdentity {
    /// Builds the identity of `command_path` called with `args`. Arguments the
    /// signature marks non-cacheable and empty values are left out.
    pub fn new(command_path: &str, args: &ParsedArguments, signature: &Signature) -> Self {
        let pairs = args
            .iter()
            .filter(|(name, value)| signature.is_cacheable(name) && !value.is_empty_value())
            .map(|(name, value)| (name.clone(), value.identity_string()))
            .collect();
        Self {
            command: command_path.to_lowercase(),
            pairs,
        }
    }

    /// The lowercased command path.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// The sanitized, size-bounded file stem.
    pub fn stem(&self) -> String {
        if self.pairs.is_empty() {
            return "default".to_string();
        }
        let joined = self
            .pairs
            .iter()
            .map(|(name, value)| format!("{}-{}", name, value))
            .collect::<Vec<_>>()
            .join("_");
        let mut stem = sanitize(&joined);
        if joined.contains(LOSSY_CHARS) {
            // Sanitizing merged characters; the digest keeps such stems apart.
            stem = format!("{}~{}", stem, short_digest(&joined));
        }
        bound_length(stem)
    }

    /// Path relative to the cache root.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(sanitize(&self.command)).join(format!("{}.{}", self.stem(), EXTENSION))
    }
}

/// Replaces characters that are unsafe in file names.
pub fn sanitize(text: &str) -> String {
    text.replace("://", ".")
        .replace('?', ".")
        .replace('/', "-")
        .replace(' ', "%20")
        .replace('&', ".")
        .replace('\\', "")
}

fn short_digest(text: &str) -> String {
    let digest = blake3::hash(text.as_bytes());
    hex::encode(digest.as_bytes().get(..HASH_TRUNCATE_LENGTH).unwrap_or_default())
}

fn bound_length(stem: String) -> String {
    if stem.len() <= MAX_STEM_BYTES {
        return stem;
    }
    let suffix = short_digest(&stem);
    let mut cut = MAX_STEM_BYTES - suffix.len() - 1;
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}~{}", stem.get(..cut).unwrap_or_default(), suffix)
}

// --- Store ---

/// One file found by [`CacheStore::entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub command: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Gzip-compressed bincode files under one root directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the entry for `identity` lives, whether or not it exists.
    pub fn path_for(&self, identity: &CacheIdentity) -> PathBuf {
        self.root.join(identity.relative_path())
    }

    /// Existence check with no side effects.
    pub fn exists(&self, identity: &CacheIdentity) -> bool {
        self.path_for(identity).is_file()
    }

    /// Reads a stored value.
    ///
    /// # Errors
    /// [`CacheError::Miss`] when there is no entry; `Corrupt` when it cannot be decoded.
    pub fn read(&self, identity: &CacheIdentity) -> Result<Value, CacheError> {
        let path = self.path_for(identity);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CacheError::Miss(path)),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let mut bytes = Vec::new();
        if let Err(e) = GzDecoder::new(file).read_to_end(&mut bytes) {
            return Err(CacheError::Corrupt {
                path,
                reason: e.to_string(),
            });
        }
        log::trace!("Read {} decompressed bytes from '{}'.", bytes.len(), path.display());

        let decoded: Result<(Value, usize), _> =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard());
        match decoded {
            Ok((value, _)) => Ok(value),
            Err(e) => Err(CacheError::Corrupt {
                path,
                reason: e.to_string(),
            }),
        }
    }

    /// Stores `value`, replacing any previous entry atomically.
    ///
    /// The payload is encoded before any file is created, and written to a
    /// temporary file in the target directory that is only renamed into place
    /// once complete. On failure the temporary file is removed.
    ///
    /// # Errors
    /// [`CacheError::Write`] when the value cannot be serialized or stored.
    pub fn write(&self, identity: &CacheIdentity, value: &Value) -> Result<PathBuf, CacheError> {
        let path = self.path_for(identity);
        let failed = |reason: String| CacheError::Write {
            path: path.clone(),
            reason,
        };

        let bytes = bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| failed(e.to_string()))?;

        let dir = path
            .parent()
            .ok_or_else(|| failed("entry has no parent directory".to_string()))?;
        fs::create_dir_all(dir).map_err(|e| failed(e.to_string()))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| failed(e.to_string()))?;
        let mut encoder = GzEncoder::new(temp.as_file_mut(), Compression::default());
        encoder.write_all(&bytes).map_err(|e| failed(e.to_string()))?;
        encoder.finish().map_err(|e| failed(e.to_string()))?;
        temp.persist(&path).map_err(|e| failed(e.error.to_string()))?;

        debug!("Cached {} bytes at '{}'.", bytes.len(), path.display());
        Ok(path)
    }

    /// Every cache file, sorted by path.
    pub fn entries(&self) -> Vec<CacheEntry> {
        if !self.root.is_dir() {
            return Vec::new();
        }
        WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.file_name().to_string_lossy().ends_with(EXTENSION)
            })
            .map(|entry| {
                let command = entry
                    .path()
                    .parent()
                    .and_then(Path::file_name)
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                CacheEntry {
                    command,
                    path: entry.into_path(),
                    size,
                }
            })
            .collect()
    }

    /// Deletes the entries of one command, or of all commands. Returns how many
    /// files were removed.
    ///
    /// # Errors
    /// [`CacheError::Io`] if a file cannot be removed.
    pub fn clear(&self, command: Option<&str>) -> Result<usize, CacheError> {
        let wanted = command.map(|c| sanitize(&c.to_lowercase()));
        let mut removed = 0;
        for entry in self.entries() {
            if wanted.as_ref().is_some_and(|w| *w != entry.command) {
                continue;
            }
            fs::remove_file(&entry.path).map_err(|source| CacheError::Io {
                path: entry.path.clone(),
                source,
            })?;
            removed += 1;
        }
        debug!("Removed {} cache entries.", removed);
        Ok(removed)
    }
}
