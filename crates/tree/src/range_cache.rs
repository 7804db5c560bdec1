//! Persisted per-file position ranges.
//!
//! Annotation lookups need to know which file a position falls into without
//! re-running the reduction. The range table records, per file id, the
//! `[leftmost_position, position]` range of the file's wrapper node; it is
//! cached on disk keyed by a (project, version) fingerprint and rebuilt
//! whenever the fingerprint no longer matches.

use crate::error::Result;
use crate::node::FileOutline;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

pub const RANGE_TABLE_SCHEMA_VERSION: u32 = 1;

const FINGERPRINT_HEX_LEN: usize = 16;

/// Stable file id for a (version, location) pair.
pub fn file_id(version: &str, loc: &str) -> String {
    fingerprint(&[version, loc])
}

/// Cache key binding a range table to one (project, version) snapshot.
pub fn cache_key(project: &str, version: &str) -> String {
    fingerprint(&[project, version])
}

fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(FINGERPRINT_HEX_LEN);
    for byte in digest.iter().take(FINGERPRINT_HEX_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Inclusive position range of one file's wrapper node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRange {
    pub leftmost_position: u64,
    pub position: u64,
}

impl FileRange {
    pub fn contains(&self, position: u64) -> bool {
        self.leftmost_position <= position && position <= self.position
    }
}

/// File id -> position range for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeTable {
    pub schema_version: u32,
    pub cache_key: String,
    pub ranges: BTreeMap<String, FileRange>,
}

impl RangeTable {
    pub fn build(cache_key: impl Into<String>, files: &[FileOutline]) -> Self {
        let mut ranges = BTreeMap::new();
        for file in files {
            match (file.root.leftmost_position, file.root.position) {
                (Some(leftmost_position), Some(position)) => {
                    ranges.insert(
                        file.fid.clone(),
                        FileRange {
                            leftmost_position,
                            position,
                        },
                    );
                }
                _ => log::warn!("file {} has no assigned positions, skipped", file.loc()),
            }
        }
        RangeTable {
            schema_version: RANGE_TABLE_SCHEMA_VERSION,
            cache_key: cache_key.into(),
            ranges,
        }
    }

    /// File id of the range containing `position`, if any.
    pub fn file_of(&self, position: u64) -> Option<&str> {
        self.ranges
            .iter()
            .find(|(_, range)| range.contains(position))
            .map(|(fid, _)| fid.as_str())
    }
}

/// Load a cached range table. A missing file, undecodable content, or a
/// schema/key mismatch is a cache miss, never an error.
pub async fn load(path: &Path, expected_key: &str) -> Result<Option<RangeTable>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            log::warn!("range cache at {} is unreadable: {e}", path.display());
            return Ok(None);
        }
    };
    let table: RangeTable = match serde_json::from_slice(&bytes) {
        Ok(table) => table,
        Err(e) => {
            log::warn!("range cache at {} is corrupt: {e}", path.display());
            return Ok(None);
        }
    };
    if table.schema_version != RANGE_TABLE_SCHEMA_VERSION {
        log::debug!(
            "range cache schema {} does not match {}",
            table.schema_version,
            RANGE_TABLE_SCHEMA_VERSION
        );
        return Ok(None);
    }
    if table.cache_key != expected_key {
        log::debug!("range cache is for another snapshot, rebuilding");
        return Ok(None);
    }
    Ok(Some(table))
}

/// Persist the range table. Writes to a sibling temp file and renames so a
/// crash mid-write never leaves a torn cache behind.
pub async fn save(path: &Path, table: &RangeTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(table)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
