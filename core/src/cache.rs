//! The preserved-ID record carried between runs.
//!
//! A JSON file mapping channel IDs to the message IDs the last run
//! preserved, so a later run with a narrow fetch window can re-fetch and
//! re-judge them instead of silently forgetting them. A file that cannot
//! be read or parsed is treated as empty with a warning; corruption is
//! never fatal. Rewrites go through a temp file and rename.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use cordsweep_types::{ChannelId, MessageId};
use cordsweep_utils::atomic_write;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const SCHEMA_VERSION: u32 = 1;

/// One channel's preserved set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    /// Preserved message IDs, newest first.
    #[serde(default)]
    pub messages: Vec<MessageId>,
    /// The subset whose own reactions were preserved too. Populated only
    /// when reaction cleanup is enabled.
    #[serde(default)]
    pub reacted: Vec<MessageId>,
}

impl ChannelEntry {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.reacted.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    schema_version: u32,
    #[serde(default)]
    channels: BTreeMap<ChannelId, ChannelEntry>,
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            channels: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct PreserveCache {
    path: PathBuf,
    file: CacheFile,
}

impl PreserveCache {
    /// The per-user default location: `<config dir>/cordsweep/preserve_cache.json`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cordsweep").join("preserve_cache.json"))
    }

    /// Load the cache at `path`, falling back to empty on any read or
    /// parse problem.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<CacheFile>(&bytes) {
                Ok(file) if file.schema_version == SCHEMA_VERSION => file,
                Ok(file) => {
                    warn!(
                        path = %path.display(),
                        found = file.schema_version,
                        expected = SCHEMA_VERSION,
                        "Preserve cache has an unknown schema version; starting empty"
                    );
                    CacheFile::default()
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Preserve cache is unreadable; starting empty"
                    );
                    CacheFile::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => CacheFile::default(),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not read preserve cache; starting empty"
                );
                CacheFile::default()
            }
        };
        debug!(
            path = %path.display(),
            channels = file.channels.len(),
            "Loaded preserve cache"
        );
        Self { path, file }
    }

    #[must_use]
    pub fn entry(&self, channel: ChannelId) -> Option<&ChannelEntry> {
        self.file.channels.get(&channel)
    }

    /// Replace one channel's entry. Entries for channels a run never
    /// touched are left alone.
    pub fn set_entry(&mut self, channel: ChannelId, mut entry: ChannelEntry) {
        entry.messages.dedup();
        entry.reacted.dedup();
        self.file.channels.insert(channel, entry);
    }

    /// Rewrite the file atomically.
    pub fn save(&self) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.file)?;
        atomic_write(&self.path, &bytes)
    }

    /// Delete the cache file outright. `Ok(true)` when a file existed.
    pub fn wipe(path: &Path) -> io::Result<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(messages: &[u64], reacted: &[u64]) -> ChannelEntry {
        ChannelEntry {
            messages: messages.iter().copied().map(MessageId::new).collect(),
            reacted: reacted.iter().copied().map(MessageId::new).collect(),
        }
    }

    #[test]
    fn round_trips_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("preserve_cache.json");

        let mut cache = PreserveCache::load(&path);
        cache.set_entry(ChannelId::new(5), entry(&[30, 20, 10], &[20]));
        cache.set_entry(ChannelId::new(9), entry(&[], &[]));
        cache.save().expect("save");

        let reloaded = PreserveCache::load(&path);
        assert_eq!(
            reloaded.entry(ChannelId::new(5)),
            Some(&entry(&[30, 20, 10], &[20]))
        );
        assert_eq!(reloaded.entry(ChannelId::new(9)), Some(&entry(&[], &[])));
        assert_eq!(reloaded.entry(ChannelId::new(7)), None);
    }

    #[test]
    fn default_path_lives_under_the_config_dir() {
        // Headless environments may have no config dir at all.
        let Some(path) = PreserveCache::default_path() else {
            return;
        };
        assert!(path.ends_with("cordsweep/preserve_cache.json"));
        assert_eq!(
            Some(path),
            dirs::config_dir().map(|d| d.join("cordsweep").join("preserve_cache.json"))
        );
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = PreserveCache::load(dir.path().join("nope.json"));
        assert_eq!(cache.entry(ChannelId::new(1)), None);
    }

    #[test]
    fn corrupt_file_is_empty_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("preserve_cache.json");
        std::fs::write(&path, b"{ not json").expect("write");

        let cache = PreserveCache::load(&path);
        assert_eq!(cache.entry(ChannelId::new(1)), None);
    }

    #[test]
    fn unknown_schema_version_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("preserve_cache.json");
        std::fs::write(
            &path,
            br#"{ "schema_version": 99, "channels": { "5": { "messages": [1] } } }"#,
        )
        .expect("write");

        let cache = PreserveCache::load(&path);
        assert_eq!(cache.entry(ChannelId::new(5)), None);
    }

    #[test]
    fn untouched_channels_survive_a_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("preserve_cache.json");

        let mut cache = PreserveCache::load(&path);
        cache.set_entry(ChannelId::new(5), entry(&[30], &[]));
        cache.save().expect("save");

        let mut second = PreserveCache::load(&path);
        second.set_entry(ChannelId::new(6), entry(&[40], &[]));
        second.save().expect("save");

        let reloaded = PreserveCache::load(&path);
        assert_eq!(reloaded.entry(ChannelId::new(5)), Some(&entry(&[30], &[])));
        assert_eq!(reloaded.entry(ChannelId::new(6)), Some(&entry(&[40], &[])));
    }

    #[test]
    fn wipe_reports_whether_a_file_existed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("preserve_cache.json");
        assert!(!PreserveCache::wipe(&path).expect("wipe missing"));

        let cache = PreserveCache::load(&path);
        cache.save().expect("save");
        assert!(PreserveCache::wipe(&path).expect("wipe"));
        assert!(!path.exists());
    }
}
