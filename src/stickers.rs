//! In-memory sticker cache loaded from `{data_dir}/stickers/*.webp`.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};
use yamato_core::error::YamatoError;

/// Sticker bytes keyed by file stem.
#[derive(Debug, Default)]
pub struct StickerCache {
    stickers: BTreeMap<String, Vec<u8>>,
}

impl StickerCache {
    /// Load every `.webp` file in `dir`, creating the directory if missing.
    /// Unreadable files are skipped.
    pub fn load(dir: &Path) -> Result<Self, YamatoError> {
        std::fs::create_dir_all(dir)?;
        Self::read(dir)
    }

    /// Like [`StickerCache::load`], but never touches the filesystem: a
    /// missing directory is an empty cache.
    pub fn read(dir: &Path) -> Result<Self, YamatoError> {
        if !dir.exists() {
            return Ok(Self::default());
        }

        let mut stickers = BTreeMap::new();
        for entry in std::fs::read_dir(dir)?.flatten() {
            let path = entry.path();
            let is_webp = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("webp"));
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_webp || !path.is_file() {
                continue;
            }
            match std::fs::read(&path) {
                Ok(bytes) => {
                    stickers.insert(stem.to_string(), bytes);
                }
                Err(e) => warn!("skipping sticker {}: {e}", path.display()),
            }
        }

        if stickers.is_empty() {
            warn!("no stickers found in {}", dir.display());
        } else {
            info!("loaded {} stickers", stickers.len());
        }
        Ok(Self { stickers })
    }

    /// Sorted sticker names.
    pub fn names(&self) -> Vec<String> {
        self.stickers.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.stickers.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.stickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stickers.is_empty()
    }
}

#[cfg(test)]
impl StickerCache {
    pub(crate) fn from_entries(entries: &[(&str, &[u8])]) -> Self {
        Self {
            stickers: entries
                .iter()
                .map(|(name, bytes)| (name.to_string(), bytes.to_vec()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_webp_only() {
        let dir = std::env::temp_dir().join("__yamato_stickers_load__");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("nested.webp")).unwrap();
        std::fs::write(dir.join("angry.webp"), b"RIFF1").unwrap();
        std::fs::write(dir.join("Laugh.WEBP"), b"RIFF2").unwrap();
        std::fs::write(dir.join("notes.txt"), b"nope").unwrap();

        let cache = StickerCache::load(&dir).unwrap();
        assert_eq!(cache.names(), vec!["Laugh", "angry"]);
        assert_eq!(cache.get("angry"), Some(&b"RIFF1"[..]));
        assert!(cache.get("notes").is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_dir_is_created() {
        let dir = std::env::temp_dir().join("__yamato_stickers_missing__");
        let _ = std::fs::remove_dir_all(&dir);
        let cache = StickerCache::load(&dir).unwrap();
        assert!(cache.is_empty());
        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_read_leaves_missing_dir_alone() {
        let dir = std::env::temp_dir().join("__yamato_stickers_readonly__");
        let _ = std::fs::remove_dir_all(&dir);
        let cache = StickerCache::read(&dir).unwrap();
        assert!(cache.is_empty());
        assert!(!dir.exists());
    }
}
