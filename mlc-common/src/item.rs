//! Library item and fingerprint data model
//!
//! A `LibraryItem` is one entry of the external media library. Its tag list is
//! the library's own state; the optional `fingerprint` and `file_path` fields
//! are the typed view the engine works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Reserved tag namespace carrying an item's content fingerprint
pub const FINGERPRINT_TAG_PREFIX: &str = "fingerprint:";

/// Hex length of a SHA-256 digest
const FINGERPRINT_HEX_LEN: usize = 64;

/// Content fingerprint (lowercase hex SHA-256 of file bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse a hex digest, accepting upper or lower case
    ///
    /// Returns `None` unless the value is exactly 64 hex characters.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.len() == FINGERPRINT_HEX_LEN && value.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(value.to_ascii_lowercase()))
        } else {
            None
        }
    }

    /// Hex-encode a raw 32-byte digest
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// Extract the fingerprint from a `fingerprint:<hex>` library tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        tag.strip_prefix(FINGERPRINT_TAG_PREFIX).and_then(Self::parse)
    }

    /// Render as a library tag
    pub fn to_tag(&self) -> String {
        format!("{}{}", FINGERPRINT_TAG_PREFIX, self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a 64-character hex digest: {value}"))
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

/// Descriptive metadata carried by an item
///
/// Read from namespaced library tags (`artist:`, `album:`, `bpm:`, `key:`,
/// `duration:`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub duration_secs: Option<f64>,
}

impl ItemMetadata {
    /// Parse namespaced tags; the first occurrence of each namespace wins
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Self {
        let mut meta = Self::default();
        for tag in tags {
            let Some((namespace, value)) = tag.as_ref().split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match namespace.trim().to_ascii_lowercase().as_str() {
                "artist" | "performer" if meta.artist.is_none() => {
                    meta.artist = Some(value.to_string())
                }
                "album" if meta.album.is_none() => meta.album = Some(value.to_string()),
                "bpm" | "tempo" if meta.bpm.is_none() => meta.bpm = value.parse().ok(),
                "key" if meta.key.is_none() => meta.key = Some(value.to_string()),
                "duration" if meta.duration_secs.is_none() => {
                    meta.duration_secs = value.parse().ok()
                }
                _ => {}
            }
        }
        meta
    }

    /// Tempo, key, duration, performer and album all present
    pub fn is_rich(&self) -> bool {
        self.bpm.is_some()
            && self.key.is_some()
            && self.duration_secs.is_some()
            && self.artist.is_some()
            && self.album.is_some()
    }
}

/// A single entry in the media library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    /// Opaque id assigned by the library
    pub id: String,
    /// Display name (without extension)
    pub name: String,
    /// File extension, lowercase, without the dot
    pub ext: String,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified_at: DateTime<Utc>,
    /// Library tags, in library order
    pub tags: Vec<String>,
    /// Absolute path of the backing file; `None` for URL-only entries
    pub file_path: Option<PathBuf>,
    /// Known content fingerprint (from the library tag or embedded metadata)
    pub fingerprint: Option<Fingerprint>,
    /// Descriptive metadata
    pub metadata: ItemMetadata,
}

impl LibraryItem {
    /// Build an item, deriving `fingerprint` and `metadata` from its tags
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        ext: impl Into<String>,
        size: u64,
        modified_at: DateTime<Utc>,
        tags: Vec<String>,
        file_path: Option<PathBuf>,
    ) -> Self {
        let fingerprint = tags.iter().find_map(|t| Fingerprint::from_tag(t));
        let metadata = ItemMetadata::from_tags(&tags);
        Self {
            id: id.into(),
            name: name.into(),
            ext: ext.into().trim_start_matches('.').to_ascii_lowercase(),
            size,
            modified_at,
            tags,
            file_path,
            fingerprint,
            metadata,
        }
    }

    /// Fingerprint carried by the library tag, ignoring the resolved field
    pub fn tag_fingerprint(&self) -> Option<Fingerprint> {
        self.tags.iter().find_map(|t| Fingerprint::from_tag(t))
    }

    /// Number of reserved fingerprint tags on this item
    pub fn fingerprint_tag_count(&self) -> usize {
        self.tags
            .iter()
            .filter(|t| t.starts_with(FINGERPRINT_TAG_PREFIX))
            .count()
    }

    /// Tags with every fingerprint tag replaced by a single tag for `fp`
    pub fn tags_with_fingerprint(&self, fp: &Fingerprint) -> Vec<String> {
        let mut tags: Vec<String> = self
            .tags
            .iter()
            .filter(|t| !t.starts_with(FINGERPRINT_TAG_PREFIX))
            .cloned()
            .collect();
        tags.push(fp.to_tag());
        tags
    }

    /// Whether the item is backed by a file at all (URL-only entries are not)
    pub fn has_plausible_file(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// `name.ext`, as shown in reports
    pub fn file_name(&self) -> String {
        if self.ext.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.ext)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn item(tags: Vec<&str>) -> LibraryItem {
        LibraryItem::new(
            "ID1",
            "Track",
            "WAV",
            10,
            Utc::now(),
            tags.into_iter().map(String::from).collect(),
            None,
        )
    }

    #[test]
    fn test_fingerprint_parse_normalizes_case() {
        let fp = Fingerprint::parse(&HEX.to_uppercase()).unwrap();
        assert_eq!(fp.as_str(), HEX);
    }

    #[test]
    fn test_fingerprint_parse_rejects_bad_values() {
        assert!(Fingerprint::parse("abc").is_none());
        assert!(Fingerprint::parse(&"z".repeat(64)).is_none());
    }

    #[test]
    fn test_fingerprint_tag_roundtrip() {
        let fp = Fingerprint::parse(HEX).unwrap();
        assert_eq!(Fingerprint::from_tag(&fp.to_tag()), Some(fp));
        assert!(Fingerprint::from_tag(HEX).is_none());
    }

    #[test]
    fn test_item_derives_fingerprint_and_metadata() {
        let fp_tag = format!("fingerprint:{HEX}");
        let it = item(vec!["house", &fp_tag, "artist:Someone", "bpm:124"]);
        assert_eq!(it.fingerprint.as_ref().map(|f| f.as_str()), Some(HEX));
        assert_eq!(it.metadata.artist.as_deref(), Some("Someone"));
        assert_eq!(it.metadata.bpm, Some(124.0));
        assert_eq!(it.ext, "wav");
        assert!(!it.metadata.is_rich());
    }

    #[test]
    fn test_tags_with_fingerprint_keeps_exactly_one() {
        let old = format!("fingerprint:{}", "0".repeat(64));
        let it = item(vec!["a", &old, "fingerprint:garbage", "b"]);
        assert_eq!(it.fingerprint_tag_count(), 2);

        let fp = Fingerprint::parse(HEX).unwrap();
        let tags = it.tags_with_fingerprint(&fp);
        assert_eq!(tags, vec!["a".to_string(), "b".to_string(), fp.to_tag()]);
    }

    #[test]
    fn test_rich_metadata_requires_all_fields() {
        let meta = ItemMetadata::from_tags(&[
            "artist:A",
            "album:B",
            "bpm:120.5",
            "key:Am",
            "duration:312",
        ]);
        assert!(meta.is_rich());
    }
}
