//! Fingerprint storage in file metadata and library tags
//!
//! A fingerprint is cached in two places:
//! - the file's own metadata container (custom text frame / comment / atom)
//! - the library's searchable tag index, as a single `fingerprint:<hex>` tag
//!
//! Supported containers:
//! - MP3: ID3v2 `TXXX:FINGERPRINT` (id3)
//! - AIFF: ID3v2 chunk `TXXX:FINGERPRINT` (id3)
//! - FLAC: Vorbis comment `FINGERPRINT` (lofty)
//! - MPEG-4 audio: freeform atom `----:com.apple.iTunes:FINGERPRINT` (lofty)
//!
//! WAV and anything else is unsupported: `embed` returns `false` and `extract`
//! returns `None`; the library tag remains the only record.

use crate::clients::{LibraryError, MediaLibrary};
use id3::TagLike;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag, TagType};
use mlc_common::{Fingerprint, LibraryItem};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Description / field name used inside metadata containers
pub const FINGERPRINT_FIELD: &str = "FINGERPRINT";

const MP4_FREEFORM_KEY: &str = "----:com.apple.iTunes:FINGERPRINT";

/// Metadata container read/write errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ID3 error: {0}")]
    Id3(#[from] id3::Error),

    #[error("Metadata error: {0}")]
    Lofty(#[from] lofty::error::LoftyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata container family, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    Id3,
    Aiff,
    Vorbis,
    Unsupported,
}

impl Container {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "m4a" | "mp4" | "m4b" | "alac" | "aac" => Container::Mp4,
            "mp3" => Container::Id3,
            "aif" | "aiff" | "aifc" => Container::Aiff,
            "flac" => Container::Vorbis,
            _ => Container::Unsupported,
        }
    }

    fn lofty_tag(&self) -> Option<(TagType, ItemKey)> {
        match self {
            Container::Mp4 => Some((TagType::Mp4Ilst, ItemKey::Unknown(MP4_FREEFORM_KEY.to_string()))),
            Container::Vorbis => Some((
                TagType::VorbisComments,
                ItemKey::Unknown(FINGERPRINT_FIELD.to_string()),
            )),
            _ => None,
        }
    }
}

/// Whether the file's container can carry an embedded fingerprint
pub fn supports_embedding(file_path: &Path) -> bool {
    Container::from_path(file_path) != Container::Unsupported
}

/// Read the ID3 tag of an MP3 or AIFF file; id3 picks the layout from the file header
fn read_id3(path: &Path) -> Result<Option<id3::Tag>, StoreError> {
    match id3::Tag::read_from_path(path) {
        Ok(tag) => Ok(Some(tag)),
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read the fingerprint embedded in a file's metadata
///
/// Returns `Ok(None)` when the file carries no fingerprint (or its container is
/// unsupported); errors are reserved for I/O and parse failures.
pub fn extract(file_path: &Path) -> Result<Option<Fingerprint>, StoreError> {
    let container = Container::from_path(file_path);
    let fingerprint = match container {
        Container::Id3 | Container::Aiff => {
            read_id3(file_path)?.and_then(|tag| {
                tag.extended_texts()
                    .find(|t| t.description.eq_ignore_ascii_case(FINGERPRINT_FIELD))
                    .and_then(|t| Fingerprint::parse(&t.value))
            })
        }
        Container::Mp4 | Container::Vorbis => {
            let Some((tag_type, key)) = container.lofty_tag() else {
                return Ok(None);
            };
            let tagged_file = Probe::open(file_path)?.read()?;
            tagged_file
                .tag(tag_type)
                .and_then(|tag| tag.get_string(&key))
                .and_then(Fingerprint::parse)
        }
        Container::Unsupported => None,
    };

    tracing::debug!(
        path = %file_path.display(),
        found = fingerprint.is_some(),
        "Extracted embedded fingerprint"
    );
    Ok(fingerprint)
}

/// Write a fingerprint into a file's own metadata container
///
/// Returns `Ok(false)` for unsupported containers (e.g. WAV).
pub fn embed(file_path: &Path, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
    let container = Container::from_path(file_path);
    match container {
        Container::Id3 | Container::Aiff => {
            let mut tag = read_id3(file_path)?.unwrap_or_default();
            tag.remove_extended_text(Some(FINGERPRINT_FIELD), None);
            tag.add_frame(id3::frame::ExtendedText {
                description: FINGERPRINT_FIELD.to_string(),
                value: fingerprint.to_string(),
            });
            tag.write_to_path(file_path, id3::Version::Id3v24)?;
        }
        Container::Mp4 | Container::Vorbis => {
            let Some((tag_type, key)) = container.lofty_tag() else {
                return Ok(false);
            };
            let mut tagged_file = Probe::open(file_path)?.read()?;
            if tagged_file.tag(tag_type).is_none() {
                tagged_file.insert_tag(Tag::new(tag_type));
            }
            if let Some(tag) = tagged_file.tag_mut(tag_type) {
                tag.insert_text(key, fingerprint.to_string());
            }
            tagged_file.save_to_path(file_path, WriteOptions::default())?;
        }
        Container::Unsupported => {
            tracing::debug!(path = %file_path.display(), "Container cannot carry a fingerprint");
            return Ok(false);
        }
    }

    tracing::debug!(path = %file_path.display(), fingerprint = %fingerprint, "Embedded fingerprint");
    Ok(true)
}

/// Library-tag side of the fingerprint store
pub struct FingerprintStore {
    library: Arc<dyn MediaLibrary>,
}

impl FingerprintStore {
    pub fn new(library: Arc<dyn MediaLibrary>) -> Self {
        Self { library }
    }

    /// Ensure the item carries exactly one `fingerprint:<hex>` tag
    ///
    /// **Algorithm:**
    /// 1. Tag already equal and unique: nothing to do, return `true`
    /// 2. Existing tag differs and `force` is false: no-op, return `false`
    /// 3. Otherwise replace every fingerprint tag with the new one
    ///
    /// Tags that do not parse as a fingerprint count as absent.
    pub async fn sync_to_library_tag(
        &self,
        item: &LibraryItem,
        fingerprint: &Fingerprint,
        force: bool,
    ) -> Result<bool, LibraryError> {
        let existing = item.tag_fingerprint();
        let tag_count = item.fingerprint_tag_count();

        if existing.as_ref() == Some(fingerprint) && tag_count == 1 {
            return Ok(true);
        }

        if existing.as_ref().is_some_and(|e| e != fingerprint) && !force {
            tracing::warn!(
                item_id = %item.id,
                existing = ?existing.as_ref().map(|f| f.as_str()),
                computed = %fingerprint,
                "Existing fingerprint tag differs; not overwriting without force"
            );
            return Ok(false);
        }

        let tags = item.tags_with_fingerprint(fingerprint);
        let updated = self.library.update_tags(&item.id, &tags).await?;
        if updated {
            tracing::debug!(item_id = %item.id, fingerprint = %fingerprint, "Synced fingerprint tag");
        }
        Ok(updated)
    }
}

/// Fill in missing fingerprints from embedded metadata
///
/// Items whose library tag already carries a fingerprint are left alone. Read
/// failures are logged and leave the item without a fingerprint. Returns the
/// number of fingerprints recovered from metadata.
pub fn resolve_from_metadata(items: &mut [LibraryItem]) -> usize {
    let mut recovered = 0;
    for item in items.iter_mut().filter(|i| i.fingerprint.is_none()) {
        let Some(path) = item.file_path.clone() else {
            continue;
        };
        if !path.exists() {
            continue;
        }
        match extract(&path) {
            Ok(Some(fp)) => {
                item.fingerprint = Some(fp);
                recovered += 1;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(item_id = %item.id, path = %path.display(), error = %e, "Metadata read failed");
            }
        }
    }
    if recovered > 0 {
        tracing::info!(recovered, "Recovered fingerprints from embedded metadata");
    }
    recovered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HEX: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    #[test]
    fn test_container_by_extension() {
        assert_eq!(Container::from_path(Path::new("a.MP3")), Container::Id3);
        assert_eq!(Container::from_path(Path::new("a.flac")), Container::Vorbis);
        assert_eq!(Container::from_path(Path::new("a.m4a")), Container::Mp4);
        assert_eq!(Container::from_path(Path::new("a.aiff")), Container::Aiff);
        assert_eq!(Container::from_path(Path::new("a.wav")), Container::Unsupported);
        assert_eq!(Container::from_path(Path::new("noext")), Container::Unsupported);
    }

    #[test]
    fn test_mp3_embed_then_extract() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track.mp3");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0xFF, 0xFB, 0x90, 0x00]).unwrap();
        file.write_all(&[0u8; 256]).unwrap();
        drop(file);

        assert_eq!(extract(&path).unwrap(), None);

        let fp = Fingerprint::parse(HEX).unwrap();
        assert!(embed(&path, &fp).unwrap());
        assert_eq!(extract(&path).unwrap(), Some(fp.clone()));

        // Re-embedding replaces rather than duplicates
        let other = Fingerprint::parse(&"a".repeat(64)).unwrap();
        assert!(embed(&path, &other).unwrap());
        let tag = id3::Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.extended_texts().count(), 1);
        assert_eq!(extract(&path).unwrap(), Some(other));
    }

    /// Minimal FLAC: STREAMINFO (44.1 kHz, stereo, 16-bit) and a PADDING block, no frames
    fn write_flac(path: &Path) {
        let mut bytes = b"fLaC".to_vec();
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 34]);
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 6]);
        let packed: u64 = (44_100u64 << 44) | (1u64 << 41) | (15u64 << 36);
        bytes.extend_from_slice(&packed.to_be_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        bytes.extend_from_slice(&[0x81, 0x00, 0x00, 16]);
        bytes.extend_from_slice(&[0u8; 16]);
        std::fs::write(path, bytes).unwrap();
    }

    fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out
    }

    /// Minimal MPEG-4 audio: ftyp plus moov with one sound track (mdhd + hdlr)
    fn write_m4a(path: &Path) {
        let mut mdhd = vec![0u8; 12];
        mdhd.extend_from_slice(&44_100u32.to_be_bytes());
        mdhd.extend_from_slice(&[0u8; 8]);

        let mut hdlr = vec![0u8; 8];
        hdlr.extend_from_slice(b"soun");
        hdlr.extend_from_slice(&[0u8; 13]);

        let mdia = atom(b"mdia", &[atom(b"mdhd", &mdhd), atom(b"hdlr", &hdlr)].concat());
        let moov = atom(b"moov", &atom(b"trak", &mdia));
        let ftyp = atom(b"ftyp", b"M4A \x00\x00\x00\x00M4A isom");
        std::fs::write(path, [ftyp, moov].concat()).unwrap();
    }

    /// Minimal AIFF: COMM (mono, 16-bit, 44.1 kHz, no frames) and an empty SSND chunk
    fn write_aiff(path: &Path) {
        let mut comm = Vec::new();
        comm.extend_from_slice(&1u16.to_be_bytes());
        comm.extend_from_slice(&0u32.to_be_bytes());
        comm.extend_from_slice(&16u16.to_be_bytes());
        comm.extend_from_slice(&[0x40, 0x0E, 0xAC, 0x44, 0, 0, 0, 0, 0, 0]);

        let mut body = b"AIFF".to_vec();
        body.extend_from_slice(&atom(b"COMM", &comm));
        body.extend_from_slice(&atom(b"SSND", &[0u8; 8]));
        std::fs::write(path, atom(b"FORM", &body)).unwrap();
    }

    fn assert_embed_round_trip(path: &Path) {
        assert_eq!(extract(path).unwrap(), None);

        let fp = Fingerprint::parse(HEX).unwrap();
        assert!(supports_embedding(path));
        assert!(embed(path, &fp).unwrap());
        assert_eq!(extract(path).unwrap(), Some(fp));

        let other = Fingerprint::parse(&"b".repeat(64)).unwrap();
        assert!(embed(path, &other).unwrap());
        assert_eq!(extract(path).unwrap(), Some(other));
    }

    #[test]
    fn test_flac_embed_then_extract() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track.flac");
        write_flac(&path);
        assert_embed_round_trip(&path);

        let tagged = Probe::open(&path).unwrap().read().unwrap();
        let comments = tagged.tag(TagType::VorbisComments).unwrap();
        assert_eq!(
            comments.get_string(&ItemKey::Unknown(FINGERPRINT_FIELD.to_string())),
            Some("b".repeat(64).as_str())
        );
    }

    #[test]
    fn test_m4a_embed_then_extract() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track.m4a");
        write_m4a(&path);
        assert_embed_round_trip(&path);
    }

    #[test]
    fn test_aiff_embed_then_extract() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track.aiff");
        write_aiff(&path);
        assert_embed_round_trip(&path);

        let tag = id3::Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.extended_texts().count(), 1);
        assert!(std::fs::read(&path).unwrap().starts_with(b"FORM"));
    }

    #[test]
    fn test_unsupported_container() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track.wav");
        std::fs::write(&path, b"RIFF\x00\x00\x00\x00WAVE").unwrap();

        let fp = Fingerprint::parse(HEX).unwrap();
        assert!(!supports_embedding(&path));
        assert!(!embed(&path, &fp).unwrap());
        assert_eq!(extract(&path).unwrap(), None);
    }
}
