//! Exact-size padding through ID3v2 metadata
//!
//! Forces an encoded MP3 to an exact byte size by writing a single
//! `TXXX:padding` frame of zero bytes into its ID3v2 tag. Only the tag is
//! rewritten; the audio frames after it are copied byte-for-byte, so the
//! stream itself is never re-encoded or truncated.
//!
//! # Size accounting
//!
//! The tag is first normalized: any previous padding frame is removed and the
//! tag is re-encoded with zero implicit padding. Growth is measured against
//! that normalized size, and the padding payload is `growth − TXXX_FRAME_OVERHEAD`.
//! The overhead is re-measured against the encoder on every run.
//!
//! ```text
//! [ID3 header 10][frames...][TXXX hdr 10][enc 1]["padding" 7][NUL 1][payload N][audio...]
//!                           \________ TXXX_FRAME_OVERHEAD = 19 _______/
//! ```

use crate::error::{Error, Result};
use id3::frame::ExtendedText;
use id3::{Encoder, Tag, TagLike, Version};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Description of the padding frame
pub const PADDING_DESCRIPTION: &str = "padding";

/// ID3v2.3/2.4 frame header: 4-byte id, 4-byte size, 2 flag bytes
const FRAME_HEADER_LEN: u64 = 10;

/// TXXX text encoding byte
const ENCODING_BYTE_LEN: u64 = 1;

/// Terminator after the TXXX description (single byte for Latin-1/UTF-8)
const DESCRIPTION_TERMINATOR_LEN: u64 = 1;

/// Bytes one `TXXX:padding` frame adds beyond its payload
pub const TXXX_FRAME_OVERHEAD: u64 =
    FRAME_HEADER_LEN + ENCODING_BYTE_LEN + PADDING_DESCRIPTION.len() as u64 + DESCRIPTION_TERMINATOR_LEN;

/// ID3v2 tag header length
const ID3_HEADER_LEN: usize = 10;

/// ID3v2 footer flag (header byte 5, bit 4)
const ID3_FOOTER_FLAG: u8 = 0x10;

/// Outcome of a padding run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingReport {
    /// File size before padding
    pub initial_size: u64,
    /// Size with the tag normalized and no padding frame
    pub normalized_size: u64,
    /// Zero bytes written into the padding frame (None if no frame was needed)
    pub payload_len: Option<u64>,
    /// File size after padding; always equals the target
    pub final_size: u64,
}

/// Pad the MP3 at `path` in place so its size equals `target_size` exactly
///
/// # Errors
/// - `PaddingOverflow` if the file (or its normalized form) is already larger
///   than the target; the file is left untouched
/// - `PaddingMismatch` if the required growth is smaller than one padding
///   frame, or if the written file does not measure exactly `target_size`
pub fn pad_to_exact_size(path: &Path, target_size: u64) -> Result<PaddingReport> {
    let initial_size = fs::metadata(path)?.len();
    debug!(file = %path.display(), initial_size, target_size, "Padding to exact size");

    // Oversize is judged on the normalized size below
    if initial_size == target_size {
        info!(final_size = initial_size, "Hit target without padding");
        return Ok(PaddingReport {
            initial_size,
            normalized_size: initial_size,
            payload_len: None,
            final_size: initial_size,
        });
    }

    let original = fs::read(path)?;
    let audio = &original[id3v2_region_len(&original).min(original.len())..];

    let mut tag = read_tag(path)?;
    tag.remove_extended_text(Some(PADDING_DESCRIPTION), None);

    let normalized_tag = encode_tag(&tag)?;
    let normalized_size = (normalized_tag.len() + audio.len()) as u64;
    if normalized_size > target_size {
        error!(initial_size, normalized_size, target_size, "File already larger than target");
        return Err(Error::PaddingOverflow {
            current: normalized_size,
            target: target_size,
        });
    }

    let growth_needed = target_size - normalized_size;
    let (tag_bytes, payload_len) = if growth_needed == 0 {
        (normalized_tag, None)
    } else {
        let overhead = measured_frame_overhead(&tag, normalized_tag.len())?;
        let payload_len = growth_needed.checked_sub(overhead).ok_or_else(|| {
            error!(growth_needed, overhead, "Growth smaller than one padding frame");
            Error::PaddingMismatch {
                actual: normalized_size,
                target: target_size,
            }
        })?;
        debug!(payload_len, overhead, "Adding padding frame");

        tag.add_frame(ExtendedText {
            description: PADDING_DESCRIPTION.to_string(),
            value: "\0".repeat(payload_len as usize),
        });
        (encode_tag(&tag)?, Some(payload_len))
    };

    let mut rewritten = Vec::with_capacity(tag_bytes.len() + audio.len());
    rewritten.extend_from_slice(&tag_bytes);
    rewritten.extend_from_slice(audio);
    fs::write(path, &rewritten)?;

    let final_size = fs::metadata(path)?.len();
    if final_size != target_size {
        error!(final_size, target_size, "Failed to hit target");
        return Err(Error::PaddingMismatch {
            actual: final_size,
            target: target_size,
        });
    }

    info!(final_size, target_size, "Hit target");
    Ok(PaddingReport {
        initial_size,
        normalized_size,
        payload_len,
        final_size,
    })
}

/// Read the file's ID3v2 tag, or start an empty one if it has none
fn read_tag(path: &Path) -> Result<Tag> {
    match Tag::read_from_path(path) {
        Ok(tag) => Ok(tag),
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => Ok(Tag::new()),
        Err(e) => Err(e.into()),
    }
}

/// Bytes an empty padding frame adds to `tag` as the encoder writes it
///
/// Expected to equal [`TXXX_FRAME_OVERHEAD`]; measured so that a different
/// framing in the tag library shows up as a warning rather than a size miss.
fn measured_frame_overhead(tag: &Tag, tag_len: usize) -> Result<u64> {
    let mut with_frame = tag.clone();
    with_frame.add_frame(ExtendedText {
        description: PADDING_DESCRIPTION.to_string(),
        value: String::new(),
    });
    let overhead = encode_tag(&with_frame)?.len().saturating_sub(tag_len) as u64;
    if overhead != TXXX_FRAME_OVERHEAD {
        warn!(overhead, expected = TXXX_FRAME_OVERHEAD, "Padding frame overhead differs from ID3v2 layout");
    }
    Ok(overhead)
}

/// Encode `tag` as ID3v2.4 with no implicit padding
fn encode_tag(tag: &Tag) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    Encoder::new()
        .version(Version::Id3v24)
        .unsynchronisation(false)
        .padding(0)
        .encode(tag, &mut buf)?;
    Ok(buf)
}

/// Length of the ID3v2 tag at the start of `data` (header, body, footer), or 0
pub fn id3v2_region_len(data: &[u8]) -> usize {
    if data.len() < ID3_HEADER_LEN || &data[0..3] != b"ID3" {
        return 0;
    }
    let flags = data[5];
    // Sizes are syncsafe: 7 significant bits per byte
    let body = data[6..10]
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | (b & 0x7f) as usize);
    let footer = if flags & ID3_FOOTER_FLAG != 0 { ID3_HEADER_LEN } else { 0 };
    ID3_HEADER_LEN + body + footer
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Deterministic stand-in for MPEG audio frames
    fn fake_audio(len: usize) -> Vec<u8> {
        (0..len).map(|i| if i % 417 == 0 { 0xFF } else { (i % 251) as u8 }).collect()
    }

    fn write_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    /// Encoder-style tag followed by audio
    fn tagged_mp3(audio_len: usize) -> Vec<u8> {
        let mut tag = Tag::new();
        tag.set_title("Variatio 14 a 2 Clav.");
        tag.add_frame(id3::Frame::text("TSSE", "Lavf60.16.100"));
        let mut bytes = encode_tag(&tag).unwrap();
        bytes.extend(fake_audio(audio_len));
        bytes
    }

    #[test]
    fn test_frame_overhead_matches_encoder() {
        let mut tag = Tag::new();
        tag.set_title("x");
        let base = encode_tag(&tag).unwrap().len() as u64;

        for payload in [0usize, 1, 100, 70_000] {
            let mut padded = tag.clone();
            padded.add_frame(ExtendedText {
                description: PADDING_DESCRIPTION.to_string(),
                value: "\0".repeat(payload),
            });
            let grown = encode_tag(&padded).unwrap().len() as u64;
            assert_eq!(grown - base, TXXX_FRAME_OVERHEAD + payload as u64, "payload {}", payload);
        }
    }

    #[test]
    fn test_pads_tagged_file_to_exact_size() {
        let bytes = tagged_mp3(50_000);
        let file = write_file(&bytes);
        let target = bytes.len() as u64 + 4_321;

        let report = pad_to_exact_size(file.path(), target).unwrap();
        assert_eq!(report.final_size, target);
        assert_eq!(fs::metadata(file.path()).unwrap().len(), target);
        assert_eq!(report.payload_len, Some(4_321 - TXXX_FRAME_OVERHEAD));
    }

    #[test]
    fn test_audio_bytes_preserved() {
        let bytes = tagged_mp3(20_000);
        let audio_start = id3v2_region_len(&bytes);
        let file = write_file(&bytes);

        pad_to_exact_size(file.path(), bytes.len() as u64 + 1_000).unwrap();

        let padded = fs::read(file.path()).unwrap();
        let padded_audio_start = id3v2_region_len(&padded);
        assert_eq!(&padded[padded_audio_start..], &bytes[audio_start..]);
    }

    #[test]
    fn test_pads_untagged_file() {
        let bytes = fake_audio(30_000);
        let file = write_file(&bytes);
        let target = bytes.len() as u64 + 512;

        let report = pad_to_exact_size(file.path(), target).unwrap();
        assert_eq!(report.final_size, target);

        let padded = fs::read(file.path()).unwrap();
        assert_eq!(&padded[id3v2_region_len(&padded)..], &bytes[..]);
    }

    #[test]
    fn test_repadding_replaces_previous_frame() {
        let bytes = tagged_mp3(10_000);
        let file = write_file(&bytes);

        pad_to_exact_size(file.path(), bytes.len() as u64 + 800).unwrap();
        pad_to_exact_size(file.path(), bytes.len() as u64 + 5_000).unwrap();

        assert_eq!(fs::metadata(file.path()).unwrap().len(), bytes.len() as u64 + 5_000);
        assert_eq!(padding_frames(file.path()), 1);
    }

    fn padding_frames(path: &Path) -> usize {
        Tag::read_from_path(path)
            .unwrap()
            .extended_texts()
            .filter(|t| t.description == PADDING_DESCRIPTION)
            .count()
    }

    #[test]
    fn test_shrinking_existing_padding() {
        let bytes = tagged_mp3(10_000);
        let file = write_file(&bytes);
        pad_to_exact_size(file.path(), bytes.len() as u64 + 5_000).unwrap();

        // Above the new target only because of its padding frame
        let report = pad_to_exact_size(file.path(), bytes.len() as u64 + 800).unwrap();
        assert_eq!(report.initial_size, bytes.len() as u64 + 5_000);
        assert_eq!(report.normalized_size, bytes.len() as u64);
        assert_eq!(report.payload_len, Some(800 - TXXX_FRAME_OVERHEAD));
        assert_eq!(fs::metadata(file.path()).unwrap().len(), bytes.len() as u64 + 800);
        assert_eq!(padding_frames(file.path()), 1);
    }

    #[test]
    fn test_repadding_to_unpadded_size_drops_frame() {
        let bytes = tagged_mp3(10_000);
        let file = write_file(&bytes);
        pad_to_exact_size(file.path(), bytes.len() as u64 + 2_000).unwrap();

        let report = pad_to_exact_size(file.path(), bytes.len() as u64).unwrap();
        assert_eq!(report.payload_len, None);
        assert_eq!(fs::metadata(file.path()).unwrap().len(), bytes.len() as u64);
        assert_eq!(padding_frames(file.path()), 0);
    }

    #[test]
    fn test_padded_file_below_unpadded_size_overflows() {
        let bytes = tagged_mp3(10_000);
        let file = write_file(&bytes);
        pad_to_exact_size(file.path(), bytes.len() as u64 + 2_000).unwrap();
        let padded = fs::read(file.path()).unwrap();

        let err = pad_to_exact_size(file.path(), bytes.len() as u64 - 1).unwrap_err();
        assert!(matches!(
            err,
            Error::PaddingOverflow { current, .. } if current == bytes.len() as u64
        ));
        assert_eq!(fs::read(file.path()).unwrap(), padded);
    }

    #[test]
    fn test_target_equal_to_current_does_not_underflow() {
        let bytes = tagged_mp3(8_000);
        let file = write_file(&bytes);

        let report = pad_to_exact_size(file.path(), bytes.len() as u64).unwrap();
        assert_eq!(report.final_size, bytes.len() as u64);
        assert_eq!(report.payload_len, None);
        assert_eq!(fs::read(file.path()).unwrap(), bytes);
    }

    #[test]
    fn test_exactly_one_frame_of_growth_gives_empty_payload() {
        let bytes = tagged_mp3(8_000);
        let file = write_file(&bytes);
        let target = bytes.len() as u64 + TXXX_FRAME_OVERHEAD;

        let report = pad_to_exact_size(file.path(), target).unwrap();
        assert_eq!(report.payload_len, Some(0));
        assert_eq!(report.final_size, target);
    }

    #[test]
    fn test_growth_below_frame_overhead_fails() {
        let bytes = tagged_mp3(8_000);
        let file = write_file(&bytes);

        let err = pad_to_exact_size(file.path(), bytes.len() as u64 + 5).unwrap_err();
        assert!(matches!(err, Error::PaddingMismatch { .. }));
        assert_eq!(fs::read(file.path()).unwrap(), bytes);
    }

    #[test]
    fn test_oversized_file_fails_without_modification() {
        let bytes = tagged_mp3(8_000);
        let file = write_file(&bytes);

        let err = pad_to_exact_size(file.path(), bytes.len() as u64 - 1).unwrap_err();
        assert!(matches!(
            err,
            Error::PaddingOverflow { current, target } if current == bytes.len() as u64 && target == current - 1
        ));
        assert_eq!(fs::read(file.path()).unwrap(), bytes);
    }

    #[test]
    fn test_id3v2_region_len() {
        assert_eq!(id3v2_region_len(b"\xFF\xFB\x90\x00"), 0);
        assert_eq!(id3v2_region_len(b"ID3"), 0);
        // Body size 0x0201 syncsafe = (2 << 7) | 1 = 257
        let header = b"ID3\x04\x00\x00\x00\x00\x02\x01";
        assert_eq!(id3v2_region_len(header), 10 + 257);
        let with_footer = b"ID3\x04\x00\x10\x00\x00\x00\x05";
        assert_eq!(id3v2_region_len(with_footer), 10 + 5 + 10);
    }
}
