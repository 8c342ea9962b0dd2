//! How a finished download is sent back.
//!
//! Large files always travel as documents; smaller ones use the native
//! video, photo or audio representation.

use super::{DownloadResult, FormatHint, MediaKind};
use lazy_regex::regex_replace;
use std::path::Path;

/// MIME type most messengers accept for audio uploads
const AUDIO_MIME: &str = "audio/mp4";
const OCTET_STREAM: &str = "application/octet-stream";

/// Representation used for the outgoing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Inline video
    Video,
    /// Inline photo
    Image,
    /// Inline audio
    Audio,
    /// Generic file attachment
    Document,
}

/// Everything needed to send a download back, minus the bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPlan {
    /// Representation
    pub kind: ReplyKind,
    /// File name shown to the user
    pub file_name: String,
    /// MIME type of the upload
    pub mime_type: String,
    /// Caption text
    pub caption: String,
}

/// Drop the leading `digits_` uniqueness prefix from a file name
#[must_use]
pub fn clean_title(title: &str) -> String {
    regex_replace!(r"^\d+_", title, "").into_owned()
}

fn is_mp3(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mp3"))
}

/// Decide how `result` is sent.
///
/// `requested` is the format the user asked for; an audio request is sent as
/// audio even when the file itself is not classified as such.
#[must_use]
pub fn plan_reply(result: &DownloadResult, requested: FormatHint, inline_limit: u64) -> ReplyPlan {
    let file_name = clean_title(&result.display_title);

    if result.size_bytes > inline_limit {
        let size_mb = result.size_bytes as f64 / 1024.0 / 1024.0;
        return ReplyPlan {
            kind: ReplyKind::Document,
            file_name,
            mime_type: mime_guess::from_path(&result.file_path)
                .first_or_octet_stream()
                .to_string(),
            caption: format!("📁 Large file\n\nThe file is {size_mb:.2} MB, sent as a document."),
        };
    }

    let (kind, mime_type, caption) = match result.media_kind {
        MediaKind::Video => (
            ReplyKind::Video,
            mime_guess::from_path(&result.file_path)
                .first_or_octet_stream()
                .to_string(),
            "🎥 Here is your video!",
        ),
        MediaKind::Image => (
            ReplyKind::Image,
            mime_guess::from_path(&result.file_path)
                .first_or_octet_stream()
                .to_string(),
            "🖼️ Here is your image!",
        ),
        MediaKind::Audio => (ReplyKind::Audio, AUDIO_MIME.to_string(), "🎵 Here is your audio!"),
        MediaKind::Document if requested == FormatHint::Audio || is_mp3(&result.file_path) => {
            (ReplyKind::Audio, AUDIO_MIME.to_string(), "🎵 Here is your audio!")
        }
        MediaKind::Document => (ReplyKind::Document, OCTET_STREAM.to_string(), ""),
    };

    ReplyPlan {
        kind,
        file_name,
        mime_type,
        caption: caption.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    const MIB: u64 = 1024 * 1024;
    const LIMIT: u64 = 60 * MIB;

    fn result(name: &str, kind: MediaKind, size: u64) -> DownloadResult {
        DownloadResult {
            file_path: PathBuf::from("dl").join(name),
            display_title: name.to_string(),
            media_kind: kind,
            size_bytes: size,
        }
    }

    #[test]
    fn test_oversized_video_goes_as_document() {
        let r = result("1700000000000_clip.mp4", MediaKind::Video, 70 * MIB);
        let plan = plan_reply(&r, FormatHint::Video, LIMIT);
        assert_eq!(plan.kind, ReplyKind::Document);
        assert_eq!(plan.file_name, "clip.mp4");
        assert_eq!(plan.mime_type, "video/mp4");
        assert!(plan.caption.contains("70.00 MB"));
    }

    #[test]
    fn test_limit_is_inclusive() {
        let r = result("1_clip.mp4", MediaKind::Video, LIMIT);
        assert_eq!(plan_reply(&r, FormatHint::Video, LIMIT).kind, ReplyKind::Video);
    }

    #[test]
    fn test_kind_drives_inline_representation() {
        let image = result("1_image.jpg", MediaKind::Image, 100);
        assert_eq!(plan_reply(&image, FormatHint::Video, LIMIT).kind, ReplyKind::Image);

        let audio = result("1_song.m4a", MediaKind::Audio, 100);
        let plan = plan_reply(&audio, FormatHint::Audio, LIMIT);
        assert_eq!(plan.kind, ReplyKind::Audio);
        assert_eq!(plan.mime_type, "audio/mp4");
    }

    #[test]
    fn test_ambiguous_kind_inferred_as_audio() {
        let mp3 = result("1_song.mp3", MediaKind::Document, 100);
        assert_eq!(plan_reply(&mp3, FormatHint::Video, LIMIT).kind, ReplyKind::Audio);

        let asked = result("1_song.opus", MediaKind::Document, 100);
        assert_eq!(plan_reply(&asked, FormatHint::Audio, LIMIT).kind, ReplyKind::Audio);

        let other = result("1_doc.bin", MediaKind::Document, 100);
        let plan = plan_reply(&other, FormatHint::Video, LIMIT);
        assert_eq!(plan.kind, ReplyKind::Document);
        assert_eq!(plan.mime_type, "application/octet-stream");
    }

    #[test]
    fn test_clean_title_only_strips_leading_prefix() {
        assert_eq!(clean_title("1700000000000_My_Video.mp4"), "My_Video.mp4");
        assert_eq!(clean_title("My_123_Video.mp4"), "My_123_Video.mp4");
        assert_eq!(clean_title("2024.mp4"), "2024.mp4");
    }

    proptest! {
        #[test]
        fn clean_title_removes_any_token(token in 0u64..u64::MAX, rest in "[a-zA-Z][a-zA-Z0-9 ._-]{0,40}") {
            let title = format!("{token}_{rest}");
            prop_assert_eq!(clean_title(&title), rest);
        }
    }
}
