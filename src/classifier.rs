//! Request classification
//!
//! Pure inspection of an inbound message: no I/O, no side effects. A request
//! is a playlist link when its URL matches the video-hosting domain and
//! carries a playlist/collection marker; a single video link when it matches
//! the domain without one; attached media when the message carries a binary
//! attachment; otherwise it is unclassified and no job is ever created.

use crate::types::RequestKind;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Result of classifying an inbound request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// The request maps to an acquisition kind
    Kind(RequestKind),
    /// The request is not actionable (no job is created)
    Unclassified,
}

#[allow(clippy::expect_used)]
static VIDEO_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.|m\.)?(youtube\.com|youtu\.be)/\S+")
        .expect("video link pattern is valid")
});

/// Classify an inbound request from its text and media presence
pub fn classify(text: Option<&str>, has_media: bool) -> Classification {
    let text = text.map(str::trim).unwrap_or_default();

    if !text.is_empty() && VIDEO_LINK.is_match(text) {
        if has_playlist_marker(text) {
            return Classification::Kind(RequestKind::PlaylistLink);
        }
        return Classification::Kind(RequestKind::SingleVideoLink);
    }

    if has_media {
        return Classification::Kind(RequestKind::AttachedMedia);
    }

    Classification::Unclassified
}

/// True when the URL carries a playlist/collection marker: a `list` query
/// parameter, a `/playlist` path, or a channel "videos" tab suffix.
fn has_playlist_marker(raw: &str) -> bool {
    let normalized = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let Ok(url) = Url::parse(&normalized) else {
        return false;
    };

    if url.query_pairs().any(|(k, v)| k == "list" && !v.is_empty()) {
        return true;
    }

    let path = url.path().trim_end_matches('/');
    path.starts_with("/playlist") || path.ends_with("/videos")
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_watch_url_is_single_video() {
        let c = classify(Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), false);
        assert_eq!(c, Classification::Kind(RequestKind::SingleVideoLink));
    }

    #[test]
    fn short_url_is_single_video() {
        let c = classify(Some("https://youtu.be/dQw4w9WgXcQ"), false);
        assert_eq!(c, Classification::Kind(RequestKind::SingleVideoLink));
    }

    #[test]
    fn schemeless_url_matches_domain() {
        let c = classify(Some("youtube.com/watch?v=abc123def45"), false);
        assert_eq!(c, Classification::Kind(RequestKind::SingleVideoLink));
    }

    #[test]
    fn list_parameter_is_playlist() {
        let c = classify(
            Some("https://www.youtube.com/watch?v=abc&list=PLxyz123"),
            false,
        );
        assert_eq!(c, Classification::Kind(RequestKind::PlaylistLink));
    }

    #[test]
    fn playlist_path_is_playlist() {
        let c = classify(
            Some("https://www.youtube.com/playlist?list=PLxyz123"),
            false,
        );
        assert_eq!(c, Classification::Kind(RequestKind::PlaylistLink));
    }

    #[test]
    fn channel_videos_tab_is_playlist() {
        let c = classify(Some("https://www.youtube.com/@somechannel/videos"), false);
        assert_eq!(c, Classification::Kind(RequestKind::PlaylistLink));

        let c = classify(
            Some("https://www.youtube.com/channel/UCabc/videos/"),
            false,
        );
        assert_eq!(c, Classification::Kind(RequestKind::PlaylistLink));
    }

    #[test]
    fn empty_list_parameter_is_not_a_playlist() {
        let c = classify(Some("https://www.youtube.com/watch?v=abc&list="), false);
        assert_eq!(c, Classification::Kind(RequestKind::SingleVideoLink));
    }

    #[test]
    fn media_without_matching_text_is_attached_media() {
        assert_eq!(
            classify(None, true),
            Classification::Kind(RequestKind::AttachedMedia)
        );
        assert_eq!(
            classify(Some("look at this"), true),
            Classification::Kind(RequestKind::AttachedMedia)
        );
    }

    #[test]
    fn link_takes_priority_over_attached_media() {
        // A message carrying both a matching URL and media is a link request
        let c = classify(Some("https://youtu.be/abc123def45"), true);
        assert_eq!(c, Classification::Kind(RequestKind::SingleVideoLink));
    }

    #[test]
    fn unrelated_url_is_unclassified() {
        assert_eq!(
            classify(Some("https://example.com/watch?v=abc"), false),
            Classification::Unclassified
        );
    }

    #[test]
    fn plain_text_is_unclassified() {
        assert_eq!(classify(Some("hello there"), false), Classification::Unclassified);
        assert_eq!(classify(None, false), Classification::Unclassified);
        assert_eq!(classify(Some("   "), false), Classification::Unclassified);
    }

    #[test]
    fn lookalike_domain_is_unclassified() {
        assert_eq!(
            classify(Some("https://notyoutube.com/watch?v=abc"), false),
            Classification::Unclassified
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let input = "https://www.youtube.com/watch?v=abc&list=PL1";
        assert_eq!(classify(Some(input), false), classify(Some(input), false));
    }
}
