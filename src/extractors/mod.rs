use async_trait::async_trait;
use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::LazyLock;

pub mod official;
pub mod scrape;
pub mod subprocess;

use crate::transcript::TranscriptResult;
use crate::TranscriptError;

/// Outcome of a single strategy attempt
pub type ExtractionOutcome = std::result::Result<TranscriptResult, TranscriptError>;

/// URL shapes that carry a video id, in matching priority order
static VIDEO_URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Long form: youtube.com/watch?v=ID (v may follow other parameters; the first v wins)
        r"(?i:youtube\.com)/watch\?(?:[^#\s]*?&)??v=([^\s]+)",
        // Short link: youtu.be/ID
        r"(?i:youtu\.be)/([^/\s]+)",
        // Embed: youtube.com/embed/ID
        r"(?i:youtube(?:-nocookie)?\.com)/embed/([^/\s]+)",
        // Shorts and legacy player paths
        r"(?i:youtube\.com)/shorts/([^/\s]+)",
        r"(?i:youtube\.com)/v/([^/\s]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("video URL pattern is valid"))
    .collect()
});

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id pattern is valid"));

/// A validated video identifier derived from a URL.
///
/// Two references are equal when they name the same video, whatever URL shape
/// they were parsed from. The original URL is kept for strategies that hand it
/// to an external helper.
#[derive(Debug, Clone, Eq)]
pub struct VideoReference {
    id: String,
    url: String,
}

impl VideoReference {
    /// Extract the video id from a watch, short-link, embed or shorts URL
    pub fn parse(url: &str) -> Result<Self, TranscriptError> {
        let url = url.trim();

        let id = VIDEO_URL_PATTERNS
            .iter()
            .find_map(|pattern| pattern.captures(url))
            .and_then(|captures| captures.get(1))
            .map(|capture| trim_id(capture.as_str()))
            .ok_or_else(|| TranscriptError::InvalidUrl(url.to_string()))?;

        if !VIDEO_ID.is_match(id) {
            return Err(TranscriptError::InvalidUrl(url.to_string()));
        }

        Ok(Self {
            id: id.to_string(),
            url: url.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The URL this reference was parsed from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Canonical watch page for this video
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

/// Cut a captured id at the first query, fragment or line delimiter
fn trim_id(raw: &str) -> &str {
    raw.split(['&', '?', '#', '\n', '\r'])
        .next()
        .unwrap_or_default()
}

impl PartialEq for VideoReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for VideoReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl FromStr for VideoReference {
    type Err = TranscriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for VideoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// The available ways of obtaining a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// External helper process with a richer caption library
    Subprocess,
    /// In-process scraping of the public player endpoints
    Scrape,
    /// YouTube Data API v3 (requires an API key)
    OfficialApi,
}

impl StrategyKind {
    /// Order used when the caller expresses no preference
    pub fn default_order() -> Vec<StrategyKind> {
        vec![StrategyKind::Subprocess, StrategyKind::Scrape]
    }

    pub fn all() -> [StrategyKind; 3] {
        [
            StrategyKind::Subprocess,
            StrategyKind::Scrape,
            StrategyKind::OfficialApi,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Subprocess => "subprocess",
            StrategyKind::Scrape => "scrape",
            StrategyKind::OfficialApi => "official-api",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StrategyKind::Subprocess => "Helper process (python youtube_transcript_api), 30s timeout",
            StrategyKind::Scrape => "In-process scraping of the watch page and caption track",
            StrategyKind::OfficialApi => "YouTube Data API v3 captions endpoint, needs an API key",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concrete method of obtaining a transcript for a video.
///
/// Implementations may perform network or process I/O but hold no state that
/// changes between calls; segments are returned in the order the source
/// produced them and metrics come from [`crate::transcript::normalize`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Fetch and normalize the transcript for a video
    async fn extract(&self, video: &VideoReference) -> ExtractionOutcome;

    /// Which strategy this is
    fn kind(&self) -> StrategyKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn test_parse_url_shapes_agree() {
        let urls = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&t=42s",
            "https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=VSFea_rMwtaiR8Q7",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ?start=10",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "youtube.com/watch?v=dQw4w9WgXcQ#comments",
            "  https://youtu.be/dQw4w9WgXcQ\n",
        ];

        let expected = VideoReference::parse(urls[0]).unwrap();
        for url in urls {
            let parsed = VideoReference::parse(url).unwrap();
            assert_eq!(parsed.id(), ID, "url: {url:?}");
            assert_eq!(parsed, expected, "url: {url:?}");
        }
    }

    #[test]
    fn test_parse_keeps_original_url() {
        let video = VideoReference::parse("https://youtu.be/dQw4w9WgXcQ?t=3").unwrap();
        assert_eq!(video.url(), "https://youtu.be/dQw4w9WgXcQ?t=3");
        assert_eq!(video.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(video.to_string(), ID);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let urls = [
            "",
            "not a url",
            "dQw4w9WgXcQ",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/",
            "https://www.youtube.com/watch?list=PL123",
            "https://www.youtube.com/watch?v=",
            "https://www.youtube.com/watch?v=short",
            "https://youtu.be/",
            "https://www.youtube.com/embed/?autoplay=1",
        ];

        for url in urls {
            match VideoReference::parse(url) {
                Err(TranscriptError::InvalidUrl(_)) => {}
                other => panic!("expected InvalidUrl for {url:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_first_v_parameter_wins() {
        let video = VideoReference::parse("https://www.youtube.com/watch?v=AAAAAAAAAAA&v=BBBBBBBBBBB").unwrap();
        assert_eq!(video.id(), "AAAAAAAAAAA");

        let video =
            VideoReference::parse("https://www.youtube.com/watch?feature=share&v=AAAAAAAAAAA&list=x&v=BBBBBBBBBBB")
                .unwrap();
        assert_eq!(video.id(), "AAAAAAAAAAA");
    }

    #[test]
    fn test_from_str() {
        let video: VideoReference = "https://youtu.be/dQw4w9WgXcQ".parse().unwrap();
        assert_eq!(video.id(), ID);
    }

    #[test]
    fn test_trim_id() {
        assert_eq!(trim_id("abc&x=1"), "abc");
        assert_eq!(trim_id("abc?x=1"), "abc");
        assert_eq!(trim_id("abc#frag"), "abc");
        assert_eq!(trim_id("abc\nrest"), "abc");
        assert_eq!(trim_id("abc"), "abc");
    }

    #[test]
    fn test_default_order() {
        assert_eq!(
            StrategyKind::default_order(),
            vec![StrategyKind::Subprocess, StrategyKind::Scrape]
        );
        assert!(!StrategyKind::default_order().contains(&StrategyKind::OfficialApi));
    }

    #[test]
    fn test_strategy_kind_serde_names() {
        let yaml = serde_yaml::to_string(&StrategyKind::OfficialApi).unwrap();
        assert_eq!(yaml.trim(), "official-api");
        let kind: StrategyKind = serde_yaml::from_str("scrape").unwrap();
        assert_eq!(kind, StrategyKind::Scrape);
    }
}
