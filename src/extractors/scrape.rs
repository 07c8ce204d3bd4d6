use async_trait::async_trait;
use regex::Regex;
use reqwest::{header, Client, Response, StatusCode};
use serde_json::Value;
use std::sync::LazyLock;

use super::{ExtractionOutcome, ExtractionStrategy, StrategyKind, VideoReference};
use crate::config::ScrapeConfig;
use crate::transcript::{normalize, TranscriptSegment};
use crate::TranscriptError;

const INNERTUBE_PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";

static INNERTUBE_API_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("api key pattern is valid")
});

static TIMEDTEXT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<text\s+start="([^"]*)"(?:\s+dur="([^"]*)")?[^>]*>(.*?)</text>"#)
        .expect("timedtext pattern is valid")
});

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// A caption track advertised by the player response
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    pub language_code: String,
    pub base_url: String,
    pub is_generated: bool,
}

/// Transcript extractor that scrapes the public player endpoints in-process
pub struct ScrapeExtractor {
    client: Client,
    languages: Vec<String>,
    fallback_to_any_language: bool,
}

impl ScrapeExtractor {
    pub fn from_config(config: &ScrapeConfig) -> Result<Self, TranscriptError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| TranscriptError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            languages: config.languages.clone(),
            fallback_to_any_language: config.fallback_to_any_language,
        })
    }

    async fn fetch_watch_page(&self, video: &VideoReference) -> Result<String, TranscriptError> {
        let response = self
            .client
            .get(video.watch_url())
            .send()
            .await
            .map_err(|e| network_error("watch page request failed", e))?;

        let response = check_status(response, video)?;
        response
            .text()
            .await
            .map_err(|e| network_error("failed to read watch page", e))
    }

    async fn fetch_player(&self, video: &VideoReference, api_key: &str) -> Result<Value, TranscriptError> {
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": "20.10.38"
                }
            },
            "videoId": video.id()
        });

        let response = self
            .client
            .post(INNERTUBE_PLAYER_URL)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| network_error("player request failed", e))?;

        let response = check_status(response, video)?;
        response
            .json::<Value>()
            .await
            .map_err(|_| TranscriptError::MalformedResponse("player response is not valid JSON".to_string()))
    }

    async fn fetch_timedtext(&self, track: &CaptionTrack, video: &VideoReference) -> Result<String, TranscriptError> {
        let response = self
            .client
            .get(&track.base_url)
            .send()
            .await
            .map_err(|e| network_error("caption track request failed", e))?;

        let response = check_status(response, video)?;
        response
            .text()
            .await
            .map_err(|e| network_error("failed to read caption track", e))
    }
}

fn network_error(context: &str, error: reqwest::Error) -> TranscriptError {
    tracing::debug!("{}: {}", context, error);
    if error.is_timeout() {
        TranscriptError::Network(format!("{} (timed out)", context))
    } else {
        TranscriptError::Network(context.to_string())
    }
}

fn check_status(response: Response, video: &VideoReference) -> Result<Response, TranscriptError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(TranscriptError::Network(format!(
            "rate limited while fetching {}",
            video.id()
        )));
    }

    Err(TranscriptError::Network(format!(
        "HTTP {} while fetching {}",
        status,
        video.id()
    )))
}

/// Pull the InnerTube API key out of the watch page
pub fn extract_api_key(html: &str, video: &VideoReference) -> Result<String, TranscriptError> {
    if html.contains("class=\"g-recaptcha\"") {
        return Err(TranscriptError::Network(format!(
            "request for {} was blocked by bot detection",
            video.id()
        )));
    }

    INNERTUBE_API_KEY
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|key| key.as_str().to_string())
        .ok_or_else(|| {
            TranscriptError::MalformedResponse(format!("watch page for {} has no player key", video.id()))
        })
}

/// Reject videos the player refuses to serve
pub fn check_playability(player: &Value, video: &VideoReference) -> Result<(), TranscriptError> {
    let Some(playability) = player.get("playabilityStatus") else {
        return Ok(());
    };

    let status = playability.get("status").and_then(Value::as_str).unwrap_or("");
    let reason = playability.get("reason").and_then(Value::as_str).unwrap_or("");

    match status {
        "OK" | "" => Ok(()),
        "LOGIN_REQUIRED" if reason.contains("not a bot") => Err(TranscriptError::Network(format!(
            "request for {} was blocked by bot detection",
            video.id()
        ))),
        _ => {
            tracing::debug!("Video {} not playable: {} ({})", video.id(), status, reason);
            Err(TranscriptError::VideoUnavailable(video.id().to_string()))
        }
    }
}

/// List the caption tracks in a player response
pub fn caption_tracks(player: &Value, video: &VideoReference) -> Result<Vec<CaptionTrack>, TranscriptError> {
    let renderer = player
        .get("captions")
        .and_then(|captions| captions.get("playerCaptionsTracklistRenderer"))
        .ok_or_else(|| TranscriptError::CaptionsDisabled(video.id().to_string()))?;

    let tracks: Vec<CaptionTrack> = renderer
        .get("captionTracks")
        .and_then(Value::as_array)
        .map(|tracks| {
            tracks
                .iter()
                .filter_map(|track| {
                    let language_code = track.get("languageCode")?.as_str()?.to_string();
                    let base_url = track.get("baseUrl")?.as_str()?.replace("&fmt=srv3", "");
                    let is_generated = track.get("kind").and_then(Value::as_str) == Some("asr");
                    Some(CaptionTrack {
                        language_code,
                        base_url,
                        is_generated,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(TranscriptError::CaptionsDisabled(video.id().to_string()));
    }

    Ok(tracks)
}

/// Pick a track: per preferred language, manual before auto-generated.
///
/// With `fallback_to_any_language` the first listed track is used when no
/// preferred language matches.
pub fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    languages: &[String],
    fallback_to_any_language: bool,
) -> Option<&'a CaptionTrack> {
    let preferred = languages.iter().find_map(|language| {
        let matching = |generated: bool| {
            tracks
                .iter()
                .find(|track| track.is_generated == generated && track.language_code == *language)
        };
        matching(false).or_else(|| matching(true))
    });

    match preferred {
        Some(track) => Some(track),
        None if fallback_to_any_language => tracks.first(),
        None => None,
    }
}

/// Select the track to download, or explain why none is usable
pub fn choose_track<'a>(
    tracks: &'a [CaptionTrack],
    languages: &[String],
    fallback_to_any_language: bool,
    video: &VideoReference,
) -> Result<&'a CaptionTrack, TranscriptError> {
    let track = select_track(tracks, languages, fallback_to_any_language)
        .ok_or_else(|| TranscriptError::NoTranscriptFound(video.id().to_string()))?;

    if track.base_url.contains("&exp=xpe") {
        // Track requires a proof-of-origin token this client cannot produce
        tracing::debug!("Track {} for {} needs a PO token", track.language_code, video.id());
        return Err(TranscriptError::NoTranscriptFound(video.id().to_string()));
    }

    Ok(track)
}

/// Turn a downloaded timedtext document into a transcript
pub fn transcript_from_timedtext(xml: &str, language: &str, video: &VideoReference) -> ExtractionOutcome {
    let segments = parse_timedtext(xml);
    if segments.is_empty() {
        return Err(TranscriptError::NoTranscriptFound(video.id().to_string()));
    }

    Ok(normalize(segments, language))
}

/// Parse a legacy timedtext XML document into segments, in document order
pub fn parse_timedtext(xml: &str) -> Vec<TranscriptSegment> {
    TIMEDTEXT_LINE
        .captures_iter(xml)
        .filter_map(|captures| {
            let start = captures.get(1)?.as_str().parse::<f64>().ok()?;
            let duration = captures
                .get(2)
                .and_then(|dur| dur.as_str().parse::<f64>().ok())
                .unwrap_or(0.0);
            let raw = captures.get(3).map(|text| text.as_str()).unwrap_or_default();
            Some(TranscriptSegment::new(decode_caption_text(raw), start, duration))
        })
        .collect()
}

/// Caption text arrives entity-encoded, sometimes twice, and may carry markup
fn decode_caption_text(raw: &str) -> String {
    let once = html_escape::decode_html_entities(raw);
    let twice = html_escape::decode_html_entities(&once);
    MARKUP_TAG.replace_all(&twice, "").into_owned()
}

#[async_trait]
impl ExtractionStrategy for ScrapeExtractor {
    async fn extract(&self, video: &VideoReference) -> ExtractionOutcome {
        tracing::debug!("Scraping caption tracks for {}", video.id());

        let html = self.fetch_watch_page(video).await?;
        let api_key = extract_api_key(&html, video)?;
        let player = self.fetch_player(video, &api_key).await?;

        check_playability(&player, video)?;
        let tracks = caption_tracks(&player, video)?;

        let track = choose_track(&tracks, &self.languages, self.fallback_to_any_language, video)?;

        let xml = self.fetch_timedtext(track, video).await?;
        transcript_from_timedtext(&xml, &track.language_code, video)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Scrape
    }
}
