use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{ExtractionOutcome, ExtractionStrategy, StrategyKind, VideoReference};
use crate::config::OfficialApiConfig;
use crate::transcript::{normalize, TranscriptSegment};
use crate::TranscriptError;

/// Error reasons that point at the credential rather than the caption
const CREDENTIAL_REASONS: &[&str] = &[
    "keyInvalid",
    "keyExpired",
    "accessNotConfigured",
    "ipRefererBlocked",
    "quotaExceeded",
    "dailyLimitExceeded",
    "API_KEY_INVALID",
    "API_KEY_SERVICE_BLOCKED",
];

/// Transcript extractor backed by the YouTube Data API v3.
///
/// Listing caption tracks works with a plain API key; downloading a track
/// normally needs OAuth on behalf of the video owner, which surfaces as
/// [`TranscriptError::PermissionDenied`].
pub struct OfficialApiExtractor {
    client: Client,
    api_key: String,
    base_url: String,
    languages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiStage {
    ListTracks,
    DownloadTrack,
}

#[derive(Debug, Deserialize)]
struct CaptionListResponse {
    #[serde(default)]
    items: Vec<CaptionResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptionResource {
    pub id: String,
    pub snippet: CaptionSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSnippet {
    pub language: String,
    #[serde(default)]
    pub track_kind: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

impl OfficialApiExtractor {
    pub fn new(api_key: impl Into<String>, config: &OfficialApiConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            languages: config.languages.clone(),
        }
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, TranscriptError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|_| TranscriptError::Network(format!("invalid API base URL: {}", self.base_url)))?;
        url.query_pairs_mut()
            .extend_pairs(query)
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get(&self, url: Url, stage: ApiStage, video: &VideoReference) -> Result<String, TranscriptError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            tracing::debug!("Data API request failed: {}", e);
            TranscriptError::Network("Data API request failed".to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::debug!("Failed to read Data API response: {}", e);
            TranscriptError::Network("failed to read Data API response".to_string())
        })?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify_api_error(stage, status, &body, video))
        }
    }

    async fn list_tracks(&self, video: &VideoReference) -> Result<Vec<CaptionResource>, TranscriptError> {
        let url = self.endpoint("captions", &[("part", "snippet"), ("videoId", video.id())])?;
        let body = self.get(url, ApiStage::ListTracks, video).await?;

        let list: CaptionListResponse = serde_json::from_str(&body).map_err(|_| {
            TranscriptError::MalformedResponse("caption list response is not valid JSON".to_string())
        })?;

        Ok(list.items)
    }

    async fn download_track(&self, track: &CaptionResource, video: &VideoReference) -> Result<String, TranscriptError> {
        let url = self.endpoint(&format!("captions/{}", track.id), &[("tfmt", "srt")])?;
        self.get(url, ApiStage::DownloadTrack, video).await
    }
}

/// Map a Data API error response to the shared taxonomy
fn classify_api_error(stage: ApiStage, status: StatusCode, body: &str, video: &VideoReference) -> TranscriptError {
    let parsed = serde_json::from_str::<ApiErrorEnvelope>(body).ok();
    let credential_problem = parsed.as_ref().is_some_and(|envelope| {
        envelope
            .error
            .errors
            .iter()
            .chain(envelope.error.details.iter())
            .any(|detail| CREDENTIAL_REASONS.contains(&detail.reason.as_str()))
            || envelope.error.message.contains("API key not valid")
    });

    if let Some(envelope) = &parsed {
        tracing::debug!("Data API {:?} failed with {}: {}", stage, status, envelope.error.message);
    }

    let id = video.id().to_string();
    match (stage, status.as_u16()) {
        (_, _) if credential_problem => {
            TranscriptError::AuthorizationDenied("API key is invalid or the Data API is not enabled".to_string())
        }
        (ApiStage::ListTracks, 400 | 401 | 403) => {
            TranscriptError::AuthorizationDenied(format!("caption list for {} was refused (HTTP {})", id, status.as_u16()))
        }
        (ApiStage::ListTracks, 404) => TranscriptError::VideoUnavailable(id),
        (ApiStage::DownloadTrack, 401 | 403) => TranscriptError::PermissionDenied(format!(
            "downloading captions for {} requires OAuth authorization",
            id
        )),
        (ApiStage::DownloadTrack, 404) => TranscriptError::NoTranscriptFound(id),
        _ => TranscriptError::Network(format!("Data API returned HTTP {} for {}", status.as_u16(), id)),
    }
}

/// Pick a track: per preferred language, uploaded tracks before auto-generated,
/// otherwise the first listed track
fn select_resource<'a>(tracks: &'a [CaptionResource], languages: &[String]) -> Option<&'a CaptionResource> {
    languages
        .iter()
        .find_map(|language| {
            let matching = |generated: bool| {
                tracks.iter().find(|track| {
                    track.snippet.language == *language && (track.snippet.track_kind == "asr") == generated
                })
            };
            matching(false).or_else(|| matching(true))
        })
        .or_else(|| tracks.first())
}

/// An empty caption list means the owner published no captions at all
fn choose_resource<'a>(
    tracks: &'a [CaptionResource],
    languages: &[String],
    video: &VideoReference,
) -> Result<&'a CaptionResource, TranscriptError> {
    if tracks.is_empty() {
        return Err(TranscriptError::CaptionsDisabled(video.id().to_string()));
    }

    select_resource(tracks, languages).ok_or_else(|| TranscriptError::NoTranscriptFound(video.id().to_string()))
}

fn transcript_from_srt(srt: &str, language: &str, video: &VideoReference) -> ExtractionOutcome {
    let segments = parse_srt(srt);
    if segments.is_empty() {
        return Err(TranscriptError::NoTranscriptFound(video.id().to_string()));
    }

    Ok(normalize(segments, language))
}

/// Parse an SRT document into segments, in document order
pub fn parse_srt(srt: &str) -> Vec<TranscriptSegment> {
    let normalized = srt.replace("\r\n", "\n");

    normalized
        .split("\n\n")
        .filter_map(|block| {
            let mut lines = block.lines().map(str::trim).skip_while(|line| line.is_empty());
            let mut timing = lines.next()?;
            if !timing.contains("-->") {
                // First line is the cue index
                timing = lines.next()?;
            }

            let (start, end) = timing.split_once("-->")?;
            let start = parse_srt_timestamp(start.trim())?;
            let end = parse_srt_timestamp(end.trim())?;
            let text = lines.collect::<Vec<_>>().join(" ");

            Some(TranscriptSegment::new(text, start, (end - start).max(0.0)))
        })
        .collect()
}

/// `HH:MM:SS,mmm` (or `.mmm`) to seconds
fn parse_srt_timestamp(timestamp: &str) -> Option<f64> {
    let (clock, millis) = timestamp
        .split_once([',', '.'])
        .unwrap_or((timestamp, "0"));

    let mut parts = clock.split(':').map(|part| part.parse::<u64>().ok());
    let hours = parts.next()??;
    let minutes = parts.next()??;
    let seconds = parts.next()??;
    if parts.next().is_some() {
        return None;
    }

    let millis = millis.parse::<u64>().ok()?;
    Some((hours * 3600 + minutes * 60 + seconds) as f64 + millis as f64 / 1000.0)
}

#[async_trait]
impl ExtractionStrategy for OfficialApiExtractor {
    async fn extract(&self, video: &VideoReference) -> ExtractionOutcome {
        tracing::debug!("Listing caption tracks for {} via the Data API", video.id());

        let tracks = self.list_tracks(video).await?;
        let track = choose_resource(&tracks, &self.languages, video)?;

        let srt = self.download_track(track, video).await?;
        transcript_from_srt(&srt, &track.snippet.language, video)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::OfficialApi
    }
}
