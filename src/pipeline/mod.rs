use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::extractors::official::OfficialApiExtractor;
use crate::extractors::scrape::ScrapeExtractor;
use crate::extractors::subprocess::SubprocessExtractor;
use crate::extractors::{ExtractionStrategy, StrategyKind, VideoReference};
use crate::transcript::TranscriptResult;
use crate::TranscriptError;

/// Successful pipeline run: the transcript plus where it came from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub video_id: String,
    pub strategy: StrategyKind,
    pub fetched_at: DateTime<Utc>,
    pub transcript: TranscriptResult,
}

/// Tries extraction strategies in order and returns the first success.
///
/// Strategies run strictly one after another; once one succeeds the rest are
/// never invoked. When all fail, the error of the first strategy attempted is
/// returned. The pipeline holds no state between runs.
pub struct TranscriptPipeline {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl TranscriptPipeline {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Build the strategies named in `order` from configuration
    pub fn from_config(
        config: &Config,
        order: &[StrategyKind],
        api_key: Option<&str>,
    ) -> Result<Self, TranscriptError> {
        let mut strategies: Vec<Box<dyn ExtractionStrategy>> = Vec::with_capacity(order.len());

        for kind in order {
            let strategy: Box<dyn ExtractionStrategy> = match kind {
                StrategyKind::Subprocess => Box::new(SubprocessExtractor::from_config(&config.subprocess)),
                StrategyKind::Scrape => Box::new(ScrapeExtractor::from_config(&config.scrape)?),
                StrategyKind::OfficialApi => {
                    let key = config.resolve_api_key(api_key).ok_or_else(|| {
                        TranscriptError::AuthorizationDenied(
                            "the official-api strategy needs an API key (--api-key or YOUTUBE_API_KEY)".to_string(),
                        )
                    })?;
                    Box::new(OfficialApiExtractor::new(key, &config.official_api))
                }
            };
            strategies.push(strategy);
        }

        Ok(Self::new(strategies))
    }

    /// Strategies in the order they will be tried
    pub fn order(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|strategy| strategy.kind()).collect()
    }

    /// Parse `url` and fetch its transcript
    pub async fn run(&self, url: &str) -> Result<PipelineOutput, TranscriptError> {
        let video = VideoReference::parse(url)?;
        self.extract(&video).await
    }

    /// Fetch the transcript for an already parsed reference
    pub async fn extract(&self, video: &VideoReference) -> Result<PipelineOutput, TranscriptError> {
        let mut first_error: Option<TranscriptError> = None;

        for strategy in &self.strategies {
            let kind = strategy.kind();
            tracing::info!("Trying {} strategy for video {}", kind, video.id());

            let outcome = strategy.extract(video).await.and_then(|transcript| {
                if transcript.is_empty() {
                    Err(TranscriptError::NoTranscriptFound(video.id().to_string()))
                } else {
                    Ok(transcript)
                }
            });

            match outcome {
                Ok(transcript) => {
                    tracing::info!(
                        "{} strategy returned {} words ({:.0}s) for {}",
                        kind,
                        transcript.word_count,
                        transcript.total_duration_seconds,
                        video.id()
                    );
                    return Ok(PipelineOutput {
                        video_id: video.id().to_string(),
                        strategy: kind,
                        fetched_at: Utc::now(),
                        transcript,
                    });
                }
                Err(e) => {
                    tracing::warn!("{} strategy failed ({}): {}", kind, e.kind(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.unwrap_or(TranscriptError::NoStrategiesConfigured))
    }
}
