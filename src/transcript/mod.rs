use serde::{Deserialize, Serialize};

/// One timed caption unit as emitted by a captioning source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSegment {
    /// Caption text
    pub text: String,

    /// Start offset in seconds
    pub start_offset_seconds: f64,

    /// Duration in seconds
    pub duration_seconds: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start_offset_seconds: f64, duration_seconds: f64) -> Self {
        Self {
            text: text.into(),
            start_offset_seconds,
            duration_seconds,
        }
    }

    /// Offset at which this segment stops being displayed
    pub fn end_offset_seconds(&self) -> f64 {
        self.start_offset_seconds + self.duration_seconds
    }
}

/// Normalized transcript with derived metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResult {
    /// Segment texts joined with single spaces, whitespace collapsed
    pub full_text: String,

    /// Segments in the order the source produced them
    pub segments: Vec<TranscriptSegment>,

    /// Rightmost segment extent, not the sum of durations
    pub total_duration_seconds: f64,

    /// Whitespace-delimited tokens in `full_text`
    pub word_count: usize,

    /// Caption language code
    pub language: String,
}

impl TranscriptResult {
    pub fn is_empty(&self) -> bool {
        self.word_count == 0
    }
}

/// Merge timed segments into a single transcript.
///
/// Never fails: an empty slice yields an empty text, zero words and zero duration.
pub fn normalize(segments: Vec<TranscriptSegment>, language: impl Into<String>) -> TranscriptResult {
    let joined = segments
        .iter()
        .map(|segment| segment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let full_text = collapse_whitespace(&joined);
    let word_count = word_count(&full_text);

    let total_duration_seconds = segments
        .iter()
        .map(TranscriptSegment::end_offset_seconds)
        .fold(0.0, f64::max);

    TranscriptResult {
        full_text,
        segments,
        total_duration_seconds,
        word_count,
        language: language.into(),
    }
}

/// Collapse every whitespace run (newlines and tabs included) to one space and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Count whitespace-delimited tokens
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_empty() {
        let result = normalize(Vec::new(), "en");
        assert_eq!(result.full_text, "");
        assert_eq!(result.word_count, 0);
        assert_eq!(result.total_duration_seconds, 0.0);
        assert!(result.segments.is_empty());
        assert!(result.is_empty());
    }

    #[test]
    fn test_normalize_joins_and_collapses() {
        let segments = vec![
            TranscriptSegment::new("  Eat more\nvegetables ", 0.0, 2.0),
            TranscriptSegment::new("\tand\t\twhole grains", 2.0, 3.0),
            TranscriptSegment::new("", 5.0, 1.0),
        ];
        let result = normalize(segments, "en");
        assert_eq!(result.full_text, "Eat more vegetables and whole grains");
        assert_eq!(result.word_count, 6);
        assert_eq!(result.segments.len(), 3);
        assert_eq!(result.language, "en");
    }

    #[test]
    fn test_duration_is_rightmost_extent_not_sum() {
        let segments = vec![
            TranscriptSegment::new("first", 0.0, 10.0),
            TranscriptSegment::new("second", 5.0, 20.0),
        ];
        let result = normalize(segments, "en");
        assert_eq!(result.total_duration_seconds, 25.0);
    }

    #[test]
    fn test_duration_ignores_segment_order() {
        let segments = vec![
            TranscriptSegment::new("late", 40.0, 5.0),
            TranscriptSegment::new("early", 0.0, 3.0),
        ];
        let result = normalize(segments, "en");
        assert_eq!(result.total_duration_seconds, 45.0);
        assert_eq!(result.full_text, "late early");
    }

    #[test]
    fn test_normalized_text_is_a_fixed_point() {
        let text = "already normalized text with single spaces";
        assert_eq!(collapse_whitespace(text), text);

        let once = normalize(vec![TranscriptSegment::new(text, 0.0, 1.0)], "en");
        let twice = normalize(
            vec![TranscriptSegment::new(once.full_text.clone(), 0.0, 1.0)],
            "en",
        );
        assert_eq!(once.full_text, twice.full_text);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count("one"), 1);
        assert_eq!(word_count(" one  two\nthree "), 3);
    }

    #[test]
    fn test_serializes_camel_case() {
        let result = normalize(vec![TranscriptSegment::new("hi", 1.0, 2.0)], "en");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["fullText"], "hi");
        assert_eq!(json["wordCount"], 1);
        assert_eq!(json["totalDurationSeconds"], 3.0);
        assert_eq!(json["segments"][0]["startOffsetSeconds"], 1.0);
    }
}
