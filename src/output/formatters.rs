use anyhow::{Context, Result};

use crate::pipeline::PipelineOutput;

/// Format whole seconds as `H:MM:SS`, or `M:SS` under an hour
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// First `word_limit` words of `text` followed by `...`, or `text` unchanged if it is short enough
pub fn preview(text: &str, word_limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= word_limit {
        return text.to_string();
    }

    format!("{}...", words[..word_limit].join(" "))
}

/// Plain text: a short header followed by the transcript (or a preview of it)
pub fn format_as_text(output: &PipelineOutput, preview_words: Option<usize>) -> String {
    let transcript = &output.transcript;
    let body = match preview_words {
        Some(limit) => preview(&transcript.full_text, limit),
        None => transcript.full_text.clone(),
    };

    format!(
        "Video: {}\nStrategy: {}\nLanguage: {}\nDuration: {}\nWords: {}\n\n{}",
        output.video_id,
        output.strategy,
        transcript.language,
        format_duration(transcript.total_duration_seconds as u64),
        transcript.word_count,
        body
    )
}

/// Pretty-printed JSON of the whole pipeline output
pub fn format_as_json(output: &PipelineOutput) -> Result<String> {
    serde_json::to_string_pretty(output).context("Failed to serialize transcript")
}

/// One `[M:SS] text` line per segment
pub fn format_as_timestamped(output: &PipelineOutput) -> String {
    output
        .transcript
        .segments
        .iter()
        .map(|segment| {
            format!(
                "[{}] {}",
                format_duration(segment.start_offset_seconds as u64),
                crate::transcript::collapse_whitespace(&segment.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
