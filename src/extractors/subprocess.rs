use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use super::{ExtractionOutcome, ExtractionStrategy, StrategyKind, VideoReference};
use crate::config::SubprocessConfig;
use crate::transcript::{normalize, TranscriptSegment};
use crate::TranscriptError;

/// Stderr is only logged, so a small window is enough
const MAX_STDERR_BYTES: u64 = 64 * 1024;

/// Transcript extractor that delegates to an external helper script.
///
/// The helper is invoked as `<interpreter> <script> <url>` and must print one JSON
/// document on stdout. Runs are bounded by a wall-clock timeout and a stdout cap;
/// the child is killed when either is exceeded or the future is dropped.
pub struct SubprocessExtractor {
    interpreter: String,
    script: PathBuf,
    timeout: Duration,
    max_output_bytes: usize,
}

/// Wire format printed by the helper
#[derive(Debug, Deserialize)]
struct HelperResponse {
    success: bool,
    data: Option<HelperTranscript>,
    error: Option<String>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HelperTranscript {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    items: Vec<HelperItem>,
    duration: Option<f64>,
    #[allow(dead_code)]
    word_count: Option<usize>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelperItem {
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    duration: f64,
}

/// Everything captured from a finished helper run
struct CapturedOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl SubprocessExtractor {
    pub fn new(
        interpreter: impl Into<String>,
        script: impl Into<PathBuf>,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            timeout,
            max_output_bytes,
        }
    }

    pub fn from_config(config: &SubprocessConfig) -> Self {
        Self::new(
            config.interpreter.clone(),
            config.resolved_script(),
            Duration::from_secs(config.timeout_secs),
            config.max_output_bytes,
        )
    }

    /// Spawn the helper and collect its output within the configured bounds
    async fn run_helper(&self, video: &VideoReference) -> Result<CapturedOutput, TranscriptError> {
        if !self.script.is_file() {
            return Err(TranscriptError::DependencyMissing(format!(
                "helper script not found at {}",
                self.script.display()
            )));
        }

        tracing::debug!(
            "Running {} {} for video {}",
            self.interpreter,
            self.script.display(),
            video.id()
        );

        let mut child = Command::new(&self.interpreter)
            .arg(&self.script)
            .arg(video.url())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscriptError::InterpreterMissing(format!("'{}' is not installed", self.interpreter))
                } else {
                    tracing::debug!("Failed to spawn {}: {}", self.interpreter, e);
                    TranscriptError::InterpreterMissing(format!("'{}' could not be started", self.interpreter))
                }
            })?;

        let collected = tokio::time::timeout(self.timeout, self.collect_output(&mut child)).await;

        match collected {
            Ok(result) => result,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::debug!("Failed to kill timed out helper: {}", e);
                }
                Err(TranscriptError::Timeout(format!(
                    "helper did not finish within {}s",
                    self.timeout.as_secs_f64()
                )))
            }
        }
    }

    async fn collect_output(&self, child: &mut Child) -> Result<CapturedOutput, TranscriptError> {
        let stdout = child.stdout.take().ok_or_else(|| {
            TranscriptError::MalformedResponse("helper stdout was not captured".to_string())
        })?;
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(read_capped_and_drain(stderr, MAX_STDERR_BYTES)));

        let limit = self.max_output_bytes as u64;
        let stdout = read_capped(stdout, limit + 1).await.map_err(|e| {
            TranscriptError::MalformedResponse(format!("failed to read helper output: {}", e))
        })?;

        if stdout.len() as u64 > limit {
            if let Err(e) = child.kill().await {
                tracing::debug!("Failed to kill oversized helper: {}", e);
            }
            return Err(TranscriptError::MalformedResponse(format!(
                "helper output exceeded {} bytes",
                self.max_output_bytes
            )));
        }

        let status = child.wait().await.map_err(|e| {
            TranscriptError::MalformedResponse(format!("failed to wait for helper: {}", e))
        })?;

        let stderr = match stderr_task {
            Some(task) => task.await.ok().and_then(|read| read.ok()).unwrap_or_default(),
            None => Vec::new(),
        };

        Ok(CapturedOutput {
            status,
            stdout,
            stderr,
        })
    }
}

async fn read_capped<R>(reader: R, limit: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    reader.take(limit).read_to_end(&mut buffer).await?;
    Ok(buffer)
}

/// Keep the first `limit` bytes and discard the rest, so the writer never sees a closed pipe
async fn read_capped_and_drain<R>(mut reader: R, limit: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    (&mut reader).take(limit).read_to_end(&mut buffer).await?;
    tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    Ok(buffer)
}

/// Helper stdout must be UTF-8
fn decode_stdout(stdout: &[u8]) -> Result<&str, TranscriptError> {
    std::str::from_utf8(stdout).map_err(|e| {
        TranscriptError::MalformedResponse(format!("helper output is not valid UTF-8: {}", e))
    })
}

/// Turn a helper run into an outcome
fn interpret_output(output: &CapturedOutput, video: &VideoReference) -> ExtractionOutcome {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        tracing::debug!("Helper stderr for {}: {}", video.id(), stderr.trim());
    }

    let stdout = decode_stdout(&output.stdout)?.trim();

    if stdout.is_empty() {
        if is_missing_module(&stderr) {
            return Err(TranscriptError::DependencyMissing(
                "helper could not import its caption library".to_string(),
            ));
        }
        return Err(TranscriptError::MalformedResponse(format!(
            "helper exited with {} and printed nothing",
            output.status
        )));
    }

    parse_helper_response(stdout, video)
}

/// Parse the helper's JSON document
fn parse_helper_response(stdout: &str, video: &VideoReference) -> ExtractionOutcome {
    let response: HelperResponse = serde_json::from_str(stdout).map_err(|e| {
        TranscriptError::MalformedResponse(format!("helper output is not a valid result document: {}", e))
    })?;

    if !response.success {
        return Err(classify_helper_error(
            response.error_type.as_deref(),
            response.error.as_deref().unwrap_or_default(),
            video,
        ));
    }

    let data = response.data.ok_or_else(|| {
        TranscriptError::MalformedResponse("helper reported success without data".to_string())
    })?;

    let segments = if data.items.is_empty() {
        if data.transcript.trim().is_empty() {
            Vec::new()
        } else {
            vec![TranscriptSegment::new(
                data.transcript,
                0.0,
                data.duration.unwrap_or(0.0),
            )]
        }
    } else {
        data.items
            .into_iter()
            .map(|item| TranscriptSegment::new(item.text, item.start, item.duration))
            .collect()
    };

    let language = data.language.unwrap_or_else(|| "unknown".to_string());
    Ok(normalize(segments, language))
}

/// Map a helper-reported failure to the shared taxonomy.
///
/// The helper's own message is never forwarded; only the classification is.
fn classify_helper_error(error_type: Option<&str>, message: &str, video: &VideoReference) -> TranscriptError {
    let id = video.id().to_string();

    match error_type {
        Some("interpreter_missing") => {
            return TranscriptError::InterpreterMissing("helper reported a missing interpreter".to_string())
        }
        Some("dependency_missing") => {
            return TranscriptError::DependencyMissing("helper caption library is not installed".to_string())
        }
        Some("captions_disabled") => return TranscriptError::CaptionsDisabled(id),
        Some("video_unavailable") => return TranscriptError::VideoUnavailable(id),
        Some("no_transcript_found") => return TranscriptError::NoTranscriptFound(id),
        Some(other) => tracing::debug!("Unknown helper error type: {}", other),
        None => {}
    }

    let lower = message.to_lowercase();
    if is_missing_module(message) || lower.contains("not installed") {
        TranscriptError::DependencyMissing("helper caption library is not installed".to_string())
    } else if lower.contains("disabled") {
        TranscriptError::CaptionsDisabled(id)
    } else if lower.contains("unavailable") || lower.contains("private") {
        TranscriptError::VideoUnavailable(id)
    } else {
        TranscriptError::NoTranscriptFound(id)
    }
}

fn is_missing_module(text: &str) -> bool {
    text.contains("No module named") || text.contains("ModuleNotFoundError")
}

#[async_trait]
impl ExtractionStrategy for SubprocessExtractor {
    async fn extract(&self, video: &VideoReference) -> ExtractionOutcome {
        let output = self.run_helper(video).await?;
        interpret_output(&output, video)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Subprocess
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn video() -> VideoReference {
        VideoReference::parse("https://youtu.be/dQw4w9WgXcQ").unwrap()
    }

    fn script(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", body).unwrap();
        file
    }

    fn sh_extractor(script: &NamedTempFile) -> SubprocessExtractor {
        SubprocessExtractor::new("sh", script.path(), Duration::from_secs(10), 10 * 1024 * 1024)
    }

    #[test]
    fn test_parse_success_with_items() {
        let stdout = r#"{"success":true,"data":{
            "transcript":"ignored",
            "items":[{"text":"Protein  keeps","start":0.0,"duration":2.5},
                     {"text":"you full","start":2.0,"duration":3.0}],
            "duration":5.0,"wordCount":4,"language":"en"}}"#;
        let result = parse_helper_response(stdout, &video()).unwrap();
        assert_eq!(result.full_text, "Protein keeps you full");
        assert_eq!(result.word_count, 4);
        assert_eq!(result.total_duration_seconds, 5.0);
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.language, "en");
    }

    #[test]
    fn test_parse_success_without_items_uses_transcript() {
        let stdout = r#"{"success":true,"data":{"transcript":"a  b\nc","duration":12.0}}"#;
        let result = parse_helper_response(stdout, &video()).unwrap();
        assert_eq!(result.full_text, "a b c");
        assert_eq!(result.total_duration_seconds, 12.0);
        assert_eq!(result.language, "unknown");
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse_helper_response("Traceback (most recent call last):", &video()).unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_rejects_missing_success_field() {
        let err = parse_helper_response(r#"{"data":{"transcript":"x"}}"#, &video()).unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_rejects_success_without_data() {
        let err = parse_helper_response(r#"{"success":true}"#, &video()).unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedResponse(_)));
    }

    #[test]
    fn test_decode_stdout_is_strict() {
        assert_eq!(decode_stdout(b"{\"success\":true}").unwrap(), "{\"success\":true}");

        let err = decode_stdout(b"{\"text\":\"bad \xff byte\"}").unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedResponse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_read_capped_and_drain_consumes_everything() {
        let input = vec![b'x'; 200 * 1024];
        let mut reader = std::io::Cursor::new(input);
        let kept = read_capped_and_drain(&mut reader, 1024).await.unwrap();
        assert_eq!(kept.len(), 1024);
        assert_eq!(reader.position(), 200 * 1024);
    }

    #[test]
    fn test_classify_by_error_type() {
        let v = video();
        assert_eq!(
            classify_helper_error(Some("captions_disabled"), "whatever", &v).kind(),
            crate::ErrorKind::CaptionsDisabled
        );
        assert_eq!(
            classify_helper_error(Some("video_unavailable"), "", &v).kind(),
            crate::ErrorKind::VideoUnavailable
        );
        assert_eq!(
            classify_helper_error(Some("dependency_missing"), "", &v).kind(),
            crate::ErrorKind::DependencyMissing
        );
        assert_eq!(
            classify_helper_error(Some("no_transcript_found"), "", &v).kind(),
            crate::ErrorKind::NoTranscriptFound
        );
    }

    #[test]
    fn test_classify_by_message() {
        let v = video();
        let cases = [
            ("No module named 'youtube_transcript_api'", crate::ErrorKind::DependencyMissing),
            ("Subtitles are disabled for this video", crate::ErrorKind::CaptionsDisabled),
            ("The video is no longer available (Video unavailable)", crate::ErrorKind::VideoUnavailable),
            ("This is a private video", crate::ErrorKind::VideoUnavailable),
            ("Could not retrieve a transcript", crate::ErrorKind::NoTranscriptFound),
        ];
        for (message, expected) in cases {
            assert_eq!(classify_helper_error(None, message, &v).kind(), expected, "{message}");
        }
    }

    #[test]
    fn test_classified_error_does_not_leak_helper_text() {
        let err = classify_helper_error(None, "Traceback: secret internal path /opt/x.py", &video());
        assert!(!err.to_string().contains("Traceback"));
        assert!(!err.to_string().contains("/opt/x.py"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_json_stdout_is_malformed_response() {
        let helper = script("echo 'this is not json'");
        let err = sh_extractor(&helper).extract(&video()).await.unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedResponse(_)), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_receives_raw_url() {
        let helper = script(
            r#"printf '{"success":true,"data":{"items":[{"text":"%s","start":0,"duration":1}],"language":"en"}}' "$1""#,
        );
        let result = sh_extractor(&helper).extract(&video()).await.unwrap();
        assert_eq!(result.full_text, "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(result.word_count, 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_reported_failure_is_typed() {
        let helper = script(
            r#"echo '{"success":false,"error":"Transcripts are disabled","errorType":"captions_disabled"}'; exit 1"#,
        );
        let err = sh_extractor(&helper).extract(&video()).await.unwrap_err();
        assert_eq!(err, TranscriptError::CaptionsDisabled("dQw4w9WgXcQ".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_module_on_stderr() {
        let helper = script("echo \"ModuleNotFoundError: No module named 'youtube_transcript_api'\" >&2; exit 1");
        let err = sh_extractor(&helper).extract(&video()).await.unwrap_err();
        assert!(matches!(err, TranscriptError::DependencyMissing(_)), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_helper() {
        let helper = script("sleep 5; echo '{\"success\":true,\"data\":{}}'");
        let extractor = SubprocessExtractor::new("sh", helper.path(), Duration::from_millis(200), 1024);

        let started = std::time::Instant::now();
        let err = extractor.extract(&video()).await.unwrap_err();
        assert!(matches!(err, TranscriptError::Timeout(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_oversized_output_is_rejected() {
        let helper = script("i=0; while [ $i -lt 200 ]; do echo 'xxxxxxxxxxxxxxxxxxxxxxxx'; i=$((i+1)); done");
        let extractor = SubprocessExtractor::new("sh", helper.path(), Duration::from_secs(10), 64);
        let err = extractor.extract(&video()).await.unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedResponse(_)), "{err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_noisy_stderr_does_not_break_helper() {
        let helper = script(
            r#"head -c 150000 /dev/zero | tr '\000' 'w' >&2
echo '{"success":true,"data":{"items":[{"text":"still here","start":0,"duration":1}],"language":"en"}}'"#,
        );
        let result = sh_extractor(&helper).extract(&video()).await.unwrap();
        assert_eq!(result.full_text, "still here");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invalid_utf8_stdout_is_malformed_response() {
        let helper = script(
            r#"printf '{"success":true,"data":{"items":[{"text":"bad \377 byte","start":0,"duration":1}]}}'"#,
        );
        let err = sh_extractor(&helper).extract(&video()).await.unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedResponse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let helper = script("echo hi");
        let extractor = SubprocessExtractor::new(
            "definitely-not-an-installed-interpreter",
            helper.path(),
            Duration::from_secs(5),
            1024,
        );
        let err = extractor.extract(&video()).await.unwrap_err();
        assert!(matches!(err, TranscriptError::InterpreterMissing(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_missing_script_is_dependency_missing() {
        let extractor = SubprocessExtractor::new(
            "sh",
            "/nonexistent/fetch_transcript.py",
            Duration::from_secs(5),
            1024,
        );
        let err = extractor.extract(&video()).await.unwrap_err();
        assert!(matches!(err, TranscriptError::DependencyMissing(_)), "{err:?}");
        assert_eq!(extractor.kind(), StrategyKind::Subprocess);
    }
}
