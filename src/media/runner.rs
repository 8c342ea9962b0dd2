//! YT-DLP runner - primary media extraction
//!
//! Spawns the extraction tool for a single request, follows its output as it
//! streams, and turns the run into a located file or a classified error.

use super::{
    destination, DownloadError, DownloadRequest, DownloadResult, FormatHint, MediaKind,
    MediaSource, RunToken,
};
use async_trait::async_trait;
use lazy_regex::regex_replace_all;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Maximum characters of stderr carried in an error
const MAX_STDERR_EXCERPT: usize = 1500;

/// Shown when the tool failed without writing anything to stderr
const EMPTY_STDERR_NOTE: &str = "No video file found.";

/// Captured state of one finished tool run
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Exit code, `-1` when terminated by a signal
    pub exit_code: i32,
    /// Full stdout
    pub stdout: String,
    /// Full stderr
    pub stderr: String,
    /// Path resolved from output or by directory scan
    pub resolved_path: Option<PathBuf>,
}

/// Build the tool arguments for one run
#[must_use]
pub fn build_args(url: &str, work_dir: &Path, token: &RunToken, format: FormatHint) -> Vec<String> {
    let (template, selector, max_size) = match format {
        FormatHint::Audio => (
            format!("{token}_%(title)s.%(ext)s"),
            "bestaudio[ext=m4a]/bestaudio/best",
            "100M",
        ),
        FormatHint::Video => (
            format!("{token}_%(title).50s.%(ext)s"),
            "best[ext=mp4]/best",
            "500M",
        ),
    };

    vec![
        "-o".to_string(),
        work_dir.join(template).to_string_lossy().into_owned(),
        "--format".to_string(),
        selector.to_string(),
        "--no-playlist".to_string(),
        "--max-filesize".to_string(),
        max_size.to_string(),
        "--force-overwrites".to_string(),
        "--newline".to_string(),
        // android client needs no PO token
        "--extractor-args".to_string(),
        "youtube:player_client=android".to_string(),
        "--".to_string(),
        url.to_string(),
    ]
}

/// Remove deprecation notices and bound the length of tool stderr
#[must_use]
pub fn filter_stderr(stderr: &str) -> String {
    let cleaned = regex_replace_all!(r"(?m)^.*Deprecated Feature:.*deprecated.*(\n|$)", stderr, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return EMPTY_STDERR_NOTE.to_string();
    }

    // Keep the tail, that is where yt-dlp prints the ERROR line
    let count = cleaned.chars().count();
    if count <= MAX_STDERR_EXCERPT {
        return cleaned.to_string();
    }
    let tail: String = cleaned.chars().skip(count - MAX_STDERR_EXCERPT).collect();
    format!("...{tail}")
}

/// Read one line, decoding invalid UTF-8 lossily. `None` at end of stream.
async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Runs the extraction tool as a subprocess
#[derive(Debug, Clone)]
pub struct YtdlpRunner {
    program: String,
    timeout: Duration,
}

impl YtdlpRunner {
    /// Create a runner for `program` with a hard deadline per run
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Execute one run and capture its outcome.
    ///
    /// The deadline covers the whole run: output streaming, the exit and
    /// draining stderr. The tool runs in its own process group, which is
    /// killed once the tool exits or the deadline passes, so helper
    /// processes never outlive the run.
    ///
    /// # Errors
    ///
    /// `ToolUnavailable` if the process cannot be spawned, `Timeout` if it
    /// outlives the deadline (the group is killed and the run's files are
    /// removed), `Io` on pipe failures.
    pub async fn run(
        &self,
        url: &str,
        work_dir: &Path,
        token: &RunToken,
        format: FormatHint,
    ) -> Result<RunOutcome, DownloadError> {
        let args = build_args(url, work_dir, token, format);
        info!(program = %self.program, format = %format, token = %token, "Starting extraction: {}", args.join(" "));

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|source| DownloadError::ToolUnavailable {
                tool: self.program.clone(),
                source,
            })?;
        let pid = child.id();

        let mut stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                let mut collected = String::new();
                while let Ok(Some(line)) = next_line_lossy(&mut reader, &mut buf).await {
                    debug!(target: "ytdlp", "STDERR: {line}");
                    collected.push_str(&line);
                    collected.push('\n');
                }
                collected
            })
        });

        let finished = tokio::time::timeout(self.timeout, async {
            let streamed = follow_stdout(&mut child).await;
            // Whatever is left in the group only keeps the pipes open
            kill_process_group(pid);
            let stderr = match stderr_task.as_mut() {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };
            streamed.map(|(exit_code, stdout, captured)| (exit_code, stdout, captured, stderr))
        })
        .await;

        let (exit_code, stdout, captured, stderr) = match finished {
            Ok(result) => result?,
            Err(_) => {
                warn!(token = %token, limit = ?self.timeout, "Extraction timed out, killing");
                kill_process_group(pid);
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Extraction already exited");
                }
                if let Some(task) = stderr_task {
                    task.abort();
                }
                destination::remove_run_files(work_dir, token).await;
                return Err(DownloadError::Timeout {
                    limit: self.timeout,
                });
            }
        };

        let resolved_path = destination::resolve(captured, work_dir, token).await;

        Ok(RunOutcome {
            exit_code,
            stdout,
            stderr,
            resolved_path,
        })
    }
}

/// SIGKILL the process group led by `pid`
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, error = %e, "Failed to kill extraction process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Consume stdout until EOF, then wait for the exit status.
///
/// Returns the exit code, the full stdout and the last announced path.
async fn follow_stdout(
    child: &mut Child,
) -> Result<(i32, String, Option<PathBuf>), DownloadError> {
    let mut stdout = String::new();
    let mut captured = None;

    if let Some(pipe) = child.stdout.take() {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        while let Some(line) = next_line_lossy(&mut reader, &mut buf).await? {
            debug!(target: "ytdlp", "STDOUT: {line}");
            if let Some(path) = destination::announced_path(&line) {
                captured = Some(path);
            }
            stdout.push_str(&line);
            stdout.push('\n');
        }
    }

    let status = child.wait().await?;
    Ok((status.code().unwrap_or(-1), stdout, captured))
}

#[async_trait]
impl MediaSource for YtdlpRunner {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(&self, request: &DownloadRequest) -> Result<DownloadResult, DownloadError> {
        let token = RunToken::next();
        let outcome = self
            .run(&request.url, &request.work_dir, &token, request.format)
            .await?;

        if let Some(path) = outcome.resolved_path.as_deref() {
            if let Ok(meta) = tokio::fs::metadata(path).await {
                if meta.is_file() {
                    let display_title = path
                        .file_name()
                        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
                    let media_kind = match request.format {
                        FormatHint::Audio => MediaKind::Audio,
                        FormatHint::Video => MediaKind::Video,
                    };
                    info!(
                        path = %path.display(),
                        size = meta.len(),
                        exit_code = outcome.exit_code,
                        "Extraction produced file"
                    );
                    return Ok(DownloadResult {
                        file_path: path.to_path_buf(),
                        display_title,
                        media_kind,
                        size_bytes: meta.len(),
                    });
                }
            }
        }

        warn!(
            exit_code = outcome.exit_code,
            resolved = ?outcome.resolved_path,
            stderr = %outcome.stderr,
            "Extraction finished without a file"
        );
        destination::remove_run_files(&request.work_dir, &token).await;
        Err(DownloadError::ExtractionFailed {
            exit_code: outcome.exit_code,
            stderr: filter_stderr(&outcome.stderr),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_args_use_audio_selector_and_small_cap() {
        let token = RunToken::from_millis(10);
        let args = build_args("https://youtu.be/x", Path::new("dl"), &token, FormatHint::Audio);
        assert!(args.contains(&"bestaudio[ext=m4a]/bestaudio/best".to_string()));
        assert!(args.contains(&"100M".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        let template = &args[1];
        assert!(template.ends_with("10_%(title)s.%(ext)s"));
        assert!(template.starts_with("dl"));
    }

    #[test]
    fn test_video_args_use_mp4_selector_and_large_cap() {
        let token = RunToken::from_millis(10);
        let args = build_args("https://x.com/a", Path::new("dl"), &token, FormatHint::Video);
        assert!(args.contains(&"best[ext=mp4]/best".to_string()));
        assert!(args.contains(&"500M".to_string()));
        assert!(args[1].ends_with("10_%(title).50s.%(ext)s"));
    }

    #[test]
    fn test_url_is_passed_after_separator() {
        let token = RunToken::from_millis(1);
        let args = build_args("https://a.b/c", Path::new("."), &token, FormatHint::Video);
        let n = args.len();
        assert_eq!(args[n - 2], "--");
        assert_eq!(args[n - 1], "https://a.b/c");
    }

    #[test]
    fn test_filter_stderr_drops_deprecation_lines() {
        let stderr = "Deprecated Feature: Support for Python version 3.8 has been deprecated\nERROR: [generic] Unsupported URL: https://a\n";
        let filtered = filter_stderr(stderr);
        assert_eq!(filtered, "ERROR: [generic] Unsupported URL: https://a");
    }

    #[test]
    fn test_filter_stderr_empty_has_note() {
        assert_eq!(filter_stderr(""), EMPTY_STDERR_NOTE);
        assert_eq!(
            filter_stderr("Deprecated Feature: x is deprecated\n"),
            EMPTY_STDERR_NOTE
        );
    }

    #[test]
    fn test_filter_stderr_keeps_tail_of_long_output() {
        let mut stderr = "noise\n".repeat(1000);
        stderr.push_str("ERROR: final reason");
        let filtered = filter_stderr(&stderr);
        assert!(filtered.starts_with("..."));
        assert!(filtered.ends_with("ERROR: final reason"));
        assert!(filtered.chars().count() <= MAX_STDERR_EXCERPT + 3);
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let runner = YtdlpRunner::new("/nonexistent/yt-dlp-binary", Duration::from_secs(5));
        let dir = tempfile::tempdir().expect("tempdir");
        let request = DownloadRequest::new("https://a.b", FormatHint::Video, dir.path());
        let err = runner.fetch(&request).await.expect_err("must fail");
        assert!(matches!(err, DownloadError::ToolUnavailable { .. }));
    }
}
