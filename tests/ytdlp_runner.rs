//! Runs `YtdlpRunner` against small shell scripts standing in for yt-dlp.
#![cfg(unix)]

use atlas_bot::media::{
    DownloadError, DownloadRequest, FormatHint, MediaKind, MediaSource, YtdlpRunner,
};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Expands the `-o` template the way yt-dlp would for a clip titled "clip"
const EXPAND: &str = r#"path=$(printf '%s' "$2" | sed -e 's/%(title)[^s]*s/clip/' -e 's/%(ext)s/mp4/')"#;

fn script(body: &str) -> String {
    format!("#!/bin/sh\n{EXPAND}\n{body}\n")
}

/// All fake tools are written before any test spawns a process
fn tools() -> &'static TempDir {
    static TOOLS: OnceLock<TempDir> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let dir = tempfile::tempdir().expect("tools dir");
        let scripts = [
            (
                "announce",
                script(
                    "printf 'fake-video' > \"$path\"\n\
                     echo '[youtube] abc: Downloading webpage'\n\
                     echo \"[download] Destination: $path\"\n\
                     echo '[download] 100% of 10.00B'",
                ),
            ),
            (
                "already",
                script(
                    "printf 'cached!' > \"$path\"\n\
                     echo \"[download] Destination: $(dirname \"$path\")/stale.mp4\"\n\
                     echo \"[download] $path has already been downloaded\"",
                ),
            ),
            (
                "silent",
                script("printf 'quiet' > \"$path\"\necho 'done'"),
            ),
            (
                "private",
                script(
                    "echo 'WARNING: Deprecated Feature: Support for Python 3.8 is deprecated' >&2\n\
                     echo 'ERROR: [instagram] abc: This content is private' >&2\n\
                     exit 1",
                ),
            ),
            ("slow", script("sleep 30")),
            (
                "stalled",
                script("printf 'half' > \"$path.part\"\nexec sleep 30"),
            ),
            (
                "broken",
                script(
                    "printf 'half' > \"$path.part\"\n\
                     echo 'ERROR: unable to download video data' >&2\n\
                     exit 1",
                ),
            ),
            (
                "forking",
                script(
                    "sleep 8 >/dev/null &\n\
                     printf 'fork' > \"$path\"\n\
                     echo \"[download] Destination: $path\"",
                ),
            ),
        ];
        for (name, body) in scripts {
            let path = dir.path().join(name);
            std::fs::write(&path, body).expect("write script");
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                .expect("chmod");
        }
        dir
    })
}

fn tool(name: &str) -> String {
    tools().path().join(name).to_string_lossy().into_owned()
}

fn runner(name: &str) -> YtdlpRunner {
    YtdlpRunner::new(tool(name), Duration::from_secs(20))
}

fn request(dir: &Path, format: FormatHint) -> DownloadRequest {
    DownloadRequest::new("https://example.com/watch?v=abc", format, dir)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .expect("file name")
        .to_string_lossy()
        .into_owned()
}

#[tokio::test]
async fn announced_destination_is_used() {
    let work = tempfile::tempdir().expect("work dir");
    let result = runner("announce")
        .fetch(&request(work.path(), FormatHint::Video))
        .await
        .expect("download");

    assert!(file_name(&result.file_path).ends_with("_clip.mp4"));
    assert_eq!(result.display_title, file_name(&result.file_path));
    assert_eq!(result.media_kind, MediaKind::Video);
    assert_eq!(result.size_bytes, "fake-video".len() as u64);
    assert_eq!(
        std::fs::metadata(&result.file_path).expect("stat").len(),
        result.size_bytes
    );
}

#[tokio::test]
async fn last_announcement_wins() {
    let work = tempfile::tempdir().expect("work dir");
    let result = runner("already")
        .fetch(&request(work.path(), FormatHint::Audio))
        .await
        .expect("download");

    assert!(file_name(&result.file_path).ends_with("_clip.mp4"));
    assert_eq!(result.media_kind, MediaKind::Audio);
    assert_eq!(result.size_bytes, "cached!".len() as u64);
}

#[tokio::test]
async fn unannounced_file_found_by_token_scan() {
    let work = tempfile::tempdir().expect("work dir");
    std::fs::write(work.path().join("unrelated.mp4"), b"x").expect("write");

    let result = runner("silent")
        .fetch(&request(work.path(), FormatHint::Video))
        .await
        .expect("download");

    let name = file_name(&result.file_path);
    let (token, rest) = name.split_once('_').expect("token prefix");
    assert!(token.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(rest, "clip.mp4");
    assert_eq!(result.size_bytes, 5);
}

#[tokio::test]
async fn failed_run_reports_filtered_stderr() {
    let work = tempfile::tempdir().expect("work dir");
    let err = runner("private")
        .fetch(&request(work.path(), FormatHint::Video))
        .await
        .expect_err("must fail");

    match &err {
        DownloadError::ExtractionFailed { exit_code, stderr } => {
            assert_eq!(*exit_code, 1);
            assert!(stderr.contains("This content is private"));
            assert!(!stderr.contains("Deprecated Feature"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.user_message(), "Content is private or unavailable.");
    assert_eq!(std::fs::read_dir(work.path()).expect("dir").count(), 0);
}

#[tokio::test]
async fn runaway_run_is_killed_at_deadline() {
    let work = tempfile::tempdir().expect("work dir");
    let runner = YtdlpRunner::new(tool("slow"), Duration::from_millis(300));

    let started = Instant::now();
    let err = runner
        .fetch(&request(work.path(), FormatHint::Video))
        .await
        .expect_err("must time out");

    assert!(matches!(err, DownloadError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

fn leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("dir")
        .filter_map(|e| e.ok()?.file_name().into_string().ok())
        .collect()
}

#[tokio::test]
async fn timed_out_run_leaves_no_partial_files() {
    let work = tempfile::tempdir().expect("work dir");
    let runner = YtdlpRunner::new(tool("stalled"), Duration::from_millis(500));

    let err = runner
        .fetch(&request(work.path(), FormatHint::Video))
        .await
        .expect_err("must time out");

    match err {
        DownloadError::Timeout { limit } => assert_eq!(limit, Duration::from_millis(500)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(leftovers(work.path()).is_empty(), "{:?}", leftovers(work.path()));
}

#[tokio::test]
async fn failed_run_leaves_no_partial_files() {
    let work = tempfile::tempdir().expect("work dir");
    std::fs::write(work.path().join("1_other_run.mp4"), b"x").expect("write");

    let err = runner("broken")
        .fetch(&request(work.path(), FormatHint::Video))
        .await
        .expect_err("must fail");

    assert!(matches!(err, DownloadError::ExtractionFailed { exit_code: 1, .. }));
    assert_eq!(leftovers(work.path()), vec!["1_other_run.mp4".to_string()]);
}

#[tokio::test]
async fn helper_processes_do_not_hold_the_run_open() {
    let work = tempfile::tempdir().expect("work dir");
    let runner = YtdlpRunner::new(tool("forking"), Duration::from_secs(5));

    let started = Instant::now();
    let result = runner
        .fetch(&request(work.path(), FormatHint::Video))
        .await
        .expect("download");

    assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
    assert_eq!(result.size_bytes, 4);
}

#[tokio::test]
async fn missing_tool_is_reported() {
    let work = tempfile::tempdir().expect("work dir");
    let runner = YtdlpRunner::new("/nonexistent/yt-dlp", Duration::from_secs(5));

    let err = runner
        .fetch(&request(work.path(), FormatHint::Video))
        .await
        .expect_err("must fail");
    assert!(matches!(err, DownloadError::ToolUnavailable { .. }));
}
