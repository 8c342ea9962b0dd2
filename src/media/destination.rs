//! Recovering the file an extraction run produced.
//!
//! `yt-dlp` announces the output path on stdout, but not reliably across
//! versions and extractors. A path captured from output always wins; without
//! one, the work directory is scanned for the run token prefix.

use super::RunToken;
use lazy_regex::{lazy_regex, Lazy, Regex};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

static DESTINATION_RE: Lazy<Regex> = lazy_regex!(r"Destination:\s+(.+)");
static ALREADY_DOWNLOADED_RE: Lazy<Regex> = lazy_regex!(r"Already downloaded:\s+(.+)");
static HAS_ALREADY_RE: Lazy<Regex> =
    lazy_regex!(r"\[download\]\s+(.+?) has already been downloaded");

/// Leftovers of an interrupted download, never a finished file
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".ytdl"];

/// Extract an announced output path from one line of tool output
#[must_use]
pub fn announced_path(line: &str) -> Option<PathBuf> {
    [&DESTINATION_RE, &ALREADY_DOWNLOADED_RE, &HAS_ALREADY_RE]
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

/// Pick the run's file among directory entry names
#[must_use]
pub fn pick_token_match<I>(names: I, token: &RunToken) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    let prefix = token.file_prefix();
    let mut matches: Vec<String> = names
        .into_iter()
        .filter(|name| name.starts_with(&prefix))
        .filter(|name| !PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s)))
        .collect();
    matches.sort();

    if matches.len() > 1 {
        warn!(token = %token, candidates = ?matches, "Several files match run token, using the first");
    }
    matches.into_iter().next()
}

/// Resolve the output path of a run.
///
/// Returns `None` when nothing was announced and no directory entry carries
/// the token prefix. The returned path is not checked for existence.
pub async fn resolve(captured: Option<PathBuf>, dir: &Path, token: &RunToken) -> Option<PathBuf> {
    if let Some(path) = captured {
        return Some(path);
    }

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Cannot scan work directory");
            return None;
        }
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    let found = pick_token_match(names, token).map(|name| dir.join(name));
    if let Some(ref path) = found {
        debug!(path = %path.display(), "Resolved output by directory scan");
    }
    found
}

/// Delete every entry of `dir` carrying the run token prefix, partial
/// downloads included. Returns how many files were removed.
pub async fn remove_run_files(dir: &Path, token: &RunToken) -> usize {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };

    let prefix = token.file_prefix();
    let mut removed = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if !matches {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to remove run file"),
        }
    }

    if removed > 0 {
        debug!(token = %token, removed, "Removed files of failed run");
    }
    removed
}
