//! File-backed log source.
//!
//! Reads `<dir>/<container>.log`. Each line is either a Docker json-file
//! record (`{"log": "...", "stream": "stderr", "time": "..."}`) or a
//! `docker logs --timestamps` line (`<RFC3339> <message>`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loglens_core::error::SourceError;
use loglens_core::log::{LogLine, LogSource, LogStream};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct FileLogSource {
    dir: PathBuf,
}

#[derive(Deserialize)]
struct DockerRecord {
    log: String,
    #[serde(default)]
    stream: Option<String>,
    time: DateTime<Utc>,
}

impl FileLogSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, container: &str) -> PathBuf {
        self.dir.join(format!("{container}.log"))
    }
}

/// Parse one stored log line. `None` when no timestamp can be found.
pub fn parse_line(raw: &str) -> Option<LogLine> {
    let raw = raw.trim_end_matches(['\n', '\r']);
    if raw.trim_start().starts_with('{') {
        if let Ok(record) = serde_json::from_str::<DockerRecord>(raw) {
            let stream = match record.stream.as_deref() {
                Some("stderr") => LogStream::Stderr,
                _ => LogStream::Stdout,
            };
            let message = record.log.trim_end_matches(['\n', '\r']);
            return Some(LogLine::new(record.time, stream, message));
        }
    }

    let (ts, message) = raw.split_once(' ')?;
    let timestamp = DateTime::parse_from_rfc3339(ts).ok()?.with_timezone(&Utc);
    Some(LogLine::stdout(timestamp, message))
}

#[async_trait]
impl LogSource for FileLogSource {
    async fn containers(&self) -> Result<Vec<String>, SourceError> {
        let mut read_dir =
            tokio::fs::read_dir(&self.dir)
                .await
                .map_err(|e| SourceError::ReadFailed {
                    container: self.dir.display().to_string(),
                    reason: e.to_string(),
                })?;

        let mut names = Vec::new();
        while let Ok(Some(item)) = read_dir.next_entry().await {
            let path = item.path();
            if path.extension().is_some_and(|e| e == "log") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn fetch_since(
        &self,
        container: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<LogLine>, SourceError> {
        let path = self.path_for(container);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::ContainerNotFound(container.to_string()));
            }
            Err(e) => {
                return Err(SourceError::ReadFailed {
                    container: container.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let mut skipped = 0usize;
        let lines: Vec<LogLine> = content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| {
                let parsed = parse_line(l);
                if parsed.is_none() {
                    skipped += 1;
                }
                parsed
            })
            .filter(|l| since.is_none_or(|s| l.timestamp > s))
            .collect();

        if skipped > 0 {
            debug!(container, skipped, "Skipped log lines without a timestamp");
        }
        debug!(container, count = lines.len(), ?since, "Fetched log lines");
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_docker_json_records() {
        let line = parse_line(
            r#"{"log":"connection reset\n","stream":"stderr","time":"2026-03-04T05:06:07.123456789Z"}"#,
        )
        .unwrap();
        assert_eq!(line.stream, LogStream::Stderr);
        assert_eq!(line.message, "connection reset");
        assert_eq!(line.timestamp.timestamp_subsec_nanos(), 123_456_789);
    }

    #[test]
    fn parses_timestamped_lines() {
        let line = parse_line("2026-03-04T05:06:07+02:00 GET / 200").unwrap();
        assert_eq!(line.message, "GET / 200");
        assert_eq!(
            line.timestamp,
            Utc.with_ymd_and_hms(2026, 3, 4, 3, 6, 7).unwrap()
        );
    }

    #[test]
    fn lines_without_timestamps_are_rejected() {
        assert!(parse_line("plain text").is_none());
        assert!(parse_line("{not json at all").is_none());
    }

    #[tokio::test]
    async fn lists_and_filters_by_cursor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("web.log"),
            "2026-01-01T00:00:00Z one\ngarbage\n2026-01-01T00:00:01Z two\n2026-01-01T00:00:02Z three\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let source = FileLogSource::new(dir.path());

        assert_eq!(source.containers().await.unwrap(), vec!["web".to_string()]);
        assert_eq!(source.fetch_since("web", None).await.unwrap().len(), 3);

        let since = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 1).unwrap();
        let newer = source.fetch_since("web", Some(since)).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].message, "three");
    }

    #[tokio::test]
    async fn unknown_container_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileLogSource::new(dir.path());
        let err = source.fetch_since("ghost", None).await.unwrap_err();
        assert!(matches!(err, SourceError::ContainerNotFound(_)));
    }
}
