use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Split;
use std::path::Path;
use std::path::PathBuf;

use framework::exception;
use framework::exception::CoreRsResult;
use framework::exception::error_code::IO_ERROR;
use framework::fs::path_buf::PathBufExt;
use framework::json;
use framework::log_event;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::code::error_code::MALFORMED_EVENT;
use crate::event::Event;

const LOG_FILE_NAME: &str = "action-log.ndjson";

/// Append-only, line delimited json store of [`Event`]s.
///
/// Assumes a single writer process, each event is written with one append write.
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn open(dir: &Path) -> CoreRsResult<Self> {
        let dir = dir.to_path_buf().into_absolute_path()?.ensure_dir()?;
        Ok(Self {
            path: dir.join(LOG_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, event: &Event) -> CoreRsResult<()> {
        log_event!(
            level = event.console_level(),
            code = %event.code,
            origin = %event.origin,
            "{}",
            event.description
        );

        let mut line = json::to_json(event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| self.io_error("failed to open event log", err))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|err| self.io_error("failed to append event", err))?;
        file.sync_data()
            .await
            .map_err(|err| self.io_error("failed to flush event log", err))?;
        Ok(())
    }

    /// Reads every event from oldest to newest, malformed lines are skipped.
    pub fn read_all(&self) -> CoreRsResult<EventIterator> {
        let lines = if self.path.exists() {
            let file = File::open(&self.path).map_err(|err| self.io_error("failed to open event log", err))?;
            Some(BufReader::new(file).split(b'\n'))
        } else {
            None
        };
        Ok(EventIterator {
            lines,
            line_number: 0,
        })
    }

    fn io_error(&self, message: &str, err: std::io::Error) -> exception::Exception {
        exception!(
            code = IO_ERROR,
            message = format!("{message}, path={}", self.path.to_string_lossy()),
            source = err
        )
    }
}

pub struct EventIterator {
    lines: Option<Split<BufReader<File>>>,
    line_number: usize,
}

impl Iterator for EventIterator {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let lines = self.lines.as_mut()?;
        loop {
            let bytes = match lines.next()? {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(error_code = IO_ERROR, "stop reading event log, line={}, error={err}", self.line_number + 1);
                    self.lines = None;
                    return None;
                }
            };
            self.line_number += 1;
            // a torn write can leave a partial utf-8 sequence, only that line is lost
            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(err) => {
                    warn!(
                        error_code = MALFORMED_EVENT,
                        "skip malformed event, line={}, error={err}", self.line_number
                    );
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match json::from_json::<Event>(&line) {
                Ok(event) => return Some(event),
                Err(e) => warn!(
                    error_code = MALFORMED_EVENT,
                    "skip malformed event, line={}, error={}",
                    self.line_number,
                    e.root_cause().message
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Write;

    use chrono::DateTime;
    use chrono::TimeDelta;
    use serde_json::json;

    use super::EventLog;
    use crate::event::Event;

    fn events(count: usize) -> Vec<Event> {
        let start = DateTime::parse_from_rfc3339("2025-03-10T08:00:00-03:00").unwrap();
        (0..count)
            .map(|i| {
                Event::new(
                    start + TimeDelta::seconds(i as i64),
                    &format!("INFO_STEP_{i}"),
                    &format!("step {i}"),
                    "survey:answer",
                    json!({"national_id": format!("{i:011}"), "answers": [i, {"nested": true}]}),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn append_then_read_all() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        let events = events(5);
        for event in &events {
            log.append(event).await.unwrap();
        }

        let read: Vec<Event> = log.read_all().unwrap().collect();
        assert_eq!(read, events);
    }

    #[tokio::test]
    async fn skip_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        let events = events(3);
        log.append(&events[0]).await.unwrap();
        {
            let mut file = fs::OpenOptions::new().append(true).open(log.path()).unwrap();
            file.write_all(b"{\"timestamp\":\"not a date\",\"code\":\n\n").unwrap();
        }
        log.append(&events[1]).await.unwrap();
        log.append(&events[2]).await.unwrap();

        let read: Vec<Event> = log.read_all().unwrap().collect();
        assert_eq!(read.len(), 3);
        assert_eq!(read, events);
    }

    #[tokio::test]
    async fn skip_line_with_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        let events = events(3);
        log.append(&events[0]).await.unwrap();
        {
            let mut file = fs::OpenOptions::new().append(true).open(log.path()).unwrap();
            file.write_all(b"{\"code\":\"Jo\xC3\n").unwrap();
        }
        log.append(&events[1]).await.unwrap();
        log.append(&events[2]).await.unwrap();

        let codes: Vec<String> = log.read_all().unwrap().map(|event| event.code).collect();
        assert_eq!(codes, vec!["INFO_STEP_0", "INFO_STEP_1", "INFO_STEP_2"]);
    }

    #[test]
    fn create_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs/nested");
        let log = EventLog::open(&log_dir).unwrap();
        assert!(log_dir.is_dir());
        assert_eq!(log.read_all().unwrap().count(), 0);
    }

    #[tokio::test]
    async fn append_to_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path()).unwrap();
        fs::create_dir(log.path()).unwrap();

        let result = log.append(&events(1)[0]).await;
        assert!(result.is_err());
    }
}
