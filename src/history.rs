//! Append-only command history.
//!
//! The log is a plain UTF-8 text file, one entry per line:
//!
//! ```text
//! [2024-03-01 09:30:00] REQUEST: list large files
//! [2024-03-01 09:30:04] COMMAND: du -ah . | sort -rh | head
//! [2024-03-01 09:30:05] RESULT: success
//! ```
//!
//! Nothing is cached between calls. Every [`HistoryStore::tail`] re-reads the
//! file, so entries written earlier in the same session are always visible to
//! the next prompt.

use crate::error::HearthError;
use crate::providers::{SystemTimeProvider, TimeProvider};
use chrono::NaiveDateTime;
use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Timestamp layout used in every log line.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header written once when the log is created.
pub const HEADER: &str = "# hearth command history (append-only)\n\
# format: [YYYY-MM-DD HH:MM:SS] KIND: content\n";

/// The four entry tags the log understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Request,
    Command,
    Result,
    Skip,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Request => "REQUEST",
            EntryKind::Command => "COMMAND",
            EntryKind::Result => "RESULT",
            EntryKind::Skip => "SKIP",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "REQUEST" => Some(EntryKind::Request),
            "COMMAND" => Some(EntryKind::Command),
            "RESULT" => Some(EntryKind::Result),
            "SKIP" => Some(EntryKind::Skip),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log line, typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: NaiveDateTime,
    pub kind: EntryKind,
    pub content: String,
}

impl HistoryEntry {
    /// Formats the entry as it appears on disk (without the trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.kind,
            single_line(&self.content)
        )
    }

    /// Parses a log line. Header comments and malformed lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (stamp, rest) = rest.split_once("] ")?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        let (tag, content) = rest.split_once(':')?;
        let kind = EntryKind::from_tag(tag)?;
        Some(Self {
            timestamp,
            kind,
            content: content.strip_prefix(' ').unwrap_or(content).to_string(),
        })
    }
}

/// Replaces line breaks so one entry always occupies one line.
fn single_line(content: &str) -> String {
    content.replace(['\r', '\n'], " ")
}

/// Collapses every run of whitespace (including newlines) into one space.
///
/// Callers use this on operator input before handing it to
/// [`HistoryStore::append`].
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Owner of the append-only history log.
pub struct HistoryStore {
    path: PathBuf,
    time_provider: Box<dyn TimeProvider>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_time_provider(path, Box::new(SystemTimeProvider))
    }

    /// Creates a store with a custom time provider (for testing).
    pub fn with_time_provider(path: impl Into<PathBuf>, time_provider: Box<dyn TimeProvider>) -> Self {
        Self {
            path: path.into(),
            time_provider,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the log and its parent directories if they are missing.
    ///
    /// Calling this on an existing log leaves it untouched.
    pub fn ensure(&self) -> Result<(), HearthError> {
        if self.path.exists() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| HearthError::storage(parent, e))?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(mut file) => {
                file.write_all(HEADER.as_bytes())
                    .and_then(|()| file.sync_all())
                    .map_err(|e| HearthError::storage(&self.path, e))?;
                info!("Created history log at {}", self.path.display());
                Ok(())
            }
            // Lost a creation race; the header is already there.
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(HearthError::storage(&self.path, e)),
        }
    }

    /// Appends one entry and syncs it to disk before returning.
    ///
    /// A log removed since startup is recreated with its header first.
    pub fn append(&self, kind: EntryKind, content: &str) -> Result<HistoryEntry, HearthError> {
        self.ensure()?;

        let entry = HistoryEntry {
            timestamp: self.time_provider.now(),
            kind,
            content: single_line(content),
        };

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| HearthError::storage(&self.path, e))?;

        let mut line = entry.to_line();
        line.push('\n');
        file.write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
            .map_err(|e| HearthError::storage(&self.path, e))?;

        debug!("Appended {} entry to history", kind);
        Ok(entry)
    }

    /// Returns the last `max_lines` raw lines, oldest first.
    ///
    /// A missing log is treated as empty. Only the window is held in memory,
    /// and bytes that are not valid UTF-8 are replaced rather than rejected.
    pub fn tail(&self, max_lines: usize) -> Result<Vec<String>, HearthError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HearthError::storage(&self.path, e)),
        };

        let mut reader = BufReader::new(file);
        let mut window = VecDeque::with_capacity(max_lines.min(1024));
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| HearthError::storage(&self.path, e))?;
            if read == 0 {
                break;
            }
            if max_lines == 0 {
                continue;
            }

            let raw = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if window.len() == max_lines {
                window.pop_front();
            }
            window.push_back(String::from_utf8_lossy(raw).into_owned());
        }

        Ok(window.into())
    }

    /// Returns the last `max_entries` parsed entries, skipping the header.
    pub fn recent_entries(&self, max_entries: usize) -> Result<Vec<HistoryEntry>, HearthError> {
        let entries: Vec<HistoryEntry> = self
            .tail(usize::MAX)?
            .iter()
            .filter_map(|line| HistoryEntry::parse(line))
            .collect();
        let start = entries.len().saturating_sub(max_entries);
        Ok(entries[start..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::FixedTimeProvider;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn fixed_instant() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn test_store(dir: &TempDir) -> HistoryStore {
        HistoryStore::with_time_provider(
            dir.path().join("journal").join("command_history.log"),
            Box::new(FixedTimeProvider(fixed_instant())),
        )
    }

    #[test]
    fn test_ensure_creates_directory_and_header() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        store.ensure().unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, HEADER);
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_ensure_twice_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        store.ensure().unwrap();
        let once = fs::read(store.path()).unwrap();
        store.ensure().unwrap();
        let twice = fs::read(store.path()).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_ensure_does_not_touch_existing_entries() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.ensure().unwrap();
        store.append(EntryKind::Request, "list files").unwrap();
        let before = fs::read(store.path()).unwrap();

        store.ensure().unwrap();

        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_append_formats_line() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.ensure().unwrap();

        store.append(EntryKind::Command, "ls -la").unwrap();

        let lines = store.tail(1).unwrap();
        assert_eq!(lines, vec!["[2024-03-01 09:30:00] COMMAND: ls -la".to_string()]);
    }

    #[test]
    fn test_append_replaces_newlines() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.ensure().unwrap();

        let entry = store.append(EntryKind::Request, "first\nsecond\r\nthird").unwrap();

        assert_eq!(entry.content, "first second  third");
        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_append_keeps_prefix_stable() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.ensure().unwrap();

        let mut previous = fs::read_to_string(store.path()).unwrap();
        for i in 0..5 {
            store.append(EntryKind::Request, &format!("request {}", i)).unwrap();
            let current = fs::read_to_string(store.path()).unwrap();
            assert!(current.starts_with(&previous));
            assert_eq!(current.lines().count(), previous.lines().count() + 1);
            previous = current;
        }
    }

    #[test]
    fn test_tail_of_missing_log_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        assert!(store.tail(400).unwrap().is_empty());
    }

    #[test]
    fn test_tail_returns_newest_lines_oldest_first() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.ensure().unwrap();
        for i in 0..10 {
            store.append(EntryKind::Request, &format!("request {}", i)).unwrap();
        }

        let lines = store.tail(3).unwrap();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("request 7"));
        assert!(lines[2].ends_with("request 9"));
    }

    #[test]
    fn test_tail_larger_than_log_includes_header() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.ensure().unwrap();
        store.append(EntryKind::Skip, "rm -rf build").unwrap();

        let lines = store.tail(400).unwrap();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('#'));
    }

    #[test]
    fn test_parse_roundtrips_formatted_line() {
        let entry = HistoryEntry {
            timestamp: fixed_instant(),
            kind: EntryKind::Result,
            content: "failure (exit 3)".to_string(),
        };

        assert_eq!(HistoryEntry::parse(&entry.to_line()), Some(entry));
    }

    #[test]
    fn test_parse_keeps_colons_in_content() {
        let parsed = HistoryEntry::parse("[2024-03-01 09:30:00] COMMAND: echo a:b").unwrap();
        assert_eq!(parsed.kind, EntryKind::Command);
        assert_eq!(parsed.content, "echo a:b");
    }

    #[test]
    fn test_parse_rejects_header_and_garbage() {
        assert!(HistoryEntry::parse("# hearth command history (append-only)").is_none());
        assert!(HistoryEntry::parse("[not a date] REQUEST: x").is_none());
        assert!(HistoryEntry::parse("[2024-03-01 09:30:00] UNKNOWN: x").is_none());
        assert!(HistoryEntry::parse("").is_none());
    }

    #[test]
    fn test_recent_entries_skips_header() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.ensure().unwrap();
        store.append(EntryKind::Request, "show disk usage").unwrap();
        store.append(EntryKind::Skip, "df -h").unwrap();

        let entries = store.recent_entries(20).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, EntryKind::Request);
        assert_eq!(entries[1].kind, EntryKind::Skip);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  list\n\tbig   files \n"), "list big files");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_append_recreates_deleted_log_with_header() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.ensure().unwrap();
        store.append(EntryKind::Request, "first").unwrap();
        fs::remove_file(store.path()).unwrap();

        store.append(EntryKind::Request, "second").unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with(HEADER));
        assert_eq!(content.lines().count(), 3);
        assert!(content.ends_with("REQUEST: second\n"));
    }

    #[test]
    fn test_tail_tolerates_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.ensure().unwrap();
        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        file.write_all(b"[2024-03-01 09:30:00] REQUEST: caf\xe9\n").unwrap();
        store.append(EntryKind::Skip, "ls").unwrap();

        let lines = store.tail(2).unwrap();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[2024-03-01 09:30:00] REQUEST: caf"));
        assert!(lines[0].ends_with('\u{FFFD}'));
        assert_eq!(lines[1], "[2024-03-01 09:30:00] SKIP: ls");
    }

    #[test]
    fn test_tail_strips_crlf_and_handles_zero_window() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        store.ensure().unwrap();
        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        file.write_all(b"[2024-03-01 09:30:00] COMMAND: pwd\r\n").unwrap();

        assert_eq!(store.tail(1).unwrap(), vec!["[2024-03-01 09:30:00] COMMAND: pwd".to_string()]);
        assert!(store.tail(0).unwrap().is_empty());
    }
}
