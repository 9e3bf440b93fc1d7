//! Append-only transcript log file.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes finalized caption lines to a plain-text log, one per line with a
/// local wall-clock timestamp. Preview text never reaches the log.
pub struct TranscriptLog {
    file: File,
    path: PathBuf,
}

impl TranscriptLog {
    /// Open (or create) the log at `path`, appending to existing content.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file, path })
    }

    /// Append one finalized line. Empty text is skipped.
    pub fn append(&mut self, text: &str) -> crate::Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.file, "[{stamp}] {text}")?;
        self.file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_skip_empty() {
        let dir = std::env::temp_dir().join(format!("livecap-log-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("transcriptions.txt");

        let mut log = TranscriptLog::open(&path).unwrap();
        log.append("hello world.").unwrap();
        log.append("   ").unwrap();
        log.append("second line.").unwrap();
        drop(log);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("hello world."));
        assert!(lines[1].ends_with("second line."));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
