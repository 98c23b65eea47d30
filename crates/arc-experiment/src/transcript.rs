//! Per-task transcript: an append-only, human-readable log of one run.
//!
//! The transcript is observational. A failed write is reported once through
//! `tracing` and the run carries on without it.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

/// Section-structured text log for one task, written through a buffered sink.
pub struct Transcript {
    writer: Box<dyn Write + Send>,
    failed: bool,
}

impl Transcript {
    /// Create (or truncate) a transcript file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create transcript {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }

    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            failed: false,
        }
    }

    /// A transcript that writes nowhere.
    pub fn discard() -> Self {
        Self::new(io::sink())
    }

    /// A banner line followed by an optional body.
    pub fn section(&mut self, title: &str, body: &str) {
        if body.is_empty() {
            self.write(&format!("\n========== {title} ==========\n"));
        } else {
            self.write(&format!("\n========== {title} ==========\n\n{body}\n"));
        }
    }

    pub fn line(&mut self, text: &str) {
        self.write(&format!("{text}\n"));
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            self.report_failure(e);
        }
    }

    fn write(&mut self, text: &str) {
        if self.failed {
            return;
        }
        if let Err(e) = self.writer.write_all(text.as_bytes()) {
            self.report_failure(e);
        }
    }

    fn report_failure(&mut self, error: io::Error) {
        if !self.failed {
            warn!(error = %error, "Transcript write failed, further output is dropped");
            self.failed = true;
        }
    }
}

impl Drop for Transcript {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    #[test]
    fn test_sections_and_lines() {
        let buffer = SharedBuffer::default();
        let mut transcript = Transcript::new(buffer.clone());
        transcript.section("Iteration 1", "prompt text");
        transcript.section("Task solved!", "");
        transcript.line("Score: 2");

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            text,
            "\n========== Iteration 1 ==========\n\nprompt text\n\n========== Task solved! ==========\nScore: 2\n"
        );
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let mut transcript = Transcript::new(BrokenWriter);
        transcript.line("first");
        transcript.line("second");
        assert!(transcript.failed);
    }

    #[test]
    fn test_create_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task.txt");
        {
            let mut transcript = Transcript::create(&path).unwrap();
            transcript.line("hello");
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }
}
