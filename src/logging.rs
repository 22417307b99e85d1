//! Per-run log sink
//!
//! A [`RunLog`] collects the milestones of one pipeline run in a
//! timestamped text file (or any writer) and forwards every line to the
//! `log` facade, so `RUST_LOG` still controls what reaches the console.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::AuxeticResult;

/// Severity of a run-log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl RunLevel {
    fn label(self) -> &'static str {
        match self {
            RunLevel::Debug => "DEBUG",
            RunLevel::Info => "INFO",
            RunLevel::Warn => "WARNING",
            RunLevel::Error => "ERROR",
        }
    }
}

/// Caller-owned log for one run
pub struct RunLog {
    sink: Option<Box<dyn Write>>,
    path: Option<PathBuf>,
    lines: usize,
}

impl RunLog {
    /// Log into `path`, creating parent folders as needed
    pub fn to_file(path: impl AsRef<Path>) -> AuxeticResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            sink: Some(Box::new(BufWriter::new(file))),
            path: Some(path.to_path_buf()),
            lines: 0,
        })
    }

    pub fn to_writer(writer: impl Write + 'static) -> Self {
        Self {
            sink: Some(Box::new(writer)),
            path: None,
            lines: 0,
        }
    }

    /// Only forwards to `log`
    pub fn disabled() -> Self {
        Self {
            sink: None,
            path: None,
            lines: 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of lines written so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn record(&mut self, level: RunLevel, message: &str) -> io::Result<()> {
        match level {
            RunLevel::Debug => log::debug!("{}", message),
            RunLevel::Info => log::info!("{}", message),
            RunLevel::Warn => log::warn!("{}", message),
            RunLevel::Error => log::error!("{}", message),
        }
        if let Some(sink) = self.sink.as_mut() {
            writeln!(
                sink,
                "{} {:<7} {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                level.label(),
                message
            )?;
        }
        self.lines += 1;
        Ok(())
    }

    pub fn info(&mut self, message: &str) -> io::Result<()> {
        self.record(RunLevel::Info, message)
    }

    pub fn debug(&mut self, message: &str) -> io::Result<()> {
        self.record(RunLevel::Debug, message)
    }

    pub fn warn(&mut self, message: &str) -> io::Result<()> {
        self.record(RunLevel::Warn, message)
    }

    pub fn error(&mut self, message: &str) -> io::Result<()> {
        self.record(RunLevel::Error, message)
    }

    /// Flush and close the sink
    pub fn finish(&mut self) -> io::Result<()> {
        if let Some(mut sink) = self.sink.take() {
            sink.flush()?;
        }
        Ok(())
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            let _ = sink.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_log_is_timestamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");
        let mut run_log = RunLog::to_file(&path).unwrap();
        run_log.info("Assembled structure").unwrap();
        run_log.warn("Assembly was not empty").unwrap();
        run_log.finish().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("INFO") && lines[0].ends_with("Assembled structure"));
        assert!(lines[1].contains("WARNING"));
        // date prefix
        assert_eq!(lines[0].as_bytes()[4], b'-');
    }

    #[test]
    fn test_disabled_log_counts_lines() {
        let mut run_log = RunLog::disabled();
        run_log.debug("nothing written").unwrap();
        assert_eq!(run_log.lines(), 1);
        assert!(run_log.path().is_none());
        run_log.finish().unwrap();
    }
}
