//! Output Sink
//!
//! Collects the generated script and decides on close whether it is kept.

use crate::config::OutputConfig;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

/// Destination for generated SQL text
pub trait OutputSink: Send {
    fn open(&mut self) -> std::io::Result<()>;

    fn write_line(&mut self, text: &str);

    fn write_fmt(&mut self, args: fmt::Arguments<'_>);

    /// Finalize when `keep` is true, otherwise discard everything written
    fn close(&mut self, keep: bool) -> std::io::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
    /// Keeps the text in memory; read it back with [`Output::contents`]
    Memory,
}

/// Buffered sink: nothing reaches the target before `close(true)`
#[derive(Debug)]
pub struct Output {
    target: OutputTarget,
    buffer: String,
    kept: Option<String>,
}

impl Output {
    pub fn new(target: OutputTarget) -> Self {
        Self {
            target,
            buffer: String::new(),
            kept: None,
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        match &config.path {
            Some(path) => Self::new(OutputTarget::File(path.clone())),
            None => Self::new(OutputTarget::Stdout),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(OutputTarget::Memory)
    }

    /// Text kept by the last `close(true)` on a memory target
    pub fn contents(&self) -> Option<&str> {
        self.kept.as_deref()
    }
}

impl OutputSink for Output {
    fn open(&mut self) -> std::io::Result<()> {
        self.buffer.clear();
        self.kept = None;
        Ok(())
    }

    fn write_line(&mut self, text: &str) {
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) {
        // Writing into a String cannot fail
        let _ = fmt::Write::write_fmt(&mut self.buffer, args);
    }

    fn close(&mut self, keep: bool) -> std::io::Result<()> {
        let text = std::mem::take(&mut self.buffer);
        if !keep {
            debug!("Discarding {} bytes of output", text.len());
            return Ok(());
        }

        match &self.target {
            OutputTarget::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            OutputTarget::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, text.as_bytes())?;
                info!("Migration script written to {}", path.display());
            }
            OutputTarget::Memory => {
                self.kept = Some(text);
            }
        }
        Ok(())
    }
}
