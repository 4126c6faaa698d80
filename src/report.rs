use crate::collectors::runner::RunError;
use crate::collectors::ExecutionResult;
use chrono::{DateTime, Utc};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to open output file {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write log: {0}")]
    Write(#[from] std::io::Error),
}

/// ISO-8601 basic format, second precision, no colons so records split cleanly.
pub fn run_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    File { path: PathBuf, create_dir: bool },
}

impl Output {
    pub fn resolve(arg: Option<&str>, output_dir: &Path, timestamp: &str) -> Self {
        match arg {
            Some("-") => Output::Stdout,
            Some(path) => Output::File {
                path: PathBuf::from(path),
                create_dir: false,
            },
            None => Output::File {
                path: output_dir.join(format!("{timestamp}.log")),
                create_dir: true,
            },
        }
    }

    pub fn open(&self) -> Result<Box<dyn Write>, ReportError> {
        match self {
            Output::Stdout => Ok(Box::new(BufWriter::new(io::stdout()))),
            Output::File { path, create_dir } => {
                if *create_dir {
                    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                        fs::create_dir_all(dir).map_err(|source| ReportError::CreateDir {
                            path: dir.display().to_string(),
                            source,
                        })?;
                    }
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| ReportError::Open {
                        path: path.display().to_string(),
                        source,
                    })?;
                Ok(Box::new(BufWriter::new(file)))
            }
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Stdout => f.write_str("<stdout>"),
            Output::File { path, .. } => write!(f, "{}", path.display()),
        }
    }
}

pub struct LogWriter<W: Write> {
    out: W,
    timestamp: String,
}

impl<W: Write> LogWriter<W> {
    pub fn new(out: W, timestamp: impl Into<String>) -> Self {
        Self {
            out,
            timestamp: timestamp.into(),
        }
    }

    pub fn write_result(&mut self, result: &ExecutionResult) -> Result<(), ReportError> {
        let prefix = format!(
            "{}:{}:{}",
            result.host_label(),
            self.timestamp,
            result.command_token()
        );
        writeln!(self.out, "{prefix}:cmd:{}", result.command)?;
        writeln!(self.out, "{prefix}:ret:{}", result.exit_code)?;
        for line in result.stdout.lines() {
            writeln!(self.out, "{prefix}:out:{line}")?;
        }
        for line in result.stderr.lines() {
            writeln!(self.out, "{prefix}:err:{line}")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ReportError> {
        self.out.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Console feedback on stderr; separate from the log so `-o -` stays clean.
pub struct Progress<W: Write> {
    out: W,
    verbosity: u8,
    dots: bool,
}

impl<W: Write> Progress<W> {
    pub fn new(out: W, verbosity: u8) -> Self {
        Self {
            out,
            verbosity,
            dots: false,
        }
    }

    pub fn completed(&mut self, result: &ExecutionResult) {
        match self.verbosity {
            0 => {}
            1 => {
                let _ = write!(self.out, ".");
                let _ = self.out.flush();
                self.dots = true;
            }
            _ => {
                let _ = writeln!(
                    self.out,
                    "{}: [{}] {}",
                    result.host_label(),
                    result.exit_code,
                    result.command
                );
            }
        }
    }

    pub fn failed(&mut self, host: &str, err: &RunError) {
        self.end_dots();
        let _ = writeln!(self.out, "ERROR {host}: {err}");
    }

    pub fn finish(&mut self, output: &Output) {
        if self.verbosity == 0 {
            return;
        }
        self.end_dots();
        let _ = writeln!(self.out, "output written to {output}");
    }

    fn end_dots(&mut self) {
        if self.dots {
            let _ = writeln!(self.out);
            self.dots = false;
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}
