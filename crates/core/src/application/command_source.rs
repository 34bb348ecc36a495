//! Command Source
//!
//! Reads newline-terminated commands. A line ending in a backslash continues on the
//! next line: the backslash is dropped and the two lines are joined with nothing in
//! between. Blank lines are skipped. Every assembled line is posted to a
//! [`CommandSink`], followed by exactly one end-of-input signal.

use crate::domain::Command;
use crate::error::{AppError, Result};
use crate::port::CommandSink;
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read line {line}: {source}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("continuation starting at line {line} runs past end of input")]
    UnterminatedContinuation { line: usize },
}

/// Assembles commands from a line stream
pub struct CommandReader<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: AsyncBufRead + Unpin> CommandReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    /// Next assembled command, `None` at end of input
    ///
    /// # Errors
    /// - SourceError::UnterminatedContinuation if input ends right after a trailing backslash
    /// - SourceError::Io on any read failure (including invalid UTF-8)
    pub async fn next_command(&mut self) -> std::result::Result<Option<Command>, SourceError> {
        let mut buf = String::new();
        let mut continued_from: Option<usize> = None;

        loop {
            let next = self
                .lines
                .next_line()
                .await
                .map_err(|source| SourceError::Io {
                    line: self.line_no + 1,
                    source,
                })?;

            let Some(line) = next else {
                return match continued_from {
                    Some(line) => Err(SourceError::UnterminatedContinuation { line }),
                    None => Ok(None),
                };
            };
            self.line_no += 1;

            if let Some(head) = line.strip_suffix('\\') {
                continued_from.get_or_insert(self.line_no);
                buf.push_str(head);
                continue;
            }
            buf.push_str(&line);

            if buf.trim().is_empty() {
                buf.clear();
                continued_from = None;
                continue;
            }
            return Ok(Some(Command::new(buf)));
        }
    }
}

/// Post every command from `reader`, then signal end of input
///
/// Returns the number of commands posted.
pub async fn post_commands<R>(reader: R, sink: &dyn CommandSink) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut source = CommandReader::new(reader);
    let mut posted = 0;

    while let Some(command) = source.next_command().await? {
        let job_id = sink.submit(command).await?;
        debug!(job_id = %job_id, "Posted command");
        posted += 1;
    }

    sink.signal_end_of_input().await?;
    info!(posted, "Command source exhausted");
    Ok(posted)
}

/// Post the commands of a file
///
/// # Errors
/// - AppError::Config if the file cannot be opened
pub async fn post_command_file(path: &Path, sink: &dyn CommandSink) -> Result<usize> {
    let file = tokio::fs::File::open(path).await.map_err(|e| {
        AppError::Config(format!("failed to open {}: {}", path.display(), e))
    })?;
    info!(path = %path.display(), "Reading commands");
    post_commands(BufReader::new(file), sink).await
}
