//! Quote sources.
//!
//! The engine never fetches data itself; a driver pulls raw quotes from a
//! [`QuoteSource`] and hands the normalized snapshots to the engine.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use market::RawQuote;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed quote: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("quote fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("quote source exhausted")]
    Exhausted,
}

#[async_trait]
pub trait QuoteSource: Send {
    /// Fetch the next raw quote.
    async fn fetch(&mut self) -> Result<RawQuote, SourceError>;
}

/// Re-reads a single JSON quote file on every fetch.
///
/// Suits a feed that overwrites one "latest quote" file in place.
pub struct FileQuoteSource {
    path: PathBuf,
}

impl FileQuoteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QuoteSource for FileQuoteSource {
    #[instrument(skip(self), fields(path = %self.path.display()), level = "debug")]
    async fn fetch(&mut self) -> Result<RawQuote, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let quote: RawQuote = serde_json::from_str(raw.trim())?;

        debug!(ts_ms = ?quote.ts_ms, "quote file read");
        Ok(quote)
    }
}

/// Yields the lines of a JSON-lines file, one quote per fetch.
///
/// Blank lines are skipped. A malformed line is reported once and then
/// skipped on the next fetch.
pub struct JsonLinesSource {
    lines: VecDeque<(usize, String)>,
}

impl JsonLinesSource {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let raw = tokio::fs::read_to_string(path.into()).await?;
        Ok(Self::from_text(&raw))
    }

    pub fn from_text(raw: &str) -> Self {
        let lines = raw
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| (i + 1, l.to_string()))
            .collect();

        Self { lines }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

#[async_trait]
impl QuoteSource for JsonLinesSource {
    async fn fetch(&mut self) -> Result<RawQuote, SourceError> {
        let (line_no, line) = self.lines.pop_front().ok_or(SourceError::Exhausted)?;

        serde_json::from_str(&line).map_err(|e| {
            debug!(line = line_no, error = %e, "skipping malformed quote line");
            SourceError::Decode(e)
        })
    }
}
