/// Streaming parser for Go's `-coverprofile` format.
///
/// Reference: https://go.dev/blog/cover
///
/// Format:
///   mode: set|count|atomic
///   <file>:<startLine>.<startCol>,<endLine>.<endCol> <numStatements> <count>
///
/// The same statement id may appear several times in one profile when
/// `-coverpkg` makes overlapping test binaries instrument a shared package.
/// The parser does not merge anything; it yields every statement line as a
/// record and leaves deduplication to the aggregator.
use std::io::BufRead;

use tracing::{debug, info};

use crate::error::{CovtrendError, Result};
use crate::model::{CoverMode, StatementRecord};

/// The kinds of line a profile can contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Mode(CoverMode),
    Statement(StatementRecord),
    /// Blank lines, unknown mode tokens and anything else; skipped.
    Unrecognized,
}

/// Classify a single profile line. Never fails.
pub fn classify_line(line: &str) -> Line {
    let line = line.trim_end_matches(['\n', '\r']);

    if let Some(record) = parse_statement(line) {
        return Line::Statement(record);
    }

    if let Some(rest) = line.trim_start().strip_prefix("mode:") {
        if let Some(mode) = rest.split_whitespace().next().and_then(CoverMode::from_token) {
            return Line::Mode(mode);
        }
    }

    Line::Unrecognized
}

/// Parse `<id> <stmtCount> <hitCount>`. The id is everything before the
/// last two space-separated fields and is otherwise opaque.
fn parse_statement(line: &str) -> Option<StatementRecord> {
    let mut fields = line.rsplitn(3, ' ');
    let hits = fields.next()?;
    let stmts = fields.next()?;
    let id = fields.next()?;

    if id.is_empty() || !is_digits(stmts) || !is_digits(hits) {
        return None;
    }

    Some(StatementRecord {
        id: id.to_string(),
        stmt_count: stmts.parse().ok()?,
        hit_count: hits.parse().ok()?,
    })
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Single-pass iterator over the statement records of a profile.
///
/// The coverage mode becomes known as soon as its declaration line has been
/// read; query it with [`ProfileReader::mode`] after the iterator is drained.
pub struct ProfileReader<R> {
    reader: R,
    buf: Vec<u8>,
    mode: Option<CoverMode>,
    line_number: usize,
    done: bool,
}

impl<R: BufRead> ProfileReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            mode: None,
            line_number: 0,
            done: false,
        }
    }

    /// The first declared mode, or the default when none has been seen.
    pub fn mode(&self) -> CoverMode {
        self.mode.unwrap_or_default()
    }

    /// The first declared mode, if any.
    pub fn declared_mode(&self) -> Option<CoverMode> {
        self.mode
    }
}

impl<R: BufRead> Iterator for ProfileReader<R> {
    type Item = Result<StatementRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            let n = match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Some(Err(CovtrendError::Format(format!(
                        "failed to read coverage profile after line {}: {e}",
                        self.line_number
                    ))));
                }
            };
            if n == 0 {
                self.done = true;
                break;
            }
            self.line_number += 1;

            // Undecodable bytes become U+FFFD instead of ending the stream.
            let line = String::from_utf8_lossy(&self.buf);
            match classify_line(&line) {
                Line::Statement(record) => return Some(Ok(record)),
                Line::Mode(mode) => {
                    if self.mode.is_none() {
                        info!("Mode: {mode}");
                        self.mode = Some(mode);
                    }
                }
                Line::Unrecognized => {
                    if !line.trim().is_empty() {
                        debug!(line = self.line_number, "skipping unrecognized profile line");
                    }
                }
            }
        }
        None
    }
}

/// Parse a whole profile held in memory, returning its mode and records.
pub fn parse(input: &[u8]) -> Result<(CoverMode, Vec<StatementRecord>)> {
    let mut reader = ProfileReader::new(input);
    let records = reader.by_ref().collect::<Result<Vec<_>>>()?;
    Ok((reader.mode(), records))
}
