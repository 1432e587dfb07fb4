//! Event Stream Parser (component B): decodes the backend's newline-delimited
//! JSON event stream into the last-observed `agent_message` text and
//! `thread_id`.
//!
//! Grounded on the byte-buffer-until-newline accumulation in
//! `tumf-agent-exec::run::stream_to_logs`, generalized here to additionally
//! attempt a `serde_json::from_slice` per line instead of only teeing the
//! bytes to a log file.

use std::io::{self, BufRead};

use serde::Deserialize;

use crate::config::MAX_EVENT_LINE_BYTES;
use crate::logger::Logger;

/// Polymorphic `item.text`: a string, a list of content parts, or some
/// other JSON value, normalized by [`AgentMessageText::normalize`].
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AgentMessageText {
    Str(String),
    List(Vec<serde_json::Value>),
    Other(serde_json::Value),
}

impl AgentMessageText {
    /// Normalise to a flat string: verbatim for `Str`, concatenation of
    /// string elements (in order, non-strings ignored) for `List`, empty
    /// for anything else.
    fn normalize(&self) -> String {
        match self {
            AgentMessageText::Str(s) => s.clone(),
            AgentMessageText::List(items) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(""),
            AgentMessageText::Other(_) => String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(rename = "type")]
    item_type: Option<String>,
    text: Option<AgentMessageText>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    event_type: String,
    thread_id: Option<String>,
    item: Option<Item>,
}

/// Result of parsing a full event stream: the last `agent_message` text
/// observed and the last `thread_id` observed, both empty when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStream {
    pub message: String,
    pub thread_id: String,
}

/// Consume `reader` line by line until EOF, returning the last-observed
/// message and thread id. Malformed lines are logged at WARN (with a
/// truncated excerpt) and skipped; they never abort the stream. Read
/// errors other than EOF are logged at WARN and terminate parsing early,
/// returning whatever had accumulated so far.
pub fn parse<R: io::Read>(reader: R, logger: &Logger) -> ParsedStream {
    let mut buf_reader = io::BufReader::new(reader);
    let mut result = ParsedStream::default();
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = read_capped_line(&mut buf_reader, &mut line);
        let n = match read {
            Ok(n) => n,
            Err(e) => {
                logger.warn(format!("event stream read error: {e}"));
                break;
            }
        };
        if n == 0 {
            break;
        }

        let trimmed = trim_bytes(&line);
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_slice::<Event>(trimmed) {
            Ok(event) => apply(event, &mut result, logger),
            Err(e) => {
                let excerpt = excerpt(trimmed);
                logger.warn(format!("malformed event line ({e}): {excerpt}"));
            }
        }
    }

    result
}

fn apply(event: Event, result: &mut ParsedStream, logger: &Logger) {
    match event.event_type.as_str() {
        "thread.started" => {
            if let Some(id) = event.thread_id {
                result.thread_id = id;
            }
        }
        "item.completed" => {
            if let Some(item) = event.item {
                if item.item_type.as_deref() == Some("agent_message") {
                    if let Some(text) = item.text {
                        let normalized = text.normalize();
                        if !normalized.is_empty() {
                            result.message = normalized;
                        }
                    }
                }
            }
        }
        other => {
            logger.info(format!("ignoring event type: {other}"));
        }
    }
}

/// Read one `\n`-terminated line, capped at [`MAX_EVENT_LINE_BYTES`]. Lines
/// longer than the cap are truncated in `buf` but the stream position still
/// advances past the real newline.
fn read_capped_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    let mut total = 0usize;
    loop {
        let available = match reader.fill_buf() {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(total);
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                if buf.len() < MAX_EVENT_LINE_BYTES {
                    let take = pos.min(MAX_EVENT_LINE_BYTES - buf.len());
                    buf.extend_from_slice(&available[..take]);
                }
                total += pos + 1;
                reader.consume(pos + 1);
                return Ok(total);
            }
            None => {
                let consumed = available.len();
                if buf.len() < MAX_EVENT_LINE_BYTES {
                    let take = consumed.min(MAX_EVENT_LINE_BYTES - buf.len());
                    buf.extend_from_slice(&available[..take]);
                }
                total += consumed;
                reader.consume(consumed);
            }
        }
    }
}

fn trim_bytes(b: &[u8]) -> &[u8] {
    let start = b.iter().position(|c| !c.is_ascii_whitespace()).unwrap_or(b.len());
    let end = b.iter().rposition(|c| !c.is_ascii_whitespace()).map_or(start, |p| p + 1);
    &b[start..end]
}

fn excerpt(line: &[u8]) -> String {
    const MAX: usize = 200;
    let s = String::from_utf8_lossy(line);
    if s.len() > MAX {
        format!("{}...", &s[..MAX])
    } else {
        s.into_owned()
    }
}
