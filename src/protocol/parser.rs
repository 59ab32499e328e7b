//! Incremental Frame Parser
//!
//! This module parses requests and responses out of a byte buffer that may
//! hold only part of a message. TCP delivers a stream, so a single read can
//! end anywhere: in the middle of a length line, inside a part, or between
//! two messages.
//!
//! ## How the Parser Works
//!
//! The parser reads from a buffer and returns either:
//! - `Ok(Some((message, consumed)))` - A complete message, `consumed` bytes were used
//! - `Ok(None)` - Need more data, the message is incomplete
//! - `Err(ParseError)` - Invalid framing
//!
//! The caller appends incoming network data to its buffer, calls the parser,
//! and on success advances the buffer by `consumed` bytes. Nothing is
//! consumed until a whole message is available, so retrying after a short
//! read is always safe.

use crate::protocol::types::{Request, Response, Status, CRLF};
use std::num::ParseIntError;
use thiserror::Error;

/// Errors that can occur while parsing a frame.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// A request declared zero parts, or carried an empty command name
    #[error("empty command")]
    EmptyCommand,

    /// A part-count line is not a non-negative integer
    #[error("invalid part count: {0}")]
    InvalidCount(String),

    /// A part-length line is not a non-negative integer
    #[error("invalid part length: {0}")]
    InvalidLength(String),

    /// Response status is neither OK nor ERR
    #[error("response status must be OK or ERR, got '{0}'")]
    UnknownStatus(String),

    /// A header line or a part is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// A declared part exceeds the allowed size
    #[error("part too large: {size} bytes (max: {max})")]
    PartTooLarge { size: usize, max: usize },

    /// The input ended before a declared part was fully read
    #[error("unexpected end of stream inside a frame")]
    UnexpectedEof,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single part (512 MB)
pub const MAX_PART_SIZE: usize = 512 * 1024 * 1024;

/// Parser for requests and responses.
///
/// # Example
///
/// ```
/// use linekv::protocol::FrameParser;
///
/// let parser = FrameParser::new();
/// let (request, consumed) = parser
///     .parse_request(b"2\r\n5\r\nGET\r\n6\r\nname\r\n")
///     .unwrap()
///     .unwrap();
/// assert_eq!(request.command, "GET");
/// assert_eq!(consumed, 20);
/// ```
#[derive(Debug, Clone)]
pub struct FrameParser {
    /// Upper bound on a single declared part length
    max_part_size: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Creates a parser with the default part size limit.
    pub fn new() -> Self {
        Self {
            max_part_size: MAX_PART_SIZE,
        }
    }

    /// Creates a parser with a custom part size limit.
    pub fn with_max_part_size(max_part_size: usize) -> Self {
        Self { max_part_size }
    }

    /// Attempts to parse one request from the front of `buf`.
    pub fn parse_request(&self, buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
        let (count, mut consumed) = match read_line(buf)? {
            Some((line, used)) => (parse_count(line)?, used),
            None => return Ok(None),
        };

        if count == 0 {
            return Err(ParseError::EmptyCommand);
        }

        let mut parts = match self.read_parts(&buf[consumed..], count)? {
            Some((parts, used)) => {
                consumed += used;
                parts
            }
            None => return Ok(None),
        };

        let args = parts.split_off(1);
        let command = parts.pop().unwrap_or_default();
        if command.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        Ok(Some((Request { command, args }, consumed)))
    }

    /// Attempts to parse one response from the front of `buf`.
    pub fn parse_response(&self, buf: &[u8]) -> ParseResult<Option<(Response, usize)>> {
        let (status, mut consumed) = match read_line(buf)? {
            Some((line, used)) => (line.parse::<Status>()?, used),
            None => return Ok(None),
        };

        let count = match read_line(&buf[consumed..])? {
            Some((line, used)) => {
                consumed += used;
                parse_count(line)?
            }
            None => return Ok(None),
        };

        match self.read_parts(&buf[consumed..], count)? {
            Some((values, used)) => Ok(Some((Response::new(status, values), consumed + used))),
            None => Ok(None),
        }
    }

    /// Reads `count` length-prefixed parts.
    fn read_parts(&self, buf: &[u8], count: usize) -> ParseResult<Option<(Vec<String>, usize)>> {
        // Cap the preallocation; the count comes straight off the wire
        let mut parts = Vec::with_capacity(count.min(64));
        let mut consumed = 0;

        for _ in 0..count {
            match self.read_part(&buf[consumed..])? {
                Some((part, used)) => {
                    parts.push(part);
                    consumed += used;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((parts, consumed)))
    }

    /// Reads a single part: `<len>\r\n<payload>\r\n` where `len` covers the
    /// payload and its trailing CRLF.
    fn read_part(&self, buf: &[u8]) -> ParseResult<Option<(String, usize)>> {
        let (length, header) = match read_line(buf)? {
            Some((line, used)) => (parse_length(line)?, used),
            None => return Ok(None),
        };

        if length > self.max_part_size {
            return Err(ParseError::PartTooLarge {
                size: length,
                max: self.max_part_size,
            });
        }

        let total = header + length;
        if buf.len() < total {
            return Ok(None);
        }

        let mut payload = &buf[header..total];
        if payload.ends_with(CRLF) {
            payload = &payload[..payload.len() - CRLF.len()];
        }

        let part = std::str::from_utf8(payload)
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?
            .to_string();

        Ok(Some((part, total)))
    }
}

/// Reads one header line terminated by `\n`, trimmed of surrounding
/// whitespace (including the `\r`).
fn read_line(buf: &[u8]) -> ParseResult<Option<(&str, usize)>> {
    match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => {
            let line = std::str::from_utf8(&buf[..pos])
                .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
            Ok(Some((line.trim(), pos + 1)))
        }
        None => Ok(None),
    }
}

fn parse_count(line: &str) -> ParseResult<usize> {
    line.parse()
        .map_err(|e: ParseIntError| ParseError::InvalidCount(format!("'{}': {}", line, e)))
}

fn parse_length(line: &str) -> ParseResult<usize> {
    line.parse()
        .map_err(|e: ParseIntError| ParseError::InvalidLength(format!("'{}': {}", line, e)))
}

/// Parses a single request with the default parser.
pub fn parse_request(buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
    FrameParser::new().parse_request(buf)
}

/// Parses a single response with the default parser.
pub fn parse_response(buf: &[u8]) -> ParseResult<Option<(Response, usize)>> {
    FrameParser::new().parse_response(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let input = b"3\r\n5\r\nSET\r\n6\r\nname\r\n6\r\nAriz\r\n";
        let (req, consumed) = parse_request(input).unwrap().unwrap();
        assert_eq!(req, Request::new("SET", ["name", "Ariz"]).unwrap());
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_request_without_args() {
        let (req, consumed) = parse_request(b"1\r\n6\r\nPING\r\n").unwrap().unwrap();
        assert_eq!(req.command, "PING");
        assert!(req.args.is_empty());
        assert_eq!(consumed, 12);
    }

    #[test]
    fn test_parse_request_incomplete() {
        let input = b"2\r\n5\r\nGET\r\n6\r\nname\r\n";
        // Every proper prefix is incomplete, never an error
        for end in 0..input.len() {
            assert!(
                parse_request(&input[..end]).unwrap().is_none(),
                "prefix of {} bytes should be incomplete",
                end
            );
        }
        assert!(parse_request(input).unwrap().is_some());
    }

    #[test]
    fn test_parse_leaves_trailing_message() {
        let mut input = b"1\r\n6\r\nPING\r\n".to_vec();
        input.extend_from_slice(b"2\r\n5\r\nGET\r\n3\r\nk\r\n");

        let (first, consumed) = parse_request(&input).unwrap().unwrap();
        assert_eq!(first.command, "PING");

        let (second, _) = parse_request(&input[consumed..]).unwrap().unwrap();
        assert_eq!(second, Request::new("GET", ["k"]).unwrap());
    }

    #[test]
    fn test_parse_zero_parts_is_empty_command() {
        assert_eq!(parse_request(b"0\r\n"), Err(ParseError::EmptyCommand));
    }

    #[test]
    fn test_parse_invalid_count() {
        let result = parse_request(b"two\r\n");
        assert!(matches!(result, Err(ParseError::InvalidCount(_))));

        let result = parse_request(b"-1\r\n");
        assert!(matches!(result, Err(ParseError::InvalidCount(_))));
    }

    #[test]
    fn test_parse_invalid_length() {
        let result = parse_request(b"1\r\nsix\r\nPING\r\n");
        assert!(matches!(result, Err(ParseError::InvalidLength(_))));
    }

    #[test]
    fn test_part_too_large() {
        let parser = FrameParser::with_max_part_size(4);
        let result = parser.parse_request(b"1\r\n6\r\nPING\r\n");
        assert_eq!(result, Err(ParseError::PartTooLarge { size: 6, max: 4 }));
    }

    #[test]
    fn test_tolerates_bare_newlines() {
        let (req, _) = parse_request(b"2\n5\nGET\r\n3\r\nk\r\n").unwrap().unwrap();
        assert_eq!(req, Request::new("GET", ["k"]).unwrap());
    }

    #[test]
    fn test_parse_utf8_part() {
        let input = "3\r\n6\r\nHSET\r\n3\r\nh\r\n8\r\n世界\r\n";
        let (req, _) = parse_request(input.as_bytes()).unwrap().unwrap();
        assert_eq!(req.args, vec!["h", "世界"]);
    }

    #[test]
    fn test_parse_response() {
        let input = b"OK\r\n2\r\n3\r\n1\r\n5\r\n\"a\"\r\n";
        let (resp, consumed) = parse_response(input).unwrap().unwrap();
        assert_eq!(resp.status, Status::Ok);
        assert_eq!(resp.values, vec!["1", "\"a\""]);
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_parse_response_unknown_status() {
        let result = parse_response(b"MAYBE\r\n0\r\n");
        assert!(matches!(result, Err(ParseError::UnknownStatus(_))));
    }

    #[test]
    fn test_parse_response_incomplete() {
        assert!(parse_response(b"ERR\r\n1\r\n10\r\nERR bo").unwrap().is_none());
        assert!(parse_response(b"ERR\r\n").unwrap().is_none());
    }

    #[test]
    fn test_roundtrip() {
        let request = Request::new("RPUSH", ["list", "a b", "", "{\"x\":1}"]).unwrap();
        let (parsed, _) = parse_request(&request.encode()).unwrap().unwrap();
        assert_eq!(parsed, request);

        let response = Response::error("WRONGTYPE Operation against a key");
        let (parsed, _) = parse_response(&response.encode()).unwrap().unwrap();
        assert_eq!(parsed, response);
    }
}
