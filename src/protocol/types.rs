//! Request and Response Messages
//!
//! This module defines the two message shapes exchanged over the wire and
//! their serialization. Both directions share the same part framing: every
//! part is preceded by a line holding its length, and is followed by CRLF.
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  <N = args + 1>\r\n <len(cmd)+2>\r\n <cmd>\r\n { <len(arg)+2>\r\n <arg>\r\n }
//! Response: <OK|ERR>\r\n <N>\r\n { <len(part)+2>\r\n <part>\r\n }
//! ```
//!
//! A declared length counts the payload *plus* the trailing CRLF, so the
//! reader consumes exactly that many bytes and then trims the CRLF off.
//!
//! ## Examples
//!
//! `PING`: `1\r\n6\r\nPING\r\n`
//!
//! `GET name`: `2\r\n5\r\nGET\r\n6\r\nname\r\n`
//!
//! Reply to `PING`: `OK\r\n1\r\n8\r\n"PONG"\r\n`

use crate::protocol::parser::ParseError;
use std::fmt;
use std::str::FromStr;

/// The CRLF terminator used after every line and part
pub const CRLF: &[u8] = b"\r\n";

/// Status tokens that open a response
pub mod status {
    pub const OK: &str = "OK";
    pub const ERR: &str = "ERR";
}

/// A client request: a command name followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Command name, as sent by the client
    pub command: String,
    /// Ordered argument list
    pub args: Vec<String>,
}

impl Request {
    /// Creates a new request.
    ///
    /// Fails with [`ParseError::EmptyCommand`] if the command name is empty.
    ///
    /// # Example
    /// ```
    /// use linekv::protocol::Request;
    /// let req = Request::new("SET", ["name", "Ariz"]).unwrap();
    /// assert_eq!(req.args.len(), 2);
    /// ```
    pub fn new<I, S>(command: impl Into<String>, args: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let command = command.into();
        if command.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        Ok(Self {
            command,
            args: args.into_iter().map(Into::into).collect(),
        })
    }

    /// Number of framed parts: the command plus every argument.
    pub fn part_count(&self) -> usize {
        self.args.len() + 1
    }

    /// Serializes the request to its wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Serializes the request into an existing buffer.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        write_line(buf, &self.part_count().to_string());
        write_part(buf, &self.command);
        for arg in &self.args {
            write_part(buf, arg);
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " \"{}\"", arg)?;
        }
        Ok(())
    }
}

/// The status token of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Err,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => status::OK,
            Status::Err => status::ERR,
        }
    }
}

impl FromStr for Status {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s {
            status::OK => Ok(Status::Ok),
            status::ERR => Ok(Status::Err),
            other => Err(ParseError::UnknownStatus(other.to_string())),
        }
    }
}

/// A server response: a status followed by an ordered list of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub values: Vec<String>,
}

impl Response {
    /// Creates a response from an already validated status.
    pub fn new(status: Status, values: Vec<String>) -> Self {
        Self { status, values }
    }

    /// Creates a response from a raw status token.
    ///
    /// Anything other than `OK` or `ERR` is rejected, so a malformed status
    /// can never reach the wire.
    pub fn from_parts(status: &str, values: Vec<String>) -> Result<Self, ParseError> {
        Ok(Self::new(status.parse()?, values))
    }

    /// A successful response carrying a single value.
    pub fn ok(value: impl Into<String>) -> Self {
        Self::new(Status::Ok, vec![value.into()])
    }

    /// An error response carrying the error message as its single value.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Status::Err, vec![message.into()])
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn is_err(&self) -> bool {
        self.status == Status::Err
    }

    /// Serializes the response to its wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        write_line(buf, self.status.as_str());
        write_line(buf, &self.values.len().to_string());
        for value in &self.values {
            write_part(buf, value);
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Status::Ok => write!(f, "{}", self.values.join(" ")),
            Status::Err => write!(f, "(error) {}", self.values.join(" ")),
        }
    }
}

fn write_line(buf: &mut Vec<u8>, line: &str) {
    buf.extend_from_slice(line.as_bytes());
    buf.extend_from_slice(CRLF);
}

/// Writes one length-prefixed part. The declared length includes the CRLF.
fn write_part(buf: &mut Vec<u8>, part: &str) {
    write_line(buf, &(part.len() + CRLF.len()).to_string());
    write_line(buf, part);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_encode() {
        let req = Request::new("GET", ["name"]).unwrap();
        assert_eq!(req.encode(), b"2\r\n5\r\nGET\r\n6\r\nname\r\n");
    }

    #[test]
    fn test_request_without_args() {
        let req = Request::new("PING", Vec::<String>::new()).unwrap();
        assert_eq!(req.part_count(), 1);
        assert_eq!(req.encode(), b"1\r\n6\r\nPING\r\n");
    }

    #[test]
    fn test_request_rejects_empty_command() {
        let result = Request::new("", ["x"]);
        assert!(matches!(result, Err(ParseError::EmptyCommand)));
    }

    #[test]
    fn test_length_counts_bytes() {
        // "世界" is 6 bytes of UTF-8
        let req = Request::new("SET", ["k", "世界"]).unwrap();
        assert_eq!(
            req.encode(),
            "3\r\n5\r\nSET\r\n3\r\nk\r\n8\r\n世界\r\n".as_bytes()
        );
    }

    #[test]
    fn test_response_encode() {
        assert_eq!(Response::ok("\"PONG\"").encode(), b"OK\r\n1\r\n8\r\n\"PONG\"\r\n");
        assert_eq!(
            Response::error("ERR boom").encode(),
            b"ERR\r\n1\r\n10\r\nERR boom\r\n"
        );
    }

    #[test]
    fn test_response_empty_values() {
        let resp = Response::new(Status::Ok, vec![]);
        assert_eq!(resp.encode(), b"OK\r\n0\r\n");
    }

    #[test]
    fn test_response_rejects_unknown_status() {
        let result = Response::from_parts("MAYBE", vec![]);
        assert!(matches!(result, Err(ParseError::UnknownStatus(s)) if s == "MAYBE"));

        let resp = Response::from_parts("ERR", vec!["x".to_string()]).unwrap();
        assert!(resp.is_err());
    }

    #[test]
    fn test_display() {
        let req = Request::new("HSET", ["h", "f", "v"]).unwrap();
        assert_eq!(req.to_string(), "HSET \"h\" \"f\" \"v\"");
        assert_eq!(Response::error("ERR nope").to_string(), "(error) ERR nope");
    }
}
