//! Wire Protocol Implementation
//!
//! This module implements the line-oriented framing spoken between clients
//! and the server.
//!
//! ## Overview
//!
//! A request is a command name followed by arguments; a response is an
//! `OK`/`ERR` status followed by values. Every part is sent as a length line
//! and a CRLF-terminated payload. Parts are textual, not binary safe.
//!
//! ## Modules
//!
//! - `types`: `Request`, `Response`, `Status` and serialization
//! - `parser`: incremental parser for incoming data
//!
//! ## Example
//!
//! ```
//! use linekv::protocol::{parse_request, Request, Response};
//!
//! // Parsing incoming data
//! let data = b"2\r\n5\r\nGET\r\n6\r\nname\r\n";
//! let (request, consumed) = parse_request(data).unwrap().unwrap();
//! assert_eq!(request, Request::new("GET", ["name"]).unwrap());
//! assert_eq!(consumed, data.len());
//!
//! // Creating responses
//! let response = Response::ok("\"Ariz\"");
//! let bytes = response.encode();
//! assert!(bytes.starts_with(b"OK\r\n1\r\n"));
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_request, parse_response, FrameParser, ParseError, ParseResult};
pub use types::{Request, Response, Status};
