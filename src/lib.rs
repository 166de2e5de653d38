//! # cgiframe
//!
//! A **resumable, streaming HTTP/1.x request parser** that builds a
//! CGI/Rack-style request environment instead of a fixed request struct.
//! The parser is a byte-level state machine: it can be fed input in
//! arbitrarily small pieces (one byte at a time, or an entire socket read)
//! and produces identical results either way, making it suitable for both
//! synchronous and asynchronous server loops.
//!
//! Unlike a one-shot parser, a [`Parser`] is built to sit on a live
//! connection across pipelined keep-alive requests: header parsing and
//! body/chunk dechunking are separate operations ([`Parser::add_parse`] and
//! [`Parser::filter_body`]) so a caller can buffer, backpressure, or
//! interleave them with I/O however its runtime requires.
//!
//! ## Quick start — one-shot parsing
//!
//! ```rust
//! use cgiframe::parse_request;
//!
//! let raw = b"GET /hello HTTP/1.1\r\nHost: example.com\r\n\r\n";
//! let env = parse_request(raw).expect("valid request");
//! assert_eq!(env.get("REQUEST_METHOD").map(String::as_str), Some("GET"));
//! assert_eq!(env.get("REQUEST_URI").map(String::as_str), Some("/hello"));
//! ```
//!
//! ## Quick start — incremental parsing
//!
//! ```rust
//! use cgiframe::{Parser, ParseStatus};
//!
//! let mut parser = Parser::new();
//!
//! let status = parser.add_parse(b"GET / HTTP/1.1\r\n").unwrap();
//! assert_eq!(status, ParseStatus::Incomplete);
//!
//! let status = parser.add_parse(b"Host: example.com\r\n\r\n").unwrap();
//! assert!(matches!(status, ParseStatus::Complete(_)));
//!
//! assert_eq!(parser.env().get("REQUEST_URI").map(String::as_str), Some("/"));
//! ```

mod body;
mod canon;
mod config;
mod error;
mod finalize;
mod output;
mod parser;

/// The CGI/Rack-style request environment: string keys such as
/// `REQUEST_METHOD`, `HTTP_HOST`, or `rack.url_scheme` mapped to their
/// string values. There is no fixed struct of named fields — any header,
/// known or not, lands in here under its canonical key.
pub type Env = std::collections::HashMap<String, String>;

// Re-export public API.
pub use body::BodyStatus;
pub use config::ParserConfig;
pub use error::{ErrorKind, ParseError};
pub use output::{format_debug, format_headers_only, format_json};
pub use parser::{ParseStatus, Parser};

/// Parse a **complete** HTTP request (header block only — no body) from a
/// byte slice in one call, returning the request environment.
///
/// This is a convenience wrapper around [`Parser`]; for streaming bodies,
/// pipelined keep-alive connections, or partial reads, create a `Parser`
/// directly and drive [`Parser::add_parse`] / [`Parser::filter_body`]
/// yourself.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed, or if the header block
/// never completes within the supplied bytes.
pub fn parse_request(data: &[u8]) -> Result<Env, ParseError> {
    parse_request_with_config(data, ParserConfig::default())
}

/// Parse a **complete** HTTP request using custom [`ParserConfig`] limits.
///
/// # Errors
///
/// Returns [`ParseError`] if the data is malformed, the header block never
/// completes, or any configured limit is exceeded.
pub fn parse_request_with_config(data: &[u8], config: ParserConfig) -> Result<Env, ParseError> {
    let mut parser = Parser::with_config(config);
    match parser.add_parse(data)? {
        ParseStatus::Complete(_) => Ok(parser.env().clone()),
        ParseStatus::Incomplete => Err(ParseError::InvalidUri(
            "request ended before the header block completed".to_string(),
        )),
    }
}

/// Parse a complete request (request-line plus headers) from `buf` and
/// merge the resulting env into a caller-supplied `env`, for callers who
/// want to combine several header sources (e.g. synthetic headers plus
/// wire bytes) into one map. `buf` must start with a request-line — this
/// does not parse a bare trailer block. Trailers are handled entirely
/// inside [`Parser::filter_body`], which reuses the header sub-state-machine
/// with `in_trailer` set once the chunked terminator is seen; there is no
/// free-standing trailer-entry point.
///
/// # Errors
///
/// Returns [`ParseError`] on malformed input.
pub fn headers(env: &mut Env, buf: &[u8]) -> Result<ParseStatus, ParseError> {
    let mut parser = Parser::new();
    let status = parser.add_parse(buf)?;
    if let ParseStatus::Complete(_) = status {
        env.extend(parser.env().clone());
    }
    Ok(status)
}
