//! Chunk-size parsing helper shared by the dechunker in [`crate::parser`].

use crate::error::ParseError;

/// Outcome of a [`crate::Parser::filter_body`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStatus {
    /// The body (chunked or length-delimited) has been fully consumed and
    /// this call produced no further output.
    Done,
    /// More input is needed (or more output was just produced); call
    /// `filter_body` again with fresh input.
    MoreNeeded,
}

/// Parse a chunk-size line's accumulated hex digits (chunk extensions
/// already stripped by the scanner).
pub(crate) fn parse_chunk_size(buf: &[u8]) -> Result<u64, ParseError> {
    if buf.is_empty() {
        return Err(ParseError::InvalidChunkSize("empty chunk size".to_string()));
    }
    let s = std::str::from_utf8(buf)
        .map_err(|_| ParseError::InvalidChunkSize("non-UTF-8 chunk size".to_string()))?;
    u64::from_str_radix(s, 16).map_err(|_| ParseError::InvalidChunkSize(s.to_string()))
}
