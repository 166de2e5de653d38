/// Process-wide parser limits and policy knobs.
///
/// A single [`ParserConfig`] is meant to be built once at process startup
/// (from whatever configuration-loading layer the enclosing server uses)
/// and then shared — by value or by cheap `Clone` — across every
/// [`crate::Parser`] instance. Nothing here is mutated after construction;
/// concurrent readers of an already-built config are safe, concurrent
/// writers are not supported and are not needed, since the server layer
/// that owns configuration loading only ever constructs this once.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserConfig {
    /// Maximum length of the HTTP method token (default: 16).
    pub max_method_len: usize,
    /// Maximum length of each request-target component — the raw
    /// request-target, `REQUEST_PATH`, `QUERY_STRING`, and `FRAGMENT` are
    /// each checked against this cap independently (default: 8 192).
    pub max_uri_len: usize,
    /// Maximum length of a single header field name (default: 256).
    pub max_header_name_len: usize,
    /// Maximum length of a single header field value (default: 81 920,
    /// i.e. 80 KiB).
    pub max_header_value_len: usize,
    /// Maximum number of header fields, headers and trailers combined
    /// (default: 128).
    pub max_headers_count: usize,
    /// Maximum total size of the header block, in bytes consumed from the
    /// start of the request up to (and including) the blank line that
    /// ends it (default: 114 688, i.e. 112 KiB).
    pub max_header_len: usize,
    /// Maximum body size, checked against both `Content-Length` and the
    /// running total of dechunked output (default: 10 MiB).
    pub max_body_size: usize,
    /// Maximum number of requests permitted on one connection before
    /// [`crate::Parser::next`] forces a close. `None` means unlimited
    /// (default: `Some(100)`).
    pub keepalive_requests: Option<u32>,
    /// Whether `X-Forwarded-Proto` / `X-Forwarded-Ssl` are honored when
    /// determining `rack.url_scheme` and `SERVER_PORT`. Disable this when
    /// the server is directly internet-facing and these headers could be
    /// forged by untrusted clients (default: `true`).
    pub trust_x_forwarded: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_method_len: 16,
            max_uri_len: 8_192,
            max_header_name_len: 256,
            max_header_value_len: 81_920,
            max_headers_count: 128,
            max_header_len: 114_688,
            max_body_size: 10 * 1024 * 1024,
            keepalive_requests: Some(100),
            trust_x_forwarded: true,
        }
    }
}
