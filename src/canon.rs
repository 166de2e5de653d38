//! Header name canonicalization and per-header semantics.
//!
//! This is the leaf component in the parser's dependency order: the byte
//! scanner calls into here every time it finishes scanning one header
//! line, and the scanner's own state never needs to know the special
//! rules for `Host`, `Connection`, `Content-Length`, `Transfer-Encoding`,
//! or `Trailer` — they live entirely in [`apply_header`].

use crate::error::ParseError;
use crate::parser::ParserFlags;
use crate::Env;

/// What the scanner should do if the line immediately following a header
/// starts with a fold (leading SP/HTAB): this is the `cont` slot from the
/// data model, a three-way tag rather than a bitset because exactly one
/// of "no header yet", "the header was dropped", or "the header is this
/// env key" is ever true at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HeaderCont {
    /// No header has been committed yet (start of the header block, or
    /// right after `clear`).
    Unset,
    /// The last header was deliberately dropped (`Version`, or a
    /// second `Host`); a continuation line folds into nothing.
    Ignored,
    /// The last header's value lives at this key in `env` and a
    /// continuation line should be appended to it.
    Active(String),
}

/// A canonical CGI-style env key: either a shared static string found in
/// the common-field table, or one computed for this call.
pub(crate) enum CanonKey {
    Static(&'static str),
    Owned(String),
}

impl CanonKey {
    pub(crate) fn as_str(&self) -> &str {
        match self {
            Self::Static(s) => s,
            Self::Owned(s) => s,
        }
    }
}

fn ci_eq(a: &[u8], b: &[u8]) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Precomputed table of common header names to their CGI env key, keyed
/// by raw (dash-cased, case-insensitive) header name. Hitting this table
/// means the caller never has to upper-case / dash-to-underscore the name
/// itself. `Content-Length` and `Content-Type` are the two names exempt
/// from the `HTTP_` prefix.
fn common_key(name: &[u8]) -> Option<&'static str> {
    let table: &[(&[u8], &str)] = &[
        (b"host", "HTTP_HOST"),
        (b"content-length", "CONTENT_LENGTH"),
        (b"content-type", "CONTENT_TYPE"),
        (b"connection", "HTTP_CONNECTION"),
        (b"transfer-encoding", "HTTP_TRANSFER_ENCODING"),
        (b"trailer", "HTTP_TRAILER"),
        (b"accept", "HTTP_ACCEPT"),
        (b"accept-charset", "HTTP_ACCEPT_CHARSET"),
        (b"accept-encoding", "HTTP_ACCEPT_ENCODING"),
        (b"accept-language", "HTTP_ACCEPT_LANGUAGE"),
        (b"authorization", "HTTP_AUTHORIZATION"),
        (b"cache-control", "HTTP_CACHE_CONTROL"),
        (b"cookie", "HTTP_COOKIE"),
        (b"date", "HTTP_DATE"),
        (b"expect", "HTTP_EXPECT"),
        (b"if-match", "HTTP_IF_MATCH"),
        (b"if-modified-since", "HTTP_IF_MODIFIED_SINCE"),
        (b"if-none-match", "HTTP_IF_NONE_MATCH"),
        (b"if-unmodified-since", "HTTP_IF_UNMODIFIED_SINCE"),
        (b"keep-alive", "HTTP_KEEP_ALIVE"),
        (b"origin", "HTTP_ORIGIN"),
        (b"pragma", "HTTP_PRAGMA"),
        (b"range", "HTTP_RANGE"),
        (b"referer", "HTTP_REFERER"),
        (b"user-agent", "HTTP_USER_AGENT"),
        (b"upgrade", "HTTP_UPGRADE"),
        (b"x-forwarded-for", "HTTP_X_FORWARDED_FOR"),
        (b"x-forwarded-proto", "HTTP_X_FORWARDED_PROTO"),
        (b"x-forwarded-ssl", "HTTP_X_FORWARDED_SSL"),
        (b"x-requested-with", "HTTP_X_REQUESTED_WITH"),
        (b"x-checksum", "HTTP_X_CHECKSUM"),
    ];
    table
        .iter()
        .find(|(raw, _)| ci_eq(name, raw))
        .map(|(_, key)| *key)
}

/// Compute an `HTTP_`-prefixed env key for a name that missed the
/// common-field table: upper-case every ASCII letter, turn `-` into `_`.
fn compute_key(name: &[u8]) -> String {
    let mut s = String::with_capacity(5 + name.len());
    s.push_str("HTTP_");
    for &b in name {
        s.push(if b == b'-' { '_' } else { (b as char).to_ascii_uppercase() });
    }
    s
}

pub(crate) fn canonical_key(name: &[u8]) -> CanonKey {
    match common_key(name) {
        Some(k) => CanonKey::Static(k),
        None => CanonKey::Owned(compute_key(name)),
    }
}

/// Merge a freshly-scanned value into `env[key]`, comma-joining onto any
/// value already stored there (RFC 9110 §5.3 list-header folding), and
/// return the resulting (possibly merged) value.
fn merge_duplicate(env: &mut Env, key: &str, value: &str) -> String {
    match env.get_mut(key) {
        Some(existing) => {
            existing.push(',');
            existing.push_str(value);
            existing.clone()
        }
        None => {
            env.insert(key.to_string(), value.to_string());
            value.to_string()
        }
    }
}

/// Validate a repeatable-but-not-mergeable header (`Content-Length`,
/// `Transfer-Encoding`): if a value is already stored at `key`, it must be
/// byte-identical to `value` (RFC 9112 §6.3 tolerates exact duplicates of
/// these two headers); a differing repeat is a request smuggling risk and
/// is rejected rather than silently comma-joined. Does not write `env` —
/// the caller still owns inserting the single, validated value.
fn reject_conflicting_duplicate(
    env: &Env,
    key: &str,
    value: &str,
    name: &'static str,
) -> Result<(), ParseError> {
    if let Some(existing) = env.get(key) {
        if existing != value {
            return Err(ParseError::ConflictingHeader(name));
        }
    }
    Ok(())
}

/// Parse a strictly non-negative decimal integer: no sign, no interior
/// whitespace, no empty string, digits only.
fn parse_strict_decimal(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Scan `Connection`'s (possibly comma-joined, possibly repeated-header)
/// value left to right, letting each `keep-alive` / `close` token
/// overwrite the running keepalive flag. This resolves the header's
/// scan-order ambiguity: the last token encountered — in arrival order,
/// across both comma-separated tokens in one instance and repeated
/// instances merged earlier by [`merge_duplicate`] — wins.
fn apply_connection_tokens(merged: &str, flags: &mut ParserFlags) {
    for tok in merged.split(',') {
        let t = tok.trim();
        if t.eq_ignore_ascii_case("keep-alive") {
            flags.ka_version = true;
        } else if t.eq_ignore_ascii_case("close") {
            flags.ka_version = false;
        }
    }
}

/// Apply one fully-scanned header (name + trimmed value) to `env`,
/// enforcing the special semantics for `Host`, `Connection`,
/// `Content-Length`, `Transfer-Encoding`, `Trailer`, and the
/// deliberately-dropped `Version`.
///
/// `host_locked` tracks whether the authoritative host (either a prior
/// `Host` header, or an absolute-form request-target) has already been
/// set; further `Host` headers are then ignored rather than merged.
pub(crate) fn apply_header(
    env: &mut Env,
    flags: &mut ParserFlags,
    raw_name: &[u8],
    value: &str,
    in_trailer: bool,
    host_locked: &mut bool,
) -> Result<HeaderCont, ParseError> {
    if ci_eq(raw_name, b"version") {
        return Ok(HeaderCont::Ignored);
    }

    if ci_eq(raw_name, b"host") {
        if *host_locked {
            return Ok(HeaderCont::Ignored);
        }
        *host_locked = true;
        env.insert("HTTP_HOST".to_string(), value.to_string());
        return Ok(HeaderCont::Active("HTTP_HOST".to_string()));
    }

    if ci_eq(raw_name, b"connection") {
        let merged = merge_duplicate(env, "HTTP_CONNECTION", value);
        apply_connection_tokens(&merged, flags);
        return Ok(HeaderCont::Active("HTTP_CONNECTION".to_string()));
    }

    if ci_eq(raw_name, b"content-length") {
        if in_trailer {
            return Err(ParseError::TrailerHeaderForbidden("Content-Length"));
        }
        reject_conflicting_duplicate(env, "CONTENT_LENGTH", value, "Content-Length")?;
        let length = parse_strict_decimal(value)
            .ok_or_else(|| ParseError::InvalidContentLength(value.to_string()))?;
        if length > 0 {
            flags.has_body = true;
        }
        env.insert("CONTENT_LENGTH".to_string(), value.to_string());
        return Ok(HeaderCont::Active("CONTENT_LENGTH".to_string()));
    }

    if ci_eq(raw_name, b"transfer-encoding") {
        if in_trailer {
            return Err(ParseError::TrailerHeaderForbidden("Transfer-Encoding"));
        }
        reject_conflicting_duplicate(env, "HTTP_TRANSFER_ENCODING", value, "Transfer-Encoding")?;
        if value.eq_ignore_ascii_case("chunked") {
            flags.chunked = true;
            flags.has_body = true;
        }
        env.insert("HTTP_TRANSFER_ENCODING".to_string(), value.to_string());
        return Ok(HeaderCont::Active("HTTP_TRANSFER_ENCODING".to_string()));
    }

    if ci_eq(raw_name, b"trailer") {
        if in_trailer {
            return Err(ParseError::TrailerHeaderForbidden("Trailer"));
        }
        merge_duplicate(env, "HTTP_TRAILER", value);
        flags.has_trailer = true;
        return Ok(HeaderCont::Active("HTTP_TRAILER".to_string()));
    }

    let key = canonical_key(raw_name);
    let key_str = key.as_str().to_string();
    merge_duplicate(env, &key_str, value);
    Ok(HeaderCont::Active(key_str))
}
