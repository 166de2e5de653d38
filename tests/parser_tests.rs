use cgiframe::{parse_request, parse_request_with_config, BodyStatus, ParseStatus, Parser, ParserConfig};

// =========================================================================
// Request-line parsing
// =========================================================================

#[test]
fn simple_get_request() {
    let raw = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("REQUEST_METHOD").unwrap(), "GET");
    assert_eq!(env.get("REQUEST_URI").unwrap(), "/");
    assert_eq!(env.get("SERVER_PROTOCOL").unwrap(), "HTTP/1.1");
    assert_eq!(env.get("HTTP_HOST").unwrap(), "example.com");
    assert_eq!(env.get("QUERY_STRING").unwrap(), "");
}

#[test]
fn get_with_query_string() {
    let raw =
        b"GET /api/users?page=1&limit=10 HTTP/1.1\r\nHost: api.example.com\r\nAccept: application/json\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("REQUEST_PATH").unwrap(), "/api/users");
    assert_eq!(env.get("QUERY_STRING").unwrap(), "page=1&limit=10");
    assert_eq!(env.get("HTTP_ACCEPT").unwrap(), "application/json");
}

#[test]
fn http_10_version_has_no_keepalive() {
    let raw = b"GET /legacy HTTP/1.0\r\nHost: old.example.com\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("SERVER_PROTOCOL").unwrap(), "HTTP/1.0");

    let mut parser = Parser::new();
    parser.add_parse(raw).unwrap();
    assert!(!parser.keepalive());
}

#[test]
fn unknown_methods_are_never_errors() {
    for name in ["GET", "HEAD", "POST", "PUT", "DELETE", "OPTIONS", "TRACE", "PATCH", "PROPFIND", "FROB"] {
        let raw = format!("{name} / HTTP/1.1\r\nHost: h\r\n\r\n");
        let env = parse_request(raw.as_bytes()).expect("should parse");
        assert_eq!(env.get("REQUEST_METHOD").unwrap(), name);
    }
}

#[test]
fn unknown_http_versions_pass_through() {
    let raw = b"GET / HTTP/2.7\r\nHost: h\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("SERVER_PROTOCOL").unwrap(), "HTTP/2.7");
}

#[test]
fn options_star_form() {
    let raw = b"OPTIONS * HTTP/1.1\r\nHost: h\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("REQUEST_URI").unwrap(), "*");
    assert_eq!(env.get("REQUEST_PATH").unwrap(), "");
    assert_eq!(env.get("PATH_INFO").unwrap(), "");
}

#[test]
fn absolute_form_request_target_sets_host_and_path() {
    let raw = b"GET http://example.com:8080/a/b?q=1 HTTP/1.1\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("HTTP_HOST").unwrap(), "example.com:8080");
    assert_eq!(env.get("REQUEST_PATH").unwrap(), "/a/b");
    assert_eq!(env.get("QUERY_STRING").unwrap(), "q=1");
    assert_eq!(env.get("SERVER_NAME").unwrap(), "example.com:8080");
}

#[test]
fn http_09_request_line_only() {
    let raw = b"GET /old-school\r\n";
    let mut parser = Parser::new();
    let status = parser.add_parse(raw).unwrap();
    assert!(matches!(status, ParseStatus::Complete(_)));
    assert_eq!(parser.env().get("REQUEST_PATH").unwrap(), "/old-school");
    assert_eq!(parser.env().get("SERVER_PROTOCOL").unwrap(), "HTTP/0.9");
    assert!(!parser.headers_seen());
}

// =========================================================================
// Headers
// =========================================================================

#[test]
fn header_names_canonicalize_to_http_prefixed_underscored_keys() {
    let raw = b"GET / HTTP/1.1\r\nHost: h\r\nX-Custom-Header: value\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("HTTP_X_CUSTOM_HEADER").unwrap(), "value");
}

#[test]
fn content_length_and_content_type_are_exempt_from_http_prefix() {
    let raw = b"POST /x HTTP/1.1\r\nHost: h\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello";
    let env = parse_request_with_config(raw, ParserConfig::default());
    // parse_request_with_config on the header-only slice stops at the body boundary.
    assert!(env.is_ok());
    let env = env.unwrap();
    assert_eq!(env.get("CONTENT_TYPE").unwrap(), "text/plain");
    assert_eq!(env.get("CONTENT_LENGTH").unwrap(), "5");
}

#[test]
fn duplicate_headers_are_comma_joined() {
    let raw = b"GET / HTTP/1.1\r\nHost: h\r\nX-Tag: a\r\nX-Tag: b\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("HTTP_X_TAG").unwrap(), "a,b");
}

#[test]
fn duplicate_host_header_keeps_first() {
    let raw = b"GET / HTTP/1.1\r\nHost: first.example\r\nHost: second.example\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("HTTP_HOST").unwrap(), "first.example");
}

#[test]
fn header_continuation_folds_with_single_space() {
    let raw = b"GET / HTTP/1.1\r\nHost: h\r\nX-Long: first\r\n second\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("HTTP_X_LONG").unwrap(), "first second");
}

#[test]
fn connection_header_last_token_wins() {
    let raw = b"GET / HTTP/1.1\r\nHost: h\r\nConnection: keep-alive, close\r\n\r\n";
    let mut parser = Parser::new();
    parser.add_parse(raw).unwrap();
    assert!(!parser.keepalive());

    let raw2 = b"GET / HTTP/1.1\r\nHost: h\r\nConnection: close, keep-alive\r\n\r\n";
    let mut parser2 = Parser::new();
    parser2.add_parse(raw2).unwrap();
    assert!(parser2.keepalive());
}

#[test]
fn dangling_continuation_is_an_error() {
    let raw = b"GET / HTTP/1.1\r\n Host: h\r\n\r\n";
    let err = parse_request(raw).unwrap_err();
    assert_eq!(err.status_code(), 400);
}

// =========================================================================
// Forwarded headers / scheme resolution
// =========================================================================

#[test]
fn forwarded_https_sets_scheme_and_port() {
    let raw = b"GET /secure HTTP/1.1\r\nHost: h\r\nX-Forwarded-Proto: https\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("rack.url_scheme").unwrap(), "https");
    assert_eq!(env.get("SERVER_PORT").unwrap(), "443");
}

#[test]
fn untrusted_forwarded_headers_are_ignored_when_disabled() {
    let config = ParserConfig {
        trust_x_forwarded: false,
        ..ParserConfig::default()
    };
    let raw = b"GET /secure HTTP/1.1\r\nHost: h\r\nX-Forwarded-Proto: https\r\n\r\n";
    let env = parse_request_with_config(raw, config).expect("should parse");
    assert_eq!(env.get("rack.url_scheme").unwrap(), "http");
    assert_eq!(env.get("SERVER_PORT").unwrap(), "80");
}

#[test]
fn ipv6_host_header_splits_name_and_port() {
    let raw = b"GET / HTTP/1.1\r\nHost: [::1]:9090\r\n\r\n";
    let env = parse_request(raw).expect("should parse");
    assert_eq!(env.get("SERVER_NAME").unwrap(), "[::1]");
    assert_eq!(env.get("SERVER_PORT").unwrap(), "9090");
}

// =========================================================================
// Body handling: Content-Length
// =========================================================================

#[test]
fn content_length_zero_completes_without_body_phase() {
    let raw = b"POST /x HTTP/1.1\r\nHost: h\r\nContent-Length: 0\r\n\r\n";
    let mut parser = Parser::new();
    let status = parser.add_parse(raw).unwrap();
    assert!(matches!(status, ParseStatus::Complete(_)));
    assert!(parser.body_eof());
    assert_eq!(parser.content_length(), Some(0));
}

#[test]
fn content_length_body_is_filtered_through() {
    let mut parser = Parser::new();
    parser
        .add_parse(b"POST /x HTTP/1.1\r\nHost: h\r\nContent-Length: 11\r\n\r\n")
        .unwrap();

    let mut input = parser.take_leftover_input();
    input.extend_from_slice(b"hello world");

    let mut out = Vec::new();
    let status = parser.filter_body(&mut out, &mut input).unwrap();
    assert_eq!(out, b"hello world");
    assert_eq!(status, BodyStatus::MoreNeeded);

    let mut out2 = Vec::new();
    let status2 = parser.filter_body(&mut out2, &mut input).unwrap();
    assert!(out2.is_empty());
    assert_eq!(status2, BodyStatus::Done);
    assert!(parser.body_eof());
}

#[test]
fn content_length_body_split_across_many_calls() {
    let mut parser = Parser::new();
    parser
        .add_parse(b"POST /x HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\n")
        .unwrap();

    let mut input = parser.take_leftover_input();
    input.extend_from_slice(b"he");
    let mut out = Vec::new();
    parser.filter_body(&mut out, &mut input).unwrap();
    assert_eq!(out, b"he");

    input.extend_from_slice(b"llo");
    let mut out2 = Vec::new();
    let status = parser.filter_body(&mut out2, &mut input).unwrap();
    assert_eq!(out2, b"llo");
    assert_eq!(status, BodyStatus::MoreNeeded);

    let mut out3 = Vec::new();
    let status3 = parser.filter_body(&mut out3, &mut input).unwrap();
    assert!(out3.is_empty());
    assert_eq!(status3, BodyStatus::Done);
}

// =========================================================================
// Body handling: chunked + trailers
// =========================================================================

#[test]
fn chunked_body_with_trailer_populates_trailer_headers() {
    let mut parser = Parser::new();
    parser
        .add_parse(b"POST /upload HTTP/1.1\r\nHost: h\r\nTransfer-Encoding: chunked\r\n\r\n")
        .unwrap();

    let mut input = parser.take_leftover_input();
    input.extend_from_slice(b"5\r\nhello\r\n0\r\nX-Checksum: abc123\r\n\r\n");

    let mut body = Vec::new();
    loop {
        let mut chunk = Vec::new();
        let status = parser.filter_body(&mut chunk, &mut input).unwrap();
        body.extend_from_slice(&chunk);
        if status == BodyStatus::Done {
            break;
        }
        if input.is_empty() {
            break;
        }
    }

    assert_eq!(body, b"hello");
    assert_eq!(parser.env().get("HTTP_X_CHECKSUM").unwrap(), "abc123");
    assert!(parser.body_eof());
}

#[test]
fn chunked_wins_over_co_occurring_content_length() {
    let mut parser = Parser::new();
    parser
        .add_parse(b"POST /x HTTP/1.1\r\nHost: h\r\nContent-Length: 999\r\nTransfer-Encoding: chunked\r\n\r\n")
        .unwrap();
    assert_eq!(parser.content_length(), None);

    let mut input = parser.take_leftover_input();
    input.extend_from_slice(b"5\r\nhello\r\n0\r\n\r\n");
    let mut body = Vec::new();
    loop {
        let mut chunk = Vec::new();
        let status = parser.filter_body(&mut chunk, &mut input).unwrap();
        body.extend_from_slice(&chunk);
        if status == BodyStatus::Done || input.is_empty() {
            break;
        }
    }
    assert_eq!(body, b"hello");
}

#[test]
fn trailer_cannot_reintroduce_content_length() {
    let mut parser = Parser::new();
    parser
        .add_parse(b"POST /x HTTP/1.1\r\nHost: h\r\nTransfer-Encoding: chunked\r\n\r\n")
        .unwrap();

    let mut input = parser.take_leftover_input();
    input.extend_from_slice(b"0\r\nContent-Length: 10\r\n\r\n");

    let mut out = Vec::new();
    let err = parser.filter_body(&mut out, &mut input).unwrap_err();
    assert_eq!(err.status_code(), 400);
}

// =========================================================================
// Keep-alive and pipelining
// =========================================================================

#[test]
fn pipelined_requests_reuse_the_same_parser() {
    let mut parser = Parser::new();
    parser
        .add_parse(b"GET /first HTTP/1.1\r\nHost: h\r\n\r\nGET /second HTTP/1.1\r\nHost: h\r\n\r\n")
        .unwrap();
    assert_eq!(parser.env().get("REQUEST_PATH").unwrap(), "/first");
    assert!(parser.next());

    let status = parser.parse().unwrap();
    assert!(matches!(status, ParseStatus::Complete(_)));
    assert_eq!(parser.env().get("REQUEST_PATH").unwrap(), "/second");
}

#[test]
fn keepalive_budget_is_exhausted_after_configured_count() {
    let config = ParserConfig {
        keepalive_requests: Some(2),
        ..ParserConfig::default()
    };
    let mut parser = Parser::with_config(config);

    for _ in 0..2 {
        parser.add_parse(b"GET / HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
        assert!(parser.next());
        parser.parse().unwrap();
    }

    // third request: budget exhausted even though the request itself is keep-alive eligible
    parser.add_parse(b"GET / HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
    assert!(!parser.next());
}

// =========================================================================
// Limits
// =========================================================================

#[test]
fn header_block_exceeding_max_header_len_is_rejected() {
    let config = ParserConfig {
        max_header_len: 64,
        ..ParserConfig::default()
    };
    let mut raw = b"GET / HTTP/1.1\r\nHost: h\r\n".to_vec();
    raw.extend(std::iter::repeat(b'a').take(128));
    raw.extend_from_slice(b"\r\n\r\n");

    let mut parser = Parser::with_config(config);
    let err = parser.add_parse(&raw).unwrap_err();
    assert_eq!(err.status_code(), 413);
}

#[test]
fn request_target_exceeding_max_uri_len_is_rejected() {
    let config = ParserConfig {
        max_uri_len: 8,
        ..ParserConfig::default()
    };
    let raw = b"GET /this/path/is/too/long HTTP/1.1\r\nHost: h\r\n\r\n";
    let err = parse_request_with_config(raw, config).unwrap_err();
    assert_eq!(err.status_code(), 414);
}

#[test]
fn invalid_content_length_is_rejected() {
    for value in ["+5", " 5", "-1", "5a", ""] {
        let raw = format!("POST /x HTTP/1.1\r\nHost: h\r\nContent-Length: {value}\r\n\r\n");
        let err = parse_request(raw.as_bytes()).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}

#[test]
fn sticky_error_is_returned_on_every_subsequent_call() {
    let mut parser = Parser::new();
    let first = parser.add_parse(b" bad request\r\n").unwrap_err();
    let second = parser.parse().unwrap_err();
    assert_eq!(first, second);
    parser.clear();
    let status = parser.add_parse(b"GET / HTTP/1.1\r\nHost: h\r\n\r\n").unwrap();
    assert!(matches!(status, ParseStatus::Complete(_)));
}

// =========================================================================
// Split-feed invariant: any chunking of the same bytes gives the same env
// =========================================================================

#[test]
fn split_feed_of_arbitrary_sizes_matches_one_shot_parse() {
    let raw = b"GET /a/b?x=1&y=2 HTTP/1.1\r\nHost: example.com\r\nX-One: 1\r\nX-Two: two\r\n\r\n";
    let whole = parse_request(raw).unwrap();

    for chunk_size in [1usize, 2, 3, 7, 16] {
        let mut parser = Parser::new();
        for piece in raw.chunks(chunk_size) {
            parser.add_parse(piece).unwrap();
        }
        assert_eq!(&whole, parser.env(), "mismatch at chunk size {chunk_size}");
    }
}
