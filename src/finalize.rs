//! The environment finalizer: runs once, exactly when the header block
//! ends, synthesizing the handful of CGI keys that depend on the request
//! as a whole rather than on any single header.

use crate::config::ParserConfig;
use crate::parser::ParserFlags;
use crate::Env;

/// Split a `Host` header value into `(SERVER_NAME, SERVER_PORT)`,
/// recognizing the IPv6 literal form `[::1]:8080` by matching the closing
/// bracket before looking for a trailing `:port`.
fn parse_host_header(host: &str) -> (String, Option<String>) {
    if let Some(rest) = host.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            let name = format!("[{}]", &rest[..end]);
            let port = rest[end + 1..].strip_prefix(':').map(|p| p.to_string());
            return (name, port);
        }
    }
    match host.rsplit_once(':') {
        Some((h, p)) if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) => {
            (h.to_string(), Some(p.to_string()))
        }
        _ => (host.to_string(), None),
    }
}

/// Run the environment finalizer over `env`, using `flags` and `config`
/// to decide scheme/port and whether any header block was seen at all.
///
/// Guarantees afterward: `rack.url_scheme`, `SERVER_NAME`, `SERVER_PORT`,
/// and `SERVER_PROTOCOL` (for HTTP/0.9 requests) are all set, and
/// `QUERY_STRING` is present (possibly empty).
pub(crate) fn finalize_env(env: &mut Env, flags: &ParserFlags, config: &ParserConfig) {
    if !env.contains_key("rack.url_scheme") {
        let scheme = if !config.trust_x_forwarded {
            "http"
        } else if env
            .get("HTTP_X_FORWARDED_SSL")
            .is_some_and(|v| v.eq_ignore_ascii_case("on"))
        {
            "https"
        } else if env.get("HTTP_X_FORWARDED_PROTO").is_some_and(|v| {
            v.len() >= 5 && v.as_bytes()[..5].eq_ignore_ascii_case(b"https")
        }) {
            "https"
        } else {
            "http"
        };
        env.insert("rack.url_scheme".to_string(), scheme.to_string());
    }

    let (name, host_port) = match env.get("HTTP_HOST") {
        Some(host) => parse_host_header(host),
        None => ("localhost".to_string(), None),
    };
    env.entry("SERVER_NAME".to_string()).or_insert(name);

    let is_https = env.get("rack.url_scheme").map(|s| s == "https").unwrap_or(false);
    let port = if is_https {
        "443".to_string()
    } else {
        host_port.unwrap_or_else(|| "80".to_string())
    };
    env.insert("SERVER_PORT".to_string(), port);

    if !flags.has_header {
        env.insert("SERVER_PROTOCOL".to_string(), "HTTP/0.9".to_string());
    }

    env.entry("QUERY_STRING".to_string()).or_insert_with(String::new);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags_http11() -> ParserFlags {
        ParserFlags {
            has_header: true,
            ..ParserFlags::default()
        }
    }

    #[test]
    fn defaults_to_http_localhost_port_80() {
        let mut env = Env::new();
        finalize_env(&mut env, &flags_http11(), &ParserConfig::default());
        assert_eq!(env.get("rack.url_scheme").unwrap(), "http");
        assert_eq!(env.get("SERVER_NAME").unwrap(), "localhost");
        assert_eq!(env.get("SERVER_PORT").unwrap(), "80");
        assert_eq!(env.get("QUERY_STRING").unwrap(), "");
    }

    #[test]
    fn ipv6_host_with_port() {
        let mut env = Env::new();
        env.insert("HTTP_HOST".to_string(), "[::1]:8080".to_string());
        finalize_env(&mut env, &flags_http11(), &ParserConfig::default());
        assert_eq!(env.get("SERVER_NAME").unwrap(), "[::1]");
        assert_eq!(env.get("SERVER_PORT").unwrap(), "8080");
    }

    #[test]
    fn forwarded_ssl_on_forces_https_443() {
        let mut env = Env::new();
        env.insert("HTTP_X_FORWARDED_SSL".to_string(), "on".to_string());
        finalize_env(&mut env, &flags_http11(), &ParserConfig::default());
        assert_eq!(env.get("rack.url_scheme").unwrap(), "https");
        assert_eq!(env.get("SERVER_PORT").unwrap(), "443");
    }

    #[test]
    fn forwarded_proto_untrusted_is_ignored() {
        let mut env = Env::new();
        env.insert("HTTP_X_FORWARDED_PROTO".to_string(), "https".to_string());
        let config = ParserConfig {
            trust_x_forwarded: false,
            ..ParserConfig::default()
        };
        finalize_env(&mut env, &flags_http11(), &config);
        assert_eq!(env.get("rack.url_scheme").unwrap(), "http");
        assert_eq!(env.get("SERVER_PORT").unwrap(), "80");
    }

    #[test]
    fn no_header_block_sets_http_09() {
        let mut env = Env::new();
        finalize_env(&mut env, &ParserFlags::default(), &ParserConfig::default());
        assert_eq!(env.get("SERVER_PROTOCOL").unwrap(), "HTTP/0.9");
    }
}
