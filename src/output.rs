//! Rendering helpers for a parsed request environment, used by the CLI.

use crate::Env;

/// Serialize `env` (and, if present, the decoded body) to a JSON string.
///
/// When `pretty` is `true` the output is indented for readability. Keys are
/// sorted alphabetically since `Env` is a `HashMap` with no stable order.
pub fn format_json(env: &Env, body: Option<&[u8]>, pretty: bool) -> String {
    let mut keys: Vec<&String> = env.keys().collect();
    keys.sort();

    let mut map = serde_json::Map::with_capacity(keys.len() + 1);
    for key in keys {
        map.insert(key.clone(), serde_json::Value::String(env[key].clone()));
    }
    if let Some(body) = body {
        map.insert(
            "BODY".to_string(),
            serde_json::Value::String(String::from_utf8_lossy(body).into_owned()),
        );
    }
    let value = serde_json::Value::Object(map);

    if pretty {
        serde_json::to_string_pretty(&value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    } else {
        serde_json::to_string(&value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// Render the request environment and optional body in a human-readable
/// debug format.
pub fn format_debug(env: &Env, body: Option<&[u8]>) -> String {
    let mut keys: Vec<&String> = env.keys().collect();
    keys.sort();

    let mut out = String::with_capacity(64 + keys.len() * 40);
    out.push_str("=== Request Environment ===\n");
    out.push_str(&format!(
        "{} {} {}\n",
        env.get("REQUEST_METHOD").map(String::as_str).unwrap_or("?"),
        env.get("REQUEST_URI").map(String::as_str).unwrap_or("?"),
        env.get("SERVER_PROTOCOL").map(String::as_str).unwrap_or("HTTP/0.9"),
    ));

    out.push_str(&format!("\n--- Environment ({}) ---\n", keys.len()));
    for key in keys {
        out.push_str(&format!("  {key}: {}\n", env[key]));
    }

    match body {
        Some(body) if !body.is_empty() => {
            out.push_str(&format!("\n--- Body ({} bytes) ---\n", body.len()));
            match std::str::from_utf8(body) {
                Ok(s) => out.push_str(s),
                Err(_) => out.push_str(&format!("<binary data: {} bytes>", body.len())),
            }
            out.push('\n');
        }
        _ => out.push_str("\n--- No Body ---\n"),
    }

    out.push_str("===========================\n");
    out
}

/// Render only the `HTTP_*` request headers (no other env keys, no body).
pub fn format_headers_only(env: &Env) -> String {
    let mut keys: Vec<&String> = env
        .keys()
        .filter(|k| k.starts_with("HTTP_") || *k == "CONTENT_LENGTH" || *k == "CONTENT_TYPE")
        .collect();
    keys.sort();

    let mut out = String::with_capacity(keys.len() * 40);
    for key in keys {
        out.push_str(&format!("{key}: {}\n", env[key]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_env() -> Env {
        let mut env = Env::new();
        env.insert("REQUEST_METHOD".to_string(), "GET".to_string());
        env.insert("REQUEST_URI".to_string(), "/".to_string());
        env.insert("SERVER_PROTOCOL".to_string(), "HTTP/1.1".to_string());
        env.insert("HTTP_HOST".to_string(), "example.com".to_string());
        env
    }

    #[test]
    fn json_output_includes_env_keys() {
        let json = format_json(&sample_env(), None, false);
        assert!(json.contains("\"HTTP_HOST\":\"example.com\""));
    }

    #[test]
    fn headers_only_skips_server_keys() {
        let out = format_headers_only(&sample_env());
        assert!(out.contains("HTTP_HOST: example.com"));
        assert!(!out.contains("REQUEST_METHOD"));
    }
}
