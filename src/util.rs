use reqwest::Url;
use std::net::IpAddr;

const TOKEN_PREVIEW_CHARS: usize = 12;

/// Reads an on/off environment flag value. Unknown spellings yield `None`.
pub fn parse_flag(value: &str) -> Option<bool> {
    let value = value.trim();
    if ["1", "true", "yes", "on"].iter().any(|v| value.eq_ignore_ascii_case(v)) {
        Some(true)
    } else if ["0", "false", "no", "off"].iter().any(|v| value.eq_ignore_ascii_case(v)) {
        Some(false)
    } else {
        None
    }
}

/// Whether `url` points at this machine (localhost, loopback, or 0.0.0.0).
pub fn is_local_endpoint_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };

    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback() || ip.is_unspecified())
}

/// Joins an API base URL and an endpoint path with exactly one slash.
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Short, log-safe prefix of a bearer token.
pub fn token_preview(token: Option<&str>) -> String {
    match token {
        Some(token) if !token.is_empty() => {
            let prefix: String = token.chars().take(TOKEN_PREVIEW_CHARS).collect();
            format!("{prefix}...")
        }
        _ => "<none>".to_string(),
    }
}
