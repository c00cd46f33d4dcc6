use reqwest::Url;
use std::net::IpAddr;

pub const DEFAULT_REGION: &str = "eu-central-1";

/// Signing region of a realtime endpoint.
///
/// The region is the third dot-separated label of the host, as in
/// `xxxxxxx.appsync-api.us-east-2.amazonaws.com`. Hosts with fewer labels and
/// IP addresses fall back to `default_region`.
pub fn parse_region(endpoint: &str, default_region: &str) -> String {
    let host = match Url::parse(endpoint) {
        Ok(url) => url.host_str().unwrap_or_default().to_string(),
        // bare host without a scheme
        Err(_) => endpoint.split(['/', ':']).next().unwrap_or_default().to_string(),
    };

    if host.trim_matches(['[', ']']).parse::<IpAddr>().is_ok() {
        return default_region.to_string();
    }

    host.split('.')
        .nth(2)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_region.to_string())
}
