use std::net::IpAddr;

use thiserror::Error;
use url::Url;

/// Reasons a link from the API is refused before being opened.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Checks that an item or profile link is a public http(s) page before it is
/// handed to the system browser.
///
/// Upstream records are untrusted: a `javascript:` or `file:` link, or one
/// pointing into the local network, is rejected.
///
/// ```
/// use bananaview::util::validate_open_url;
///
/// assert!(validate_open_url("https://gamebanana.com/mods/12345").is_ok());
/// assert!(validate_open_url("file:///etc/passwd").is_err());
/// assert!(validate_open_url("http://192.168.0.10/").is_err());
/// ```
pub fn validate_open_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_owned())),
    }

    match url.host() {
        Some(url::Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            Err(UrlValidationError::Localhost)
        }
        Some(url::Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip)).map(|_| url),
        Some(url::Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip)).map(|_| url),
        _ => Ok(url),
    }
}

fn check_ip(ip: IpAddr) -> Result<(), UrlValidationError> {
    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    let private = match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    };
    if private {
        Err(UrlValidationError::PrivateIp(ip.to_string()))
    } else {
        Ok(())
    }
}
