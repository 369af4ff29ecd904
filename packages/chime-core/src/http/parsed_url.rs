//! Request target decomposition.

use url::Url;

use crate::error::{HttpError, HttpResult};

/// A request URL broken into the parts the engine needs.
///
/// Immutable after parsing; the engine re-parses on every request so a
/// response object can be pointed at a new target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Path including any query string, always starting with `/`.
    pub path: String,
}

impl ParsedUrl {
    /// Parses an `http` or `https` URL.
    ///
    /// # Errors
    /// Returns [`HttpError::UrlParse`] for malformed URLs, unsupported
    /// schemes, or URLs without a host.
    pub fn parse(input: &str) -> HttpResult<Self> {
        let url = Url::parse(input).map_err(|e| HttpError::UrlParse(format!("{}: {}", input, e)))?;

        let scheme = url.scheme().to_string();
        if scheme != "http" && scheme != "https" {
            return Err(HttpError::UrlParse(format!("unsupported scheme '{}'", scheme)));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| HttpError::UrlParse(format!("{}: missing host", input)))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let port = url
            .port_or_known_default()
            .ok_or_else(|| HttpError::UrlParse(format!("{}: missing port", input)))?;

        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }

    /// `host:port` as written in a `Host` header, IPv6 literals bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// True when the scheme requires an encrypted transport.
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv6_authority_keeps_brackets() {
        let url = ParsedUrl::parse("http://[::1]:8080/live").unwrap();
        assert_eq!(url.host, "::1");
        assert_eq!(url.authority(), "[::1]:8080");

        let named = ParsedUrl::parse("http://radio.example/live").unwrap();
        assert_eq!(named.authority(), "radio.example:80");
    }

    #[test]
    fn fills_in_default_ports() {
        let plain = ParsedUrl::parse("http://radio.example/stream.aac").unwrap();
        assert_eq!(plain.port, 80);
        assert!(!plain.is_secure());

        let tls = ParsedUrl::parse("https://radio.example").unwrap();
        assert_eq!(tls.port, 443);
        assert_eq!(tls.path, "/");
        assert!(tls.is_secure());
    }

    #[test]
    fn keeps_explicit_port_and_query() {
        let url = ParsedUrl::parse("http://10.0.0.2:8000/live?fmt=aac&br=128").unwrap();
        assert_eq!(url.host, "10.0.0.2");
        assert_eq!(url.port, 8000);
        assert_eq!(url.path, "/live?fmt=aac&br=128");
    }

    #[test]
    fn strips_ipv6_brackets() {
        let url = ParsedUrl::parse("http://[::1]:8080/a").unwrap();
        assert_eq!(url.host, "::1");
    }

    #[test]
    fn rejects_malformed_and_unsupported() {
        assert!(matches!(ParsedUrl::parse("not a url"), Err(HttpError::UrlParse(_))));
        assert!(matches!(ParsedUrl::parse("ftp://host/file"), Err(HttpError::UrlParse(_))));
    }
}
