//! Broker endpoint parsing.

use std::fmt;
use std::str::FromStr;

use cardbridge_core::constants::BROKER_URL_SCHEME;
use cardbridge_core::{Error, Result};

/// A `tcp://host:port` broker endpoint.
///
/// # Examples
///
/// ```
/// use cardbridge_network::BrokerUrl;
///
/// let url = BrokerUrl::parse("tcp://broker.local:1883").unwrap();
/// assert_eq!(url.host(), "broker.local");
/// assert_eq!(url.port(), 1883);
/// assert_eq!(url.authority(), "broker.local:1883");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerUrl {
    host: String,
    port: u16,
}

impl BrokerUrl {
    /// Parse a broker URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` unless the input is `tcp://host:port` with a
    /// non-empty host and a port in 1..=65535.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::Config(format!("invalid broker URL {s:?}: {reason}"));

        let (scheme, rest) = s.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        if !scheme.eq_ignore_ascii_case(BROKER_URL_SCHEME) {
            return Err(invalid("only tcp:// is supported"));
        }

        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.contains(['/', '?', '#', '@']) {
            return Err(invalid("path, query and credentials are not supported"));
        }

        let (host, port) = rest.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() || host == "[]" {
            return Err(invalid("missing host"));
        }

        let port: u16 = port.parse().map_err(|_| invalid("port is not a number"))?;
        if port == 0 {
            return Err(invalid("port must be non-zero"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, as accepted by `TcpStream::connect`.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for BrokerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{BROKER_URL_SCHEME}://{}:{}", self.host, self.port)
    }
}

impl FromStr for BrokerUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BrokerUrl::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("tcp://127.0.0.1:1883", "127.0.0.1", 1883)]
    #[case("TCP://broker.example.com:8883/", "broker.example.com", 8883)]
    #[case("tcp://[::1]:7000", "[::1]", 7000)]
    fn test_parse_valid(#[case] input: &str, #[case] host: &str, #[case] port: u16) {
        let url = BrokerUrl::parse(input).unwrap();
        assert_eq!(url.host(), host);
        assert_eq!(url.port(), port);
    }

    #[rstest]
    #[case("")]
    #[case("127.0.0.1:1883")]
    #[case("mqtt://broker:1883")]
    #[case("ssl://broker:8883")]
    #[case("tcp://broker")]
    #[case("tcp://:1883")]
    #[case("tcp://broker:0")]
    #[case("tcp://broker:65536")]
    #[case("tcp://broker:port")]
    #[case("tcp://user@broker:1883")]
    #[case("tcp://broker:1883/relay")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(matches!(BrokerUrl::parse(input), Err(Error::Config(_))));
    }

    #[test]
    fn test_display_normalises_scheme() {
        let url: BrokerUrl = "TCP://broker:1883".parse().unwrap();
        assert_eq!(url.to_string(), "tcp://broker:1883");
    }
}
