// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;
use std::net::IpAddr;

use tracklink_core::{LinkError, LinkResult};

pub const DEFAULT_REMOTE_PORT: u16 = 3333;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub host: String,
    pub port: u16,
}

impl RemoteEndpoint {
    pub fn connect_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.connect_addr())
    }
}

/// Build an endpoint from separate host and port fields.
///
/// An empty port falls back to `default_port`.
pub fn parse_endpoint(host: &str, port: &str, default_port: u16) -> LinkResult<RemoteEndpoint> {
    let host = host.trim();
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(invalid("host is empty"));
    }
    if host.contains(char::is_whitespace) {
        return Err(invalid(format!("host '{host}' contains whitespace")));
    }
    let port = match port.trim() {
        "" => default_port,
        text => parse_port(text)?,
    };
    Ok(RemoteEndpoint {
        host: host.to_string(),
        port,
    })
}

/// Parse `host`, `host:port`, `[v6]:port` or `tcp://…` forms.
pub fn parse_remote_url(url: &str) -> LinkResult<RemoteEndpoint> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(invalid("remote url is empty"));
    }

    let addr = trimmed.strip_prefix("tcp://").unwrap_or(trimmed);

    parse_host_port(addr)
}

fn parse_host_port(input: &str) -> LinkResult<RemoteEndpoint> {
    if let Some(rest) = input.strip_prefix('[') {
        let closing = rest
            .find(']')
            .ok_or_else(|| invalid("missing closing ']' for IPv6 host"))?;
        let host = &rest[..closing];
        let remainder = &rest[closing + 1..];
        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        let port = if remainder.is_empty() {
            DEFAULT_REMOTE_PORT
        } else if let Some(port_str) = remainder.strip_prefix(':') {
            parse_port(port_str)?
        } else {
            return Err(invalid("expected ':<port>' after ']'"));
        };
        return Ok(RemoteEndpoint {
            host: host.to_string(),
            port,
        });
    }

    if input.contains(':') {
        if input.matches(':').count() > 1 {
            return Err(invalid("IPv6 host must be bracketed like [::1]:3333"));
        }
        let (host, port_str) = input
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        return parse_endpoint(host, port_str, DEFAULT_REMOTE_PORT);
    }

    parse_endpoint(input, "", DEFAULT_REMOTE_PORT)
}

pub fn parse_port(port_str: &str) -> LinkResult<u16> {
    let port: u16 = port_str
        .trim()
        .parse()
        .map_err(|_| invalid(format!("invalid port: '{port_str}'")))?;
    if port == 0 {
        return Err(invalid("invalid port: 0"));
    }
    Ok(port)
}

/// Parse an optional local address to bind before connecting.
pub fn parse_bind(bind: &str) -> LinkResult<Option<IpAddr>> {
    let bind = bind.trim();
    if bind.is_empty() {
        return Ok(None);
    }
    bind.parse::<IpAddr>()
        .map(Some)
        .map_err(|_| invalid(format!("invalid bind address: '{bind}'")))
}

fn invalid(msg: impl Into<String>) -> LinkError {
    LinkError::AddressInvalid(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_default_port() {
        let parsed = parse_remote_url("uno.local").expect("must parse");
        assert_eq!(
            parsed,
            RemoteEndpoint {
                host: "uno.local".to_string(),
                port: 3333
            }
        );
    }

    #[test]
    fn parse_ipv4_with_port() {
        let parsed = parse_remote_url("tcp://10.42.0.2:9000").expect("must parse");
        assert_eq!(
            parsed,
            RemoteEndpoint {
                host: "10.42.0.2".to_string(),
                port: 9000
            }
        );
    }

    #[test]
    fn parse_bracketed_ipv6() {
        let parsed = parse_remote_url("[::1]:7000").expect("must parse");
        assert_eq!(parsed.host, "::1");
        assert_eq!(parsed.port, 7000);
        assert_eq!(parsed.connect_addr(), "[::1]:7000");
    }

    #[test]
    fn reject_unbracketed_ipv6() {
        let err = parse_remote_url("::1:7000").expect_err("must fail");
        assert!(err.to_string().contains("must be bracketed"));
    }

    #[test]
    fn parse_fields_with_empty_port_uses_default() {
        let parsed = parse_endpoint(" 10.42.0.2 ", "", 3333).unwrap();
        assert_eq!(parsed.connect_addr(), "10.42.0.2:3333");
    }

    #[test]
    fn parse_fields_rejects_bad_input() {
        assert!(matches!(
            parse_endpoint("", "3333", 3333),
            Err(LinkError::AddressInvalid(_))
        ));
        assert!(matches!(
            parse_endpoint("10.42.0.2", "abc", 3333),
            Err(LinkError::AddressInvalid(_))
        ));
        assert!(matches!(
            parse_endpoint("10.42.0.2", "0", 3333),
            Err(LinkError::AddressInvalid(_))
        ));
        assert!(matches!(
            parse_endpoint("10.42.0.2", "70000", 3333),
            Err(LinkError::AddressInvalid(_))
        ));
    }

    #[test]
    fn parse_bind_address() {
        assert_eq!(parse_bind("").unwrap(), None);
        assert_eq!(
            parse_bind("192.168.1.5").unwrap(),
            Some(IpAddr::from([192, 168, 1, 5]))
        );
        assert!(parse_bind("not-an-ip").is_err());
    }
}
