use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::proto::error::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 7711;

/// A resolved server address, fixed at connect time.
///
/// Only two transport kinds exist: TCP and Unix domain sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// TCP endpoint.
    Tcp {
        /// Host name or IP address.
        host: String,
        /// Port number.
        port: u16,
    },
    /// Unix domain socket endpoint.
    Unix {
        /// Filesystem path of the socket.
        path: PathBuf,
    },
}

impl Address {
    /// Parses an address string.
    ///
    /// Accepted forms:
    /// - `disque://host[:port]` or `tcp://host[:port]`
    /// - `unix://path`
    /// - `host:port`
    /// - a bare port (`"7712"`)
    /// - a filesystem path starting with `/`
    /// - a bare host name
    ///
    /// Missing pieces default to `127.0.0.1:7711`.
    pub fn parse(input: &str) -> crate::Result<Self> {
        if input.is_empty() {
            return Err(address_error(input));
        }
        if input.contains("://") {
            let url = url::Url::parse(input).map_err(|_| address_error(input))?;
            return match url.scheme() {
                "disque" | "tcp" => Ok(Address::Tcp {
                    host: url.host_str().unwrap_or(DEFAULT_HOST).to_string(),
                    port: url.port().unwrap_or(DEFAULT_PORT),
                }),
                "unix" => {
                    let path = url.path();
                    if path.is_empty() {
                        return Err(address_error(input));
                    }
                    Ok(Address::Unix { path: path.into() })
                }
                _ => Err(address_error(input)),
            };
        }
        if input.starts_with('/') {
            return Ok(Address::Unix { path: input.into() });
        }
        if let Ok(port) = input.parse::<u16>() {
            return Ok(Address::Tcp {
                host: DEFAULT_HOST.to_string(),
                port,
            });
        }
        if let Some((host, port)) = input.rsplit_once(':') {
            let port = port.parse::<u16>().map_err(|_| address_error(input))?;
            let host = if host.is_empty() { DEFAULT_HOST } else { host };
            return Ok(Address::Tcp {
                host: host.to_string(),
                port,
            });
        }
        Ok(Address::Tcp {
            host: input.to_string(),
            port: DEFAULT_PORT,
        })
    }
}

fn address_error(input: &str) -> Error {
    Error::Address {
        message: format!("do not know how to handle {input:?}"),
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Address::parse(s)
    }
}

impl From<(&str, u16)> for Address {
    fn from((host, port): (&str, u16)) -> Self {
        Address::Tcp {
            host: host.to_string(),
            port,
        }
    }
}

impl From<u16> for Address {
    fn from(port: u16) -> Self {
        Address::Tcp {
            host: DEFAULT_HOST.to_string(),
            port,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp { host, port } => write!(f, "{host}:{port}"),
            Address::Unix { path } => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scheme_tcp() {
        let addr = Address::parse("disque://example.org:7712").unwrap();
        assert_eq!(addr, ("example.org", 7712).into());
        let addr = Address::parse("tcp://example.org").unwrap();
        assert_eq!(addr, ("example.org", 7711).into());
    }

    #[test]
    fn test_parse_scheme_unix() {
        let addr = Address::parse("unix:///tmp/disque.sock").unwrap();
        assert_eq!(
            addr,
            Address::Unix {
                path: "/tmp/disque.sock".into()
            }
        );
    }

    #[test]
    fn test_parse_host_port() {
        let addr = Address::parse("10.0.0.1:7712").unwrap();
        assert_eq!(addr, ("10.0.0.1", 7712).into());
    }

    #[test]
    fn test_parse_bare_port() {
        let addr = Address::parse("7712").unwrap();
        assert_eq!(addr, ("127.0.0.1", 7712).into());
    }

    #[test]
    fn test_parse_bare_host_uses_default_port() {
        let addr = Address::parse("example.org").unwrap();
        assert_eq!(addr, ("example.org", 7711).into());
    }

    #[test]
    fn test_parse_path() {
        let addr = Address::parse("/var/run/disque.sock").unwrap();
        assert_eq!(
            addr,
            Address::Unix {
                path: "/var/run/disque.sock".into()
            }
        );
    }

    #[test]
    fn test_parse_missing_host_defaults() {
        let addr = Address::parse(":7712").unwrap();
        assert_eq!(addr, ("127.0.0.1", 7712).into());
    }

    #[test]
    fn test_parse_unknown_scheme_fails() {
        let err = Address::parse("http://example.org").unwrap_err();
        assert!(matches!(err, Error::Address { .. }));
    }

    #[test]
    fn test_parse_bad_port_fails() {
        let err = Address::parse("example.org:notaport").unwrap_err();
        assert!(matches!(err, Error::Address { .. }));
    }

    #[test]
    fn test_from_port() {
        assert_eq!(Address::from(7712), ("127.0.0.1", 7712).into());
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::from(("h", 1)).to_string(), "h:1");
    }
}
