//! Connection options.

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::header::MessageHeader;

/// Default port of a MongoDB server.
pub const DEFAULT_PORT: u16 = 27017;

/// Connection options for the transport drivers.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Hostname or IP address.
    ///
    /// Default: `""`
    pub host: String,

    /// Port number of the server.
    ///
    /// Default: `27017`
    pub port: u16,

    /// Unix socket path. Takes precedence over `host`/`port`.
    ///
    /// Default: `None`
    pub socket: Option<String>,

    /// Set `TCP_NODELAY` on TCP connections.
    ///
    /// Default: `true`
    pub nodelay: bool,

    /// Maximum number of bytes requested from the socket per read.
    ///
    /// Default: `16384`
    pub read_chunk_size: usize,

    /// Largest `totalLength` accepted from the peer. The parser itself has no
    /// limit; the drivers reject a header announcing more than this.
    ///
    /// Default: `48000000`
    pub max_message_size: usize,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            socket: None,
            nodelay: true,
            read_chunk_size: 16 * 1024,
            max_message_size: 48_000_000,
        }
    }
}

impl Opts {
    /// `host:port` for TCP connections.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject a header announcing more than `max_message_size` bytes.
    pub fn check_message_size(&self, header: &MessageHeader) -> Result<()> {
        if header.total_length() > self.max_message_size {
            tracing::warn!(
                length = header.message_length,
                max = self.max_message_size,
                "rejecting oversized message"
            );
            return Err(Error::Protocol(format!(
                "message of {} bytes exceeds max_message_size {}",
                header.message_length, self.max_message_size
            )));
        }
        Ok(())
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::InvalidUsage(format!(
            "Invalid {key}: expected a positive integer, got {value}"
        ))),
    }
}

impl TryFrom<&Url> for Opts {
    type Error = Error;

    /// Parse a connection URL.
    ///
    /// Format: `mongodb://host[:port][/][?param1=value1&param2=value2&..]`
    ///
    /// Supported query parameters:
    /// - `socket`: Unix socket path
    /// - `nodelay`: true/True/1/yes/on or false/False/0/no/off
    /// - `read_chunk_size`: bytes per socket read (positive integer)
    /// - `max_message_size`: largest accepted message (positive integer)
    ///
    /// Other parameters are ignored.
    fn try_from(url: &Url) -> Result<Self> {
        if url.scheme() != "mongodb" {
            return Err(Error::InvalidUsage(format!(
                "Invalid scheme: expected 'mongodb://', got '{}://'",
                url.scheme()
            )));
        }

        let mut opts = Opts {
            host: url.host_str().unwrap_or("localhost").to_string(),
            port: url.port().unwrap_or(DEFAULT_PORT),
            ..Opts::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "socket" => {
                    opts.socket = Some(value.to_string());
                }
                "nodelay" => {
                    opts.nodelay = match value.as_ref() {
                        "true" | "True" | "1" | "yes" | "on" => true,
                        "false" | "False" | "0" | "no" | "off" => false,
                        _ => {
                            return Err(Error::InvalidUsage(format!(
                                "Invalid nodelay: {}",
                                value
                            )));
                        }
                    };
                }
                "read_chunk_size" => {
                    opts.read_chunk_size = parse_positive(&key, &value)?;
                }
                "max_message_size" => {
                    opts.max_message_size = parse_positive(&key, &value)?;
                }
                _ => {
                    tracing::debug!("Ignoring connection parameter: {}", key);
                }
            }
        }

        Ok(opts)
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        let url = Url::parse(s).map_err(|e| Error::InvalidUsage(format!("Invalid URL: {}", e)))?;
        Self::try_from(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Opts::try_from("mongodb://127.0.0.1").unwrap();
        assert_eq!(opts.host, "127.0.0.1");
        assert_eq!(opts.port, 27017);
        assert!(opts.nodelay);
        assert_eq!(opts.read_chunk_size, 16384);
        assert_eq!(opts.max_message_size, 48_000_000);
        assert_eq!(opts.addr(), "127.0.0.1:27017");
    }

    #[test]
    fn test_params() {
        let opts = Opts::try_from(
            "mongodb://db.local:27117/?nodelay=off&read_chunk_size=7&max_message_size=1024&w=1",
        )
        .unwrap();
        assert_eq!(opts.port, 27117);
        assert!(!opts.nodelay);
        assert_eq!(opts.read_chunk_size, 7);
        assert_eq!(opts.max_message_size, 1024);
    }

    #[test]
    fn test_message_size() {
        use crate::protocol::types::OpCode;

        let opts = Opts {
            max_message_size: 64,
            ..Opts::default()
        };
        let mut header = MessageHeader {
            message_length: 64,
            request_id: 0,
            response_to: 0,
            op_code: OpCode::Reply,
        };
        assert!(opts.check_message_size(&header).is_ok());
        header.message_length = 65;
        assert!(matches!(
            opts.check_message_size(&header),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_invalid() {
        assert!(Opts::try_from("postgres://localhost").is_err());
        assert!(Opts::try_from("mongodb://localhost/?read_chunk_size=0").is_err());
        assert!(Opts::try_from("mongodb://localhost/?nodelay=maybe").is_err());
        assert!(Opts::try_from("not a url").is_err());
    }
}
