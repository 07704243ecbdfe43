//! Endpoint addresses

use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;

use super::error::TransportError;

const SCHEME: &str = "tcp://";

/// Where an endpoint lives and which side of the connection we are
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `tcp://*:PORT`: listen on all interfaces
    Bind(SocketAddr),
    /// `tcp://HOST:PORT`: connect to a single peer
    Connect(String),
}

impl Address {
    /// Whether this endpoint listens
    pub fn is_bind(&self) -> bool {
        matches!(self, Address::Bind(_))
    }
}

impl FromStr for Address {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidAddress(s.to_string());

        let rest = s.strip_prefix(SCHEME).ok_or_else(invalid)?;
        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;
        let port: u16 = port.parse().map_err(|_| invalid())?;

        match host {
            "" => Err(invalid()),
            "*" => Ok(Address::Bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))),
            _ => Ok(Address::Connect(format!("{}:{}", host, port))),
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Bind(addr) => write!(f, "{}*:{}", SCHEME, addr.port()),
            Address::Connect(addr) => write!(f, "{}{}", SCHEME, addr),
        }
    }
}
