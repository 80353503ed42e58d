use std::net::Ipv4Addr;

use crate::error::{Result, TransportError};

/// Parse a dotted-quad IPv4 peer address.
///
/// The unspecified (`0.0.0.0`) and broadcast (`255.255.255.255`) addresses
/// cannot identify a single peer and are rejected.
pub fn parse_peer_ipv4(addr: &str) -> Result<Ipv4Addr> {
    let trimmed = addr.trim();
    if trimmed.is_empty() {
        return Err(TransportError::InvalidAddress(addr.to_string()));
    }

    let ip: Ipv4Addr = trimmed
        .parse()
        .map_err(|_| TransportError::InvalidAddress(addr.to_string()))?;

    if ip.is_unspecified() || ip.is_broadcast() {
        return Err(TransportError::InvalidAddress(addr.to_string()));
    }

    Ok(ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_loopback() {
        assert_eq!(
            parse_peer_ipv4("127.0.0.1").unwrap(),
            Ipv4Addr::new(127, 0, 0, 1)
        );
        assert_eq!(
            parse_peer_ipv4(" 10.1.2.3 ").unwrap(),
            Ipv4Addr::new(10, 1, 2, 3)
        );
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(
            parse_peer_ipv4(""),
            Err(TransportError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_peer_ipv4("not-an-ip"),
            Err(TransportError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_peer_ipv4("300.1.1.1"),
            Err(TransportError::InvalidAddress(_))
        ));
    }

    #[test]
    fn rejects_any_and_broadcast() {
        assert!(parse_peer_ipv4("0.0.0.0").is_err());
        assert!(parse_peer_ipv4("255.255.255.255").is_err());
    }
}
