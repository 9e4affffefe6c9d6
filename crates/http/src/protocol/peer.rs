use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Addresses of both ends of an accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    pub remote: SocketAddr,
    pub local: SocketAddr,
}

impl PeerInfo {
    pub fn new(remote: SocketAddr, local: SocketAddr) -> Self {
        Self { remote, local }
    }
}

impl Default for PeerInfo {
    fn default() -> Self {
        let unspecified = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
        Self { remote: unspecified, local: unspecified }
    }
}
