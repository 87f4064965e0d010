//! Port occupancy checks before launching the server.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

const CONNECT_TIMEOUT_MS: u64 = 200;

const LOOPBACKS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::LOCALHOST),
    IpAddr::V6(Ipv6Addr::LOCALHOST),
];

pub struct PortManager;

impl PortManager {
    /// Check whether another process is listening on the port.
    ///
    /// Both the IPv4 and IPv6 loopback addresses are probed. A successful
    /// connect means a listener exists. A bind that fails with `AddrInUse`
    /// catches listeners that refuse loopback connections. Other bind
    /// failures (privileged ports, IPv6 disabled) are not treated as
    /// occupancy.
    pub fn is_in_use(port: u16) -> bool {
        LOOPBACKS
            .iter()
            .any(|&ip| Self::is_bound(SocketAddr::new(ip, port)))
    }

    fn is_bound(addr: SocketAddr) -> bool {
        if TcpStream::connect_timeout(&addr, Duration::from_millis(CONNECT_TIMEOUT_MS)).is_ok() {
            return true;
        }

        match TcpListener::bind(addr) {
            Ok(_) => false,
            Err(e) => e.kind() == ErrorKind::AddrInUse,
        }
    }
}
