use std::net::UdpSocket;

use tracing::debug;

/// Detect the machine's LAN address by opening a UDP socket toward a public
/// address and reading the chosen local endpoint. No packet is sent.
///
/// Falls back to loopback when the host has no route; app `{name}Local`
/// URLs then degrade to the same value as the localhost URL.
pub fn detect_local_ip() -> String {
    match local_ip_via_udp() {
        Some(ip) => ip,
        None => {
            debug!("could not determine LAN address, using 127.0.0.1");
            "127.0.0.1".to_string()
        }
    }
}

fn local_ip_via_udp() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip().to_string())
}
