// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Base URL resolution for share links.

use std::net::{IpAddr, UdpSocket};

use tracing::debug;

/// Pick the base URL that share links are built on.
///
/// A configured public base URL always wins. Otherwise the inbound request
/// host is used; when that host is loopback it is swapped for this machine's
/// LAN address so the link works from another device on the same network.
pub fn resolve_base_url(public_base_url: Option<&str>, request_host: Option<&str>) -> String {
    if let Some(base) = public_base_url.map(str::trim).filter(|b| !b.is_empty()) {
        return base.trim_end_matches('/').to_owned();
    }

    let host = request_host
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost");
    let (name, port) = split_host_port(host);

    if is_loopback_host(name) {
        if let Some(lan) = lan_address() {
            let lan = match lan {
                IpAddr::V6(v6) => format!("[{v6}]"),
                IpAddr::V4(v4) => v4.to_string(),
            };
            debug!(%lan, "loopback request host replaced with LAN address");
            return match port {
                Some(port) => format!("http://{lan}:{port}"),
                None => format!("http://{lan}"),
            };
        }
    }
    format!("http://{host}")
}

/// Split `host[:port]`, understanding bracketed IPv6 literals.
fn split_host_port(host: &str) -> (&str, Option<&str>) {
    if let Some(rest) = host.strip_prefix('[') {
        if let Some((addr, tail)) = rest.split_once(']') {
            return (addr, tail.strip_prefix(':'));
        }
        return (host, None);
    }
    match host.rsplit_once(':') {
        // A bare IPv6 address has more than one colon and no port.
        Some((name, port)) if !name.contains(':') => (name, Some(port)),
        _ => (host, None),
    }
}

fn is_loopback_host(name: &str) -> bool {
    name.eq_ignore_ascii_case("localhost")
        || name.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

/// Best-effort non-loopback address of this machine.
///
/// Connecting a UDP socket sends nothing; it only makes the OS choose the
/// outbound interface, whose address we then read back.
pub fn lan_address() -> Option<IpAddr> {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|s| {
            s.connect("8.8.8.8:53")?;
            s.local_addr()
        })
        .map(|addr| addr.ip())
        .ok()
        .filter(|ip| !ip.is_loopback() && !ip.is_unspecified())
}
