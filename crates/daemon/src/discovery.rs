// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Announces the daemon on the local network so clients can find it without
//! being told an address up front.

use std::net::{Ipv4Addr, UdpSocket};

use thiserror::Error;
use tracing::{info, warn};

const SERVICE_TYPE: &str = "_wormhole._tcp.local.";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("mdns error: {0}")]
    Mdns(#[from] mdns_sd::Error),
}

/// Holds the mDNS daemon and the registered service handle for as long as
/// discovery should stay advertised; dropping it unregisters the service.
pub struct Announcer {
    daemon: mdns_sd::ServiceDaemon,
    fullname: String,
}

impl Announcer {
    /// Register `_wormhole._tcp.local.` with the given port and metadata.
    /// The mDNS instance name is the short hostname — `machine_name`'s
    /// first dot-separated label — not the full (possibly-qualified) name.
    pub fn start(port: u16, machine_name: &str, server_version: &str) -> Result<Self, DiscoveryError> {
        let daemon = mdns_sd::ServiceDaemon::new()?;
        let short_name = machine_name.split('.').next().unwrap_or(machine_name);
        let host_name = format!("{short_name}.local.");
        let properties = [("version", server_version), ("machine_name", machine_name)];

        // Bind to one address rather than every interface's — advertising
        // all of them invites clients onto link-local or VPN addresses that
        // don't actually reach the daemon.
        let ip = local_ipv4().unwrap_or(Ipv4Addr::LOCALHOST);

        let service = mdns_sd::ServiceInfo::new(
            SERVICE_TYPE,
            short_name,
            &host_name,
            ip,
            port,
            &properties[..],
        )?;

        let fullname = service.get_fullname().to_string();
        daemon.register(service)?;
        info!(%fullname, %ip, port, "announcing service on the local network");
        Ok(Self { daemon, fullname })
    }

    pub fn stop(self) {
        if let Err(e) = self.daemon.unregister(&self.fullname) {
            warn!(error = %e, "failed to unregister mdns service cleanly");
        }
    }
}

/// The IPv4 address this machine would use to reach the wider network,
/// found without sending any packets: connecting a UDP socket just asks the
/// kernel to pick a route and bind a matching local address.
fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(203, 0, 113, 1), 9)).ok()?;
    match socket.local_addr().ok()?.ip() {
        std::net::IpAddr::V4(addr) => Some(addr),
        std::net::IpAddr::V6(_) => None,
    }
}
