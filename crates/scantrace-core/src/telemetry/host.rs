//! Host identity for the root span

use std::io;
use std::net::IpAddr;

use tracing::warn;

/// Source of host facts attached to the root span
pub trait HostProbe: Send + Sync {
    /// Host name, if it can be determined
    fn hostname(&self) -> Option<String>;

    /// CPU architecture
    fn arch(&self) -> String {
        std::env::consts::ARCH.to_string()
    }

    /// Operating system family
    fn os(&self) -> String {
        std::env::consts::OS.to_string()
    }

    /// All local interface addresses, loopback included
    fn ip_addresses(&self) -> io::Result<Vec<IpAddr>>;
}

/// Probes the machine the process runs on
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostProbe for SystemHost {
    fn hostname(&self) -> Option<String> {
        match hostname::get() {
            Ok(name) => Some(name.to_string_lossy().into_owned()),
            Err(e) => {
                warn!("Failed to read hostname: {}", e);
                None
            }
        }
    }

    fn ip_addresses(&self) -> io::Result<Vec<IpAddr>> {
        Ok(if_addrs::get_if_addrs()?
            .into_iter()
            .map(|iface| iface.ip())
            .collect())
    }
}

/// Fixed host facts, for callers that already know them
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    /// Host name
    pub hostname: Option<String>,
    /// CPU architecture
    pub arch: String,
    /// Operating system family
    pub os: String,
    /// `None` makes address enumeration fail
    pub ip_addresses: Option<Vec<IpAddr>>,
}

impl HostProbe for StaticHost {
    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }

    fn arch(&self) -> String {
        self.arch.clone()
    }

    fn os(&self) -> String {
        self.os.clone()
    }

    fn ip_addresses(&self) -> io::Result<Vec<IpAddr>> {
        self.ip_addresses
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "no interfaces configured"))
    }
}

/// Comma-joined non-loopback addresses, or `None` if enumeration failed
pub fn joined_ip_addresses(probe: &dyn HostProbe) -> Option<String> {
    match probe.ip_addresses() {
        Ok(addrs) => Some(
            addrs
                .iter()
                .filter(|ip| !ip.is_loopback())
                .map(IpAddr::to_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Err(e) => {
            warn!("Failed to enumerate local IP addresses, omitting ip_addresses: {}", e);
            None
        }
    }
}
