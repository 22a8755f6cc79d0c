use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Addressing of the virtual interface.
///
/// Defaults live in TEST-NET-1 (192.0.2.0/24) so they never collide with a
/// routable network. The gateway doubles as the resolver address handed to
/// the OS, which makes every plaintext query travel through the tunnel.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TunnelConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_address")]
    pub address: Ipv4Addr,

    #[serde(default = "default_gateway")]
    pub gateway: Ipv4Addr,

    #[serde(default = "default_netmask")]
    pub netmask: Ipv4Addr,

    /// Resolvers announced to the OS; empty means "the gateway only".
    #[serde(default)]
    pub dns: Vec<Ipv4Addr>,

    #[serde(default = "default_mtu")]
    pub mtu: u16,
}

impl TunnelConfig {
    /// Address queries must be sent to for the tunnel to answer them.
    pub fn resolver_address(&self) -> Ipv4Addr {
        self.gateway
    }

    pub fn dns_servers(&self) -> Vec<Ipv4Addr> {
        if self.dns.is_empty() {
            vec![self.gateway]
        } else {
            self.dns.clone()
        }
    }

    pub fn prefix_len(&self) -> u8 {
        u32::from(self.netmask).count_ones() as u8
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            address: default_address(),
            gateway: default_gateway(),
            netmask: default_netmask(),
            dns: Vec::new(),
            mtu: default_mtu(),
        }
    }
}

fn default_name() -> String {
    "ferrous-doh0".to_string()
}

fn default_address() -> Ipv4Addr {
    Ipv4Addr::new(192, 0, 2, 43)
}

fn default_gateway() -> Ipv4Addr {
    Ipv4Addr::new(192, 0, 2, 42)
}

fn default_netmask() -> Ipv4Addr {
    Ipv4Addr::new(255, 255, 255, 0)
}

fn default_mtu() -> u16 {
    1500
}
