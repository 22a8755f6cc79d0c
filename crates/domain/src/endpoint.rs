use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

const HTTPS_PREFIX: &str = "https://";
const DEFAULT_HTTPS_PORT: u16 = 443;

/// A DoH server candidate.
///
/// Written as `https://host[:port][/path][#ip1,ip2]`. The fragment lists
/// bootstrap addresses the client connects to directly, so reaching the
/// endpoint never requires a DNS lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub hostname: Arc<str>,
    pub port: u16,
    pub path: Arc<str>,
    pub bootstrap_ips: Vec<IpAddr>,
}

impl Endpoint {
    pub fn new(hostname: &str, bootstrap_ips: Vec<IpAddr>) -> Self {
        Self {
            hostname: hostname.into(),
            port: DEFAULT_HTTPS_PORT,
            path: "/".into(),
            bootstrap_ips,
        }
    }

    /// `https://host[:port]` without path or fragment.
    pub fn origin(&self) -> String {
        if self.port == DEFAULT_HTTPS_PORT {
            format!("{}{}", HTTPS_PREFIX, self.hostname)
        } else {
            format!("{}{}:{}", HTTPS_PREFIX, self.hostname, self.port)
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.origin(), self.path)
    }

    pub fn is_bootstrapped(&self) -> bool {
        !self.bootstrap_ips.is_empty()
    }

    pub fn bootstrap_addrs(&self) -> Vec<SocketAddr> {
        self.bootstrap_ips
            .iter()
            .map(|ip| SocketAddr::new(*ip, self.port))
            .collect()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.origin())?;
        if &*self.path != "/" {
            write!(f, "{}", self.path)?;
        }
        if !self.bootstrap_ips.is_empty() {
            let ips: Vec<String> = self.bootstrap_ips.iter().map(|ip| ip.to_string()).collect();
            write!(f, "#{}", ips.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .trim()
            .strip_prefix(HTTPS_PREFIX)
            .ok_or_else(|| format!("Endpoint '{}' must start with {}", s, HTTPS_PREFIX))?;

        let (location, fragment) = match rest.split_once('#') {
            Some((location, fragment)) => (location, Some(fragment)),
            None => (rest, None),
        };

        let (authority, path) = match location.find('/') {
            Some(idx) => (&location[..idx], &location[idx..]),
            None => (location, "/"),
        };

        let (hostname, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("Invalid port in endpoint '{}'", s))?;
                (host, port)
            }
            None => (authority, DEFAULT_HTTPS_PORT),
        };

        if hostname.is_empty() {
            return Err(format!("Endpoint '{}' has no hostname", s));
        }

        let bootstrap_ips = match fragment {
            Some(list) if !list.is_empty() => list
                .split(',')
                .map(|ip| {
                    ip.trim()
                        .parse::<IpAddr>()
                        .map_err(|_| format!("Invalid bootstrap IP '{}' in endpoint '{}'", ip, s))
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };

        Ok(Self {
            hostname: hostname.into(),
            port,
            path: path.into(),
            bootstrap_ips,
        })
    }
}
