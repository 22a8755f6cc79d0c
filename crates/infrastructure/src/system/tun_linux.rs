use ferrous_doh_application::ports::{InterfaceOpener, VirtualInterface};
use ferrous_doh_domain::packet::{DNS_OFFSET, IPPROTO_UDP, IPV4_HEADER_LEN};
use ferrous_doh_domain::{DomainError, TunnelConfig};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::net::{Ipv4Addr, UdpSocket};
use std::os::unix::io::AsRawFd;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TUN_DEVICE: &str = "/dev/net/tun";
const IFF_TUN: libc::c_short = 0x0001;
const IFF_NO_PI: libc::c_short = 0x1000;
const TUNSETIFF: libc::c_ulong = 0x400454ca;

/// Closing the fd does not wake a blocked `read`, so `close` pushes this
/// datagram through the device and the reader turns it into end of stream.
pub const STOP_MARKER: [u8; 8] = [2; 8];
pub const STOP_MARKER_PORT: u16 = 2222;

#[repr(C)]
struct IfReq {
    name: [libc::c_char; libc::IFNAMSIZ],
    flags: libc::c_short,
    _pad: [u8; 22],
}

/// Opens `/dev/net/tun` devices and configures them with `ip`.
pub struct LinuxTunOpener;

impl InterfaceOpener for LinuxTunOpener {
    fn open(&self, config: &TunnelConfig) -> Result<Arc<dyn VirtualInterface>, DomainError> {
        let file = create_device(&config.name)?;
        configure_link(config)?;
        configure_resolver(config);
        info!(
            name = %config.name,
            address = %config.address,
            gateway = %config.gateway,
            mtu = config.mtu,
            "Virtual interface up"
        );
        Ok(Arc::new(LinuxTun {
            file,
            name: config.name.clone(),
            address: config.address,
            gateway: config.gateway,
            closed: AtomicBool::new(false),
        }))
    }
}

pub struct LinuxTun {
    file: File,
    name: String,
    address: Ipv4Addr,
    gateway: Ipv4Addr,
    closed: AtomicBool,
}

impl VirtualInterface for LinuxTun {
    fn read(&self, buf: &mut [u8]) -> Result<usize, DomainError> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Ok(0);
            }
            let n = (&self.file)
                .read(buf)
                .map_err(|e| DomainError::InterfaceIo(format!("{}: {}", self.name, e)))?;
            if n == 0 {
                return Ok(0);
            }
            if is_stop_marker(&buf[..n], self.gateway) {
                debug!(name = %self.name, "Stop marker received");
                self.closed.store(true, Ordering::Release);
                return Ok(0);
            }
            // IPv6
            if buf[0] >> 4 != 4 {
                continue;
            }
            return Ok(n);
        }
    }

    fn write(&self, datagram: &[u8]) -> Result<usize, DomainError> {
        (&self.file)
            .write(datagram)
            .map_err(|e| DomainError::InterfaceIo(format!("{}: {}", self.name, e)))
    }

    fn close(&self) -> Result<(), DomainError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let socket = UdpSocket::bind((self.address, 0))
            .map_err(|e| DomainError::InterfaceIo(format!("stop marker bind: {}", e)))?;
        socket
            .send_to(&STOP_MARKER, (self.gateway, STOP_MARKER_PORT))
            .map_err(|e| DomainError::InterfaceIo(format!("stop marker send: {}", e)))?;
        Ok(())
    }
}

/// A UDP datagram to `gateway:2222` carrying exactly the stop marker.
pub fn is_stop_marker(datagram: &[u8], gateway: Ipv4Addr) -> bool {
    if datagram.len() != DNS_OFFSET + STOP_MARKER.len() {
        return false;
    }
    if datagram[0] != 0x45 || datagram[9] != IPPROTO_UDP {
        return false;
    }
    if datagram[16..20] != gateway.octets() {
        return false;
    }
    let dst_port = u16::from_be_bytes([datagram[IPV4_HEADER_LEN + 2], datagram[IPV4_HEADER_LEN + 3]]);
    dst_port == STOP_MARKER_PORT && datagram[DNS_OFFSET..] == STOP_MARKER
}

fn create_device(name: &str) -> Result<File, DomainError> {
    if name.is_empty() || name.len() >= libc::IFNAMSIZ {
        return Err(DomainError::InterfaceOpen(format!(
            "Interface name '{}' must be 1 to {} bytes",
            name,
            libc::IFNAMSIZ - 1
        )));
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(TUN_DEVICE)
        .map_err(|e| DomainError::InterfaceOpen(format!("{}: {}", TUN_DEVICE, e)))?;

    let mut req = IfReq {
        name: [0; libc::IFNAMSIZ],
        flags: IFF_TUN | IFF_NO_PI,
        _pad: [0; 22],
    };
    for (dst, src) in req.name.iter_mut().zip(name.bytes()) {
        *dst = src as libc::c_char;
    }

    // SAFETY: `req` is a properly sized ifreq and outlives the call.
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), TUNSETIFF as _, &mut req) };
    if rc < 0 {
        return Err(DomainError::InterfaceOpen(format!(
            "TUNSETIFF {}: {}",
            name,
            std::io::Error::last_os_error()
        )));
    }
    Ok(file)
}

fn configure_link(config: &TunnelConfig) -> Result<(), DomainError> {
    let cidr = format!("{}/{}", config.address, config.prefix_len());
    let mtu = config.mtu.to_string();
    run_ip(&["addr", "add", &cidr, "dev", &config.name])?;
    run_ip(&["link", "set", "dev", &config.name, "mtu", &mtu, "up"])?;
    Ok(())
}

fn run_ip(args: &[&str]) -> Result<(), DomainError> {
    let output = Command::new("ip")
        .args(args)
        .output()
        .map_err(|e| DomainError::InterfaceOpen(format!("ip {}: {}", args.join(" "), e)))?;
    if !output.status.success() {
        return Err(DomainError::InterfaceOpen(format!(
            "ip {}: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

/// Points systemd-resolved at the tunnel. Hosts without it keep their
/// resolver configuration and only route explicit queries to the gateway.
fn configure_resolver(config: &TunnelConfig) {
    let servers: Vec<String> = config.dns_servers().iter().map(|ip| ip.to_string()).collect();
    let mut dns_args = vec!["dns", config.name.as_str()];
    dns_args.extend(servers.iter().map(String::as_str));

    for args in [dns_args, vec!["domain", config.name.as_str(), "~."]] {
        match Command::new("resolvectl").args(&args).output() {
            Ok(output) if output.status.success() => {}
            Ok(output) => warn!(
                args = %args.join(" "),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "resolvectl failed"
            ),
            Err(e) => {
                warn!(error = %e, "resolvectl unavailable, system resolver left unchanged");
                return;
            }
        }
    }
}
