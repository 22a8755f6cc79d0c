pub mod host_identity;
pub mod leak_guard;
pub mod native_doh;
pub mod netsh;
#[cfg(target_os = "linux")]
pub mod tun_linux;

pub use host_identity::{probe_device_identity, short_machine_id};
pub use leak_guard::ProcessLeakGuard;
pub use native_doh::{template_url, NativeDohBackend, NATIVE_DOH_TEMPLATE_BASE};
pub use netsh::{native_doh_available, parse_interface_ids, NetshRunner, SystemNetsh};
#[cfg(target_os = "linux")]
pub use tun_linux::{LinuxTun, LinuxTunOpener};
