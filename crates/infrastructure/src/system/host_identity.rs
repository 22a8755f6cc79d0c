use ferrous_doh_domain::DeviceIdentity;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Hex digits of the machine-id digest reported as the device ID.
const SHORT_ID_LEN: usize = 5;

/// Collects the identity reported to the upstream resolver. Every probe is
/// best effort: an unknown field is left empty and simply not sent.
pub fn probe_device_identity(version: &str) -> DeviceIdentity {
    let identity = DeviceIdentity::new(
        host_name(),
        model(),
        machine_id().map(|id| short_machine_id(&id)).unwrap_or_default(),
        version,
    );
    debug!(
        name = %identity.name,
        model = %identity.model,
        id = %identity.id,
        "Probed device identity"
    );
    identity
}

/// Short, stable, non-reversible form of an OS machine identifier.
pub fn short_machine_id(raw: &str) -> String {
    let digest = Sha256::digest(raw.trim().as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..SHORT_ID_LEN].to_string()
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_default()
}

#[cfg(target_os = "linux")]
fn model() -> String {
    std::fs::read_to_string("/sys/class/dmi/id/product_name")
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

#[cfg(windows)]
fn model() -> String {
    std::process::Command::new("wmic")
        .args(["computersystem", "get", "model"])
        .output()
        .ok()
        .and_then(|out| {
            String::from_utf8_lossy(&out.stdout)
                .lines()
                .nth(1)
                .map(|line| line.trim().to_string())
        })
        .unwrap_or_default()
}

#[cfg(not(any(target_os = "linux", windows)))]
fn model() -> String {
    String::new()
}

#[cfg(target_os = "linux")]
fn machine_id() -> Option<String> {
    ["/etc/machine-id", "/var/lib/dbus/machine-id"]
        .iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
        .filter(|id| !id.trim().is_empty())
}

#[cfg(windows)]
fn machine_id() -> Option<String> {
    let out = std::process::Command::new("reg")
        .args([
            "query",
            r"HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Cryptography",
            "/v",
            "MachineGuid",
        ])
        .output()
        .ok()?;
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .find(|line| line.contains("MachineGuid"))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

#[cfg(not(any(target_os = "linux", windows)))]
fn machine_id() -> Option<String> {
    None
}
