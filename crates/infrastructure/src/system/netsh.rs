use ferrous_doh_domain::DomainError;
use std::process::Command;
use tracing::debug;

/// Executes `netsh` with the given arguments and returns its stdout.
/// Blocking.
pub trait NetshRunner: Send + Sync {
    fn run(&self, args: &[&str]) -> Result<String, DomainError>;
}

/// Runs the real `netsh.exe`.
pub struct SystemNetsh;

impl NetshRunner for SystemNetsh {
    fn run(&self, args: &[&str]) -> Result<String, DomainError> {
        debug!(args = %args.join(" "), "Running netsh");
        let output = Command::new("netsh.exe")
            .args(args)
            .output()
            .map_err(|e| DomainError::NativeDoh(format!("netsh {}: {}", args.join(" "), e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(DomainError::NativeDoh(format!(
                "netsh {}: {} ({})",
                args.join(" "),
                stdout.trim(),
                output.status
            )));
        }
        Ok(stdout)
    }
}

/// The OS supports native DoH when it can list its encryption settings.
pub fn native_doh_available(runner: &dyn NetshRunner) -> bool {
    runner.run(&["dns", "show", "encryption"]).is_ok()
}

/// Interface indexes from `netsh interface ipv4 show interfaces`: every line
/// whose first field is a number.
pub fn parse_interface_ids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|field| field.parse::<u32>().ok())
        .collect()
}

pub(crate) fn list_interfaces(runner: &dyn NetshRunner) -> Result<Vec<u32>, DomainError> {
    let output = runner.run(&["interface", "ipv4", "show", "interfaces"])?;
    Ok(parse_interface_ids(&output))
}
