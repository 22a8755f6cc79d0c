use ferrous_doh_application::ports::{ProxyBackend, ProxyEvents};
use ferrous_doh_domain::{BackendKind, Config, Endpoint};
use ferrous_doh_infrastructure::system::{native_doh_available, NativeDohBackend, SystemNetsh};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::info;

/// Picks and wires the backend. `auto` prefers native OS DoH when the probe
/// finds it.
pub fn build_backend(
    config: &Config,
    events: Arc<dyn ProxyEvents>,
) -> anyhow::Result<Arc<dyn ProxyBackend>> {
    let kind = match config.proxy.backend {
        BackendKind::Auto if native_doh_available(&SystemNetsh) => BackendKind::Native,
        BackendKind::Auto => BackendKind::Tunnel,
        other => other,
    };
    info!(requested = config.proxy.backend.as_str(), selected = kind.as_str(), "Backend selected");

    match kind {
        BackendKind::Native => Ok(Arc::new(native_backend(config, events)?)),
        _ => tunnel_backend(config, events),
    }
}

fn native_backend(
    config: &Config,
    events: Arc<dyn ProxyEvents>,
) -> anyhow::Result<NativeDohBackend> {
    let mut servers: Vec<IpAddr> = Vec::new();
    for spec in &config.upstream.anycast_endpoints {
        let endpoint: Endpoint = spec.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        servers.extend(endpoint.bootstrap_ips.iter().filter(|ip| ip.is_ipv4()));
    }
    Ok(NativeDohBackend::new(Arc::new(SystemNetsh), servers).with_events(events))
}

#[cfg(target_os = "linux")]
fn tunnel_backend(
    config: &Config,
    events: Arc<dyn ProxyEvents>,
) -> anyhow::Result<Arc<dyn ProxyBackend>> {
    use ferrous_doh_application::ports::{DisabledLeakGuard, LeakGuard};
    use ferrous_doh_application::use_cases::{ProxyPorts, TunnelProxy, TunnelProxyOptions};
    use ferrous_doh_infrastructure::doh::EndpointTransportFactory;
    use ferrous_doh_infrastructure::system::{LinuxTunOpener, ProcessLeakGuard};

    let leak_guard: Arc<dyn LeakGuard> = if config.leak_guard.enabled {
        Arc::new(ProcessLeakGuard::new(config.leak_guard.helper_path()))
    } else {
        Arc::new(DisabledLeakGuard)
    };

    let ports = ProxyPorts::new(
        Arc::new(LinuxTunOpener),
        Arc::new(EndpointTransportFactory::new(config.upstream.clone())),
    )
    .with_leak_guard(leak_guard)
    .with_events(events);

    Ok(Arc::new(TunnelProxy::new(
        TunnelProxyOptions::from_config(config),
        ports,
    )))
}

#[cfg(not(target_os = "linux"))]
fn tunnel_backend(
    _config: &Config,
    _events: Arc<dyn ProxyEvents>,
) -> anyhow::Result<Arc<dyn ProxyBackend>> {
    anyhow::bail!("the tunnel backend needs a virtual interface driver, which this platform lacks")
}
