use async_trait::async_trait;
use ferrous_doh_application::ports::{NoopEvents, ProxyBackend, ProxyEvents};
use ferrous_doh_domain::{DeviceIdentity, DomainError, ProxyState};
use reqwest::Url;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::netsh::{list_interfaces, NetshRunner};

pub const NATIVE_DOH_TEMPLATE_BASE: &str = "https://windows.dns.nextdns.io/";

#[derive(Default)]
struct NativeSettings {
    config_id: String,
    identity: DeviceIdentity,
    state: ProxyState,
}

/// Hands DNS encryption to the operating system instead of tunnelling it.
///
/// Start registers a DoH template for each server address, points every IPv4
/// interface at those servers and turns DoH on globally. Stop puts every
/// interface back on DHCP-provided resolvers. Only `Stopped` and `Started`
/// are ever reported.
pub struct NativeDohBackend {
    runner: Arc<dyn NetshRunner>,
    servers: Vec<IpAddr>,
    settings: Mutex<NativeSettings>,
    /// Held across a whole start or stop.
    transition: tokio::sync::Mutex<()>,
    events: Arc<dyn ProxyEvents>,
}

impl NativeDohBackend {
    pub fn new(runner: Arc<dyn NetshRunner>, servers: Vec<IpAddr>) -> Self {
        Self {
            runner,
            servers,
            settings: Mutex::new(NativeSettings::default()),
            transition: tokio::sync::Mutex::new(()),
            events: Arc::new(NoopEvents),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn ProxyEvents>) -> Self {
        self.events = events;
        self
    }

    /// DoH template registered with the OS for the current settings.
    pub fn template_url(&self) -> Result<String, DomainError> {
        let settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        template_url(NATIVE_DOH_TEMPLATE_BASE, &settings.config_id, &settings.identity)
    }

    fn set_state(&self, state: ProxyState) {
        let changed = {
            let mut settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
            let changed = settings.state != state;
            settings.state = state;
            changed
        };
        if changed {
            self.events.on_state_change(state);
        }
    }

    fn current_state(&self) -> ProxyState {
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state
    }

    async fn run_blocking<F>(&self, job: F) -> Result<(), DomainError>
    where
        F: FnOnce(&dyn NetshRunner) -> Result<(), DomainError> + Send + 'static,
    {
        let runner = Arc::clone(&self.runner);
        tokio::task::spawn_blocking(move || job(runner.as_ref()))
            .await
            .map_err(|e| DomainError::NativeDoh(format!("netsh task failed: {}", e)))?
    }
}

/// `<base><id>` or, when a device name is known,
/// `<base><id>/<name>/<model>/<device-id>` with each segment escaped.
pub fn template_url(
    base: &str,
    config_id: &str,
    identity: &DeviceIdentity,
) -> Result<String, DomainError> {
    let mut url = Url::parse(base)
        .map_err(|e| DomainError::NativeDoh(format!("Invalid template base '{}': {}", base, e)))?;
    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            DomainError::NativeDoh(format!("Template base '{}' cannot carry a path", base))
        })?;
        segments.pop_if_empty().push(config_id);
        if !identity.name.is_empty() {
            segments
                .push(&identity.name)
                .push(&identity.model)
                .push(&identity.id);
        }
    }
    Ok(url.to_string())
}

fn apply_native_doh(
    runner: &dyn NetshRunner,
    servers: &[IpAddr],
    template: &str,
) -> Result<(), DomainError> {
    let interfaces = list_interfaces(runner)?;
    let template_arg = format!("dohtemplate={}", template);

    for (index, server) in servers.iter().enumerate() {
        let server_arg = format!("server={}", server);
        runner
            .run(&[
                "dns",
                "set",
                "encryption",
                &server_arg,
                &template_arg,
                "autoupgrade=yes",
                "udpfallback=no",
            ])
            .map_err(|e| {
                DomainError::NativeDoh(format!("set DoH template for {}: {}", server, e))
            })?;

        let address_arg = format!("address={}", server);
        for id in &interfaces {
            let name_arg = format!("name={}", id);
            let result = if index == 0 {
                runner.run(&[
                    "dns",
                    "set",
                    "dnsserver",
                    &name_arg,
                    "source=static",
                    &address_arg,
                    "register=both",
                ])
            } else {
                runner.run(&["dns", "add", "dnsserver", &name_arg, &address_arg])
            };
            result.map_err(|e| {
                DomainError::NativeDoh(format!(
                    "point interface {} at {}: {}",
                    id, server, e
                ))
            })?;
        }
    }

    runner
        .run(&["dns", "set", "global", "doh=yes"])
        .map_err(|e| DomainError::NativeDoh(format!("set global DoH: {}", e)))?;
    Ok(())
}

fn restore_dhcp(runner: &dyn NetshRunner) -> Result<(), DomainError> {
    for id in list_interfaces(runner)? {
        let name_arg = format!("name={}", id);
        runner.run(&["dns", "set", "dnsserver", &name_arg, "source=dhcp"])?;
    }
    Ok(())
}

#[async_trait]
impl ProxyBackend for NativeDohBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn set_config_id(&self, config_id: &str) {
        let mut settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        settings.config_id = config_id.to_string();
    }

    fn set_device_info(&self, identity: DeviceIdentity) {
        let mut settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        settings.identity = identity;
    }

    async fn state(&self) -> ProxyState {
        self.current_state()
    }

    async fn start(&self) -> Result<(), DomainError> {
        let _transition = self.transition.lock().await;
        if self.current_state() == ProxyState::Started {
            return Ok(());
        }
        if self.servers.is_empty() {
            return Err(DomainError::NativeDoh(
                "no server addresses to register".to_string(),
            ));
        }

        let template = self.template_url()?;
        let servers = self.servers.clone();
        info!(template = %template, servers = ?servers, "Enabling native DoH");

        if let Err(e) = self
            .run_blocking(move |runner| apply_native_doh(runner, &servers, &template))
            .await
        {
            warn!(error = %e, "Failed to enable native DoH");
            self.events.on_error(&e.to_string());
            return Err(e);
        }

        self.set_state(ProxyState::Started);
        Ok(())
    }

    async fn stop(&self) -> Result<(), DomainError> {
        let _transition = self.transition.lock().await;
        if self.current_state() == ProxyState::Stopped {
            return Ok(());
        }

        if let Err(e) = self.run_blocking(restore_dhcp).await {
            warn!(error = %e, "Failed to restore DHCP resolvers");
            self.events.on_error(&e.to_string());
            return Err(e);
        }

        info!("Native DoH disabled");
        self.set_state(ProxyState::Stopped);
        Ok(())
    }
}
