use async_trait::async_trait;
use ferrous_doh_domain::{
    Config, DeviceIdentity, DomainError, DuplicateFilter, ProxyState, TunnelConfig,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::packet_pipeline::PacketPipeline;
use crate::ports::{
    DisabledLeakGuard, InterfaceOpener, LeakGuard, NoopEvents, ProxyBackend, ProxyEvents,
    TransportFactory, UpstreamTransport, VirtualInterface,
};
use crate::services::{BufferPool, UpstreamExchange};

#[derive(Debug, Clone)]
pub struct TunnelProxyOptions {
    pub tunnel: TunnelConfig,
    /// Upstream URL prefix the configuration ID is appended to.
    pub base_url: String,
    pub config_id: String,
    pub retry_interval: Duration,
    pub warm_up_timeout: Duration,
}

impl TunnelProxyOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tunnel: config.tunnel.clone(),
            base_url: config.upstream.base_url.clone(),
            config_id: config.upstream.configuration.clone(),
            retry_interval: config.proxy.retry_interval(),
            warm_up_timeout: config.proxy.warm_up_timeout(),
        }
    }
}

/// External collaborators of the tunnel proxy.
pub struct ProxyPorts {
    pub opener: Arc<dyn InterfaceOpener>,
    pub transports: Arc<dyn TransportFactory>,
    pub leak_guard: Arc<dyn LeakGuard>,
    pub events: Arc<dyn ProxyEvents>,
}

impl ProxyPorts {
    pub fn new(opener: Arc<dyn InterfaceOpener>, transports: Arc<dyn TransportFactory>) -> Self {
        Self {
            opener,
            transports,
            leak_guard: Arc::new(DisabledLeakGuard),
            events: Arc::new(NoopEvents),
        }
    }

    pub fn with_leak_guard(mut self, leak_guard: Arc<dyn LeakGuard>) -> Self {
        self.leak_guard = leak_guard;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn ProxyEvents>) -> Self {
        self.events = events;
        self
    }
}

/// Everything guarded by the lifecycle lock.
struct RunState {
    state: ProxyState,
    interface: Option<Arc<dyn VirtualInterface>>,
    transport: Option<Arc<dyn UpstreamTransport>>,
    /// Shutdown signal of the current run, or the abort signal of the
    /// recovery loop while reasserting.
    shutdown: Option<CancellationToken>,
    /// Parked here between runs; the running pipeline owns it otherwise.
    dedup: Option<DuplicateFilter>,
}

struct ProxyCore {
    options: TunnelProxyOptions,
    opener: Arc<dyn InterfaceOpener>,
    transports: Arc<dyn TransportFactory>,
    leak_guard: Arc<dyn LeakGuard>,
    events: Arc<dyn ProxyEvents>,
    exchange: Arc<UpstreamExchange>,
    pool: Arc<BufferPool>,
    run: Mutex<RunState>,
}

/// DNS53-to-DoH proxy driving a virtual interface.
///
/// State lives behind one async lock and every transition happens while it
/// is held. A run that ends on its own, rather than through `stop`, puts the
/// proxy in `Reasserting` and reopens the interface every retry interval
/// until an attempt succeeds or `stop` is called.
#[derive(Clone)]
pub struct TunnelProxy {
    core: Arc<ProxyCore>,
}

impl TunnelProxy {
    pub fn new(options: TunnelProxyOptions, ports: ProxyPorts) -> Self {
        let url = format!("{}{}", options.base_url, options.config_id);
        let exchange = Arc::new(UpstreamExchange::new(url, &DeviceIdentity::default()));
        let pool = BufferPool::new(options.tunnel.mtu as usize);

        Self {
            core: Arc::new(ProxyCore {
                options,
                opener: ports.opener,
                transports: ports.transports,
                leak_guard: ports.leak_guard,
                events: ports.events,
                exchange,
                pool,
                run: Mutex::new(RunState {
                    state: ProxyState::Stopped,
                    interface: None,
                    transport: None,
                    shutdown: None,
                    dedup: Some(DuplicateFilter::new()),
                }),
            }),
        }
    }

    pub fn exchange(&self) -> &Arc<UpstreamExchange> {
        &self.core.exchange
    }
}

#[async_trait]
impl ProxyBackend for TunnelProxy {
    fn name(&self) -> &'static str {
        "tunnel"
    }

    fn set_config_id(&self, config_id: &str) {
        self.core
            .exchange
            .set_url(format!("{}{}", self.core.options.base_url, config_id));
    }

    fn set_device_info(&self, identity: DeviceIdentity) {
        self.core.exchange.set_identity(&identity);
    }

    async fn state(&self) -> ProxyState {
        self.core.run.lock().await.state
    }

    async fn start(&self) -> Result<(), DomainError> {
        let mut run = self.core.run.lock().await;
        if run.state != ProxyState::Stopped {
            return Ok(());
        }
        self.core.set_state(&mut run, ProxyState::Starting);

        if let Err(e) = self.core.launch(&mut run).await {
            self.core.set_state(&mut run, ProxyState::Stopped);
            return Err(e);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), DomainError> {
        let mut run = self.core.run.lock().await;
        if matches!(run.state, ProxyState::Stopped | ProxyState::Starting) {
            return Ok(());
        }
        self.core.set_state(&mut run, ProxyState::Stopping);

        let mut result = Ok(());
        if let Some(interface) = run.interface.take() {
            result = interface.close();
        }
        if let Some(shutdown) = run.shutdown.take() {
            shutdown.cancel();
        }
        run.transport = None;
        result
    }
}

impl ProxyCore {
    fn set_state(&self, run: &mut RunState, state: ProxyState) {
        if run.state == state {
            return;
        }
        debug!(from = %run.state, to = %state, "Proxy state change");
        run.state = state;
        self.events.on_state_change(state);
    }

    /// Opens the interface, builds a fresh transport and spawns the run.
    async fn launch(self: &Arc<Self>, run: &mut RunState) -> Result<(), DomainError> {
        let opener = Arc::clone(&self.opener);
        let tunnel = self.options.tunnel.clone();
        let interface = tokio::task::spawn_blocking(move || opener.open(&tunnel))
            .await
            .map_err(|e| DomainError::InterfaceOpen(e.to_string()))??;

        let transport = match self.transports.build(Arc::clone(&self.events)) {
            Ok(transport) => transport,
            Err(e) => {
                if let Err(close_err) = interface.close() {
                    debug!(error = %close_err, "Interface close after failed transport build");
                }
                return Err(e);
            }
        };

        let shutdown = CancellationToken::new();
        run.interface = Some(Arc::clone(&interface));
        run.transport = Some(Arc::clone(&transport));
        run.shutdown = Some(shutdown.clone());
        let dedup = run.dedup.take().unwrap_or_default();

        tokio::spawn(Arc::clone(self).run_pipeline(interface, transport, shutdown, dedup));
        Ok(())
    }

    fn run_pipeline(
        self: Arc<Self>,
        interface: Arc<dyn VirtualInterface>,
        transport: Arc<dyn UpstreamTransport>,
        shutdown: CancellationToken,
        dedup: DuplicateFilter,
    ) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            if let Err(e) = self
                .leak_guard
                .start(shutdown.clone(), Arc::clone(&self.events))
                .await
            {
                self.events
                    .on_error(&format!("Cannot start leak guard: {}", e));
            }

            self.spawn_warm_up(Arc::clone(&transport), shutdown.clone());

            let handshake = {
                let core = Arc::clone(&self);
                async move { core.confirm_started().await }
            };
            let pipeline = PacketPipeline::new(
                interface,
                transport,
                Arc::clone(&self.exchange),
                Arc::clone(&self.pool),
                self.options.tunnel.resolver_address(),
                shutdown,
            )
            .with_events(Arc::clone(&self.events))
            .with_dedup(dedup);

            let dedup = pipeline.run(handshake).await;
            self.restart_or_stop(dedup).await;
        })
    }

    fn spawn_warm_up(&self, transport: Arc<dyn UpstreamTransport>, shutdown: CancellationToken) {
        let events = Arc::clone(&self.events);
        let timeout = self.options.warm_up_timeout;
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                outcome = tokio::time::timeout(timeout, transport.warm_up()) => match outcome {
                    Ok(Ok(())) => debug!("Upstream warm-up complete"),
                    Ok(Err(e)) => events.on_error(&format!("Upstream warm-up failed: {}", e)),
                    Err(_) => events.on_error("Upstream warm-up timed out"),
                },
            }
        });
    }

    /// Reader handshake: moves a starting run to `Started`.
    async fn confirm_started(&self) -> bool {
        let mut run = self.run.lock().await;
        if !run.state.expects_traffic() {
            return false;
        }
        self.set_state(&mut run, ProxyState::Started);
        true
    }

    async fn restart_or_stop(self: &Arc<Self>, dedup: DuplicateFilter) {
        let abort = CancellationToken::new();
        {
            let mut run = self.run.lock().await;
            run.dedup = Some(dedup);
            match run.state {
                ProxyState::Stopping => {
                    self.set_state(&mut run, ProxyState::Stopped);
                    return;
                }
                ProxyState::Stopped => {
                    warn!("Run ended while proxy already stopped");
                    return;
                }
                _ => {}
            }
            run.interface = None;
            run.transport = None;
            run.shutdown = Some(abort.clone());
            self.set_state(&mut run, ProxyState::Reasserting);
        }

        loop {
            tokio::select! {
                _ = abort.cancelled() => {}
                _ = tokio::time::sleep(self.options.retry_interval) => {}
            }

            let mut run = self.run.lock().await;
            match run.state {
                ProxyState::Reasserting => {}
                ProxyState::Stopping => {
                    self.set_state(&mut run, ProxyState::Stopped);
                    return;
                }
                _ => return,
            }

            match self.launch(&mut run).await {
                Ok(()) => {
                    info!("Proxy restarted");
                    self.set_state(&mut run, ProxyState::Starting);
                    return;
                }
                Err(e) => {
                    self.events.on_error(&format!("Restart failed: {}", e));
                }
            }
        }
    }
}
