use async_trait::async_trait;
use bytes::Bytes;
use ferrous_doh_application::ports::{DohRequest, DohResponse, ProxyEvents, ResponseStream};
use ferrous_doh_domain::{DomainError, Endpoint, ProxyState};
use ferrous_doh_infrastructure::doh::{EndpointProvider, EndpointSender};
use std::collections::HashSet;
use ferrous_doh_infrastructure::system::NetshRunner;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct RecordingEvents {
    states: Mutex<Vec<ProxyState>>,
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states(&self) -> Vec<ProxyState> {
        self.states.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl ProxyEvents for RecordingEvents {
    fn on_state_change(&self, state: ProxyState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}

pub const SHOW_INTERFACES: &str = "\
Idx     Met         MTU          State                Name
---  ----------  ----------  ------------  ---------------------------
  1          75  4294967295  connected     Loopback Pseudo-Interface 1
 12          25        1500  connected     Ethernet
";

/// Records every netsh invocation and answers `show interfaces` with
/// [`SHOW_INTERFACES`]. Commands starting with `fail_on` fail.
#[derive(Default)]
pub struct ScriptedNetsh {
    commands: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
    delay: Mutex<Duration>,
}

impl ScriptedNetsh {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, prefix: &str) {
        *self.fail_on.lock().unwrap() = Some(prefix.to_string());
    }

    /// Makes every invocation block for `delay`, like a slow netsh.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }
}

impl NetshRunner for ScriptedNetsh {
    fn run(&self, args: &[&str]) -> Result<String, DomainError> {
        let command = args.join(" ");
        self.commands.lock().unwrap().push(command.clone());
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        if let Some(prefix) = self.fail_on.lock().unwrap().as_deref() {
            if command.starts_with(prefix) {
                return Err(DomainError::NativeDoh(format!("netsh {}: access denied", command)));
            }
        }
        if command == "interface ipv4 show interfaces" {
            return Ok(SHOW_INTERFACES.to_string());
        }
        Ok("Ok.".to_string())
    }
}

pub struct FailingProvider {
    pub calls: AtomicUsize,
}

impl FailingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EndpointProvider for FailingProvider {
    fn name(&self) -> &str {
        "router"
    }

    async fn endpoints(&self) -> Result<Vec<Endpoint>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DomainError::ProviderFailed("router unreachable".to_string()))
    }
}

/// A loopback port with nothing listening on it.
struct EmptyBody;

#[async_trait]
impl ResponseStream for EmptyBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, DomainError> {
        Ok(None)
    }
}

/// Sender whose endpoints answer only when their host is marked up.
/// Records every attempt as `"send <host>"` or `"check <host>"`.
#[derive(Default)]
pub struct ScriptedSender {
    up: Mutex<HashSet<String>>,
    attempts: Mutex<Vec<String>>,
}

impl ScriptedSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_up(&self, hostname: &str, up: bool) {
        let mut hosts = self.up.lock().unwrap();
        if up {
            hosts.insert(hostname.to_string());
        } else {
            hosts.remove(hostname);
        }
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.attempts.lock().unwrap().clear();
    }

    fn attempt(&self, kind: &str, endpoint: &Endpoint) -> Result<(), DomainError> {
        self.attempts
            .lock()
            .unwrap()
            .push(format!("{} {}", kind, endpoint.hostname));
        if self.up.lock().unwrap().contains(&*endpoint.hostname) {
            Ok(())
        } else {
            Err(DomainError::UpstreamTransport(format!(
                "{}: connection refused",
                endpoint.hostname
            )))
        }
    }
}

#[async_trait]
impl EndpointSender for ScriptedSender {
    async fn send(
        &self,
        endpoint: &Endpoint,
        _request: &DohRequest,
    ) -> Result<DohResponse, DomainError> {
        self.attempt("send", endpoint)?;
        Ok(DohResponse {
            status: 200,
            body: Box::new(EmptyBody),
        })
    }

    async fn check(&self, endpoint: &Endpoint) -> Result<(), DomainError> {
        self.attempt("check", endpoint)
    }
}

pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Endpoint pinned to a closed loopback port, so every connect is refused.
pub async fn unreachable_endpoint(hostname: &str) -> Endpoint {
    let port = closed_port().await;
    format!("https://{}:{}#127.0.0.1", hostname, port)
        .parse()
        .unwrap()
}

/// Polls `cond` for up to two seconds.
pub async fn wait_until<F: Fn() -> bool>(cond: F) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    cond()
}
