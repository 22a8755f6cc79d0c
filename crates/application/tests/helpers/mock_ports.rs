use async_trait::async_trait;
use bytes::Bytes;
use ferrous_doh_application::ports::{
    DohRequest, DohResponse, InterfaceOpener, LeakGuard, ProxyEvents, ResponseStream,
    TransportFactory, UpstreamTransport, VirtualInterface,
};
use ferrous_doh_domain::{DomainError, ProxyState, TunnelConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Polls `condition` until it holds or two seconds pass.
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// ── virtual interface ──────────────────────────────────────────────────────

#[derive(Default)]
struct InterfaceQueue {
    inbound: VecDeque<Vec<u8>>,
    closed: bool,
    fail_reads: bool,
}

/// In-memory interface: datagrams pushed with `inject` are returned by
/// `read`, which blocks until one is available or the interface closes.
#[derive(Default)]
pub struct MockInterface {
    queue: Mutex<InterfaceQueue>,
    ready: Condvar,
    written: Mutex<Vec<Vec<u8>>>,
    reads: AtomicUsize,
    closes: AtomicUsize,
}

impl MockInterface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inject(&self, datagram: Vec<u8>) {
        self.queue.lock().unwrap().inbound.push_back(datagram);
        self.ready.notify_all();
    }

    /// Makes the next read fail as if the device went away.
    pub fn fail_reads(&self) {
        self.queue.lock().unwrap().fail_reads = true;
        self.ready.notify_all();
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.queue.lock().unwrap().closed
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl VirtualInterface for MockInterface {
    fn read(&self, buf: &mut [u8]) -> Result<usize, DomainError> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            if queue.closed {
                return Ok(0);
            }
            if queue.fail_reads {
                return Err(DomainError::InterfaceIo("device removed".to_string()));
            }
            if let Some(datagram) = queue.inbound.pop_front() {
                self.reads.fetch_add(1, Ordering::SeqCst);
                let n = datagram.len().min(buf.len());
                buf[..n].copy_from_slice(&datagram[..n]);
                return Ok(n);
            }
            queue = self
                .ready
                .wait_timeout(queue, Duration::from_millis(50))
                .unwrap()
                .0;
        }
    }

    fn write(&self, datagram: &[u8]) -> Result<usize, DomainError> {
        if self.is_closed() {
            return Err(DomainError::InterfaceIo("closed".to_string()));
        }
        self.written.lock().unwrap().push(datagram.to_vec());
        Ok(datagram.len())
    }

    fn close(&self) -> Result<(), DomainError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().unwrap().closed = true;
        self.ready.notify_all();
        Ok(())
    }
}

/// Hands out a fresh [`MockInterface`] per open and keeps them for
/// inspection. Can be told to fail a number of opens first.
#[derive(Default)]
pub struct MockOpener {
    opened: Mutex<Vec<Arc<MockInterface>>>,
    failures_left: AtomicUsize,
    always_fail: AtomicBool,
}

impl MockOpener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn set_always_fail(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn interface(&self, index: usize) -> Arc<MockInterface> {
        Arc::clone(&self.opened.lock().unwrap()[index])
    }

    pub fn latest(&self) -> Arc<MockInterface> {
        Arc::clone(self.opened.lock().unwrap().last().unwrap())
    }
}

impl InterfaceOpener for MockOpener {
    fn open(&self, _config: &TunnelConfig) -> Result<Arc<dyn VirtualInterface>, DomainError> {
        if self.always_fail.load(Ordering::SeqCst) {
            return Err(DomainError::InterfaceOpen("no driver".to_string()));
        }
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DomainError::InterfaceOpen("device busy".to_string()));
        }
        let interface = MockInterface::new();
        self.opened.lock().unwrap().push(Arc::clone(&interface));
        Ok(interface)
    }
}

// ── upstream transport ─────────────────────────────────────────────────────

pub struct MockStream {
    chunks: VecDeque<Bytes>,
    fail_after: Option<usize>,
}

impl MockStream {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Bytes::from).collect(),
            fail_after: None,
        }
    }

    /// Yields `count` chunks, then a read error.
    pub fn failing_after(chunks: Vec<Vec<u8>>, count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::new(chunks)
        }
    }
}

#[async_trait]
impl ResponseStream for MockStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, DomainError> {
        if let Some(left) = self.fail_after.as_mut() {
            if *left == 0 {
                return Err(DomainError::UpstreamRead("connection reset".to_string()));
            }
            *left -= 1;
        }
        Ok(self.chunks.pop_front())
    }
}

/// Answers every request with `status` and a body echoing the query ID,
/// unless `status` is not 200 or the transport is set to fail.
pub struct MockTransport {
    requests: Mutex<Vec<DohRequest>>,
    status: AtomicUsize,
    fail: AtomicBool,
    warm_ups: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            status: AtomicUsize::new(200),
            fail: AtomicBool::new(false),
            warm_ups: AtomicUsize::new(0),
        })
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status as usize, Ordering::SeqCst);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<DohRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn warm_ups(&self) -> usize {
        self.warm_ups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamTransport for MockTransport {
    async fn round_trip(&self, request: DohRequest) -> Result<DohResponse, DomainError> {
        let id = u16::from_be_bytes([request.body[0], request.body[1]]);
        self.requests.lock().unwrap().push(request);

        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::UpstreamTransport("connection refused".to_string()));
        }
        Ok(DohResponse {
            status: self.status.load(Ordering::SeqCst) as u16,
            body: Box::new(MockStream::new(vec![super::dns_answer(id)])),
        })
    }

    async fn warm_up(&self) -> Result<(), DomainError> {
        self.warm_ups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Always hands out the same [`MockTransport`], unless set to fail.
pub struct MockTransportFactory {
    pub transport: Arc<MockTransport>,
    builds: AtomicUsize,
    fail: AtomicBool,
}

impl MockTransportFactory {
    pub fn new(transport: Arc<MockTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            builds: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl TransportFactory for MockTransportFactory {
    fn build(
        &self,
        _events: Arc<dyn ProxyEvents>,
    ) -> Result<Arc<dyn UpstreamTransport>, DomainError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::UpstreamTransport("no endpoints configured".to_string()));
        }
        Ok(self.transport.clone())
    }
}

// ── leak guard ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLeakGuard {
    lifetimes: Mutex<Vec<CancellationToken>>,
    fail: AtomicBool,
}

impl MockLeakGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let guard = Self::default();
        guard.fail.store(true, Ordering::SeqCst);
        Arc::new(guard)
    }

    pub fn starts(&self) -> usize {
        self.lifetimes.lock().unwrap().len()
    }

    pub fn all_released(&self) -> bool {
        self.lifetimes
            .lock()
            .unwrap()
            .iter()
            .all(|lifetime| lifetime.is_cancelled())
    }
}

#[async_trait]
impl LeakGuard for MockLeakGuard {
    async fn start(
        &self,
        lifetime: CancellationToken,
        _events: Arc<dyn ProxyEvents>,
    ) -> Result<(), DomainError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::HelperSpawn("dnsunleak not found".to_string()));
        }
        self.lifetimes.lock().unwrap().push(lifetime);
        Ok(())
    }
}

// ── events ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingEvents {
    states: Mutex<Vec<ProxyState>>,
    queries: Mutex<Vec<(u16, String)>>,
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

    pub fn queries(&self) -> Vec<(u16, String)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }
}

impl ProxyEvents for RecordingEvents {
    fn on_state_change(&self, state: ProxyState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_query(&self, msg_id: u16, qname: &str) {
        self.queries.lock().unwrap().push((msg_id, qname.to_string()));
    }

    fn on_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn on_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
