use ferrous_doh_domain::packet::{
    classify, frame_reply, query_id, query_name, DNS_OFFSET,
};
use ferrous_doh_domain::{DomainError, DuplicateFilter, PacketVerdict};
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::ports::{NoopEvents, ProxyEvents, UpstreamTransport, VirtualInterface};
use crate::services::{read_dns_response, BufferPool, PacketBuffer, UpstreamExchange};

/// Datagrams buffered between the reader, the dispatch loop and the writer.
const QUEUE_DEPTH: usize = 256;

/// Moves datagrams between a virtual interface and the upstream resolver
/// for one run.
///
/// Three stages hand [`PacketBuffer`]s to each other over channels: a
/// blocking reader, the dispatch loop (plus one task per accepted query) and
/// a blocking writer. A buffer is owned by exactly one stage at a time and
/// goes back to the pool when the owning stage drops it.
pub struct PacketPipeline {
    interface: Arc<dyn VirtualInterface>,
    transport: Arc<dyn UpstreamTransport>,
    exchange: Arc<UpstreamExchange>,
    events: Arc<dyn ProxyEvents>,
    pool: Arc<BufferPool>,
    resolver: Ipv4Addr,
    shutdown: CancellationToken,
    dedup: DuplicateFilter,
}

struct QueryContext {
    transport: Arc<dyn UpstreamTransport>,
    exchange: Arc<UpstreamExchange>,
    events: Arc<dyn ProxyEvents>,
    shutdown: CancellationToken,
}

impl PacketPipeline {
    pub fn new(
        interface: Arc<dyn VirtualInterface>,
        transport: Arc<dyn UpstreamTransport>,
        exchange: Arc<UpstreamExchange>,
        pool: Arc<BufferPool>,
        resolver: Ipv4Addr,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            interface,
            transport,
            exchange,
            events: Arc::new(NoopEvents),
            pool,
            resolver,
            shutdown,
            dedup: DuplicateFilter::new(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn ProxyEvents>) -> Self {
        self.events = events;
        self
    }

    /// Carries the duplicate window over from a previous run.
    pub fn with_dedup(mut self, dedup: DuplicateFilter) -> Self {
        self.dedup = dedup;
        self
    }

    /// Runs until the interface reaches end of stream, a read or write fails,
    /// or the shutdown token fires.
    ///
    /// The reader awaits `handshake` before its first read and exits without
    /// reading when it resolves to false. On return the shutdown token is
    /// cancelled and the interface closed. The reader may still be parked in
    /// a blocking read at that point; closing the interface releases it.
    ///
    /// Returns the duplicate filter so the next run keeps its window.
    pub async fn run<H>(mut self, handshake: H) -> DuplicateFilter
    where
        H: Future<Output = bool> + Send + 'static,
    {
        let (inbound_tx, inbound_rx) = mpsc::channel(QUEUE_DEPTH);
        let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE_DEPTH);

        tokio::spawn(read_loop(
            handshake,
            Arc::clone(&self.interface),
            Arc::clone(&self.pool),
            inbound_tx,
            Arc::clone(&self.events),
        ));

        let writer = tokio::spawn(write_loop(
            Arc::clone(&self.interface),
            outbound_rx,
            self.shutdown.clone(),
            Arc::clone(&self.events),
        ));

        self.dispatch(inbound_rx, outbound_tx).await;

        self.shutdown.cancel();
        if let Err(e) = self.interface.close() {
            debug!(error = %e, "Interface close after run failed");
        }
        if let Err(e) = writer.await {
            error!(error = %e, "Writer task panicked");
        }

        self.dedup
    }

    async fn dispatch(
        &mut self,
        mut inbound: mpsc::Receiver<PacketBuffer>,
        outbound: mpsc::Sender<PacketBuffer>,
    ) {
        let ctx = Arc::new(QueryContext {
            transport: Arc::clone(&self.transport),
            exchange: Arc::clone(&self.exchange),
            events: Arc::clone(&self.events),
            shutdown: self.shutdown.clone(),
        });

        loop {
            let packet = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = inbound.recv() => match next {
                    Some(packet) => packet,
                    None => break,
                },
            };

            let verdict = classify(&packet, self.resolver);
            if verdict != PacketVerdict::Forward {
                trace!(?verdict, len = packet.len(), "Dropping datagram");
                continue;
            }

            let msg_id = query_id(&packet);
            if self.dedup.is_duplicate(msg_id) {
                trace!(msg_id, "Dropping duplicate query");
                continue;
            }

            tokio::spawn(forward_query(Arc::clone(&ctx), packet, outbound.clone()));
        }
    }
}

async fn read_loop<H>(
    handshake: H,
    interface: Arc<dyn VirtualInterface>,
    pool: Arc<BufferPool>,
    inbound: mpsc::Sender<PacketBuffer>,
    events: Arc<dyn ProxyEvents>,
) where
    H: Future<Output = bool> + Send + 'static,
{
    if !handshake.await {
        debug!("Run no longer expected, reader exiting");
        return;
    }

    let result = tokio::task::spawn_blocking(move || -> Result<(), DomainError> {
        loop {
            let mut packet = pool.acquire();
            let n = interface.read(packet.capacity_mut())?;
            if n == 0 {
                return Ok(());
            }
            packet.set_len(n);
            if inbound.blocking_send(packet).is_err() {
                return Ok(());
            }
        }
    })
    .await;

    match result {
        Ok(Ok(())) => debug!("Interface reached end of stream"),
        Ok(Err(e)) => events.on_error(&format!("Interface read failed: {}", e)),
        Err(e) => error!(error = %e, "Reader task panicked"),
    }
}

async fn write_loop(
    interface: Arc<dyn VirtualInterface>,
    mut outbound: mpsc::Receiver<PacketBuffer>,
    shutdown: CancellationToken,
    events: Arc<dyn ProxyEvents>,
) {
    loop {
        let packet = tokio::select! {
            _ = shutdown.cancelled() => return,
            next = outbound.recv() => match next {
                Some(packet) => packet,
                None => return,
            },
        };

        let interface = Arc::clone(&interface);
        let written = tokio::task::spawn_blocking(move || interface.write(&packet)).await;

        match written {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                events.on_error(&format!("Interface write failed: {}", e));
                shutdown.cancel();
                return;
            }
            Err(e) => {
                error!(error = %e, "Write task panicked");
                shutdown.cancel();
                return;
            }
        }
    }
}

async fn forward_query(
    ctx: Arc<QueryContext>,
    mut packet: PacketBuffer,
    outbound: mpsc::Sender<PacketBuffer>,
) {
    let msg_id = query_id(&packet);
    let qname = query_name(&packet);
    ctx.events.on_query(msg_id, &qname);

    let dns_len = match exchange(&ctx, &mut packet).await {
        Ok(len) => len,
        Err(e) => {
            ctx.events
                .on_error(&format!("Query {:04x} {} failed: {}", msg_id, qname, e));
            return;
        }
    };

    let total = frame_reply(packet.capacity_mut(), dns_len);
    packet.set_len(total);

    tokio::select! {
        _ = ctx.shutdown.cancelled() => {}
        sent = outbound.send(packet) => {
            if sent.is_err() {
                trace!(msg_id, "Writer gone, dropping reply");
            }
        }
    }
}

/// Sends the DNS payload of `packet` upstream and reads the answer into the
/// same buffer right after the IPv4/UDP headers.
async fn exchange(ctx: &QueryContext, packet: &mut PacketBuffer) -> Result<usize, DomainError> {
    let mut body = ctx
        .exchange
        .resolve(ctx.transport.as_ref(), &packet[DNS_OFFSET..])
        .await?;
    read_dns_response(body.as_mut(), &mut packet.capacity_mut()[DNS_OFFSET..]).await
}
