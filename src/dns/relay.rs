//! Relay engine: routes client queries, forwards the rest upstream, and
//! relays answers back with the original identifier restored.

use crate::config::Config;
use crate::dns::correlation::CorrelationTable;
use crate::dns::filter::FilterPolicy;
use crate::dns::store::{self, RecordStore};
use crate::dns::wire::{self, DnsMessage, ResponseCode};
use crate::error::RelayError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const DNS_PORT: u16 = 53;
const DATAGRAM_BUF: usize = 512;

/// Bounded wait on the upstream channel; a timeout just loops back to
/// listening so the drain task stays responsive to shutdown.
const UPSTREAM_RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// How long shutdown waits for background tasks before aborting them
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Routing decision for one inbound client datagram
#[derive(Debug)]
pub enum RouteAction {
    /// Drop with no response (unparseable, or not exactly one question)
    Reject(&'static str),
    /// Answer locally with these bytes
    Respond(Vec<u8>),
    /// No local record: forward to the upstream resolver
    Forward(DnsMessage),
}

/// Decide how to handle an inbound client datagram.
pub fn route_query(store: &RecordStore, policy: FilterPolicy, datagram: &[u8]) -> RouteAction {
    let msg = match DnsMessage::parse(datagram) {
        Ok(msg) => msg,
        Err(e) => return RouteAction::Reject(e),
    };
    debug!(msg = %msg, "parsed client query");

    if msg.qdcount() != 1 {
        return RouteAction::Reject("message must carry exactly one question");
    }
    let (name, qtype) = match msg.question() {
        Some(q) => (q.name.clone(), q.qtype),
        None => return RouteAction::Reject("question section missing"),
    };

    match store.lookup(&name, qtype) {
        Some(literal) if store::is_intercepted(&literal) => {
            info!(name = %name, qtype = %qtype, "intercepted query");
            match wire::build_intercepted(datagram) {
                Some(bytes) => RouteAction::Respond(bytes),
                None => RouteAction::Reject("query too short to answer"),
            }
        }
        Some(literal) => {
            info!(name = %name, qtype = %qtype, literal = %literal, "local record hit");
            match wire::build_local_answer(datagram, qtype, &literal, policy) {
                Some(bytes) => RouteAction::Respond(bytes),
                None => RouteAction::Reject("stored literal is not an address"),
            }
        }
        None => RouteAction::Forward(msg),
    }
}

/// The relay engine. Cheap to clone: all state lives behind `Arc`s, so
/// per-datagram tasks carry their own handle.
#[derive(Clone)]
pub struct RelayEngine {
    client_socket: Arc<UdpSocket>,
    upstream_socket: Arc<UdpSocket>,
    upstream_addr: SocketAddr,
    store: Arc<RecordStore>,
    table: Arc<CorrelationTable>,
    policy: FilterPolicy,
    dump_packets: bool,
    sweep_interval: Duration,
    shutdown: CancellationToken,
}

impl RelayEngine {
    /// Bind the client-facing and upstream-facing sockets. A bind failure
    /// here is the only fatal startup error in the relay.
    pub async fn bind(config: &Config, store: Arc<RecordStore>) -> Result<RelayEngine, RelayError> {
        let upstream_addr = parse_upstream(&config.upstream)?;

        let client_socket =
            UdpSocket::bind(config.listen.as_str())
                .await
                .map_err(|e| RelayError::Bind {
                    addr: config.listen.clone(),
                    source: e,
                })?;

        // Outbound socket matches the upstream's address family
        let outbound = if upstream_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let upstream_socket = UdpSocket::bind(outbound)
            .await
            .map_err(|e| RelayError::Bind {
                addr: outbound.to_string(),
                source: e,
            })?;

        Ok(RelayEngine {
            client_socket: Arc::new(client_socket),
            upstream_socket: Arc::new(upstream_socket),
            upstream_addr,
            store,
            table: Arc::new(CorrelationTable::new(Duration::from_secs(
                config.correlation.entry_timeout_secs,
            ))),
            policy: config.filter,
            dump_packets: config.dump_packets,
            sweep_interval: Duration::from_secs(config.correlation.sweep_interval_secs),
            shutdown: CancellationToken::new(),
        })
    }

    /// Address the client-facing socket actually bound to
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        self.client_socket.local_addr().map_err(RelayError::Io)
    }

    /// Token observers can use to request or await shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request shutdown: unblocks every loop and lets `run` drain its tasks
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Serve until shutdown: one task per client datagram, a dedicated
    /// upstream drain task, and a periodic correlation sweep. Both
    /// background tasks are joined with a bounded grace period on exit.
    pub async fn run(&self) -> Result<(), RelayError> {
        let mut drain = self.spawn_upstream_drain();
        let mut sweeper = self.spawn_sweep_task();

        info!(
            listen = %self.local_addr()?,
            upstream = %self.upstream_addr,
            filter = %self.policy,
            "relay serving"
        );

        let mut buf = vec![0u8; DATAGRAM_BUF];
        loop {
            let (len, client) = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.client_socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        if self.shutdown.is_cancelled() {
                            break;
                        }
                        warn!(error = %e, "client receive failed");
                        continue;
                    }
                },
            };

            let datagram = buf[..len].to_vec();
            if self.dump_packets {
                debug!(client = %client, bytes = len, "received from client\n{}", wire::dump_hex(&datagram));
            }

            let engine = self.clone();
            tokio::spawn(async move {
                engine.handle_query(client, datagram).await;
            });
        }

        info!("draining background tasks");
        for handle in [&mut drain, &mut sweeper] {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut *handle).await.is_err() {
                warn!("background task did not stop within grace period, aborting");
                handle.abort();
            }
        }
        info!("relay stopped");
        Ok(())
    }

    async fn handle_query(&self, client: SocketAddr, datagram: Vec<u8>) {
        match route_query(&self.store, self.policy, &datagram) {
            RouteAction::Reject(reason) => {
                debug!(client = %client, reason, "dropping client datagram");
            }
            RouteAction::Respond(response) => {
                if self.dump_packets {
                    debug!(client = %client, bytes = response.len(), "sending local response\n{}", wire::dump_hex(&response));
                }
                if let Err(e) = self.client_socket.send_to(&response, client).await {
                    error!(client = %client, error = %e, "failed to send local response");
                }
            }
            RouteAction::Forward(msg) => self.forward_to_upstream(client, msg).await,
        }
    }

    async fn forward_to_upstream(&self, client: SocketAddr, msg: DnsMessage) {
        let original_id = msg.id();
        let name = msg
            .question()
            .map(|q| q.name.clone())
            .unwrap_or_default();

        let mut forward = msg.raw().to_vec();
        let new_id = self.table.create(client, msg);
        wire::set_message_id(&mut forward, new_id);

        if self.dump_packets {
            debug!(upstream = %self.upstream_addr, bytes = forward.len(), "forwarding to upstream\n{}", wire::dump_hex(&forward));
        }

        match self.upstream_socket.send_to(&forward, self.upstream_addr).await {
            Ok(_) => {
                info!(
                    name = %name,
                    original_id,
                    new_id,
                    upstream = %self.upstream_addr,
                    "forwarded query"
                );
            }
            Err(e) => {
                error!(upstream = %self.upstream_addr, error = %e, "failed to forward query");
                // no response will ever arrive for this entry
                self.table.resolve(new_id);
            }
        }
    }

    fn spawn_upstream_drain(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; DATAGRAM_BUF];
            loop {
                tokio::select! {
                    _ = engine.shutdown.cancelled() => break,
                    result = tokio::time::timeout(
                        UPSTREAM_RECV_TIMEOUT,
                        engine.upstream_socket.recv_from(&mut buf),
                    ) => match result {
                        // Timeout is not an error: loop back to listening
                        Err(_) => continue,
                        Ok(Err(e)) => {
                            if engine.shutdown.is_cancelled() {
                                break;
                            }
                            warn!(error = %e, "upstream receive failed");
                        }
                        Ok(Ok((len, source))) => {
                            let datagram = buf[..len].to_vec();
                            engine.handle_upstream_response(source, datagram).await;
                        }
                    },
                }
            }
            debug!("upstream drain task stopped");
        })
    }

    async fn handle_upstream_response(&self, source: SocketAddr, datagram: Vec<u8>) {
        if self.dump_packets {
            debug!(upstream = %source, bytes = datagram.len(), "received from upstream\n{}", wire::dump_hex(&datagram));
        }

        let response = match DnsMessage::parse(&datagram) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(upstream = %source, error = e, "dropping unparseable upstream datagram");
                return;
            }
        };
        debug!(msg = %response, "parsed upstream response");

        let entry = match self.table.resolve(response.id()) {
            Some(entry) => entry,
            None => {
                debug!(id = response.id(), "no live correlation for upstream response, dropping");
                return;
            }
        };

        // Learn successful answers before the filter runs: caching is
        // independent of what is actually sent back.
        if response.rcode() == ResponseCode::NoError && response.ancount() > 0 {
            self.learn_answers(&datagram, &entry.original);
        }

        let mut out = datagram;
        wire::set_message_id(&mut out, entry.original_id);
        let out = self.policy.apply_to_upstream_answer(out, &entry.original);

        match self.client_socket.send_to(&out, entry.client).await {
            Ok(_) => {
                info!(
                    client = %entry.client,
                    id = entry.original_id,
                    answers = response.ancount(),
                    "relayed upstream response"
                );
            }
            Err(e) => {
                error!(client = %entry.client, error = %e, "failed to relay upstream response");
            }
        }
    }

    /// Persist discovered addresses keyed by the original query's name and
    /// type.
    fn learn_answers(&self, response: &[u8], query: &DnsMessage) {
        let question = match query.question() {
            Some(q) => q,
            None => return,
        };

        let addrs = wire::extract_answer_addrs(response);
        for addr in &addrs {
            self.store.save(&question.name, &addr.to_string(), question.qtype);
        }
        if addrs.len() > 1 {
            debug!(name = %question.name, count = addrs.len(), "learned multiple addresses");
        }
    }

    fn spawn_sweep_task(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(engine.sweep_interval);
            loop {
                tokio::select! {
                    _ = engine.shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let expired = engine.table.sweep();
                        if expired > 0 {
                            info!(expired, active = engine.table.len(), "expired stale correlations");
                        }
                    }
                }
            }
            debug!("sweep task stopped");
        })
    }
}

/// Accept `ip:port` or a bare IP (which gets the standard DNS port).
fn parse_upstream(upstream: &str) -> Result<SocketAddr, RelayError> {
    if let Ok(addr) = upstream.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = upstream.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DNS_PORT));
    }
    Err(RelayError::Config(format!(
        "invalid upstream address: {}",
        upstream
    )))
}
