//! Per-connection state machine.
//!
//! One [`Connection`] owns one transport and drives it through the states in
//! [`ConnectionState`].  Each call to [`Connection::step`] performs exactly one
//! transition, so a test can walk a connection through a scenario and look at
//! the state in between.  [`Connection::run`] simply steps until `Closed`.
//!
//! The connection is generic over the transport, so production code passes a
//! `TcpStream` while unit tests pass `tokio::io::duplex` pipes or scripted
//! `tokio_test::io` mocks.
//!
//! # Buffering
//!
//! Reads append to a single buffer.  A request head is cut off the front once
//! the blank line is seen and anything after it stays for the next step: a
//! pipelined second request, or frames a browser sent right behind its
//! upgrade request.
//!
//! # Upgraded connections
//!
//! After a `101` the connection waits on two things at once: more bytes from
//! the peer and log frames from its [`OutboundReceiver`].  Waiting for the
//! start of the next inbound frame has no deadline (a viewer may sit idle for
//! hours); once a frame has started, the rest of it must arrive within the I/O
//! timeout.  That deadline is fixed when the frame's first byte arrives, so
//! outbound traffic waking the connection does not extend it.  Inbound data
//! frames are discarded without being buffered.
//!
//! An upgraded connection evicted by the broadcast pipeline closes itself with
//! [`CloseReason::SlowConsumer`] without writing its remaining backlog.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use rtlog_core::protocol::frame::{decode_header, FrameError, Opcode, PONG_FRAME};
use rtlog_core::protocol::http::{find_header_end, HttpResponse};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, trace};

use crate::application::router::{route, AdmissionControl, Route};
use crate::application::static_responder::StaticResponder;
use crate::domain::config::ServerConfig;
use crate::domain::connection::{CloseReason, ConnectionId, ConnectionState, Role};
use crate::infrastructure::outbound::{outbound_queue, OutboundReceiver, SharedFrame};
use crate::infrastructure::registry::ConnectionRegistry;

/// Bytes reserved in the read buffer before each read.
const READ_CHUNK: usize = 4096;

/// Everything a connection needs from the server that owns it.
pub struct ConnectionContext {
    pub registry: Arc<ConnectionRegistry>,
    pub responder: StaticResponder,
    pub admission: AdmissionControl,
    pub io_timeout: Duration,
    pub max_header_bytes: usize,
    pub max_pending_write_bytes: usize,
}

impl ConnectionContext {
    pub fn new(
        config: &ServerConfig,
        registry: Arc<ConnectionRegistry>,
        responder: StaticResponder,
    ) -> Self {
        Self {
            registry,
            responder,
            admission: AdmissionControl::new(config.max_requests_per_connection),
            io_timeout: config.io_timeout,
            max_header_bytes: config.max_header_bytes,
            max_pending_write_bytes: config.max_pending_write_bytes,
        }
    }
}

/// What woke an upgraded connection up.
enum Wake {
    Outbound(Option<SharedFrame>),
    Read(ReadOutcome),
}

enum ReadOutcome {
    Data,
    Eof,
    Timeout,
    Failed(io::Error),
}

/// One accepted transport and its protocol state.
pub struct Connection<T> {
    id: ConnectionId,
    peer: String,
    transport: T,
    ctx: Arc<ConnectionContext>,
    state: ConnectionState,
    role: Role,
    /// Requests seen on this connection while plain.
    requests: u32,
    /// Bytes read but not yet consumed.
    buf: Vec<u8>,
    /// Payload bytes of a discarded inbound frame still to be skipped.
    skip: u64,
    /// When the partially received inbound frame must be complete.
    frame_deadline: Option<Instant>,
    /// Log frames to send; present once upgraded.
    outbound: Option<OutboundReceiver>,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an accepted transport.  The caller is expected to have
    /// registered `id` with the context's registry already.
    pub fn new(id: ConnectionId, peer: impl Into<String>, transport: T, ctx: Arc<ConnectionContext>) -> Self {
        Self {
            id,
            peer: peer.into(),
            transport,
            ctx,
            state: ConnectionState::ReadingHeader,
            role: Role::Plain,
            requests: 0,
            buf: Vec::with_capacity(READ_CHUNK),
            skip: 0,
            frame_deadline: None,
            outbound: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Drives the connection until it closes, then unregisters it and shuts
    /// the transport down.
    pub async fn run(mut self) -> CloseReason {
        loop {
            self.step().await;
            if let ConnectionState::Closed(reason) = &self.state {
                let reason = reason.clone();
                self.finish(&reason).await;
                return reason;
            }
        }
    }

    /// Performs one state transition.  A no-op once `Closed`.
    pub async fn step(&mut self) -> &ConnectionState {
        let current = std::mem::replace(&mut self.state, ConnectionState::ReadingHeader);
        let from = current.name();
        let next = match current {
            ConnectionState::ReadingHeader => self.read_header().await,
            ConnectionState::Dispatching { head_len } => self.dispatch(head_len).await,
            ConnectionState::WritingResponse { response, upgrade } => {
                self.write_response(&response, upgrade).await
            }
            ConnectionState::ReadingFrame => self.read_frame().await,
            closed @ ConnectionState::Closed(_) => closed,
        };
        trace!("connection {}: {from} -> {}", self.id, next.name());
        self.state = next;
        &self.state
    }

    // ── Plain HTTP ────────────────────────────────────────────────────────────

    async fn read_header(&mut self) -> ConnectionState {
        let deadline = Instant::now() + self.ctx.io_timeout;
        loop {
            if let Some(head_len) = find_header_end(&self.buf) {
                if head_len > self.ctx.max_header_bytes {
                    return ConnectionState::Closed(CloseReason::HeaderTooLarge);
                }
                return ConnectionState::Dispatching { head_len };
            }
            if self.buf.len() >= self.ctx.max_header_bytes {
                return ConnectionState::Closed(CloseReason::HeaderTooLarge);
            }

            self.buf.reserve(READ_CHUNK);
            match timeout_at(deadline, self.transport.read_buf(&mut self.buf)).await {
                Err(_) => return ConnectionState::Closed(CloseReason::Timeout),
                Ok(Ok(0)) => return ConnectionState::Closed(CloseReason::PeerClosed),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return ConnectionState::Closed(CloseReason::Transport(e.to_string())),
            }
        }
    }

    async fn dispatch(&mut self, head_len: usize) -> ConnectionState {
        if !self.ctx.admission.admit(&mut self.requests) {
            debug!(
                "connection {} ({}): request limit reached, closing",
                self.id, self.peer
            );
            return ConnectionState::Closed(CloseReason::RequestLimit);
        }

        let head: Vec<u8> = self.buf.drain(..head_len).collect();
        let (response, upgrade) = match route(&head) {
            Route::Respond(response) => (response, false),
            Route::Upgrade(response) => (response, true),
            Route::Static { method, path } => {
                let responder = self.ctx.responder.clone();
                let resp = serve_static(responder, method.clone(), path.clone()).await;
                debug!(
                    "connection {}: {method} {path} -> {}",
                    self.id,
                    resp.status.code()
                );
                (resp, false)
            }
        };

        ConnectionState::WritingResponse {
            response: response.to_bytes(),
            upgrade,
        }
    }

    async fn write_response(&mut self, response: &[u8], upgrade: bool) -> ConnectionState {
        if let Err(reason) = self.write_bytes(response).await {
            return ConnectionState::Closed(reason);
        }
        if !upgrade {
            return ConnectionState::ReadingHeader;
        }

        let (tx, rx) = outbound_queue(self.ctx.max_pending_write_bytes);
        if !self.ctx.registry.promote(self.id, tx) {
            return ConnectionState::Closed(CloseReason::Shutdown);
        }
        self.role = Role::WebSocket;
        self.outbound = Some(rx);
        info!("websocket {} ({}): connected", self.id, self.peer);
        ConnectionState::ReadingFrame
    }

    // ── WebSocket ─────────────────────────────────────────────────────────────

    async fn read_frame(&mut self) -> ConnectionState {
        match self.take_buffered_frame() {
            Err(e) => return ConnectionState::Closed(CloseReason::ProtocolViolation(e.to_string())),
            Ok(Some(Opcode::Close)) => return ConnectionState::Closed(CloseReason::CloseFrame),
            Ok(Some(Opcode::Ping)) => {
                return match self.write_bytes(&PONG_FRAME).await {
                    Ok(()) => ConnectionState::ReadingFrame,
                    Err(reason) => ConnectionState::Closed(reason),
                };
            }
            Ok(Some(opcode)) => {
                trace!("websocket {}: discarding {opcode:?} frame", self.id);
                return ConnectionState::ReadingFrame;
            }
            Ok(None) => {}
        }

        let deadline = if self.skip > 0 || !self.buf.is_empty() {
            let limit = self.ctx.io_timeout;
            let deadline = *self.frame_deadline.get_or_insert_with(|| Instant::now() + limit);
            if Instant::now() >= deadline {
                return ConnectionState::Closed(CloseReason::Timeout);
            }
            Some(deadline)
        } else {
            self.frame_deadline = None;
            None
        };
        let wake = tokio::select! {
            frame = next_outbound(&mut self.outbound) => Wake::Outbound(frame),
            outcome = read_more(&mut self.transport, &mut self.buf, deadline) => Wake::Read(outcome),
        };

        match wake {
            Wake::Outbound(_) if self.is_evicted() => {
                ConnectionState::Closed(CloseReason::SlowConsumer)
            }
            Wake::Outbound(Some(frame)) => {
                let result = self.write_bytes(&frame).await;
                if let Some(rx) = &self.outbound {
                    rx.complete(frame.len());
                }
                match result {
                    Ok(()) => ConnectionState::ReadingFrame,
                    Err(reason) => ConnectionState::Closed(reason),
                }
            }
            Wake::Outbound(None) => ConnectionState::Closed(CloseReason::Shutdown),
            Wake::Read(ReadOutcome::Data) => ConnectionState::ReadingFrame,
            Wake::Read(ReadOutcome::Eof) => ConnectionState::Closed(CloseReason::PeerClosed),
            Wake::Read(ReadOutcome::Timeout) => ConnectionState::Closed(CloseReason::Timeout),
            Wake::Read(ReadOutcome::Failed(e)) => {
                ConnectionState::Closed(CloseReason::Transport(e.to_string()))
            }
        }
    }

    fn is_evicted(&self) -> bool {
        self.outbound.as_ref().is_some_and(OutboundReceiver::is_evicted)
    }

    /// Consumes the next inbound frame from the buffer if enough of it is
    /// there to act on.
    ///
    /// Control frames (at most 125 payload bytes) are consumed whole.  Data
    /// frames are reported as soon as their header is complete; their payload
    /// is dropped as it arrives via `skip`.  The frame deadline is cleared
    /// once a frame has been consumed completely.
    fn take_buffered_frame(&mut self) -> Result<Option<Opcode>, FrameError> {
        if self.skip > 0 {
            let n = self.skip.min(self.buf.len() as u64);
            self.buf.drain(..n as usize);
            self.skip -= n;
            if self.skip > 0 {
                return Ok(None);
            }
            self.frame_deadline = None;
        }

        let Some(header) = decode_header(&self.buf)? else {
            return Ok(None);
        };

        if header.opcode.is_control() {
            let frame_len = header.frame_len() as usize;
            if self.buf.len() < frame_len {
                return Ok(None);
            }
            self.buf.drain(..frame_len);
        } else {
            let available = (self.buf.len() - header.header_len) as u64;
            let take = header.payload_len.min(available);
            self.buf.drain(..header.header_len + take as usize);
            self.skip = header.payload_len - take;
        }
        if self.skip == 0 {
            self.frame_deadline = None;
        }
        Ok(Some(header.opcode))
    }

    // ── Shared ────────────────────────────────────────────────────────────────

    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CloseReason> {
        let limit = self.ctx.io_timeout;
        let transport = &mut self.transport;
        let write = async move {
            transport.write_all(bytes).await?;
            transport.flush().await
        };
        match timeout(limit, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CloseReason::Transport(e.to_string())),
            Err(_) => Err(CloseReason::Timeout),
        }
    }

    async fn finish(&mut self, reason: &CloseReason) {
        self.ctx.registry.remove(self.id);
        self.outbound = None;
        // Best effort: the peer may already be gone.
        let _ = timeout(self.ctx.io_timeout, self.transport.shutdown()).await;
        match self.role {
            Role::WebSocket => info!("websocket {} ({}): closed: {reason}", self.id, self.peer),
            Role::Plain => debug!("connection {} ({}): closed: {reason}", self.id, self.peer),
        }
    }
}

/// Runs the responder on the blocking pool; it may read from disk.
async fn serve_static(responder: StaticResponder, method: String, path: String) -> HttpResponse {
    match tokio::task::spawn_blocking(move || responder.respond(&method, &path)).await {
        Ok(response) => response,
        Err(e) => {
            error!("static responder failed: {e}");
            HttpResponse::internal_error()
        }
    }
}

async fn next_outbound(outbound: &mut Option<OutboundReceiver>) -> Option<SharedFrame> {
    match outbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn read_more<R>(transport: &mut R, buf: &mut Vec<u8>, deadline: Option<Instant>) -> ReadOutcome
where
    R: AsyncRead + Unpin,
{
    buf.reserve(READ_CHUNK);
    let result = match deadline {
        Some(deadline) => match timeout_at(deadline, transport.read_buf(buf)).await {
            Ok(result) => result,
            Err(_) => return ReadOutcome::Timeout,
        },
        None => transport.read_buf(buf).await,
    };
    match result {
        Ok(0) => ReadOutcome::Eof,
        Ok(_) => ReadOutcome::Data,
        Err(e) => ReadOutcome::Failed(e),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
