//! Async session core: connect/negotiate/data-stream loop and the public
//! caller-facing API (C6).
//!
//! Grounded on the donor's `controller.rs` (`AsyncTerminalController`) for
//! the caller-facing method names (`connect`/`send_action`/`close`) and on
//! `telnet_negotiation.rs`'s `process_concurrent_negotiations` for the
//! `tokio::spawn` + `tokio::select!` actor shape — the only place in the
//! donor that actually drives telnet negotiation on the async runtime rather
//! than over a blocking `std::net::TcpStream` (`network.rs`). The actor
//! itself is new: a single task owns the socket and the screen buffer,
//! reached only through an `mpsc` command channel, so a [`Session`] handle
//! can be cloned and shared without a mutex around the buffer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use crate::actions::{self, Action, Effect, SessionMode};
use crate::buffer::ScreenBuffer;
use crate::codes::AidKey;
use crate::config::SessionConfig;
use crate::datastream::{DataStreamProcessor, PendingRead};
use crate::ebcdic::CodePage;
use crate::error::{Error, NegotiationFailure, NegotiationFailureReason, Result, StateError};
use crate::logging::{self, Level, Logger};
use crate::negotiate::{NegotiatedMode, Negotiator};
use crate::telnet::{self, Event, Framer};

/// Coarse lifecycle phase. The fine-grained TN3270E device-type/functions
/// handshake steps live inside [`Negotiator`] itself; this enum only tracks
/// the states a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Disconnected,
    TcpOpen,
    TelnetNegotiating,
    Tn3270eOffered,
    Tn3270eSubnegotiating,
    Tn3270Ready,
    BasicTn3270Ready,
    NvtMode,
    Closing,
    Closed,
}

impl SessionPhase {
    fn name(self) -> &'static str {
        match self {
            SessionPhase::Disconnected => "Disconnected",
            SessionPhase::TcpOpen => "TcpOpen",
            SessionPhase::TelnetNegotiating => "TelnetNegotiating",
            SessionPhase::Tn3270eOffered => "Tn3270eOffered",
            SessionPhase::Tn3270eSubnegotiating => "Tn3270eSubnegotiating",
            SessionPhase::Tn3270Ready => "Tn3270Ready",
            SessionPhase::BasicTn3270Ready => "BasicTn3270Ready",
            SessionPhase::NvtMode => "NvtMode",
            SessionPhase::Closing => "Closing",
            SessionPhase::Closed => "Closed",
        }
    }

    fn allowed(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        if next == Closed {
            return true; // peer close / fatal I/O error can fault from any state
        }
        matches!(
            (self, next),
            (Disconnected, TcpOpen)
                | (TcpOpen, TelnetNegotiating)
                | (TelnetNegotiating, Tn3270eOffered)
                | (Tn3270eOffered, Tn3270eSubnegotiating)
                | (Tn3270eSubnegotiating, Tn3270Ready)
                | (TelnetNegotiating, Tn3270Ready)
                | (TelnetNegotiating, BasicTn3270Ready)
                | (TelnetNegotiating, NvtMode)
                | (Tn3270Ready, Closing)
                | (BasicTn3270Ready, Closing)
                | (NvtMode, Closing)
                | (TcpOpen, Closing)
                | (TelnetNegotiating, Closing)
                | (Tn3270eOffered, Closing)
                | (Tn3270eSubnegotiating, Closing)
                | (Closing, Closed)
        )
    }

    fn transition(&mut self, next: SessionPhase) -> std::result::Result<(), StateError> {
        if !self.allowed(next) {
            return Err(StateError { from: self.name(), attempted: next.name() });
        }
        *self = next;
        Ok(())
    }
}

/// A read-only view of the screen at the moment [`Session::read_screen`]
/// returned, decoded through the session's configured code page.
#[derive(Debug, Clone)]
pub struct ScreenSnapshot {
    pub rows: Vec<String>,
    pub cursor: (usize, usize),
    pub keyboard_locked: bool,
    pub alarm: bool,
}

enum Command {
    SendAction(Action, oneshot::Sender<Result<Option<AidKey>>>),
    ReadScreen(Duration, oneshot::Sender<Result<ScreenSnapshot>>),
    Close(oneshot::Sender<()>),
}

/// A handle to a running session actor. Cloning shares the same underlying
/// connection; the actor task stops when every handle has dropped and the
/// command channel closes, or when [`Session::close`] is called.
#[derive(Clone)]
pub struct Session {
    cmd_tx: mpsc::Sender<Command>,
}

impl Session {
    /// Open a TCP connection to `addr`, run telnet/TN3270E negotiation to
    /// completion (or to NVT fallback) within `config`'s timing profile, and
    /// return a handle to the running session actor.
    pub async fn connect(addr: &str, config: SessionConfig, logger: Arc<dyn Logger>) -> Result<Session> {
        let step_timeout = config.step_timeout_or_default();
        let overall_timeout = config.overall_timeout_or_default();

        let stream = timeout(step_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout { deadline_ms: step_timeout.as_millis() as u64 })??;
        logging::log_at!(logger, Level::Info, "session", "tcp connection established to {addr}");

        let codepage = CodePage::by_name(&config.code_page).unwrap_or_else(CodePage::cp037);
        let buffer = ScreenBuffer::new(config.screen_size());
        let negotiator = Negotiator::new(config.device_type.clone(), crate::negotiate::FN_RESPONSES);

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let actor = SessionActor {
            stream,
            framer: Framer::new(),
            negotiator,
            parser: DataStreamProcessor::new(),
            buffer,
            mode: SessionMode::default(),
            codepage,
            phase: SessionPhase::TcpOpen,
            logger,
            pending_read: PendingRead::None,
            waiters: Vec::new(),
            buffer_version: 0,
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(actor.run(cmd_rx, ready_tx, overall_timeout));

        match ready_rx.await {
            Ok(Ok(())) => Ok(Session { cmd_tx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::NotConnected),
        }
    }

    /// Dispatch one user action. Returns the AID that was sent to the host,
    /// if the action produced one.
    pub async fn send_action(&self, action: Action) -> Result<Option<AidKey>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(Command::SendAction(action, tx)).await.map_err(|_| Error::NotConnected)?;
        rx.await.map_err(|_| Error::NotConnected)?
    }

    /// Wait for the next screen update (or return the current screen
    /// immediately if one already arrived since the last call), bounded by
    /// `deadline`.
    pub async fn read_screen(&self, deadline: Duration) -> Result<ScreenSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(Command::ReadScreen(deadline, tx)).await.map_err(|_| Error::NotConnected)?;
        rx.await.map_err(|_| Error::NotConnected)?
    }

    /// Close the session gracefully. Idempotent: closing an already-closed
    /// session is a no-op rather than an error.
    pub async fn close(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Close(tx)).await.is_ok() {
            let _ = rx.await;
        }
        Ok(())
    }
}

struct ScreenWaiter {
    baseline_version: u64,
    deadline: Instant,
    reply: oneshot::Sender<Result<ScreenSnapshot>>,
}

struct SessionActor {
    stream: TcpStream,
    framer: Framer,
    negotiator: Negotiator,
    parser: DataStreamProcessor,
    buffer: ScreenBuffer,
    mode: SessionMode,
    codepage: &'static CodePage,
    phase: SessionPhase,
    logger: Arc<dyn Logger>,
    pending_read: PendingRead,
    waiters: Vec<ScreenWaiter>,
    buffer_version: u64,
}

impl SessionActor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        ready_tx: oneshot::Sender<Result<()>>,
        overall_timeout: Duration,
    ) {
        if let Err(e) = self.negotiate(overall_timeout).await {
            let _ = ready_tx.send(Err(e));
            return;
        }
        let _ = ready_tx.send(Ok(()));
        self.serve(&mut cmd_rx).await;
    }

    /// Drive telnet option negotiation (and TN3270E device-type/functions
    /// sub-negotiation, if offered) to a usable mode or to NVT fallback,
    /// bounded by `overall_timeout`. NVT is always a legitimate terminal
    /// state, not a failure; [`Error::NegotiationFailure`] is only
    /// raised when the peer actively rejects an essential option before any
    /// mode is reached.
    async fn negotiate(&mut self, overall_timeout: Duration) -> Result<()> {
        let started = Instant::now();
        self.phase.transition(SessionPhase::TelnetNegotiating)?;

        let mut buf = [0u8; 4096];
        loop {
            if let Some(mode) = self.negotiator.outcome() {
                self.settle(mode)?;
                return Ok(());
            }

            if self.negotiator.essential_rejected() {
                return Err(Error::NegotiationFailure(NegotiationFailure {
                    reason: NegotiationFailureReason::NoUsableMode,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }));
            }

            let remaining = overall_timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                let mode = self.negotiator.fallback_outcome();
                self.settle(mode)?;
                return Ok(());
            }

            match timeout(remaining, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) => return Err(Error::NotConnected),
                Ok(Ok(n)) => self.ingest_negotiation(&buf[..n]).await?,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    let mode = self.negotiator.fallback_outcome();
                    self.settle(mode)?;
                    return Ok(());
                }
            }
        }
    }

    async fn ingest_negotiation(&mut self, bytes: &[u8]) -> Result<()> {
        let events = self.framer.feed(bytes);
        for event in &events {
            if let Event::Negotiate { option, .. } = event {
                if *option == telnet::OPT_TN3270E {
                    let _ = self.phase.transition(SessionPhase::Tn3270eOffered);
                }
            }
            if let Event::Subnegotiation { option, .. } = event {
                if *option == telnet::OPT_TN3270E {
                    let _ = self.phase.transition(SessionPhase::Tn3270eSubnegotiating);
                }
            }
            let reply = self.negotiator.handle(event);
            if !reply.is_empty() {
                self.stream.write_all(&reply).await?;
            }
        }
        Ok(())
    }

    fn settle(&mut self, mode: NegotiatedMode) -> Result<()> {
        let target = match mode {
            NegotiatedMode::Tn3270e { .. } => SessionPhase::Tn3270Ready,
            NegotiatedMode::Basic3270 => SessionPhase::BasicTn3270Ready,
            NegotiatedMode::Nvt => SessionPhase::NvtMode,
        };
        logging::log_at!(self.logger, Level::Info, "session", "negotiation settled into {}", target.name());
        self.phase.transition(target)?;
        Ok(())
    }

    /// Main loop once negotiation has produced a usable mode: service
    /// caller commands and inbound host data concurrently until closed.
    async fn serve(&mut self, cmd_rx: &mut mpsc::Receiver<Command>) {
        let mut buf = [0u8; 4096];
        loop {
            self.expire_waiters();
            let next_deadline = self.waiters.iter().map(|w| w.deadline).min();

            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(Command::SendAction(action, reply)) => {
                            let result = self.handle_send_action(&action).await;
                            let _ = reply.send(result);
                        }
                        Some(Command::ReadScreen(deadline, reply)) => {
                            self.handle_read_screen(deadline, reply);
                        }
                        Some(Command::Close(reply)) => {
                            self.phase = SessionPhase::Closing;
                            let _ = self.stream.shutdown().await;
                            self.phase = SessionPhase::Closed;
                            self.fail_waiters();
                            let _ = reply.send(());
                            return;
                        }
                        None => return, // every Session handle dropped
                    }
                }
                result = self.stream.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            self.phase = SessionPhase::Closed;
                            self.fail_waiters();
                            return;
                        }
                        Ok(n) => {
                            if let Err(e) = self.ingest(&buf[..n]).await {
                                logging::log_at!(self.logger, Level::Warn, "session", "data stream error: {e}");
                            }
                        }
                        Err(_) => {
                            self.phase = SessionPhase::Closed;
                            self.fail_waiters();
                            return;
                        }
                    }
                }
                _ = sleep_until_opt(next_deadline) => {
                    self.expire_waiters();
                }
            }
        }
    }

    async fn ingest(&mut self, bytes: &[u8]) -> Result<()> {
        let events = self.framer.feed(bytes);
        let mut record = Vec::new();
        for event in events {
            match event {
                Event::Data(data) => record.extend(data),
                Event::EndOfRecord => {
                    let pending = self.parser.process(&mut self.buffer, &record)?;
                    record.clear();
                    self.buffer_version += 1;
                    let has_pending = pending != PendingRead::None;
                    self.pending_read = pending;
                    if has_pending {
                        self.flush_pending_read().await?;
                    }
                    self.wake_waiters();
                }
                Event::Negotiate { .. } | Event::Subnegotiation { .. } => {
                    let reply = self.negotiator.handle(&event);
                    if !reply.is_empty() {
                        self.stream.write_all(&reply).await?;
                    }
                }
                Event::Command(_) => {}
            }
        }
        Ok(())
    }

    async fn flush_pending_read(&mut self) -> Result<()> {
        let pending = std::mem::replace(&mut self.pending_read, PendingRead::None);
        let response = match pending {
            PendingRead::ReadBuffer => self.parser.read_buffer_response(&self.buffer, AidKey::NoAid),
            PendingRead::ReadModified | PendingRead::ReadModifiedAll => {
                self.parser.read_modified_response(&self.buffer, AidKey::NoAid)
            }
            PendingRead::StructuredField(bytes) => bytes,
            PendingRead::None => return Ok(()),
        };
        self.send_record(&response).await
    }

    async fn handle_send_action(&mut self, action: &Action) -> Result<Option<AidKey>> {
        let effect = actions::dispatch(action, &mut self.buffer, &mut self.mode, self.codepage)?;
        self.buffer_version += 1;
        match effect {
            Effect::Aid(aid) => {
                let response = self.parser.read_modified_response(&self.buffer, aid);
                self.send_record(&response).await?;
                Ok(Some(aid))
            }
            Effect::BufferChanged | Effect::None => Ok(None),
        }
    }

    async fn send_record(&mut self, payload: &[u8]) -> Result<()> {
        let framed = telnet::encode_record(payload);
        self.stream.write_all(&framed).await?;
        Ok(())
    }

    fn handle_read_screen(&mut self, deadline: Duration, reply: oneshot::Sender<Result<ScreenSnapshot>>) {
        self.waiters.push(ScreenWaiter {
            baseline_version: self.buffer_version,
            deadline: Instant::now() + deadline,
            reply,
        });
        self.wake_waiters();
    }

    /// Resolve every waiter whose baseline version has been superseded by a
    /// more recent buffer mutation, newest change wins for all of them.
    fn wake_waiters(&mut self) {
        let version = self.buffer_version;
        if self.waiters.iter().all(|w| w.baseline_version == version) {
            return;
        }
        let snapshot = self.snapshot();
        let mut remaining = Vec::with_capacity(self.waiters.len());
        for waiter in self.waiters.drain(..) {
            if waiter.baseline_version != version {
                let _ = waiter.reply.send(Ok(snapshot.clone()));
            } else {
                remaining.push(waiter);
            }
        }
        self.waiters = remaining;
    }

    fn expire_waiters(&mut self) {
        let now = Instant::now();
        let mut remaining = Vec::with_capacity(self.waiters.len());
        for waiter in self.waiters.drain(..) {
            if waiter.deadline <= now {
                let _ = waiter.reply.send(Err(Error::Timeout { deadline_ms: 0 }));
            } else {
                remaining.push(waiter);
            }
        }
        self.waiters = remaining;
    }

    fn fail_waiters(&mut self) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.reply.send(Err(Error::NotConnected));
        }
    }

    fn snapshot(&self) -> ScreenSnapshot {
        let rows = (0..self.buffer.size().rows())
            .map(|r| self.buffer.row_text(r, self.codepage).unwrap_or_default())
            .collect();
        ScreenSnapshot {
            rows,
            cursor: self.buffer.cursor_coords(),
            keyboard_locked: self.buffer.is_keyboard_locked(),
            alarm: self.buffer.alarm(),
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(instant) => tokio::time::sleep_until(instant.into()).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_transitions_follow_the_negotiation_ladder() {
        let mut phase = SessionPhase::Disconnected;
        assert!(phase.transition(SessionPhase::TcpOpen).is_ok());
        assert!(phase.transition(SessionPhase::TelnetNegotiating).is_ok());
        assert!(phase.transition(SessionPhase::BasicTn3270Ready).is_ok());
        assert!(phase.transition(SessionPhase::Closing).is_ok());
        assert!(phase.transition(SessionPhase::Closed).is_ok());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let mut phase = SessionPhase::Disconnected;
        let err = phase.transition(SessionPhase::Tn3270Ready).unwrap_err();
        assert_eq!(err.from, "Disconnected");
        assert_eq!(err.attempted, "Tn3270Ready");
    }

    #[test]
    fn any_phase_can_fault_to_closed() {
        let mut phase = SessionPhase::TelnetNegotiating;
        assert!(phase.transition(SessionPhase::Closed).is_ok());
    }

    #[tokio::test]
    async fn connect_against_a_basic_3270_peer_reaches_basic_ready() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            use telnet::*;
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&encode_negotiation(WILL, OPT_BINARY)).await.unwrap();
            sock.write_all(&encode_negotiation(WILL, OPT_SUPPRESS_GO_AHEAD)).await.unwrap();
            sock.write_all(&encode_negotiation(WILL, OPT_END_OF_RECORD)).await.unwrap();
            sock.write_all(&encode_negotiation(DO, OPT_BINARY)).await.unwrap();
            sock.write_all(&encode_negotiation(DO, OPT_SUPPRESS_GO_AHEAD)).await.unwrap();
            sock.write_all(&encode_negotiation(DO, OPT_END_OF_RECORD)).await.unwrap();
            sock.write_all(&encode_negotiation(WONT, OPT_TN3270E)).await.unwrap();

            let mut buf = [0u8; 256];
            let _ = sock.read(&mut buf).await;
            sock
        });

        let mut config = SessionConfig::new();
        config.timing_profile = crate::config::TimingProfile::Aggressive;
        let session = Session::connect(&addr.to_string(), config, logging::null()).await.unwrap();
        assert_eq!(session.phase, SessionPhase::BasicTn3270Ready);
        session.close().await.unwrap();
        let _ = server.await.unwrap();
    }
}
