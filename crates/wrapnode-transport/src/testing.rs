//! In-memory transport for exercising dispatch without sockets.
//!
//! `RecordingApp` collects mounted endpoints so they can be called directly.
//! `mock_connection` builds a `RawConnection` whose other end (`MockPeer`) is
//! driven by the test: it feeds inbound messages and observes what the
//! server side did.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wrapnode_protocol::{
    CloseCode, ConnectInfo, CorsPolicy, Inbound, Message, Method, Request, Response,
    TransportError,
};

use crate::mount::{HttpEndpoint, MountableApp, RawConnection, StreamEndpoint};

// ─────────────────────────────────────────────────────────────────────────────
// Recording application
// ─────────────────────────────────────────────────────────────────────────────

/// A `MountableApp` that only remembers what was mounted.
#[derive(Default)]
pub struct RecordingApp {
    pub http: Vec<(String, Method, HttpEndpoint)>,
    pub streams: Vec<(String, StreamEndpoint)>,
    pub cors: Option<CorsPolicy>,
}

impl RecordingApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounted `(path, method)` pairs in mount order.
    pub fn http_routes(&self) -> Vec<(String, Method)> {
        self.http.iter().map(|(p, m, _)| (p.clone(), *m)).collect()
    }

    pub fn stream_paths(&self) -> Vec<String> {
        self.streams.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn http_endpoint(&self, path: &str, method: Method) -> Option<HttpEndpoint> {
        self.http
            .iter()
            .find(|(p, m, _)| p == path && *m == method)
            .map(|(_, _, e)| e.clone())
    }

    /// Dispatch `request` to the endpoint mounted for its path and method.
    pub async fn call(&self, request: Request) -> Option<Response> {
        let endpoint = self.http_endpoint(request.path(), request.method())?;
        Some(endpoint(request).await)
    }

    pub fn stream_endpoint(&self, path: &str) -> Option<StreamEndpoint> {
        self.streams
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, e)| e.clone())
    }

    /// Open an in-memory streaming connection to the endpoint at `path`.
    /// The returned handle completes when the server side is done.
    pub fn connect(&self, path: &str) -> Option<(MockPeer, JoinHandle<()>)> {
        let endpoint = self.stream_endpoint(path)?;
        let (conn, peer) = mock_connection(path);
        let session = tokio::spawn(endpoint(Box::new(conn)));
        Some((peer, session))
    }
}

impl MountableApp for RecordingApp {
    type Output = RecordingApp;

    fn mount_http(&mut self, path: &str, method: Method, endpoint: HttpEndpoint) {
        self.http.push((path.to_string(), method, endpoint));
    }

    fn mount_stream(&mut self, path: &str, endpoint: StreamEndpoint) {
        self.streams.push((path.to_string(), endpoint));
    }

    fn apply_cors(&mut self, policy: &CorsPolicy) {
        self.cors = Some(policy.clone());
    }

    fn finish(self) -> RecordingApp {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock connection
// ─────────────────────────────────────────────────────────────────────────────

/// What the server side did to the connection, as seen by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Accepted,
    Rejected(CloseCode),
    Message(Message),
    Closed(CloseCode),
}

impl PeerEvent {
    fn is_final(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::Closed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockState {
    Pending,
    Open,
    Rejected,
    Closed,
}

type InboundItem = Result<Inbound, TransportError>;

/// Server half of an in-memory connection.
pub struct MockConnection {
    info: ConnectInfo,
    state: MockState,
    fail_accept: bool,
    inbound: mpsc::UnboundedReceiver<InboundItem>,
    events: mpsc::UnboundedSender<PeerEvent>,
}

/// Test half of an in-memory connection.
pub struct MockPeer {
    inbound: Option<mpsc::UnboundedSender<InboundItem>>,
    events: mpsc::UnboundedReceiver<PeerEvent>,
}

/// Create a connected pair for a connection attempt at `uri`.
pub fn mock_connection(uri: &str) -> (MockConnection, MockPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let info = ConnectInfo {
        uri: uri.parse().unwrap_or_default(),
        ..ConnectInfo::default()
    };
    let conn = MockConnection {
        info,
        state: MockState::Pending,
        fail_accept: false,
        inbound: inbound_rx,
        events: events_tx,
    };
    let peer = MockPeer {
        inbound: Some(inbound_tx),
        events: events_rx,
    };
    (conn, peer)
}

impl MockConnection {
    /// Make `accept` fail as if the upgrade could not be completed.
    pub fn fail_accept(mut self) -> Self {
        self.fail_accept = true;
        self
    }

    fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event);
    }

    fn require_open(&self) -> Result<(), TransportError> {
        match self.state {
            MockState::Open => Ok(()),
            MockState::Closed => Err(TransportError::Closed),
            MockState::Pending => Err(TransportError::InvalidState("pending")),
            MockState::Rejected => Err(TransportError::InvalidState("rejected")),
        }
    }
}

impl RawConnection for MockConnection {
    fn info(&self) -> &ConnectInfo {
        &self.info
    }

    async fn accept(&mut self) -> Result<(), TransportError> {
        if self.state != MockState::Pending {
            return Err(TransportError::InvalidState("not pending"));
        }
        if self.fail_accept {
            self.state = MockState::Closed;
            return Err(TransportError::UpgradeFailed("mock upgrade refused".into()));
        }
        self.state = MockState::Open;
        self.emit(PeerEvent::Accepted);
        Ok(())
    }

    async fn reject(&mut self, code: CloseCode) -> Result<(), TransportError> {
        if self.state != MockState::Pending {
            return Err(TransportError::InvalidState("not pending"));
        }
        self.state = MockState::Rejected;
        self.emit(PeerEvent::Rejected(code));
        Ok(())
    }

    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        self.require_open()?;
        self.emit(PeerEvent::Message(message));
        Ok(())
    }

    async fn receive(&mut self) -> Result<Inbound, TransportError> {
        self.require_open()?;
        let item = self
            .inbound
            .recv()
            .await
            .unwrap_or(Ok(Inbound::Closed(CloseCode::ABNORMAL)));
        if !matches!(item, Ok(Inbound::Message(_))) {
            self.state = MockState::Closed;
        }
        item
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        match self.state {
            MockState::Open => {
                self.state = MockState::Closed;
                self.emit(PeerEvent::Closed(code));
                Ok(())
            }
            MockState::Closed => Ok(()),
            _ => Err(TransportError::InvalidState("not open")),
        }
    }
}

impl MockPeer {
    pub fn send(&self, message: impl Into<Message>) {
        self.push(Ok(Inbound::Message(message.into())));
    }

    /// Close from the peer side with `code`.
    pub fn close(&self, code: CloseCode) {
        self.push(Ok(Inbound::Closed(code)));
    }

    /// Make the next receive on the server side fail with a transport error.
    pub fn break_connection(&self, reason: &str) {
        self.push(Err(TransportError::Io(reason.to_string())));
    }

    /// Vanish without a close frame.
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    fn push(&self, item: InboundItem) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(item);
        }
    }

    pub async fn next_event(&mut self) -> Option<PeerEvent> {
        self.events.recv().await
    }

    /// The next message the server sent, skipping lifecycle events.
    pub async fn next_message(&mut self) -> Option<Message> {
        while let Some(event) = self.events.recv().await {
            match event {
                PeerEvent::Message(message) => return Some(message),
                e if e.is_final() => return None,
                _ => continue,
            }
        }
        None
    }

    /// Collect events until the server side rejects or closes (or goes away).
    pub async fn events_until_closed(&mut self) -> Vec<PeerEvent> {
        let mut seen = Vec::new();
        while let Some(event) = self.events.recv().await {
            let last = event.is_final();
            seen.push(event);
            if last {
                break;
            }
        }
        seen
    }
}
