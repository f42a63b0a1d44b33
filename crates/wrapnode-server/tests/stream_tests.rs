//! Streaming sessions driven through the composer over in-memory connections.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use wrapnode_server::*;
use wrapnode_transport::testing::{PeerEvent, RecordingApp, mock_connection};

type Journal = Arc<Mutex<Vec<String>>>;

/// Sends a greeting on accept, then answers every message with a prefix.
struct ChatHandler;

impl StreamHandler for ChatHandler {
    async fn handle(&self, conn: &mut Connection) -> Result<(), HandlerError> {
        conn.send_text("hello").await?;
        while let Some(text) = conn.receive_text().await {
            conn.send_text(format!("AI: {text}")).await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Script {
    EchoUntilClosed,
    ReturnAfterOne,
    FailAfterOne,
    PanicAfterOne,
}

struct Scripted {
    script: Script,
    admit: Result<bool, &'static str>,
    journal: Journal,
}

impl Scripted {
    fn new(script: Script, journal: &Journal) -> Self {
        Self {
            script,
            admit: Ok(true),
            journal: journal.clone(),
        }
    }

    fn admit(mut self, admit: Result<bool, &'static str>) -> Self {
        self.admit = admit;
        self
    }

    fn note(&self, entry: impl Into<String>) {
        self.journal.lock().push(entry.into());
    }
}

impl StreamHandler for Scripted {
    const HOOKS: Hooks = Hooks::NONE.with_connect().with_disconnect();

    async fn on_connect(&self, _conn: &Connection) -> Result<bool, HandlerError> {
        self.note("connect");
        self.admit.map_err(HandlerError::new)
    }

    async fn handle(&self, conn: &mut Connection) -> Result<(), HandlerError> {
        self.note("handle");
        match self.script {
            Script::EchoUntilClosed => {
                while let Some(text) = conn.receive_text().await {
                    conn.send_text(text).await?;
                }
                Ok(())
            }
            Script::ReturnAfterOne => {
                conn.receive().await;
                Ok(())
            }
            Script::FailAfterOne => {
                conn.receive().await;
                Err(HandlerError::new("model crashed"))
            }
            Script::PanicAfterOne => {
                conn.receive().await;
                panic!("model exploded")
            }
        }
    }

    async fn on_disconnect(&self, _conn: &Connection, code: CloseCode) -> Result<(), HandlerError> {
        self.note(format!("disconnect:{code}"));
        Ok(())
    }
}

/// Implements `on_disconnect` without declaring it.
struct Undeclared {
    journal: Journal,
}

impl StreamHandler for Undeclared {
    async fn handle(&self, conn: &mut Connection) -> Result<(), HandlerError> {
        conn.receive().await;
        Ok(())
    }

    async fn on_disconnect(&self, _conn: &Connection, _code: CloseCode) -> Result<(), HandlerError> {
        self.journal.lock().push("disconnect".into());
        Ok(())
    }
}

fn app_with(route: StreamRoute) -> RecordingApp {
    compose(ServiceConfig::new().stream_route(route).validate().unwrap(), RecordingApp::new()).app
}

async fn finished(session: JoinHandle<()>) {
    timeout(Duration::from_secs(5), session)
        .await
        .expect("session did not finish")
        .expect("session task panicked");
}

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_greets_then_prefixes_replies() {
    let app = app_with(StreamRoute::new("/chat", ChatHandler));
    let (mut peer, session) = app.connect("/chat").unwrap();

    peer.send("hi");
    assert_eq!(peer.next_message().await, Some(Message::from("hello")));
    assert_eq!(peer.next_message().await, Some(Message::from("AI: hi")));

    peer.close(CloseCode::NORMAL);
    finished(session).await;
}

#[tokio::test]
async fn connection_exposes_request_details() {
    struct Introspect;

    impl StreamHandler for Introspect {
        async fn handle(&self, conn: &mut Connection) -> Result<(), HandlerError> {
            let summary = format!("{} {} {}", conn.route(), conn.path(), conn.query().unwrap_or(""));
            conn.send_text(summary).await?;
            Ok(())
        }
    }

    let app = app_with(StreamRoute::new("/chat", Introspect));
    let endpoint = app.stream_endpoint("/chat").unwrap();
    let (conn, mut peer) = mock_connection("/chat?user=ann");
    let session = tokio::spawn(endpoint(Box::new(conn)));

    assert_eq!(peer.next_message().await, Some(Message::from("/chat /chat user=ann")));
    finished(session).await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Accept / reject
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rejected_connection_never_reaches_handle_or_disconnect() {
    let journal = journal();
    let app = app_with(StreamRoute::new(
        "/gated",
        Scripted::new(Script::EchoUntilClosed, &journal).admit(Ok(false)),
    ));
    let (mut peer, session) = app.connect("/gated").unwrap();

    assert_eq!(
        peer.events_until_closed().await,
        vec![PeerEvent::Rejected(CloseCode::POLICY_VIOLATION)]
    );
    finished(session).await;
    assert_eq!(*journal.lock(), vec!["connect"]);
}

#[tokio::test]
async fn failing_on_connect_rejects() {
    let journal = journal();
    let app = app_with(StreamRoute::new(
        "/gated",
        Scripted::new(Script::EchoUntilClosed, &journal).admit(Err("auth backend down")),
    ));
    let (mut peer, session) = app.connect("/gated").unwrap();

    assert_eq!(peer.next_event().await, Some(PeerEvent::Rejected(CloseCode::POLICY_VIOLATION)));
    finished(session).await;
    assert_eq!(*journal.lock(), vec!["connect"]);
}

#[tokio::test]
async fn absent_on_connect_accepts() {
    let app = app_with(StreamRoute::new("/chat", ChatHandler));
    let (mut peer, session) = app.connect("/chat").unwrap();

    assert_eq!(peer.next_event().await, Some(PeerEvent::Accepted));
    peer.disconnect();
    finished(session).await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Teardown
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn normal_return_closes_with_1000() {
    let journal = journal();
    let app = app_with(StreamRoute::new("/s", Scripted::new(Script::ReturnAfterOne, &journal)));
    let (mut peer, session) = app.connect("/s").unwrap();

    peer.send("bye");
    assert_eq!(
        peer.events_until_closed().await,
        vec![PeerEvent::Accepted, PeerEvent::Closed(CloseCode::NORMAL)]
    );
    finished(session).await;
    assert_eq!(*journal.lock(), vec!["connect", "handle", "disconnect:1000"]);
}

#[tokio::test]
async fn handler_error_closes_with_1011_and_reports_abnormal() {
    let journal = journal();
    let app = app_with(StreamRoute::new("/s", Scripted::new(Script::FailAfterOne, &journal)));
    let (mut peer, session) = app.connect("/s").unwrap();

    peer.send("trigger");
    assert_eq!(
        peer.events_until_closed().await,
        vec![PeerEvent::Accepted, PeerEvent::Closed(CloseCode::INTERNAL_ERROR)]
    );
    finished(session).await;
    assert_eq!(*journal.lock(), vec!["connect", "handle", "disconnect:1006"]);
}

#[tokio::test]
async fn handler_panic_is_contained() {
    let journal = journal();
    let app = app_with(StreamRoute::new("/s", Scripted::new(Script::PanicAfterOne, &journal)));
    let (mut peer, session) = app.connect("/s").unwrap();

    peer.send("trigger");
    assert_eq!(
        peer.events_until_closed().await,
        vec![PeerEvent::Accepted, PeerEvent::Closed(CloseCode::INTERNAL_ERROR)]
    );
    finished(session).await;
    assert_eq!(*journal.lock(), vec!["connect", "handle", "disconnect:1006"]);
}

#[tokio::test]
async fn peer_close_code_reaches_on_disconnect() {
    let journal = journal();
    let app = app_with(StreamRoute::new("/s", Scripted::new(Script::EchoUntilClosed, &journal)));
    let (mut peer, session) = app.connect("/s").unwrap();

    peer.send("one");
    peer.close(CloseCode::GOING_AWAY);
    assert_eq!(
        peer.events_until_closed().await,
        vec![PeerEvent::Accepted, PeerEvent::Message(Message::from("one"))]
    );
    finished(session).await;
    assert_eq!(*journal.lock(), vec!["connect", "handle", "disconnect:1001"]);
}

#[tokio::test]
async fn vanished_peer_reports_abnormal() {
    let journal = journal();
    let app = app_with(StreamRoute::new("/s", Scripted::new(Script::EchoUntilClosed, &journal)));
    let (mut peer, session) = app.connect("/s").unwrap();

    peer.disconnect();
    finished(session).await;
    assert_eq!(*journal.lock(), vec!["connect", "handle", "disconnect:1006"]);
}

#[tokio::test]
async fn transport_error_is_treated_as_disconnect() {
    let journal = journal();
    let app = app_with(StreamRoute::new("/s", Scripted::new(Script::EchoUntilClosed, &journal)));
    let (peer, session) = app.connect("/s").unwrap();

    peer.break_connection("connection reset by peer");
    finished(session).await;
    assert_eq!(*journal.lock(), vec!["connect", "handle", "disconnect:1006"]);
}

#[tokio::test]
async fn undeclared_hooks_are_never_called() {
    let journal = journal();
    let app = app_with(StreamRoute::new("/s", Undeclared { journal: journal.clone() }));
    let (peer, session) = app.connect("/s").unwrap();

    peer.send("x");
    finished(session).await;
    assert!(journal.lock().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Isolation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_failing_session_does_not_disturb_others() {
    let journal = journal();
    let app = RecordingApp::new();
    let app = compose(
        ServiceConfig::new()
            .stream_route(StreamRoute::new("/echo", Scripted::new(Script::EchoUntilClosed, &journal)))
            .stream_route(StreamRoute::new("/crash", Scripted::new(Script::PanicAfterOne, &journal)))
            .validate()
            .unwrap(),
        app,
    )
    .app;

    let (mut healthy, healthy_session) = app.connect("/echo").unwrap();
    let mut crashing = Vec::new();
    for _ in 0..8 {
        let (peer, session) = app.connect("/crash").unwrap();
        peer.send("boom");
        crashing.push((peer, session));
    }
    for (_peer, session) in crashing {
        finished(session).await;
    }

    healthy.send("still here");
    assert_eq!(healthy.next_message().await, Some(Message::from("still here")));
    healthy.close(CloseCode::NORMAL);
    finished(healthy_session).await;

    let disconnects = journal.lock().iter().filter(|e| e.starts_with("disconnect")).count();
    assert_eq!(disconnects, 9);
}
