//! Connection state machine for streaming routes.
//!
//! ```text
//! Pending ──on_connect ok──▶ Accepted ──▶ Active ──handle ends──▶ Closed
//!    │
//!    └──on_connect false / error──▶ Rejected
//! ```
//!
//! One `ConnectionSession` is driven per connection attempt, on its own task.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use wrapnode_protocol::CloseCode;
use wrapnode_transport::BoxConnection;

use crate::connection::{Closure, Connection};
use crate::handler::{Fault, StreamHandlerDyn, isolate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Pending,
    Accepted,
    Active,
    Closed,
    Rejected,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Rejected)
    }

    fn can_become(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Pending, Accepted) | (Pending, Rejected) | (Pending, Closed) | (Accepted, Active) | (Active, Closed)
        )
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SessionOutcome {
    pub state: ConnectionState,
    /// Code delivered to `on_disconnect`; `None` if the connection was never accepted.
    pub close_code: Option<CloseCode>,
    pub failed: bool,
}

pub(crate) struct ConnectionSession {
    conn: Connection,
    state: ConnectionState,
    handler: Arc<dyn StreamHandlerDyn>,
}

impl ConnectionSession {
    pub(crate) fn new(route: Arc<str>, handler: Arc<dyn StreamHandlerDyn>, raw: BoxConnection) -> Self {
        Self {
            conn: Connection::new(route, raw),
            state: ConnectionState::Pending,
            handler,
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(self.state.can_become(next), "{:?} -> {next:?}", self.state);
        debug!(connection = %self.conn.id(), from = ?self.state, to = ?next, "Session transition");
        self.state = next;
    }

    fn ended(&self, close_code: Option<CloseCode>, failed: bool) -> SessionOutcome {
        SessionOutcome {
            state: self.state,
            close_code,
            failed,
        }
    }

    pub(crate) async fn run(mut self) -> SessionOutcome {
        let hooks = self.handler.hooks_dyn();
        let handler_name = self.handler.name_dyn().to_string();

        if hooks.connect {
            let allowed = match isolate(self.handler.on_connect_dyn(&self.conn)).await {
                Ok(allowed) => allowed,
                Err(fault) => {
                    warn!(connection = %self.conn.id(), handler = %handler_name, "on_connect failed: {fault}");
                    false
                }
            };
            if !allowed {
                if let Err(e) = self.conn.reject(CloseCode::POLICY_VIOLATION).await {
                    debug!(connection = %self.conn.id(), "Reject not delivered: {e}");
                }
                self.transition(ConnectionState::Rejected);
                info!(connection = %self.conn.id(), route = %self.conn.route(), "Connection rejected");
                return self.ended(None, false);
            }
        }

        if let Err(e) = self.conn.accept().await {
            warn!(connection = %self.conn.id(), route = %self.conn.route(), "Accept failed: {e}");
            self.transition(ConnectionState::Closed);
            return self.ended(None, true);
        }
        self.transition(ConnectionState::Accepted);
        self.transition(ConnectionState::Active);
        info!(connection = %self.conn.id(), route = %self.conn.route(), "Client connected");

        let result = isolate(self.handler.handle_dyn(&mut self.conn)).await;
        let (code, failed) = match result {
            Ok(()) => {
                let code = self.conn.closure().map(|c| c.code()).unwrap_or(CloseCode::NORMAL);
                if !self.conn.is_closed() {
                    let _ = self.conn.close(CloseCode::NORMAL).await;
                }
                (code, false)
            }
            Err(fault) => {
                log_fault(&self.conn, &handler_name, &fault);
                let code = match self.conn.closure() {
                    Some(Closure::Peer(code)) => code,
                    _ => CloseCode::ABNORMAL,
                };
                if !self.conn.is_closed() {
                    let _ = self.conn.close(CloseCode::INTERNAL_ERROR).await;
                }
                (code, true)
            }
        };
        self.transition(ConnectionState::Closed);

        if hooks.disconnect {
            if let Err(fault) = isolate(self.handler.on_disconnect_dyn(&self.conn, code)).await {
                warn!(connection = %self.conn.id(), handler = %handler_name, "on_disconnect failed: {fault}");
            }
        }
        info!(connection = %self.conn.id(), route = %self.conn.route(), code = code.code(), "Client disconnected");

        self.ended(Some(code), failed)
    }
}

fn log_fault(conn: &Connection, handler: &str, fault: &Fault) {
    error!(connection = %conn.id(), route = %conn.route(), handler = %handler, "Streaming handler failed: {fault}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrapnode_protocol::{HandlerError, Inbound};
    use wrapnode_transport::testing::{PeerEvent, mock_connection};

    use crate::handler::{Hooks, StreamHandler};

    struct Gate {
        allow: bool,
    }

    impl StreamHandler for Gate {
        const HOOKS: Hooks = Hooks::NONE.with_connect();

        async fn on_connect(&self, _conn: &Connection) -> Result<bool, HandlerError> {
            Ok(self.allow)
        }

        async fn handle(&self, conn: &mut Connection) -> Result<(), HandlerError> {
            while let Inbound::Message(message) = conn.receive().await {
                conn.send(message).await?;
            }
            Ok(())
        }
    }

    struct Exploding;

    impl StreamHandler for Exploding {
        async fn handle(&self, _conn: &mut Connection) -> Result<(), HandlerError> {
            Err(HandlerError::new("boom"))
        }
    }

    fn session(handler: impl StreamHandler, conn: wrapnode_transport::testing::MockConnection) -> ConnectionSession {
        ConnectionSession::new(Arc::from("/ws"), Arc::new(handler), Box::new(conn))
    }

    #[tokio::test]
    async fn rejected_session_never_accepts() {
        let (conn, mut peer) = mock_connection("/ws");
        let outcome = session(Gate { allow: false }, conn).run().await;
        assert_eq!(outcome.state, ConnectionState::Rejected);
        assert_eq!(outcome.close_code, None);
        assert_eq!(
            peer.events_until_closed().await,
            vec![PeerEvent::Rejected(CloseCode::POLICY_VIOLATION)]
        );
    }

    #[tokio::test]
    async fn peer_close_code_is_reported() {
        let (conn, peer) = mock_connection("/ws");
        peer.close(CloseCode::GOING_AWAY);
        let outcome = session(Gate { allow: true }, conn).run().await;
        assert_eq!(outcome.state, ConnectionState::Closed);
        assert_eq!(outcome.close_code, Some(CloseCode::GOING_AWAY));
        assert!(!outcome.failed);
    }

    #[tokio::test]
    async fn failure_reports_abnormal_and_closes_with_internal_error() {
        let (conn, mut peer) = mock_connection("/ws");
        let outcome = session(Exploding, conn).run().await;
        assert!(outcome.failed);
        assert_eq!(outcome.close_code, Some(CloseCode::ABNORMAL));
        assert_eq!(
            peer.events_until_closed().await,
            vec![PeerEvent::Accepted, PeerEvent::Closed(CloseCode::INTERNAL_ERROR)]
        );
    }

    #[tokio::test]
    async fn failed_accept_ends_closed_without_a_code() {
        let (conn, _peer) = mock_connection("/ws");
        let outcome = session(Gate { allow: true }, conn.fail_accept()).run().await;
        assert_eq!(outcome.state, ConnectionState::Closed);
        assert_eq!(outcome.close_code, None);
        assert!(outcome.failed);
    }

    #[test]
    fn only_forward_transitions_are_legal() {
        assert!(ConnectionState::Pending.can_become(ConnectionState::Accepted));
        assert!(ConnectionState::Active.can_become(ConnectionState::Closed));
        assert!(!ConnectionState::Rejected.can_become(ConnectionState::Active));
        assert!(!ConnectionState::Closed.can_become(ConnectionState::Active));
        assert!(ConnectionState::Rejected.is_terminal());
    }
}
