//! Startup and shutdown hook orchestration.
//!
//! Startup visits handlers in registration order (request/response routes
//! first, then streaming routes); shutdown visits them in exactly the reverse
//! order. Both passes are best-effort: every declared hook is attempted, and
//! failures are collected as warnings instead of aborting the pass.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{info, warn};
use wrapnode_protocol::{BoxFuture, HandlerError};

use crate::handler::{Fault, HttpHandlerDyn, StreamHandlerDyn, isolate};
use crate::route::{HttpRoute, StreamRoute};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Startup,
    Shutdown,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup => f.write_str("startup"),
            Self::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// One hook that failed or panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{phase} hook of {handler} ({route}) failed: {message}")]
pub struct HookFailure {
    pub phase: HookPhase,
    pub route: String,
    pub handler: String,
    pub message: String,
}

/// What one lifecycle pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub phase: HookPhase,
    /// Handler names whose hook ran, in invocation order.
    pub invoked: Vec<String>,
    pub failures: Vec<HookFailure>,
}

impl LifecycleReport {
    fn new(phase: HookPhase) -> Self {
        Self {
            phase,
            invoked: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Participant {
    Http(Arc<dyn HttpHandlerDyn>),
    Stream(Arc<dyn StreamHandlerDyn>),
}

impl Participant {
    fn name(&self) -> &str {
        match self {
            Self::Http(h) => h.name_dyn(),
            Self::Stream(h) => h.name_dyn(),
        }
    }

    fn declares(&self, phase: HookPhase) -> bool {
        let hooks = match self {
            Self::Http(h) => h.hooks_dyn(),
            Self::Stream(h) => h.hooks_dyn(),
        };
        match phase {
            HookPhase::Startup => hooks.startup,
            HookPhase::Shutdown => hooks.shutdown,
        }
    }

    fn hook(&self, phase: HookPhase) -> BoxFuture<'_, Result<(), HandlerError>> {
        match (self, phase) {
            (Self::Http(h), HookPhase::Startup) => h.on_startup_dyn(),
            (Self::Http(h), HookPhase::Shutdown) => h.on_shutdown_dyn(),
            (Self::Stream(h), HookPhase::Startup) => h.on_startup_dyn(),
            (Self::Stream(h), HookPhase::Shutdown) => h.on_shutdown_dyn(),
        }
    }
}

struct Entry {
    route: String,
    participant: Participant,
}

/// Hook orchestrator for one composed application.
pub struct Lifecycle {
    entries: Vec<Entry>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl Lifecycle {
    /// A handler shared by several routes is registered once, at its first
    /// route.
    pub(crate) fn new(http: &[HttpRoute], streams: &[StreamRoute]) -> Self {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for route in http {
            if seen.insert(Arc::as_ptr(&route.handler) as *const () as usize) {
                entries.push(Entry {
                    route: route.path.clone(),
                    participant: Participant::Http(route.handler.clone()),
                });
            }
        }
        for route in streams {
            if seen.insert(Arc::as_ptr(&route.handler) as *const () as usize) {
                entries.push(Entry {
                    route: route.path.clone(),
                    participant: Participant::Stream(route.handler.clone()),
                });
            }
        }

        Self {
            entries,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Number of distinct handlers taking part.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every declared `on_startup`, in registration order. Runs at most
    /// once; later calls return an empty report.
    pub async fn startup(&self) -> LifecycleReport {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Startup hooks already ran");
            return LifecycleReport::new(HookPhase::Startup);
        }
        self.run(HookPhase::Startup, self.entries.iter()).await
    }

    /// Run every declared `on_shutdown`, in reverse registration order. Runs
    /// at most once.
    pub async fn shutdown(&self) -> LifecycleReport {
        if self.stopped.swap(true, Ordering::SeqCst) {
            warn!("Shutdown hooks already ran");
            return LifecycleReport::new(HookPhase::Shutdown);
        }
        self.run(HookPhase::Shutdown, self.entries.iter().rev()).await
    }

    async fn run<'a>(&'a self, phase: HookPhase, entries: impl Iterator<Item = &'a Entry>) -> LifecycleReport {
        let mut report = LifecycleReport::new(phase);

        for entry in entries.filter(|e| e.participant.declares(phase)) {
            let handler = entry.participant.name().to_string();
            report.invoked.push(handler.clone());

            if let Err(fault) = isolate(entry.participant.hook(phase)).await {
                let message = match fault {
                    Fault::Error(err) => err.message,
                    Fault::Panic(msg) => format!("panicked: {msg}"),
                };
                let failure = HookFailure {
                    phase,
                    route: entry.route.clone(),
                    handler,
                    message,
                };
                warn!("{failure}");
                report.failures.push(failure);
            }
        }

        info!(
            "{phase} hooks done ({} run, {} failed)",
            report.invoked.len(),
            report.failures.len()
        );
        report
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("participants", &self.entries.iter().map(|e| e.participant.name()).collect::<Vec<_>>())
            .finish()
    }
}
