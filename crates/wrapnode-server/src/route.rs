//! Route descriptors: one request/response route or one streaming route,
//! each bound to a handler.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use wrapnode_protocol::Method;

use crate::handler::{HttpHandler, HttpHandlerDyn, StreamHandler, StreamHandlerDyn};

/// A request/response route.
#[derive(Clone)]
pub struct HttpRoute {
    pub(crate) path: String,
    pub(crate) methods: BTreeSet<Method>,
    pub(crate) handler: Arc<dyn HttpHandlerDyn>,
    pub(crate) tags: Vec<String>,
    pub(crate) summary: Option<String>,
    pub(crate) description: Option<String>,
}

impl HttpRoute {
    pub fn new<H: HttpHandler>(
        path: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        handler: H,
    ) -> Self {
        Self::shared(path, methods, Arc::new(handler))
    }

    /// Bind a handler that is also referenced elsewhere (another route, or
    /// the caller keeping a handle on it).
    pub fn shared<H: HttpHandler>(
        path: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        handler: Arc<H>,
    ) -> Self {
        Self {
            path: path.into(),
            methods: methods.into_iter().collect(),
            handler,
            tags: Vec::new(),
            summary: None,
            description: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Declared methods, in canonical order.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.methods.iter().copied()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn handler_name(&self) -> &str {
        self.handler.name_dyn()
    }
}

impl fmt::Debug for HttpRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRoute")
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("handler", &self.handler_name())
            .field("tags", &self.tags)
            .finish()
    }
}

/// A duplex streaming route.
#[derive(Clone)]
pub struct StreamRoute {
    pub(crate) path: String,
    pub(crate) handler: Arc<dyn StreamHandlerDyn>,
    pub(crate) name: Option<String>,
}

impl StreamRoute {
    pub fn new<H: StreamHandler>(path: impl Into<String>, handler: H) -> Self {
        Self::shared(path, Arc::new(handler))
    }

    pub fn shared<H: StreamHandler>(path: impl Into<String>, handler: Arc<H>) -> Self {
        Self {
            path: path.into(),
            handler,
            name: None,
        }
    }

    /// Diagnostic name shown in logs and the endpoint listing.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn handler_name(&self) -> &str {
        self.handler.name_dyn()
    }
}

impl fmt::Debug for StreamRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRoute")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("handler", &self.handler_name())
            .finish()
    }
}
