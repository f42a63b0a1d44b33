//! Cross-origin policy data.
//!
//! Validation lives in the server crate; the transport turns a validated
//! policy into its boundary layer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsPolicy {
    pub allow_origins: BTreeSet<String>,
    pub allow_credentials: bool,
    pub allow_methods: BTreeSet<String>,
    pub allow_headers: BTreeSet<String>,
}

impl Default for CorsPolicy {
    /// Permissive: any origin, method and header, no credentials.
    fn default() -> Self {
        Self {
            allow_origins: wildcard(),
            allow_credentials: false,
            allow_methods: wildcard(),
            allow_headers: wildcard(),
        }
    }
}

impl CorsPolicy {
    /// A policy that only allows the listed origins (methods/headers stay open).
    pub fn for_origins<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_origins: origins.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn any_origin(&self) -> bool {
        self.allow_origins.contains(WILDCARD)
    }

    pub fn any_method(&self) -> bool {
        self.allow_methods.contains(WILDCARD)
    }

    pub fn any_header(&self) -> bool {
        self.allow_headers.contains(WILDCARD)
    }
}

fn wildcard() -> BTreeSet<String> {
    BTreeSet::from([WILDCARD.to_string()])
}
