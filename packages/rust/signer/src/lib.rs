//! Signer adapter: the narrow boundary to the external request-signing capability.
//!
//! This crate provides:
//! - [`Signer`]: the trait every outbound request goes through before transmission
//! - [`BridgeSigner`]: drives an external signing program over a JSON-lines pipe
//! - [`StaticSigner`]: fixed headers and search id, for tests and dry runs
//!
//! The signing algorithm itself is never implemented here.

mod bridge;

use std::collections::BTreeMap;

use notescout_shared::{NoteScoutError, Result};

pub use bridge::BridgeSigner;

/// Signature headers produced for one request, keyed by header name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureHeaders(pub BTreeMap<String, String>);

impl SignatureHeaders {
    /// Wrap a header map, rejecting an empty one.
    pub fn new(headers: BTreeMap<String, String>) -> Result<Self> {
        if headers.is_empty() {
            return Err(NoteScoutError::signer("signer returned no headers"));
        }
        Ok(Self(headers))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Capability that signs outbound requests.
///
/// `body` is the exact payload text that will be transmitted; signing any
/// other serialization invalidates the request upstream.
pub trait Signer: Send + Sync {
    /// Compute signature headers for one request.
    fn sign(&self, uri: &str, body: &str, cookie: &str) -> Result<SignatureHeaders>;

    /// Produce a search-session identifier.
    fn new_search_id(&self) -> Result<String>;
}

/// Signer returning the same headers and search id every time.
#[derive(Debug, Clone)]
pub struct StaticSigner {
    headers: SignatureHeaders,
    search_id: String,
}

impl StaticSigner {
    pub fn new(headers: &[(&str, &str)], search_id: impl Into<String>) -> Self {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            headers: SignatureHeaders(headers),
            search_id: search_id.into(),
        }
    }
}

impl Default for StaticSigner {
    fn default() -> Self {
        Self::new(&[("x-s", "static-signature"), ("x-t", "0")], "static-search-id")
    }
}

impl Signer for StaticSigner {
    fn sign(&self, _uri: &str, _body: &str, _cookie: &str) -> Result<SignatureHeaders> {
        Ok(self.headers.clone())
    }

    fn new_search_id(&self) -> Result<String> {
        Ok(self.search_id.clone())
    }
}
