//! Request identifier generation.
//!
//! # Responsibilities
//! - Mint a unique UUID v4 per request from an entropy source
//! - Substitute a fixed sentinel when the entropy source fails
//!
//! # Design Decisions
//! - Never fails and never blocks the request
//! - The sentinel is a v5-format UUID derived from a domain that does not
//!   exist, so it cannot collide with a minted v4 identifier
//! - Seeing the sentinel in access logs means the OS RNG is broken and
//!   should page someone; it is logged at error level every time

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Builder;

/// Response header carrying the request identifier.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Identifier emitted when the entropy source fails.
pub const BROKEN_ENTROPY_ID: &str = "cd9bbcae-e076-549f-82bf-a08e8c838dd3";

type EntropySource = dyn Fn(&mut [u8]) -> Result<(), rand::Error> + Send + Sync;

/// Mints request identifiers.
#[derive(Clone)]
pub struct RequestIdGenerator {
    source: Arc<EntropySource>,
}

impl RequestIdGenerator {
    /// Generator backed by the operating system RNG.
    pub fn new() -> Self {
        Self::with_source(|buf: &mut [u8]| OsRng.try_fill_bytes(buf))
    }

    /// Generator backed by a custom entropy source.
    pub fn with_source<F>(source: F) -> Self
    where
        F: Fn(&mut [u8]) -> Result<(), rand::Error> + Send + Sync + 'static,
    {
        Self {
            source: Arc::new(source),
        }
    }

    /// Mint a new identifier, or [`BROKEN_ENTROPY_ID`] if no entropy is available.
    pub fn mint(&self) -> String {
        let mut bytes = [0u8; 16];
        match (self.source)(&mut bytes) {
            Ok(()) => Builder::from_random_bytes(bytes)
                .into_uuid()
                .hyphenated()
                .to_string(),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    sentinel = BROKEN_ENTROPY_ID,
                    "Entropy source failed, using sentinel request ID"
                );
                BROKEN_ENTROPY_ID.to_string()
            }
        }
    }

    /// Mint a new identifier as a header value.
    pub fn mint_header(&self) -> (String, HeaderValue) {
        let id = self.mint();
        let value = HeaderValue::from_str(&id)
            .unwrap_or_else(|_| HeaderValue::from_static(BROKEN_ENTROPY_ID));
        (id, value)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RequestIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestIdGenerator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    #[test]
    fn test_mints_v4_uuids() {
        let ids = RequestIdGenerator::new();
        let id = ids.mint();
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_ids_are_unique() {
        let ids = RequestIdGenerator::new();
        let minted: HashSet<String> = (0..1000).map(|_| ids.mint()).collect();
        assert_eq!(minted.len(), 1000);
    }

    #[test]
    fn test_falls_back_to_sentinel() {
        let ids = RequestIdGenerator::with_source(|_| Err(rand::Error::new("no entropy")));
        assert_eq!(ids.mint(), BROKEN_ENTROPY_ID);

        let (id, header) = ids.mint_header();
        assert_eq!(id, BROKEN_ENTROPY_ID);
        assert_eq!(header, BROKEN_ENTROPY_ID);
    }

    #[test]
    fn test_sentinel_is_not_a_v4_uuid() {
        let parsed = Uuid::parse_str(BROKEN_ENTROPY_ID).unwrap();
        assert_eq!(parsed.get_version_num(), 5);
    }
}
