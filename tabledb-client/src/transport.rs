//! Transport abstraction.

use crate::error::ClientError;
use bytes::Bytes;
use std::future::Future;

/// Carries one encoded request to the service and returns the raw response.
///
/// Implementations own connection handling and framing. They must not
/// retry on their own; version negotiation relies on seeing every response.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        content_type: &'static str,
        body: Bytes,
    ) -> impl Future<Output = Result<Bytes, ClientError>> + Send;
}
