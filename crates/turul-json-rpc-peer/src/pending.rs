//! Correlation table: outstanding outbound calls keyed by call id.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{JsonRpcErrorObject, PeerError};
use crate::request::Params;
use crate::types::RequestId;

/// Outcome delivered to a call's callback
pub type CallResult = Result<Value, JsonRpcErrorObject>;

/// One-shot handler for the response to an outbound call
pub type ResponseCallback = Box<dyn FnOnce(CallResult) + Send + 'static>;

pub(crate) struct CorrelationTable {
    entries: Mutex<HashMap<RequestId, ResponseCallback>>,
    limit: Option<usize>,
}

impl CorrelationTable {
    pub(crate) fn new(limit: Option<usize>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            limit,
        }
    }

    /// Register a pending call. An id that is already outstanding is
    /// rejected, never overwritten.
    pub(crate) fn insert(
        &self,
        id: RequestId,
        callback: ResponseCallback,
    ) -> Result<(), PeerError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return Err(PeerError::DuplicateCallId(id));
        }
        if let Some(limit) = self.limit {
            if entries.len() >= limit {
                return Err(PeerError::TooManyPendingCalls(limit));
            }
        }
        entries.insert(id, callback);
        Ok(())
    }

    /// Remove and return the callback for `id`
    pub(crate) fn take(&self, id: &RequestId) -> Option<ResponseCallback> {
        self.entries.lock().remove(id)
    }

    pub(crate) fn contains(&self, id: &RequestId) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Drop every entry without firing any callback. Returns how many were dropped.
    pub(crate) fn clear(&self) -> usize {
        let drained: Vec<_> = self.entries.lock().drain().collect();
        // callbacks are dropped here, outside the lock
        drained.len()
    }
}

/// Derive a call id from the sequence number, method, canonical arguments
/// and callback identity. Not a security boundary; uniqueness among pending
/// ids is enforced by [`CorrelationTable::insert`].
pub(crate) fn generate_call_id(
    prefix: &str,
    sequence: u64,
    method: &str,
    params: &Params,
    callback_identity: usize,
) -> RequestId {
    let canonical_args = params.to_value().to_string();
    let digest = md5::compute(format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{:x}",
        sequence, method, canonical_args, callback_identity
    ));
    RequestId::String(format!("{}_{:x}", prefix, digest))
}
