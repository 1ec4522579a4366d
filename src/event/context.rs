// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-dispatch context passed alongside the event argument.

use std::sync::Arc;

use super::{DispatchId, EventKind, TransportRequest};

/// Context that travels with one dispatch, next to (never inside) the payload.
///
/// A context is created by the router for a single event and moved into the
/// operation's [`Invocation`](crate::service::Invocation). The attached
/// transport request is shared read-only and is only ever present for
/// [`EventKind::ContentNotification`].
#[derive(Debug, Clone)]
pub struct DispatchContext {
    id: DispatchId,
    kind: EventKind,
    request: Option<Arc<TransportRequest>>,
}

impl DispatchContext {
    /// Creates a context without auxiliary data.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: DispatchId::new(),
            kind,
            request: None,
        }
    }

    /// Uses an existing dispatch id instead of a fresh one.
    #[must_use]
    pub fn with_id(mut self, id: DispatchId) -> Self {
        self.id = id;
        self
    }

    /// Attaches the originating transport request.
    #[must_use]
    pub(crate) fn with_transport_request(mut self, request: TransportRequest) -> Self {
        self.request = Some(Arc::new(request));
        self
    }

    /// Returns the dispatch id.
    #[must_use]
    pub fn id(&self) -> DispatchId {
        self.id
    }

    /// Returns the kind of the event being dispatched.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the transport request, for content notifications.
    #[must_use]
    pub fn transport_request(&self) -> Option<&TransportRequest> {
        self.request.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_no_request() {
        let context = DispatchContext::new(EventKind::SubscriptionVerification);
        assert!(context.transport_request().is_none());
        assert_eq!(context.kind(), EventKind::SubscriptionVerification);
    }

    #[test]
    fn attached_request_is_readable() {
        let context = DispatchContext::new(EventKind::ContentNotification)
            .with_transport_request(TransportRequest::new("POST", "/sub"));
        assert_eq!(context.transport_request().map(TransportRequest::path), Some("/sub"));
    }

    #[test]
    fn with_id_overrides() {
        let id = DispatchId::new();
        let context = DispatchContext::new(EventKind::ContentNotification).with_id(id);
        assert_eq!(context.id(), id);
    }
}
