// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-event routing state machine.

use std::fmt;
use std::sync::Arc;

use super::{DispatchBridge, DispatchResult, FreezePolicy, ImmutabilityPolicy};
use crate::error::DispatchError;
use crate::event::{DispatchContext, DispatchId, EventKind, ProtocolEvent};
use crate::payload::Payload;
use crate::service::{CallbackService, EventArgument};

/// Lifecycle of an [`EventRouter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// No event has been dispatched yet.
    Idle,
    /// The operation is running.
    Dispatching,
    /// The operation returned a value. Terminal.
    Completed,
    /// The dispatch failed. Terminal.
    Failed,
}

impl RouterState {
    /// Returns `true` for [`Completed`](Self::Completed) and [`Failed`](Self::Failed).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Routes one [`ProtocolEvent`] to its callback operation.
///
/// A router is created for a single inbound event and discarded after
/// [`dispatch`](Self::dispatch) returns. Routers share nothing mutable, so
/// concurrent events each get their own router over the same
/// `Arc<CallbackService>`.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use websub_dispatch::dispatch::{EventRouter, RouterState};
/// use websub_dispatch::event::ProtocolEvent;
/// use websub_dispatch::service::{ArgumentMode, CallbackService};
/// use websub_dispatch::Payload;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let service = CallbackService::builder("subscriber")
///     .on_subscription_verification(ArgumentMode::Mutable, |invocation| async move {
///         let challenge = invocation.payload().and_then(|p| p.get_str("hub.challenge"));
///         Ok(json!(challenge))
///     })
///     .build()
///     .unwrap();
///
/// let payload: Payload = [("hub.mode", "subscribe"), ("hub.challenge", "xyz")]
///     .into_iter()
///     .collect();
///
/// let mut router = EventRouter::new(Arc::new(service));
/// let value = router
///     .dispatch(ProtocolEvent::SubscriptionVerification(payload))
///     .await
///     .unwrap();
///
/// assert_eq!(value, json!("xyz"));
/// assert_eq!(router.state(), RouterState::Completed);
/// # }
/// ```
pub struct EventRouter {
    service: Arc<CallbackService>,
    policy: Arc<dyn FreezePolicy>,
    state: RouterState,
    dispatch_id: DispatchId,
}

impl EventRouter {
    /// Creates a router using the default [`ImmutabilityPolicy`].
    #[must_use]
    pub fn new(service: Arc<CallbackService>) -> Self {
        Self {
            service,
            policy: Arc::new(ImmutabilityPolicy::new()),
            state: RouterState::Idle,
            dispatch_id: DispatchId::new(),
        }
    }

    /// Replaces the freezing policy.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn FreezePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Uses a caller-supplied dispatch id, for correlating logs.
    #[must_use]
    pub fn with_dispatch_id(mut self, id: DispatchId) -> Self {
        self.dispatch_id = id;
        self
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> RouterState {
        self.state
    }

    /// Returns the id of this router's dispatch.
    #[must_use]
    pub fn dispatch_id(&self) -> DispatchId {
        self.dispatch_id
    }

    /// Dispatches `event` to the operation its kind maps to.
    ///
    /// Payload-bearing events are frozen first when the policy requires it.
    /// A subscription denial is handed over as-is and the policy is not
    /// consulted. For a content notification the transport request is moved
    /// into the dispatch context.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::AlreadyDispatched`] if this router has left
    /// the idle state, and otherwise whatever
    /// [`DispatchBridge::invoke`] reports.
    pub async fn dispatch(&mut self, event: ProtocolEvent) -> DispatchResult {
        if self.state != RouterState::Idle {
            tracing::debug!(
                dispatch_id = %self.dispatch_id,
                state = %self.state,
                "Router reused after dispatch"
            );
            return Err(DispatchError::AlreadyDispatched);
        }

        let kind = event.kind();
        let operation = kind.operation_name();
        let context = DispatchContext::new(kind).with_id(self.dispatch_id);

        let (argument, context) = match event {
            ProtocolEvent::SubscriptionVerification(payload)
            | ProtocolEvent::UnsubscriptionVerification(payload) => {
                (self.prepare(payload, kind, operation), context)
            }
            ProtocolEvent::ContentNotification { payload, request } => (
                self.prepare(payload, kind, operation),
                context.with_transport_request(request),
            ),
            ProtocolEvent::SubscriptionDenied(denial) => (EventArgument::Denial(denial), context),
        };

        self.state = RouterState::Dispatching;
        tracing::debug!(
            dispatch_id = %self.dispatch_id,
            kind = %kind,
            operation = %operation,
            "Dispatching event"
        );

        let result = DispatchBridge::new(self.service.clone())
            .invoke(operation, argument, context)
            .await;

        self.state = match &result {
            Ok(_) => RouterState::Completed,
            Err(err) => {
                tracing::debug!(
                    dispatch_id = %self.dispatch_id,
                    failure = %err.kind(),
                    error = %err,
                    "Dispatch failed"
                );
                RouterState::Failed
            }
        };
        result
    }

    fn prepare(&self, mut payload: Payload, kind: EventKind, operation: &str) -> EventArgument {
        if self
            .policy
            .should_freeze(self.service.descriptor(), kind, operation)
        {
            tracing::trace!(operation = %operation, "Freezing payload");
            payload.freeze();
        }
        EventArgument::Payload(payload)
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter")
            .field("service", &self.service.name())
            .field("state", &self.state)
            .field("dispatch_id", &self.dispatch_id)
            .finish_non_exhaustive()
    }
}
