// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Suspend/resume bridge between the dispatch core and user operations.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::Instrument;

use super::DispatchResult;
use crate::error::DispatchError;
use crate::event::DispatchContext;
use crate::service::{CallbackService, EventArgument, Invocation, OperationResult};

/// Runs one operation of a callback service and hands back its outcome.
///
/// [`invoke`](Self::invoke) suspends the calling task, runs the operation on
/// a task of its own, and resumes the caller exactly once with either the
/// operation's value or its failure. Because the operation has its own task,
/// a slow callback never holds the caller's worker, and a caller that stops
/// waiting (for example after a timeout) does not cancel the operation.
///
/// Must be called from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct DispatchBridge {
    service: Arc<CallbackService>,
}

impl DispatchBridge {
    /// Creates a bridge to `service`.
    #[must_use]
    pub fn new(service: Arc<CallbackService>) -> Self {
        Self { service }
    }

    /// Returns the target service.
    #[must_use]
    pub fn service(&self) -> &Arc<CallbackService> {
        &self.service
    }

    /// Invokes `operation` with `argument` as its sole event argument.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::OperationNotImplemented`] if the service has no such
    ///   operation; nothing is invoked.
    /// - [`DispatchError::MalformedOperation`] if the operation declares no
    ///   event parameter; nothing is invoked.
    /// - [`DispatchError::Invocation`] if the operation returns a failure.
    /// - [`DispatchError::OperationAborted`] if the operation panics.
    pub async fn invoke(
        &self,
        operation: &str,
        argument: EventArgument,
        context: DispatchContext,
    ) -> DispatchResult {
        let Some(handler) = self.service.handler(operation) else {
            tracing::debug!(
                service = %self.service.name(),
                operation = %operation,
                "Operation not implemented"
            );
            return Err(DispatchError::not_implemented(operation));
        };

        if self
            .service
            .descriptor()
            .operation(operation)
            .is_some_and(|sig| sig.event_parameter().is_none())
        {
            return Err(DispatchError::MalformedOperation {
                operation: operation.to_string(),
                reason: "no event parameter declared".to_string(),
            });
        }

        let span = tracing::debug_span!(
            "operation",
            operation = %operation,
            dispatch_id = %context.id(),
        );
        let invocation = Invocation::new(operation, argument, context);

        // Single-assignment completion: `send` consumes the sender, so the
        // caller is resumed at most once; dropping it unsent resumes with an error.
        let (completer, completion) = oneshot::channel::<OperationResult>();

        tokio::spawn(
            async move {
                let outcome = handler(invocation).await;
                tracing::trace!(success = outcome.is_ok(), "Operation finished");
                if completer.send(outcome).is_err() {
                    tracing::debug!("Caller stopped waiting before the operation finished");
                }
            }
            .instrument(span),
        );

        match completion.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(DispatchError::Invocation {
                operation: operation.to_string(),
                source,
            }),
            Err(_) => Err(DispatchError::OperationAborted {
                operation: operation.to_string(),
            }),
        }
    }
}
