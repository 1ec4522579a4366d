// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `websub_dispatch` library.
//!
//! This module provides the error hierarchy for the dispatch core: routing and
//! invocation failures surfaced from a dispatch, payload immutability
//! violations, callback service construction errors, and subscriber
//! configuration errors.
//!
//! Failures raised by user callbacks are carried by [`CallbackError`], a
//! structured error with a message and an optional chained cause. The core
//! never rewrites these; they reach the transport layer verbatim inside
//! [`DispatchError::Invocation`].

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A dispatch failed.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A payload operation was rejected.
    #[error("payload error: {0}")]
    Payload(#[from] PayloadError),

    /// A callback service could not be built.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    /// Subscriber configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Broad classification of a [`DispatchError`].
///
/// The transport layer uses this to decide the hub-facing response; the core
/// itself never retries either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The event could not be routed to an operation.
    Routing,
    /// The operation ran and failed, or never completed.
    Invocation,
    /// A caller-imposed deadline elapsed before the operation completed.
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Routing => f.write_str("routing"),
            Self::Invocation => f.write_str("invocation"),
            Self::Timeout => f.write_str("timeout"),
        }
    }
}

/// Failure half of a [`DispatchResult`](crate::dispatch::DispatchResult).
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The target service does not implement the resolved operation.
    #[error("operation `{operation}` is not implemented by the callback service")]
    OperationNotImplemented {
        /// The operation name resolved from the event kind.
        operation: String,
    },

    /// The operation is declared but cannot accept an event argument.
    #[error("operation `{operation}` has malformed metadata: {reason}")]
    MalformedOperation {
        /// The offending operation.
        operation: String,
        /// What is wrong with its declaration.
        reason: String,
    },

    /// The router already handled an event.
    #[error("event router has already dispatched an event")]
    AlreadyDispatched,

    /// The operation returned a structured failure.
    #[error("operation `{operation}` failed: {source}")]
    Invocation {
        /// The operation that failed.
        operation: String,
        /// The failure raised by the operation.
        #[source]
        source: CallbackError,
    },

    /// The operation stopped without producing a value (for example, it panicked).
    #[error("operation `{operation}` was aborted before completing")]
    OperationAborted {
        /// The operation that was aborted.
        operation: String,
    },

    /// The caller-imposed dispatch deadline elapsed.
    #[error("operation `{operation}` timed out after {timeout_ms} ms")]
    Timeout {
        /// The operation that did not complete in time.
        operation: String,
        /// The deadline in milliseconds.
        timeout_ms: u64,
    },
}

impl DispatchError {
    /// Creates a routing failure for a missing operation.
    #[must_use]
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::OperationNotImplemented {
            operation: operation.into(),
        }
    }

    /// Returns the classification of this failure.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::OperationNotImplemented { .. }
            | Self::MalformedOperation { .. }
            | Self::AlreadyDispatched => FailureKind::Routing,
            Self::Invocation { .. } | Self::OperationAborted { .. } => FailureKind::Invocation,
            Self::Timeout { .. } => FailureKind::Timeout,
        }
    }

    /// Returns the callback failure if the operation itself failed.
    #[must_use]
    pub fn callback_error(&self) -> Option<&CallbackError> {
        match self {
            Self::Invocation { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Structured failure raised by a user callback, or delivered to one.
///
/// Carries a message, an optional machine-readable detail value, and an
/// optional chained cause. The hub's subscription denial reaches
/// `onSubscriptionDenied` as a `CallbackError` as well.
///
/// # Examples
///
/// ```
/// use websub_dispatch::CallbackError;
///
/// let root = CallbackError::new("connection reset");
/// let err = CallbackError::new("could not persist notification").with_cause(root);
///
/// assert_eq!(err.message(), "could not persist notification");
/// assert_eq!(err.cause().map(CallbackError::message), Some("connection reset"));
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
    detail: Option<Value>,
    #[source]
    cause: Option<Box<CallbackError>>,
}

impl CallbackError {
    /// Creates a new error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
            cause: None,
        }
    }

    /// Attaches a detail value.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Chains a cause beneath this error.
    #[must_use]
    pub fn with_cause(mut self, cause: CallbackError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the detail value, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    /// Returns the direct cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&CallbackError> {
        self.cause.as_deref()
    }

    /// Iterates over this error followed by every chained cause.
    pub fn chain(&self) -> impl Iterator<Item = &CallbackError> {
        std::iter::successors(Some(self), |err| err.cause())
    }
}

/// Errors related to payload access and mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload has been frozen and can no longer be mutated.
    #[error("payload is frozen; cannot {operation} key `{key}`")]
    Frozen {
        /// The rejected mutation (`insert`, `remove`, ...).
        operation: &'static str,
        /// The key the mutation targeted.
        key: String,
    },

    /// A payload can only be built from a JSON object.
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Errors related to building a callback service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// An operation name was empty.
    #[error("operation name cannot be empty")]
    EmptyOperationName,

    /// The same operation was declared twice.
    #[error("operation `{0}` is declared more than once")]
    DuplicateOperation(String),
}

/// Errors related to subscriber configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration JSON could not be parsed.
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field has an unusable value.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// The field that is invalid.
        field: &'static str,
        /// Why it is invalid.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn dispatch_error_kinds() {
        assert_eq!(
            DispatchError::not_implemented("onEventNotification").kind(),
            FailureKind::Routing
        );
        assert_eq!(DispatchError::AlreadyDispatched.kind(), FailureKind::Routing);

        let invocation = DispatchError::Invocation {
            operation: "onEventNotification".to_string(),
            source: CallbackError::new("boom"),
        };
        assert_eq!(invocation.kind(), FailureKind::Invocation);

        let timeout = DispatchError::Timeout {
            operation: "onEventNotification".to_string(),
            timeout_ms: 250,
        };
        assert_eq!(timeout.kind(), FailureKind::Timeout);
    }

    #[test]
    fn not_implemented_display() {
        let err = DispatchError::not_implemented("onSubscriptionVerification");
        assert_eq!(
            err.to_string(),
            "operation `onSubscriptionVerification` is not implemented by the callback service"
        );
    }

    #[test]
    fn invocation_preserves_cause_chain() {
        let source = CallbackError::new("outer").with_cause(CallbackError::new("inner"));
        let err = DispatchError::Invocation {
            operation: "onEventNotification".to_string(),
            source,
        };

        let callback = err.callback_error().unwrap();
        let messages: Vec<&str> = callback.chain().map(CallbackError::message).collect();
        assert_eq!(messages, vec!["outer", "inner"]);

        let std_source = err.source().unwrap();
        assert_eq!(std_source.to_string(), "outer");
        assert_eq!(std_source.source().unwrap().to_string(), "inner");
    }

    #[test]
    fn callback_error_detail() {
        let err = CallbackError::new("denied").with_detail(serde_json::json!({"code": 7}));
        assert_eq!(err.detail(), Some(&serde_json::json!({"code": 7})));
        assert!(err.cause().is_none());
    }

    #[test]
    fn payload_error_display() {
        let err = PayloadError::Frozen {
            operation: "insert",
            key: "topic".to_string(),
        };
        assert_eq!(err.to_string(), "payload is frozen; cannot insert key `topic`");
    }

    #[test]
    fn error_from_service_error() {
        let err: Error = ServiceError::DuplicateOperation("onEventNotification".into()).into();
        assert!(matches!(err, Error::Service(ServiceError::DuplicateOperation(_))));
    }

    #[test]
    fn failure_kind_display() {
        assert_eq!(FailureKind::Routing.to_string(), "routing");
        assert_eq!(FailureKind::Invocation.to_string(), "invocation");
    }
}
