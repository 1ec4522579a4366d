// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! User callback services.
//!
//! A [`CallbackService`] is the user-supplied object the hub's events are
//! delivered to. It is a lookup table from operation name to handler and
//! declared signature, populated once by [`CallbackServiceBuilder`] and
//! read-only afterwards, so a single `Arc<CallbackService>` can serve any
//! number of concurrent dispatches.
//!
//! Handlers receive one [`Invocation`] and return an [`OperationFuture`]. A
//! handler that fails without suspending simply returns an already-resolved
//! future; see [`CallbackServiceBuilder::sync_operation`].
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use websub_dispatch::service::{ArgumentMode, CallbackService};
//!
//! let service = CallbackService::builder("news-subscriber")
//!     .on_event_notification(ArgumentMode::ReadOnly, |invocation| async move {
//!         let topic = invocation
//!             .payload()
//!             .and_then(|payload| payload.get_str("topic"))
//!             .unwrap_or_default()
//!             .to_string();
//!         Ok(json!({ "accepted": topic }))
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(service.operation_names(), vec!["onEventNotification"]);
//! assert!(service.descriptor().is_payload_read_only_required("onEventNotification"));
//! ```

mod descriptor;

pub use descriptor::{OperationSignature, ParameterDescriptor, ServiceDescriptor, TypeDescriptor};

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{CallbackError, ServiceError};
use crate::event::{
    DispatchContext, ON_EVENT_NOTIFICATION, ON_SUBSCRIPTION_DENIED, ON_SUBSCRIPTION_VERIFICATION,
    ON_UNSUBSCRIPTION_VERIFICATION, TransportRequest,
};
use crate::payload::Payload;

/// Outcome of a single operation.
pub type OperationResult = Result<Value, CallbackError>;

/// Future returned by an operation handler.
pub type OperationFuture = BoxFuture<'static, OperationResult>;

/// Type alias for operation handlers.
pub(crate) type OperationFn = Arc<dyn Fn(Invocation) -> OperationFuture + Send + Sync>;

/// The single event argument handed to an operation.
#[derive(Debug, Clone)]
pub enum EventArgument {
    /// A decoded key/value payload, frozen if the operation requires it.
    Payload(Payload),
    /// The hub's denial, for `onSubscriptionDenied`.
    Denial(CallbackError),
}

/// Everything an operation receives for one dispatch.
///
/// The invocation owns its argument and context, so the transport request
/// attached to a content notification lives exactly as long as the
/// operation holds on to it.
#[derive(Debug)]
pub struct Invocation {
    operation: String,
    argument: EventArgument,
    context: DispatchContext,
}

impl Invocation {
    pub(crate) fn new(
        operation: impl Into<String>,
        argument: EventArgument,
        context: DispatchContext,
    ) -> Self {
        Self {
            operation: operation.into(),
            argument,
            context,
        }
    }

    /// Returns the name of the operation being invoked.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Returns the event argument.
    #[must_use]
    pub fn argument(&self) -> &EventArgument {
        &self.argument
    }

    /// Returns the payload, unless this is a denial.
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        match &self.argument {
            EventArgument::Payload(payload) => Some(payload),
            EventArgument::Denial(_) => None,
        }
    }

    /// Returns the payload for mutation.
    ///
    /// Mutating methods on a frozen payload still fail; this only grants
    /// access.
    pub fn payload_mut(&mut self) -> Option<&mut Payload> {
        match &mut self.argument {
            EventArgument::Payload(payload) => Some(payload),
            EventArgument::Denial(_) => None,
        }
    }

    /// Returns the hub's denial, for `onSubscriptionDenied`.
    #[must_use]
    pub fn denial(&self) -> Option<&CallbackError> {
        match &self.argument {
            EventArgument::Denial(error) => Some(error),
            EventArgument::Payload(_) => None,
        }
    }

    /// Returns the transport request of a content notification.
    #[must_use]
    pub fn transport_request(&self) -> Option<&TransportRequest> {
        self.context.transport_request()
    }

    /// Returns the dispatch context.
    #[must_use]
    pub fn context(&self) -> &DispatchContext {
        &self.context
    }

    /// Splits the invocation into its argument and context.
    #[must_use]
    pub fn into_parts(self) -> (EventArgument, DispatchContext) {
        (self.argument, self.context)
    }
}

/// How an operation declares its event argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentMode {
    /// Declared as `readonly & T`; the payload is frozen before delivery.
    ReadOnly,
    /// Declared as plain `T`.
    #[default]
    Mutable,
}

impl ArgumentMode {
    fn wrap(self, ty: TypeDescriptor) -> TypeDescriptor {
        match self {
            Self::ReadOnly => TypeDescriptor::read_only(ty),
            Self::Mutable => ty,
        }
    }
}

/// A user-supplied service exposing named operations.
pub struct CallbackService {
    name: String,
    descriptor: ServiceDescriptor,
    handlers: HashMap<String, OperationFn>,
}

impl CallbackService {
    /// Starts building a service.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CallbackServiceBuilder {
        CallbackServiceBuilder::new(name)
    }

    /// Returns the service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the static operation metadata.
    #[must_use]
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Returns the declared operation names in declaration order.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        self.descriptor.operation_names()
    }

    pub(crate) fn handler(&self, operation: &str) -> Option<OperationFn> {
        self.handlers.get(operation).cloned()
    }
}

impl std::fmt::Debug for CallbackService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackService")
            .field("name", &self.name)
            .field("operations", &self.descriptor.operation_names())
            .finish()
    }
}

/// Builder for [`CallbackService`].
///
/// Registration problems (an empty or duplicated operation name) are reported
/// by [`build`](Self::build).
pub struct CallbackServiceBuilder {
    name: String,
    signatures: Vec<OperationSignature>,
    handlers: HashMap<String, OperationFn>,
    error: Option<ServiceError>,
}

impl CallbackServiceBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signatures: Vec::new(),
            handlers: HashMap::new(),
            error: None,
        }
    }

    /// Registers an asynchronous operation under its signature's name.
    #[must_use]
    pub fn operation<F, Fut>(self, signature: OperationSignature, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        let handler: OperationFn = Arc::new(move |invocation| handler(invocation).boxed());
        self.register(signature, handler)
    }

    /// Registers an operation that completes without suspending.
    #[must_use]
    pub fn sync_operation<F>(self, signature: OperationSignature, handler: F) -> Self
    where
        F: Fn(Invocation) -> OperationResult + Send + Sync + 'static,
    {
        let handler: OperationFn =
            Arc::new(move |invocation| futures::future::ready(handler(invocation)).boxed());
        self.register(signature, handler)
    }

    /// Registers `onSubscriptionVerification`.
    #[must_use]
    pub fn on_subscription_verification<F, Fut>(self, mode: ArgumentMode, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        let signature = OperationSignature::new(ON_SUBSCRIPTION_VERIFICATION).param(
            "msg",
            mode.wrap(TypeDescriptor::named("websub:SubscriptionVerification")),
        );
        self.operation(signature, handler)
    }

    /// Registers `onUnsubscriptionVerification`.
    #[must_use]
    pub fn on_unsubscription_verification<F, Fut>(self, mode: ArgumentMode, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        let signature = OperationSignature::new(ON_UNSUBSCRIPTION_VERIFICATION).param(
            "msg",
            mode.wrap(TypeDescriptor::named("websub:UnsubscriptionVerification")),
        );
        self.operation(signature, handler)
    }

    /// Registers `onSubscriptionDenied`.
    ///
    /// The denial is a failure value and is never frozen, so there is no
    /// argument mode.
    #[must_use]
    pub fn on_subscription_denied<F, Fut>(self, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        let signature = OperationSignature::new(ON_SUBSCRIPTION_DENIED)
            .param("msg", TypeDescriptor::named("websub:SubscriptionDeniedError"));
        self.operation(signature, handler)
    }

    /// Registers `onEventNotification`.
    #[must_use]
    pub fn on_event_notification<F, Fut>(self, mode: ArgumentMode, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        let signature = OperationSignature::new(ON_EVENT_NOTIFICATION).param(
            "event",
            mode.wrap(TypeDescriptor::named("websub:ContentDistributionMessage")),
        );
        self.operation(signature, handler)
    }

    fn register(mut self, signature: OperationSignature, handler: OperationFn) -> Self {
        if self.error.is_some() {
            return self;
        }
        let name = signature.name().to_string();
        if name.is_empty() {
            self.error = Some(ServiceError::EmptyOperationName);
            return self;
        }
        if self.handlers.contains_key(&name) {
            self.error = Some(ServiceError::DuplicateOperation(name));
            return self;
        }
        self.handlers.insert(name, handler);
        self.signatures.push(signature);
        self
    }

    /// Finishes the service.
    ///
    /// # Errors
    ///
    /// Returns the first [`ServiceError`] hit while registering operations.
    pub fn build(self) -> Result<CallbackService, ServiceError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        tracing::debug!(
            service = %self.name,
            operations = self.signatures.len(),
            "Built callback service"
        );
        Ok(CallbackService {
            name: self.name,
            descriptor: ServiceDescriptor::new(self.signatures),
            handlers: self.handlers,
        })
    }
}

impl std::fmt::Debug for CallbackServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackServiceBuilder")
            .field("name", &self.name)
            .field("operation_count", &self.signatures.len())
            .field("error", &self.error)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use serde_json::json;

    fn invocation(payload: Payload) -> Invocation {
        Invocation::new(
            ON_EVENT_NOTIFICATION,
            EventArgument::Payload(payload),
            DispatchContext::new(EventKind::ContentNotification),
        )
    }

    #[test]
    fn builder_records_operations_in_order() {
        let service = CallbackService::builder("svc")
            .on_subscription_verification(ArgumentMode::Mutable, |_| async { Ok(Value::Null) })
            .on_event_notification(ArgumentMode::ReadOnly, |_| async { Ok(Value::Null) })
            .build()
            .unwrap();

        assert_eq!(
            service.operation_names(),
            vec![ON_SUBSCRIPTION_VERIFICATION, ON_EVENT_NOTIFICATION]
        );
        assert_eq!(service.name(), "svc");
        assert!(service.handler(ON_EVENT_NOTIFICATION).is_some());
        assert!(service.handler(ON_SUBSCRIPTION_DENIED).is_none());
    }

    #[test]
    fn argument_mode_drives_declared_type() {
        let service = CallbackService::builder("svc")
            .on_subscription_verification(ArgumentMode::ReadOnly, |_| async { Ok(Value::Null) })
            .on_unsubscription_verification(ArgumentMode::Mutable, |_| async { Ok(Value::Null) })
            .on_subscription_denied(|_| async { Ok(Value::Null) })
            .build()
            .unwrap();

        let descriptor = service.descriptor();
        assert!(descriptor.is_payload_read_only_required(ON_SUBSCRIPTION_VERIFICATION));
        assert!(!descriptor.is_payload_read_only_required(ON_UNSUBSCRIPTION_VERIFICATION));
        assert!(!descriptor.is_payload_read_only_required(ON_SUBSCRIPTION_DENIED));
    }

    #[test]
    fn duplicate_operation_is_rejected() {
        let err = CallbackService::builder("svc")
            .on_event_notification(ArgumentMode::Mutable, |_| async { Ok(Value::Null) })
            .on_event_notification(ArgumentMode::ReadOnly, |_| async { Ok(Value::Null) })
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::DuplicateOperation(ON_EVENT_NOTIFICATION.to_string())
        );
    }

    #[test]
    fn empty_operation_name_is_rejected() {
        let err = CallbackService::builder("svc")
            .sync_operation(OperationSignature::new(""), |_| Ok(Value::Null))
            .build()
            .unwrap_err();
        assert_eq!(err, ServiceError::EmptyOperationName);
    }

    #[test]
    fn sync_operation_resolves_immediately() {
        let service = CallbackService::builder("svc")
            .sync_operation(
                OperationSignature::new("echo").param("event", TypeDescriptor::named("map")),
                |invocation| Ok(invocation.payload().map(Payload::to_value).unwrap_or_default()),
            )
            .build()
            .unwrap();

        let handler = service.handler("echo").unwrap();
        let payload = Payload::try_from(json!({"a": 1})).unwrap();
        let result = handler(invocation(payload)).now_or_never().unwrap();
        assert_eq!(result.unwrap(), json!({"a": 1}));
    }

    #[test]
    fn invocation_accessors() {
        let mut invocation = invocation(Payload::new().into_frozen());
        assert_eq!(invocation.operation(), ON_EVENT_NOTIFICATION);
        assert!(invocation.denial().is_none());
        assert!(invocation.transport_request().is_none());

        let payload = invocation.payload_mut().unwrap();
        assert!(payload.insert("k", "v").is_err());
    }

    #[test]
    fn denial_invocation() {
        let invocation = Invocation::new(
            ON_SUBSCRIPTION_DENIED,
            EventArgument::Denial(CallbackError::new("topic not allowed")),
            DispatchContext::new(EventKind::SubscriptionDenied),
        );
        assert!(invocation.payload().is_none());
        assert_eq!(
            invocation.denial().map(CallbackError::message),
            Some("topic not allowed")
        );

        let (argument, context) = invocation.into_parts();
        assert!(matches!(argument, EventArgument::Denial(_)));
        assert_eq!(context.kind(), EventKind::SubscriptionDenied);
    }

    #[test]
    fn debug_lists_operations() {
        let service = CallbackService::builder("svc")
            .on_subscription_denied(|_| async { Ok(Value::Null) })
            .build()
            .unwrap();
        let debug = format!("{service:?}");
        assert!(debug.contains("CallbackService"));
        assert!(debug.contains(ON_SUBSCRIPTION_DENIED));
    }
}
