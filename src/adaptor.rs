// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport-facing entry point for one subscriber service.
//!
//! The HTTP listener owns one [`HttpToWebSubAdaptor`] per attached service.
//! For every decoded hub request it calls the matching `call_on_*` method;
//! each call gets a fresh [`EventRouter`] and returns the
//! [`DispatchResult`] for the listener to translate into a hub-facing
//! response.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use websub_dispatch::{HttpToWebSubAdaptor, Payload, TransportRequest};
//! use websub_dispatch::service::{ArgumentMode, CallbackService};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let service = CallbackService::builder("news")
//!     .on_event_notification(ArgumentMode::ReadOnly, |invocation| async move {
//!         let content_type = invocation
//!             .transport_request()
//!             .and_then(TransportRequest::content_type)
//!             .map(str::to_string);
//!         Ok(json!({ "contentType": content_type }))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let adaptor = HttpToWebSubAdaptor::new(Arc::new(service));
//! assert_eq!(adaptor.service_method_names(), vec!["onEventNotification"]);
//!
//! let request = TransportRequest::new("POST", "/news")
//!     .with_header("Content-Type", "application/json");
//! let value = adaptor
//!     .call_on_event_notification(Payload::new(), request)
//!     .await
//!     .unwrap();
//! assert_eq!(value, json!({ "contentType": "application/json" }));
//! # }
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::Instrument;

use crate::config::{DispatchOptions, SubscriberConfig};
use crate::dispatch::{DispatchResult, EventRouter, FreezePolicy, ImmutabilityPolicy};
use crate::error::{CallbackError, DispatchError};
use crate::event::{DispatchId, ProtocolEvent, TransportRequest};
use crate::payload::Payload;
use crate::service::CallbackService;

/// Bridges decoded HTTP requests to a subscriber service's operations.
///
/// The adaptor is `Send + Sync`; share it behind an `Arc` across the
/// listener's request handlers.
pub struct HttpToWebSubAdaptor {
    service: Arc<CallbackService>,
    policy: Arc<dyn FreezePolicy>,
    options: DispatchOptions,
    config: RwLock<Option<Arc<SubscriberConfig>>>,
}

impl HttpToWebSubAdaptor {
    /// Attaches `service` with the default policy and options.
    #[must_use]
    pub fn new(service: Arc<CallbackService>) -> Self {
        tracing::debug!(service = %service.name(), "Attached subscriber service");
        Self {
            service,
            policy: Arc::new(ImmutabilityPolicy::new()),
            options: DispatchOptions::default(),
            config: RwLock::new(None),
        }
    }

    /// Replaces the freezing policy used by every dispatch.
    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn FreezePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Sets dispatch options.
    #[must_use]
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the attached service.
    #[must_use]
    pub fn service(&self) -> &Arc<CallbackService> {
        &self.service
    }

    /// Returns the dispatch options.
    #[must_use]
    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    /// Returns the operation names the service declares, in declaration order.
    #[must_use]
    pub fn service_method_names(&self) -> Vec<String> {
        self.service
            .operation_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Attaches the subscriber configuration, replacing any earlier one.
    pub fn attach_subscriber_config(&self, config: SubscriberConfig) {
        *self.config.write() = Some(Arc::new(config));
    }

    /// Returns the subscriber configuration once the listener has attached it.
    #[must_use]
    pub fn subscriber_config(&self) -> Option<Arc<SubscriberConfig>> {
        self.config.read().clone()
    }

    /// Dispatches a subscription intent verification.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn call_on_subscription_verification(&self, payload: Payload) -> DispatchResult {
        self.dispatch(ProtocolEvent::SubscriptionVerification(payload))
            .await
    }

    /// Dispatches an unsubscription intent verification.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn call_on_unsubscription_verification(&self, payload: Payload) -> DispatchResult {
        self.dispatch(ProtocolEvent::UnsubscriptionVerification(payload))
            .await
    }

    /// Dispatches a subscription denial.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn call_on_subscription_denied(&self, denial: CallbackError) -> DispatchResult {
        self.dispatch(ProtocolEvent::SubscriptionDenied(denial))
            .await
    }

    /// Dispatches a content notification with its originating request.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn call_on_event_notification(
        &self,
        payload: Payload,
        request: TransportRequest,
    ) -> DispatchResult {
        self.dispatch(ProtocolEvent::content_notification(payload, request))
            .await
    }

    /// Dispatches any event through a fresh router.
    ///
    /// # Errors
    ///
    /// Returns the router's [`DispatchError`], or [`DispatchError::Timeout`]
    /// if a dispatch deadline is configured and elapses first. A timed-out
    /// operation is not cancelled.
    pub async fn dispatch(&self, event: ProtocolEvent) -> DispatchResult {
        let dispatch_id = DispatchId::new();
        let kind = event.kind();
        let span = tracing::debug_span!(
            "dispatch",
            service = %self.service.name(),
            kind = %kind,
            dispatch_id = %dispatch_id,
        );

        let mut router = EventRouter::new(self.service.clone())
            .with_policy(self.policy.clone())
            .with_dispatch_id(dispatch_id);

        let Some(timeout) = self.options.dispatch_timeout else {
            return router.dispatch(event).instrument(span).await;
        };

        match tokio::time::timeout(timeout, router.dispatch(event))
            .instrument(span.clone())
            .await
        {
            Ok(result) => result,
            Err(_) => {
                span.in_scope(|| {
                    tracing::debug!(timeout_ms = %timeout.as_millis(), "Dispatch deadline elapsed");
                });
                Err(DispatchError::Timeout {
                    operation: kind.operation_name().to_string(),
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }
}

impl std::fmt::Debug for HttpToWebSubAdaptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpToWebSubAdaptor")
            .field("service", &self.service)
            .field("options", &self.options)
            .field("has_config", &self.config.read().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::dispatch::FreezeRule;
    use crate::error::FailureKind;
    use crate::event::EventKind;
    use crate::service::ArgumentMode;

    fn adaptor() -> HttpToWebSubAdaptor {
        let service = CallbackService::builder("svc")
            .on_subscription_verification(ArgumentMode::Mutable, |invocation| async move {
                Ok(json!(invocation.payload().and_then(|p| p.get_str("hub.challenge"))))
            })
            .on_subscription_denied(|invocation| async move {
                Ok(json!(invocation.denial().map(CallbackError::message)))
            })
            .on_event_notification(ArgumentMode::Mutable, |invocation| async move {
                Ok(json!(invocation.payload().map(Payload::is_frozen)))
            })
            .build()
            .unwrap();
        HttpToWebSubAdaptor::new(Arc::new(service))
    }

    #[test]
    fn method_names_in_declaration_order() {
        assert_eq!(
            adaptor().service_method_names(),
            vec![
                "onSubscriptionVerification",
                "onSubscriptionDenied",
                "onEventNotification"
            ]
        );
    }

    #[test]
    fn subscriber_config_is_absent_until_attached() {
        let adaptor = adaptor();
        assert!(adaptor.subscriber_config().is_none());

        adaptor.attach_subscriber_config(SubscriberConfig::new().with_lease_seconds(60));
        assert_eq!(
            adaptor.subscriber_config().and_then(|c| c.lease_seconds),
            Some(60)
        );
    }

    #[tokio::test]
    async fn verification_echoes_challenge() {
        let payload: Payload = [("hub.mode", "subscribe"), ("hub.challenge", "c-123")]
            .into_iter()
            .collect();
        let value = adaptor()
            .call_on_subscription_verification(payload)
            .await
            .unwrap();
        assert_eq!(value, json!("c-123"));
    }

    #[tokio::test]
    async fn denial_reaches_operation() {
        let value = adaptor()
            .call_on_subscription_denied(CallbackError::new("lease too long"))
            .await
            .unwrap();
        assert_eq!(value, json!("lease too long"));
    }

    #[tokio::test]
    async fn missing_unsubscription_operation_is_routing_failure() {
        let err = adaptor()
            .call_on_unsubscription_verification(Payload::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Routing);
    }

    #[tokio::test]
    async fn adaptor_policy_applies_to_each_dispatch() {
        let adaptor = adaptor().with_policy(Arc::new(
            ImmutabilityPolicy::new().with_rule(EventKind::ContentNotification, FreezeRule::Always),
        ));
        let value = adaptor
            .call_on_event_notification(Payload::new(), TransportRequest::new("POST", "/"))
            .await
            .unwrap();
        assert_eq!(value, json!(true));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_is_a_timeout_failure() {
        let service = CallbackService::builder("slow")
            .on_event_notification(ArgumentMode::Mutable, |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Value::Null)
            })
            .build()
            .unwrap();
        let adaptor = HttpToWebSubAdaptor::new(Arc::new(service))
            .with_options(DispatchOptions::new().with_dispatch_timeout(Duration::from_secs(5)));

        let err = adaptor
            .call_on_event_notification(Payload::new(), TransportRequest::new("POST", "/"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(matches!(
            err,
            DispatchError::Timeout {
                timeout_ms: 5000,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn deadline_not_reached_returns_value() {
        let adaptor = adaptor()
            .with_options(DispatchOptions::new().with_dispatch_timeout(Duration::from_secs(5)));
        let value = adaptor
            .call_on_event_notification(Payload::new(), TransportRequest::new("POST", "/"))
            .await
            .unwrap();
        assert_eq!(value, json!(false));
    }
}
