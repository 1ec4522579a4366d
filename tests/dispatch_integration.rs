// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end dispatch tests through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use websub_dispatch::compiler::{DocumentId, ModuleId, ServicePathRegistry};
use websub_dispatch::{
    ArgumentMode, CallbackError, CallbackService, DispatchError, DispatchOptions, EventKind,
    EventRouter, FailureKind, FreezePolicy, HttpToWebSubAdaptor, Invocation, OperationSignature,
    Payload, PayloadError, ProtocolEvent, RouterState, ServiceDescriptor, SubscriberConfig,
    TransportRequest, TypeDescriptor,
};

fn notification() -> Payload {
    Payload::try_from(json!({"topic": "t1", "content": "hello"})).unwrap()
}

// ============================================================================
// Read-only payloads
// ============================================================================

mod read_only {
    use super::*;

    #[tokio::test]
    async fn readonly_notification_is_frozen_before_delivery() {
        let service = CallbackService::builder("news")
            .on_event_notification(ArgumentMode::ReadOnly, |mut invocation| async move {
                let Some(payload) = invocation.payload_mut() else {
                    return Err(CallbackError::new("no payload"));
                };
                let rejected = payload.insert("content", "changed").unwrap_err();
                Ok(json!({
                    "topic": payload.get_str("topic"),
                    "content": payload.get_str("content"),
                    "mutation": rejected.to_string(),
                }))
            })
            .build()
            .unwrap();

        let value = HttpToWebSubAdaptor::new(Arc::new(service))
            .call_on_event_notification(notification(), TransportRequest::new("POST", "/news"))
            .await
            .unwrap();

        assert_eq!(value["topic"], json!("t1"));
        assert_eq!(value["content"], json!("hello"));
        assert_eq!(
            value["mutation"],
            json!(
                PayloadError::Frozen {
                    operation: "insert",
                    key: "content".to_string()
                }
                .to_string()
            )
        );
    }

    #[tokio::test]
    async fn mutable_notification_can_be_changed() {
        let service = CallbackService::builder("news")
            .on_event_notification(ArgumentMode::Mutable, |mut invocation| async move {
                let Some(payload) = invocation.payload_mut() else {
                    return Err(CallbackError::new("no payload"));
                };
                match payload.insert("content", "changed") {
                    Ok(_) => Ok(payload.to_value()),
                    Err(err) => Err(CallbackError::new(err.to_string())),
                }
            })
            .build()
            .unwrap();

        let value = HttpToWebSubAdaptor::new(Arc::new(service))
            .call_on_event_notification(notification(), TransportRequest::new("POST", "/news"))
            .await
            .unwrap();
        assert_eq!(value, json!({"topic": "t1", "content": "changed"}));
    }

    #[tokio::test]
    async fn hand_declared_intersection_is_read_only() {
        let signature = OperationSignature::new("onEventNotification").param(
            "event",
            TypeDescriptor::Intersection(vec![
                TypeDescriptor::named("map<string>"),
                TypeDescriptor::ReadOnly,
            ]),
        );
        let service = CallbackService::builder("manual")
            .sync_operation(signature, |invocation| {
                Ok(json!(invocation.payload().map(Payload::is_frozen)))
            })
            .build()
            .unwrap();

        let value = EventRouter::new(Arc::new(service))
            .dispatch(ProtocolEvent::content_notification(
                notification(),
                TransportRequest::new("POST", "/"),
            ))
            .await
            .unwrap();
        assert_eq!(value, json!(true));
    }
}

// ============================================================================
// Routing
// ============================================================================

mod routing {
    use super::*;

    struct CountingPolicy(AtomicU32);

    impl FreezePolicy for CountingPolicy {
        fn should_freeze(
            &self,
            service: &ServiceDescriptor,
            _: EventKind,
            operation: &str,
        ) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            service.is_payload_read_only_required(operation)
        }
    }

    #[tokio::test]
    async fn missing_verification_operation_is_routing_failure() {
        let service = CallbackService::builder("notifications-only")
            .on_event_notification(ArgumentMode::ReadOnly, |_| async { Ok(Value::Null) })
            .build()
            .unwrap();
        assert!(
            !service
                .descriptor()
                .is_payload_read_only_required("onSubscriptionVerification")
        );

        let mut router = EventRouter::new(Arc::new(service));
        let err = router
            .dispatch(ProtocolEvent::SubscriptionVerification(
                [("hub.mode", "subscribe")].into_iter().collect(),
            ))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Routing);
        assert!(matches!(
            err,
            DispatchError::OperationNotImplemented { ref operation } if operation == "onSubscriptionVerification"
        ));
        assert_eq!(router.state(), RouterState::Failed);
    }

    #[tokio::test]
    async fn denial_skips_policy_for_any_configuration() {
        let policy = Arc::new(CountingPolicy(AtomicU32::new(0)));
        let service = Arc::new(
            CallbackService::builder("svc")
                .on_subscription_denied(|invocation| async move {
                    match invocation.denial() {
                        Some(denial) => Ok(json!(denial.message())),
                        None => Err(CallbackError::new("expected a denial")),
                    }
                })
                .build()
                .unwrap(),
        );

        let value = EventRouter::new(service)
            .with_policy(policy.clone())
            .dispatch(ProtocolEvent::SubscriptionDenied(CallbackError::new(
                "hub refused topic",
            )))
            .await
            .unwrap();

        assert_eq!(value, json!("hub refused topic"));
        assert_eq!(policy.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transport_request_visible_only_to_content_notifications() {
        let observe = |invocation: Invocation| async move {
            Ok::<_, CallbackError>(json!(
                invocation
                    .transport_request()
                    .and_then(|request| request.header("x-hub-signature"))
            ))
        };
        let service = Arc::new(
            CallbackService::builder("svc")
                .on_subscription_verification(ArgumentMode::Mutable, observe)
                .on_unsubscription_verification(ArgumentMode::Mutable, observe)
                .on_subscription_denied(observe)
                .on_event_notification(ArgumentMode::Mutable, observe)
                .build()
                .unwrap(),
        );
        let adaptor = HttpToWebSubAdaptor::new(service);

        let request =
            TransportRequest::new("POST", "/cb").with_header("X-Hub-Signature", "sha256=ab");
        assert_eq!(
            adaptor
                .call_on_event_notification(notification(), request)
                .await
                .unwrap(),
            json!("sha256=ab")
        );
        assert_eq!(
            adaptor
                .call_on_subscription_verification(notification())
                .await
                .unwrap(),
            Value::Null
        );
        assert_eq!(
            adaptor
                .call_on_unsubscription_verification(notification())
                .await
                .unwrap(),
            Value::Null
        );
        assert_eq!(
            adaptor
                .call_on_subscription_denied(CallbackError::new("denied"))
                .await
                .unwrap(),
            Value::Null
        );
    }
}

// ============================================================================
// Invocation
// ============================================================================

mod invocation {
    use super::*;

    #[tokio::test]
    async fn callback_failure_reaches_caller_verbatim() {
        let service = CallbackService::builder("svc")
            .on_event_notification(ArgumentMode::Mutable, |_| async {
                tokio::task::yield_now().await;
                Err(CallbackError::new("could not store")
                    .with_detail(json!({"retryable": true}))
                    .with_cause(CallbackError::new("disk full")))
            })
            .build()
            .unwrap();

        let err = HttpToWebSubAdaptor::new(Arc::new(service))
            .call_on_event_notification(notification(), TransportRequest::new("POST", "/"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::Invocation);
        let callback = err.callback_error().unwrap();
        let chain: Vec<&str> = callback.chain().map(CallbackError::message).collect();
        assert_eq!(chain, ["could not store", "disk full"]);
        assert_eq!(callback.detail(), Some(&json!({"retryable": true})));
    }

    #[tokio::test]
    async fn concurrent_dispatches_share_one_service() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let service = CallbackService::builder("svc")
            .on_event_notification(ArgumentMode::ReadOnly, move |invocation| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(json!(invocation.payload().and_then(|p| p.get("n")).cloned()))
                }
            })
            .build()
            .unwrap();
        let adaptor = Arc::new(HttpToWebSubAdaptor::new(Arc::new(service)));

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let adaptor = adaptor.clone();
                tokio::spawn(async move {
                    adaptor
                        .call_on_event_notification(
                            [("n", n)].into_iter().collect(),
                            TransportRequest::new("POST", "/"),
                        )
                        .await
                })
            })
            .collect();

        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap().unwrap(), json!(n));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_operation_keeps_running() {
        let finished = Arc::new(AtomicU32::new(0));
        let flag = finished.clone();
        let service = CallbackService::builder("slow")
            .on_event_notification(ArgumentMode::Mutable, move |_| {
                let flag = flag.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    flag.store(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            })
            .build()
            .unwrap();
        let adaptor = HttpToWebSubAdaptor::new(Arc::new(service))
            .with_options(DispatchOptions::new().with_dispatch_timeout(Duration::from_secs(1)));

        let err = adaptor
            .call_on_event_notification(notification(), TransportRequest::new("POST", "/"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}

// ============================================================================
// Subscriber configuration
// ============================================================================

mod subscriber_config {
    use super::*;

    #[test]
    fn listener_attaches_config_after_service() {
        let service = CallbackService::builder("svc").build().unwrap();
        let adaptor = HttpToWebSubAdaptor::new(Arc::new(service));
        assert!(adaptor.subscriber_config().is_none());

        let config = SubscriberConfig::from_json(
            r#"{"target": {"hub": "https://hub.example.com", "topic": "https://example.com/t1"},
                "secret": "k", "appendServicePath": true}"#,
        )
        .unwrap();
        adaptor.attach_subscriber_config(config.clone());

        let attached = adaptor.subscriber_config().unwrap();
        assert_eq!(*attached, config);
        assert!(attached.append_service_path);
        assert!(adaptor.service_method_names().is_empty());
    }
}

// ============================================================================
// Service path registry
// ============================================================================

mod service_paths {
    use super::*;

    #[test]
    fn two_records_then_independent_unit() {
        let module = ModuleId::new("subscriber");
        let first = DocumentId::new("a.bal");
        let second = DocumentId::new("b.bal");

        let mut registry = ServicePathRegistry::new();
        registry.record(&module, &first, 0, "orders");
        registry.record(&module, &first, 1, "invoices");

        let ids: Vec<u32> = registry
            .entries(&module, &first)
            .iter()
            .map(|entry| entry.service_id)
            .collect();
        assert_eq!(ids, [0, 1]);
        assert!(registry.entries(&module, &second).is_empty());

        let generated = registry
            .context_mut(&module, &second)
            .assign(None)
            .cloned()
            .unwrap();
        assert_eq!(generated.service_id, 0);
        assert_eq!(registry.entries(&module, &second), [generated]);
        assert_eq!(registry.entries(&module, &first).len(), 2);
    }
}
