// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `websub_dispatch` - subscriber-side event dispatch for WebSub.
//!
//! This library sits between an HTTP listener and a user's subscriber
//! service. The listener decodes each hub request into a [`ProtocolEvent`];
//! the dispatch core routes it to the one callback operation responsible for
//! that event kind, freezes the payload when the operation asks for a
//! read-only argument, runs the operation without blocking the caller, and
//! hands back a [`DispatchResult`].
//!
//! # Features
//!
//! - **Fixed routing**: four event kinds, four operation names
//! - **Read-only payloads**: deep, irreversible freeze driven by declared
//!   parameter types
//! - **Non-blocking invocation**: each operation runs on its own task and
//!   resumes the caller exactly once
//! - **Structured failures**: routing, invocation, and timeout failures with
//!   the callback's cause chain preserved
//! - **Compile-time service paths**: per-unit registry of generated paths
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use websub_dispatch::{HttpToWebSubAdaptor, Payload, TransportRequest};
//! use websub_dispatch::service::{ArgumentMode, CallbackService};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> websub_dispatch::Result<()> {
//! let service = CallbackService::builder("feed-subscriber")
//!     .on_subscription_verification(ArgumentMode::Mutable, |_| async { Ok(json!("accepted")) })
//!     .on_event_notification(ArgumentMode::ReadOnly, |mut invocation| async move {
//!         // The payload was frozen before delivery.
//!         let payload = invocation.payload_mut().expect("notifications carry a payload");
//!         assert!(payload.insert("content", "changed").is_err());
//!         Ok(json!({ "topic": payload.get_str("topic") }))
//!     })
//!     .build()?;
//!
//! let adaptor = HttpToWebSubAdaptor::new(Arc::new(service));
//!
//! let payload: Payload = [("topic", "t1"), ("content", "hello")].into_iter().collect();
//! let value = adaptor
//!     .call_on_event_notification(payload, TransportRequest::new("POST", "/feed"))
//!     .await?;
//!
//! assert_eq!(value, json!({ "topic": "t1" }));
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! The library emits `tracing` events at `debug` and `trace` level with
//! `operation`, `kind`, and `dispatch_id` fields. It never installs a
//! subscriber and never logs a failure in place of returning it.

mod adaptor;
pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
mod payload;
pub mod service;

pub use adaptor::HttpToWebSubAdaptor;
pub use config::{DispatchOptions, SubscriberConfig, SubscriptionTarget};
pub use dispatch::{
    DispatchBridge, DispatchResult, EventRouter, FreezePolicy, FreezeRule, ImmutabilityPolicy,
    RouterState,
};
pub use error::{
    CallbackError, ConfigError, DispatchError, Error, FailureKind, PayloadError, Result,
    ServiceError,
};
pub use event::{DispatchContext, DispatchId, EventKind, ProtocolEvent, TransportRequest};
pub use payload::{HUB_CHALLENGE, HUB_LEASE_SECONDS, HUB_MODE, HUB_REASON, HUB_TOPIC, Payload};
pub use service::{
    ArgumentMode, CallbackService, CallbackServiceBuilder, EventArgument, Invocation,
    OperationSignature, ServiceDescriptor, TypeDescriptor,
};
