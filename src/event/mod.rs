// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol events delivered by a WebSub hub.
//!
//! The transport layer decodes each inbound hub request into a
//! [`ProtocolEvent`]. Every event kind maps to exactly one callback operation
//! name, fixed by its protocol role:
//!
//! | [`EventKind`] | Operation |
//! |---|---|
//! | `SubscriptionVerification` | `onSubscriptionVerification` |
//! | `UnsubscriptionVerification` | `onUnsubscriptionVerification` |
//! | `SubscriptionDenied` | `onSubscriptionDenied` |
//! | `ContentNotification` | `onEventNotification` |
//!
//! Content notifications also carry the originating [`TransportRequest`]. It
//! is never stored in the payload; the router moves it into the
//! [`DispatchContext`] of that single dispatch.

mod context;
mod dispatch_id;
mod transport;

pub use context::DispatchContext;
pub use dispatch_id::DispatchId;
pub use transport::TransportRequest;

use std::fmt;

use crate::error::CallbackError;
use crate::payload::Payload;

/// Operation invoked for subscription intent verification.
pub const ON_SUBSCRIPTION_VERIFICATION: &str = "onSubscriptionVerification";
/// Operation invoked for unsubscription intent verification.
pub const ON_UNSUBSCRIPTION_VERIFICATION: &str = "onUnsubscriptionVerification";
/// Operation invoked when the hub denies a subscription.
pub const ON_SUBSCRIPTION_DENIED: &str = "onSubscriptionDenied";
/// Operation invoked for content distribution.
pub const ON_EVENT_NOTIFICATION: &str = "onEventNotification";

/// The four kinds of event a hub delivers to a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The hub asks the subscriber to confirm a subscription.
    SubscriptionVerification,
    /// The hub asks the subscriber to confirm an unsubscription.
    UnsubscriptionVerification,
    /// The hub rejected the subscription request.
    SubscriptionDenied,
    /// The hub distributes new content for a topic.
    ContentNotification,
}

impl EventKind {
    /// All event kinds, in protocol order.
    pub const ALL: [Self; 4] = [
        Self::SubscriptionVerification,
        Self::UnsubscriptionVerification,
        Self::SubscriptionDenied,
        Self::ContentNotification,
    ];

    /// Returns the callback operation responsible for this kind.
    #[must_use]
    pub const fn operation_name(self) -> &'static str {
        match self {
            Self::SubscriptionVerification => ON_SUBSCRIPTION_VERIFICATION,
            Self::UnsubscriptionVerification => ON_UNSUBSCRIPTION_VERIFICATION,
            Self::SubscriptionDenied => ON_SUBSCRIPTION_DENIED,
            Self::ContentNotification => ON_EVENT_NOTIFICATION,
        }
    }

    /// Returns the kind whose operation is named `operation`, if any.
    #[must_use]
    pub fn from_operation_name(operation: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.operation_name() == operation)
    }

    /// Returns `true` if events of this kind carry a key/value payload.
    #[must_use]
    pub const fn carries_payload(self) -> bool {
        !matches!(self, Self::SubscriptionDenied)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SubscriptionVerification => "subscription-verification",
            Self::UnsubscriptionVerification => "unsubscription-verification",
            Self::SubscriptionDenied => "subscription-denied",
            Self::ContentNotification => "content-notification",
        };
        f.write_str(name)
    }
}

/// A decoded hub event awaiting dispatch.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    /// Subscription intent verification.
    SubscriptionVerification(Payload),
    /// Unsubscription intent verification.
    UnsubscriptionVerification(Payload),
    /// Subscription denial; the failure itself is the event argument.
    SubscriptionDenied(CallbackError),
    /// Content distribution together with the request it arrived on.
    ContentNotification {
        /// The decoded notification payload.
        payload: Payload,
        /// The originating transport request.
        request: TransportRequest,
    },
}

impl ProtocolEvent {
    /// Creates a content notification event.
    #[must_use]
    pub fn content_notification(payload: Payload, request: TransportRequest) -> Self {
        Self::ContentNotification { payload, request }
    }

    /// Returns the kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SubscriptionVerification(_) => EventKind::SubscriptionVerification,
            Self::UnsubscriptionVerification(_) => EventKind::UnsubscriptionVerification,
            Self::SubscriptionDenied(_) => EventKind::SubscriptionDenied,
            Self::ContentNotification { .. } => EventKind::ContentNotification,
        }
    }

    /// Returns the payload for payload-bearing kinds.
    #[must_use]
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::SubscriptionVerification(payload)
            | Self::UnsubscriptionVerification(payload)
            | Self::ContentNotification { payload, .. } => Some(payload),
            Self::SubscriptionDenied(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_maps_to_one_operation() {
        let names: Vec<&str> = EventKind::ALL
            .iter()
            .map(|kind| kind.operation_name())
            .collect();
        assert_eq!(
            names,
            vec![
                "onSubscriptionVerification",
                "onUnsubscriptionVerification",
                "onSubscriptionDenied",
                "onEventNotification",
            ]
        );
    }

    #[test]
    fn operation_name_round_trips() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_operation_name(kind.operation_name()), Some(kind));
        }
        assert_eq!(EventKind::from_operation_name("onPing"), None);
    }

    #[test]
    fn kind_is_independent_of_payload() {
        let empty = ProtocolEvent::SubscriptionVerification(Payload::new());
        let full = ProtocolEvent::SubscriptionVerification(
            [("hub.mode", "subscribe"), ("hub.topic", "t1")]
                .into_iter()
                .collect(),
        );
        assert_eq!(empty.kind(), full.kind());
        assert_eq!(empty.kind().operation_name(), ON_SUBSCRIPTION_VERIFICATION);
    }

    #[test]
    fn denial_carries_no_payload() {
        let event = ProtocolEvent::SubscriptionDenied(CallbackError::new("denied"));
        assert!(event.payload().is_none());
        assert!(!event.kind().carries_payload());
    }

    #[test]
    fn kind_display() {
        assert_eq!(
            EventKind::ContentNotification.to_string(),
            "content-notification"
        );
    }
}
