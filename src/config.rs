// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscriber and dispatch configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Hub and topic a subscriber service subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTarget {
    /// The hub URL.
    pub hub: String,
    /// The topic URL.
    pub topic: String,
}

impl SubscriptionTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(hub: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            hub: hub.into(),
            topic: topic.into(),
        }
    }
}

/// Configuration of a subscriber service, as attached by the listener.
///
/// Keys use camelCase when deserialized, matching the service annotation.
///
/// # Examples
///
/// ```
/// use websub_dispatch::config::SubscriberConfig;
///
/// let config = SubscriberConfig::from_json(
///     r#"{
///         "target": { "hub": "https://hub.example.com", "topic": "https://example.com/feed" },
///         "leaseSeconds": 86400,
///         "secret": "s3cr3t"
///     }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.lease_seconds, Some(86400));
/// assert!(!format!("{config:?}").contains("s3cr3t"));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberConfig {
    /// Where to subscribe; `None` when the subscription is managed elsewhere.
    #[serde(default)]
    pub target: Option<SubscriptionTarget>,
    /// Callback URL announced to the hub, if it differs from the listener's.
    #[serde(default)]
    pub callback: Option<String>,
    /// Requested lease duration in seconds.
    #[serde(default)]
    pub lease_seconds: Option<u64>,
    /// Shared secret for content signature verification.
    #[serde(default)]
    pub secret: Option<String>,
    /// Whether to unsubscribe when the listener shuts down.
    #[serde(default)]
    pub unsubscribe_on_shutdown: bool,
    /// Whether to append the service path to the callback URL.
    #[serde(default)]
    pub append_service_path: bool,
}

impl SubscriberConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the JSON is malformed, or the error
    /// from [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the hub and topic.
    #[must_use]
    pub fn with_target(mut self, hub: impl Into<String>, topic: impl Into<String>) -> Self {
        self.target = Some(SubscriptionTarget::new(hub, topic));
        self
    }

    /// Sets the callback URL.
    #[must_use]
    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }

    /// Sets the requested lease.
    #[must_use]
    pub fn with_lease_seconds(mut self, seconds: u64) -> Self {
        self.lease_seconds = Some(seconds);
        self
    }

    /// Sets the shared secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Unsubscribes on listener shutdown.
    #[must_use]
    pub fn with_unsubscribe_on_shutdown(mut self, enabled: bool) -> Self {
        self.unsubscribe_on_shutdown = enabled;
        self
    }

    /// Appends the service path to the callback URL.
    #[must_use]
    pub fn with_append_service_path(mut self, enabled: bool) -> Self {
        self.append_service_path = enabled;
        self
    }

    /// Returns the lease as a [`Duration`].
    #[must_use]
    pub fn lease(&self) -> Option<Duration> {
        self.lease_seconds.map(Duration::from_secs)
    }

    /// Checks the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingField`] if the target hub or topic is empty.
    /// - [`ConfigError::InvalidValue`] if the secret is blank or the lease
    ///   is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(target) = &self.target {
            if target.hub.trim().is_empty() {
                return Err(ConfigError::MissingField("target.hub"));
            }
            if target.topic.trim().is_empty() {
                return Err(ConfigError::MissingField("target.topic"));
            }
        }
        if self.secret.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "secret",
                message: "must not be blank".to_string(),
            });
        }
        if self.lease_seconds == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "leaseSeconds",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for SubscriberConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberConfig")
            .field("target", &self.target)
            .field("callback", &self.callback)
            .field("lease_seconds", &self.lease_seconds)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("unsubscribe_on_shutdown", &self.unsubscribe_on_shutdown)
            .field("append_service_path", &self.append_service_path)
            .finish()
    }
}

/// Options applied by the adaptor around each dispatch.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use websub_dispatch::config::DispatchOptions;
///
/// let options = DispatchOptions::new().with_dispatch_timeout(Duration::from_secs(30));
/// assert_eq!(options.dispatch_timeout, Some(Duration::from_secs(30)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Deadline for a single dispatch (None = wait for the operation).
    ///
    /// An elapsed deadline fails the dispatch; the operation itself keeps
    /// running.
    pub dispatch_timeout: Option<Duration>,
}

impl DispatchOptions {
    /// Creates options without a deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the dispatch deadline.
    #[must_use]
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = Some(timeout);
        self
    }

    /// Removes the dispatch deadline.
    #[must_use]
    pub fn without_dispatch_timeout(mut self) -> Self {
        self.dispatch_timeout = None;
        self
    }
}
