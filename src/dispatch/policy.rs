// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload freezing policy.

use std::collections::HashMap;

use crate::event::EventKind;
use crate::service::ServiceDescriptor;

/// Decides whether a payload must be frozen before it is delivered.
///
/// The router only consults the policy for payload-bearing events; a
/// subscription denial never reaches it.
pub trait FreezePolicy: Send + Sync {
    /// Returns `true` if the payload for `operation` must be frozen.
    fn should_freeze(
        &self,
        service: &ServiceDescriptor,
        kind: EventKind,
        operation: &str,
    ) -> bool;
}

/// Per-event-kind override of the declared freezing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreezeRule {
    /// Freeze when the operation declares a read-only event parameter.
    #[default]
    Declared,
    /// Always freeze.
    Always,
    /// Never freeze.
    Never,
}

/// Default policy: follow each operation's declared parameter type.
///
/// # Examples
///
/// ```
/// use websub_dispatch::dispatch::{FreezeRule, ImmutabilityPolicy};
/// use websub_dispatch::event::EventKind;
///
/// let policy = ImmutabilityPolicy::new()
///     .with_rule(EventKind::ContentNotification, FreezeRule::Always);
///
/// assert_eq!(policy.rule(EventKind::ContentNotification), FreezeRule::Always);
/// assert_eq!(policy.rule(EventKind::SubscriptionVerification), FreezeRule::Declared);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ImmutabilityPolicy {
    overrides: HashMap<EventKind, FreezeRule>,
}

impl ImmutabilityPolicy {
    /// Creates a policy that follows declarations for every kind.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the rule for one event kind.
    #[must_use]
    pub fn with_rule(mut self, kind: EventKind, rule: FreezeRule) -> Self {
        self.overrides.insert(kind, rule);
        self
    }

    /// Returns the rule in effect for `kind`.
    #[must_use]
    pub fn rule(&self, kind: EventKind) -> FreezeRule {
        self.overrides.get(&kind).copied().unwrap_or_default()
    }

    /// Returns whether `operation` declares a read-only event argument.
    #[must_use]
    pub fn declared(service: &ServiceDescriptor, operation: &str) -> bool {
        service.is_payload_read_only_required(operation)
    }
}

impl FreezePolicy for ImmutabilityPolicy {
    fn should_freeze(
        &self,
        service: &ServiceDescriptor,
        kind: EventKind,
        operation: &str,
    ) -> bool {
        match self.rule(kind) {
            FreezeRule::Declared => Self::declared(service, operation),
            FreezeRule::Always => true,
            FreezeRule::Never => false,
        }
    }
}
