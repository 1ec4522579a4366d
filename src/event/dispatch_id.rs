// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dispatch identifier type.

use std::fmt;

use uuid::Uuid;

/// Unique identifier for a single dispatch.
///
/// Every inbound event gets a fresh id so that log records emitted while its
/// operation runs can be correlated.
///
/// # Examples
///
/// ```
/// use websub_dispatch::event::DispatchId;
///
/// let id = DispatchId::new();
/// assert_ne!(id, DispatchId::new());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct DispatchId(Uuid);

impl DispatchId {
    /// Creates a new unique dispatch identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = &self.0.simple().to_string()[..8];
        write!(f, "DispatchId({short}...)")
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DispatchId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
