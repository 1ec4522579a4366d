// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event dispatch core.
//!
//! # Architecture
//!
//! ```text
//! ProtocolEvent (kind + payload + transport request)
//!                     ↓
//!           EventRouter.dispatch()
//!                     ↓
//!     kind → fixed operation name (EventKind::operation_name)
//!                     ↓
//!     FreezePolicy.should_freeze() → Payload.freeze()
//!                     ↓
//!           DispatchBridge.invoke()
//!                     ↓
//!   operation runs on its own task; caller suspended on a oneshot
//!                     ↓
//!         DispatchResult (value or DispatchError)
//! ```
//!
//! The router is created per event and discarded afterwards. The bridge
//! resumes its caller exactly once: the completion is a `oneshot` channel
//! whose sender is consumed by the first (and only) send.

mod bridge;
mod policy;
mod router;

pub use bridge::DispatchBridge;
pub use policy::{FreezePolicy, FreezeRule, ImmutabilityPolicy};
pub use router::{EventRouter, RouterState};

use serde_json::Value;

use crate::error::DispatchError;

/// Outcome of one dispatch: the operation's return value or a failure.
pub type DispatchResult = Result<Value, DispatchError>;
