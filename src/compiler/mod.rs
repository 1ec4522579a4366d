// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compile-time bookkeeping for subscriber services.
//!
//! Static analysis assigns every subscriber service declaration an id and a
//! mount path. Those pairs are recorded per compilation unit (a module and
//! one of its documents) in a [`ServicePathRegistry`] and read back by later
//! passes. Nothing here is used at dispatch time, and nothing outlives one
//! compilation.

mod service_path;

pub use service_path::{
    DocumentId, ModuleId, ServicePathContext, ServicePathEntry, ServicePathRegistry,
    generate_service_path,
};
