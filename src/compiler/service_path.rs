// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Service path records, one append-only list per compilation unit.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

/// Length of a generated service path.
const GENERATED_PATH_LEN: usize = 10;

/// Identifier of a module under compilation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleId(String);

impl ModuleId {
    /// Creates a module id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a source document within a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a document id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One resolved service declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePathEntry {
    /// Module containing the declaration.
    pub module_id: ModuleId,
    /// Document containing the declaration.
    pub document_id: DocumentId,
    /// Id assigned during analysis, unique within the compilation unit.
    pub service_id: u32,
    /// Resolved mount path.
    pub service_path: String,
}

/// Service paths recorded for one (module, document) pair.
///
/// Entries can be appended but never removed or changed, and are handed
/// out as a borrowed slice in insertion order.
#[derive(Debug, Clone)]
pub struct ServicePathContext {
    module_id: ModuleId,
    document_id: DocumentId,
    entries: Vec<ServicePathEntry>,
    /// Smallest id above every recorded one; `None` once `u32::MAX` is taken.
    next_id: Option<u32>,
}

impl ServicePathContext {
    /// Creates an empty context for a compilation unit.
    #[must_use]
    pub fn new(module_id: ModuleId, document_id: DocumentId) -> Self {
        Self {
            module_id,
            document_id,
            entries: Vec::new(),
            next_id: Some(0),
        }
    }

    /// Returns the module id.
    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    /// Returns the document id.
    #[must_use]
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Returns the recorded entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[ServicePathEntry] {
        &self.entries
    }

    /// Appends an entry.
    ///
    /// Recording the same `service_id` twice appends two entries.
    pub fn record(&mut self, service_id: u32, service_path: impl Into<String>) {
        let service_path = service_path.into();
        if self.next_id.is_some_and(|next| service_id >= next) {
            self.next_id = service_id.checked_add(1);
        }
        tracing::trace!(
            module = %self.module_id,
            document = %self.document_id,
            service_id,
            service_path = %service_path,
            "Recorded service path"
        );
        self.entries.push(ServicePathEntry {
            module_id: self.module_id.clone(),
            document_id: self.document_id.clone(),
            service_id,
            service_path,
        });
    }

    /// Returns the id the next [`assign`](Self::assign) would use.
    ///
    /// Returns `None` once an entry with id `u32::MAX` has been recorded.
    #[must_use]
    pub fn next_service_id(&self) -> Option<u32> {
        self.next_id
    }

    /// Assigns the next service id and records its path.
    ///
    /// Uses `explicit_path` when the declaration has one, otherwise a
    /// generated path. Returns the recorded entry, or `None` without
    /// recording anything when no id above the recorded ones is left.
    pub fn assign(&mut self, explicit_path: Option<&str>) -> Option<&ServicePathEntry> {
        let Some(service_id) = self.next_id else {
            tracing::debug!(
                module = %self.module_id,
                document = %self.document_id,
                "Service ids exhausted"
            );
            return None;
        };
        let path = explicit_path.map_or_else(generate_service_path, str::to_string);
        self.record(service_id, path);
        self.entries.last()
    }

    /// Returns `true` if no entries have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Generates a random mount path of lowercase ASCII letters and digits.
#[must_use]
pub fn generate_service_path() -> String {
    Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(GENERATED_PATH_LEN)
        .collect()
}

/// All service path contexts of one compilation.
///
/// # Examples
///
/// ```
/// use websub_dispatch::compiler::{DocumentId, ModuleId, ServicePathRegistry};
///
/// let module = ModuleId::new("websub_app");
/// let main = DocumentId::new("main.bal");
///
/// let mut registry = ServicePathRegistry::new();
/// registry.record(&module, &main, 0, "news");
/// registry.record(&module, &main, 1, "sports");
///
/// let paths: Vec<&str> = registry
///     .entries(&module, &main)
///     .iter()
///     .map(|entry| entry.service_path.as_str())
///     .collect();
/// assert_eq!(paths, ["news", "sports"]);
/// assert!(registry.entries(&module, &DocumentId::new("other.bal")).is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServicePathRegistry {
    modules: HashMap<ModuleId, HashMap<DocumentId, ServicePathContext>>,
}

impl ServicePathRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the context for a unit, creating it on first use.
    pub fn context_mut(
        &mut self,
        module_id: &ModuleId,
        document_id: &DocumentId,
    ) -> &mut ServicePathContext {
        self.modules
            .entry(module_id.clone())
            .or_default()
            .entry(document_id.clone())
            .or_insert_with(|| ServicePathContext::new(module_id.clone(), document_id.clone()))
    }

    /// Returns the context for a unit, if anything was recorded for it.
    #[must_use]
    pub fn context(
        &self,
        module_id: &ModuleId,
        document_id: &DocumentId,
    ) -> Option<&ServicePathContext> {
        self.modules.get(module_id)?.get(document_id)
    }

    /// Appends an entry to a unit's context.
    pub fn record(
        &mut self,
        module_id: &ModuleId,
        document_id: &DocumentId,
        service_id: u32,
        service_path: impl Into<String>,
    ) {
        self.context_mut(module_id, document_id)
            .record(service_id, service_path);
    }

    /// Returns a unit's entries in insertion order (empty for unknown units).
    #[must_use]
    pub fn entries(&self, module_id: &ModuleId, document_id: &DocumentId) -> &[ServicePathEntry] {
        self.context(module_id, document_id)
            .map(ServicePathContext::entries)
            .unwrap_or_default()
    }

    /// Returns the number of units with a context.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.values().map(HashMap::len).sum()
    }

    /// Returns `true` if no unit has a context.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.values().all(HashMap::is_empty)
    }
}
