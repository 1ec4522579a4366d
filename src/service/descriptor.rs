// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static operation metadata of a callback service.
//!
//! A [`ServiceDescriptor`] answers two questions about a service: which
//! operations it declares, and whether a given operation requires its event
//! argument to be read-only. The metadata is fixed when the service is built,
//! so every query is a plain read that is safe to run concurrently.

use std::fmt;

/// Declared type of an operation parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// The `readonly` type.
    ReadOnly,
    /// Any other named type, such as `map<string>` or `websub:ContentDistributionMessage`.
    Named(String),
    /// An intersection of constituent types, such as `readonly & map<string>`.
    Intersection(Vec<TypeDescriptor>),
}

impl TypeDescriptor {
    /// Creates a named type.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Creates `readonly & inner`.
    #[must_use]
    pub fn read_only(inner: TypeDescriptor) -> Self {
        Self::Intersection(vec![Self::ReadOnly, inner])
    }

    /// Returns `true` for an intersection with an explicit `readonly` constituent.
    ///
    /// A bare `readonly` type is not an intersection and does not count.
    #[must_use]
    pub fn is_read_only_intersection(&self) -> bool {
        match self {
            Self::Intersection(constituents) => constituents
                .iter()
                .any(|constituent| matches!(constituent, Self::ReadOnly)),
            Self::ReadOnly | Self::Named(_) => false,
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => f.write_str("readonly"),
            Self::Named(name) => f.write_str(name),
            Self::Intersection(constituents) => {
                for (i, constituent) in constituents.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" & ")?;
                    }
                    write!(f, "{constituent}")?;
                }
                Ok(())
            }
        }
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Parameter name.
    pub name: String,
    /// Declared type.
    pub ty: TypeDescriptor,
}

impl ParameterDescriptor {
    /// Creates a parameter descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Declared signature of one operation.
///
/// # Examples
///
/// ```
/// use websub_dispatch::service::{OperationSignature, TypeDescriptor};
///
/// let sig = OperationSignature::new("onEventNotification")
///     .param("event", TypeDescriptor::read_only(TypeDescriptor::named("map<json>")));
///
/// assert_eq!(sig.to_string(), "onEventNotification(readonly & map<json> event)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSignature {
    name: String,
    parameters: Vec<ParameterDescriptor>,
}

impl OperationSignature {
    /// Creates a signature with no parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.parameters.push(ParameterDescriptor::new(name, ty));
        self
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared parameters in order.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Returns the first declared parameter, which receives the event argument.
    #[must_use]
    pub fn event_parameter(&self) -> Option<&ParameterDescriptor> {
        self.parameters.first()
    }
}

impl fmt::Display for OperationSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", param.ty, param.name)?;
        }
        f.write_str(")")
    }
}

/// Operation metadata of a callback service, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDescriptor {
    operations: Vec<OperationSignature>,
}

impl ServiceDescriptor {
    pub(crate) fn new(operations: Vec<OperationSignature>) -> Self {
        Self { operations }
    }

    /// Returns the declared operation names in declaration order.
    ///
    /// Empty if the service declares no operations.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        self.operations.iter().map(OperationSignature::name).collect()
    }

    /// Returns the signature of `operation`.
    #[must_use]
    pub fn operation(&self, operation: &str) -> Option<&OperationSignature> {
        self.operations.iter().find(|sig| sig.name() == operation)
    }

    /// Returns `true` if the service declares `operation`.
    #[must_use]
    pub fn has_operation(&self, operation: &str) -> bool {
        self.operation(operation).is_some()
    }

    /// Returns whether `operation` requires a read-only event argument.
    ///
    /// `false` if the operation is not declared or declares no parameters;
    /// otherwise `true` exactly when its first parameter is an intersection
    /// with an explicit `readonly` constituent.
    #[must_use]
    pub fn is_payload_read_only_required(&self, operation: &str) -> bool {
        self.operation(operation)
            .and_then(OperationSignature::event_parameter)
            .is_some_and(|param| param.ty.is_read_only_intersection())
    }

    /// Returns the number of declared operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` if no operations are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
