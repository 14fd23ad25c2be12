//! Value object trait: equality by value, not identity.

/// Marker trait for immutable value objects (counter-proposals, permission
/// sets, transfer amounts).
///
/// To "modify" a value object, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
