//! Error type for operations whose failure is a caller-contract violation.
//!
//! Routine absence (`get`/`pop` on a missing key) is reported with `Option`
//! and never reaches this type.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// `pop_item` was called on a map with no entries.
    #[error("cannot pop from an empty map")]
    EmptyContainer,
    /// `update_value` was called with a key the map does not hold.
    #[error("key not found in map")]
    KeyNotFound,
}
