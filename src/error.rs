//! Error handling for the cap table engine
//!
//! Validation errors are recoverable locally and rendered inline next to the
//! offending field. Persistence errors leave the in-memory snapshot at its
//! last-known-good state and need a manual retry.

use std::collections::BTreeMap;
use std::fmt;

use cap_table_types::{ErrorKey, FieldError, HolderRef, ShareClass};
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Not authenticated: no session credential available")]
    NotAuthenticated,

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Bulk update stopped after {} of {total} holders: {source}", .succeeded.len())]
    PartialBulkFailure {
        succeeded: Vec<HolderRef>,
        total: usize,
        failed: HolderRef,
        #[source]
        source: Box<EngineError>,
    },

    #[error("{holder} still has relationships in: {}", .companies.join(", "))]
    StillReferenced {
        holder: HolderRef,
        companies: Vec<String>,
    },

    #[error("No company snapshot loaded")]
    NotLoaded,
}

impl EngineError {
    /// Validation errors recover without a reload; everything else needs the
    /// caller to re-fetch or retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::StillReferenced { .. })
    }

    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<PersistenceError> for EngineError {
    fn from(error: PersistenceError) -> Self {
        match error {
            PersistenceError::NotAuthenticated => Self::NotAuthenticated,
            PersistenceError::NotFound { entity } => Self::NotFound { entity },
            PersistenceError::Conflict { message } => Self::Conflict { message },
            other => Self::Persistence {
                message: other.to_string(),
            },
        }
    }
}

/// Errors raised by a persistence backend
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Credential rejected by persistence service")]
    NotAuthenticated,

    #[error("{entity} not found")]
    NotFound { entity: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Malformed document: {message}")]
    Decode { message: String },

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

/// A single share or role validation failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{class}: requested {requested} exceeds available {available} by {exceeded_by}")]
    OverAllocation {
        class: ShareClass,
        requested: u64,
        available: u64,
        exceeded_by: u64,
    },

    #[error("Percentages total {total}%, exceeding 100% by {exceeded_by}")]
    PercentageExceeded { total: Decimal, exceeded_by: Decimal },

    #[error("Percentage for {holder} must be between 0 and 100")]
    PercentageOutOfRange { holder: HolderRef },

    #[error("{holder} mixes class and ordinary share values")]
    ModeMixing { holder: HolderRef },

    #[error("{holder} uses a {found} allocation but the company is {expected}")]
    SchemeMismatch {
        holder: HolderRef,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{holder} must be granted at least one governance role")]
    MissingRole { holder: HolderRef },

    #[error("{holder} appears more than once in the same change")]
    DuplicateHolder { holder: HolderRef },

    #[error("{holder} has no holding or representation in this company")]
    UnknownHolder { holder: HolderRef },

    #[error("A company cannot hold its own shares or represent itself")]
    SelfReference,
}

impl ValidationError {
    /// Field the message attaches to
    pub fn key(&self) -> ErrorKey {
        match self {
            Self::OverAllocation { class, .. } => ErrorKey::Class { class: *class },
            Self::PercentageExceeded { .. } | Self::SelfReference => ErrorKey::Company,
            Self::PercentageOutOfRange { holder }
            | Self::ModeMixing { holder }
            | Self::SchemeMismatch { holder, .. }
            | Self::MissingRole { holder }
            | Self::DuplicateHolder { holder }
            | Self::UnknownHolder { holder } => ErrorKey::Holder { holder: *holder },
        }
    }
}

/// Collector for validation failures of one proposed change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(error: ValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Messages grouped by the field they attach to
    pub fn to_field_map(&self) -> BTreeMap<ErrorKey, Vec<String>> {
        let mut map: BTreeMap<ErrorKey, Vec<String>> = BTreeMap::new();
        for error in &self.errors {
            map.entry(error.key()).or_default().push(error.to_string());
        }
        map
    }

    /// Serializable form of [`Self::to_field_map`]
    pub fn to_field_errors(&self) -> Vec<FieldError> {
        self.to_field_map()
            .into_iter()
            .map(|(key, messages)| FieldError { key, messages })
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self::single(error)
    }
}

/// Result type aliases for convenience
pub type EngineResult<T> = Result<T, EngineError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;
pub type ValidationResult<T> = Result<T, ValidationErrors>;

#[cfg(test)]
mod tests {
    use super::*;
    use cap_table_types::PersonId;

    #[test]
    fn over_allocation_keys_by_class() {
        let error = ValidationError::OverAllocation {
            class: ShareClass::A,
            requested: 700,
            available: 600,
            exceeded_by: 100,
        };
        assert_eq!(
            error.key(),
            ErrorKey::Class {
                class: ShareClass::A
            }
        );
        assert!(error.to_string().contains("by 100"));
    }

    #[test]
    fn field_map_groups_messages() {
        let holder = HolderRef::Person(PersonId::new());
        let mut errors = ValidationErrors::new();
        errors.push(ValidationError::ModeMixing { holder });
        errors.push(ValidationError::MissingRole { holder });
        errors.push(ValidationError::SelfReference);

        let map = errors.to_field_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&ErrorKey::Holder { holder }].len(), 2);
    }

    #[test]
    fn persistence_not_found_maps_through() {
        let error: EngineError = PersistenceError::NotFound {
            entity: "company".into(),
        }
        .into();
        assert!(matches!(error, EngineError::NotFound { .. }));
        assert!(!error.is_recoverable());
    }

    #[test]
    fn empty_collector_is_ok() {
        assert_eq!(ValidationErrors::new().into_result(5), Ok(5));
    }
}
