//! Domain validation errors for core domain types.
//!
//! These errors are returned by constructors and validators that enforce
//! domain rules before any data reaches the cache or the network.
//!
//! # Examples
//!
//! ```
//! use studiosync::domain::error::DomainError;
//! use studiosync::domain::tax_id::Nip;
//!
//! let result = Nip::parse("123-456-32-19");
//! assert!(matches!(result, Err(DomainError::InvalidChecksum { .. })));
//! ```

use thiserror::Error;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Monetary amounts cannot be negative.
    #[error("amount must not be negative, got {amount}")]
    NegativeAmount {
        /// The invalid amount that was provided.
        amount: rust_decimal::Decimal,
    },

    /// A required text field was empty.
    #[error("{field} cannot be empty")]
    EmptyField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// A tax identifier had the wrong number of digits.
    #[error("{kind} must have {expected} digits, got {actual}")]
    InvalidLength {
        /// Identifier kind (`NIP`, `REGON`).
        kind: &'static str,
        /// Accepted digit counts.
        expected: &'static str,
        /// Digits found.
        actual: usize,
    },

    /// A tax identifier contained something other than digits and separators.
    #[error("{kind} contains invalid character '{found}'")]
    InvalidCharacter {
        /// Identifier kind (`NIP`, `REGON`).
        kind: &'static str,
        /// The offending character.
        found: char,
    },

    /// A tax identifier failed its checksum.
    #[error("{kind} checksum mismatch")]
    InvalidChecksum {
        /// Identifier kind (`NIP`, `REGON`).
        kind: &'static str,
    },

    /// Status string not recognised.
    #[error("unknown status '{0}'")]
    UnknownStatus(String),
}
