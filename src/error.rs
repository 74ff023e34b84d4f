//! Error types for docker-dns-sync.

use thiserror::Error;

/// Errors that can occur in the sync engine and its collaborators.
#[derive(Debug, Error)]
pub enum SyncError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Docker Engine API error
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Registry backend error
    #[error("Registry error: {0}")]
    Registry(String),

    /// Distributed lock could not be acquired
    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    /// A proposed record conflicts with the registry state
    #[error(transparent)]
    Validation(#[from] RecordValidationError),
}

/// Raised when a proposed record would create a conflicting DNS state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordValidationError {
    /// The record's name (or a CNAME target) is not a valid hostname.
    #[error("invalid hostname: {0}")]
    InvalidHostname(String),

    /// An A record cannot share a name with an existing CNAME record.
    #[error("{name} - cannot add an A record when a CNAME record exists with the same name")]
    CnameExistsForName {
        /// DNS name under contention.
        name: String,
    },

    /// A CNAME record cannot share a name with existing A record(s).
    #[error("{name} - cannot add a CNAME record when an A record exists with the same name")]
    AExistsForName {
        /// DNS name under contention.
        name: String,
    },

    /// Only one CNAME record may exist per name.
    #[error("{name} - cannot have multiple CNAME records with the same name")]
    DuplicateCname {
        /// DNS name under contention.
        name: String,
    },

    /// Duplicate A (name, value) pairs are disallowed.
    #[error("{name} -> {value} - existing A record detected with the same name and value")]
    DuplicateAValue {
        /// DNS name under contention.
        name: String,
        /// The duplicated IPv4 address, rendered.
        value: String,
    },

    /// The CNAME would close a resolution cycle.
    #[error("CNAME cycle detected starting at: {0}")]
    CnameCycle(String),
}
