// src/db/error.rs

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Coarse grouping of [`RepoError`] variants, used for process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    Schema,
    Write,
    Read,
    Transaction,
}

impl ErrorCategory {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorCategory::Connection => 2,
            ErrorCategory::Schema => 3,
            ErrorCategory::Write => 4,
            ErrorCategory::Read => 5,
            ErrorCategory::Transaction => 6,
        }
    }
}

/// Where inside a transaction things went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStage {
    Begin,
    Step(usize),
    Commit,
}

impl Display for TxStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStage::Begin => write!(f, "begin"),
            TxStage::Step(index) => write!(f, "step {index}"),
            TxStage::Commit => write!(f, "commit"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{op}: cannot open database: {source}")]
    Connection {
        op: &'static str,
        source: rusqlite::Error,
    },

    #[error("{op}: schema statement failed: {source}")]
    Schema {
        op: &'static str,
        source: rusqlite::Error,
    },

    #[error("{op}: write failed: {source}")]
    Write {
        op: &'static str,
        source: rusqlite::Error,
    },

    #[error("{op}: read failed: {source}")]
    Read {
        op: &'static str,
        source: rusqlite::Error,
    },

    /// The result set does not have the `users` row shape.
    #[error("{op}: result row does not match the users table: {reason}")]
    Mapping { op: &'static str, reason: String },

    /// The transaction was rolled back (or never started).
    #[error("{op}: transaction failed at {stage}, rolled back: {source}")]
    Transaction {
        op: &'static str,
        stage: TxStage,
        source: rusqlite::Error,
    },

    /// A password is configured that this build cannot apply.
    #[error("{op}: cannot encrypt database: {reason}")]
    Encryption { op: &'static str, reason: String },

    /// The background connection thread of the async repository is gone.
    #[error("{op}: database worker unavailable: {reason}")]
    Background { op: &'static str, reason: String },
}

impl RepoError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RepoError::Connection { .. }
            | RepoError::Encryption { .. }
            | RepoError::Background { .. } => ErrorCategory::Connection,
            RepoError::Schema { .. } => ErrorCategory::Schema,
            RepoError::Write { .. } => ErrorCategory::Write,
            RepoError::Read { .. } | RepoError::Mapping { .. } => ErrorCategory::Read,
            RepoError::Transaction { .. } => ErrorCategory::Transaction,
        }
    }

    /// Name of the repository operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            RepoError::Connection { op, .. }
            | RepoError::Schema { op, .. }
            | RepoError::Write { op, .. }
            | RepoError::Read { op, .. }
            | RepoError::Mapping { op, .. }
            | RepoError::Transaction { op, .. }
            | RepoError::Encryption { op, .. }
            | RepoError::Background { op, .. } => op,
        }
    }

    /// True when the driver rejected a write because of a constraint
    /// (duplicate primary key, CHECK, NOT NULL).
    pub fn is_constraint_violation(&self) -> bool {
        let source = match self {
            RepoError::Write { source, .. } | RepoError::Transaction { source, .. } => source,
            _ => return false,
        };
        matches!(
            source.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        )
    }

    pub(crate) fn connection(op: &'static str) -> impl FnOnce(rusqlite::Error) -> RepoError {
        move |source| RepoError::Connection { op, source }
    }

    pub(crate) fn schema(op: &'static str) -> impl FnOnce(rusqlite::Error) -> RepoError {
        move |source| RepoError::Schema { op, source }
    }

    pub(crate) fn write(op: &'static str) -> impl FnOnce(rusqlite::Error) -> RepoError {
        move |source| RepoError::Write { op, source }
    }

    pub(crate) fn transaction(
        op: &'static str,
        stage: TxStage,
    ) -> impl FnOnce(rusqlite::Error) -> RepoError {
        move |source| RepoError::Transaction { op, stage, source }
    }

    /// Column type/index problems while reading a row are mapping errors,
    /// everything else the driver reports is a plain read error.
    pub(crate) fn read(op: &'static str) -> impl FnOnce(rusqlite::Error) -> RepoError {
        move |source| match source {
            rusqlite::Error::InvalidColumnType(index, ref name, ty) => RepoError::Mapping {
                op,
                reason: format!("column {index} ({name}) has unexpected type {ty}"),
            },
            rusqlite::Error::InvalidColumnIndex(index) => RepoError::Mapping {
                op,
                reason: format!("missing column {index}"),
            },
            rusqlite::Error::InvalidColumnName(ref name) => RepoError::Mapping {
                op,
                reason: format!("missing column {name}"),
            },
            rusqlite::Error::IntegralValueOutOfRange(index, value) => RepoError::Mapping {
                op,
                reason: format!("column {index} value {value} out of range"),
            },
            rusqlite::Error::FromSqlConversionFailure(index, ty, ref err) => RepoError::Mapping {
                op,
                reason: format!("column {index} of type {ty} not convertible: {err}"),
            },
            source => RepoError::Read { op, source },
        }
    }
}
