//! Error types for the reactive engine.
//!
//! Most "failures" in the engine are ordinary results rather than faults:
//! writing a field a container does not recognize is reported as
//! [`Error::UnknownField`] so callers can probe a container's shape without
//! panicking.

use thiserror::Error;

use crate::reactive::FieldKey;

/// Errors produced by the reactive engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The field is not part of the container's recognized key set.
    #[error("unknown field `{0}`")]
    UnknownField(FieldKey),

    /// Only objects and arrays can be wrapped; scalars pass through as-is.
    #[error("cannot create a reactive container from a scalar value")]
    NotComposite,

    /// A field declared by a schema is absent from the raw data.
    #[error("missing declared field `{0}`")]
    MissingField(String),

    /// The raw data carries a field the schema does not declare.
    #[error("undeclared field `{0}`")]
    UnexpectedField(String),

    /// A write would have nested propagation deeper than the configured limit.
    #[error("propagation depth limit of {limit} exceeded")]
    PropagationDepthExceeded {
        /// The configured `max_propagation_depth`.
        limit: usize,
    },

    /// A snapshot was requested for data that references itself.
    #[error("value contains a reference cycle")]
    CyclicValue,

    /// JSON input could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_field_names_the_key() {
        let err = Error::UnknownField(FieldKey::from("missing"));
        assert_eq!(err.to_string(), "unknown field `missing`");

        let err = Error::UnknownField(FieldKey::Index(7));
        assert_eq!(err.to_string(), "unknown field `[7]`");
    }

    #[test]
    fn depth_error_reports_limit() {
        let err = Error::PropagationDepthExceeded { limit: 3 };
        assert_eq!(err.to_string(), "propagation depth limit of 3 exceeded");
    }

    #[test]
    fn json_errors_convert() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = parse.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
