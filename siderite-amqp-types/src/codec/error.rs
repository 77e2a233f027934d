//! Codec error type

/// Errors from encoding or decoding AMQP values
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The constructor octet is not defined by the specification
    #[error("Invalid format code")]
    InvalidFormatCode,

    /// The encoded bytes do not form a valid value of the announced type
    #[error("Malformed encoded data")]
    Malformed,

    /// The input ended before the announced size was available
    #[error("Unexpected end of encoded data")]
    Truncated,

    /// A typed extraction found a different type than requested
    #[error("Type mismatch: expecting {expecting}, found {found}")]
    TypeMismatch {
        /// The requested type
        expecting: &'static str,
        /// The type actually held by the value
        found: &'static str,
    },

    /// Array items must all be of one type
    #[error("Array is not homogeneous")]
    ArrayNonHomogeneous,

    /// A described value did not carry the expected descriptor
    #[error("Unexpected descriptor: {0}")]
    UnexpectedDescriptor(String),

    /// A mandatory composite field is null or missing
    #[error("Field '{0}' is mandatory")]
    MandatoryFieldIsNull(&'static str),

    /// The encoding is defined by the specification but not supported here
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        // Sufficient for tests; the String payload of `UnexpectedDescriptor`
        // is diagnostic only.
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}
