//! Wire protocol error types.

use thiserror::Error;

/// Wire decoder errors.
///
/// Each cause maps to a distinct negative code so callers can count failure
/// types separately.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// No destination buffer has been supplied
    #[error("decode destination unset")]
    DestinationUnset,

    /// Destination buffer has zero capacity
    #[error("decode destination has zero capacity")]
    DestinationEmpty,

    /// Destination buffer overflowed; the decoder must be re-initialized
    #[error("decode destination overflow")]
    Overflow,
}

impl DecodeError {
    /// Numeric error code (-1, -2 or -3)
    pub fn code(self) -> i32 {
        match self {
            DecodeError::DestinationUnset => -1,
            DecodeError::DestinationEmpty => -2,
            DecodeError::Overflow => -3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(DecodeError::DestinationUnset.code(), -1);
        assert_eq!(DecodeError::DestinationEmpty.code(), -2);
        assert_eq!(DecodeError::Overflow.code(), -3);
    }
}
